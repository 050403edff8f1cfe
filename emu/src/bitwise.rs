use std::ops::RangeInclusive;

/// Bit-level helpers shared by the decoders and the PSR model.
///
/// Indexes go from lsb to msb (right to left). Out of range indexes are a
/// programming error and trip a debug assertion.
pub trait Bits: Copy {
    const WIDTH: u8;

    fn get_bit(self, bit_idx: u8) -> bool;

    fn set_bit(&mut self, bit_idx: u8, value: bool);

    /// Extracts `bits_range` and moves it down to bit 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    /// Returns the value sign-extended from its lowest `number_of_bits` bits.
    fn sign_extended(self, number_of_bits: u8) -> Self;

    fn set_bit_on(&mut self, bit_idx: u8) {
        self.set_bit(bit_idx, true);
    }

}

macro_rules! impl_bits {
    ($ty:ty, $signed:ty) => {
        impl Bits for $ty {
            const WIDTH: u8 = <$ty>::BITS as u8;

            #[inline]
            fn get_bit(self, bit_idx: u8) -> bool {
                debug_assert!(bit_idx < Self::WIDTH, "bit index {bit_idx} out of range");
                (self >> bit_idx) & 1 == 1
            }

            #[inline]
            fn set_bit(&mut self, bit_idx: u8, value: bool) {
                debug_assert!(bit_idx < Self::WIDTH, "bit index {bit_idx} out of range");
                let mask: $ty = 1 << bit_idx;
                if value {
                    *self |= mask;
                } else {
                    *self &= !mask;
                }
            }

            #[inline]
            fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                let start = *bits_range.start();
                let end = *bits_range.end();
                debug_assert!(start <= end && end < Self::WIDTH);

                let length = u32::from(end - start + 1);
                let mask = <$ty>::MAX.checked_shr(<$ty>::BITS - length).unwrap_or(0);

                (self >> start) & mask
            }

            #[inline]
            fn sign_extended(self, number_of_bits: u8) -> Self {
                debug_assert!(number_of_bits > 0 && number_of_bits <= Self::WIDTH);
                let unused = Self::WIDTH - number_of_bits;

                (((self << unused) as $signed) >> unused) as $ty
            }
        }
    };
}

impl_bits!(u8, i8);
impl_bits!(u16, i16);
impl_bits!(u32, i32);
impl_bits!(u64, i64);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    #[test]
    fn get_bit() {
        let b = 0b10_1100_1110_u32;
        assert!(!b.get_bit(0));
        assert!(b.get_bit(1));
        assert!(b.get_bit(2));
        assert!(!b.get_bit(31));
    }

    #[test]
    fn set_bit() {
        let mut b = 0b110_0110_u32;
        b.set_bit(0, true);
        b.set_bit(1, true);
        b.set_bit(2, false);
        b.set_bit(3, false);
        assert_eq!(b, 0b110_0011);

        b.set_bit_on(31);
        assert!(b.get_bit(31));
        b.set_bit(31, false);
        assert_eq!(b, 0b110_0011);
    }

    #[test]
    fn toggling_every_bit_inverts_the_value() {
        let original = rand::thread_rng().gen_range(1..=u32::MAX - 1);
        let mut fin = original;
        for i in 0..32 {
            let bit = fin.get_bit(i);
            fin.set_bit(i, !bit);
        }

        assert_eq!(!original, fin);
    }

    #[test]
    fn get_bits() {
        let b = 0b10_1100_1110_u32;
        assert_eq!(b.get_bits(0..=3), 0b1110);
        assert_eq!(b.get_bits(1..=1), 0b1);
        assert_eq!(b.get_bits(4..=7), 0b1100);
        assert_eq!(b.get_bits(8..=9), 0b10);
        assert_eq!(b.get_bits(0..=31), 0b10_1100_1110);
        assert_eq!(b.get_bits(28..=31), 0b0);

        let h = 0xF00F_u16;
        assert_eq!(h.get_bits(12..=15), 0xF);
        assert_eq!(h.get_bits(0..=15), 0xF00F);
    }

    #[test]
    fn sign_extended() {
        assert_eq!(0b1001_u32.sign_extended(4) as i32, -7);
        assert_eq!(0b0111_u32.sign_extended(4), 7);
        assert_eq!(0x00FF_FFFE_u32.sign_extended(24), 0xFFFF_FFFE);
        assert_eq!(0x80_u16.sign_extended(8), 0xFF80);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn invalid_index() {
        let b = 0u32;
        b.get_bit(32);
    }
}
