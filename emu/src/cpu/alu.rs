//! Arithmetic shared by the ARM and Thumb execution routines: the adder with
//! its flag outputs and the barrel shifter.

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

/// `first_op + second_op + carry_in` with the four condition outputs.
///
/// Subtraction goes through here too as `a + !b + 1`, which is why C means
/// "no borrow" after a subtract.
#[must_use]
pub fn add_with_carry(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    // we do the sum in 64bits so that the 32nd bit is the carry
    let wide = u64::from(first_op) + u64::from(second_op) + u64::from(carry_in);
    let result = wide as u32;

    // overflow only occurs when operands have the same sign and result has the opposite one
    let overflow = (!(first_op ^ second_op) & (first_op ^ result)).get_bit(31);

    ArithmeticOpResult {
        result,
        carry: wide > u64::from(u32::MAX),
        overflow,
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

#[must_use]
pub fn add_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
    add_with_carry(first_op, second_op, false)
}

#[must_use]
pub fn sub_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
    add_with_carry(first_op, !second_op, true)
}

/// `first_op - second_op - !carry_in`, as SBC and RSC compute it.
#[must_use]
pub fn sub_with_carry(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    add_with_carry(first_op, !second_op, carry_in)
}

/// Result of a pass through the barrel shifter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftResult {
    pub result: u32,
    pub carry: bool,
}

/// Shift by an amount taken from a register (only the low byte matters).
///
/// An amount of 0 leaves both the value and the carry untouched.
#[must_use]
pub fn shift(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ShiftResult {
    let amount = shift_amount & 0xFF;
    if amount == 0 {
        return ShiftResult { result: rm, carry };
    }

    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => ShiftResult {
                result: rm << amount,
                carry: rm.get_bit((32 - amount) as u8),
            },
            32 => ShiftResult {
                result: 0,
                carry: rm.get_bit(0),
            },
            _ => ShiftResult {
                result: 0,
                carry: false,
            },
        },
        ShiftKind::Lsr => match amount {
            1..=31 => ShiftResult {
                result: rm >> amount,
                carry: rm.get_bit((amount - 1) as u8),
            },
            32 => ShiftResult {
                result: 0,
                carry: rm.get_bit(31),
            },
            _ => ShiftResult {
                result: 0,
                carry: false,
            },
        },
        ShiftKind::Asr => match amount {
            1..=31 => ShiftResult {
                result: ((rm as i32) >> amount) as u32,
                carry: rm.get_bit((amount - 1) as u8),
            },
            _ => ShiftResult {
                result: ((rm as i32) >> 31) as u32,
                carry: rm.get_bit(31),
            },
        },
        ShiftKind::Ror => {
            let rotation = amount & 0x1F;
            if rotation == 0 {
                // ROR by a multiple of 32 keeps the value, C = bit 31.
                ShiftResult {
                    result: rm,
                    carry: rm.get_bit(31),
                }
            } else {
                ShiftResult {
                    result: rm.rotate_right(rotation),
                    carry: rm.get_bit((rotation - 1) as u8),
                }
            }
        }
    }
}

/// Shift by a 5-bit amount encoded in the instruction.
///
/// The zero encodings are special: `LSR #0` and `ASR #0` mean a shift by 32,
/// `ROR #0` is RRX (rotate right by one through the carry).
#[must_use]
pub fn shift_immediate(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ShiftResult {
    match (kind, shift_amount) {
        (ShiftKind::Lsl, 0) => ShiftResult { result: rm, carry },
        (ShiftKind::Lsr | ShiftKind::Asr, 0) => shift(kind, 32, rm, carry),
        (ShiftKind::Ror, 0) => ShiftResult {
            result: (u32::from(carry) << 31) | (rm >> 1),
            carry: rm.get_bit(0),
        },
        _ => shift(kind, shift_amount, rm, carry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_signed_overflow() {
        let r = add_inner_op(0x7FFF_FFFF, 1);
        assert_eq!(r.result, 0x8000_0000);
        assert!(r.overflow);
        assert!(r.sign);
        assert!(!r.carry);
        assert!(!r.zero);
    }

    #[test]
    fn add_unsigned_carry() {
        let r = add_inner_op(0xFFFF_FFFF, 1);
        assert_eq!(r.result, 0);
        assert!(r.carry);
        assert!(r.zero);
        assert!(!r.overflow);
    }

    #[test]
    fn sub_borrow_clears_carry() {
        let r = sub_inner_op(0, 1);
        assert_eq!(r.result, 0xFFFF_FFFF);
        assert!(!r.carry);
        assert!(r.sign);
        assert!(!r.zero);
        assert!(!r.overflow);

        let r = sub_inner_op(5, 5);
        assert!(r.carry);
        assert!(r.zero);
    }

    #[test]
    fn sub_signed_overflow() {
        let r = sub_inner_op(0x8000_0000, 1);
        assert_eq!(r.result, 0x7FFF_FFFF);
        assert!(r.overflow);
        assert!(r.carry);
    }

    #[test]
    fn carry_in_is_added() {
        let r = add_with_carry(0xFFFF_FFFE, 1, true);
        assert_eq!(r.result, 0);
        assert!(r.carry);

        // SBC with C=0 subtracts one more.
        let r = sub_with_carry(10, 3, false);
        assert_eq!(r.result, 6);
        assert!(r.carry);
    }

    #[test]
    fn logical_shifts() {
        assert_eq!(
            shift(ShiftKind::Lsl, 1, 0x8000_0001, false),
            ShiftResult {
                result: 2,
                carry: true
            }
        );
        assert_eq!(
            shift(ShiftKind::Lsl, 32, 0x0000_0001, false),
            ShiftResult {
                result: 0,
                carry: true
            }
        );
        assert_eq!(
            shift(ShiftKind::Lsr, 33, 0xFFFF_FFFF, true),
            ShiftResult {
                result: 0,
                carry: false
            }
        );
        assert_eq!(
            shift(ShiftKind::Lsr, 4, 0x0000_00F8, false),
            ShiftResult {
                result: 0xF,
                carry: true
            }
        );
    }

    #[test]
    fn register_shift_by_zero_keeps_carry() {
        let r = shift(ShiftKind::Asr, 0x100, 0x8000_0000, true);
        assert_eq!(r.result, 0x8000_0000);
        assert!(r.carry);
    }

    #[test]
    fn arithmetic_shift_fills_with_sign() {
        let r = shift(ShiftKind::Asr, 4, 0x8000_0000, false);
        assert_eq!(r.result, 0xF800_0000);
        assert!(!r.carry);

        let r = shift(ShiftKind::Asr, 40, 0x8000_0000, false);
        assert_eq!(r.result, 0xFFFF_FFFF);
        assert!(r.carry);
    }

    #[test]
    fn rotations() {
        let r = shift(ShiftKind::Ror, 4, 0x0000_001F, false);
        assert_eq!(r.result, 0xF000_0001);
        assert!(r.carry);

        let r = shift(ShiftKind::Ror, 32, 0x8000_0000, false);
        assert_eq!(r.result, 0x8000_0000);
        assert!(r.carry);
    }

    #[test]
    fn immediate_zero_encodings() {
        let r = shift_immediate(ShiftKind::Lsr, 0, 0x8000_0000, false);
        assert_eq!(r.result, 0);
        assert!(r.carry);

        let r = shift_immediate(ShiftKind::Asr, 0, 0x8000_0000, false);
        assert_eq!(r.result, 0xFFFF_FFFF);
        assert!(r.carry);

        // RRX
        let r = shift_immediate(ShiftKind::Ror, 0, 0x0000_0003, true);
        assert_eq!(r.result, 0x8000_0001);
        assert!(r.carry);

        let r = shift_immediate(ShiftKind::Lsl, 0, 0x1234, true);
        assert_eq!(r.result, 0x1234);
        assert!(r.carry);
    }
}
