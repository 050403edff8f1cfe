//! # Program Status Registers (CPSR and SPSR)
//!
//! The PSR contains condition flags (N, Z, C, V) and control bits (mode, state, interrupts).
//!
//! ```text
//! 31 30 29 28 27 26      8 7 6 5 4   0
//! ┌──┬──┬──┬──┬──┬────────┬─┬─┬─┬─────┐
//! │N │Z │C │V │Q │Reserved│I│F│T│Mode │
//! └──┴──┴──┴──┴──┴────────┴─┴─┴─┴─────┘
//! ```
//!
//! - **Flags (27-31)**: See [`condition`](super::condition) for how these are tested
//! - **Mode (0-4)**: See [`cpu_modes`](super::cpu_modes)
//! - **T bit (5)**: ARM (0) or Thumb (1) state
//! - **I/F bits (6-7)**: IRQ/FIQ disable
//!
//! Each exception mode owns a **SPSR** that receives a copy of the CPSR on
//! exception entry. A slot holds nothing until the first save into it.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::alu::ArithmeticOpResult;
use crate::cpu::{condition::Condition, cpu_modes::Mode};

/// Single-bit fields of a PSR.
///
/// Kept separate from [`Mode`]: the mode field is five bits wide and has its
/// own encoding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// N, bit 31
    Sign,
    /// Z, bit 30
    Zero,
    /// C, bit 29
    Carry,
    /// V, bit 28
    Overflow,
    /// Q, bit 27 (`ARMv5TE` and up, stored but never produced by this core)
    StickyOverflow,
    /// I, bit 7
    IrqDisable,
    /// F, bit 6
    FiqDisable,
    /// T, bit 5
    State,
}

impl Flag {
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Sign => 31,
            Self::Zero => 30,
            Self::Carry => 29,
            Self::Overflow => 28,
            Self::StickyOverflow => 27,
            Self::IrqDisable => 7,
            Self::FiqDisable => 6,
            Self::State => 5,
        }
    }
}

/// Bits 26-8, never written by this core.
pub const RESERVED_MASK: u32 = 0x07FF_FF00;

/// N, Z, C, V and Q.
pub const FLAGS_MASK: u32 = 0xF800_0000;

/// I, F, T and the mode field.
pub const CONTROL_MASK: u32 = 0x0000_00FF;

const MODE_MASK: u32 = 0b1_1111;

/// Program Status Register (CPSR or SPSR).
///
/// Wraps the raw `u32` and exposes typed accessors for each field. The same
/// type is used for the current register and for the saved copies.
///
/// # Example
///
/// ```
/// use emu::cpu::psr::{Flag, Psr};
///
/// let mut cpsr = Psr::default();
///
/// cpsr.set_flag(Flag::Zero, true);
/// assert!(cpsr.zero_flag());
///
/// cpsr.set_carry_flag(true);
/// assert!(cpsr.flag(Flag::Carry));
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn can_execute(self, cond: Condition) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, NV, PL, VC, VS};
        match cond {
            EQ => self.zero_flag(),
            NE => !self.zero_flag(),
            CS => self.carry_flag(),
            CC => !self.carry_flag(),
            MI => self.sign_flag(),
            PL => !self.sign_flag(),
            VS => self.overflow_flag(),
            VC => !self.overflow_flag(),
            HI => self.carry_flag() && !self.zero_flag(),
            LS => !self.carry_flag() || self.zero_flag(),
            GE => self.sign_flag() == self.overflow_flag(),
            LT => self.sign_flag() != self.overflow_flag(),
            GT => !self.zero_flag() && (self.sign_flag() == self.overflow_flag()),
            LE => self.zero_flag() || (self.sign_flag() != self.overflow_flag()),
            AL => true,
            // Reserved on ARMv4, treated as "never".
            NV => false,
        }
    }

    #[must_use]
    pub fn flag(self, flag: Flag) -> bool {
        self.0.get_bit(flag.bit())
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        self.0.set_bit(flag.bit(), value);
    }

    /// N => Bit 31, (0=Not Signed, 1=Signed)
    #[must_use]
    pub fn sign_flag(self) -> bool {
        self.flag(Flag::Sign)
    }

    /// Z => Bit 30, (0=Not Zero, 1=Zero)
    #[must_use]
    pub fn zero_flag(self) -> bool {
        self.flag(Flag::Zero)
    }

    /// C => Bit 29, (0=Borrow/No Carry, 1=Carry/No Borrow)
    #[must_use]
    pub fn carry_flag(self) -> bool {
        self.flag(Flag::Carry)
    }

    /// V => Bit 28, (0=No Overflow, 1=Overflow)
    #[must_use]
    pub fn overflow_flag(self) -> bool {
        self.flag(Flag::Overflow)
    }

    /// I => Bit 7, (0=Enable, 1=Disable)
    #[must_use]
    pub fn irq_disable(self) -> bool {
        self.flag(Flag::IrqDisable)
    }

    /// F => Bit 6, (0=Enable, 1=Disable)
    #[must_use]
    pub fn fiq_disable(self) -> bool {
        self.flag(Flag::FiqDisable)
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.set_flag(Flag::Sign, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.set_flag(Flag::Zero, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.set_flag(Flag::Carry, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.set_flag(Flag::Overflow, value);
    }

    /// Sets N, Z, C and V from an arithmetic result.
    pub fn set_flags(&mut self, op_result: &ArithmeticOpResult) {
        self.set_carry_flag(op_result.carry);
        self.set_zero_flag(op_result.zero);
        self.set_sign_flag(op_result.sign);
        self.set_overflow_flag(op_result.overflow);
    }

    /// Sets N and Z only, as logical operations and multiplies do.
    pub fn set_logical_flags(&mut self, result: u32) {
        self.set_zero_flag(result == 0);
        self.set_sign_flag(result.get_bit(31));
    }

    pub fn set_irq_disable(&mut self, value: bool) {
        self.set_flag(Flag::IrqDisable, value);
    }

    pub fn set_fiq_disable(&mut self, value: bool) {
        self.set_flag(Flag::FiqDisable, value);
    }

    /// M4-M0 => Bits 4-0, `Err` when the bits hold no valid encoding.
    pub fn try_mode(self) -> Result<Mode, String> {
        Mode::try_from(self.0 & MODE_MASK)
    }

    /// M4-M0 => Bits 4-0
    ///
    /// A freshly zeroed PSR holds no valid mode; such bits are read as User so
    /// that register banking keeps working until the first mode switch.
    #[must_use]
    pub fn mode(self) -> Mode {
        self.try_mode().unwrap_or_else(|_| {
            tracing::debug!(
                "invalid mode bits 0b{:05b} in PSR=0x{:08X}, reading as User",
                self.0 & MODE_MASK,
                self.0
            );
            Mode::User
        })
    }

    /// Raw mode field assignment. Banking is not touched here.
    pub const fn set_mode(&mut self, m: Mode) {
        self.0 = (self.0 & !MODE_MASK) | m as u32;
    }

    #[must_use]
    pub fn cpu_state(self) -> CpuState {
        self.flag(Flag::State).into()
    }

    /// Changing the state without realigning PC is the caller's responsibility.
    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.set_flag(Flag::State, state.into());
    }

    /// Replaces the bits selected by `mask`, always leaving the reserved bits alone.
    pub const fn write_masked(&mut self, value: u32, mask: u32) {
        let mask = mask & !RESERVED_MASK;
        self.0 = (self.0 & !mask) | (value & mask);
    }
}

impl From<Mode> for Psr {
    fn from(m: Mode) -> Self {
        let mut s = Self(0);

        s.set_mode(m);

        s
    }
}

impl From<Psr> for u32 {
    fn from(p: Psr) -> Self {
        p.0
    }
}

impl std::fmt::Display for Psr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{}{} {}{}{} {}",
            flag(self.sign_flag(), 'N'),
            flag(self.zero_flag(), 'Z'),
            flag(self.carry_flag(), 'C'),
            flag(self.overflow_flag(), 'V'),
            flag(self.flag(Flag::StickyOverflow), 'Q'),
            flag(self.irq_disable(), 'I'),
            flag(self.fiq_disable(), 'F'),
            flag(self.flag(Flag::State), 'T'),
            self.mode(),
        )
    }
}

/// The CPU execution state (ARM or Thumb).
///
/// Controlled by the T bit (bit 5) in CPSR. Switched via `BX Rn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Thumb: 16-bit instructions. See `thumb` module.
    Thumb,
    /// ARM: 32-bit instructions. See `arm` module.
    Arm,
}

impl CpuState {
    /// Width in bytes of one instruction in this state.
    #[must_use]
    pub const fn instruction_size(self) -> u32 {
        match self {
            Self::Arm => 4,
            Self::Thumb => 2,
        }
    }
}

impl From<CpuState> for bool {
    fn from(state: CpuState) -> Self {
        match state {
            CpuState::Arm => false,
            CpuState::Thumb => true,
        }
    }
}

impl From<bool> for CpuState {
    fn from(state: bool) -> Self {
        if state { Self::Thumb } else { Self::Arm }
    }
}

/// The CPSR together with the five saved copies.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRegisters {
    pub cpsr: Psr,
    spsr: [Option<Psr>; 5],
}

impl StatusRegisters {
    fn slot(mode: Mode) -> usize {
        mode.spsr_slot()
            .unwrap_or_else(|| panic!("Mode {mode:?} has no SPSR: it cannot be saved or read"))
    }

    /// Copies CPSR verbatim into `SPSR_<mode>`.
    ///
    /// # Panics
    ///
    /// When `mode` is User or System.
    pub fn save_to_spsr(&mut self, mode: Mode) {
        self.spsr[Self::slot(mode)] = Some(self.cpsr);
    }

    /// Copies `SPSR_<mode>` verbatim into CPSR. Register banking is not touched.
    ///
    /// # Panics
    ///
    /// When `mode` has no SPSR or its SPSR was never written.
    pub fn restore_from_spsr(&mut self, mode: Mode) {
        self.cpsr = self.spsr(mode);
    }

    /// # Panics
    ///
    /// When `mode` has no SPSR or its SPSR was never written.
    #[must_use]
    pub fn spsr(&self, mode: Mode) -> Psr {
        self.spsr[Self::slot(mode)]
            .unwrap_or_else(|| panic!("SPSR_{mode} read before any exception entry into {mode:?}"))
    }

    /// Like [`Self::spsr`] but reports an undefined slot as `None`.
    #[must_use]
    pub fn try_spsr(&self, mode: Mode) -> Option<Psr> {
        mode.spsr_slot().and_then(|slot| self.spsr[slot])
    }

    /// # Panics
    ///
    /// When `mode` is User or System.
    pub fn set_spsr(&mut self, mode: Mode, psr: Psr) {
        self.spsr[Self::slot(mode)] = Some(psr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_flag_maps_to_its_own_bit() {
        for flag in [
            Flag::Sign,
            Flag::Zero,
            Flag::Carry,
            Flag::Overflow,
            Flag::StickyOverflow,
            Flag::IrqDisable,
            Flag::FiqDisable,
            Flag::State,
        ] {
            let mut psr = Psr::default();
            psr.set_flag(flag, true);
            assert_eq!(u32::from(psr), 1 << flag.bit());
            assert!(psr.flag(flag));
            psr.set_flag(flag, false);
            assert_eq!(u32::from(psr), 0);
        }
    }

    #[test]
    fn check_overflow_flag() {
        let cpsr = Psr(0b0001_0000_0000_0000_0000_0000_0000_0000);
        assert!(cpsr.overflow_flag());
    }

    #[test]
    fn set_mode_only_touches_the_mode_field() {
        let mut cpsr = Psr(0xF000_00E0);
        cpsr.set_mode(Mode::Abort);
        assert_eq!(u32::from(cpsr), 0xF000_00F7);
        assert_eq!(cpsr.mode(), Mode::Abort);

        cpsr.set_mode(Mode::User);
        assert_eq!(u32::from(cpsr), 0xF000_00F0);
    }

    #[test]
    fn zeroed_psr_reads_as_user() {
        let cpsr = Psr::default();
        assert!(cpsr.try_mode().is_err());
        assert_eq!(cpsr.mode(), Mode::User);
    }

    #[test]
    fn cpu_state_follows_the_t_bit() {
        let mut cpsr = Psr::from(Mode::System);
        assert_eq!(cpsr.cpu_state(), CpuState::Arm);
        cpsr.set_cpu_state(CpuState::Thumb);
        assert_eq!(u32::from(cpsr), 0b11_1111);
        assert_eq!(cpsr.cpu_state(), CpuState::Thumb);
    }

    #[test]
    fn masked_writes_never_reach_reserved_bits() {
        let mut cpsr = Psr(0x0000_0013);
        cpsr.write_masked(0xFFFF_FFFF, 0xFFFF_FFFF);
        assert_eq!(u32::from(cpsr), 0xF800_00FF);

        let mut cpsr = Psr(0x0000_0013);
        cpsr.write_masked(0xA000_00D0, FLAGS_MASK);
        assert_eq!(u32::from(cpsr), 0xA000_0013);
    }

    #[test]
    fn conditions() {
        let mut cpsr = Psr::default();
        assert!(cpsr.can_execute(Condition::AL));
        assert!(!cpsr.can_execute(Condition::NV));
        assert!(cpsr.can_execute(Condition::NE));
        assert!(cpsr.can_execute(Condition::GE));

        cpsr.set_zero_flag(true);
        assert!(cpsr.can_execute(Condition::EQ));
        assert!(cpsr.can_execute(Condition::LS));
        assert!(cpsr.can_execute(Condition::LE));
        assert!(!cpsr.can_execute(Condition::GT));

        cpsr.set_zero_flag(false);
        cpsr.set_carry_flag(true);
        assert!(cpsr.can_execute(Condition::HI));
        assert!(cpsr.can_execute(Condition::CS));

        cpsr.set_sign_flag(true);
        assert!(cpsr.can_execute(Condition::LT));
        assert!(cpsr.can_execute(Condition::MI));
        cpsr.set_overflow_flag(true);
        assert!(cpsr.can_execute(Condition::GT));
        assert!(cpsr.can_execute(Condition::VS));
    }

    #[test]
    fn spsr_save_and_restore() {
        let mut psrs = StatusRegisters::default();
        psrs.cpsr = Psr(0x6000_0010);
        psrs.save_to_spsr(Mode::Irq);
        psrs.cpsr = Psr(0x0000_0092);

        assert_eq!(psrs.spsr(Mode::Irq), Psr(0x6000_0010));
        assert_eq!(psrs.try_spsr(Mode::Fiq), None);

        psrs.restore_from_spsr(Mode::Irq);
        assert_eq!(psrs.cpsr, Psr(0x6000_0010));
    }

    #[test]
    #[should_panic(expected = "read before any exception entry")]
    fn reading_an_undefined_spsr_is_fatal() {
        let psrs = StatusRegisters::default();
        let _ = psrs.spsr(Mode::Abort);
    }

    #[test]
    #[should_panic(expected = "has no SPSR")]
    fn user_mode_has_no_spsr_slot() {
        let mut psrs = StatusRegisters::default();
        psrs.save_to_spsr(Mode::User);
    }
}
