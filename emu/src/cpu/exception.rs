//! # Exceptions
//!
//! Every way the core can be diverted from sequential execution. Entering an
//! exception always switches to ARM state in a privileged mode and jumps to a
//! fixed slot of the vector table.
//!
//! | Exception          | Mode | Vector | Priority | F set |
//! |--------------------|------|--------|----------|-------|
//! | Reset              | svc  | 0x00   | 1        | yes   |
//! | Undefined          | und  | 0x04   | 7        | no    |
//! | Software interrupt | svc  | 0x08   | 6        | no    |
//! | Prefetch abort     | abt  | 0x0C   | 5        | no    |
//! | Data abort         | abt  | 0x10   | 2        | no    |
//! | Address exceeds 26 | svc  | 0x14   | 6        | no    |
//! | IRQ                | irq  | 0x18   | 4        | no    |
//! | FIQ                | fiq  | 0x1C   | 3        | yes   |
//!
//! A lower number wins. The 26-bit address exception is a leftover of the
//! 26-bit architectures and is never raised by the decoder itself; it shares
//! the software interrupt's rank, so it is served before Undefined. The two
//! can never be pending together since both come from the executing
//! instruction.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::CpuState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exception {
    Reset,
    UndefinedInstruction,
    SoftwareInterrupt,
    PrefetchAbort,
    DataAbort,
    AddressExceeds26Bit,
    NormalInterrupt,
    FastInterrupt,
}

impl Exception {
    /// Rank used to arbitrate between simultaneous requests, 1 is the highest.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Reset => 1,
            Self::DataAbort => 2,
            Self::FastInterrupt => 3,
            Self::NormalInterrupt => 4,
            Self::PrefetchAbort => 5,
            Self::SoftwareInterrupt | Self::AddressExceeds26Bit => 6,
            Self::UndefinedInstruction => 7,
        }
    }

    /// Offset of the handler slot from the exception base.
    #[must_use]
    pub const fn vector_offset(self) -> u32 {
        match self {
            Self::Reset => 0x00,
            Self::UndefinedInstruction => 0x04,
            Self::SoftwareInterrupt => 0x08,
            Self::PrefetchAbort => 0x0C,
            Self::DataAbort => 0x10,
            Self::AddressExceeds26Bit => 0x14,
            Self::NormalInterrupt => 0x18,
            Self::FastInterrupt => 0x1C,
        }
    }

    #[must_use]
    pub const fn target_mode(self) -> Mode {
        match self {
            Self::Reset | Self::SoftwareInterrupt | Self::AddressExceeds26Bit => Mode::Supervisor,
            Self::UndefinedInstruction => Mode::Undefined,
            Self::PrefetchAbort | Self::DataAbort => Mode::Abort,
            Self::NormalInterrupt => Mode::Irq,
            Self::FastInterrupt => Mode::Fiq,
        }
    }

    /// IRQs are masked by every entry, FIQs only by these two.
    #[must_use]
    pub const fn disables_fiq(self) -> bool {
        matches!(self, Self::Reset | Self::FastInterrupt)
    }

    /// What gets added to the PC at the moment of entry to build R14 of the
    /// target mode.
    ///
    /// The PC is the address of the instruction that caused the exception, or
    /// of the next instruction to execute for interrupts.
    #[must_use]
    pub const fn return_offset(self, state: CpuState) -> u32 {
        match self {
            Self::Reset => 0,
            Self::UndefinedInstruction | Self::SoftwareInterrupt => state.instruction_size(),
            Self::PrefetchAbort | Self::NormalInterrupt | Self::FastInterrupt => 4,
            Self::DataAbort | Self::AddressExceeds26Bit => 8,
        }
    }
}

impl std::fmt::Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reset => f.write_str("Reset"),
            Self::UndefinedInstruction => f.write_str("Undefined instruction"),
            Self::SoftwareInterrupt => f.write_str("Software interrupt"),
            Self::PrefetchAbort => f.write_str("Prefetch abort"),
            Self::DataAbort => f.write_str("Data abort"),
            Self::AddressExceeds26Bit => f.write_str("Address exceeds 26 bit"),
            Self::NormalInterrupt => f.write_str("IRQ"),
            Self::FastInterrupt => f.write_str("FIQ"),
        }
    }
}

/// Picks the request that has to be served first.
#[must_use]
pub fn highest_priority(requests: impl IntoIterator<Item = Exception>) -> Option<Exception> {
    requests.into_iter().min_by_key(|e| e.priority())
}
