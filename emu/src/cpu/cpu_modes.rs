//! # CPU Operating Modes
//!
//! The ARM7TDMI has seven operating modes, encoded in CPSR bits 4-0.
//!
//! | Mode       | Bits  | Banked registers        | SPSR |
//! |------------|-------|-------------------------|------|
//! | User       | 10000 | -                       | no   |
//! | FIQ        | 10001 | R8-R14                  | yes  |
//! | IRQ        | 10010 | R13-R14                 | yes  |
//! | Supervisor | 10011 | R13-R14                 | yes  |
//! | Abort      | 10111 | R13-R14                 | yes  |
//! | Undefined  | 11011 | R13-R14                 | yes  |
//! | System     | 11111 | - (shares User's)       | no   |

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Mode {
    /// The normal ARM program execution state.
    User = 0b10000,

    /// Designed to support a data transfer or channel process.
    Fiq = 0b10001,

    /// Used for general-purpose interrupt handling.
    Irq = 0b10010,

    /// Protected mode for the operating system
    Supervisor = 0b10011,

    /// Entered after a data or instruction prefetch abort.
    Abort = 0b10111,

    /// Entered when an undefined instruction is executed
    Undefined = 0b11011,

    /// A privileged user mode for the operating system.
    System = 0b11111,
}

/// Physical copy of R13/R14 selected by a mode.
///
/// User and System share the same bank.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Bank {
    User,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
}

impl Bank {
    pub const COUNT: usize = 6;

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl Mode {
    #[must_use]
    pub const fn bank(self) -> Bank {
        match self {
            Self::User | Self::System => Bank::User,
            Self::Fiq => Bank::Fiq,
            Self::Irq => Bank::Irq,
            Self::Supervisor => Bank::Supervisor,
            Self::Abort => Bank::Abort,
            Self::Undefined => Bank::Undefined,
        }
    }

    /// Index of the SPSR slot owned by this mode, `None` for User and System.
    #[must_use]
    pub const fn spsr_slot(self) -> Option<usize> {
        match self {
            Self::User | Self::System => None,
            Self::Fiq => Some(0),
            Self::Supervisor => Some(1),
            Self::Abort => Some(2),
            Self::Irq => Some(3),
            Self::Undefined => Some(4),
        }
    }

    #[must_use]
    pub const fn has_spsr(self) -> bool {
        self.spsr_slot().is_some()
    }

    /// Every mode except User can freely rewrite the control field of the CPSR.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(format!("Unexpected value for Mode: 0b{n:05b}")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("usr"),
            Self::Fiq => f.write_str("fiq"),
            Self::Irq => f.write_str("irq"),
            Self::Supervisor => f.write_str("svc"),
            Self::Abort => f.write_str("abt"),
            Self::Undefined => f.write_str("und"),
            Self::System => f.write_str("sys"),
        }
    }
}
