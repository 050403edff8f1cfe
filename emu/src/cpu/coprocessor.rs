//! # Coprocessor Interface
//!
//! The core decodes CDP, LDC/STC and MCR/MRC but leaves their meaning to an
//! attached [`Coprocessor`]. Without one, or when the attached one does not
//! answer to the requested number, these instructions take the undefined
//! instruction trap so that software can emulate them.
//!
//! ```text
//! CDP  cond 1110 op1  CRn CRd cp# op2 0 CRm
//! MCR  cond 1110 op1 0 CRn Rd cp# op2 1 CRm
//! MRC  cond 1110 op1 1 CRn Rd cp# op2 1 CRm
//! LDC  cond 110P UNW1 Rn  CRd cp# offset8
//! STC  cond 110P UNW0 Rn  CRd cp# offset8
//! ```

use serde::{Deserialize, Serialize};

use crate::memory::{Memory, MemoryFault};

/// Fields of a coprocessor data operation (CDP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdpOperands {
    pub cp_opcode: u32,
    pub crn: u32,
    pub crd: u32,
    pub cp_number: u32,
    pub cp_info: u32,
    pub crm: u32,
}

/// Fields of a register transfer between the CPU and a coprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterTransferOperands {
    pub cp_opcode: u32,
    pub crn: u32,
    pub cp_number: u32,
    pub cp_info: u32,
    pub crm: u32,
}

/// ARM register to coprocessor register (MCR).
pub type McrOperands = RegisterTransferOperands;

/// Coprocessor register to ARM register (MRC).
pub type MrcOperands = RegisterTransferOperands;

/// An LDC/STC request. `address` is the first word to transfer, already
/// offset for pre-indexed forms; base write-back stays with the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoprocessorTransfer {
    pub cp_number: u32,
    pub crd: u32,
    pub address: u32,
    /// N bit, its meaning is coprocessor specific.
    pub long: bool,
}

pub trait Coprocessor {
    /// Whether this coprocessor answers to `cp_number` (0..=15).
    fn handles(&self, cp_number: u32) -> bool;

    fn execute(&mut self, operands: CdpOperands);

    /// LDC: memory to coprocessor.
    ///
    /// # Errors
    ///
    /// A fault from `memory` is raised as a data abort by the CPU.
    fn load(
        &mut self,
        transfer: CoprocessorTransfer,
        memory: &mut dyn Memory,
    ) -> Result<(), MemoryFault>;

    /// STC: coprocessor to memory.
    ///
    /// # Errors
    ///
    /// A fault from `memory` is raised as a data abort by the CPU.
    fn store(
        &mut self,
        transfer: CoprocessorTransfer,
        memory: &mut dyn Memory,
    ) -> Result<(), MemoryFault>;

    fn move_to_coprocessor(&mut self, operands: McrOperands, value: u32);

    fn move_from_coprocessor(&mut self, operands: MrcOperands) -> u32;
}
