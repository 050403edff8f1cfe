//! # ARM Instruction Set (32-bit)
//!
//! Every instruction carries a condition field and is skipped, without side
//! effects, when the CPSR flags do not satisfy it.
//!
//! ## Format
//!
//! ```text
//! 31-28   27-25   24-0
//! [Cond] [Format] [Instruction-specific]
//! ```
//!
//! - **Condition (bits 28-31)**: See [`condition`](super::condition)
//! - **Format (bits 25-27)**: Determines instruction category
//!
//! ## Instruction Categories
//!
//! | Bits 27-25 | Category                | Examples                    |
//! |------------|-------------------------|-----------------------------|
//! | 00x        | Data Processing / PSR   | AND, ADD, CMP, MOV, MRS     |
//! | 000        | Multiply/Swap/BX/Half   | MUL, UMULL, SWP, BX, LDRH   |
//! | 01x        | Single Data Transfer    | LDR, STR                    |
//! | 100        | Block Data Transfer     | LDM, STM                    |
//! | 101        | Branch                  | B, BL                       |
//! | 110        | Coprocessor Transfer    | LDC, STC                    |
//! | 1110       | Coprocessor Operation   | CDP, MCR, MRC               |
//! | 1111       | Software Interrupt      | SWI                         |
//!
//! ## Barrel Shifter
//!
//! Operand2 can be shifted at no extra cost: LSL, LSR, ASR, ROR, RRX.
//!
//! ## Submodules
//!
//! - [`instructions`] - Decoding (`From<u32>`) and disassembly
//! - [`operations`] - Execution
//! - [`alu_instruction`] - ALU opcodes, second operand and PSR transfer fields

#[allow(clippy::cast_possible_truncation)]
pub mod alu_instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::similar_names)]
pub mod instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::similar_names)]
#[allow(clippy::too_many_arguments)]
pub mod operations;
