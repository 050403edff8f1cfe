//! # Thumb State
//!
//! The 16-bit instruction set. [`instruction`] decodes a halfword into one of
//! the 19 formats, [`operations`] runs it, mostly by handing the expanded
//! operands to the ARM implementation.

pub mod alu_instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod operations;
