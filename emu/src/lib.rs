//! ARM7TDMI instruction-processing core.
//!
//! The CPU lives in [`cpu::arm7tdmi`] and talks to the outside world through
//! the [`memory::Memory`] trait and an optional [`cpu::coprocessor::Coprocessor`].

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
mod bitwise;

pub mod cpu;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::missing_errors_doc)]
pub mod memory;
