#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
mod alu;
pub mod arm;

#[allow(clippy::cast_lossless)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::module_name_repetitions)]
#[allow(clippy::missing_panics_doc)]
pub mod arm7tdmi;
pub mod condition;

#[allow(clippy::missing_errors_doc)]
pub mod coprocessor;
pub mod cpu_modes;
pub mod exception;

#[allow(clippy::cast_possible_truncation)]
pub mod flags;
pub mod psr;
pub mod register_bank;
pub mod registers;
pub mod thumb;
