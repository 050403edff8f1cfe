//! # Banked Registers for Exception Modes
//!
//! Storage for the register copies that are not visible in the current mode.
//! See [`cpu_modes`](super::cpu_modes) for the banking table.
//!
//! Each exception mode has its own R13 (SP) and R14 (LR). FIQ additionally
//! banks R8-R12 for faster interrupt handling. On a mode switch the visible
//! copies are stored here and the copies of the new mode are loaded; nothing
//! is ever cleared, so every inactive copy keeps its last value.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::{Bank, Mode};
use crate::cpu::registers::{REG_LR, REG_SP, Registers};

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    /// R8-R12 for every mode except FIQ, held here while in FIQ.
    user_high: [u32; 5],

    /// R8-R12 for FIQ, held here while in any other mode.
    fiq_high: [u32; 5],

    /// R13 and R14 for each bank, indexed by [`Bank::index`].
    sp_lr: [[u32; 2]; Bank::COUNT],
}

impl RegisterBank {
    /// Saves the visible copies belonging to `mode`.
    pub fn store(&mut self, mode: Mode, registers: &Registers) {
        let high = if mode == Mode::Fiq {
            &mut self.fiq_high
        } else {
            &mut self.user_high
        };
        for (i, slot) in high.iter_mut().enumerate() {
            *slot = registers.register_at(8 + i);
        }

        self.sp_lr[mode.bank().index()] = [
            registers.register_at(REG_SP),
            registers.register_at(REG_LR),
        ];
    }

    /// Makes the copies belonging to `mode` visible.
    pub fn load(&self, mode: Mode, registers: &mut Registers) {
        let high = if mode == Mode::Fiq {
            &self.fiq_high
        } else {
            &self.user_high
        };
        for (i, value) in high.iter().enumerate() {
            registers.set_register_at(8 + i, *value);
        }

        let [sp, lr] = self.sp_lr[mode.bank().index()];
        registers.set_register_at(REG_SP, sp);
        registers.set_register_at(REG_LR, lr);
    }

    /// Stores the copies of `from` and loads the ones of `to`.
    pub fn switch(&mut self, from: Mode, to: Mode, registers: &mut Registers) {
        self.store(from, registers);
        self.load(to, registers);
    }

    /// Value of `reg` as seen by `mode`, assuming `mode` is not the active one.
    ///
    /// # Panics
    ///
    /// When `reg` is not a register banked by `mode`.
    #[must_use]
    pub fn inactive_register(&self, mode: Mode, reg: usize) -> u32 {
        match reg {
            8..=12 if mode == Mode::Fiq => self.fiq_high[reg - 8],
            8..=12 => self.user_high[reg - 8],
            REG_SP => self.sp_lr[mode.bank().index()][0],
            REG_LR => self.sp_lr[mode.bank().index()][1],
            _ => panic!("R{reg} is not banked"),
        }
    }

    /// # Panics
    ///
    /// When `reg` is not a register banked by `mode`.
    pub fn set_inactive_register(&mut self, mode: Mode, reg: usize, value: u32) {
        match reg {
            8..=12 if mode == Mode::Fiq => self.fiq_high[reg - 8] = value,
            8..=12 => self.user_high[reg - 8] = value,
            REG_SP => self.sp_lr[mode.bank().index()][0] = value,
            REG_LR => self.sp_lr[mode.bank().index()][1] = value,
            _ => panic!("R{reg} is not banked"),
        }
    }
}
