//! # ARM7TDMI CPU Core
//!
//! [`Arm7tdmi`] owns the whole architectural state and its memory. Each call
//! to [`Arm7tdmi::step`] serves at most one pending interrupt and then runs a
//! single instruction:
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌──────────┐   ┌─────────┐
//! │ IRQ/FIQ     │──►│  Fetch   │──►│  Decode  │──►│ Execute │
//! │ arbitration │   │ (Memory) │   │ ARM/THUMB│   │         │
//! └─────────────┘   └──────────┘   └──────────┘   └─────────┘
//! ```
//!
//! ## Program Counter
//!
//! R15 holds the address of the instruction being executed. Reading R15 as an
//! operand yields that address plus 8 in ARM state and plus 4 in Thumb state,
//! mirroring the three-stage pipeline of the real core. When an instruction
//! writes R15 (or an exception is entered) the pipeline is flushed and the
//! automatic advance to the next instruction is skipped.
//!
//! ## Faults
//!
//! A [`MemoryFault`] never reaches the host: a failed fetch raises a prefetch
//! abort, any other failed access raises a data abort.

use serde::{Deserialize, Serialize};

use crate::cpu::coprocessor::Coprocessor;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::exception::{Exception, highest_priority};
use crate::cpu::psr::{CpuState, Psr, StatusRegisters};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, Registers};
use crate::memory::{Memory, MemoryFault};

/// Hardware configuration fixed at construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuConfig {
    /// Address of the vector table, 0 or [`CpuConfig::HIGH_VECTORS`].
    pub exception_base: u32,
}

impl CpuConfig {
    pub const HIGH_VECTORS: u32 = 0xFFFF_0000;

    #[must_use]
    pub const fn high_vectors() -> Self {
        Self {
            exception_base: Self::HIGH_VECTORS,
        }
    }
}

/// Everything needed to resume execution later, memory excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub registers: Registers,
    pub register_bank: RegisterBank,
    pub status: StatusRegisters,
    pub cycles: u64,
    pub irq_line: bool,
    pub fiq_line: bool,
}

pub struct Arm7tdmi<M: Memory> {
    pub(crate) memory: M,

    pub(crate) psrs: StatusRegisters,
    pub(crate) registers: Registers,
    pub(crate) register_bank: RegisterBank,

    cycles: u64,
    irq_line: bool,
    fiq_line: bool,

    /// Set when the running instruction wrote R15 or raised an exception.
    pipeline_flushed: bool,

    pub(crate) coprocessor: Option<Box<dyn Coprocessor>>,
    config: CpuConfig,
}

impl<M: Memory> std::fmt::Debug for Arm7tdmi<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arm7tdmi")
            .field("registers", &self.registers)
            .field("cpsr", &self.psrs.cpsr)
            .field("cycles", &self.cycles)
            .field("irq_line", &self.irq_line)
            .field("fiq_line", &self.fiq_line)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<M: Memory> Arm7tdmi<M> {
    #[must_use]
    pub fn new(memory: M) -> Self {
        Self::with_config(memory, CpuConfig::default())
    }

    /// Zeroes every register, then enters the Reset exception.
    #[must_use]
    pub fn with_config(memory: M, config: CpuConfig) -> Self {
        let mut cpu = Self {
            memory,
            psrs: StatusRegisters::default(),
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            cycles: 0,
            irq_line: false,
            fiq_line: false,
            pipeline_flushed: false,
            coprocessor: None,
            config,
        };
        cpu.arise_exception(Exception::Reset);

        cpu
    }

    #[must_use]
    pub const fn config(&self) -> CpuConfig {
        self.config
    }

    #[must_use]
    pub const fn memory(&self) -> &M {
        &self.memory
    }

    pub const fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn attach_coprocessor(&mut self, coprocessor: Box<dyn Coprocessor>) {
        self.coprocessor = Some(coprocessor);
    }

    pub fn detach_coprocessor(&mut self) -> Option<Box<dyn Coprocessor>> {
        self.coprocessor.take()
    }

    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Address of the next instruction to execute.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.registers.program_counter()
    }

    /// Register `reg` as seen by the current mode. R15 is returned without
    /// the pipeline offset.
    ///
    /// # Panics
    ///
    /// When `reg` is greater than 15.
    #[must_use]
    pub fn register_at(&self, reg: usize) -> u32 {
        self.registers.register_at(reg)
    }

    /// Raw write of a visible register. Writing R15 redirects execution.
    ///
    /// # Panics
    ///
    /// When `reg` is greater than 15.
    pub fn set_register_at(&mut self, reg: usize, value: u32) {
        if reg == REG_PROGRAM_COUNTER {
            self.pipeline_flushed = true;
        }
        self.registers.set_register_at(reg, value);
    }

    /// Register `reg` as seen by `mode`, whether `mode` is the current one or not.
    ///
    /// # Panics
    ///
    /// When `reg` is greater than 15.
    #[must_use]
    pub fn banked_register(&self, mode: Mode, reg: usize) -> u32 {
        if self.is_visible(mode, reg) {
            self.registers.register_at(reg)
        } else {
            self.register_bank.inactive_register(mode, reg)
        }
    }

    /// # Panics
    ///
    /// When `reg` is greater than 15.
    pub fn set_banked_register(&mut self, mode: Mode, reg: usize, value: u32) {
        if self.is_visible(mode, reg) {
            self.set_register_at(reg, value);
        } else {
            self.register_bank.set_inactive_register(mode, reg, value);
        }
    }

    fn is_visible(&self, mode: Mode, reg: usize) -> bool {
        let current = self.psrs.cpsr.mode();
        match reg {
            0..=7 | REG_PROGRAM_COUNTER => true,
            8..=12 => (mode == Mode::Fiq) == (current == Mode::Fiq),
            13 | 14 => mode.bank() == current.bank(),
            _ => panic!("Invalid register index: {reg} (0x{reg:X})"),
        }
    }

    #[must_use]
    pub const fn cpsr(&self) -> Psr {
        self.psrs.cpsr
    }

    /// Replaces the CPSR. A change of the mode field swaps the banked registers.
    pub fn set_cpsr(&mut self, psr: Psr) {
        let old = self.psrs.cpsr.mode();
        let new = psr.mode();
        if old != new {
            self.register_bank.switch(old, new, &mut self.registers);
        }
        self.psrs.cpsr = psr;
    }

    /// # Panics
    ///
    /// When `mode` has no SPSR or its SPSR was never written.
    #[must_use]
    pub fn spsr(&self, mode: Mode) -> Psr {
        self.psrs.spsr(mode)
    }

    /// # Panics
    ///
    /// When `mode` is User or System.
    pub fn set_spsr(&mut self, mode: Mode, psr: Psr) {
        self.psrs.set_spsr(mode, psr);
    }

    #[must_use]
    pub const fn status_registers(&self) -> &StatusRegisters {
        &self.psrs
    }

    /// Level of the IRQ input, sampled before every instruction.
    pub const fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Level of the FIQ input, sampled before every instruction.
    pub const fn set_fiq_line(&mut self, asserted: bool) {
        self.fiq_line = asserted;
    }

    pub fn reset(&mut self) {
        self.arise_exception(Exception::Reset);
    }

    /// Enters IRQ mode unless IRQs are disabled. Returns whether it did.
    pub fn irq(&mut self) -> bool {
        if self.psrs.cpsr.irq_disable() {
            return false;
        }
        self.arise_exception(Exception::NormalInterrupt);
        true
    }

    /// Enters FIQ mode unless FIQs are disabled. Returns whether it did.
    pub fn fiq(&mut self) -> bool {
        if self.psrs.cpsr.fiq_disable() {
            return false;
        }
        self.arise_exception(Exception::FastInterrupt);
        true
    }

    /// External abort signal, entered as a data abort.
    pub fn abort(&mut self) {
        self.arise_exception(Exception::DataAbort);
    }

    /// Performs the entry sequence of `exception`.
    ///
    /// The return address stored in R14 of the target mode is computed from
    /// the current PC, which is expected to hold the address of the faulting
    /// instruction (or of the next one for interrupts).
    pub fn arise_exception(&mut self, exception: Exception) {
        let state = self.psrs.cpsr.cpu_state();
        let return_address = self
            .registers
            .program_counter()
            .wrapping_add(exception.return_offset(state));
        let target = exception.target_mode();

        self.psrs.save_to_spsr(target);
        self.change_mode(target);

        self.psrs.cpsr.set_irq_disable(true);
        if exception.disables_fiq() {
            self.psrs.cpsr.set_fiq_disable(true);
        }
        self.psrs.cpsr.set_cpu_state(CpuState::Arm);

        self.registers.set_register_at(REG_LR, return_address);
        let vector = self
            .config
            .exception_base
            .wrapping_add(exception.vector_offset());
        self.registers.set_program_counter(vector);
        self.pipeline_flushed = true;

        tracing::debug!(
            "{exception} entered from 0x{:08X}, LR_{target}=0x{return_address:08X}, PC=0x{vector:08X}",
            return_address.wrapping_sub(exception.return_offset(state))
        );
    }

    /// Switches mode and banked registers. SPSRs and PC are left alone.
    pub fn change_mode(&mut self, mode: Mode) {
        let mut psr = self.psrs.cpsr;
        psr.set_mode(mode);
        self.set_cpsr(psr);
    }

    /// Sets the T bit only, PC is not realigned.
    pub fn force_state_change(&mut self, state: CpuState) {
        self.psrs.cpsr.set_cpu_state(state);
    }

    /// CPSR ← SPSR of the current mode, banked registers follow the restored mode.
    ///
    /// # Panics
    ///
    /// When the current mode has no SPSR or its SPSR was never written.
    pub fn return_from_exception(&mut self) {
        let old = self.psrs.cpsr.mode();
        self.psrs.restore_from_spsr(old);

        let new = self.psrs.cpsr.mode();
        if old != new {
            self.register_bank.switch(old, new, &mut self.registers);
        }
    }

    /// Like [`Self::return_from_exception`] for instructions that request it
    /// in a mode without a usable SPSR. The CPSR is kept in that case.
    pub(crate) fn restore_cpsr_from_spsr(&mut self) {
        let mode = self.psrs.cpsr.mode();
        match self.psrs.try_spsr(mode) {
            Some(spsr) => self.set_cpsr(spsr),
            None => tracing::warn!("CPSR restore requested in {mode:?} mode without SPSR, ignored"),
        }
    }

    /// The interrupt to serve before the next instruction, if any.
    #[must_use]
    pub fn pending_interrupt(&self) -> Option<Exception> {
        let cpsr = self.psrs.cpsr;
        let fiq = (self.fiq_line && !cpsr.fiq_disable()).then_some(Exception::FastInterrupt);
        let irq = (self.irq_line && !cpsr.irq_disable()).then_some(Exception::NormalInterrupt);

        highest_priority(fiq.into_iter().chain(irq))
    }

    /// Serves a pending interrupt, then runs one instruction.
    pub fn step(&mut self) {
        if let Some(interrupt) = self.pending_interrupt() {
            self.arise_exception(interrupt);
        }

        self.pipeline_flushed = false;
        let pc = self.registers.program_counter();
        let state = self.psrs.cpsr.cpu_state();

        match state {
            CpuState::Arm => match self.memory.read_word(pc & !0b11) {
                Ok(op_code) => self.execute_arm(op_code.into()),
                Err(fault) => self.prefetch_abort(fault),
            },
            CpuState::Thumb => match self.memory.read_half_word(pc & !0b1) {
                Ok(op_code) => self.execute_thumb(op_code.into()),
                Err(fault) => self.prefetch_abort(fault),
            },
        }

        if !self.pipeline_flushed {
            self.registers
                .advance_program_counter(state.instruction_size());
        }
        self.cycles += 1;
    }

    /// Runs `steps` instructions.
    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step();
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            registers: self.registers.clone(),
            register_bank: self.register_bank.clone(),
            status: self.psrs.clone(),
            cycles: self.cycles,
            irq_line: self.irq_line,
            fiq_line: self.fiq_line,
        }
    }

    pub fn restore(&mut self, snapshot: CpuSnapshot) {
        self.registers = snapshot.registers;
        self.register_bank = snapshot.register_bank;
        self.psrs = snapshot.status;
        self.cycles = snapshot.cycles;
        self.irq_line = snapshot.irq_line;
        self.fiq_line = snapshot.fiq_line;
    }

    fn prefetch_abort(&mut self, fault: MemoryFault) {
        tracing::warn!("instruction fetch failed ({fault}), raising prefetch abort");
        self.arise_exception(Exception::PrefetchAbort);
    }

    pub(crate) fn data_abort(&mut self, fault: MemoryFault) {
        tracing::warn!("data access failed ({fault}), raising data abort");
        self.arise_exception(Exception::DataAbort);
    }

    /// Value of `reg` as an instruction operand: R15 reads ahead of the
    /// executing instruction by two instructions.
    pub(crate) fn read_operand(&self, reg: u32) -> u32 {
        let value = self.registers.register_at(reg as usize);
        if reg as usize == REG_PROGRAM_COUNTER {
            value.wrapping_add(2 * self.psrs.cpsr.cpu_state().instruction_size())
        } else {
            value
        }
    }

    /// Register write from an instruction. Writing R15 branches.
    pub(crate) fn write_register(&mut self, reg: u32, value: u32) {
        if reg as usize == REG_PROGRAM_COUNTER {
            self.branch_to(value);
        } else {
            self.registers.set_register_at(reg as usize, value);
        }
    }

    /// Jumps to `address`, aligned for the current state.
    pub(crate) fn branch_to(&mut self, address: u32) {
        let aligned = match self.psrs.cpsr.cpu_state() {
            CpuState::Arm => address & !0b11,
            CpuState::Thumb => address & !0b1,
        };
        self.registers.set_program_counter(aligned);
        self.flush_pipeline();
    }

    pub(crate) const fn flush_pipeline(&mut self) {
        self.pipeline_flushed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::psr::Flag;
    use crate::cpu::registers::REG_SP;
    use crate::memory::FlatMemory;
    use pretty_assertions::assert_eq;

    fn cpu() -> Arm7tdmi<FlatMemory> {
        Arm7tdmi::new(FlatMemory::new(0x1000))
    }

    fn cpu_in(mode: Mode) -> Arm7tdmi<FlatMemory> {
        let mut cpu = cpu();
        cpu.set_cpsr(Psr::from(mode));
        cpu
    }

    #[test]
    fn construction_performs_reset() {
        let cpu = cpu();

        assert_eq!(cpu.cpsr().mode(), Mode::Supervisor);
        assert!(cpu.cpsr().irq_disable());
        assert!(cpu.cpsr().fiq_disable());
        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Arm);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.cycles(), 0);
        for reg in 0..15 {
            assert_eq!(cpu.register_at(reg), 0);
        }
        assert_eq!(cpu.spsr(Mode::Supervisor), Psr::default());
        assert_eq!(cpu.status_registers().try_spsr(Mode::Irq), None);
    }

    #[test]
    fn high_vectors_move_the_table() {
        let cpu = Arm7tdmi::with_config(FlatMemory::new(16), CpuConfig::high_vectors());
        assert_eq!(cpu.pc(), 0xFFFF_0000);
    }

    #[test]
    fn every_exception_enters_its_mode_and_saves_cpsr() {
        for exception in [
            Exception::Reset,
            Exception::UndefinedInstruction,
            Exception::SoftwareInterrupt,
            Exception::PrefetchAbort,
            Exception::DataAbort,
            Exception::AddressExceeds26Bit,
            Exception::NormalInterrupt,
            Exception::FastInterrupt,
        ] {
            let mut cpu = cpu_in(Mode::User);
            let before = Psr::new(0x6000_0010);
            cpu.set_cpsr(before);

            cpu.arise_exception(exception);

            let target = exception.target_mode();
            assert_eq!(cpu.cpsr().mode(), target, "{exception}");
            assert!(cpu.cpsr().irq_disable(), "{exception}");
            assert_eq!(cpu.cpsr().fiq_disable(), exception.disables_fiq(), "{exception}");
            assert_eq!(cpu.spsr(target), before, "{exception}");
            assert_eq!(cpu.pc(), exception.vector_offset(), "{exception}");
        }
    }

    #[test]
    fn swi_leaves_fiq_enabled() {
        let mut cpu = cpu_in(Mode::User);
        cpu.set_register_at(REG_PROGRAM_COUNTER, 0x100);

        cpu.arise_exception(Exception::SoftwareInterrupt);

        assert!(!cpu.cpsr().fiq_disable());
        assert_eq!(cpu.register_at(REG_LR), 0x104);
    }

    #[test]
    fn irq_from_user_mode() {
        let mut cpu = cpu();
        cpu.set_cpsr(Psr::new(0x10));
        cpu.set_register_at(REG_PROGRAM_COUNTER, 0x0000_0200);

        assert!(cpu.irq());

        assert_eq!(cpu.cpsr().mode(), Mode::Irq);
        assert!(cpu.cpsr().irq_disable());
        assert!(!cpu.cpsr().fiq_disable());
        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Arm);
        assert_eq!(cpu.banked_register(Mode::Irq, REG_LR), 0x0000_0204);
        assert_eq!(cpu.pc(), 0x18);
        assert_eq!(cpu.spsr(Mode::Irq), Psr::new(0x10));
    }

    #[test]
    fn masked_interrupts_are_not_taken() {
        let mut cpu = cpu();
        assert!(!cpu.irq());
        assert!(!cpu.fiq());
        assert_eq!(cpu.cpsr().mode(), Mode::Supervisor);
    }

    #[test]
    fn thumb_swi_returns_past_a_halfword() {
        let mut cpu = cpu_in(Mode::User);
        cpu.force_state_change(CpuState::Thumb);
        cpu.set_register_at(REG_PROGRAM_COUNTER, 0x300);

        cpu.arise_exception(Exception::SoftwareInterrupt);

        assert_eq!(cpu.register_at(REG_LR), 0x302);
        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Arm);
        assert!(cpu.spsr(Mode::Supervisor).flag(Flag::State));
    }

    #[test]
    fn data_abort_return_address() {
        let mut cpu = cpu_in(Mode::System);
        cpu.set_register_at(REG_PROGRAM_COUNTER, 0x400);
        cpu.abort();
        assert_eq!(cpu.register_at(REG_LR), 0x408);
        assert_eq!(cpu.pc(), 0x10);
    }

    #[test]
    fn banked_stack_pointers_are_isolated() {
        let mut cpu = cpu();
        cpu.set_register_at(REG_SP, 0x0300_7FE0);

        cpu.change_mode(Mode::Irq);
        assert_eq!(cpu.register_at(REG_SP), 0);
        cpu.set_register_at(REG_SP, 0x0300_7FA0);

        cpu.change_mode(Mode::Supervisor);
        assert_eq!(cpu.register_at(REG_SP), 0x0300_7FE0);
        assert_eq!(cpu.banked_register(Mode::Irq, REG_SP), 0x0300_7FA0);
        assert_eq!(cpu.banked_register(Mode::Supervisor, REG_SP), 0x0300_7FE0);
    }

    #[test]
    fn fiq_high_registers_through_the_banked_accessors() {
        let mut cpu = cpu_in(Mode::User);
        cpu.set_register_at(8, 0x88);
        cpu.set_banked_register(Mode::Fiq, 8, 0xF8);

        assert_eq!(cpu.register_at(8), 0x88);
        cpu.change_mode(Mode::Fiq);
        assert_eq!(cpu.register_at(8), 0xF8);
        assert_eq!(cpu.banked_register(Mode::User, 8), 0x88);
        assert_eq!(cpu.banked_register(Mode::Irq, 8), 0x88);
    }

    #[test]
    fn state_change_round_trip_restores_cpsr() {
        let mut cpu = cpu();
        let before = cpu.cpsr();

        cpu.force_state_change(CpuState::Thumb);
        assert_eq!(u32::from(cpu.cpsr()), u32::from(before) | 0x20);
        cpu.force_state_change(CpuState::Arm);

        assert_eq!(cpu.cpsr(), before);
    }

    #[test]
    fn return_from_exception_restores_mode_and_banks() {
        let mut cpu = cpu_in(Mode::User);
        cpu.set_register_at(REG_SP, 0x1000);
        cpu.set_register_at(REG_PROGRAM_COUNTER, 0x80);

        assert!(cpu.fiq());
        cpu.set_register_at(REG_SP, 0x2000);

        cpu.return_from_exception();

        assert_eq!(cpu.cpsr(), Psr::new(0x10));
        assert_eq!(cpu.register_at(REG_SP), 0x1000);
        assert_eq!(cpu.banked_register(Mode::Fiq, REG_SP), 0x2000);
    }

    #[test]
    #[should_panic(expected = "has no SPSR")]
    fn return_from_exception_in_user_mode_is_fatal() {
        let mut cpu = cpu_in(Mode::User);
        cpu.return_from_exception();
    }

    #[test]
    fn fiq_wins_over_irq_at_the_boundary() {
        let mut cpu = cpu_in(Mode::User);
        // MOV R0, R0
        cpu.memory_mut().write_word(0x1C, 0xE1A0_0000).unwrap();
        cpu.set_register_at(REG_PROGRAM_COUNTER, 0x40);
        cpu.set_irq_line(true);
        cpu.set_fiq_line(true);

        assert_eq!(cpu.pending_interrupt(), Some(Exception::FastInterrupt));
        cpu.step();

        assert_eq!(cpu.cpsr().mode(), Mode::Fiq);
        assert_eq!(cpu.banked_register(Mode::Fiq, REG_LR), 0x44);
        assert_eq!(cpu.pc(), 0x20);
        // I is now set, the IRQ stays pending but masked.
        assert_eq!(cpu.pending_interrupt(), None);
    }

    #[test]
    fn failed_fetch_raises_prefetch_abort() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new(0x40));
        cpu.set_register_at(REG_PROGRAM_COUNTER, 0x1000);

        cpu.step();

        assert_eq!(cpu.cpsr().mode(), Mode::Abort);
        assert_eq!(cpu.register_at(REG_LR), 0x1004);
        assert_eq!(cpu.pc(), 0x0C);
        assert_eq!(cpu.cycles(), 1);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut cpu = cpu_in(Mode::System);
        cpu.set_register_at(3, 0x1234);
        cpu.set_irq_line(true);
        let snapshot = cpu.snapshot();

        let mut other = self::cpu();
        other.restore(snapshot.clone());

        assert_eq!(other.snapshot(), snapshot);
        assert_eq!(other.register_at(3), 0x1234);
        assert_eq!(other.cpsr().mode(), Mode::System);
    }
}
