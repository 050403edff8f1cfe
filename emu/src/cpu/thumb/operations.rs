//! Thumb execution.
//!
//! Nearly every Thumb instruction is a compressed form of an ARM one, so most
//! formats expand their operands and run the ARM operation. Only the PC
//! relative forms (which word-align PC) and the two BL halves have their own
//! behaviour.

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{AluSecondOperandInfo, ArmModeAluInstruction, ShiftOperator};
use crate::cpu::arm::instructions::{ArmModeMultiplyVariant, SingleDataTransferOffsetInfo};
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::exception::Exception;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting,
    OperandKind, ReadWriteKind, ShiftKind,
};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::alu_instructions::{
    Operation, ThumbHighRegisterOperation, ThumbModeAluInstruction,
};
use crate::cpu::thumb::instruction::ThumbModeInstruction;
use crate::memory::{Memory, MemoryFault};

const PC: u32 = REG_PROGRAM_COUNTER as u32;
const SP: u32 = REG_SP as u32;

const fn register_operand(register: u32) -> AluSecondOperandInfo {
    AluSecondOperandInfo::Register {
        shift_op: ShiftOperator::Immediate(0),
        shift_kind: ShiftKind::Lsl,
        register,
    }
}

const fn immediate_operand(value: u32) -> AluSecondOperandInfo {
    AluSecondOperandInfo::Immediate {
        base: value,
        shift: 0,
    }
}

impl<M: Memory> Arm7tdmi<M> {
    #[allow(clippy::too_many_lines)]
    pub(crate) fn execute_thumb(&mut self, instruction: ThumbModeInstruction) {
        let pc = self.registers.program_counter();
        tracing::trace!("0x{pc:08X}: {instruction}");

        let outcome = match instruction {
            ThumbModeInstruction::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => {
                self.move_shifted_reg(
                    shift_operation,
                    offset5,
                    source_register,
                    destination_register,
                );
                Ok(())
            }
            ThumbModeInstruction::AddSubtract {
                operand_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => {
                self.add_subtract(
                    operand_kind,
                    subtract,
                    rn_offset3,
                    source_register,
                    destination_register,
                );
                Ok(())
            }
            ThumbModeInstruction::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => {
                self.move_compare_add_sub_imm(operation, destination_register, offset);
                Ok(())
            }
            ThumbModeInstruction::AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => {
                self.alu_op(alu_operation, source_register, destination_register);
                Ok(())
            }
            ThumbModeInstruction::HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => {
                self.hi_reg_operation_branch_ex(
                    register_operation,
                    source_register,
                    destination_register,
                );
                Ok(())
            }
            ThumbModeInstruction::PCRelativeLoad {
                destination_register,
                offset,
            } => self.pc_relative_load(destination_register, offset),
            ThumbModeInstruction::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                offset_register,
                base_register,
                destination_register,
            } => self.single_data_transfer(
                load_store,
                byte_word,
                false,
                Indexing::Pre,
                destination_register,
                base_register,
                SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: 0,
                    shift_kind: ShiftKind::Lsl,
                    reg_offset: offset_register,
                },
                Offsetting::Up,
            ),
            ThumbModeInstruction::LoadStoreSignExtByteHalfword {
                h_flag,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            } => {
                let (load_store, transfer_kind) = match (sign_extend_flag, h_flag) {
                    (false, false) => (LoadStoreKind::Store, HalfwordTransferKind::UnsignedHalfwords),
                    (false, true) => (LoadStoreKind::Load, HalfwordTransferKind::UnsignedHalfwords),
                    (true, false) => (LoadStoreKind::Load, HalfwordTransferKind::SignedByte),
                    (true, true) => (LoadStoreKind::Load, HalfwordTransferKind::SignedHalfwords),
                };
                self.half_word_data_transfer(
                    Indexing::Pre,
                    Offsetting::Up,
                    false,
                    load_store,
                    HalfwordDataTransferOffsetKind::Register {
                        register: offset_register,
                    },
                    base_register,
                    destination_register,
                    transfer_kind,
                )
            }
            ThumbModeInstruction::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            } => self.single_data_transfer(
                load_store,
                byte_word,
                false,
                Indexing::Pre,
                destination_register,
                base_register,
                SingleDataTransferOffsetInfo::Immediate { offset },
                Offsetting::Up,
            ),
            ThumbModeInstruction::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => self.half_word_data_transfer(
                Indexing::Pre,
                Offsetting::Up,
                false,
                load_store,
                HalfwordDataTransferOffsetKind::Immediate { offset },
                base_register,
                source_destination_register,
                HalfwordTransferKind::UnsignedHalfwords,
            ),
            ThumbModeInstruction::SPRelativeLoadStore {
                load_store,
                destination_register,
                offset,
            } => self.single_data_transfer(
                load_store,
                ReadWriteKind::Word,
                false,
                Indexing::Pre,
                destination_register,
                SP,
                SingleDataTransferOffsetInfo::Immediate { offset },
                Offsetting::Up,
            ),
            ThumbModeInstruction::LoadAddress {
                sp,
                destination_register,
                offset,
            } => {
                self.load_address(sp, destination_register, offset);
                Ok(())
            }
            ThumbModeInstruction::AddOffsetSP { negative, offset } => {
                let sp = self.read_operand(SP);
                let sp = if negative {
                    sp.wrapping_sub(offset)
                } else {
                    sp.wrapping_add(offset)
                };
                self.write_register(SP, sp);
                Ok(())
            }
            ThumbModeInstruction::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => self.push_pop_register(load_store, pc_lr, register_list),
            ThumbModeInstruction::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => self.block_data_transfer(
                Indexing::Post,
                Offsetting::Up,
                false,
                true,
                load_store,
                base_register,
                register_list,
            ),
            ThumbModeInstruction::CondBranch {
                condition,
                immediate_offset,
            } => {
                if self.psrs.cpsr.can_execute(condition) {
                    self.branch(false, immediate_offset);
                }
                Ok(())
            }
            ThumbModeInstruction::Swi { comment } => {
                tracing::debug!("SWI #0x{comment:X}");
                self.arise_exception(Exception::SoftwareInterrupt);
                Ok(())
            }
            ThumbModeInstruction::UncondBranch { offset } => {
                self.branch(false, offset);
                Ok(())
            }
            ThumbModeInstruction::LongBranchLink { low_half, offset } => {
                self.long_branch_link(low_half, offset);
                Ok(())
            }
            ThumbModeInstruction::Undefined => {
                self.arise_exception(Exception::UndefinedInstruction);
                Ok(())
            }
        };

        if let Err(fault) = outcome {
            self.data_abort(fault);
        }
    }

    /// LSL/LSR/ASR Rd, Rs, #offset5 is MOVS Rd, Rs, <shift> #offset5.
    fn move_shifted_reg(&mut self, shift_kind: ShiftKind, offset5: u32, rs: u32, rd: u32) {
        self.data_processing(
            ArmModeAluInstruction::Mov,
            true,
            rd,
            rd,
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Immediate(offset5),
                shift_kind,
                register: rs,
            },
        );
    }

    fn add_subtract(
        &mut self,
        operand_kind: OperandKind,
        subtract: bool,
        rn_offset3: u32,
        rs: u32,
        rd: u32,
    ) {
        let op2 = match operand_kind {
            OperandKind::Immediate => immediate_operand(rn_offset3),
            OperandKind::Register => register_operand(rn_offset3),
        };
        let alu_instruction = if subtract {
            ArmModeAluInstruction::Sub
        } else {
            ArmModeAluInstruction::Add
        };

        self.data_processing(alu_instruction, true, rs, rd, op2);
    }

    /// MOV keeps C: an unrotated immediate leaves the shifter carry alone.
    fn move_compare_add_sub_imm(&mut self, operation: Operation, rd: u32, offset: u32) {
        self.data_processing(
            operation.arm_equivalent(),
            true,
            rd,
            rd,
            immediate_operand(offset),
        );
    }

    fn alu_op(&mut self, alu_operation: ThumbModeAluInstruction, rs: u32, rd: u32) {
        use ArmModeAluInstruction as Arm;
        use ThumbModeAluInstruction as Thumb;

        // Shifts are MOVS Rd, Rd, <shift> Rs.
        let shift_rd_by_rs = |shift_kind| AluSecondOperandInfo::Register {
            shift_op: ShiftOperator::Register(rs),
            shift_kind,
            register: rd,
        };

        let (arm_op, rn, op2) = match alu_operation {
            Thumb::And => (Arm::And, rd, register_operand(rs)),
            Thumb::Eor => (Arm::Eor, rd, register_operand(rs)),
            Thumb::Lsl => (Arm::Mov, rd, shift_rd_by_rs(ShiftKind::Lsl)),
            Thumb::Lsr => (Arm::Mov, rd, shift_rd_by_rs(ShiftKind::Lsr)),
            Thumb::Asr => (Arm::Mov, rd, shift_rd_by_rs(ShiftKind::Asr)),
            Thumb::Adc => (Arm::Adc, rd, register_operand(rs)),
            Thumb::Sbc => (Arm::Sbc, rd, register_operand(rs)),
            Thumb::Ror => (Arm::Mov, rd, shift_rd_by_rs(ShiftKind::Ror)),
            Thumb::Tst => (Arm::Tst, rd, register_operand(rs)),
            // RSBS Rd, Rs, #0
            Thumb::Neg => (Arm::Rsb, rs, immediate_operand(0)),
            Thumb::Cmp => (Arm::Cmp, rd, register_operand(rs)),
            Thumb::Cmn => (Arm::Cmn, rd, register_operand(rs)),
            Thumb::Orr => (Arm::Orr, rd, register_operand(rs)),
            Thumb::Mul => {
                self.multiply(ArmModeMultiplyVariant::Mul, true, rd, 0, rs, rd);
                return;
            }
            Thumb::Bic => (Arm::Bic, rd, register_operand(rs)),
            Thumb::Mvn => (Arm::Mvn, rd, register_operand(rs)),
        };

        self.data_processing(arm_op, true, rn, rd, op2);
    }

    /// Only CMP sets the flags.
    fn hi_reg_operation_branch_ex(
        &mut self,
        operation: ThumbHighRegisterOperation,
        rs: u32,
        rd: u32,
    ) {
        match operation {
            ThumbHighRegisterOperation::Add => {
                self.data_processing(ArmModeAluInstruction::Add, false, rd, rd, register_operand(rs));
            }
            ThumbHighRegisterOperation::Cmp => {
                self.data_processing(ArmModeAluInstruction::Cmp, true, rd, rd, register_operand(rs));
            }
            ThumbHighRegisterOperation::Mov => {
                self.data_processing(ArmModeAluInstruction::Mov, false, rd, rd, register_operand(rs));
            }
            ThumbHighRegisterOperation::Bx => self.branch_and_exchange(rs),
        }
    }

    /// Bit 1 of PC is ignored so the word is always aligned.
    fn pc_relative_load(&mut self, rd: u32, offset: u32) -> Result<(), MemoryFault> {
        let address = (self.read_operand(PC) & !0b11).wrapping_add(offset);
        let value = self.memory.read_word(address)?;
        self.write_register(rd, value);
        Ok(())
    }

    fn load_address(&mut self, sp: bool, rd: u32, offset: u32) {
        let base = if sp {
            self.read_operand(SP)
        } else {
            self.read_operand(PC) & !0b11
        };
        self.write_register(rd, base.wrapping_add(offset));
    }

    /// PUSH is STMDB SP!, POP is LDMIA SP!. Popping PC does not change state.
    fn push_pop_register(
        &mut self,
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u32,
    ) -> Result<(), MemoryFault> {
        let (indexing, offsetting, extra) = match load_store {
            LoadStoreKind::Store => (Indexing::Pre, Offsetting::Down, REG_LR),
            LoadStoreKind::Load => (Indexing::Post, Offsetting::Up, REG_PROGRAM_COUNTER),
        };
        let mut register_list = register_list;
        if pc_lr {
            register_list.set_bit_on(extra as u8);
        }

        self.block_data_transfer(indexing, offsetting, false, true, load_store, SP, register_list)
    }

    fn long_branch_link(&mut self, low_half: bool, offset: u32) {
        if low_half {
            let next = self.registers.program_counter().wrapping_add(2);
            let target = self
                .registers
                .register_at(REG_LR)
                .wrapping_add(offset << 1);
            self.registers.set_register_at(REG_LR, next | 1);
            self.branch_to(target);
        } else {
            let offset = (offset << 12).sign_extended(23);
            let lr = self.read_operand(PC).wrapping_add(offset);
            self.registers.set_register_at(REG_LR, lr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::cpu_modes::Mode;
    use crate::cpu::psr::CpuState;
    use crate::memory::FlatMemory;
    use pretty_assertions::assert_eq;

    const ORIGIN: u32 = 0x100;

    fn cpu_with_thumb_program(program: &[u16]) -> Arm7tdmi<FlatMemory> {
        let mut memory = FlatMemory::new(0x1000);
        for (i, op_code) in program.iter().enumerate() {
            memory
                .write_half_word(ORIGIN + 2 * i as u32, *op_code)
                .unwrap();
        }
        let mut cpu = Arm7tdmi::new(memory);
        cpu.force_state_change(CpuState::Thumb);
        cpu.set_register_at(REG_PROGRAM_COUNTER, ORIGIN);
        cpu
    }

    #[test]
    fn check_move_shifted_register() {
        // LSL R0, R1, #2
        let mut cpu = cpu_with_thumb_program(&[0x0088]);
        cpu.set_register_at(1, 0xC000_0001);

        cpu.step();

        assert_eq!(cpu.register_at(0), 0x0000_0004);
        assert!(cpu.cpsr().carry_flag());
        assert!(!cpu.cpsr().sign_flag());
        assert_eq!(cpu.pc(), ORIGIN + 2);
    }

    #[test]
    fn lsr_by_zero_shifts_by_32() {
        // LSR R2, R3, #32
        let mut cpu = cpu_with_thumb_program(&[0x081A]);
        cpu.set_register_at(2, 0xFFFF);
        cpu.set_register_at(3, 0x8000_0000);

        cpu.step();

        assert_eq!(cpu.register_at(2), 0);
        assert!(cpu.cpsr().carry_flag());
        assert!(cpu.cpsr().zero_flag());
    }

    #[test]
    fn check_add_subtract() {
        // ADD R0, R1, R2
        // SUB R0, R1, #3
        let mut cpu = cpu_with_thumb_program(&[0x1888, 0x1EC8]);
        cpu.set_register_at(1, 2);
        cpu.set_register_at(2, 3);

        cpu.step();
        assert_eq!(cpu.register_at(0), 5);

        cpu.step();
        assert_eq!(cpu.register_at(0), 0xFFFF_FFFF);
        assert!(cpu.cpsr().sign_flag());
        assert!(!cpu.cpsr().carry_flag());
    }

    #[test]
    fn mov_immediate_keeps_carry() {
        // MOV R0, #5
        // CMP R1, #16
        let mut cpu = cpu_with_thumb_program(&[0x2005, 0x2910]);
        let mut cpsr = cpu.cpsr();
        cpsr.set_carry_flag(true);
        cpu.set_cpsr(cpsr);
        cpu.set_register_at(1, 16);

        cpu.step();
        assert_eq!(cpu.register_at(0), 5);
        assert!(cpu.cpsr().carry_flag());
        assert!(!cpu.cpsr().zero_flag());

        cpu.step();
        assert!(cpu.cpsr().zero_flag());
        assert!(cpu.cpsr().carry_flag());
    }

    #[test]
    fn check_alu_operations() {
        // NEG R0, R1
        let mut cpu = cpu_with_thumb_program(&[0x4248]);
        cpu.set_register_at(1, 1);
        cpu.step();
        assert_eq!(cpu.register_at(0), 0xFFFF_FFFF);
        assert!(cpu.cpsr().sign_flag());
        assert!(!cpu.cpsr().carry_flag());

        // MUL R0, R1
        let mut cpu = cpu_with_thumb_program(&[0x4348]);
        cpu.set_register_at(0, 6);
        cpu.set_register_at(1, 7);
        cpu.step();
        assert_eq!(cpu.register_at(0), 42);

        // AND R0, R1
        let mut cpu = cpu_with_thumb_program(&[0x4008]);
        cpu.set_register_at(0, 0b1100);
        cpu.set_register_at(1, 0b1010);
        cpu.step();
        assert_eq!(cpu.register_at(0), 0b1000);
    }

    #[test]
    fn every_alu_operation_writes_its_result() {
        let expected = [
            (ThumbModeAluInstruction::And, 0b1000),
            (ThumbModeAluInstruction::Eor, 0b0110),
            (ThumbModeAluInstruction::Lsl, 0x3000),
            (ThumbModeAluInstruction::Lsr, 0),
            (ThumbModeAluInstruction::Asr, 0),
            (ThumbModeAluInstruction::Adc, 22),
            (ThumbModeAluInstruction::Sbc, 1),
            (ThumbModeAluInstruction::Ror, 0x0300_0000),
            (ThumbModeAluInstruction::Tst, 12),
            (ThumbModeAluInstruction::Neg, 0xFFFF_FFF6),
            (ThumbModeAluInstruction::Cmp, 12),
            (ThumbModeAluInstruction::Cmn, 12),
            (ThumbModeAluInstruction::Orr, 0b1110),
            (ThumbModeAluInstruction::Mul, 120),
            (ThumbModeAluInstruction::Bic, 0b0100),
            (ThumbModeAluInstruction::Mvn, 0xFFFF_FFF5),
        ];

        for (op, (alu_operation, result)) in (0u16..).zip(expected) {
            // <op> R0, R1
            let mut cpu = cpu_with_thumb_program(&[0x4008 | (op << 6)]);
            cpu.set_register_at(0, 12);
            cpu.set_register_at(1, 10);

            cpu.step();

            assert_eq!(ThumbModeAluInstruction::from(op), alu_operation);
            assert_eq!(cpu.register_at(0), result, "{alu_operation}");
        }
    }

    #[test]
    fn alu_shift_by_register() {
        // LSL R0, R1
        let mut cpu = cpu_with_thumb_program(&[0x4088, 0x4088]);
        cpu.set_register_at(0, 1);
        cpu.set_register_at(1, 32);
        cpu.step();
        assert_eq!(cpu.register_at(0), 0);
        assert!(cpu.cpsr().carry_flag());
        assert!(cpu.cpsr().zero_flag());

        // A zero amount leaves the value and C alone.
        cpu.set_register_at(0, 3);
        cpu.set_register_at(1, 0x100);
        cpu.step();
        assert_eq!(cpu.register_at(0), 3);
        assert!(cpu.cpsr().carry_flag());
    }

    #[test]
    fn hi_register_operations_leave_flags() {
        // ADD R8, R1
        // MOV R0, R8
        let mut cpu = cpu_with_thumb_program(&[0x4488, 0x4640]);
        cpu.set_register_at(8, 0xFFFF_FFFF);
        cpu.set_register_at(1, 1);

        cpu.run(2);

        assert_eq!(cpu.register_at(8), 0);
        assert_eq!(cpu.register_at(0), 0);
        assert!(!cpu.cpsr().zero_flag());
        assert!(!cpu.cpsr().carry_flag());
    }

    #[test]
    fn bx_returns_to_arm() {
        // BX R14
        let mut cpu = cpu_with_thumb_program(&[0x4770]);
        cpu.set_register_at(REG_LR, 0x200);

        cpu.step();

        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Arm);
        assert_eq!(cpu.pc(), 0x200);
    }

    #[test]
    fn pc_relative_load_is_word_aligned() {
        // MOV R8, R8
        // LDR R0, [PC, #8]
        let mut cpu = cpu_with_thumb_program(&[0x46C0, 0x4802]);
        cpu.memory_mut().write_word(0x10C, 0xDEAD_BEEF).unwrap();

        cpu.run(2);

        assert_eq!(cpu.register_at(0), 0xDEAD_BEEF);
    }

    #[test]
    fn register_offset_transfers() {
        // STR R0, [R1, R2]
        // LDRB R0, [R1, R2]
        let mut cpu = cpu_with_thumb_program(&[0x5088, 0x5C88]);
        cpu.set_register_at(0, 0x1234_5678);
        cpu.set_register_at(1, 0x200);
        cpu.set_register_at(2, 8);

        cpu.step();
        assert_eq!(cpu.memory_mut().read_word(0x208).unwrap(), 0x1234_5678);

        cpu.step();
        assert_eq!(cpu.register_at(0), 0x78);
        assert_eq!(cpu.register_at(1), 0x200);
    }

    #[test]
    fn sign_extended_transfers() {
        // STRH R0, [R1, R2]
        // LDSB R0, [R1, R2]
        // LDRH R0, [R1, R2]
        // LDSH R0, [R1, R2]
        let mut cpu = cpu_with_thumb_program(&[0x5288, 0x5688, 0x5A88, 0x5E88]);
        cpu.set_register_at(0, 0xAAAA_8081);
        cpu.set_register_at(1, 0x200);
        cpu.set_register_at(2, 4);

        cpu.step();
        assert_eq!(cpu.memory_mut().read_half_word(0x204).unwrap(), 0x8081);

        cpu.step();
        assert_eq!(cpu.register_at(0), 0xFFFF_FF81);

        cpu.step();
        assert_eq!(cpu.register_at(0), 0x8081);

        cpu.step();
        assert_eq!(cpu.register_at(0), 0xFFFF_8081);
    }

    #[test]
    fn immediate_offset_transfers() {
        // LDR R2, [R1, #8]
        // STRB R2, [R1, #3]
        // STRH R1, [R0, #2]
        // LDRH R1, [R0, #2]
        let mut cpu = cpu_with_thumb_program(&[0x688A, 0x70CA, 0x8041, 0x8841]);
        cpu.memory_mut().write_word(0x208, 0x0000_00AB).unwrap();
        cpu.set_register_at(1, 0x200);
        cpu.set_register_at(0, 0x300);

        cpu.step();
        assert_eq!(cpu.register_at(2), 0xAB);

        cpu.step();
        assert_eq!(cpu.memory_mut().read_byte(0x203).unwrap(), 0xAB);

        cpu.step();
        assert_eq!(cpu.memory_mut().read_half_word(0x302).unwrap(), 0x200);

        cpu.set_register_at(1, 0);
        cpu.step();
        assert_eq!(cpu.register_at(1), 0x200);
    }

    #[test]
    fn sp_relative_transfers_and_addresses() {
        // STR R0, [SP, #4]
        // LDR R0, [SP, #8]
        // ADD R0, PC, #8
        // ADD R1, SP, #4
        // ADD SP, #-8
        let mut cpu = cpu_with_thumb_program(&[0x9001, 0x9802, 0xA002, 0xA901, 0xB082]);
        cpu.set_register_at(REG_SP as usize, 0x800);
        cpu.set_register_at(0, 0x55);
        cpu.memory_mut().write_word(0x808, 0x66).unwrap();

        cpu.step();
        assert_eq!(cpu.memory_mut().read_word(0x804).unwrap(), 0x55);

        cpu.step();
        assert_eq!(cpu.register_at(0), 0x66);

        // At 0x104: PC reads 0x108, already word aligned.
        cpu.step();
        assert_eq!(cpu.register_at(0), 0x110);

        cpu.step();
        assert_eq!(cpu.register_at(1), 0x804);

        cpu.step();
        assert_eq!(cpu.register_at(REG_SP as usize), 0x7F8);
    }

    #[test]
    fn push_and_pop_through_pc() {
        // PUSH {R0, R1, LR}
        // POP {R0, R1, PC}
        let mut cpu = cpu_with_thumb_program(&[0xB503, 0xBD03]);
        cpu.set_register_at(REG_SP as usize, 0x800);
        cpu.set_register_at(0, 1);
        cpu.set_register_at(1, 2);
        cpu.set_register_at(REG_LR, 0x301);

        cpu.step();
        assert_eq!(cpu.register_at(REG_SP as usize), 0x7F4);
        assert_eq!(cpu.memory_mut().read_word(0x7F4).unwrap(), 1);
        assert_eq!(cpu.memory_mut().read_word(0x7FC).unwrap(), 0x301);

        cpu.set_register_at(0, 0);
        cpu.set_register_at(1, 0);
        cpu.step();

        assert_eq!(cpu.register_at(0), 1);
        assert_eq!(cpu.register_at(1), 2);
        assert_eq!(cpu.register_at(REG_SP as usize), 0x800);
        assert_eq!(cpu.pc(), 0x300);
        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Thumb);
    }

    #[test]
    fn multiple_load_store() {
        // STMIA R2!, {R0, R1}
        // LDMIA R2!, {R0, R1}
        let mut cpu = cpu_with_thumb_program(&[0xC203, 0xCA03]);
        cpu.set_register_at(0, 0xA);
        cpu.set_register_at(1, 0xB);
        cpu.set_register_at(2, 0x400);

        cpu.step();
        assert_eq!(cpu.register_at(2), 0x408);
        assert_eq!(cpu.memory_mut().read_word(0x404).unwrap(), 0xB);

        cpu.set_register_at(2, 0x400);
        cpu.set_register_at(0, 0);
        cpu.set_register_at(1, 0);
        cpu.step();
        assert_eq!(cpu.register_at(0), 0xA);
        assert_eq!(cpu.register_at(1), 0xB);
        assert_eq!(cpu.register_at(2), 0x408);
    }

    #[test]
    fn conditional_branch() {
        // BEQ PC+8
        let mut cpu = cpu_with_thumb_program(&[0xD002]);
        cpu.step();
        assert_eq!(cpu.pc(), ORIGIN + 2);

        let mut cpu = cpu_with_thumb_program(&[0xD002]);
        let mut cpsr = cpu.cpsr();
        cpsr.set_zero_flag(true);
        cpu.set_cpsr(cpsr);
        cpu.step();
        assert_eq!(cpu.pc(), ORIGIN + 8);
    }

    #[test]
    fn unconditional_branch_to_itself() {
        // B PC+0
        let mut cpu = cpu_with_thumb_program(&[0xE7FE]);
        cpu.run(3);
        assert_eq!(cpu.pc(), ORIGIN);
    }

    #[test]
    fn long_branch_with_link() {
        // BL PC+0x104
        let mut cpu = cpu_with_thumb_program(&[0xF000, 0xF880]);

        cpu.step();
        assert_eq!(cpu.register_at(REG_LR), ORIGIN + 4);
        assert_eq!(cpu.pc(), ORIGIN + 2);

        cpu.step();
        assert_eq!(cpu.pc(), ORIGIN + 0x104);
        assert_eq!(cpu.register_at(REG_LR), (ORIGIN + 4) | 1);
    }

    #[test]
    fn long_branch_backwards() {
        // BL to the first half of itself.
        let mut cpu = cpu_with_thumb_program(&[0xF7FF, 0xFFFE]);
        cpu.run(2);
        assert_eq!(cpu.pc(), ORIGIN);
        assert_eq!(cpu.register_at(REG_LR), (ORIGIN + 4) | 1);
    }

    #[test]
    fn thumb_swi_enters_arm_supervisor() {
        // SWI #0x12
        let mut cpu = cpu_with_thumb_program(&[0xDF12]);
        cpu.change_mode(Mode::User);

        cpu.step();

        assert_eq!(cpu.cpsr().mode(), Mode::Supervisor);
        assert_eq!(cpu.cpsr().cpu_state(), CpuState::Arm);
        assert_eq!(cpu.pc(), 0x08);
        assert_eq!(cpu.register_at(REG_LR), ORIGIN + 2);
        assert_eq!(cpu.spsr(Mode::Supervisor).cpu_state(), CpuState::Thumb);
    }

    #[test]
    fn undefined_thumb_encoding_traps() {
        let mut cpu = cpu_with_thumb_program(&[0xDE00]);

        cpu.step();

        assert_eq!(cpu.cpsr().mode(), Mode::Undefined);
        assert_eq!(cpu.pc(), 0x04);
        assert_eq!(cpu.register_at(REG_LR), ORIGIN + 2);
    }

    #[test]
    fn failed_load_raises_data_abort() {
        // LDR R2, [R1, #8]
        let mut cpu = cpu_with_thumb_program(&[0x688A]);
        cpu.set_register_at(1, 0x0010_0000);

        cpu.step();

        assert_eq!(cpu.cpsr().mode(), Mode::Abort);
        assert_eq!(cpu.pc(), 0x10);
        assert_eq!(cpu.register_at(REG_LR), ORIGIN + 8);
        assert_eq!(cpu.register_at(2), 0);
    }
}
