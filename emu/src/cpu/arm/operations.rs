use crate::bitwise::Bits;
use crate::cpu::alu::{
    ArithmeticOpResult, ShiftResult, add_inner_op, add_with_carry, shift, shift_immediate,
    sub_inner_op, sub_with_carry,
};
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, MsrOperand, PsrFieldMask, PsrKind, PsrOpKind,
    ShiftOperator,
};
use crate::cpu::arm::instructions::{
    ArmModeInstruction, ArmModeMultiplyLongVariant, ArmModeMultiplyVariant,
    SingleDataTransferOffsetInfo,
};
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::coprocessor::{CdpOperands, CoprocessorTransfer, RegisterTransferOperands};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::exception::Exception;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting,
    ReadWriteKind,
};
use crate::cpu::psr::{CONTROL_MASK, CpuState, FLAGS_MASK, Flag};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};
use crate::memory::{Memory, MemoryFault};

const PC: u32 = REG_PROGRAM_COUNTER as u32;
const MODE_BITS: u32 = 0b1_1111;

impl<M: Memory> Arm7tdmi<M> {
    pub(crate) fn execute_arm(&mut self, instruction: ArmModeInstruction) {
        let pc = self.registers.program_counter();
        if !self.psrs.cpsr.can_execute(instruction.condition()) {
            tracing::trace!("0x{pc:08X}: {instruction} (condition failed)");
            return;
        }
        tracing::trace!("0x{pc:08X}: {instruction}");

        let outcome = match instruction {
            ArmModeInstruction::DataProcessing {
                condition: _,
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => {
                self.data_processing(alu_instruction, set_conditions, rn, destination, op2);
                Ok(())
            }
            ArmModeInstruction::Multiply {
                condition: _,
                variant,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
            } => {
                self.multiply(
                    variant,
                    should_set_codes,
                    rd_destination_register,
                    rn_accumulate_register,
                    rs_operand_register,
                    rm_operand_register,
                );
                Ok(())
            }
            ArmModeInstruction::MultiplyLong {
                condition: _,
                variant,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
            } => {
                self.multiply_long(
                    variant,
                    should_set_codes,
                    rdhi_destination_register,
                    rdlo_destination_register,
                    rs_operand_register,
                    rm_operand_register,
                );
                Ok(())
            }
            ArmModeInstruction::PsrTransfer {
                condition: _,
                psr_kind,
                kind,
            } => {
                self.psr_transfer(kind, psr_kind);
                Ok(())
            }
            ArmModeInstruction::SingleDataSwap {
                condition: _,
                quantity,
                rn,
                rd,
                rm,
            } => self.single_data_swap(quantity, rn, rd, rm),
            ArmModeInstruction::BranchAndExchange {
                condition: _,
                register,
            } => {
                self.branch_and_exchange(register);
                Ok(())
            }
            ArmModeInstruction::HalfwordDataTransfer {
                condition: _,
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => self.half_word_data_transfer(
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            ),
            ArmModeInstruction::SingleDataTransfer {
                condition: _,
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            } => self.single_data_transfer(
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            ),
            ArmModeInstruction::BlockDataTransfer {
                condition: _,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => self.block_data_transfer(
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            ),
            ArmModeInstruction::Branch {
                condition: _,
                link,
                offset,
            } => {
                self.branch(link, offset);
                Ok(())
            }
            ArmModeInstruction::CoprocessorDataTransfer {
                condition: _,
                indexing,
                offsetting,
                transfer_length,
                write_back,
                load_store,
                rn,
                crd,
                cp_number,
                offset,
            } => self.coprocessor_data_transfer(
                indexing,
                offsetting,
                transfer_length,
                write_back,
                load_store,
                rn,
                crd,
                cp_number,
                offset,
            ),
            ArmModeInstruction::CoprocessorDataOperation {
                condition: _,
                operands,
            } => {
                self.coprocessor_data_operation(operands);
                Ok(())
            }
            ArmModeInstruction::CoprocessorRegisterTransfer {
                condition: _,
                load_store,
                rd,
                operands,
            } => {
                self.coprocessor_register_transfer(load_store, rd, operands);
                Ok(())
            }
            ArmModeInstruction::SoftwareInterrupt {
                condition: _,
                comment,
            } => {
                tracing::debug!("SWI #0x{comment:X}");
                self.arise_exception(Exception::SoftwareInterrupt);
                Ok(())
            }
            ArmModeInstruction::Undefined { condition: _ } => {
                self.arise_exception(Exception::UndefinedInstruction);
                Ok(())
            }
        };

        if let Err(fault) = outcome {
            self.data_abort(fault);
        }
    }

    pub(crate) fn data_processing(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    ) {
        // Shifting by a register costs an extra cycle, so R15 reads 12 ahead.
        let shift_by_register = matches!(
            op2,
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(_),
                ..
            }
        );
        let mut op1 = self.read_operand(rn);
        if rn == PC && shift_by_register {
            op1 = op1.wrapping_add(4);
        }

        let ShiftResult {
            result: op2,
            carry: shifter_carry,
        } = self.second_operand(op2);
        let carry = self.psrs.cpsr.carry_flag();

        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };
        let result = match alu_instruction {
            And | Tst => self.logical_result(op1 & op2, shifter_carry),
            Eor | Teq => self.logical_result(op1 ^ op2, shifter_carry),
            Orr => self.logical_result(op1 | op2, shifter_carry),
            Mov => self.logical_result(op2, shifter_carry),
            Bic => self.logical_result(op1 & !op2, shifter_carry),
            Mvn => self.logical_result(!op2, shifter_carry),
            Sub | Cmp => sub_inner_op(op1, op2),
            Rsb => sub_inner_op(op2, op1),
            Add | Cmn => add_inner_op(op1, op2),
            Adc => add_with_carry(op1, op2, carry),
            Sbc => sub_with_carry(op1, op2, carry),
            Rsc => sub_with_carry(op2, op1, carry),
        };

        if alu_instruction.is_test() {
            self.psrs.cpsr.set_flags(&result);
            return;
        }

        if set_conditions && destination == PC {
            // MOVS PC, LR and friends: return from an exception handler.
            self.restore_cpsr_from_spsr();
        } else if set_conditions {
            self.psrs.cpsr.set_flags(&result);
        }

        self.write_register(destination, result.result);
    }

    /// Logical operations take C from the shifter and leave V as it was.
    fn logical_result(&self, result: u32, carry: bool) -> ArithmeticOpResult {
        ArithmeticOpResult {
            result,
            carry,
            overflow: self.psrs.cpsr.overflow_flag(),
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }

    fn second_operand(&self, op2: AluSecondOperandInfo) -> ShiftResult {
        let carry = self.psrs.cpsr.carry_flag();
        match op2 {
            AluSecondOperandInfo::Immediate { base, shift } => {
                let result = base.rotate_right(shift);
                let carry = if shift == 0 { carry } else { result.get_bit(31) };
                ShiftResult { result, carry }
            }
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Immediate(amount),
                shift_kind,
                register,
            } => shift_immediate(shift_kind, amount, self.read_operand(register), carry),
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(rs),
                shift_kind,
                register,
            } => {
                let mut rm = self.read_operand(register);
                if register == PC {
                    rm = rm.wrapping_add(4);
                }
                let amount = self.read_operand(rs) & 0xFF;
                shift(shift_kind, amount, rm, carry)
            }
        }
    }

    pub(crate) fn psr_transfer(&mut self, op_kind: PsrOpKind, psr_kind: PsrKind) {
        let mode = self.psrs.cpsr.mode();

        match op_kind {
            PsrOpKind::Mrs {
                destination_register,
            } => {
                let psr = match psr_kind {
                    PsrKind::Cpsr => self.psrs.cpsr,
                    PsrKind::Spsr => self.psrs.try_spsr(mode).unwrap_or_else(|| {
                        tracing::warn!("MRS of SPSR in {mode:?} mode without SPSR, reading CPSR");
                        self.psrs.cpsr
                    }),
                };

                self.write_register(destination_register, psr.into());
            }
            PsrOpKind::Msr {
                field_mask,
                operand,
            } => {
                let value = match operand {
                    MsrOperand::Register(rm) => self.read_operand(rm),
                    MsrOperand::Immediate(value) => value,
                };
                let mut mask = Self::msr_mask(field_mask, mode);

                match psr_kind {
                    PsrKind::Cpsr => {
                        // The state bit is only changed by BX and exceptions.
                        mask &= !(1 << Flag::State.bit());
                        if mask & MODE_BITS != 0 && Mode::try_from(value & MODE_BITS).is_err() {
                            tracing::warn!(
                                "MSR with invalid mode bits 0b{:05b}, mode left unchanged",
                                value & MODE_BITS
                            );
                            mask &= !MODE_BITS;
                        }

                        let mut cpsr = self.psrs.cpsr;
                        cpsr.write_masked(value, mask);
                        self.set_cpsr(cpsr);
                    }
                    PsrKind::Spsr => {
                        if mode.spsr_slot().is_none() {
                            tracing::warn!("MSR to SPSR in {mode:?} mode ignored");
                            return;
                        }
                        let mut spsr = self.psrs.try_spsr(mode).unwrap_or_default();
                        spsr.write_masked(value, mask);
                        self.psrs.set_spsr(mode, spsr);
                    }
                }
            }
        }
    }

    /// Only the flags field is writable from User mode.
    fn msr_mask(field_mask: PsrFieldMask, mode: Mode) -> u32 {
        let writable = if mode.is_privileged() {
            FLAGS_MASK | CONTROL_MASK
        } else {
            FLAGS_MASK
        };

        field_mask.bits() & writable
    }

    pub(crate) fn multiply(
        &mut self,
        variant: ArmModeMultiplyVariant,
        set_condition_codes: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    ) {
        let mut result = self.read_operand(rm).wrapping_mul(self.read_operand(rs));
        if variant == ArmModeMultiplyVariant::Mla {
            result = result.wrapping_add(self.read_operand(rn));
        }

        self.write_register(rd, result);

        if set_condition_codes {
            self.psrs.cpsr.set_logical_flags(result);
        }
    }

    pub(crate) fn multiply_long(
        &mut self,
        variant: ArmModeMultiplyLongVariant,
        set_condition_codes: bool,
        rdhi: u32,
        rdlo: u32,
        rs: u32,
        rm: u32,
    ) {
        let rm_value = self.read_operand(rm);
        let rs_value = self.read_operand(rs);

        let mut result = if variant.is_signed() {
            (i64::from(rm_value as i32) * i64::from(rs_value as i32)) as u64
        } else {
            u64::from(rm_value) * u64::from(rs_value)
        };
        if variant.accumulates() {
            let accumulator =
                (u64::from(self.read_operand(rdhi)) << 32) | u64::from(self.read_operand(rdlo));
            result = result.wrapping_add(accumulator);
        }

        self.write_register(rdlo, result.get_bits(0..=31) as u32);
        self.write_register(rdhi, result.get_bits(32..=63) as u32);

        if set_condition_codes {
            self.psrs.cpsr.set_zero_flag(result == 0);
            self.psrs.cpsr.set_sign_flag(result.get_bit(63));
        }
    }

    pub(crate) fn single_data_swap(
        &mut self,
        quantity: ReadWriteKind,
        rn: u32,
        rd: u32,
        rm: u32,
    ) -> Result<(), MemoryFault> {
        let address = self.read_operand(rn);
        let source = self.read_operand(rm);

        let old = match quantity {
            ReadWriteKind::Word => {
                let old = self.read_word_rotated(address)?;
                self.memory.write_word(address & !0b11, source)?;
                old
            }
            ReadWriteKind::Byte => {
                let old = self.memory.read_byte(address)?;
                self.memory.write_byte(address, source as u8)?;
                u32::from(old)
            }
        };

        self.write_register(rd, old);
        Ok(())
    }

    /// BX: bit 0 of the target selects Thumb and is dropped from the address.
    pub(crate) fn branch_and_exchange(&mut self, register: u32) {
        let target = self.read_operand(register);
        let state = CpuState::from(target.get_bit(0));
        if state != self.psrs.cpsr.cpu_state() {
            tracing::debug!("BX switching to {state:?} state at 0x{target:08X}");
        }

        self.force_state_change(state);
        self.branch_to(target);
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn half_word_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    ) -> Result<(), MemoryFault> {
        let offset = match offset_kind {
            HalfwordDataTransferOffsetKind::Immediate { offset } => offset,
            HalfwordDataTransferOffsetKind::Register { register } => self.read_operand(register),
        };

        let base = self.read_operand(base_register);
        let effective = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => effective,
            Indexing::Post => base,
        };
        let writes_back = indexing == Indexing::Post || write_back;

        match load_store {
            LoadStoreKind::Store => {
                let value = self.store_value(source_destination_register);
                self.memory.write_half_word(address & !0b1, value as u16)?;
                if writes_back {
                    self.write_register(base_register, effective);
                }
            }
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfwords => {
                        let value = u32::from(self.memory.read_half_word(address & !0b1)?);
                        if address.get_bit(0) {
                            value.rotate_right(8)
                        } else {
                            value
                        }
                    }
                    HalfwordTransferKind::SignedByte => {
                        u32::from(self.memory.read_byte(address)?).sign_extended(8)
                    }
                    // A misaligned LDRSH loads the addressed byte, sign-extended.
                    HalfwordTransferKind::SignedHalfwords if address.get_bit(0) => {
                        u32::from(self.memory.read_byte(address)?).sign_extended(8)
                    }
                    HalfwordTransferKind::SignedHalfwords => {
                        u32::from(self.memory.read_half_word(address)?).sign_extended(16)
                    }
                };

                // The loaded value wins over write-back when Rd == Rn.
                if writes_back {
                    self.write_register(base_register, effective);
                }
                self.write_register(source_destination_register, value);
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn single_data_transfer(
        &mut self,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    ) -> Result<(), MemoryFault> {
        let amount = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                let value = self.read_operand(reg_offset);
                shift_immediate(
                    shift_kind,
                    shift_amount,
                    value,
                    self.psrs.cpsr.carry_flag(),
                )
                .result
            }
        };

        let base = self.read_operand(base_register);
        let effective = offsetting.apply(base, amount);
        let address = match indexing {
            Indexing::Pre => effective,
            Indexing::Post => base,
        };
        // Post-indexed transfers always write back.
        let writes_back = indexing == Indexing::Post || write_back;

        match load_store {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Word => self.read_word_rotated(address)?,
                    ReadWriteKind::Byte => u32::from(self.memory.read_byte(address)?),
                };

                if writes_back {
                    self.write_register(base_register, effective);
                }
                self.write_register(rd, value);
            }
            LoadStoreKind::Store => {
                let value = self.store_value(rd);
                match quantity {
                    ReadWriteKind::Word => self.memory.write_word(address & !0b11, value)?,
                    ReadWriteKind::Byte => self.memory.write_byte(address, value as u8)?,
                }

                if writes_back {
                    self.write_register(base_register, effective);
                }
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    ) -> Result<(), MemoryFault> {
        let base = self.read_operand(rn);

        // An empty list transfers R15 and still moves the base by 16 words.
        let (register_list, size) = if register_list == 0 {
            (1 << 15, 0x40)
        } else {
            (register_list, register_list.count_ones() * 4)
        };

        // Registers always go lowest-first to the lowest address.
        let (start, final_base) = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Post) => (base, base.wrapping_add(size)),
            (Offsetting::Up, Indexing::Pre) => (base.wrapping_add(4), base.wrapping_add(size)),
            (Offsetting::Down, Indexing::Post) => (
                base.wrapping_sub(size).wrapping_add(4),
                base.wrapping_sub(size),
            ),
            (Offsetting::Down, Indexing::Pre) => {
                (base.wrapping_sub(size), base.wrapping_sub(size))
            }
        };

        let registers = (0..=15u8).filter(|reg| register_list.get_bit(*reg));
        let loads_pc = register_list.get_bit(15);
        // With S set, anything but an LDM that loads PC works on the User bank.
        let user_bank = load_psr && !(load_store == LoadStoreKind::Load && loads_pc);

        match load_store {
            LoadStoreKind::Store => {
                let first = register_list.trailing_zeros();
                let mut address = start;
                for reg in registers {
                    let reg = u32::from(reg);
                    let value = if reg == rn && write_back && reg != first {
                        final_base
                    } else if user_bank && reg != PC {
                        self.banked_register(Mode::User, reg as usize)
                    } else {
                        self.store_value(reg)
                    };
                    self.memory.write_word(address & !0b11, value)?;
                    address = address.wrapping_add(4);
                }

                if write_back {
                    self.write_register(rn, final_base);
                }
            }
            LoadStoreKind::Load => {
                // Nothing is committed until every word has been read.
                let mut loaded = Vec::with_capacity(16);
                let mut address = start;
                for reg in registers {
                    loaded.push((u32::from(reg), self.memory.read_word(address & !0b11)?));
                    address = address.wrapping_add(4);
                }

                if write_back {
                    self.write_register(rn, final_base);
                }

                let mut pc = None;
                for (reg, value) in loaded {
                    if reg == PC {
                        pc = Some(value);
                    } else if user_bank {
                        self.set_banked_register(Mode::User, reg as usize, value);
                    } else {
                        self.write_register(reg, value);
                    }
                }

                if let Some(value) = pc {
                    if load_psr {
                        self.restore_cpsr_from_spsr();
                    }
                    self.write_register(PC, value);
                }
            }
        }

        Ok(())
    }

    /// `offset` is relative to the pipelined PC.
    pub(crate) fn branch(&mut self, link: bool, offset: i32) {
        let pc = self.registers.program_counter();
        if link {
            self.registers.set_register_at(REG_LR, pc.wrapping_add(4));
        }

        let target = self.read_operand(PC).wrapping_add_signed(offset);
        self.branch_to(target);
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn coprocessor_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        transfer_length: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        crd: u32,
        cp_number: u32,
        offset: u32,
    ) -> Result<(), MemoryFault> {
        let base = self.read_operand(rn);
        let effective = offsetting.apply(base, offset * 4);
        let transfer = CoprocessorTransfer {
            cp_number,
            crd,
            address: match indexing {
                Indexing::Pre => effective,
                Indexing::Post => base,
            },
            long: transfer_length,
        };

        let Some(coprocessor) = self
            .coprocessor
            .as_mut()
            .filter(|cp| cp.handles(cp_number))
        else {
            self.coprocessor_absent(cp_number);
            return Ok(());
        };
        match load_store {
            LoadStoreKind::Load => coprocessor.load(transfer, &mut self.memory)?,
            LoadStoreKind::Store => coprocessor.store(transfer, &mut self.memory)?,
        }

        if write_back {
            self.write_register(rn, effective);
        }
        Ok(())
    }

    pub(crate) fn coprocessor_data_operation(&mut self, operands: CdpOperands) {
        match self
            .coprocessor
            .as_mut()
            .filter(|cp| cp.handles(operands.cp_number))
        {
            Some(coprocessor) => coprocessor.execute(operands),
            None => self.coprocessor_absent(operands.cp_number),
        }
    }

    pub(crate) fn coprocessor_register_transfer(
        &mut self,
        load_store: LoadStoreKind,
        rd: u32,
        operands: RegisterTransferOperands,
    ) {
        let value = self.store_value(rd);
        let Some(coprocessor) = self
            .coprocessor
            .as_mut()
            .filter(|cp| cp.handles(operands.cp_number))
        else {
            self.coprocessor_absent(operands.cp_number);
            return;
        };

        match load_store {
            LoadStoreKind::Store => coprocessor.move_to_coprocessor(operands, value),
            LoadStoreKind::Load => {
                let value = coprocessor.move_from_coprocessor(operands);
                if rd == PC {
                    // MRC to R15 only transfers N, Z, C and V.
                    self.psrs.cpsr.write_masked(value, 0xF000_0000);
                } else {
                    self.write_register(rd, value);
                }
            }
        }
    }

    fn coprocessor_absent(&mut self, cp_number: u32) {
        tracing::debug!("no coprocessor answers to p{cp_number}, raising undefined instruction");
        self.arise_exception(Exception::UndefinedInstruction);
    }

    /// Stored R15 is 12 ahead of the instruction.
    fn store_value(&self, reg: u32) -> u32 {
        let value = self.read_operand(reg);
        if reg == PC { value.wrapping_add(4) } else { value }
    }

    /// Word load that rotates a misaligned word so the addressed byte lands in bits 0-7.
    pub(crate) fn read_word_rotated(&mut self, address: u32) -> Result<u32, MemoryFault> {
        let word = self.memory.read_word(address & !0b11)?;
        Ok(word.rotate_right((address & 0b11) * 8))
    }
}
