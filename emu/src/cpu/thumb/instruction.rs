//! # Thumb Instruction Decoding
//!
//! Turns a 16-bit halfword into a [`ThumbModeInstruction`]. Like the ARM
//! decoder it never fails: encodings outside the 19 documented formats
//! (including the ARMv5 BLX suffix) decode to [`ThumbModeInstruction::Undefined`].
//!
//! ## Thumb Instruction Formats
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Thumb Instruction Formats                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Format 1:  000 xx          Move shifted register                      │
//! │  Format 2:  00011           Add/subtract                               │
//! │  Format 3:  001 xx          Move/compare/add/subtract immediate        │
//! │  Format 4:  010000          ALU operations                             │
//! │  Format 5:  010001          Hi register operations / BX                │
//! │  Format 6:  01001           PC-relative load                           │
//! │  Format 7:  0101 xx0        Load/store with register offset            │
//! │  Format 8:  0101 xx1        Load/store sign-extended byte/halfword     │
//! │  Format 9:  011 xx          Load/store with immediate offset           │
//! │  Format 10: 1000 x          Load/store halfword                        │
//! │  Format 11: 1001 x          SP-relative load/store                     │
//! │  Format 12: 1010 x          Load address                               │
//! │  Format 13: 10110000        Add offset to stack pointer                │
//! │  Format 14: 1011 x10x       Push/pop registers                         │
//! │  Format 15: 1100 x          Multiple load/store                        │
//! │  Format 16: 1101 xxxx       Conditional branch                         │
//! │  Format 17: 11011111        Software interrupt                         │
//! │  Format 18: 11100           Unconditional branch                       │
//! │  Format 19: 1111 x          Long branch with link                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Register Restrictions
//!
//! Most Thumb instructions can only access R0-R7. To access R8-R15:
//! - Format 5 (Hi register ops): ADD, CMP, MOV with high registers
//! - BX: Can branch to any register
//! - PUSH/POP: Can include LR/PC via special bit
//!
//! ## Long Branch (BL)
//!
//! The BL instruction spans ±4MB but requires two 16-bit instructions:
//!
//! ```text
//! First:  1111 0xxx xxxx xxxx  ; LR = PC + 4 + (offset_hi << 12)
//! Second: 1111 1xxx xxxx xxxx  ; PC = LR + (offset_lo << 1), LR = next | 1
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::instructions::{Mnemonic, format_register_list};
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, OperandKind, ReadWriteKind, ShiftKind};
use crate::cpu::thumb::alu_instructions::{
    Operation, ThumbHighRegisterOperation, ThumbModeAluInstruction,
};

/// A decoded Thumb instruction. Offsets are stored in bytes, already scaled.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ThumbModeInstruction {
    MoveShiftedRegister {
        shift_operation: ShiftKind,
        offset5: u32,
        source_register: u32,
        destination_register: u32,
    },
    AddSubtract {
        operand_kind: OperandKind,
        subtract: bool,
        /// Rn, or the 3-bit immediate.
        rn_offset3: u32,
        source_register: u32,
        destination_register: u32,
    },
    MoveCompareAddSubtractImm {
        operation: Operation,
        destination_register: u32,
        offset: u32,
    },
    AluOp {
        alu_operation: ThumbModeAluInstruction,
        source_register: u32,
        destination_register: u32,
    },
    HiRegisterOpBX {
        register_operation: ThumbHighRegisterOperation,
        source_register: u32,
        destination_register: u32,
    },
    PCRelativeLoad {
        destination_register: u32,
        offset: u32,
    },
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset_register: u32,
        base_register: u32,
        destination_register: u32,
    },
    LoadStoreSignExtByteHalfword {
        h_flag: bool,
        sign_extend_flag: bool,
        offset_register: u32,
        base_register: u32,
        destination_register: u32,
    },
    LoadStoreImmOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset: u32,
        base_register: u32,
        destination_register: u32,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset: u32,
        base_register: u32,
        source_destination_register: u32,
    },
    SPRelativeLoadStore {
        load_store: LoadStoreKind,
        destination_register: u32,
        offset: u32,
    },
    LoadAddress {
        sp: bool,
        destination_register: u32,
        offset: u32,
    },
    AddOffsetSP {
        negative: bool,
        offset: u32,
    },
    PushPopReg {
        load_store: LoadStoreKind,
        /// LR for PUSH, PC for POP.
        pc_lr: bool,
        register_list: u32,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
        base_register: u32,
        register_list: u32,
    },
    CondBranch {
        condition: Condition,
        /// Relative to the pipelined PC.
        immediate_offset: i32,
    },
    Swi {
        comment: u32,
    },
    UncondBranch {
        offset: i32,
    },
    LongBranchLink {
        /// Set on the second halfword.
        low_half: bool,
        offset: u32,
    },
    Undefined,
}

impl From<u16> for ThumbModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn from(op_code: u16) -> Self {
        let op_code = u32::from(op_code);
        let rd = op_code.get_bits(0..=2);
        let rs = op_code.get_bits(3..=5);

        if op_code.get_bits(11..=15) == 0b0_0011 {
            Self::AddSubtract {
                operand_kind: OperandKind::from(op_code.get_bit(10)),
                subtract: op_code.get_bit(9),
                rn_offset3: op_code.get_bits(6..=8),
                source_register: rs,
                destination_register: rd,
            }
        } else if op_code.get_bits(13..=15) == 0b000 {
            Self::MoveShiftedRegister {
                shift_operation: ShiftKind::from(op_code.get_bits(11..=12)),
                offset5: op_code.get_bits(6..=10),
                source_register: rs,
                destination_register: rd,
            }
        } else if op_code.get_bits(13..=15) == 0b001 {
            Self::MoveCompareAddSubtractImm {
                operation: Operation::from(op_code.get_bits(11..=12) as u16),
                destination_register: op_code.get_bits(8..=10),
                offset: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(10..=15) == 0b01_0000 {
            Self::AluOp {
                alu_operation: ThumbModeAluInstruction::from(op_code.get_bits(6..=9) as u16),
                source_register: rs,
                destination_register: rd,
            }
        } else if op_code.get_bits(10..=15) == 0b01_0001 {
            Self::HiRegisterOpBX {
                register_operation: ThumbHighRegisterOperation::from(
                    op_code.get_bits(8..=9) as u16
                ),
                source_register: op_code.get_bits(3..=6),
                destination_register: rd | (u32::from(op_code.get_bit(7)) << 3),
            }
        } else if op_code.get_bits(11..=15) == 0b0_1001 {
            Self::PCRelativeLoad {
                destination_register: op_code.get_bits(8..=10),
                offset: op_code.get_bits(0..=7) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b0101 && !op_code.get_bit(9) {
            Self::LoadStoreRegisterOffset {
                load_store: LoadStoreKind::from(op_code.get_bit(11)),
                byte_word: ReadWriteKind::from(op_code.get_bit(10)),
                offset_register: op_code.get_bits(6..=8),
                base_register: rs,
                destination_register: rd,
            }
        } else if op_code.get_bits(12..=15) == 0b0101 {
            Self::LoadStoreSignExtByteHalfword {
                h_flag: op_code.get_bit(11),
                sign_extend_flag: op_code.get_bit(10),
                offset_register: op_code.get_bits(6..=8),
                base_register: rs,
                destination_register: rd,
            }
        } else if op_code.get_bits(13..=15) == 0b011 {
            let byte_word = ReadWriteKind::from(op_code.get_bit(12));
            let offset5 = op_code.get_bits(6..=10);
            Self::LoadStoreImmOffset {
                load_store: LoadStoreKind::from(op_code.get_bit(11)),
                byte_word,
                offset: match byte_word {
                    ReadWriteKind::Word => offset5 << 2,
                    ReadWriteKind::Byte => offset5,
                },
                base_register: rs,
                destination_register: rd,
            }
        } else if op_code.get_bits(12..=15) == 0b1000 {
            Self::LoadStoreHalfword {
                load_store: LoadStoreKind::from(op_code.get_bit(11)),
                offset: op_code.get_bits(6..=10) << 1,
                base_register: rs,
                source_destination_register: rd,
            }
        } else if op_code.get_bits(12..=15) == 0b1001 {
            Self::SPRelativeLoadStore {
                load_store: LoadStoreKind::from(op_code.get_bit(11)),
                destination_register: op_code.get_bits(8..=10),
                offset: op_code.get_bits(0..=7) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1010 {
            Self::LoadAddress {
                sp: op_code.get_bit(11),
                destination_register: op_code.get_bits(8..=10),
                offset: op_code.get_bits(0..=7) << 2,
            }
        } else if op_code.get_bits(8..=15) == 0b1011_0000 {
            Self::AddOffsetSP {
                negative: op_code.get_bit(7),
                offset: op_code.get_bits(0..=6) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1011 && op_code.get_bits(9..=10) == 0b10 {
            Self::PushPopReg {
                load_store: LoadStoreKind::from(op_code.get_bit(11)),
                pc_lr: op_code.get_bit(8),
                register_list: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(12..=15) == 0b1100 {
            Self::MultipleLoadStore {
                load_store: LoadStoreKind::from(op_code.get_bit(11)),
                base_register: op_code.get_bits(8..=10),
                register_list: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(8..=15) == 0b1101_1111 {
            Self::Swi {
                comment: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(12..=15) == 0b1101 && op_code.get_bits(8..=11) != 0b1110 {
            Self::CondBranch {
                condition: Condition::from(op_code.get_bits(8..=11)),
                immediate_offset: (op_code.get_bits(0..=7) << 1).sign_extended(9) as i32,
            }
        } else if op_code.get_bits(11..=15) == 0b1_1100 {
            Self::UncondBranch {
                offset: (op_code.get_bits(0..=10) << 1).sign_extended(12) as i32,
            }
        } else if op_code.get_bits(12..=15) == 0b1111 {
            Self::LongBranchLink {
                low_half: op_code.get_bit(11),
                offset: op_code.get_bits(0..=10),
            }
        } else {
            Self::Undefined
        }
    }
}

impl ThumbModeInstruction {
    /// The ARM instruction this is shorthand for, `None` for undefined encodings.
    #[must_use]
    pub const fn mnemonic(&self) -> Option<Mnemonic> {
        let mnemonic = match self {
            Self::MoveShiftedRegister { .. } => Mnemonic::Mov,
            Self::AddSubtract { subtract: true, .. } => Mnemonic::Sub,
            Self::AddSubtract {
                subtract: false, ..
            }
            | Self::LoadAddress { .. }
            | Self::AddOffsetSP { .. } => Mnemonic::Add,
            Self::MoveCompareAddSubtractImm { operation, .. } => match operation {
                Operation::Mov => Mnemonic::Mov,
                Operation::Cmp => Mnemonic::Cmp,
                Operation::Add => Mnemonic::Add,
                Operation::Sub => Mnemonic::Sub,
            },
            Self::AluOp { alu_operation, .. } => match alu_operation {
                ThumbModeAluInstruction::And => Mnemonic::And,
                ThumbModeAluInstruction::Eor => Mnemonic::Eor,
                ThumbModeAluInstruction::Lsl
                | ThumbModeAluInstruction::Lsr
                | ThumbModeAluInstruction::Asr
                | ThumbModeAluInstruction::Ror => Mnemonic::Mov,
                ThumbModeAluInstruction::Adc => Mnemonic::Adc,
                ThumbModeAluInstruction::Sbc => Mnemonic::Sbc,
                ThumbModeAluInstruction::Tst => Mnemonic::Tst,
                ThumbModeAluInstruction::Neg => Mnemonic::Rsb,
                ThumbModeAluInstruction::Cmp => Mnemonic::Cmp,
                ThumbModeAluInstruction::Cmn => Mnemonic::Cmn,
                ThumbModeAluInstruction::Orr => Mnemonic::Orr,
                ThumbModeAluInstruction::Mul => Mnemonic::Mul,
                ThumbModeAluInstruction::Bic => Mnemonic::Bic,
                ThumbModeAluInstruction::Mvn => Mnemonic::Mvn,
            },
            Self::HiRegisterOpBX {
                register_operation, ..
            } => match register_operation {
                ThumbHighRegisterOperation::Add => Mnemonic::Add,
                ThumbHighRegisterOperation::Cmp => Mnemonic::Cmp,
                ThumbHighRegisterOperation::Mov => Mnemonic::Mov,
                ThumbHighRegisterOperation::Bx => Mnemonic::Bx,
            },
            Self::PCRelativeLoad { .. } => Mnemonic::Ldr,
            Self::LoadStoreRegisterOffset { load_store, .. }
            | Self::LoadStoreImmOffset { load_store, .. }
            | Self::LoadStoreHalfword { load_store, .. }
            | Self::SPRelativeLoadStore { load_store, .. } => match load_store {
                LoadStoreKind::Load => Mnemonic::Ldr,
                LoadStoreKind::Store => Mnemonic::Str,
            },
            Self::LoadStoreSignExtByteHalfword {
                h_flag: false,
                sign_extend_flag: false,
                ..
            } => Mnemonic::Str,
            Self::LoadStoreSignExtByteHalfword { .. } => Mnemonic::Ldr,
            Self::PushPopReg { load_store, .. } | Self::MultipleLoadStore { load_store, .. } => {
                match load_store {
                    LoadStoreKind::Load => Mnemonic::Ldm,
                    LoadStoreKind::Store => Mnemonic::Stm,
                }
            }
            Self::CondBranch { .. } | Self::UncondBranch { .. } => Mnemonic::B,
            Self::Swi { .. } => Mnemonic::Swi,
            Self::LongBranchLink { .. } => Mnemonic::Bl,
            Self::Undefined => return None,
        };

        Some(mnemonic)
    }
}

impl std::fmt::Display for ThumbModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => {
                // LSR #0 and ASR #0 encode a shift by 32.
                let amount = if *offset5 == 0 && *shift_operation != ShiftKind::Lsl {
                    32
                } else {
                    *offset5
                };
                write!(
                    f,
                    "{shift_operation} R{destination_register}, R{source_register}, #{amount}"
                )
            }
            Self::AddSubtract {
                operand_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => {
                let op = if *subtract { "SUB" } else { "ADD" };
                match operand_kind {
                    OperandKind::Immediate => write!(
                        f,
                        "{op} R{destination_register}, R{source_register}, #{rn_offset3}"
                    ),
                    OperandKind::Register => write!(
                        f,
                        "{op} R{destination_register}, R{source_register}, R{rn_offset3}"
                    ),
                }
            }
            Self::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => write!(f, "{operation} R{destination_register}, #{offset}"),
            Self::AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => write!(f, "{alu_operation} R{destination_register}, R{source_register}"),
            Self::HiRegisterOpBX {
                register_operation: ThumbHighRegisterOperation::Bx,
                source_register,
                ..
            } => write!(f, "BX R{source_register}"),
            Self::HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => write!(
                f,
                "{register_operation} R{destination_register}, R{source_register}"
            ),
            Self::PCRelativeLoad {
                destination_register,
                offset,
            } => write!(f, "LDR R{destination_register}, [PC, #{offset}]"),
            Self::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                offset_register,
                base_register,
                destination_register,
            } => {
                let b = if *byte_word == ReadWriteKind::Byte { "B" } else { "" };
                write!(
                    f,
                    "{load_store}{b} R{destination_register}, [R{base_register}, R{offset_register}]"
                )
            }
            Self::LoadStoreSignExtByteHalfword {
                h_flag,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            } => {
                let op = match (sign_extend_flag, h_flag) {
                    (false, false) => "STRH",
                    (false, true) => "LDRH",
                    (true, false) => "LDSB",
                    (true, true) => "LDSH",
                };
                write!(
                    f,
                    "{op} R{destination_register}, [R{base_register}, R{offset_register}]"
                )
            }
            Self::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            } => {
                let b = if *byte_word == ReadWriteKind::Byte { "B" } else { "" };
                write!(
                    f,
                    "{load_store}{b} R{destination_register}, [R{base_register}, #{offset}]"
                )
            }
            Self::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => write!(
                f,
                "{load_store}H R{source_destination_register}, [R{base_register}, #{offset}]"
            ),
            Self::SPRelativeLoadStore {
                load_store,
                destination_register,
                offset,
            } => write!(f, "{load_store} R{destination_register}, [SP, #{offset}]"),
            Self::LoadAddress {
                sp,
                destination_register,
                offset,
            } => {
                let base = if *sp { "SP" } else { "PC" };
                write!(f, "ADD R{destination_register}, {base}, #{offset}")
            }
            Self::AddOffsetSP { negative, offset } => {
                let sign = if *negative { "-" } else { "" };
                write!(f, "ADD SP, #{sign}{offset}")
            }
            Self::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => {
                let (op, extra) = match load_store {
                    LoadStoreKind::Store => ("PUSH", 1 << 14),
                    LoadStoreKind::Load => ("POP", 1 << 15),
                };
                let list = if *pc_lr {
                    register_list | extra
                } else {
                    *register_list
                };
                write!(f, "{op} {{{}}}", format_register_list(list))
            }
            Self::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Store => "STMIA",
                    LoadStoreKind::Load => "LDMIA",
                };
                write!(
                    f,
                    "{op} R{base_register}!, {{{}}}",
                    format_register_list(*register_list)
                )
            }
            Self::CondBranch {
                condition,
                immediate_offset,
            } => write!(f, "B{condition} PC{:+}", immediate_offset + 4),
            Self::Swi { comment } => write!(f, "SWI #0x{comment:X}"),
            Self::UncondBranch { offset } => write!(f, "B PC{:+}", offset + 4),
            Self::LongBranchLink {
                low_half: false,
                offset,
            } => {
                let offset = (offset << 12).sign_extended(23) as i32;
                write!(f, "BL LR, PC{:+}", offset + 4)
            }
            Self::LongBranchLink {
                low_half: true,
                offset,
            } => write!(f, "BL LR+{}", offset << 1),
            Self::Undefined => f.write_str("UND"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_move_shifted_register() {
        let instruction = ThumbModeInstruction::from(0x0088);
        assert_eq!(
            instruction,
            ThumbModeInstruction::MoveShiftedRegister {
                shift_operation: ShiftKind::Lsl,
                offset5: 2,
                source_register: 1,
                destination_register: 0,
            }
        );
        assert_eq!(instruction.to_string(), "LSL R0, R1, #2");
        assert_eq!(ThumbModeInstruction::from(0x081A).to_string(), "LSR R2, R3, #32");
    }

    #[test]
    fn decode_add_subtract() {
        assert_eq!(ThumbModeInstruction::from(0x1888).to_string(), "ADD R0, R1, R2");
        let instruction = ThumbModeInstruction::from(0x1EC8);
        assert_eq!(
            instruction,
            ThumbModeInstruction::AddSubtract {
                operand_kind: OperandKind::Immediate,
                subtract: true,
                rn_offset3: 3,
                source_register: 1,
                destination_register: 0,
            }
        );
        assert_eq!(instruction.to_string(), "SUB R0, R1, #3");
        assert_eq!(instruction.mnemonic(), Some(Mnemonic::Sub));
    }

    #[test]
    fn decode_immediate_and_alu_operations() {
        assert_eq!(ThumbModeInstruction::from(0x2005).to_string(), "MOV R0, #5");
        assert_eq!(ThumbModeInstruction::from(0x2910).to_string(), "CMP R1, #16");
        assert_eq!(ThumbModeInstruction::from(0x4008).to_string(), "AND R0, R1");

        let neg = ThumbModeInstruction::from(0x4248);
        assert_eq!(neg.to_string(), "NEG R0, R1");
        assert_eq!(neg.mnemonic(), Some(Mnemonic::Rsb));
    }

    #[test]
    fn decode_hi_register_operations() {
        assert_eq!(ThumbModeInstruction::from(0x4488).to_string(), "ADD R8, R1");
        assert_eq!(ThumbModeInstruction::from(0x4640).to_string(), "MOV R0, R8");

        let bx = ThumbModeInstruction::from(0x4770);
        assert_eq!(
            bx,
            ThumbModeInstruction::HiRegisterOpBX {
                register_operation: ThumbHighRegisterOperation::Bx,
                source_register: 14,
                destination_register: 0,
            }
        );
        assert_eq!(bx.to_string(), "BX R14");
    }

    #[test]
    fn decode_loads_and_stores() {
        let cases = [
            (0x4802, "LDR R0, [PC, #8]"),
            (0x5088, "STR R0, [R1, R2]"),
            (0x5C88, "LDRB R0, [R1, R2]"),
            (0x5288, "STRH R0, [R1, R2]"),
            (0x5A88, "LDRH R0, [R1, R2]"),
            (0x5688, "LDSB R0, [R1, R2]"),
            (0x5E88, "LDSH R0, [R1, R2]"),
            (0x688A, "LDR R2, [R1, #8]"),
            (0x70CA, "STRB R2, [R1, #3]"),
            (0x8041, "STRH R1, [R0, #2]"),
            (0x9802, "LDR R0, [SP, #8]"),
            (0xA002, "ADD R0, PC, #8"),
            (0xA901, "ADD R1, SP, #4"),
            (0xB082, "ADD SP, #-8"),
        ];

        for (op_code, text) in cases {
            assert_eq!(ThumbModeInstruction::from(op_code).to_string(), text);
        }
    }

    #[test]
    fn decode_block_transfers() {
        assert_eq!(ThumbModeInstruction::from(0xB503).to_string(), "PUSH {R0, R1, R14}");
        assert_eq!(ThumbModeInstruction::from(0xBD03).to_string(), "POP {R0, R1, R15}");
        assert_eq!(ThumbModeInstruction::from(0xC203).to_string(), "STMIA R2!, {R0, R1}");

        let ldmia = ThumbModeInstruction::from(0xCA03);
        assert_eq!(ldmia.to_string(), "LDMIA R2!, {R0, R1}");
        assert_eq!(ldmia.mnemonic(), Some(Mnemonic::Ldm));
    }

    #[test]
    fn decode_branches() {
        assert_eq!(
            ThumbModeInstruction::from(0xD002),
            ThumbModeInstruction::CondBranch {
                condition: Condition::EQ,
                immediate_offset: 4,
            }
        );
        assert_eq!(ThumbModeInstruction::from(0xD1FE).to_string(), "BNE PC+0");
        assert_eq!(ThumbModeInstruction::from(0xDF12).to_string(), "SWI #0x12");
        assert_eq!(
            ThumbModeInstruction::from(0xE7FE),
            ThumbModeInstruction::UncondBranch { offset: -4 }
        );
        assert_eq!(ThumbModeInstruction::from(0xF000).to_string(), "BL LR, PC+4");
        assert_eq!(ThumbModeInstruction::from(0xF880).to_string(), "BL LR+256");
        assert_eq!(
            ThumbModeInstruction::from(0xF7FF).to_string(),
            "BL LR, PC-4092"
        );
    }

    #[test]
    fn undocumented_encodings_are_undefined() {
        // Condition 1110 in a conditional branch, the BLX suffix and a
        // misc 1011 encoding that is neither PUSH/POP nor ADD SP.
        for op_code in [0xDE00, 0xE800, 0xB100] {
            let instruction = ThumbModeInstruction::from(op_code);
            assert_eq!(instruction, ThumbModeInstruction::Undefined);
            assert_eq!(instruction.mnemonic(), None);
            assert_eq!(instruction.to_string(), "UND");
        }
    }

    #[test]
    fn every_halfword_decodes() {
        for op_code in 0..=u16::MAX {
            let instruction = ThumbModeInstruction::from(op_code);
            assert_eq!(
                instruction.mnemonic().is_none(),
                instruction == ThumbModeInstruction::Undefined
            );
        }
    }
}
