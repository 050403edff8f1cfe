//! # ARM Instruction Decoding
//!
//! Turns a 32-bit word into an [`ArmModeInstruction`]. Decoding never fails:
//! every encoding that is not a documented instruction becomes
//! [`ArmModeInstruction::Undefined`] and takes the undefined trap when executed.
//!
//! ## Decoding Priority
//!
//! Some encodings overlap, the decoder checks them in this order:
//!
//! 1. Branch and Exchange (BX)
//! 2. Multiply (MUL, MLA)
//! 3. Multiply Long (UMULL, UMLAL, SMULL, SMLAL)
//! 4. Single Data Swap (SWP, SWPB)
//! 5. Halfword Data Transfer (LDRH, STRH, LDRSB, LDRSH)
//! 6. Undefined (`011` with bit 4 set)
//! 7. Software Interrupt (SWI)
//! 8. Coprocessor register transfer and data operation (MCR, MRC, CDP)
//! 9. Coprocessor data transfer (LDC, STC)
//! 10. Block Data Transfer (LDM, STM)
//! 11. Branch (B, BL)
//! 12. Single Data Transfer (LDR, STR)
//! 13. PSR Transfer (MRS, MSR) and Data Processing
//!
//! ## Instruction Encoding Example
//!
//! ```text
//! ADD R0, R1, R2, LSL #3
//!
//! 31-28  27-26  25  24-21  20  19-16  15-12  11-7   6-5  4  3-0
//! [1110] [ 00 ] [0] [0100] [0] [0001] [0000] [00011][00] [0][0010]
//!   ↑       ↑    ↑    ↑     ↑    ↑      ↑      ↑     ↑   ↑   ↑
//!   │       │    │    │     │    │      │      │     │   │   └─ Rm = R2
//!   │       │    │    │     │    │      │      │     │   └──── Shift by imm
//!   │       │    │    │     │    │      │      │     └──────── LSL
//!   │       │    │    │     │    │      │      └────────────── Shift = 3
//!   │       │    │    │     │    │      └───────────────────── Rd = R0
//!   │       │    │    │     │    └──────────────────────────── Rn = R1
//!   │       │    │    │     └───────────────────────────────── S = 0 (no flags)
//!   │       │    │    └─────────────────────────────────────── ADD opcode
//!   │       │    └──────────────────────────────────────────── Register operand
//!   │       └───────────────────────────────────────────────── Data processing
//!   └───────────────────────────────────────────────────────── Always execute
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, MsrOperand, PsrFieldMask, PsrKind, PsrOpKind,
    ShiftOperator,
};
use crate::cpu::condition::Condition;
use crate::cpu::coprocessor::{CdpOperands, RegisterTransferOperands};
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting,
    OperandKind, ReadWriteKind, ShiftKind,
};

/// Documented ARM7TDMI mnemonics.
///
/// Thumb instructions map onto the ARM instruction they are shorthand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mnemonic {
    Adc,
    Add,
    And,
    B,
    Bic,
    Bl,
    Bx,
    Cdp,
    Cmn,
    Cmp,
    Eor,
    Ldc,
    Ldm,
    Ldr,
    Mcr,
    Mla,
    Mov,
    Mrc,
    Mrs,
    Msr,
    Mul,
    Mvn,
    Orr,
    Rsb,
    Rsc,
    Sbc,
    Smlal,
    Smull,
    Stc,
    Stm,
    Str,
    Sub,
    Swi,
    Swp,
    Teq,
    Tst,
    Umlal,
    Umull,
}

impl From<ArmModeAluInstruction> for Mnemonic {
    fn from(op: ArmModeAluInstruction) -> Self {
        match op {
            ArmModeAluInstruction::And => Self::And,
            ArmModeAluInstruction::Eor => Self::Eor,
            ArmModeAluInstruction::Sub => Self::Sub,
            ArmModeAluInstruction::Rsb => Self::Rsb,
            ArmModeAluInstruction::Add => Self::Add,
            ArmModeAluInstruction::Adc => Self::Adc,
            ArmModeAluInstruction::Sbc => Self::Sbc,
            ArmModeAluInstruction::Rsc => Self::Rsc,
            ArmModeAluInstruction::Tst => Self::Tst,
            ArmModeAluInstruction::Teq => Self::Teq,
            ArmModeAluInstruction::Cmp => Self::Cmp,
            ArmModeAluInstruction::Cmn => Self::Cmn,
            ArmModeAluInstruction::Orr => Self::Orr,
            ArmModeAluInstruction::Mov => Self::Mov,
            ArmModeAluInstruction::Bic => Self::Bic,
            ArmModeAluInstruction::Mvn => Self::Mvn,
        }
    }
}

impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = format!("{self:?}").to_uppercase();
        f.write_str(&name)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    /// Register shifted by an immediate amount. Shifting by a register is
    /// not available for transfers.
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: u32,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyVariant {
    Mul,
    Mla,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl ArmModeMultiplyLongVariant {
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Smull | Self::Smlal)
    }

    #[must_use]
    pub const fn accumulates(self) -> bool {
        matches!(self, Self::Umlal | Self::Smlal)
    }
}

impl From<u32> for ArmModeMultiplyLongVariant {
    /// U and A bits (22, 21).
    fn from(op_code: u32) -> Self {
        match (op_code.get_bit(22), op_code.get_bit(21)) {
            (false, false) => Self::Umull,
            (false, true) => Self::Umlal,
            (true, false) => Self::Smull,
            (true, true) => Self::Smlal,
        }
    }
}

impl std::fmt::Display for ArmModeMultiplyLongVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Umull => f.write_str("UMULL"),
            Self::Umlal => f.write_str("UMLAL"),
            Self::Smull => f.write_str("SMULL"),
            Self::Smlal => f.write_str("SMLAL"),
        }
    }
}

/// All ARM instruction types after decoding.
///
/// | Variant                       | Example Instructions | Description                  |
/// |-------------------------------|----------------------|------------------------------|
/// | `DataProcessing`              | AND, ADD, CMP, MOV   | ALU operations               |
/// | `Multiply`                    | MUL, MLA             | 32-bit multiply              |
/// | `MultiplyLong`                | UMULL, SMLAL         | 64-bit multiply              |
/// | `PsrTransfer`                 | MRS, MSR             | Status register access       |
/// | `SingleDataSwap`              | SWP, SWPB            | Atomic memory swap           |
/// | `BranchAndExchange`           | BX                   | Branch + possible ARM↔Thumb  |
/// | `HalfwordDataTransfer`        | LDRH, STRH, LDRSB    | 16-bit and signed transfers  |
/// | `SingleDataTransfer`          | LDR, STR, LDRB       | 32-bit and byte transfers    |
/// | `BlockDataTransfer`           | LDM, STM             | Multiple register transfer   |
/// | `Branch`                      | B, BL                | Branch (and link)            |
/// | `CoprocessorDataTransfer`     | LDC, STC             | Coprocessor memory access    |
/// | `CoprocessorDataOperation`    | CDP                  | Coprocessor internal op      |
/// | `CoprocessorRegisterTransfer` | MCR, MRC             | CPU ↔ coprocessor register   |
/// | `SoftwareInterrupt`           | SWI                  | Supervisor call              |
/// | `Undefined`                   | -                    | Takes the undefined trap     |
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ArmModeInstruction {
    DataProcessing {
        condition: Condition,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    },
    Multiply {
        condition: Condition,
        variant: ArmModeMultiplyVariant,
        should_set_codes: bool,
        rd_destination_register: u32,
        rn_accumulate_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    MultiplyLong {
        condition: Condition,
        variant: ArmModeMultiplyLongVariant,
        should_set_codes: bool,
        rdhi_destination_register: u32,
        rdlo_destination_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    PsrTransfer {
        condition: Condition,
        psr_kind: PsrKind,
        kind: PsrOpKind,
    },
    SingleDataSwap {
        condition: Condition,
        quantity: ReadWriteKind,
        rn: u32,
        rd: u32,
        rm: u32,
    },
    BranchAndExchange {
        condition: Condition,
        register: u32,
    },
    HalfwordDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        condition: Condition,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    },
    BlockDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    },
    Branch {
        condition: Condition,
        link: bool,
        /// Byte offset from the pipelined PC (instruction address + 8).
        offset: i32,
    },
    CoprocessorDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        transfer_length: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        crd: u32,
        cp_number: u32,
        /// In words.
        offset: u32,
    },
    CoprocessorDataOperation {
        condition: Condition,
        operands: CdpOperands,
    },
    CoprocessorRegisterTransfer {
        condition: Condition,
        /// `Load` is MRC (coprocessor to ARM), `Store` is MCR.
        load_store: LoadStoreKind,
        rd: u32,
        operands: RegisterTransferOperands,
    },
    SoftwareInterrupt {
        condition: Condition,
        comment: u32,
    },
    Undefined {
        condition: Condition,
    },
}

impl ArmModeInstruction {
    #[must_use]
    pub const fn condition(&self) -> Condition {
        match self {
            Self::DataProcessing { condition, .. }
            | Self::Multiply { condition, .. }
            | Self::MultiplyLong { condition, .. }
            | Self::PsrTransfer { condition, .. }
            | Self::SingleDataSwap { condition, .. }
            | Self::BranchAndExchange { condition, .. }
            | Self::HalfwordDataTransfer { condition, .. }
            | Self::SingleDataTransfer { condition, .. }
            | Self::BlockDataTransfer { condition, .. }
            | Self::Branch { condition, .. }
            | Self::CoprocessorDataTransfer { condition, .. }
            | Self::CoprocessorDataOperation { condition, .. }
            | Self::CoprocessorRegisterTransfer { condition, .. }
            | Self::SoftwareInterrupt { condition, .. }
            | Self::Undefined { condition } => *condition,
        }
    }

    /// `None` for undefined encodings.
    #[must_use]
    pub const fn mnemonic(&self) -> Option<Mnemonic> {
        let mnemonic = match self {
            Self::DataProcessing {
                alu_instruction, ..
            } => match alu_instruction {
                ArmModeAluInstruction::And => Mnemonic::And,
                ArmModeAluInstruction::Eor => Mnemonic::Eor,
                ArmModeAluInstruction::Sub => Mnemonic::Sub,
                ArmModeAluInstruction::Rsb => Mnemonic::Rsb,
                ArmModeAluInstruction::Add => Mnemonic::Add,
                ArmModeAluInstruction::Adc => Mnemonic::Adc,
                ArmModeAluInstruction::Sbc => Mnemonic::Sbc,
                ArmModeAluInstruction::Rsc => Mnemonic::Rsc,
                ArmModeAluInstruction::Tst => Mnemonic::Tst,
                ArmModeAluInstruction::Teq => Mnemonic::Teq,
                ArmModeAluInstruction::Cmp => Mnemonic::Cmp,
                ArmModeAluInstruction::Cmn => Mnemonic::Cmn,
                ArmModeAluInstruction::Orr => Mnemonic::Orr,
                ArmModeAluInstruction::Mov => Mnemonic::Mov,
                ArmModeAluInstruction::Bic => Mnemonic::Bic,
                ArmModeAluInstruction::Mvn => Mnemonic::Mvn,
            },
            Self::Multiply {
                variant: ArmModeMultiplyVariant::Mul,
                ..
            } => Mnemonic::Mul,
            Self::Multiply {
                variant: ArmModeMultiplyVariant::Mla,
                ..
            } => Mnemonic::Mla,
            Self::MultiplyLong { variant, .. } => match variant {
                ArmModeMultiplyLongVariant::Umull => Mnemonic::Umull,
                ArmModeMultiplyLongVariant::Umlal => Mnemonic::Umlal,
                ArmModeMultiplyLongVariant::Smull => Mnemonic::Smull,
                ArmModeMultiplyLongVariant::Smlal => Mnemonic::Smlal,
            },
            Self::PsrTransfer {
                kind: PsrOpKind::Mrs { .. },
                ..
            } => Mnemonic::Mrs,
            Self::PsrTransfer {
                kind: PsrOpKind::Msr { .. },
                ..
            } => Mnemonic::Msr,
            Self::SingleDataSwap { .. } => Mnemonic::Swp,
            Self::BranchAndExchange { .. } => Mnemonic::Bx,
            Self::HalfwordDataTransfer { load_store, .. }
            | Self::SingleDataTransfer { load_store, .. } => match load_store {
                LoadStoreKind::Load => Mnemonic::Ldr,
                LoadStoreKind::Store => Mnemonic::Str,
            },
            Self::BlockDataTransfer { load_store, .. } => match load_store {
                LoadStoreKind::Load => Mnemonic::Ldm,
                LoadStoreKind::Store => Mnemonic::Stm,
            },
            Self::Branch { link: false, .. } => Mnemonic::B,
            Self::Branch { link: true, .. } => Mnemonic::Bl,
            Self::CoprocessorDataTransfer { load_store, .. } => match load_store {
                LoadStoreKind::Load => Mnemonic::Ldc,
                LoadStoreKind::Store => Mnemonic::Stc,
            },
            Self::CoprocessorDataOperation { .. } => Mnemonic::Cdp,
            Self::CoprocessorRegisterTransfer { load_store, .. } => match load_store {
                LoadStoreKind::Load => Mnemonic::Mrc,
                LoadStoreKind::Store => Mnemonic::Mcr,
            },
            Self::SoftwareInterrupt { .. } => Mnemonic::Swi,
            Self::Undefined { .. } => return None,
        };

        Some(mnemonic)
    }
}

/// `[Rn, <offset>]{!}` or `[Rn], <offset>`, an empty offset is left out.
fn format_address(base: u32, offset: &str, indexing: Indexing, write_back: bool) -> String {
    let separator = if offset.is_empty() { "" } else { ", " };
    match indexing {
        Indexing::Pre => {
            let w = if write_back { "!" } else { "" };
            format!("[R{base}{separator}{offset}]{w}")
        }
        Indexing::Post => format!("[R{base}]{separator}{offset}"),
    }
}

pub(crate) fn format_register_list(register_list: u32) -> String {
    (0..=15u8)
        .filter(|i| register_list.get_bit(*i))
        .map(|i| format!("R{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl std::fmt::Display for ArmModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => {
                let s = if *set_conditions { "S" } else { "" };
                if alu_instruction.is_test() {
                    write!(f, "{alu_instruction}{condition} R{rn}, {op2}")
                } else if matches!(
                    alu_instruction,
                    ArmModeAluInstruction::Mov | ArmModeAluInstruction::Mvn
                ) {
                    write!(f, "{alu_instruction}{condition}{s} R{destination}, {op2}")
                } else {
                    write!(
                        f,
                        "{alu_instruction}{condition}{s} R{destination}, R{rn}, {op2}"
                    )
                }
            }
            Self::Multiply {
                condition,
                variant,
                should_set_codes,
                rd_destination_register: rd,
                rn_accumulate_register: rn,
                rs_operand_register: rs,
                rm_operand_register: rm,
            } => {
                let s = if *should_set_codes { "S" } else { "" };
                match variant {
                    ArmModeMultiplyVariant::Mul => write!(f, "MUL{condition}{s} R{rd}, R{rm}, R{rs}"),
                    ArmModeMultiplyVariant::Mla => {
                        write!(f, "MLA{condition}{s} R{rd}, R{rm}, R{rs}, R{rn}")
                    }
                }
            }
            Self::MultiplyLong {
                condition,
                variant,
                should_set_codes,
                rdhi_destination_register: hi,
                rdlo_destination_register: lo,
                rs_operand_register: rs,
                rm_operand_register: rm,
            } => {
                let s = if *should_set_codes { "S" } else { "" };
                write!(f, "{variant}{condition}{s} R{lo}, R{hi}, R{rm}, R{rs}")
            }
            Self::PsrTransfer {
                condition,
                psr_kind,
                kind,
            } => match kind {
                PsrOpKind::Mrs {
                    destination_register,
                } => write!(f, "MRS{condition} R{destination_register}, {psr_kind}"),
                PsrOpKind::Msr {
                    field_mask,
                    operand: MsrOperand::Register(rm),
                } => write!(f, "MSR{condition} {psr_kind}_{field_mask}, R{rm}"),
                PsrOpKind::Msr {
                    field_mask,
                    operand: MsrOperand::Immediate(value),
                } => write!(f, "MSR{condition} {psr_kind}_{field_mask}, #0x{value:X}"),
            },
            Self::SingleDataSwap {
                condition,
                quantity,
                rn,
                rd,
                rm,
            } => {
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                write!(f, "SWP{condition}{b} R{rd}, R{rm}, [R{rn}]")
            }
            Self::BranchAndExchange {
                condition,
                register,
            } => write!(f, "BX{condition} R{register}"),
            Self::HalfwordDataTransfer {
                condition,
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => {
                let sign = if *offsetting == Offsetting::Down { "-" } else { "" };
                let offset = match offset_kind {
                    HalfwordDataTransferOffsetKind::Immediate { offset: 0 } => String::new(),
                    HalfwordDataTransferOffsetKind::Immediate { offset } => {
                        format!("#{sign}{offset}")
                    }
                    HalfwordDataTransferOffsetKind::Register { register } => {
                        format!("{sign}R{register}")
                    }
                };
                let address = format_address(*base_register, &offset, *indexing, *write_back);
                write!(
                    f,
                    "{load_store}{condition}{transfer_kind} R{source_destination_register}, {address}"
                )
            }
            Self::SingleDataTransfer {
                condition,
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            } => {
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                // Post-indexed with W set is the user-mode (translated) access.
                let t = if *indexing == Indexing::Post && *write_back { "T" } else { "" };
                let sign = if *offsetting == Offsetting::Down { "-" } else { "" };
                let offset = match offset_info {
                    SingleDataTransferOffsetInfo::Immediate { offset: 0 } => String::new(),
                    SingleDataTransferOffsetInfo::Immediate { offset } => {
                        format!("#{sign}{offset}")
                    }
                    SingleDataTransferOffsetInfo::RegisterImmediate {
                        shift_amount,
                        shift_kind,
                        reg_offset,
                    } => AluSecondOperandInfo::Register {
                        shift_op: ShiftOperator::Immediate(*shift_amount),
                        shift_kind: *shift_kind,
                        register: *reg_offset,
                    }
                    .to_string()
                    .replacen('R', &format!("{sign}R"), 1),
                };
                let address = format_address(*base_register, &offset, *indexing, *write_back);
                write!(f, "{load_store}{condition}{b}{t} R{rd}, {address}")
            }
            Self::BlockDataTransfer {
                condition,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Store => "STM",
                    LoadStoreKind::Load => "LDM",
                };
                let offset_modifier = match offsetting {
                    Offsetting::Down => "D",
                    Offsetting::Up => "I",
                };
                let index_type = match indexing {
                    Indexing::Pre => "B",
                    Indexing::Post => "A",
                };
                let w = if *write_back { "!" } else { "" };
                let hat = if *load_psr { "^" } else { "" };
                let registers = format_register_list(*register_list);
                write!(
                    f,
                    "{op}{condition}{offset_modifier}{index_type} R{rn}{w}, {{{registers}}}{hat}"
                )
            }
            Self::Branch {
                condition,
                link,
                offset,
            } => {
                let l = if *link { "L" } else { "" };
                // Relative to the address of the branch itself.
                write!(f, "B{l}{condition} PC{:+}", offset + 8)
            }
            Self::CoprocessorDataTransfer {
                condition,
                indexing,
                offsetting,
                transfer_length,
                write_back,
                load_store,
                rn,
                crd,
                cp_number,
                offset,
            } => {
                let op = match load_store {
                    LoadStoreKind::Store => "STC",
                    LoadStoreKind::Load => "LDC",
                };
                let l = if *transfer_length { "L" } else { "" };
                let sign = if *offsetting == Offsetting::Down { "-" } else { "" };
                let offset = if *offset == 0 {
                    String::new()
                } else {
                    format!("#{sign}{}", offset * 4)
                };
                let address = format_address(*rn, &offset, *indexing, *write_back);
                write!(f, "{op}{condition}{l} p{cp_number}, c{crd}, {address}")
            }
            Self::CoprocessorDataOperation {
                condition,
                operands,
            } => write!(
                f,
                "CDP{condition} p{}, {}, c{}, c{}, c{}, {}",
                operands.cp_number,
                operands.cp_opcode,
                operands.crd,
                operands.crn,
                operands.crm,
                operands.cp_info
            ),
            Self::CoprocessorRegisterTransfer {
                condition,
                load_store,
                rd,
                operands,
            } => {
                let op = match load_store {
                    LoadStoreKind::Store => "MCR",
                    LoadStoreKind::Load => "MRC",
                };
                write!(
                    f,
                    "{op}{condition} p{}, {}, R{rd}, c{}, c{}, {}",
                    operands.cp_number,
                    operands.cp_opcode,
                    operands.crn,
                    operands.crm,
                    operands.cp_info
                )
            }
            Self::SoftwareInterrupt { condition, comment } => {
                write!(f, "SWI{condition} #0x{comment:X}")
            }
            Self::Undefined { condition } => write!(f, "UND{condition}"),
        }
    }
}

impl ArmModeInstruction {
    /// MRS, MSR or an undefined encoding living in the TST/TEQ/CMP/CMN space with S=0.
    fn decode_psr_transfer(op_code: u32, condition: Condition) -> Self {
        let psr_kind = PsrKind::from(op_code.get_bit(22));
        let immediate = op_code.get_bit(25);

        if !op_code.get_bit(21) {
            if !immediate && op_code.get_bits(16..=19) == 0b1111 {
                return Self::PsrTransfer {
                    condition,
                    psr_kind,
                    kind: PsrOpKind::Mrs {
                        destination_register: op_code.get_bits(12..=15),
                    },
                };
            }
        } else if op_code.get_bits(12..=15) == 0b1111 {
            let field_mask = PsrFieldMask(op_code.get_bits(16..=19));
            if immediate {
                let rotate = op_code.get_bits(8..=11) * 2;
                let value = op_code.get_bits(0..=7).rotate_right(rotate);
                return Self::PsrTransfer {
                    condition,
                    psr_kind,
                    kind: PsrOpKind::Msr {
                        field_mask,
                        operand: MsrOperand::Immediate(value),
                    },
                };
            } else if op_code.get_bits(4..=11) == 0 {
                return Self::PsrTransfer {
                    condition,
                    psr_kind,
                    kind: PsrOpKind::Msr {
                        field_mask,
                        operand: MsrOperand::Register(op_code.get_bits(0..=3)),
                    },
                };
            }
        }

        tracing::debug!("undefined instruction decode: opcode=0x{op_code:08X} in the PSR space");
        Self::Undefined { condition }
    }
}

impl From<u32> for ArmModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn from(op_code: u32) -> Self {
        let condition = Condition::from(op_code.get_bits(28..=31));
        // NOTE: The order is based on how many bits are already known at decoding time,
        // the most specific patterns are tested first.
        if op_code.get_bits(4..=27) == 0b0001_0010_1111_1111_1111_0001 {
            Self::BranchAndExchange {
                condition,
                register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(22..=27) == 0b00_0000 && op_code.get_bits(4..=7) == 0b1001 {
            let variant = if op_code.get_bit(21) {
                ArmModeMultiplyVariant::Mla
            } else {
                ArmModeMultiplyVariant::Mul
            };

            Self::Multiply {
                condition,
                variant,
                should_set_codes: op_code.get_bit(20),
                rd_destination_register: op_code.get_bits(16..=19),
                rn_accumulate_register: op_code.get_bits(12..=15),
                rs_operand_register: op_code.get_bits(8..=11),
                rm_operand_register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(23..=27) == 0b00001 && op_code.get_bits(4..=7) == 0b1001 {
            Self::MultiplyLong {
                condition,
                variant: ArmModeMultiplyLongVariant::from(op_code),
                should_set_codes: op_code.get_bit(20),
                rdhi_destination_register: op_code.get_bits(16..=19),
                rdlo_destination_register: op_code.get_bits(12..=15),
                rs_operand_register: op_code.get_bits(8..=11),
                rm_operand_register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(23..=27) == 0b00010
            && op_code.get_bits(20..=21) == 0b00
            && op_code.get_bits(4..=11) == 0b0000_1001
        {
            Self::SingleDataSwap {
                condition,
                quantity: op_code.get_bit(22).into(),
                rn: op_code.get_bits(16..=19),
                rd: op_code.get_bits(12..=15),
                rm: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(25..=27) == 0b000 && op_code.get_bit(7) && op_code.get_bit(4) {
            let Ok(transfer_kind) = HalfwordTransferKind::try_from(op_code.get_bits(5..=6)) else {
                tracing::debug!(
                    "undefined instruction decode: opcode=0x{op_code:08X}, multiply space"
                );
                return Self::Undefined { condition };
            };
            let load_store: LoadStoreKind = op_code.get_bit(20).into();
            if load_store == LoadStoreKind::Store
                && transfer_kind != HalfwordTransferKind::UnsignedHalfwords
            {
                tracing::debug!(
                    "undefined instruction decode: opcode=0x{op_code:08X}, signed store"
                );
                return Self::Undefined { condition };
            }

            let operand_kind: OperandKind = op_code.get_bit(22).into();
            let offset_kind = match operand_kind {
                OperandKind::Register => HalfwordDataTransferOffsetKind::Register {
                    register: op_code.get_bits(0..=3),
                },
                OperandKind::Immediate => HalfwordDataTransferOffsetKind::Immediate {
                    offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                },
            };

            Self::HalfwordDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                write_back: op_code.get_bit(21),
                load_store,
                offset_kind,
                base_register: op_code.get_bits(16..=19),
                source_destination_register: op_code.get_bits(12..=15),
                transfer_kind,
            }
        } else if op_code.get_bits(25..=27) == 0b011 && op_code.get_bit(4) {
            tracing::debug!(
                "undefined instruction decode: opcode=0x{op_code:08X}, bits[25-27]=0b011, bit[4]=1"
            );
            Self::Undefined { condition }
        } else if op_code.get_bits(24..=27) == 0b1111 {
            Self::SoftwareInterrupt {
                condition,
                comment: op_code.get_bits(0..=23),
            }
        } else if op_code.get_bits(24..=27) == 0b1110 {
            if op_code.get_bit(4) {
                Self::CoprocessorRegisterTransfer {
                    condition,
                    load_store: op_code.get_bit(20).into(),
                    rd: op_code.get_bits(12..=15),
                    operands: RegisterTransferOperands {
                        cp_opcode: op_code.get_bits(21..=23),
                        crn: op_code.get_bits(16..=19),
                        cp_number: op_code.get_bits(8..=11),
                        cp_info: op_code.get_bits(5..=7),
                        crm: op_code.get_bits(0..=3),
                    },
                }
            } else {
                Self::CoprocessorDataOperation {
                    condition,
                    operands: CdpOperands {
                        cp_opcode: op_code.get_bits(20..=23),
                        crn: op_code.get_bits(16..=19),
                        crd: op_code.get_bits(12..=15),
                        cp_number: op_code.get_bits(8..=11),
                        cp_info: op_code.get_bits(5..=7),
                        crm: op_code.get_bits(0..=3),
                    },
                }
            }
        } else if op_code.get_bits(25..=27) == 0b110 {
            Self::CoprocessorDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                transfer_length: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: op_code.get_bits(16..=19),
                crd: op_code.get_bits(12..=15),
                cp_number: op_code.get_bits(8..=11),
                offset: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(25..=27) == 0b100 {
            Self::BlockDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: op_code.get_bits(16..=19),
                register_list: op_code.get_bits(0..=15),
            }
        } else if op_code.get_bits(25..=27) == 0b101 {
            let offset = (op_code.get_bits(0..=23) << 2).sign_extended(26) as i32;
            Self::Branch {
                condition,
                link: op_code.get_bit(24),
                offset,
            }
        } else if op_code.get_bits(26..=27) == 0b01 {
            // NOTE: This bit is negated because the meaning is inverted in SingleDataTransfer then other instructions.
            let op_kind: OperandKind = (!op_code.get_bit(25)).into();
            let offset_info = match op_kind {
                OperandKind::Immediate => SingleDataTransferOffsetInfo::Immediate {
                    offset: op_code.get_bits(0..=11),
                },
                OperandKind::Register => SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: op_code.get_bits(7..=11),
                    shift_kind: op_code.get_bits(5..=6).into(),
                    reg_offset: op_code.get_bits(0..=3),
                },
            };

            Self::SingleDataTransfer {
                condition,
                load_store: op_code.get_bit(20).into(),
                quantity: op_code.get_bit(22).into(),
                write_back: op_code.get_bit(21),
                indexing: op_code.get_bit(24).into(),
                rd: op_code.get_bits(12..=15),
                base_register: op_code.get_bits(16..=19),
                offset_info,
                offsetting: op_code.get_bit(23).into(),
            }
        } else {
            let alu_instruction = ArmModeAluInstruction::from(op_code.get_bits(21..=24));
            let set_conditions = op_code.get_bit(20);

            if alu_instruction.is_test() && !set_conditions {
                return Self::decode_psr_transfer(op_code, condition);
            }

            let op_kind: OperandKind = op_code.get_bit(25).into();
            let op2 = match op_kind {
                OperandKind::Immediate => AluSecondOperandInfo::Immediate {
                    base: op_code.get_bits(0..=7),
                    shift: op_code.get_bits(8..=11) * 2,
                },
                OperandKind::Register => {
                    let shift_op = if op_code.get_bit(4) {
                        ShiftOperator::Register(op_code.get_bits(8..=11))
                    } else {
                        ShiftOperator::Immediate(op_code.get_bits(7..=11))
                    };
                    AluSecondOperandInfo::Register {
                        shift_op,
                        shift_kind: op_code.get_bits(5..=6).into(),
                        register: op_code.get_bits(0..=3),
                    }
                }
            };

            Self::DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                rn: op_code.get_bits(16..=19),
                destination: op_code.get_bits(12..=15),
                op2,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn disassemble(op_code: u32) -> String {
        ArmModeInstruction::from(op_code).to_string()
    }

    #[test]
    fn decode_data_processing() {
        assert_eq!(
            ArmModeInstruction::from(0xE081_0002),
            ArmModeInstruction::DataProcessing {
                condition: Condition::AL,
                alu_instruction: ArmModeAluInstruction::Add,
                set_conditions: false,
                rn: 1,
                destination: 0,
                op2: AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Immediate(0),
                    shift_kind: ShiftKind::Lsl,
                    register: 2,
                },
            }
        );
        assert_eq!(disassemble(0xE081_0002), "ADD R0, R1, R2");
        assert_eq!(disassemble(0xE3A0_0001), "MOV R0, #1");
        assert_eq!(disassemble(0x0351_0000), "CMPEQ R1, #0");
        assert_eq!(disassemble(0xE1B0_1102), "MOVS R1, R2, LSL #2");
    }

    #[test]
    fn decode_branches() {
        assert_eq!(
            ArmModeInstruction::from(0xEAFF_FFFE),
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: false,
                offset: -8,
            }
        );
        assert_eq!(disassemble(0xEAFF_FFFE), "B PC+0");
        assert_eq!(disassemble(0xEB00_0000), "BL PC+8");
        assert_eq!(disassemble(0xE12F_FF11), "BX R1");
    }

    #[test]
    fn decode_multiplies_and_swap() {
        assert_eq!(disassemble(0xE000_0291), "MUL R0, R1, R2");
        assert_eq!(disassemble(0xE081_0392), "UMULL R0, R1, R2, R3");
        assert_eq!(disassemble(0xE102_0091), "SWP R0, R1, [R2]");
        assert_eq!(disassemble(0xE142_0091), "SWPB R0, R1, [R2]");
    }

    #[test]
    fn decode_transfers() {
        assert_eq!(disassemble(0xE1D1_00B2), "LDRH R0, [R1, #2]");
        assert_eq!(disassemble(0xE591_0004), "LDR R0, [R1, #4]");
        assert_eq!(disassemble(0xE511_0004), "LDR R0, [R1, #-4]");
        assert_eq!(disassemble(0xE4D1_0001), "LDRB R0, [R1], #1");
        assert_eq!(disassemble(0xE92D_4001), "STMDB R13!, {R0, R14}");
        assert_eq!(disassemble(0xE8BD_8001), "LDMIA R13!, {R0, R15}");
    }

    #[test]
    fn decode_psr_transfers() {
        assert_eq!(disassemble(0xE10F_0000), "MRS R0, CPSR");
        assert_eq!(disassemble(0xE14F_0000), "MRS R0, SPSR");
        assert_eq!(disassemble(0xE129_F000), "MSR CPSR_cf, R0");
        assert_eq!(
            ArmModeInstruction::from(0xE328_F20F),
            ArmModeInstruction::PsrTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::Msr {
                    field_mask: PsrFieldMask(0b1000),
                    operand: MsrOperand::Immediate(0xF000_0000),
                },
            }
        );
    }

    #[test]
    fn decode_system_and_coprocessor() {
        assert_eq!(disassemble(0xEF00_0012), "SWI #0x12");
        assert_eq!(disassemble(0xEE01_0F10), "MCR p15, 0, R0, c1, c0, 0");
        assert_eq!(disassemble(0xEE11_0F10), "MRC p15, 0, R0, c1, c0, 0");
        assert_eq!(disassemble(0xEE24_31C5), "CDP p1, 2, c3, c4, c5, 6");
        assert_eq!(disassemble(0xED94_3202), "LDC p2, c3, [R4, #8]");
    }

    #[test]
    fn undefined_encodings() {
        for op_code in [0xE7F0_00F0, 0xE100_0000, 0xE1A0_00D0 | 0x0040_0000] {
            let instruction = ArmModeInstruction::from(op_code);
            assert!(
                matches!(instruction, ArmModeInstruction::Undefined { .. }),
                "0x{op_code:08X} decoded as {instruction:?}"
            );
            assert_eq!(instruction.mnemonic(), None);
        }
    }

    #[test]
    fn every_documented_mnemonic_is_reachable() {
        let samples = [
            (0xE0A1_0002, Mnemonic::Adc),
            (0xE081_0002, Mnemonic::Add),
            (0xE001_0002, Mnemonic::And),
            (0xEAFF_FFFE, Mnemonic::B),
            (0xE1C1_0002, Mnemonic::Bic),
            (0xEB00_0000, Mnemonic::Bl),
            (0xE12F_FF11, Mnemonic::Bx),
            (0xEE24_31C5, Mnemonic::Cdp),
            (0xE171_0002, Mnemonic::Cmn),
            (0xE151_0002, Mnemonic::Cmp),
            (0xE021_0002, Mnemonic::Eor),
            (0xED94_3202, Mnemonic::Ldc),
            (0xE8BD_8001, Mnemonic::Ldm),
            (0xE591_0004, Mnemonic::Ldr),
            (0xEE01_0F10, Mnemonic::Mcr),
            (0xE020_3291, Mnemonic::Mla),
            (0xE3A0_0001, Mnemonic::Mov),
            (0xEE11_0F10, Mnemonic::Mrc),
            (0xE10F_0000, Mnemonic::Mrs),
            (0xE129_F000, Mnemonic::Msr),
            (0xE000_0291, Mnemonic::Mul),
            (0xE1E0_0002, Mnemonic::Mvn),
            (0xE181_0002, Mnemonic::Orr),
            (0xE061_0002, Mnemonic::Rsb),
            (0xE0E1_0002, Mnemonic::Rsc),
            (0xE0C1_0002, Mnemonic::Sbc),
            (0xED84_3202, Mnemonic::Stc),
            (0xE92D_4001, Mnemonic::Stm),
            (0xE581_0004, Mnemonic::Str),
            (0xE041_0002, Mnemonic::Sub),
            (0xEF00_0012, Mnemonic::Swi),
            (0xE102_0091, Mnemonic::Swp),
            (0xE131_0002, Mnemonic::Teq),
            (0xE111_0002, Mnemonic::Tst),
        ];

        for (op_code, mnemonic) in samples {
            assert_eq!(
                ArmModeInstruction::from(op_code).mnemonic(),
                Some(mnemonic),
                "0x{op_code:08X}"
            );
        }
        assert_eq!(Mnemonic::Swp.to_string(), "SWP");
    }
}
