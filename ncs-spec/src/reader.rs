//! # Module Reader
//!
//! Decodes an NCS buffer into a [`Program`].
//!
//! ```text
//! Offset  Size  Field
//! ──────────────────────────────────
//! 0x00    8     signature ("NCS V1.0")
//! 0x08    1     size marker (0x42)
//! 0x09    4     total module size (big-endian)
//! 0x0D    ...   instructions
//! ```
//!
//! Decoding is a closed dispatch over (opcode, qualifier) pairs. Any pair
//! outside the instruction set fails the whole load.

use crate::encoding::ByteReader;
use crate::error::{NcsError, Result};
use crate::instruction::{
    ArithmeticOperands, Constant, EqualityOperands, NumericOperands, NumericType, Operation,
};
use crate::opcode::{Opcode, Qualifier, QUALIFIER_COPY, QUALIFIER_NONE, QUALIFIER_NOP, QUALIFIER_STATE};
use crate::program::Program;
use crate::types::SlotType;
use crate::{HEADER_SIZE, SIGNATURE, SIZE_MARKER};
use tracing::debug;

/// Decode a module buffer
pub fn read_program(name: &str, bytes: &[u8]) -> Result<Program> {
    let truncated = |_: NcsError| NcsError::TruncatedHeader {
        expected: HEADER_SIZE as usize,
        found: bytes.len(),
    };

    let mut reader = ByteReader::new(bytes);
    let signature = reader.read_exact(SIGNATURE.len()).map_err(truncated)?;
    if signature != SIGNATURE {
        return Err(NcsError::InvalidSignature {
            found: signature.to_vec(),
        });
    }

    let marker = reader.read_u8().map_err(truncated)?;
    if marker != SIZE_MARKER {
        return Err(NcsError::InvalidSizeMarker { found: marker });
    }

    let declared = reader.read_u32().map_err(truncated)?;
    if declared as usize != bytes.len() {
        return Err(NcsError::SizeMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    reader.limit(declared as usize);

    let mut program = Program::new(name);
    while reader.remaining() > 0 {
        let offset = reader.position() as u32;
        let op = decode_operation(&mut reader, offset)?;
        program.push(op);
    }

    debug!(
        module = name,
        length = declared,
        instructions = program.len(),
        "read module"
    );

    Ok(program)
}

/// Decode one operation starting at `offset`
pub(crate) fn decode_operation(reader: &mut ByteReader<'_>, offset: u32) -> Result<Operation> {
    let opcode_byte = reader.read_u8()?;
    let qualifier_byte = reader.read_u8()?;

    let unsupported = || NcsError::UnsupportedInstruction {
        offset,
        opcode: opcode_byte,
        qualifier: qualifier_byte,
    };
    let fixed = |expected: u8| {
        if qualifier_byte == expected {
            Ok(())
        } else {
            Err(unsupported())
        }
    };
    let typed = || Qualifier::from_u8(qualifier_byte).ok_or_else(unsupported);

    let opcode = Opcode::from_u8(opcode_byte).ok_or_else(unsupported)?;

    let op = match opcode {
        // ========== Stack and Constants ==========
        Opcode::Nop => {
            fixed(QUALIFIER_NOP)?;
            Operation::Nop
        }
        Opcode::CpDownSp | Opcode::CpTopSp | Opcode::CpDownBp | Opcode::CpTopBp => {
            fixed(QUALIFIER_COPY)?;
            let stack_offset = reader.read_i32()?;
            let size = reader.read_u16()?;
            match opcode {
                Opcode::CpDownSp => Operation::CpDownSp { offset: stack_offset, size },
                Opcode::CpTopSp => Operation::CpTopSp { offset: stack_offset, size },
                Opcode::CpDownBp => Operation::CpDownBp { offset: stack_offset, size },
                _ => Operation::CpTopBp { offset: stack_offset, size },
            }
        }
        Opcode::RsAdd => Operation::RsAdd(SlotType::from_qualifier(typed()?).ok_or_else(unsupported)?),
        Opcode::Const => {
            let constant = match typed()? {
                Qualifier::Int => Constant::Int(reader.read_i32()?),
                Qualifier::Float => Constant::Float(reader.read_f32()?),
                Qualifier::String => {
                    let len = reader.read_u16()? as usize;
                    let raw = reader.read_exact(len)?;
                    let value = std::str::from_utf8(raw)
                        .map_err(|_| NcsError::InvalidString { offset })?;
                    Constant::String(value.to_string())
                }
                Qualifier::Object => Constant::Object(reader.read_u32()?),
                _ => return Err(unsupported()),
            };
            Operation::Const(constant)
        }
        Opcode::Action => {
            fixed(QUALIFIER_NONE)?;
            let routine = reader.read_u16()?;
            let arg_count = reader.read_u8()?;
            Operation::Action { routine, arg_count }
        }

        // ========== Int-only binary operators ==========
        Opcode::LogAnd
        | Opcode::LogOr
        | Opcode::IncOr
        | Opcode::ExcOr
        | Opcode::BoolAnd
        | Opcode::ShLeft
        | Opcode::ShRight
        | Opcode::UShRight
        | Opcode::Mod => {
            if typed()? != Qualifier::IntInt {
                return Err(unsupported());
            }
            match opcode {
                Opcode::LogAnd => Operation::LogAnd,
                Opcode::LogOr => Operation::LogOr,
                Opcode::IncOr => Operation::IncOr,
                Opcode::ExcOr => Operation::ExcOr,
                Opcode::BoolAnd => Operation::BoolAnd,
                Opcode::ShLeft => Operation::ShLeft,
                Opcode::ShRight => Operation::ShRight,
                Opcode::UShRight => Operation::UShRight,
                _ => Operation::Mod,
            }
        }

        // ========== Relational ==========
        Opcode::Equal | Opcode::NotEqual => {
            let operands = match typed()? {
                Qualifier::StructStruct => EqualityOperands::StructStruct {
                    size: reader.read_u16()?,
                },
                q => EqualityOperands::from_qualifier(q).ok_or_else(unsupported)?,
            };
            if opcode == Opcode::Equal {
                Operation::Equal(operands)
            } else {
                Operation::NotEqual(operands)
            }
        }
        Opcode::Geq | Opcode::Gt | Opcode::Lt | Opcode::Leq => {
            let operands = NumericOperands::from_qualifier(typed()?).ok_or_else(unsupported)?;
            match opcode {
                Opcode::Geq => Operation::Geq(operands),
                Opcode::Gt => Operation::Gt(operands),
                Opcode::Lt => Operation::Lt(operands),
                _ => Operation::Leq(operands),
            }
        }

        // ========== Arithmetic ==========
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
            let operands = ArithmeticOperands::from_qualifier(typed()?).ok_or_else(unsupported)?;
            let op = match opcode {
                Opcode::Add => Operation::Add(operands),
                Opcode::Sub => Operation::Sub(operands),
                Opcode::Mul => Operation::Mul(operands),
                _ => Operation::Div(operands),
            };
            if !op.is_supported() {
                return Err(unsupported());
            }
            op
        }
        Opcode::Neg => Operation::Neg(NumericType::from_qualifier(typed()?).ok_or_else(unsupported)?),
        Opcode::Comp | Opcode::Not => {
            if typed()? != Qualifier::Int {
                return Err(unsupported());
            }
            if opcode == Opcode::Comp {
                Operation::Comp
            } else {
                Operation::Not
            }
        }

        // ========== Control Flow ==========
        Opcode::MovSp | Opcode::Jmp | Opcode::Jsr | Opcode::Jz | Opcode::Jnz => {
            fixed(QUALIFIER_NONE)?;
            let value = reader.read_i32()?;
            match opcode {
                Opcode::MovSp => Operation::MovSp { offset: value },
                Opcode::Jmp => Operation::Jmp { offset: value },
                Opcode::Jsr => Operation::Jsr { offset: value },
                Opcode::Jz => Operation::Jz { offset: value },
                _ => Operation::Jnz { offset: value },
            }
        }
        Opcode::Retn | Opcode::SaveBp | Opcode::RestoreBp | Opcode::Nop2 => {
            fixed(QUALIFIER_NONE)?;
            match opcode {
                Opcode::Retn => Operation::Retn,
                Opcode::SaveBp => Operation::SaveBp,
                Opcode::RestoreBp => Operation::RestoreBp,
                _ => Operation::Nop2,
            }
        }
        Opcode::Destruct => {
            fixed(QUALIFIER_COPY)?;
            let size = reader.read_u16()?;
            let stack_offset = reader.read_i16()?;
            let size_no_destroy = reader.read_u16()?;
            Operation::Destruct {
                size,
                offset: stack_offset,
                size_no_destroy,
            }
        }
        Opcode::DecSp | Opcode::IncSp | Opcode::DecBp | Opcode::IncBp => {
            if typed()? != Qualifier::Int {
                return Err(unsupported());
            }
            let stack_offset = reader.read_i32()?;
            match opcode {
                Opcode::DecSp => Operation::DecSp { offset: stack_offset },
                Opcode::IncSp => Operation::IncSp { offset: stack_offset },
                Opcode::DecBp => Operation::DecBp { offset: stack_offset },
                _ => Operation::IncBp { offset: stack_offset },
            }
        }

        // ========== State ==========
        Opcode::StoreState => {
            fixed(QUALIFIER_STATE)?;
            let globals = reader.read_u32()?;
            let locals = reader.read_u32()?;
            Operation::StoreState { globals, locals }
        }
    };

    Ok(op)
}
