//! # Module Writer
//!
//! Encodes a [`Program`] into the binary layout accepted by the reader. The
//! size field is recomputed from the instructions, never copied.

use crate::encoding::ByteWriter;
use crate::error::{NcsError, Result};
use crate::instruction::{Constant, EqualityOperands, Instruction, Operation};
use crate::program::Program;
use crate::{HEADER_SIZE, SIGNATURE, SIZE_MARKER};
use tracing::debug;

/// Encode a program into module bytes
pub fn write_program(program: &Program) -> Result<Vec<u8>> {
    let total: u64 = HEADER_SIZE as u64
        + program
            .instructions()
            .iter()
            .map(|ins| ins.size() as u64)
            .sum::<u64>();
    let length = u32::try_from(total).map_err(|_| NcsError::ModuleTooLarge { size: total })?;

    let mut writer = ByteWriter::with_capacity(length as usize);
    writer.write_bytes(SIGNATURE);
    writer.write_u8(SIZE_MARKER);
    writer.write_u32(length);

    for ins in program.instructions() {
        encode_instruction(&mut writer, ins)?;
    }

    debug!(module = program.name(), length, "wrote module");

    Ok(writer.into_bytes())
}

/// Encode one instruction; `ins.offset` is only used for error reporting
pub fn encode_instruction(writer: &mut ByteWriter, ins: &Instruction) -> Result<()> {
    let op = &ins.op;
    if !op.is_supported() {
        return Err(NcsError::UnsupportedOperands {
            offset: ins.offset,
            mnemonic: op.mnemonic(),
        });
    }

    writer.write_u8(op.opcode().to_u8());
    writer.write_u8(op.qualifier_byte());

    match op {
        Operation::CpDownSp { offset, size }
        | Operation::CpTopSp { offset, size }
        | Operation::CpDownBp { offset, size }
        | Operation::CpTopBp { offset, size } => {
            writer.write_i32(*offset);
            writer.write_u16(*size);
        }
        Operation::Const(constant) => match constant {
            Constant::Int(value) => writer.write_i32(*value),
            Constant::Float(value) => writer.write_f32(*value),
            Constant::String(value) => {
                let len = u16::try_from(value.len()).map_err(|_| NcsError::StringTooLong {
                    offset: ins.offset,
                    len: value.len(),
                })?;
                writer.write_u16(len);
                writer.write_bytes(value.as_bytes());
            }
            Constant::Object(id) => writer.write_u32(*id),
        },
        Operation::Action { routine, arg_count } => {
            writer.write_u16(*routine);
            writer.write_u8(*arg_count);
        }
        Operation::Equal(EqualityOperands::StructStruct { size })
        | Operation::NotEqual(EqualityOperands::StructStruct { size }) => {
            writer.write_u16(*size);
        }
        Operation::MovSp { offset }
        | Operation::Jmp { offset }
        | Operation::Jsr { offset }
        | Operation::Jz { offset }
        | Operation::Jnz { offset }
        | Operation::DecSp { offset }
        | Operation::IncSp { offset }
        | Operation::DecBp { offset }
        | Operation::IncBp { offset } => writer.write_i32(*offset),
        Operation::Destruct {
            size,
            offset,
            size_no_destroy,
        } => {
            writer.write_u16(*size);
            writer.write_i16(*offset);
            writer.write_u16(*size_no_destroy);
        }
        Operation::StoreState { globals, locals } => {
            writer.write_u32(*globals);
            writer.write_u32(*locals);
        }
        _ => {}
    }

    Ok(())
}
