//! # NCS Bytecode Specification
//!
//! Instruction model and binary module format of compiled NCS scripts.
//!
//! ## Key Features
//! - Stack machine with 4-byte slots, SP- and BP-relative addressing
//! - Two-byte instruction prefix: opcode + type qualifier
//! - Big-endian operands, no padding between instructions
//! - Byte-exact reader/writer round trip
//! - Static validation of jump targets and stack operands

pub mod opcode;
pub mod types;
pub mod instruction;
pub mod error;
pub mod encoding;
pub mod program;
pub mod reader;
pub mod writer;
pub mod validation;
pub mod names;

pub use opcode::{Opcode, Qualifier};
pub use types::{EngineKind, SlotType, VariableType};
pub use instruction::{
    escape_string, ArithmeticOperands, Constant, EqualityOperands, Instruction, NumericOperands,
    NumericType, Operation, FLOAT_TOLERANCE,
};
pub use error::{ErrorKind, NcsError, Result};
pub use program::{Digest, Program};
pub use reader::read_program;
pub use writer::write_program;
pub use validation::{validate, ValidationError, ValidationResult, ValidationWarning};
pub use names::{NoRoutineNames, RoutineNames};

/// Module signature
pub const SIGNATURE: &[u8; 8] = b"NCS V1.0";

/// Opcode byte of the size declaration following the signature
pub const SIZE_MARKER: u8 = 0x42;

/// Signature + size marker + u32 size; offset of the first instruction
pub const HEADER_SIZE: u32 = 13;

/// Width of one stack slot in bytes
pub const SLOT_SIZE: u32 = 4;

/// Distance from STORE_STATE to its resume point (STORE_STATE + the JMP over the deferred block)
pub const STORE_STATE_RESUME_DELTA: u32 = 0x10;

/// Object id that `CONSTO` resolves to the calling object
pub const OBJECT_SELF: u32 = 0;

/// Object id of "no object"
pub const OBJECT_INVALID: u32 = 1;
