//! Runtime error types for the NCS executor

use ncs_spec::{NcsError, Opcode};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Module error: {0}")]
    Module(#[from] NcsError),

    #[error("No routine registered at index {index}")]
    RoutineDispatch { index: u16 },

    #[error("Routine {routine}: {reason}")]
    Marshal { routine: String, reason: String },

    #[error("Arithmetic fault: {0}")]
    Arithmetic(&'static str),

    #[error("Stack underflow: needed {needed} slots, have {available}")]
    StackUnderflow { needed: usize, available: usize },

    #[error("Stack access out of bounds: slot {index}, stack size {size}")]
    StackOutOfBounds { index: i64, size: usize },

    #[error("Invalid stack offset: {offset}")]
    InvalidStackOffset { offset: i64 },

    #[error("Invalid jump target: {target}")]
    InvalidJumpTarget { target: i64 },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Routine {routine} failed: {reason}")]
    RoutineFault { routine: String, reason: String },

    #[error("Instruction limit exceeded: {limit}")]
    InstructionLimit { limit: u64 },

    #[error("Saved state belongs to a different program")]
    ProgramMismatch,

    #[error("Saved state: {0}")]
    SavedState(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Runtime error pinned to the instruction that raised it
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{mnemonic} at {offset:#010x}: {error}")]
pub struct Fault {
    pub offset: u32,
    pub opcode: Opcode,
    pub mnemonic: &'static str,
    pub error: RuntimeError,
}
