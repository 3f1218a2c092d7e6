//! Assembler errors

use ncs_spec::NcsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    SyntaxError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Unknown instruction at line {line}: {mnemonic}")]
    UnknownInstruction { line: usize, mnemonic: String },

    #[error("Invalid operand at line {line}: {message}")]
    InvalidOperand { line: usize, message: String },

    #[error("Unknown routine at line {line}: {name}")]
    UnknownRoutine { line: usize, name: String },

    #[error("Undefined label at line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("Duplicate label at line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("Invalid module: {0}")]
    Module(#[from] NcsError),
}

impl AssemblerError {
    /// Source line the error refers to, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            AssemblerError::SyntaxError { line, .. }
            | AssemblerError::UnknownInstruction { line, .. }
            | AssemblerError::InvalidOperand { line, .. }
            | AssemblerError::UnknownRoutine { line, .. }
            | AssemblerError::UndefinedLabel { line, .. }
            | AssemblerError::DuplicateLabel { line, .. } => Some(*line),
            AssemblerError::Module(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AssemblerError>;
