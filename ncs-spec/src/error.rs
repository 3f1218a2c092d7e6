//! # Error Types for NCS Modules

use thiserror::Error;

/// Error category of a module load or encode failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad signature or corrupt header
    Format,
    /// Declared module size disagrees with the buffer
    TruncatedOrOversized,
    /// Unknown opcode or qualifier
    UnsupportedInstruction,
    /// Program cannot be expressed in the binary format
    Encoding,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NcsError {
    // Header errors
    #[error("Invalid module signature: expected \"NCS V1.0\", found {found:?}")]
    InvalidSignature { found: Vec<u8> },

    #[error("Invalid size marker: expected 0x42, found {found:#04x}")]
    InvalidSizeMarker { found: u8 },

    #[error("Truncated header: expected {expected} bytes, found {found} bytes")]
    TruncatedHeader { expected: usize, found: usize },

    // Size errors
    #[error("Module size mismatch: header declares {declared} bytes, buffer holds {actual} bytes")]
    SizeMismatch { declared: u32, actual: usize },

    #[error("Unexpected end of module at offset {offset:#010x}")]
    UnexpectedEof { offset: u32 },

    // Instruction errors
    #[error("Unsupported instruction at offset {offset:#010x}: opcode {opcode:#04x}, qualifier {qualifier:#04x}")]
    UnsupportedInstruction { offset: u32, opcode: u8, qualifier: u8 },

    #[error("String constant at offset {offset:#010x} is not valid UTF-8")]
    InvalidString { offset: u32 },

    // Encoding errors
    #[error("String constant at offset {offset:#010x} is {len} bytes long (limit 65535)")]
    StringTooLong { offset: u32, len: usize },

    #[error("Unsupported operand types at offset {offset:#010x}: {mnemonic}")]
    UnsupportedOperands { offset: u32, mnemonic: &'static str },

    #[error("Module is {size} bytes long and does not fit the size field")]
    ModuleTooLarge { size: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl NcsError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            NcsError::InvalidSignature { .. }
            | NcsError::InvalidSizeMarker { .. }
            | NcsError::TruncatedHeader { .. }
            | NcsError::InvalidString { .. } => ErrorKind::Format,
            NcsError::SizeMismatch { .. } | NcsError::UnexpectedEof { .. } => {
                ErrorKind::TruncatedOrOversized
            }
            NcsError::UnsupportedInstruction { .. } => ErrorKind::UnsupportedInstruction,
            NcsError::StringTooLong { .. }
            | NcsError::UnsupportedOperands { .. }
            | NcsError::ModuleTooLarge { .. }
            | NcsError::Serialization(_) => ErrorKind::Encoding,
        }
    }

    /// Check if this error was raised while loading a module
    pub fn is_load_error(&self) -> bool {
        self.kind() != ErrorKind::Encoding
    }
}

pub type Result<T> = std::result::Result<T, NcsError>;
