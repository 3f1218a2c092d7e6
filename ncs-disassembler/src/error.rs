//! Disassembler errors

use ncs_spec::NcsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisassemblerError {
    #[error("Jump at {offset:#010x} targets {target}, which starts no instruction")]
    DanglingJump { offset: u32, target: i64 },

    #[error("Invalid module: {0}")]
    Module(#[from] NcsError),
}

pub type Result<T> = std::result::Result<T, DisassemblerError>;
