//! Static program validation
//!
//! Checks a decoded program for problems the reader does not reject:
//! - Jump targets that neither start an instruction nor end the module
//! - STORE_STATE resume points outside the program
//! - Stack offsets and sizes that are not whole 4-byte slots

use crate::instruction::{EqualityOperands, Instruction, Operation};
use crate::program::Program;
use crate::{SLOT_SIZE, STORE_STATE_RESUME_DELTA};
use std::fmt;
use thiserror::Error;

/// Validation error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{mnemonic} at {offset:#010x} jumps to {target}, which is not an instruction")]
    DanglingJumpTarget {
        offset: u32,
        mnemonic: &'static str,
        target: i64,
    },

    #[error("STORE_STATE at {offset:#010x} resumes at {target:#010x}, which is not an instruction")]
    DanglingResumePoint { offset: u32, target: u32 },

    #[error("{mnemonic} at {offset:#010x} uses {value} bytes, not a multiple of the slot size")]
    MisalignedStackOperand {
        offset: u32,
        mnemonic: &'static str,
        value: i64,
    },

    #[error("MOVSP at {offset:#010x} has positive offset {value}")]
    PositiveStackDrop { offset: u32, value: i32 },
}

/// Validation warning types (not errors, but worth noting)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// No RETN anywhere; execution ends by running off the last instruction
    NoReturn,

    /// Stack copy of zero bytes
    EmptyCopy { offset: u32, mnemonic: &'static str },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::NoReturn => f.write_str("program has no RETN"),
            ValidationWarning::EmptyCopy { offset, mnemonic } => {
                write!(f, "{} at {:#010x} copies zero bytes", mnemonic, offset)
            }
        }
    }
}

/// Validation result
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validate a whole program
pub fn validate(program: &Program) -> ValidationResult {
    let mut result = ValidationResult::default();

    for ins in program.instructions() {
        check_control_flow(program, ins, &mut result);
        check_stack_operands(ins, &mut result);
    }

    let returns = program
        .instructions()
        .iter()
        .any(|ins| ins.op == Operation::Retn);
    if !program.is_empty() && !returns {
        result.warnings.push(ValidationWarning::NoReturn);
    }

    result
}

fn check_control_flow(program: &Program, ins: &Instruction, result: &mut ValidationResult) {
    if let Some(target) = ins.jump_target() {
        // the module end is a valid target: execution returns there
        let lands = u32::try_from(target)
            .map(|t| program.contains_offset(t) || t == program.length())
            .unwrap_or(false);
        if !lands {
            result.errors.push(ValidationError::DanglingJumpTarget {
                offset: ins.offset,
                mnemonic: ins.op.mnemonic(),
                target,
            });
        }
    }

    if let Operation::StoreState { .. } = ins.op {
        let target = ins.offset.saturating_add(STORE_STATE_RESUME_DELTA);
        if !program.contains_offset(target) {
            result.errors.push(ValidationError::DanglingResumePoint {
                offset: ins.offset,
                target,
            });
        }
    }
}

fn check_stack_operands(ins: &Instruction, result: &mut ValidationResult) {
    let mnemonic = ins.op.mnemonic();
    let mut values: Vec<i64> = Vec::new();

    match &ins.op {
        Operation::CpDownSp { offset, size }
        | Operation::CpTopSp { offset, size }
        | Operation::CpDownBp { offset, size }
        | Operation::CpTopBp { offset, size } => {
            if *size == 0 {
                result.warnings.push(ValidationWarning::EmptyCopy {
                    offset: ins.offset,
                    mnemonic,
                });
            }
            values.extend([*offset as i64, *size as i64]);
        }
        Operation::MovSp { offset } => {
            if *offset > 0 {
                result.errors.push(ValidationError::PositiveStackDrop {
                    offset: ins.offset,
                    value: *offset,
                });
            }
            values.push(*offset as i64);
        }
        Operation::DecSp { offset }
        | Operation::IncSp { offset }
        | Operation::DecBp { offset }
        | Operation::IncBp { offset } => values.push(*offset as i64),
        Operation::Destruct {
            size,
            offset,
            size_no_destroy,
        } => values.extend([*size as i64, *offset as i64, *size_no_destroy as i64]),
        Operation::Equal(EqualityOperands::StructStruct { size })
        | Operation::NotEqual(EqualityOperands::StructStruct { size }) => values.push(*size as i64),
        Operation::StoreState { globals, locals } => {
            values.extend([*globals as i64, *locals as i64])
        }
        _ => {}
    }

    for value in values {
        if value % SLOT_SIZE as i64 != 0 {
            result.errors.push(ValidationError::MisalignedStackOperand {
                offset: ins.offset,
                mnemonic,
                value,
            });
        }
    }
}
