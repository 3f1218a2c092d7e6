//! Main assembler logic

use crate::error::{AssemblerError, Result};
use crate::parser::{parse_line, parse_statement, Line};
use ncs_spec::{Operation, Program, RoutineNames, HEADER_SIZE};
use std::collections::HashMap;
use tracing::debug;

/// Operation laid out at its offset, waiting for its label
struct Pending {
    line: usize,
    offset: u32,
    op: Operation,
    target: Option<String>,
}

/// Assemble a pcode listing into a program
///
/// The first pass parses every line, resolves routine names and lays the
/// operations out to find each label's offset. The second pass turns label
/// operands into relative jump offsets.
pub fn assemble(name: &str, source: &str, names: &dyn RoutineNames) -> Result<Program> {
    let mut labels: HashMap<String, u32> = HashMap::new();
    let mut pending = Vec::new();
    let mut offset = HEADER_SIZE;

    for (i, text) in source.lines().enumerate() {
        let line = i + 1;
        match parse_line(line, text)? {
            Line::Blank => {}
            Line::Label(label) => {
                if labels.insert(label.clone(), offset).is_some() {
                    return Err(AssemblerError::DuplicateLabel { line, label });
                }
            }
            Line::Statement(stmt) => {
                let (op, target) = parse_statement(&stmt, names)?;
                let size = op.encoded_size();
                pending.push(Pending {
                    line,
                    offset,
                    op,
                    target,
                });
                offset = offset.saturating_add(size);
            }
        }
    }

    let mut program = Program::new(name);
    for Pending {
        line,
        offset,
        mut op,
        target,
    } in pending
    {
        if let Some(label) = target {
            let address = *labels
                .get(&label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line,
                    label: label.clone(),
                })?;
            let relative = i32::try_from(address as i64 - offset as i64).map_err(|_| {
                AssemblerError::InvalidOperand {
                    line,
                    message: format!("jump to {} out of range", label),
                }
            })?;
            if let Some(jump) = op.jump_offset_mut() {
                *jump = relative;
            }
        }
        program.push(op);
    }

    debug!(
        program = name,
        instructions = program.len(),
        length = program.length(),
        labels = labels.len(),
        "assembled program"
    );
    Ok(program)
}

/// Assemble straight to module bytes
pub fn assemble_to_bytes(name: &str, source: &str, names: &dyn RoutineNames) -> Result<Vec<u8>> {
    let program = assemble(name, source, names)?;
    Ok(program.to_bytes()?)
}
