//! Main disassembler logic

use crate::error::{DisassemblerError, Result};
use crate::formatter::{format, label};
use ncs_spec::{Program, RoutineNames};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Listing layout
#[derive(Debug, Clone)]
pub struct ListingOptions {
    /// Leading `;` comment lines naming the program
    pub header: bool,

    /// Prefix each instruction with its offset and a tab
    pub offsets: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            header: true,
            offsets: false,
        }
    }
}

/// Disassemble a program into a pcode listing
pub fn disassemble(program: &Program, names: &dyn RoutineNames) -> Result<String> {
    disassemble_with(program, names, &ListingOptions::default())
}

/// Disassemble with explicit layout options
///
/// Every jump target gets a `loc_%08x:` line in front of the instruction it
/// names; a jump to the end of the module gets a trailing label.
pub fn disassemble_with(
    program: &Program,
    names: &dyn RoutineNames,
    options: &ListingOptions,
) -> Result<String> {
    let targets = jump_targets(program)?;
    let mut output = String::new();

    if options.header {
        let _ = writeln!(output, "; {}", program.name());
        let _ = writeln!(
            output,
            "; {} bytes, {} instructions",
            program.length(),
            program.len()
        );
        output.push('\n');
    }

    for ins in program.instructions() {
        if targets.contains(&ins.offset) {
            let _ = writeln!(output, "{}:", label(ins.offset));
        }
        if options.offsets {
            let _ = write!(output, "{:08x}\t", ins.offset);
        }
        output.push_str(&format(ins, names));
        output.push('\n');
    }

    if targets.contains(&program.length()) {
        let _ = writeln!(output, "{}:", label(program.length()));
    }

    Ok(output)
}

/// Disassemble a binary module
pub fn disassemble_bytes(name: &str, bytes: &[u8], names: &dyn RoutineNames) -> Result<String> {
    let program = Program::from_bytes(name, bytes)?;
    disassemble(&program, names)
}

fn jump_targets(program: &Program) -> Result<BTreeSet<u32>> {
    let mut targets = BTreeSet::new();
    for ins in program.instructions() {
        let Some(target) = ins.jump_target() else {
            continue;
        };
        let landed = u32::try_from(target)
            .ok()
            .filter(|t| program.contains_offset(*t) || *t == program.length());
        match landed {
            Some(t) => {
                targets.insert(t);
            }
            None => {
                return Err(DisassemblerError::DanglingJump {
                    offset: ins.offset,
                    target,
                })
            }
        }
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncs_spec::{Constant, NoRoutineNames, Operation};

    #[test]
    fn test_disassemble_simple() {
        let program = Program::from_operations(
            "simple",
            [Operation::Const(Constant::Int(1)), Operation::Retn],
        );
        let asm = disassemble(&program, &NoRoutineNames).unwrap();

        assert!(asm.starts_with("; simple\n"));
        assert!(asm.contains("; 21 bytes, 2 instructions"));
        assert!(asm.contains("CONSTI 1\nRETN\n"));
    }

    #[test]
    fn test_labels_before_targets() {
        // 13 JMP -> 21; 19 NOP2; 21 RETN
        let program = Program::from_operations(
            "labels",
            [Operation::Jmp { offset: 8 }, Operation::Nop2, Operation::Retn],
        );
        let options = ListingOptions {
            header: false,
            offsets: false,
        };
        let asm = disassemble_with(&program, &NoRoutineNames, &options).unwrap();
        assert_eq!(asm, "JMP loc_00000015\nNOP2\nloc_00000015:\nRETN\n");
    }

    #[test]
    fn test_label_at_module_end() {
        // 13 JZ -> 19 (end)
        let program = Program::from_operations("end", [Operation::Jz { offset: 6 }]);
        let options = ListingOptions {
            header: false,
            offsets: false,
        };
        let asm = disassemble_with(&program, &NoRoutineNames, &options).unwrap();
        assert_eq!(asm, "JZ loc_00000013\nloc_00000013:\n");
    }

    #[test]
    fn test_offsets_prefix() {
        let program = Program::from_operations("offsets", [Operation::Retn]);
        let options = ListingOptions {
            header: false,
            offsets: true,
        };
        let asm = disassemble_with(&program, &NoRoutineNames, &options).unwrap();
        assert_eq!(asm, "0000000d\tRETN\n");
    }

    #[test]
    fn test_dangling_jump() {
        let program = Program::from_operations("dangling", [Operation::Jmp { offset: 3 }]);
        let err = disassemble(&program, &NoRoutineNames).unwrap_err();
        assert!(matches!(
            err,
            DisassemblerError::DanglingJump {
                offset: 13,
                target: 16
            }
        ));
    }

    #[test]
    fn test_disassemble_bytes_rejects_garbage() {
        let err = disassemble_bytes("bad", b"not a module", &NoRoutineNames).unwrap_err();
        assert!(matches!(err, DisassemblerError::Module(_)));
    }
}
