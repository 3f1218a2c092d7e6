//! Instruction formatting for NCS programs

use ncs_spec::{Instruction, Operation, RoutineNames};

/// Label naming the instruction at `offset`
pub fn label(offset: u32) -> String {
    format!("loc_{:08x}", offset)
}

/// One-line description: `"%08x MNEMONIC args"`
///
/// Jumps show the absolute target followed by the relative offset,
/// `"%08x(%d)"`. ACTION shows `"Name(index), argc"` when `names` knows the
/// routine and the bare index otherwise.
pub fn describe(ins: &Instruction, names: &dyn RoutineNames) -> String {
    match &ins.op {
        Operation::Action { routine, arg_count } => match names.routine_name(*routine) {
            Some(name) => format!(
                "{:08x} ACTION {}({}), {}",
                ins.offset, name, routine, arg_count
            ),
            None => ins.to_string(),
        },
        op => match (op.jump_offset(), ins.jump_target()) {
            (Some(relative), Some(target)) => format!(
                "{:08x} {} {:08x}({})",
                ins.offset,
                op.mnemonic(),
                target as u32,
                relative
            ),
            _ => ins.to_string(),
        },
    }
}

/// Pcode form of one instruction, as read back by the assembler
///
/// Jump operands become labels and ACTION names its routine when possible.
pub fn format(ins: &Instruction, names: &dyn RoutineNames) -> String {
    match &ins.op {
        Operation::Action { routine, arg_count } => match names.routine_name(*routine) {
            Some(name) => format!("ACTION {}, {}", name, arg_count),
            None => ins.op.to_string(),
        },
        op => match ins.jump_target() {
            Some(target) => format!("{} {}", op.mnemonic(), label(target as u32)),
            None => op.to_string(),
        },
    }
}
