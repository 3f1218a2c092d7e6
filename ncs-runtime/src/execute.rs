//! Instruction execution for the NCS stack machine

use crate::context::ExecutionContext;
use crate::error::{Result, RuntimeError};
use crate::routine::{Invocation, Routines};
use crate::state::{slots, ExitStatus, ReturnFrame, SavedState, VMState};
use crate::variable::{mismatch, Variable};
use ncs_spec::{
    ArithmeticOperands, Constant, EqualityOperands, Instruction, NcsError, NumericOperands,
    NumericType, Operation, Program, FLOAT_TOLERANCE, OBJECT_SELF, STORE_STATE_RESUME_DELTA,
};

/// Read-only surroundings of one executor
pub struct Environment<'a> {
    pub program: &'a Program,
    pub routines: &'a Routines,
    pub context: &'a ExecutionContext,
}

/// Execute single instruction
///
/// Advances `state.pc` to the next instruction unless the instruction
/// transfers control or halts the executor.
pub fn execute(ins: &Instruction, state: &mut VMState, env: &Environment<'_>) -> Result<()> {
    let next = ins.next_offset();

    match &ins.op {
        Operation::Nop | Operation::Nop2 => {}

        // ========== Stack copies ==========
        Operation::CpDownSp { offset, size } => {
            state.copy_down(state.stack.len(), *offset, *size)?;
        }
        Operation::CpTopSp { offset, size } => {
            state.copy_top(state.stack.len(), *offset, *size)?;
        }
        Operation::CpDownBp { offset, size } => {
            state.copy_down(state.bp, *offset, *size)?;
        }
        Operation::CpTopBp { offset, size } => {
            state.copy_top(state.bp, *offset, *size)?;
        }

        // ========== Pushes ==========
        Operation::RsAdd(slot) => state.push(Variable::reserved(*slot)),
        Operation::Const(constant) => state.push(match constant {
            Constant::Int(v) => Variable::Int(*v),
            Constant::Float(v) => Variable::Float(*v),
            Constant::String(v) => Variable::String(v.clone()),
            Constant::Object(OBJECT_SELF) => Variable::Object(env.context.caller),
            Constant::Object(id) => Variable::Object(*id),
        }),

        Operation::Action { routine, arg_count } => {
            if !call_routine(ins, *routine, *arg_count as usize, state, env)? {
                return Ok(());
            }
        }

        // ========== Logical / bitwise ==========
        Operation::LogAnd => int_binop(state, |a, b| (a != 0 && b != 0) as i32)?,
        Operation::LogOr => int_binop(state, |a, b| (a != 0 || b != 0) as i32)?,
        Operation::IncOr => int_binop(state, |a, b| a | b)?,
        Operation::ExcOr => int_binop(state, |a, b| a ^ b)?,
        Operation::BoolAnd => int_binop(state, |a, b| a & b)?,
        Operation::ShLeft => int_binop(state, |a, b| a.wrapping_shl(b as u32))?,
        Operation::ShRight => int_binop(state, |a, b| {
            if a < 0 {
                a.wrapping_neg().wrapping_shr(b as u32).wrapping_neg()
            } else {
                a.wrapping_shr(b as u32)
            }
        })?,
        Operation::UShRight => int_binop(state, |a, b| (a as u32).wrapping_shr(b as u32) as i32)?,

        // ========== Comparisons ==========
        Operation::Equal(operands) => {
            let equal = compare_equal(state, *operands)?;
            state.push(equal);
        }
        Operation::NotEqual(operands) => {
            let equal = compare_equal(state, *operands)?;
            state.push(!equal);
        }
        Operation::Geq(operands) => compare_order(state, *operands, |o| o.is_ge())?,
        Operation::Gt(operands) => compare_order(state, *operands, |o| o.is_gt())?,
        Operation::Lt(operands) => compare_order(state, *operands, |o| o.is_lt())?,
        Operation::Leq(operands) => compare_order(state, *operands, |o| o.is_le())?,

        // ========== Arithmetic ==========
        Operation::Add(operands) => arithmetic(ins, state, *operands)?,
        Operation::Sub(operands) => arithmetic(ins, state, *operands)?,
        Operation::Mul(operands) => arithmetic(ins, state, *operands)?,
        Operation::Div(operands) => arithmetic(ins, state, *operands)?,
        Operation::Mod => {
            let b = state.pop_int()?;
            let a = state.pop_int()?;
            if b == 0 {
                return Err(RuntimeError::Arithmetic("modulo by zero"));
            }
            state.push(a.wrapping_rem(b));
        }
        Operation::Neg(NumericType::Int) => {
            let a = state.pop_int()?;
            state.push(a.wrapping_neg());
        }
        Operation::Neg(NumericType::Float) => {
            let a = state.pop_float()?;
            state.push(-a);
        }
        Operation::Comp => {
            let a = state.pop_int()?;
            state.push(!a);
        }
        Operation::Not => {
            let a = state.pop_int()?;
            state.push(a == 0);
        }

        // ========== Stack pointer ==========
        Operation::MovSp { offset } => {
            if *offset > 0 {
                return Err(RuntimeError::InvalidStackOffset {
                    offset: *offset as i64,
                });
            }
            state.drop_slots(slots(-(*offset as i64)) as usize)?;
        }
        Operation::Destruct {
            size,
            offset,
            size_no_destroy,
        } => {
            let count = slots(*size as i64) as usize;
            state.require(count)?;
            let start = state.stack.len() - count;
            let keep = state.slot_range(start, *offset as i32, slots(*size_no_destroy as i64) as usize)?;
            if keep.start < start {
                return Err(RuntimeError::InvalidStackOffset {
                    offset: *offset as i64,
                });
            }
            let kept = keep.len();
            state.stack.drain(start..keep.start);
            state.stack.truncate(start + kept);
        }
        Operation::DecSp { offset } => {
            let slot = state.sp_slot(*offset)?;
            state.adjust_int(slot, -1)?;
        }
        Operation::IncSp { offset } => {
            let slot = state.sp_slot(*offset)?;
            state.adjust_int(slot, 1)?;
        }
        Operation::DecBp { offset } => {
            let slot = state.bp_slot(*offset)?;
            state.adjust_int(slot, -1)?;
        }
        Operation::IncBp { offset } => {
            let slot = state.bp_slot(*offset)?;
            state.adjust_int(slot, 1)?;
        }
        Operation::SaveBp => {
            let previous = state.bp;
            state.bp = state.stack.len();
            state.push(Variable::Int(previous as i32));
        }
        Operation::RestoreBp => {
            let bp = state.pop_int()?;
            if bp < 0 {
                return Err(RuntimeError::InvalidStackOffset { offset: bp as i64 });
            }
            state.bp = bp as usize;
        }

        // ========== Control flow ==========
        Operation::Jmp { .. } => {
            state.pc = jump_target(ins, env.program)?;
            return Ok(());
        }
        Operation::Jsr { .. } => {
            let target = jump_target(ins, env.program)?;
            state.frames.push(ReturnFrame {
                return_offset: next,
                bp: state.bp,
            });
            state.pc = target;
            return Ok(());
        }
        Operation::Jz { .. } | Operation::Jnz { .. } => {
            let value = state.pop_int()?;
            let branch = match ins.op {
                Operation::Jz { .. } => value == 0,
                _ => value != 0,
            };
            if branch {
                state.pc = jump_target(ins, env.program)?;
                return Ok(());
            }
        }
        Operation::Retn => match state.frames.pop() {
            Some(frame) => {
                state.bp = frame.bp;
                state.pc = frame.return_offset;
                return Ok(());
            }
            None => {
                state.halt(ExitStatus::Returned);
                return Ok(());
            }
        },

        // ========== Deferred execution ==========
        Operation::StoreState { globals, locals } => {
            let global_count = slots(*globals as i64) as usize;
            let local_count = slots(*locals as i64) as usize;
            let global_range = state.slots_below(state.bp, global_count)?;
            let local_range = state.slots_below(state.stack.len(), local_count)?;
            let digest = env.program.digest()?;
            state.stored = Some(SavedState {
                program: digest,
                resume_offset: ins.offset.saturating_add(STORE_STATE_RESUME_DELTA),
                globals: state.stack[global_range].to_vec(),
                locals: state.stack[local_range].to_vec(),
                frames: Vec::new(),
                stored: None,
            });
        }
    }

    state.pc = next;
    Ok(())
}

/// Run an ACTION; returns false when the routine yielded
fn call_routine(
    ins: &Instruction,
    index: u16,
    arg_count: usize,
    state: &mut VMState,
    env: &Environment<'_>,
) -> Result<bool> {
    let routine = env
        .routines
        .get(index)
        .ok_or(RuntimeError::RoutineDispatch { index })?;
    let args = routine.marshal_args(&state.stack, arg_count, state.stored.as_ref())?;

    match env.routines.invoke(index, &args, env.context)? {
        Invocation::Yielded => {
            let digest = env.program.digest()?;
            state.suspended = Some(state.snapshot(digest, ins.offset));
            state.halt(ExitStatus::Suspended);
            Ok(false)
        }
        Invocation::Returned(value) => {
            state.drop_slots(routine.arg_slots(arg_count))?;
            match value {
                Variable::Void => {}
                Variable::Vector(v) => state.push_vector(v),
                other => state.push(other),
            }
            Ok(true)
        }
    }
}

/// Absolute target of a jump; must start an instruction or be the module end
fn jump_target(ins: &Instruction, program: &Program) -> Result<u32> {
    let target = ins.jump_target().unwrap_or(ins.offset as i64);
    match u32::try_from(target) {
        Ok(t) if program.contains_offset(t) || t == program.length() => Ok(t),
        _ => Err(RuntimeError::InvalidJumpTarget { target }),
    }
}

#[inline]
fn int_binop(state: &mut VMState, f: impl Fn(i32, i32) -> i32) -> Result<()> {
    let b = state.pop_int()?;
    let a = state.pop_int()?;
    state.push(f(a, b));
    Ok(())
}

fn compare_order(
    state: &mut VMState,
    operands: NumericOperands,
    f: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<()> {
    let ordering = match operands {
        NumericOperands::IntInt => {
            let b = state.pop_int()?;
            let a = state.pop_int()?;
            a.cmp(&b)
        }
        NumericOperands::FloatFloat => {
            let b = state.pop_float()?;
            let a = state.pop_float()?;
            match a.partial_cmp(&b) {
                Some(o) => o,
                // NaN compares false both ways
                None => {
                    state.push(false);
                    return Ok(());
                }
            }
        }
    };
    state.push(f(ordering));
    Ok(())
}

fn compare_equal(state: &mut VMState, operands: EqualityOperands) -> Result<bool> {
    let typed_pair = |state: &mut VMState, expected: &'static str| -> Result<(Variable, Variable)> {
        state.require(2)?;
        let b = state.pop()?;
        let a = state.pop()?;
        for v in [&a, &b] {
            if v.type_name() != expected {
                return Err(mismatch(expected, v));
            }
        }
        Ok((a, b))
    };

    let equal = match operands {
        EqualityOperands::IntInt => {
            let b = state.pop_int()?;
            let a = state.pop_int()?;
            a == b
        }
        EqualityOperands::FloatFloat => {
            let b = state.pop_float()?;
            let a = state.pop_float()?;
            (a - b).abs() < FLOAT_TOLERANCE
        }
        EqualityOperands::ObjectObject => {
            let (a, b) = typed_pair(state, "object")?;
            a == b
        }
        EqualityOperands::StringString => {
            let (a, b) = typed_pair(state, "string")?;
            a == b
        }
        EqualityOperands::Engine(kind) => {
            let (a, b) = typed_pair(state, kind.name())?;
            a == b
        }
        EqualityOperands::StructStruct { size } => {
            let count = slots(size as i64) as usize;
            state.require(count * 2)?;
            let split = state.stack.len() - count;
            let equal = state.stack[split - count..split]
                .iter()
                .zip(&state.stack[split..])
                .all(|(a, b)| a == b);
            state.drop_slots(count * 2)?;
            equal
        }
    };
    Ok(equal)
}

fn arithmetic(ins: &Instruction, state: &mut VMState, operands: ArithmeticOperands) -> Result<()> {
    use ArithmeticOperands::*;

    let unsupported = || {
        RuntimeError::Module(NcsError::UnsupportedOperands {
            offset: ins.offset,
            mnemonic: ins.op.mnemonic(),
        })
    };
    if !ins.op.is_supported() {
        return Err(unsupported());
    }

    match (&ins.op, operands) {
        (_, IntInt) => {
            let b = state.pop_int()?;
            let a = state.pop_int()?;
            let result = match ins.op {
                Operation::Add(_) => a.wrapping_add(b),
                Operation::Sub(_) => a.wrapping_sub(b),
                Operation::Mul(_) => a.wrapping_mul(b),
                _ => {
                    if b == 0 {
                        return Err(RuntimeError::Arithmetic("division by zero"));
                    }
                    a.wrapping_div(b)
                }
            };
            state.push(result);
        }
        (_, IntFloat) | (_, FloatInt) | (_, FloatFloat) => {
            let b = match operands {
                FloatInt => state.pop_int()? as f32,
                _ => state.pop_float()?,
            };
            let a = match operands {
                IntFloat => state.pop_int()? as f32,
                _ => state.pop_float()?,
            };
            state.push(float_op(&ins.op, a, b));
        }
        (Operation::Add(_), StringString) => {
            let b = state.pop_string()?;
            let mut a = state.pop_string()?;
            a.push_str(&b);
            state.push(a);
        }
        (Operation::Add(_), VectorVector) => {
            let b = state.pop_vector()?;
            let a = state.pop_vector()?;
            state.push_vector(a.add(b));
        }
        (Operation::Sub(_), VectorVector) => {
            let b = state.pop_vector()?;
            let a = state.pop_vector()?;
            state.push_vector(a.sub(b));
        }
        (Operation::Mul(_), VectorFloat) => {
            let f = state.pop_float()?;
            let v = state.pop_vector()?;
            state.push_vector(v.scale(f));
        }
        (Operation::Mul(_), FloatVector) => {
            let v = state.pop_vector()?;
            let f = state.pop_float()?;
            state.push_vector(v.scale(f));
        }
        (Operation::Div(_), VectorFloat) => {
            let f = state.pop_float()?;
            let v = state.pop_vector()?;
            state.push_vector(v.div(f));
        }
        (Operation::Div(_), FloatVector) => {
            let v = state.pop_vector()?;
            let f = state.pop_float()?;
            state.push_vector(v.divide_into(f));
        }
        _ => return Err(unsupported()),
    }
    Ok(())
}

#[inline]
fn float_op(op: &Operation, a: f32, b: f32) -> f32 {
    match op {
        Operation::Add(_) => a + b,
        Operation::Sub(_) => a - b,
        Operation::Mul(_) => a * b,
        _ => a / b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Vector;

    fn run_ops(ops: Vec<Operation>) -> Result<VMState> {
        let program = Program::from_operations("test", ops);
        let routines = Routines::empty();
        let context = ExecutionContext::with_caller(5);
        let env = Environment {
            program: &program,
            routines: &routines,
            context: &context,
        };
        let mut state = VMState::new(program.entry_offset());
        while !state.is_halted() {
            let Some(ins) = program.instruction_at(state.pc) else {
                break;
            };
            execute(ins, &mut state, &env)?;
        }
        Ok(state)
    }

    fn int(v: i32) -> Operation {
        Operation::Const(Constant::Int(v))
    }

    fn float(v: f32) -> Operation {
        Operation::Const(Constant::Float(v))
    }

    #[test]
    fn test_int_arithmetic_wraps() {
        let state = run_ops(vec![
            int(i32::MAX),
            int(1),
            Operation::Add(ArithmeticOperands::IntInt),
        ])
        .unwrap();
        assert_eq!(state.stack, vec![Variable::Int(i32::MIN)]);
    }

    #[test]
    fn test_division_by_zero() {
        let err = run_ops(vec![int(4), int(0), Operation::Div(ArithmeticOperands::IntInt)]).unwrap_err();
        assert_eq!(err, RuntimeError::Arithmetic("division by zero"));

        let err = run_ops(vec![int(4), int(0), Operation::Mod]).unwrap_err();
        assert_eq!(err, RuntimeError::Arithmetic("modulo by zero"));
    }

    #[test]
    fn test_float_division_is_ieee() {
        let state = run_ops(vec![float(1.0), float(0.0), Operation::Div(ArithmeticOperands::FloatFloat)]).unwrap();
        assert_eq!(state.stack, vec![Variable::Float(f32::INFINITY)]);
    }

    #[test]
    fn test_shifts() {
        let state = run_ops(vec![
            int(-7),
            int(1),
            Operation::ShRight,
            int(-8),
            int(28),
            Operation::UShRight,
            int(3),
            int(2),
            Operation::ShLeft,
        ])
        .unwrap();
        assert_eq!(
            state.stack,
            vec![Variable::Int(-3), Variable::Int(15), Variable::Int(12)]
        );
    }

    #[test]
    fn test_unary() {
        let state = run_ops(vec![
            int(0),
            Operation::Comp,
            int(5),
            Operation::Not,
            float(2.5),
            Operation::Neg(NumericType::Float),
        ])
        .unwrap();
        assert_eq!(
            state.stack,
            vec![Variable::Int(-1), Variable::Int(0), Variable::Float(-2.5)]
        );
    }

    #[test]
    fn test_consto_self() {
        let state = run_ops(vec![
            Operation::Const(Constant::Object(0)),
            Operation::Const(Constant::Object(3)),
            Operation::RsAdd(ncs_spec::SlotType::Object),
        ])
        .unwrap();
        assert_eq!(
            state.stack,
            vec![Variable::Object(5), Variable::Object(3), Variable::Object(1)]
        );
    }

    #[test]
    fn test_float_equality_tolerance() {
        let state = run_ops(vec![
            float(0.1),
            float(0.100_001),
            Operation::Equal(EqualityOperands::FloatFloat),
            float(0.1),
            float(0.2),
            Operation::NotEqual(EqualityOperands::FloatFloat),
        ])
        .unwrap();
        assert_eq!(state.stack, vec![Variable::Int(1), Variable::Int(1)]);
    }

    #[test]
    fn test_string_ops() {
        let state = run_ops(vec![
            Operation::Const(Constant::String("ab".into())),
            Operation::Const(Constant::String("cd".into())),
            Operation::Add(ArithmeticOperands::StringString),
            Operation::Const(Constant::String("abcd".into())),
            Operation::Equal(EqualityOperands::StringString),
        ])
        .unwrap();
        assert_eq!(state.stack, vec![Variable::Int(1)]);
    }

    #[test]
    fn test_typed_equality_mismatch() {
        let err = run_ops(vec![
            int(1),
            Operation::Const(Constant::String("1".into())),
            Operation::Equal(EqualityOperands::StringString),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::TypeMismatch {
                expected: "string",
                found: "int"
            }
        );
    }

    #[test]
    fn test_vector_ops() {
        let mut state = VMState::new(13);
        state.push_vector(Vector::new(2.0, 4.0, 6.0));
        state.push(2.0f32);
        let program = Program::from_operations("vec", [Operation::Div(ArithmeticOperands::VectorFloat)]);
        let routines = Routines::empty();
        let context = ExecutionContext::default();
        let env = Environment {
            program: &program,
            routines: &routines,
            context: &context,
        };
        execute(&program.instructions()[0], &mut state, &env).unwrap();
        assert_eq!(state.pop_vector().unwrap(), Vector::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_unsupported_operands() {
        let err = run_ops(vec![int(1), int(2), Operation::Sub(ArithmeticOperands::StringString)]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::Module(NcsError::UnsupportedOperands {
                offset: 25,
                mnemonic: "SUBSS"
            })
        );
    }

    #[test]
    fn test_movsp_positive() {
        let err = run_ops(vec![Operation::MovSp { offset: 4 }]).unwrap_err();
        assert_eq!(err, RuntimeError::InvalidStackOffset { offset: 4 });
    }

    #[test]
    fn test_destruct_keeps_region() {
        let state = run_ops(vec![
            int(1),
            int(2),
            int(3),
            int(4),
            Operation::Destruct {
                size: 12,
                offset: 4,
                size_no_destroy: 4,
            },
        ])
        .unwrap();
        assert_eq!(state.stack, vec![Variable::Int(1), Variable::Int(3)]);
    }

    #[test]
    fn test_save_restore_bp() {
        let state = run_ops(vec![
            int(9),
            Operation::SaveBp,
            int(1),
            Operation::IncBp { offset: -4 },
            Operation::MovSp { offset: -4 },
            Operation::RestoreBp,
        ])
        .unwrap();
        assert_eq!(state.stack, vec![Variable::Int(10)]);
        assert_eq!(state.bp, 0);
    }

    #[test]
    fn test_jump_outside_program() {
        let err = run_ops(vec![Operation::Jmp { offset: 3 }, Operation::Retn]).unwrap_err();
        assert_eq!(err, RuntimeError::InvalidJumpTarget { target: 16 });
    }

    #[test]
    fn test_store_state_oversized_globals() {
        let err = run_ops(vec![
            int(1),
            Operation::StoreState {
                globals: 0xFFFF_FFFC,
                locals: 0,
            },
        ])
        .unwrap_err();
        assert!(matches!(err, RuntimeError::StackOutOfBounds { size: 1, .. }));
    }

    #[test]
    fn test_store_state_oversized_locals() {
        let err = run_ops(vec![
            int(1),
            Operation::StoreState {
                globals: 0,
                locals: 0xFFFF_FFFC,
            },
        ])
        .unwrap_err();
        assert!(matches!(err, RuntimeError::StackOutOfBounds { size: 1, .. }));
    }

    #[test]
    fn test_action_without_routine() {
        let err = run_ops(vec![int(1), Operation::Action { routine: 3, arg_count: 1 }]).unwrap_err();
        assert_eq!(err, RuntimeError::RoutineDispatch { index: 3 });
    }
}
