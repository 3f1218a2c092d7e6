//! Virtual Machine for NCS programs

use crate::context::ExecutionContext;
use crate::error::{Fault, Result, RuntimeError};
use crate::execute::{execute, Environment};
use crate::routine::Routines;
use crate::state::{ExitStatus, SavedState, VMState};
use crate::variable::Variable;
use ncs_disassembler::describe;
use ncs_spec::{Opcode, Program};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// VM configuration
#[derive(Debug, Clone)]
pub struct VMConfig {
    /// Maximum number of instructions before faulting
    pub max_instructions: u64,

    /// Emit a `trace!` event per executed instruction
    pub trace: bool,
}

impl Default for VMConfig {
    fn default() -> Self {
        Self {
            max_instructions: 1_000_000,
            trace: false,
        }
    }
}

/// Execution result
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// How execution ended
    pub status: ExitStatus,

    /// Operand stack at exit
    pub stack: Vec<Variable>,

    /// Number of instructions executed
    pub instructions_executed: u64,

    /// Snapshot to resume from when suspended
    pub saved_state: Option<SavedState>,
}

impl ExecutionResult {
    /// Top of stack if it holds an int
    pub fn return_value(&self) -> Option<i32> {
        match self.stack.last() {
            Some(Variable::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

/// NCS stack machine
///
/// One VM is one script invocation. Programs and routine tables are shared
/// through `Arc`; everything mutable is owned by the VM.
pub struct VM {
    program: Arc<Program>,
    routines: Arc<Routines>,
    context: ExecutionContext,
    config: VMConfig,
    state: VMState,
}

impl VM {
    /// Create a VM positioned at the program entry
    pub fn new(
        program: Arc<Program>,
        routines: Arc<Routines>,
        context: ExecutionContext,
        config: VMConfig,
    ) -> Self {
        let state = VMState::new(program.entry_offset());
        Self {
            program,
            routines,
            context,
            config,
            state,
        }
    }

    /// Create a VM that continues from a saved state
    ///
    /// The state must have been captured from the same program.
    pub fn resume(
        program: Arc<Program>,
        routines: Arc<Routines>,
        saved: &SavedState,
        context: ExecutionContext,
        config: VMConfig,
    ) -> Result<Self> {
        if saved.program != program.digest()? {
            return Err(RuntimeError::ProgramMismatch);
        }
        let lands = |offset: u32| program.contains_offset(offset) || offset == program.length();
        let offsets = std::iter::once(saved.resume_offset)
            .chain(saved.frames.iter().map(|frame| frame.return_offset));
        for offset in offsets {
            if !lands(offset) {
                return Err(RuntimeError::InvalidJumpTarget {
                    target: offset as i64,
                });
            }
        }
        debug!(
            program = program.name(),
            offset = saved.resume_offset,
            globals = saved.globals.len(),
            locals = saved.locals.len(),
            "resuming saved state"
        );
        Ok(Self {
            program,
            routines,
            context,
            config,
            state: VMState::from_saved(saved),
        })
    }

    /// Run until the script returns, suspends or faults
    pub fn run(mut self) -> std::result::Result<ExecutionResult, Fault> {
        debug!(program = self.program.name(), pc = self.state.pc, "starting execution");

        let env = Environment {
            program: &self.program,
            routines: &self.routines,
            context: &self.context,
        };
        let state = &mut self.state;

        while !state.is_halted() {
            if state.pc == env.program.length() {
                state.halt(ExitStatus::Returned);
                break;
            }

            let Some(ins) = env.program.instruction_at(state.pc) else {
                let fault = Fault {
                    offset: state.pc,
                    opcode: Opcode::Nop,
                    mnemonic: "?",
                    error: RuntimeError::InvalidJumpTarget {
                        target: state.pc as i64,
                    },
                };
                warn!(program = env.program.name(), %fault, "script faulted");
                return Err(fault);
            };

            let limit = self.config.max_instructions;
            let outcome = if state.instructions_executed >= limit {
                Err(RuntimeError::InstructionLimit { limit })
            } else {
                if self.config.trace {
                    trace!(
                        step = state.instructions_executed,
                        bp = state.bp,
                        sp = state.stack.len(),
                        "{}",
                        describe(ins, env.routines)
                    );
                }
                execute(ins, state, &env)
            };

            if let Err(error) = outcome {
                let fault = Fault {
                    offset: ins.offset,
                    opcode: ins.op.opcode(),
                    mnemonic: ins.op.mnemonic(),
                    error,
                };
                warn!(program = env.program.name(), %fault, "script faulted");
                return Err(fault);
            }

            state.instructions_executed += 1;
        }

        let status = state.exit.unwrap_or(ExitStatus::Returned);
        debug!(
            program = env.program.name(),
            ?status,
            instructions = state.instructions_executed,
            "execution finished"
        );

        Ok(ExecutionResult {
            status,
            stack: std::mem::take(&mut state.stack),
            instructions_executed: state.instructions_executed,
            saved_state: state.suspended.take(),
        })
    }

    /// Get current state (for debugging)
    pub fn state(&self) -> &VMState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routine::RoutineError;
    use ncs_spec::{ArithmeticOperands, Constant, Operation, VariableType};

    fn vm(ops: Vec<Operation>, routines: Routines) -> VM {
        VM::new(
            Arc::new(Program::from_operations("test", ops)),
            Arc::new(routines),
            ExecutionContext::default(),
            VMConfig::default(),
        )
    }

    #[test]
    fn test_vmconfig_default() {
        let config = VMConfig::default();
        assert_eq!(config.max_instructions, 1_000_000);
        assert!(!config.trace);
    }

    #[test]
    fn test_empty_program_returns() {
        let result = vm(vec![], Routines::empty()).run().unwrap();
        assert_eq!(result.status, ExitStatus::Returned);
        assert!(result.stack.is_empty());
        assert_eq!(result.return_value(), None);
        assert_eq!(result.instructions_executed, 0);
    }

    #[test]
    fn test_consti_retn() {
        let result = vm(
            vec![Operation::Const(Constant::Int(1)), Operation::Retn],
            Routines::empty(),
        )
        .run()
        .unwrap();
        assert_eq!(result.status, ExitStatus::Returned);
        assert_eq!(result.stack, vec![Variable::Int(1)]);
        assert_eq!(result.return_value(), Some(1));
        assert_eq!(result.instructions_executed, 2);
    }

    #[test]
    fn test_fault_reports_instruction() {
        let fault = vm(
            vec![
                Operation::Const(Constant::Int(1)),
                Operation::Const(Constant::Int(0)),
                Operation::Div(ArithmeticOperands::IntInt),
            ],
            Routines::empty(),
        )
        .run()
        .unwrap_err();
        assert_eq!(fault.offset, 25);
        assert_eq!(fault.opcode, Opcode::Div);
        assert_eq!(fault.mnemonic, "DIVII");
        assert_eq!(fault.error, RuntimeError::Arithmetic("division by zero"));
    }

    #[test]
    fn test_instruction_limit() {
        let mut machine = vm(vec![Operation::Jmp { offset: 0 }], Routines::empty());
        machine.config.max_instructions = 50;
        let fault = machine.run().unwrap_err();
        assert_eq!(fault.error, RuntimeError::InstructionLimit { limit: 50 });
    }

    #[test]
    fn test_trace_enabled_runs() {
        let mut machine = vm(
            vec![Operation::Const(Constant::Int(3)), Operation::Action { routine: 0, arg_count: 1 }],
            Routines::builder()
                .register(0, "Echo", VariableType::Int, vec![VariableType::Int], |args, _| {
                    Ok(args[0].clone())
                })
                .build()
                .unwrap(),
        );
        machine.config.trace = true;
        assert_eq!(machine.run().unwrap().return_value(), Some(3));
    }

    #[test]
    fn test_yield_suspends_before_call() {
        let routines = Routines::builder()
            .register(0, "Wait", VariableType::Void, vec![VariableType::Int], |_, _| {
                Err(RoutineError::Yield)
            })
            .build()
            .unwrap();
        let result = vm(
            vec![
                Operation::Const(Constant::Int(7)),
                Operation::Action { routine: 0, arg_count: 1 },
                Operation::Retn,
            ],
            routines,
        )
        .run()
        .unwrap();

        assert_eq!(result.status, ExitStatus::Suspended);
        assert_eq!(result.stack, vec![Variable::Int(7)]);
        let saved = result.saved_state.unwrap();
        assert_eq!(saved.resume_offset, 19);
        assert_eq!(saved.locals, vec![Variable::Int(7)]);
    }

    #[test]
    fn test_resume_rejects_other_program() {
        let program = Arc::new(Program::from_operations("a", [Operation::Retn]));
        let other = Program::from_operations("b", [Operation::Nop2, Operation::Retn]);
        let saved = SavedState {
            program: other.digest().unwrap(),
            resume_offset: 13,
            globals: Vec::new(),
            locals: Vec::new(),
            frames: Vec::new(),
            stored: None,
        };
        let result = VM::resume(
            program,
            Arc::new(Routines::empty()),
            &saved,
            ExecutionContext::default(),
            VMConfig::default(),
        );
        assert!(matches!(result, Err(RuntimeError::ProgramMismatch)));
    }
}
