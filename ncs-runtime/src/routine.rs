//! Routine bridge
//!
//! Maps the routine index of an ACTION instruction to a native callable with
//! declared argument and return types. The table is built once through
//! [`RoutinesBuilder`] and is read-only afterwards, so one `Arc<Routines>`
//! can be shared by any number of executors on any number of threads.
//!
//! Argument convention on the stack: declared argument 0 is on top. Vector
//! arguments take three float slots (z on top), action arguments take no slot
//! and receive the state captured by the last STORE_STATE.

use crate::context::ExecutionContext;
use crate::error::{Result, RuntimeError};
use crate::state::SavedState;
use crate::variable::{Variable, Vector};
use ncs_spec::{RoutineNames, VariableType};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Non-success outcome of a native routine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutineError {
    /// The routine failed; the invocation faults
    #[error("{0}")]
    Fault(String),

    /// The routine cannot complete now; the executor suspends before the call
    #[error("yield")]
    Yield,
}

/// Signature of a native routine
pub type NativeFn =
    dyn Fn(&[Variable], &ExecutionContext) -> std::result::Result<Variable, RoutineError> + Send + Sync;

/// Registered native routine
#[derive(Clone)]
pub struct Routine {
    pub index: u16,
    pub name: String,
    pub return_type: VariableType,
    pub arg_types: Vec<VariableType>,
    func: Arc<NativeFn>,
}

impl Routine {
    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    /// Stack slots taken by the first `arg_count` declared arguments
    pub fn arg_slots(&self, arg_count: usize) -> usize {
        self.arg_types
            .iter()
            .take(arg_count)
            .map(|ty| ty.slot_count())
            .sum()
    }

    fn marshal_error(&self, reason: impl Into<String>) -> RuntimeError {
        RuntimeError::Marshal {
            routine: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Read `arg_count` arguments off the top of `stack` without popping
    ///
    /// Returns the arguments in declaration order. Fails with `Marshal` on an
    /// arity or type mismatch and leaves the stack untouched either way.
    pub fn marshal_args(
        &self,
        stack: &[Variable],
        arg_count: usize,
        stored: Option<&SavedState>,
    ) -> Result<Vec<Variable>> {
        if arg_count > self.arity() {
            return Err(self.marshal_error(format!(
                "{} arguments passed, {} declared",
                arg_count,
                self.arity()
            )));
        }
        let needed = self.arg_slots(arg_count);
        if stack.len() < needed {
            return Err(RuntimeError::StackUnderflow {
                needed,
                available: stack.len(),
            });
        }

        let mut top = stack.len();
        let mut args = Vec::with_capacity(arg_count);
        for (i, ty) in self.arg_types.iter().take(arg_count).enumerate() {
            let arg = match ty {
                VariableType::Vector => {
                    let mut components = [0.0f32; 3];
                    for component in components.iter_mut().rev() {
                        top -= 1;
                        *component = match &stack[top] {
                            Variable::Float(v) => *v,
                            other => {
                                return Err(self.marshal_error(format!(
                                    "argument {} expects vector, found {} component",
                                    i,
                                    other.type_name()
                                )))
                            }
                        };
                    }
                    Variable::Vector(Vector::new(components[0], components[1], components[2]))
                }
                VariableType::Action => match stored {
                    Some(state) => Variable::Action(Box::new(state.clone())),
                    None => {
                        return Err(self.marshal_error(format!(
                            "argument {} expects action, no state stored",
                            i
                        )))
                    }
                },
                expected => {
                    top -= 1;
                    let value = &stack[top];
                    if value.variable_type() != *expected {
                        return Err(self.marshal_error(format!(
                            "argument {} expects {}, found {}",
                            i,
                            expected,
                            value.type_name()
                        )));
                    }
                    value.clone()
                }
            };
            args.push(arg);
        }
        Ok(args)
    }

    fn check_args(&self, args: &[Variable]) -> Result<()> {
        if args.len() > self.arity() {
            return Err(self.marshal_error(format!(
                "{} arguments passed, {} declared",
                args.len(),
                self.arity()
            )));
        }
        for (i, (arg, expected)) in args.iter().zip(&self.arg_types).enumerate() {
            if arg.variable_type() != *expected {
                return Err(self.marshal_error(format!(
                    "argument {} expects {}, found {}",
                    i,
                    expected,
                    arg.type_name()
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routine")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("arg_types", &self.arg_types)
            .finish()
    }
}

/// Result of a routine invocation that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Returned(Variable),
    Yielded,
}

/// Routine table build error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Routine index {index} registered twice ({first}, {second})")]
    DuplicateIndex {
        index: u16,
        first: String,
        second: String,
    },

    #[error("Routine name {name} registered twice (indices {first}, {second})")]
    DuplicateName { name: String, first: u16, second: u16 },
}

/// Builder for the routine table
#[derive(Default)]
pub struct RoutinesBuilder {
    routines: Vec<Option<Routine>>,
    by_name: HashMap<String, u16>,
    error: Option<RegistrationError>,
}

impl RoutinesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native routine; duplicates surface from [`build`](Self::build)
    pub fn register<F>(
        mut self,
        index: u16,
        name: impl Into<String>,
        return_type: VariableType,
        arg_types: Vec<VariableType>,
        func: F,
    ) -> Self
    where
        F: Fn(&[Variable], &ExecutionContext) -> std::result::Result<Variable, RoutineError>
            + Send
            + Sync
            + 'static,
    {
        if self.error.is_some() {
            return self;
        }
        let name = name.into();
        let slot = index as usize;
        if self.routines.len() <= slot {
            self.routines.resize_with(slot + 1, || None);
        }

        if let Some(existing) = &self.routines[slot] {
            self.error = Some(RegistrationError::DuplicateIndex {
                index,
                first: existing.name.clone(),
                second: name,
            });
            return self;
        }
        if let Some(&first) = self.by_name.get(&name) {
            self.error = Some(RegistrationError::DuplicateName {
                name,
                first,
                second: index,
            });
            return self;
        }

        self.by_name.insert(name.clone(), index);
        self.routines[slot] = Some(Routine {
            index,
            name,
            return_type,
            arg_types,
            func: Arc::new(func),
        });
        self
    }

    pub fn build(self) -> std::result::Result<Routines, RegistrationError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Routines {
                routines: self.routines,
                by_name: self.by_name,
            }),
        }
    }
}

/// Immutable routine table
#[derive(Debug, Default)]
pub struct Routines {
    routines: Vec<Option<Routine>>,
    by_name: HashMap<String, u16>,
}

impl Routines {
    /// Table with no routines
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> RoutinesBuilder {
        RoutinesBuilder::new()
    }

    pub fn get(&self, index: u16) -> Option<&Routine> {
        self.routines.get(index as usize).and_then(Option::as_ref)
    }

    /// Lookup by name, for tooling
    pub fn by_name(&self, name: &str) -> Option<&Routine> {
        self.by_name.get(name).and_then(|&index| self.get(index))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Dispatch a call with already-marshalled arguments
    pub fn invoke(
        &self,
        index: u16,
        args: &[Variable],
        context: &ExecutionContext,
    ) -> Result<Invocation> {
        let routine = self.get(index).ok_or(RuntimeError::RoutineDispatch { index })?;
        routine.check_args(args)?;

        trace!(index, routine = %routine.name, args = args.len(), "invoking routine");

        let value = match (routine.func)(args, context) {
            Ok(value) => value,
            Err(RoutineError::Yield) => return Ok(Invocation::Yielded),
            Err(RoutineError::Fault(reason)) => {
                return Err(RuntimeError::RoutineFault {
                    routine: routine.name.clone(),
                    reason,
                })
            }
        };

        if value.variable_type() != routine.return_type {
            return Err(routine.marshal_error(format!(
                "returned {}, declared {}",
                value.type_name(),
                routine.return_type
            )));
        }
        Ok(Invocation::Returned(value))
    }
}

impl RoutineNames for Routines {
    fn routine_name(&self, index: u16) -> Option<&str> {
        self.get(index).map(|r| r.name.as_str())
    }

    fn routine_index(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }
}
