//! # NCS Runtime
//!
//! Execute compiled NCS scripts on a slot-based stack machine.
//!
//! ## Features
//!
//! - **Typed stack**: one value per 4-byte slot, SP- and BP-relative addressing
//! - **Routine bridge**: ACTION dispatches to native routines registered once at startup
//! - **Deferred execution**: STORE_STATE captures resumable [`SavedState`] snapshots
//! - **Suspension**: a routine may yield, leaving a snapshot that repeats the call
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ncs_runtime::{ExecutionContext, Routines, VMConfig, VM};
//! use ncs_spec::Program;
//!
//! let bytes = std::fs::read("k_ai_master.ncs").unwrap();
//! let program = Arc::new(Program::from_bytes("k_ai_master", &bytes).unwrap());
//! let routines = Arc::new(Routines::empty());
//! let vm = VM::new(program, routines, ExecutionContext::default(), VMConfig::default());
//! let result = vm.run().unwrap();
//! println!("Returned {:?} after {} instructions", result.return_value(), result.instructions_executed);
//! ```

pub mod error;
pub mod variable;
pub mod context;
pub mod state;
pub mod routine;
pub mod execute;
pub mod vm;

pub use context::ExecutionContext;
pub use error::{Fault, RuntimeError};
pub use routine::{
    Invocation, NativeFn, RegistrationError, Routine, RoutineError, Routines, RoutinesBuilder,
};
pub use state::{ExitStatus, ReturnFrame, SavedState, VMState};
pub use variable::{Variable, Vector};
pub use vm::{ExecutionResult, VMConfig, VM};

use std::sync::Arc;

/// Simple execution helper
///
/// Runs a program with no routines and the default context.
pub fn run(program: ncs_spec::Program) -> Result<ExecutionResult, Fault> {
    let vm = VM::new(
        Arc::new(program),
        Arc::new(Routines::empty()),
        ExecutionContext::default(),
        VMConfig::default(),
    );
    vm.run()
}
