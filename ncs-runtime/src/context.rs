//! Per-invocation host context

use ncs_spec::OBJECT_INVALID;

/// Objects and event the running script was invoked for
///
/// `caller` is substituted for `CONSTO 0`. Native routines receive the
/// context by reference on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub caller: u32,
    pub triggerer: u32,
    pub user_defined_event: i32,
}

impl ExecutionContext {
    pub fn with_caller(caller: u32) -> Self {
        Self {
            caller,
            ..Self::default()
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            caller: OBJECT_INVALID,
            triggerer: OBJECT_INVALID,
            user_defined_event: -1,
        }
    }
}
