//! Routine name lookup for tooling

/// Maps routine indices to names and back
///
/// Only pcode tooling resolves names; execution always dispatches by index.
pub trait RoutineNames {
    fn routine_name(&self, index: u16) -> Option<&str>;
    fn routine_index(&self, name: &str) -> Option<u16>;
}

/// Name source that knows no routines
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRoutineNames;

impl RoutineNames for NoRoutineNames {
    fn routine_name(&self, _index: u16) -> Option<&str> {
        None
    }

    fn routine_index(&self, _name: &str) -> Option<u16> {
        None
    }
}

/// A list of names where the position is the routine index
impl<S: AsRef<str>> RoutineNames for [S] {
    fn routine_name(&self, index: u16) -> Option<&str> {
        self.get(index as usize).map(|name| name.as_ref())
    }

    fn routine_index(&self, name: &str) -> Option<u16> {
        self.iter()
            .position(|candidate| candidate.as_ref() == name)
            .and_then(|i| u16::try_from(i).ok())
    }
}

impl<S: AsRef<str>> RoutineNames for Vec<S> {
    fn routine_name(&self, index: u16) -> Option<&str> {
        self.as_slice().routine_name(index)
    }

    fn routine_index(&self, name: &str) -> Option<u16> {
        self.as_slice().routine_index(name)
    }
}
