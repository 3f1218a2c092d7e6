//! VM state for the NCS stack machine

use crate::error::{Result, RuntimeError};
use crate::variable::{mismatch, Variable, Vector};
use ncs_spec::{Digest, SLOT_SIZE};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Caller record pushed by JSR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnFrame {
    pub return_offset: u32,
    pub bp: usize,
}

/// Resumable snapshot of a script invocation
///
/// Produced by STORE_STATE (globals below BP, top-of-stack locals) and by a
/// yielding routine (the whole stack, pending return frames and the state the
/// last STORE_STATE left for action arguments). Resuming rebuilds the stack as
/// `globals ++ locals` with BP at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    /// Digest of the program the state was captured from
    pub program: Digest,
    pub resume_offset: u32,
    pub globals: Vec<Variable>,
    pub locals: Vec<Variable>,
    pub frames: Vec<ReturnFrame>,
    /// Pending STORE_STATE capture; always `None` for a STORE_STATE capture itself
    pub stored: Option<Box<SavedState>>,
}

impl SavedState {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| RuntimeError::SavedState(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| RuntimeError::SavedState(e.to_string()))
    }
}

/// How a run ended without faulting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Outermost RETN, or execution ran past the last instruction
    Returned,
    /// A routine yielded; resume from the snapshot to repeat the call
    Suspended,
}

/// Convert a byte offset or size operand to slots
#[inline]
pub(crate) fn slots(bytes: i64) -> i64 {
    bytes / SLOT_SIZE as i64
}

/// VM state
#[derive(Debug, Clone)]
pub struct VMState {
    /// Operand stack, one entry per slot
    pub stack: Vec<Variable>,

    /// Base pointer (slot index)
    pub bp: usize,

    /// Offset of the current instruction
    pub pc: u32,

    /// Return frames pushed by JSR
    pub frames: Vec<ReturnFrame>,

    /// Last state captured by STORE_STATE
    pub stored: Option<SavedState>,

    /// Snapshot taken when a routine yielded
    pub suspended: Option<SavedState>,

    /// Instruction count
    pub instructions_executed: u64,

    /// Set once execution stops
    pub exit: Option<ExitStatus>,
}

impl VMState {
    pub fn new(pc: u32) -> Self {
        Self {
            stack: Vec::new(),
            bp: 0,
            pc,
            frames: Vec::new(),
            stored: None,
            suspended: None,
            instructions_executed: 0,
            exit: None,
        }
    }

    /// Rebuild the state a snapshot describes
    pub fn from_saved(saved: &SavedState) -> Self {
        let mut state = Self::new(saved.resume_offset);
        state.stack.extend(saved.globals.iter().cloned());
        state.bp = state.stack.len();
        state.stack.extend(saved.locals.iter().cloned());
        state.frames = saved.frames.clone();
        state.stored = saved.stored.as_deref().cloned();
        state
    }

    /// Capture the whole invocation so it can be resumed at `resume_offset`
    pub fn snapshot(&self, program: Digest, resume_offset: u32) -> SavedState {
        let split = self.bp.min(self.stack.len());
        SavedState {
            program,
            resume_offset,
            globals: self.stack[..split].to_vec(),
            locals: self.stack[split..].to_vec(),
            frames: self.frames.clone(),
            stored: self.stored.clone().map(Box::new),
        }
    }

    pub fn halt(&mut self, status: ExitStatus) {
        self.exit = Some(status);
    }

    pub fn is_halted(&self) -> bool {
        self.exit.is_some()
    }

    // ========== Stack primitives ==========

    #[inline]
    pub fn push(&mut self, value: impl Into<Variable>) {
        self.stack.push(value.into());
    }

    pub fn push_vector(&mut self, v: Vector) {
        self.stack.extend([Variable::Float(v.x), Variable::Float(v.y), Variable::Float(v.z)]);
    }

    /// Fail unless at least `needed` slots are on the stack
    pub fn require(&self, needed: usize) -> Result<()> {
        if self.stack.len() < needed {
            return Err(RuntimeError::StackUnderflow {
                needed,
                available: self.stack.len(),
            });
        }
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Variable> {
        self.require(1)?;
        self.stack.pop().ok_or(RuntimeError::StackUnderflow {
            needed: 1,
            available: 0,
        })
    }

    pub fn pop_int(&mut self) -> Result<i32> {
        self.pop()?.as_int()
    }

    pub fn pop_float(&mut self) -> Result<f32> {
        self.pop()?.as_float()
    }

    pub fn pop_string(&mut self) -> Result<String> {
        match self.pop()? {
            Variable::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }

    /// Pop three floats, z first
    pub fn pop_vector(&mut self) -> Result<Vector> {
        self.require(3)?;
        let z = self.pop_float()?;
        let y = self.pop_float()?;
        let x = self.pop_float()?;
        Ok(Vector::new(x, y, z))
    }

    /// Drop `count` slots from the top
    pub fn drop_slots(&mut self, count: usize) -> Result<()> {
        self.require(count)?;
        let len = self.stack.len() - count;
        self.stack.truncate(len);
        Ok(())
    }

    // ========== Addressing ==========

    /// Slot range starting `offset` bytes from `base`, `count` slots long
    pub fn slot_range(&self, base: usize, offset: i32, count: usize) -> Result<Range<usize>> {
        let start = base as i64 + slots(offset as i64);
        let end = start + count as i64;
        if start < 0 || end > self.stack.len() as i64 {
            let index = if start < 0 { start } else { end - 1 };
            return Err(RuntimeError::StackOutOfBounds {
                index,
                size: self.stack.len(),
            });
        }
        Ok(start as usize..end as usize)
    }

    /// The `count` slots directly below slot `base`
    pub fn slots_below(&self, base: usize, count: usize) -> Result<Range<usize>> {
        let size = self.stack.len();
        match base.checked_sub(count) {
            Some(start) if base <= size => Ok(start..base),
            Some(_) => Err(RuntimeError::StackOutOfBounds {
                index: base as i64 - 1,
                size,
            }),
            None => Err(RuntimeError::StackOutOfBounds {
                index: base as i64 - count as i64,
                size,
            }),
        }
    }

    /// Single slot addressed relative to the top of stack
    pub fn sp_slot(&self, offset: i32) -> Result<usize> {
        Ok(self.slot_range(self.stack.len(), offset, 1)?.start)
    }

    /// Single slot addressed relative to BP
    pub fn bp_slot(&self, offset: i32) -> Result<usize> {
        Ok(self.slot_range(self.bp, offset, 1)?.start)
    }

    /// Overwrite `dst` with the top `count` slots
    pub fn copy_down(&mut self, base: usize, offset: i32, size: u16) -> Result<()> {
        let count = slots(size as i64) as usize;
        self.require(count)?;
        let dst = self.slot_range(base, offset, count)?;
        let src = self.stack.len() - count;
        for (i, slot) in dst.enumerate() {
            self.stack[slot] = self.stack[src + i].clone();
        }
        Ok(())
    }

    /// Push a copy of `count` slots starting at `offset` from `base`
    pub fn copy_top(&mut self, base: usize, offset: i32, size: u16) -> Result<()> {
        let count = slots(size as i64) as usize;
        let src = self.slot_range(base, offset, count)?;
        self.stack.extend_from_within(src);
        Ok(())
    }

    /// Add `delta` to the int at `slot`
    pub fn adjust_int(&mut self, slot: usize, delta: i32) -> Result<()> {
        match &mut self.stack[slot] {
            Variable::Int(v) => {
                *v = v.wrapping_add(delta);
                Ok(())
            }
            other => Err(mismatch("int", other)),
        }
    }
}
