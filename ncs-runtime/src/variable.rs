//! Script values
//!
//! One [`Variable`] occupies one 4-byte stack slot, except vectors, which
//! live on the stack as three float slots and only exist as a single value
//! at the routine boundary.

use crate::error::{Result, RuntimeError};
use crate::state::SavedState;
use ncs_spec::{EngineKind, SlotType, VariableType, OBJECT_INVALID};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-component float vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self::new(f(self.x), f(self.y), f(self.z))
    }

    fn zip(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Self::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
    }

    pub fn add(self, other: Self) -> Self {
        self.zip(other, |a, b| a + b)
    }

    pub fn sub(self, other: Self) -> Self {
        self.zip(other, |a, b| a - b)
    }

    pub fn scale(self, factor: f32) -> Self {
        self.map(|c| c * factor)
    }

    pub fn div(self, divisor: f32) -> Self {
        self.map(|c| c / divisor)
    }

    /// Divide a scalar by each component
    pub fn divide_into(self, dividend: f32) -> Self {
        self.map(|c| dividend / c)
    }
}

/// Typed script value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    Void,
    Int(i32),
    Float(f32),
    String(String),
    Object(u32),
    /// Host structure; `None` until a routine hands out a handle
    Engine {
        kind: EngineKind,
        handle: Option<u32>,
    },
    Vector(Vector),
    /// Deferred action captured by STORE_STATE
    Action(Box<SavedState>),
}

impl Variable {
    /// Value pushed by `RSADDx`
    pub fn reserved(slot: SlotType) -> Self {
        match slot {
            SlotType::Int => Variable::Int(0),
            SlotType::Float => Variable::Float(0.0),
            SlotType::String => Variable::String(String::new()),
            SlotType::Object => Variable::Object(OBJECT_INVALID),
            SlotType::Engine(kind) => Variable::Engine { kind, handle: None },
        }
    }

    pub fn variable_type(&self) -> VariableType {
        match self {
            Variable::Void => VariableType::Void,
            Variable::Int(_) => VariableType::Int,
            Variable::Float(_) => VariableType::Float,
            Variable::String(_) => VariableType::String,
            Variable::Object(_) => VariableType::Object,
            Variable::Engine { kind, .. } => VariableType::Engine(*kind),
            Variable::Vector(_) => VariableType::Vector,
            Variable::Action(_) => VariableType::Action,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Variable::Void => "void",
            Variable::Int(_) => "int",
            Variable::Float(_) => "float",
            Variable::String(_) => "string",
            Variable::Object(_) => "object",
            Variable::Engine { kind, .. } => kind.name(),
            Variable::Vector(_) => "vector",
            Variable::Action(_) => "action",
        }
    }

    pub fn as_int(&self) -> Result<i32> {
        match self {
            Variable::Int(v) => Ok(*v),
            other => Err(mismatch("int", other)),
        }
    }

    pub fn as_float(&self) -> Result<f32> {
        match self {
            Variable::Float(v) => Ok(*v),
            other => Err(mismatch("float", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Variable::String(v) => Ok(v),
            other => Err(mismatch("string", other)),
        }
    }

    pub fn as_object(&self) -> Result<u32> {
        match self {
            Variable::Object(id) => Ok(*id),
            other => Err(mismatch("object", other)),
        }
    }

    pub fn as_vector(&self) -> Result<Vector> {
        match self {
            Variable::Vector(v) => Ok(*v),
            other => Err(mismatch("vector", other)),
        }
    }
}

pub(crate) fn mismatch(expected: &'static str, found: &Variable) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

impl From<i32> for Variable {
    fn from(value: i32) -> Self {
        Variable::Int(value)
    }
}

impl From<bool> for Variable {
    fn from(value: bool) -> Self {
        Variable::Int(value as i32)
    }
}

impl From<f32> for Variable {
    fn from(value: f32) -> Self {
        Variable::Float(value)
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Variable::String(value)
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Variable::String(value.to_string())
    }
}

impl From<Vector> for Variable {
    fn from(value: Vector) -> Self {
        Variable::Vector(value)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Void => f.write_str("void"),
            Variable::Int(v) => write!(f, "{}", v),
            Variable::Float(v) => write!(f, "{:.6}", v),
            Variable::String(v) => write!(f, "\"{}\"", v),
            Variable::Object(id) => write!(f, "{}", id),
            Variable::Engine { kind, handle } => match handle {
                Some(h) => write!(f, "{}#{}", kind.name(), h),
                None => f.write_str(kind.name()),
            },
            Variable::Vector(v) => write!(f, "[{:.6},{:.6},{:.6}]", v.x, v.y, v.z),
            Variable::Action(_) => f.write_str("action"),
        }
    }
}
