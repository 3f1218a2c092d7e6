//! Script value types

use crate::opcode::Qualifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host-owned engine structure referenced by a script value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    Effect,
    Event,
    Location,
    Talent,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Effect,
        EngineKind::Event,
        EngineKind::Location,
        EngineKind::Talent,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Effect => "effect",
            EngineKind::Event => "event",
            EngineKind::Location => "location",
            EngineKind::Talent => "talent",
        }
    }
}

/// Declared type of a script value, routine argument or routine result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    Void,
    Int,
    Float,
    String,
    Object,
    Vector,
    /// Deferred action; receives the last captured state
    Action,
    Engine(EngineKind),
}

impl VariableType {
    /// Number of 4-byte stack slots a value of this type occupies
    pub fn slot_count(self) -> usize {
        match self {
            VariableType::Void | VariableType::Action => 0,
            VariableType::Vector => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableType::Void => f.write_str("void"),
            VariableType::Int => f.write_str("int"),
            VariableType::Float => f.write_str("float"),
            VariableType::String => f.write_str("string"),
            VariableType::Object => f.write_str("object"),
            VariableType::Vector => f.write_str("vector"),
            VariableType::Action => f.write_str("action"),
            VariableType::Engine(kind) => f.write_str(kind.name()),
        }
    }
}

/// Type reserved by `RSADDx`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotType {
    Int,
    Float,
    String,
    Object,
    Engine(EngineKind),
}

impl SlotType {
    pub fn from_qualifier(qualifier: Qualifier) -> Option<Self> {
        let ty = match qualifier {
            Qualifier::Int => SlotType::Int,
            Qualifier::Float => SlotType::Float,
            Qualifier::String => SlotType::String,
            Qualifier::Object => SlotType::Object,
            Qualifier::Effect => SlotType::Engine(EngineKind::Effect),
            Qualifier::Event => SlotType::Engine(EngineKind::Event),
            Qualifier::Location => SlotType::Engine(EngineKind::Location),
            Qualifier::Talent => SlotType::Engine(EngineKind::Talent),
            _ => return None,
        };
        Some(ty)
    }

    pub fn qualifier(self) -> Qualifier {
        match self {
            SlotType::Int => Qualifier::Int,
            SlotType::Float => Qualifier::Float,
            SlotType::String => Qualifier::String,
            SlotType::Object => Qualifier::Object,
            SlotType::Engine(EngineKind::Effect) => Qualifier::Effect,
            SlotType::Engine(EngineKind::Event) => Qualifier::Event,
            SlotType::Engine(EngineKind::Location) => Qualifier::Location,
            SlotType::Engine(EngineKind::Talent) => Qualifier::Talent,
        }
    }

    pub fn variable_type(self) -> VariableType {
        match self {
            SlotType::Int => VariableType::Int,
            SlotType::Float => VariableType::Float,
            SlotType::String => VariableType::String,
            SlotType::Object => VariableType::Object,
            SlotType::Engine(kind) => VariableType::Engine(kind),
        }
    }
}
