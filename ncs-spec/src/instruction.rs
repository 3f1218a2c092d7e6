//! NCS Instruction Set
//!
//! One [`Operation`] variant per opcode. Type-polymorphic opcodes carry a
//! nested operand enum selected by the qualifier byte, so an operation holds
//! exactly the operands its binary shape encodes.
//!
//! ## Encoded Sizes
//! - 2 bytes: opcode + qualifier only (arithmetic, logical, RSADDx, RETN, ...)
//! - 4 bytes: EQUALTT/NEQUALTT (u16 size)
//! - 5 bytes: ACTION (u16 routine, u8 argument count)
//! - 6 bytes: CONSTI/CONSTF/CONSTO, MOVSP, jumps, INC/DEC (one 32-bit operand)
//! - 8 bytes: CP* and DESTRUCT
//! - 10 bytes: STORE_STATE
//! - 4 + n bytes: CONSTS

use crate::opcode::{Opcode, Qualifier, QUALIFIER_COPY, QUALIFIER_NONE, QUALIFIER_NOP, QUALIFIER_STATE};
use crate::types::{EngineKind, SlotType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute tolerance used by float equality
pub const FLOAT_TOLERANCE: f32 = 1e-5;

/// Constant pushed by `CONSTx`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int(i32),
    Float(f32),
    String(String),
    /// Object id; 0 refers to the caller
    Object(u32),
}

impl Constant {
    pub fn qualifier(&self) -> Qualifier {
        match self {
            Constant::Int(_) => Qualifier::Int,
            Constant::Float(_) => Qualifier::Float,
            Constant::String(_) => Qualifier::String,
            Constant::Object(_) => Qualifier::Object,
        }
    }
}

/// Operand types of `EQUALxx` / `NEQUALxx`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EqualityOperands {
    IntInt,
    FloatFloat,
    ObjectObject,
    StringString,
    /// Element-wise comparison of two `size`-byte regions
    StructStruct { size: u16 },
    Engine(EngineKind),
}

impl EqualityOperands {
    /// Map a qualifier to operands; `StructStruct` needs its size and is not produced here
    pub fn from_qualifier(qualifier: Qualifier) -> Option<Self> {
        let operands = match qualifier {
            Qualifier::IntInt => EqualityOperands::IntInt,
            Qualifier::FloatFloat => EqualityOperands::FloatFloat,
            Qualifier::ObjectObject => EqualityOperands::ObjectObject,
            Qualifier::StringString => EqualityOperands::StringString,
            Qualifier::EffectEffect => EqualityOperands::Engine(EngineKind::Effect),
            Qualifier::EventEvent => EqualityOperands::Engine(EngineKind::Event),
            Qualifier::LocationLocation => EqualityOperands::Engine(EngineKind::Location),
            Qualifier::TalentTalent => EqualityOperands::Engine(EngineKind::Talent),
            _ => return None,
        };
        Some(operands)
    }

    pub fn qualifier(self) -> Qualifier {
        match self {
            EqualityOperands::IntInt => Qualifier::IntInt,
            EqualityOperands::FloatFloat => Qualifier::FloatFloat,
            EqualityOperands::ObjectObject => Qualifier::ObjectObject,
            EqualityOperands::StringString => Qualifier::StringString,
            EqualityOperands::StructStruct { .. } => Qualifier::StructStruct,
            EqualityOperands::Engine(EngineKind::Effect) => Qualifier::EffectEffect,
            EqualityOperands::Engine(EngineKind::Event) => Qualifier::EventEvent,
            EqualityOperands::Engine(EngineKind::Location) => Qualifier::LocationLocation,
            EqualityOperands::Engine(EngineKind::Talent) => Qualifier::TalentTalent,
        }
    }
}

/// Operand types of the ordering comparisons (`GEQ`, `GT`, `LT`, `LEQ`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericOperands {
    IntInt,
    FloatFloat,
}

impl NumericOperands {
    pub fn from_qualifier(qualifier: Qualifier) -> Option<Self> {
        match qualifier {
            Qualifier::IntInt => Some(NumericOperands::IntInt),
            Qualifier::FloatFloat => Some(NumericOperands::FloatFloat),
            _ => None,
        }
    }

    pub fn qualifier(self) -> Qualifier {
        match self {
            NumericOperands::IntInt => Qualifier::IntInt,
            NumericOperands::FloatFloat => Qualifier::FloatFloat,
        }
    }
}

/// Operand types of `ADD`, `SUB`, `MUL` and `DIV`
///
/// Not every opcode accepts every pair; see [`Operation::is_supported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOperands {
    IntInt,
    IntFloat,
    FloatInt,
    FloatFloat,
    StringString,
    VectorVector,
    VectorFloat,
    FloatVector,
}

impl ArithmeticOperands {
    pub fn from_qualifier(qualifier: Qualifier) -> Option<Self> {
        let operands = match qualifier {
            Qualifier::IntInt => ArithmeticOperands::IntInt,
            Qualifier::IntFloat => ArithmeticOperands::IntFloat,
            Qualifier::FloatInt => ArithmeticOperands::FloatInt,
            Qualifier::FloatFloat => ArithmeticOperands::FloatFloat,
            Qualifier::StringString => ArithmeticOperands::StringString,
            Qualifier::VectorVector => ArithmeticOperands::VectorVector,
            Qualifier::VectorFloat => ArithmeticOperands::VectorFloat,
            Qualifier::FloatVector => ArithmeticOperands::FloatVector,
            _ => return None,
        };
        Some(operands)
    }

    pub fn qualifier(self) -> Qualifier {
        match self {
            ArithmeticOperands::IntInt => Qualifier::IntInt,
            ArithmeticOperands::IntFloat => Qualifier::IntFloat,
            ArithmeticOperands::FloatInt => Qualifier::FloatInt,
            ArithmeticOperands::FloatFloat => Qualifier::FloatFloat,
            ArithmeticOperands::StringString => Qualifier::StringString,
            ArithmeticOperands::VectorVector => Qualifier::VectorVector,
            ArithmeticOperands::VectorFloat => Qualifier::VectorFloat,
            ArithmeticOperands::FloatVector => Qualifier::FloatVector,
        }
    }
}

/// Operand type of `NEGx`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericType {
    Int,
    Float,
}

impl NumericType {
    pub fn from_qualifier(qualifier: Qualifier) -> Option<Self> {
        match qualifier {
            Qualifier::Int => Some(NumericType::Int),
            Qualifier::Float => Some(NumericType::Float),
            _ => None,
        }
    }

    pub fn qualifier(self) -> Qualifier {
        match self {
            NumericType::Int => Qualifier::Int,
            NumericType::Float => Qualifier::Float,
        }
    }
}

/// NCS operation: opcode plus typed operands
///
/// Stack offsets and sizes are byte counts; every stack slot is 4 bytes wide.
/// Jump offsets are relative to the offset of the jumping instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    // ========== Stack and Constants ==========
    Nop,
    CpDownSp { offset: i32, size: u16 },
    RsAdd(SlotType),
    CpTopSp { offset: i32, size: u16 },
    Const(Constant),
    Action { routine: u16, arg_count: u8 },

    // ========== Logical (int, int) ==========
    LogAnd,
    LogOr,
    IncOr,
    ExcOr,
    BoolAnd,

    // ========== Relational ==========
    Equal(EqualityOperands),
    NotEqual(EqualityOperands),
    Geq(NumericOperands),
    Gt(NumericOperands),
    Lt(NumericOperands),
    Leq(NumericOperands),

    // ========== Shift (int, int) ==========
    ShLeft,
    ShRight,
    UShRight,

    // ========== Arithmetic ==========
    Add(ArithmeticOperands),
    Sub(ArithmeticOperands),
    Mul(ArithmeticOperands),
    Div(ArithmeticOperands),
    Mod,
    Neg(NumericType),
    Comp,

    // ========== Control Flow ==========
    MovSp { offset: i32 },
    Jmp { offset: i32 },
    Jsr { offset: i32 },
    Jz { offset: i32 },
    Retn,
    Destruct { size: u16, offset: i16, size_no_destroy: u16 },
    Not,
    DecSp { offset: i32 },
    IncSp { offset: i32 },
    Jnz { offset: i32 },

    // ========== Base Pointer ==========
    CpDownBp { offset: i32, size: u16 },
    CpTopBp { offset: i32, size: u16 },
    DecBp { offset: i32 },
    IncBp { offset: i32 },
    SaveBp,
    RestoreBp,

    // ========== State ==========
    StoreState { globals: u32, locals: u32 },
    Nop2,
}

impl Operation {
    /// Opcode byte of this operation
    pub fn opcode(&self) -> Opcode {
        use Operation::*;
        match self {
            Nop => Opcode::Nop,
            CpDownSp { .. } => Opcode::CpDownSp,
            RsAdd(_) => Opcode::RsAdd,
            CpTopSp { .. } => Opcode::CpTopSp,
            Const(_) => Opcode::Const,
            Action { .. } => Opcode::Action,
            LogAnd => Opcode::LogAnd,
            LogOr => Opcode::LogOr,
            IncOr => Opcode::IncOr,
            ExcOr => Opcode::ExcOr,
            BoolAnd => Opcode::BoolAnd,
            Equal(_) => Opcode::Equal,
            NotEqual(_) => Opcode::NotEqual,
            Geq(_) => Opcode::Geq,
            Gt(_) => Opcode::Gt,
            Lt(_) => Opcode::Lt,
            Leq(_) => Opcode::Leq,
            ShLeft => Opcode::ShLeft,
            ShRight => Opcode::ShRight,
            UShRight => Opcode::UShRight,
            Add(_) => Opcode::Add,
            Sub(_) => Opcode::Sub,
            Mul(_) => Opcode::Mul,
            Div(_) => Opcode::Div,
            Mod => Opcode::Mod,
            Neg(_) => Opcode::Neg,
            Comp => Opcode::Comp,
            MovSp { .. } => Opcode::MovSp,
            Jmp { .. } => Opcode::Jmp,
            Jsr { .. } => Opcode::Jsr,
            Jz { .. } => Opcode::Jz,
            Retn => Opcode::Retn,
            Destruct { .. } => Opcode::Destruct,
            Not => Opcode::Not,
            DecSp { .. } => Opcode::DecSp,
            IncSp { .. } => Opcode::IncSp,
            Jnz { .. } => Opcode::Jnz,
            CpDownBp { .. } => Opcode::CpDownBp,
            CpTopBp { .. } => Opcode::CpTopBp,
            DecBp { .. } => Opcode::DecBp,
            IncBp { .. } => Opcode::IncBp,
            SaveBp => Opcode::SaveBp,
            RestoreBp => Opcode::RestoreBp,
            StoreState { .. } => Opcode::StoreState,
            Nop2 => Opcode::Nop2,
        }
    }

    /// Qualifier byte of this operation
    pub fn qualifier_byte(&self) -> u8 {
        use Operation::*;
        match self {
            Nop => QUALIFIER_NOP,
            CpDownSp { .. } | CpTopSp { .. } | CpDownBp { .. } | CpTopBp { .. } | Destruct { .. } => {
                QUALIFIER_COPY
            }
            RsAdd(ty) => ty.qualifier().to_u8(),
            Const(constant) => constant.qualifier().to_u8(),
            LogAnd | LogOr | IncOr | ExcOr | BoolAnd | ShLeft | ShRight | UShRight | Mod => {
                Qualifier::IntInt.to_u8()
            }
            Equal(operands) | NotEqual(operands) => operands.qualifier().to_u8(),
            Geq(operands) | Gt(operands) | Lt(operands) | Leq(operands) => operands.qualifier().to_u8(),
            Add(operands) | Sub(operands) | Mul(operands) | Div(operands) => operands.qualifier().to_u8(),
            Neg(ty) => ty.qualifier().to_u8(),
            Comp | Not | DecSp { .. } | IncSp { .. } | DecBp { .. } | IncBp { .. } => {
                Qualifier::Int.to_u8()
            }
            Action { .. } | MovSp { .. } | Jmp { .. } | Jsr { .. } | Jz { .. } | Jnz { .. } | Retn
            | SaveBp | RestoreBp | Nop2 => QUALIFIER_NONE,
            StoreState { .. } => QUALIFIER_STATE,
        }
    }

    /// Size of the binary encoding in bytes, including opcode and qualifier
    pub fn encoded_size(&self) -> u32 {
        use Operation::*;
        match self {
            CpDownSp { .. } | CpTopSp { .. } | CpDownBp { .. } | CpTopBp { .. } | Destruct { .. } => 8,
            Const(Constant::String(value)) => 4 + value.len() as u32,
            Const(_) => 6,
            Action { .. } => 5,
            Equal(EqualityOperands::StructStruct { .. })
            | NotEqual(EqualityOperands::StructStruct { .. }) => 4,
            MovSp { .. } | Jmp { .. } | Jsr { .. } | Jz { .. } | Jnz { .. } | DecSp { .. }
            | IncSp { .. } | DecBp { .. } | IncBp { .. } => 6,
            StoreState { .. } => 10,
            _ => 2,
        }
    }

    /// Relative jump offset of JMP, JSR, JZ and JNZ
    pub fn jump_offset(&self) -> Option<i32> {
        match self {
            Operation::Jmp { offset }
            | Operation::Jsr { offset }
            | Operation::Jz { offset }
            | Operation::Jnz { offset } => Some(*offset),
            _ => None,
        }
    }

    /// Mutable access to the relative jump offset
    pub fn jump_offset_mut(&mut self) -> Option<&mut i32> {
        match self {
            Operation::Jmp { offset }
            | Operation::Jsr { offset }
            | Operation::Jz { offset }
            | Operation::Jnz { offset } => Some(offset),
            _ => None,
        }
    }

    /// Check whether the operand types are valid for the opcode
    pub fn is_supported(&self) -> bool {
        use ArithmeticOperands::*;
        match self {
            Operation::Add(operands) => !matches!(operands, VectorFloat | FloatVector),
            Operation::Sub(operands) => !matches!(operands, StringString | VectorFloat | FloatVector),
            Operation::Mul(operands) | Operation::Div(operands) => {
                !matches!(operands, StringString | VectorVector)
            }
            _ => true,
        }
    }

    /// Full mnemonic, including the qualifier suffix ("ADDII", "RSADDEFF", "EQUALTT", ...)
    pub fn mnemonic(&self) -> &'static str {
        use Operation::*;
        match self {
            Nop => "NOP",
            CpDownSp { .. } => "CPDOWNSP",
            RsAdd(ty) => match ty {
                SlotType::Int => "RSADDI",
                SlotType::Float => "RSADDF",
                SlotType::String => "RSADDS",
                SlotType::Object => "RSADDO",
                SlotType::Engine(EngineKind::Effect) => "RSADDEFF",
                SlotType::Engine(EngineKind::Event) => "RSADDEVT",
                SlotType::Engine(EngineKind::Location) => "RSADDLOC",
                SlotType::Engine(EngineKind::Talent) => "RSADDTAL",
            },
            CpTopSp { .. } => "CPTOPSP",
            Const(constant) => match constant {
                Constant::Int(_) => "CONSTI",
                Constant::Float(_) => "CONSTF",
                Constant::String(_) => "CONSTS",
                Constant::Object(_) => "CONSTO",
            },
            Action { .. } => "ACTION",
            LogAnd => "LOGANDII",
            LogOr => "LOGORII",
            IncOr => "INCORII",
            ExcOr => "EXCORII",
            BoolAnd => "BOOLANDII",
            Equal(operands) => equality_mnemonic(*operands, false),
            NotEqual(operands) => equality_mnemonic(*operands, true),
            Geq(NumericOperands::IntInt) => "GEQII",
            Geq(NumericOperands::FloatFloat) => "GEQFF",
            Gt(NumericOperands::IntInt) => "GTII",
            Gt(NumericOperands::FloatFloat) => "GTFF",
            Lt(NumericOperands::IntInt) => "LTII",
            Lt(NumericOperands::FloatFloat) => "LTFF",
            Leq(NumericOperands::IntInt) => "LEQII",
            Leq(NumericOperands::FloatFloat) => "LEQFF",
            ShLeft => "SHLEFTII",
            ShRight => "SHRIGHTII",
            UShRight => "USHRIGHTII",
            Add(operands) => arithmetic_mnemonic(Opcode::Add, *operands),
            Sub(operands) => arithmetic_mnemonic(Opcode::Sub, *operands),
            Mul(operands) => arithmetic_mnemonic(Opcode::Mul, *operands),
            Div(operands) => arithmetic_mnemonic(Opcode::Div, *operands),
            Mod => "MODII",
            Neg(NumericType::Int) => "NEGI",
            Neg(NumericType::Float) => "NEGF",
            Comp => "COMPI",
            MovSp { .. } => "MOVSP",
            Jmp { .. } => "JMP",
            Jsr { .. } => "JSR",
            Jz { .. } => "JZ",
            Retn => "RETN",
            Destruct { .. } => "DESTRUCT",
            Not => "NOTI",
            DecSp { .. } => "DECISP",
            IncSp { .. } => "INCISP",
            Jnz { .. } => "JNZ",
            CpDownBp { .. } => "CPDOWNBP",
            CpTopBp { .. } => "CPTOPBP",
            DecBp { .. } => "DECIBP",
            IncBp { .. } => "INCIBP",
            SaveBp => "SAVEBP",
            RestoreBp => "RESTOREBP",
            StoreState { .. } => "STORE_STATE",
            Nop2 => "NOP2",
        }
    }
}

fn equality_mnemonic(operands: EqualityOperands, negated: bool) -> &'static str {
    use EqualityOperands::*;
    match (negated, operands) {
        (false, IntInt) => "EQUALII",
        (false, FloatFloat) => "EQUALFF",
        (false, ObjectObject) => "EQUALOO",
        (false, StringString) => "EQUALSS",
        (false, StructStruct { .. }) => "EQUALTT",
        (false, Engine(EngineKind::Effect)) => "EQUALEFFEFF",
        (false, Engine(EngineKind::Event)) => "EQUALEVTEVT",
        (false, Engine(EngineKind::Location)) => "EQUALLOCLOC",
        (false, Engine(EngineKind::Talent)) => "EQUALTALTAL",
        (true, IntInt) => "NEQUALII",
        (true, FloatFloat) => "NEQUALFF",
        (true, ObjectObject) => "NEQUALOO",
        (true, StringString) => "NEQUALSS",
        (true, StructStruct { .. }) => "NEQUALTT",
        (true, Engine(EngineKind::Effect)) => "NEQUALEFFEFF",
        (true, Engine(EngineKind::Event)) => "NEQUALEVTEVT",
        (true, Engine(EngineKind::Location)) => "NEQUALLOCLOC",
        (true, Engine(EngineKind::Talent)) => "NEQUALTALTAL",
    }
}

fn arithmetic_mnemonic(opcode: Opcode, operands: ArithmeticOperands) -> &'static str {
    use ArithmeticOperands::*;
    match (opcode, operands) {
        (Opcode::Add, IntInt) => "ADDII",
        (Opcode::Add, IntFloat) => "ADDIF",
        (Opcode::Add, FloatInt) => "ADDFI",
        (Opcode::Add, FloatFloat) => "ADDFF",
        (Opcode::Add, StringString) => "ADDSS",
        (Opcode::Add, VectorVector) => "ADDVV",
        (Opcode::Add, VectorFloat) => "ADDVF",
        (Opcode::Add, FloatVector) => "ADDFV",
        (Opcode::Sub, IntInt) => "SUBII",
        (Opcode::Sub, IntFloat) => "SUBIF",
        (Opcode::Sub, FloatInt) => "SUBFI",
        (Opcode::Sub, FloatFloat) => "SUBFF",
        (Opcode::Sub, StringString) => "SUBSS",
        (Opcode::Sub, VectorVector) => "SUBVV",
        (Opcode::Sub, VectorFloat) => "SUBVF",
        (Opcode::Sub, FloatVector) => "SUBFV",
        (Opcode::Mul, IntInt) => "MULII",
        (Opcode::Mul, IntFloat) => "MULIF",
        (Opcode::Mul, FloatInt) => "MULFI",
        (Opcode::Mul, FloatFloat) => "MULFF",
        (Opcode::Mul, StringString) => "MULSS",
        (Opcode::Mul, VectorVector) => "MULVV",
        (Opcode::Mul, VectorFloat) => "MULVF",
        (Opcode::Mul, FloatVector) => "MULFV",
        (_, IntInt) => "DIVII",
        (_, IntFloat) => "DIVIF",
        (_, FloatInt) => "DIVFI",
        (_, FloatFloat) => "DIVFF",
        (_, StringString) => "DIVSS",
        (_, VectorVector) => "DIVVV",
        (_, VectorFloat) => "DIVVF",
        (_, FloatVector) => "DIVFV",
    }
}

/// Escape a string constant for pcode text
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operation::*;
        f.write_str(self.mnemonic())?;
        match self {
            CpDownSp { offset, size }
            | CpTopSp { offset, size }
            | CpDownBp { offset, size }
            | CpTopBp { offset, size } => write!(f, " {}, {}", offset, size),
            Const(Constant::Int(value)) => write!(f, " {}", value),
            Const(Constant::Float(value)) => write!(f, " {:?}", value),
            Const(Constant::String(value)) => write!(f, " \"{}\"", escape_string(value)),
            Const(Constant::Object(id)) => write!(f, " {}", id),
            Action { routine, arg_count } => write!(f, " {}, {}", routine, arg_count),
            Equal(EqualityOperands::StructStruct { size })
            | NotEqual(EqualityOperands::StructStruct { size }) => write!(f, " {}", size),
            MovSp { offset }
            | Jmp { offset }
            | Jsr { offset }
            | Jz { offset }
            | Jnz { offset }
            | DecSp { offset }
            | IncSp { offset }
            | DecBp { offset }
            | IncBp { offset } => write!(f, " {}", offset),
            Destruct { size, offset, size_no_destroy } => {
                write!(f, " {}, {}, {}", size, offset, size_no_destroy)
            }
            StoreState { globals, locals } => write!(f, " {}, {}", globals, locals),
            _ => Ok(()),
        }
    }
}

/// Operation placed at an absolute byte offset of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub offset: u32,
    pub op: Operation,
}

impl Instruction {
    pub fn new(offset: u32, op: Operation) -> Self {
        Self { offset, op }
    }

    /// Encoded size in bytes
    pub fn size(&self) -> u32 {
        self.op.encoded_size()
    }

    /// Offset of the instruction that follows this one
    pub fn next_offset(&self) -> u32 {
        self.offset.saturating_add(self.size())
    }

    /// Absolute jump target; may lie outside the module for malformed input
    pub fn jump_target(&self) -> Option<i64> {
        self.op
            .jump_offset()
            .map(|relative| self.offset as i64 + relative as i64)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x} {}", self.offset, self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_sizes() {
        assert_eq!(Operation::Nop.encoded_size(), 2);
        assert_eq!(Operation::CpDownSp { offset: -4, size: 4 }.encoded_size(), 8);
        assert_eq!(Operation::Const(Constant::String("Aa".into())).encoded_size(), 6);
        assert_eq!(Operation::Const(Constant::String(String::new())).encoded_size(), 4);
        assert_eq!(Operation::Action { routine: 1, arg_count: 2 }.encoded_size(), 5);
        assert_eq!(
            Operation::Equal(EqualityOperands::StructStruct { size: 12 }).encoded_size(),
            4
        );
        assert_eq!(Operation::Equal(EqualityOperands::IntInt).encoded_size(), 2);
        assert_eq!(Operation::StoreState { globals: 4, locals: 8 }.encoded_size(), 10);
        assert_eq!(Operation::Jz { offset: 12 }.encoded_size(), 6);
    }

    #[test]
    fn test_mnemonic() {
        assert_eq!(Operation::RsAdd(SlotType::Engine(EngineKind::Effect)).mnemonic(), "RSADDEFF");
        assert_eq!(Operation::Add(ArithmeticOperands::FloatInt).mnemonic(), "ADDFI");
        assert_eq!(Operation::Div(ArithmeticOperands::FloatVector).mnemonic(), "DIVFV");
        assert_eq!(
            Operation::NotEqual(EqualityOperands::Engine(EngineKind::Location)).mnemonic(),
            "NEQUALLOCLOC"
        );
        assert_eq!(Operation::Not.mnemonic(), "NOTI");
        assert_eq!(Operation::StoreState { globals: 0, locals: 0 }.mnemonic(), "STORE_STATE");
    }

    #[test]
    fn test_is_supported() {
        assert!(Operation::Add(ArithmeticOperands::StringString).is_supported());
        assert!(!Operation::Add(ArithmeticOperands::VectorFloat).is_supported());
        assert!(Operation::Sub(ArithmeticOperands::VectorVector).is_supported());
        assert!(!Operation::Sub(ArithmeticOperands::StringString).is_supported());
        assert!(Operation::Mul(ArithmeticOperands::FloatVector).is_supported());
        assert!(!Operation::Div(ArithmeticOperands::VectorVector).is_supported());
    }

    #[test]
    fn test_qualifier_bytes() {
        assert_eq!(Operation::Nop.qualifier_byte(), 0x0C);
        assert_eq!(Operation::Destruct { size: 8, offset: -4, size_no_destroy: 4 }.qualifier_byte(), 0x01);
        assert_eq!(Operation::StoreState { globals: 4, locals: 8 }.qualifier_byte(), 0x10);
        assert_eq!(Operation::Mod.qualifier_byte(), 0x20);
        assert_eq!(Operation::Comp.qualifier_byte(), 0x03);
        assert_eq!(Operation::Equal(EqualityOperands::StructStruct { size: 4 }).qualifier_byte(), 0x24);
        assert_eq!(Operation::Retn.qualifier_byte(), 0x00);
    }

    #[test]
    fn test_jump_target() {
        let ins = Instruction::new(80, Operation::Jmp { offset: -22 });
        assert_eq!(ins.jump_target(), Some(58));
        assert_eq!(ins.next_offset(), 86);
        assert_eq!(Instruction::new(13, Operation::Retn).jump_target(), None);
    }

    #[test]
    fn test_display() {
        let ins = Instruction::new(13, Operation::CpDownSp { offset: -4, size: 4 });
        assert_eq!(ins.to_string(), "0000000d CPDOWNSP -4, 4");

        let op = Operation::Const(Constant::String("say \"hi\"".into()));
        assert_eq!(op.to_string(), "CONSTS \"say \\\"hi\\\"\"");

        let op = Operation::Const(Constant::Float(1.0));
        assert_eq!(op.to_string(), "CONSTF 1.0");

        let op = Operation::Destruct { size: 8, offset: -4, size_no_destroy: 4 };
        assert_eq!(op.to_string(), "DESTRUCT 8, -4, 4");
    }
}
