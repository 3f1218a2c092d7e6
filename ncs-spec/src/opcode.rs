//! # Opcode and Qualifier Bytes
//!
//! Every NCS instruction starts with two bytes: the opcode and the type
//! qualifier. The opcode selects the instruction family; the qualifier selects
//! the operand types for type-polymorphic families (`RSADDx`, `CONSTx`,
//! `EQUALxx`, `ADDxx`, ...) and is a fixed value for everything else.
//!
//! ## Opcode Encoding
//!
//! - 0x00-0x05: stack copies, reservations, constants, routine calls
//! - 0x06-0x1A: logical, relational, shift and arithmetic families
//! - 0x1B-0x25: stack pointer, control flow, destruct, increments
//! - 0x26-0x2D: base pointer addressing, state capture, padding
//! - 0x42: module size marker (header only)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Instruction opcode byte
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ========== Stack and Constants (0x00-0x05) ==========
    /// NOP: no operation
    Nop = 0x00,
    /// CPDOWNSP: copy top of stack down to an SP-relative slot
    CpDownSp = 0x01,
    /// RSADDx: reserve a slot holding the default value of a type
    RsAdd = 0x02,
    /// CPTOPSP: copy an SP-relative slot to the top of stack
    CpTopSp = 0x03,
    /// CONSTx: push a constant
    Const = 0x04,
    /// ACTION: call a native routine
    Action = 0x05,

    // ========== Logical (0x06-0x0A) ==========
    /// LOGANDII: logical and
    LogAnd = 0x06,
    /// LOGORII: logical or
    LogOr = 0x07,
    /// INCORII: bitwise inclusive or
    IncOr = 0x08,
    /// EXCORII: bitwise exclusive or
    ExcOr = 0x09,
    /// BOOLANDII: bitwise and
    BoolAnd = 0x0A,

    // ========== Relational (0x0B-0x10) ==========
    /// EQUALxx
    Equal = 0x0B,
    /// NEQUALxx
    NotEqual = 0x0C,
    /// GEQxx
    Geq = 0x0D,
    /// GTxx
    Gt = 0x0E,
    /// LTxx
    Lt = 0x0F,
    /// LEQxx
    Leq = 0x10,

    // ========== Shift (0x11-0x13) ==========
    /// SHLEFTII
    ShLeft = 0x11,
    /// SHRIGHTII
    ShRight = 0x12,
    /// USHRIGHTII
    UShRight = 0x13,

    // ========== Arithmetic (0x14-0x1A) ==========
    /// ADDxx
    Add = 0x14,
    /// SUBxx
    Sub = 0x15,
    /// MULxx
    Mul = 0x16,
    /// DIVxx
    Div = 0x17,
    /// MODII
    Mod = 0x18,
    /// NEGx
    Neg = 0x19,
    /// COMPI: bitwise complement
    Comp = 0x1A,

    // ========== Control Flow (0x1B-0x25) ==========
    /// MOVSP: drop bytes from the top of stack
    MovSp = 0x1B,
    /// JMP: unconditional relative jump
    Jmp = 0x1D,
    /// JSR: subroutine call
    Jsr = 0x1E,
    /// JZ: jump if popped int is zero
    Jz = 0x1F,
    /// RETN: return from subroutine
    Retn = 0x20,
    /// DESTRUCT: drop a region while keeping a sub-region
    Destruct = 0x21,
    /// NOTI: logical not
    Not = 0x22,
    /// DECISP: decrement an SP-relative int
    DecSp = 0x23,
    /// INCISP: increment an SP-relative int
    IncSp = 0x24,
    /// JNZ: jump if popped int is non-zero
    Jnz = 0x25,

    // ========== Base Pointer (0x26-0x2B) ==========
    /// CPDOWNBP: copy top of stack down to a BP-relative slot
    CpDownBp = 0x26,
    /// CPTOPBP: copy a BP-relative slot to the top of stack
    CpTopBp = 0x27,
    /// DECIBP: decrement a BP-relative int
    DecBp = 0x28,
    /// INCIBP: increment a BP-relative int
    IncBp = 0x29,
    /// SAVEBP: push BP and move it to the current top
    SaveBp = 0x2A,
    /// RESTOREBP: pop BP
    RestoreBp = 0x2B,

    // ========== State (0x2C-0x2D) ==========
    /// STORE_STATE: capture a resumable snapshot
    StoreState = 0x2C,
    /// NOP2: padding no-op
    Nop2 = 0x2D,
}

impl Opcode {
    /// Convert a raw byte to an opcode
    pub fn from_u8(value: u8) -> Option<Self> {
        use Opcode::*;
        let op = match value {
            0x00 => Nop,
            0x01 => CpDownSp,
            0x02 => RsAdd,
            0x03 => CpTopSp,
            0x04 => Const,
            0x05 => Action,
            0x06 => LogAnd,
            0x07 => LogOr,
            0x08 => IncOr,
            0x09 => ExcOr,
            0x0A => BoolAnd,
            0x0B => Equal,
            0x0C => NotEqual,
            0x0D => Geq,
            0x0E => Gt,
            0x0F => Lt,
            0x10 => Leq,
            0x11 => ShLeft,
            0x12 => ShRight,
            0x13 => UShRight,
            0x14 => Add,
            0x15 => Sub,
            0x16 => Mul,
            0x17 => Div,
            0x18 => Mod,
            0x19 => Neg,
            0x1A => Comp,
            0x1B => MovSp,
            0x1D => Jmp,
            0x1E => Jsr,
            0x1F => Jz,
            0x20 => Retn,
            0x21 => Destruct,
            0x22 => Not,
            0x23 => DecSp,
            0x24 => IncSp,
            0x25 => Jnz,
            0x26 => CpDownBp,
            0x27 => CpTopBp,
            0x28 => DecBp,
            0x29 => IncBp,
            0x2A => SaveBp,
            0x2B => RestoreBp,
            0x2C => StoreState,
            0x2D => Nop2,
            _ => return None,
        };
        Some(op)
    }

    /// Convert to the raw byte
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Family name without the qualifier suffix
    pub fn family(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "NOP",
            CpDownSp => "CPDOWNSP",
            RsAdd => "RSADD",
            CpTopSp => "CPTOPSP",
            Const => "CONST",
            Action => "ACTION",
            LogAnd => "LOGAND",
            LogOr => "LOGOR",
            IncOr => "INCOR",
            ExcOr => "EXCOR",
            BoolAnd => "BOOLAND",
            Equal => "EQUAL",
            NotEqual => "NEQUAL",
            Geq => "GEQ",
            Gt => "GT",
            Lt => "LT",
            Leq => "LEQ",
            ShLeft => "SHLEFT",
            ShRight => "SHRIGHT",
            UShRight => "USHRIGHT",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Neg => "NEG",
            Comp => "COMP",
            MovSp => "MOVSP",
            Jmp => "JMP",
            Jsr => "JSR",
            Jz => "JZ",
            Retn => "RETN",
            Destruct => "DESTRUCT",
            Not => "NOT",
            DecSp => "DECISP",
            IncSp => "INCISP",
            Jnz => "JNZ",
            CpDownBp => "CPDOWNBP",
            CpTopBp => "CPTOPBP",
            DecBp => "DECIBP",
            IncBp => "INCIBP",
            SaveBp => "SAVEBP",
            RestoreBp => "RESTOREBP",
            StoreState => "STORE_STATE",
            Nop2 => "NOP2",
        }
    }

    /// Check if this opcode transfers control to a relative target
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Jsr | Opcode::Jz | Opcode::Jnz)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family())
    }
}

/// Fixed qualifier byte of NOP
pub const QUALIFIER_NOP: u8 = 0x0C;

/// Fixed qualifier byte of stack copies and DESTRUCT
pub const QUALIFIER_COPY: u8 = 0x01;

/// Fixed qualifier byte of STORE_STATE
pub const QUALIFIER_STATE: u8 = 0x10;

/// Qualifier byte of opcodes that carry no type information
pub const QUALIFIER_NONE: u8 = 0x00;

/// Type qualifier byte of type-polymorphic opcodes
///
/// Single-type qualifiers (0x03-0x13) describe one operand, paired
/// qualifiers (0x20-0x3C) describe the two operands of a binary operator.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Qualifier {
    Int = 0x03,
    Float = 0x04,
    String = 0x05,
    Object = 0x06,
    Effect = 0x10,
    Event = 0x11,
    Location = 0x12,
    Talent = 0x13,
    IntInt = 0x20,
    FloatFloat = 0x21,
    ObjectObject = 0x22,
    StringString = 0x23,
    StructStruct = 0x24,
    IntFloat = 0x25,
    FloatInt = 0x26,
    EffectEffect = 0x30,
    EventEvent = 0x31,
    LocationLocation = 0x32,
    TalentTalent = 0x33,
    VectorVector = 0x3A,
    VectorFloat = 0x3B,
    FloatVector = 0x3C,
}

impl Qualifier {
    /// Convert a raw byte to a qualifier
    pub fn from_u8(value: u8) -> Option<Self> {
        use Qualifier::*;
        let q = match value {
            0x03 => Int,
            0x04 => Float,
            0x05 => String,
            0x06 => Object,
            0x10 => Effect,
            0x11 => Event,
            0x12 => Location,
            0x13 => Talent,
            0x20 => IntInt,
            0x21 => FloatFloat,
            0x22 => ObjectObject,
            0x23 => StringString,
            0x24 => StructStruct,
            0x25 => IntFloat,
            0x26 => FloatInt,
            0x30 => EffectEffect,
            0x31 => EventEvent,
            0x32 => LocationLocation,
            0x33 => TalentTalent,
            0x3A => VectorVector,
            0x3B => VectorFloat,
            0x3C => FloatVector,
            _ => return None,
        };
        Some(q)
    }

    /// Convert to the raw byte
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Mnemonic suffix ("I", "FF", "EFFEFF", "TT", ...)
    pub fn suffix(self) -> &'static str {
        use Qualifier::*;
        match self {
            Int => "I",
            Float => "F",
            String => "S",
            Object => "O",
            Effect => "EFF",
            Event => "EVT",
            Location => "LOC",
            Talent => "TAL",
            IntInt => "II",
            FloatFloat => "FF",
            ObjectObject => "OO",
            StringString => "SS",
            StructStruct => "TT",
            IntFloat => "IF",
            FloatInt => "FI",
            EffectEffect => "EFFEFF",
            EventEvent => "EVTEVT",
            LocationLocation => "LOCLOC",
            TalentTalent => "TALTAL",
            VectorVector => "VV",
            VectorFloat => "VF",
            FloatVector => "FV",
        }
    }
}
