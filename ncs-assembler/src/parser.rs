//! Pcode line parser
//!
//! Turns one line into a label, an instruction statement or nothing, and maps
//! statements onto [`Operation`]s. Jump operands naming a label are returned
//! separately so the assembler can patch them once every label is known.

use crate::error::{AssemblerError, Result};
use crate::lexer::Token;
use logos::Logos;
use ncs_spec::{
    ArithmeticOperands, Constant, EngineKind, EqualityOperands, NumericOperands, NumericType,
    Operation, RoutineNames, SlotType,
};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Integer(i64),
    Float(f32),
    Str(String),
    Name(String),
}

/// Instruction line before operand resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub line: usize,
    pub mnemonic: String,
    pub operands: Vec<Operand>,
}

/// One parsed source line
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Blank,
    Label(String),
    Statement(Statement),
}

/// Drop a leading `offset<TAB>` column as written by offset listings
pub fn strip_offset(text: &str) -> &str {
    match text.split_once('\t') {
        Some((prefix, rest)) => {
            let prefix = prefix.trim();
            if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_hexdigit()) {
                rest
            } else {
                text
            }
        }
        None => text,
    }
}

/// Parse one source line; `line` is 1-based and used in errors
pub fn parse_line(line: usize, text: &str) -> Result<Line> {
    let mut lexer = Token::lexer(strip_offset(text));
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(AssemblerError::SyntaxError {
                    line,
                    column: lexer.span().start + 1,
                    message: format!("unexpected input '{}'", lexer.slice()),
                })
            }
        }
    }

    let mut tokens = tokens.into_iter();
    let mnemonic = match tokens.next() {
        None => return Ok(Line::Blank),
        Some(Token::Identifier(name)) => name,
        Some(other) => {
            return Err(AssemblerError::SyntaxError {
                line,
                column: 1,
                message: format!("expected mnemonic or label, found {:?}", other),
            })
        }
    };

    let rest: Vec<Token> = tokens.collect();
    if rest == [Token::Colon] {
        return Ok(Line::Label(mnemonic));
    }

    let mut operands = Vec::new();
    let mut expect_operand = true;
    for token in rest {
        let operand = match token {
            Token::Comma if !expect_operand => {
                expect_operand = true;
                continue;
            }
            Token::Integer(v) | Token::Hex(v) => Operand::Integer(v),
            Token::Float(v) => Operand::Float(v),
            Token::Str(s) => Operand::Str(s),
            Token::Identifier(name) => Operand::Name(name),
            other => {
                return Err(AssemblerError::SyntaxError {
                    line,
                    column: 0,
                    message: format!("unexpected {:?} in operands of {}", other, mnemonic),
                })
            }
        };
        if !expect_operand {
            return Err(AssemblerError::SyntaxError {
                line,
                column: 0,
                message: format!("missing ',' between operands of {}", mnemonic),
            });
        }
        operands.push(operand);
        expect_operand = false;
    }
    if expect_operand && !operands.is_empty() {
        return Err(AssemblerError::SyntaxError {
            line,
            column: 0,
            message: format!("trailing ',' after operands of {}", mnemonic),
        });
    }

    Ok(Line::Statement(Statement {
        line,
        mnemonic,
        operands,
    }))
}

fn templates() -> &'static HashMap<&'static str, Operation> {
    static TEMPLATES: OnceLock<HashMap<&'static str, Operation>> = OnceLock::new();
    TEMPLATES.get_or_init(|| {
        use Operation::*;

        let engines = [
            EngineKind::Effect,
            EngineKind::Event,
            EngineKind::Location,
            EngineKind::Talent,
        ];
        let slots = [SlotType::Int, SlotType::Float, SlotType::String, SlotType::Object]
            .into_iter()
            .chain(engines.map(SlotType::Engine));
        let equality = [
            EqualityOperands::IntInt,
            EqualityOperands::FloatFloat,
            EqualityOperands::ObjectObject,
            EqualityOperands::StringString,
            EqualityOperands::StructStruct { size: 0 },
        ]
        .into_iter()
        .chain(engines.map(EqualityOperands::Engine));
        let numeric = [NumericOperands::IntInt, NumericOperands::FloatFloat];
        let arithmetic = [
            ArithmeticOperands::IntInt,
            ArithmeticOperands::IntFloat,
            ArithmeticOperands::FloatInt,
            ArithmeticOperands::FloatFloat,
            ArithmeticOperands::StringString,
            ArithmeticOperands::VectorVector,
            ArithmeticOperands::VectorFloat,
            ArithmeticOperands::FloatVector,
        ];

        let mut ops = vec![
            Nop,
            CpDownSp { offset: 0, size: 0 },
            CpTopSp { offset: 0, size: 0 },
            Const(Constant::Int(0)),
            Const(Constant::Float(0.0)),
            Const(Constant::String(String::new())),
            Const(Constant::Object(0)),
            Action {
                routine: 0,
                arg_count: 0,
            },
            LogAnd,
            LogOr,
            IncOr,
            ExcOr,
            BoolAnd,
            ShLeft,
            ShRight,
            UShRight,
            Mod,
            Neg(NumericType::Int),
            Neg(NumericType::Float),
            Comp,
            MovSp { offset: 0 },
            Jmp { offset: 0 },
            Jsr { offset: 0 },
            Jz { offset: 0 },
            Retn,
            Destruct {
                size: 0,
                offset: 0,
                size_no_destroy: 0,
            },
            Not,
            DecSp { offset: 0 },
            IncSp { offset: 0 },
            Jnz { offset: 0 },
            CpDownBp { offset: 0, size: 0 },
            CpTopBp { offset: 0, size: 0 },
            DecBp { offset: 0 },
            IncBp { offset: 0 },
            SaveBp,
            RestoreBp,
            StoreState {
                globals: 0,
                locals: 0,
            },
            Nop2,
        ];
        ops.extend(slots.map(RsAdd));
        for operands in equality {
            ops.push(Equal(operands));
            ops.push(NotEqual(operands));
        }
        for operands in numeric {
            ops.extend([Geq(operands), Gt(operands), Lt(operands), Leq(operands)]);
        }
        for operands in arithmetic {
            ops.extend([Add(operands), Sub(operands), Mul(operands), Div(operands)]);
        }

        ops.into_iter()
            .filter(Operation::is_supported)
            .map(|op| (op.mnemonic(), op))
            .collect()
    })
}

/// Operation shape named by a mnemonic, operands zeroed
pub fn parse_mnemonic(mnemonic: &str) -> Option<Operation> {
    templates().get(mnemonic).cloned()
}

/// Resolve a statement into an operation
///
/// Returns the label a jump refers to, if any; the jump offset is left at
/// zero for the assembler to patch.
pub fn parse_statement(
    stmt: &Statement,
    names: &dyn RoutineNames,
) -> Result<(Operation, Option<String>)> {
    use Operation::*;

    let template = parse_mnemonic(&stmt.mnemonic).ok_or_else(|| {
        AssemblerError::UnknownInstruction {
            line: stmt.line,
            mnemonic: stmt.mnemonic.clone(),
        }
    })?;
    let args = Args { stmt };

    let op = match template {
        CpDownSp { .. } | CpTopSp { .. } | CpDownBp { .. } | CpTopBp { .. } => {
            args.count(2)?;
            let offset = args.int(0)?;
            let size = args.int(1)?;
            match template {
                CpDownSp { .. } => CpDownSp { offset, size },
                CpTopSp { .. } => CpTopSp { offset, size },
                CpDownBp { .. } => CpDownBp { offset, size },
                _ => CpTopBp { offset, size },
            }
        }
        Const(constant) => {
            args.count(1)?;
            Const(match constant {
                Constant::Int(_) => Constant::Int(args.int(0)?),
                Constant::Float(_) => Constant::Float(args.float(0)?),
                Constant::String(_) => Constant::String(args.string(0)?),
                Constant::Object(_) => Constant::Object(args.int(0)?),
            })
        }
        Action { .. } => {
            args.count(2)?;
            Action {
                routine: args.routine(0, names)?,
                arg_count: args.int(1)?,
            }
        }
        Equal(EqualityOperands::StructStruct { .. }) => {
            args.count(1)?;
            Equal(EqualityOperands::StructStruct { size: args.int(0)? })
        }
        NotEqual(EqualityOperands::StructStruct { .. }) => {
            args.count(1)?;
            NotEqual(EqualityOperands::StructStruct { size: args.int(0)? })
        }
        MovSp { .. } | DecSp { .. } | IncSp { .. } | DecBp { .. } | IncBp { .. } => {
            args.count(1)?;
            let offset = args.int(0)?;
            match template {
                MovSp { .. } => MovSp { offset },
                DecSp { .. } => DecSp { offset },
                IncSp { .. } => IncSp { offset },
                DecBp { .. } => DecBp { offset },
                _ => IncBp { offset },
            }
        }
        Jmp { .. } | Jsr { .. } | Jz { .. } | Jnz { .. } => {
            args.count(1)?;
            let mut op = template;
            return match &stmt.operands[0] {
                Operand::Name(label) => Ok((op, Some(label.clone()))),
                _ => {
                    if let Some(offset) = op.jump_offset_mut() {
                        *offset = args.int(0)?;
                    }
                    Ok((op, None))
                }
            };
        }
        Destruct { .. } => {
            args.count(3)?;
            Destruct {
                size: args.int(0)?,
                offset: args.int(1)?,
                size_no_destroy: args.int(2)?,
            }
        }
        StoreState { .. } => {
            args.count(2)?;
            StoreState {
                globals: args.int(0)?,
                locals: args.int(1)?,
            }
        }
        other => {
            args.count(0)?;
            other
        }
    };
    Ok((op, None))
}

/// Typed operand access for one statement
struct Args<'a> {
    stmt: &'a Statement,
}

impl Args<'_> {
    fn invalid(&self, message: String) -> AssemblerError {
        AssemblerError::InvalidOperand {
            line: self.stmt.line,
            message,
        }
    }

    fn count(&self, expected: usize) -> Result<()> {
        let found = self.stmt.operands.len();
        if found != expected {
            return Err(self.invalid(format!(
                "{} takes {} operands, found {}",
                self.stmt.mnemonic, expected, found
            )));
        }
        Ok(())
    }

    fn int<T: TryFrom<i64>>(&self, i: usize) -> Result<T> {
        match &self.stmt.operands[i] {
            Operand::Integer(v) => T::try_from(*v).map_err(|_| {
                self.invalid(format!(
                    "operand {} of {} out of range: {}",
                    i + 1,
                    self.stmt.mnemonic,
                    v
                ))
            }),
            other => Err(self.invalid(format!(
                "operand {} of {} must be an integer, found {:?}",
                i + 1,
                self.stmt.mnemonic,
                other
            ))),
        }
    }

    fn float(&self, i: usize) -> Result<f32> {
        match &self.stmt.operands[i] {
            Operand::Float(v) => Ok(*v),
            Operand::Integer(v) => Ok(*v as f32),
            other => Err(self.invalid(format!(
                "operand {} of {} must be a float, found {:?}",
                i + 1,
                self.stmt.mnemonic,
                other
            ))),
        }
    }

    fn string(&self, i: usize) -> Result<String> {
        match &self.stmt.operands[i] {
            Operand::Str(s) => Ok(s.clone()),
            other => Err(self.invalid(format!(
                "operand {} of {} must be a string, found {:?}",
                i + 1,
                self.stmt.mnemonic,
                other
            ))),
        }
    }

    fn routine(&self, i: usize, names: &dyn RoutineNames) -> Result<u16> {
        match &self.stmt.operands[i] {
            Operand::Name(name) => {
                names
                    .routine_index(name)
                    .ok_or_else(|| AssemblerError::UnknownRoutine {
                        line: self.stmt.line,
                        name: name.clone(),
                    })
            }
            _ => self.int(i),
        }
    }
}
