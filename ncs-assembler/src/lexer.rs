//! # Lexer for NCS pcode listings
//!
//! Lexes one line at a time; line structure is handled by the assembler.

use logos::Logos;

/// Tokens of a pcode line
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r";[^\n]*")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    /// Mnemonic, label or routine name
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    /// Decimal integer
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse().ok())]
    Integer(i64),

    /// Hexadecimal integer
    #[regex(r"0x[0-9a-fA-F]+", |lex| i64::from_str_radix(&lex.slice()[2..], 16).ok())]
    Hex(i64),

    /// Float literal, as printed by `{:?}` for `f32`
    #[regex(r"-?[0-9]+\.[0-9]+([eE][-+]?[0-9]+)?", |lex| lex.slice().parse().ok())]
    #[regex(r"-?[0-9]+[eE][-+]?[0-9]+", |lex| lex.slice().parse().ok())]
    #[regex(r"-?inf|NaN", |lex| lex.slice().parse().ok(), priority = 10)]
    Float(f32),

    /// Quoted string with `\" \\ \n \r \t` escapes
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,
}

/// Strip the quotes and resolve escapes; `None` on an unknown escape
fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            _ => return None,
        }
    }
    Some(out)
}
