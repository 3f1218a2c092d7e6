//! NCS Assembler
//!
//! Assemble pcode listings into NCS programs.
//!
//! One instruction per line, `MNEMONIC operand, operand`. Lines of the form
//! `name:` define labels that jump instructions may use in place of a
//! relative offset. ACTION takes a routine name (resolved through a
//! [`RoutineNames`](ncs_spec::RoutineNames) source) or a numeric index.
//! `;` and `#` start comments.
//!
//! ## Example
//!
//! ```rust
//! use ncs_assembler::assemble;
//! use ncs_spec::NoRoutineNames;
//!
//! let source = r#"
//!     CONSTI 1
//!     JZ skip
//!     CONSTS "taken"
//! skip:
//!     RETN
//! "#;
//!
//! let program = assemble("example", source, &NoRoutineNames).unwrap();
//! assert_eq!(program.len(), 4);
//! ```

pub mod error;
pub mod lexer;
pub mod parser;
pub mod assembler;

pub use error::{AssemblerError, Result};
pub use assembler::{assemble, assemble_to_bytes};
pub use parser::{parse_line, parse_mnemonic, parse_statement, Line, Operand, Statement};
