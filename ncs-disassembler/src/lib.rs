//! # NCS Disassembler
//!
//! Render NCS programs as pcode listings and one-line instruction descriptions.
//!
//! A listing holds one instruction per line. Jump targets are preceded by a
//! `loc_%08x:` label and jump operands refer to those labels, so the listing
//! can be edited and assembled again with `ncs-assembler`. ACTION operands are
//! written as routine names when a [`RoutineNames`](ncs_spec::RoutineNames)
//! source knows them.
//!
//! ## Example
//!
//! ```rust
//! use ncs_spec::{Constant, NoRoutineNames, Operation, Program};
//! use ncs_disassembler::disassemble;
//!
//! let program = Program::from_operations(
//!     "example",
//!     [Operation::Const(Constant::Int(1)), Operation::Retn],
//! );
//! let pcode = disassemble(&program, &NoRoutineNames).unwrap();
//! assert!(pcode.contains("CONSTI 1"));
//! ```

pub mod error;
pub mod formatter;
pub mod disassembler;

pub use error::{DisassemblerError, Result};
pub use disassembler::{disassemble, disassemble_bytes, disassemble_with, ListingOptions};
pub use formatter::{describe, format, label};
