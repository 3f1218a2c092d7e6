//! # Program Structure
//!
//! Ordered, offset-addressable instruction sequence of one NCS module.

use crate::error::{NcsError, Result};
use crate::instruction::{Instruction, Operation};
use crate::{reader, writer, HEADER_SIZE};
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::sync::OnceLock;

/// SHA-256 fingerprint of a program's instruction stream
pub type Digest = [u8; 32];

/// Decoded NCS module
///
/// Instructions are contiguous: the first sits at [`HEADER_SIZE`] and every
/// following one starts where the previous one ends. [`Program::length`] is
/// the offset just past the last instruction, i.e. the module size.
#[derive(Clone, Debug)]
pub struct Program {
    name: String,
    instructions: Vec<Instruction>,
    index: HashMap<u32, usize>,
    length: u32,
    digest: OnceLock<Digest>,
}

impl Program {
    /// Create an empty program
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
            index: HashMap::new(),
            length: HEADER_SIZE,
            digest: OnceLock::new(),
        }
    }

    /// Create a program from operations laid out from the entry offset
    pub fn from_operations(name: impl Into<String>, ops: impl IntoIterator<Item = Operation>) -> Self {
        let mut program = Self::new(name);
        for op in ops {
            program.push(op);
        }
        program
    }

    /// Decode a module buffer
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        reader::read_program(name, bytes)
    }

    /// Encode into a module buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        writer::write_program(self)
    }

    /// Append an operation at the end offset; returns its offset
    pub fn push(&mut self, op: Operation) -> u32 {
        let offset = self.length;
        let ins = Instruction::new(offset, op);
        self.length = ins.next_offset();
        self.index.insert(offset, self.instructions.len());
        self.instructions.push(ins);
        self.digest = OnceLock::new();
        offset
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Instruction starting exactly at `offset`
    pub fn instruction_at(&self, offset: u32) -> Option<&Instruction> {
        self.index.get(&offset).map(|&i| &self.instructions[i])
    }

    /// Check if an instruction starts at `offset`
    pub fn contains_offset(&self, offset: u32) -> bool {
        self.index.contains_key(&offset)
    }

    /// Total module size in bytes, header included
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Offset of the first instruction
    pub fn entry_offset(&self) -> u32 {
        HEADER_SIZE
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Release the operations, e.g. to edit and re-layout them
    pub fn into_operations(self) -> Vec<Operation> {
        self.instructions.into_iter().map(|ins| ins.op).collect()
    }

    /// Fingerprint of the instruction stream, computed once
    pub fn digest(&self) -> Result<Digest> {
        if let Some(digest) = self.digest.get() {
            return Ok(*digest);
        }
        let encoded = bincode::serialize(&self.instructions)
            .map_err(|e| NcsError::Serialization(e.to_string()))?;
        let digest: Digest = Sha256::digest(&encoded).into();
        Ok(*self.digest.get_or_init(|| digest))
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.length == other.length
            && self.instructions == other.instructions
    }
}
