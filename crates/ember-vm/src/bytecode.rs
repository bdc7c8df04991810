//! Bytecode format and data structures
//!
//! A compiler hands the VM a [`FunctionProto`]: heap-independent bytecode
//! whose constants are plain Rust data. Loading it into a VM interns the
//! strings and turns nested prototypes into function objects, producing
//! the runtime [`Chunk`] each function executes.

use crate::error::{CompileError, Diagnostic};
use crate::opcode::{instruction::encode_u16, OpCode};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Compile-time constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Function(FunctionProto),
}

/// Function prototype (compiled function)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionProto {
    /// Function name (for debugging)
    pub name: String,

    /// Number of parameters
    pub arity: u8,

    /// Calls spawn a fiber instead of a frame
    #[serde(default)]
    pub is_async: bool,

    /// Opcode and operand bytes
    pub code: Vec<u8>,

    /// Constant pool
    pub constants: Vec<Constant>,

    /// Source line per code byte; may be empty
    #[serde(default)]
    pub lines: Vec<u32>,
}

impl FunctionProto {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity: 0,
            is_async: false,
            code: Vec::new(),
            constants: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Line for the byte at `offset`, if recorded
    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }
}

/// Executable bytecode of a loaded function
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub constants: Vec<Value>,
    pub lines: Vec<u32>,
}

impl Chunk {
    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    /// Approximate heap footprint of the buffers
    pub(crate) fn footprint(&self) -> usize {
        self.code.capacity()
            + self.constants.capacity() * std::mem::size_of::<Value>()
            + self.lines.capacity() * std::mem::size_of::<u32>()
    }
}

/// Assembler for [`FunctionProto`]
///
/// Encoding errors (constant pool or jump distance overflow) are collected
/// and reported by [`FunctionBuilder::finish`].
#[derive(Debug)]
pub struct FunctionBuilder {
    proto: FunctionProto,
    line: u32,
    errors: Vec<String>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            proto: FunctionProto::new(name),
            line: 1,
            errors: Vec::new(),
        }
    }

    pub fn arity(mut self, arity: u8) -> Self {
        self.proto.arity = arity;
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.proto.is_async = true;
        self
    }

    /// Line attributed to subsequently emitted bytes
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    /// Current end of the code buffer
    pub fn offset(&self) -> usize {
        self.proto.code.len()
    }

    pub fn byte(&mut self, byte: u8) -> &mut Self {
        self.proto.code.push(byte);
        self.proto.lines.push(self.line);
        self
    }

    pub fn short(&mut self, value: u16) -> &mut Self {
        let [hi, lo] = encode_u16(value);
        self.byte(hi).byte(lo)
    }

    pub fn op(&mut self, op: OpCode) -> &mut Self {
        self.byte(op.as_u8())
    }

    pub fn op_u8(&mut self, op: OpCode, operand: u8) -> &mut Self {
        self.op(op).byte(operand)
    }

    pub fn op_u16(&mut self, op: OpCode, operand: u16) -> &mut Self {
        self.op(op).short(operand)
    }

    /// Add a constant to the pool and return its index
    pub fn add_constant(&mut self, constant: Constant) -> u16 {
        if self.proto.constants.len() > u16::MAX as usize {
            self.errors.push("Too many constants in one chunk (max 65536)".into());
            return 0;
        }
        self.proto.constants.push(constant);
        (self.proto.constants.len() - 1) as u16
    }

    /// Index of a string constant, reusing an existing entry
    pub fn name(&mut self, name: &str) -> u16 {
        let existing = self
            .proto
            .constants
            .iter()
            .position(|c| matches!(c, Constant::String(s) if s == name));
        match existing {
            Some(idx) => idx as u16,
            None => self.add_constant(Constant::String(name.to_string())),
        }
    }

    /// Emit a constant load, choosing the short form when the index fits a byte
    pub fn constant(&mut self, constant: Constant) -> &mut Self {
        let idx = match constant {
            Constant::String(s) => self.name(&s),
            other => self.add_constant(other),
        };
        match u8::try_from(idx) {
            Ok(short) => self.op_u8(OpCode::Constant, short),
            Err(_) => self.op_u16(OpCode::ConstantLong, idx),
        }
    }

    pub fn number(&mut self, n: f64) -> &mut Self {
        self.constant(Constant::Number(n))
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        self.constant(Constant::String(s.to_string()))
    }

    /// Emit `op` followed by the u16 index of the string constant `name`
    pub fn named(&mut self, op: OpCode, name: &str) -> &mut Self {
        let idx = self.name(name);
        self.op_u16(op, idx)
    }

    /// Emit `op` with a placeholder offset; returns the operand position for [`Self::patch_jump`]
    pub fn emit_jump(&mut self, op: OpCode) -> usize {
        self.op(op).short(0xffff);
        self.offset() - 2
    }

    /// Point the jump operand at `at` to the current end of code
    pub fn patch_jump(&mut self, at: usize) {
        let distance = self.offset().saturating_sub(at + 2);
        match u16::try_from(distance) {
            Ok(distance) => {
                let [hi, lo] = encode_u16(distance);
                if let Some(slot) = self.proto.code.get_mut(at..at + 2) {
                    slot.copy_from_slice(&[hi, lo]);
                }
            }
            Err(_) => self.errors.push("Too much code to jump over".into()),
        }
    }

    /// Emit a backward jump to `start`
    pub fn emit_loop(&mut self, start: usize) -> &mut Self {
        self.op(OpCode::Loop);
        let distance = self.offset() + 2 - start;
        match u16::try_from(distance) {
            Ok(distance) => self.short(distance),
            Err(_) => {
                self.errors.push("Loop body too large".into());
                self.short(0)
            }
        }
    }

    pub fn finish(self) -> Result<FunctionProto, CompileError> {
        let line = self.line;
        if self.errors.is_empty() {
            Ok(self.proto)
        } else {
            Err(CompileError {
                diagnostics: self
                    .errors
                    .into_iter()
                    .map(|message| Diagnostic { line, message })
                    .collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_picks_short_then_long_form() {
        let mut b = FunctionBuilder::new("main");
        for i in 0..300 {
            b.number(i as f64);
        }
        let proto = b.finish().unwrap();
        assert_eq!(proto.code[0], OpCode::Constant.as_u8());
        // 256 short loads of 2 bytes, then long loads of 3 bytes
        assert_eq!(proto.code[512], OpCode::ConstantLong.as_u8());
        assert_eq!(&proto.code[513..515], &[0x01, 0x00]);
    }

    #[test]
    fn test_names_are_deduplicated() {
        let mut b = FunctionBuilder::new("main");
        let a = b.name("x");
        let c = b.name("x");
        assert_eq!(a, c);
        assert_eq!(b.finish().unwrap().constants.len(), 1);
    }

    #[test]
    fn test_jump_offsets_are_relative_to_operand_end() {
        let mut b = FunctionBuilder::new("main");
        let start = b.offset();
        let jump = b.emit_jump(OpCode::JumpIfFalse);
        b.op(OpCode::Pop).op(OpCode::Pop);
        b.patch_jump(jump);
        b.emit_loop(start);
        let proto = b.finish().unwrap();
        // JUMP_IF_FALSE skips the two POPs
        assert_eq!(&proto.code[1..3], &[0, 2]);
        // LOOP lands back on offset 0: its operand ends at 8
        assert_eq!(&proto.code[6..8], &[0, 8]);
    }

    #[test]
    fn test_lines_track_code_bytes() {
        let mut b = FunctionBuilder::new("main");
        b.line(4).op(OpCode::Nil);
        b.line(7).op(OpCode::Return);
        let proto = b.finish().unwrap();
        assert_eq!(proto.lines, vec![4, 7]);
        assert_eq!(proto.line_at(1), Some(7));
    }

    #[test]
    fn test_proto_serde_roundtrip() {
        let mut inner = FunctionBuilder::new("inner").arity(1);
        inner.op(OpCode::Nil).op(OpCode::Return);
        let mut b = FunctionBuilder::new("main");
        b.constant(Constant::Function(inner.finish().unwrap()));
        b.op(OpCode::Return);
        let proto = b.finish().unwrap();

        let json = serde_json::to_string(&proto).unwrap();
        let back: FunctionProto = serde_json::from_str(&json).unwrap();
        assert_eq!(back, proto);
    }
}
