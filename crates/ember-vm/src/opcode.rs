//! OpCode definitions for the Ember VM
//!
//! Instructions are a one-byte opcode followed by a fixed operand layout:
//!
//! - `u8`: short constant index, call argument count, interpolation count
//! - `u16`: big-endian constant index (names, long constants), local slot,
//!   element count, or relative jump offset
//!
//! Jump offsets are unsigned and measured from the byte after the operand;
//! `Loop` jumps backward, every other jump forward.

use std::fmt;

/// Virtual machine instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // ===== Control =====
    /// Return top of stack from the current frame
    Return = 0,

    // ===== Constants =====
    /// Push K[u8]
    Constant = 1,
    /// Push K[u16]
    ConstantLong = 2,

    // ===== Arithmetic =====
    /// Negate the number on top
    Negate = 3,
    /// a + b: numbers, string concatenation, in-place array append
    Add = 4,
    Subtract = 5,
    Multiply = 6,
    Divide = 7,
    /// a ^ b
    Power = 8,
    /// Signed remainder (truncating), not floored modulo
    Modulo = 9,

    // ===== Literals =====
    False = 10,
    True = 11,
    Nil = 12,

    // ===== Logic =====
    /// Push !truthy(top)
    Not = 13,
    /// top + 1
    Increment = 14,
    /// top - 1
    Decrement = 15,

    // ===== Comparison =====
    Equal = 16,
    /// Pop b, pop a, push a > b
    Greater = 17,
    /// Pop b, pop a, push a < b
    Less = 18,

    // ===== Stack =====
    Pop = 19,

    // ===== Variables =====
    /// scope[K[u16]] = pop
    DefineGlobal = 20,
    /// push scope[K[u16]], error if absent
    GetGlobal = 21,
    /// Like DefineGlobal, and records the name as exported
    ExportGlobal = 22,
    /// scope[K[u16]] = peek, error if absent
    SetGlobal = 23,
    /// push stack[base + u16]
    GetLocal = 24,
    /// stack[base + u16] = peek
    SetLocal = 25,

    // ===== Jumps =====
    /// Jump forward u16 if top is falsey (top stays on the stack)
    JumpIfFalse = 26,
    /// Jump forward u16
    Jump = 27,
    /// Jump backward u16
    Loop = 28,

    // ===== Functions =====
    /// Call stack[top - u8 - 1] with u8 arguments
    Call = 29,

    // ===== Collections =====
    /// Pop u16 values into a new array
    CreateList = 30,
    /// [seq, index] -> seq[index]
    SubscriptRead = 31,
    /// [seq, index, value] -> value, after seq[index] = value
    SubscriptWrite = 32,
    /// [array, from, to] -> array[from..to]
    SliceArray = 33,

    // ===== Classes =====
    /// Push a new class named K[u16]
    Class = 34,
    /// Replace the receiver with its property K[u16]
    GetProperty = 35,
    /// [instance, value] -> value, after instance.K[u16] = value
    SetProperty = 36,
    /// Define method K[u16] (top) on the class below it, pop the method
    Method = 37,

    // ===== Exceptions =====
    /// Reserved; executes as a no-op
    Throw = 38,

    // ===== Functions =====
    /// Fused GetProperty K[u16] + Call u8
    Invoke = 39,

    // ===== Strings =====
    /// Pop u8 fragments, push their concatenation
    StringInterp = 40,

    // ===== Modules =====
    /// Import module K[u16]
    ImportModule = 41,
    /// Import module K[u16] under the alias K[u16]
    ImportModuleAs = 42,

    // ===== Iteration =====
    /// Advance the [var, seq, cursor] window, or jump forward u16 once exhausted
    Iter = 43,
    /// [from, to] -> from..to
    CreateRange = 44,

    // ===== Async =====
    /// Pop a duration in milliseconds and park the fiber until it elapses
    Await = 45,
}

/// Operand layout following an opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    /// One byte (short constant, argument count, fragment count)
    Byte,
    /// One big-endian u16 (constant, slot, count)
    Short,
    /// One big-endian u16 jump offset
    Jump,
    /// Two u16 constants
    ShortShort,
    /// u16 constant then u8 argument count
    ShortByte,
}

impl Operands {
    /// Size of the operand bytes
    pub fn width(self) -> usize {
        match self {
            Operands::None => 0,
            Operands::Byte => 1,
            Operands::Short | Operands::Jump => 2,
            Operands::ShortByte => 3,
            Operands::ShortShort => 4,
        }
    }
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(OpCode::Return),
            1 => Some(OpCode::Constant),
            2 => Some(OpCode::ConstantLong),
            3 => Some(OpCode::Negate),
            4 => Some(OpCode::Add),
            5 => Some(OpCode::Subtract),
            6 => Some(OpCode::Multiply),
            7 => Some(OpCode::Divide),
            8 => Some(OpCode::Power),
            9 => Some(OpCode::Modulo),
            10 => Some(OpCode::False),
            11 => Some(OpCode::True),
            12 => Some(OpCode::Nil),
            13 => Some(OpCode::Not),
            14 => Some(OpCode::Increment),
            15 => Some(OpCode::Decrement),
            16 => Some(OpCode::Equal),
            17 => Some(OpCode::Greater),
            18 => Some(OpCode::Less),
            19 => Some(OpCode::Pop),
            20 => Some(OpCode::DefineGlobal),
            21 => Some(OpCode::GetGlobal),
            22 => Some(OpCode::ExportGlobal),
            23 => Some(OpCode::SetGlobal),
            24 => Some(OpCode::GetLocal),
            25 => Some(OpCode::SetLocal),
            26 => Some(OpCode::JumpIfFalse),
            27 => Some(OpCode::Jump),
            28 => Some(OpCode::Loop),
            29 => Some(OpCode::Call),
            30 => Some(OpCode::CreateList),
            31 => Some(OpCode::SubscriptRead),
            32 => Some(OpCode::SubscriptWrite),
            33 => Some(OpCode::SliceArray),
            34 => Some(OpCode::Class),
            35 => Some(OpCode::GetProperty),
            36 => Some(OpCode::SetProperty),
            37 => Some(OpCode::Method),
            38 => Some(OpCode::Throw),
            39 => Some(OpCode::Invoke),
            40 => Some(OpCode::StringInterp),
            41 => Some(OpCode::ImportModule),
            42 => Some(OpCode::ImportModuleAs),
            43 => Some(OpCode::Iter),
            44 => Some(OpCode::CreateRange),
            45 => Some(OpCode::Await),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Operand layout of this opcode
    pub fn operands(self) -> Operands {
        match self {
            OpCode::Constant | OpCode::Call | OpCode::StringInterp => Operands::Byte,
            OpCode::ConstantLong
            | OpCode::DefineGlobal
            | OpCode::GetGlobal
            | OpCode::ExportGlobal
            | OpCode::SetGlobal
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::CreateList
            | OpCode::Class
            | OpCode::GetProperty
            | OpCode::SetProperty
            | OpCode::Method
            | OpCode::ImportModule => Operands::Short,
            OpCode::JumpIfFalse | OpCode::Jump | OpCode::Loop | OpCode::Iter => Operands::Jump,
            OpCode::ImportModuleAs => Operands::ShortShort,
            OpCode::Invoke => Operands::ShortByte,
            _ => Operands::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Return => "RETURN",
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantLong => "CONSTANT_LONG",
            OpCode::Negate => "NEGATE",
            OpCode::Add => "ADD",
            OpCode::Subtract => "SUBTRACT",
            OpCode::Multiply => "MULTIPLY",
            OpCode::Divide => "DIVIDE",
            OpCode::Power => "POWER",
            OpCode::Modulo => "MODULO",
            OpCode::False => "FALSE",
            OpCode::True => "TRUE",
            OpCode::Nil => "NIL",
            OpCode::Not => "NOT",
            OpCode::Increment => "INCREMENT",
            OpCode::Decrement => "DECREMENT",
            OpCode::Equal => "EQUAL",
            OpCode::Greater => "GREATER",
            OpCode::Less => "LESS",
            OpCode::Pop => "POP",
            OpCode::DefineGlobal => "DEFINE_GLOBAL",
            OpCode::GetGlobal => "GET_GLOBAL",
            OpCode::ExportGlobal => "EXPORT_GLOBAL",
            OpCode::SetGlobal => "SET_GLOBAL",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::Jump => "JUMP",
            OpCode::Loop => "LOOP",
            OpCode::Call => "CALL",
            OpCode::CreateList => "CREATE_LIST",
            OpCode::SubscriptRead => "SUBSCRIPT_READ",
            OpCode::SubscriptWrite => "SUBSCRIPT_WRITE",
            OpCode::SliceArray => "SLICE_ARRAY",
            OpCode::Class => "CLASS",
            OpCode::GetProperty => "GET_PROPERTY",
            OpCode::SetProperty => "SET_PROPERTY",
            OpCode::Method => "METHOD",
            OpCode::Throw => "THROW",
            OpCode::Invoke => "INVOKE",
            OpCode::StringInterp => "STRING_INTERP",
            OpCode::ImportModule => "IMPORT_MODULE",
            OpCode::ImportModuleAs => "IMPORT_MODULE_AS",
            OpCode::Iter => "ITER",
            OpCode::CreateRange => "CREATE_RANGE",
            OpCode::Await => "AWAIT",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Operand encoding/decoding utilities
pub mod instruction {
    /// Encode a u16 operand (big-endian)
    #[inline]
    pub fn encode_u16(value: u16) -> [u8; 2] {
        value.to_be_bytes()
    }

    /// Decode a big-endian u16 operand at `offset`
    #[inline]
    pub fn decode_u16(code: &[u8], offset: usize) -> Option<u16> {
        let hi = *code.get(offset)?;
        let lo = *code.get(offset + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instruction::*;

    #[test]
    fn test_opcode_conversion() {
        assert_eq!(OpCode::Add.as_u8(), 4);
        assert_eq!(OpCode::from_u8(4), Some(OpCode::Add));
        assert_eq!(OpCode::from_u8(45), Some(OpCode::Await));
        assert_eq!(OpCode::from_u8(46), None);
    }

    #[test]
    fn test_every_byte_roundtrips() {
        for byte in 0..=u8::MAX {
            if let Some(op) = OpCode::from_u8(byte) {
                assert_eq!(op.as_u8(), byte, "{}", op);
            }
        }
    }

    #[test]
    fn test_operand_widths() {
        assert_eq!(OpCode::Constant.operands().width(), 1);
        assert_eq!(OpCode::ConstantLong.operands().width(), 2);
        assert_eq!(OpCode::Loop.operands(), Operands::Jump);
        assert_eq!(OpCode::ImportModuleAs.operands().width(), 4);
        assert_eq!(OpCode::Invoke.operands().width(), 3);
        assert_eq!(OpCode::Add.operands().width(), 0);
    }

    #[test]
    fn test_u16_is_big_endian() {
        assert_eq!(encode_u16(0x1234), [0x12, 0x34]);
        assert_eq!(decode_u16(&[0x00, 0x12, 0x34], 1), Some(0x1234));
        assert_eq!(decode_u16(&[0x12], 0), None);
    }
}
