//! Call frame implementation

use crate::bytecode::Chunk;
use crate::value::ObjRef;
use std::rc::Rc;

/// Call frame (function activation record)
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Function being executed
    pub function: ObjRef,

    /// The function's bytecode, shared so dispatch never borrows the heap
    pub chunk: Rc<Chunk>,

    /// Instruction pointer (next byte to read)
    pub ip: usize,

    /// Stack index of slot 0 (the callee or receiver); arguments follow
    pub base: usize,

    /// Module scope globals resolve against; `None` = process globals
    pub scope: Option<ObjRef>,

    /// Running a class `construct`; the call evaluates to the receiver
    pub initializer: bool,
}

impl CallFrame {
    pub fn new(function: ObjRef, chunk: Rc<Chunk>, base: usize, scope: Option<ObjRef>) -> Self {
        Self {
            function,
            chunk,
            ip: 0,
            base,
            scope,
            initializer: false,
        }
    }

    /// Fetch the next byte and advance IP
    #[inline]
    pub fn fetch(&mut self) -> Option<u8> {
        let byte = self.chunk.code.get(self.ip).copied();
        if byte.is_some() {
            self.ip += 1;
        }
        byte
    }

    /// Source line of the instruction that was last fetched
    pub fn current_line(&self) -> Option<u32> {
        self.chunk.line_at(self.ip.saturating_sub(1))
    }
}
