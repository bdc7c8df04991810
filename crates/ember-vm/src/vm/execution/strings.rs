//! String interpolation

use crate::error::VmError;
use crate::opcode::OpCode;
use crate::value::Value;
use crate::vm::ops::display_value;
use crate::vm::result::ExecutionResult;
use crate::vm::VM;

impl VM {
    /// Execute string instructions
    pub(crate) fn execute_strings(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::StringInterp => {
                let count = self.read_byte()? as usize;
                let fragments = self.fiber()?.stack.top_slice(count)?;

                let mut text = String::new();
                for fragment in fragments {
                    text.push_str(&display_value(&self.heap, fragment));
                }

                let stack = &mut self.fiber_mut()?.stack;
                stack.truncate(stack.len() - count);
                let joined = self.heap.intern(&text);
                self.push(Value::object(joined))?;
            }

            _ => unreachable!("Non-string opcode in string handler"),
        }
        Ok(ExecutionResult::Continue)
    }
}
