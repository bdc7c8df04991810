//! Control flow instruction execution

use crate::error::VmError;
use crate::opcode::OpCode;
use crate::vm::result::ExecutionResult;
use crate::vm::VM;
use tracing::warn;

impl VM {
    /// Execute control flow instructions
    pub(crate) fn execute_control(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::Jump => {
                let offset = self.read_u16()? as usize;
                self.jump(true, offset)?;
            }

            OpCode::JumpIfFalse => {
                let offset = self.read_u16()? as usize;
                if self.peek(0)?.is_falsey() {
                    self.jump(true, offset)?;
                }
            }

            OpCode::Loop => {
                let offset = self.read_u16()? as usize;
                self.jump(false, offset)?;
            }

            OpCode::Return => return self.return_from_frame(),

            OpCode::Throw => {
                let line = self.frame()?.current_line();
                warn!(?line, "THROW has no semantics yet; ignoring");
            }

            _ => unreachable!("Non-control opcode in control handler"),
        }
        Ok(ExecutionResult::Continue)
    }

    /// Pop the current frame, leaving its result where the callee was
    fn return_from_frame(&mut self) -> Result<ExecutionResult, VmError> {
        let fiber = self.fiber_mut()?;
        let mut result = fiber.stack.pop()?;
        let frame = fiber.frames.pop().ok_or(VmError::StackUnderflow)?;

        if frame.initializer {
            result = fiber.stack.get(frame.base).ok_or(VmError::StackUnderflow)?;
        }
        fiber.stack.truncate(frame.base);

        if fiber.frames.is_empty() {
            self.finish_running()?;
            return Ok(ExecutionResult::Finished);
        }
        fiber.stack.push(result)?;
        Ok(ExecutionResult::Continue)
    }
}
