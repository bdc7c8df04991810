//! Await

use crate::error::VmError;
use crate::opcode::OpCode;
use crate::vm::result::ExecutionResult;
use crate::vm::VM;
use std::time::Duration;

impl VM {
    /// Execute fiber instructions
    pub(crate) fn execute_fibers(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::Await => {
                let delay = self.pop()?;
                let duration = delay
                    .as_number()
                    .filter(|ms| *ms >= 0.0)
                    .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
                    .ok_or_else(|| {
                        VmError::type_error(
                            "await",
                            "non-negative milliseconds",
                            &self.display(delay),
                        )
                    })?;
                self.park_running(duration)?;
                Ok(ExecutionResult::Suspended)
            }

            _ => unreachable!("Non-fiber opcode in fiber handler"),
        }
    }
}
