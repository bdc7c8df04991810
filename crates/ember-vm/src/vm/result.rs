//! Execution result types

/// Result of instruction execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionResult {
    /// Continue to next instruction
    Continue,
    /// The running fiber handed control away (await, import)
    Suspended,
    /// The running fiber returned from its outermost frame
    Finished,
}
