use std::fmt;

pub type PostScriptResult<T> = anyhow::Result<T>;

/// Evaluation-time faults raised by a calculator program.
///
/// These surface from `transform`, never from construction: whether a
/// program under- or overflows its stack can depend on the input, so a
/// fault invalidates the single call rather than the function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScriptError {
    /// Operand stack overflow
    StackOverflow,

    /// Operand stack underflow
    StackUnderflow,

    /// Operand of wrong type
    TypeCheck,

    /// Operand out of bounds
    RangeCheck,

    /// Overflow, underflow, or meaningless result
    UndefinedResult,
}

impl fmt::Display for PostScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl std::error::Error for PostScriptError {}
