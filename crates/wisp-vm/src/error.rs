//! Runtime fault taxonomy.
//!
//! Every variant here corresponds to one of the dynamic checks the
//! interpreter performs: type mismatches, arity mismatches, undefined
//! names, and stack/frame exhaustion. Raising one aborts the *current
//! program* (resetting the VM's stacks) but never the host process.

/// A runtime fault, raised from within the dispatch loop or call machinery.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("operand must be a number")]
    NotANumber,
    #[error("operands must be two numbers or two strings")]
    BadAddOperands,
    #[error("only instances have properties")]
    NotAnInstance,
    #[error("undefined property '{0}'")]
    UndefinedProperty(String),
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("can only call functions and classes")]
    NotCallable,
    #[error("expected {expected} arguments but got {got}")]
    ArityMismatch { expected: u8, got: u8 },
    #[error("superclass must be a class")]
    SuperclassNotClass,
    #[error("stack overflow")]
    StackOverflow,
    #[error("out of memory")]
    OutOfMemory,
}

/// The three outcomes `interpret` can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}
