use thiserror::Error;

pub type LuaResult<T> = Result<T, LuaError>;

/// Errors raised by the VM core and the value library
///
/// None of these are caught inside the execution loop; they unwind out of
/// [`LuaVM::call`](crate::LuaVM::call), popping every frame on the way.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LuaError {
    /// `call` targeted a value that is neither a Lua nor a native closure
    #[error("attempt to call a {type_name} value")]
    NotCallable { type_name: &'static str },

    /// A frame was asked to grow past its capacity
    #[error("stack overflow")]
    StackOverflow,

    /// A frame was asked to pop more values than it holds
    #[error("stack underflow")]
    StackUnderflow,

    /// Too many nested calls
    #[error("stack overflow (call depth exceeds {limit})")]
    CallDepthExceeded { limit: usize },

    /// Errors from value operations: arithmetic, comparison, indexing
    #[error("{0}")]
    RuntimeError(String),

    /// An instruction whose opcode field is not one of the 47 opcodes
    #[error("invalid opcode {0}")]
    InvalidOpcode(u8),

    /// Malformed binary chunk
    #[error("bad binary chunk: {0}")]
    BadChunk(String),
}

impl LuaError {
    pub fn runtime(msg: impl Into<String>) -> Self {
        LuaError::RuntimeError(msg.into())
    }

    /// True for the errors that report an exhausted stack
    pub fn is_stack_overflow(&self) -> bool {
        matches!(
            self,
            LuaError::StackOverflow | LuaError::CallDepthExceeded { .. }
        )
    }
}
