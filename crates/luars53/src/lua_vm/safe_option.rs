use crate::lua_vm::lua_limits::{LUAI_MAXSTACK, MAX_CALL_DEPTH};

/// Resource limits a host hands to [`LuaVM::new`](crate::LuaVM::new)
#[derive(Debug, Clone)]
pub struct SafeOption {
    /// Largest slot count any single frame may grow to
    pub max_stack_size: usize,
    /// Largest call-stack depth, the bottom frame included
    pub max_call_depth: usize,
}

impl Default for SafeOption {
    fn default() -> Self {
        Self {
            max_stack_size: LUAI_MAXSTACK,
            max_call_depth: MAX_CALL_DEPTH,
        }
    }
}

impl SafeOption {
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_stack_size(mut self, size: usize) -> Self {
        self.max_stack_size = size;
        self
    }
}
