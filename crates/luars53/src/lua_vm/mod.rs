// Lua Virtual Machine
// Executes Lua 5.3 bytecode with a register-based architecture
mod call_stack;
pub(crate) mod dispatcher;
mod execute;
mod lua_call_frame;
mod lua_error;
pub mod lua_limits;
mod opcode;
mod safe_option;

use std::cell::RefCell;
use std::rc::Rc;

use crate::lua_value::chunk_serializer::{BinaryChunkLoader, ChunkLoader};
use crate::lua_value::{
    CFunction, Chunk, LuaClosure, LuaFunction, LuaTable, LuaUpvalue, LuaValue, TableRef,
};
pub use call_stack::CallStack;
pub use lua_call_frame::LuaCallFrame;
pub use lua_error::{LuaError, LuaResult};
use lua_limits::{LUA_MINSTACK, LUA_RIDX_GLOBALS};
pub use opcode::{Instruction, OPCODES, OpArgMode, OpCode, OpCodeInfo, OpHandler, OpMode};
pub use safe_option::SafeOption;

/// How many results a call should leave on the caller's stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCount {
    /// Exactly this many, nil-padded or truncated
    Fixed(usize),
    /// Every returned value
    All,
}

impl ResultCount {
    /// Decode a CALL-style C operand (or VARARG's B): 0 means all results,
    /// otherwise the count is the operand minus one
    pub const fn from_operand(x: u32) -> Self {
        if x == 0 {
            ResultCount::All
        } else {
            ResultCount::Fixed(x as usize - 1)
        }
    }
}

pub struct LuaVM {
    pub(crate) stack: CallStack,

    // Global environment table (the main chunk's _ENV)
    pub(crate) global: TableRef,

    // Registry table (like Lua's LUA_REGISTRYINDEX); globals live at LUA_RIDX_GLOBALS
    pub(crate) registry: TableRef,

    pub(crate) safe_option: SafeOption,

    loader: Box<dyn ChunkLoader>,
}

impl LuaVM {
    pub fn new(option: SafeOption) -> Self {
        let bottom = LuaCallFrame::new(LUA_MINSTACK, 0, option.max_stack_size);

        let global = Rc::new(RefCell::new(LuaTable::new()));
        let mut registry = LuaTable::with_capacity(2, 0);
        registry.set_int(LUA_RIDX_GLOBALS, LuaValue::Table(global.clone()));

        LuaVM {
            stack: CallStack::new(bottom),
            global,
            registry: Rc::new(RefCell::new(registry)),
            safe_option: option,
            loader: Box::new(BinaryChunkLoader),
        }
    }

    /// Replace the chunk loader used by [`LuaVM::load`]
    pub fn with_loader(mut self, loader: impl ChunkLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Load a chunk and push its main closure on the current frame
    pub fn load(&mut self, bytes: &[u8], chunk_name: &str) -> LuaResult<()> {
        let chunk = self.loader.load(bytes, chunk_name)?;
        self.load_chunk(Rc::new(chunk))
    }

    /// Push a closure for an in-memory prototype. Its first upvalue, when
    /// present, is bound to the global table.
    pub fn load_chunk(&mut self, chunk: Rc<Chunk>) -> LuaResult<()> {
        let mut closure = LuaClosure::new(chunk);
        if let Some(env) = closure.upvalues.first_mut() {
            let globals = self
                .registry
                .borrow()
                .get_int(LUA_RIDX_GLOBALS)
                .unwrap_or_else(|| LuaValue::Table(self.global.clone()));
            *env = LuaUpvalue::new_closed(globals);
        }
        self.push_value(LuaValue::function(LuaFunction::Lua(closure)))
    }

    // ============ Frames ============

    #[inline(always)]
    pub fn current_frame(&self) -> &LuaCallFrame {
        self.stack.current()
    }

    #[inline(always)]
    pub fn current_frame_mut(&mut self) -> &mut LuaCallFrame {
        self.stack.current_mut()
    }

    /// Number of live frames, the host's bottom frame included
    pub fn call_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn error(&self, message: impl Into<String>) -> LuaError {
        LuaError::runtime(message)
    }

    // ============ Stack access (current frame) ============

    pub fn get_top(&self) -> usize {
        self.current_frame().top()
    }

    pub fn set_top(&mut self, top: usize) -> LuaResult<()> {
        self.current_frame_mut().set_top(top)
    }

    pub fn check_stack(&mut self, n: usize) -> LuaResult<()> {
        self.current_frame_mut().check(n)
    }

    /// Push a value, growing the frame when needed
    pub fn push_value(&mut self, value: LuaValue) -> LuaResult<()> {
        let frame = self.current_frame_mut();
        frame.check(1)?;
        frame.push(value)
    }

    pub fn pop_value(&mut self) -> LuaResult<LuaValue> {
        self.current_frame_mut().pop()
    }

    /// Value at stack index `idx` (1 = bottom of the current frame)
    pub fn get_value(&self, idx: usize) -> LuaValue {
        match idx.checked_sub(1) {
            Some(slot) => self.current_frame().get(slot),
            None => LuaValue::nil(),
        }
    }

    /// Number of arguments passed to the running function
    pub fn arg_count(&self) -> usize {
        self.current_frame().nargs
    }

    /// Argument `index` (1-based) of the running native function
    pub fn get_arg(&self, index: usize) -> Option<LuaValue> {
        if index == 0 || index > self.arg_count() {
            return None;
        }
        Some(self.current_frame().get(index - 1))
    }

    pub fn get_args(&self) -> Vec<LuaValue> {
        (0..self.arg_count())
            .map(|i| self.current_frame().get(i))
            .collect()
    }

    // ============ Globals and host functions ============

    pub fn globals(&self) -> TableRef {
        self.global.clone()
    }

    pub fn registry(&self) -> TableRef {
        self.registry.clone()
    }

    pub fn set_global(&mut self, name: &str, value: LuaValue) -> LuaResult<()> {
        self.global.borrow_mut().raw_set(LuaValue::string(name), value)
    }

    pub fn get_global(&self, name: &str) -> Option<LuaValue> {
        self.global.borrow().get_str(name)
    }

    /// Expose a native function as a global
    pub fn register(&mut self, name: &str, func: CFunction) -> LuaResult<()> {
        self.set_global(name, LuaValue::function(LuaFunction::native(func)))
    }

    /// Wrap a Rust closure (which may capture state) as a callable value
    pub fn create_closure<F>(&mut self, func: F) -> LuaValue
    where
        F: Fn(&mut LuaVM) -> LuaResult<usize> + 'static,
    {
        LuaValue::function(LuaFunction::Native(Rc::new(func)))
    }
}

impl Default for LuaVM {
    fn default() -> Self {
        Self::new(SafeOption::default())
    }
}
