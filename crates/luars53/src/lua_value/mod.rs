// Lua 5.3 value representation: values, tables, closures, prototypes
pub mod chunk_serializer;
mod chunk_listing;
mod lua_arith;
mod lua_table;
mod lua_value;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::LuaVM;
use crate::lua_vm::{Instruction, LuaCallFrame, LuaResult};

pub use lua_arith::{ArithOp, arith, concat, less_equal, less_than, objlen};
pub use lua_table::LuaTable;
pub use lua_value::{
    FunctionRef, LuaString, LuaValue, TableRef, float_to_integer, format_float, str_to_number,
};

/// Native function: reads its arguments from the current frame, pushes its
/// results and returns how many it pushed.
pub type CFunction = fn(&mut LuaVM) -> LuaResult<usize>;

/// Native closure body. Unlike [`CFunction`] it may capture Rust state.
pub type NativeFn = Rc<dyn Fn(&mut LuaVM) -> LuaResult<usize>>;

/// A callable value: either a Lua closure or a native function
pub enum LuaFunction {
    Lua(LuaClosure),
    Native(NativeFn),
}

impl LuaFunction {
    pub fn native(f: CFunction) -> Self {
        LuaFunction::Native(Rc::new(f))
    }

    pub fn as_lua(&self) -> Option<&LuaClosure> {
        match self {
            LuaFunction::Lua(c) => Some(c),
            LuaFunction::Native(_) => None,
        }
    }
}

impl fmt::Debug for LuaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaFunction::Lua(c) => write!(
                f,
                "LuaClosure({}:{}, upvalues={})",
                c.chunk.source_name.as_deref().unwrap_or("?"),
                c.chunk.linedefined,
                c.upvalues.len()
            ),
            LuaFunction::Native(_) => f.write_str("NativeClosure"),
        }
    }
}

/// A prototype paired with its captured upvalue cells
pub struct LuaClosure {
    pub chunk: Rc<Chunk>,
    pub upvalues: Vec<Rc<LuaUpvalue>>,
}

impl LuaClosure {
    /// Closure with every upvalue slot holding a fresh closed nil cell
    pub fn new(chunk: Rc<Chunk>) -> Self {
        let upvalues = (0..chunk.upvalue_descs.len())
            .map(|_| LuaUpvalue::new_closed(LuaValue::nil()))
            .collect();
        LuaClosure { chunk, upvalues }
    }
}

/// Runtime upvalue - open (aliases a register of a live frame) or closed
/// (owns its value after that frame exits)
pub struct LuaUpvalue {
    value: RefCell<UpvalueState>,
}

#[derive(Debug)]
enum UpvalueState {
    Open { frame: usize, register: usize },
    Closed(LuaValue),
}

impl LuaUpvalue {
    /// Open upvalue aliasing `register` of the frame at call-stack `frame`
    pub fn new_open(frame: usize, register: usize) -> Rc<Self> {
        Rc::new(LuaUpvalue {
            value: RefCell::new(UpvalueState::Open { frame, register }),
        })
    }

    pub fn new_closed(value: LuaValue) -> Rc<Self> {
        Rc::new(LuaUpvalue {
            value: RefCell::new(UpvalueState::Closed(value)),
        })
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.value.borrow(), UpvalueState::Open { .. })
    }

    /// Register this upvalue aliases, while open
    pub fn open_register(&self) -> Option<usize> {
        match *self.value.borrow() {
            UpvalueState::Open { register, .. } => Some(register),
            UpvalueState::Closed(_) => None,
        }
    }

    /// Move the register's current value into the cell
    pub fn close(&self, value: LuaValue) {
        let mut state = self.value.borrow_mut();
        if matches!(*state, UpvalueState::Open { .. }) {
            *state = UpvalueState::Closed(value);
        }
    }

    pub fn get_value(&self, frames: &[LuaCallFrame]) -> LuaValue {
        match *self.value.borrow() {
            UpvalueState::Open { frame, register } => frames
                .get(frame)
                .and_then(|f| f.slots.get(register))
                .cloned()
                .unwrap_or_default(),
            UpvalueState::Closed(ref val) => val.clone(),
        }
    }

    pub fn set_value(&self, frames: &mut [LuaCallFrame], value: LuaValue) {
        let mut state = self.value.borrow_mut();
        match *state {
            UpvalueState::Open { frame, register } => {
                if let Some(slot) = frames.get_mut(frame).and_then(|f| f.slots.get_mut(register)) {
                    *slot = value;
                }
            }
            UpvalueState::Closed(ref mut val) => *val = value,
        }
    }
}

impl fmt::Debug for LuaUpvalue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.value.borrow() {
            UpvalueState::Open { frame, register } => {
                write!(f, "Upvalue::Open(frame={}, reg={})", frame, register)
            }
            UpvalueState::Closed(ref val) => write!(f, "Upvalue::Closed({:?})", val),
        }
    }
}

/// Upvalue descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    pub is_local: bool, // true if captures enclosing register, false if enclosing upvalue
    pub index: u32,
}

/// Local variable debug record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocVar {
    pub name: SmolStr,
    pub start_pc: u32,
    pub end_pc: u32,
}

/// Function prototype (bytecode + metadata)
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<Instruction>,
    pub constants: Vec<LuaValue>,
    pub param_count: usize,
    pub is_vararg: bool,
    pub max_stack_size: usize,
    pub child_protos: Vec<Rc<Chunk>>,
    pub upvalue_descs: Vec<UpvalueDesc>,
    pub source_name: Option<String>,
    pub line_info: Vec<u32>,
    pub linedefined: usize,     // 0 for the main chunk
    pub lastlinedefined: usize,
    pub locals: Vec<LocVar>,
    pub upvalue_names: Vec<SmolStr>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upvalue_count(&self) -> usize {
        self.upvalue_descs.len()
    }
}
