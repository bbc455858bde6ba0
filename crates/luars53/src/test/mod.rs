pub mod test_chunk_loader;
pub mod test_closures;

use std::rc::Rc;

use crate::lua_value::{Chunk, LuaValue, UpvalueDesc};
use crate::lua_vm::{Instruction, LuaResult, LuaVM, OpCode, ResultCount};

// Tiny assembler: tests build prototypes directly, no compiler needed.

pub(crate) fn abc(op: OpCode, a: u32, b: u32, c: u32) -> Instruction {
    Instruction::create_abc(op, a, b, c)
}

pub(crate) fn abx(op: OpCode, a: u32, bx: u32) -> Instruction {
    Instruction::create_abx(op, a, bx)
}

pub(crate) fn asbx(op: OpCode, a: u32, sbx: i32) -> Instruction {
    Instruction::create_asbx(op, a, sbx)
}

/// RK operand naming constant `idx`
pub(crate) fn k(idx: u32) -> u32 {
    Instruction::rk_ask(idx)
}

pub(crate) struct Proto {
    chunk: Chunk,
}

impl Proto {
    pub(crate) fn new(nregs: usize) -> Self {
        let mut chunk = Chunk::new();
        chunk.max_stack_size = nregs;
        chunk.source_name = Some("=test".to_string());
        Proto { chunk }
    }

    /// Main chunk: upvalue 0 is _ENV, captured from the loader
    pub(crate) fn main(nregs: usize) -> Self {
        Self::new(nregs).upvalue(true, 0)
    }

    pub(crate) fn params(mut self, n: usize) -> Self {
        self.chunk.param_count = n;
        self
    }

    pub(crate) fn vararg(mut self) -> Self {
        self.chunk.is_vararg = true;
        self
    }

    pub(crate) fn constants(mut self, constants: Vec<LuaValue>) -> Self {
        self.chunk.constants = constants;
        self
    }

    pub(crate) fn code(mut self, code: Vec<Instruction>) -> Self {
        self.chunk.code = code;
        self
    }

    pub(crate) fn upvalue(mut self, is_local: bool, index: u32) -> Self {
        self.chunk.upvalue_descs.push(UpvalueDesc { is_local, index });
        self
    }

    pub(crate) fn child(mut self, child: Rc<Chunk>) -> Self {
        self.chunk.child_protos.push(child);
        self
    }

    pub(crate) fn build(self) -> Rc<Chunk> {
        Rc::new(self.chunk)
    }
}

/// Load `chunk`, call it with no arguments and collect every result
pub(crate) fn run(vm: &mut LuaVM, chunk: Rc<Chunk>) -> LuaResult<Vec<LuaValue>> {
    let base = vm.get_top();
    vm.load_chunk(chunk)?;
    vm.call(0, ResultCount::All)?;
    take_stack(vm, base)
}

/// Pop every value above `base`, bottom-first
pub(crate) fn take_stack(vm: &mut LuaVM, base: usize) -> LuaResult<Vec<LuaValue>> {
    let values = (base + 1..=vm.get_top()).map(|i| vm.get_value(i)).collect();
    vm.set_top(base)?;
    Ok(values)
}

/// Call global `name` from the host with `args`, collecting every result
pub(crate) fn call_global(vm: &mut LuaVM, name: &str, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let base = vm.get_top();
    let func = vm.get_global(name).unwrap_or_default();
    vm.push_value(func)?;
    for arg in args {
        vm.push_value(arg.clone())?;
    }
    vm.call(args.len(), ResultCount::All)?;
    take_stack(vm, base)
}

pub(crate) fn int(i: i64) -> LuaValue {
    LuaValue::integer(i)
}

pub(crate) fn lstr(s: &str) -> LuaValue {
    LuaValue::string(s)
}
