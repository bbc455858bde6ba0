use std::collections::BTreeMap;
use std::rc::Rc;

use crate::lua_value::{Chunk, FunctionRef, LuaFunction, LuaUpvalue, LuaValue};
use crate::lua_vm::lua_limits::LUA_MINSTACK;
use crate::lua_vm::{Instruction, LuaError, LuaResult};

/// LuaCallFrame - one activation record
///
/// Each frame owns its own value stack. Slots `[0, register_count)` are the
/// registers of an interpreted closure; slots above them form the operand
/// area used to marshal arguments and results of nested calls.
///
/// Layout of an interpreted frame:
/// - `slots[0..register_count]`: registers (params first)
/// - `slots[register_count..top]`: operand area (open results, outgoing calls)
/// - `varargs`: surplus arguments of a vararg prototype
///
/// Native frames have `register_count == 0`; their arguments sit at the
/// bottom of the operand area and their results are the topmost values.
pub struct LuaCallFrame {
    pub(crate) slots: Vec<LuaValue>,
    pub(crate) top: usize,
    pub(crate) pc: usize,
    pub(crate) closure: Option<FunctionRef>,
    chunk: Option<Rc<Chunk>>,
    pub(crate) varargs: Vec<LuaValue>,
    /// Open upvalues created from this frame's registers, keyed by register
    pub(crate) open_upvalues: BTreeMap<usize, Rc<LuaUpvalue>>,
    pub(crate) register_count: usize,
    /// Register where pending open results (CALL C=0, VARARG B=0) begin
    pub(crate) multret_base: Option<usize>,
    pub(crate) nargs: usize,
    /// Index of this frame in the call stack; the enclosing frame is `depth - 1`
    pub(crate) depth: usize,
    max_size: usize,
}

impl LuaCallFrame {
    pub(crate) fn new(capacity: usize, depth: usize, max_size: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(capacity, LuaValue::default);
        LuaCallFrame {
            slots,
            top: 0,
            pc: 0,
            closure: None,
            chunk: None,
            varargs: Vec::new(),
            open_upvalues: BTreeMap::new(),
            register_count: 0,
            multret_base: None,
            nargs: 0,
            depth,
            max_size,
        }
    }

    /// Frame for an interpreted closure with its arguments bound.
    ///
    /// The first `min(nargs, nparams)` arguments fill the parameter
    /// registers, missing ones are nil; surplus arguments are kept as
    /// varargs only when the prototype is variadic.
    pub(crate) fn new_lua(
        func: FunctionRef,
        chunk: Rc<Chunk>,
        args: Vec<LuaValue>,
        depth: usize,
        max_size: usize,
    ) -> LuaResult<Self> {
        let nregs = chunk.max_stack_size;
        let nparams = chunk.param_count;
        if nregs > max_size || nparams > nregs + LUA_MINSTACK {
            return Err(LuaError::StackOverflow);
        }

        let nargs = args.len();
        let mut frame = LuaCallFrame::new(nregs + LUA_MINSTACK, depth, max_size);
        frame.push_n(&args, nparams)?;
        frame.set_top(nregs)?;
        if chunk.is_vararg && nargs > nparams {
            frame.varargs = args[nparams..].to_vec();
        }
        frame.register_count = nregs;
        frame.nargs = nargs;
        frame.closure = Some(func);
        frame.chunk = Some(chunk);
        Ok(frame)
    }

    /// Frame for a native closure holding only its arguments
    pub(crate) fn new_native(
        func: Option<FunctionRef>,
        args: Vec<LuaValue>,
        depth: usize,
        max_size: usize,
    ) -> LuaResult<Self> {
        let nargs = args.len();
        let mut frame = LuaCallFrame::new(nargs + LUA_MINSTACK, depth, max_size);
        frame.push_n(&args, nargs)?;
        frame.nargs = nargs;
        frame.closure = func;
        Ok(frame)
    }

    #[inline(always)]
    pub fn is_lua(&self) -> bool {
        self.chunk.is_some()
    }

    pub fn chunk(&self) -> LuaResult<&Rc<Chunk>> {
        self.chunk
            .as_ref()
            .ok_or_else(|| LuaError::runtime("not a Lua function"))
    }

    // ============ Stack primitives ============

    #[inline(always)]
    pub fn top(&self) -> usize {
        self.top
    }

    /// Value at `idx`, nil above the top
    #[inline(always)]
    pub fn get(&self, idx: usize) -> LuaValue {
        if idx < self.top {
            self.slots[idx].clone()
        } else {
            LuaValue::nil()
        }
    }

    #[inline(always)]
    pub fn set(&mut self, idx: usize, value: LuaValue) -> LuaResult<()> {
        if idx >= self.top {
            return Err(LuaError::StackOverflow);
        }
        self.slots[idx] = value;
        Ok(())
    }

    pub fn push(&mut self, value: LuaValue) -> LuaResult<()> {
        if self.top == self.slots.len() {
            return Err(LuaError::StackOverflow);
        }
        self.slots[self.top] = value;
        self.top += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> LuaResult<LuaValue> {
        if self.top == 0 {
            return Err(LuaError::StackUnderflow);
        }
        self.top -= 1;
        Ok(std::mem::take(&mut self.slots[self.top]))
    }

    /// Push exactly `n` values: the first `n` of `values`, nil-padded
    pub fn push_n(&mut self, values: &[LuaValue], n: usize) -> LuaResult<()> {
        for i in 0..n {
            self.push(values.get(i).cloned().unwrap_or_default())?;
        }
        Ok(())
    }

    /// Pop the topmost `n` values, returned bottom-first
    pub fn pop_n(&mut self, n: usize) -> LuaResult<Vec<LuaValue>> {
        if n > self.top {
            return Err(LuaError::StackUnderflow);
        }
        let start = self.top - n;
        let values = self.slots[start..self.top]
            .iter_mut()
            .map(std::mem::take)
            .collect();
        self.top = start;
        Ok(values)
    }

    /// Make room for `n` more pushes, growing up to the frame's size limit
    pub fn check(&mut self, n: usize) -> LuaResult<()> {
        let needed = self.top + n;
        if needed <= self.slots.len() {
            return Ok(());
        }
        if needed > self.max_size {
            return Err(LuaError::StackOverflow);
        }
        self.slots.resize_with(needed, LuaValue::default);
        Ok(())
    }

    /// Move the top; slots uncovered by growing read as nil
    pub fn set_top(&mut self, top: usize) -> LuaResult<()> {
        if top > self.slots.len() {
            return Err(LuaError::StackOverflow);
        }
        if top < self.top {
            for slot in &mut self.slots[top..self.top] {
                *slot = LuaValue::nil();
            }
        }
        self.top = top;
        Ok(())
    }

    // ============ Interpreted-frame helpers ============

    /// Fetch the instruction at pc and advance pc
    #[inline(always)]
    pub(crate) fn fetch(&mut self) -> LuaResult<Instruction> {
        let chunk = self.chunk()?;
        let Some(instr) = chunk.code.get(self.pc).copied() else {
            return Err(LuaError::runtime(format!(
                "pc {} past end of function ({} instructions)",
                self.pc,
                chunk.code.len()
            )));
        };
        self.pc += 1;
        Ok(instr)
    }

    #[inline(always)]
    pub(crate) fn add_pc(&mut self, delta: i32) {
        self.pc = self.pc.wrapping_add_signed(delta as isize);
    }

    pub(crate) fn constant(&self, idx: usize) -> LuaResult<LuaValue> {
        self.chunk()?
            .constants
            .get(idx)
            .cloned()
            .ok_or_else(|| LuaError::runtime(format!("constant index {} out of range", idx)))
    }

    /// RK(x): constant when the RK bit is set, register otherwise
    #[inline(always)]
    pub(crate) fn rk(&self, arg: u32) -> LuaResult<LuaValue> {
        if Instruction::is_k(arg) {
            self.constant(Instruction::rk_index(arg) as usize)
        } else {
            Ok(self.get(arg as usize))
        }
    }

    /// Upvalue cell `idx` of the running closure
    pub(crate) fn upvalue(&self, idx: usize) -> LuaResult<Rc<LuaUpvalue>> {
        let closure = match self.closure.as_deref() {
            Some(LuaFunction::Lua(c)) => c,
            _ => return Err(LuaError::runtime("not a Lua function")),
        };
        closure
            .upvalues
            .get(idx)
            .cloned()
            .ok_or_else(|| LuaError::runtime(format!("upvalue index {} out of range", idx)))
    }

    /// The open upvalue for `register`, created on first capture so every
    /// closure capturing the register shares one cell
    pub(crate) fn capture_register(&mut self, register: usize) -> Rc<LuaUpvalue> {
        let depth = self.depth;
        self.open_upvalues
            .entry(register)
            .or_insert_with(|| LuaUpvalue::new_open(depth, register))
            .clone()
    }

    /// Close every open upvalue at or above register `from`
    pub(crate) fn close_upvalues(&mut self, from: usize) {
        let closing = self.open_upvalues.split_off(&from);
        for (register, upvalue) in closing {
            upvalue.close(self.get(register));
        }
    }

    /// Consume pending open results: registers `[from, marker)` followed by
    /// every value in the operand area. Leaves the top at the register count.
    pub(crate) fn take_open_values(&mut self, from: usize) -> LuaResult<Vec<LuaValue>> {
        let Some(marker) = self.multret_base.take() else {
            return Err(LuaError::runtime("no open results pending"));
        };
        let mut values: Vec<LuaValue> = (from..marker).map(|r| self.get(r)).collect();
        let pending = self.pop_n(self.top.saturating_sub(self.register_count))?;
        values.extend(pending);
        Ok(values)
    }

    /// Values above the register window: the results of a returning frame
    pub(crate) fn take_results(&mut self) -> LuaResult<Vec<LuaValue>> {
        self.pop_n(self.top.saturating_sub(self.register_count))
    }
}

impl std::fmt::Debug for LuaCallFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaCallFrame")
            .field("depth", &self.depth)
            .field("pc", &self.pc)
            .field("top", &self.top)
            .field("register_count", &self.register_count)
            .field("varargs", &self.varargs.len())
            .field("open_upvalues", &self.open_upvalues.len())
            .finish()
    }
}
