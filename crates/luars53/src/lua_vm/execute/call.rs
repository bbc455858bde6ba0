/// Call protocol
///
/// `call` finds the callable `nargs + 1` slots below the current frame's
/// top, runs it in a fresh frame and leaves its results where the callable
/// was. Interpreted callees run a nested execution loop; native callees are
/// invoked directly with their own frame.
use std::rc::Rc;

use tracing::debug;

use crate::lua_value::{Chunk, FunctionRef, LuaFunction, LuaValue, NativeFn};
use crate::lua_vm::{LuaCallFrame, LuaError, LuaResult, LuaVM, ResultCount};

impl LuaVM {
    /// Call the value below the top `nargs` values of the current frame.
    ///
    /// A non-callable value raises `NotCallable` and leaves the stack as is.
    pub fn call(&mut self, nargs: usize, nresults: ResultCount) -> LuaResult<()> {
        let frame = self.current_frame();
        let Some(func_idx) = frame.top().checked_sub(nargs + 1) else {
            return Err(LuaError::StackUnderflow);
        };

        let func = match frame.get(func_idx) {
            LuaValue::Function(f) => f,
            other => {
                return Err(LuaError::NotCallable {
                    type_name: other.type_name(),
                });
            }
        };

        match func.as_ref() {
            LuaFunction::Lua(closure) => {
                let chunk = closure.chunk.clone();
                self.call_lua_closure(nargs, nresults, func, chunk)
            }
            LuaFunction::Native(native) => {
                let native = native.clone();
                self.call_native(nargs, nresults, func, native)
            }
        }
    }

    /// Protected call: on error the call stack is unwound to its depth at
    /// entry and the callable and its arguments are removed before the
    /// error is returned.
    pub fn pcall(&mut self, nargs: usize, nresults: ResultCount) -> LuaResult<()> {
        let depth = self.stack.depth();
        let base = self.get_top().saturating_sub(nargs + 1);

        match self.call(nargs, nresults) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.stack.truncate(depth);
                self.current_frame_mut().set_top(base)?;
                debug!(target: "luars53::call", depth, error = %err, "protected call failed");
                Err(err)
            }
        }
    }

    fn check_call_depth(&self) -> LuaResult<()> {
        let limit = self.safe_option.max_call_depth;
        if self.stack.depth() >= limit {
            return Err(LuaError::CallDepthExceeded { limit });
        }
        Ok(())
    }

    fn call_lua_closure(
        &mut self,
        nargs: usize,
        nresults: ResultCount,
        func: FunctionRef,
        chunk: Rc<Chunk>,
    ) -> LuaResult<()> {
        self.check_call_depth()?;

        debug!(
            target: "luars53::call",
            source = chunk.source_name.as_deref().unwrap_or("?"),
            line = chunk.linedefined,
            last_line = chunk.lastlinedefined,
            nargs,
            ?nresults,
            "call Lua closure"
        );

        let mut func_and_args = self.current_frame_mut().pop_n(nargs + 1)?;
        let args = func_and_args.split_off(1);
        let frame = LuaCallFrame::new_lua(
            func,
            chunk,
            args,
            self.stack.depth(),
            self.safe_option.max_stack_size,
        )?;

        self.stack.push(frame);
        let result = self.lua_execute();
        // the callee's frame goes away whether or not it finished cleanly
        let callee = self.stack.pop();
        result?;

        let results = callee?.take_results()?;
        self.push_results(results, nresults)
    }

    fn call_native(
        &mut self,
        nargs: usize,
        nresults: ResultCount,
        func: FunctionRef,
        native: NativeFn,
    ) -> LuaResult<()> {
        self.check_call_depth()?;

        debug!(target: "luars53::call", nargs, ?nresults, "call native closure");

        let args = self.current_frame_mut().pop_n(nargs)?;
        self.current_frame_mut().pop()?;
        let frame = LuaCallFrame::new_native(
            Some(func),
            args,
            self.stack.depth(),
            self.safe_option.max_stack_size,
        )?;

        self.stack.push(frame);
        let result = native(self);
        let callee = self.stack.pop();
        let nreturned = result?;

        let results = callee?.pop_n(nreturned)?;
        self.push_results(results, nresults)
    }

    /// Copy results into the caller's frame, sized by `nresults`
    fn push_results(&mut self, results: Vec<LuaValue>, nresults: ResultCount) -> LuaResult<()> {
        let n = match nresults {
            ResultCount::Fixed(n) => n,
            ResultCount::All => results.len(),
        };
        let frame = self.current_frame_mut();
        frame.check(n)?;
        frame.push_n(&results, n)
    }
}
