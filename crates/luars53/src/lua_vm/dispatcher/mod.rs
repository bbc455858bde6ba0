/// Instruction handlers
///
/// One `exec_*` function per opcode, referenced from the opcode table.
/// Handlers only touch the current frame's registers, varargs and
/// upvalues plus the running prototype's constants, and delegate value
/// semantics to `lua_value`.
mod arithmetic_instructions;
mod control_instructions;
mod load_instructions;
mod loop_instructions;
mod table_instructions;
mod upvalue_instructions;

pub use arithmetic_instructions::*;
pub use control_instructions::*;
pub use load_instructions::*;
pub use loop_instructions::*;
pub use table_instructions::*;
pub use upvalue_instructions::*;

use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaCallFrame, LuaResult};

/// Registers `R(a)..R(a+n-1)`, or with `None` the pending open results
/// starting at `R(a)`
pub(crate) fn collect_values(
    frame: &mut LuaCallFrame,
    a: usize,
    count: Option<usize>,
) -> LuaResult<Vec<LuaValue>> {
    match count {
        Some(n) => Ok((a..a + n).map(|r| frame.get(r)).collect()),
        None => frame.take_open_values(a),
    }
}

/// Push `values` onto the operand area
pub(crate) fn push_values(frame: &mut LuaCallFrame, values: &[LuaValue]) -> LuaResult<()> {
    frame.check(values.len())?;
    frame.push_n(values, values.len())
}

/// Move call results from the operand area into `R(a)..`: C-1 of them, or
/// with C=0 leave every result pending and mark `R(a)` as their start
pub(crate) fn store_results(frame: &mut LuaCallFrame, a: usize, c: usize) -> LuaResult<()> {
    match c {
        0 => {
            frame.multret_base = Some(a);
            Ok(())
        }
        1 => Ok(()),
        _ => {
            let results = frame.pop_n(c - 1)?;
            for (i, value) in results.into_iter().enumerate() {
                frame.set(a + i, value)?;
            }
            Ok(())
        }
    }
}
