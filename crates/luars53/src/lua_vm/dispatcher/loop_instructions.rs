/// Loop instructions
///
/// Numeric for: R(A) index, R(A+1) limit, R(A+2) step, R(A+3) loop variable.
/// Generic for: R(A) iterator, R(A+1) state, R(A+2) control, R(A+3).. vars.
use super::{push_values, store_results};
use crate::lua_value::{LuaValue, float_to_integer};
use crate::lua_vm::{Instruction, LuaError, LuaResult, LuaVM, ResultCount};

/// FORPREP A sBx
/// R(A) -= R(A+2); pc += sBx
///
/// Integer loop when the initial value and the step are integers and the
/// limit converts to an integer (float limits clamp toward the loop
/// direction); float loop otherwise.
pub fn exec_forprep(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, sbx) = instr.asbx();
    let a = a as usize;
    let frame = vm.current_frame_mut();

    let init = frame.get(a);
    let limit = frame.get(a + 1);
    let step = frame.get(a + 2);

    let int_loop = match (&init, &step) {
        (LuaValue::Integer(i), LuaValue::Integer(s)) => {
            for_limit(&limit, *s).map(|(l, skip)| (*i, l, *s, skip))
        }
        _ => None,
    };

    if let Some((init, limit, step, skip)) = int_loop {
        // a limit beyond the integer range in the wrong direction skips the loop
        let init = if skip { 0 } else { init };
        frame.set(a + 1, LuaValue::integer(limit))?;
        frame.set(a, LuaValue::integer(init.wrapping_sub(step)))?;
    } else {
        let Some(limit) = limit.to_number() else {
            return Err(LuaError::runtime("'for' limit must be a number"));
        };
        let Some(step) = step.to_number() else {
            return Err(LuaError::runtime("'for' step must be a number"));
        };
        let Some(init) = init.to_number() else {
            return Err(LuaError::runtime("'for' initial value must be a number"));
        };
        frame.set(a + 1, LuaValue::float(limit))?;
        frame.set(a + 2, LuaValue::float(step))?;
        frame.set(a, LuaValue::float(init - step))?;
    }

    frame.add_pc(sbx);
    Ok(())
}

/// Integer limit for an integer loop, and whether the loop must not run.
/// None when the limit is not a number.
fn for_limit(limit: &LuaValue, step: i64) -> Option<(i64, bool)> {
    let n = limit.to_numeric()?;
    let f = match n {
        LuaValue::Integer(i) => return Some((i, false)),
        LuaValue::Float(f) => f,
        _ => return None,
    };
    let rounded = if step < 0 { f.ceil() } else { f.floor() };
    if let Some(i) = float_to_integer(rounded) {
        return Some((i, false));
    }
    if f > 0.0 {
        Some((i64::MAX, step < 0))
    } else {
        Some((i64::MIN, step >= 0))
    }
}

/// FORLOOP A sBx
/// R(A) += R(A+2); if R(A) <?= R(A+1) then { pc += sBx; R(A+3) = R(A) }
pub fn exec_forloop(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, sbx) = instr.asbx();
    let a = a as usize;
    let frame = vm.current_frame_mut();

    let next = match (frame.get(a), frame.get(a + 1), frame.get(a + 2)) {
        (LuaValue::Integer(idx), LuaValue::Integer(limit), LuaValue::Integer(step)) => {
            let idx = idx.wrapping_add(step);
            let go_on = if step > 0 { idx <= limit } else { limit <= idx };
            go_on.then(|| LuaValue::integer(idx))
        }
        (idx, limit, step) => {
            let (Some(idx), Some(limit), Some(step)) = (idx.as_float(), limit.as_float(), step.as_float())
            else {
                return Err(LuaError::runtime("'for' loop state is not numeric"));
            };
            let idx = idx + step;
            let go_on = if step > 0.0 { idx <= limit } else { limit <= idx };
            go_on.then(|| LuaValue::float(idx))
        }
    };

    if let Some(idx) = next {
        frame.add_pc(sbx);
        frame.set(a, idx.clone())?;
        frame.set(a + 3, idx)?;
    }
    Ok(())
}

/// TFORCALL A C
/// R(A+3), ... ,R(A+2+C) := R(A)(R(A+1), R(A+2))
pub fn exec_tforcall(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, _, c) = instr.abc();
    let a = a as usize;

    let frame = vm.current_frame_mut();
    let call: Vec<LuaValue> = (a..a + 3).map(|r| frame.get(r)).collect();
    push_values(frame, &call)?;

    vm.call(2, ResultCount::Fixed(c as usize))?;
    store_results(vm.current_frame_mut(), a + 3, c as usize + 1)
}

/// TFORLOOP A sBx
/// if R(A+1) ~= nil then { R(A) = R(A+1); pc += sBx }
pub fn exec_tforloop(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, sbx) = instr.asbx();
    let a = a as usize;
    let frame = vm.current_frame_mut();
    let control = frame.get(a + 1);
    if !control.is_nil() {
        frame.set(a, control)?;
        frame.add_pc(sbx);
    }
    Ok(())
}
