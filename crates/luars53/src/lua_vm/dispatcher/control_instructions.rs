/// Control flow instructions
///
/// Jumps, comparisons/tests, and the CALL/TAILCALL/RETURN family.
///
/// Test opcodes never jump themselves: the next instruction is always a
/// JMP, and a failed test skips it by advancing pc by one.
use super::{collect_values, push_values, store_results};
use crate::lua_value::{LuaFunction, LuaValue, less_equal, less_than};
use crate::lua_vm::{Instruction, LuaCallFrame, LuaError, LuaResult, LuaVM, ResultCount};

/// JMP A sBx
/// pc += sBx; if (A) close all upvalues >= R(A - 1)
pub fn exec_jmp(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, sbx) = instr.asbx();
    let frame = vm.current_frame_mut();
    frame.add_pc(sbx);
    if a != 0 {
        frame.close_upvalues(a as usize - 1);
    }
    Ok(())
}

/// Skip the following jump unless `outcome` matches A
#[inline(always)]
fn skip_unless(vm: &mut LuaVM, outcome: bool, a: u32) {
    if outcome != (a != 0) {
        vm.current_frame_mut().add_pc(1);
    }
}

/// EQ A B C
/// if ((RK(B) == RK(C)) ~= A) then pc++
pub fn exec_eq(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame();
    let equal = frame.rk(b)? == frame.rk(c)?;
    skip_unless(vm, equal, a);
    Ok(())
}

/// LT A B C
/// if ((RK(B) <  RK(C)) ~= A) then pc++
pub fn exec_lt(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame();
    let less = less_than(&frame.rk(b)?, &frame.rk(c)?)?;
    skip_unless(vm, less, a);
    Ok(())
}

/// LE A B C
/// if ((RK(B) <= RK(C)) ~= A) then pc++
pub fn exec_le(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame();
    let less_eq = less_equal(&frame.rk(b)?, &frame.rk(c)?)?;
    skip_unless(vm, less_eq, a);
    Ok(())
}

/// TEST A C
/// if not (R(A) <=> C) then pc++
pub fn exec_test(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, _, c) = instr.abc();
    let frame = vm.current_frame_mut();
    if frame.get(a as usize).to_boolean() != (c != 0) {
        frame.add_pc(1);
    }
    Ok(())
}

/// TESTSET A B C
/// if (R(B) <=> C) then R(A) := R(B) else pc++
pub fn exec_testset(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame_mut();
    let value = frame.get(b as usize);
    if value.to_boolean() == (c != 0) {
        frame.set(a as usize, value)
    } else {
        frame.add_pc(1);
        Ok(())
    }
}

/// CALL A B C
/// R(A), ... ,R(A+C-2) := R(A)(R(A+1), ... ,R(A+B-1))
///
/// B=0 passes every pending open result as trailing arguments; C=0 keeps
/// every result pending for the next instruction.
pub fn exec_call(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let a = a as usize;

    let frame = vm.current_frame_mut();
    let count = if b == 0 { None } else { Some(b as usize) };
    let func_and_args = collect_values(frame, a, count)?;
    let Some(nargs) = func_and_args.len().checked_sub(1) else {
        return Err(LuaError::StackUnderflow);
    };
    push_values(frame, &func_and_args)?;

    vm.call(nargs, ResultCount::from_operand(c))?;
    store_results(vm.current_frame_mut(), a, c as usize)
}

/// TAILCALL A B C
/// return R(A)(R(A+1), ... ,R(A+B-1))
///
/// An interpreted callee takes over the current frame, so the call stack
/// does not grow. Anything else is called normally and its results are
/// left pending for the RETURN A 0 that follows.
pub fn exec_tailcall(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let a = a as usize;

    let frame = vm.current_frame_mut();
    let count = if b == 0 { None } else { Some(b as usize) };
    let mut func_and_args = collect_values(frame, a, count)?;

    let lua_callee = match func_and_args.first() {
        Some(LuaValue::Function(f)) => match f.as_ref() {
            LuaFunction::Lua(closure) => Some((f.clone(), closure.chunk.clone())),
            LuaFunction::Native(_) => None,
        },
        _ => None,
    };

    if let Some((func, chunk)) = lua_callee {
        let args = func_and_args.split_off(1);
        tracing::debug!(
            target: "luars53::call",
            source = chunk.source_name.as_deref().unwrap_or("?"),
            line = chunk.linedefined,
            nargs = args.len(),
            "tail call Lua closure"
        );
        let depth = frame.depth;
        let callee = LuaCallFrame::new_lua(func, chunk, args, depth, vm.safe_option.max_stack_size)?;
        vm.stack.replace_current(callee);
        return Ok(());
    }

    let Some(nargs) = func_and_args.len().checked_sub(1) else {
        return Err(LuaError::StackUnderflow);
    };
    push_values(frame, &func_and_args)?;
    vm.call(nargs, ResultCount::All)?;
    vm.current_frame_mut().multret_base = Some(a);
    Ok(())
}

/// RETURN A B
/// return R(A), ... ,R(A+B-2)
///
/// The returned values are left in the operand area above the registers,
/// where the call protocol collects them.
pub fn exec_return(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let frame = vm.current_frame_mut();
    let count = if b == 0 { None } else { Some(b as usize - 1) };
    let values = collect_values(frame, a as usize, count)?;

    let register_count = frame.register_count;
    frame.set_top(register_count)?;
    push_values(frame, &values)
}
