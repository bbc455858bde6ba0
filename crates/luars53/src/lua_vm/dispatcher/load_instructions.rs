/// Load instructions
///
/// MOVE, LOADK, LOADKX, LOADBOOL, LOADNIL, VARARG and EXTRAARG.
use super::push_values;
use crate::lua_value::LuaValue;
use crate::lua_vm::{Instruction, LuaResult, LuaVM};

/// MOVE A B
/// R(A) := R(B)
pub fn exec_move(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let frame = vm.current_frame_mut();
    let value = frame.get(b as usize);
    frame.set(a as usize, value)
}

/// LOADK A Bx
/// R(A) := Kst(Bx)
pub fn exec_loadk(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, bx) = instr.abx();
    let frame = vm.current_frame_mut();
    let value = frame.constant(bx as usize)?;
    frame.set(a as usize, value)
}

/// LOADKX A
/// R(A) := Kst(extra arg)
pub fn exec_loadkx(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a() as usize;
    let ax = vm.fetch_extra_arg()?;
    let frame = vm.current_frame_mut();
    let value = frame.constant(ax as usize)?;
    frame.set(a, value)
}

/// LOADBOOL A B C
/// R(A) := (Bool)B; if (C) pc++
pub fn exec_loadbool(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame_mut();
    frame.set(a as usize, LuaValue::boolean(b != 0))?;
    if c != 0 {
        frame.add_pc(1);
    }
    Ok(())
}

/// LOADNIL A B
/// R(A), R(A+1), ..., R(A+B) := nil
pub fn exec_loadnil(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let frame = vm.current_frame_mut();
    for r in a..=a + b {
        frame.set(r as usize, LuaValue::nil())?;
    }
    Ok(())
}

/// VARARG A B
/// R(A), R(A+1), ..., R(A+B-2) = vararg
///
/// B=0 leaves every vararg pending as open results starting at R(A).
pub fn exec_vararg(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let a = a as usize;
    let frame = vm.current_frame_mut();

    if b == 0 {
        let varargs = frame.varargs.clone();
        push_values(frame, &varargs)?;
        frame.multret_base = Some(a);
        return Ok(());
    }

    for i in 0..(b - 1) as usize {
        let value = frame.varargs.get(i).cloned().unwrap_or_default();
        frame.set(a + i, value)?;
    }
    Ok(())
}

/// EXTRAARG Ax
/// Operand of the preceding LOADKX or SETLIST, consumed by that handler.
/// Reached on its own only through a jump, where it does nothing.
pub fn exec_extraarg(_vm: &mut LuaVM, _instr: Instruction) -> LuaResult<()> {
    Ok(())
}
