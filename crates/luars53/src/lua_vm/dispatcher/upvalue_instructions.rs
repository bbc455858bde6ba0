/// Upvalue and closure operations
///
/// These instructions handle upvalues, closures, and variable captures.
use super::table_instructions::{get_index, set_index};
use crate::lua_value::{LuaClosure, LuaFunction, LuaValue};
use crate::lua_vm::{Instruction, LuaError, LuaResult, LuaVM};

/// GETUPVAL A B
/// R(A) := UpValue[B]
pub fn exec_getupval(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let upvalue = vm.current_frame().upvalue(b as usize)?;
    let value = upvalue.get_value(&vm.stack.frames);
    vm.current_frame_mut().set(a as usize, value)
}

/// SETUPVAL A B
/// UpValue[B] := R(A)
pub fn exec_setupval(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let frame = vm.current_frame();
    let upvalue = frame.upvalue(b as usize)?;
    let value = frame.get(a as usize);
    upvalue.set_value(&mut vm.stack.frames, value);
    Ok(())
}

/// GETTABUP A B C
/// R(A) := UpValue[B][RK(C)]
pub fn exec_gettabup(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame();
    let upvalue = frame.upvalue(b as usize)?;
    let key = frame.rk(c)?;
    let table = upvalue.get_value(&vm.stack.frames);
    let value = get_index(&table, &key)?;
    vm.current_frame_mut().set(a as usize, value)
}

/// SETTABUP A B C
/// UpValue[A][RK(B)] := RK(C)
pub fn exec_settabup(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame();
    let upvalue = frame.upvalue(a as usize)?;
    let key = frame.rk(b)?;
    let value = frame.rk(c)?;
    let table = upvalue.get_value(&vm.stack.frames);
    set_index(&table, key, value)
}

/// CLOSURE A Bx
/// R(A) := closure(KPROTO[Bx])
///
/// Each upvalue descriptor captures either a register of this frame
/// (sharing the open cell with any earlier capture) or one of the running
/// closure's own upvalues.
pub fn exec_closure(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, bx) = instr.abx();
    let frame = vm.current_frame_mut();
    let Some(proto) = frame.chunk()?.child_protos.get(bx as usize).cloned() else {
        return Err(LuaError::runtime(format!("prototype index {} out of range", bx)));
    };

    let mut upvalues = Vec::with_capacity(proto.upvalue_descs.len());
    for desc in &proto.upvalue_descs {
        let upvalue = if desc.is_local {
            frame.capture_register(desc.index as usize)
        } else {
            frame.upvalue(desc.index as usize)?
        };
        upvalues.push(upvalue);
    }

    let closure = LuaClosure {
        chunk: proto,
        upvalues,
    };
    frame.set(a as usize, LuaValue::function(LuaFunction::Lua(closure)))
}
