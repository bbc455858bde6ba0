/// Table operations
///
/// GETTABLE, SETTABLE, NEWTABLE, SELF and SETLIST, plus the raw indexing
/// helpers shared with the upvalue-table instructions.
use super::collect_values;
use crate::lua_value::{LuaTable, LuaValue};
use crate::lua_vm::lua_limits::LFIELDS_PER_FLUSH;
use crate::lua_vm::{Instruction, LuaError, LuaResult, LuaVM};

/// `t[k]` without metamethods
pub(crate) fn get_index(table: &LuaValue, key: &LuaValue) -> LuaResult<LuaValue> {
    match table {
        LuaValue::Table(t) => Ok(t.borrow().raw_get(key).unwrap_or_default()),
        _ => Err(index_error(table)),
    }
}

/// `t[k] = v` without metamethods
pub(crate) fn set_index(table: &LuaValue, key: LuaValue, value: LuaValue) -> LuaResult<()> {
    match table {
        LuaValue::Table(t) => t.borrow_mut().raw_set(key, value),
        _ => Err(index_error(table)),
    }
}

fn index_error(value: &LuaValue) -> LuaError {
    LuaError::runtime(format!("attempt to index a {} value", value.type_name()))
}

/// Largest preallocation a NEWTABLE size hint may ask for
const MAX_SIZE_HINT: usize = 1 << 16;

/// Decode a "floating point byte" (eeeeexxx) size hint
pub(crate) fn fb2int(x: u32) -> usize {
    if x < 8 {
        x as usize
    } else {
        let mantissa = ((x & 7) + 8) as usize;
        let shift = (x >> 3) - 1;
        if shift >= mantissa.leading_zeros() {
            usize::MAX
        } else {
            mantissa << shift
        }
    }
}

/// GETTABLE A B C
/// R(A) := R(B)[RK(C)]
pub fn exec_gettable(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame_mut();
    let table = frame.get(b as usize);
    let key = frame.rk(c)?;
    let value = get_index(&table, &key)?;
    frame.set(a as usize, value)
}

/// SETTABLE A B C
/// R(A)[RK(B)] := RK(C)
pub fn exec_settable(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame();
    let table = frame.get(a as usize);
    let key = frame.rk(b)?;
    let value = frame.rk(c)?;
    set_index(&table, key, value)
}

/// NEWTABLE A B C
/// R(A) := {} (size = B,C)
pub fn exec_newtable(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let table = LuaTable::with_capacity(
        fb2int(b).min(MAX_SIZE_HINT),
        fb2int(c).min(MAX_SIZE_HINT),
    );
    vm.current_frame_mut()
        .set(a as usize, LuaValue::table(table))
}

/// SELF A B C
/// R(A+1) := R(B); R(A) := R(B)[RK(C)]
pub fn exec_self(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let a = a as usize;
    let frame = vm.current_frame_mut();
    let object = frame.get(b as usize);
    let key = frame.rk(c)?;
    let method = get_index(&object, &key)?;
    frame.set(a + 1, object)?;
    frame.set(a, method)
}

/// SETLIST A B C
/// R(A)[(C-1)*FPF+i] := R(A+i), 1 <= i <= B
///
/// B=0 stores every pending open result; C=0 takes the block number from
/// the following EXTRAARG.
pub fn exec_setlist(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let a = a as usize;
    let block = if c == 0 { vm.fetch_extra_arg()? } else { c };

    let frame = vm.current_frame_mut();
    let count = if b == 0 { None } else { Some(b as usize) };
    let values = collect_values(frame, a + 1, count)?;

    let LuaValue::Table(table) = frame.get(a) else {
        return Err(LuaError::runtime("SETLIST target is not a table"));
    };
    let mut table = table.borrow_mut();
    let first = ((block as usize).saturating_sub(1) * LFIELDS_PER_FLUSH) as i64;
    for (i, value) in values.into_iter().enumerate() {
        table.set_int(first + i as i64 + 1, value);
    }
    Ok(())
}
