/// Arithmetic, bitwise, unary and concatenation instructions
///
/// Operand coercion and overflow rules live in `lua_value::arith`.
use crate::lua_value::{ArithOp, LuaValue, arith, concat, objlen};
use crate::lua_vm::{Instruction, LuaResult, LuaVM};

/// R(A) := RK(B) op RK(C)
#[inline(always)]
fn exec_binary(vm: &mut LuaVM, instr: Instruction, op: ArithOp) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame_mut();
    let lhs = frame.rk(b)?;
    let rhs = frame.rk(c)?;
    let result = arith(op, &lhs, &rhs)?;
    frame.set(a as usize, result)
}

/// R(A) := op R(B)
#[inline(always)]
fn exec_unary(vm: &mut LuaVM, instr: Instruction, op: ArithOp) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let frame = vm.current_frame_mut();
    let operand = frame.get(b as usize);
    let result = arith(op, &operand, &operand)?;
    frame.set(a as usize, result)
}

/// ADD A B C: R(A) := RK(B) + RK(C)
pub fn exec_add(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::Add)
}

/// SUB A B C: R(A) := RK(B) - RK(C)
pub fn exec_sub(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::Sub)
}

/// MUL A B C: R(A) := RK(B) * RK(C)
pub fn exec_mul(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::Mul)
}

/// MOD A B C: R(A) := RK(B) % RK(C)
pub fn exec_mod(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::Mod)
}

/// POW A B C: R(A) := RK(B) ^ RK(C)
pub fn exec_pow(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::Pow)
}

/// DIV A B C: R(A) := RK(B) / RK(C)
pub fn exec_div(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::Div)
}

/// IDIV A B C: R(A) := RK(B) // RK(C)
pub fn exec_idiv(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::IDiv)
}

/// BAND A B C: R(A) := RK(B) & RK(C)
pub fn exec_band(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::BAnd)
}

/// BOR A B C: R(A) := RK(B) | RK(C)
pub fn exec_bor(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::BOr)
}

/// BXOR A B C: R(A) := RK(B) ~ RK(C)
pub fn exec_bxor(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::BXor)
}

/// SHL A B C: R(A) := RK(B) << RK(C)
pub fn exec_shl(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::Shl)
}

/// SHR A B C: R(A) := RK(B) >> RK(C)
pub fn exec_shr(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_binary(vm, instr, ArithOp::Shr)
}

/// UNM A B: R(A) := -R(B)
pub fn exec_unm(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_unary(vm, instr, ArithOp::Unm)
}

/// BNOT A B: R(A) := ~R(B)
pub fn exec_bnot(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    exec_unary(vm, instr, ArithOp::BNot)
}

/// NOT A B: R(A) := not R(B)
pub fn exec_not(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let frame = vm.current_frame_mut();
    let value = frame.get(b as usize).is_falsy();
    frame.set(a as usize, LuaValue::boolean(value))
}

/// LEN A B: R(A) := length of R(B)
pub fn exec_len(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, _) = instr.abc();
    let frame = vm.current_frame_mut();
    let len = objlen(&frame.get(b as usize))?;
    frame.set(a as usize, len)
}

/// CONCAT A B C
/// R(A) := R(B).. ... ..R(C)
pub fn exec_concat(vm: &mut LuaVM, instr: Instruction) -> LuaResult<()> {
    let (a, b, c) = instr.abc();
    let frame = vm.current_frame_mut();
    let values: Vec<LuaValue> = (b..=c).map(|r| frame.get(r as usize)).collect();
    let result = concat(&values)?;
    frame.set(a as usize, result)
}
