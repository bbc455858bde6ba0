// Tests for closure creation and upvalue sharing/closing
use super::*;
use crate::lua_vm::{LuaVM, OpCode, SafeOption};

/// function() return x end, x being the enclosing R0
fn getter() -> Rc<Chunk> {
    Proto::new(1)
        .upvalue(true, 0)
        .code(vec![abc(OpCode::GetUpval, 0, 0, 0), abc(OpCode::Return, 0, 2, 0)])
        .build()
}

/// function(v) x = v end, x being the enclosing R0
fn setter() -> Rc<Chunk> {
    Proto::new(1)
        .params(1)
        .upvalue(true, 0)
        .code(vec![abc(OpCode::SetUpval, 0, 0, 0), abc(OpCode::Return, 0, 1, 0)])
        .build()
}

#[test]
fn test_closures_share_one_cell_while_open_and_after_close() {
    let mut vm = LuaVM::new(SafeOption::default());
    // local x = 10
    // get = function() return x end
    // set = function(v) x = v end
    // set(20)
    // return get(), x
    let main = Proto::main(5)
        .constants(vec![int(10), lstr("get"), lstr("set"), int(20)])
        .code(vec![
            abx(OpCode::LoadK, 0, 0),
            abx(OpCode::Closure, 1, 0),
            abx(OpCode::Closure, 2, 1),
            abc(OpCode::SetTabUp, 0, k(1), 1),
            abc(OpCode::SetTabUp, 0, k(2), 2),
            abc(OpCode::Move, 3, 2, 0),
            abx(OpCode::LoadK, 4, 3),
            abc(OpCode::Call, 3, 2, 1),
            abc(OpCode::Move, 3, 1, 0),
            abc(OpCode::Call, 3, 1, 2),
            abc(OpCode::Move, 4, 0, 0),
            abc(OpCode::Return, 3, 3, 0),
        ])
        .child(getter())
        .child(setter())
        .build();

    // the setter wrote through to the live register
    let result = run(&mut vm, main);
    assert_eq!(result, Ok(vec![int(20), int(20)]));

    // main has returned: both closures now see the closed cell
    assert_eq!(call_global(&mut vm, "get", &[]), Ok(vec![int(20)]));
    assert_eq!(call_global(&mut vm, "set", &[int(30)]), Ok(vec![]));
    assert_eq!(call_global(&mut vm, "get", &[]), Ok(vec![int(30)]));
}

#[test]
fn test_jmp_closes_upvalues() {
    let mut vm = LuaVM::new(SafeOption::default());
    // do local x = 1; g = function() return x end end
    // x's register is reused before g runs
    let main = Proto::main(3)
        .constants(vec![int(1), int(99)])
        .code(vec![
            abx(OpCode::LoadK, 0, 0),
            abx(OpCode::Closure, 1, 0),
            asbx(OpCode::Jmp, 1, 0),
            abx(OpCode::LoadK, 0, 1),
            abc(OpCode::Move, 2, 1, 0),
            abc(OpCode::Call, 2, 1, 2),
            abc(OpCode::Return, 2, 2, 0),
        ])
        .child(getter())
        .build();

    assert_eq!(run(&mut vm, main), Ok(vec![int(1)]));
}

#[test]
fn test_open_upvalue_sees_later_register_writes() {
    let mut vm = LuaVM::new(SafeOption::default());
    // same as above without the closing jump
    let main = Proto::main(3)
        .constants(vec![int(1), int(99)])
        .code(vec![
            abx(OpCode::LoadK, 0, 0),
            abx(OpCode::Closure, 1, 0),
            abx(OpCode::LoadK, 0, 1),
            abc(OpCode::Move, 2, 1, 0),
            abc(OpCode::Call, 2, 1, 2),
            abc(OpCode::Return, 2, 2, 0),
        ])
        .child(getter())
        .build();

    assert_eq!(run(&mut vm, main), Ok(vec![int(99)]));
}

#[test]
fn test_counters_from_separate_activations_are_independent() {
    let mut vm = LuaVM::new(SafeOption::default());
    // function() n = n + 1; return n end
    let inc = Proto::new(1)
        .upvalue(true, 0)
        .constants(vec![int(1)])
        .code(vec![
            abc(OpCode::GetUpval, 0, 0, 0),
            abc(OpCode::Add, 0, 0, k(0)),
            abc(OpCode::SetUpval, 0, 0, 0),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .build();
    // function() local n = 0; return inc end
    let make = Proto::new(2)
        .constants(vec![int(0)])
        .code(vec![
            abx(OpCode::LoadK, 0, 0),
            abx(OpCode::Closure, 1, 0),
            abc(OpCode::Return, 1, 2, 0),
        ])
        .child(inc)
        .build();
    // local c1, c2 = make(), make(); c1(); return c1(), c2()
    let main = Proto::main(5)
        .code(vec![
            abx(OpCode::Closure, 0, 0),
            abc(OpCode::Move, 1, 0, 0),
            abc(OpCode::Call, 1, 1, 2),
            abc(OpCode::Move, 2, 0, 0),
            abc(OpCode::Call, 2, 1, 2),
            abc(OpCode::Move, 3, 1, 0),
            abc(OpCode::Call, 3, 1, 1),
            abc(OpCode::Move, 3, 1, 0),
            abc(OpCode::Call, 3, 1, 2),
            abc(OpCode::Move, 4, 2, 0),
            abc(OpCode::Call, 4, 1, 2),
            abc(OpCode::Return, 3, 3, 0),
        ])
        .child(make)
        .build();

    assert_eq!(run(&mut vm, main), Ok(vec![int(2), int(1)]));
}

#[test]
fn test_nested_closure_inherits_enclosing_upvalue() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.set_global("answer", int(42)).unwrap();
    // function() return answer end, reached through _ENV two levels down
    let inner = Proto::new(1)
        .upvalue(false, 0)
        .constants(vec![lstr("answer")])
        .code(vec![abc(OpCode::GetTabUp, 0, 0, k(0)), abc(OpCode::Return, 0, 2, 0)])
        .build();
    let outer = Proto::new(1)
        .upvalue(false, 0)
        .code(vec![
            abx(OpCode::Closure, 0, 0),
            abc(OpCode::TailCall, 0, 1, 0),
            abc(OpCode::Return, 0, 0, 0),
        ])
        .child(inner)
        .build();
    let main = Proto::main(1)
        .code(vec![
            abx(OpCode::Closure, 0, 0),
            abc(OpCode::Call, 0, 1, 0),
            abc(OpCode::Return, 0, 0, 0),
        ])
        .child(outer)
        .build();

    assert_eq!(run(&mut vm, main), Ok(vec![int(42)]));
}
