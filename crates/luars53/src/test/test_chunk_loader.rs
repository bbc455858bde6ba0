// Tests for loading binary chunks into the VM
use super::*;
use crate::lua_value::chunk_serializer::{ChunkLoader, dump_chunk};
use crate::lua_vm::{LuaError, LuaResult, LuaVM, OpCode, ResultCount, SafeOption};

/// local function add(a, b) return a + b end; return add(2, 3), greeting
fn sample_chunk() -> Chunk {
    let mut add = (*Proto::new(3)
        .params(2)
        .code(vec![abc(OpCode::Add, 2, 0, 1), abc(OpCode::Return, 2, 2, 0)])
        .build())
    .clone();
    add.source_name = Some("@sample.lua".to_string());
    add.linedefined = 1;
    add.lastlinedefined = 1;
    let main = Proto::main(4)
        .constants(vec![int(2), int(3), lstr("greeting")])
        .code(vec![
            abx(OpCode::Closure, 0, 0),
            abx(OpCode::LoadK, 1, 0),
            abx(OpCode::LoadK, 2, 1),
            abc(OpCode::Call, 0, 3, 2),
            abc(OpCode::GetTabUp, 1, 0, k(2)),
            abc(OpCode::Return, 0, 3, 0),
        ])
        .child(Rc::new(add))
        .build();
    let mut chunk = (*main).clone();
    chunk.source_name = Some("@sample.lua".to_string());
    chunk.line_info = vec![1, 2, 2, 2, 2, 2];
    chunk
}

fn load_and_run(vm: &mut LuaVM, bytes: &[u8], name: &str) -> LuaResult<Vec<LuaValue>> {
    vm.load(bytes, name)?;
    vm.call(0, ResultCount::All)?;
    take_stack(vm, 0)
}

#[test]
fn test_dumped_chunk_runs() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.set_global("greeting", lstr("hi")).unwrap();

    let bytes = dump_chunk(&sample_chunk(), false);
    let result = load_and_run(&mut vm, &bytes, "=sample");
    assert_eq!(result, Ok(vec![int(5), lstr("hi")]));
}

#[test]
fn test_stripped_chunk_runs() {
    let mut vm = LuaVM::new(SafeOption::default());
    let bytes = dump_chunk(&sample_chunk(), true);
    let result = load_and_run(&mut vm, &bytes, "=stripped");
    assert_eq!(result, Ok(vec![int(5), LuaValue::nil()]));
}

#[test]
fn test_text_chunk_is_rejected() {
    let mut vm = LuaVM::new(SafeOption::default());
    let err = vm.load(b"return 1", "=stdin").unwrap_err();
    assert_eq!(err, LuaError::BadChunk("=stdin: attempt to load a text chunk".into()));
    assert_eq!(vm.get_top(), 0);
}

#[test]
fn test_truncated_chunk_is_rejected() {
    let mut vm = LuaVM::new(SafeOption::default());
    let bytes = dump_chunk(&sample_chunk(), false);
    let err = vm.load(&bytes[..bytes.len() - 3], "=cut").unwrap_err();
    assert_eq!(err, LuaError::BadChunk("=cut: truncated".into()));
}

#[test]
fn test_invalid_opcode_rejected_at_load() {
    let mut vm = LuaVM::new(SafeOption::default());
    let mut chunk = sample_chunk();
    chunk.code[1] = Instruction::from_u32(63);
    let bytes = dump_chunk(&chunk, false);

    let err = vm.load(&bytes, "=bad").unwrap_err();
    assert_eq!(err, LuaError::BadChunk("=bad: invalid opcode 63 at pc 1".into()));
}

#[test]
fn test_binary_string_constant_runs() {
    let mut vm = LuaVM::new(SafeOption::default());
    // local s = "\xfe\xff" .. 1; return s, #s
    let main = Proto::main(3)
        .constants(vec![LuaValue::string(&b"\xfe\xff"[..]), int(1)])
        .code(vec![
            abx(OpCode::LoadK, 1, 0),
            abx(OpCode::LoadK, 2, 1),
            abc(OpCode::Concat, 0, 1, 2),
            abc(OpCode::Len, 1, 0, 0),
            abc(OpCode::Return, 0, 3, 0),
        ])
        .build();
    let bytes = dump_chunk(&main, false);

    let result = load_and_run(&mut vm, &bytes, "=bytes").unwrap();
    assert_eq!(result[0].as_bytes(), Some(&b"\xfe\xff1"[..]));
    assert_eq!(result[1], int(3));
}

struct FixedLoader(Chunk);

impl ChunkLoader for FixedLoader {
    fn load(&self, _bytes: &[u8], _chunk_name: &str) -> LuaResult<Chunk> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_custom_loader() {
    let mut vm = LuaVM::new(SafeOption::default()).with_loader(FixedLoader(sample_chunk()));
    vm.set_global("greeting", lstr("custom")).unwrap();

    let result = load_and_run(&mut vm, b"ignored", "=custom");
    assert_eq!(result, Ok(vec![int(5), lstr("custom")]));
}

#[test]
fn test_listing_of_loaded_chunk() {
    let bytes = dump_chunk(&sample_chunk(), false);
    let chunk = crate::undump(&bytes).unwrap();

    let listing = chunk.disassemble();
    assert!(listing.contains("main <sample.lua:0,0> (6 instructions)"));
    assert!(listing.contains("CLOSURE"));
    assert!(listing.contains("GETTABUP"));
    // the nested prototype is listed after its parent
    assert!(listing.contains("function <sample.lua:1,1> (2 instructions)"));
}
