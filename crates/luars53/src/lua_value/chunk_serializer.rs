// Lua 5.3 binary chunk reader/writer (the `luac` format, 64-bit layout)

use super::{Chunk, LocVar, LuaValue, UpvalueDesc};
use crate::lua_vm::{Instruction, LuaError, LuaResult, OpCode};
use smol_str::SmolStr;
use std::io::{Cursor, Read};
use std::rc::Rc;

const LUA_SIGNATURE: &[u8] = b"\x1bLua";
const LUAC_VERSION: u8 = 0x53;
const LUAC_FORMAT: u8 = 0;
const LUAC_DATA: &[u8] = b"\x19\x93\r\n\x1a\n";
const CINT_SIZE: u8 = 4;
const CSIZET_SIZE: u8 = 8;
const INSTRUCTION_SIZE: u8 = 4;
const LUA_INTEGER_SIZE: u8 = 8;
const LUA_NUMBER_SIZE: u8 = 8;
const LUAC_INT: i64 = 0x5678;
const LUAC_NUM: f64 = 370.5;

// constant tags
const TAG_NIL: u8 = 0x00;
const TAG_BOOLEAN: u8 = 0x01;
const TAG_NUMBER: u8 = 0x03;
const TAG_INTEGER: u8 = 0x13;
const TAG_SHORT_STR: u8 = 0x04;
const TAG_LONG_STR: u8 = 0x14;

/// Strings up to this length are dumped as short strings
const LUAI_MAXSHORTLEN: usize = 40;

/// Nested prototypes deeper than this are rejected (matches LUAI_MAXCCALLS)
const MAX_NESTING: usize = 200;

/// Produces a prototype tree from a byte buffer
pub trait ChunkLoader {
    fn load(&self, bytes: &[u8], chunk_name: &str) -> LuaResult<Chunk>;
}

/// Loader for precompiled Lua 5.3 chunks
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryChunkLoader;

impl ChunkLoader for BinaryChunkLoader {
    fn load(&self, bytes: &[u8], chunk_name: &str) -> LuaResult<Chunk> {
        if !bytes.starts_with(&LUA_SIGNATURE[..1]) {
            return Err(bad_chunk(format!(
                "{}: attempt to load a text chunk",
                chunk_name
            )));
        }
        undump(bytes).map_err(|e| match e {
            LuaError::BadChunk(msg) => bad_chunk(format!("{}: {}", chunk_name, msg)),
            other => other,
        })
    }
}

/// Parse a complete binary chunk into its main prototype
pub fn undump(data: &[u8]) -> LuaResult<Chunk> {
    let mut cursor = Cursor::new(data);
    check_header(&mut cursor)?;
    let upvalue_count = read_u8(&mut cursor)? as usize;
    let chunk = read_function(&mut cursor, None, 0)?;
    if chunk.upvalue_descs.len() != upvalue_count {
        return Err(bad_chunk(format!(
            "upvalue count mismatch ({} in header, {} in function)",
            upvalue_count,
            chunk.upvalue_descs.len()
        )));
    }
    tracing::debug!(
        target: "luars53::undump",
        source = chunk.source_name.as_deref().unwrap_or("?"),
        instructions = chunk.code.len(),
        protos = chunk.child_protos.len(),
        "chunk loaded"
    );
    Ok(chunk)
}

/// Serialize a prototype tree; `strip` drops debug information
pub fn dump_chunk(chunk: &Chunk, strip: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(LUA_SIGNATURE);
    buf.push(LUAC_VERSION);
    buf.push(LUAC_FORMAT);
    buf.extend_from_slice(LUAC_DATA);
    buf.extend_from_slice(&[
        CINT_SIZE,
        CSIZET_SIZE,
        INSTRUCTION_SIZE,
        LUA_INTEGER_SIZE,
        LUA_NUMBER_SIZE,
    ]);
    write_i64(&mut buf, LUAC_INT);
    write_f64(&mut buf, LUAC_NUM);
    buf.push(chunk.upvalue_descs.len() as u8);
    write_function(&mut buf, chunk, None, strip);
    buf
}

fn check_header(cursor: &mut Cursor<&[u8]>) -> LuaResult<()> {
    let mut signature = [0u8; 4];
    read_bytes(cursor, &mut signature)?;
    if signature != LUA_SIGNATURE {
        return Err(bad_chunk("not a binary chunk"));
    }
    if read_u8(cursor)? != LUAC_VERSION {
        return Err(bad_chunk("version mismatch"));
    }
    if read_u8(cursor)? != LUAC_FORMAT {
        return Err(bad_chunk("format mismatch"));
    }
    let mut data = [0u8; 6];
    read_bytes(cursor, &mut data)?;
    if data != LUAC_DATA {
        return Err(bad_chunk("corrupted"));
    }
    for (expected, what) in [
        (CINT_SIZE, "int"),
        (CSIZET_SIZE, "size_t"),
        (INSTRUCTION_SIZE, "Instruction"),
        (LUA_INTEGER_SIZE, "lua_Integer"),
        (LUA_NUMBER_SIZE, "lua_Number"),
    ] {
        if read_u8(cursor)? != expected {
            return Err(bad_chunk(format!("{} size mismatch", what)));
        }
    }
    if read_i64(cursor)? != LUAC_INT {
        return Err(bad_chunk("endianness mismatch"));
    }
    if read_f64(cursor)? != LUAC_NUM {
        return Err(bad_chunk("float format mismatch"));
    }
    Ok(())
}

fn read_function(
    cursor: &mut Cursor<&[u8]>,
    parent_source: Option<&str>,
    depth: usize,
) -> LuaResult<Chunk> {
    if depth >= MAX_NESTING {
        return Err(bad_chunk("too many nested functions"));
    }
    let mut chunk = Chunk::new();
    chunk.source_name = match read_string(cursor)? {
        Some(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        None => parent_source.map(str::to_string),
    };
    chunk.linedefined = read_int(cursor)? as usize;
    chunk.lastlinedefined = read_int(cursor)? as usize;
    chunk.param_count = read_u8(cursor)? as usize;
    chunk.is_vararg = read_u8(cursor)? != 0;
    chunk.max_stack_size = read_u8(cursor)? as usize;

    let ncode = read_count(cursor, 4)?;
    chunk.code.reserve(ncode);
    for pc in 0..ncode {
        let instr = Instruction::from(read_u32(cursor)?);
        let op = instr.opcode_byte();
        if OpCode::from_u8(op).is_none() {
            return Err(bad_chunk(format!("invalid opcode {} at pc {}", op, pc)));
        }
        chunk.code.push(instr);
    }

    let nconst = read_count(cursor, 1)?;
    for _ in 0..nconst {
        let constant = read_constant(cursor)?;
        chunk.constants.push(constant);
    }

    let nupval = read_count(cursor, 2)?;
    for _ in 0..nupval {
        let is_local = read_u8(cursor)? != 0;
        let index = read_u8(cursor)? as u32;
        chunk.upvalue_descs.push(UpvalueDesc { is_local, index });
    }

    let nprotos = read_count(cursor, 1)?;
    for _ in 0..nprotos {
        let child = read_function(cursor, chunk.source_name.as_deref(), depth + 1)?;
        chunk.child_protos.push(Rc::new(child));
    }

    // debug info
    let nlines = read_count(cursor, 4)?;
    for _ in 0..nlines {
        chunk.line_info.push(read_int(cursor)?);
    }
    let nlocals = read_count(cursor, 9)?;
    for _ in 0..nlocals {
        let name = read_name(cursor)?;
        let start_pc = read_int(cursor)?;
        let end_pc = read_int(cursor)?;
        chunk.locals.push(LocVar { name, start_pc, end_pc });
    }
    let nnames = read_count(cursor, 1)?;
    for _ in 0..nnames {
        chunk.upvalue_names.push(read_name(cursor)?);
    }

    Ok(chunk)
}

fn write_function(buf: &mut Vec<u8>, chunk: &Chunk, parent_source: Option<&str>, strip: bool) {
    let source = chunk.source_name.as_deref();
    if strip || source == parent_source {
        write_string(buf, None);
    } else {
        write_string(buf, source.map(str::as_bytes));
    }
    write_int(buf, chunk.linedefined as u32);
    write_int(buf, chunk.lastlinedefined as u32);
    buf.push(chunk.param_count as u8);
    buf.push(chunk.is_vararg as u8);
    buf.push(chunk.max_stack_size as u8);

    write_int(buf, chunk.code.len() as u32);
    for instr in &chunk.code {
        write_u32(buf, u32::from(*instr));
    }

    write_int(buf, chunk.constants.len() as u32);
    for constant in &chunk.constants {
        write_constant(buf, constant);
    }

    write_int(buf, chunk.upvalue_descs.len() as u32);
    for desc in &chunk.upvalue_descs {
        buf.push(desc.is_local as u8);
        buf.push(desc.index as u8);
    }

    write_int(buf, chunk.child_protos.len() as u32);
    for child in &chunk.child_protos {
        write_function(buf, child, source, strip);
    }

    if strip {
        write_int(buf, 0);
        write_int(buf, 0);
        write_int(buf, 0);
        return;
    }
    write_int(buf, chunk.line_info.len() as u32);
    for line in &chunk.line_info {
        write_int(buf, *line);
    }
    write_int(buf, chunk.locals.len() as u32);
    for local in &chunk.locals {
        write_string(buf, Some(local.name.as_bytes()));
        write_int(buf, local.start_pc);
        write_int(buf, local.end_pc);
    }
    write_int(buf, chunk.upvalue_names.len() as u32);
    for name in &chunk.upvalue_names {
        write_string(buf, Some(name.as_bytes()));
    }
}

fn read_constant(cursor: &mut Cursor<&[u8]>) -> LuaResult<LuaValue> {
    let tag = read_u8(cursor)?;
    match tag {
        TAG_NIL => Ok(LuaValue::nil()),
        TAG_BOOLEAN => Ok(LuaValue::boolean(read_u8(cursor)? != 0)),
        TAG_NUMBER => Ok(LuaValue::float(read_f64(cursor)?)),
        TAG_INTEGER => Ok(LuaValue::integer(read_i64(cursor)?)),
        TAG_SHORT_STR | TAG_LONG_STR => Ok(LuaValue::string(read_string(cursor)?.unwrap_or_default())),
        _ => Err(bad_chunk(format!("unknown constant tag {:#04x}", tag))),
    }
}

fn write_constant(buf: &mut Vec<u8>, value: &LuaValue) {
    match value {
        LuaValue::Boolean(b) => {
            buf.push(TAG_BOOLEAN);
            buf.push(*b as u8);
        }
        LuaValue::Float(f) => {
            buf.push(TAG_NUMBER);
            write_f64(buf, *f);
        }
        LuaValue::Integer(i) => {
            buf.push(TAG_INTEGER);
            write_i64(buf, *i);
        }
        LuaValue::String(s) => {
            buf.push(if s.len() <= LUAI_MAXSHORTLEN { TAG_SHORT_STR } else { TAG_LONG_STR });
            write_string(buf, Some(s.as_bytes()));
        }
        // tables and closures never appear in a constant pool
        _ => buf.push(TAG_NIL),
    }
}

// ============ Primitive readers/writers ============

fn bad_chunk(msg: impl Into<String>) -> LuaError {
    LuaError::BadChunk(msg.into())
}

fn read_bytes(cursor: &mut Cursor<&[u8]>, out: &mut [u8]) -> LuaResult<()> {
    cursor.read_exact(out).map_err(|_| bad_chunk("truncated"))
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> LuaResult<u8> {
    let mut buf = [0u8; 1];
    read_bytes(cursor, &mut buf)?;
    Ok(buf[0])
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> LuaResult<u32> {
    let mut buf = [0u8; 4];
    read_bytes(cursor, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_int(cursor: &mut Cursor<&[u8]>) -> LuaResult<u32> {
    let n = read_u32(cursor)?;
    // counts are C ints; a negative one can only come from a corrupt chunk
    if n > i32::MAX as u32 {
        return Err(bad_chunk("negative count"));
    }
    Ok(n)
}

/// A count of items that each take at least `min_size` bytes. Counts the
/// remaining input cannot hold are rejected before anything is allocated.
fn read_count(cursor: &mut Cursor<&[u8]>, min_size: u64) -> LuaResult<usize> {
    let n = read_int(cursor)?;
    if n as u64 * min_size > remaining(cursor) {
        return Err(bad_chunk("truncated"));
    }
    Ok(n as usize)
}

fn remaining(cursor: &Cursor<&[u8]>) -> u64 {
    (cursor.get_ref().len() as u64).saturating_sub(cursor.position())
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> LuaResult<u64> {
    let mut buf = [0u8; 8];
    read_bytes(cursor, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_i64(cursor: &mut Cursor<&[u8]>) -> LuaResult<i64> {
    Ok(read_u64(cursor)? as i64)
}

fn read_f64(cursor: &mut Cursor<&[u8]>) -> LuaResult<f64> {
    Ok(f64::from_bits(read_u64(cursor)?))
}

/// Size byte (0xFF escapes to a size_t); size 0 is the absent string
fn read_string(cursor: &mut Cursor<&[u8]>) -> LuaResult<Option<Vec<u8>>> {
    let mut size = read_u8(cursor)? as u64;
    if size == 0xFF {
        size = read_u64(cursor)?;
    }
    if size == 0 {
        return Ok(None);
    }
    if size - 1 > remaining(cursor) {
        return Err(bad_chunk("truncated"));
    }
    let mut bytes = vec![0u8; (size - 1) as usize];
    read_bytes(cursor, &mut bytes)?;
    Ok(Some(bytes))
}

/// Debug names are identifiers; stray bytes are replaced
fn read_name(cursor: &mut Cursor<&[u8]>) -> LuaResult<SmolStr> {
    Ok(match read_string(cursor)? {
        Some(bytes) => SmolStr::new(String::from_utf8_lossy(&bytes)),
        None => SmolStr::default(),
    })
}

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_int(buf: &mut Vec<u8>, value: u32) {
    write_u32(buf, value);
}

fn write_i64(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_f64(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_bits().to_le_bytes());
}

fn write_string(buf: &mut Vec<u8>, s: Option<&[u8]>) {
    let Some(s) = s else {
        buf.push(0);
        return;
    };
    let size = s.len() + 1;
    if size < 0xFF {
        buf.push(size as u8);
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&(size as u64).to_le_bytes());
    }
    buf.extend_from_slice(s);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<u8> {
        let mut buf = dump_chunk(&Chunk::new(), true);
        // signature..LUAC_NUM is the fixed 33-byte prefix
        buf.truncate(33);
        buf
    }

    #[test]
    fn test_header_layout() {
        let h = header();
        assert_eq!(&h[..4], b"\x1bLua");
        assert_eq!(h[4], 0x53);
        assert_eq!(h[5], 0);
        assert_eq!(&h[6..12], LUAC_DATA);
        assert_eq!(&h[12..17], &[4, 8, 4, 8, 8]);
        assert_eq!(&h[17..25], &0x5678i64.to_le_bytes());
        assert_eq!(&h[25..33], &370.5f64.to_bits().to_le_bytes());
    }

    #[test]
    fn test_rejects_bad_headers() {
        let mut bytes = dump_chunk(&Chunk::new(), false);
        bytes[4] = 0x54;
        assert_eq!(undump(&bytes).unwrap_err(), LuaError::BadChunk("version mismatch".into()));

        let mut bytes = dump_chunk(&Chunk::new(), false);
        bytes[13] = 4;
        assert_eq!(
            undump(&bytes).unwrap_err(),
            LuaError::BadChunk("size_t size mismatch".into())
        );

        let bytes = dump_chunk(&Chunk::new(), false);
        assert_eq!(
            undump(&bytes[..20]).unwrap_err(),
            LuaError::BadChunk("truncated".into())
        );
    }

    #[test]
    fn test_text_chunk_rejected() {
        let err = BinaryChunkLoader.load(b"return 1", "=stdin").unwrap_err();
        assert_eq!(err, LuaError::BadChunk("=stdin: attempt to load a text chunk".into()));
    }

    #[test]
    fn test_invalid_opcode_rejected() {
        let mut chunk = Chunk::new();
        chunk.code.push(Instruction::from(50u32));
        let err = undump(&dump_chunk(&chunk, true)).unwrap_err();
        assert_eq!(err, LuaError::BadChunk("invalid opcode 50 at pc 0".into()));
    }

    #[test]
    fn test_long_string_constant() {
        let long = "x".repeat(300);
        let mut chunk = Chunk::new();
        chunk.constants.push(LuaValue::string(long.as_str()));
        let loaded = undump(&dump_chunk(&chunk, true)).unwrap();
        assert_eq!(loaded.constants[0].as_str(), Some(long.as_str()));
    }

    #[test]
    fn test_oversized_count_rejected_before_allocating() {
        let mut bytes = dump_chunk(&Chunk::new(), true);
        // header, upvalue count, source, two line ints, three flag bytes
        let ncode_at = 33 + 1 + 1 + 8 + 3;
        assert_eq!(&bytes[ncode_at..ncode_at + 4], &[0, 0, 0, 0]);
        bytes[ncode_at..ncode_at + 4].copy_from_slice(&0x7fff_ffffu32.to_le_bytes());
        bytes.truncate(ncode_at + 4);
        assert_eq!(undump(&bytes).unwrap_err(), LuaError::BadChunk("truncated".into()));
    }

    #[test]
    fn test_oversized_constant_count_rejected() {
        let mut chunk = Chunk::new();
        chunk.constants.push(LuaValue::integer(1));
        let mut bytes = dump_chunk(&chunk, true);
        let nconst_at = 33 + 1 + 1 + 8 + 3 + 4;
        assert_eq!(&bytes[nconst_at..nconst_at + 4], &1u32.to_le_bytes());
        bytes[nconst_at..nconst_at + 4].copy_from_slice(&0x1000_0000u32.to_le_bytes());
        assert_eq!(undump(&bytes).unwrap_err(), LuaError::BadChunk("truncated".into()));
    }

    fn nested(levels: usize) -> Chunk {
        let mut chunk = Chunk::new();
        for _ in 1..levels {
            let mut parent = Chunk::new();
            parent.child_protos.push(Rc::new(chunk));
            chunk = parent;
        }
        chunk
    }

    #[test]
    fn test_nesting_limit() {
        assert!(undump(&dump_chunk(&nested(MAX_NESTING), true)).is_ok());
        let err = undump(&dump_chunk(&nested(MAX_NESTING + 1), true)).unwrap_err();
        assert_eq!(err, LuaError::BadChunk("too many nested functions".into()));
    }

    #[test]
    fn test_non_utf8_string_constant() {
        let mut chunk = Chunk::new();
        chunk.constants.push(LuaValue::string(&b"\xff\x00A"[..]));
        let loaded = undump(&dump_chunk(&chunk, true)).unwrap();
        assert_eq!(loaded.constants[0].as_bytes(), Some(&b"\xff\x00A"[..]));

        // a luac chunk patched byte for byte
        let mut chunk = Chunk::new();
        chunk.constants.push(LuaValue::string("A"));
        let mut bytes = dump_chunk(&chunk, true);
        let at = bytes.iter().rposition(|&b| b == b'A').unwrap();
        bytes[at] = 0xff;
        let loaded = undump(&bytes).unwrap();
        assert_eq!(loaded.constants[0].as_bytes(), Some(&b"\xff"[..]));
    }

    #[test]
    fn test_children_inherit_source() {
        let mut child = Chunk::new();
        child.source_name = Some("@main.lua".into());
        child.linedefined = 3;
        let mut main = Chunk::new();
        main.source_name = Some("@main.lua".into());
        main.child_protos.push(Rc::new(child));

        let bytes = dump_chunk(&main, false);
        let loaded = undump(&bytes).unwrap();
        assert_eq!(loaded.child_protos[0].source_name.as_deref(), Some("@main.lua"));
        assert_eq!(loaded.child_protos[0].linedefined, 3);

        let stripped = undump(&dump_chunk(&main, true)).unwrap();
        assert_eq!(stripped.source_name, None);
    }
}
