// Lua 5.3 Runtime
// A register-based bytecode VM that runs precompiled Lua 5.3 chunks

#[cfg(test)]
mod test;

pub mod lua_value;
pub mod lua_vm;

pub use lua_value::chunk_serializer::{BinaryChunkLoader, ChunkLoader, dump_chunk, undump};
pub use lua_value::{CFunction, Chunk, LuaClosure, LuaFunction, LuaTable, LuaUpvalue, LuaValue};
pub use lua_vm::{
    Instruction, LuaError, LuaResult, LuaVM, OpArgMode, OpCode, OpMode, ResultCount, SafeOption,
};
