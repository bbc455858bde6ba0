//! Centralized VM limits and configuration constants.
//!
//! Mirrors Lua 5.3's `luaconf.h` / `llimits.h` / `lopcodes.h` values.

// ===== Stack =====

/// Extra stack slots granted to every frame above its register window, and
/// the initial size of a native (host) frame's operand area.
/// Matches Lua 5.3's LUA_MINSTACK.
pub const LUA_MINSTACK: usize = 20;

/// Default maximum number of slots a single frame may grow to.
/// Matches Lua 5.3's LUAI_MAXSTACK.
pub const LUAI_MAXSTACK: usize = 1_000_000;

/// Default maximum call-stack depth (frames, the bottom frame included).
/// Matches Lua 5.3's LUAI_MAXCCALLS.
pub const MAX_CALL_DEPTH: usize = 200;

// ===== Registry =====

/// Registry slot that holds the global table.
/// Matches Lua 5.3's LUA_RIDX_GLOBALS.
pub const LUA_RIDX_GLOBALS: i64 = 2;

// ===== Instructions =====

/// Number of list items flushed per SETLIST instruction.
/// Matches Lua 5.3's LFIELDS_PER_FLUSH.
pub const LFIELDS_PER_FLUSH: usize = 50;
