mod instruction;

pub use instruction::Instruction;

use crate::lua_vm::dispatcher::*;
use crate::lua_vm::{LuaResult, LuaVM};

/// Instruction format modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    IABC,
    IABx,
    IAsBx,
    IAx,
}

/// How an instruction uses its B or C operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpArgMode {
    /// argument is not used
    N,
    /// argument is used as a plain unsigned value
    U,
    /// argument is a register or a jump offset
    R,
    /// argument is a constant or register (RK addressing)
    K,
}

/// Complete Lua 5.3 opcode set (47 opcodes), numbered as `luac` 5.3 emits them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Move = 0, // R(A) := R(B)
    LoadK,    // R(A) := Kst(Bx)
    LoadKX,   // R(A) := Kst(extra arg)
    LoadBool, // R(A) := (Bool)B; if (C) pc++
    LoadNil,  // R(A), R(A+1), ..., R(A+B) := nil
    GetUpval, // R(A) := UpValue[B]
    GetTabUp, // R(A) := UpValue[B][RK(C)]
    GetTable, // R(A) := R(B)[RK(C)]
    SetTabUp, // UpValue[A][RK(B)] := RK(C)
    SetUpval, // UpValue[B] := R(A)
    SetTable, // R(A)[RK(B)] := RK(C)
    NewTable, // R(A) := {} (size = B,C)
    Self_,    // R(A+1) := R(B); R(A) := R(B)[RK(C)]
    Add,      // R(A) := RK(B) + RK(C)
    Sub,      // R(A) := RK(B) - RK(C)
    Mul,      // R(A) := RK(B) * RK(C)
    Mod,      // R(A) := RK(B) % RK(C)
    Pow,      // R(A) := RK(B) ^ RK(C)
    Div,      // R(A) := RK(B) / RK(C)
    IDiv,     // R(A) := RK(B) // RK(C)
    BAnd,     // R(A) := RK(B) & RK(C)
    BOr,      // R(A) := RK(B) | RK(C)
    BXor,     // R(A) := RK(B) ~ RK(C)
    Shl,      // R(A) := RK(B) << RK(C)
    Shr,      // R(A) := RK(B) >> RK(C)
    Unm,      // R(A) := -R(B)
    BNot,     // R(A) := ~R(B)
    Not,      // R(A) := not R(B)
    Len,      // R(A) := length of R(B)
    Concat,   // R(A) := R(B).. ... ..R(C)
    Jmp,      // pc+=sBx; if (A) close all upvalues >= R(A - 1)
    Eq,       // if ((RK(B) == RK(C)) ~= A) then pc++
    Lt,       // if ((RK(B) <  RK(C)) ~= A) then pc++
    Le,       // if ((RK(B) <= RK(C)) ~= A) then pc++
    Test,     // if not (R(A) <=> C) then pc++
    TestSet,  // if (R(B) <=> C) then R(A) := R(B) else pc++
    Call,     // R(A), ... ,R(A+C-2) := R(A)(R(A+1), ... ,R(A+B-1))
    TailCall, // return R(A)(R(A+1), ... ,R(A+B-1))
    Return,   // return R(A), ... ,R(A+B-2)
    ForLoop,  // R(A)+=R(A+2); if R(A) <?= R(A+1) then { pc+=sBx; R(A+3)=R(A) }
    ForPrep,  // R(A)-=R(A+2); pc+=sBx
    TForCall, // R(A+3), ... ,R(A+2+C) := R(A)(R(A+1), R(A+2))
    TForLoop, // if R(A+1) ~= nil then { R(A)=R(A+1); pc += sBx }
    SetList,  // R(A)[(C-1)*FPF+i] := R(A+i), 1 <= i <= B
    Closure,  // R(A) := closure(KPROTO[Bx])
    Vararg,   // R(A), R(A+1), ..., R(A+B-2) = vararg
    ExtraArg, // extra (larger) argument for previous opcode
}

impl OpCode {
    pub const COUNT: usize = 47;

    pub fn from_u8(byte: u8) -> Option<Self> {
        OPCODES.get(byte as usize).map(|info| info.op)
    }

    /// The static descriptor for this opcode.
    #[inline(always)]
    pub fn info(self) -> &'static OpCodeInfo {
        &OPCODES[self as usize]
    }

    #[inline(always)]
    pub fn mode(self) -> OpMode {
        self.info().mode
    }

    #[inline(always)]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Comparison and boolean tests; the next instruction is always a jump.
    #[inline(always)]
    pub fn is_test(self) -> bool {
        self.info().test
    }
}

/// Handler signature shared by every opcode
pub type OpHandler = fn(&mut LuaVM, Instruction) -> LuaResult<()>;

/// Static description of one opcode
///
/// `sets_a` is metadata for listings and tracers; execution never consults it.
#[derive(Clone, Copy)]
pub struct OpCodeInfo {
    pub op: OpCode,
    pub name: &'static str,
    pub test: bool,
    pub sets_a: bool,
    pub arg_b: OpArgMode,
    pub arg_c: OpArgMode,
    pub mode: OpMode,
    pub handler: OpHandler,
}

impl std::fmt::Debug for OpCodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpCodeInfo")
            .field("name", &self.name)
            .field("test", &self.test)
            .field("sets_a", &self.sets_a)
            .field("arg_b", &self.arg_b)
            .field("arg_c", &self.arg_c)
            .field("mode", &self.mode)
            .finish()
    }
}

#[allow(clippy::too_many_arguments)]
const fn op(
    op: OpCode,
    name: &'static str,
    test: bool,
    sets_a: bool,
    arg_b: OpArgMode,
    arg_c: OpArgMode,
    mode: OpMode,
    handler: OpHandler,
) -> OpCodeInfo {
    OpCodeInfo {
        op,
        name,
        test,
        sets_a,
        arg_b,
        arg_c,
        mode,
        handler,
    }
}

use OpArgMode::{K, N, R, U};
use OpMode::{IABC, IABx, IAsBx, IAx};

/// Opcode table, indexed by opcode number
#[rustfmt::skip]
pub static OPCODES: [OpCodeInfo; OpCode::COUNT] = [
    //  opcode              name        T      A      B  C  mode   handler
    op(OpCode::Move,     "MOVE",     false, true,  R, N, IABC,  exec_move),
    op(OpCode::LoadK,    "LOADK",    false, true,  K, N, IABx,  exec_loadk),
    op(OpCode::LoadKX,   "LOADKX",   false, true,  N, N, IABx,  exec_loadkx),
    op(OpCode::LoadBool, "LOADBOOL", false, true,  U, U, IABC,  exec_loadbool),
    op(OpCode::LoadNil,  "LOADNIL",  false, true,  U, N, IABC,  exec_loadnil),
    op(OpCode::GetUpval, "GETUPVAL", false, true,  U, N, IABC,  exec_getupval),
    op(OpCode::GetTabUp, "GETTABUP", false, true,  U, K, IABC,  exec_gettabup),
    op(OpCode::GetTable, "GETTABLE", false, true,  R, K, IABC,  exec_gettable),
    op(OpCode::SetTabUp, "SETTABUP", false, false, K, K, IABC,  exec_settabup),
    op(OpCode::SetUpval, "SETUPVAL", false, false, U, N, IABC,  exec_setupval),
    op(OpCode::SetTable, "SETTABLE", false, false, K, K, IABC,  exec_settable),
    op(OpCode::NewTable, "NEWTABLE", false, true,  U, U, IABC,  exec_newtable),
    op(OpCode::Self_,    "SELF",     false, true,  R, K, IABC,  exec_self),
    op(OpCode::Add,      "ADD",      false, true,  K, K, IABC,  exec_add),
    op(OpCode::Sub,      "SUB",      false, true,  K, K, IABC,  exec_sub),
    op(OpCode::Mul,      "MUL",      false, true,  K, K, IABC,  exec_mul),
    op(OpCode::Mod,      "MOD",      false, true,  K, K, IABC,  exec_mod),
    op(OpCode::Pow,      "POW",      false, true,  K, K, IABC,  exec_pow),
    op(OpCode::Div,      "DIV",      false, true,  K, K, IABC,  exec_div),
    op(OpCode::IDiv,     "IDIV",     false, true,  K, K, IABC,  exec_idiv),
    op(OpCode::BAnd,     "BAND",     false, true,  K, K, IABC,  exec_band),
    op(OpCode::BOr,      "BOR",      false, true,  K, K, IABC,  exec_bor),
    op(OpCode::BXor,     "BXOR",     false, true,  K, K, IABC,  exec_bxor),
    op(OpCode::Shl,      "SHL",      false, true,  K, K, IABC,  exec_shl),
    op(OpCode::Shr,      "SHR",      false, true,  K, K, IABC,  exec_shr),
    op(OpCode::Unm,      "UNM",      false, true,  R, N, IABC,  exec_unm),
    op(OpCode::BNot,     "BNOT",     false, true,  R, N, IABC,  exec_bnot),
    op(OpCode::Not,      "NOT",      false, true,  R, N, IABC,  exec_not),
    op(OpCode::Len,      "LEN",      false, true,  R, N, IABC,  exec_len),
    op(OpCode::Concat,   "CONCAT",   false, true,  R, R, IABC,  exec_concat),
    op(OpCode::Jmp,      "JMP",      false, false, R, N, IAsBx, exec_jmp),
    op(OpCode::Eq,       "EQ",       true,  false, K, K, IABC,  exec_eq),
    op(OpCode::Lt,       "LT",       true,  false, K, K, IABC,  exec_lt),
    op(OpCode::Le,       "LE",       true,  false, K, K, IABC,  exec_le),
    op(OpCode::Test,     "TEST",     true,  false, N, U, IABC,  exec_test),
    op(OpCode::TestSet,  "TESTSET",  true,  true,  R, U, IABC,  exec_testset),
    op(OpCode::Call,     "CALL",     false, true,  U, U, IABC,  exec_call),
    op(OpCode::TailCall, "TAILCALL", false, true,  U, U, IABC,  exec_tailcall),
    op(OpCode::Return,   "RETURN",   false, false, U, N, IABC,  exec_return),
    op(OpCode::ForLoop,  "FORLOOP",  false, true,  R, N, IAsBx, exec_forloop),
    op(OpCode::ForPrep,  "FORPREP",  false, true,  R, N, IAsBx, exec_forprep),
    op(OpCode::TForCall, "TFORCALL", false, false, N, U, IABC,  exec_tforcall),
    op(OpCode::TForLoop, "TFORLOOP", false, true,  R, N, IAsBx, exec_tforloop),
    op(OpCode::SetList,  "SETLIST",  false, false, U, U, IABC,  exec_setlist),
    op(OpCode::Closure,  "CLOSURE",  false, true,  U, N, IABx,  exec_closure),
    op(OpCode::Vararg,   "VARARG",   false, true,  U, N, IABC,  exec_vararg),
    op(OpCode::ExtraArg, "EXTRAARG", false, false, U, U, IAx,   exec_extraarg),
];
