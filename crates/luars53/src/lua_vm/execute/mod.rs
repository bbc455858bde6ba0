/// Execution loop
///
/// Fetch-decode-execute over the current frame. The loop reads the frame
/// afresh for every instruction, so a tail call that replaces the current
/// frame simply continues in the new one.
mod call;

use tracing::trace;

use crate::lua_vm::{LuaError, LuaResult, LuaVM, OpCode};

impl LuaVM {
    /// Run the current (interpreted) frame until it executes RETURN
    pub(crate) fn lua_execute(&mut self) -> LuaResult<()> {
        loop {
            let frame = self.current_frame_mut();
            let instr = frame.fetch()?;

            let Some(op) = instr.get_opcode() else {
                return Err(LuaError::InvalidOpcode(instr.opcode_byte()));
            };
            trace!(
                target: "luars53::vm",
                depth = frame.depth,
                pc = frame.pc - 1,
                op = op.name(),
                "dispatch"
            );

            (op.info().handler)(self, instr)?;

            if op == OpCode::Return {
                return Ok(());
            }
        }
    }

    /// Ax of the EXTRAARG that must follow the current instruction
    pub(crate) fn fetch_extra_arg(&mut self) -> LuaResult<u32> {
        let next = self.current_frame_mut().fetch()?;
        match next.get_opcode() {
            Some(OpCode::ExtraArg) => Ok(next.get_ax()),
            _ => Err(self.error("EXTRAARG expected")),
        }
    }
}
