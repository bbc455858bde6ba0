use crate::lua_vm::{LuaCallFrame, LuaError, LuaResult};

/// Strictly LIFO stack of activation frames.
///
/// Never empty: the bottom frame is a native frame owned by the host, which
/// is where `load` leaves the main closure and where host calls start.
pub struct CallStack {
    pub(crate) frames: Vec<LuaCallFrame>,
}

impl CallStack {
    pub fn new(bottom: LuaCallFrame) -> Self {
        CallStack {
            frames: vec![bottom],
        }
    }

    /// Number of live frames, the bottom frame included
    #[inline(always)]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline(always)]
    pub fn current(&self) -> &LuaCallFrame {
        let idx = self.frames.len() - 1;
        &self.frames[idx]
    }

    #[inline(always)]
    pub fn current_mut(&mut self) -> &mut LuaCallFrame {
        let idx = self.frames.len() - 1;
        &mut self.frames[idx]
    }

    pub fn push(&mut self, frame: LuaCallFrame) {
        self.frames.push(frame);
    }

    /// Pop the current frame, closing its open upvalues
    pub fn pop(&mut self) -> LuaResult<LuaCallFrame> {
        if self.frames.len() <= 1 {
            return Err(LuaError::StackUnderflow);
        }
        let mut frame = self.frames.pop().ok_or(LuaError::StackUnderflow)?;
        frame.close_upvalues(0);
        Ok(frame)
    }

    /// Swap the current frame for `frame` (tail calls), closing the old
    /// frame's open upvalues
    pub fn replace_current(&mut self, frame: LuaCallFrame) {
        let current = self.current_mut();
        current.close_upvalues(0);
        *current = frame;
    }

    /// Drop frames down to `depth`, closing their upvalues
    pub fn truncate(&mut self, depth: usize) {
        while self.frames.len() > depth.max(1) {
            let _ = self.pop();
        }
    }
}
