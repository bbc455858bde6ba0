// `luac -l` style listings of prototypes
use std::fmt::Write;

use smol_str::SmolStr;

use super::{Chunk, LuaValue};
use crate::lua_vm::{Instruction, OpArgMode, OpCode, OpMode};

impl Chunk {
    /// Listing of this prototype followed by its nested prototypes
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.write_listing(&mut out);
        out
    }

    fn write_listing(&self, out: &mut String) {
        let source = self.source_name.as_deref().unwrap_or("=?");
        let source = source.strip_prefix(['@', '=']).unwrap_or(source);
        let kind = if self.linedefined == 0 { "main" } else { "function" };
        let _ = writeln!(
            out,
            "\n{} <{}:{},{}> ({} instruction{})",
            kind,
            source,
            self.linedefined,
            self.lastlinedefined,
            self.code.len(),
            plural(self.code.len())
        );
        let _ = writeln!(
            out,
            "{}{} param{}, {} slot{}, {} upvalue{}, {} local{}, {} constant{}, {} function{}",
            self.param_count,
            if self.is_vararg { "+" } else { "" },
            plural(self.param_count),
            self.max_stack_size,
            plural(self.max_stack_size),
            self.upvalue_descs.len(),
            plural(self.upvalue_descs.len()),
            self.locals.len(),
            plural(self.locals.len()),
            self.constants.len(),
            plural(self.constants.len()),
            self.child_protos.len(),
            plural(self.child_protos.len()),
        );

        for (pc, instr) in self.code.iter().enumerate() {
            self.write_instruction(out, pc, *instr);
        }
        for child in &self.child_protos {
            child.write_listing(out);
        }
    }

    fn write_instruction(&self, out: &mut String, pc: usize, instr: Instruction) {
        let _ = write!(out, "\t{}\t", pc + 1);
        match self.line_info.get(pc) {
            Some(line) if *line > 0 => {
                let _ = write!(out, "[{}]\t", line);
            }
            _ => out.push_str("[-]\t"),
        }

        let Some(op) = instr.get_opcode() else {
            let _ = writeln!(out, "<invalid opcode {}>", instr.opcode_byte());
            return;
        };
        let info = op.info();
        let _ = write!(out, "{:<9}\t", info.name);

        let a = instr.get_a();
        match info.mode {
            OpMode::IABC => {
                let _ = write!(out, "{}", a);
                for (mode, arg) in [(info.arg_b, instr.get_b()), (info.arg_c, instr.get_c())] {
                    match mode {
                        OpArgMode::N => {}
                        OpArgMode::K if Instruction::is_k(arg) => {
                            let _ = write!(out, " {}", -1 - Instruction::rk_index(arg) as i64);
                        }
                        _ => {
                            let _ = write!(out, " {}", arg);
                        }
                    }
                }
            }
            OpMode::IABx => {
                let _ = write!(out, "{}", a);
                match info.arg_b {
                    OpArgMode::K => {
                        let _ = write!(out, " {}", -1 - instr.get_bx() as i64);
                    }
                    OpArgMode::U => {
                        let _ = write!(out, " {}", instr.get_bx());
                    }
                    _ => {}
                }
            }
            OpMode::IAsBx => {
                let _ = write!(out, "{} {}", a, instr.get_sbx());
            }
            OpMode::IAx => {
                let _ = write!(out, "{}", -1 - instr.get_ax() as i64);
            }
        }

        self.write_comment(out, pc, op, instr);
        out.push('\n');
    }

    fn write_comment(&self, out: &mut String, pc: usize, op: OpCode, instr: Instruction) {
        match op {
            OpCode::LoadK => self.write_constant(out, instr.get_bx()),
            OpCode::GetUpval | OpCode::SetUpval => {
                let name = self
                    .upvalue_names
                    .get(instr.get_b() as usize)
                    .map(SmolStr::as_str)
                    .unwrap_or("-");
                let _ = write!(out, "\t; {}", name);
            }
            OpCode::Jmp | OpCode::ForLoop | OpCode::ForPrep | OpCode::TForLoop => {
                let target = pc as i64 + instr.get_sbx() as i64 + 2;
                let _ = write!(out, "\t; to {}", target);
            }
            OpCode::Closure => {
                let _ = write!(out, "\t; function [{}]", instr.get_bx());
            }
            _ => {
                let info = op.info();
                for (mode, arg) in [(info.arg_b, instr.get_b()), (info.arg_c, instr.get_c())] {
                    if mode == OpArgMode::K && Instruction::is_k(arg) {
                        self.write_constant(out, Instruction::rk_index(arg));
                    }
                }
            }
        }
    }

    fn write_constant(&self, out: &mut String, index: u32) {
        match self.constants.get(index as usize) {
            Some(LuaValue::String(s)) => {
                let _ = write!(out, "\t; {:?}", s);
            }
            Some(k) => {
                let _ = write!(out, "\t; {}", k);
            }
            None => out.push_str("\t; ?"),
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
