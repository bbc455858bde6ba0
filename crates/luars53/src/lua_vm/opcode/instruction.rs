/*----------------------------------------------------------------------
  Lua 5.3 Instruction Encoding

  All instructions are unsigned 32-bit words with the opcode in the low
  6 bits. The operand layout depends on the opcode's mode:

        3 3 2 2 2 2 2 2 2 2 2 2 1 1 1 1 1 1 1 1 1 1 0 0 0 0 0 0 0 0 0 0
        1 0 9 8 7 6 5 4 3 2 1 0 9 8 7 6 5 4 3 2 1 0 9 8 7 6 5 4 3 2 1 0
  iABC  |       B(9)      |       C(9)      |      A(8)     |  Op(6)    |
  iABx  |                Bx(18)             |      A(8)     |  Op(6)    |
  iAsBx |           sBx (signed)(18)        |      A(8)     |  Op(6)    |
  iAx   |                      Ax(26)                       |  Op(6)    |

  sBx is stored in excess-K form: the represented value is the written
  unsigned value minus MAXARG_sBx = (2^18 - 1) >> 1 = 2^17 - 1.

  The word itself does not say which layout applies. Resolve the opcode
  first and ask its descriptor (see `OpCode::mode`).
----------------------------------------------------------------------*/

use crate::lua_vm::OpCode;

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction(u32);

impl Instruction {
    #[inline(always)]
    pub const fn from_u32(value: u32) -> Self {
        Self(value)
    }

    #[inline(always)]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    // Size of each field
    pub const SIZE_OP: u32 = 6;
    pub const SIZE_A: u32 = 8;
    pub const SIZE_B: u32 = 9;
    pub const SIZE_C: u32 = 9;
    pub const SIZE_BX: u32 = Self::SIZE_C + Self::SIZE_B; // 18
    pub const SIZE_AX: u32 = Self::SIZE_BX + Self::SIZE_A; // 26

    // Position of each field
    pub const POS_OP: u32 = 0;
    pub const POS_A: u32 = Self::POS_OP + Self::SIZE_OP; // 6
    pub const POS_C: u32 = Self::POS_A + Self::SIZE_A; // 14
    pub const POS_B: u32 = Self::POS_C + Self::SIZE_C; // 23
    pub const POS_BX: u32 = Self::POS_C;
    pub const POS_AX: u32 = Self::POS_A;

    // Maximum values
    pub const MAX_OP: u32 = (1 << Self::SIZE_OP) - 1;
    pub const MAX_A: u32 = (1 << Self::SIZE_A) - 1;
    pub const MAX_B: u32 = (1 << Self::SIZE_B) - 1;
    pub const MAX_C: u32 = (1 << Self::SIZE_C) - 1;
    pub const MAX_BX: u32 = (1 << Self::SIZE_BX) - 1;
    pub const MAX_AX: u32 = (1 << Self::SIZE_AX) - 1;

    /// Bias of the signed sBx field (2^17 - 1).
    pub const OFFSET_SBX: i32 = (Self::MAX_BX >> 1) as i32;

    /// Bit that marks a B/C operand as a constant index (RK addressing).
    pub const BITRK: u32 = 1 << (Self::SIZE_B - 1);
    /// Largest constant index reachable through an RK operand.
    pub const MAX_INDEX_RK: u32 = Self::BITRK - 1;

    #[inline(always)]
    const fn mask1(n: u32, p: u32) -> u32 {
        (!((!0u32) << n)) << p
    }

    #[inline(always)]
    const fn mask0(n: u32, p: u32) -> u32 {
        !Self::mask1(n, p)
    }

    #[inline(always)]
    const fn get_arg(self, pos: u32, size: u32) -> u32 {
        (self.0 >> pos) & Self::mask1(size, 0)
    }

    #[inline(always)]
    fn set_arg(&mut self, v: u32, pos: u32, size: u32) {
        self.0 = (self.0 & Self::mask0(size, pos)) | ((v << pos) & Self::mask1(size, pos));
    }

    /// The raw 6-bit opcode field. Never fails.
    #[inline(always)]
    pub const fn opcode_byte(self) -> u8 {
        self.get_arg(Self::POS_OP, Self::SIZE_OP) as u8
    }

    /// The opcode, or `None` when the opcode field holds one of the unused
    /// values 47..=63.
    #[inline(always)]
    pub fn get_opcode(self) -> Option<OpCode> {
        OpCode::from_u8(self.opcode_byte())
    }

    #[inline(always)]
    pub fn set_opcode(&mut self, op: OpCode) {
        self.set_arg(op as u32, Self::POS_OP, Self::SIZE_OP);
    }

    #[inline(always)]
    pub const fn get_a(self) -> u32 {
        self.get_arg(Self::POS_A, Self::SIZE_A)
    }

    #[inline(always)]
    pub fn set_a(&mut self, v: u32) {
        self.set_arg(v, Self::POS_A, Self::SIZE_A);
    }

    #[inline(always)]
    pub const fn get_b(self) -> u32 {
        self.get_arg(Self::POS_B, Self::SIZE_B)
    }

    #[inline(always)]
    pub fn set_b(&mut self, v: u32) {
        self.set_arg(v, Self::POS_B, Self::SIZE_B);
    }

    #[inline(always)]
    pub const fn get_c(self) -> u32 {
        self.get_arg(Self::POS_C, Self::SIZE_C)
    }

    #[inline(always)]
    pub fn set_c(&mut self, v: u32) {
        self.set_arg(v, Self::POS_C, Self::SIZE_C);
    }

    #[inline(always)]
    pub const fn get_bx(self) -> u32 {
        self.get_arg(Self::POS_BX, Self::SIZE_BX)
    }

    #[inline(always)]
    pub fn set_bx(&mut self, v: u32) {
        self.set_arg(v, Self::POS_BX, Self::SIZE_BX);
    }

    #[inline(always)]
    pub const fn get_sbx(self) -> i32 {
        self.get_bx() as i32 - Self::OFFSET_SBX
    }

    #[inline(always)]
    pub fn set_sbx(&mut self, v: i32) {
        self.set_bx((v + Self::OFFSET_SBX) as u32);
    }

    #[inline(always)]
    pub const fn get_ax(self) -> u32 {
        self.get_arg(Self::POS_AX, Self::SIZE_AX)
    }

    #[inline(always)]
    pub fn set_ax(&mut self, v: u32) {
        self.set_arg(v, Self::POS_AX, Self::SIZE_AX);
    }

    /// (A, B, C) for iABC instructions.
    #[inline(always)]
    pub const fn abc(self) -> (u32, u32, u32) {
        (self.get_a(), self.get_b(), self.get_c())
    }

    /// (A, Bx) for iABx instructions.
    #[inline(always)]
    pub const fn abx(self) -> (u32, u32) {
        (self.get_a(), self.get_bx())
    }

    /// (A, sBx) for iAsBx instructions.
    #[inline(always)]
    pub const fn asbx(self) -> (u32, i32) {
        (self.get_a(), self.get_sbx())
    }

    // Instruction creation
    pub fn create_abc(op: OpCode, a: u32, b: u32, c: u32) -> Self {
        let mut i = Self(0);
        i.set_opcode(op);
        i.set_a(a);
        i.set_b(b);
        i.set_c(c);
        i
    }

    pub fn create_abx(op: OpCode, a: u32, bx: u32) -> Self {
        let mut i = Self(0);
        i.set_opcode(op);
        i.set_a(a);
        i.set_bx(bx);
        i
    }

    pub fn create_asbx(op: OpCode, a: u32, sbx: i32) -> Self {
        Self::create_abx(op, a, (sbx + Self::OFFSET_SBX) as u32)
    }

    pub fn create_ax(op: OpCode, ax: u32) -> Self {
        let mut i = Self(0);
        i.set_opcode(op);
        i.set_ax(ax);
        i
    }

    // Helper: RK(x) - constant when the high bit of the 9-bit field is set
    #[inline(always)]
    pub const fn is_k(x: u32) -> bool {
        x & Self::BITRK != 0
    }

    #[inline(always)]
    pub const fn rk_index(x: u32) -> u32 {
        x & !Self::BITRK
    }

    /// Encode constant index `k` as an RK operand.
    #[inline(always)]
    pub const fn rk_ask(k: u32) -> u32 {
        k | Self::BITRK
    }
}

impl From<u32> for Instruction {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Instruction> for u32 {
    fn from(value: Instruction) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lua_vm::OpMode;
    use proptest::prelude::*;

    #[test]
    fn test_instruction_abc() {
        let instr = Instruction::create_abc(OpCode::Move, 1, 2, 3);
        assert_eq!(instr.get_opcode(), Some(OpCode::Move));
        assert_eq!(instr.get_a(), 1);
        assert_eq!(instr.get_b(), 2);
        assert_eq!(instr.get_c(), 3);
    }

    #[test]
    fn test_instruction_abx() {
        let instr = Instruction::create_abx(OpCode::LoadK, 3, 100);
        assert_eq!(instr.get_opcode(), Some(OpCode::LoadK));
        assert_eq!(instr.get_a(), 3);
        assert_eq!(instr.get_bx(), 100);
    }

    #[test]
    fn test_instruction_asbx() {
        let instr = Instruction::create_asbx(OpCode::ForLoop, 2, -50);
        assert_eq!(instr.get_opcode(), Some(OpCode::ForLoop));
        assert_eq!(instr.get_a(), 2);
        assert_eq!(instr.get_sbx(), -50);
    }

    #[test]
    fn test_instruction_ax() {
        let instr = Instruction::create_ax(OpCode::ExtraArg, Instruction::MAX_AX);
        assert_eq!(instr.get_opcode(), Some(OpCode::ExtraArg));
        assert_eq!(instr.get_ax(), Instruction::MAX_AX);
    }

    #[test]
    fn test_bit_layout_detailed() {
        let instr = Instruction::create_abc(OpCode::Add, 10, 20, 30);
        let raw = instr.as_u32();
        assert_eq!(raw & 0x3F, OpCode::Add as u32); // bits 0-5
        assert_eq!((raw >> 6) & 0xFF, 10); // bits 6-13
        assert_eq!((raw >> 14) & 0x1FF, 30); // bits 14-22
        assert_eq!((raw >> 23) & 0x1FF, 20); // bits 23-31
    }

    #[test]
    fn test_known_luac_words() {
        // LOADK 0 0 and RETURN 0 1 as emitted by luac 5.3
        assert_eq!(Instruction::create_abx(OpCode::LoadK, 0, 0).as_u32(), 0x0000_0001);
        assert_eq!(Instruction::create_abc(OpCode::Return, 0, 1, 0).as_u32(), 0x0080_0026);
    }

    #[test]
    fn test_offset_constants() {
        assert_eq!(Instruction::OFFSET_SBX, 131071);
        assert_eq!(Instruction::BITRK, 256);
        assert_eq!(Instruction::MAX_INDEX_RK, 255);
    }

    #[test]
    fn test_rk_helpers() {
        assert!(!Instruction::is_k(255));
        assert!(Instruction::is_k(Instruction::rk_ask(7)));
        assert_eq!(Instruction::rk_index(Instruction::rk_ask(7)), 7);
    }

    #[test]
    fn test_set_fields_keep_neighbours() {
        let mut instr = Instruction::create_abc(OpCode::Move, 1, 2, 3);
        instr.set_a(10);
        instr.set_b(Instruction::MAX_B);
        assert_eq!(instr.get_a(), 10);
        assert_eq!(instr.get_b(), Instruction::MAX_B);
        assert_eq!(instr.get_c(), 3);
        assert_eq!(instr.get_opcode(), Some(OpCode::Move));
    }

    #[test]
    fn test_unused_opcode_values_decode_to_none() {
        for raw in 47u32..=63 {
            assert_eq!(Instruction::from_u32(raw).get_opcode(), None);
        }
    }

    proptest! {
        #[test]
        fn abc_fields_survive_encoding(op in 0u8..47, a in 0u32..=255, b in 0u32..=511, c in 0u32..=511) {
            let op = OpCode::from_u8(op).unwrap();
            let instr = Instruction::create_abc(op, a, b, c);
            prop_assert_eq!(instr.get_opcode(), Some(op));
            prop_assert_eq!(instr.abc(), (a, b, c));
        }

        #[test]
        fn bx_and_sbx_fields_survive_encoding(a in 0u32..=255, bx in 0u32..=Instruction::MAX_BX, sbx in -131071i32..=131072) {
            let instr = Instruction::create_abx(OpCode::Closure, a, bx);
            prop_assert_eq!(instr.abx(), (a, bx));
            let jump = Instruction::create_asbx(OpCode::Jmp, a, sbx);
            prop_assert_eq!(jump.asbx(), (a, sbx));
        }

        #[test]
        fn any_word_decodes_per_declared_mode(raw in any::<u32>()) {
            let instr = Instruction::from_u32(raw);
            prop_assert_eq!(instr.opcode_byte() as u32, raw & 0x3F);
            if let Some(op) = instr.get_opcode() {
                let rebuilt = match op.mode() {
                    OpMode::IABC => Instruction::create_abc(op, instr.get_a(), instr.get_b(), instr.get_c()),
                    OpMode::IABx => Instruction::create_abx(op, instr.get_a(), instr.get_bx()),
                    OpMode::IAsBx => Instruction::create_asbx(op, instr.get_a(), instr.get_sbx()),
                    OpMode::IAx => Instruction::create_ax(op, instr.get_ax()),
                };
                prop_assert_eq!(rebuilt.as_u32(), raw);
            }
        }
    }
}
