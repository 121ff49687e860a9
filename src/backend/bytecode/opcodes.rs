//! Bytecode opcodes for the Lilium register VM
//!
//! Every instruction is a fixed 4-byte record: one opcode byte followed by
//! three operand bytes. How the operand bytes are read depends on the
//! opcode's [`OperandShape`]. Opcode values are contiguous from zero so the
//! interpreter can decode through a flat lookup table.

use std::fmt;

/// Number of defined opcodes
pub const OP_COUNT: usize = 16;

/// Bytecode opcode enumeration
///
/// Values are part of the on-disk module format and must never be reordered.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No operation
    Nop = 0,

    // === Calls ===
    /// Call a function defined in the current module
    CallI = 1,
    /// Call a function defined in another module, switching module context
    CallE = 2,
    /// Tail call into the current module, reusing the frame
    LCallI = 3,
    /// Tail call into another module, reusing the frame
    LCallE = 4,
    /// Pop the call stack and resume the caller
    Return = 5,

    // === Integer arithmetic (lhs, rhs, result) ===
    /// result = lhs + rhs
    AddI = 6,
    /// result = lhs - rhs
    SubI = 7,
    /// result = lhs * rhs
    MulI = 8,
    /// result = lhs / rhs, faults on zero divisor
    DivI = 9,
    /// result = (lhs > rhs) as 1 / 0
    Gt = 10,

    // === Constants and control flow ===
    /// Load constant-pool word into a register
    LoadI = 11,
    /// Jump to the constant-pool address when the register is zero
    JmpC = 12,
    /// Jump to the constant-pool address
    Jmp = 13,
    /// Copy a register, optionally across the outgoing call window
    Mov = 14,
    /// Stop execution
    Halt = 15,
}

/// How the three operand bytes of an instruction are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandShape {
    /// No operands
    Nullary,
    /// Three registers: lhs, rhs, result
    Ternary,
    /// Register plus a 16-bit little-endian constant-pool index
    Const,
    /// 24-bit little-endian function-table index
    Call,
    /// Source register, destination register, move mode
    Binary,
}

impl Opcode {
    /// Convert byte to opcode, returns None if invalid
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        OPCODE_TABLE.get(byte as usize).copied().flatten()
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Operand layout of this opcode
    #[inline]
    pub fn shape(self) -> OperandShape {
        SHAPE_TABLE[self as usize]
    }

    /// Get the mnemonic name for this opcode
    #[inline]
    pub fn mnemonic(self) -> &'static str {
        MNEMONIC_TABLE[self as usize]
    }

    /// Check if this opcode is a jump instruction
    #[inline]
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::JmpC)
    }

    /// Check if this opcode is a call instruction
    #[inline]
    pub fn is_call(self) -> bool {
        matches!(self, Self::CallI | Self::CallE | Self::LCallI | Self::LCallE)
    }

    /// Check if this call reuses the current frame
    #[inline]
    pub fn is_tail_call(self) -> bool {
        matches!(self, Self::LCallI | Self::LCallE)
    }

    /// Check if this call crosses into another module
    #[inline]
    pub fn is_external_call(self) -> bool {
        matches!(self, Self::CallE | Self::LCallE)
    }

    /// Check if this opcode can terminate execution of a function
    #[inline]
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Return | Self::Halt)
    }

    /// Select the call opcode for a callee location and call position
    pub fn call(external: bool, tail: bool) -> Self {
        match (external, tail) {
            (false, false) => Self::CallI,
            (true, false) => Self::CallE,
            (false, true) => Self::LCallI,
            (true, true) => Self::LCallE,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Lookup table for byte -> Opcode conversion
static OPCODE_TABLE: [Option<Opcode>; 256] = {
    let mut table = [None; 256];

    table[0] = Some(Opcode::Nop);
    table[1] = Some(Opcode::CallI);
    table[2] = Some(Opcode::CallE);
    table[3] = Some(Opcode::LCallI);
    table[4] = Some(Opcode::LCallE);
    table[5] = Some(Opcode::Return);
    table[6] = Some(Opcode::AddI);
    table[7] = Some(Opcode::SubI);
    table[8] = Some(Opcode::MulI);
    table[9] = Some(Opcode::DivI);
    table[10] = Some(Opcode::Gt);
    table[11] = Some(Opcode::LoadI);
    table[12] = Some(Opcode::JmpC);
    table[13] = Some(Opcode::Jmp);
    table[14] = Some(Opcode::Mov);
    table[15] = Some(Opcode::Halt);

    table
};

/// Opcode -> mnemonic, indexed by opcode value
pub static MNEMONIC_TABLE: [&str; OP_COUNT] = [
    "nop", "calli", "calle", "lcalli", "lcalle", "return", "addi", "subi", "muli", "divi", "gt",
    "loadi", "jmpc", "jmp", "mov", "halt",
];

/// Opcode -> operand shape, indexed by opcode value
pub static SHAPE_TABLE: [OperandShape; OP_COUNT] = [
    OperandShape::Nullary, // nop
    OperandShape::Call,    // calli
    OperandShape::Call,    // calle
    OperandShape::Call,    // lcalli
    OperandShape::Call,    // lcalle
    OperandShape::Nullary, // return
    OperandShape::Ternary, // addi
    OperandShape::Ternary, // subi
    OperandShape::Ternary, // muli
    OperandShape::Ternary, // divi
    OperandShape::Ternary, // gt
    OperandShape::Const,   // loadi
    OperandShape::Const,   // jmpc
    OperandShape::Const,   // jmp
    OperandShape::Binary,  // mov
    OperandShape::Nullary, // halt
];
