//! Fixed-width instruction record
//!
//! ```text
//! byte 0      bytes 1..4
//! opcode      operands (shape depends on opcode)
//!
//! ternary:    lhs  rhs  result
//! const:      reg  idx_lo idx_hi
//! call:       idx_lo idx_mid idx_hi
//! binary:     src  dst  mode
//! ```

use std::fmt;

use super::opcodes::{Opcode, OperandShape};

/// Size of one encoded instruction in bytes
pub const INSTRUCTION_SIZE: usize = 4;

/// Largest function-table index a call operand can hold
pub const MAX_CALL_INDEX: u32 = 0x00FF_FFFF;

/// One 4-byte instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Instruction {
    pub opcode: u8,
    pub operands: [u8; 3],
}

/// Addressing mode of a `mov`.
///
/// The outgoing window starts at `base + reservation` of the executing
/// function, which is where the next callee's frame will begin.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveMode {
    /// Frame register to frame register
    Local = 0,
    /// Frame register into the outgoing window (argument passing)
    ToWindow = 1,
    /// Outgoing window into a frame register (result retrieval)
    FromWindow = 2,
}

impl MoveMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Local),
            1 => Some(Self::ToWindow),
            2 => Some(Self::FromWindow),
            _ => None,
        }
    }
}

impl Instruction {
    #[inline]
    pub fn new(opcode: Opcode, operands: [u8; 3]) -> Self {
        Instruction {
            opcode: opcode.to_byte(),
            operands,
        }
    }

    pub fn nullary(opcode: Opcode) -> Self {
        Self::new(opcode, [0; 3])
    }

    pub fn ternary(opcode: Opcode, lhs: u8, rhs: u8, result: u8) -> Self {
        Self::new(opcode, [lhs, rhs, result])
    }

    /// Register plus constant-pool index (`loadi`, `jmp`, `jmpc`)
    pub fn constant(opcode: Opcode, reg: u8, index: u16) -> Self {
        let [lo, hi] = index.to_le_bytes();
        Self::new(opcode, [reg, lo, hi])
    }

    /// Call through a 24-bit function-table index
    pub fn call(opcode: Opcode, index: u32) -> Self {
        debug_assert!(index <= MAX_CALL_INDEX);
        let [a, b, c, _] = index.to_le_bytes();
        Self::new(opcode, [a, b, c])
    }

    pub fn mov(src: u8, dst: u8, mode: MoveMode) -> Self {
        Self::new(Opcode::Mov, [src, dst, mode as u8])
    }

    #[inline]
    pub fn decode(&self) -> Option<Opcode> {
        Opcode::from_byte(self.opcode)
    }

    /// Constant-pool index of a const-shaped instruction
    #[inline]
    pub fn const_index(&self) -> u16 {
        u16::from_le_bytes([self.operands[1], self.operands[2]])
    }

    /// Function-table index of a call-shaped instruction
    #[inline]
    pub fn call_index(&self) -> u32 {
        u32::from_le_bytes([self.operands[0], self.operands[1], self.operands[2], 0])
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; INSTRUCTION_SIZE] {
        [self.opcode, self.operands[0], self.operands[1], self.operands[2]]
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; INSTRUCTION_SIZE]) -> Self {
        Instruction {
            opcode: bytes[0],
            operands: [bytes[1], bytes[2], bytes[3]],
        }
    }

    /// Highest frame-local register this instruction touches.
    ///
    /// Window-side operands of `mov` belong to the next frame and are not
    /// counted.
    pub fn max_local_register(&self) -> Option<u8> {
        let op = self.decode()?;
        let [a, b, c] = self.operands;
        match op.shape() {
            OperandShape::Ternary => Some(a.max(b).max(c)),
            OperandShape::Const if op == Opcode::LoadI || op == Opcode::JmpC => Some(a),
            OperandShape::Binary => match MoveMode::from_byte(c)? {
                MoveMode::Local => Some(a.max(b)),
                MoveMode::ToWindow => Some(a),
                MoveMode::FromWindow => Some(b),
            },
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(op) = self.decode() else {
            return write!(f, "<invalid 0x{:02x}>", self.opcode);
        };
        let [a, b, c] = self.operands;
        match op.shape() {
            OperandShape::Nullary => write!(f, "{}", op),
            OperandShape::Ternary => write!(f, "{} r{}, r{}, r{}", op, a, b, c),
            OperandShape::Const if op == Opcode::Jmp => write!(f, "{} #{}", op, self.const_index()),
            OperandShape::Const => write!(f, "{} r{}, #{}", op, a, self.const_index()),
            OperandShape::Call => write!(f, "{} @{}", op, self.call_index()),
            OperandShape::Binary => match MoveMode::from_byte(c) {
                Some(MoveMode::Local) => write!(f, "{} r{}, r{}", op, a, b),
                Some(MoveMode::ToWindow) => write!(f, "{} r{}, w{}", op, a, b),
                Some(MoveMode::FromWindow) => write!(f, "{} w{}, r{}", op, a, b),
                None => write!(f, "{} r{}, r{}, ?{}", op, a, b, c),
            },
        }
    }
}
