//! Type definitions for the bytecode VM.
//!
//! This module contains the core types used throughout the VM:
//! - VmError: what went wrong while executing one instruction
//! - RuntimeError: a VmError plus the faulting address and opcode
//! - CallFrame: saved caller state on the call stack
//! - VmState: lifecycle of one execution
//! - VmConfig: VM configuration options

use serde::Deserialize;

use crate::backend::bytecode::opcodes::Opcode;

/// Registers a frame may address: 256 of its own plus 256 in the outgoing
/// window. Every active frame base keeps this many registers in range.
pub const MIN_REGISTERS: usize = 512;

/// Result of VM execution
pub type VmResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during VM execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Integer division with a zero divisor
    DivisionByZero,
    /// Arithmetic overflow (i64::MIN / -1)
    ArithmeticOverflow,
    /// Opcode byte outside the instruction set
    InvalidOpcode(u8),
    /// Call stack or register file exhausted
    StackOverflow,
    /// Constant-pool index outside the current module's pool
    InvalidConstant(u16),
    /// Function-table index outside the current module's table
    InvalidFunction(u32),
    /// `mov` with an unknown mode byte
    InvalidMoveMode(u8),
    /// Program counter outside the image
    PcOutOfBounds,
    /// Jump target does not fit the address space
    InvalidJumpTarget(u64),
    /// `return` with no caller to return to
    ReturnWithEmptyStack,
    /// Configured instruction budget exhausted
    StepLimit(u64),
    /// Stepping a VM that already faulted
    NotRunning,
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DivisionByZero => write!(f, "Division by zero"),
            Self::ArithmeticOverflow => write!(f, "Arithmetic overflow"),
            Self::InvalidOpcode(b) => write!(f, "Invalid opcode: 0x{:02x}", b),
            Self::StackOverflow => write!(f, "Stack overflow"),
            Self::InvalidConstant(i) => write!(f, "Invalid constant index: {}", i),
            Self::InvalidFunction(i) => write!(f, "Invalid function index: {}", i),
            Self::InvalidMoveMode(m) => write!(f, "Invalid move mode: {}", m),
            Self::PcOutOfBounds => write!(f, "Program counter out of bounds"),
            Self::InvalidJumpTarget(t) => write!(f, "Invalid jump target: {}", t),
            Self::ReturnWithEmptyStack => write!(f, "Return with empty call stack"),
            Self::StepLimit(n) => write!(f, "Step limit of {} instructions reached", n),
            Self::NotRunning => write!(f, "VM is not running"),
        }
    }
}

impl std::error::Error for VmError {}

/// A fatal execution error with its location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: VmError,
    /// Absolute code address of the faulting instruction
    pub address: usize,
    /// Raw opcode byte at that address, if any was read
    pub opcode: Option<u8>,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.opcode.and_then(Opcode::from_byte) {
            Some(op) => write!(f, "{} at {:04x} ({})", self.kind, self.address, op),
            None => match self.opcode {
                Some(byte) => write!(f, "{} at {:04x} (0x{:02x})", self.kind, self.address, byte),
                None => write!(f, "{} at {:04x}", self.kind, self.address),
            },
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Call frame on the call stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    /// Return program counter
    pub return_pc: usize,
    /// Caller's frame base in the register file
    pub base: usize,
    /// Caller's module
    pub module: usize,
    /// Caller's frame size
    pub reservation: u16,
}

/// Execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Running,
    Halted,
    Faulted,
}

/// Configuration for the VM
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Number of i64 registers
    pub register_file_size: usize,
    /// Maximum call stack depth
    pub max_call_stack: usize,
    /// Instruction budget, 0 for unlimited
    pub max_steps: u64,
    /// Enable per-instruction tracing
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            register_file_size: 65536,
            max_call_stack: 1024,
            max_steps: 0,
            trace: false,
        }
    }
}
