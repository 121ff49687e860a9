//! Bytecode Virtual Machine
//!
//! The VM executes a linked [`Image`] on a flat file of `i64` registers.
//! Each call frame owns the registers `[base, base + reservation)`; register
//! 0 of a frame carries its return value and registers `1..=n` its
//! parameters. The registers just past the reservation form the outgoing
//! window, which becomes the callee's frame on the next call.
//!
//! This module is organized into submodules by functionality:
//! - `types`: Core type definitions (VmError, VmConfig, CallFrame, etc.)
//! - `arithmetic`: Integer arithmetic and comparison
//! - `control_flow`: Constants, jumps, moves, calls and returns

use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::trace;

use super::instruction::Instruction;
use super::linker::Image;
use super::opcodes::Opcode;

// === Submodules ===

mod arithmetic;
mod control_flow;
mod types;


// === Re-exports ===

pub use types::{CallFrame, RuntimeError, VmConfig, VmError, VmResult, VmState, MIN_REGISTERS};

/// Result of executing one instruction
type OpResult<T> = Result<T, VmError>;

// === BytecodeVM Struct ===

/// The Bytecode Virtual Machine
#[derive(Debug)]
pub struct BytecodeVM {
    /// Register file shared by all frames
    pub(super) registers: Vec<i64>,

    /// Saved caller state
    pub(super) call_stack: Vec<CallFrame>,

    /// Absolute address of the next instruction
    pub(super) pc: usize,

    /// First register of the current frame
    pub(super) base: usize,

    /// Size of the current frame
    pub(super) reservation: u16,

    /// Module whose constants and function table are in effect
    pub(super) module: usize,

    pub(super) state: VmState,

    /// Instructions executed since the last reset
    pub(super) steps: u64,

    /// Deepest call stack seen since the last reset
    pub(super) peak_depth: usize,

    /// Linked program
    pub(super) image: Arc<Image>,

    /// VM configuration
    pub(super) config: VmConfig,
}

impl BytecodeVM {
    // === Constructors ===

    /// Create a new VM for the given image
    pub fn new(image: Arc<Image>) -> Self {
        Self::with_config(image, VmConfig::default())
    }

    /// Create a new VM with custom configuration.
    ///
    /// The register file is never smaller than [`MIN_REGISTERS`].
    pub fn with_config(image: Arc<Image>, config: VmConfig) -> Self {
        let size = config.register_file_size.max(MIN_REGISTERS);
        let mut vm = Self {
            registers: vec![0; size],
            call_stack: Vec::with_capacity(64),
            pc: 0,
            base: 0,
            reservation: 0,
            module: 0,
            state: VmState::Running,
            steps: 0,
            peak_depth: 0,
            image,
            config,
        };
        vm.reset();
        vm
    }

    /// Rewind to the program entry point, clearing all registers
    pub fn reset(&mut self) {
        let (entry, reservation) = self.image.entry();
        self.registers.fill(0);
        self.call_stack.clear();
        self.pc = entry;
        self.base = 0;
        self.reservation = reservation;
        self.module = 0;
        self.state = VmState::Running;
        self.steps = 0;
        self.peak_depth = 0;
    }

    // === Accessors ===

    #[inline]
    pub fn state(&self) -> VmState {
        self.state
    }

    /// The program result: absolute register 0
    #[inline]
    pub fn result(&self) -> i64 {
        self.registers[0]
    }

    /// Current call stack depth
    #[inline]
    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    #[inline]
    pub fn peak_call_depth(&self) -> usize {
        self.peak_depth
    }

    /// Instructions executed since the last reset
    #[inline]
    pub fn executed_instructions(&self) -> u64 {
        self.steps
    }

    #[inline]
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Read a register of the current frame
    #[inline]
    pub fn register(&self, reg: u8) -> i64 {
        self.reg(reg)
    }

    // === Execution Methods ===

    /// Run the VM until `halt`, returning the result register
    pub fn run(&mut self) -> VmResult<i64> {
        loop {
            match self.step()? {
                ControlFlow::Continue(()) => continue,
                ControlFlow::Break(result) => return Ok(result),
            }
        }
    }

    /// Execute a single instruction
    pub fn step(&mut self) -> VmResult<ControlFlow<i64>> {
        match self.state {
            VmState::Running => {}
            VmState::Halted => return Ok(ControlFlow::Break(self.result())),
            VmState::Faulted => return Err(self.fault(VmError::NotRunning, None)),
        }

        if self.config.max_steps != 0 && self.steps >= self.config.max_steps {
            return Err(self.fault(VmError::StepLimit(self.config.max_steps), None));
        }

        // Fetch and decode
        let Some(&instr) = self.image.code().get(self.pc) else {
            return Err(self.fault(VmError::PcOutOfBounds, None));
        };
        let Some(opcode) = instr.decode() else {
            return Err(self.fault(VmError::InvalidOpcode(instr.opcode), Some(instr.opcode)));
        };

        // Trace if enabled
        if self.config.trace {
            trace!(
                target: "lilium::vm::step",
                pc = self.pc,
                base = self.base,
                module = self.module,
                instr = %instr,
                depth = self.call_stack.len()
            );
        }

        let address = self.pc;
        self.pc += 1;
        self.steps += 1;

        match self.execute(opcode, instr) {
            Ok(flow) => Ok(flow),
            Err(kind) => {
                self.pc = address;
                Err(self.fault(kind, Some(instr.opcode)))
            }
        }
    }

    /// Dispatch one decoded instruction
    #[inline]
    fn execute(&mut self, opcode: Opcode, instr: Instruction) -> OpResult<ControlFlow<i64>> {
        let [a, b, c] = instr.operands;
        match opcode {
            Opcode::Nop => {}

            // Calls
            Opcode::CallI => self.op_call(instr.call_index(), false)?,
            Opcode::CallE => self.op_call(instr.call_index(), true)?,
            Opcode::LCallI => self.op_tail_call(instr.call_index(), false)?,
            Opcode::LCallE => self.op_tail_call(instr.call_index(), true)?,
            Opcode::Return => self.op_return()?,

            // Arithmetic
            Opcode::AddI => self.op_addi(a, b, c),
            Opcode::SubI => self.op_subi(a, b, c),
            Opcode::MulI => self.op_muli(a, b, c),
            Opcode::DivI => self.op_divi(a, b, c)?,
            Opcode::Gt => self.op_gt(a, b, c),

            // Constants and control flow
            Opcode::LoadI => self.op_loadi(a, instr.const_index())?,
            Opcode::JmpC => self.op_jump_if_zero(a, instr.const_index())?,
            Opcode::Jmp => self.op_jump(instr.const_index())?,
            Opcode::Mov => self.op_mov(a, b, c)?,
            Opcode::Halt => {
                self.state = VmState::Halted;
                return Ok(ControlFlow::Break(self.result()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Move to the faulted state and attach the current location
    fn fault(&mut self, kind: VmError, opcode: Option<u8>) -> RuntimeError {
        self.state = VmState::Faulted;
        RuntimeError {
            kind,
            address: self.pc,
            opcode,
        }
    }

    // === Register Helpers ===

    #[inline]
    pub(super) fn reg(&self, reg: u8) -> i64 {
        self.registers[self.base + reg as usize]
    }

    #[inline]
    pub(super) fn set_reg(&mut self, reg: u8, value: i64) {
        self.registers[self.base + reg as usize] = value;
    }

    /// Absolute index of a register in the outgoing window
    #[inline]
    pub(super) fn window(&self, reg: u8) -> usize {
        self.base + self.reservation as usize + reg as usize
    }
}

/// Run an image to completion with the given config
pub fn run_image(image: Arc<Image>, config: VmConfig) -> VmResult<i64> {
    BytecodeVM::with_config(image, config).run()
}
