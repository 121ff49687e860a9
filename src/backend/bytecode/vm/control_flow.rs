//! Control flow operations for the bytecode VM.
//!
//! This module contains methods for constant loads, jumps, register moves,
//! calls and returns. Jump targets and constants are resolved through the
//! current module's span of the image.

use tracing::trace;

use super::types::{CallFrame, VmError, MIN_REGISTERS};
use super::{BytecodeVM, OpResult};
use crate::backend::bytecode::instruction::MoveMode;

impl BytecodeVM {
    // === Constants ===

    pub(super) fn op_loadi(&mut self, reg: u8, index: u16) -> OpResult<()> {
        let word = self
            .image
            .constant(self.module, index)
            .ok_or(VmError::InvalidConstant(index))?;
        self.set_reg(reg, word as i64);
        Ok(())
    }

    // === Jump Operations ===

    /// Absolute address of a module-local jump target held in the pool
    fn jump_target(&self, index: u16) -> OpResult<usize> {
        let word = self
            .image
            .constant(self.module, index)
            .ok_or(VmError::InvalidConstant(index))?;
        let offset = self
            .image
            .module(self.module)
            .map_or(0, |span| span.offsets.code);
        usize::try_from(word)
            .ok()
            .and_then(|local| local.checked_add(offset))
            .ok_or(VmError::InvalidJumpTarget(word))
    }

    pub(super) fn op_jump(&mut self, index: u16) -> OpResult<()> {
        self.pc = self.jump_target(index)?;
        Ok(())
    }

    pub(super) fn op_jump_if_zero(&mut self, reg: u8, index: u16) -> OpResult<()> {
        let target = self.jump_target(index)?;
        if self.reg(reg) == 0 {
            self.pc = target;
        }
        Ok(())
    }

    // === Register Moves ===

    pub(super) fn op_mov(&mut self, src: u8, dst: u8, mode: u8) -> OpResult<()> {
        match MoveMode::from_byte(mode).ok_or(VmError::InvalidMoveMode(mode))? {
            MoveMode::Local => {
                let value = self.reg(src);
                self.set_reg(dst, value);
            }
            MoveMode::ToWindow => {
                let value = self.reg(src);
                let slot = self.window(dst);
                self.registers[slot] = value;
            }
            MoveMode::FromWindow => {
                let value = self.registers[self.window(src)];
                self.set_reg(dst, value);
            }
        }
        Ok(())
    }

    // === Call Operations ===

    /// Resolve a call operand to (address, module, reservation)
    fn callee(&self, index: u32) -> OpResult<(usize, usize, u16)> {
        self.image
            .function(self.module, index)
            .map(|f| (f.address, f.module, f.reservation))
            .ok_or(VmError::InvalidFunction(index))
    }

    /// Push a frame and enter the callee at `base + reservation`
    pub(super) fn op_call(&mut self, index: u32, external: bool) -> OpResult<()> {
        let (address, module, reservation) = self.callee(index)?;

        let new_base = self.base + self.reservation as usize;
        if self.call_stack.len() >= self.config.max_call_stack
            || new_base + MIN_REGISTERS > self.registers.len()
        {
            return Err(VmError::StackOverflow);
        }

        self.call_stack.push(CallFrame {
            return_pc: self.pc,
            base: self.base,
            module: self.module,
            reservation: self.reservation,
        });
        self.peak_depth = self.peak_depth.max(self.call_stack.len());

        if self.config.trace {
            trace!(
                target: "lilium::vm::call",
                index,
                address,
                base = new_base,
                depth = self.call_stack.len(),
                "call"
            );
        }

        self.base = new_base;
        self.reservation = reservation;
        if external {
            self.module = module;
        }
        self.pc = address;
        Ok(())
    }

    /// Enter the callee in the current frame; the call stack is untouched
    pub(super) fn op_tail_call(&mut self, index: u32, external: bool) -> OpResult<()> {
        let (address, module, reservation) = self.callee(index)?;

        if self.config.trace {
            trace!(
                target: "lilium::vm::call",
                index,
                address,
                base = self.base,
                depth = self.call_stack.len(),
                "tail call"
            );
        }

        self.reservation = reservation;
        if external {
            self.module = module;
        }
        self.pc = address;
        Ok(())
    }

    pub(super) fn op_return(&mut self) -> OpResult<()> {
        let frame = self.call_stack.pop().ok_or(VmError::ReturnWithEmptyStack)?;
        self.pc = frame.return_pc;
        self.base = frame.base;
        self.module = frame.module;
        self.reservation = frame.reservation;
        Ok(())
    }
}
