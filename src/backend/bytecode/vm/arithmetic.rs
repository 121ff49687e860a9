//! Arithmetic operations for the bytecode VM.
//!
//! All operands are frame-relative registers in `lhs, rhs, result` order.
//! Addition, subtraction and multiplication wrap on overflow.

use super::types::VmError;
use super::{BytecodeVM, OpResult};

impl BytecodeVM {
    #[inline]
    pub(super) fn op_addi(&mut self, lhs: u8, rhs: u8, dst: u8) {
        let value = self.reg(lhs).wrapping_add(self.reg(rhs));
        self.set_reg(dst, value);
    }

    #[inline]
    pub(super) fn op_subi(&mut self, lhs: u8, rhs: u8, dst: u8) {
        let value = self.reg(lhs).wrapping_sub(self.reg(rhs));
        self.set_reg(dst, value);
    }

    #[inline]
    pub(super) fn op_muli(&mut self, lhs: u8, rhs: u8, dst: u8) {
        let value = self.reg(lhs).wrapping_mul(self.reg(rhs));
        self.set_reg(dst, value);
    }

    pub(super) fn op_divi(&mut self, lhs: u8, rhs: u8, dst: u8) -> OpResult<()> {
        let divisor = self.reg(rhs);
        if divisor == 0 {
            return Err(VmError::DivisionByZero);
        }
        let value = self
            .reg(lhs)
            .checked_div(divisor)
            .ok_or(VmError::ArithmeticOverflow)?;
        self.set_reg(dst, value);
        Ok(())
    }

    #[inline]
    pub(super) fn op_gt(&mut self, lhs: u8, rhs: u8, dst: u8) {
        let value = (self.reg(lhs) > self.reg(rhs)) as i64;
        self.set_reg(dst, value);
    }
}
