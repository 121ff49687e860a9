//! Code generation for attributed programs.
//!
//! Generation runs twice over the same tree. The forward pass writes nothing
//! and only counts instructions, which fixes every function address and
//! every backpatched jump target. The module header, function table and
//! constant pool are written between the passes, and the second pass emits
//! the instruction stream.
//!
//! Layout of the instruction stream:
//!
//! ```text
//! 0:   entry section   (top-level expressions, result in r0)
//!      halt
//!      function bodies (in source order, each ending with return)
//! ```

use tracing::{debug, trace};

use super::error::{CompileError, CompileResult};
use super::Compiler;
use crate::backend::ast::{BinaryOp, Expr, ExprKind, FuncDef, Global, Program};
use crate::backend::bytecode::instruction::{Instruction, MoveMode};
use crate::backend::bytecode::opcodes::Opcode;

impl Compiler {
    /// Run both generation passes and return the module file bytes
    pub(crate) fn generate_program(&mut self, program: &Program) -> CompileResult<Vec<u8>> {
        self.generator.set_disabled(true);
        self.context.code_counter = 0;
        self.generate_stream(program)?;
        let instructions = self.context.code_counter;

        self.generator.set_disabled(false);
        self.generator.module_header(
            self.context.constants.len() as u16,
            self.context.function_table.len() as u32,
            instructions,
        );
        self.generator.function_table(&self.context.function_table);
        self.generator.constant_pool(&self.context.constants);

        self.context.code_counter = 0;
        self.generate_stream(program)?;
        debug_assert_eq!(self.context.code_counter, instructions);

        debug!(
            target: "lilium::compiler",
            module = %self.name,
            functions = self.context.function_table.len(),
            constants = self.context.constants.len(),
            instructions,
            "generated module"
        );
        Ok(std::mem::take(&mut self.generator).into_bytes())
    }

    fn generate_stream(&mut self, program: &Program) -> CompileResult<()> {
        for expr in program.entry_expressions() {
            self.generate_expr(expr)?;
            if expr.reg != 0 {
                self.emit(Instruction::mov(expr.reg, 0, MoveMode::Local));
            }
        }
        self.emit(Instruction::nullary(Opcode::Halt));

        for global in &program.globals {
            if let Global::Def(def) = global {
                self.generate_func_def(def)?;
            }
        }
        Ok(())
    }

    #[inline]
    fn emit(&mut self, instr: Instruction) {
        self.generator.instruction(instr);
        self.context.code_counter += 1;
    }

    fn generate_func_def(&mut self, def: &FuncDef) -> CompileResult<()> {
        let index = self
            .context
            .lookup_function(&def.name)
            .ok_or_else(|| CompileError::UndefinedFunction(def.name.clone()))?;
        let address = self.context.code_counter;
        self.context.function_mut(index).address = address;
        trace!(target: "lilium::compiler::codegen", function = %def.name, address, "function body");

        self.generate_expr(&def.body)?;
        if !def.body.is_tail_call() && def.body.reg != 0 {
            self.emit(Instruction::mov(def.body.reg, 0, MoveMode::Local));
        }
        self.emit(Instruction::nullary(Opcode::Return));
        Ok(())
    }

    fn generate_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::Const { slot, .. } => {
                self.emit(Instruction::constant(Opcode::LoadI, expr.reg, *slot));
            }

            // Already resident in its binding register
            ExprKind::Var { .. } => {}

            ExprKind::Binary { op, lhs, rhs } => {
                self.generate_expr(lhs)?;
                self.generate_expr(rhs)?;
                self.emit(Instruction::ternary(binary_opcode(*op), lhs.reg, rhs.reg, expr.reg));
            }

            ExprKind::Cond {
                condition,
                then_branch,
                else_branch,
                targets,
            } => {
                self.generate_expr(condition)?;
                self.emit(Instruction::constant(
                    Opcode::JmpC,
                    condition.reg,
                    targets.else_entry_target,
                ));

                self.generate_branch(then_branch, expr.reg)?;
                self.emit(Instruction::constant(Opcode::Jmp, 0, targets.then_skip_target));

                let else_entry = self.context.code_counter;
                self.context.patch_constant(targets.else_entry_target, else_entry);
                self.generate_branch(else_branch, expr.reg)?;

                let join = self.context.code_counter;
                self.context.patch_constant(targets.then_skip_target, join);
            }

            ExprKind::Call { name, args } => self.generate_call(expr, name, args)?,
        }
        Ok(())
    }

    /// Generate one arm of a conditional and move its value into `result`
    fn generate_branch(&mut self, branch: &Expr, result: u8) -> CompileResult<()> {
        self.generate_expr(branch)?;
        if !branch.is_tail_call() && branch.reg != result {
            self.emit(Instruction::mov(branch.reg, result, MoveMode::Local));
        }
        Ok(())
    }

    /// Calls evaluate argument `i` into `R + 1 + i`, where `R` is the call's
    /// result register.
    ///
    /// A regular call copies the arguments into the outgoing window, calls,
    /// and fetches the callee's `r0` back into `R`. A tail call copies the
    /// arguments down into this frame's parameter registers and jumps. The
    /// copy runs in ascending order and every source lies above its
    /// destination, so no argument is overwritten before it is read.
    fn generate_call(&mut self, expr: &Expr, name: &str, args: &[Expr]) -> CompileResult<()> {
        let index = self
            .context
            .lookup_function(name)
            .ok_or_else(|| CompileError::UndefinedFunction(name.to_string()))?;
        let external = self.context.function(index).external;
        let result = expr.reg;

        for (i, arg) in args.iter().enumerate() {
            self.generate_expr(arg)?;
            let slot = result + 1 + i as u8;
            if arg.reg != slot {
                self.emit(Instruction::mov(arg.reg, slot, MoveMode::Local));
            }
        }

        let opcode = Opcode::call(external, expr.tail);
        if expr.tail {
            for i in 0..args.len() as u8 {
                self.emit(Instruction::mov(result + 1 + i, 1 + i, MoveMode::Local));
            }
            self.emit(Instruction::call(opcode, index as u32));
        } else {
            for i in 0..args.len() as u8 {
                self.emit(Instruction::mov(result + 1 + i, 1 + i, MoveMode::ToWindow));
            }
            self.emit(Instruction::call(opcode, index as u32));
            self.emit(Instruction::mov(0, result, MoveMode::FromWindow));
        }
        Ok(())
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::AddI,
        BinaryOp::Sub => Opcode::SubI,
        BinaryOp::Mul => Opcode::MulI,
        BinaryOp::Div => Opcode::DivI,
        BinaryOp::Gt => Opcode::Gt,
    }
}
