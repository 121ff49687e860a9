//! Attribution pass: registers, types and function-table entries.
//!
//! Register discipline inside one frame:
//! - a constant, binary operation or call takes the next free register as
//!   its result, and its operands are attributed above it;
//! - a conditional's condition and both branches start at the conditional's
//!   result register;
//! - argument `i` of a call whose result register is `R` is attributed
//!   starting at `R + 1 + i`.
//!
//! Values still pending at any point are held in registers below the
//! allocator, so a callee frame placed past the caller's reservation never
//! overlaps live caller state.

use tracing::trace;

use super::error::{CompileError, CompileResult};
use super::scope::Symbol;
use super::Compiler;
use crate::backend::ast::{Expr, ExprKind, ExternDecl, FuncDef, Global, Program};
use crate::backend::bytecode::module::{FunctionEntry, Signature};
use crate::backend::types::ValueType;

/// Name used for the entry section in diagnostics
pub(crate) const ENTRY_SCOPE: &str = "<entry>";

impl Compiler {
    /// Attribute every global in order
    pub(crate) fn attribute_program(&mut self, program: &mut Program) -> CompileResult<()> {
        let mut entry_reservation = 0;
        for global in &mut program.globals {
            self.context.next_reg = 0;
            match global {
                Global::Def(def) => self.attribute_func_def(def)?,
                Global::Extern(decl) => self.attribute_extern(decl)?,
                Global::Expr(expr) => {
                    self.context.begin_frame(ENTRY_SCOPE, 0);
                    self.attribute_expr(expr)?;
                    self.context.touch_register(0)?;
                    entry_reservation = entry_reservation.max(self.context.reservation());
                }
            }
        }
        self.context.entry_reservation = entry_reservation;
        Ok(())
    }

    pub(crate) fn attribute_expr(&mut self, expr: &mut Expr) -> CompileResult<()> {
        match &mut expr.kind {
            ExprKind::Const { value, slot } => {
                expr.reg = self.context.alloc_register()?;
                *slot = self.context.add_constant(value.to_word())?;
                expr.ty = value.value_type();
            }

            ExprKind::Var { name } => {
                let symbol = self
                    .scopes
                    .lookup(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                if expr.ty.is_known() && expr.ty != symbol.ty {
                    return Err(CompileError::ConflictingType {
                        name: name.clone(),
                        bound: symbol.ty,
                        used: expr.ty,
                    });
                }
                expr.reg = symbol.reg;
                expr.ty = symbol.ty;
            }

            ExprKind::Binary { op, lhs, rhs } => {
                expr.reg = self.context.alloc_register()?;
                self.attribute_expr(lhs)?;
                self.attribute_expr(rhs)?;
                expr.ty = lhs.ty.promote(rhs.ty).ok_or_else(|| CompileError::TypeMismatch {
                    context: format!("operator {}", op.symbol()),
                    expected: lhs.ty,
                    found: rhs.ty,
                })?;
            }

            ExprKind::Cond {
                condition,
                then_branch,
                else_branch,
                targets,
            } => {
                let result = self.context.next_reg;
                targets.then_skip_target = self.context.add_constant(0)?;
                targets.else_entry_target = self.context.add_constant(0)?;

                self.attribute_expr(condition)?;
                if condition.ty.is_known() && condition.ty != ValueType::Int {
                    return Err(CompileError::TypeMismatch {
                        context: "condition".to_string(),
                        expected: ValueType::Int,
                        found: condition.ty,
                    });
                }

                self.context.next_reg = result;
                self.attribute_expr(then_branch)?;
                self.context.next_reg = result;
                self.attribute_expr(else_branch)?;

                expr.reg = self.context.touch_register(result)?;
                self.context.next_reg = result + 1;
                expr.ty = then_branch
                    .ty
                    .promote(else_branch.ty)
                    .ok_or_else(|| CompileError::TypeMismatch {
                        context: "conditional branches".to_string(),
                        expected: then_branch.ty,
                        found: else_branch.ty,
                    })?;
            }

            ExprKind::Call { name, args } => {
                let result = self.context.alloc_register()?;
                for (i, arg) in args.iter_mut().enumerate() {
                    let slot = result as usize + 1 + i;
                    self.context.next_reg = slot;
                    self.attribute_expr(arg)?;
                    self.context.touch_register(slot)?;
                }
                self.context.next_reg = result as usize + 1;

                let arg_types: Vec<ValueType> = args.iter().map(|a| a.ty).collect();
                expr.reg = result;
                expr.ty = self.resolve_call(name, &arg_types)?;
            }
        }
        Ok(())
    }

    /// Check a call against the function table, creating an external entry
    /// for an unknown callee. Returns the call's type.
    fn resolve_call(&mut self, name: &str, arg_types: &[ValueType]) -> CompileResult<ValueType> {
        match self.context.lookup_function(name) {
            None => {
                trace!(target: "lilium::compiler::attribute", function = name, "forward reference");
                let types = std::iter::once(ValueType::Unknown).chain(arg_types.iter().copied());
                self.context
                    .insert_function(FunctionEntry::external(name, types))?;
                Ok(ValueType::Unknown)
            }
            Some(index) => {
                let entry = self.context.function_mut(index);
                check_params(name, entry, arg_types)?;
                if entry.external {
                    refine_params(entry, arg_types);
                }
                Ok(entry.return_type())
            }
        }
    }

    pub(crate) fn attribute_func_def(&mut self, def: &mut FuncDef) -> CompileResult<()> {
        if def.params.len() > u8::MAX as usize - 1 {
            return Err(CompileError::TooManyParameters(def.name.clone()));
        }
        let index = self.register_definition(def)?;

        self.scopes.push_frame();
        let body = self.attribute_function_body(def, index);
        self.scopes.pop_frame();
        body
    }

    fn attribute_function_body(&mut self, def: &mut FuncDef, index: usize) -> CompileResult<()> {
        for (i, param) in def.params.iter().enumerate() {
            self.scopes.declare(
                &param.name,
                Symbol {
                    reg: (i + 1) as u8,
                    ty: param.ty,
                },
            )?;
        }

        self.context.begin_frame(&def.name, def.params.len() + 1);
        self.attribute_expr(&mut def.body)?;

        let reservation = self.context.reservation();
        let entry = self.context.function_mut(index);
        entry.reservation = reservation;

        let declared = entry.return_type();
        if declared.is_known() {
            if !declared.compatible(def.body.ty) {
                return Err(CompileError::TypeMismatch {
                    context: format!("return value of {}", def.name),
                    expected: declared,
                    found: def.body.ty,
                });
            }
        } else {
            entry.parameter_types[0] = def.body.ty;
        }
        trace!(
            target: "lilium::compiler::attribute",
            function = %def.name,
            reservation,
            return_type = %entry.return_type(),
            "attributed definition"
        );
        Ok(())
    }

    /// Enter a definition in the function table before its body is
    /// attributed, so recursive calls see the real signature.
    fn register_definition(&mut self, def: &FuncDef) -> CompileResult<usize> {
        let signature: Signature = std::iter::once(def.return_type)
            .chain(def.params.iter().map(|p| p.ty))
            .collect();

        match self.context.lookup_function(&def.name) {
            None => self
                .context
                .insert_function(FunctionEntry::defined(&def.name, 0, signature)),
            Some(index) => {
                let entry = self.context.function_mut(index);
                if !entry.external {
                    return Err(CompileError::DuplicateDefinition(def.name.clone()));
                }
                check_signature(&def.name, entry, &signature)?;
                for (slot, ty) in entry.parameter_types.iter_mut().zip(signature.iter()) {
                    if ty.is_known() {
                        *slot = *ty;
                    }
                }
                entry.external = false;
                entry.address = 0;
                Ok(index)
            }
        }
    }

    pub(crate) fn attribute_extern(&mut self, decl: &ExternDecl) -> CompileResult<()> {
        if decl.params.len() > u8::MAX as usize - 1 {
            return Err(CompileError::TooManyParameters(decl.name.clone()));
        }
        let signature: Signature = std::iter::once(decl.return_type)
            .chain(decl.params.iter().copied())
            .collect();

        match self.context.lookup_function(&decl.name) {
            None => {
                self.context
                    .insert_function(FunctionEntry::external(&decl.name, signature))?;
            }
            Some(index) => {
                let entry = self.context.function_mut(index);
                check_signature(&decl.name, entry, &signature)?;
                for (slot, ty) in entry.parameter_types.iter_mut().zip(signature.iter()) {
                    if !slot.is_known() {
                        *slot = *ty;
                    }
                }
            }
        }
        Ok(())
    }
}

fn mismatch(name: &str, expected: &[ValueType], found: &[ValueType]) -> CompileError {
    CompileError::SignatureMismatch {
        name: name.to_string(),
        expected: expected.to_vec(),
        found: found.to_vec(),
    }
}

/// Arity and parameter-type agreement of a call with a table entry
fn check_params(name: &str, entry: &FunctionEntry, arg_types: &[ValueType]) -> CompileResult<()> {
    let params = entry.params();
    let agrees = params.len() == arg_types.len()
        && params.iter().zip(arg_types).all(|(p, a)| p.compatible(*a));
    if agrees {
        Ok(())
    } else {
        Err(mismatch(name, params, arg_types))
    }
}

/// Full agreement of a signature (return type first) with a table entry
fn check_signature(name: &str, entry: &FunctionEntry, signature: &[ValueType]) -> CompileResult<()> {
    check_params(name, entry, &signature[1..])?;
    if entry.return_type().compatible(signature[0]) {
        Ok(())
    } else {
        Err(CompileError::TypeMismatch {
            context: format!("return type of {}", name),
            expected: entry.return_type(),
            found: signature[0],
        })
    }
}

/// Fill unknown parameter types of an external entry from a call site
fn refine_params(entry: &mut FunctionEntry, arg_types: &[ValueType]) {
    for (slot, ty) in entry.parameter_types[1..].iter_mut().zip(arg_types) {
        if !slot.is_known() {
            *slot = *ty;
        }
    }
}
