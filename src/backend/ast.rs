//! Abstract syntax tree consumed by the bytecode compiler
//!
//! Parents own their children. Attribution writes the result register, the
//! inferred type and any constant-pool slots back into the nodes, and code
//! generation reads them on both passes.

use smallvec::SmallVec;

use super::types::{Constant, ValueType};

/// Parameter types of a function, without the return type
pub type ParamTypes = SmallVec<[ValueType; 4]>;

/// Binary operators with a matching ternary opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
}

impl BinaryOp {
    /// Parse the operator symbol used in source
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            ">" => Some(Self::Gt),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Gt => ">",
        }
    }
}

/// Constant-pool slots a conditional patches with code addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BranchTargets {
    /// Address just past the else branch, taken by the `jmp` ending the then branch
    pub then_skip_target: u16,
    /// Address of the else branch, taken by `jmpc` when the condition is zero
    pub else_entry_target: u16,
}

/// An expression node plus its attribution results
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Inferred type, or the type annotation written on a variable reference
    pub ty: ValueType,
    /// Frame-relative register holding the value after evaluation
    pub reg: u8,
    /// Return position of the enclosing function
    pub tail: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Const {
        value: Constant,
        slot: u16,
    },
    Var {
        name: String,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cond {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        targets: BranchTargets,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    fn new(kind: ExprKind, ty: ValueType) -> Self {
        Expr {
            kind,
            ty,
            reg: 0,
            tail: false,
        }
    }

    pub fn constant(value: Constant) -> Self {
        Self::new(ExprKind::Const { value, slot: 0 }, value.value_type())
    }

    pub fn int(value: i64) -> Self {
        Self::constant(Constant::Int(value))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Var { name: name.into() }, ValueType::Unknown)
    }

    /// Variable reference that must have the given type
    pub fn typed_var(name: impl Into<String>, ty: ValueType) -> Self {
        Self::new(ExprKind::Var { name: name.into() }, ty)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ValueType::Unknown,
        )
    }

    pub fn cond(condition: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        Self::new(
            ExprKind::Cond {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
                targets: BranchTargets::default(),
            },
            ValueType::Unknown,
        )
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::Call {
                name: name.into(),
                args,
            },
            ValueType::Unknown,
        )
    }

    /// Mark this expression as being in return position.
    ///
    /// Conditionals pass the flag on to both branches; the condition itself
    /// is never a tail.
    pub fn set_tail(&mut self, tail: bool) {
        self.tail = tail;
        if let ExprKind::Cond {
            then_branch,
            else_branch,
            ..
        } = &mut self.kind
        {
            then_branch.set_tail(tail);
            else_branch.set_tail(tail);
        }
    }

    /// True for a call that will be emitted as a frame-reusing tail call
    pub fn is_tail_call(&self) -> bool {
        self.tail && matches!(self.kind, ExprKind::Call { .. })
    }
}

/// A named, typed function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: ValueType,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Param {
            name: name.into(),
            ty,
        }
    }
}

/// Function definition
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<Param>,
    /// Declared return type, `Unknown` to take the body's type
    pub return_type: ValueType,
    pub body: Expr,
}

impl FuncDef {
    /// Build a definition; the body is placed in return position.
    pub fn new(name: impl Into<String>, params: Vec<Param>, return_type: ValueType, body: Expr) -> Self {
        let mut body = body;
        body.set_tail(true);
        FuncDef {
            name: name.into(),
            params,
            return_type,
            body,
        }
    }

    pub fn param_types(&self) -> ParamTypes {
        self.params.iter().map(|p| p.ty).collect()
    }
}

/// Declaration of a function defined in another module
#[derive(Debug, Clone, PartialEq)]
pub struct ExternDecl {
    pub name: String,
    pub params: ParamTypes,
    pub return_type: ValueType,
}

/// Top-level item of a program
#[derive(Debug, Clone, PartialEq)]
pub enum Global {
    Def(FuncDef),
    Extern(ExternDecl),
    /// Expression evaluated by the module's entry section
    Expr(Expr),
}

/// A compilation unit: ordered list of globals
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub globals: Vec<Global>,
}

impl Program {
    pub fn new(globals: Vec<Global>) -> Self {
        Program { globals }
    }

    pub fn definitions(&self) -> impl Iterator<Item = &FuncDef> {
        self.globals.iter().filter_map(|g| match g {
            Global::Def(def) => Some(def),
            _ => None,
        })
    }

    pub fn entry_expressions(&self) -> impl Iterator<Item = &Expr> {
        self.globals.iter().filter_map(|g| match g {
            Global::Expr(expr) => Some(expr),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_body_is_tail() {
        let def = FuncDef::new("id", vec![Param::new("x", ValueType::Int)], ValueType::Unknown, Expr::var("x"));
        assert!(def.body.tail);
    }

    #[test]
    fn test_tail_flag_reaches_branches_only() {
        let body = Expr::cond(
            Expr::binary(BinaryOp::Gt, Expr::var("a"), Expr::int(0)),
            Expr::call("f", vec![Expr::var("a")]),
            Expr::int(1),
        );
        let def = FuncDef::new("g", vec![Param::new("a", ValueType::Int)], ValueType::Unknown, body);

        match &def.body.kind {
            ExprKind::Cond {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                assert!(!condition.tail);
                assert!(then_branch.is_tail_call());
                assert!(else_branch.tail);
                assert!(!else_branch.is_tail_call());
            }
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_operator_symbols() {
        for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div, BinaryOp::Gt] {
            assert_eq!(BinaryOp::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(BinaryOp::from_symbol("%"), None);
    }
}
