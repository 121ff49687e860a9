// Backend for Lilium compilation and execution
//
// - `compile`: Lilium text → Program (AST)
// - `bytecode`: attribution, code generation, loading, linking and the VM
// - `ast`, `types`: the tree and value types shared by both

pub mod ast;
pub mod bytecode;
pub mod compile;
pub mod types;

pub use ast::{BinaryOp, Expr, ExprKind, ExternDecl, FuncDef, Global, Param, Program};
pub use compile::parse_program;
pub use types::{Constant, ValueType};
