/// Lilium - register-machine compiler backend, linker and VM
///
/// This library compiles a small typed expression language to a compact
/// register bytecode, links separately compiled modules, and runs the result
/// on a register VM.
///
/// # Architecture
///
/// 1. **Lexical Analysis & S-expression Parsing** (`sexpr` module)
///    - Tokenizes input text: parens, symbols, integer and float literals
///    - Handles `;` line comments
///
/// 2. **Lowering** (`backend::compile`)
///    - Recognises `def`, `extern`, `if`, the binary operators and calls
///    - Produces the AST (`backend::ast`)
///
/// 3. **Bytecode** (`backend::bytecode`)
///    - Attribution assigns registers, types, constant slots and the function table
///    - Code generation writes a module file in two passes
///    - The loader and linker combine module files into one image
///    - The VM executes the image
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use lilium::backend::bytecode::{compile_source, link_modules, BytecodeVM};
///
/// let source = r#"
///     (def fact (n) (if (> n 1) ((* n (fact (- n 1)))) 1))
///     (fact 5)
/// "#;
///
/// let module = compile_source("fact", source).unwrap().to_module().unwrap();
/// let image = link_modules(vec![module]).unwrap();
/// let mut vm = BytecodeVM::new(Arc::new(image));
/// assert_eq!(vm.run().unwrap(), 120);
/// ```
///
/// # Language
///
/// - **Definitions**: `(def name (a (b double)) [type] body)`, parameters default to `int`
/// - **Declarations**: `(extern name (int int) int)` for functions in other modules
/// - **Control Flow**: `(if cond then else)`, taken when `cond` is non-zero
/// - **Arithmetic**: `+`, `-`, `*`, `/` and the comparison `>`
/// - **Entry**: any other top-level expression; the last one is the program result

pub mod backend;
pub mod config;
pub mod sexpr;

pub use backend::bytecode::{
    compile_source, link_modules, BytecodeVM, CompileError, CompiledModule, Image, LinkError, LoadError,
    Module, RuntimeError, VmConfig,
};
pub use backend::{parse_program, Program};
pub use config::{Config, ConfigError};
pub use sexpr::{Lexer, Parser, SExpr, Token};
