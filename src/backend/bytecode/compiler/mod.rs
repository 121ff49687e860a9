//! Bytecode compiler for Lilium programs
//!
//! Compilation is split in two phases over the same AST:
//! - attribution assigns registers, infers types, fills the constant pool
//!   and builds the function table;
//! - code generation walks the attributed tree twice, first to fix code
//!   addresses and then to emit the module file.
//!
//! Functions referenced before (or without) a definition enter the function
//! table as external entries. A later definition in the same module turns
//! the entry into a local one; anything still external is left for the
//! linker.

mod attribute;
mod codegen;
mod context;
mod error;
mod scope;

#[cfg(test)]
mod tests;

use tracing::debug;

use super::generator::Generator;
use super::loader::{decode_module, LoadResult};
use super::module::{FunctionEntry, Module};
use crate::backend::ast::Program;
use crate::backend::compile::parse_program;

pub use context::{AttributionContext, FRAME_REGISTERS};
pub use error::{CompileError, CompileResult};
pub use scope::{ScopeStack, Symbol};

/// Bytecode compiler for one compilation unit
#[derive(Debug, Default)]
pub struct Compiler {
    /// Tables shared by attribution and both generation passes
    pub(crate) context: AttributionContext,
    /// Lexical scopes of the function being attributed
    pub(crate) scopes: ScopeStack,
    pub(crate) generator: Generator,
    /// Module name, used in diagnostics
    name: String,
}

impl Compiler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attribute and generate a whole program
    pub fn compile(mut self, mut program: Program) -> CompileResult<CompiledModule> {
        self.attribute_program(&mut program)?;
        debug!(
            target: "lilium::compiler",
            module = %self.name,
            entry_reservation = self.context.entry_reservation,
            "attribution complete"
        );
        let bytes = self.generate_program(&program)?;

        Ok(CompiledModule {
            name: self.name,
            bytes,
            functions: self.context.function_table,
            constants: self.context.constants,
            entry_reservation: self.context.entry_reservation,
        })
    }
}

/// Result of compiling one unit: the module file plus the tables it was
/// built from.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModule {
    name: String,
    bytes: Vec<u8>,
    functions: Vec<FunctionEntry>,
    constants: Vec<u64>,
    entry_reservation: u16,
}

impl CompiledModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module file contents
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn functions(&self) -> &[FunctionEntry] {
        &self.functions
    }

    pub fn constants(&self) -> &[u64] {
        &self.constants
    }

    /// Entry-section frame size computed during attribution
    pub fn entry_reservation(&self) -> u16 {
        self.entry_reservation
    }

    /// Decode the emitted bytes back into a loadable module
    pub fn to_module(&self) -> LoadResult<Module> {
        decode_module(&self.name, &self.bytes)
    }
}

/// Compile an AST into a module
pub fn compile_program(name: &str, program: Program) -> CompileResult<CompiledModule> {
    Compiler::new(name).compile(program)
}

/// Parse and compile source text into a module
pub fn compile_source(name: &str, source: &str) -> CompileResult<CompiledModule> {
    let program = parse_program(source)?;
    compile_program(name, program)
}
