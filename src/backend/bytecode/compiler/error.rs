//! Compiler error types for the bytecode compiler.

use crate::backend::types::ValueType;

/// Compiler error types
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Source text could not be turned into an AST
    Syntax(String),
    /// Variable not bound in any enclosing scope
    UndefinedVariable(String),
    /// Variable referenced with a type other than the one it was bound with
    ConflictingType {
        name: String,
        bound: ValueType,
        used: ValueType,
    },
    /// Operand or branch types have no common type
    TypeMismatch {
        context: String,
        expected: ValueType,
        found: ValueType,
    },
    /// Call to a function missing from the function table
    UndefinedFunction(String),
    /// Name bound twice in the same scope frame
    SymbolAlreadyDefined(String),
    /// Function defined more than once in a module
    DuplicateDefinition(String),
    /// Call or definition disagrees with an earlier signature
    SignatureMismatch {
        name: String,
        expected: Vec<ValueType>,
        found: Vec<ValueType>,
    },
    /// Frame needs more than 256 registers
    TooManyRegisters(String),
    /// Constant pool exceeds 65535 entries
    TooManyConstants,
    /// Function table exceeds 24-bit indexing
    TooManyFunctions,
    /// Function takes more parameters than the table can describe
    TooManyParameters(String),
    /// Function name longer than 255 bytes
    NameTooLong(String),
}

fn type_list(types: &[ValueType]) -> String {
    let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
    format!("({})", names.join(" "))
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(msg) => write!(f, "Syntax error: {}", msg),
            Self::UndefinedVariable(name) => write!(f, "Variable {} undefined", name),
            Self::ConflictingType { name, bound, used } => write!(
                f,
                "Variable {} has been used with different types: bound as {}, used as {}",
                name, bound, used
            ),
            Self::TypeMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "Type mismatch in {}: expected {}, found {}",
                context, expected, found
            ),
            Self::UndefinedFunction(name) => write!(f, "Function {} undefined", name),
            Self::SymbolAlreadyDefined(name) => {
                write!(f, "Symbol \"{}\" is already defined", name)
            }
            Self::DuplicateDefinition(name) => {
                write!(f, "Function \"{}\" is defined more than once", name)
            }
            Self::SignatureMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "Signature mismatch for \"{}\": expected parameters {}, found {}",
                name,
                type_list(expected),
                type_list(found)
            ),
            Self::TooManyRegisters(scope) => {
                write!(f, "Too many registers in {} (max 256)", scope)
            }
            Self::TooManyConstants => write!(f, "Too many constants (max 65535)"),
            Self::TooManyFunctions => write!(f, "Too many functions (max 16777216)"),
            Self::TooManyParameters(name) => {
                write!(f, "Too many parameters for \"{}\" (max 254)", name)
            }
            Self::NameTooLong(name) => write!(f, "Function name too long (max 255 bytes): {}", name),
        }
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;
