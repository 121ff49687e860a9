//! Linker: merges loaded modules into one executable image
//!
//! The merged function table is positional. Module `m`'s entries occupy
//! `[offsets.functions, offsets.functions + len)`, so a call operand `i`
//! executed inside `m` names merged entry `offsets.functions + i`. Constants
//! and code are concatenated the same way.
//!
//! Linking is all-or-nothing: the first duplicate, unresolved or mismatched
//! symbol aborts the link and no partial image is produced.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::instruction::Instruction;
use super::loader::assign_offsets;
use super::module::{Module, ModuleOffsets, Signature};
use crate::backend::types::ValueType;

/// Result type for linking
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors that can occur while linking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// No modules were given
    NoModules,
    /// Function defined by more than one module
    DuplicateDefinition {
        name: String,
        first: String,
        second: String,
    },
    /// Referenced function defined by no module
    UnresolvedSymbol { name: String, module: String },
    /// Reference and definition disagree on the signature
    SignatureMismatch {
        name: String,
        module: String,
        expected: Vec<ValueType>,
        found: Vec<ValueType>,
    },
    /// Module offsets do not match its position in the link order
    MisplacedModule(String),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::NoModules => write!(f, "No modules to link"),
            LinkError::DuplicateDefinition {
                name,
                first,
                second,
            } => write!(
                f,
                "Duplicate function \"{}\" defined in {} and {}",
                name, first, second
            ),
            LinkError::UnresolvedSymbol { name, module } => {
                write!(f, "Unresolved symbol \"{}\" referenced from {}", name, module)
            }
            LinkError::SignatureMismatch {
                name,
                module,
                expected,
                found,
            } => write!(
                f,
                "Signature mismatch for \"{}\" referenced from {}: defined as {:?}, used as {:?}",
                name, module, expected, found
            ),
            LinkError::MisplacedModule(name) => {
                write!(f, "Module {} has offsets inconsistent with link order", name)
            }
        }
    }
}

impl std::error::Error for LinkError {}

/// A resolved function-table slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedFunction {
    pub name: String,
    /// Absolute code address in the image
    pub address: usize,
    /// Index of the defining module
    pub module: usize,
    /// Frame size of the callee
    pub reservation: u16,
    /// Return type followed by parameter types, as defined
    pub parameter_types: Signature,
}

/// Where one module lives inside the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpan {
    pub name: String,
    pub offsets: ModuleOffsets,
    pub num_functions: usize,
    pub num_constants: usize,
    pub num_instructions: usize,
    pub entry_reservation: u16,
}

/// Fully linked program
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    functions: Vec<LinkedFunction>,
    constants: Vec<u64>,
    code: Vec<Instruction>,
    modules: Vec<ModuleSpan>,
}

impl Image {
    #[inline]
    pub fn functions(&self) -> &[LinkedFunction] {
        &self.functions
    }

    #[inline]
    pub fn constants(&self) -> &[u64] {
        &self.constants
    }

    #[inline]
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    #[inline]
    pub fn modules(&self) -> &[ModuleSpan] {
        &self.modules
    }

    #[inline]
    pub fn module(&self, index: usize) -> Option<&ModuleSpan> {
        self.modules.get(index)
    }

    /// Resolve a call operand executed inside `module`
    #[inline]
    pub fn function(&self, module: usize, index: u32) -> Option<&LinkedFunction> {
        let span = self.modules.get(module)?;
        if index as usize >= span.num_functions {
            return None;
        }
        self.functions.get(span.offsets.functions + index as usize)
    }

    /// Read a constant-pool word of `module`
    #[inline]
    pub fn constant(&self, module: usize, index: u16) -> Option<u64> {
        let span = self.modules.get(module)?;
        if index as usize >= span.num_constants {
            return None;
        }
        self.constants.get(span.offsets.constants + index as usize).copied()
    }

    /// Look up a defined function by name
    pub fn find_function(&self, name: &str) -> Option<&LinkedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Start address and frame size of the program (module 0's entry section)
    pub fn entry(&self) -> (usize, u16) {
        self.modules
            .first()
            .map_or((0, 0), |span| (span.offsets.code, span.entry_reservation))
    }
}

/// Link driver
#[derive(Debug, Default)]
pub struct Linker {
    /// Name -> index into the merged table of the defining slot
    definitions: HashMap<String, usize>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link modules whose offsets were assigned by the loading pipeline
    pub fn link(&mut self, modules: &[Module]) -> LinkResult<Image> {
        if modules.is_empty() {
            return Err(LinkError::NoModules);
        }
        self.definitions.clear();

        let mut functions = Vec::new();
        let mut constants = Vec::new();
        let mut code = Vec::new();
        let mut spans = Vec::with_capacity(modules.len());

        // Concatenate and collect definitions
        for (index, module) in modules.iter().enumerate() {
            let expected = ModuleOffsets {
                functions: functions.len(),
                constants: constants.len(),
                code: code.len(),
            };
            if module.offsets() != expected {
                return Err(LinkError::MisplacedModule(module.name().to_string()));
            }

            for entry in module.functions() {
                if !entry.external {
                    let slot = functions.len();
                    if let Some(&first) = self.definitions.get(&entry.name) {
                        let first: &LinkedFunction = &functions[first];
                        return Err(LinkError::DuplicateDefinition {
                            name: entry.name.clone(),
                            first: modules[first.module].name().to_string(),
                            second: module.name().to_string(),
                        });
                    }
                    self.definitions.insert(entry.name.clone(), slot);
                }
                // External slots are filled in during resolution
                let address = if entry.external {
                    usize::MAX
                } else {
                    expected.code + entry.address as usize
                };
                functions.push(LinkedFunction {
                    name: entry.name.clone(),
                    address,
                    module: index,
                    reservation: entry.reservation,
                    parameter_types: entry.parameter_types.clone(),
                });
            }
            constants.extend_from_slice(module.constants());
            code.extend_from_slice(module.code());

            spans.push(ModuleSpan {
                name: module.name().to_string(),
                offsets: expected,
                num_functions: module.functions().len(),
                num_constants: module.constants().len(),
                num_instructions: module.len(),
                entry_reservation: module.entry_reservation(),
            });
        }

        // Resolve references against the definitions
        for module in modules {
            let base = module.offsets().functions;
            for (local, entry) in module.references() {
                let &target = self.definitions.get(&entry.name).ok_or_else(|| {
                    LinkError::UnresolvedSymbol {
                        name: entry.name.clone(),
                        module: module.name().to_string(),
                    }
                })?;
                let resolved = functions[target].clone();
                check_signature(module.name(), &entry.parameter_types, &resolved)?;

                trace!(
                    target: "lilium::linker",
                    symbol = %entry.name,
                    from = module.name(),
                    address = resolved.address,
                    "resolved reference"
                );
                let slot = &mut functions[base + local];
                slot.address = resolved.address;
                slot.module = resolved.module;
                slot.reservation = resolved.reservation;
            }
        }

        debug!(
            target: "lilium::linker",
            modules = spans.len(),
            functions = functions.len(),
            constants = constants.len(),
            instructions = code.len(),
            "linked image"
        );
        Ok(Image {
            functions,
            constants,
            code,
            modules: spans,
        })
    }
}

fn check_signature(module: &str, reference: &[ValueType], definition: &LinkedFunction) -> LinkResult<()> {
    let defined = definition.parameter_types.as_slice();
    let agrees = reference.len() == defined.len()
        && reference.iter().zip(defined).all(|(r, d)| r.compatible(*d));
    if agrees {
        Ok(())
    } else {
        Err(LinkError::SignatureMismatch {
            name: definition.name.clone(),
            module: module.to_string(),
            expected: defined.to_vec(),
            found: reference.to_vec(),
        })
    }
}

/// Assign offsets in list order and link
pub fn link_modules(modules: Vec<Module>) -> LinkResult<Image> {
    Linker::new().link(&assign_offsets(modules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bytecode::instruction::MoveMode;
    use crate::backend::bytecode::module::FunctionEntry;
    use crate::backend::bytecode::opcodes::Opcode;

    fn provider() -> Module {
        let code = vec![
            Instruction::nullary(Opcode::Halt),
            Instruction::ternary(Opcode::AddI, 1, 2, 3),
            Instruction::mov(3, 0, MoveMode::Local),
            Instruction::nullary(Opcode::Return),
        ];
        let functions = vec![FunctionEntry::defined("add", 1, [ValueType::Int; 3])];
        Module::new("provider", functions, vec![], code)
    }

    fn consumer(name: &str, types: &[ValueType]) -> Module {
        let code = vec![
            Instruction::call(Opcode::CallE, 0),
            Instruction::mov(0, 0, MoveMode::FromWindow),
            Instruction::nullary(Opcode::Halt),
        ];
        let functions = vec![FunctionEntry::external(name, types.iter().copied())];
        Module::new("consumer", functions, vec![], code)
    }

    #[test]
    fn test_cross_module_resolution() {
        let image = link_modules(vec![consumer("add", &[ValueType::Int; 3]), provider()]).unwrap();

        // consumer's slot 0 now points at provider's add
        let add = image.function(0, 0).unwrap();
        assert_eq!(add.address, 3 + 1);
        assert_eq!(add.module, 1);
        assert_eq!(add.reservation, 4);
        assert_eq!(image.function(1, 0), Some(add));
        assert_eq!(image.entry(), (0, 1));
        assert_eq!(image.code().len(), 7);
    }

    #[test]
    fn test_definition_linked_before_reference() {
        let image = link_modules(vec![provider(), consumer("add", &[ValueType::Int; 3])]).unwrap();

        // consumer sits after provider's 4 instructions
        let add = image.function(1, 0).unwrap();
        assert_eq!(add.address, 1);
        assert_eq!(add.module, 0);
        assert_eq!(add.reservation, 4);
        assert_eq!(image.function(0, 0), Some(add));
        assert_eq!(image.module(1).unwrap().offsets.code, 4);
    }

    #[test]
    fn test_unresolved_symbol() {
        let err = link_modules(vec![consumer("missing", &[ValueType::Unknown])]).unwrap_err();
        assert_eq!(
            err,
            LinkError::UnresolvedSymbol {
                name: "missing".to_string(),
                module: "consumer".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_definition() {
        let err = link_modules(vec![provider(), provider()]).unwrap_err();
        assert!(matches!(err, LinkError::DuplicateDefinition { ref name, .. } if name == "add"));
    }

    #[test]
    fn test_signature_mismatch() {
        let err = link_modules(vec![
            consumer("add", &[ValueType::Unknown, ValueType::Double, ValueType::Int]),
            provider(),
        ])
        .unwrap_err();
        assert!(matches!(err, LinkError::SignatureMismatch { .. }));
    }

    #[test]
    fn test_no_modules() {
        assert_eq!(link_modules(vec![]), Err(LinkError::NoModules));
    }

    #[test]
    fn test_misplaced_module() {
        let misplaced = provider().with_offsets(ModuleOffsets {
            functions: 5,
            constants: 0,
            code: 0,
        });
        assert_eq!(
            Linker::new().link(&[misplaced]),
            Err(LinkError::MisplacedModule("provider".to_string()))
        );
    }

    #[test]
    fn test_out_of_range_lookups() {
        let image = link_modules(vec![provider()]).unwrap();
        assert!(image.function(0, 1).is_none());
        assert!(image.constant(0, 0).is_none());
        assert!(image.function(3, 0).is_none());
    }
}
