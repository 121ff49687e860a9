//! In-memory bytecode module
//!
//! A [`Module`] is one compilation unit as it exists between the loader and
//! the linker: its own function table (external entries included), its own
//! constant pool and its own instruction stream, plus the offsets at which
//! those sections land in the linked image.

use smallvec::SmallVec;

use super::generator::{Generator, EXTERNAL_ADDRESS};
use super::instruction::Instruction;
use super::opcodes::Opcode;
use crate::backend::types::ValueType;

/// Return type followed by parameter types
pub type Signature = SmallVec<[ValueType; 5]>;

/// One function-table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub name: String,
    /// Module-local code address; meaningless while `external` is set
    pub address: u64,
    /// Referenced or declared here but defined elsewhere
    pub external: bool,
    /// Index 0 is the return type
    pub parameter_types: Signature,
    /// Frame size in registers
    pub reservation: u16,
}

impl FunctionEntry {
    pub fn defined(name: impl Into<String>, address: u64, types: impl IntoIterator<Item = ValueType>) -> Self {
        FunctionEntry {
            name: name.into(),
            address,
            external: false,
            parameter_types: types.into_iter().collect(),
            reservation: 0,
        }
    }

    pub fn external(name: impl Into<String>, types: impl IntoIterator<Item = ValueType>) -> Self {
        FunctionEntry {
            name: name.into(),
            address: EXTERNAL_ADDRESS,
            external: true,
            parameter_types: types.into_iter().collect(),
            reservation: 0,
        }
    }

    #[inline]
    pub fn return_type(&self) -> ValueType {
        self.parameter_types.first().copied().unwrap_or_default()
    }

    /// Parameter types without the return type
    #[inline]
    pub fn params(&self) -> &[ValueType] {
        self.parameter_types.get(1..).unwrap_or(&[])
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params().len()
    }
}

/// Where a module's sections start inside the linked image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleOffsets {
    pub functions: usize,
    pub constants: usize,
    pub code: usize,
}

/// A loaded, not yet linked, module
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    name: String,
    functions: Vec<FunctionEntry>,
    constants: Vec<u64>,
    code: Vec<Instruction>,
    offsets: ModuleOffsets,
    entry_reservation: u16,
}

impl Module {
    /// Create a module and derive frame reservations from its code
    pub fn new(
        name: impl Into<String>,
        functions: Vec<FunctionEntry>,
        constants: Vec<u64>,
        code: Vec<Instruction>,
    ) -> Self {
        let mut module = Module {
            name: name.into(),
            functions,
            constants,
            code,
            offsets: ModuleOffsets::default(),
            entry_reservation: 0,
        };
        module.compute_reservations();
        module
    }

    /// Set the image offsets supplied by the loading pipeline
    pub fn with_offsets(mut self, offsets: ModuleOffsets) -> Self {
        self.offsets = offsets;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn functions(&self) -> &[FunctionEntry] {
        &self.functions
    }

    #[inline]
    pub fn function(&self, index: usize) -> Option<&FunctionEntry> {
        self.functions.get(index)
    }

    /// Look up a function-table entry by name
    pub fn find_function(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.iter().find(|f| f.name == name)
    }

    #[inline]
    pub fn constants(&self) -> &[u64] {
        &self.constants
    }

    #[inline]
    pub fn get_constant(&self, index: u16) -> Option<u64> {
        self.constants.get(index as usize).copied()
    }

    #[inline]
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    #[inline]
    pub fn read_opcode(&self, address: usize) -> Option<Opcode> {
        self.code.get(address).and_then(Instruction::decode)
    }

    #[inline]
    pub fn offsets(&self) -> ModuleOffsets {
        self.offsets
    }

    /// Frame size of the top-level entry section
    #[inline]
    pub fn entry_reservation(&self) -> u16 {
        self.entry_reservation
    }

    /// Defined entries with their table index
    pub fn definitions(&self) -> impl Iterator<Item = (usize, &FunctionEntry)> {
        self.functions.iter().enumerate().filter(|(_, f)| !f.external)
    }

    /// External entries with their table index
    pub fn references(&self) -> impl Iterator<Item = (usize, &FunctionEntry)> {
        self.functions.iter().enumerate().filter(|(_, f)| f.external)
    }

    /// Code range `[start, end)` of each defined function, in address order.
    ///
    /// The entry section is reported with `None` as its table index.
    pub fn code_ranges(&self) -> Vec<(Option<usize>, usize, usize)> {
        let mut starts: Vec<(Option<usize>, usize)> = self
            .definitions()
            .map(|(i, f)| (Some(i), f.address as usize))
            .collect();
        starts.sort_by_key(|&(_, start)| start);

        let entry_end = starts.first().map_or(self.code.len(), |&(_, s)| s);
        let mut ranges = Vec::with_capacity(starts.len() + 1);
        ranges.push((None, 0, entry_end.min(self.code.len())));

        for (pos, &(index, start)) in starts.iter().enumerate() {
            let end = starts[pos + 1..]
                .iter()
                .map(|&(_, s)| s)
                .find(|&s| s > start)
                .unwrap_or(self.code.len());
            ranges.push((index, start.min(self.code.len()), end.min(self.code.len())));
        }
        ranges
    }

    /// Derive each frame's reservation from the registers its code touches
    fn compute_reservations(&mut self) {
        for (index, start, end) in self.code_ranges() {
            let reservation = self.code[start..end]
                .iter()
                .filter_map(Instruction::max_local_register)
                .map(|r| r as u16 + 1)
                .max()
                .unwrap_or(0);
            match index {
                Some(i) => self.functions[i].reservation = reservation,
                None => self.entry_reservation = reservation,
            }
        }
    }

    /// Serialize to the on-disk module format
    pub fn encode(&self) -> Vec<u8> {
        let mut gen = Generator::new();
        gen.module_header(
            self.constants.len() as u16,
            self.functions.len() as u32,
            self.code.len() as u64,
        );
        gen.function_table(&self.functions);
        gen.constant_pool(&self.constants);
        for instr in &self.code {
            gen.instruction(*instr);
        }
        gen.into_bytes()
    }
}
