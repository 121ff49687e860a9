//! Binary module writer
//!
//! The generator serializes the four sections of a module file in order:
//! header, function table, constant pool and instruction stream. All
//! multi-byte fields are little-endian.
//!
//! A disabled generator accepts every call and writes nothing. The compiler
//! runs its forward pass against a disabled generator so that both passes
//! share one code path.

use super::instruction::Instruction;
use super::module::FunctionEntry;

/// Module file magic number ("LI")
pub const MAGIC: [u8; 2] = [0x4C, 0x49];

/// Size of the fixed header: magic, u16 constants, u32 functions, u64 instructions
pub const HEADER_SIZE: usize = 2 + 2 + 4 + 8;

/// Address stored for functions defined in another module
pub const EXTERNAL_ADDRESS: u64 = u64::MAX;

/// Byte sink for a module file
#[derive(Debug, Default)]
pub struct Generator {
    out: Vec<u8>,
    disabled: bool,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress or re-enable output
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Write the module header
    pub fn module_header(&mut self, num_constants: u16, num_functions: u32, num_instructions: u64) {
        if self.disabled {
            return;
        }
        self.out.extend_from_slice(&MAGIC);
        self.out.extend_from_slice(&num_constants.to_le_bytes());
        self.out.extend_from_slice(&num_functions.to_le_bytes());
        self.out.extend_from_slice(&num_instructions.to_le_bytes());
    }

    /// Write the function table.
    ///
    /// External entries are written with the sentinel address regardless of
    /// the address recorded in the entry.
    pub fn function_table(&mut self, functions: &[FunctionEntry]) {
        if self.disabled {
            return;
        }
        for entry in functions {
            let name = entry.name.as_bytes();
            debug_assert!(name.len() <= u8::MAX as usize);
            debug_assert!(entry.parameter_types.len() <= u8::MAX as usize);

            let address = if entry.external {
                EXTERNAL_ADDRESS
            } else {
                entry.address
            };
            self.out.push(name.len() as u8);
            self.out.push(entry.parameter_types.len() as u8);
            self.out.extend_from_slice(&address.to_le_bytes());
            self.out.extend_from_slice(name);
            self.out
                .extend(entry.parameter_types.iter().map(|ty| ty.to_byte()));
        }
    }

    /// Write the constant pool
    pub fn constant_pool(&mut self, constants: &[u64]) {
        if self.disabled {
            return;
        }
        for word in constants {
            self.out.extend_from_slice(&word.to_le_bytes());
        }
    }

    /// Write one instruction
    #[inline]
    pub fn instruction(&mut self, instruction: Instruction) {
        if self.disabled {
            return;
        }
        self.out.extend_from_slice(&instruction.to_bytes());
    }

    /// Bytes written so far
    pub fn bytes(&self) -> &[u8] {
        &self.out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}
