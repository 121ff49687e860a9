//! Attribution context: the compile-time tables shared by both passes.

use std::collections::HashMap;

use super::error::{CompileError, CompileResult};
use crate::backend::bytecode::instruction::MAX_CALL_INDEX;
use crate::backend::bytecode::module::FunctionEntry;

/// Registers addressable by one frame
pub const FRAME_REGISTERS: usize = 256;

/// Compile-time state for one program.
///
/// `function_address` and `function_table` share one index space. A name
/// enters both at the same time and is never removed.
#[derive(Debug, Clone, Default)]
pub struct AttributionContext {
    /// Function name -> index into `function_table`
    pub function_address: HashMap<String, usize>,
    pub function_table: Vec<FunctionEntry>,
    /// Constant pool, including backpatched jump targets
    pub constants: Vec<u64>,
    /// Instructions emitted so far in the current pass
    pub code_counter: u64,
    /// Next free register of the frame being attributed
    pub next_reg: usize,
    /// One past the highest register used by the frame being attributed
    pub max_reg: usize,
    /// Frame size of the entry section
    pub entry_reservation: u16,
    /// Function or section currently being attributed, for diagnostics
    scope_name: String,
}

impl AttributionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh frame whose first free register is `first_free`
    pub fn begin_frame(&mut self, name: &str, first_free: usize) {
        self.scope_name.clear();
        self.scope_name.push_str(name);
        self.next_reg = first_free;
        self.max_reg = first_free;
    }

    /// Allocate the next register
    pub fn alloc_register(&mut self) -> CompileResult<u8> {
        let reg = self.next_reg;
        self.next_reg += 1;
        self.touch_register(reg)
    }

    /// Record use of a register without moving the allocator
    pub fn touch_register(&mut self, reg: usize) -> CompileResult<u8> {
        if reg >= FRAME_REGISTERS {
            return Err(CompileError::TooManyRegisters(self.scope_name.clone()));
        }
        self.max_reg = self.max_reg.max(reg + 1);
        Ok(reg as u8)
    }

    /// Frame size of the frame just attributed
    pub fn reservation(&self) -> u16 {
        self.max_reg as u16
    }

    /// Append a word to the constant pool, returning its index
    pub fn add_constant(&mut self, word: u64) -> CompileResult<u16> {
        let index = self.constants.len();
        if index >= u16::MAX as usize {
            return Err(CompileError::TooManyConstants);
        }
        self.constants.push(word);
        Ok(index as u16)
    }

    /// Overwrite a reserved constant slot with a code address
    pub fn patch_constant(&mut self, index: u16, address: u64) {
        if let Some(slot) = self.constants.get_mut(index as usize) {
            *slot = address;
        }
    }

    pub fn lookup_function(&self, name: &str) -> Option<usize> {
        self.function_address.get(name).copied()
    }

    pub fn function(&self, index: usize) -> &FunctionEntry {
        &self.function_table[index]
    }

    pub fn function_mut(&mut self, index: usize) -> &mut FunctionEntry {
        &mut self.function_table[index]
    }

    /// Insert a new entry into both tables
    pub fn insert_function(&mut self, entry: FunctionEntry) -> CompileResult<usize> {
        let index = self.function_table.len();
        if index as u64 > MAX_CALL_INDEX as u64 {
            return Err(CompileError::TooManyFunctions);
        }
        if entry.name.len() > u8::MAX as usize {
            return Err(CompileError::NameTooLong(entry.name));
        }
        if entry.parameter_types.len() > u8::MAX as usize {
            return Err(CompileError::TooManyParameters(entry.name));
        }
        self.function_address.insert(entry.name.clone(), index);
        self.function_table.push(entry);
        Ok(index)
    }
}
