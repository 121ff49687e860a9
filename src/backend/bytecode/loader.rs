//! Module loader
//!
//! Parses the on-disk module format into a [`Module`]. The byte stream is
//! never trusted: every read is bounds-checked, and the first structural
//! error marks the loader inconsistent. An inconsistent loader refuses any
//! further work and its module must be discarded.
//!
//! ```text
//! magic            2 bytes   0x4C 0x49
//! numConstants     u16
//! numFunctions     u32       (low 24 bits used)
//! numInstructions  u64
//! function table   nameLen u8, paramCount u8, address u64, name, types
//! constant pool    u64 each
//! instructions     4 bytes each
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use super::generator::{EXTERNAL_ADDRESS, HEADER_SIZE, MAGIC};
use super::instruction::{Instruction, INSTRUCTION_SIZE, MAX_CALL_INDEX};
use super::module::{FunctionEntry, Module, ModuleOffsets, Signature};
use super::opcodes::Opcode;
use crate::backend::types::ValueType;

/// Smallest function-table entry: two length bytes and the address
const MIN_FUNCTION_ENTRY: usize = 1 + 1 + 8;

/// Result type for module loading
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that can occur while loading a module
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// File could not be read
    Io(PathBuf, String),
    /// First two bytes are not the module magic
    BadMagic([u8; 2]),
    /// Input ended inside the named section
    Truncated { section: &'static str, offset: usize },
    /// Function count does not fit a 24-bit call index
    TooManyFunctions(u32),
    /// Function name is not valid UTF-8
    InvalidName { offset: usize },
    /// Parameter type byte outside the known type tags
    InvalidType { function: String, byte: u8 },
    /// Defined function points outside the instruction stream
    InvalidAddress { function: String, address: u64 },
    /// Opcode byte outside the instruction set
    InvalidOpcode { address: usize, byte: u8 },
    /// Bytes left over after the instruction stream
    TrailingBytes(usize),
    /// A previous error left the loader unusable
    Inconsistent,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(path, err) => write!(f, "Failed to read '{}': {}", path.display(), err),
            LoadError::BadMagic(found) => write!(
                f,
                "Bad magic number: expected {:02x} {:02x}, found {:02x} {:02x}",
                MAGIC[0], MAGIC[1], found[0], found[1]
            ),
            LoadError::Truncated { section, offset } => {
                write!(f, "Unexpected end of input in {} at byte {}", section, offset)
            }
            LoadError::TooManyFunctions(n) => {
                write!(f, "Function count {} exceeds the 24-bit index range", n)
            }
            LoadError::InvalidName { offset } => {
                write!(f, "Function name at byte {} is not valid UTF-8", offset)
            }
            LoadError::InvalidType { function, byte } => {
                write!(f, "Invalid type byte {} in signature of \"{}\"", byte, function)
            }
            LoadError::InvalidAddress { function, address } => {
                write!(f, "Function \"{}\" has out-of-range address {}", function, address)
            }
            LoadError::InvalidOpcode { address, byte } => {
                write!(f, "Invalid opcode 0x{:02x} at {:04x}", byte, address)
            }
            LoadError::TrailingBytes(n) => write!(f, "{} trailing bytes after instructions", n),
            LoadError::Inconsistent => write!(f, "Loader is in an inconsistent state"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Cursor over one module file
#[derive(Debug)]
pub struct Loader<'a> {
    name: String,
    bytes: &'a [u8],
    pos: usize,
    consistent: bool,
    offsets: ModuleOffsets,
}

impl<'a> Loader<'a> {
    pub fn new(name: impl Into<String>, bytes: &'a [u8]) -> Self {
        Self {
            name: name.into(),
            bytes,
            pos: 0,
            consistent: true,
            offsets: ModuleOffsets::default(),
        }
    }

    /// Image offsets to record on the loaded module
    pub fn with_offsets(mut self, offsets: ModuleOffsets) -> Self {
        self.offsets = offsets;
        self
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.consistent
    }

    /// Parse the whole module
    pub fn load(&mut self) -> LoadResult<Module> {
        if !self.consistent {
            return Err(LoadError::Inconsistent);
        }
        self.load_sections().map_err(|err| {
            self.consistent = false;
            err
        })
    }

    fn load_sections(&mut self) -> LoadResult<Module> {
        self.pos = 0;
        let magic = self.take("header", 2)?;
        if magic != MAGIC {
            return Err(LoadError::BadMagic([magic[0], magic[1]]));
        }
        let num_constants = self.read_u16("header")?;
        let num_functions = self.read_u32("header")?;
        let num_instructions = self.read_u64("header")?;
        debug_assert_eq!(self.pos, HEADER_SIZE);

        if num_functions > MAX_CALL_INDEX + 1 {
            return Err(LoadError::TooManyFunctions(num_functions));
        }

        // The count is untrusted; never reserve more entries than the bytes can hold
        let room = (self.bytes.len() - self.pos) / MIN_FUNCTION_ENTRY;
        let mut functions = Vec::with_capacity((num_functions as usize).min(room));
        for _ in 0..num_functions {
            functions.push(self.read_function(num_instructions)?);
        }

        let mut constants = Vec::with_capacity(num_constants as usize);
        for _ in 0..num_constants {
            constants.push(self.read_u64("constant pool")?);
        }

        let code_bytes = usize::try_from(num_instructions)
            .ok()
            .and_then(|n| n.checked_mul(INSTRUCTION_SIZE))
            .ok_or(LoadError::Truncated {
                section: "instructions",
                offset: self.pos,
            })?;
        let raw = self.take("instructions", code_bytes)?;
        let mut code = Vec::with_capacity(raw.len() / INSTRUCTION_SIZE);
        for (address, chunk) in raw.chunks_exact(INSTRUCTION_SIZE).enumerate() {
            if Opcode::from_byte(chunk[0]).is_none() {
                return Err(LoadError::InvalidOpcode {
                    address,
                    byte: chunk[0],
                });
            }
            code.push(Instruction::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        let rest = self.bytes.len() - self.pos;
        if rest != 0 {
            return Err(LoadError::TrailingBytes(rest));
        }

        debug!(
            target: "lilium::loader",
            module = %self.name,
            functions = functions.len(),
            constants = constants.len(),
            instructions = code.len(),
            "loaded module"
        );
        Ok(Module::new(self.name.clone(), functions, constants, code).with_offsets(self.offsets))
    }

    fn read_function(&mut self, num_instructions: u64) -> LoadResult<FunctionEntry> {
        let name_len = self.read_u8("function table")? as usize;
        let type_count = self.read_u8("function table")? as usize;
        let address = self.read_u64("function table")?;

        let name_offset = self.pos;
        let name = std::str::from_utf8(self.take("function table", name_len)?)
            .map_err(|_| LoadError::InvalidName {
                offset: name_offset,
            })?
            .to_string();

        let mut types = Signature::new();
        for &byte in self.take("function table", type_count)? {
            let ty = ValueType::from_byte(byte).ok_or_else(|| LoadError::InvalidType {
                function: name.clone(),
                byte,
            })?;
            types.push(ty);
        }

        if address == EXTERNAL_ADDRESS {
            return Ok(FunctionEntry::external(name, types));
        }
        if address >= num_instructions {
            return Err(LoadError::InvalidAddress {
                function: name,
                address,
            });
        }
        Ok(FunctionEntry::defined(name, address, types))
    }

    fn take(&mut self, section: &'static str, len: usize) -> LoadResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(LoadError::Truncated {
                section,
                offset: self.pos,
            })?;
        let bytes: &'a [u8] = self.bytes;
        let slice = &bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self, section: &'static str) -> LoadResult<u8> {
        Ok(self.take(section, 1)?[0])
    }

    fn read_u16(&mut self, section: &'static str) -> LoadResult<u16> {
        let b = self.take(section, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self, section: &'static str) -> LoadResult<u32> {
        let b = self.take(section, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self, section: &'static str) -> LoadResult<u64> {
        let mut word = [0u8; 8];
        word.copy_from_slice(self.take(section, 8)?);
        Ok(u64::from_le_bytes(word))
    }
}

/// Decode a module from bytes already in memory
pub fn decode_module(name: &str, bytes: &[u8]) -> LoadResult<Module> {
    Loader::new(name, bytes).load()
}

/// Module name derived from a file path (its stem)
pub fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read and decode one module file
pub fn load_file(path: &Path) -> LoadResult<Module> {
    let bytes =
        std::fs::read(path).map_err(|err| LoadError::Io(path.to_path_buf(), err.to_string()))?;
    decode_module(&module_name(path), &bytes)
}

/// Load a sequence of module files, assigning each its offsets into the
/// shared image.
///
/// Loading stops at the first failing file.
pub fn load_modules<P: AsRef<Path>>(paths: &[P]) -> LoadResult<Vec<Module>> {
    let mut offsets = ModuleOffsets::default();
    let mut modules = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|err| LoadError::Io(path.to_path_buf(), err.to_string()))?;
        let module = Loader::new(module_name(path), &bytes)
            .with_offsets(offsets)
            .load()?;

        offsets.functions += module.functions().len();
        offsets.constants += module.constants().len();
        offsets.code += module.len();
        modules.push(module);
    }
    Ok(modules)
}

/// Assign image offsets to modules that were decoded individually
pub fn assign_offsets(modules: Vec<Module>) -> Vec<Module> {
    let mut offsets = ModuleOffsets::default();
    modules
        .into_iter()
        .map(|module| {
            let next = ModuleOffsets {
                functions: offsets.functions + module.functions().len(),
                constants: offsets.constants + module.constants().len(),
                code: offsets.code + module.len(),
            };
            let module = module.with_offsets(offsets);
            offsets = next;
            module
        })
        .collect()
}
