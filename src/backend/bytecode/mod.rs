//! Bytecode Module
//!
//! This module provides the register-machine backend for Lilium programs:
//! the compiler that lowers an attributed AST to module files, the loader
//! and linker that combine module files into one image, and the VM that
//! executes the image.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Lilium Source                              │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                  Parser + Lowering (sexpr, compile)               │
//! │                    Source → Program (AST)                         │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Bytecode Compiler                              │
//! │     attribution (registers, types, constants, function table)     │
//! │     code generation (forward pass, then emitting pass)            │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │  .mod files
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │              Loader (one per file) → Linker → Image               │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Bytecode VM                                    │
//! │                                                                   │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐    │
//! │  │ Register    │  │ Call Stack  │  │ Image (code, constants, │    │
//! │  │ File (i64)  │  │             │  │ merged function table)  │    │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`opcodes`]: The 16 opcodes, their mnemonics and operand shapes
//! - [`instruction`]: Fixed 4-byte instruction records
//! - [`generator`]: Module file writer
//! - [`module`]: In-memory module with its function table and pool
//! - [`compiler`]: Attribution and two-pass code generation
//! - [`loader`]: Module file reader
//! - [`linker`]: Cross-module symbol resolution
//! - [`vm`]: Virtual machine execution engine
//! - [`disasm`]: Text rendering of modules
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lilium::backend::bytecode::{compile_source, link_modules, BytecodeVM};
//!
//! let module = compile_source("example", "(def add (a b) (+ a b)) (add 40 2)")
//!     .expect("compilation failed")
//!     .to_module()
//!     .expect("load failed");
//! let image = link_modules(vec![module]).expect("link failed");
//!
//! let mut vm = BytecodeVM::new(Arc::new(image));
//! assert_eq!(vm.run().expect("execution failed"), 42);
//! ```

pub mod compiler;
pub mod disasm;
pub mod generator;
pub mod instruction;
pub mod linker;
pub mod loader;
pub mod module;
pub mod opcodes;
pub mod vm;

pub use compiler::{compile_program, compile_source, CompileError, CompileResult, CompiledModule, Compiler};
pub use disasm::{disassemble, disassemble_instruction};
pub use generator::{Generator, EXTERNAL_ADDRESS, HEADER_SIZE, MAGIC};
pub use instruction::{Instruction, MoveMode, INSTRUCTION_SIZE};
pub use linker::{link_modules, Image, LinkError, LinkResult, LinkedFunction, Linker, ModuleSpan};
pub use loader::{assign_offsets, decode_module, load_file, load_modules, module_name, LoadError, LoadResult, Loader};
pub use module::{FunctionEntry, Module, ModuleOffsets};
pub use opcodes::{Opcode, OperandShape};
pub use vm::{BytecodeVM, RuntimeError, VmConfig, VmError, VmResult, VmState};
