//! Lexical scope stack mapping names to register bindings.

use std::collections::HashMap;

use super::error::{CompileError, CompileResult};
use crate::backend::types::ValueType;

/// A name bound to a frame-relative register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub reg: u8,
    pub ty: ValueType,
}

/// Stack of scope frames, innermost last
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<HashMap<String, Symbol>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new scope
    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// End the innermost scope
    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bind a name in the innermost frame
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> CompileResult<()> {
        if self.frames.is_empty() {
            self.push_frame();
        }
        if let Some(frame) = self.frames.last_mut() {
            if frame.contains_key(name) {
                return Err(CompileError::SymbolAlreadyDefined(name.to_string()));
            }
            frame.insert(name.to_string(), symbol);
        }
        Ok(())
    }

    /// Resolve a name, innermost frame first
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }
}
