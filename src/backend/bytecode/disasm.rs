//! Text rendering of loaded modules
//!
//! ```text
//! .module calls
//! .extern neg
//! <entry>:
//!     .reserve 3
//! 0000  loadi r1, #0 (40)
//! ...
//! add:
//!     ; (int int) -> int
//!     .reserve 4
//! 0007  addi r1, r2, r3
//! ```

use std::fmt::Write;

use itertools::Itertools;

use super::instruction::{Instruction, MoveMode};
use super::module::Module;
use super::opcodes::{Opcode, OperandShape};

/// Render a whole module
pub fn disassemble(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, ".module {}", module.name());
    for (_, entry) in module.references() {
        let _ = writeln!(out, ".extern {}", entry.name);
    }

    for (index, start, end) in module.code_ranges() {
        match index.and_then(|i| module.function(i)) {
            Some(entry) => {
                let _ = writeln!(out, "{}:", entry.name);
                let _ = writeln!(
                    out,
                    "    ; ({}) -> {}",
                    entry.params().iter().join(" "),
                    entry.return_type()
                );
                let _ = writeln!(out, "    .reserve {}", entry.reservation);
            }
            None => {
                let _ = writeln!(out, "<entry>:");
                let _ = writeln!(out, "    .reserve {}", module.entry_reservation());
            }
        }
        for address in start..end {
            let _ = writeln!(out, "{:04x}  {}", address, disassemble_instruction(module, address));
        }
    }
    out
}

/// Render the instruction at `address`, resolving pool and table operands
pub fn disassemble_instruction(module: &Module, address: usize) -> String {
    let Some(instr) = module.code().get(address).copied() else {
        return "???".to_string();
    };
    let Some(op) = instr.decode() else {
        return format!("??? (0x{:02x})", instr.opcode);
    };
    let [a, b, c] = instr.operands;

    let operands = match op.shape() {
        OperandShape::Nullary => String::new(),
        OperandShape::Ternary => format!("r{}, r{}, r{}", a, b, c),
        OperandShape::Const => {
            let index = instr.const_index();
            let word = module.get_constant(index);
            match op {
                Opcode::LoadI => format!("r{}, #{} ({})", a, index, constant_text(word)),
                Opcode::JmpC => format!("r{}, #{} (-> {})", a, index, target_text(word)),
                _ => format!("#{} (-> {})", index, target_text(word)),
            }
        }
        OperandShape::Call => {
            let index = instr.call_index();
            let name = module
                .function(index as usize)
                .map_or("???", |entry| entry.name.as_str());
            format!("@{} {}", index, name)
        }
        OperandShape::Binary => mov_operands(instr),
    };

    if operands.is_empty() {
        op.mnemonic().to_string()
    } else {
        format!("{} {}", op.mnemonic(), operands)
    }
}

fn mov_operands(instr: Instruction) -> String {
    let [src, dst, mode] = instr.operands;
    match MoveMode::from_byte(mode) {
        Some(MoveMode::Local) => format!("r{}, r{}", src, dst),
        Some(MoveMode::ToWindow) => format!("r{}, w{}", src, dst),
        Some(MoveMode::FromWindow) => format!("w{}, r{}", src, dst),
        None => format!("r{}, r{}, ?{}", src, dst, mode),
    }
}

fn constant_text(word: Option<u64>) -> String {
    word.map_or_else(|| "???".to_string(), |w| (w as i64).to_string())
}

fn target_text(word: Option<u64>) -> String {
    word.map_or_else(|| "???".to_string(), |w| format!("{:04x}", w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bytecode::compiler::compile_source;

    fn module(source: &str) -> Module {
        compile_source("demo", source).unwrap().to_module().unwrap()
    }

    #[test]
    fn test_disassemble_sections() {
        let text = disassemble(&module("(def add (a b) (+ a b)) (add 40 2) (neg 1)"));

        assert!(text.starts_with(".module demo\n"));
        assert!(text.contains(".extern neg\n"));
        assert!(text.contains("<entry>:\n"));
        assert!(text.contains("add:\n    ; (int int) -> int\n    .reserve 4\n"));
        assert!(text.contains("loadi r1, #0 (40)"));
        assert!(text.contains("calli @0 add"));
        assert!(text.contains("calle @1 neg"));
        assert!(text.contains("mov r1, w1"));
        assert!(text.contains("mov w0, r0"));
        assert!(text.contains("addi r1, r2, r3"));
    }

    #[test]
    fn test_disassemble_jump_targets() {
        let m = module("(if (> 2 1) 10 20)");
        assert_eq!(disassemble_instruction(&m, 3), "jmpc r0, #1 (-> 0006)");
        assert_eq!(disassemble_instruction(&m, 5), "jmp #0 (-> 0007)");
        assert_eq!(disassemble_instruction(&m, 7), "halt");
        assert_eq!(disassemble_instruction(&m, 99), "???");
    }
}
