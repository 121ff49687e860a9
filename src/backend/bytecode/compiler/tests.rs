//! Unit tests for the bytecode compiler.

use crate::backend::ast::{BinaryOp, Expr, ExternDecl, FuncDef, Global, Param, Program};
use crate::backend::bytecode::generator::EXTERNAL_ADDRESS;
use crate::backend::bytecode::instruction::{Instruction, MoveMode};
use crate::backend::bytecode::module::Module;
use crate::backend::bytecode::opcodes::Opcode;
use crate::backend::types::{Constant, ValueType};

use super::error::CompileError;
use super::{compile_program, compile_source, CompiledModule};

fn compile_ok(globals: Vec<Global>) -> CompiledModule {
    compile_program("test", Program::new(globals)).expect("compilation should succeed")
}

fn compile_err(globals: Vec<Global>) -> CompileError {
    compile_program("test", Program::new(globals)).expect_err("compilation should fail")
}

fn decode(compiled: &CompiledModule) -> Module {
    compiled.to_module().expect("emitted module should load")
}

fn opcodes(module: &Module) -> Vec<Opcode> {
    module.code().iter().filter_map(Instruction::decode).collect()
}

fn int_param(name: &str) -> Param {
    Param::new(name, ValueType::Int)
}

fn untyped(name: &str) -> Param {
    Param::new(name, ValueType::Unknown)
}

// ========================================================================
// Entry Section Tests
// ========================================================================

#[test]
fn test_entry_expression_layout() {
    let compiled = compile_ok(vec![Global::Expr(Expr::binary(
        BinaryOp::Add,
        Expr::int(1),
        Expr::int(2),
    ))]);
    let module = decode(&compiled);

    assert_eq!(
        module.code(),
        &[
            Instruction::constant(Opcode::LoadI, 1, 0),
            Instruction::constant(Opcode::LoadI, 2, 1),
            Instruction::ternary(Opcode::AddI, 1, 2, 0),
            Instruction::nullary(Opcode::Halt),
        ]
    );
    assert_eq!(module.constants(), &[1, 2]);
    assert_eq!(compiled.entry_reservation(), 3);
    assert_eq!(module.entry_reservation(), 3);
}

#[test]
fn test_library_module_is_lone_halt() {
    let compiled = compile_ok(vec![Global::Extern(ExternDecl {
        name: "f".to_string(),
        params: [ValueType::Int].into_iter().collect(),
        return_type: ValueType::Int,
    })]);
    let module = decode(&compiled);
    assert_eq!(opcodes(&module), vec![Opcode::Halt]);
    assert_eq!(module.functions()[0].address, EXTERNAL_ADDRESS);
}

#[test]
fn test_constants_are_bit_patterns() {
    let compiled = compile_ok(vec![Global::Expr(Expr::binary(
        BinaryOp::Mul,
        Expr::constant(Constant::Double(1.5)),
        Expr::int(-1),
    ))]);
    assert_eq!(compiled.constants(), &[1.5f64.to_bits(), u64::MAX]);
}

// ========================================================================
// Type Attribution Tests
// ========================================================================

#[test]
fn test_promotion_to_double() {
    let compiled = compile_ok(vec![Global::Def(FuncDef::new(
        "mix",
        vec![],
        ValueType::Unknown,
        Expr::binary(BinaryOp::Add, Expr::int(1), Expr::constant(Constant::Double(2.0))),
    ))]);
    assert_eq!(compiled.functions()[0].return_type(), ValueType::Double);
}

#[test]
fn test_promotion_single_and_int() {
    let compiled = compile_ok(vec![Global::Def(FuncDef::new(
        "mix",
        vec![],
        ValueType::Unknown,
        Expr::binary(BinaryOp::Sub, Expr::constant(Constant::Single(0.5)), Expr::int(3)),
    ))]);
    assert_eq!(compiled.functions()[0].return_type(), ValueType::Single);
}

#[test]
fn test_declared_return_type_mismatch() {
    let err = compile_err(vec![Global::Def(FuncDef::new(
        "f",
        vec![],
        ValueType::Double,
        Expr::int(1),
    ))]);
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
}

#[test]
fn test_condition_must_be_int() {
    let err = compile_err(vec![Global::Expr(Expr::cond(
        Expr::constant(Constant::Double(1.0)),
        Expr::int(1),
        Expr::int(2),
    ))]);
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
}

#[test]
fn test_undefined_variable() {
    let err = compile_err(vec![Global::Def(FuncDef::new(
        "f",
        vec![int_param("a")],
        ValueType::Unknown,
        Expr::var("b"),
    ))]);
    assert_eq!(err, CompileError::UndefinedVariable("b".to_string()));
}

#[test]
fn test_conflicting_variable_type() {
    let err = compile_err(vec![Global::Def(FuncDef::new(
        "f",
        vec![int_param("a")],
        ValueType::Unknown,
        Expr::typed_var("a", ValueType::Double),
    ))]);
    assert_eq!(
        err,
        CompileError::ConflictingType {
            name: "a".to_string(),
            bound: ValueType::Int,
            used: ValueType::Double,
        }
    );
}

#[test]
fn test_duplicate_parameter() {
    let err = compile_err(vec![Global::Def(FuncDef::new(
        "f",
        vec![int_param("a"), int_param("a")],
        ValueType::Unknown,
        Expr::var("a"),
    ))]);
    assert_eq!(err, CompileError::SymbolAlreadyDefined("a".to_string()));
}

#[test]
fn test_parameters_do_not_leak_between_functions() {
    let err = compile_err(vec![
        Global::Def(FuncDef::new("f", vec![int_param("a")], ValueType::Unknown, Expr::var("a"))),
        Global::Def(FuncDef::new("g", vec![], ValueType::Unknown, Expr::var("a"))),
    ]);
    assert_eq!(err, CompileError::UndefinedVariable("a".to_string()));
}

// ========================================================================
// Function Table Tests
// ========================================================================

#[test]
fn test_duplicate_definition() {
    let def = || Global::Def(FuncDef::new("f", vec![], ValueType::Unknown, Expr::int(1)));
    let err = compile_err(vec![def(), def()]);
    assert_eq!(err, CompileError::DuplicateDefinition("f".to_string()));
}

#[test]
fn test_call_arity_mismatch() {
    let err = compile_err(vec![
        Global::Def(FuncDef::new("f", vec![int_param("a")], ValueType::Unknown, Expr::var("a"))),
        Global::Expr(Expr::call("f", vec![Expr::int(1), Expr::int(2)])),
    ]);
    assert!(matches!(err, CompileError::SignatureMismatch { ref name, .. } if name == "f"));
}

#[test]
fn test_call_type_mismatch() {
    let err = compile_err(vec![
        Global::Def(FuncDef::new("f", vec![int_param("a")], ValueType::Unknown, Expr::var("a"))),
        Global::Expr(Expr::call("f", vec![Expr::constant(Constant::Double(1.0))])),
    ]);
    assert!(matches!(err, CompileError::SignatureMismatch { .. }));
}

#[test]
fn test_extern_conflicting_with_definition() {
    let err = compile_err(vec![
        Global::Def(FuncDef::new("f", vec![int_param("a")], ValueType::Unknown, Expr::var("a"))),
        Global::Extern(ExternDecl {
            name: "f".to_string(),
            params: [ValueType::Int, ValueType::Int].into_iter().collect(),
            return_type: ValueType::Int,
        }),
    ]);
    assert!(matches!(err, CompileError::SignatureMismatch { .. }));
}

#[test]
fn test_forward_reference_becomes_internal() {
    let compiled = compile_ok(vec![
        Global::Expr(Expr::call("g", vec![Expr::int(1)])),
        Global::Def(FuncDef::new("g", vec![untyped("x")], ValueType::Unknown, Expr::var("x"))),
    ]);
    let module = decode(&compiled);

    let entry = module.find_function("g").expect("g in function table");
    assert!(!entry.external);
    assert_eq!(entry.params(), &[ValueType::Int]);
    assert!(opcodes(&module).contains(&Opcode::CallI));
    assert!(!opcodes(&module).contains(&Opcode::CallE));
}

#[test]
fn test_unresolved_call_stays_external() {
    let compiled = compile_ok(vec![Global::Expr(Expr::call("h", vec![Expr::int(3)]))]);
    let module = decode(&compiled);

    let entry = &module.functions()[0];
    assert!(entry.external);
    assert_eq!(entry.return_type(), ValueType::Unknown);
    assert_eq!(entry.params(), &[ValueType::Int]);
    assert!(opcodes(&module).contains(&Opcode::CallE));
}

#[test]
fn test_function_address_follows_halt() {
    let compiled = compile_ok(vec![
        Global::Def(FuncDef::new("one", vec![], ValueType::Unknown, Expr::int(1))),
        Global::Expr(Expr::call("one", vec![])),
    ]);
    let module = decode(&compiled);

    // entry: calli, mov w0 -> r0, halt
    assert_eq!(module.functions()[0].address, 3);
    assert_eq!(module.read_opcode(2), Some(Opcode::Halt));
    assert_eq!(module.read_opcode(3), Some(Opcode::LoadI));
}

// ========================================================================
// Control Flow Tests
// ========================================================================

#[test]
fn test_conditional_layout() {
    let compiled = compile_ok(vec![Global::Expr(Expr::cond(
        Expr::binary(BinaryOp::Gt, Expr::int(2), Expr::int(1)),
        Expr::int(10),
        Expr::int(20),
    ))]);
    let module = decode(&compiled);

    assert_eq!(
        module.code(),
        &[
            Instruction::constant(Opcode::LoadI, 1, 2),
            Instruction::constant(Opcode::LoadI, 2, 3),
            Instruction::ternary(Opcode::Gt, 1, 2, 0),
            Instruction::constant(Opcode::JmpC, 0, 1),
            Instruction::constant(Opcode::LoadI, 0, 4),
            Instruction::constant(Opcode::Jmp, 0, 0),
            Instruction::constant(Opcode::LoadI, 0, 5),
            Instruction::nullary(Opcode::Halt),
        ]
    );
    // then-skip target, else-entry target, then the literals
    assert_eq!(module.constants(), &[7, 6, 2, 1, 10, 20]);
}

#[test]
fn test_self_tail_call_uses_lcalli() {
    let body = Expr::cond(
        Expr::binary(BinaryOp::Gt, Expr::var("n"), Expr::int(0)),
        Expr::call("count", vec![Expr::binary(BinaryOp::Sub, Expr::var("n"), Expr::int(1))]),
        Expr::int(0),
    );
    let compiled = compile_ok(vec![Global::Def(FuncDef::new(
        "count",
        vec![untyped("n")],
        ValueType::Unknown,
        body,
    ))]);
    let module = decode(&compiled);

    assert_eq!(
        &module.code()[1..],
        &[
            Instruction::constant(Opcode::LoadI, 3, 2),
            Instruction::ternary(Opcode::Gt, 1, 3, 2),
            Instruction::constant(Opcode::JmpC, 2, 1),
            Instruction::constant(Opcode::LoadI, 4, 3),
            Instruction::ternary(Opcode::SubI, 1, 4, 3),
            Instruction::mov(3, 1, MoveMode::Local),
            Instruction::call(Opcode::LCallI, 0),
            Instruction::constant(Opcode::Jmp, 0, 0),
            Instruction::constant(Opcode::LoadI, 2, 4),
            Instruction::mov(2, 0, MoveMode::Local),
            Instruction::nullary(Opcode::Return),
        ]
    );
    assert_eq!(compiled.functions()[0].return_type(), ValueType::Int);
    assert_eq!(compiled.functions()[0].reservation, 5);
    assert_eq!(module.functions()[0].reservation, 5);
}

#[test]
fn test_non_tail_recursion_uses_calli() {
    let body = Expr::cond(
        Expr::binary(BinaryOp::Gt, Expr::var("n"), Expr::int(1)),
        Expr::binary(
            BinaryOp::Mul,
            Expr::var("n"),
            Expr::call("fact", vec![Expr::binary(BinaryOp::Sub, Expr::var("n"), Expr::int(1))]),
        ),
        Expr::int(1),
    );
    let compiled = compile_ok(vec![Global::Def(FuncDef::new(
        "fact",
        vec![int_param("n")],
        ValueType::Int,
        body,
    ))]);
    let ops = opcodes(&decode(&compiled));
    assert!(ops.contains(&Opcode::CallI));
    assert!(!ops.iter().any(|op| op.is_tail_call()));
}

#[test]
fn test_call_passes_arguments_through_window() {
    let compiled = compile_ok(vec![
        Global::Extern(ExternDecl {
            name: "sum".to_string(),
            params: [ValueType::Int, ValueType::Int].into_iter().collect(),
            return_type: ValueType::Int,
        }),
        Global::Expr(Expr::call("sum", vec![Expr::int(4), Expr::int(5)])),
    ]);
    let module = decode(&compiled);

    assert_eq!(
        module.code(),
        &[
            Instruction::constant(Opcode::LoadI, 1, 0),
            Instruction::constant(Opcode::LoadI, 2, 1),
            Instruction::mov(1, 1, MoveMode::ToWindow),
            Instruction::mov(2, 2, MoveMode::ToWindow),
            Instruction::call(Opcode::CallE, 0),
            Instruction::mov(0, 0, MoveMode::FromWindow),
            Instruction::nullary(Opcode::Halt),
        ]
    );
}

// ========================================================================
// Source Compilation Tests
// ========================================================================

#[test]
fn test_compile_source_end_to_end() {
    let compiled = compile_source(
        "calls",
        "(def add (a b) (+ a b))\n(add 40 2)",
    )
    .unwrap();
    let module = decode(&compiled);
    assert_eq!(module.name(), "calls");
    assert_eq!(module.find_function("add").map(|f| f.arity()), Some(2));
    assert_eq!(module.read_opcode(module.functions()[0].address as usize), Some(Opcode::AddI));
}

#[test]
fn test_compile_source_syntax_error() {
    assert!(matches!(
        compile_source("bad", "(def f (a) (+ a 1)"),
        Err(CompileError::Syntax(_))
    ));
}
