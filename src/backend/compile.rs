// Lowering: Lilium source text → Program (AST)
//
// The s-expression front end produces untyped trees; this pass recognises the
// surface forms (def, extern, if, the five binary operators, calls) and builds
// the AST the bytecode compiler attributes. Anything at top level that is not
// a definition or a declaration becomes an entry expression.

use tracing::debug;

use crate::backend::ast::{BinaryOp, ExternDecl, Expr, FuncDef, Global, Param, ParamTypes, Program};
use crate::backend::bytecode::compiler::{CompileError, CompileResult};
use crate::backend::types::{Constant, ValueType};
use crate::sexpr::{parse_source, SExpr};

const KEYWORDS: [&str; 3] = ["def", "extern", "if"];

fn syntax(msg: impl Into<String>) -> CompileError {
    CompileError::Syntax(msg.into())
}

/// Parse and lower a whole source text
pub fn parse_program(src: &str) -> CompileResult<Program> {
    let sexprs = parse_source(src).map_err(CompileError::Syntax)?;
    let globals = sexprs
        .iter()
        .map(lower_global)
        .collect::<CompileResult<Vec<_>>>()?;
    debug!(target: "lilium::compiler", globals = globals.len(), "lowered program");
    Ok(Program::new(globals))
}

fn lower_global(sexpr: &SExpr) -> CompileResult<Global> {
    if let SExpr::List(items) = sexpr {
        match items.first().and_then(SExpr::as_atom) {
            Some("def") => return lower_def(items).map(Global::Def),
            Some("extern") => return lower_extern(items).map(Global::Extern),
            _ => {}
        }
    }
    lower_expr(sexpr, &[]).map(Global::Expr)
}

/// Function, parameter and variable names: atoms that are not operators or keywords
fn identifier<'a>(sexpr: &'a SExpr, what: &str) -> CompileResult<&'a str> {
    match sexpr.as_atom() {
        Some(name) if !KEYWORDS.contains(&name) && BinaryOp::from_symbol(name).is_none() => Ok(name),
        _ => Err(syntax(format!("expected {} name, found {}", what, sexpr))),
    }
}

fn type_name(sexpr: &SExpr) -> CompileResult<ValueType> {
    sexpr
        .as_atom()
        .and_then(ValueType::from_name)
        .filter(|ty| ty.is_known())
        .ok_or_else(|| syntax(format!("expected type (int, single or double), found {}", sexpr)))
}

fn lower_param(sexpr: &SExpr) -> CompileResult<Param> {
    match sexpr {
        SExpr::List(pair) => match pair.as_slice() {
            [name, ty] => Ok(Param::new(identifier(name, "parameter")?, type_name(ty)?)),
            _ => Err(syntax(format!("expected (name type), found {}", sexpr))),
        },
        _ => Ok(Param::new(identifier(sexpr, "parameter")?, ValueType::Int)),
    }
}

// (def NAME (PARAM*) [TYPE] BODY)
fn lower_def(items: &[SExpr]) -> CompileResult<FuncDef> {
    let (name, params, return_type, body) = match items {
        [_, name, params, body] => (name, params, None, body),
        [_, name, params, ty, body] => (name, params, Some(ty), body),
        _ => {
            return Err(syntax(format!(
                "def expects (def name (params) [type] body), found {}",
                SExpr::List(items.to_vec())
            )))
        }
    };

    let name = identifier(name, "function")?;
    let params = params
        .as_list()
        .ok_or_else(|| syntax(format!("parameter list of {} must be a list", name)))?
        .iter()
        .map(lower_param)
        .collect::<CompileResult<Vec<_>>>()?;
    let return_type = return_type.map(type_name).transpose()?.unwrap_or(ValueType::Unknown);

    let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
    let body = lower_expr(body, &names)?;
    Ok(FuncDef::new(name, params, return_type, body))
}

// (extern NAME (TYPE*) TYPE)
fn lower_extern(items: &[SExpr]) -> CompileResult<ExternDecl> {
    let [_, name, params, ret] = items else {
        return Err(syntax(format!(
            "extern expects (extern name (types) type), found {}",
            SExpr::List(items.to_vec())
        )));
    };
    let name = identifier(name, "function")?.to_string();
    let params = params
        .as_list()
        .ok_or_else(|| syntax(format!("parameter types of {} must be a list", name)))?
        .iter()
        .map(type_name)
        .collect::<CompileResult<ParamTypes>>()?;
    Ok(ExternDecl {
        name,
        params,
        return_type: type_name(ret)?,
    })
}

fn lower_expr(sexpr: &SExpr, params: &[&str]) -> CompileResult<Expr> {
    match sexpr {
        SExpr::Integer(v) => Ok(Expr::int(*v)),
        SExpr::Single(v) => Ok(Expr::constant(Constant::Single(*v))),
        SExpr::Double(v) => Ok(Expr::constant(Constant::Double(*v))),
        SExpr::Atom(_) => Ok(Expr::var(identifier(sexpr, "variable")?)),
        SExpr::List(items) => lower_form(items, params),
    }
}

fn lower_form(items: &[SExpr], params: &[&str]) -> CompileResult<Expr> {
    let Some((head, args)) = items.split_first() else {
        return Err(syntax("empty expression ()"));
    };
    let Some(symbol) = head.as_atom() else {
        return Err(syntax(format!("expected operator or function name, found {}", head)));
    };

    if let Some(op) = BinaryOp::from_symbol(symbol) {
        let [lhs, rhs] = args else {
            return Err(syntax(format!("{} expects 2 operands, found {}", symbol, args.len())));
        };
        return Ok(Expr::binary(op, lower_expr(lhs, params)?, lower_expr(rhs, params)?));
    }

    match symbol {
        "if" => {
            let [condition, then_branch, else_branch] = args else {
                return Err(syntax(format!("if expects 3 operands, found {}", args.len())));
            };
            Ok(Expr::cond(
                lower_expr(condition, params)?,
                lower_branch(then_branch, params)?,
                lower_branch(else_branch, params)?,
            ))
        }
        "def" | "extern" => Err(syntax(format!("{} is only allowed at top level", symbol))),
        _ => {
            let name = identifier(head, "function")?;
            let args = args
                .iter()
                .map(|arg| lower_expr(arg, params))
                .collect::<CompileResult<Vec<_>>>()?;
            Ok(Expr::call(name, args))
        }
    }
}

/// Branches may carry one extra pair of parens: `((expr))`, `(42)`, `(x)`.
///
/// A parenthesised name that is not a parameter stays a zero-argument call.
fn lower_branch(sexpr: &SExpr, params: &[&str]) -> CompileResult<Expr> {
    if let SExpr::List(items) = sexpr {
        if let [inner] = items.as_slice() {
            let unwrap = match inner {
                SExpr::Atom(name) => params.contains(&name.as_str()),
                _ => true,
            };
            if unwrap {
                return lower_expr(inner, params);
            }
        }
    }
    lower_expr(sexpr, params)
}
