//! Per-node IR emission
//!
//! Code generation is fused with parsing: the parser finishes a function
//! body and immediately emits it against the shared [`ZulContext`]. Every
//! node returns an [`Emitted`] describing what it produced:
//!
//! - a value and its type,
//! - nothing (the sub-expression failed; the error is already logged and
//!   parent emitters short-circuit naturally), or
//! - the interrupt sentinel (the node ended the block with a branch or
//!   return, so the enclosing statement list must stop emitting).
//!
//! # Module structure
//!
//! - `ops.rs`: implicit casts, arithmetic/comparison dispatch, boolean
//!   coercion
//! - `expr.rs`: literals, variables, subscripts, operators, calls
//! - `stmt.rs`: declarations, assignments, control flow, return
//! - `func.rs`: function assembly and the default-return/prune close
//! - `intrinsic.rs`: the `STDIN`/`STDOUT` rewrites to `scanf`/`printf`

mod expr;
mod func;
mod intrinsic;
mod ops;
mod stmt;

pub use func::{create_func, declare_protos};
pub use ops::{float_op, int_op, to_boolean, try_cast};

use crate::ast::Ast;
use crate::context::ZulContext;
use crate::ir::Value;
use crate::types::{Kind, ZulType};

/// Name of the program entry point.
pub const ENTRY_FN_NAME: &str = "main";

/// Result of emitting one AST node.
#[derive(Debug)]
pub enum Emitted {
    /// A value was produced. The type is `None` for void call results,
    /// which exist as IR but cannot participate in anything further.
    Value(Value, Option<ZulType>),
    /// The node failed; a diagnostic was already logged somewhere below.
    None,
    /// The node emitted a block terminator (return/break/continue); the
    /// enclosing statement list must stop.
    Interrupt,
}

impl Emitted {
    /// The produced value and (possibly absent) type.
    pub fn ok(self) -> Option<(Value, Option<ZulType>)> {
        match self {
            Emitted::Value(v, ty) => Some((v, ty)),
            _ => None,
        }
    }

    /// The produced value when it has a real type.
    pub fn typed(self) -> Option<(Value, ZulType)> {
        match self {
            Emitted::Value(v, Some(ty)) => Some((v, ty)),
            _ => None,
        }
    }
}

impl Ast {
    /// Emit this node into the current insertion point.
    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        match self {
            Ast::Bool(v) => Emitted::Value(Value::imm_bool(*v), Some(ZulType::Scalar(Kind::Bool))),
            Ast::Char(v) => Emitted::Value(Value::imm_char(*v), Some(ZulType::Scalar(Kind::Char))),
            Ast::Int(v) => Emitted::Value(Value::imm_int(*v), Some(ZulType::Scalar(Kind::Int))),
            Ast::Real(v) => Emitted::Value(Value::imm_real(*v), Some(ZulType::Scalar(Kind::Float))),
            Ast::Str(s) => {
                let global = ctx.module.add_string(s);
                Emitted::Value(global, Some(ZulType::Ptr(Kind::Char)))
            }
            Ast::Variable(e) => e.emit(ctx),
            Ast::Subscript(e) => e.emit(ctx),
            Ast::VariableDecl(e) => e.emit(ctx),
            Ast::VariableAssn(e) => e.emit(ctx),
            Ast::BinOp(e) => e.emit(ctx),
            Ast::UnaryOp(e) => e.emit(ctx),
            Ast::FuncCall(e) => e.emit(ctx),
            Ast::Return(e) => e.emit(ctx),
            Ast::If(e) => e.emit(ctx),
            Ast::Loop(e) => e.emit(ctx),
            Ast::Continue => stmt::emit_continue(ctx),
            Ast::Break => stmt::emit_break(ctx),
        }
    }

    /// Address of an l-value (variable or subscript) together with the
    /// pointee type. `None` for non-l-values and resolution failures.
    pub fn emit_address(&self, ctx: &mut ZulContext) -> Option<(Value, ZulType)> {
        match self {
            Ast::Variable(e) => e.emit_address(ctx),
            Ast::Subscript(e) => e.emit_address(ctx),
            _ => None,
        }
    }
}

/// Emit a statement list, stopping at the first interrupt. Returns whether
/// the list was interrupted (the current block already has a terminator).
pub(crate) fn emit_stmt_list(ctx: &mut ZulContext, stmts: &[Ast]) -> bool {
    for ast in stmts {
        if matches!(ast.emit(ctx), Emitted::Interrupt) {
            return true;
        }
    }
    false
}
