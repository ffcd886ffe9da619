//! The stdio intrinsics
//!
//! `STDOUT`/`STDIN` are not user functions; calls to them rewrite into
//! C-level `printf`/`scanf`. The format string is built from the argument
//! types, separated by spaces (with a trailing newline for output), and
//! created as a module-level constant on each call.

use super::Emitted;
use crate::ast::FuncCallExpr;
use crate::context::ZulContext;
use crate::ir::Value;
use crate::types::{Kind, ZulType};

/// %-spec for one argument of the given type.
fn format_spec(ty: ZulType) -> &'static str {
    match ty {
        ZulType::Scalar(Kind::Bool) => "%u",
        ZulType::Scalar(Kind::Char) => "%c",
        ZulType::Scalar(Kind::Int) => "%lld",
        ZulType::Scalar(Kind::Float) => "%lf",
        ZulType::Array(Kind::Char) | ZulType::Ptr(Kind::Char) => "%s",
        _ => "%p",
    }
}

/// Widen the `i32` C return value to the Zul integer type.
fn c_result(ctx: &mut ZulContext, result: Option<Value>) -> Emitted {
    match result {
        Some(value) => {
            let widened = ctx.builder.cast("zext", "i32", &value, "i64");
            Emitted::Value(widened, Some(ZulType::Scalar(Kind::Int)))
        }
        None => Emitted::None,
    }
}

/// `STDOUT(a, b, ...)` -> `printf("spec spec...\n", a, b, ...)`.
pub(super) fn emit_stdout(ctx: &mut ZulContext, call: &FuncCallExpr) -> Emitted {
    let mut format = String::new();
    let mut call_args = Vec::with_capacity(call.args.len() + 1);
    for (i, arg) in call.args.iter().enumerate() {
        let Some((value, ty)) = arg.value.emit(ctx).typed() else {
            return Emitted::None;
        };
        if i > 0 {
            format.push(' ');
        }
        format.push_str(format_spec(ty));
        call_args.push((ty.decayed().llvm().to_string(), value));
    }
    format.push('\n');

    let format_ptr = ctx.module.add_string(&format);
    let mut args = vec![("ptr".to_string(), format_ptr)];
    args.extend(call_args);
    let result = ctx
        .builder
        .call("i32 (ptr, ...)", &Value::raw("@printf".to_string()), &args);
    c_result(ctx, result)
}

/// `STDIN(a, b, ...)` -> `scanf("spec spec...", &a, &b, ...)`. Every
/// argument must be an l-value so the callee can write through it.
pub(super) fn emit_stdin(ctx: &mut ZulContext, call: &FuncCallExpr) -> Emitted {
    let mut format = String::new();
    let mut call_args = Vec::with_capacity(call.args.len() + 1);
    for (i, arg) in call.args.iter().enumerate() {
        if !arg.value.is_lvalue() {
            ctx.logger.log_error(
                arg.loc,
                arg.width,
                "표준 입력의 인자는 좌측값이어야 합니다",
            );
            return Emitted::None;
        }
        let Some((addr, ty)) = arg.value.emit_address(ctx) else {
            return Emitted::None;
        };
        if i > 0 {
            format.push(' ');
        }
        format.push_str(format_spec(ty));
        call_args.push(("ptr".to_string(), addr));
    }

    let format_ptr = ctx.module.add_string(&format);
    let mut args = vec![("ptr".to_string(), format_ptr)];
    args.extend(call_args);
    let result = ctx
        .builder
        .call("i32 (ptr, ...)", &Value::raw("@scanf".to_string()), &args);
    c_result(ctx, result)
}
