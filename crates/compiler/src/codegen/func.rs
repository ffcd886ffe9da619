//! Function assembly
//!
//! Instantiates the IR function for a parsed body: entry block, the
//! multi-return plumbing when the body contains two or more `ㅈㅈ`,
//! parameter slots, the body itself, and the close — default return,
//! unreachable-block pruning, or a missing-return diagnostic.

use super::{ENTRY_FN_NAME, Emitted};
use crate::ast::Ast;
use crate::context::ZulContext;
use crate::ir::{Builder, Value};
use crate::token::Loc;
use crate::types::llvm_type;

/// Emit a fully parsed function body. `ret_count` is the number of
/// `ㅈㅈ` statements the parser saw; `name_loc`/`name_width` point the
/// missing-return diagnostic at the definition's name.
pub fn create_func(
    ctx: &mut ZulContext,
    proto_idx: usize,
    body: &[Ast],
    ret_count: usize,
    name_loc: Loc,
    name_width: usize,
) {
    let proto = ctx.protos[proto_idx].clone();

    let ir_params: Vec<(String, String)> = proto
        .params
        .iter()
        .enumerate()
        .map(|(i, (name, ty))| {
            let ir_name = if name.is_empty() {
                format!("arg{}", i)
            } else {
                name.clone()
            };
            (ty.llvm().to_string(), ir_name)
        })
        .collect();
    ctx.builder.begin_function(
        &proto.name,
        llvm_type(proto.return_type),
        ir_params.clone(),
        proto.is_var_arg,
    );

    // The common return slot and block exist only for multi-return bodies.
    ctx.ret_count = ret_count;
    if ret_count > 1 {
        ctx.return_var = proto
            .return_type
            .map(|ty| ctx.builder.alloca("retval", ty.llvm()));
        ctx.return_block = Some(ctx.builder.create_block("return"));
    } else {
        ctx.return_var = None;
        ctx.return_block = None;
    }

    for ((name, ty), (_, ir_name)) in proto.params.iter().zip(&ir_params) {
        let slot = ctx.builder.alloca(&format!("{}.addr", ir_name), ty.llvm());
        ctx.builder
            .store(ty.llvm(), &Builder::param_value(ir_name), &slot);
        if !name.is_empty() {
            ctx.local_vars
                .insert(name.clone(), (Some(slot), Some(*ty)));
        }
    }

    for ast in body {
        if matches!(ast.emit(ctx), Emitted::Interrupt) {
            break;
        }
    }

    close_func(ctx, proto_idx, name_loc, name_width);

    if let Some(func) = ctx.builder.finish_function() {
        ctx.module.push_function(func);
    }
    ctx.local_vars.clear();
    ctx.ret_count = 0;
    ctx.return_var = None;
    ctx.return_block = None;
}

/// Close the current block and seal the common return block.
fn close_func(ctx: &mut ZulContext, proto_idx: usize, name_loc: Loc, name_width: usize) {
    let proto = &ctx.protos[proto_idx];
    let return_type = proto.return_type;
    let is_entry = proto.name == ENTRY_FN_NAME;

    if !ctx.builder.has_terminator() {
        if ctx.builder.cur_block_unreachable() {
            // Every path already returned; the dangling block (an if/else
            // merge, typically) and its tail go away.
            ctx.builder.prune_unreachable();
        } else if is_entry {
            let zero = match return_type {
                Some(ty) => Value::raw(ty.const_zero()),
                None => Value::imm_int(0),
            };
            match (ctx.return_block, ctx.return_var.clone(), return_type) {
                (Some(return_block), Some(return_var), Some(ty)) => {
                    ctx.builder.store(ty.llvm(), &zero, &return_var);
                    ctx.builder.br(return_block);
                }
                _ => ctx.builder.ret("i64", &zero),
            }
        } else if return_type.is_none() {
            match ctx.return_block {
                Some(return_block) if ctx.ret_count > 1 => ctx.builder.br(return_block),
                _ => ctx.builder.ret_void(),
            }
        } else {
            ctx.logger.log_error(
                name_loc,
                name_width,
                "함수의 모든 실행 경로가 값을 반환하지 않습니다",
            );
        }
    }

    if let Some(return_block) = ctx.return_block {
        ctx.builder.position_at(return_block);
        match (return_type, ctx.return_var.clone()) {
            (Some(ty), Some(return_var)) => {
                let value = ctx.builder.load(ty.llvm(), &return_var);
                ctx.builder.ret(ty.llvm(), &value);
            }
            _ => ctx.builder.ret_void(),
        }
    }
}

/// Emit `declare` lines for every prototype that never received a body.
pub fn declare_protos(ctx: &mut ZulContext) {
    let bodiless: Vec<_> = ctx
        .protos
        .iter()
        .filter(|p| !p.has_body)
        .cloned()
        .collect();
    for proto in bodiless {
        let param_tys: Vec<&str> = proto.params.iter().map(|(_, ty)| ty.llvm()).collect();
        ctx.module.declare_function(
            &proto.name,
            llvm_type(proto.return_type),
            &param_tys,
            proto.is_var_arg,
        );
    }
}
