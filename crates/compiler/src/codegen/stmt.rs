//! Statement emission
//!
//! Declarations allocate in the entry block; `if` chains thread one
//! condition block into the next; loops push their update/end blocks for
//! `ㅌㅌ`/`ㅅㄱ` and pop them on every exit path.

use super::{Emitted, emit_stmt_list, ops};
use crate::ast::{IfExpr, LoopExpr, ReturnExpr, VariableAssnExpr, VariableDeclExpr};
use crate::context::ZulContext;
use crate::token::Token;
use crate::types::{Kind, ZulType, type_name};

impl VariableDeclExpr {
    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        let mut init = None;
        let mut final_ty = self.ty;
        if let Some(body) = &self.body {
            let Some((value, body_ty)) = body.emit(ctx).ok() else {
                return Emitted::None;
            };
            match (self.ty, body_ty) {
                (Some(annot), body_ty) if body_ty != Some(annot) => {
                    let coerced = body_ty.and_then(|ty| {
                        let mut pair = (value.clone(), ty);
                        ops::try_cast(ctx, &mut pair, annot).then_some(pair.0)
                    });
                    let Some(coerced) = coerced else {
                        ctx.logger.log_error_parts(
                            self.name.loc,
                            self.name.width,
                            &[
                                "대입 연산식의 타입 \"",
                                &type_name(body_ty),
                                "\" 에서 변수의 타입 \"",
                                &annot.name(),
                                "\" 로 캐스팅 할 수 없습니다",
                            ],
                        );
                        return Emitted::None;
                    };
                    init = Some(coerced);
                }
                (Some(_), _) => init = Some(value),
                (None, body_ty) => {
                    final_ty = body_ty;
                    init = Some(value);
                }
            }
        }
        let Some(ty) = final_ty else {
            ctx.logger.log_error(
                self.name.loc,
                self.name.width,
                "\"없음\" 타입의 변수를 생성할 수 없습니다",
            );
            return Emitted::None;
        };
        // Arrays live only as globals; a decayed value stores as a pointer.
        let ty = ty.decayed();
        let slot = ctx.builder.alloca(&self.name.value, ty.llvm());
        ctx.local_vars
            .insert(self.name.value.clone(), (Some(slot.clone()), Some(ty)));
        if let Some(init) = init {
            ctx.builder.store(ty.llvm(), &init, &slot);
        }
        Emitted::Value(slot, Some(ty))
    }
}

impl VariableAssnExpr {
    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        let target = self.target.emit(ctx).ok();
        let body = self.body.emit(ctx).ok();
        let (Some((target_val, target_ty)), Some((body_val, body_ty))) = (target, body) else {
            return Emitted::None;
        };

        let (Some(target_kind), Some(body_kind)) = (
            target_ty.and_then(ZulType::scalar),
            body_ty.and_then(ZulType::scalar),
        ) else {
            ctx.logger.log_error_parts(
                self.op.loc,
                self.op.width,
                &[
                    "변수의 타입 \"",
                    &type_name(target_ty),
                    "\" 과 대입 연산식의 타입 \"",
                    &type_name(body_ty),
                    "\" 사이에 적절한 연산자 오버로드가 없습니다",
                ],
            );
            return Emitted::None;
        };

        let mut body = (body_val, ZulType::Scalar(body_kind));
        if body_kind != target_kind
            && !ops::try_cast(ctx, &mut body, ZulType::Scalar(target_kind))
        {
            ctx.logger.log_error_parts(
                self.op.loc,
                self.op.width,
                &[
                    "대입 연산식의 타입 \"",
                    body_kind.name(),
                    "\" 에서 변수의 타입 \"",
                    target_kind.name(),
                    "\" 로 캐스팅 할 수 없습니다",
                ],
            );
            return Emitted::None;
        }

        let result = if self.op.value == Token::Assn {
            body.0
        } else {
            // Compound assignment lowers to the plain operator plus store.
            let base_op = match self.op.value.compound_base() {
                Some(base) => self.op.with_value(base),
                None => {
                    ctx.logger
                        .log_error(self.op.loc, self.op.width, "올바른 대입 연산자가 아닙니다");
                    return Emitted::None;
                }
            };
            let computed = if target_kind == Kind::Float {
                ops::float_op(ctx, &target_val, &body.0, &base_op)
            } else {
                ops::int_op(ctx, &target_val, &body.0, target_kind, &base_op)
            };
            let Some(computed) = computed else {
                return Emitted::None;
            };
            computed
        };

        let Some((target_addr, _)) = self.target.emit_address(ctx) else {
            return Emitted::None;
        };
        ctx.builder
            .store(target_kind.llvm(), &result, &target_addr);
        Emitted::Value(result, Some(ZulType::Scalar(target_kind)))
    }
}

impl ReturnExpr {
    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        let body_val = match &self.body {
            Some(body) => match body.emit(ctx).ok() {
                Some(pair) => Some(pair),
                None => return Emitted::None,
            },
            None => None,
        };

        match self.ret_type.value {
            // Void function: a value-less return, direct or through the
            // common return block.
            None => {
                if ctx.ret_count == 1 {
                    ctx.builder.ret_void();
                } else if let Some(return_block) = ctx.return_block {
                    ctx.builder.br(return_block);
                }
            }
            Some(ret_ty) => {
                let coerced = body_val.and_then(|(value, body_ty)| match body_ty {
                    Some(ty) if ty == ret_ty => Some((value, ty)),
                    Some(ty) => {
                        let mut pair = (value, ty);
                        ops::try_cast(ctx, &mut pair, ret_ty).then_some(pair)
                    }
                    None => None,
                });
                match coerced {
                    None => {
                        let body_ty = self
                            .body
                            .as_ref()
                            .and_then(|b| b.static_type(ctx));
                        ctx.logger.log_error_parts(
                            self.ret_type.loc,
                            self.ret_type.width,
                            &[
                                "리턴 타입이 일치하지 않습니다. 반환 구문의 타입 \"",
                                &type_name(body_ty),
                                "\" 에서 리턴 타입 \"",
                                &ret_ty.name(),
                                "\" 로 캐스팅 할 수 없습니다",
                            ],
                        );
                    }
                    Some((value, _)) => {
                        if ctx.ret_count == 1 {
                            ctx.builder.ret(ret_ty.llvm(), &value);
                        } else if let (Some(return_block), Some(return_var)) =
                            (ctx.return_block, ctx.return_var.clone())
                        {
                            ctx.builder.store(ret_ty.llvm(), &value, &return_var);
                            ctx.builder.br(return_block);
                        }
                    }
                }
            }
        }
        Emitted::Interrupt
    }
}

impl IfExpr {
    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        let Some(cond) = self.if_pair.0.emit(ctx).typed() else {
            return Emitted::None;
        };
        let mut prev_cond = cond;
        if !ops::to_boolean(ctx, &mut prev_cond) {
            return Emitted::None;
        }

        let mut body_block = ctx.builder.create_block("if");
        let merge_block = ctx.builder.create_block("merge");
        let mut prev_block = ctx.builder.cur_block();

        ctx.builder.position_at(body_block);
        if !emit_stmt_list(ctx, &self.if_pair.1) {
            ctx.builder.br(merge_block);
        }

        for (elif_cond, elif_body) in &self.elif_pairs {
            let elif_cond_block = ctx.builder.create_block("elif_cond");
            ctx.builder.position_at(prev_block);
            ctx.builder.cond_br(&prev_cond.0, body_block, elif_cond_block);

            ctx.builder.position_at(elif_cond_block);
            let Some(cond) = elif_cond.emit(ctx).typed() else {
                return Emitted::None;
            };
            prev_cond = cond;
            if !ops::to_boolean(ctx, &mut prev_cond) {
                return Emitted::None;
            }

            body_block = ctx.builder.create_block("elif");
            ctx.builder.position_at(body_block);
            if !emit_stmt_list(ctx, elif_body) {
                ctx.builder.br(merge_block);
            }
            prev_block = elif_cond_block;
        }

        if self.else_body.is_empty() {
            ctx.builder.position_at(prev_block);
            ctx.builder.cond_br(&prev_cond.0, body_block, merge_block);
        } else {
            let else_block = ctx.builder.create_block("else");
            ctx.builder.position_at(prev_block);
            ctx.builder.cond_br(&prev_cond.0, body_block, else_block);

            ctx.builder.position_at(else_block);
            if !emit_stmt_list(ctx, &self.else_body) {
                ctx.builder.br(merge_block);
            }
        }

        // The merge block is created even when every branch terminates;
        // the pruner removes it at function close.
        ctx.builder.position_at(merge_block);
        Emitted::None
    }
}

impl LoopExpr {
    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        let test_block = ctx.builder.create_block("loop_test");
        let start_block = ctx.builder.create_block("loop_start");
        let update_block = ctx.builder.create_block("loop_update");
        let end_block = ctx.builder.create_block("loop_end");

        // The stacks must pop on every exit, including the error returns
        // inside; run the body through a helper so leave_loop is the
        // single unwinding point.
        ctx.enter_loop(update_block, end_block);
        let result = self.emit_inner(ctx, test_block, start_block, update_block, end_block);
        ctx.leave_loop();
        result
    }

    fn emit_inner(
        &self,
        ctx: &mut ZulContext,
        test_block: crate::ir::BlockId,
        start_block: crate::ir::BlockId,
        update_block: crate::ir::BlockId,
        end_block: crate::ir::BlockId,
    ) -> Emitted {
        if let Some(init) = &self.init
            && init.emit(ctx).ok().is_none()
        {
            return Emitted::None;
        }

        ctx.builder.br(test_block);
        ctx.builder.position_at(test_block);
        match &self.test {
            Some(test) => {
                let Some(cond) = test.emit(ctx).typed() else {
                    return Emitted::None;
                };
                let mut cond = cond;
                if !ops::to_boolean(ctx, &mut cond) {
                    return Emitted::None;
                }
                ctx.builder.cond_br(&cond.0, start_block, end_block);
            }
            None => ctx.builder.br(start_block),
        }

        ctx.builder.position_at(start_block);
        if !emit_stmt_list(ctx, &self.body) {
            ctx.builder.br(update_block);
        }

        ctx.builder.position_at(update_block);
        if let Some(update) = &self.update
            && update.emit(ctx).ok().is_none()
        {
            return Emitted::None;
        }
        ctx.builder.br(test_block);

        ctx.builder.position_at(end_block);
        Emitted::None
    }
}

/// `ㅌㅌ`: branch to the innermost loop's update block.
pub(super) fn emit_continue(ctx: &mut ZulContext) -> Emitted {
    if let Some(&update_block) = ctx.loop_update_stack.last() {
        ctx.builder.br(update_block);
    }
    Emitted::Interrupt
}

/// `ㅅㄱ`: branch to the innermost loop's end block.
pub(super) fn emit_break(ctx: &mut ZulContext) -> Emitted {
    if let Some(&end_block) = ctx.loop_end_stack.last() {
        ctx.builder.br(end_block);
    }
    Emitted::Interrupt
}
