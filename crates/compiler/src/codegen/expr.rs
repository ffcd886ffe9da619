//! Expression emission
//!
//! Variables resolve local-then-global at emit time; binary operators
//! promote to the larger operand kind; `&&`/`||` lower to a conditional
//! branch around the right-hand side with a phi merge.

use super::{Emitted, intrinsic, ops};
use crate::ast::{BinOpExpr, Callee, FuncCallExpr, SubscriptExpr, UnaryOpExpr, VariableExpr};
use crate::context::ZulContext;
use crate::ir::Value;
use crate::token::Token;
use crate::types::{Kind, ZulType, type_name};

impl VariableExpr {
    /// Storage address and stored type. Logs an undeclared-variable error;
    /// a name that is registered but not yet materialized (self-recursive
    /// initializer) fails quietly.
    pub fn emit_address(&self, ctx: &mut ZulContext) -> Option<(Value, ZulType)> {
        if let Some((slot, ty)) = ctx.local_vars.get(&self.name.value) {
            return match (slot, ty) {
                (Some(slot), Some(ty)) => Some((slot.clone(), *ty)),
                _ => None,
            };
        }
        if let Some((addr, ty)) = ctx.global_vars.get(&self.name.value) {
            return Some((addr.clone(), *ty));
        }
        ctx.logger.log_error_parts(
            self.name.loc,
            self.name.width,
            &["\"", &self.name.value, "\"은 존재하지 않는 변수입니다"],
        );
        None
    }

    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        let Some((addr, ty)) = self.emit_address(ctx) else {
            return Emitted::None;
        };
        match ty {
            // An array used as a value decays to a pointer to its storage.
            ZulType::Array(kind) => Emitted::Value(addr, Some(ZulType::Ptr(kind))),
            other => {
                let loaded = ctx.builder.load(other.llvm(), &addr);
                Emitted::Value(loaded, Some(other))
            }
        }
    }
}

impl SubscriptExpr {
    /// Element address via GEP. The target must be an array or pointer
    /// and the index an integer.
    pub fn emit_address(&self, ctx: &mut ZulContext) -> Option<(Value, ZulType)> {
        let target = self.target.emit_address(ctx);
        let index = self.index.value.emit(ctx).typed();
        let (target_addr, target_ty) = target?;
        let (index_val, index_ty) = index?;

        let Some(elem) = target_ty.element() else {
            ctx.logger.log_error(
                self.index.loc,
                self.index.width,
                "'[]' 연산자를 사용할 수 없습니다. 배열이 아닙니다.",
            );
            return None;
        };
        if index_ty != ZulType::Scalar(Kind::Int) {
            ctx.logger.log_error(
                self.index.loc,
                self.index.width,
                "배열의 인덱스는 정수여야 합니다",
            );
            return None;
        }
        let base = match target_ty {
            ZulType::Array(_) => target_addr,
            _ => ctx.builder.load("ptr", &target_addr),
        };
        let elem_ptr = ctx.builder.gep(elem.llvm(), &base, &index_val);
        Some((elem_ptr, ZulType::Scalar(elem)))
    }

    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        let Some((elem_ptr, elem_ty)) = self.emit_address(ctx) else {
            return Emitted::None;
        };
        let loaded = ctx.builder.load(elem_ty.llvm(), &elem_ptr);
        Emitted::Value(loaded, Some(elem_ty))
    }
}

impl BinOpExpr {
    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        if self.op.value == Token::And || self.op.value == Token::Or {
            return self.emit_short_circuit(ctx);
        }
        let lhs = self.lhs.emit(ctx).ok();
        let rhs = self.rhs.emit(ctx).ok();
        let (Some((lhs_val, lhs_ty)), Some((rhs_val, rhs_ty))) = (lhs, rhs) else {
            return Emitted::None;
        };

        let (Some(lhs_kind), Some(rhs_kind)) = (
            lhs_ty.and_then(ZulType::scalar),
            rhs_ty.and_then(ZulType::scalar),
        ) else {
            ctx.logger.log_error_parts(
                self.op.loc,
                self.op.width,
                &[
                    "좌측항의 타입 \"",
                    &type_name(lhs_ty),
                    "\" 과 우측항의 타입 \"",
                    &type_name(rhs_ty),
                    "\" 사이에 적절한 연산자 오버로드가 없습니다",
                ],
            );
            return Emitted::None;
        };

        let mut lhs = (lhs_val, ZulType::Scalar(lhs_kind));
        let mut rhs = (rhs_val, ZulType::Scalar(rhs_kind));
        let calc = lhs_kind.max(rhs_kind);
        if lhs_kind < rhs_kind && !ops::try_cast(ctx, &mut lhs, ZulType::Scalar(calc)) {
            ctx.logger.log_error_parts(
                self.op.loc,
                self.op.width,
                &[
                    "좌측항의 타입 \"",
                    lhs_kind.name(),
                    "\" 에서 우측항의 타입 \"",
                    rhs_kind.name(),
                    "\" 로 캐스팅 할 수 없습니다",
                ],
            );
            return Emitted::None;
        }
        if rhs_kind < lhs_kind && !ops::try_cast(ctx, &mut rhs, ZulType::Scalar(calc)) {
            ctx.logger.log_error_parts(
                self.op.loc,
                self.op.width,
                &[
                    "우측항의 타입 \"",
                    rhs_kind.name(),
                    "\" 에서 좌측항의 타입 \"",
                    lhs_kind.name(),
                    "\" 로 캐스팅 할 수 없습니다",
                ],
            );
            return Emitted::None;
        }

        let result = if calc == Kind::Float {
            ops::float_op(ctx, &lhs.0, &rhs.0, &self.op)
        } else {
            ops::int_op(ctx, &lhs.0, &rhs.0, calc, &self.op)
        };
        let Some(result) = result else {
            return Emitted::None;
        };
        let result_kind = if self.op.value.is_comparison() {
            Kind::Bool
        } else {
            calc
        };
        Emitted::Value(result, Some(ZulType::Scalar(result_kind)))
    }

    /// `&&`/`||`: evaluate the left side, branch around the right side,
    /// merge with a phi. The short-circuit edge carries the operator's
    /// identity constant; the other edge carries the right side coerced to
    /// boolean. Nested short-circuits move the insertion block, so the phi
    /// records whichever block actually finished the right side.
    fn emit_short_circuit(&self, ctx: &mut ZulContext) -> Emitted {
        let Some(lhs) = self.lhs.emit(ctx).typed() else {
            return Emitted::None;
        };
        let mut lhs = lhs;
        if !ops::to_boolean(ctx, &mut lhs) {
            ctx.logger.log_error(
                self.op.loc,
                self.op.width,
                "좌측항을 \"논리\" 자료형으로 캐스팅 할 수 없습니다",
            );
            return Emitted::None;
        }

        let origin_block = ctx.builder.cur_block();
        let sc_test = ctx.builder.create_block("sc_test");
        let sc_end = ctx.builder.create_block("sc_end");
        if self.op.value == Token::And {
            ctx.builder.cond_br(&lhs.0, sc_test, sc_end);
        } else {
            ctx.builder.cond_br(&lhs.0, sc_end, sc_test);
        }

        ctx.builder.position_at(sc_test);
        let Some(rhs) = self.rhs.emit(ctx).typed() else {
            return Emitted::None;
        };
        let mut rhs = rhs;
        if !ops::to_boolean(ctx, &mut rhs) {
            ctx.logger.log_error(
                self.op.loc,
                self.op.width,
                "우측항을 \"논리\" 자료형으로 캐스팅 할 수 없습니다",
            );
            return Emitted::None;
        }
        let rhs_block = ctx.builder.cur_block();
        ctx.builder.br(sc_end);

        ctx.builder.position_at(sc_end);
        let phi = ctx.builder.phi(
            "i1",
            &[
                (Value::imm_bool(self.op.value == Token::Or), origin_block),
                (rhs.0, rhs_block),
            ],
        );
        Emitted::Value(phi, Some(ZulType::Scalar(Kind::Bool)))
    }
}

impl UnaryOpExpr {
    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        let Some((value, ty)) = self.body.emit(ctx).typed() else {
            return Emitted::None;
        };
        let Some(kind) = ty.scalar() else {
            ctx.logger
                .log_error(self.op.loc, self.op.width, "단항 연산자를 적용할 수 없습니다");
            return Emitted::None;
        };
        let zero = match kind {
            Kind::Bool => Value::imm_bool(false),
            Kind::Float => Value::imm_real(0.0),
            _ => Value::imm_int(0),
        };
        match self.op.value {
            Token::Add => Emitted::Value(value, Some(ty)),
            Token::Sub => {
                let out = if kind == Kind::Float {
                    ctx.builder.bin("fsub", "double", &zero, &value)
                } else {
                    ctx.builder.bin("sub", kind.llvm(), &zero, &value)
                };
                Emitted::Value(out, Some(ty))
            }
            Token::Not => {
                let out = if kind == Kind::Float {
                    ctx.builder.fcmp("oeq", &zero, &value)
                } else {
                    ctx.builder.icmp("eq", kind.llvm(), &zero, &value)
                };
                Emitted::Value(out, Some(ZulType::Scalar(Kind::Bool)))
            }
            Token::BitNot => {
                if kind == Kind::Float {
                    ctx.logger.log_error(
                        self.op.loc,
                        self.op.width,
                        "단항 '~' 연산자를 적용할 수 없습니다",
                    );
                    return Emitted::None;
                }
                let out = ctx.builder.bin("xor", kind.llvm(), &value, &Value::imm_int(-1));
                Emitted::Value(out, Some(ty))
            }
            _ => {
                ctx.logger
                    .log_error(self.op.loc, self.op.width, "올바른 단항 연산자가 아닙니다");
                Emitted::None
            }
        }
    }
}

impl FuncCallExpr {
    pub fn emit(&self, ctx: &mut ZulContext) -> Emitted {
        match self.callee {
            Callee::Stdout => intrinsic::emit_stdout(ctx, self),
            Callee::Stdin => intrinsic::emit_stdin(ctx, self),
            Callee::Proto(idx) => self.emit_user_call(ctx, idx),
        }
    }

    fn emit_user_call(&self, ctx: &mut ZulContext, proto_idx: usize) -> Emitted {
        let proto = ctx.protos[proto_idx].clone();
        let mut call_args = Vec::with_capacity(self.args.len());
        let mut has_error = false;
        for (i, arg) in self.args.iter().enumerate() {
            let Some((value, arg_ty)) = arg.value.emit(ctx).ok() else {
                return Emitted::None;
            };
            if let Some(&(_, param_ty)) = proto.params.get(i) {
                let coerced = match arg_ty {
                    Some(ty) if ty.decayed() == param_ty => Some((value, ty.decayed())),
                    Some(ty) => {
                        let mut pair = (value, ty);
                        if ops::try_cast(ctx, &mut pair, param_ty) {
                            Some(pair)
                        } else {
                            None
                        }
                    }
                    None => None,
                };
                match coerced {
                    Some((value, _)) => call_args.push((param_ty.llvm().to_string(), value)),
                    None => {
                        ctx.logger.log_error_parts(
                            arg.loc,
                            arg.width,
                            &[
                                "인자의 타입 \"",
                                &type_name(arg_ty),
                                "\" 에서 매개변수의 타입 \"",
                                &param_ty.name(),
                                "\" 로 캐스팅 할 수 없습니다",
                            ],
                        );
                        has_error = true;
                    }
                }
            } else {
                // Variadic tail: pass the value through unchanged.
                match arg_ty {
                    Some(ty) => call_args.push((ty.decayed().llvm().to_string(), value)),
                    None => {
                        ctx.logger.log_error(
                            arg.loc,
                            arg.width,
                            "값이 없는 식은 인자로 전달할 수 없습니다",
                        );
                        has_error = true;
                    }
                }
            }
        }
        if has_error {
            return Emitted::None;
        }

        let callee = Value::global(&proto.name);
        let ret_ty = crate::types::llvm_type(proto.return_type);
        let sig = if proto.is_var_arg {
            let params = proto
                .params
                .iter()
                .map(|(_, ty)| ty.llvm())
                .collect::<Vec<_>>()
                .join(", ");
            if params.is_empty() {
                format!("{} (...)", ret_ty)
            } else {
                format!("{} ({}, ...)", ret_ty, params)
            }
        } else {
            ret_ty.to_string()
        };
        match ctx.builder.call(&sig, &callee, &call_args) {
            Some(result) => Emitted::Value(result, proto.return_type),
            None => Emitted::Value(Value::null(), None),
        }
    }
}
