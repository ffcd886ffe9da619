//! Cast insertion and operator dispatch
//!
//! The implicit-coercion rules of the language live in [`try_cast`];
//! [`int_op`]/[`float_op`] translate a source operator into the matching
//! IR instruction for an already-promoted operand pair.

use crate::context::ZulContext;
use crate::ir::Value;
use crate::token::{Capture, Token};
use crate::types::{Kind, ZulType};

/// Coerce `val` in place to `dest`. Returns false when the conversion is
/// not permitted; the caller owns the diagnostic.
///
/// Permitted conversions:
/// - identity
/// - integer kinds -> float (`sitofp`)
/// - float -> bool (`fcmp one 0`), integer -> bool (`icmp ne 0`)
/// - float -> integer kinds (`fptosi`)
/// - integer kind -> integer kind: bool widens unsigned, the rest extend
///   or truncate signed
pub fn try_cast(ctx: &mut ZulContext, val: &mut (Value, ZulType), dest: ZulType) -> bool {
    let (value, src) = (&val.0, val.1);
    if src == dest {
        return true;
    }
    let (Some(src_kind), Some(dest_kind)) = (src.scalar(), dest.scalar()) else {
        return false;
    };
    let out = match (src_kind, dest_kind) {
        (_, Kind::Float) => ctx
            .builder
            .cast("sitofp", src_kind.llvm(), value, "double"),
        (Kind::Float, Kind::Bool) => ctx.builder.fcmp("one", value, &Value::imm_real(0.0)),
        (_, Kind::Bool) => ctx
            .builder
            .icmp("ne", src_kind.llvm(), value, &Value::imm_int(0)),
        (Kind::Float, _) => ctx
            .builder
            .cast("fptosi", "double", value, dest_kind.llvm()),
        (Kind::Bool, _) => ctx.builder.cast("zext", "i1", value, dest_kind.llvm()),
        (src_kind, dest_kind) if src_kind < dest_kind => {
            ctx.builder
                .cast("sext", src_kind.llvm(), value, dest_kind.llvm())
        }
        _ => ctx
            .builder
            .cast("trunc", src_kind.llvm(), value, dest_kind.llvm()),
    };
    *val = (out, dest);
    true
}

/// Coerce `val` in place to a boolean test. Works for any scalar or
/// pointer; returns false for arrays.
pub fn to_boolean(ctx: &mut ZulContext, val: &mut (Value, ZulType)) -> bool {
    match val.1 {
        ZulType::Scalar(Kind::Bool) => true,
        ZulType::Scalar(Kind::Float) => {
            val.0 = ctx.builder.fcmp("one", &val.0, &Value::imm_real(0.0));
            val.1 = ZulType::Scalar(Kind::Bool);
            true
        }
        ZulType::Scalar(kind) => {
            val.0 = ctx
                .builder
                .icmp("ne", kind.llvm(), &val.0, &Value::imm_int(0));
            val.1 = ZulType::Scalar(Kind::Bool);
            true
        }
        ZulType::Ptr(_) => {
            val.0 = ctx.builder.icmp("ne", "ptr", &val.0, &Value::null());
            val.1 = ZulType::Scalar(Kind::Bool);
            true
        }
        ZulType::Array(_) => false,
    }
}

/// Integer-domain operation on two values of kind `kind` (bool, char or
/// int). Comparisons produce i1; the caller rewrites the result type.
pub fn int_op(
    ctx: &mut ZulContext,
    lhs: &Value,
    rhs: &Value,
    kind: Kind,
    op: &Capture<Token>,
) -> Option<Value> {
    let ty = kind.llvm();
    let out = match op.value {
        Token::Add => ctx.builder.bin("add", ty, lhs, rhs),
        Token::Sub => ctx.builder.bin("sub", ty, lhs, rhs),
        Token::Mul => ctx.builder.bin("mul", ty, lhs, rhs),
        Token::Div => ctx.builder.bin("sdiv", ty, lhs, rhs),
        Token::Mod => ctx.builder.bin("srem", ty, lhs, rhs),
        Token::BitAnd => ctx.builder.bin("and", ty, lhs, rhs),
        Token::BitOr => ctx.builder.bin("or", ty, lhs, rhs),
        Token::BitXor => ctx.builder.bin("xor", ty, lhs, rhs),
        Token::Lshift => ctx.builder.bin("shl", ty, lhs, rhs),
        // Shift right is arithmetic: operands are signed.
        Token::Rshift => ctx.builder.bin("ashr", ty, lhs, rhs),
        Token::Eq => ctx.builder.icmp("eq", ty, lhs, rhs),
        Token::Ineq => ctx.builder.icmp("ne", ty, lhs, rhs),
        Token::Gt => ctx.builder.icmp("sgt", ty, lhs, rhs),
        Token::Gteq => ctx.builder.icmp("sge", ty, lhs, rhs),
        Token::Lt => ctx.builder.icmp("slt", ty, lhs, rhs),
        Token::Lteq => ctx.builder.icmp("sle", ty, lhs, rhs),
        _ => {
            ctx.logger
                .log_error(op.loc, op.width, "올바른 이항 연산자가 아닙니다");
            return None;
        }
    };
    Some(out)
}

/// Float-domain operation. Bit operations are rejected on floats.
pub fn float_op(
    ctx: &mut ZulContext,
    lhs: &Value,
    rhs: &Value,
    op: &Capture<Token>,
) -> Option<Value> {
    let out = match op.value {
        Token::Add => ctx.builder.bin("fadd", "double", lhs, rhs),
        Token::Sub => ctx.builder.bin("fsub", "double", lhs, rhs),
        Token::Mul => ctx.builder.bin("fmul", "double", lhs, rhs),
        Token::Div => ctx.builder.bin("fdiv", "double", lhs, rhs),
        Token::Mod => ctx.builder.bin("frem", "double", lhs, rhs),
        Token::Eq => ctx.builder.fcmp("oeq", lhs, rhs),
        Token::Ineq => ctx.builder.fcmp("one", lhs, rhs),
        Token::Gt => ctx.builder.fcmp("ogt", lhs, rhs),
        Token::Gteq => ctx.builder.fcmp("oge", lhs, rhs),
        Token::Lt => ctx.builder.fcmp("olt", lhs, rhs),
        Token::Lteq => ctx.builder.fcmp("ole", lhs, rhs),
        Token::BitAnd
        | Token::BitOr
        | Token::BitXor
        | Token::Lshift
        | Token::Rshift => {
            ctx.logger.log_error(
                op.loc,
                op.width,
                "\"실수\" 타입에는 비트 연산자를 사용할 수 없습니다",
            );
            return None;
        }
        _ => {
            ctx.logger
                .log_error(op.loc, op.width, "올바른 이항 연산자가 아닙니다");
            return None;
        }
    };
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Logger;

    fn ctx_with_func() -> ZulContext {
        let mut ctx = ZulContext::new("test.zul", Logger::buffered());
        ctx.builder.begin_function("테스트", "void", vec![], false);
        ctx
    }

    fn value_of(ctx: &mut ZulContext) -> (Value, ZulType) {
        let slot = ctx.builder.alloca("x", "i64");
        let v = ctx.builder.load("i64", &slot);
        (v, ZulType::Scalar(Kind::Int))
    }

    #[test]
    fn test_cast_identity() {
        let mut ctx = ctx_with_func();
        let mut val = (Value::imm_int(1), ZulType::Scalar(Kind::Int));
        let before = val.0.clone();
        assert!(try_cast(&mut ctx, &mut val, ZulType::Scalar(Kind::Int)));
        assert_eq!(val.0, before);
    }

    #[test]
    fn test_cast_int_to_float() {
        let mut ctx = ctx_with_func();
        let mut val = value_of(&mut ctx);
        assert!(try_cast(&mut ctx, &mut val, ZulType::Scalar(Kind::Float)));
        assert_eq!(val.1, ZulType::Scalar(Kind::Float));
    }

    #[test]
    fn test_cast_bool_widens_unsigned() {
        let mut ctx = ctx_with_func();
        let mut val = (Value::imm_bool(true), ZulType::Scalar(Kind::Bool));
        assert!(try_cast(&mut ctx, &mut val, ZulType::Scalar(Kind::Int)));
        // Rendered instruction should be a zext, checked via the module.
        assert_eq!(val.1, ZulType::Scalar(Kind::Int));
    }

    #[test]
    fn test_cast_composition_reaches_same_type() {
        // char -> int -> float lands on the same type as char -> float.
        let mut ctx = ctx_with_func();
        let mut stepped = (Value::imm_char(65), ZulType::Scalar(Kind::Char));
        assert!(try_cast(&mut ctx, &mut stepped, ZulType::Scalar(Kind::Int)));
        assert!(try_cast(&mut ctx, &mut stepped, ZulType::Scalar(Kind::Float)));
        let mut direct = (Value::imm_char(65), ZulType::Scalar(Kind::Char));
        assert!(try_cast(&mut ctx, &mut direct, ZulType::Scalar(Kind::Float)));
        assert_eq!(stepped.1, direct.1);
    }

    #[test]
    fn test_cast_refuses_pointer() {
        let mut ctx = ctx_with_func();
        let mut val = (Value::null(), ZulType::Ptr(Kind::Char));
        assert!(!try_cast(&mut ctx, &mut val, ZulType::Scalar(Kind::Int)));
        assert_eq!(val.1, ZulType::Ptr(Kind::Char));
    }

    #[test]
    fn test_to_boolean_pointer() {
        let mut ctx = ctx_with_func();
        let mut val = (Value::null(), ZulType::Ptr(Kind::Char));
        assert!(to_boolean(&mut ctx, &mut val));
        assert_eq!(val.1, ZulType::Scalar(Kind::Bool));
    }

    #[test]
    fn test_to_boolean_rejects_array() {
        let mut ctx = ctx_with_func();
        let mut val = (Value::global("a"), ZulType::Array(Kind::Int));
        assert!(!to_boolean(&mut ctx, &mut val));
    }

    #[test]
    fn test_float_bit_op_rejected() {
        let mut ctx = ctx_with_func();
        let op = Capture::new(Token::BitAnd, (1, 1), 1);
        let lhs = Value::imm_real(1.0);
        let rhs = Value::imm_real(2.0);
        assert!(float_op(&mut ctx, &lhs, &rhs, &op).is_none());
        assert!(ctx.logger.has_error());
    }

    #[test]
    fn test_comparison_dispatch() {
        let mut ctx = ctx_with_func();
        let op = Capture::new(Token::Lteq, (1, 1), 2);
        let lhs = Value::imm_int(1);
        let rhs = Value::imm_int(2);
        assert!(int_op(&mut ctx, &lhs, &rhs, Kind::Int, &op).is_some());
        assert!(!ctx.logger.has_error());
    }
}
