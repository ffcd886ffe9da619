//! Abstract syntax tree for Zul
//!
//! A tagged node type with exhaustive dispatch. Construction happens in
//! the parser; each node's IR emission lives in `codegen` and runs right
//! after its enclosing function finishes parsing. The parse-side
//! capabilities kept here are the ones the parser itself needs while
//! building the tree: constancy (global initializers), lvalue-ness
//! (assignment targets), static typing (declaration inference) and
//! constant folding (global initializers and array sizes).

use crate::context::ZulContext;
use crate::token::{Capture, Token};
use crate::types::{Kind, ZulType, real_repr};

pub type AstPtr = Box<Ast>;

/// A condition paired with the statements of its block.
pub type CondBody = (AstPtr, Vec<Ast>);

#[derive(Debug)]
pub enum Ast {
    Bool(bool),
    Char(u8),
    Int(i64),
    Real(f64),
    Str(String),
    Variable(VariableExpr),
    Subscript(SubscriptExpr),
    VariableDecl(VariableDeclExpr),
    VariableAssn(VariableAssnExpr),
    BinOp(BinOpExpr),
    UnaryOp(UnaryOpExpr),
    FuncCall(FuncCallExpr),
    Return(ReturnExpr),
    If(IfExpr),
    Loop(LoopExpr),
    Continue,
    Break,
}

/// L-value read of a named variable; resolution is local-then-global.
#[derive(Debug)]
pub struct VariableExpr {
    pub name: Capture<String>,
}

/// `target[index]`; the target must be an array (or decayed pointer) and
/// the index an integer.
#[derive(Debug)]
pub struct SubscriptExpr {
    pub target: VariableExpr,
    pub index: Capture<AstPtr>,
}

/// Local declaration, with or without annotation and initializer. The
/// name is registered in the enclosing scope eagerly at construction.
/// `ty` is the explicit annotation; an initializer-only declaration
/// adopts the initializer's emitted type during code generation.
#[derive(Debug)]
pub struct VariableDeclExpr {
    pub name: Capture<String>,
    pub ty: Option<ZulType>,
    pub body: Option<AstPtr>,
}

impl VariableDeclExpr {
    /// Build the declaration and register its name in the current scope,
    /// so a self-recursive initializer resolves to "type unknown" instead
    /// of crashing the lookup.
    pub fn new(
        name: Capture<String>,
        ty: Option<ZulType>,
        body: Option<AstPtr>,
        ctx: &mut ZulContext,
    ) -> Self {
        let registered = match ty {
            Some(t) => Some(t),
            None => body.as_ref().and_then(|b| b.static_type(ctx)),
        };
        ctx.declare_local(&name.value, registered);
        VariableDeclExpr { name, ty, body }
    }
}

/// Assignment statement, plain or compound. The target is an l-value
/// (variable or subscript), checked by the parser.
#[derive(Debug)]
pub struct VariableAssnExpr {
    pub target: AstPtr,
    pub op: Capture<Token>,
    pub body: AstPtr,
}

#[derive(Debug)]
pub struct BinOpExpr {
    pub lhs: AstPtr,
    pub rhs: AstPtr,
    pub op: Capture<Token>,
}

#[derive(Debug)]
pub struct UnaryOpExpr {
    pub op: Capture<Token>,
    pub body: AstPtr,
}

/// What a call resolves to: a user prototype by registry index, or one of
/// the two stdio intrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    Proto(usize),
    Stdin,
    Stdout,
}

#[derive(Debug)]
pub struct FuncCallExpr {
    pub callee: Callee,
    pub name: Capture<String>,
    pub args: Vec<Capture<AstPtr>>,
}

/// `ㅈㅈ`, carrying the enclosing function's declared return type so the
/// emitter can cast and complain in place.
#[derive(Debug)]
pub struct ReturnExpr {
    pub body: Option<AstPtr>,
    pub ret_type: Capture<Option<ZulType>>,
}

#[derive(Debug)]
pub struct IfExpr {
    pub if_pair: CondBody,
    pub elif_pairs: Vec<CondBody>,
    pub else_body: Vec<Ast>,
}

/// `ㄱㄱ` in any of its three forms; absent parts are `None`.
#[derive(Debug)]
pub struct LoopExpr {
    pub init: Option<AstPtr>,
    pub test: Option<AstPtr>,
    pub update: Option<AstPtr>,
    pub body: Vec<Ast>,
}

impl Ast {
    /// Whether this expression is a compile-time constant, as required of
    /// global initializers. Short-circuit operators are not constant.
    pub fn is_constant(&self) -> bool {
        match self {
            Ast::Bool(_) | Ast::Char(_) | Ast::Int(_) | Ast::Real(_) | Ast::Str(_) => true,
            Ast::UnaryOp(e) => e.body.is_constant(),
            Ast::BinOp(e) => {
                e.op.value != Token::And
                    && e.op.value != Token::Or
                    && e.lhs.is_constant()
                    && e.rhs.is_constant()
            }
            _ => false,
        }
    }

    /// Whether this expression designates a storage location.
    pub fn is_lvalue(&self) -> bool {
        matches!(self, Ast::Variable(_) | Ast::Subscript(_))
    }

    /// Type of the expression without emitting it. `None` is "no type":
    /// statements, unresolved names, operand mismatches.
    pub fn static_type(&self, ctx: &ZulContext) -> Option<ZulType> {
        match self {
            Ast::Bool(_) => Some(ZulType::Scalar(Kind::Bool)),
            Ast::Char(_) => Some(ZulType::Scalar(Kind::Char)),
            Ast::Int(_) => Some(ZulType::Scalar(Kind::Int)),
            Ast::Real(_) => Some(ZulType::Scalar(Kind::Float)),
            Ast::Str(_) => Some(ZulType::Ptr(Kind::Char)),
            Ast::Variable(e) => e.static_type(ctx),
            Ast::Subscript(e) => e
                .target
                .static_type(ctx)
                .and_then(ZulType::element)
                .map(ZulType::Scalar),
            Ast::BinOp(e) => {
                if e.op.value == Token::And || e.op.value == Token::Or {
                    return Some(ZulType::Scalar(Kind::Bool));
                }
                let lhs = e.lhs.static_type(ctx)?.scalar()?;
                let rhs = e.rhs.static_type(ctx)?.scalar()?;
                if e.op.value.is_comparison() {
                    Some(ZulType::Scalar(Kind::Bool))
                } else {
                    Some(ZulType::Scalar(lhs.max(rhs)))
                }
            }
            Ast::UnaryOp(e) => {
                if e.op.value == Token::Not {
                    Some(ZulType::Scalar(Kind::Bool))
                } else {
                    e.body.static_type(ctx)
                }
            }
            Ast::FuncCall(e) => match e.callee {
                Callee::Proto(idx) => ctx.protos[idx].return_type,
                // The stdio intrinsics surface the C return value.
                Callee::Stdin | Callee::Stdout => Some(ZulType::Scalar(Kind::Int)),
            },
            Ast::VariableDecl(_)
            | Ast::VariableAssn(_)
            | Ast::Return(_)
            | Ast::If(_)
            | Ast::Loop(_)
            | Ast::Continue
            | Ast::Break => None,
        }
    }

    /// Fold a constant expression to a value, for global initializers and
    /// array sizes. `None` when the expression is not constant or the
    /// operation is undefined (division by zero, bitwise float, ...).
    pub fn const_eval(&self) -> Option<ConstVal> {
        match self {
            Ast::Bool(v) => Some(ConstVal::Bool(*v)),
            Ast::Char(v) => Some(ConstVal::Char(*v)),
            Ast::Int(v) => Some(ConstVal::Int(*v)),
            Ast::Real(v) => Some(ConstVal::Real(*v)),
            Ast::Str(v) => Some(ConstVal::Str(v.clone())),
            Ast::UnaryOp(e) => e.body.const_eval()?.apply_unary(e.op.value),
            Ast::BinOp(e) => {
                let lhs = e.lhs.const_eval()?;
                let rhs = e.rhs.const_eval()?;
                lhs.apply_binary(e.op.value, rhs)
            }
            _ => None,
        }
    }
}

impl VariableExpr {
    pub fn static_type(&self, ctx: &ZulContext) -> Option<ZulType> {
        if let Some((_, ty)) = ctx.local_vars.get(&self.name.value) {
            return *ty;
        }
        ctx.global_vars.get(&self.name.value).map(|(_, ty)| *ty)
    }
}

/// Function prototype. Lives in the context's registry; calls reference
/// it by index so later insertions cannot invalidate anything.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncProto {
    pub name: String,
    pub return_type: Option<ZulType>,
    pub params: Vec<(String, ZulType)>,
    pub has_body: bool,
    pub is_var_arg: bool,
}

impl FuncProto {
    pub fn new(
        name: &str,
        return_type: Option<ZulType>,
        params: Vec<(String, ZulType)>,
        has_body: bool,
        is_var_arg: bool,
    ) -> Self {
        FuncProto {
            name: name.to_string(),
            return_type,
            params,
            has_body,
            is_var_arg,
        }
    }

    /// Whether a later declaration/definition is compatible with this one:
    /// arity, variadic flag, every parameter type, and the return type.
    /// Parameter names are irrelevant.
    pub fn matches(&self, other: &FuncProto) -> bool {
        self.return_type == other.return_type
            && self.is_var_arg == other.is_var_arg
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|((_, a), (_, b))| a == b)
    }
}

/// A folded compile-time constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstVal {
    Bool(bool),
    Char(u8),
    Int(i64),
    Real(f64),
    Str(String),
}

impl ConstVal {
    pub fn zul_type(&self) -> ZulType {
        match self {
            ConstVal::Bool(_) => ZulType::Scalar(Kind::Bool),
            ConstVal::Char(_) => ZulType::Scalar(Kind::Char),
            ConstVal::Int(_) => ZulType::Scalar(Kind::Int),
            ConstVal::Real(_) => ZulType::Scalar(Kind::Float),
            ConstVal::Str(_) => ZulType::Ptr(Kind::Char),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstVal::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value with bools and chars widened, for promotion.
    fn as_i64(&self) -> Option<i64> {
        match self {
            ConstVal::Bool(v) => Some(*v as i64),
            ConstVal::Char(v) => Some(*v as i64),
            ConstVal::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ConstVal::Real(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Rendered IR constant of the scalar value.
    pub fn repr(&self) -> Option<String> {
        match self {
            ConstVal::Bool(v) => Some(if *v { "true" } else { "false" }.to_string()),
            ConstVal::Char(v) => Some(v.to_string()),
            ConstVal::Int(v) => Some(v.to_string()),
            ConstVal::Real(v) => Some(real_repr(*v)),
            ConstVal::Str(_) => None,
        }
    }

    /// Fold the constant to the annotated type, following the implicit
    /// coercion rules. `None` when the conversion is not permitted.
    pub fn coerce(self, dest: ZulType) -> Option<ConstVal> {
        if self.zul_type() == dest {
            return Some(self);
        }
        match dest {
            ZulType::Scalar(Kind::Float) => self.as_f64().map(ConstVal::Real),
            ZulType::Scalar(Kind::Bool) => match self {
                ConstVal::Real(v) => Some(ConstVal::Bool(v != 0.0)),
                other => other.as_i64().map(|v| ConstVal::Bool(v != 0)),
            },
            ZulType::Scalar(Kind::Int) => match self {
                ConstVal::Real(v) => Some(ConstVal::Int(v as i64)),
                other => other.as_i64().map(ConstVal::Int),
            },
            ZulType::Scalar(Kind::Char) => match self {
                ConstVal::Real(v) => Some(ConstVal::Char(v as i64 as u8)),
                other => other.as_i64().map(|v| ConstVal::Char(v as u8)),
            },
            ZulType::Array(_) | ZulType::Ptr(_) => None,
        }
    }

    fn apply_unary(self, op: Token) -> Option<ConstVal> {
        match (op, self) {
            (Token::Add, v) => Some(v),
            (Token::Sub, ConstVal::Real(v)) => Some(ConstVal::Real(-v)),
            (Token::Sub, v) => v.as_i64().map(|v| ConstVal::Int(-v)),
            (Token::Not, ConstVal::Real(v)) => Some(ConstVal::Bool(v == 0.0)),
            (Token::Not, v) => v.as_i64().map(|v| ConstVal::Bool(v == 0)),
            (Token::BitNot, ConstVal::Real(_)) => None,
            (Token::BitNot, v) => v.as_i64().map(|v| ConstVal::Int(!v)),
            _ => None,
        }
    }

    fn apply_binary(self, op: Token, rhs: ConstVal) -> Option<ConstVal> {
        let float = matches!(self, ConstVal::Real(_)) || matches!(rhs, ConstVal::Real(_));
        if float {
            let a = self.as_f64()?;
            let b = rhs.as_f64()?;
            return match op {
                Token::Add => Some(ConstVal::Real(a + b)),
                Token::Sub => Some(ConstVal::Real(a - b)),
                Token::Mul => Some(ConstVal::Real(a * b)),
                Token::Div => Some(ConstVal::Real(a / b)),
                Token::Mod => Some(ConstVal::Real(a % b)),
                Token::Eq => Some(ConstVal::Bool(a == b)),
                Token::Ineq => Some(ConstVal::Bool(a != b)),
                Token::Gt => Some(ConstVal::Bool(a > b)),
                Token::Gteq => Some(ConstVal::Bool(a >= b)),
                Token::Lt => Some(ConstVal::Bool(a < b)),
                Token::Lteq => Some(ConstVal::Bool(a <= b)),
                _ => None,
            };
        }
        let a = self.as_i64()?;
        let b = rhs.as_i64()?;
        match op {
            Token::Add => Some(ConstVal::Int(a.wrapping_add(b))),
            Token::Sub => Some(ConstVal::Int(a.wrapping_sub(b))),
            Token::Mul => Some(ConstVal::Int(a.wrapping_mul(b))),
            Token::Div => a.checked_div(b).map(ConstVal::Int),
            Token::Mod => a.checked_rem(b).map(ConstVal::Int),
            Token::BitAnd => Some(ConstVal::Int(a & b)),
            Token::BitOr => Some(ConstVal::Int(a | b)),
            Token::BitXor => Some(ConstVal::Int(a ^ b)),
            Token::Lshift => Some(ConstVal::Int(a.wrapping_shl(b as u32))),
            Token::Rshift => Some(ConstVal::Int(a.wrapping_shr(b as u32))),
            Token::Eq => Some(ConstVal::Bool(a == b)),
            Token::Ineq => Some(ConstVal::Bool(a != b)),
            Token::Gt => Some(ConstVal::Bool(a > b)),
            Token::Gteq => Some(ConstVal::Bool(a >= b)),
            Token::Lt => Some(ConstVal::Bool(a < b)),
            Token::Lteq => Some(ConstVal::Bool(a <= b)),
            _ => None,
        }
    }
}
