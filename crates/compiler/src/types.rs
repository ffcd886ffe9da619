//! The Zul type algebra
//!
//! Four scalar kinds, plus fixed-size arrays of scalars (globals only) and
//! pointers to scalars (what arrays decay to when stored in a variable).
//! Scalar promotion follows the [`Kind`] ordering: the result of a binary
//! operation is the greater of the two operand kinds.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Scalar kind. The derived ordering doubles as the promotion rank:
/// `bool < char < int < float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Bool,
    Char,
    Int,
    Float,
}

impl Kind {
    /// User-facing Korean type name.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Bool => "논리",
            Kind::Char => "글자",
            Kind::Int => "수",
            Kind::Float => "실수",
        }
    }

    /// LLVM IR type for the scalar.
    pub fn llvm(self) -> &'static str {
        match self {
            Kind::Bool => "i1",
            Kind::Char => "i8",
            Kind::Int => "i64",
            Kind::Float => "double",
        }
    }
}

/// A complete Zul type: a scalar, a fixed-size array of a scalar, or a
/// pointer to a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZulType {
    Scalar(Kind),
    Array(Kind),
    Ptr(Kind),
}

impl ZulType {
    pub fn is_scalar(self) -> bool {
        matches!(self, ZulType::Scalar(_))
    }

    pub fn is_array(self) -> bool {
        matches!(self, ZulType::Array(_))
    }

    /// Scalar kind when this is a plain scalar.
    pub fn scalar(self) -> Option<Kind> {
        match self {
            ZulType::Scalar(k) => Some(k),
            _ => None,
        }
    }

    /// Element kind of an array or pointer.
    pub fn element(self) -> Option<Kind> {
        match self {
            ZulType::Array(k) | ZulType::Ptr(k) => Some(k),
            ZulType::Scalar(_) => None,
        }
    }

    /// Arrays decay to pointers when their value crosses into a variable.
    pub fn decayed(self) -> ZulType {
        match self {
            ZulType::Array(k) => ZulType::Ptr(k),
            other => other,
        }
    }

    /// User-facing name, with a `[]` suffix for arrays and pointers.
    pub fn name(self) -> String {
        match self {
            ZulType::Scalar(k) => k.name().to_string(),
            ZulType::Array(k) | ZulType::Ptr(k) => format!("{}[]", k.name()),
        }
    }

    /// LLVM IR type. Arrays appear here only as decayed values, so both
    /// arrays and pointers map to the opaque pointer type.
    pub fn llvm(self) -> &'static str {
        match self {
            ZulType::Scalar(k) => k.llvm(),
            ZulType::Array(_) | ZulType::Ptr(_) => "ptr",
        }
    }

    /// Rendered zero value of the type, used for globals and defaults.
    pub fn const_zero(self) -> String {
        match self {
            ZulType::Scalar(Kind::Float) => real_repr(0.0),
            ZulType::Scalar(_) => "0".to_string(),
            ZulType::Array(_) | ZulType::Ptr(_) => "null".to_string(),
        }
    }
}

/// Name of an optional type, `없음` standing in for "no type".
pub fn type_name(ty: Option<ZulType>) -> String {
    match ty {
        Some(t) => t.name(),
        None => "없음".to_string(),
    }
}

/// LLVM IR type of an optional type; `None` is the void return type.
pub fn llvm_type(ty: Option<ZulType>) -> &'static str {
    match ty {
        Some(t) => t.llvm(),
        None => "void",
    }
}

/// Exact IR rendering of a double constant. LLVM accepts the raw bit
/// pattern as a 16-digit hex literal, which round-trips every value.
pub fn real_repr(val: f64) -> String {
    format!("0x{:016X}", val.to_bits())
}

/// Builtin type names as they appear in source.
pub static TYPE_MAP: LazyLock<HashMap<&'static str, Kind>> = LazyLock::new(|| {
    HashMap::from([
        ("논리", Kind::Bool),
        ("글자", Kind::Char),
        ("수", Kind::Int),
        ("실수", Kind::Float),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_rank() {
        assert!(Kind::Bool < Kind::Char);
        assert!(Kind::Char < Kind::Int);
        assert!(Kind::Int < Kind::Float);
        assert_eq!(Kind::Int.max(Kind::Float), Kind::Float);
    }

    #[test]
    fn test_names() {
        assert_eq!(ZulType::Scalar(Kind::Int).name(), "수");
        assert_eq!(ZulType::Array(Kind::Int).name(), "수[]");
        assert_eq!(ZulType::Ptr(Kind::Char).name(), "글자[]");
        assert_eq!(type_name(None), "없음");
    }

    #[test]
    fn test_llvm_types() {
        assert_eq!(ZulType::Scalar(Kind::Bool).llvm(), "i1");
        assert_eq!(ZulType::Scalar(Kind::Char).llvm(), "i8");
        assert_eq!(ZulType::Scalar(Kind::Int).llvm(), "i64");
        assert_eq!(ZulType::Scalar(Kind::Float).llvm(), "double");
        assert_eq!(ZulType::Array(Kind::Int).llvm(), "ptr");
        assert_eq!(ZulType::Ptr(Kind::Char).llvm(), "ptr");
        assert_eq!(llvm_type(None), "void");
    }

    #[test]
    fn test_decay() {
        assert_eq!(ZulType::Array(Kind::Int).decayed(), ZulType::Ptr(Kind::Int));
        assert_eq!(
            ZulType::Scalar(Kind::Float).decayed(),
            ZulType::Scalar(Kind::Float)
        );
    }

    #[test]
    fn test_const_zero() {
        assert_eq!(ZulType::Scalar(Kind::Int).const_zero(), "0");
        assert_eq!(
            ZulType::Scalar(Kind::Float).const_zero(),
            "0x0000000000000000"
        );
        assert_eq!(ZulType::Ptr(Kind::Char).const_zero(), "null");
    }

    #[test]
    fn test_type_map() {
        assert_eq!(TYPE_MAP.get("수"), Some(&Kind::Int));
        assert_eq!(TYPE_MAP.get("실수"), Some(&Kind::Float));
        assert_eq!(TYPE_MAP.get("문자열"), None);
    }
}
