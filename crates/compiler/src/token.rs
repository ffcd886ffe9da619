//! Token definitions for the Zul lexer
//!
//! Keywords are Korean consonant clusters (`ㅎㅇ`, `ㄱㄱ`, ...) and every
//! token remembers where it came from through [`Capture`], so later phases
//! can point diagnostics at the exact source column.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // keywords
    /// `ㅎㅇ` - function (or class, reserved) definition
    Hi,
    /// `ㄱㄱ` - for loop
    Go,
    /// `ㅇㅈ?` - if
    Ij,
    /// `ㄴㄴ?` - elif
    No,
    /// `ㄴㄴ` - else
    Nope,
    /// `ㅈㅈ` - return
    Gg,
    /// `ㅅㄱ` - break
    Sg,
    /// `ㅌㅌ` - continue
    Tt,
    /// `참` - boolean true literal
    True,
    /// `거짓` - boolean false literal
    False,

    // primaries
    Identifier,
    Int,
    Real,
    Indent,
    Newline,

    // punctuation
    Comma,
    Colon,
    Semicolon,
    Lpar,
    Rpar,
    Lsqbrk,
    Rsqbrk,
    Lbrk,
    Rbrk,
    Dot,
    Dquotes,
    Squotes,
    /// `//` line comment lead-in (consumed by the lexer itself)
    Anno,
    /// `...` variadic parameter marker
    VaArg,

    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // logical / bitwise
    And,
    Or,
    Not,
    BitAnd,
    BitOr,
    BitNot,
    BitXor,
    Lshift,
    Rshift,

    // assignment family
    Assn,
    MulAssn,
    DivAssn,
    ModAssn,
    AddAssn,
    SubAssn,
    LshiftAssn,
    RshiftAssn,
    AndAssn,
    OrAssn,
    XorAssn,

    // comparisons
    Eq,
    Ineq,
    Gt,
    Gteq,
    Lt,
    Lteq,

    Eof,
    Undefined,
}

impl Token {
    /// True for `=` and the whole compound assignment family.
    pub fn is_assign(self) -> bool {
        matches!(
            self,
            Token::Assn
                | Token::MulAssn
                | Token::DivAssn
                | Token::ModAssn
                | Token::AddAssn
                | Token::SubAssn
                | Token::LshiftAssn
                | Token::RshiftAssn
                | Token::AndAssn
                | Token::OrAssn
                | Token::XorAssn
        )
    }

    /// The plain operator a compound assignment lowers to (`+=` -> `+`).
    pub fn compound_base(self) -> Option<Token> {
        match self {
            Token::MulAssn => Some(Token::Mul),
            Token::DivAssn => Some(Token::Div),
            Token::ModAssn => Some(Token::Mod),
            Token::AddAssn => Some(Token::Add),
            Token::SubAssn => Some(Token::Sub),
            Token::LshiftAssn => Some(Token::Lshift),
            Token::RshiftAssn => Some(Token::Rshift),
            Token::AndAssn => Some(Token::BitAnd),
            Token::OrAssn => Some(Token::BitOr),
            Token::XorAssn => Some(Token::BitXor),
            _ => None,
        }
    }

    /// True for the six comparison operators, whose result type is always
    /// the boolean type regardless of operand types.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Token::Eq | Token::Ineq | Token::Gt | Token::Gteq | Token::Lt | Token::Lteq
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Token::Hi => "tok_hi",
            Token::Go => "tok_go",
            Token::Ij => "tok_ij",
            Token::No => "tok_no",
            Token::Nope => "tok_nope",
            Token::Gg => "tok_gg",
            Token::Sg => "tok_sg",
            Token::Tt => "tok_tt",
            Token::True => "tok_true",
            Token::False => "tok_false",
            Token::Identifier => "tok_identifier",
            Token::Int => "tok_int",
            Token::Real => "tok_real",
            Token::Indent => "tok_indent",
            Token::Newline => "tok_newline",
            Token::Comma => "tok_comma",
            Token::Colon => "tok_colon",
            Token::Semicolon => "tok_semicolon",
            Token::Lpar => "tok_lpar",
            Token::Rpar => "tok_rpar",
            Token::Lsqbrk => "tok_lsqbrk",
            Token::Rsqbrk => "tok_rsqbrk",
            Token::Lbrk => "tok_lbrk",
            Token::Rbrk => "tok_rbrk",
            Token::Dot => "tok_dot",
            Token::Dquotes => "tok_dquotes",
            Token::Squotes => "tok_squotes",
            Token::Anno => "tok_anno",
            Token::VaArg => "tok_va_arg",
            Token::Add => "tok_add",
            Token::Sub => "tok_sub",
            Token::Mul => "tok_mul",
            Token::Div => "tok_div",
            Token::Mod => "tok_mod",
            Token::And => "tok_and",
            Token::Or => "tok_or",
            Token::Not => "tok_not",
            Token::BitAnd => "tok_bitand",
            Token::BitOr => "tok_bitor",
            Token::BitNot => "tok_bitnot",
            Token::BitXor => "tok_bitxor",
            Token::Lshift => "tok_lshift",
            Token::Rshift => "tok_rshift",
            Token::Assn => "tok_assn",
            Token::MulAssn => "tok_mul_assn",
            Token::DivAssn => "tok_div_assn",
            Token::ModAssn => "tok_mod_assn",
            Token::AddAssn => "tok_add_assn",
            Token::SubAssn => "tok_sub_assn",
            Token::LshiftAssn => "tok_lshift_assn",
            Token::RshiftAssn => "tok_rshift_assn",
            Token::AndAssn => "tok_and_assn",
            Token::OrAssn => "tok_or_assn",
            Token::XorAssn => "tok_xor_assn",
            Token::Eq => "tok_eq",
            Token::Ineq => "tok_ineq",
            Token::Gt => "tok_gt",
            Token::Gteq => "tok_gteq",
            Token::Lt => "tok_lt",
            Token::Lteq => "tok_lteq",
            Token::Eof => "tok_eof",
            Token::Undefined => "tok_undefined",
        };
        f.write_str(name)
    }
}

/// Fixed lexeme table. Every prefix of a multi-character operator is itself
/// an operator, which is what lets the lexer extend greedily and back off
/// one character at the end.
pub static TOKEN_MAP: LazyLock<HashMap<&'static str, Token>> = LazyLock::new(|| {
    HashMap::from([
        ("ㅎㅇ", Token::Hi),
        ("ㄱㄱ", Token::Go),
        ("ㅇㅈ?", Token::Ij),
        ("ㄴㄴ?", Token::No),
        ("ㄴㄴ", Token::Nope),
        ("ㅈㅈ", Token::Gg),
        ("ㅅㄱ", Token::Sg),
        ("ㅌㅌ", Token::Tt),
        ("참", Token::True),
        ("거짓", Token::False),
        (",", Token::Comma),
        (":", Token::Colon),
        (";", Token::Semicolon),
        ("(", Token::Lpar),
        (")", Token::Rpar),
        ("[", Token::Lsqbrk),
        ("]", Token::Rsqbrk),
        ("{", Token::Lbrk),
        ("}", Token::Rbrk),
        (".", Token::Dot),
        ("\"", Token::Dquotes),
        ("'", Token::Squotes),
        ("//", Token::Anno),
        ("...", Token::VaArg),
        ("+", Token::Add),
        ("-", Token::Sub),
        ("*", Token::Mul),
        ("/", Token::Div),
        ("%", Token::Mod),
        ("&&", Token::And),
        ("||", Token::Or),
        ("!", Token::Not),
        ("&", Token::BitAnd),
        ("|", Token::BitOr),
        ("~", Token::BitNot),
        ("^", Token::BitXor),
        ("<<", Token::Lshift),
        (">>", Token::Rshift),
        ("=", Token::Assn),
        ("*=", Token::MulAssn),
        ("/=", Token::DivAssn),
        ("%=", Token::ModAssn),
        ("+=", Token::AddAssn),
        ("-=", Token::SubAssn),
        ("<<=", Token::LshiftAssn),
        (">>=", Token::RshiftAssn),
        ("&=", Token::AndAssn),
        ("|=", Token::OrAssn),
        ("^=", Token::XorAssn),
        ("==", Token::Eq),
        ("!=", Token::Ineq),
        (">", Token::Gt),
        (">=", Token::Gteq),
        ("<", Token::Lt),
        ("<=", Token::Lteq),
    ])
});

/// `(row, column)` source position. Rows are 1-based; columns count code
/// points, not bytes, so Korean text lines up with diagnostic carets.
pub type Loc = (usize, usize);

/// A value bundled with its source location and its width in code-point
/// columns, so every AST subpart can produce pinpoint diagnostics.
#[derive(Debug, Clone)]
pub struct Capture<T> {
    pub value: T,
    pub loc: Loc,
    pub width: usize,
}

impl<T> Capture<T> {
    pub fn new(value: T, loc: Loc, width: usize) -> Self {
        Capture { value, loc, width }
    }

    /// Re-wrap another value at the same source position.
    pub fn with_value<U>(&self, value: U) -> Capture<U> {
        Capture {
            value,
            loc: self.loc,
            width: self.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TOKEN_MAP.get("ㅎㅇ"), Some(&Token::Hi));
        assert_eq!(TOKEN_MAP.get("ㅇㅈ?"), Some(&Token::Ij));
        assert_eq!(TOKEN_MAP.get("참"), Some(&Token::True));
        assert_eq!(TOKEN_MAP.get("거짓"), Some(&Token::False));
        assert_eq!(TOKEN_MAP.get("없는키워드"), None);
    }

    #[test]
    fn test_operator_prefixes_are_operators() {
        // The maximal-munch scan relies on every operator prefix being a key.
        for op in ["<<=", ">>=", "&&", "||", "==", "!=", "//"] {
            let mut prefix = String::new();
            for c in op.chars().take(op.chars().count() - 1) {
                prefix.push(c);
                assert!(
                    TOKEN_MAP.contains_key(prefix.as_str()),
                    "prefix {prefix:?} of {op:?} missing from table"
                );
            }
        }
    }

    #[test]
    fn test_compound_base() {
        assert_eq!(Token::AddAssn.compound_base(), Some(Token::Add));
        assert_eq!(Token::LshiftAssn.compound_base(), Some(Token::Lshift));
        assert_eq!(Token::XorAssn.compound_base(), Some(Token::BitXor));
        assert_eq!(Token::Assn.compound_base(), None);
        assert_eq!(Token::Eq.compound_base(), None);
    }

    #[test]
    fn test_is_assign_family() {
        assert!(Token::Assn.is_assign());
        assert!(Token::ModAssn.is_assign());
        assert!(!Token::Eq.is_assign());
        assert!(!Token::Colon.is_assign());
    }

    #[test]
    fn test_comparison_set() {
        assert!(Token::Eq.is_comparison());
        assert!(Token::Lteq.is_comparison());
        assert!(!Token::And.is_comparison());
        assert!(!Token::Add.is_comparison());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Token::Hi.to_string(), "tok_hi");
        assert_eq!(Token::LshiftAssn.to_string(), "tok_lshift_assn");
        assert_eq!(Token::Undefined.to_string(), "tok_undefined");
    }

    #[test]
    fn test_capture_rewrap() {
        let cap = Capture::new("이름".to_string(), (3, 7), 2);
        let other = cap.with_value(Token::Identifier);
        assert_eq!(other.loc, (3, 7));
        assert_eq!(other.width, 2);
        assert_eq!(other.value, Token::Identifier);
    }
}
