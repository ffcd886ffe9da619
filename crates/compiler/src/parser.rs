//! Recursive-descent parser for Zul
//!
//! The parser drives the lexer one token of lookahead at a time and fuses
//! the later phases into the descent: identifiers resolve against the
//! context's symbol tables while parsing, declarations register their
//! names eagerly, and a finished function body is emitted immediately via
//! `codegen::create_func`. Errors are never fatal; statement-level
//! problems skip to the next newline and expression-level problems fall
//! out through `Option`.
//!
//! Layout drives block structure: `parse_block_body(target_level)`
//! collects statements while the line indentation stays at `target_level`
//! and returns the level of the line that ended the block, so `ㅇㅈ?`
//! chains can decide whether a following `ㄴㄴ?`/`ㄴㄴ` still belongs to
//! them.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::ast::{
    Ast, AstPtr, BinOpExpr, Callee, CondBody, FuncCallExpr, FuncProto, IfExpr, LoopExpr,
    ReturnExpr, SubscriptExpr, UnaryOpExpr, VariableAssnExpr, VariableDeclExpr, VariableExpr,
};
use crate::codegen::{self, ENTRY_FN_NAME};
use crate::context::ZulContext;
use crate::diag::Logger;
use crate::lexer::Lexer;
use crate::token::{Capture, Loc, Token};
use crate::types::{Kind, TYPE_MAP, ZulType};

/// Builtin output intrinsic, rewritten to `printf`.
const STDOUT_NAME: &str = "STDOUT";
/// Builtin input intrinsic, rewritten to `scanf`.
const STDIN_NAME: &str = "STDIN";

/// Operator precedence; higher binds tighter. Unary operators sit above
/// all of these and are handled by `parse_primary` directly. Assignment
/// operators share the lowest level and are statement-level only.
static OP_PREC_MAP: LazyLock<HashMap<Token, i32>> = LazyLock::new(|| {
    HashMap::from([
        (Token::Mul, 110),
        (Token::Div, 110),
        (Token::Mod, 110),
        (Token::Add, 100),
        (Token::Sub, 100),
        (Token::Lshift, 90),
        (Token::Rshift, 90),
        (Token::Lt, 80),
        (Token::Gt, 80),
        (Token::Lteq, 80),
        (Token::Gteq, 80),
        (Token::Eq, 70),
        (Token::Ineq, 70),
        (Token::BitAnd, 60),
        (Token::BitXor, 50),
        (Token::BitOr, 40),
        (Token::And, 30),
        (Token::Or, 20),
        (Token::Assn, 10),
        (Token::MulAssn, 10),
        (Token::DivAssn, 10),
        (Token::ModAssn, 10),
        (Token::AddAssn, 10),
        (Token::SubAssn, 10),
        (Token::LshiftAssn, 10),
        (Token::RshiftAssn, 10),
        (Token::AndAssn, 10),
        (Token::OrAssn, 10),
        (Token::XorAssn, 10),
    ])
});

pub struct Parser {
    lexer: Lexer,
    ctx: ZulContext,
    cur_tok: Token,
    /// Declared return type of the function being parsed.
    cur_ret_type: Option<ZulType>,
    /// `ㅈㅈ` statements seen in the current function body.
    ret_count: usize,
}

impl Parser {
    pub fn new(source: &str, source_name: &str, logger: Logger) -> Self {
        let mut ctx = ZulContext::new(source_name, logger);
        ctx.logger.set_source_name(source_name);
        let mut parser = Parser {
            lexer: Lexer::new(source),
            ctx,
            cur_tok: Token::Undefined,
            cur_ret_type: None,
            ret_count: 0,
        };
        parser.advance();
        parser
    }

    /// Run the whole pipeline over the token stream and hand back the
    /// context holding the module and the diagnostics.
    pub fn parse(mut self) -> ZulContext {
        self.parse_top_level();
        codegen::declare_protos(&mut self.ctx);
        self.ctx
    }

    fn advance(&mut self) {
        self.cur_tok = self.lexer.get_token(&mut self.ctx.logger);
    }

    fn op_prec(&self) -> i32 {
        OP_PREC_MAP.get(&self.cur_tok).copied().unwrap_or(-1)
    }

    /// "unexpected token" with context, shaped by what was actually there.
    fn log_unexpected(&mut self, msg: &str) {
        if self.cur_tok == Token::Eof {
            self.lexer
                .log_token_parts(&mut self.ctx.logger, &["예기치 않은 EOF. ", msg]);
        } else if self.cur_tok == Token::Newline {
            self.lexer
                .log_token_parts(&mut self.ctx.logger, &["예기치 않은 줄바꿈. ", msg]);
        } else {
            let word = self.lexer.word().to_string();
            self.lexer.log_token_parts(
                &mut self.ctx.logger,
                &["예기치 않은 토큰 \"", &word, "\" ", msg],
            );
        }
    }

    fn log_cur_token(&mut self, msg: &str) {
        self.lexer.log_token(&mut self.ctx.logger, msg);
    }

    fn log_cur_token_parts(&mut self, parts: &[&str]) {
        self.lexer.log_token_parts(&mut self.ctx.logger, parts);
    }

    /// Statement-level recovery: stop before the next newline.
    fn skip_to_newline(&mut self) {
        while self.cur_tok != Token::Newline && self.cur_tok != Token::Eof {
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    fn parse_top_level(&mut self) {
        loop {
            match self.cur_tok {
                Token::Eof => break,
                Token::Newline => {
                    self.advance();
                    self.ctx.logger.flush();
                }
                Token::Identifier => self.parse_global_var(),
                Token::Hi => {
                    self.advance();
                    if self.cur_tok != Token::Identifier {
                        self.log_cur_token("함수 또는 클래스의 이름이 와야 합니다");
                        self.skip_to_newline();
                        continue;
                    }
                    let name = self.lexer.word().to_string();
                    let name_loc = self.lexer.token_loc();
                    let name_width = self.lexer.word_width();
                    self.advance();
                    match self.cur_tok {
                        Token::Colon => {
                            // Reserved for classes.
                            self.ctx.logger.log_error(
                                name_loc,
                                name_width,
                                "아직 클래스는 지원되지 않습니다",
                            );
                            self.skip_to_newline();
                        }
                        Token::Lpar => {
                            self.advance();
                            self.parse_func_def(name, name_loc, name_width);
                        }
                        _ => {
                            self.log_unexpected("'('가 와야 합니다");
                            self.skip_to_newline();
                        }
                    }
                }
                _ => {
                    let word = self.lexer.word().to_string();
                    self.log_cur_token_parts(&["예기치 않은 토큰 \"", &word, "\""]);
                    self.advance();
                }
            }
        }
        self.ctx.logger.flush();
    }

    // ------------------------------------------------------------------
    // Global variables
    // ------------------------------------------------------------------

    fn parse_global_var(&mut self) {
        let name = self.lexer.word().to_string();
        let name_loc = self.lexer.token_loc();
        let name_width = self.lexer.word_width();
        self.advance();
        match self.cur_tok {
            Token::Colon => {
                self.advance();
                let Some((kind, size)) = self.parse_type(false) else {
                    self.skip_to_newline();
                    return;
                };
                if self.ctx.var_exists(&name) {
                    self.ctx
                        .logger
                        .log_error(name_loc, name_width, "변수가 다시 정의되었습니다.");
                    self.skip_to_newline();
                    return;
                }
                match size {
                    Some(size) => self.define_global_array(name, kind, size),
                    None => self.define_global_scalar(name, kind),
                }
            }
            Token::Assn => {
                let op_loc = self.lexer.token_loc();
                self.advance();
                let Some(init) = self.parse_expr() else {
                    self.skip_to_newline();
                    return;
                };
                if self.ctx.var_exists(&name) {
                    self.ctx
                        .logger
                        .log_error(name_loc, name_width, "변수가 다시 정의되었습니다.");
                    return;
                }
                self.define_global_inferred(name, op_loc, &init);
            }
            _ => {
                let word = self.lexer.word().to_string();
                self.log_cur_token_parts(&["예기치 않은 토큰 \"", &word, "\""]);
                self.advance();
            }
        }
    }

    fn define_global_array(&mut self, name: String, kind: Kind, size: Capture<AstPtr>) {
        if self.cur_tok == Token::Assn {
            self.log_cur_token("배열은 선언과 동시에 초기화할 수 없습니다");
            self.skip_to_newline();
            return;
        }
        match size.value.const_eval().and_then(|c| c.as_int()) {
            Some(n) if n > 0 => {
                let addr = self.ctx.module.add_global_array(&name, kind.llvm(), n as u64);
                self.ctx
                    .global_vars
                    .insert(name, (addr, ZulType::Array(kind)));
            }
            _ => {
                self.ctx.logger.log_error(
                    size.loc,
                    size.width,
                    "배열의 크기는 양의 정수인 상수여야 합니다",
                );
            }
        }
    }

    fn define_global_scalar(&mut self, name: String, kind: Kind) {
        let ty = ZulType::Scalar(kind);
        if self.cur_tok != Token::Assn {
            let addr = self.ctx.module.add_global(&name, ty.llvm(), &ty.const_zero());
            self.ctx.global_vars.insert(name, (addr, ty));
            return;
        }
        // Annotated initializer: fold and coerce to the annotation. Type
        // mismatches point at the `=` operator.
        let op_loc = self.lexer.token_loc();
        self.advance();
        let Some(init) = self.parse_expr() else {
            self.skip_to_newline();
            return;
        };
        if !init.is_constant() {
            self.ctx
                .logger
                .log_error(op_loc, 1, "전역 변수의 초기화 식은 상수여야 합니다");
            return;
        }
        let folded = init.const_eval();
        let coerced = folded.clone().and_then(|c| c.coerce(ty));
        match coerced.and_then(|c| c.repr()) {
            Some(repr) => {
                let addr = self.ctx.module.add_global(&name, ty.llvm(), &repr);
                self.ctx.global_vars.insert(name, (addr, ty));
            }
            None => {
                let from = crate::types::type_name(folded.map(|c| c.zul_type()));
                self.ctx.logger.log_error_parts(
                    op_loc,
                    1,
                    &[
                        "대입 연산식의 타입 \"",
                        &from,
                        "\" 에서 변수의 타입 \"",
                        &ty.name(),
                        "\" 로 캐스팅 할 수 없습니다",
                    ],
                );
            }
        }
    }

    fn define_global_inferred(&mut self, name: String, op_loc: Loc, init: &Ast) {
        if !init.is_constant() {
            self.ctx
                .logger
                .log_error(op_loc, 1, "전역 변수의 초기화 식은 상수여야 합니다");
            return;
        }
        match init.const_eval() {
            Some(crate::ast::ConstVal::Str(s)) => {
                // A string literal initializes a char-pointer global.
                let str_addr = self.ctx.module.add_string(&s);
                let addr = self.ctx.module.add_global(&name, "ptr", str_addr.repr());
                self.ctx
                    .global_vars
                    .insert(name, (addr, ZulType::Ptr(Kind::Char)));
            }
            Some(folded) => {
                let ty = folded.zul_type();
                match folded.repr() {
                    Some(repr) => {
                        let addr = self.ctx.module.add_global(&name, ty.llvm(), &repr);
                        self.ctx.global_vars.insert(name, (addr, ty));
                    }
                    None => self
                        .ctx
                        .logger
                        .log_error(op_loc, 1, "상수 식을 계산할 수 없습니다"),
                }
            }
            None => self
                .ctx
                .logger
                .log_error(op_loc, 1, "상수 식을 계산할 수 없습니다"),
        }
    }

    // ------------------------------------------------------------------
    // Function definitions
    // ------------------------------------------------------------------

    fn parse_func_def(&mut self, name: String, name_loc: Loc, name_width: usize) {
        let (params, is_var_arg) = self.parse_parameter();

        let mut return_type = None;
        if self.cur_tok == Token::Identifier {
            let type_name = self.lexer.word().to_string();
            match TYPE_MAP.get(type_name.as_str()) {
                Some(kind) => return_type = Some(ZulType::Scalar(*kind)),
                None => self.log_cur_token_parts(&[
                    "\"",
                    &type_name,
                    "\"은 존재하지 않는 타입입니다.",
                ]),
            }
            self.advance();
        }
        if name == ENTRY_FN_NAME && return_type != Some(ZulType::Scalar(Kind::Int)) {
            self.ctx.logger.log_error(
                name_loc,
                name_width,
                "main 함수의 반환 타입은 반드시 \"수\" 여야 합니다",
            );
        }

        let new_proto = FuncProto::new(&name, return_type, params, false, is_var_arg);

        // A bare newline after the signature is a forward declaration.
        if self.cur_tok == Token::Newline || self.cur_tok == Token::Eof {
            match self.ctx.find_proto(&name) {
                Some(idx) => {
                    if !self.ctx.protos[idx].matches(&new_proto) {
                        self.ctx.logger.log_error_parts(
                            name_loc,
                            name_width,
                            &["\"", &name, "\" 함수의 선언이 기존 선언과 일치하지 않습니다"],
                        );
                    }
                }
                None => {
                    self.ctx.register_proto(new_proto);
                }
            }
            return;
        }

        if self.cur_tok != Token::Colon {
            self.log_cur_token("콜론이 와야 합니다");
        } else {
            self.advance();
        }
        if self.cur_tok != Token::Newline {
            self.log_unexpected("");
            self.skip_to_newline();
        }
        self.advance();

        let mut skip_emit = false;
        let proto_idx = match self.ctx.find_proto(&name) {
            Some(idx) => {
                if self.ctx.protos[idx].has_body {
                    self.ctx.logger.log_error_parts(
                        name_loc,
                        name_width,
                        &["\"", &name, "\" 함수는 이미 정의된 함수입니다."],
                    );
                    skip_emit = true;
                } else {
                    // Definition after forward declaration: one diagnostic
                    // at the definition's name on any signature mismatch.
                    if !self.ctx.protos[idx].matches(&new_proto) {
                        self.ctx.logger.log_error_parts(
                            name_loc,
                            name_width,
                            &["\"", &name, "\" 함수의 정의가 선언과 일치하지 않습니다"],
                        );
                    }
                    // The body resolves names against the definition.
                    self.ctx.protos[idx] = FuncProto { has_body: true, ..new_proto };
                }
                idx
            }
            None => self.ctx.register_proto(FuncProto {
                has_body: true,
                ..new_proto
            }),
        };

        self.cur_ret_type = return_type;
        self.ret_count = 0;
        for (param_name, param_ty) in self.ctx.protos[proto_idx].params.clone() {
            if !param_name.is_empty() {
                self.ctx.declare_local(&param_name, Some(param_ty));
            }
        }

        let (body, _end_level) = self.parse_block_body(1);
        if body.is_empty() {
            self.ctx.logger.log_error(
                name_loc,
                name_width,
                "함수의 몸체가 정의되지 않았습니다.\n(콜론을 사용하지 않으면 함수 선언만 할 수 있습니다)",
            );
        }

        if !skip_emit {
            codegen::create_func(
                &mut self.ctx,
                proto_idx,
                &body,
                self.ret_count,
                name_loc,
                name_width,
            );
        }
        self.ctx.local_vars.clear();
        self.cur_ret_type = None;
        self.ret_count = 0;
        debug_assert!(self.ctx.scope_stack.is_empty());
    }

    /// Parse the parameter list after `(`. Each parameter is `name: type`,
    /// or a bare type name for a positional-only parameter (forward
    /// declarations). A trailing `...` marks the function variadic.
    fn parse_parameter(&mut self) -> (Vec<(String, ZulType)>, bool) {
        let mut params = Vec::new();
        let mut is_var_arg = false;
        if self.cur_tok == Token::Rpar {
            self.advance();
            return (params, is_var_arg);
        }
        loop {
            if self.cur_tok == Token::VaArg {
                is_var_arg = true;
                self.advance();
                if self.cur_tok != Token::Rpar {
                    self.log_cur_token("'...' 뒤에는 매개변수가 올 수 없습니다");
                    while !matches!(
                        self.cur_tok,
                        Token::Rpar | Token::Newline | Token::Eof
                    ) {
                        self.advance();
                    }
                }
                break;
            }
            if self.cur_tok != Token::Identifier {
                self.log_cur_token("함수의 매개변수가 와야 합니다");
                self.skip_to_newline();
                break;
            }
            let param_name = self.lexer.word().to_string();
            self.advance();
            if self.cur_tok == Token::Colon {
                self.advance();
                if let Some((kind, _)) = self.parse_type(true) {
                    params.push((param_name, ZulType::Scalar(kind)));
                }
            } else if let Some(kind) = TYPE_MAP.get(param_name.as_str()) {
                // The identifier is itself a type name: positional-only.
                params.push((String::new(), ZulType::Scalar(*kind)));
            } else {
                self.log_cur_token("매개변수에는 타입을 명시해야 합니다.");
            }
            if matches!(self.cur_tok, Token::Rpar | Token::Newline | Token::Eof) {
                break;
            }
            if self.cur_tok != Token::Comma {
                self.log_unexpected("콤마가 와야 합니다");
            }
            self.advance();
        }
        if self.cur_tok == Token::Rpar {
            self.advance();
        }
        (params, is_var_arg)
    }

    // ------------------------------------------------------------------
    // Blocks and statements
    // ------------------------------------------------------------------

    /// Collect statements whose lines sit at exactly `target_level`
    /// indents. Returns the collected statements plus the indent level of
    /// the line that terminated the block, so the caller can keep going
    /// (`ㄴㄴ?` after an `ㅇㅈ?` body) or pass the dedent further up.
    fn parse_block_body(&mut self, target_level: usize) -> (Vec<Ast>, usize) {
        let mut body = Vec::new();
        let mut level_hint: Option<usize> = None;
        loop {
            let level = match level_hint.take() {
                Some(level) => level,
                None => {
                    let mut level = 0;
                    while self.cur_tok == Token::Indent {
                        level += 1;
                        self.advance();
                    }
                    if self.cur_tok == Token::Newline {
                        // Blank line: indent tracking is unaffected.
                        self.advance();
                        continue;
                    }
                    if self.cur_tok == Token::Eof {
                        return (body, 0);
                    }
                    level
                }
            };
            if level < target_level {
                return (body, level);
            }
            if level > target_level {
                self.log_cur_token("들여쓰기 깊이가 올바르지 않습니다");
            }

            let (stmt, nested_end) = self.parse_stmt(target_level);
            if let Some(stmt) = stmt {
                body.push(stmt);
            }
            match nested_end {
                Some(end_level) => {
                    if self.cur_tok == Token::Eof {
                        return (body, 0);
                    }
                    level_hint = Some(end_level);
                }
                None => {
                    if self.cur_tok != Token::Newline && self.cur_tok != Token::Eof {
                        self.log_unexpected("");
                        self.skip_to_newline();
                    }
                    if self.cur_tok == Token::Newline {
                        self.advance();
                    }
                }
            }
        }
    }

    /// One statement. Statements that consume their own indented block
    /// (`ㅇㅈ?`, `ㄱㄱ`) return the indent level their block ended on.
    fn parse_stmt(&mut self, target_level: usize) -> (Option<Ast>, Option<usize>) {
        match self.cur_tok {
            Token::Go => self.parse_loop(target_level),
            Token::Ij => self.parse_if(target_level),
            Token::No | Token::Nope => {
                self.log_cur_token("짝이 되는 'ㅇㅈ?' 문이 없습니다");
                self.skip_to_newline();
                (None, None)
            }
            Token::Gg => (self.parse_return(), None),
            Token::Tt => {
                if !self.ctx.in_loop {
                    self.log_cur_token("'ㅌㅌ'는 반복문 안에서만 사용할 수 있습니다");
                    self.advance();
                    return (None, None);
                }
                self.advance();
                (Some(Ast::Continue), None)
            }
            Token::Sg => {
                if !self.ctx.in_loop {
                    self.log_cur_token("'ㅅㄱ'는 반복문 안에서만 사용할 수 있습니다");
                    self.advance();
                    return (None, None);
                }
                self.advance();
                (Some(Ast::Break), None)
            }
            _ => (self.parse_expr_start(), None),
        }
    }

    fn parse_return(&mut self) -> Option<Ast> {
        let ret_loc = self.lexer.token_loc();
        let ret_width = self.lexer.word_width();
        self.advance();
        let ret_cap = Capture::new(self.cur_ret_type, ret_loc, ret_width);
        if self.cur_tok == Token::Newline || self.cur_tok == Token::Eof {
            if self.cur_ret_type.is_some() {
                self.ctx
                    .logger
                    .log_error(ret_loc, ret_width, "반환할 값이 와야 합니다");
                return None;
            }
            self.ret_count += 1;
            return Some(Ast::Return(ReturnExpr {
                body: None,
                ret_type: ret_cap,
            }));
        }
        let body = self.parse_expr()?;
        self.ret_count += 1;
        Some(Ast::Return(ReturnExpr {
            body: Some(Box::new(body)),
            ret_type: ret_cap,
        }))
    }

    fn parse_if(&mut self, level: usize) -> (Option<Ast>, Option<usize>) {
        self.advance();
        let Some(cond) = self.parse_expr() else {
            self.log_unexpected("조건식이 와야 합니다");
            self.skip_to_newline();
            return (None, None);
        };
        if !self.expect_block_start() {
            return (None, None);
        }

        self.ctx.push_scope();
        let (if_body, mut end_level) = self.parse_block_body(level + 1);
        self.ctx.pop_scope();
        let if_pair: CondBody = (Box::new(cond), if_body);

        let mut elif_pairs: Vec<CondBody> = Vec::new();
        while end_level == level && self.cur_tok == Token::No {
            self.advance();
            let Some(elif_cond) = self.parse_expr() else {
                self.log_unexpected("조건식이 와야 합니다");
                self.skip_to_newline();
                return (
                    Some(Ast::If(IfExpr {
                        if_pair,
                        elif_pairs,
                        else_body: Vec::new(),
                    })),
                    None,
                );
            };
            if !self.expect_block_start() {
                return (
                    Some(Ast::If(IfExpr {
                        if_pair,
                        elif_pairs,
                        else_body: Vec::new(),
                    })),
                    None,
                );
            }
            self.ctx.push_scope();
            let (elif_body, level_after) = self.parse_block_body(level + 1);
            self.ctx.pop_scope();
            elif_pairs.push((Box::new(elif_cond), elif_body));
            end_level = level_after;
        }

        let mut else_body = Vec::new();
        if end_level == level && self.cur_tok == Token::Nope {
            self.advance();
            if !self.expect_block_start() {
                return (
                    Some(Ast::If(IfExpr {
                        if_pair,
                        elif_pairs,
                        else_body,
                    })),
                    None,
                );
            }
            self.ctx.push_scope();
            let (parsed_else, level_after) = self.parse_block_body(level + 1);
            self.ctx.pop_scope();
            else_body = parsed_else;
            end_level = level_after;
        }

        (
            Some(Ast::If(IfExpr {
                if_pair,
                elif_pairs,
                else_body,
            })),
            Some(end_level),
        )
    }

    fn parse_loop(&mut self, level: usize) -> (Option<Ast>, Option<usize>) {
        self.advance();
        // The loop header scope holds an init declaration until the body
        // closes.
        self.ctx.push_scope();
        let result = self.parse_loop_inner(level);
        self.ctx.pop_scope();
        result
    }

    fn parse_loop_inner(&mut self, level: usize) -> (Option<Ast>, Option<usize>) {
        let mut init = None;
        let mut test = None;
        let mut update = None;

        if self.cur_tok == Token::Colon {
            self.advance();
        } else {
            let Some(first) = self.parse_expr_start() else {
                self.log_unexpected("");
                self.skip_to_newline();
                return (None, None);
            };
            match self.cur_tok {
                Token::Semicolon => {
                    init = Some(Box::new(first));
                    self.advance();
                    match self.parse_expr() {
                        Some(test_expr) => test = Some(Box::new(test_expr)),
                        None => self.log_unexpected("조건식이 와야 합니다"),
                    }
                    if self.cur_tok != Token::Semicolon {
                        self.log_unexpected("';'가 와야 합니다");
                    } else {
                        self.advance();
                    }
                    match self.parse_expr_start() {
                        Some(update_expr) => update = Some(Box::new(update_expr)),
                        None => self.log_unexpected(""),
                    }
                    if self.cur_tok != Token::Colon {
                        self.log_cur_token("콜론이 와야 합니다");
                    } else {
                        self.advance();
                    }
                }
                Token::Colon => {
                    test = Some(Box::new(first));
                    self.advance();
                }
                _ => {
                    self.log_unexpected("';' 또는 ':'가 와야 합니다");
                    self.skip_to_newline();
                    return (None, None);
                }
            }
        }
        if self.cur_tok != Token::Newline {
            self.log_unexpected("");
            self.skip_to_newline();
        }
        self.advance();

        let saved_in_loop = self.ctx.in_loop;
        self.ctx.in_loop = true;
        let (body, end_level) = self.parse_block_body(level + 1);
        self.ctx.in_loop = saved_in_loop;

        (
            Some(Ast::Loop(LoopExpr {
                init,
                test,
                update,
                body,
            })),
            Some(end_level),
        )
    }

    /// Consume `:` then newline after an `ㅇㅈ?`/`ㄴㄴ?`/`ㄴㄴ` header.
    fn expect_block_start(&mut self) -> bool {
        if self.cur_tok != Token::Colon {
            self.log_cur_token("콜론이 와야 합니다");
            self.skip_to_newline();
            return false;
        }
        self.advance();
        if self.cur_tok != Token::Newline {
            self.log_unexpected("");
            self.skip_to_newline();
        }
        self.advance();
        true
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Statement-position expression: an identifier prefix is ambiguous
    /// until the next token decides between declaration, assignment, call
    /// and plain read.
    fn parse_expr_start(&mut self) -> Option<Ast> {
        let left = if self.cur_tok == Token::Identifier {
            let name = self.lexer.word().to_string();
            let name_loc = self.lexer.token_loc();
            let name_width = self.lexer.word_width();
            self.advance();
            if self.cur_tok == Token::Colon || self.cur_tok.is_assign() {
                return self.parse_local_var(name, name_loc, name_width);
            }
            self.parse_identifier_suffix(name, name_loc, name_width)?
        } else {
            self.parse_primary()?
        };

        // Assignment through a subscript (or a rejected non-l-value).
        if self.cur_tok.is_assign() {
            let op_cap = Capture::new(self.cur_tok, self.lexer.token_loc(), self.lexer.word_width());
            if !left.is_lvalue() {
                self.ctx.logger.log_error(
                    op_cap.loc,
                    op_cap.width,
                    "좌변이 적절한 좌측값이 아닙니다",
                );
                self.advance();
                let _ = self.parse_expr();
                return None;
            }
            self.advance();
            let body = self.parse_expr()?;
            return Some(Ast::VariableAssn(VariableAssnExpr {
                target: Box::new(left),
                op: op_cap,
                body: Box::new(body),
            }));
        }
        self.parse_bin_op(0, left)
    }

    /// Declaration or assignment after `name`, with the operator current.
    fn parse_local_var(&mut self, name: String, name_loc: Loc, name_width: usize) -> Option<Ast> {
        let name_cap = Capture::new(name.clone(), name_loc, name_width);
        if self.cur_tok == Token::Colon {
            self.advance();
            let (kind, _) = self.parse_type(true)?;
            let redefined = self.ctx.var_exists(&name);
            let mut body = None;
            if self.cur_tok == Token::Assn {
                self.advance();
                body = Some(Box::new(self.parse_expr()?));
            }
            if redefined {
                self.ctx
                    .logger
                    .log_error(name_loc, name_width, "변수가 다시 정의되었습니다.");
                return None;
            }
            return Some(Ast::VariableDecl(VariableDeclExpr::new(
                name_cap,
                Some(ZulType::Scalar(kind)),
                body,
                &mut self.ctx,
            )));
        }

        let op_cap = Capture::new(self.cur_tok, self.lexer.token_loc(), self.lexer.word_width());
        self.advance();
        let body = Box::new(self.parse_expr()?);
        if op_cap.value == Token::Assn {
            if self.ctx.var_exists(&name) {
                return Some(Ast::VariableAssn(VariableAssnExpr {
                    target: Box::new(Ast::Variable(VariableExpr { name: name_cap })),
                    op: op_cap,
                    body,
                }));
            }
            // Unknown name: declaration with the type inferred from the
            // initializer.
            return Some(Ast::VariableDecl(VariableDeclExpr::new(
                name_cap,
                None,
                Some(body),
                &mut self.ctx,
            )));
        }
        if !self.ctx.var_exists(&name) {
            self.ctx.logger.log_error_parts(
                name_loc,
                name_width,
                &["\"", &name, "\"은 존재하지 않는 변수입니다"],
            );
            return None;
        }
        Some(Ast::VariableAssn(VariableAssnExpr {
            target: Box::new(Ast::Variable(VariableExpr { name: name_cap })),
            op: op_cap,
            body,
        }))
    }

    fn parse_expr(&mut self) -> Option<Ast> {
        let left = self.parse_primary()?;
        self.parse_bin_op(0, left)
    }

    /// Precedence climbing. Equal precedence groups left; assignment
    /// operators are rejected here because assignment is statement-level
    /// only.
    fn parse_bin_op(&mut self, prev_prec: i32, mut left: Ast) -> Option<Ast> {
        loop {
            let cur_prec = self.op_prec();
            if cur_prec < prev_prec {
                return Some(left);
            }
            if self.cur_tok.is_assign() {
                self.log_cur_token("대입 연산자는 식 안에서 사용할 수 없습니다");
                self.advance();
                let _ = self.parse_expr();
                return None;
            }
            let op_cap = Capture::new(self.cur_tok, self.lexer.token_loc(), self.lexer.word_width());
            self.advance();

            let mut right = self.parse_primary()?;
            let next_prec = self.op_prec();
            if cur_prec < next_prec {
                right = self.parse_bin_op(cur_prec + 1, right)?;
            }
            left = Ast::BinOp(BinOpExpr {
                lhs: Box::new(left),
                rhs: Box::new(right),
                op: op_cap,
            });
        }
    }

    fn parse_primary(&mut self) -> Option<Ast> {
        match self.cur_tok {
            Token::Identifier => {
                let name = self.lexer.word().to_string();
                let name_loc = self.lexer.token_loc();
                let name_width = self.lexer.word_width();
                self.advance();
                self.parse_identifier_suffix(name, name_loc, name_width)
            }
            Token::Int => {
                let parsed = self.lexer.word().parse::<i64>();
                match parsed {
                    Ok(value) => {
                        self.advance();
                        Some(Ast::Int(value))
                    }
                    Err(_) => {
                        self.log_cur_token("잘못된 숫자 표현입니다");
                        self.advance();
                        None
                    }
                }
            }
            Token::Real => {
                let parsed = self.lexer.word().parse::<f64>();
                match parsed {
                    Ok(value) => {
                        self.advance();
                        Some(Ast::Real(value))
                    }
                    Err(_) => {
                        self.log_cur_token("잘못된 숫자 표현입니다");
                        self.advance();
                        None
                    }
                }
            }
            Token::True => {
                self.advance();
                Some(Ast::Bool(true))
            }
            Token::False => {
                self.advance();
                Some(Ast::Bool(false))
            }
            Token::Dquotes => self.parse_str(),
            Token::Squotes => self.parse_char(),
            Token::Lpar => self.parse_par(),
            Token::Add | Token::Sub | Token::Not | Token::BitNot => self.parse_unary_op(),
            _ => None,
        }
    }

    /// Call, subscript or plain variable after a consumed identifier.
    fn parse_identifier_suffix(
        &mut self,
        name: String,
        name_loc: Loc,
        name_width: usize,
    ) -> Option<Ast> {
        match self.cur_tok {
            Token::Lpar => self.parse_call(name, name_loc, name_width),
            Token::Lsqbrk => {
                self.advance();
                let index_loc = self.lexer.token_loc();
                let index = self.parse_expr()?;
                let index_width = self
                    .lexer
                    .token_loc()
                    .1
                    .saturating_sub(index_loc.1)
                    .max(1);
                if self.cur_tok != Token::Rsqbrk {
                    self.log_unexpected("']'가 와야 합니다");
                } else {
                    self.advance();
                }
                Some(Ast::Subscript(SubscriptExpr {
                    target: VariableExpr {
                        name: Capture::new(name, name_loc, name_width),
                    },
                    index: Capture::new(Box::new(index), index_loc, index_width),
                }))
            }
            _ => Some(Ast::Variable(VariableExpr {
                name: Capture::new(name, name_loc, name_width),
            })),
        }
    }

    fn parse_call(&mut self, name: String, name_loc: Loc, name_width: usize) -> Option<Ast> {
        let callee = if name == STDOUT_NAME {
            Some(Callee::Stdout)
        } else if name == STDIN_NAME {
            Some(Callee::Stdin)
        } else {
            match self.ctx.find_proto(&name) {
                Some(idx) => Some(Callee::Proto(idx)),
                None => {
                    self.ctx.logger.log_error_parts(
                        name_loc,
                        name_width,
                        &["\"", &name, "\"은 존재하지 않는 함수입니다"],
                    );
                    None
                }
            }
        };
        self.advance();

        let mut args = Vec::new();
        loop {
            if self.cur_tok == Token::Rpar {
                self.advance();
                break;
            }
            if self.cur_tok == Token::Newline || self.cur_tok == Token::Eof {
                self.log_unexpected("')'가 와야 합니다");
                return None;
            }
            let arg_loc = self.lexer.token_loc();
            let arg = self.parse_expr()?;
            let arg_width = self.lexer.token_loc().1.saturating_sub(arg_loc.1).max(1);
            args.push(Capture::new(Box::new(arg), arg_loc, arg_width));
            if self.cur_tok == Token::Comma {
                self.advance();
            } else if self.cur_tok != Token::Rpar {
                self.log_cur_token("콤마가 필요합니다");
            }
        }

        let callee = callee?;
        if let Callee::Proto(idx) = callee {
            let proto = &self.ctx.protos[idx];
            if !proto.is_var_arg && proto.params.len() != args.len() {
                let expected = proto.params.len().to_string();
                self.ctx.logger.log_error_parts(
                    name_loc,
                    name_width,
                    &[
                        "인자 개수가 맞지 않습니다. \"",
                        &name,
                        "\" 함수의 인자 개수는 ",
                        &expected,
                        "개 입니다.",
                    ],
                );
                return None;
            }
        }
        Some(Ast::FuncCall(FuncCallExpr {
            callee,
            name: Capture::new(name, name_loc, name_width),
            args,
        }))
    }

    fn parse_unary_op(&mut self) -> Option<Ast> {
        let op_cap = Capture::new(self.cur_tok, self.lexer.token_loc(), self.lexer.word_width());
        self.advance();
        let body = self.parse_primary()?;
        Some(Ast::UnaryOp(UnaryOpExpr {
            op: op_cap,
            body: Box::new(body),
        }))
    }

    fn parse_par(&mut self) -> Option<Ast> {
        self.advance();
        let inner = self.parse_expr();
        if self.cur_tok != Token::Rpar {
            self.log_unexpected("')'가 와야 합니다");
            self.advance();
            return None;
        }
        self.advance();
        inner
    }

    /// String literal: the lexer hands back the raw bytes between the
    /// quotes from its line buffer; only `\n` is translated.
    fn parse_str(&mut self) -> Option<Ast> {
        let open_loc = self.lexer.token_loc();
        match self.lexer.take_quoted('"') {
            Some(raw) => {
                self.advance();
                Some(Ast::Str(unescape(&raw)))
            }
            None => {
                self.ctx
                    .logger
                    .log_error(open_loc, 1, "따옴표가 닫히지 않았습니다");
                self.advance();
                None
            }
        }
    }

    /// Char literal: exactly one byte after escape processing.
    fn parse_char(&mut self) -> Option<Ast> {
        let open_loc = self.lexer.token_loc();
        match self.lexer.take_quoted('\'') {
            Some(raw) => {
                self.advance();
                let content = unescape(&raw);
                let mut bytes = content.bytes();
                match (bytes.next(), bytes.next()) {
                    (Some(byte), None) => Some(Ast::Char(byte)),
                    _ => {
                        self.ctx.logger.log_error(
                            open_loc,
                            content.chars().count() + 2,
                            "문자 리터럴은 반드시 한 바이트여야 합니다",
                        );
                        None
                    }
                }
            }
            None => {
                self.ctx
                    .logger
                    .log_error(open_loc, 1, "따옴표가 닫히지 않았습니다");
                self.advance();
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// A type annotation: a builtin type name, optionally followed by a
    /// bracketed size. `no_arr` rejects the array form (arrays live only
    /// as globals). Multi-dimensional arrays are rejected outright.
    fn parse_type(&mut self, no_arr: bool) -> Option<(Kind, Option<Capture<AstPtr>>)> {
        if self.cur_tok != Token::Identifier {
            self.log_unexpected("타입이 와야 합니다");
            self.advance();
            return None;
        }
        let type_name = self.lexer.word().to_string();
        let Some(&kind) = TYPE_MAP.get(type_name.as_str()) else {
            self.log_cur_token("존재하지 않는 타입입니다");
            self.advance();
            return None;
        };
        self.advance();

        if self.cur_tok != Token::Lsqbrk {
            return Some((kind, None));
        }
        if no_arr {
            self.log_cur_token("여기서는 배열 타입을 사용할 수 없습니다");
        }
        self.advance();
        let size_loc = self.lexer.token_loc();
        let size = self.parse_expr();
        let size_width = self.lexer.token_loc().1.saturating_sub(size_loc.1).max(1);
        if self.cur_tok != Token::Rsqbrk {
            self.log_unexpected("']'가 와야 합니다");
        } else {
            self.advance();
        }
        if self.cur_tok == Token::Lsqbrk {
            self.log_cur_token("다차원 배열은 지원되지 않습니다");
            while !matches!(
                self.cur_tok,
                Token::Rsqbrk | Token::Newline | Token::Eof
            ) {
                self.advance();
            }
            if self.cur_tok == Token::Rsqbrk {
                self.advance();
            }
            return None;
        }
        if no_arr {
            return None;
        }
        let size = size?;
        Some((kind, Some(Capture::new(Box::new(size), size_loc, size_width))))
    }
}

/// Translate the `\n` escape; everything else passes through unchanged.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse a source string; return the IR text and the diagnostics.
    fn compile(source: &str) -> (String, String, bool) {
        let parser = Parser::new(source, "test.zul", Logger::buffered());
        let mut ctx = parser.parse();
        let has_error = ctx.logger.has_error();
        let diag = ctx.logger.take_output();
        (ctx.module.print(), diag, has_error)
    }

    fn compile_ok(source: &str) -> String {
        let (ir, diag, has_error) = compile(source);
        assert!(!has_error, "unexpected diagnostics:\n{diag}");
        ir
    }

    fn compile_err(source: &str) -> String {
        let (_, diag, has_error) = compile(source);
        assert!(has_error, "expected diagnostics, got none");
        diag
    }

    #[test]
    fn test_hello_world() {
        let ir = compile_ok("ㅎㅇ main() 수:\n    STDOUT(\"hi\")\n    ㅈㅈ 0\n");
        assert!(ir.contains("define i64 @main()"));
        assert!(ir.contains("c\"%s\\0A\\00\""));
        assert!(ir.contains("c\"hi\\00\""));
        assert!(ir.contains("call i32 (ptr, ...) @printf"));
        assert!(ir.contains("ret i64 0"));
    }

    #[test]
    fn test_implicit_cast_and_promotion() {
        let ir = compile_ok("ㅎㅇ main() 수:\n    x = 3\n    y = 2.5\n    ㅈㅈ x + y\n");
        assert!(ir.contains("sitofp i64"));
        assert!(ir.contains("fadd double"));
        assert!(ir.contains("fptosi double"));
        assert!(ir.contains("ret i64"));
    }

    #[test]
    fn test_for_loop_with_break() {
        let source = "\
ㅎㅇ main() 수:
    s = 0
    ㄱㄱ i = 0; i < 10; i = i + 1:
        ㅇㅈ? i == 5:
            ㅅㄱ
        s = s + i
    ㅈㅈ s
";
        let ir = compile_ok(source);
        assert!(ir.contains("loop_test:"));
        assert!(ir.contains("loop_update:"));
        assert!(ir.contains("loop_end:"));
        assert!(ir.contains("icmp slt i64"));
        assert!(ir.contains("icmp eq i64"));
        // Break branches to the loop end from inside the if body.
        assert!(ir.contains("br label %loop_end"));
    }

    #[test]
    fn test_forward_declaration_then_definition() {
        let source = "\
ㅎㅇ f(x: 수) 수
ㅎㅇ main() 수:
    ㅈㅈ f(3)
ㅎㅇ f(x: 수) 수:
    ㅈㅈ x * 2
";
        let ir = compile_ok(source);
        assert!(ir.contains("define i64 @f(i64 %x)"));
        assert!(ir.contains("call i64 @f(i64 3)"));
        // The prototype got a body; no stray declare remains.
        assert!(!ir.contains("declare i64 @f"));
    }

    #[test]
    fn test_forward_declaration_mismatch() {
        let source = "\
ㅎㅇ f(x: 수) 수
ㅎㅇ f(x: 실수) 수:
    ㅈㅈ 1
";
        let diag = compile_err(source);
        assert!(diag.contains("함수의 정의가 선언과 일치하지 않습니다"));
        assert_eq!(diag.matches("에러:").count(), 1);
    }

    #[test]
    fn test_error_recovery_multiple_diagnostics() {
        let source = "\
ㅎㅇ main() 수:
    y = z + 1
    ㅅㄱ
";
        let (_, diag, has_error) = compile(source);
        assert!(has_error);
        let first = diag.find("\"z\"은 존재하지 않는 변수입니다").unwrap();
        let second = diag.find("'ㅅㄱ'는 반복문 안에서만 사용할 수 있습니다").unwrap();
        assert!(first < second, "errors out of source order:\n{diag}");
    }

    #[test]
    fn test_global_array() {
        let source = "\
a: 수[5]
ㅎㅇ main() 수:
    a[0] = 42
    ㅈㅈ a[0]
";
        let ir = compile_ok(source);
        assert!(ir.contains("@a = global [5 x i64] zeroinitializer"));
        assert!(ir.contains("getelementptr i64, ptr @a"));
        assert!(ir.contains("store i64 42"));
    }

    #[test]
    fn test_global_scalar_and_string() {
        let source = "\
횟수: 수 = 2 * 10
인사 = \"안녕\"
ㅎㅇ main() 수:
    ㅈㅈ 횟수
";
        let ir = compile_ok(source);
        assert!(ir.contains("= global i64 20"));
        assert!(ir.contains("= global ptr @.str"));
    }

    #[test]
    fn test_global_init_must_be_constant() {
        let diag = compile_err("x = 1 && 0\n");
        assert!(diag.contains("전역 변수의 초기화 식은 상수여야 합니다"));
    }

    #[test]
    fn test_global_array_size_must_be_positive() {
        let diag = compile_err("a: 수[0]\n");
        assert!(diag.contains("배열의 크기는 양의 정수인 상수여야 합니다"));
    }

    #[test]
    fn test_short_circuit_blocks() {
        let ir = compile_ok(
            "ㅎㅇ main() 수:\n    x = 1\n    ㅇㅈ? x > 0 && x < 10:\n        ㅈㅈ 1\n    ㅈㅈ 0\n",
        );
        assert!(ir.contains("sc_test:"));
        assert!(ir.contains("sc_end:"));
        assert!(ir.contains("phi i1 [ false, %"));
    }

    #[test]
    fn test_or_short_circuit_constant() {
        let ir = compile_ok(
            "ㅎㅇ main() 수:\n    x = 1\n    ㅇㅈ? x == 0 || x == 1:\n        ㅈㅈ 1\n    ㅈㅈ 0\n",
        );
        assert!(ir.contains("phi i1 [ true, %"));
    }

    #[test]
    fn test_precedence_grouping() {
        // 2 + 3 * 4 must multiply first.
        let ir = compile_ok("ㅎㅇ main() 수:\n    ㅈㅈ 2 + 3 * 4\n");
        let mul = ir.find("mul i64 3, 4").expect("missing mul");
        let add = ir.find("add i64 2").expect("missing add");
        assert!(mul < add);
    }

    #[test]
    fn test_equal_precedence_groups_left() {
        // 10 - 3 - 2 must be (10 - 3) - 2 = 5, not 10 - (3 - 2).
        let ir = compile_ok("ㅎㅇ main() 수:\n    ㅈㅈ 10 - 3 - 2\n");
        let first = ir.find("sub i64 10, 3").expect("missing first sub");
        let second = ir.find("sub i64 %t0, 2").expect("missing second sub");
        assert!(first < second);
    }

    #[test]
    fn test_climbing_keeps_left_assoc() {
        // 1 + 2 * 3 + 4 must group as (1 + (2*3)) + 4.
        let ir = compile_ok("ㅎㅇ main() 수:\n    ㅈㅈ 1 + 2 * 3 + 4\n");
        assert!(ir.contains("mul i64 2, 3"));
        assert!(ir.contains("add i64 1, %t0"));
        assert!(ir.contains("add i64 %t1, 4"));
    }

    #[test]
    fn test_assignment_inside_expression_rejected() {
        let diag = compile_err("ㅎㅇ main() 수:\n    x = 1\n    y = (x = 2)\n");
        assert!(diag.contains("대입 연산자는 식 안에서 사용할 수 없습니다"));
    }

    #[test]
    fn test_non_lvalue_assignment_rejected() {
        let diag = compile_err("ㅎㅇ main() 수:\n    f: 수 = 1\n    3 = f\n");
        assert!(diag.contains("좌변이 적절한 좌측값이 아닙니다"));
    }

    #[test]
    fn test_compound_assignment_lowering() {
        let ir = compile_ok("ㅎㅇ main() 수:\n    x = 4\n    x *= 3\n    ㅈㅈ x\n");
        assert!(ir.contains("mul i64"));
    }

    #[test]
    fn test_compound_assignment_requires_existing() {
        let diag = compile_err("ㅎㅇ main() 수:\n    x += 1\n    ㅈㅈ 0\n");
        assert!(diag.contains("\"x\"은 존재하지 않는 변수입니다"));
    }

    #[test]
    fn test_variable_redefinition() {
        let diag = compile_err("ㅎㅇ main() 수:\n    x: 수\n    x: 실수\n    ㅈㅈ 0\n");
        assert!(diag.contains("변수가 다시 정의되었습니다."));
    }

    #[test]
    fn test_sibling_scopes_can_reuse_names() {
        let source = "\
ㅎㅇ main() 수:
    ㅇㅈ? 참:
        x = 1
    ㄴㄴ:
        x = 2.5
    ㅈㅈ 0
";
        let ir = compile_ok(source);
        assert!(ir.contains("%x = alloca i64"));
        assert!(ir.contains("%x.1 = alloca double"));
    }

    #[test]
    fn test_elif_chain() {
        let source = "\
ㅎㅇ main() 수:
    x = 3
    ㅇㅈ? x == 1:
        ㅈㅈ 10
    ㄴㄴ? x == 2:
        ㅈㅈ 20
    ㄴㄴ? x == 3:
        ㅈㅈ 30
    ㄴㄴ:
        ㅈㅈ 40
    ㅈㅈ 0
";
        let ir = compile_ok(source);
        assert!(ir.contains("elif_cond:"));
        assert!(ir.contains("elif_cond1:"));
        assert!(ir.contains("else:"));
    }

    #[test]
    fn test_if_all_branches_return_prunes_merge() {
        let source = "\
ㅎㅇ 고르기(x: 수) 수:
    ㅇㅈ? x > 0:
        ㅈㅈ 1
    ㄴㄴ:
        ㅈㅈ 2
ㅎㅇ main() 수:
    ㅈㅈ 고르기(1)
";
        let ir = compile_ok(source);
        // Two returns materialize the common return block; the dangling
        // merge is pruned.
        assert!(ir.contains("return:"));
        assert!(!ir.contains("merge:"));
    }

    #[test]
    fn test_multi_return_plumbing() {
        let source = "\
ㅎㅇ main() 수:
    x = 1
    ㅇㅈ? x == 1:
        ㅈㅈ 5
    ㅈㅈ 6
";
        let ir = compile_ok(source);
        assert!(ir.contains("%retval = alloca i64"));
        assert!(ir.contains("store i64 5, ptr %retval"));
        assert!(ir.contains("store i64 6, ptr %retval"));
        let ret_pos = ir.find("return:").unwrap();
        assert!(ir[ret_pos..].contains("load i64, ptr %retval"));
    }

    #[test]
    fn test_single_return_is_direct() {
        let ir = compile_ok("ㅎㅇ main() 수:\n    ㅈㅈ 7\n");
        assert!(ir.contains("ret i64 7"));
        assert!(!ir.contains("%retval"));
    }

    #[test]
    fn test_void_function() {
        let source = "\
ㅎㅇ 출력():
    STDOUT(1)
ㅎㅇ main() 수:
    출력()
    ㅈㅈ 0
";
        let ir = compile_ok(source);
        assert!(ir.contains("define void @\"출력\"()"));
        assert!(ir.contains("ret void"));
        assert!(ir.contains("call void @\"출력\"()"));
    }

    #[test]
    fn test_variadic_forward_declaration() {
        let source = "\
ㅎㅇ 기록(글자, ...) 수
ㅎㅇ main() 수:
    ㅈㅈ 0
";
        let ir = compile_ok(source);
        assert!(ir.contains("declare i64 @\"기록\"(i8, ...)"));
    }

    #[test]
    fn test_main_return_type_enforced() {
        let diag = compile_err("ㅎㅇ main() 실수:\n    ㅈㅈ 1.0\n");
        assert!(diag.contains("main 함수의 반환 타입은 반드시 \"수\" 여야 합니다"));
    }

    #[test]
    fn test_duplicate_definition_rejected() {
        let source = "\
ㅎㅇ f() 수:
    ㅈㅈ 1
ㅎㅇ f() 수:
    ㅈㅈ 2
";
        let diag = compile_err(source);
        assert!(diag.contains("\"f\" 함수는 이미 정의된 함수입니다."));
    }

    #[test]
    fn test_arity_mismatch() {
        let source = "\
ㅎㅇ f(x: 수) 수:
    ㅈㅈ x
ㅎㅇ main() 수:
    ㅈㅈ f(1, 2)
";
        let diag = compile_err(source);
        assert!(diag.contains("인자 개수가 맞지 않습니다"));
        assert!(diag.contains("1개 입니다."));
    }

    #[test]
    fn test_undeclared_function() {
        let diag = compile_err("ㅎㅇ main() 수:\n    없다(1)\n    ㅈㅈ 0\n");
        assert!(diag.contains("\"없다\"은 존재하지 않는 함수입니다"));
    }

    #[test]
    fn test_subscript_requires_integer_index() {
        let source = "\
a: 수[5]
ㅎㅇ main() 수:
    ㅈㅈ a[1.5]
";
        let diag = compile_err(source);
        assert!(diag.contains("배열의 인덱스는 정수여야 합니다"));
    }

    #[test]
    fn test_subscript_on_non_array() {
        let diag = compile_err("ㅎㅇ main() 수:\n    x = 1\n    ㅈㅈ x[0]\n");
        assert!(diag.contains("배열이 아닙니다"));
    }

    #[test]
    fn test_local_array_rejected() {
        let diag = compile_err("ㅎㅇ main() 수:\n    x: 수[3]\n    ㅈㅈ 0\n");
        assert!(diag.contains("여기서는 배열 타입을 사용할 수 없습니다"));
    }

    #[test]
    fn test_multi_dimensional_array_rejected() {
        let diag = compile_err("a: 수[2][3]\n");
        assert!(diag.contains("다차원 배열은 지원되지 않습니다"));
    }

    #[test]
    fn test_bitnot_on_float_rejected() {
        let diag = compile_err("ㅎㅇ main() 수:\n    x = ~1.5\n    ㅈㅈ 0\n");
        assert!(diag.contains("단항 '~' 연산자를 적용할 수 없습니다"));
    }

    #[test]
    fn test_continue_targets_update_block() {
        let source = "\
ㅎㅇ main() 수:
    s = 0
    ㄱㄱ i = 0; i < 4; i = i + 1:
        ㅇㅈ? i == 2:
            ㅌㅌ
        s = s + i
    ㅈㅈ s
";
        let ir = compile_ok(source);
        assert!(ir.contains("br label %loop_update"));
    }

    #[test]
    fn test_infinite_loop_form() {
        let source = "\
ㅎㅇ main() 수:
    ㄱㄱ:
        ㅅㄱ
    ㅈㅈ 0
";
        let ir = compile_ok(source);
        assert!(ir.contains("br label %loop_start"));
    }

    #[test]
    fn test_test_only_loop_form() {
        let source = "\
ㅎㅇ main() 수:
    x = 3
    ㄱㄱ x > 0:
        x = x - 1
    ㅈㅈ x
";
        let ir = compile_ok(source);
        assert!(ir.contains("icmp sgt i64"));
        assert!(ir.contains("loop_test:"));
    }

    #[test]
    fn test_loop_variable_scope_ends_with_loop() {
        // `i` leaves scope with the loop, so the later `i = 9.9` is a
        // fresh declaration (no redefinition error, new slot).
        let source = "\
ㅎㅇ main() 수:
    ㄱㄱ i = 0; i < 3; i = i + 1:
        STDOUT(i)
    i = 9.9
    ㅈㅈ 0
";
        let ir = compile_ok(source);
        assert!(ir.contains("%i = alloca i64"));
        assert!(ir.contains("%i.1 = alloca double"));
    }

    #[test]
    fn test_string_escape() {
        let ir = compile_ok("ㅎㅇ main() 수:\n    STDOUT(\"a\\nb\")\n    ㅈㅈ 0\n");
        assert!(ir.contains("c\"a\\0Ab\\00\""));
    }

    #[test]
    fn test_char_literal() {
        let ir = compile_ok("ㅎㅇ main() 수:\n    c: 글자 = 'A'\n    ㅈㅈ 0\n");
        assert!(ir.contains("store i8 65"));
    }

    #[test]
    fn test_char_literal_too_long() {
        let diag = compile_err("ㅎㅇ main() 수:\n    c: 글자 = 'AB'\n    ㅈㅈ 0\n");
        assert!(diag.contains("문자 리터럴은 반드시 한 바이트여야 합니다"));
    }

    #[test]
    fn test_unterminated_string() {
        let diag = compile_err("ㅎㅇ main() 수:\n    STDOUT(\"열림\n    ㅈㅈ 0\n");
        assert!(diag.contains("따옴표가 닫히지 않았습니다"));
    }

    #[test]
    fn test_stdin_requires_lvalue() {
        let diag = compile_err("ㅎㅇ main() 수:\n    STDIN(3)\n    ㅈㅈ 0\n");
        assert!(diag.contains("표준 입력의 인자는 좌측값이어야 합니다"));
    }

    #[test]
    fn test_stdin_reads_through_pointer() {
        let source = "\
ㅎㅇ main() 수:
    x: 수
    STDIN(x)
    ㅈㅈ x
";
        let ir = compile_ok(source);
        assert!(ir.contains("call i32 (ptr, ...) @scanf(ptr @.str, ptr %x)"));
        assert!(ir.contains("c\"%lld\\00\""));
    }

    #[test]
    fn test_stdout_format_string() {
        let source = "\
ㅎㅇ main() 수:
    x = 1
    y = 2.5
    STDOUT(x, y, \"끝\")
    ㅈㅈ 0
";
        let ir = compile_ok(source);
        assert!(ir.contains("c\"%lld %lf %s\\0A\\00\""));
    }

    #[test]
    fn test_return_type_cast() {
        let ir = compile_ok("ㅎㅇ main() 수:\n    ㅈㅈ 1.9\n");
        assert!(ir.contains("fptosi double"));
    }

    #[test]
    fn test_return_type_mismatch_reported() {
        let source = "\
s: 수[2]
ㅎㅇ main() 수:
    ㅈㅈ s
";
        let diag = compile_err(source);
        assert!(diag.contains("리턴 타입이 일치하지 않습니다"));
    }

    #[test]
    fn test_bodiless_return_in_valued_function() {
        let diag = compile_err("ㅎㅇ main() 수:\n    ㅈㅈ\n");
        assert!(diag.contains("반환할 값이 와야 합니다"));
    }

    #[test]
    fn test_class_form_rejected() {
        let diag = compile_err("ㅎㅇ 물건:\n");
        assert!(diag.contains("아직 클래스는 지원되지 않습니다"));
    }

    #[test]
    fn test_scope_discipline_after_function() {
        let parser = Parser::new(
            "ㅎㅇ main() 수:\n    x = 1\n    ㅈㅈ x\n",
            "test.zul",
            Logger::buffered(),
        );
        let ctx = parser.parse();
        assert!(ctx.local_vars.is_empty());
        assert!(ctx.scope_stack.is_empty());
        assert!(!ctx.logger.has_error());
    }

    #[test]
    fn test_every_block_terminated() {
        let source = "\
ㅎㅇ main() 수:
    x = 0
    ㄱㄱ i = 0; i < 3; i = i + 1:
        ㅇㅈ? i == 1:
            x = x + 10
        ㄴㄴ:
            x = x + 1
    ㅈㅈ x
";
        let ir = compile_ok(source);
        // Every label line is eventually followed by a terminator before
        // the next label: no block may fall off the end.
        let mut current: Option<&str> = None;
        let mut terminated = true;
        for line in ir.lines() {
            let trimmed = line.trim();
            if trimmed.ends_with(':') && !trimmed.starts_with(';') && !trimmed.contains(' ') {
                assert!(terminated, "block {current:?} missing terminator\n{ir}");
                current = Some(trimmed);
                terminated = false;
            } else if trimmed.starts_with("br ")
                || trimmed.starts_with("ret ")
                || trimmed == "ret void"
                || trimmed == "unreachable"
            {
                terminated = true;
            }
        }
        assert!(terminated);
    }
}
