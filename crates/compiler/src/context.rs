//! Shared compilation context
//!
//! One mutable state bag threaded through parsing and code generation: the
//! IR module and builder, both symbol tables, the lexical scope stack, the
//! loop target stacks and the per-function return plumbing. The front-end
//! is single-threaded, so the context is simply passed by mutable
//! reference wherever it is needed.
//!
//! Scope bookkeeping happens at parse time (names become invisible the
//! moment their block closes); the slots themselves are emit-time values
//! re-inserted by each declaration's code generation.

use std::collections::HashMap;

use crate::ast::FuncProto;
use crate::diag::Logger;
use crate::ir;
use crate::types::ZulType;

pub struct ZulContext {
    pub logger: Logger,
    pub module: ir::Module,
    pub builder: ir::Builder,

    /// Globals: name -> (storage address, type). Arrays keep their array
    /// type here; they decay only when their value is used.
    pub global_vars: HashMap<String, (ir::Value, ZulType)>,
    /// Locals: name -> (stack slot, type). The slot is `None` between a
    /// declaration's parse-time registration and its emission, which is
    /// what turns a self-referential initializer into a quiet failure
    /// instead of a crash. The type is `None` when inference failed.
    pub local_vars: HashMap<String, (Option<ir::Value>, Option<ZulType>)>,
    /// Names introduced per lexical scope; popping erases them from
    /// `local_vars` without touching the underlying slots.
    pub scope_stack: Vec<Vec<String>>,

    pub loop_update_stack: Vec<ir::BlockId>,
    pub loop_end_stack: Vec<ir::BlockId>,
    /// Parse-time flag validating `ㅅㄱ`/`ㅌㅌ` placement.
    pub in_loop: bool,

    /// Number of `ㅈㅈ` statements in the function being parsed. The
    /// common return block and slot exist only when this reaches two.
    pub ret_count: usize,
    pub return_block: Option<ir::BlockId>,
    pub return_var: Option<ir::Value>,

    /// Insertion-stable prototype registry; calls hold indices into it.
    pub protos: Vec<FuncProto>,
    proto_index: HashMap<String, usize>,
}

impl ZulContext {
    pub fn new(source_name: &str, logger: Logger) -> Self {
        ZulContext {
            logger,
            module: ir::Module::new(source_name),
            builder: ir::Builder::new(),
            global_vars: HashMap::new(),
            local_vars: HashMap::with_capacity(50),
            scope_stack: Vec::new(),
            loop_update_stack: Vec::new(),
            loop_end_stack: Vec::new(),
            in_loop: false,
            ret_count: 0,
            return_block: None,
            return_var: None,
            protos: Vec::new(),
            proto_index: HashMap::new(),
        }
    }

    /// True when the name resolves as a variable, local or global.
    pub fn var_exists(&self, name: &str) -> bool {
        self.local_vars.contains_key(name) || self.global_vars.contains_key(name)
    }

    pub fn push_scope(&mut self) {
        self.scope_stack.push(Vec::new());
    }

    /// Erase the top scope's names from the local map. The stack slots
    /// stay valid in the IR; they just become unreachable by lookup.
    pub fn pop_scope(&mut self) {
        if let Some(scope_vars) = self.scope_stack.pop() {
            for name in scope_vars {
                self.local_vars.remove(&name);
            }
        }
    }

    /// Register a local name eagerly at declaration-parse time. The slot
    /// arrives later, when the declaration emits.
    pub fn declare_local(&mut self, name: &str, ty: Option<ZulType>) {
        self.local_vars.insert(name.to_string(), (None, ty));
        if let Some(scope) = self.scope_stack.last_mut() {
            scope.push(name.to_string());
        }
    }

    pub fn enter_loop(&mut self, update: ir::BlockId, end: ir::BlockId) {
        self.loop_update_stack.push(update);
        self.loop_end_stack.push(end);
    }

    pub fn leave_loop(&mut self) {
        self.loop_update_stack.pop();
        self.loop_end_stack.pop();
    }

    /// Add a prototype, or return the index it already has.
    pub fn register_proto(&mut self, proto: FuncProto) -> usize {
        if let Some(&idx) = self.proto_index.get(&proto.name) {
            return idx;
        }
        let idx = self.protos.len();
        self.proto_index.insert(proto.name.clone(), idx);
        self.protos.push(proto);
        idx
    }

    pub fn find_proto(&self, name: &str) -> Option<usize> {
        self.proto_index.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Kind;

    fn ctx() -> ZulContext {
        ZulContext::new("test.zul", Logger::buffered())
    }

    #[test]
    fn test_scope_pop_erases_names() {
        let mut ctx = ctx();
        ctx.push_scope();
        ctx.declare_local("x", Some(ZulType::Scalar(Kind::Int)));
        assert!(ctx.var_exists("x"));
        ctx.pop_scope();
        assert!(!ctx.var_exists("x"));
    }

    #[test]
    fn test_nested_scopes() {
        let mut ctx = ctx();
        ctx.push_scope();
        ctx.declare_local("바깥", Some(ZulType::Scalar(Kind::Int)));
        ctx.push_scope();
        ctx.declare_local("안쪽", Some(ZulType::Scalar(Kind::Float)));
        ctx.pop_scope();
        assert!(ctx.var_exists("바깥"));
        assert!(!ctx.var_exists("안쪽"));
        ctx.pop_scope();
        assert!(!ctx.var_exists("바깥"));
    }

    #[test]
    fn test_loop_stacks_nest() {
        let mut ctx = ctx();
        ctx.enter_loop(1, 2);
        ctx.enter_loop(3, 4);
        assert_eq!(ctx.loop_update_stack.last(), Some(&3));
        assert_eq!(ctx.loop_end_stack.last(), Some(&4));
        ctx.leave_loop();
        assert_eq!(ctx.loop_update_stack.last(), Some(&1));
        assert_eq!(ctx.loop_end_stack.last(), Some(&2));
    }

    #[test]
    fn test_proto_registry_is_stable() {
        let mut ctx = ctx();
        let first = ctx.register_proto(FuncProto::new(
            "f",
            Some(ZulType::Scalar(Kind::Int)),
            vec![],
            false,
            false,
        ));
        let second = ctx.register_proto(FuncProto::new(
            "g",
            None,
            vec![],
            false,
            false,
        ));
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(ctx.find_proto("f"), Some(0));
        assert_eq!(ctx.register_proto(FuncProto::new("f", None, vec![], true, false)), 0);
        // Re-registration does not overwrite the original entry.
        assert_eq!(ctx.protos[0].return_type, Some(ZulType::Scalar(Kind::Int)));
    }

    #[test]
    fn test_global_and_local_are_both_variables() {
        let mut ctx = ctx();
        ctx.global_vars.insert(
            "전역".to_string(),
            (ir::Value::global("전역"), ZulType::Array(Kind::Int)),
        );
        assert!(ctx.var_exists("전역"));
        assert!(!ctx.var_exists("지역"));
    }
}
