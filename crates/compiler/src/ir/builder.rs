//! Instruction-level IR builder
//!
//! Owns the function under construction and an insertion cursor. Emitters
//! create blocks ahead of time, move the cursor between them, and append
//! instructions; SSA temporaries are numbered per function. Terminators
//! are write-once per block, which is what keeps the "exactly one
//! terminator" invariant when an emitter bails out after a branch.

use super::{BlockId, Function, Terminator, Value, quote_symbol};

pub struct Builder {
    func: Option<Function>,
    cursor: BlockId,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            func: None,
            cursor: 0,
        }
    }

    /// Start a fresh function; the cursor lands in its entry block.
    pub fn begin_function(
        &mut self,
        name: &str,
        ret: &'static str,
        params: Vec<(String, String)>,
        is_var_arg: bool,
    ) {
        self.func = Some(Function::new(name, ret, params, is_var_arg));
        self.cursor = 0;
    }

    /// Take the finished function out of the builder.
    pub fn finish_function(&mut self) -> Option<Function> {
        self.cursor = 0;
        self.func.take()
    }

    pub fn has_function(&self) -> bool {
        self.func.is_some()
    }

    fn f(&mut self) -> &mut Function {
        self.func.as_mut().expect("no function under construction")
    }

    fn f_ref(&self) -> &Function {
        self.func.as_ref().expect("no function under construction")
    }

    pub fn create_block(&mut self, name: &str) -> BlockId {
        self.f().add_block(name)
    }

    pub fn position_at(&mut self, block: BlockId) {
        self.cursor = block;
    }

    pub fn cur_block(&self) -> BlockId {
        self.cursor
    }

    pub fn block_label(&self, id: BlockId) -> String {
        self.f_ref().label(id).to_string()
    }

    /// Whether the current block already ends in a terminator.
    pub fn has_terminator(&self) -> bool {
        self.f_ref().blocks[self.cursor].term.is_some()
    }

    /// Whether the current block is a dangling block the pruner may drop.
    pub fn cur_block_unreachable(&self) -> bool {
        self.f_ref().is_unreachable(self.cursor)
    }

    pub fn prune_unreachable(&mut self) {
        self.f().prune_unreachable();
    }

    fn fresh_temp(&mut self) -> Value {
        let func = self.f();
        let n = func.next_temp;
        func.next_temp += 1;
        Value::raw(format!("%t{}", n))
    }

    fn push(&mut self, inst: String) {
        let cursor = self.cursor;
        self.f().blocks[cursor].insts.push(inst);
    }

    /// First terminator wins; later ones are dropped so a block never ends
    /// twice.
    fn set_term(&mut self, term: Terminator) {
        let cursor = self.cursor;
        let block = &mut self.f().blocks[cursor];
        if block.term.is_none() {
            block.term = Some(term);
        }
    }

    /// Stack slot in the entry block. Slots for shadowing declarations get
    /// suffixed names so every declaration keeps distinct storage.
    pub fn alloca(&mut self, name: &str, ty: &str) -> Value {
        let unique = self.f().unique_local(name);
        let slot = format!("%{}", quote_symbol(&unique));
        let inst = format!("{} = alloca {}", slot, ty);
        self.f().entry_allocas.push(inst);
        Value::raw(slot)
    }

    /// The SSA value of an incoming parameter.
    pub fn param_value(name: &str) -> Value {
        Value::raw(format!("%{}", quote_symbol(name)))
    }

    pub fn load(&mut self, ty: &str, ptr: &Value) -> Value {
        let out = self.fresh_temp();
        self.push(format!("{} = load {}, ptr {}", out, ty, ptr));
        out
    }

    pub fn store(&mut self, ty: &str, val: &Value, ptr: &Value) {
        self.push(format!("store {} {}, ptr {}", ty, val, ptr));
    }

    pub fn gep(&mut self, elem_ty: &str, ptr: &Value, index: &Value) -> Value {
        let out = self.fresh_temp();
        self.push(format!(
            "{} = getelementptr {}, ptr {}, i64 {}",
            out, elem_ty, ptr, index
        ));
        out
    }

    /// Two-operand instruction: `add`, `fadd`, `and`, `shl`, `ashr`, ...
    pub fn bin(&mut self, op: &str, ty: &str, lhs: &Value, rhs: &Value) -> Value {
        let out = self.fresh_temp();
        self.push(format!("{} = {} {} {}, {}", out, op, ty, lhs, rhs));
        out
    }

    /// Integer comparison; the result is always i1.
    pub fn icmp(&mut self, cond: &str, ty: &str, lhs: &Value, rhs: &Value) -> Value {
        let out = self.fresh_temp();
        self.push(format!("{} = icmp {} {} {}, {}", out, cond, ty, lhs, rhs));
        out
    }

    /// Ordered float comparison; the result is always i1.
    pub fn fcmp(&mut self, cond: &str, lhs: &Value, rhs: &Value) -> Value {
        let out = self.fresh_temp();
        self.push(format!("{} = fcmp {} double {}, {}", out, cond, lhs, rhs));
        out
    }

    /// Conversion instruction: `sitofp`, `fptosi`, `zext`, `sext`, `trunc`.
    pub fn cast(&mut self, op: &str, from_ty: &str, val: &Value, to_ty: &str) -> Value {
        let out = self.fresh_temp();
        self.push(format!("{} = {} {} {} to {}", out, op, from_ty, val, to_ty));
        out
    }

    pub fn phi(&mut self, ty: &str, incomings: &[(Value, BlockId)]) -> Value {
        let rendered = incomings
            .iter()
            .map(|(v, b)| format!("[ {}, %{} ]", v, self.f_ref().label(*b)))
            .collect::<Vec<_>>()
            .join(", ");
        let out = self.fresh_temp();
        self.push(format!("{} = phi {} {}", out, ty, rendered));
        out
    }

    /// Call a function. `sig` is the callee's return type, or the full
    /// `ret (params, ...)` signature for variadic callees. Returns `None`
    /// for void calls, which produce no SSA value.
    pub fn call(&mut self, sig: &str, callee: &Value, args: &[(String, Value)]) -> Option<Value> {
        let rendered = args
            .iter()
            .map(|(ty, v)| format!("{} {}", ty, v))
            .collect::<Vec<_>>()
            .join(", ");
        if sig == "void" || sig.starts_with("void ") {
            self.push(format!("call {} {}({})", sig, callee, rendered));
            None
        } else {
            let out = self.fresh_temp();
            self.push(format!("{} = call {} {}({})", out, sig, callee, rendered));
            Some(out)
        }
    }

    pub fn br(&mut self, target: BlockId) {
        self.set_term(Terminator::Br(target));
    }

    pub fn cond_br(&mut self, cond: &Value, then_block: BlockId, else_block: BlockId) {
        self.set_term(Terminator::CondBr(cond.clone(), then_block, else_block));
    }

    pub fn ret(&mut self, ty: &'static str, val: &Value) {
        self.set_term(Terminator::Ret(ty, val.clone()));
    }

    pub fn ret_void(&mut self) {
        self.set_term(Terminator::RetVoid);
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(func: Function) -> String {
        let mut out = String::new();
        func.render(&mut out);
        out
    }

    #[test]
    fn test_simple_function() {
        let mut b = Builder::new();
        b.begin_function("main", "i64", vec![], false);
        let lhs = Value::imm_int(1);
        let rhs = Value::imm_int(2);
        let sum = b.bin("add", "i64", &lhs, &rhs);
        b.ret("i64", &sum);
        let out = render(b.finish_function().unwrap());
        assert!(out.contains("define i64 @main() {"));
        assert!(out.contains("%t0 = add i64 1, 2"));
        assert!(out.contains("ret i64 %t0"));
    }

    #[test]
    fn test_alloca_hoisted_to_entry() {
        let mut b = Builder::new();
        b.begin_function("f", "void", vec![], false);
        let body = b.create_block("body");
        b.br(body);
        b.position_at(body);
        let slot = b.alloca("x", "i64");
        b.store("i64", &Value::imm_int(3), &slot);
        b.ret_void();
        let out = render(b.finish_function().unwrap());
        let entry_pos = out.find("entry:").unwrap();
        let alloca_pos = out.find("%x = alloca i64").unwrap();
        let body_pos = out.find("body:").unwrap();
        assert!(entry_pos < alloca_pos && alloca_pos < body_pos);
    }

    #[test]
    fn test_shadowed_slot_names() {
        let mut b = Builder::new();
        b.begin_function("f", "void", vec![], false);
        let first = b.alloca("x", "i64");
        let second = b.alloca("x", "double");
        assert_eq!(first.repr(), "%x");
        assert_eq!(second.repr(), "%x.1");
    }

    #[test]
    fn test_param_slot_does_not_collide() {
        let mut b = Builder::new();
        b.begin_function("f", "i64", vec![("i64".to_string(), "x".to_string())], false);
        let slot = b.alloca("x", "i64");
        assert_eq!(slot.repr(), "%x.1");
    }

    #[test]
    fn test_terminator_write_once() {
        let mut b = Builder::new();
        b.begin_function("f", "i64", vec![], false);
        b.ret("i64", &Value::imm_int(1));
        b.ret("i64", &Value::imm_int(2));
        let out = render(b.finish_function().unwrap());
        assert!(out.contains("ret i64 1"));
        assert!(!out.contains("ret i64 2"));
    }

    #[test]
    fn test_phi_uses_block_labels() {
        let mut b = Builder::new();
        b.begin_function("f", "i1", vec![], false);
        let test = b.create_block("sc_test");
        let end = b.create_block("sc_end");
        let entry = b.cur_block();
        b.cond_br(&Value::imm_bool(true), test, end);
        b.position_at(test);
        b.br(end);
        b.position_at(end);
        let phi = b.phi(
            "i1",
            &[
                (Value::imm_bool(false), entry),
                (Value::imm_bool(true), test),
            ],
        );
        b.ret("i1", &phi);
        let out = render(b.finish_function().unwrap());
        assert!(
            out.contains("phi i1 [ false, %entry ], [ true, %sc_test ]"),
            "unexpected IR:\n{out}"
        );
    }

    #[test]
    fn test_variadic_call_signature() {
        let mut b = Builder::new();
        b.begin_function("main", "i64", vec![], false);
        let fmt = Value::raw("@.str".to_string());
        let result = b.call(
            "i32 (ptr, ...)",
            &Value::raw("@printf".to_string()),
            &[
                ("ptr".to_string(), fmt),
                ("i64".to_string(), Value::imm_int(42)),
            ],
        );
        assert!(result.is_some());
        b.ret("i64", &Value::imm_int(0));
        let out = render(b.finish_function().unwrap());
        assert!(out.contains("call i32 (ptr, ...) @printf(ptr @.str, i64 42)"));
    }

    #[test]
    fn test_void_call_has_no_result() {
        let mut b = Builder::new();
        b.begin_function("main", "i64", vec![], false);
        let callee = Value::global("출력");
        let result = b.call("void", &callee, &[]);
        assert!(result.is_none());
        b.ret("i64", &Value::imm_int(0));
        let out = render(b.finish_function().unwrap());
        assert!(out.contains("call void @\"출력\"()"));
    }
}
