//! LLVM IR construction via text
//!
//! The front-end builds LLVM IR as text (.ll), the same way it would drive
//! an SSA builder API: functions are grown block by block with an insertion
//! cursor, and the module is serialized once parsing finishes. Generating
//! text keeps the compiler free of FFI bindings; any LLVM 15+ toolchain
//! (opaque pointers) consumes the output.
//!
//! # Module structure
//!
//! - `mod.rs`: module/function/block data model, serialization, the
//!   unreachable-block pruner, and symbol/string escaping
//! - `builder.rs`: the instruction-level [`Builder`] with its insertion
//!   cursor and SSA temporary allocation

mod builder;

pub use builder::Builder;

use std::collections::HashMap;
use std::fmt::Write as _;

/// A rendered IR operand: an SSA temporary (`%t3`), a named slot
/// (`%x.addr`), a constant (`42`, `0x…`, `true`, `null`) or a global
/// (`@name`, `@.str.0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(String);

impl Value {
    pub fn imm_int(v: i64) -> Value {
        Value(v.to_string())
    }

    pub fn imm_bool(v: bool) -> Value {
        Value(if v { "true" } else { "false" }.to_string())
    }

    pub fn imm_char(v: u8) -> Value {
        Value(v.to_string())
    }

    pub fn imm_real(v: f64) -> Value {
        Value(crate::types::real_repr(v))
    }

    pub fn null() -> Value {
        Value("null".to_string())
    }

    pub fn global(name: &str) -> Value {
        Value(format!("@{}", quote_symbol(name)))
    }

    pub(crate) fn raw(repr: String) -> Value {
        Value(repr)
    }

    pub fn repr(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a basic block within the function under construction.
pub type BlockId = usize;

/// How a basic block ends. Kept structured (rather than pre-rendered) so
/// predecessor edges can be computed for the unreachable-block pruner.
#[derive(Debug, Clone)]
pub enum Terminator {
    RetVoid,
    Ret(&'static str, Value),
    Br(BlockId),
    CondBr(Value, BlockId, BlockId),
}

#[derive(Debug)]
pub struct Block {
    label: String,
    insts: Vec<String>,
    term: Option<Terminator>,
}

/// A function definition being grown by the [`Builder`].
#[derive(Debug)]
pub struct Function {
    name: String,
    ret: &'static str,
    params: Vec<(String, String)>,
    is_var_arg: bool,
    blocks: Vec<Block>,
    removed: Vec<bool>,
    /// Allocas hoisted to the top of the entry block.
    entry_allocas: Vec<String>,
    next_temp: usize,
    label_counts: HashMap<String, usize>,
    local_names: HashMap<String, usize>,
}

impl Function {
    fn new(name: &str, ret: &'static str, params: Vec<(String, String)>, is_var_arg: bool) -> Self {
        let mut func = Function {
            name: name.to_string(),
            ret,
            params,
            is_var_arg,
            blocks: Vec::new(),
            removed: Vec::new(),
            entry_allocas: Vec::new(),
            next_temp: 0,
            label_counts: HashMap::new(),
            local_names: HashMap::new(),
        };
        // Parameter SSA names are taken; locals fall back to suffixed slots.
        for (_, name) in func.params.clone() {
            func.local_names.insert(name, 1);
        }
        func.add_block("entry");
        func
    }

    fn add_block(&mut self, name: &str) -> BlockId {
        let n = self.label_counts.entry(name.to_string()).or_insert(0);
        let label = if *n == 0 {
            name.to_string()
        } else {
            format!("{}{}", name, n)
        };
        *n += 1;
        self.blocks.push(Block {
            label,
            insts: Vec::new(),
            term: None,
        });
        self.removed.push(false);
        self.blocks.len() - 1
    }

    /// Slot name for a local, suffixed on re-declaration so shadowed
    /// variables in sibling scopes get distinct storage.
    fn unique_local(&mut self, name: &str) -> String {
        let n = self.local_names.entry(name.to_string()).or_insert(0);
        let unique = if *n == 0 {
            name.to_string()
        } else {
            format!("{}.{}", name, n)
        };
        *n += 1;
        unique
    }

    pub fn label(&self, id: BlockId) -> &str {
        &self.blocks[id].label
    }

    /// Predecessor counts induced by branch terminators of live blocks.
    fn pred_counts(&self) -> Vec<usize> {
        let mut preds = vec![0usize; self.blocks.len()];
        for (id, block) in self.blocks.iter().enumerate() {
            if self.removed[id] {
                continue;
            }
            match block.term {
                Some(Terminator::Br(t)) => preds[t] += 1,
                Some(Terminator::CondBr(_, t, f)) => {
                    preds[t] += 1;
                    preds[f] += 1;
                }
                _ => {}
            }
        }
        preds
    }

    /// Whether `id` could be dropped by the pruner right now: a non-entry
    /// block no live block branches to.
    pub fn is_unreachable(&self, id: BlockId) -> bool {
        id != 0 && self.pred_counts()[id] == 0
    }

    /// Drop every non-entry block that has no predecessors, repeatedly, so
    /// a dangling merge block takes its unreachable tail with it. Called
    /// once when a function body ends in a block that nothing branches to
    /// (every path already returned).
    pub fn prune_unreachable(&mut self) {
        loop {
            let preds = self.pred_counts();
            let mut changed = false;
            for id in 1..self.blocks.len() {
                if !self.removed[id] && preds[id] == 0 {
                    self.removed[id] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn render(&self, out: &mut String) {
        let params = self
            .params
            .iter()
            .map(|(ty, name)| format!("{} %{}", ty, quote_symbol(name)))
            .collect::<Vec<_>>()
            .join(", ");
        let variadic = if self.is_var_arg {
            if self.params.is_empty() { "..." } else { ", ..." }
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "define {} @{}({}{}) {{",
            self.ret,
            quote_symbol(&self.name),
            params,
            variadic
        );
        for (id, block) in self.blocks.iter().enumerate() {
            if self.removed[id] {
                continue;
            }
            let _ = writeln!(out, "{}:", block.label);
            if id == 0 {
                for alloca in &self.entry_allocas {
                    let _ = writeln!(out, "  {}", alloca);
                }
            }
            for inst in &block.insts {
                let _ = writeln!(out, "  {}", inst);
            }
            match &block.term {
                Some(Terminator::RetVoid) => {
                    let _ = writeln!(out, "  ret void");
                }
                Some(Terminator::Ret(ty, v)) => {
                    let _ = writeln!(out, "  ret {} {}", ty, v);
                }
                Some(Terminator::Br(t)) => {
                    let _ = writeln!(out, "  br label %{}", self.blocks[*t].label);
                }
                Some(Terminator::CondBr(c, t, f)) => {
                    let _ = writeln!(
                        out,
                        "  br i1 {}, label %{}, label %{}",
                        c, self.blocks[*t].label, self.blocks[*f].label
                    );
                }
                // Serialized functions are expected to be fully terminated;
                // an open block becomes `unreachable` rather than invalid IR.
                None => {
                    let _ = writeln!(out, "  unreachable");
                }
            }
        }
        let _ = writeln!(out, "}}");
    }
}

/// One compilation unit's worth of IR: string constants, globals, external
/// declarations and function definitions, serialized in that order.
pub struct Module {
    source_name: String,
    strings: Vec<String>,
    globals: Vec<String>,
    decls: Vec<String>,
    funcs: Vec<Function>,
    next_str: usize,
}

impl Module {
    pub fn new(source_name: &str) -> Self {
        Module {
            source_name: source_name.to_string(),
            strings: Vec::new(),
            globals: Vec::new(),
            // The stdio intrinsics lower to these; declared up front.
            decls: vec![
                "declare i32 @printf(ptr, ...)".to_string(),
                "declare i32 @scanf(ptr, ...)".to_string(),
            ],
            funcs: Vec::new(),
            next_str: 0,
        }
    }

    /// Create a NUL-terminated private string constant and return its
    /// address. Each call creates a fresh constant.
    pub fn add_string(&mut self, s: &str) -> Value {
        let name = if self.next_str == 0 {
            "@.str".to_string()
        } else {
            format!("@.str.{}", self.next_str)
        };
        self.next_str += 1;
        self.strings.push(format!(
            "{} = private unnamed_addr constant [{} x i8] c\"{}\\00\", align 1",
            name,
            s.len() + 1,
            escape_string(s)
        ));
        Value::raw(name)
    }

    /// Define a zero-initialized scalar or pointer global.
    pub fn add_global(&mut self, name: &str, llvm_ty: &str, init: &str) -> Value {
        self.globals.push(format!(
            "@{} = global {} {}",
            quote_symbol(name),
            llvm_ty,
            init
        ));
        Value::global(name)
    }

    /// Define a zero-initialized global array of `size` scalar elements.
    pub fn add_global_array(&mut self, name: &str, elem_ty: &str, size: u64) -> Value {
        self.globals.push(format!(
            "@{} = global [{} x {}] zeroinitializer",
            quote_symbol(name),
            size,
            elem_ty
        ));
        Value::global(name)
    }

    /// Add an external function declaration (for bodiless prototypes).
    pub fn declare_function(
        &mut self,
        name: &str,
        ret: &str,
        param_tys: &[&str],
        is_var_arg: bool,
    ) {
        let mut sig = param_tys.join(", ");
        if is_var_arg {
            if !sig.is_empty() {
                sig.push_str(", ");
            }
            sig.push_str("...");
        }
        self.decls
            .push(format!("declare {} @{}({})", ret, quote_symbol(name), sig));
    }

    pub fn push_function(&mut self, func: Function) {
        self.funcs.push(func);
    }

    /// Serialize the whole module as textual LLVM IR.
    pub fn print(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; ModuleID = '{}'", self.source_name);
        let _ = writeln!(out, "source_filename = \"{}\"", self.source_name);
        let triple = target_triple();
        if triple != "unknown" {
            let _ = writeln!(out, "target triple = \"{}\"", triple);
        }
        out.push('\n');
        for s in &self.strings {
            let _ = writeln!(out, "{}", s);
        }
        if !self.strings.is_empty() {
            out.push('\n');
        }
        for g in &self.globals {
            let _ = writeln!(out, "{}", g);
        }
        if !self.globals.is_empty() {
            out.push('\n');
        }
        for d in &self.decls {
            let _ = writeln!(out, "{}", d);
        }
        out.push('\n');
        for func in &self.funcs {
            func.render(&mut out);
            out.push('\n');
        }
        out
    }
}

/// Target triple for the host, so clang does not have to guess.
pub fn target_triple() -> &'static str {
    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    {
        "arm64-apple-macosx14.0.0"
    }

    #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
    {
        "x86_64-apple-darwin"
    }

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    {
        "x86_64-unknown-linux-gnu"
    }

    #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
    {
        "aarch64-unknown-linux-gnu"
    }

    #[cfg(not(any(
        all(target_os = "macos", target_arch = "aarch64"),
        all(target_os = "macos", target_arch = "x86_64"),
        all(target_os = "linux", target_arch = "x86_64"),
        all(target_os = "linux", target_arch = "aarch64")
    )))]
    {
        "unknown"
    }
}

/// Escape a string for an LLVM IR `c"..."` literal.
fn escape_string(s: &str) -> String {
    let mut out = String::new();
    for byte in s.bytes() {
        match byte {
            b' '..=b'!' | b'#'..=b'[' | b']'..=b'~' => out.push(byte as char),
            b'\\' => out.push_str(r"\\"),
            b'"' => out.push_str(r"\22"),
            _ => {
                let _ = write!(out, r"\{:02X}", byte);
            }
        }
    }
    out
}

/// LLVM identifiers are `[A-Za-z$._][A-Za-z$._0-9]*` unquoted; anything
/// else (Korean names in particular) must be quoted.
pub fn quote_symbol(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .enumerate()
            .all(|(i, c)| {
                c.is_ascii_alphabetic()
                    || c == '$'
                    || c == '.'
                    || c == '_'
                    || (i > 0 && c.is_ascii_digit())
            });
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('\\', r"\\").replace('"', r"\22"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("hi"), "hi");
        assert_eq!(escape_string("a\nb"), r"a\0Ab");
        assert_eq!(escape_string("한"), r"\ED\95\9C");
        assert_eq!(escape_string("\"x\""), r"\22x\22");
    }

    #[test]
    fn test_quote_symbol() {
        assert_eq!(quote_symbol("main"), "main");
        assert_eq!(quote_symbol("x.addr"), "x.addr");
        assert_eq!(quote_symbol("더하기"), "\"더하기\"");
        assert_eq!(quote_symbol("1bad"), "\"1bad\"");
    }

    #[test]
    fn test_string_constants_are_fresh() {
        let mut module = Module::new("t.zul");
        let a = module.add_string("hi");
        let b = module.add_string("hi");
        assert_eq!(a.repr(), "@.str");
        assert_eq!(b.repr(), "@.str.1");
        let ir = module.print();
        assert!(ir.contains("[3 x i8] c\"hi\\00\""));
    }

    #[test]
    fn test_module_header_and_decls() {
        let module = Module::new("프로그램.zul");
        let ir = module.print();
        assert!(ir.contains("source_filename = \"프로그램.zul\""));
        assert!(ir.contains("declare i32 @printf(ptr, ...)"));
        assert!(ir.contains("declare i32 @scanf(ptr, ...)"));
    }

    #[test]
    fn test_global_array() {
        let mut module = Module::new("t.zul");
        module.add_global_array("a", "i64", 5);
        assert!(
            module
                .print()
                .contains("@a = global [5 x i64] zeroinitializer")
        );
    }

    #[test]
    fn test_prune_drops_dangling_chain() {
        let mut func = Function::new("f", "i64", vec![], false);
        let merge = func.add_block("merge");
        let tail = func.add_block("tail");
        func.blocks[0].term = Some(Terminator::Ret("i64", Value::imm_int(0)));
        // merge -> tail, but nothing reaches merge.
        func.blocks[merge].term = Some(Terminator::Br(tail));
        assert!(func.is_unreachable(merge));
        func.prune_unreachable();
        assert!(func.removed[merge]);
        assert!(func.removed[tail]);
        let mut out = String::new();
        func.render(&mut out);
        assert!(!out.contains("merge:"));
        assert!(!out.contains("tail:"));
    }

    #[test]
    fn test_entry_never_pruned() {
        let mut func = Function::new("f", "void", vec![], false);
        func.blocks[0].term = Some(Terminator::RetVoid);
        func.prune_unreachable();
        assert!(!func.removed[0]);
    }
}
