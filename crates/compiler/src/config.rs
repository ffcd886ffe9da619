//! Compiler configuration
//!
//! What to do with the compiled module (run it, write textual IR, write
//! bitcode) and where output goes. The CLI builds one of these from its
//! flags; library users construct it directly.

use std::path::PathBuf;

/// What the driver does with the module once parsing succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitMode {
    /// Compile to a temporary executable and run it (the JIT path).
    #[default]
    Run,
    /// Write textual LLVM IR (`-S`).
    Ir,
    /// Write LLVM bitcode (`-c`).
    Bitcode,
}

#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub mode: EmitMode,
    /// Output path for `-S`/`-c`; defaults to the source path with the
    /// extension swapped.
    pub output: Option<PathBuf>,
    /// Keep the intermediate `.ll` next to the source when running.
    pub keep_ir: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_mode(mut self, mode: EmitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_keep_ir(mut self, keep_ir: bool) -> Self {
        self.keep_ir = keep_ir;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_runs() {
        let config = CompilerConfig::default();
        assert_eq!(config.mode, EmitMode::Run);
        assert!(config.output.is_none());
        assert!(!config.keep_ir);
    }

    #[test]
    fn test_builder() {
        let config = CompilerConfig::new()
            .with_mode(EmitMode::Ir)
            .with_output("out.ll")
            .with_keep_ir(true);
        assert_eq!(config.mode, EmitMode::Ir);
        assert_eq!(config.output, Some(PathBuf::from("out.ll")));
        assert!(config.keep_ir);
    }
}
