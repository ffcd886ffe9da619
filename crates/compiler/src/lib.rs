//! Zul compiler library
//!
//! Front-end of the Zul ("줄랭") ahead-of-time compiler: a UTF-8 streaming
//! lexer, a recursive-descent parser with fused name resolution, type
//! inference and IR emission, and a diagnostic engine that attaches source
//! spans to every error.
//!
//! The front-end produces LLVM IR as text; the back end is whatever LLVM
//! 15+ toolchain is installed. `-S` writes the `.ll`, `-c` assembles it to
//! bitcode with `llvm-as`, and the default path compiles it with `clang`
//! into a temporary executable and runs it.
//!
//! ```rust,ignore
//! let ir = zulc::compile_to_ir("ㅎㅇ main() 수:\n    ㅈㅈ 0\n", "x.zul")?;
//! assert!(ir.contains("define i64 @main()"));
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod context;
pub mod diag;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod types;

pub use config::{CompilerConfig, EmitMode};
pub use context::ZulContext;
pub use diag::Logger;
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Capture, Token};
pub use types::{Kind, ZulType};

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use tracing::{debug, info};

/// Minimum clang/LLVM version required. The generated IR uses opaque
/// pointers (`ptr`), which need LLVM 15+.
const MIN_CLANG_VERSION: u32 = 15;

/// Cache for the clang version check: Ok(version) or Err(message).
static CLANG_VERSION_CHECKED: OnceLock<Result<u32, String>> = OnceLock::new();

/// Whether the path carries a Zul source extension (`.zul` or `.줄`).
pub fn has_zul_extension(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".zul") || path.to_string_lossy().ends_with(".줄")
}

/// File name without the directory part, for diagnostics headers.
pub fn source_base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Compile source text to textual LLVM IR. On any source error the
/// rendered diagnostics come back as `Err`, in source order.
pub fn compile_to_ir(source: &str, source_name: &str) -> Result<String, String> {
    let parser = Parser::new(source, source_name, Logger::buffered());
    let mut ctx = parser.parse();
    if ctx.logger.has_error() {
        return Err(ctx.logger.take_output());
    }
    Ok(ctx.module.print())
}

/// Compile a `.zul`/`.줄` source file per the configuration: write IR,
/// write bitcode, or build-and-run. Source-level diagnostics go to stderr
/// as they are flushed; the returned `Err` is the driver-level summary.
pub fn compile_file(source_path: &Path, config: &CompilerConfig) -> Result<(), String> {
    if !has_zul_extension(source_path) {
        return Err(
            "알 수 없는 확장자입니다. \"zul\" 또는 \"줄\" 확장자가 필요합니다.".to_string(),
        );
    }
    let source = fs::read_to_string(source_path).map_err(|_| {
        format!(
            "\"{}\" 파일이 존재하지 않습니다.",
            source_path.display()
        )
    })?;
    let base_name = source_base_name(source_path);

    debug!(file = %source_path.display(), "parsing");
    let parser = Parser::new(&source, &base_name, Logger::new());
    let mut ctx = parser.parse();
    ctx.logger.flush();
    if ctx.logger.has_error() {
        return Err("컴파일에 실패했습니다".to_string());
    }
    let ir = ctx.module.print();
    debug!(functions = ctx.protos.len(), "IR generated");

    match config.mode {
        EmitMode::Ir => {
            let out_path = output_path(source_path, config, "ll");
            fs::write(&out_path, ir)
                .map_err(|e| format!("IR 파일을 쓸 수 없습니다: {}", e))?;
            info!(output = %out_path.display(), "wrote LLVM IR");
            Ok(())
        }
        EmitMode::Bitcode => {
            let ll_path = temp_file("ll");
            fs::write(&ll_path, ir)
                .map_err(|e| format!("IR 파일을 쓸 수 없습니다: {}", e))?;
            let out_path = output_path(source_path, config, "bc");
            let result = run_llvm_as(&ll_path, &out_path);
            fs::remove_file(&ll_path).ok();
            result?;
            info!(output = %out_path.display(), "wrote LLVM bitcode");
            Ok(())
        }
        EmitMode::Run => {
            if !ctx
                .protos
                .iter()
                .any(|p| p.name == codegen::ENTRY_FN_NAME && p.has_body)
            {
                return Err("main 함수가 정의되지 않았습니다".to_string());
            }
            check_clang_version()?;
            let ll_path = temp_file("ll");
            fs::write(&ll_path, &ir)
                .map_err(|e| format!("IR 파일을 쓸 수 없습니다: {}", e))?;
            if config.keep_ir {
                let kept = source_path.with_extension("ll");
                fs::write(&kept, &ir).ok();
            }
            let exe_path = temp_file("out");
            let result = run_clang(&ll_path, &exe_path).and_then(|_| {
                debug!(exe = %exe_path.display(), "running");
                Command::new(&exe_path)
                    .status()
                    .map_err(|e| format!("실행에 실패했습니다: {}", e))
                    .map(|_| ())
            });
            fs::remove_file(&ll_path).ok();
            fs::remove_file(&exe_path).ok();
            result
        }
    }
}

/// `-o` override, or the source path with its extension swapped.
fn output_path(source_path: &Path, config: &CompilerConfig, ext: &str) -> PathBuf {
    match &config.output {
        Some(out) => out.clone(),
        None => source_path.with_extension(ext),
    }
}

fn temp_file(ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("zulc-{}.{}", std::process::id(), ext))
}

fn run_clang(ll_path: &Path, exe_path: &Path) -> Result<(), String> {
    let output = Command::new("clang")
        .arg("-O0")
        .arg(ll_path)
        .arg("-o")
        .arg(exe_path)
        .output()
        .map_err(|e| format!("clang을 실행할 수 없습니다: {}", e))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("clang 컴파일에 실패했습니다:\n{}", stderr));
    }
    Ok(())
}

fn run_llvm_as(ll_path: &Path, bc_path: &Path) -> Result<(), String> {
    let output = Command::new("llvm-as")
        .arg(ll_path)
        .arg("-o")
        .arg(bc_path)
        .output()
        .map_err(|e| format!("llvm-as를 실행할 수 없습니다: {}", e))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("비트코드 생성에 실패했습니다:\n{}", stderr));
    }
    Ok(())
}

/// Check that clang is available and new enough for opaque pointers.
/// Cached per process.
pub fn check_clang_version() -> Result<u32, String> {
    CLANG_VERSION_CHECKED
        .get_or_init(|| {
            let output = Command::new("clang")
                .arg("--version")
                .output()
                .map_err(|e| {
                    format!(
                        "clang을 실행할 수 없습니다: {}. clang {} 이상을 설치해야 합니다.",
                        e, MIN_CLANG_VERSION
                    )
                })?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!(
                    "clang --version이 실패했습니다 (코드 {:?}): {}",
                    output.status.code(),
                    stderr
                ));
            }
            let version_str = String::from_utf8_lossy(&output.stdout);
            let version = parse_clang_version(&version_str).ok_or_else(|| {
                format!(
                    "clang 버전을 알 수 없습니다: {}\nclang {} 이상이 필요합니다 (opaque pointer 지원).",
                    version_str.lines().next().unwrap_or(&version_str),
                    MIN_CLANG_VERSION
                )
            })?;

            // Apple clang numbers differently: Apple clang 14 is LLVM 15.
            let is_apple = version_str.contains("Apple clang");
            let effective_min = if is_apple { 14 } else { MIN_CLANG_VERSION };
            if version < effective_min {
                return Err(format!(
                    "clang {} 버전이 감지되었지만 {} 이상이 필요합니다.",
                    version, effective_min
                ));
            }
            Ok(version)
        })
        .clone()
}

/// Major version from `clang --version` output.
fn parse_clang_version(output: &str) -> Option<u32> {
    for line in output.lines() {
        if line.contains("clang version")
            && let Some(idx) = line.find("version ")
        {
            let after_version = &line[idx + 8..];
            let major: String = after_version
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !major.is_empty() {
                return major.parse().ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_validation() {
        assert!(has_zul_extension(Path::new("프로그램.zul")));
        assert!(has_zul_extension(Path::new("경로/제곱.줄")));
        assert!(!has_zul_extension(Path::new("main.rs")));
        assert!(!has_zul_extension(Path::new("zul")));
    }

    #[test]
    fn test_source_base_name() {
        assert_eq!(source_base_name(Path::new("a/b/제곱.zul")), "제곱.zul");
        assert_eq!(source_base_name(Path::new("제곱.zul")), "제곱.zul");
    }

    #[test]
    fn test_output_path_default_and_override() {
        let config = CompilerConfig::new();
        assert_eq!(
            output_path(Path::new("dir/x.zul"), &config, "ll"),
            PathBuf::from("dir/x.ll")
        );
        let config = config.with_output("custom.ll");
        assert_eq!(
            output_path(Path::new("dir/x.zul"), &config, "ll"),
            PathBuf::from("custom.ll")
        );
    }

    #[test]
    fn test_compile_to_ir_ok() {
        let ir = compile_to_ir("ㅎㅇ main() 수:\n    ㅈㅈ 0\n", "ok.zul").unwrap();
        assert!(ir.contains("source_filename = \"ok.zul\""));
        assert!(ir.contains("define i64 @main()"));
        assert!(ir.contains("declare i32 @printf(ptr, ...)"));
    }

    #[test]
    fn test_compile_to_ir_errors_in_source_order() {
        let err = compile_to_ir(
            "ㅎㅇ main() 수:\n    y = z + 1\n    ㅅㄱ\n",
            "bad.zul",
        )
        .unwrap_err();
        assert!(err.contains("bad.zul 2:"));
        assert!(err.contains("bad.zul 3:"));
        let undeclared = err.find("존재하지 않는 변수").unwrap();
        let stray_break = err.find("반복문 안에서만").unwrap();
        assert!(undeclared < stray_break);
    }

    #[test]
    fn test_compile_to_ir_suppresses_output_on_error() {
        assert!(compile_to_ir("ㅎㅇ main() 수:\n    ㅅㄱ\n", "bad.zul").is_err());
    }

    #[test]
    fn test_compile_file_rejects_extension() {
        let err = compile_file(Path::new("x.txt"), &CompilerConfig::new()).unwrap_err();
        assert!(err.contains("알 수 없는 확장자"));
    }

    #[test]
    fn test_compile_file_missing_source() {
        let err = compile_file(Path::new("없는파일.zul"), &CompilerConfig::new()).unwrap_err();
        assert!(err.contains("존재하지 않습니다"));
    }

    #[test]
    fn test_compile_file_writes_ir() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("더하기.zul");
        fs::write(&src, "ㅎㅇ main() 수:\n    ㅈㅈ 1 + 2\n").unwrap();
        let config = CompilerConfig::new().with_mode(EmitMode::Ir);
        compile_file(&src, &config).unwrap();
        let ir = fs::read_to_string(dir.path().join("더하기.ll")).unwrap();
        assert!(ir.contains("define i64 @main()"));
        assert!(ir.contains("add i64 1, 2"));
    }

    #[test]
    fn test_compile_file_ir_output_override() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("x.zul");
        fs::write(&src, "ㅎㅇ main() 수:\n    ㅈㅈ 0\n").unwrap();
        let out = dir.path().join("다른이름.ll");
        let config = CompilerConfig::new()
            .with_mode(EmitMode::Ir)
            .with_output(&out);
        compile_file(&src, &config).unwrap();
        assert!(out.exists());
    }

    #[test]
    fn test_compile_file_error_suppresses_ir() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bad.zul");
        fs::write(&src, "ㅎㅇ main() 수:\n    ㅅㄱ\n").unwrap();
        let config = CompilerConfig::new().with_mode(EmitMode::Ir);
        assert!(compile_file(&src, &config).is_err());
        assert!(!dir.path().join("bad.ll").exists());
    }

    #[test]
    fn test_parse_clang_version() {
        assert_eq!(
            parse_clang_version("clang version 15.0.0 (https://example)"),
            Some(15)
        );
        assert_eq!(
            parse_clang_version("Apple clang version 14.0.3 (clang-1403.0.22.14.1)"),
            Some(14)
        );
        assert_eq!(
            parse_clang_version("Homebrew clang version 17.0.6"),
            Some(17)
        );
        assert_eq!(parse_clang_version("no version here"), None);
    }
}
