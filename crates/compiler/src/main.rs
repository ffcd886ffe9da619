//! Zul compiler CLI
//!
//! `zulc 프로그램.zul` compiles and runs the program. `-S`/`-c` write
//! LLVM IR/bitcode instead; the exit code is non-zero exactly when the
//! compilation reported errors.

use clap::{CommandFactory, Parser as ClapParser};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;
use std::process;

use zulc::{CompilerConfig, EmitMode};

#[derive(ClapParser)]
#[command(name = "zulc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "줄랭 컴파일러 - .zul 프로그램을 컴파일하고 실행합니다", long_about = None)]
struct Cli {
    /// 줄랭 소스파일 (.zul 또는 .줄)
    source: Option<PathBuf>,

    /// 아웃풋 파일 이름
    #[arg(short = 'o', value_name = "파일 이름")]
    output: Option<PathBuf>,

    /// LLVM IR(.ll) 파일로 컴파일
    #[arg(short = 'S', conflicts_with = "emit_bitcode")]
    emit_ir: bool,

    /// LLVM 비트코드(.bc) 파일로 컴파일
    #[arg(short = 'c')]
    emit_bitcode: bool,

    /// 실행 후에도 중간 .ll 파일을 남겨둡니다
    #[arg(long)]
    keep_ir: bool,

    /// Generate shell completion scripts
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "zulc", &mut io::stdout());
        return;
    }

    let Some(source) = cli.source else {
        eprintln!("에러: 소스 파일이 주어지지 않았습니다.");
        process::exit(1);
    };

    let mode = if cli.emit_ir {
        EmitMode::Ir
    } else if cli.emit_bitcode {
        EmitMode::Bitcode
    } else {
        EmitMode::Run
    };
    let mut config = CompilerConfig::new().with_mode(mode).with_keep_ir(cli.keep_ir);
    if let Some(output) = cli.output {
        config = config.with_output(output);
    }

    if let Err(e) = zulc::compile_file(&source, &config) {
        eprintln!("에러: {}", e);
        process::exit(1);
    }
}
