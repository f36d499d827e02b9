//! `minic` command-line driver.
//!
//! Prints the token listing, the AST, or the IR of a source file, or builds
//! and runs it through the external toolchain.

use anyhow::{bail, Context};
use std::{env, fs, path::PathBuf, process::ExitCode, str::FromStr};
use tracing::Level;

use minic::{compile, parse_source, token, tokenize, toolchain::Toolchain};

const USAGE: &str = "Usage: minic [--emit tokens|ast|ir|exe|run] <input.c> [output]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    Tokens,
    Ast,
    Ir,
    Exe,
    Run,
}

impl FromStr for Emit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "tokens" => Emit::Tokens,
            "ast" => Emit::Ast,
            "ir" => Emit::Ir,
            "exe" => Emit::Exe,
            "run" => Emit::Run,
            other => bail!("unknown --emit kind `{other}`"),
        })
    }
}

/// `MINIC_LOG` picks the level (default `warn`); `MINIC_LOG_FORMAT=json`
/// switches to JSON lines. Logs always go to stderr.
fn init_logging() {
    let level = env::var("MINIC_LOG")
        .ok()
        .and_then(|v| v.trim().parse::<Level>().ok())
        .unwrap_or(Level::WARN);
    let json = env::var("MINIC_LOG_FORMAT")
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().with_current_span(false).init();
    } else {
        builder.init();
    }
}

/// Print to stdout, or write to `output` when one was given.
fn emit_text(text: &str, output: Option<&PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => fs::write(path, text).with_context(|| format!("writing {:?}", path)),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    init_logging();

    let mut emit = Emit::Ir;
    let mut positional = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--emit" => emit = args.next().context("--emit needs a value")?.parse()?,
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(ExitCode::SUCCESS);
            }
            _ => positional.push(arg),
        }
    }
    if positional.is_empty() || positional.len() > 2 {
        eprintln!("{USAGE}");
        return Ok(ExitCode::FAILURE);
    }
    let input = PathBuf::from(&positional[0]);
    let output = positional.get(1).map(PathBuf::from);

    let src = fs::read_to_string(&input).with_context(|| format!("reading {:?}", input))?;

    if emit == Emit::Tokens {
        let (tokens, diagnostics) = tokenize(&src);
        for diag in &diagnostics {
            eprintln!("warning: {diag}");
        }
        emit_text(&token::listing(&tokens), output.as_ref())?;
        return Ok(ExitCode::SUCCESS);
    }
    if emit == Emit::Ast {
        let program = parse_source(&src)?;
        emit_text(&program.to_string(), output.as_ref())?;
        return Ok(ExitCode::SUCCESS);
    }

    let compilation = compile(&src)?;
    for diag in &compilation.diagnostics {
        eprintln!("warning: {diag}");
    }

    match emit {
        Emit::Exe => {
            let out_exe = output.unwrap_or_else(|| input.with_extension(if cfg!(windows) { "exe" } else { "out" }));
            let toolchain = Toolchain::detect()?;
            toolchain.build_executable(&compilation.ir, Some(&out_exe))?;
            println!("Built {}", out_exe.display());
            Ok(ExitCode::SUCCESS)
        }
        Emit::Run => {
            let toolchain = Toolchain::detect()?;
            let result = toolchain.build_and_run(&compilation.ir)?;
            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
            Ok(match result.exit_code {
                // exit statuses are reported modulo 256 by the OS anyway
                Some(code) => ExitCode::from(code as u8),
                None => ExitCode::FAILURE,
            })
        }
        _ => {
            emit_text(&compilation.ir, output.as_ref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
