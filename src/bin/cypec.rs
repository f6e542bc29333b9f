use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use cype::{
    codegen::{self, Options},
    jit, lexer, parser,
    util::fmt::tree,
};
use tracing_subscriber::EnvFilter;

/// Compiles a Cype program to LLVM IR.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file; reads standard input when omitted or `-`.
    input: Option<PathBuf>,

    /// Write the output here instead of standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Emit::Ir)]
    emit: Emit,

    /// Run the compiled program instead of printing it. Requires `--emit ir`.
    #[arg(long)]
    run: bool,

    #[arg(long, value_name = "NAME", default_value = "cype")]
    module_name: String,

    /// Skip the runtime range checks on array accesses.
    #[arg(long)]
    no_bounds_checks: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    Tokens,
    Ast,
    Ir,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if cli.run && cli.emit != Emit::Ir {
        bail!("--run requires --emit ir");
    }
    let source = read_source(cli.input.as_ref())?;

    let text = match cli.emit {
        Emit::Tokens => lexer::lex_in_new(&source)
            .iter()
            .map(|token| format!("{token:?}\n"))
            .collect(),
        Emit::Ast => {
            let program = parser::parse_program(&source).map_err(|e| anyhow!("{e:#}"))?;
            tree::print_program_string(&program)
        }
        Emit::Ir => {
            let options = Options {
                module_name: cli.module_name.clone(),
                bounds_checks: !cli.no_bounds_checks,
            };
            let context = cype::Context::create();
            // Warnings are reported through `tracing` as they are found.
            let codegen::Output { module, .. } =
                cype::compile_with(&context, &source, options).map_err(|e| anyhow!("{e:#}"))?;
            if cli.run {
                let status = jit::run(&module).context("failed to run the program")?;
                return Ok(ExitCode::from(status as u8));
            }
            module.print_to_string().to_string()
        }
    };

    write_output(cli.output.as_ref(), &text)?;
    Ok(ExitCode::SUCCESS)
}

fn read_source(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display())),
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read standard input")?;
            Ok(buffer)
        }
    }
}

fn write_output(path: Option<&PathBuf>, text: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("failed to write output file {}", path.display())),
        None => {
            io::stdout().write_all(text.as_bytes())?;
            Ok(())
        }
    }
}
