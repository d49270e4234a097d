//! `accir` facade binary: a minimal expression/statement front end wired
//! into the crate's IR builder, optimizer, lowering, register allocator,
//! and emitter, so the ambient CLI/logging/diagnostics stack (SPEC_FULL
//! §4.8-4.9) can be exercised end to end. This is deliberately NOT a C
//! front end — the tokenizer/parser are out of scope per spec.md §1 — it
//! accepts only the reduced surface spec.md's own scenarios (§8 S1-S6)
//! use: one `int`-returning function, `if`/`else`, and integer arithmetic.
//!
//! Grounded on `examples/codeyousef-SeenLang/seen_cli/src/main.rs`'s clap
//! derive + `env_logger`/verbosity wiring.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use accir::config::{CompileOptions, Extensions, Std, StopAfter};
use accir::diagnostics::{colors_enabled, Diagnostic, FatalDiagnostic, Severity, SourceSpan};
use accir::ir::container::Linkage;
use accir::optimizer::OptimizationLevel;
use accir::target::{AsmFlavor, Cpu, Os, Target};
use accir::types::CType;
use accir::{builder, compile_container, emitter, ir_text};

mod frontend;

/// A self-contained C compiler's middle-end/back-end, fronted by a minimal
/// expression surface (see module docs — not a C front end).
#[derive(Parser, Debug)]
#[command(name = "accir", version, about)]
struct Cli {
    /// Input file paths; `-` reads standard input.
    inputs: Vec<String>,

    #[arg(short = 'o')]
    output: Option<String>,

    /// Suppress warnings.
    #[arg(short = 'w')]
    no_warnings: bool,

    #[arg(short = 'O', value_name = "LEVEL", default_value_t = 0)]
    opt_level: u8,

    /// Stop after emitting assembly.
    #[arg(short = 'S')]
    stop_at_asm: bool,

    /// Stop after emitting IR text.
    #[arg(long = "Sir")]
    stop_at_ir: bool,

    /// Compile and assemble only (no link) — accepted, not acted on: this
    /// crate never reaches an assembler/linker (spec.md §1 Non-goals).
    #[arg(short = 'c')]
    compile_only: bool,

    #[arg(long = "std")]
    std: Option<String>,

    #[arg(long = "masm", default_value = "att")]
    masm: String,

    #[arg(long = "mcpu", default_value = "x86_64")]
    mcpu: String,

    #[arg(short = 'f', value_name = "EXT", action = clap::ArgAction::Append)]
    extension_flags: Vec<String>,

    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match log_level_for(cli.verbose) {
        Some(level) => log::set_max_level(level),
        None => log::set_max_level(log::LevelFilter::Warn),
    }

    let options = match build_options(&cli) {
        Ok(opts) => opts,
        Err(diag) => {
            eprintln!("{}", diag.0.render(false));
            return ExitCode::FAILURE;
        }
    };

    if cli.inputs.is_empty() {
        eprintln!("accir: no input files");
        return ExitCode::FAILURE;
    }

    let mut had_error = false;
    let mut output = String::new();
    for path in &options.inputs {
        match compile_one(path, &options) {
            Ok(text) => output.push_str(&text),
            Err(diag) => {
                eprintln!("{}", diag.0.render(colors_enabled(options.target.os)));
                had_error = true;
            }
        }
    }

    if had_error {
        return ExitCode::FAILURE;
    }

    match &options.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, output) {
                eprintln!("accir: could not write {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        }
        None => print!("{}", output),
    }
    ExitCode::SUCCESS
}

fn log_level_for(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => Some(log::LevelFilter::Info),
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

fn build_options(cli: &Cli) -> Result<CompileOptions, FatalDiagnostic> {
    let flavor = AsmFlavor::parse(&cli.masm).ok_or_else(|| {
        FatalDiagnostic(Diagnostic::new(Severity::Fatal, format!("unknown assembler syntax `{}`", cli.masm)))
    })?;
    let cpu = Cpu::by_name(&cli.mcpu)
        .ok_or_else(|| FatalDiagnostic(Diagnostic::new(Severity::Fatal, format!("unknown CPU `{}`", cli.mcpu))))?;
    let std = cli
        .std
        .as_deref()
        .map(|s| Std::parse(s).ok_or_else(|| FatalDiagnostic(Diagnostic::new(Severity::Fatal, format!("unknown -std= value `{}`", s)))))
        .transpose()?;

    let mut extensions = Extensions::empty();
    for flag in &cli.extension_flags {
        match Extensions::parse_flag(flag) {
            Some((bit, true)) => extensions |= bit,
            Some((bit, false)) => extensions.remove(bit),
            None => {
                return Err(FatalDiagnostic(Diagnostic::new(Severity::Fatal, format!("unknown extension `-f{}`", flag))))
            }
        }
    }

    let stop_after = if cli.stop_at_ir {
        StopAfter::Ir
    } else if cli.stop_at_asm {
        StopAfter::Assembly
    } else if cli.compile_only {
        StopAfter::Assemble
    } else {
        StopAfter::Assemble
    };

    Ok(CompileOptions {
        inputs: cli.inputs.clone(),
        output: cli.output.clone(),
        suppress_warnings: cli.no_warnings,
        optimization: OptimizationLevel::from_level(cli.opt_level),
        stop_after,
        std,
        extensions,
        target: Target { cpu, os: Os::Linux, flavor },
    })
}

fn read_input(path: &str) -> std::io::Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(PathBuf::from(path))
    }
}

fn compile_one(path: &str, options: &CompileOptions) -> Result<String, FatalDiagnostic> {
    log::info!("compiling {}", path);
    let source = read_input(path).map_err(|e| {
        FatalDiagnostic(Diagnostic::new(Severity::Fatal, format!("could not read {}: {}", path, e)))
    })?;

    let unit = frontend::parse_unit(&source, path).map_err(|e| {
        FatalDiagnostic(Diagnostic::new(Severity::Error, e.message).with_span(SourceSpan::new(
            path,
            e.line,
            e.column,
            e.line_text,
        )))
    })?;

    let mut container = builder::new_container(unit.name.clone(), Linkage::Global, CType::Function {
        return_type: Box::new(CType::INT),
        parameters: vec![],
    });
    {
        let mut b = builder::Builder::new(&mut container);
        unit.emit(&mut b).map_err(|e| {
            let severity = if e.is_internal() { Severity::Internal } else { Severity::Error };
            FatalDiagnostic(Diagnostic::new(severity, format!("{}", e)))
        })?;
    }

    let stats = compile_container(&mut container, &options.target, options.optimization);
    log::debug!(
        "{}: {} constants folded, {} blocks pruned, {} allocas promoted",
        unit.name,
        stats.0.constants_folded,
        stats.0.blocks_pruned,
        stats.0.allocas_removed
    );

    if options.stop_after == StopAfter::Ir {
        return Ok(ir_text::write_program([&container]));
    }

    let emitted = emitter::Emitter::new(&options.target).emit_program([&container]);
    Ok(emitted)
}
