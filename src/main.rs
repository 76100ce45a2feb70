use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use miette::Report;
use tracing::level_filters::LevelFilter;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use quill::binding::pretty::{write_bound_function, write_lowered_function};
use quill::{compile_files, parse_files, CompileOptions, Diagnostic, Evaluator, EvaluatorOptions};

mod cli;

use cli::{Args, CliError, Mode};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().without_time())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", Report::new(err));
            code
        }
    }
}

/// Print all diagnostics, failing if one of them is an error
fn report(diagnostics: &[Diagnostic]) -> Result<(), CliError> {
    for diagnostic in diagnostics {
        eprintln!("{:?}", diagnostic.to_report());
    }

    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    if errors > 0 {
        return Err(CliError::Compilation(errors));
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.mode == Mode::Parse {
        let (trees, diagnostics) = parse_files(&args.files)?;
        report(&diagnostics)?;
        info!("Parsing successful");
        for tree in trees {
            writeln!(out, "{:#?}", tree.unit)?;
        }
        return Ok(());
    }

    let options = CompileOptions {
        deny_warnings: args.deny_warnings,
    };
    let compilation = compile_files(&args.files, &options)?;
    report(&compilation.diagnostics)?;
    let Some(program) = compilation.program else {
        return Err(CliError::Compilation(0));
    };
    info!("Compilation successful");

    match args.mode {
        Mode::Check | Mode::Parse => {}
        Mode::Bound => {
            for function in program.user_functions() {
                if let Some(body) = program.bound.functions.get(&function) {
                    write_bound_function(&program.context, function, body, &mut out)?;
                }
            }
        }
        Mode::Lowered => {
            for function in program.user_functions() {
                if let Some(body) = program.functions.get(&function) {
                    write_lowered_function(&program.context, function, body, &mut out)?;
                    writeln!(out)?;
                }
            }
        }
        Mode::Interface => write!(out, "{}", program.interface())?,
        Mode::Run => {
            let code = Evaluator::new(&program, EvaluatorOptions::default(), &mut out).run()?;
            info!(code, "Evaluation finished");
        }
    }
    Ok(())
}
