use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use miette::Diagnostic;
use thiserror::Error;

use quill::{EvalError, LoadError};

#[derive(Debug, Parser)]
#[command(version, about = None, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Source files, compiled together
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Execution mode
    #[arg(value_enum)]
    #[arg(short, long)]
    #[arg(default_value_t = Mode::Check)]
    pub mode: Mode,

    /// Treat warnings as errors
    #[arg(long)]
    pub deny_warnings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Report diagnostics only
    Check,

    /// Inspect the syntax trees of the source files
    Parse,

    /// Inspect the bound function bodies
    Bound,

    /// Inspect the lowered function bodies
    Lowered,

    /// Print the public signatures of the program
    Interface,

    /// Compile and evaluate the program
    Run,
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(code(quill::input))]
    Load(#[from] LoadError),

    #[error("Compilation failed with {0} error(s)")]
    Compilation(usize),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Runtime(#[from] EvalError),

    #[error("Failed to write to stdout")]
    Output(#[from] io::Error),
}

impl CliError {
    /// Unreadable input is a usage error like a bad argument
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Load(_) => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}
