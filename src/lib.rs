//! Quill
//!
//! The middle of a compiler for a small statically typed language: name binding and type
//! checking, constant folding, lowering to labels and jumps, control flow analysis and an
//! evaluator that runs the lowered code.
//!
//! [compile] runs the whole pipeline:
//! - every file is [parsed](parse), the builtin `std` prelude first
//! - the [binder](binding) declares the global scope of all files, then binds function bodies
//! - the [lowerer](lowering) flattens the bound bodies, and the lowered bodies are checked for
//!   paths that end without a return value
//!
//! Diagnostics are collected along the way. The pipeline stops after the first pass that
//! reported an error.

#[macro_use]
mod util;

pub mod ast;
pub mod binding;
pub mod builtin;
pub mod context;
pub mod diagnostics;
pub mod evaluator;
pub mod folding;
pub mod lowering;
pub mod parsing;
pub mod symbols;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;
use tracing::info;

pub use ast::SyntaxTree;
pub use binding::{BoundProgram, BoundStatement};
pub use context::CompilationContext;
pub use diagnostics::{Diagnostic, DiagnosticBag, Severity};
pub use evaluator::{EvalError, Evaluator, EvaluatorOptions, Value};
pub use lowering::ControlFlowGraph;
pub use parsing::parse;
pub use symbols::interface::Interface;
pub use symbols::FunctionId;
pub use util::{FileId, Idx, IndexVec, SourceFile, Span, TextLocation};

use crate::builtin::{prelude_source, PRELUDE_NAME};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Treat warnings as errors
    pub deny_warnings: bool,
}

/// A program that compiled without errors
#[derive(Debug, Clone)]
pub struct Program {
    pub context: CompilationContext,
    /// Bodies before lowering, kept for printing and the interface listing
    pub bound: BoundProgram,
    /// Lowered bodies of all functions that have one
    pub functions: BTreeMap<FunctionId, Vec<BoundStatement>>,
    /// Lowered initializers of the global variables
    pub globals: Vec<BoundStatement>,
    pub entry: Option<FunctionId>,
}

impl Program {
    /// Functions declared by the compiled files, without the `std` prelude
    pub fn user_functions(&self) -> impl Iterator<Item = FunctionId> + '_ {
        let std = self.context.namespaces.lookup(["std"]);
        self.bound
            .functions
            .keys()
            .copied()
            .filter(move |&function| Some(self.context.functions[function].namespace) != std)
    }

    pub fn interface(&self) -> Interface {
        Interface::collect(&self.context, &self.bound.functions)
    }
}

#[derive(Debug)]
pub struct Compilation {
    /// Present only if no pass reported an error
    pub program: Option<Program>,
    /// Syntax trees of the compiled files, prelude included
    pub trees: Vec<SyntaxTree>,
    /// Sorted by location
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

#[derive(Debug, Error, MietteDiagnostic)]
#[error("Failed to read `{}`", .path.display())]
pub struct LoadError {
    pub path: PathBuf,
    source: io::Error,
}

/// Compile in-memory sources given as `(name, text)` pairs
pub fn compile<I, N, T>(sources: I, options: &CompileOptions) -> Compilation
where
    I: IntoIterator<Item = (N, T)>,
    N: Into<String>,
    T: Into<String>,
{
    let files = sources
        .into_iter()
        .enumerate()
        .map(|(i, (name, text))| SourceFile::new(FileId::new(i + 1), name, text))
        .collect();
    compile_source_files(files, options)
}

/// Compile a single in-memory source with default options
pub fn compile_str(source: &str) -> Compilation {
    compile([("main.ql", source)], &CompileOptions::default())
}

/// Read and compile files from disk
pub fn compile_files<P: AsRef<Path>>(
    paths: &[P],
    options: &CompileOptions,
) -> Result<Compilation, LoadError> {
    Ok(compile_source_files(load_files(paths)?, options))
}

/// Read and parse files from disk without binding them
pub fn parse_files<P: AsRef<Path>>(
    paths: &[P],
) -> Result<(Vec<SyntaxTree>, Vec<Diagnostic>), LoadError> {
    let mut diagnostics = DiagnosticBag::new();
    let trees = load_files(paths)?
        .into_iter()
        .map(|file| parse(Rc::new(file), &mut diagnostics))
        .collect();
    Ok((trees, finish(diagnostics)))
}

fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<SourceFile>, LoadError> {
    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let path = path.as_ref();
            SourceFile::load(FileId::new(i + 1), path).map_err(|source| LoadError {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}

fn finish(diagnostics: DiagnosticBag) -> Vec<Diagnostic> {
    let mut diagnostics = diagnostics.into_vec();
    diagnostics::sort_diagnostics(&mut diagnostics);
    diagnostics
}

/// Whether the pipeline has to stop after the pass that just ran
fn gate(diagnostics: &mut DiagnosticBag, options: &CompileOptions) -> bool {
    if options.deny_warnings {
        diagnostics.deny_warnings();
    }
    diagnostics.has_errors()
}

fn compile_source_files(files: Vec<SourceFile>, options: &CompileOptions) -> Compilation {
    let prelude = SourceFile::new(FileId::new(0), PRELUDE_NAME, prelude_source());
    let mut diagnostics = DiagnosticBag::new();

    let trees: Vec<_> = std::iter::once(prelude)
        .chain(files)
        .map(|file| parse(Rc::new(file), &mut diagnostics))
        .collect();
    info!(files = trees.len(), diagnostics = diagnostics.len(), "parsed");

    let failed = |trees, diagnostics| Compilation {
        program: None,
        trees,
        diagnostics: finish(diagnostics),
    };
    if gate(&mut diagnostics, options) {
        return failed(trees, diagnostics);
    }

    let mut ctx = CompilationContext::new();
    let global = binding::bind_global_scope(&mut ctx, &trees, &mut diagnostics);
    if gate(&mut diagnostics, options) {
        return failed(trees, diagnostics);
    }

    let bound = binding::bind_program(&mut ctx, &trees, global, &mut diagnostics);
    binding::check_unused_variables(&ctx, &mut diagnostics);
    if gate(&mut diagnostics, options) {
        return failed(trees, diagnostics);
    }

    let (functions, globals) = lowering::lower_program(&mut ctx, &bound);
    check_all_paths_return(&ctx, &functions, &mut diagnostics);
    info!(
        functions = functions.len(),
        diagnostics = diagnostics.len(),
        "lowered program"
    );
    if gate(&mut diagnostics, options) {
        return failed(trees, diagnostics);
    }

    let entry = bound.entry;
    Compilation {
        program: Some(Program {
            context: ctx,
            bound,
            functions,
            globals,
            entry,
        }),
        trees,
        diagnostics: finish(diagnostics),
    }
}

/// Report functions with a value type whose lowered body can end without returning
fn check_all_paths_return(
    ctx: &CompilationContext,
    functions: &BTreeMap<FunctionId, Vec<BoundStatement>>,
    diagnostics: &mut DiagnosticBag,
) {
    for (&function, body) in functions {
        let symbol = &ctx.functions[function];
        let returns_value = symbol.return_type != ctx.types.void()
            && !ctx.types.is_error(symbol.return_type);
        if symbol.is_extern || !returns_value {
            continue;
        }
        if ControlFlowGraph::build(body).all_paths_return() {
            continue;
        }
        if let Some(location) = &symbol.location {
            diagnostics.report_not_all_paths_return(location.clone(), &symbol.path);
        }
    }
}
