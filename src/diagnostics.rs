//! Diagnostics
//!
//! Semantic problems are data, not control flow: every pass appends to a [DiagnosticBag] and
//! the pipeline decides after each pass whether to continue. Each kind of problem has exactly
//! one `report_*` method so that message templates live in one place.
//!
//! For humans, diagnostics are turned into [miette] reports which print the offending line with
//! the span highlighted.

use std::fmt;

use miette::{LabeledSpan, NamedSource, SourceCode, SourceSpan};
use thiserror::Error;

use crate::util::TextLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Style,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Style => write!(f, "style"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Option<TextLocation>,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Turn the diagnostic into a report that renders the source snippet
    pub fn to_report(&self) -> miette::Report {
        let (span, src) = match &self.location {
            Some(location) => {
                let start = location.source.byte_offset(location.span.start);
                let end = location.source.byte_offset(location.span.end);
                (
                    Some(SourceSpan::from(start..end)),
                    Some(NamedSource::new(
                        &location.source.name,
                        location.source.text.clone(),
                    )),
                )
            }
            None => (None, None),
        };

        miette::Report::new(RenderedDiagnostic {
            message: self.message.clone(),
            severity: self.severity,
            span,
            src,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}: {}", self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Sort diagnostics by their location, global ones first
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| a.location.cmp(&b.location));
}

#[derive(Debug, Error)]
#[error("{message}")]
struct RenderedDiagnostic {
    message: String,
    severity: Severity,
    span: Option<SourceSpan>,
    src: Option<NamedSource<String>>,
}

impl miette::Diagnostic for RenderedDiagnostic {
    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
            Severity::Style => miette::Severity::Advice,
        })
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.src.as_ref().map(|src| src as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(String::from("here")),
            span,
        ))))
    }
}

/// An append-only list of diagnostics
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn extend(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Promote warnings to errors, leaving style hints alone
    pub fn deny_warnings(&mut self) {
        for diagnostic in &mut self.diagnostics {
            if diagnostic.severity == Severity::Warning {
                diagnostic.severity = Severity::Error;
            }
        }
    }

    fn report(&mut self, location: Option<TextLocation>, message: String, severity: Severity) {
        self.diagnostics.push(Diagnostic {
            location,
            message,
            severity,
        });
    }

    fn error(&mut self, location: TextLocation, message: String) {
        self.report(Some(location), message, Severity::Error)
    }

    // lexical and syntactic

    pub fn report_syntax_error(&mut self, location: TextLocation, message: String) {
        self.error(location, message)
    }

    pub fn report_invalid_escape(&mut self, location: TextLocation, escape: char) {
        self.error(location, format!("Invalid escape sequence `\\{escape}`"))
    }

    pub fn report_invalid_number(&mut self, location: TextLocation, text: &str) {
        self.error(location, format!("The number `{text}` is not a valid literal"))
    }

    // names

    pub fn report_undefined_name(&mut self, location: TextLocation, name: &str) {
        self.error(location, format!("Undefined name `{name}`"))
    }

    pub fn report_undefined_function(&mut self, location: TextLocation, signature: &str) {
        self.error(location, format!("Undefined function `{signature}`"))
    }

    pub fn report_undefined_type(&mut self, location: TextLocation, name: &str) {
        self.error(location, format!("Undefined type `{name}`"))
    }

    pub fn report_undefined_field(&mut self, location: TextLocation, ty: &str, field: &str) {
        self.error(location, format!("Type `{ty}` has no field `{field}`"))
    }

    pub fn report_undefined_namespace(&mut self, location: TextLocation, path: &str) {
        self.error(location, format!("Undefined namespace `{path}`"))
    }

    pub fn report_already_declared(&mut self, location: TextLocation, name: &str) {
        self.error(location, format!("`{name}` is already declared in this scope"))
    }

    // types

    pub fn report_type_mismatch(&mut self, location: TextLocation, expected: &str, found: &str) {
        self.error(
            location,
            format!("Expected a value of type `{expected}` but found `{found}`"),
        )
    }

    pub fn report_unary_operator_incompatible(
        &mut self,
        location: TextLocation,
        operator: &str,
        operand: &str,
    ) {
        self.error(
            location,
            format!("Operator `{operator}` is not compatible with operand type `{operand}`"),
        )
    }

    pub fn report_binary_operator_incompatible(
        &mut self,
        location: TextLocation,
        operator: &str,
        lhs: &str,
        rhs: &str,
    ) {
        self.error(
            location,
            format!("Operator `{operator}` is not compatible with operand types `{lhs}` and `{rhs}`"),
        )
    }

    pub fn report_cannot_cast(&mut self, location: TextLocation, from: &str, to: &str) {
        self.error(location, format!("Cannot cast `{from}` to `{to}`"))
    }

    pub fn report_redundant_cast(&mut self, location: TextLocation, ty: &str) {
        self.report(
            Some(location),
            format!("Redundant cast, the value already has type `{ty}`"),
            Severity::Style,
        )
    }

    pub fn report_expression_has_no_value(&mut self, location: TextLocation) {
        self.error(location, String::from("Expression does not produce a value"))
    }

    pub fn report_type_argument_count(
        &mut self,
        location: TextLocation,
        ty: &str,
        expected: usize,
        found: usize,
    ) {
        self.error(
            location,
            format!("Type `{ty}` expects {expected} type argument(s) but got {found}"),
        )
    }

    pub fn report_type_argument_mismatch(&mut self, location: TextLocation, ty: &str, argument: &str) {
        self.error(
            location,
            format!("Type argument `{argument}` does not satisfy the bound of `{ty}`"),
        )
    }

    pub fn report_not_callable(&mut self, location: TextLocation, ty: &str) {
        self.error(location, format!("A value of type `{ty}` cannot be called"))
    }

    pub fn report_argument_count(&mut self, location: TextLocation, expected: usize, found: usize) {
        self.error(
            location,
            format!("Expected {expected} argument(s) but found {found}"),
        )
    }

    // mutability and safety

    pub fn report_immutable_assignment(&mut self, location: TextLocation, name: &str) {
        self.error(location, format!("`{name}` is immutable and cannot be assigned to"))
    }

    pub fn report_reference_to_immutable(&mut self, location: TextLocation, name: &str) {
        self.error(
            location,
            format!("Cannot take a reference to `{name}` because it is not mutable"),
        )
    }

    pub fn report_invalid_reference(&mut self, location: TextLocation) {
        self.error(
            location,
            String::from("Only mutable variables can be referenced"),
        )
    }

    pub fn report_invalid_assignment_target(&mut self, location: TextLocation) {
        self.error(location, String::from("The left side of an assignment must be a variable, field or pointer element"))
    }

    pub fn report_unsafe_outside_unsafe_block(&mut self, location: TextLocation) {
        self.error(
            location,
            String::from("Pointer access is only allowed inside an `unsafe` block"),
        )
    }

    // structs

    pub fn report_field_must_be_initialized(&mut self, location: TextLocation, field: &str) {
        self.error(location, format!("Field `{field}` must be initialized"))
    }

    pub fn report_field_must_not_be_initialized(&mut self, location: TextLocation, field: &str) {
        self.error(location, format!("Field `{field}` must not be initialized"))
    }

    pub fn report_invalid_parent_type(&mut self, location: TextLocation, ty: &str) {
        self.error(location, format!("`{ty}` cannot be used as a parent struct"))
    }

    pub fn report_invalid_override(&mut self, location: TextLocation, field: &str) {
        self.error(
            location,
            format!("Field `{field}` is marked `override` but does not override a compatible parent field"),
        )
    }

    // control flow

    pub fn report_invalid_break_or_continue(&mut self, location: TextLocation, keyword: &str) {
        self.error(location, format!("`{keyword}` can only be used inside a loop"))
    }

    pub fn report_invalid_return(&mut self, location: TextLocation) {
        self.error(location, String::from("`return` can only be used inside a function"))
    }

    pub fn report_missing_return_value(&mut self, location: TextLocation, ty: &str) {
        self.error(location, format!("A value of type `{ty}` must be returned"))
    }

    pub fn report_unexpected_return_value(&mut self, location: TextLocation) {
        self.error(location, String::from("Functions without a return type cannot return a value"))
    }

    pub fn report_not_all_paths_return(&mut self, location: TextLocation, function: &str) {
        self.error(
            location,
            format!("Not all code paths of `{function}` return a value"),
        )
    }

    pub fn report_not_constant(&mut self, location: TextLocation, name: &str) {
        self.error(
            location,
            format!("`{name}` must be initialized with a compile-time constant"),
        )
    }

    // declarations

    pub fn report_multiple_entry_points(&mut self, location: TextLocation) {
        self.error(location, String::from("A program can only have one entry function"))
    }

    pub fn report_invalid_entry_signature(&mut self, location: TextLocation) {
        self.error(
            location,
            String::from("The entry function takes no parameters and returns nothing or an integer"),
        )
    }

    pub fn report_missing_body(&mut self, location: TextLocation, function: &str) {
        self.error(location, format!("Function `{function}` needs a body"))
    }

    pub fn report_extern_with_body(&mut self, location: TextLocation, function: &str) {
        self.error(location, format!("Extern function `{function}` cannot have a body"))
    }

    pub fn report_invalid_operator_function(&mut self, location: TextLocation, function: &str) {
        self.error(
            location,
            format!("`{function}` is not a valid operator function"),
        )
    }

    pub fn report_invalid_extension_function(&mut self, location: TextLocation, function: &str) {
        self.error(
            location,
            format!("Extension function `{function}` needs a receiver parameter"),
        )
    }

    // lints

    pub fn report_unused_variable(&mut self, location: TextLocation, name: &str) {
        self.report(
            Some(location),
            format!("Variable `{name}` is never used"),
            Severity::Warning,
        )
    }
}

impl IntoIterator for DiagnosticBag {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}
