//! Builtin runtime functions
//!
//! The builtins are declared as extern functions in the `std` namespace by a prelude that every
//! compilation parses first. The evaluator recognizes them by their linkage name and runs them
//! natively.

use std::fmt::Write;

use strum::IntoEnumIterator;

use crate::symbols::PrimitiveKind;

/// Name of the prelude source file in diagnostics
pub const PRELUDE_NAME: &str = "<builtin>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    /// Print a value on its own line and return it
    Trace(PrimitiveKind),
    /// Print a NUL terminated string
    Print,
    Putchar,
}

impl BuiltinFunction {
    pub fn from_cname(cname: &str) -> Option<Self> {
        match cname {
            "__quill_print" => Some(Self::Print),
            "putchar" => Some(Self::Putchar),
            _ => {
                let ty = cname.strip_prefix("__quill_trace_")?;
                PrimitiveKind::iter()
                    .filter(|&kind| is_traceable(kind))
                    .find(|kind| kind.name() == ty)
                    .map(Self::Trace)
            }
        }
    }

    pub fn cname(self) -> String {
        match self {
            Self::Trace(kind) => format!("__quill_trace_{}", kind.name()),
            Self::Print => String::from("__quill_print"),
            Self::Putchar => String::from("putchar"),
        }
    }

    /// The extern declaration of the builtin in the prelude
    fn declaration(self) -> String {
        match self {
            Self::Trace(kind) => format!(
                "extern fn trace(value: {ty}): {ty} as \"{}\"",
                self.cname(),
                ty = kind.name()
            ),
            Self::Print => format!("extern fn print(text: *u8) as \"{}\"", self.cname()),
            Self::Putchar => format!("extern fn putchar(c: i32): i32 as \"{}\"", self.cname()),
        }
    }
}

fn is_traceable(kind: PrimitiveKind) -> bool {
    kind.is_numeric() || kind == PrimitiveKind::Bool
}

pub fn all_builtins() -> Vec<BuiltinFunction> {
    PrimitiveKind::iter()
        .filter(|&kind| is_traceable(kind))
        .map(BuiltinFunction::Trace)
        .chain([BuiltinFunction::Print, BuiltinFunction::Putchar])
        .collect()
}

/// Source of the `std` namespace
pub fn prelude_source() -> String {
    let mut source = String::from("namespace std\n\n");
    for builtin in all_builtins() {
        let _ = writeln!(source, "{}", builtin.declaration());
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkage_names_round_trip() {
        for builtin in all_builtins() {
            assert_eq!(BuiltinFunction::from_cname(&builtin.cname()), Some(builtin));
        }
        assert_eq!(BuiltinFunction::from_cname("__quill_trace_void"), None);
        assert_eq!(BuiltinFunction::from_cname("malloc"), None);
    }

    #[test]
    fn prelude_declares_every_builtin() {
        let prelude = prelude_source();
        assert!(prelude.starts_with("namespace std"));
        assert!(prelude.contains("extern fn trace(value: u16): u16 as \"__quill_trace_u16\""));
        assert!(prelude.contains("extern fn putchar(c: i32): i32 as \"putchar\""));
        assert_eq!(prelude.matches("extern fn").count(), all_builtins().len());
    }
}
