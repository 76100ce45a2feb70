//! Utilities
//!
//! Small types used throughout the crate.

#[macro_use]
mod index;
mod span;

pub use index::{Idx, IndexVec};
pub use span::{FileId, SourceFile, Span, TextLocation};
