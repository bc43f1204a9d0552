//! Channel layer: output accumulation and pattern matching.
//!
//! This module holds the pieces the session driver scans with: an
//! append-only buffer with a forward-only read cursor, and the patterns
//! that are matched against it.

mod buffer;
mod patterns;

pub use buffer::PatternBuffer;
pub use patterns::{IntoPattern, Pattern, PromptMatcher};
