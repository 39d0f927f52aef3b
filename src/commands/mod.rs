//! CLI command implementations.

pub mod plan;
pub mod ranges;
pub mod sync;
