//! Tracing setup shared by binaries, tests and benches.

pub mod tracing;

pub use crate::tracing::{init, init_with_default, DEFAULT_FILTER};
