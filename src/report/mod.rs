//! Run output beyond the release files themselves.

pub mod generator;

pub use generator::{generate_summary_text, write_registry};
