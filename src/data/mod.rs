//! Data module - CSV loading and cleaning

mod cleaner;
mod loader;

pub use cleaner::{best_practice_name, Cleaner, NA_MARKER};
pub use loader::{DataLoader, DiagnosticSink, LoaderError, Record, TracingSink};
