/// Shared data model, error taxonomy, and small helpers for the vidpipe system.
pub mod errors;
pub mod models;
