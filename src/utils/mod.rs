//! Utility functions and helpers.

pub mod url;

pub use url::{canonicalize, resolve_url, stable_job_id};
