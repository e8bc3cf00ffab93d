//! # Mentora Common Library
//!
//! Shared code for Mentora platform services including:
//! - Common error type
//! - Configuration file resolution (TOML + environment)
//! - SQLite pool bootstrap

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
