//! Core module - shared infrastructure for EVANA
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the application.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, EntryMode};
pub use error::{EvanaError, Result};
pub use types::*;
