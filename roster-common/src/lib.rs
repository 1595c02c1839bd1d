//! # Roster Common Library
//!
//! Shared code for the roster services including:
//! - Database initialization and shared models
//! - Configuration loading and root folder resolution
//! - Common error type
//! - Time helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
