//! Keystead Common - Shared types and configuration
//!
//! This crate provides the request and identifier types and the
//! configuration structures used across all Keystead components.

pub mod config;
pub mod types;

pub use config::Config;
pub use types::*;
