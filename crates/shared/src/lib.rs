//! Campfire Shared Types and Utilities
//!
//! This crate contains the tenant data model, storage helpers and the error
//! type shared across the Campfire platform.

pub mod db;
pub mod error;
pub mod types;

pub use db::*;
pub use error::*;
pub use types::*;
