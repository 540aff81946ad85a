//! # Stock Tally Common Library
//!
//! Shared code for the Stock Tally crates:
//! - Data model (scan entries, backend configuration, lookup results)
//! - Event types and the EventBus
//! - Bootstrap configuration and root folder resolution
//! - Settings database access

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use types::{ApiConfig, HealthState, LookupResult, ProductInfo, ScanEntry};
