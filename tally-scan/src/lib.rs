//! # Stock Tally scan engine
//!
//! Accumulates barcode and QR scans into a countable ledger during stock
//! taking, looks each code up against the inventory backend and drives the
//! operator feedback around every scan.
//!
//! - [`alert`]: watch-list parsing and matching
//! - [`ledger`]: ordered scan ledger with repeat merging and export text
//! - [`lookup`]: inventory backend HTTP client
//! - [`health`]: backend health gate
//! - [`feedback`]: vibration and audio cue dispatch
//! - [`controller`]: the scan state machine that ties them together
//! - [`api`]: HTTP presentation API and SSE event stream

pub mod alert;
pub mod api;
pub mod controller;
pub mod feedback;
pub mod health;
pub mod ledger;
pub mod lookup;

pub use controller::{spawn, ControllerHandle, ControllerSettings, ScanOutcome, SessionSnapshot};
