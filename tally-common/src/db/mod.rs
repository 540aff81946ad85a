//! Database access layer
//!
//! SQLite holds the durable key-value settings (backend connection details).

pub mod init;
pub mod settings;

pub use init::{init_database, init_memory_database};
