//! Presentation API
//!
//! REST endpoints for the operator's screen plus an SSE stream of controller
//! events. Default base URL: `http://localhost:5780`.

pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use error::{ApiError, ApiResult};
pub use server::{build_router, run, serve, AppContext, ShutdownSignal};
