//! HTTP and WebSocket API.
//!
//! REST routes are nested under `/api/` and share one middleware stack
//! (trace, CORS, rate limit). The chat relay is served at `/ws`.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use router::api_router;
pub use server::{start_server_on, ApiServer, ServerSession};
pub use types::ApiContext;
