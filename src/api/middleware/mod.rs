//! API middleware.
//!
//! Only the per-caller rate limiter runs here; tracing and CORS come from
//! `tower_http` layers in the router.

pub mod rate;
