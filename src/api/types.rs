//! Shared types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{FromRequest, Request};
use axum::{async_trait, Json};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific caches.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self::with_rate_limiter(core, RateLimiter::new())
    }

    pub fn with_rate_limiter(core: Arc<CoreState>, limiter: RateLimiter) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(limiter)),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Request helpers
// ═══════════════════════════════════════════════════════════

/// `Json` extractor whose rejection uses the API error body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Parse an id taken from a path or query string.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {raw}")))
}

/// Like `parse_id`, for a query parameter that must be present.
pub fn require_id(raw: Option<&str>, what: &str) -> Result<Uuid, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::BadRequest(format!("Missing {what}")))?;
    parse_id(raw, what)
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-caller sliding window
// ═══════════════════════════════════════════════════════════

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Per-caller rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
            last_sweep: Instant::now(),
        }
    }

    /// Check if a caller is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &str, now: Instant) -> Result<(), u64> {
        if now.duration_since(self.last_sweep) >= MINUTE {
            self.sweep(now);
        }

        let entries = self.windows.entry(key.to_string()).or_default();

        entries.retain(|ts| now.duration_since(*ts) < HOUR);

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < MINUTE)
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(MINUTE.as_secs());
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(HOUR.as_secs());
        }

        entries.push(now);
        Ok(())
    }

    /// Drop callers with no request inside the hour window.
    fn sweep(&mut self, now: Instant) {
        self.windows.retain(|_, entries| {
            entries.retain(|ts| now.duration_since(*ts) < HOUR);
            !entries.is_empty()
        });
        self.last_sweep = now;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
