//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! REST routes are nested under `/api/`; the chat relay lives at `/ws`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Trace → 2. CORS → 3. Extension(ApiContext) → 4. Rate limiter

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected outside the rate limiter).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from pre-constructed `ApiContext`.
///
/// Used by tests that need to share the context or tune the rate limiter.
#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7), and a
    // segment must use the same param name across routes.
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        // Appointments
        .route(
            "/appointments/appointments",
            get(endpoints::appointments::list),
        )
        .route(
            "/appointments/appointments/:id",
            put(endpoints::appointments::set_status),
        )
        .route("/appointments/book", post(endpoints::appointments::book))
        .route(
            "/appointments/doctors/:id/availability",
            get(endpoints::appointments::availability),
        )
        .route(
            "/appointments/availability",
            post(endpoints::appointments::create_slot),
        )
        .route(
            "/appointments/availability/:id",
            put(endpoints::appointments::update_slot),
        )
        // Chat persistence
        .route("/chat/conversations", get(endpoints::chat::conversations))
        .route(
            "/chat/conversations/:id/messages",
            get(endpoints::chat::history),
        )
        .route("/chat/messages", post(endpoints::chat::send))
        // Users and doctors
        .route("/users", post(endpoints::users::create))
        .route("/users/:id", get(endpoints::users::get))
        .route("/users/:id/verify", post(endpoints::users::verify))
        .route("/doctors/:id", get(endpoints::doctors::profile))
        // Communities
        .route(
            "/communities",
            get(endpoints::communities::list).post(endpoints::communities::create),
        )
        .route(
            "/communities/:id",
            get(endpoints::communities::get_by_name).put(endpoints::communities::update),
        )
        .route("/communities/:id/join", post(endpoints::communities::join))
        .route("/communities/:id/leave", post(endpoints::communities::leave))
        .route(
            "/communities/:id/moderators",
            post(endpoints::communities::add_moderator),
        )
        .route(
            "/communities/:id/moderators/:user_id",
            axum::routing::delete(endpoints::communities::remove_moderator),
        )
        // Threads
        .route(
            "/threads",
            get(endpoints::threads::list).post(endpoints::threads::create),
        )
        .route("/threads/:id", get(endpoints::threads::get))
        .route("/threads/:id/replies", post(endpoints::threads::reply))
        .route("/threads/:id/vote", post(endpoints::threads::vote));

    let ws_routes = Router::new().route("/ws", get(websocket::ws_upgrade));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-user-id"),
        ]);

    // `.with_state()` converts Router<ApiContext> → Router<()> so the
    // from_fn middleware (state = ()) layers on top.
    Router::new()
        .nest("/api", api)
        .merge(ws_routes)
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        // Extension must sit outside the rate limiter so it can read ApiContext
        .layer(axum::Extension(ctx))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
