use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::rate_limit::limit_by_ip;
use crate::state::AppState;

pub mod handlers;
pub mod services;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/me",
            get(handlers::me).route_layer(middleware::from_fn_with_state(state, limit_by_ip)),
        )
        .route("/confirmed_email/:token", get(handlers::confirmed_email))
        .route("/request_email", post(handlers::request_email))
        .route(
            "/avatar",
            patch(handlers::update_avatar).layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
}
