use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod tokens;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
        .route(
            "/request-reset-password",
            post(handlers::request_reset_password),
        )
        .route("/reset-password", post(handlers::reset_password))
        .route(
            "/reset_password/:token",
            get(handlers::verify_reset_password_token),
        )
}
