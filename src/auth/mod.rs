use crate::state::AppState;
use axum::Router;

pub mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

/// Public routes: register and login.
pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}

/// Routes that need an authenticated caller.
pub fn protected_router() -> Router<AppState> {
    handlers::me_routes()
}
