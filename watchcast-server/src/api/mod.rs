//! HTTP and WebSocket API.
//!
//! # Endpoints
//!
//! - `GET    /ws?namespace=<ns>`                          – open a watch session
//! - `GET    /sessions`                                   – list open sessions
//! - `DELETE /sessions/{id}`                              – close a session
//! - `PUT    /resources/{resource_type}`                  – apply an object to a mirror
//! - `DELETE /resources/{resource_type}/{namespace}/{name}` – delete an object from a mirror

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};
use serde::Serialize;
use thiserror::Error;

use crate::state::AppState;

mod admin;
mod extractors;
mod resources;
mod ws;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::watch_ws))
        .route("/sessions", get(admin::list_sessions))
        .route("/sessions/{id}", delete(admin::close_session))
        .route("/resources/{resource_type}", put(resources::apply_resource))
        .route(
            "/resources/{resource_type}/{namespace}/{name}",
            delete(resources::delete_resource),
        )
}

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub(crate) enum ResponseError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        let status = match &self {
            ResponseError::NotFound(_) => StatusCode::NOT_FOUND,
            ResponseError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
