//! Resource ingest into the in-memory mirrors.
//!
//! Each accepted change flows through the resource type's watch pipeline and
//! is broadcast to sessions subscribed to the object's namespace.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;
use watchcast_core::source::MemorySource;
use watchcast_sdk::objects::ApplyResourceResponse;

use super::ResponseError;
use crate::state::AppState;

/// Namespace path segment standing for a cluster-scoped object.
const CLUSTER_SCOPE: &str = "_";

fn source<'a>(state: &'a AppState, resource_type: &str) -> Result<&'a MemorySource, ResponseError> {
    state
        .sources
        .get(resource_type)
        .ok_or_else(|| ResponseError::NotFound(format!("resource type {resource_type}")))
}

/// `PUT /resources/{resource_type}`: create or replace an object.
pub(super) async fn apply_resource(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    Json(object): Json<Value>,
) -> Result<Json<ApplyResourceResponse>, ResponseError> {
    let key = source(&state, &resource_type)?
        .apply(object)
        .map_err(|e| ResponseError::BadRequest(e.to_string()))?;
    tracing::debug!(%resource_type, %key, "Resource applied");
    Ok(Json(ApplyResourceResponse { key }))
}

/// `DELETE /resources/{resource_type}/{namespace}/{name}`: delete an object.
pub(super) async fn delete_resource(
    State(state): State<AppState>,
    Path((resource_type, namespace, name)): Path<(String, String, String)>,
) -> Result<StatusCode, ResponseError> {
    let key = if namespace == CLUSTER_SCOPE {
        name
    } else {
        format!("{namespace}/{name}")
    };
    if !source(&state, &resource_type)?.delete(&key) {
        return Err(ResponseError::NotFound(format!("{resource_type} {key}")));
    }
    tracing::debug!(%resource_type, %key, "Resource deleted");
    Ok(StatusCode::NO_CONTENT)
}
