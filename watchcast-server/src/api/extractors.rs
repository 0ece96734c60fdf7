//! Custom Axum extractors.
//!
//! Authentication happens upstream; the authenticated user name arrives in
//! the `X-Remote-User` header.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use watchcast_sdk::objects::ws::IDENTITY_HEADER;

/// Identity used when the request carries no identity header.
pub const ANONYMOUS: &str = "anonymous";

/// The caller's identity as asserted by the fronting proxy.
pub struct RemoteUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for RemoteUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(IDENTITY_HEADER) {
            None => Ok(RemoteUser(ANONYMOUS.to_string())),
            Some(value) => {
                let user = value
                    .to_str()
                    .map_err(|_| (StatusCode::BAD_REQUEST, "invalid X-Remote-User header"))?
                    .trim();
                if user.is_empty() {
                    Ok(RemoteUser(ANONYMOUS.to_string()))
                } else {
                    Ok(RemoteUser(user.to_string()))
                }
            }
        }
    }
}
