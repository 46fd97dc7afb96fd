//! Caller identity forwarded by the upstream authentication layer.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use domain::{Principal, Role};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extracts the [`Principal`] from `x-user-id` and `x-user-role`.
///
/// Rejects with 401 when either header is missing or malformed.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: UserId = header(parts, USER_ID_HEADER)?
            .parse()
            .map_err(|_| ApiError::Unauthenticated(format!("malformed {USER_ID_HEADER}")))?;
        let role: Role = header(parts, USER_ROLE_HEADER)?
            .parse()
            .map_err(|e| ApiError::Unauthenticated(format!("{e}")))?;

        Ok(Authenticated(Principal::new(user_id, role)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name}")))?
        .to_str()
        .map(str::trim)
        .map_err(|_| ApiError::Unauthenticated(format!("malformed {name}")))
}
