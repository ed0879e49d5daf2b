//! Bearer-key authentication.
//!
//! Every API route except health takes a [`Caller`], which resolves the
//! `Authorization: Bearer <key>` header to the owner id the caller's
//! workflows and configurations are stored under.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::typed_header::TypedHeaderRejectionReason;
use axum_extra::TypedHeader;

use agentchain_core::{AppState, ServerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub owner_id: String,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Self>() {
            return Ok(caller.clone());
        }

        type BearerHeader = TypedHeader<Authorization<Bearer>>;
        let TypedHeader(Authorization(bearer)) = BearerHeader::from_request_parts(parts, state)
            .await
            .map_err(|rejection| match rejection.reason() {
                TypedHeaderRejectionReason::Missing => {
                    ServerError::Unauthorized("Missing bearer key".to_string())
                }
                _ => ServerError::Unauthorized("Malformed Authorization header".to_string()),
            })?;

        let owner_id = state
            .api_key_store
            .resolve(bearer.token())
            .await?
            .ok_or_else(|| ServerError::Unauthorized("Unknown or revoked key".to_string()))?;

        let caller = Caller { owner_id };
        parts.extensions.insert(caller.clone());
        Ok(caller)
    }
}
