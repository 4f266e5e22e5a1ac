//! REST API module.
//!
//! Admin CRUD per taxonomy kind, the component catalog, the public read API,
//! uploads and search.

mod components;
mod entities;
mod public;
mod search;
mod uploads;

pub use components::*;
pub use entities::*;
pub use public::*;
pub use search::*;
pub use uploads::*;

use axum::{
    extract::{FromRequestParts, RawPathParams},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Entity, TaxonomyKind};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// The taxonomy kind named by the `{kind}` path segment, checked against
/// the enabled modules. Unknown and disabled kinds are both NotFound.
#[derive(Debug, Clone, Copy)]
pub struct EnabledKind(pub TaxonomyKind);

impl FromRequestParts<AppState> for EnabledKind {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let params = RawPathParams::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::Internal(format!("Path parameters unavailable: {}", e)))?;

        let segment = params
            .iter()
            .find(|(name, _)| *name == "kind")
            .map(|(_, value)| value.to_string())
            .ok_or_else(|| AppError::Internal("Route has no kind segment".to_string()))?;

        match TaxonomyKind::from_segment(&segment) {
            Some(kind) if state.config.modules.allows(kind) => Ok(EnabledKind(kind)),
            Some(kind) => {
                tracing::debug!(kind = kind.as_str(), "Request for disabled module");
                Err(AppError::NotFound(format!("Unknown collection {}", segment)))
            }
            None => Err(AppError::NotFound(format!("Unknown collection {}", segment))),
        }
    }
}

/// Refresh the search document of an entity after a save.
///
/// Index failures are logged; the save itself already committed.
pub(crate) async fn reindex(state: &AppState, entity: &Entity) {
    let entries = match state.repo.list_entries(entity.kind, &entity.id).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to load entries for indexing {}: {}", entity.id, e);
            return;
        }
    };
    if let Err(e) = state.search.index_entity(entity, &entries).await {
        tracing::warn!("Failed to index {} {}: {}", entity.kind.as_str(), entity.id, e);
    }
}
