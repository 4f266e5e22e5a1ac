//! Upload endpoints for image-block media.

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::storage::StoredBlob;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUploadRequest {
    pub url: String,
}

/// POST /api/uploads?filename= - Store the raw request body.
pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<StoredBlob> {
    success(state.storage.store(query.filename.as_deref(), &body).await?)
}

/// DELETE /api/uploads - Delete a stored file by its public URL.
pub async fn delete_file(
    State(state): State<AppState>,
    Json(request): Json<DeleteUploadRequest>,
) -> ApiResult<()> {
    state.storage.delete(&request.url).await?;
    success(())
}
