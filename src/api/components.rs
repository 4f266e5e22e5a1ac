//! Component catalog endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::models::{ComponentContent, ComponentTemplate, CreateTemplateRequest};
use crate::AppState;

/// GET /api/components - List the catalog.
pub async fn list_components(State(state): State<AppState>) -> ApiResult<Vec<ComponentTemplate>> {
    success(state.repo.list_templates().await?)
}

/// GET /api/components/:id - Get a single template.
pub async fn get_component(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ComponentTemplate> {
    let catalog = state.repo.catalog().await?;
    success(catalog.resolve(&id)?.clone())
}

/// GET /api/components/:id/default - Empty content for a new block.
///
/// Accepts a template id or machine name.
pub async fn default_component_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ComponentContent> {
    let catalog = state.repo.catalog().await?;
    match catalog.get(&id) {
        Some(template) => success(ComponentContent::empty(&template.kind)),
        None => success(catalog.default_content(&id)?),
    }
}

/// POST /api/components - Register a template.
pub async fn create_component(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> ApiResult<ComponentTemplate> {
    success(state.repo.create_template(&request).await?)
}

/// DELETE /api/components/:id - Remove an unused template.
pub async fn delete_component(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.repo.delete_template(&id).await?;
    success(())
}
