//! Admin endpoints for pages, sections, services and personas.
//!
//! Every save carries the complete list of builder elements; the stored
//! entries are replaced wholesale.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{reindex, success, ApiResult, EnabledKind};
use crate::errors::AppError;
use crate::models::{
    ContentEntry, CreateEntityRequest, Entity, EntityDetail, ListQuery, Paginated,
    UpdateEntityRequest,
};
use crate::AppState;

/// GET /api/:kind - List one page of entities.
pub async fn list_entities(
    State(state): State<AppState>,
    EnabledKind(kind): EnabledKind,
    Query(query): Query<ListQuery>,
) -> ApiResult<Paginated<Entity>> {
    let per_page = state.config.page_size_for(query.per_page);
    let page = query.page.unwrap_or(1);
    success(state.repo.list_entities(kind, page, per_page).await?)
}

/// GET /api/:kind/:id - Get an entity by id or slug with its entries.
pub async fn get_entity(
    State(state): State<AppState>,
    EnabledKind(kind): EnabledKind,
    Path((_, key)): Path<(String, String)>,
) -> ApiResult<EntityDetail> {
    let entity = state
        .repo
        .find_entity(kind, &key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {} not found", kind.label(), key)))?;

    let entries = state.repo.list_entries(kind, &entity.id).await?;
    success(EntityDetail {
        entity,
        entries: entries.iter().map(|e| e.to_wire()).collect(),
    })
}

/// GET /api/:kind/:id/entries - The entity's entries in stored order.
pub async fn list_entity_entries(
    State(state): State<AppState>,
    EnabledKind(kind): EnabledKind,
    Path((_, id)): Path<(String, String)>,
) -> ApiResult<Vec<ContentEntry>> {
    if state.repo.get_entity(kind, &id).await?.is_none() {
        return Err(AppError::NotFound(format!("{} {} not found", kind.label(), id)));
    }

    let entries = state.repo.list_entries(kind, &id).await?;
    success(entries.iter().map(|e| e.to_wire()).collect())
}

/// POST /api/:kind - Create an entity with its builder elements.
pub async fn create_entity(
    State(state): State<AppState>,
    EnabledKind(kind): EnabledKind,
    Json(request): Json<CreateEntityRequest>,
) -> ApiResult<Entity> {
    let entity = state.repo.create_entity(kind, &request).await?;
    reindex(&state, &entity).await;
    success(entity)
}

/// PUT /api/:kind/:id - Update an entity and replace its entries.
pub async fn update_entity(
    State(state): State<AppState>,
    EnabledKind(kind): EnabledKind,
    Path((_, id)): Path<(String, String)>,
    Json(request): Json<UpdateEntityRequest>,
) -> ApiResult<Entity> {
    let entity = state.repo.update_entity(kind, &id, &request).await?;
    reindex(&state, &entity).await;
    success(entity)
}

/// DELETE /api/:kind/:id - Delete an entity and its entries.
pub async fn delete_entity(
    State(state): State<AppState>,
    EnabledKind(kind): EnabledKind,
    Path((_, id)): Path<(String, String)>,
) -> ApiResult<()> {
    state.repo.delete_entity(kind, &id).await?;

    if let Err(e) = state.search.remove_entity(&id).await {
        tracing::warn!("Failed to remove {} {} from index: {}", kind.as_str(), id, e);
    }

    success(())
}
