//! Public read API: published entities with decoded and rendered content.

use axum::extract::{Path, State};

use super::{success, ApiResult, EnabledKind};
use crate::content::{codec, render};
use crate::errors::AppError;
use crate::models::{Entity, PublishedEntity, RenderedEntity, TaxonomyKind};
use crate::AppState;

async fn published(state: &AppState, kind: TaxonomyKind, slug: &str) -> Result<Entity, AppError> {
    state
        .repo
        .get_entity_by_slug(kind, slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {} not found", kind.label(), slug)))
}

/// GET /api/public/:kind/:slug - Entity with decoded components.
pub async fn get_published(
    State(state): State<AppState>,
    EnabledKind(kind): EnabledKind,
    Path((_, slug)): Path<(String, String)>,
) -> ApiResult<PublishedEntity> {
    let entity = published(&state, kind, &slug).await?;
    let entries = state.repo.list_entries(kind, &entity.id).await?;

    success(PublishedEntity {
        entity,
        components: entries.iter().map(codec::decode_entry).collect(),
    })
}

/// GET /api/public/:kind/:slug/render - Entity with projected blocks.
pub async fn render_published(
    State(state): State<AppState>,
    EnabledKind(kind): EnabledKind,
    Path((_, slug)): Path<(String, String)>,
) -> ApiResult<RenderedEntity> {
    let entity = published(&state, kind, &slug).await?;
    let entries = state.repo.list_entries(kind, &entity.id).await?;

    success(RenderedEntity {
        entity,
        blocks: render::render_entries(&entries),
    })
}
