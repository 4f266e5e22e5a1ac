//! Search API endpoints.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::TaxonomyKind;
use crate::search::{SearchPage, SearchResult};
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    pub q: String,
    /// Restrict to one collection, e.g. `services`.
    #[serde(default)]
    pub kind: Option<String>,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// Matches across all pages, not the length of `results`.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// GET /api/search - Search entities of the enabled modules.
pub async fn search_entities(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let limit = params.limit.clamp(1, MAX_SEARCH_LIMIT);

    let kinds: Vec<TaxonomyKind> = match params.kind.as_deref().filter(|k| !k.is_empty()) {
        Some(segment) => {
            let kind = TaxonomyKind::from_segment(segment)
                .or_else(|| TaxonomyKind::from_str(segment))
                .filter(|k| state.config.modules.allows(*k))
                .ok_or_else(|| AppError::BadRequest(format!("Unknown kind {}", segment)))?;
            vec![kind]
        }
        None => TaxonomyKind::ALL
            .into_iter()
            .filter(|k| state.config.modules.allows(*k))
            .collect(),
    };

    let SearchPage { results, total } =
        state.search.search(&params.q, &kinds, limit, params.offset)?;

    success(SearchResponse {
        results,
        total,
        limit,
        offset: params.offset,
    })
}
