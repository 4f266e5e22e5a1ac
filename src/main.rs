//! CMS Content Backend
//!
//! REST backend for pages, sections, services and personas built from typed
//! page-builder components, with SQLite persistence and Tantivy search.

mod api;
mod config;
mod content;
mod db;
mod errors;
mod models;
mod search;
mod storage;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use models::TaxonomyKind;
use search::SearchIndex;
use storage::BlobStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub storage: Arc<BlobStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CMS content backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Upload directory: {:?}", config.upload_dir);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Enabled modules: {:?}", enabled_kinds(&config));

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize search index
    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    // Build initial search index from database
    tracing::info!("Building search index...");
    let mut documents = Vec::new();
    for entity in repo.list_all_entities().await? {
        let entries = repo.list_entries(entity.kind, &entity.id).await?;
        documents.push((entity, entries));
    }
    search.rebuild(&documents).await?;

    let storage = Arc::new(BlobStore::open(&config.upload_dir, &config.public_url).await?);

    let state = AppState {
        repo,
        search,
        storage,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Catalog
        .route(
            "/components",
            get(api::list_components).post(api::create_component),
        )
        .route(
            "/components/{id}",
            get(api::get_component).delete(api::delete_component),
        )
        .route("/components/{id}/default", get(api::default_component_content))
        // Uploads
        .route("/uploads", post(api::upload_file).delete(api::delete_file))
        // Search
        .route("/search", get(api::search_entities))
        // Public read API
        .route("/public/{kind}/{slug}", get(api::get_published))
        .route("/public/{kind}/{slug}/render", get(api::render_published))
        // Admin, one collection per taxonomy kind
        .route("/{kind}", get(api::list_entities).post(api::create_entity))
        .route(
            "/{kind}/{id}",
            get(api::get_entity)
                .put(api::update_entity)
                .delete(api::delete_entity),
        )
        .route("/{kind}/{id}/entries", get(api::list_entity_entries));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    let mut router = Router::new()
        .nest("/api", api_routes)
        .merge(health_routes);

    // Uploaded files are served locally unless the public URL points elsewhere.
    let public_url = state.storage.public_url();
    if public_url.starts_with('/') && public_url.len() > 1 {
        router = router.nest_service(public_url, ServeDir::new(state.storage.root()));
    }

    router
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Kinds served by this instance, for the startup log.
fn enabled_kinds(config: &Config) -> Vec<TaxonomyKind> {
    TaxonomyKind::ALL
        .into_iter()
        .filter(|k| config.modules.allows(*k))
        .collect()
}

#[cfg(test)]
mod tests;
