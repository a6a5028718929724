pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::{SearchCache, StreamCache, TrendingSlot};
use crate::config::Config;
use crate::sources::{SuggestClient, YtDlpClient};

/// Estado compartido entre handlers. Cada petición es independiente y puede
/// lanzar su propio subproceso; no hay límite de concurrencia ni
/// deduplicación de misses idénticos (el último escritor gana).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ytdlp: Arc<YtDlpClient>,
    pub suggest: Arc<SuggestClient>,
    pub search_cache: Arc<SearchCache>,
    pub stream_cache: Arc<StreamCache>,
    pub trending: Arc<TrendingSlot>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            ytdlp: Arc::new(YtDlpClient::new(&config.ytdlp_path)),
            suggest: Arc::new(SuggestClient::new()),
            search_cache: Arc::new(SearchCache::new(
                Duration::from_secs(config.search_ttl_secs),
                config.search_cache_size,
            )),
            stream_cache: Arc::new(StreamCache::new(
                Duration::from_secs(config.stream_ttl_secs),
                config.stream_cache_size,
            )),
            trending: Arc::new(TrendingSlot::new(Duration::from_secs(
                config.trending_ttl_secs,
            ))),
            config: Arc::new(config),
        }
    }
}

/// Construye el router completo de la API
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/stream/:video_id", get(handlers::stream))
        .route("/api/trending", get(handlers::trending))
        .route("/api/suggestions", get(handlers::suggestions))
        .route("/api/download/:video_id", get(handlers::download))
        .route("/api/related/:video_id", get(handlers::related))
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
