use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use crate::cache::stream_key;
use crate::sources::{Quality, Track};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub results: Vec<Track>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

/// GET /api/search?q= — resuelve con caché por consulta en minúsculas.
/// Un fallo del extractor responde lista vacía con error, nunca excepción.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(query) = params.q.filter(|q| !q.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Query is required" })),
        )
            .into_response();
    };

    let cache_key = query.to_lowercase();
    if let Some(results) = state.search_cache.get(&cache_key) {
        info!("⚡ Cache hit para búsqueda: {}", query);
        return Json(ResultsResponse { results }).into_response();
    }

    match state.ytdlp.search(&query).await {
        Ok(results) => {
            state.search_cache.put(cache_key, results.clone());
            Json(ResultsResponse { results }).into_response()
        }
        Err(e) => {
            error!("Error de búsqueda: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Search failed", "results": [] })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    quality: Option<String>,
}

/// GET /api/stream/:video_id?quality=low|medium|high
pub async fn stream(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(params): Query<StreamParams>,
) -> Response {
    let quality = params
        .quality
        .as_deref()
        .map(Quality::parse)
        .unwrap_or_default();

    let cache_key = stream_key(&video_id, quality);
    if let Some(record) = state.stream_cache.get(&cache_key) {
        info!("⚡ Cache hit para stream: {} ({})", video_id, quality);
        return Json(record).into_response();
    }

    match state.ytdlp.resolve_stream(&video_id, quality).await {
        Ok(record) => {
            state.stream_cache.put(cache_key, record.clone());
            Json(record).into_response()
        }
        Err(e) => {
            error!("Error de stream: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get stream" })),
            )
                .into_response()
        }
    }
}

/// GET /api/trending — una sola instantánea global con su propio TTL
pub async fn trending(State(state): State<AppState>) -> Response {
    if let Some(results) = state.trending.get() {
        info!("⚡ Cache hit para tendencias");
        return Json(ResultsResponse { results }).into_response();
    }

    match state.ytdlp.trending(&state.config.trending_query).await {
        Ok(results) => {
            state.trending.put(results.clone());
            Json(ResultsResponse { results }).into_response()
        }
        Err(e) => {
            error!("Error de tendencias: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get trending", "results": [] })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    q: Option<String>,
}

/// GET /api/suggestions?q= — degrada siempre a lista vacía, nunca a error
pub async fn suggestions(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Json<serde_json::Value> {
    let Some(query) = params.q.filter(|q| q.chars().count() >= 2) else {
        return Json(json!({ "suggestions": [] }));
    };

    let suggestions = match state.suggest.suggestions(&query).await {
        Ok(suggestions) => suggestions,
        Err(e) => {
            warn!("Error de sugerencias: {}", e);
            Vec::new()
        }
    };
    Json(json!({ "suggestions": suggestions }))
}

/// GET /api/download/:video_id — resuelve los metadatos para el nombre de
/// archivo y transfiere el audio directo desde el subproceso, sin buffering.
/// Una vez iniciado el streaming, un fallo upstream solo puede registrarse.
pub async fn download(State(state): State<AppState>, Path(video_id): Path<String>) -> Response {
    info!("⬇️ Descargando: {}", video_id);

    let meta = match state.ytdlp.metadata(&video_id).await {
        Ok(meta) => meta,
        Err(e) => {
            error!("Error de descarga: {}", e);
            return download_failed();
        }
    };
    let filename = format!(
        "{}.mp3",
        sanitize_filename(meta.title.as_deref().unwrap_or("audio"))
    );

    let mut child = match state.ytdlp.spawn_download(&video_id) {
        Ok(child) => child,
        Err(e) => {
            error!("Error lanzando la descarga: {}", e);
            return download_failed();
        }
    };
    let Some(stdout) = child.stdout.take() else {
        error!("El proceso de descarga no expuso stdout");
        return download_failed();
    };

    // recolecta el proceso en segundo plano; la respuesta ya no puede
    // convertirse en error llegados a este punto
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => info!("✓ Descarga completada"),
            Ok(status) => error!("El proceso de descarga salió con código {:?}", status.code()),
            Err(e) => error!("Error esperando al proceso de descarga: {}", e),
        }
    });

    let body = Body::from_stream(ReaderStream::new(stdout));
    match Response::builder()
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(body)
    {
        Ok(response) => response,
        Err(e) => {
            error!("Error construyendo la respuesta de descarga: {}", e);
            download_failed()
        }
    }
}

fn download_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Download failed" })),
    )
        .into_response()
}

/// Sustituye todo lo que no sea ASCII alfanumérico por guiones bajos
fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// GET /api/related/:video_id — reservado para la función de radio
pub async fn related(Path(_video_id): Path<String>) -> Json<ResultsResponse> {
    Json(ResultsResponse {
        results: Vec::new(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: String,
    #[serde(rename = "cacheSize")]
    pub cache_size: CacheSizes,
}

#[derive(Debug, Serialize)]
pub struct CacheSizes {
    pub search: usize,
    pub stream: usize,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        mode: "yt-dlp".to_string(),
        cache_size: CacheSizes {
            search: state.search_cache.len(),
            stream: state.stream_cache.len(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sources::StreamRecord;
    use axum::body::to_bytes;

    fn test_state() -> AppState {
        AppState::new(Config::default())
    }

    /// Estado cuyo "extractor" sale siempre con código distinto de cero
    fn broken_state() -> AppState {
        let mut config = Config::default();
        config.ytdlp_path = "false".into();
        AppState::new(config)
    }

    fn sample_track(id: &str) -> Track {
        Track {
            video_id: id.to_string(),
            title: "Canción".to_string(),
            artist: "Artista".to_string(),
            thumbnail: Some(format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg")),
            duration: Some(180.0),
            album: None,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[test]
    fn test_sanitize_filename_keeps_only_alphanumerics() {
        assert_eq!(sanitize_filename("Mi Canción (feat. X) [2024]"), "Mi_Canci_n__feat__X___2024_");
        assert_eq!(sanitize_filename("simple"), "simple");
        assert_eq!(sanitize_filename(""), "");
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let response = search(State(test_state()), Query(SearchParams { q: None })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = search(
            State(test_state()),
            Query(SearchParams {
                q: Some(String::new()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_serves_cache_hits_case_insensitively() {
        let state = test_state();
        state
            .search_cache
            .put("beatles".to_string(), vec![sample_track("b1")]);

        let response = search(
            State(state),
            Query(SearchParams {
                q: Some("BeAtLeS".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["results"][0]["videoId"], "b1");
    }

    #[tokio::test]
    async fn test_search_failure_yields_empty_results_not_fault() {
        let response = search(
            State(broken_state()),
            Query(SearchParams {
                q: Some("cualquier cosa".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Search failed");
        assert_eq!(body["results"], json!([]));
    }

    #[tokio::test]
    async fn test_stream_served_from_cache_without_resolution() {
        let state = broken_state(); // un miss reventaría: el hit no debe tocar el extractor
        let record = StreamRecord {
            url: "https://cdn/abc".to_string(),
            title: "Canción".to_string(),
            artist: "Artista".to_string(),
            thumbnail: None,
            duration: Some(200.0),
            quality: Quality::High,
            bitrate: Some(128.0),
        };
        state.stream_cache.put(stream_key("abc123", Quality::High), record);

        let response = stream(
            State(state),
            Path("abc123".to_string()),
            Query(StreamParams { quality: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["url"], "https://cdn/abc");
        assert_eq!(body["quality"], "high");
    }

    #[tokio::test]
    async fn test_stream_failure_is_an_error_payload() {
        let response = stream(
            State(broken_state()),
            Path("abc123".to_string()),
            Query(StreamParams {
                quality: Some("low".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Failed to get stream");
    }

    #[tokio::test]
    async fn test_trending_failure_degrades_to_empty_results() {
        let response = trending(State(broken_state())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["results"], json!([]));
    }

    #[tokio::test]
    async fn test_trending_snapshot_served_from_slot() {
        let state = broken_state();
        state.trending.put(vec![sample_track("t1")]);

        let response = trending(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["results"][0]["videoId"], "t1");
    }

    #[tokio::test]
    async fn test_suggestions_short_query_is_empty_ok() {
        let response = suggestions(
            State(test_state()),
            Query(SuggestParams {
                q: Some("a".to_string()),
            }),
        )
        .await;
        assert_eq!(response.0, json!({ "suggestions": [] }));

        let response = suggestions(State(test_state()), Query(SuggestParams { q: None })).await;
        assert_eq!(response.0, json!({ "suggestions": [] }));
    }

    #[tokio::test]
    async fn test_related_is_an_empty_stub() {
        let response = related(Path("abc".to_string())).await;
        assert!(response.0.results.is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_cache_sizes() {
        let state = test_state();
        state.search_cache.put("q".to_string(), Vec::new());
        state
            .stream_cache
            .put(stream_key("v", Quality::Low), StreamRecord {
                url: "u".to_string(),
                title: String::new(),
                artist: String::new(),
                thumbnail: None,
                duration: None,
                quality: Quality::Low,
                bitrate: None,
            });

        let response = health(State(state)).await;
        assert_eq!(response.0.status, "ok");
        assert_eq!(response.0.mode, "yt-dlp");
        assert_eq!(response.0.cache_size.search, 1);
        assert_eq!(response.0.cache_size.stream, 1);

        let json = serde_json::to_value(&response.0).expect("serializa");
        assert!(json.get("cacheSize").is_some());
    }

    #[cfg(unix)]
    mod with_fake_extractor {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Crea un yt-dlp falso que apunta cada invocación y emite la salida
        /// indicada, para probar el flujo completo sin red
        fn fake_extractor(dir: &std::path::Path, stdout: &str) -> std::path::PathBuf {
            let script = dir.join("fake-yt-dlp");
            let marker = dir.join("invocations.log");
            std::fs::write(
                &script,
                format!(
                    "#!/bin/sh\necho invoked >> {}\ncat <<'PAYLOAD'\n{}\nPAYLOAD\n",
                    marker.display(),
                    stdout
                ),
            )
            .expect("escribir script");
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("permisos");
            script
        }

        fn invocations(dir: &std::path::Path) -> usize {
            std::fs::read_to_string(dir.join("invocations.log"))
                .map(|content| content.lines().count())
                .unwrap_or(0)
        }

        #[tokio::test]
        async fn test_stream_cache_prevents_duplicate_resolution() {
            let dir = tempfile::tempdir().expect("tempdir");
            let payload = r#"{"id":"abc123","title":"Prueba","uploader":"Canal","thumbnail":"https://img/p.jpg","duration":200,"url":"https://cdn/prueba","abr":128}"#;
            let script = fake_extractor(dir.path(), payload);

            let mut config = Config::default();
            config.ytdlp_path = script;
            let state = AppState::new(config);

            for _ in 0..2 {
                let response = stream(
                    State(state.clone()),
                    Path("abc123".to_string()),
                    Query(StreamParams {
                        quality: Some("high".to_string()),
                    }),
                )
                .await;
                assert_eq!(response.status(), StatusCode::OK);
                let body = body_json(response).await;
                assert_eq!(body["url"], "https://cdn/prueba");
            }

            // la segunda petición dentro del TTL no vuelve a invocar nada
            assert_eq!(invocations(dir.path()), 1);
        }

        #[tokio::test]
        async fn test_search_parses_lines_and_drops_malformed() {
            let dir = tempfile::tempdir().expect("tempdir");
            let payload = concat!(
                r#"{"id":"v1","title":"Uno","uploader":"Canal"}"#,
                "\n",
                "esto no es json\n",
                r#"{"title":"sin id"}"#,
                "\n",
                r#"{"id":"v2","title":"Dos","artist":"Artista"}"#
            );
            let script = fake_extractor(dir.path(), payload);

            let mut config = Config::default();
            config.ytdlp_path = script;
            let state = AppState::new(config);

            let response = search(
                State(state),
                Query(SearchParams {
                    q: Some("uno dos".to_string()),
                }),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);

            let body = body_json(response).await;
            let results = body["results"].as_array().expect("array");
            assert_eq!(results.len(), 2);
            assert_eq!(results[0]["videoId"], "v1");
            assert_eq!(
                results[0]["thumbnail"],
                "https://i.ytimg.com/vi/v1/mqdefault.jpg"
            );
            assert_eq!(results[1]["artist"], "Artista");
        }
    }
}
