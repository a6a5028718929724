use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Red
    pub port: u16,

    // Extractor
    pub ytdlp_path: PathBuf,
    pub trending_query: String,

    // Caché
    pub search_cache_size: usize,
    pub stream_cache_size: usize,
    pub search_ttl_secs: u64,
    pub stream_ttl_secs: u64,
    pub trending_ttl_secs: u64,

    // Paths
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Red
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()?,

            // Extractor
            ytdlp_path: std::env::var("YT_DLP_PATH")
                .unwrap_or_else(|_| "yt-dlp".to_string())
                .into(),
            trending_query: std::env::var("TRENDING_QUERY")
                .unwrap_or_else(|_| "trending music 2024".to_string()),

            // Caché (valores dimensionados para el patrón de prefetch)
            search_cache_size: std::env::var("SEARCH_CACHE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            stream_cache_size: std::env::var("STREAM_CACHE_SIZE")
                .unwrap_or_else(|_| "200".to_string())
                .parse()?,
            search_ttl_secs: std::env::var("SEARCH_TTL")
                .unwrap_or_else(|_| "3600".to_string()) // 1 hora
                .parse()?,
            stream_ttl_secs: std::env::var("STREAM_TTL")
                .unwrap_or_else(|_| "3600".to_string()) // 1 hora (las URLs caducan)
                .parse()?,
            trending_ttl_secs: std::env::var("TRENDING_TTL")
                .unwrap_or_else(|_| "10800".to_string()) // 3 horas
                .parse()?,

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
        };

        std::fs::create_dir_all(&config.data_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Comprueba valores que romperían el servicio en caliente
    pub fn validate(&self) -> Result<()> {
        if self.search_cache_size == 0 {
            anyhow::bail!("Search cache size must be greater than 0");
        }

        if self.stream_cache_size == 0 {
            anyhow::bail!("Stream cache size must be greater than 0");
        }

        if self.search_ttl_secs == 0 || self.stream_ttl_secs == 0 || self.trending_ttl_secs == 0 {
            anyhow::bail!("Cache TTLs must be greater than 0");
        }

        if self.trending_query.trim().is_empty() {
            anyhow::bail!("Trending query cannot be empty");
        }

        Ok(())
    }

    /// Resumen para el arranque, sin información sensible
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Red: puerto {}\n  \
            Extractor: {} (trending: \"{}\")\n  \
            Caché: {} búsquedas ({}s), {} streams ({}s), trending {}s\n  \
            Datos: {}",
            self.port,
            self.ytdlp_path.display(),
            self.trending_query,
            self.search_cache_size,
            self.search_ttl_secs,
            self.stream_cache_size,
            self.stream_ttl_secs,
            self.trending_ttl_secs,
            self.data_dir.display()
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            ytdlp_path: "yt-dlp".into(),
            trending_query: "trending music 2024".to_string(),
            search_cache_size: 100,
            stream_cache_size: 200,
            search_ttl_secs: 3600,
            stream_ttl_secs: 3600,
            trending_ttl_secs: 10800,
            data_dir: "./data".into(),
        }
    }
}
