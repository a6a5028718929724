use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::sources::{Quality, StreamRecord};

/// Costura entre el motor y el servicio de resolución. El motor solo conoce
/// este trait; en producción habla HTTP y en tests se sustituye por un mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, video_id: &str, quality: Quality) -> Result<StreamRecord>;
}

/// Implementación contra el endpoint `/api/stream` del servidor
#[derive(Debug, Clone)]
pub struct HttpResolver {
    http: reqwest::Client,
    base_url: String,
}

impl HttpResolver {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl StreamResolver for HttpResolver {
    async fn resolve(&self, video_id: &str, quality: Quality) -> Result<StreamRecord> {
        let url = format!(
            "{}/api/stream/{}?quality={}",
            self.base_url.trim_end_matches('/'),
            video_id,
            quality
        );

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("stream request failed: {}", response.status());
        }

        let record: StreamRecord = response.json().await?;
        if record.url.is_empty() {
            anyhow::bail!("No stream URL found");
        }
        Ok(record)
    }
}
