pub mod suggest;
pub mod ytdlp;

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use suggest::SuggestClient;
pub use ytdlp::YtDlpClient;

/// Errores de la capa de extracción
#[derive(Debug, Error)]
pub enum SourceError {
    /// El subproceso terminó con estado distinto de cero (lleva el stderr)
    #[error("{0}")]
    Process(String),

    /// Metadatos bien formados pero sin URL reproducible
    #[error("No stream URL found")]
    NoStreamUrl,

    /// Salida de objeto único que no es JSON válido
    #[error(transparent)]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// El servicio de autocompletado de terceros no respondió
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

/// Niveles de calidad seleccionables para la resolución de streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    #[default]
    High,
}

impl Quality {
    /// Interpreta el parámetro de query; cualquier valor desconocido cae a High
    pub fn parse(value: &str) -> Self {
        match value {
            "low" => Quality::Low,
            "medium" => Quality::Medium,
            _ => Quality::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }

    /// Selector de formato que se pasa al extractor para cada nivel
    pub fn format_selector(&self) -> &'static str {
        match self {
            Quality::Low => "worstaudio[abr<=64]/worstaudio",
            Quality::Medium => "bestaudio[abr<=128]/bestaudio[abr<=160]/bestaudio",
            Quality::High => "bestaudio",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Un track tal y como lo devuelven búsqueda y tendencias
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub video_id: String,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
}

// La identidad de un track es su videoId; el resto son metadatos de adorno
impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.video_id == other.video_id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.video_id.hash(state);
    }
}

/// Stream resuelto para un par (videoId, calidad)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    pub url: String,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<f64>,
}

/// Objeto crudo que emite el extractor. Todos los campos son opcionales
/// porque su presencia varía según el modo de invocación (el listado plano
/// omite thumbnails, el volcado completo no trae álbum, etc.).
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub artist: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub album: Option<String>,
    pub url: Option<String>,
    pub abr: Option<f64>,
}

impl RawEntry {
    /// Cadena de respaldo: uploader → artist → "Unknown Artist"
    fn display_artist(&self) -> String {
        [&self.uploader, &self.artist]
            .into_iter()
            .flatten()
            .find(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| "Unknown Artist".to_string())
    }
}

/// Interpreta una línea del listado de búsqueda. El modo plano no devuelve
/// thumbnail, así que se sintetiza desde el identificador. Las líneas
/// malformadas o sin id se descartan de una en una.
pub(crate) fn parse_search_line(line: &str) -> Option<Track> {
    let raw: RawEntry = serde_json::from_str(line).ok()?;
    let id = raw.id.clone().filter(|id| !id.is_empty())?;
    Some(Track {
        title: raw.title.clone().unwrap_or_default(),
        artist: raw.display_artist(),
        thumbnail: Some(format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg")),
        duration: raw.duration,
        album: raw.album,
        video_id: id,
    })
}

/// Igual que la búsqueda pero con el thumbnail tal cual lo da el extractor
pub(crate) fn parse_trending_line(line: &str) -> Option<Track> {
    let raw: RawEntry = serde_json::from_str(line).ok()?;
    let id = raw.id.clone().filter(|id| !id.is_empty())?;
    Some(Track {
        title: raw.title.clone().unwrap_or_default(),
        artist: raw.display_artist(),
        thumbnail: raw.thumbnail,
        duration: raw.duration,
        album: None,
        video_id: id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quality_parse_defaults_to_high() {
        assert_eq!(Quality::parse("low"), Quality::Low);
        assert_eq!(Quality::parse("medium"), Quality::Medium);
        assert_eq!(Quality::parse("high"), Quality::High);
        assert_eq!(Quality::parse("ultra"), Quality::High);
        assert_eq!(Quality::parse(""), Quality::High);
    }

    #[test]
    fn test_quality_format_selectors() {
        assert_eq!(Quality::Low.format_selector(), "worstaudio[abr<=64]/worstaudio");
        assert_eq!(
            Quality::Medium.format_selector(),
            "bestaudio[abr<=128]/bestaudio[abr<=160]/bestaudio"
        );
        assert_eq!(Quality::High.format_selector(), "bestaudio");
    }

    #[test]
    fn test_parse_search_line_synthesizes_thumbnail() {
        let line = r#"{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","uploader":"Rick Astley","duration":213.0,"album":"Whenever You Need Somebody"}"#;
        let track = parse_search_line(line).expect("línea válida");
        assert_eq!(track.video_id, "dQw4w9WgXcQ");
        assert_eq!(track.title, "Never Gonna Give You Up");
        assert_eq!(track.artist, "Rick Astley");
        assert_eq!(
            track.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );
        assert_eq!(track.duration, Some(213.0));
        assert_eq!(track.album.as_deref(), Some("Whenever You Need Somebody"));
    }

    #[test]
    fn test_parse_search_line_artist_fallback_chain() {
        let with_artist = r#"{"id":"x1","artist":"Artista"}"#;
        assert_eq!(parse_search_line(with_artist).unwrap().artist, "Artista");

        let uploader_wins = r#"{"id":"x2","uploader":"Canal","artist":"Artista"}"#;
        assert_eq!(parse_search_line(uploader_wins).unwrap().artist, "Canal");

        let empty_uploader = r#"{"id":"x3","uploader":"","artist":"Artista"}"#;
        assert_eq!(parse_search_line(empty_uploader).unwrap().artist, "Artista");

        let nothing = r#"{"id":"x4"}"#;
        assert_eq!(parse_search_line(nothing).unwrap().artist, "Unknown Artist");
    }

    #[test]
    fn test_parse_search_line_drops_malformed_or_idless() {
        assert!(parse_search_line("esto no es json").is_none());
        assert!(parse_search_line(r#"{"title":"sin id"}"#).is_none());
        assert!(parse_search_line(r#"{"id":"","title":"id vacío"}"#).is_none());
    }

    #[test]
    fn test_parse_trending_line_uses_extractor_thumbnail() {
        let line = r#"{"id":"t1","title":"Hit","uploader":"Canal","thumbnail":"https://img/t1.jpg","duration":180.0}"#;
        let track = parse_trending_line(line).expect("línea válida");
        assert_eq!(track.thumbnail.as_deref(), Some("https://img/t1.jpg"));
        assert_eq!(track.album, None);
    }

    #[test]
    fn test_track_identity_is_the_video_id() {
        let a = parse_search_line(r#"{"id":"misma","title":"Uno"}"#).unwrap();
        let b = parse_search_line(r#"{"id":"misma","title":"Otro título"}"#).unwrap();
        let c = parse_search_line(r#"{"id":"otra","title":"Uno"}"#).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_track_serializes_camel_case() {
        let track = parse_search_line(r#"{"id":"abc","title":"T"}"#).unwrap();
        let json = serde_json::to_value(&track).unwrap();
        assert!(json.get("videoId").is_some());
        assert!(json.get("video_id").is_none());
        // los opcionales ausentes no viajan por el cable
        assert!(json.get("album").is_none());
    }
}
