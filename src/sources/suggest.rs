use regex::Regex;
use tracing::debug;

use super::SourceError;

const SUGGEST_ENDPOINT: &str = "https://suggestqueries.google.com/complete/search";

/// Máximo de sugerencias devueltas al cliente
const MAX_SUGGESTIONS: usize = 8;

/// Cliente del autocompletado de terceros. Los fallos nunca llegan al
/// cliente: el handler degrada cualquier error a una lista vacía.
#[derive(Debug, Clone)]
pub struct SuggestClient {
    http: reqwest::Client,
}

impl SuggestClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub async fn suggestions(&self, query: &str) -> Result<Vec<String>, SourceError> {
        let url = format!(
            "{SUGGEST_ENDPOINT}?client=youtube&ds=yt&q={}",
            urlencoding::encode(query)
        );
        let text = self.http.get(&url).send().await?.text().await?;

        let suggestions = parse_jsonp_suggestions(&text);
        debug!("💡 {} sugerencias para: {}", suggestions.len(), query);
        Ok(suggestions)
    }
}

impl Default for SuggestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Extrae las sugerencias del envoltorio estilo JSONP:
/// `window.google.ac.h(["consulta",[["sugerencia",0],...],...])`
pub(crate) fn parse_jsonp_suggestions(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"\[.*\]") else {
        return Vec::new();
    };
    let Some(body) = re.find(text) else {
        return Vec::new();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body.as_str()) else {
        return Vec::new();
    };

    value
        .get(1)
        .and_then(|entries| entries.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get(0).and_then(|s| s.as_str()))
                .map(str::to_string)
                .take(MAX_SUGGESTIONS)
                .collect()
        })
        .unwrap_or_default()
}
