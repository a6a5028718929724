use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{error, info};

use super::{parse_search_line, parse_trending_line, Quality, RawEntry, SourceError, StreamRecord, Track};

/// Cliente del extractor externo. Una invocación por llamada, sin reintentos
/// propios: los flags de timeout y reintentos viajan como argumentos del
/// proceso.
#[derive(Debug, Clone)]
pub struct YtDlpClient {
    program: PathBuf,
}

impl YtDlpClient {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Verifica que el binario de yt-dlp esté disponible
    pub async fn verify(&self) -> Result<String, SourceError> {
        let output = Command::new(&self.program).arg("--version").output().await?;
        if output.status.success() {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            info!("✅ yt-dlp versión: {}", version);
            Ok(version)
        } else {
            error!("❌ yt-dlp no encontrado. Instala con: pip install yt-dlp");
            Err(SourceError::Process("yt-dlp no disponible".to_string()))
        }
    }

    /// Ejecuta el extractor una sola vez y acumula stdout/stderr completos.
    /// Resuelve con stdout si el proceso sale con 0; si no, falla con el
    /// stderr acumulado (o un mensaje genérico si vino vacío).
    async fn run(&self, args: &[&str]) -> Result<String, SourceError> {
        let output = Command::new(&self.program).args(args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("❌ yt-dlp terminó con error: {}", stderr);
            return Err(SourceError::Process(if stderr.is_empty() {
                "yt-dlp failed".to_string()
            } else {
                stderr
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Busca los 20 mejores resultados en modo listado rápido. Cada línea de
    /// salida es un objeto JSON independiente; las malformadas se descartan.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>, SourceError> {
        info!("🔍 Buscando: {}", query);

        let search_query = format!("ytsearch20:{query}");
        let output = self
            .run(&[
                search_query.as_str(),
                "--dump-json",
                "--flat-playlist", // mucho más rápido, sin thumbnails
                "--no-warnings",
                "--default-search",
                "ytsearch",
            ])
            .await?;

        let tracks: Vec<Track> = output.lines().filter_map(parse_search_line).collect();
        info!("📋 Encontrados {} resultados para: {}", tracks.len(), query);
        Ok(tracks)
    }

    /// Resuelve la URL directa de stream para un video en la calidad pedida.
    /// Los argumentos de compatibilidad (cliente alternativo, user-agent,
    /// geo-bypass) sortean las restricciones de la plataforma.
    pub async fn resolve_stream(
        &self,
        video_id: &str,
        quality: Quality,
    ) -> Result<StreamRecord, SourceError> {
        info!("🎵 Obteniendo stream {} para: {}", quality, video_id);

        let output = self
            .run(&[
                "-f",
                quality.format_selector(),
                "--dump-json",
                "--no-warnings",
                "--extractor-args",
                "youtube:player_client=ios,mweb",
                "--user-agent",
                "com.google.ios.youtube/19.29.1 (iPhone16,2; U; CPU iOS 17_5_1 like Mac OS X;)",
                "--add-header",
                "Accept-Language:en-US,en;q=0.9",
                "--geo-bypass",
                "--no-check-certificates",
                "--socket-timeout",
                "30",
                "--retries",
                "3",
                video_id,
            ])
            .await?;

        let raw: RawEntry = serde_json::from_str(output.trim())?;
        let url = raw
            .url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or(SourceError::NoStreamUrl)?;

        let record = StreamRecord {
            url,
            title: raw.title.clone().unwrap_or_default(),
            artist: raw.display_artist(),
            thumbnail: raw.thumbnail.clone(),
            duration: raw.duration,
            quality,
            bitrate: raw.abr,
        };
        info!("✓ Stream listo: {} ({})", record.title, quality);
        Ok(record)
    }

    /// Instantánea de tendencias con la consulta editorial configurada
    pub async fn trending(&self, query: &str) -> Result<Vec<Track>, SourceError> {
        info!("📈 Obteniendo tendencias");

        let search_query = format!("ytsearch20:{query}");
        let output = self
            .run(&[
                search_query.as_str(),
                "--dump-json",
                "--no-playlist",
                "--no-warnings",
            ])
            .await?;

        Ok(output.lines().filter_map(parse_trending_line).collect())
    }

    /// Metadatos completos de un video (para derivar el nombre de descarga)
    pub async fn metadata(&self, video_id: &str) -> Result<RawEntry, SourceError> {
        let output = self.run(&["--dump-json", "--no-warnings", video_id]).await?;
        Ok(serde_json::from_str(output.trim())?)
    }

    /// Lanza la descarga de mejor audio escribiendo al stdout del proceso;
    /// los bytes se transfieren al cliente según llegan, sin buffering.
    pub fn spawn_download(&self, video_id: &str) -> Result<Child, SourceError> {
        let child = Command::new(&self.program)
            .args(["-f", "bestaudio", "-o", "-", video_id])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // el runner es agnóstico al binario, así que se prueba con utilidades
    // del sistema en lugar de yt-dlp real

    #[tokio::test]
    async fn test_run_resolves_with_accumulated_stdout() {
        let client = YtDlpClient::new("echo");
        let output = client.run(&["hola", "mundo"]).await.expect("echo sale con 0");
        assert_eq!(output.trim(), "hola mundo");
    }

    #[tokio::test]
    async fn test_run_fails_with_stderr_detail() {
        let client = YtDlpClient::new("sh");
        let err = client
            .run(&["-c", "echo se rompió 1>&2; exit 3"])
            .await
            .expect_err("sale con 3");
        match err {
            SourceError::Process(detail) => assert_eq!(detail, "se rompió"),
            other => panic!("variante inesperada: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_fails_generic_when_stderr_empty() {
        let client = YtDlpClient::new("false");
        let err = client.run(&[]).await.expect_err("false sale con 1");
        match err {
            SourceError::Process(detail) => assert_eq!(detail, "yt-dlp failed"),
            other => panic!("variante inesperada: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_download_streams_stdout() {
        use tokio::io::AsyncReadExt;

        let client = YtDlpClient::new("echo");
        let mut child = client.spawn_download("abc123").expect("spawn");
        let mut stdout = child.stdout.take().expect("stdout piped");

        let mut collected = String::new();
        stdout.read_to_string(&mut collected).await.expect("lectura");
        assert_eq!(collected.trim(), "-f bestaudio -o - abc123");

        let status = child.wait().await.expect("wait");
        assert!(status.success());
    }
}
