use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::audio::RepeatMode;

/// Lo único del reproductor que sobrevive reinicios: volumen y modos.
/// La cola y la posición se reconstruyen siempre desde cero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub volume: f32,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: 0.7,
            shuffle: false,
            repeat: RepeatMode::Off,
        }
    }
}

/// Almacenamiento basado en archivos JSON
pub struct JsonStorage {
    data_dir: PathBuf,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).await?;
        info!("📁 Storage inicializado en: {}", data_dir.display());
        Ok(Self { data_dir })
    }

    /// Carga la configuración persistida; si falta o está corrupta vuelve a
    /// los valores por defecto
    pub async fn load_settings(&self) -> Result<PlayerSettings> {
        let path = self.settings_path();
        match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => Ok(settings),
                Err(e) => {
                    warn!("Configuración corrupta en {}: {}", path.display(), e);
                    Ok(PlayerSettings::default())
                }
            },
            Err(_) => {
                let settings = PlayerSettings::default();
                self.save_settings(&settings).await?;
                info!("📝 Configuración por defecto creada");
                Ok(settings)
            }
        }
    }

    pub async fn save_settings(&self, settings: &PlayerSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(self.settings_path(), content).await?;
        info!("💾 Configuración del reproductor guardada");
        Ok(())
    }

    fn settings_path(&self) -> PathBuf {
        self.data_dir.join("player_settings.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = JsonStorage::new(dir.path().to_path_buf()).await.expect("storage");

        let settings = PlayerSettings {
            volume: 0.3,
            shuffle: true,
            repeat: RepeatMode::All,
        };
        storage.save_settings(&settings).await.expect("guardar");

        let loaded = storage.load_settings().await.expect("cargar");
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_missing_file_creates_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = JsonStorage::new(dir.path().to_path_buf()).await.expect("storage");

        let loaded = storage.load_settings().await.expect("cargar");
        assert_eq!(loaded, PlayerSettings::default());
        assert!(dir.path().join("player_settings.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = JsonStorage::new(dir.path().to_path_buf()).await.expect("storage");

        tokio::fs::write(dir.path().join("player_settings.json"), "{ basura")
            .await
            .expect("escribir");

        let loaded = storage.load_settings().await.expect("cargar");
        assert_eq!(loaded, PlayerSettings::default());
    }
}
