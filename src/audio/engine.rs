use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::sources::{Quality, Track};
use crate::storage::PlayerSettings;

use super::resolver::StreamResolver;
use super::sink::{AudioSink, SinkEvent};

/// Estado de reproducción del motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// Resolución de stream en vuelo para el track actual
    Loading,
    Playing,
    Paused,
    /// El último intento falló; los metadatos del track se conservan
    Error,
}

/// Modo de repetición
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// off → all → one → off
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

#[derive(Debug)]
struct EngineState {
    queue: Vec<Track>,
    queue_index: Option<usize>,
    current_track: Option<Track>,
    state: PlaybackState,
    shuffle: bool,
    repeat: RepeatMode,
    quality: Quality,
    volume: f32,
    current_time: f64,
    duration: f64,
    last_error: Option<String>,
    // token de petición: una resolución solo se aplica si sigue vigente
    generation: u64,
}

/// Instantánea consistente del estado para la capa de presentación
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub queue: Vec<Track>,
    pub queue_index: Option<usize>,
    pub current_track: Option<Track>,
    pub state: PlaybackState,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub volume: f32,
    pub current_time: f64,
    pub duration: f64,
    pub last_error: Option<String>,
}

/// Motor de cola de reproducción. Coordina la única salida de audio, la
/// navegación por la cola, los modos shuffle/repeat y el prefetch
/// especulativo contra la caché de streams del servidor.
///
/// Invariante: con cola no vacía, `queue_index` siempre cae en
/// `[0, queue.len())`; con cola vacía no hay track actual.
pub struct PlayerEngine {
    state: RwLock<EngineState>,
    sink: Mutex<Box<dyn AudioSink>>,
    resolver: Arc<dyn StreamResolver>,
}

enum Advance {
    Restart,
    Play(Track),
    Stay,
}

impl PlayerEngine {
    /// Crea el motor con su recurso de audio propio y la configuración
    /// persistida (volumen y modos; la cola nunca se restaura)
    pub fn new(
        mut sink: Box<dyn AudioSink>,
        resolver: Arc<dyn StreamResolver>,
        settings: PlayerSettings,
    ) -> Self {
        let volume = settings.volume.clamp(0.0, 1.0);
        sink.set_volume(volume);
        Self {
            state: RwLock::new(EngineState {
                queue: Vec::new(),
                queue_index: None,
                current_track: None,
                state: PlaybackState::Idle,
                shuffle: settings.shuffle,
                repeat: settings.repeat,
                quality: Quality::default(),
                volume,
                current_time: 0.0,
                duration: 0.0,
                last_error: None,
                generation: 0,
            }),
            sink: Mutex::new(sink),
            resolver,
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let st = self.state.read();
        PlayerSnapshot {
            queue: st.queue.clone(),
            queue_index: st.queue_index,
            current_track: st.current_track.clone(),
            state: st.state,
            shuffle: st.shuffle,
            repeat: st.repeat,
            volume: st.volume,
            current_time: st.current_time,
            duration: st.duration,
            last_error: st.last_error.clone(),
        }
    }

    /// Configuración persistible del reproductor
    pub fn settings(&self) -> PlayerSettings {
        let st = self.state.read();
        PlayerSettings {
            volume: st.volume,
            shuffle: st.shuffle,
            repeat: st.repeat,
        }
    }

    /// Calidad usada para resoluciones y prefetch a partir de ahora
    pub fn set_quality(&self, quality: Quality) {
        self.state.write().quality = quality;
    }

    /// Reemplaza la cola completa y arranca en `start_index` (acotado a la
    /// cola para preservar el invariante de posición)
    pub async fn set_queue(&self, tracks: Vec<Track>, start_index: usize) {
        let start = {
            let mut st = self.state.write();
            if tracks.is_empty() {
                st.queue = tracks;
                st.queue_index = None;
                st.current_track = None;
                st.state = PlaybackState::Idle;
                None
            } else {
                let start = start_index.min(tracks.len() - 1);
                st.queue = tracks;
                st.queue_index = Some(start);
                Some(st.queue[start].clone())
            }
        };

        if let Some(track) = start {
            self.play_track(track).await;
        }
    }

    /// Resuelve el stream del track y lo asigna al recurso de audio. Si
    /// mientras tanto llegó una petición más nueva, la respuesta tardía se
    /// descarta en lugar de pisar el track vigente.
    pub async fn play_track(&self, track: Track) {
        let (generation, quality) = {
            let mut st = self.state.write();
            st.generation += 1;
            st.current_track = Some(track.clone());
            st.state = PlaybackState::Loading;
            st.last_error = None;
            (st.generation, st.quality)
        };

        let resolved = self.resolver.resolve(&track.video_id, quality).await;

        {
            let mut st = self.state.write();
            if st.generation != generation {
                debug!("Respuesta tardía descartada para: {}", track.title);
                return;
            }

            match resolved {
                Ok(record) => {
                    info!("🎵 Reproduciendo: {}", record.title);
                    if let Some(duration) = record.duration {
                        st.duration = duration;
                    }
                    st.current_time = 0.0;
                    st.state = PlaybackState::Playing;
                    drop(st);

                    let mut sink = self.sink.lock();
                    sink.load(&record.url);
                    sink.play();
                }
                Err(e) => {
                    warn!("❌ No se pudo reproducir {}: {}", track.title, e);
                    st.state = PlaybackState::Error;
                    st.last_error = Some(e.to_string());
                    return;
                }
            }
        }

        self.prefetch_next();
    }

    /// Alterna pausa/reproducción; sin track cargado no hace nada
    pub fn toggle_play(&self) {
        if self.state.read().current_track.is_none() {
            return;
        }

        let paused_now = {
            let mut sink = self.sink.lock();
            if sink.is_paused() {
                sink.play();
                false
            } else {
                sink.pause();
                true
            }
        };

        self.state.write().state = if paused_now {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
    }

    /// Busca a una posición acotada a [0, duración]; `current_time` se
    /// actualiza de inmediato sin esperar confirmación del dispositivo
    pub fn seek(&self, position: f64) {
        let clamped = {
            let st = self.state.read();
            position.clamp(0.0, st.duration.max(0.0))
        };
        self.sink.lock().seek(clamped);
        self.state.write().current_time = clamped;
    }

    pub fn set_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        self.sink.lock().set_volume(clamped);
        self.state.write().volume = clamped;
    }

    /// Avanza según los modos. Con repeat-one reinicia el track sin mover la
    /// posición; con shuffle elige un índice uniforme (puede repetir el
    /// actual); fuera de rango, con repeat-all vuelve al 0 y si no se queda
    /// donde está.
    pub async fn play_next(&self) {
        let advance = {
            let mut st = self.state.write();
            if st.repeat == RepeatMode::One {
                if st.current_track.is_some() {
                    Advance::Restart
                } else {
                    Advance::Stay
                }
            } else if st.queue.is_empty() {
                Advance::Stay
            } else {
                let len = st.queue.len();
                let mut next = if st.shuffle {
                    rand::thread_rng().gen_range(0..len)
                } else {
                    st.queue_index.map_or(0, |i| i + 1)
                };

                if next >= len && st.repeat == RepeatMode::All {
                    next = 0;
                }

                if next >= len {
                    Advance::Stay
                } else {
                    st.queue_index = Some(next);
                    Advance::Play(st.queue[next].clone())
                }
            }
        };

        match advance {
            Advance::Restart => {
                debug!("🔂 Repitiendo track actual");
                {
                    let mut sink = self.sink.lock();
                    sink.seek(0.0);
                    sink.play();
                }
                self.state.write().current_time = 0.0;
            }
            Advance::Play(track) => self.play_track(track).await,
            Advance::Stay => {}
        }
    }

    /// Retrocede: pasados más de 3 segundos reinicia el track en el sitio;
    /// si no, va al anterior cuando existe
    pub async fn play_previous(&self) {
        let advance = {
            let mut st = self.state.write();
            if st.current_time > 3.0 {
                Advance::Restart
            } else {
                match st.queue_index {
                    Some(i) if i > 0 => {
                        st.queue_index = Some(i - 1);
                        Advance::Play(st.queue[i - 1].clone())
                    }
                    _ => Advance::Stay,
                }
            }
        };

        match advance {
            Advance::Restart => {
                self.sink.lock().seek(0.0);
                self.state.write().current_time = 0.0;
            }
            Advance::Play(track) => self.play_track(track).await,
            Advance::Stay => {}
        }
    }

    /// Añade al final sin alterar posición ni reproducción
    pub fn add_to_queue(&self, track: Track) {
        let mut st = self.state.write();
        st.queue.push(track);
        if st.queue_index.is_none() {
            st.queue_index = Some(0);
        }
    }

    pub fn toggle_shuffle(&self) -> bool {
        let mut st = self.state.write();
        st.shuffle = !st.shuffle;
        st.shuffle
    }

    pub fn cycle_repeat(&self) -> RepeatMode {
        let mut st = self.state.write();
        st.repeat = st.repeat.next();
        st.repeat
    }

    /// Procesa un evento del dispositivo de audio
    pub async fn handle_event(&self, event: SinkEvent) {
        match event {
            // solo actualiza la posición, nunca dispara transiciones
            SinkEvent::TimeUpdate(position) => {
                self.state.write().current_time = position;
            }
            SinkEvent::LoadedMetadata { duration } => {
                self.state.write().duration = duration;
            }
            SinkEvent::Play => {
                let mut st = self.state.write();
                if st.current_track.is_some() {
                    st.state = PlaybackState::Playing;
                }
            }
            SinkEvent::Pause => {
                let mut st = self.state.write();
                if st.state == PlaybackState::Playing {
                    st.state = PlaybackState::Paused;
                }
            }
            SinkEvent::Ended => self.play_next().await,
            SinkEvent::Error(message) => {
                warn!("❌ Error del dispositivo de audio: {}", message);
                let mut st = self.state.write();
                st.state = PlaybackState::Error;
                st.last_error = Some(message);
            }
        }
    }

    /// Precalienta la caché del servidor resolviendo el sucesor lineal del
    /// track actual. Con shuffle activo el siguiente real no es predecible y
    /// no se intenta nada. El resultado (y cualquier fallo) se ignora.
    fn prefetch_next(&self) {
        let target = {
            let st = self.state.read();
            let successor = if st.shuffle {
                None
            } else {
                let next = st.queue_index.map_or(0, |i| i + 1);
                if next < st.queue.len() {
                    st.queue.get(next).cloned()
                } else if st.repeat == RepeatMode::All {
                    st.queue.first().cloned()
                } else {
                    None
                }
            };
            successor.map(|track| (track, st.quality))
        };

        let Some((track, quality)) = target else {
            return;
        };

        debug!("Prefetch: {}", track.title);
        let resolver = Arc::clone(&self.resolver);
        tokio::spawn(async move {
            if let Err(e) = resolver.resolve(&track.video_id, quality).await {
                debug!("Prefetch falló para {}: {}", track.video_id, e);
            }
        });
    }
}
