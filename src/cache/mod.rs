//! # Cache Module
//!
//! Server-side caching layer for Open Player.
//!
//! The resolution service sits in front of a slow, rate-limited extraction
//! subprocess, so every cacheable endpoint keeps its own TTL cache. Entries
//! are checked against their TTL on every read and evicted FIFO by insertion
//! order once a cache grows past its fixed capacity (deliberately simpler
//! than LRU, sized for the client's prefetch pattern).
//!
//! ## Cache Instances
//!
//! - **Search cache**: lower-cased query → track list (TTL 1 h, 100 entries)
//! - **Stream cache**: `videoId|quality` → resolved stream (TTL 1 h, 200
//!   entries; stream URLs expire upstream on their own schedule)
//! - **Trending slot**: a single global snapshot (TTL 3 h, no eviction)
//!
//! ## Concurrency
//!
//! Reads and writes are not mutually exclusive. Two concurrent misses for the
//! same key both resolve upstream and both write; the last writer wins. All
//! cached values are idempotent functions of their key, so duplicated work is
//! wasteful but never incorrect.

pub mod ttl_cache;

pub use ttl_cache::{TtlCache, TtlSlot};

use crate::sources::{Quality, StreamRecord, Track};

/// Caché de resultados de búsqueda, clave = consulta en minúsculas
pub type SearchCache = TtlCache<String, Vec<Track>>;

/// Caché de streams resueltos, clave = `videoId|quality`
pub type StreamCache = TtlCache<String, StreamRecord>;

/// Ranura única para la instantánea de tendencias
pub type TrendingSlot = TtlSlot<Vec<Track>>;

/// Clave compuesta del caché de streams
pub fn stream_key(video_id: &str, quality: Quality) -> String {
    format!("{video_id}|{quality}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_key_concatenates_id_and_quality() {
        assert_eq!(stream_key("abc123", Quality::High), "abc123|high");
        assert_eq!(stream_key("abc123", Quality::Low), "abc123|low");
    }
}
