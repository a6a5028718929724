use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::VecDeque,
    hash::Hash,
    time::{Duration, Instant},
};
use tracing::debug;

/// Entrada de caché con marca de tiempo de creación
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    timestamp: Instant,
}

impl<V> CacheEntry<V> {
    fn new(data: V) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.timestamp.elapsed() < ttl
    }
}

/// Caché con TTL y desalojo FIFO por orden de inserción.
///
/// Una entrada caducada se comporta como ausente en `get` pero permanece
/// almacenada hasta que un `put` posterior la sobrescribe. El desalojo
/// elimina siempre la clave insertada más antigua, sin tener en cuenta
/// accesos recientes (FIFO, no LRU).
#[derive(Debug)]
pub struct TtlCache<K: Clone + Eq + Hash, V> {
    entries: DashMap<K, CacheEntry<V>>,
    order: Mutex<VecDeque<K>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            ttl,
            capacity,
        }
    }

    /// Devuelve el valor solo si existe y sigue dentro del TTL
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.is_fresh(self.ttl) {
            Some(entry.data.clone())
        } else {
            // la entrada caducada queda en su sitio hasta ser sobrescrita
            None
        }
    }

    /// Inserta o sobrescribe; si se supera la capacidad desaloja la clave
    /// insertada más antigua. Sobrescribir no cambia la posición original.
    pub fn put(&self, key: K, data: V) {
        let previous = self.entries.insert(key.clone(), CacheEntry::new(data));

        let mut order = self.order.lock();
        if previous.is_none() {
            order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            match order.pop_front() {
                Some(oldest) => {
                    if self.entries.remove(&oldest).is_some() {
                        debug!("Entrada desalojada de la caché (FIFO)");
                    }
                }
                None => break,
            }
        }
    }

    /// Número de entradas almacenadas, caducadas incluidas
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ranura única con TTL para un resultado global (sin mapa de claves)
#[derive(Debug)]
pub struct TtlSlot<V> {
    entry: RwLock<Option<CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlSlot<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entry: RwLock::new(None),
            ttl,
        }
    }

    pub fn get(&self) -> Option<V> {
        let guard = self.entry.read();
        guard
            .as_ref()
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.data.clone())
    }

    pub fn put(&self, data: V) {
        *self.entry.write() = Some(CacheEntry::new(data));
    }
}
