use async_trait::async_trait;
use bazaar::domain::{CacheStats, EntryInfo};
use bazaar::ports::CacheStore;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use shared::{Result, TtlMs};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// In-memory cache with per-entry TTL.
///
/// Entries expire three ways: a timer armed for each key on `set`, a lazy check
/// on every read, and a periodic sweep. Each `set` stamps the entry with a fresh
/// generation, and timers and sweeps only remove the generation they saw, so a
/// stale timer can never take out a newer value.
pub struct TtlCache<K, V>
where
    K: Debug + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<K, V>>,
    sweeper: JoinHandle<()>,
}

struct Inner<K, V> {
    entries: DashMap<K, Slot<V>>,
    timers: DashMap<K, Timer>,
    generation: AtomicU64,
    counters: Counters,
}

struct Slot<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    generation: u64,
}

impl<V> Slot<V> {
    fn new(value: V, created_at: Instant, ttl: Duration, generation: u64) -> Self {
        Self {
            value,
            created_at,
            ttl,
            generation,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

struct Timer {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Debug + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Must be called from within a Tokio runtime; the sweep task is spawned here.
    /// Intervals below 1ms are raised to 1ms.
    pub fn new(sweep_interval: Duration) -> Self {
        let inner = Arc::new(Inner {
            entries: DashMap::new(),
            timers: DashMap::new(),
            generation: AtomicU64::new(0),
            counters: Counters::default(),
        });
        let sweeper = spawn_sweeper(
            Arc::downgrade(&inner),
            sweep_interval.max(MIN_SWEEP_INTERVAL),
        );

        Self { inner, sweeper }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SWEEP_INTERVAL)
    }

    /// Physically present entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Remove every expired entry now instead of waiting for the next sweep
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    fn insert(&self, key: K, val: V, ttl: TtlMs, only_if_absent: bool) -> bool {
        let ttl = ttl.as_duration();
        let now = Instant::now();

        // the generation is drawn under the shard lock so it grows in write order
        let generation = match self.inner.entries.entry(key.clone()) {
            MapEntry::Occupied(mut occupied) => {
                if only_if_absent && !occupied.get().is_expired(now) {
                    return false;
                }
                let generation = self.inner.next_generation();
                occupied.insert(Slot::new(val, now, ttl, generation));
                generation
            }
            MapEntry::Vacant(vacant) => {
                let generation = self.inner.next_generation();
                vacant.insert(Slot::new(val, now, ttl, generation));
                generation
            }
        };

        self.inner.counters.sets.fetch_add(1, Ordering::Relaxed);
        self.arm_timer(key, generation, ttl);
        true
    }

    /// Schedule removal of `generation` of `key`, cancelling any earlier timer
    fn arm_timer(&self, key: K, generation: u64, ttl: Duration) {
        let weak = Arc::downgrade(&self.inner);
        let timer_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(&timer_key, generation);
            }
        })
        .abort_handle();

        match self.inner.timers.entry(key.clone()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().generation > generation {
                    // a later write already armed its own timer
                    handle.abort();
                    return;
                }
                // aborting a timer that already fired is a no-op
                let previous = occupied.insert(Timer { generation, handle });
                previous.handle.abort();
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Timer { generation, handle });
            }
        }

        // a zero ttl can fire before the timer was recorded
        self.inner
            .timers
            .remove_if(&key, |_, t| t.generation == generation && t.handle.is_finished());
    }
}

impl<K, V> Inner<K, V>
where
    K: Debug + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Remove `key` only if it still holds `generation`
    fn expire(&self, key: &K, generation: u64) -> bool {
        let removed = self
            .entries
            .remove_if(key, |_, slot| slot.generation == generation)
            .is_some();

        if let Some((_, timer)) = self.timers.remove_if(key, |_, t| t.generation == generation) {
            timer.handle.abort();
        }

        if removed {
            self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    fn remove(&self, key: &K) -> bool {
        let removed = self.entries.remove(key).is_some();
        if let Some((_, timer)) = self.timers.remove(key) {
            timer.handle.abort();
        }

        if removed {
            self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(K, u64)> = self
            .entries
            .iter()
            .filter(|slot| slot.is_expired(now))
            .map(|slot| (slot.key().clone(), slot.generation))
            .collect();

        expired
            .into_iter()
            .filter(|(key, generation)| self.expire(key, *generation))
            .count()
    }

    fn abort_timers(&self) {
        for timer in self.timers.iter() {
            timer.handle.abort();
        }
        self.timers.clear();
    }
}

fn spawn_sweeper<K, V>(weak: Weak<Inner<K, V>>, period: Duration) -> JoinHandle<()>
where
    K: Debug + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let removed = inner.sweep();
            if removed > 0 {
                debug!("Cache sweep removed {} expired entries", removed);
            }
        }
    })
}

#[async_trait]
impl<K, V> CacheStore<K, V> for TtlCache<K, V>
where
    K: Debug + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn set(&self, key: K, val: V, ttl: TtlMs) -> Result<bool> {
        Ok(self.insert(key, val, ttl, false))
    }

    async fn set_if_absent(&self, key: K, val: V, ttl: TtlMs) -> Result<bool> {
        Ok(self.insert(key, val, ttl, true))
    }

    async fn get(&self, key: &K) -> Result<Option<V>> {
        let now = Instant::now();
        // the read guard is released before any removal below
        let lookup = self.inner.entries.get(key).map(|slot| {
            if slot.is_expired(now) {
                Err(slot.generation)
            } else {
                Ok(slot.value.clone())
            }
        });

        let counters = &self.inner.counters;
        match lookup {
            Some(Ok(value)) => {
                counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Some(Err(generation)) => {
                self.inner.expire(key, generation);
                counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn has(&self, key: &K) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .inner
            .entries
            .get(key)
            .is_some_and(|slot| !slot.is_expired(now)))
    }

    async fn delete(&self, key: &K) -> Result<bool> {
        Ok(self.inner.remove(key))
    }

    async fn update_ttl(&self, key: &K, ttl: TtlMs) -> Result<bool> {
        let now = Instant::now();
        let ttl = ttl.as_duration();

        let generation = match self.inner.entries.get_mut(key) {
            Some(mut slot) if !slot.is_expired(now) => {
                let generation = self.inner.next_generation();
                slot.ttl = ttl;
                slot.created_at = now;
                slot.generation = generation;
                Some(generation)
            }
            _ => None,
        };

        match generation {
            Some(generation) => {
                self.arm_timer(key.clone(), generation, ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        // a timer armed by a newer concurrent set survives
        self.inner.entries.retain(|key, slot| {
            if let Some((_, timer)) = self
                .inner
                .timers
                .remove_if(key, |_, t| t.generation == slot.generation)
            {
                timer.handle.abort();
            }
            removed += 1;
            false
        });
        debug!("Cache cleared, {} entries removed", removed);
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<K>> {
        let now = Instant::now();
        Ok(self
            .inner
            .entries
            .iter()
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| slot.key().clone())
            .collect())
    }

    async fn entries(&self) -> Result<Vec<EntryInfo<K>>> {
        let now = Instant::now();
        Ok(self
            .inner
            .entries
            .iter()
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| {
                let age = now.saturating_duration_since(slot.created_at);
                EntryInfo {
                    key: slot.key().clone(),
                    age,
                    ttl: slot.ttl,
                    remaining: slot.ttl.saturating_sub(age),
                }
            })
            .collect())
    }

    fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let size = self
            .inner
            .entries
            .iter()
            .filter(|slot| !slot.is_expired(now))
            .count();
        let counters = &self.inner.counters;

        CacheStats::new(
            size,
            counters.hits.load(Ordering::Relaxed),
            counters.misses.load(Ordering::Relaxed),
            counters.sets.load(Ordering::Relaxed),
            counters.deletes.load(Ordering::Relaxed),
        )
    }

    fn reset_stats(&self) {
        let counters = &self.inner.counters;
        counters.hits.store(0, Ordering::Relaxed);
        counters.misses.store(0, Ordering::Relaxed);
        counters.sets.store(0, Ordering::Relaxed);
        counters.deletes.store(0, Ordering::Relaxed);
    }
}

impl<K, V> Drop for TtlCache<K, V>
where
    K: Debug + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.sweeper.abort();
        self.inner.abort_timers();
    }
}

impl<K, V> Debug for TtlCache<K, V>
where
    K: Debug + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.inner.entries.len())
            .field("timers", &self.inner.timers.len())
            .finish()
    }
}
