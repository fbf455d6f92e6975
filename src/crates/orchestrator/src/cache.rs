//! Optional dispatch result cache.
//!
//! Keyed by a canonical hash of the request, entries expire after a TTL.
//! The cache and its clock are injected so tests can control time.

use crate::request::GenerationRequest;
use llm::RawResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_entries: 256,
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Hex SHA-256 of a request's canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Prompt, system instruction, sorted lowercase models, temperature,
    /// token budget and image references. Model order does not matter.
    pub fn from_request(request: &GenerationRequest) -> Self {
        let mut models: Vec<String> = request.models.iter().map(|m| m.to_lowercase()).collect();
        models.sort();

        let canonical = json!({
            "prompt": request.prompt,
            "system": request.system,
            "models": models,
            "temperature": request.temperature,
            "maxTokens": request.max_tokens,
            "images": request.images.iter().map(|i| i.as_url()).collect::<Vec<_>>(),
        });

        let digest = Sha256::digest(canonical.to_string().as_bytes());
        CacheKey(format!("{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Store for dispatch results. Writes are last-writer-wins.
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Vec<RawResult>>;
    fn put(&self, key: CacheKey, results: Vec<RawResult>);
}

struct Entry {
    stored_at: Instant,
    results: Vec<RawResult>,
}

/// TTL map behind a mutex.
pub struct InMemoryResultCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for InMemoryResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryResultCache")
            .field("entries", &self.entries.lock().len())
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl InMemoryResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self::with_clock(ttl, max_entries, Arc::new(SystemClock))
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    pub fn with_clock(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }
}

impl ResultCache for InMemoryResultCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<RawResult>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if self.is_fresh(entry, now) => {
                debug!(key = %key, "Cache hit");
                Some(entry.results.clone())
            }
            Some(_) => {
                debug!(key = %key, "Cache entry expired");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: CacheKey, results: Vec<RawResult>) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        entries.insert(key, Entry { stored_at: now, results });

        if entries.len() > self.max_entries {
            entries.retain(|_, e| now.saturating_duration_since(e.stored_at) < self.ttl);
        }
        while entries.len() > self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }
    }
}
