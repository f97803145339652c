//! Master feature cache and `.mfc` loader (SPEC_FULL.md §4.4).
//!
//! One handler type centralizes all cached state behind interior mutability.
//! The store is read-mostly and small (at most `cache_cap` entries), so a
//! single `Mutex`-guarded map is enough: every session already has exclusive
//! access to its own state, so the store only needs to serialize occasional
//! loads/evictions, not support lock-free high-throughput lookups.

use crate::config::MasterStoreConfig;
use crate::error::EngineError;
use crate::format;
use ndarray::Array2;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct MasterEntry {
    pub frames: Arc<Array2<f32>>,
    pub master_rms: Option<f32>,
}

struct Inner {
    entries: HashMap<String, MasterEntry>,
    /// Least-recently-used order, most recently used at the back.
    lru: Vec<String>,
}

/// Loads and memoizes master `.mfc` feature matrices. Eviction only removes
/// entries whose `Arc` strong count is 1 — i.e. no session currently holds a
/// reference to that matrix — matching SPEC_FULL.md's requirement that a
/// cache eviction must never invalidate a feature matrix a live session is
/// mid-alignment against.
pub struct MasterFeatureStore {
    config: MasterStoreConfig,
    inner: Mutex<Inner>,
}

impl MasterFeatureStore {
    pub fn new(config: MasterStoreConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                lru: Vec::new(),
            }),
        }
    }

    #[instrument(skip(self), fields(call_id = %call_id))]
    pub fn load(&self, call_id: &str) -> Result<MasterEntry, EngineError> {
        format::validate_call_id(call_id)?;

        {
            let mut inner = self.inner.lock().map_err(|_| EngineError::Poisoned)?;
            if let Some(entry) = inner.entries.get(call_id).cloned() {
                touch(&mut inner.lru, call_id);
                debug!("master feature cache hit");
                return Ok(entry);
            }
        }

        let path = self.config.root.join(format!("{call_id}.mfc"));
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::MasterCallNotFound(call_id.to_string())
            } else {
                EngineError::MasterIoError(call_id.to_string(), e.to_string())
            }
        })?;
        let parsed = format::parse(call_id, &bytes)?;
        let entry = MasterEntry {
            frames: Arc::new(parsed.frames),
            master_rms: parsed.master_rms,
        };

        let mut inner = self.inner.lock().map_err(|_| EngineError::Poisoned)?;
        // Another thread may have loaded the same call id while we were
        // reading from disk; prefer whichever is already resident.
        let entry = inner
            .entries
            .entry(call_id.to_string())
            .or_insert(entry)
            .clone();
        touch(&mut inner.lru, call_id);
        self.evict_if_needed(&mut inner);
        Ok(entry)
    }

    /// Installs a feature matrix directly, bypassing disk I/O. Used by the
    /// `test-hooks` injection path and by hosts that compute master features
    /// out of band.
    pub fn inject(&self, call_id: &str, frames: Array2<f32>, master_rms: Option<f32>) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.entries.insert(
            call_id.to_string(),
            MasterEntry {
                frames: Arc::new(frames),
                master_rms,
            },
        );
        touch(&mut inner.lru, call_id);
        self.evict_if_needed(&mut inner);
    }

    fn evict_if_needed(&self, inner: &mut Inner) {
        while inner.entries.len() > self.config.cache_cap {
            let Some(victim_idx) = inner
                .lru
                .iter()
                .position(|id| Arc::strong_count(&inner.entries[id].frames) == 1)
            else {
                // every resident entry is still referenced by a live session
                break;
            };
            let victim = inner.lru.remove(victim_idx);
            inner.entries.remove(&victim);
        }
    }

    pub fn resident_count(&self) -> usize {
        self.inner.lock().expect("lock poisoned").entries.len()
    }
}

fn touch(lru: &mut Vec<String>, call_id: &str) {
    if let Some(pos) = lru.iter().position(|id| id == call_id) {
        lru.remove(pos);
    }
    lru.push(call_id.to_string());
}
