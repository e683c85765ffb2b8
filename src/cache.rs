//! Schema Cache - one versioned entry per source unit
//!
//! Entries live in a sharded concurrent map, so units are built and
//! invalidated independently and no lock spans the whole cache. Shard locks
//! are held for entry access only, never while a schema is being built or the
//! code index is being consulted.

use crate::index::{SourceUnit, StructuralVersion};
use crate::schema::Schema;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A build result attributed to the version it was built against.
/// `schema` is `None` when the framework is not in use for the unit.
#[derive(Debug, Clone)]
pub struct CachedSchema {
    pub version: StructuralVersion,
    pub schema: Option<Arc<Schema>>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    discarded: AtomicU64,
}

/// Cache activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Builds that ran to completion
    pub builds: u64,
    /// Builds thrown away because the code model moved underneath them
    pub discarded: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schema Cache Stats:")?;
        writeln!(f, "  Hits: {}", self.hits)?;
        writeln!(f, "  Misses: {}", self.misses)?;
        writeln!(f, "  Builds: {} (discarded: {})", self.builds, self.discarded)
    }
}

#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: DashMap<SourceUnit, CachedSchema>,
    counters: Counters,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for `unit` if it was built at exactly `version`.
    ///
    /// The outer `Option` is hit/miss; the inner one is the cached result.
    pub fn get(&self, unit: &SourceUnit, version: StructuralVersion) -> Option<Option<Arc<Schema>>> {
        let cached = self
            .entries
            .get(unit)
            .filter(|entry| entry.version == version)
            .map(|entry| entry.schema.clone());

        match &cached {
            Some(_) => self.counters.hits.fetch_add(1, Ordering::Relaxed),
            None => self.counters.misses.fetch_add(1, Ordering::Relaxed),
        };
        cached
    }

    /// Install a result built at `version` and return the result callers
    /// should see.
    ///
    /// An entry already installed for the same version wins over a
    /// concurrently built duplicate. An entry for a newer version is never
    /// replaced by an older build; the older result is handed back to its
    /// caller without being cached.
    pub fn install(
        &self,
        unit: &SourceUnit,
        version: StructuralVersion,
        schema: Option<Arc<Schema>>,
    ) -> Option<Arc<Schema>> {
        self.counters.builds.fetch_add(1, Ordering::Relaxed);
        match self.entries.entry(unit.clone()) {
            Entry::Occupied(mut occupied) => {
                let cached = occupied.get().version;
                if cached == version {
                    occupied.get().schema.clone()
                } else if cached > version {
                    tracing::debug!(
                        "Not caching schema for {} at {}: {} already cached",
                        unit, version, cached
                    );
                    schema
                } else {
                    occupied.insert(CachedSchema {
                        version,
                        schema: schema.clone(),
                    });
                    schema
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CachedSchema {
                    version,
                    schema: schema.clone(),
                });
                schema
            }
        }
    }

    /// Count a build that was thrown away
    pub fn record_discarded(&self) {
        self.counters.discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop the entry for `unit`; returns whether one existed
    pub fn discard(&self, unit: &SourceUnit) -> bool {
        self.entries.remove(unit).is_some()
    }

    /// Version of the entry cached for `unit`
    pub fn cached_version(&self, unit: &SourceUnit) -> Option<StructuralVersion> {
        self.entries.get(unit).map(|entry| entry.version)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
        }
    }
}
