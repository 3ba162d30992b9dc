//! Arity-based schema resolution for delimited-text responses.
//!
//! Delimited text carries no schema identity, so the number of values is used
//! as a proxy for "same feed shape as last time". The last resolved schema is
//! kept in a single cache slot so the steady state needs no registry search.
//!
//! # Algorithm
//!
//! 1. Cached schema still in the registry with the desired field count → return it.
//! 2. Otherwise search by name and take the first candidate with the exact field count.
//! 3. No exact match → fall back to the first search result (best effort).
//! 4. No search results at all → [`SchemaError::NotFound`].
//!
//! The cache slot is an immutable snapshot swapped atomically, so concurrent
//! readers see either the old pair or the new pair, never a mix.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use arc_swap::ArcSwapOption;
use tracing::{debug, info, warn};

use crate::SchemaError;
use crate::registry::{SchemaCandidate, SchemaId, SchemaRegistry};

/// Outcome of a resolution: the schema identity and its ordered field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub id: SchemaId,
    pub fields: Vec<String>,
}

impl From<SchemaCandidate> for ResolvedSchema {
    fn from(c: SchemaCandidate) -> Self {
        Self {
            id: c.id,
            fields: c.fields,
        }
    }
}

/// Contents of the cache slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSchema {
    pub id: SchemaId,
    pub field_count: usize,
    /// Increases with every store.
    pub version: u64,
}

pub struct SchemaResolver {
    registry: Arc<dyn SchemaRegistry>,
    cache: ArcSwapOption<CachedSchema>,
    version: AtomicU64,
    /// Schemas this resolver created, deleted again by [`purge_created`](Self::purge_created).
    created: Mutex<Vec<SchemaId>>,
    /// Shared by lookups, exclusive for purge.
    gate: RwLock<()>,
    /// Set by purge; no schema is created afterwards.
    closed: AtomicBool,
}

impl SchemaResolver {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            cache: ArcSwapOption::empty(),
            version: AtomicU64::new(0),
            created: Mutex::new(Vec::new()),
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }

    /// Current cache snapshot, if any.
    pub fn cached(&self) -> Option<Arc<CachedSchema>> {
        self.cache.load_full()
    }

    /// Find the schema called `name` whose field count is `desired_fields`.
    pub fn resolve(
        &self,
        desired_fields: usize,
        name: &str,
    ) -> Result<ResolvedSchema, SchemaError> {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(hit) = self.cache_hit(desired_fields)? {
            debug!(id = %hit.id, fields = desired_fields, "schema cache hit");
            return Ok(hit);
        }

        let mut candidates = self.registry.search_by_name(name)?;
        let exact = candidates
            .iter()
            .position(|c| c.field_count() == desired_fields);
        let chosen = match exact {
            Some(idx) => candidates.swap_remove(idx),
            None if candidates.is_empty() => {
                return Err(SchemaError::NotFound(name.to_string()));
            }
            None => {
                let first = candidates.swap_remove(0);
                warn!(
                    schema = name,
                    id = %first.id,
                    wanted = desired_fields,
                    found = first.field_count(),
                    "no schema with matching field count, using first candidate"
                );
                first
            }
        };

        self.store(&chosen);
        Ok(chosen.into())
    }

    /// Return a schema called `name` with `fields.len()` fields, creating it when absent.
    ///
    /// Created schemas are remembered and removed by [`purge_created`](Self::purge_created).
    /// Once purged, the resolver is closed and this fails with [`SchemaError::Closed`].
    pub fn ensure_created(
        &self,
        name: &str,
        fields: Vec<String>,
    ) -> Result<ResolvedSchema, SchemaError> {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::Acquire) {
            return Err(SchemaError::Closed);
        }
        // Held across search and create so two workers never create the same shape.
        let mut created = self.created.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self
            .registry
            .search_by_name(name)?
            .into_iter()
            .find(|c| c.field_count() == fields.len());
        if let Some(candidate) = existing {
            return Ok(candidate.into());
        }

        let candidate = self.registry.create(name, fields)?;
        info!(id = %candidate.id, schema = name, fields = candidate.field_count(), "created schema");
        created.push(candidate.id.clone());
        Ok(candidate.into())
    }

    /// Delete every schema created through this resolver, clear the cache,
    /// and close the resolver to further creation.
    ///
    /// Waits for in-progress lookups to finish and blocks new ones until done.
    /// Returns the number of schemas deleted.
    pub fn purge_created(&self) -> usize {
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        self.closed.store(true, Ordering::Release);
        let ids: Vec<SchemaId> = self
            .created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let mut deleted = 0;
        for id in &ids {
            match self.registry.delete(id) {
                Ok(()) => deleted += 1,
                Err(e) => warn!(id = %id, error = %e, "failed to delete created schema"),
            }
        }
        self.cache.store(None);
        info!(deleted, "purged created schemas");
        deleted
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn cache_hit(&self, desired_fields: usize) -> Result<Option<ResolvedSchema>, SchemaError> {
        let Some(snapshot) = self.cache.load_full() else {
            return Ok(None);
        };
        match self.registry.get(&snapshot.id)? {
            Some(candidate) if candidate.field_count() == desired_fields => {
                Ok(Some(candidate.into()))
            }
            _ => Ok(None),
        }
    }

    fn store(&self, candidate: &SchemaCandidate) {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        self.cache.store(Some(Arc::new(CachedSchema {
            id: candidate.id.clone(),
            field_count: candidate.field_count(),
            version,
        })));
    }
}
