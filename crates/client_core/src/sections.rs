//! Independent report sections backed by a durable cache.
//!
//! Each section is its own [`QueryUnit`]. Cached payloads are restored before
//! any network call; every applied success is merged back into the cache
//! document under the section's key.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::{
    domain::{BrandId, SectionKind},
    protocol::SectionPayload,
};
use storage::DocumentStore;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    query::{QueryState, QueryStatus, QueryUnit, Settled},
    SectionGenerator,
};

/// One cache entry: the last successful payload of a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

pub fn cache_document_name(brand_id: &BrandId) -> String {
    format!("suggestions-cache/{brand_id}")
}

type SectionUnit = QueryUnit<BrandId, SectionPayload>;

pub struct SectionOrchestrator {
    brand_id: BrandId,
    generator: Arc<dyn SectionGenerator>,
    store: Arc<dyn DocumentStore>,
    sections: BTreeMap<SectionKind, SectionUnit>,
    generated_at: Mutex<BTreeMap<SectionKind, DateTime<Utc>>>,
    // read-modify-write of the cache document must not interleave
    cache_lock: Mutex<()>,
}

impl SectionOrchestrator {
    /// Builds the orchestrator and restores every cached section as a
    /// success. No network call is made.
    pub async fn restore(
        brand_id: BrandId,
        kinds: &[SectionKind],
        generator: Arc<dyn SectionGenerator>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let sections = kinds
            .iter()
            .map(|kind| (*kind, section_unit(Arc::clone(&generator), *kind)))
            .collect();
        let orchestrator = Self {
            brand_id,
            generator,
            store,
            sections,
            generated_at: Mutex::new(BTreeMap::new()),
            cache_lock: Mutex::new(()),
        };
        orchestrator.restore_cached().await;
        orchestrator
    }

    async fn restore_cached(&self) {
        let document_name = cache_document_name(&self.brand_id);
        let document = match self.store.load_document(&document_name).await {
            Ok(Some(Value::Object(document))) => document,
            Ok(Some(_)) => {
                warn!(document = %document_name, "section cache is not an object; ignoring it");
                return;
            }
            Ok(None) => return,
            Err(err) => {
                warn!(document = %document_name, "failed to read section cache: {err:#}");
                return;
            }
        };

        let mut restored = 0usize;
        for (kind, unit) in &self.sections {
            let Some(raw) = document.get(kind.key()) else {
                continue;
            };
            let decoded = serde_json::from_value::<CacheRecord>(raw.clone()).and_then(|record| {
                SectionPayload::decode(*kind, record.payload).map(|payload| (payload, record.timestamp))
            });
            match decoded {
                Ok((payload, timestamp)) => {
                    unit.seed(self.brand_id.clone(), payload).await;
                    self.generated_at.lock().await.insert(*kind, timestamp);
                    restored += 1;
                }
                Err(err) => {
                    warn!(section = %kind, "dropping unreadable cache entry: {err}");
                }
            }
        }
        info!(brand = %self.brand_id, restored, "restored cached sections");
    }

    pub fn brand_id(&self) -> &BrandId {
        &self.brand_id
    }

    pub fn kinds(&self) -> impl Iterator<Item = SectionKind> + '_ {
        self.sections.keys().copied()
    }

    pub fn state(&self, kind: SectionKind) -> Option<QueryState<SectionPayload>> {
        self.sections.get(&kind).map(SectionUnit::state)
    }

    pub fn states(&self) -> Vec<(SectionKind, QueryState<SectionPayload>)> {
        self.sections
            .iter()
            .map(|(kind, unit)| (*kind, unit.state()))
            .collect()
    }

    pub fn subscribe(&self, kind: SectionKind) -> Option<watch::Receiver<QueryState<SectionPayload>>> {
        self.sections.get(&kind).map(SectionUnit::subscribe)
    }

    pub async fn generated_at(&self, kind: SectionKind) -> Option<DateTime<Utc>> {
        self.generated_at.lock().await.get(&kind).copied()
    }

    /// Partial results are shown as soon as any section has data.
    pub fn has_any_data(&self) -> bool {
        self.sections.values().any(|unit| unit.state().has_data())
    }

    pub fn failed_sections(&self) -> Vec<SectionKind> {
        self.sections
            .iter()
            .filter(|(_, unit)| unit.state().status == QueryStatus::Error)
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Fires every section concurrently. A failing section never blocks or
    /// cancels the others.
    pub async fn generate_all(&self) -> Vec<(SectionKind, Settled<SectionPayload>)> {
        let kinds: Vec<_> = self.kinds().collect();
        self.run_sections(&kinds, false).await
    }

    /// Like [`generate_all`](Self::generate_all) but asks the service for fresh
    /// output, overwriting cached entries on success.
    pub async fn regenerate_all(&self) -> Vec<(SectionKind, Settled<SectionPayload>)> {
        let kinds: Vec<_> = self.kinds().collect();
        self.run_sections(&kinds, true).await
    }

    /// Generates only the sections that have nothing to show yet.
    pub async fn generate_missing(&self) -> Vec<(SectionKind, Settled<SectionPayload>)> {
        let missing: Vec<_> = self
            .sections
            .iter()
            .filter(|(_, unit)| !unit.state().has_data())
            .map(|(kind, _)| *kind)
            .collect();
        if missing.is_empty() {
            debug!(brand = %self.brand_id, "every section already has data");
            return Vec::new();
        }
        self.run_sections(&missing, false).await
    }

    /// Re-runs one section, leaving the others untouched. Returns `None` for a
    /// section this orchestrator does not manage.
    pub async fn retry(&self, kind: SectionKind) -> Option<Settled<SectionPayload>> {
        if !self.sections.contains_key(&kind) {
            return None;
        }
        Some(self.run_section(kind, false).await)
    }

    async fn run_sections(
        &self,
        kinds: &[SectionKind],
        force_refresh: bool,
    ) -> Vec<(SectionKind, Settled<SectionPayload>)> {
        info!(brand = %self.brand_id, sections = kinds.len(), force_refresh, "generating sections");
        join_all(kinds.iter().map(|kind| async move {
            (*kind, self.run_section(*kind, force_refresh).await)
        }))
        .await
    }

    async fn run_section(&self, kind: SectionKind, force_refresh: bool) -> Settled<SectionPayload> {
        let Some(unit) = self.sections.get(&kind) else {
            return Settled::Disabled;
        };

        let settled = if force_refresh {
            let generator = Arc::clone(&self.generator);
            unit.fetch_with(self.brand_id.clone(), move |brand_id| async move {
                generator.generate_section(&brand_id, kind, true).await
            })
            .await
        } else {
            unit.set_dependency(self.brand_id.clone(), true).await
        };

        match &settled {
            Settled::Applied(state) => match (state.status, &state.data) {
                (QueryStatus::Success, Some(payload)) => {
                    info!(section = %kind, items = payload.item_count(), "section generated");
                    self.persist(kind, payload).await;
                }
                _ => {
                    warn!(
                        section = %kind,
                        error = state.error.as_deref().unwrap_or_default(),
                        kept_previous = state.data.is_some(),
                        "section failed"
                    );
                }
            },
            Settled::Superseded => debug!(section = %kind, "section response superseded"),
            Settled::Disabled => {}
        }
        settled
    }

    async fn persist(&self, kind: SectionKind, payload: &SectionPayload) {
        let _guard = self.cache_lock.lock().await;
        let document_name = cache_document_name(&self.brand_id);

        let mut document = match self.store.load_document(&document_name).await {
            Ok(Some(Value::Object(document))) => document,
            Ok(_) => Map::new(),
            Err(err) => {
                // writing now could drop other sections' entries
                warn!(section = %kind, "skipping cache write, read failed: {err:#}");
                return;
            }
        };

        let timestamp = Utc::now();
        let record = match payload.to_value().and_then(|payload| {
            serde_json::to_value(CacheRecord {
                payload,
                timestamp,
            })
        }) {
            Ok(record) => record,
            Err(err) => {
                warn!(section = %kind, "failed to encode cache entry: {err}");
                return;
            }
        };
        document.insert(kind.key().to_string(), record);

        if let Err(err) = self
            .store
            .save_document(&document_name, &Value::Object(document))
            .await
        {
            warn!(section = %kind, "failed to write section cache: {err:#}");
            return;
        }
        self.generated_at.lock().await.insert(kind, timestamp);
    }
}

/// Unit whose own fetcher serves plain runs; forced runs pass their own
/// operation to `fetch_with`.
fn section_unit(generator: Arc<dyn SectionGenerator>, kind: SectionKind) -> SectionUnit {
    QueryUnit::new(move |brand_id: BrandId| {
        let generator = Arc::clone(&generator);
        async move { generator.generate_section(&brand_id, kind, false).await }
    })
}

#[cfg(test)]
#[path = "tests/sections_tests.rs"]
mod tests;
