//! Batch enrichment over a table of records.
//!
//! For one key column (city, artist) the enricher:
//! 1. collects candidate names from the records (optionally filtered)
//! 2. keeps the ones the mapping does not know yet
//! 3. resolves each through a provider fallback chain
//! 4. merges every `Found` into the mapping, saving after each merge
//! 5. maps every record to its attribute values
//!
//! Names are looked up one at a time; the per-provider rate limiters in
//! the lookup service do the pacing. A run can be cancelled at any point;
//! merges already saved stay saved.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};

use crate::enrichment::domain::{AttributeResult, EntityName, ProviderId};
use crate::enrichment::service::{LookupOptions, LookupService};
use crate::mapping::{MappingError, MappingStore};
use crate::records::{RecordFilter, Table};

/// Whether a run may write the mapping file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Apply,
    /// Look everything up, persist nothing
    DryRun,
}

/// What to enrich and how
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Shown in progress output ("cities", "artists")
    pub label: String,
    /// Column holding the entity name
    pub key_field: String,
    /// Providers in fallback order
    pub providers: Vec<ProviderId>,
    /// Only records matching this take part
    pub filter: Option<RecordFilter>,
    pub options: LookupOptions,
}

impl BatchJob {
    pub fn new(label: impl Into<String>, key_field: impl Into<String>, providers: Vec<ProviderId>) -> Self {
        Self {
            label: label.into(),
            key_field: key_field.into(),
            providers,
            filter: None,
            options: LookupOptions::default(),
        }
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_options(mut self, options: LookupOptions) -> Self {
        self.options = options;
        self
    }
}

/// Progress notifications, one or two per looked-up name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Started {
        label: String,
        name: EntityName,
        /// 1-based
        index: usize,
        total: usize,
    },
    Resolved {
        label: String,
        name: EntityName,
        values: Vec<String>,
        provider: Option<ProviderId>,
    },
    Unresolved {
        label: String,
        name: EntityName,
        reason: String,
    },
}

/// A name no provider could resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub name: EntityName,
    pub reason: String,
}

/// Run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Distinct names in the key column
    pub candidates: usize,
    pub already_mapped: usize,
    pub looked_up: usize,
    pub merged: usize,
    pub unresolved: usize,
    /// Records that ended up with a value
    pub rows_enriched: usize,
    pub rows_unmapped: usize,
}

/// Result of [`BatchEnricher::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// One entry per input record, in order; `None` when unmapped or filtered out
    pub attributes: Vec<Option<Vec<String>>>,
    /// Entries added or changed in the mapping by this run
    pub merged: Vec<(EntityName, Vec<String>)>,
    pub unresolved: Vec<Unresolved>,
    pub summary: BatchSummary,
    /// Stopped early by the cancel signal
    pub cancelled: bool,
}

/// Distinct non-blank key values of records passing the filter, in order.
pub fn candidate_names(table: &Table, job: &BatchJob) -> Vec<EntityName> {
    let mut seen = std::collections::HashSet::new();
    table
        .records()
        .iter()
        .filter(|r| job.filter.as_ref().is_none_or(|f| f.matches(r)))
        .filter_map(|r| r.get(&job.key_field))
        .filter(|key| seen.insert(key.to_string()))
        .filter_map(|key| EntityName::new(key).ok())
        .collect()
}

/// Resolves when `cancel` flips to true; never if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let closed = cancel.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Drives lookups for a table and folds the answers into a mapping
pub struct BatchEnricher {
    service: Arc<LookupService>,
    store: MappingStore,
    progress: Option<mpsc::UnboundedSender<BatchEvent>>,
}

impl BatchEnricher {
    pub fn new(service: Arc<LookupService>, store: MappingStore) -> Self {
        Self {
            service,
            store,
            progress: None,
        }
    }

    /// Send a [`BatchEvent`] per name to `sender`.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<BatchEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    pub fn into_store(self) -> MappingStore {
        self.store
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(progress) = &self.progress {
            // A dropped receiver just means nobody is watching
            let _ = progress.send(event);
        }
    }

    /// Enrich `table` according to `job`.
    ///
    /// In [`RunMode::Apply`] every merge is saved before the next lookup
    /// starts. In [`RunMode::DryRun`] lookups still happen (and land in the
    /// lookup cache) but the mapping file is never written; the returned
    /// attributes show what an apply run would produce.
    pub async fn run(
        &mut self,
        table: &Table,
        job: &BatchJob,
        mode: RunMode,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<BatchOutcome, MappingError> {
        let candidates = candidate_names(table, job);
        let pending = self.store.unmapped(&candidates);

        let mut summary = BatchSummary {
            candidates: candidates.len(),
            already_mapped: candidates.len() - pending.len(),
            ..BatchSummary::default()
        };
        tracing::info!(
            "{}: {} distinct names, {} already mapped, {} to look up",
            job.label,
            summary.candidates,
            summary.already_mapped,
            pending.len()
        );

        let mut scratch = match mode {
            RunMode::Apply => None,
            RunMode::DryRun => Some(self.store.clone()),
        };

        let mut merged = Vec::new();
        let mut unresolved = Vec::new();
        let mut was_cancelled = false;

        for (index, name) in pending.iter().enumerate() {
            if *cancel.borrow() {
                was_cancelled = true;
                break;
            }

            self.emit(BatchEvent::Started {
                label: job.label.clone(),
                name: name.clone(),
                index: index + 1,
                total: pending.len(),
            });

            let outcome = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    was_cancelled = true;
                    break;
                }
                outcome = self.service.fallback_with(name, &job.providers, job.options) => outcome,
            };
            summary.looked_up += 1;

            match outcome.result {
                AttributeResult::Found(values) => {
                    let store = scratch.as_mut().unwrap_or(&mut self.store);
                    let changed = store.merge(name, &values);
                    if changed && mode == RunMode::Apply {
                        store.save()?;
                    }
                    if changed {
                        merged.push((name.clone(), values.clone()));
                    }

                    tracing::debug!(
                        "{}: {} -> {} ({})",
                        job.label,
                        name,
                        values.join(", "),
                        outcome.provider.map(|p| p.as_str()).unwrap_or("?")
                    );
                    self.emit(BatchEvent::Resolved {
                        label: job.label.clone(),
                        name: name.clone(),
                        values,
                        provider: outcome.provider,
                    });
                }
                _ => {
                    let reason = outcome.reason();
                    tracing::debug!("{}: {} unresolved ({})", job.label, name, reason);
                    self.emit(BatchEvent::Unresolved {
                        label: job.label.clone(),
                        name: name.clone(),
                        reason: reason.clone(),
                    });
                    unresolved.push(Unresolved {
                        name: name.clone(),
                        reason,
                    });
                }
            }
        }

        if was_cancelled {
            tracing::warn!(
                "{}: cancelled after {} of {} lookups",
                job.label,
                summary.looked_up,
                pending.len()
            );
        }

        if mode == RunMode::Apply && self.store.is_dirty() {
            self.store.save()?;
        }

        let store = scratch.as_ref().unwrap_or(&self.store);
        let attributes: Vec<Option<Vec<String>>> = table
            .records()
            .iter()
            .map(|record| {
                if job.filter.as_ref().is_some_and(|f| !f.matches(record)) {
                    return None;
                }
                store.apply(record, &job.key_field).map(<[String]>::to_vec)
            })
            .collect();

        summary.merged = merged.len();
        summary.unresolved = unresolved.len();
        summary.rows_enriched = attributes.iter().filter(|a| a.is_some()).count();
        summary.rows_unmapped = attributes.len() - summary.rows_enriched;

        Ok(BatchOutcome {
            attributes,
            merged,
            unresolved,
            summary,
            cancelled: was_cancelled,
        })
    }
}

/// Run several jobs over the same table at once, one enricher per job.
///
/// Jobs should use disjoint provider chains; each enricher owns its own
/// mapping file.
pub async fn run_concurrent(
    runs: Vec<(&mut BatchEnricher, &BatchJob)>,
    table: &Table,
    mode: RunMode,
    cancel: &watch::Receiver<bool>,
) -> Vec<Result<BatchOutcome, MappingError>> {
    join_all(
        runs.into_iter()
            .map(|(enricher, job)| enricher.run(table, job, mode, cancel.clone())),
    )
    .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::enrichment::domain::ProviderError;
    use crate::enrichment::service::RetryPolicy;
    use crate::enrichment::traits::mocks::{MockProvider, TableProvider};
    use crate::test_utils::{sample_concerts, temp_cache};

    fn city_job() -> BatchJob {
        BatchJob::new("cities", "City", vec![ProviderId::Nominatim])
            .with_filter(RecordFilter::new("Country", "United States"))
    }

    /// A cancel signal whose sender is already gone
    fn no_cancel() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    fn geocoder() -> Arc<TableProvider> {
        Arc::new(TableProvider::new(
            ProviderId::Nominatim,
            &[
                ("Las Vegas", &["Nevada"]),
                ("Reno", &["Nevada"]),
                ("Austin", &["Texas"]),
                ("Portland", &["Oregon"]),
            ],
        ))
    }

    #[tokio::test]
    async fn test_apply_merges_and_maps_rows() {
        let (cache, dir) = temp_cache().await;
        let provider = geocoder();
        let service = Arc::new(LookupService::new(cache).with_provider(provider.clone()));
        let path = dir.path().join("city_state_mapping.json");
        let mut enricher = BatchEnricher::new(service, MappingStore::load(&path).unwrap());

        let outcome = enricher
            .run(&sample_concerts(), &city_job(), RunMode::Apply, no_cancel())
            .await
            .unwrap();

        // Las Vegas, Reno, Austin, Gotham (Montreal is filtered out)
        assert_eq!(outcome.summary.candidates, 4);
        assert_eq!(outcome.summary.looked_up, 4);
        assert_eq!(outcome.summary.merged, 3);
        assert_eq!(outcome.unresolved.len(), 1);
        assert_eq!(outcome.unresolved[0].name.as_str(), "Gotham");
        assert!(outcome.unresolved[0].reason.contains("not found"));
        assert!(!outcome.cancelled);

        assert_eq!(
            outcome.attributes,
            vec![
                Some(vec!["Nevada".to_string()]),
                Some(vec!["Nevada".to_string()]),
                None, // Montreal, filtered
                Some(vec!["Texas".to_string()]),
                None, // Gotham, unresolved
                None, // blank city
                Some(vec!["Nevada".to_string()]),
            ]
        );
        assert_eq!(outcome.summary.rows_enriched, 4);
        assert_eq!(outcome.summary.rows_unmapped, 3);

        let saved = MappingStore::load(&path).unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved.get("Austin").unwrap(), ["Texas"]);
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn test_second_run_looks_nothing_up() {
        let (cache, dir) = temp_cache().await;
        let provider = geocoder();
        let service = Arc::new(LookupService::new(cache).with_provider(provider.clone()));
        let path = dir.path().join("mapping.json");

        let mut enricher = BatchEnricher::new(Arc::clone(&service), MappingStore::load(&path).unwrap());
        enricher
            .run(&sample_concerts(), &city_job(), RunMode::Apply, no_cancel())
            .await
            .unwrap();
        let calls_after_first = provider.calls();

        let mut again = BatchEnricher::new(service, MappingStore::load(&path).unwrap());
        let outcome = again
            .run(&sample_concerts(), &city_job(), RunMode::Apply, no_cancel())
            .await
            .unwrap();

        // Gotham is unmapped but its NotFound is cached
        assert_eq!(outcome.summary.already_mapped, 3);
        assert_eq!(outcome.summary.merged, 0);
        assert_eq!(provider.calls(), calls_after_first);
    }

    #[tokio::test]
    async fn test_manual_entries_are_not_overwritten() {
        let (cache, dir) = temp_cache().await;
        let provider = geocoder();
        let service = Arc::new(LookupService::new(cache).with_provider(provider.clone()));
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, r#"{"Las Vegas": "Nevada (manual)"}"#).unwrap();

        let mut enricher = BatchEnricher::new(service, MappingStore::load(&path).unwrap());
        let outcome = enricher
            .run(&sample_concerts(), &city_job(), RunMode::Apply, no_cancel())
            .await
            .unwrap();

        assert_eq!(outcome.attributes[0], Some(vec!["Nevada (manual)".to_string()]));
        assert_eq!(
            MappingStore::load(&path).unwrap().get("Las Vegas").unwrap(),
            ["Nevada (manual)"]
        );
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_mapping_file_untouched() {
        let (cache, dir) = temp_cache().await;
        let service = Arc::new(LookupService::new(cache).with_provider(geocoder()));
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, "{\n  \"Reno\": \"Nevada\"\n}").unwrap();
        let before = std::fs::read(&path).unwrap();

        let mut enricher = BatchEnricher::new(service, MappingStore::load(&path).unwrap());
        let outcome = enricher
            .run(&sample_concerts(), &city_job(), RunMode::DryRun, no_cancel())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(!enricher.store().is_dirty());
        assert_eq!(enricher.store().len(), 1);
        // The preview still shows what an apply run would produce
        assert_eq!(outcome.summary.merged, 2);
        assert_eq!(outcome.attributes[3], Some(vec!["Texas".to_string()]));
    }

    #[tokio::test]
    async fn test_dry_run_without_mapping_file_creates_nothing() {
        let (cache, dir) = temp_cache().await;
        let service = Arc::new(LookupService::new(cache).with_provider(geocoder()));
        let path = dir.path().join("never.json");

        let mut enricher = BatchEnricher::new(service, MappingStore::load(&path).unwrap());
        enricher
            .run(&sample_concerts(), &city_job(), RunMode::DryRun, no_cancel())
            .await
            .unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_fatal() {
        let (cache, dir) = temp_cache().await;
        let service = Arc::new(
            LookupService::new(cache)
                .with_retry_policy(RetryPolicy::none())
                .with_provider(Arc::new(MockProvider::failing(
                    ProviderId::MusicBrainz,
                    ProviderError::Transient("connection reset".into()),
                )))
                .with_provider(Arc::new(MockProvider::found(ProviderId::LastFm, &["rock"]))),
        );
        let job = BatchJob::new(
            "artists",
            "Artist",
            vec![ProviderId::MusicBrainz, ProviderId::LastFm],
        );
        let mut enricher =
            BatchEnricher::new(service, MappingStore::new(dir.path().join("genres.json")));

        let outcome = enricher
            .run(&sample_concerts(), &job, RunMode::Apply, no_cancel())
            .await
            .unwrap();

        // Every artist falls through to Last.fm
        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.summary.merged, outcome.summary.candidates);
        assert!(outcome.attributes.iter().all(|a| a.is_some()));
    }

    #[tokio::test]
    async fn test_progress_events() {
        let (cache, dir) = temp_cache().await;
        let service = Arc::new(LookupService::new(cache).with_provider(geocoder()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut enricher =
            BatchEnricher::new(service, MappingStore::new(dir.path().join("m.json")))
                .with_progress(tx);

        enricher
            .run(&sample_concerts(), &city_job(), RunMode::Apply, no_cancel())
            .await
            .unwrap();
        drop(enricher);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), 8);
        assert!(matches!(
            &events[0],
            BatchEvent::Started { index: 1, total: 4, name, .. } if name.as_str() == "Las Vegas"
        ));
        assert!(matches!(
            &events[1],
            BatchEvent::Resolved { provider: Some(ProviderId::Nominatim), .. }
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            BatchEvent::Unresolved { name, .. } if name.as_str() == "Gotham"
        )));
    }

    #[tokio::test]
    async fn test_cancel_keeps_completed_merges() {
        let (cache, dir) = temp_cache().await;
        let slow = Arc::new(
            MockProvider::found(ProviderId::Nominatim, &["Somewhere"])
                .with_delay(Duration::from_millis(200)),
        );
        let service = Arc::new(LookupService::new(cache).with_provider(slow));
        let path = dir.path().join("mapping.json");
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let mut enricher =
            BatchEnricher::new(service, MappingStore::new(&path)).with_progress(progress_tx);
        let table = sample_concerts();
        let job = city_job();
        let run = tokio::spawn(async move {
            enricher.run(&table, &job, RunMode::Apply, cancel_rx).await
        });

        let mut resolved = 0;
        while let Some(event) = progress_rx.recv().await {
            if matches!(event, BatchEvent::Resolved { .. }) {
                resolved += 1;
                if resolved == 2 {
                    cancel_tx.send(true).unwrap();
                    break;
                }
            }
        }

        let outcome = run.await.unwrap().unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.summary.merged, 2);
        let saved = MappingStore::load(&path).unwrap();
        assert_eq!(saved.len(), 2);
        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|f| f.ends_with(".tmp"))
            .collect();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_run_concurrent_jobs() {
        let (cache, dir) = temp_cache().await;
        let service = Arc::new(
            LookupService::new(cache)
                .with_provider(geocoder())
                .with_provider(Arc::new(MockProvider::found(ProviderId::Spotify, &["pop"]))),
        );
        let mut cities = BatchEnricher::new(
            Arc::clone(&service),
            MappingStore::new(dir.path().join("cities.json")),
        );
        let mut artists =
            BatchEnricher::new(service, MappingStore::new(dir.path().join("artists.json")));
        let city = city_job();
        let artist = BatchJob::new("artists", "Artist", vec![ProviderId::Spotify]);

        let results = run_concurrent(
            vec![(&mut cities, &city), (&mut artists, &artist)],
            &sample_concerts(),
            RunMode::Apply,
            &no_cancel(),
        )
        .await;

        assert_eq!(results.len(), 2);
        let city_outcome = results[0].as_ref().unwrap();
        let artist_outcome = results[1].as_ref().unwrap();
        assert_eq!(city_outcome.summary.merged, 3);
        assert_eq!(artist_outcome.summary.merged, artist_outcome.summary.candidates);
        assert!(dir.path().join("cities.json").exists());
        assert!(dir.path().join("artists.json").exists());
    }

    #[test]
    fn test_candidate_names() {
        let names: Vec<_> = candidate_names(&sample_concerts(), &city_job())
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, ["Las Vegas", "Reno", "Austin", "Gotham"]);
    }
}
