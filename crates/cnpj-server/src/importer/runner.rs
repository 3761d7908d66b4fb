//! The sequential processing loop
//!
//! Walks the candidate list once, in order. Cancellation is observed only
//! at the top of each iteration, so a stop request takes effect with at
//! most one item of latency.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::events::{EventSink, ImportEvent, ProgressSnapshot};
use super::{ImportError, ImportStore, Pacer, RegistryApi};

/// Terminal status pushed when a stop request ends the run.
pub const STATUS_STOPPED: &str = "process stopped";

/// Terminal status pushed when the candidate list is exhausted.
pub const STATUS_COMPLETED: &str = "process completed";

/// Terminal status pushed when a store or API failure aborts the run.
pub const STATUS_ABORTED: &str = "process aborted";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Candidate list exhausted.
    Completed,
    /// Stop request observed before the list was exhausted.
    Stopped,
}

/// Counters for one run. Discarded when the run ends.
#[derive(Debug, Default)]
struct RunCounters {
    consulted: u64,
    total: u64,
    session_consulted: u64,
    total_final: u64,
}

impl RunCounters {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            consulted: self.consulted,
            total: self.total,
            session_consulted: self.session_consulted,
            total_sitac: self.total,
            total_final: self.total_final,
        }
    }
}

/// One import run over injected collaborators.
pub struct ImportRunner<S, A, P> {
    store: S,
    api: A,
    pacer: P,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl<S, A, P> ImportRunner<S, A, P>
where
    S: ImportStore,
    A: RegistryApi,
    P: Pacer,
{
    pub fn new(
        store: S,
        api: A,
        pacer: P,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            api,
            pacer,
            sink,
            cancel,
        }
    }

    /// Run to a terminal state, reporting failures through the sink.
    ///
    /// This is the task boundary: errors do not escape it, they become an
    /// `error` event followed by the aborted status.
    pub async fn execute(self) {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("import_run", %run_id);

        match self.run().instrument(span).await {
            Ok(RunOutcome::Completed) => info!(%run_id, "import run completed"),
            Ok(RunOutcome::Stopped) => info!(%run_id, "import run stopped"),
            Err(e) => {
                error!(%run_id, error = %e, "import run aborted");
                self.sink.emit(ImportEvent::Error {
                    message: e.to_string(),
                });
                self.sink.emit(ImportEvent::Status {
                    message: STATUS_ABORTED.to_string(),
                });
            },
        }
    }

    /// Walk the candidate list once.
    pub async fn run(&self) -> Result<RunOutcome, ImportError> {
        let candidates = self.store.candidate_cnpjs().await?;
        let existing = self.store.existing_cnpjs().await?;

        let mut counters = RunCounters {
            total: candidates.len() as u64,
            total_final: existing.len() as u64,
            ..Default::default()
        };

        info!(
            candidates = counters.total,
            imported = counters.total_final,
            "import run starting"
        );

        for cnpj in &candidates {
            if self.cancel.is_cancelled() {
                info!("stop requested, ending run early");
                self.sink.emit(ImportEvent::Status {
                    message: STATUS_STOPPED.to_string(),
                });
                return Ok(RunOutcome::Stopped);
            }

            if self.store.contains(cnpj).await? {
                debug!(%cnpj, "already imported, skipping");
                self.sink.emit(ImportEvent::Log {
                    message: format!("CNPJ {cnpj} is already in the database, skipping"),
                });
                counters.consulted += 1;
                self.sink.emit(ImportEvent::Progress(counters.snapshot()));
                continue;
            }

            match self.api.fetch(cnpj).await? {
                Some(record) => {
                    self.store.insert_company(&record).await?;
                    info!(%cnpj, "record imported");
                    // Rate limit against the registry API, not item backoff
                    self.pacer.pause().await;
                },
                None => {
                    warn!(%cnpj, "registry returned no data");
                },
            }

            counters.consulted += 1;
            counters.session_consulted += 1;
            counters.total_final += 1;
            self.sink.emit(ImportEvent::Progress(counters.snapshot()));
            self.sink.emit(ImportEvent::Log {
                message: format!("CNPJ {cnpj} imported successfully"),
            });
        }

        self.sink.emit(ImportEvent::Status {
            message: STATUS_COMPLETED.to_string(),
        });
        Ok(RunOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::api::{ApiError, CompanyRecord};
    use cnpj_common::types::Cnpj;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn cnpj(raw: &str) -> Cnpj {
        Cnpj::parse(raw).unwrap()
    }

    fn record(raw: &str) -> CompanyRecord {
        CompanyRecord::from_payload(
            &cnpj(raw),
            serde_json::json!({ "status": "OK", "nome": "Empresa Teste" }),
        )
        .unwrap()
        .unwrap()
    }

    /// Sink that records everything emitted.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ImportEvent>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<ImportEvent> {
            self.events.lock().unwrap().clone()
        }

        fn progress_snapshots(&self) -> Vec<ProgressSnapshot> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    ImportEvent::Progress(s) => Some(s),
                    _ => None,
                })
                .collect()
        }

        fn statuses(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    ImportEvent::Status { message } => Some(message),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: ImportEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// In-memory store standing in for Postgres.
    #[derive(Default)]
    struct MemoryStore {
        candidates: Vec<Cnpj>,
        existing: HashSet<String>,
        inserted: Mutex<Vec<CompanyRecord>>,
        fail_contains: bool,
    }

    impl MemoryStore {
        fn new(candidates: &[&str], existing: &[&str]) -> Self {
            Self {
                candidates: candidates.iter().map(|c| cnpj(c)).collect(),
                existing: existing.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            }
        }

        fn inserted_cnpjs(&self) -> Vec<String> {
            self.inserted
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.cnpj.to_string())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl ImportStore for Arc<MemoryStore> {
        async fn candidate_cnpjs(&self) -> Result<Vec<Cnpj>, ImportError> {
            Ok(self.candidates.clone())
        }

        async fn existing_cnpjs(&self) -> Result<Vec<Cnpj>, ImportError> {
            self.existing
                .iter()
                .map(|raw| Cnpj::parse(raw).map_err(ImportError::from))
                .collect()
        }

        async fn contains(&self, cnpj: &Cnpj) -> Result<bool, ImportError> {
            if self.fail_contains {
                return Err(ImportError::Database(sqlx::Error::Protocol(
                    "injected failure".into(),
                )));
            }
            Ok(self.existing.contains(cnpj.as_str()))
        }

        async fn insert_company(&self, record: &CompanyRecord) -> Result<(), ImportError> {
            self.inserted.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    /// Scripted registry API.
    #[derive(Default)]
    struct StubApi {
        responses: HashMap<String, Option<CompanyRecord>>,
        calls: Mutex<Vec<String>>,
        cancel_on_fetch: Option<CancellationToken>,
    }

    impl StubApi {
        fn with_record(mut self, raw: &str) -> Self {
            self.responses.insert(raw.to_string(), Some(record(raw)));
            self
        }

        fn with_empty(mut self, raw: &str) -> Self {
            self.responses.insert(raw.to_string(), None);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl RegistryApi for Arc<StubApi> {
        async fn fetch(&self, cnpj: &Cnpj) -> Result<Option<CompanyRecord>, ApiError> {
            self.calls.lock().unwrap().push(cnpj.to_string());
            if let Some(token) = &self.cancel_on_fetch {
                token.cancel();
            }
            Ok(self
                .responses
                .get(cnpj.as_str())
                .cloned()
                .unwrap_or(None))
        }
    }

    /// Pacer that counts pauses instead of sleeping.
    #[derive(Default)]
    struct CountingPacer {
        pauses: AtomicUsize,
    }

    impl CountingPacer {
        fn count(&self) -> usize {
            self.pauses.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Pacer for Arc<CountingPacer> {
        async fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        api: Arc<StubApi>,
        pacer: Arc<CountingPacer>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        fn new(store: MemoryStore, api: StubApi) -> Self {
            Self {
                store: Arc::new(store),
                api: Arc::new(api),
                pacer: Arc::new(CountingPacer::default()),
                sink: Arc::new(RecordingSink::default()),
            }
        }

        fn runner(
            &self,
            cancel: CancellationToken,
        ) -> ImportRunner<Arc<MemoryStore>, Arc<StubApi>, Arc<CountingPacer>> {
            ImportRunner::new(
                self.store.clone(),
                self.api.clone(),
                self.pacer.clone(),
                self.sink.clone(),
                cancel,
            )
        }
    }

    #[tokio::test]
    async fn test_skips_existing_and_imports_rest() {
        let h = Harness::new(
            MemoryStore::new(
                &["11111111000100", "22222222000100"],
                &["11111111000100"],
            ),
            StubApi::default().with_record("22222222000100"),
        );

        let outcome = h.runner(CancellationToken::new()).run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        // No API call for the existing identifier
        assert_eq!(h.api.calls(), vec!["22222222000100"]);
        assert_eq!(h.store.inserted_cnpjs(), vec!["22222222000100"]);
        // One pacing pause, for the one fetched record
        assert_eq!(h.pacer.count(), 1);

        let snapshots = h.sink.progress_snapshots();
        assert_eq!(snapshots.len(), 2);
        let last = snapshots.last().unwrap();
        assert_eq!(last.consulted, 2);
        assert_eq!(last.session_consulted, 1);
        assert_eq!(last.total, 2);
        assert_eq!(last.total_final, 2);
    }

    #[tokio::test]
    async fn test_one_progress_event_per_visited_item() {
        let h = Harness::new(
            MemoryStore::new(
                &["11111111000100", "22222222000100", "33333333000100"],
                &[],
            ),
            StubApi::default()
                .with_record("11111111000100")
                .with_record("22222222000100")
                .with_record("33333333000100"),
        );

        h.runner(CancellationToken::new()).run().await.unwrap();

        assert_eq!(h.sink.progress_snapshots().len(), 3);
    }

    #[tokio::test]
    async fn test_completed_status_emitted_exactly_once() {
        let h = Harness::new(
            MemoryStore::new(&["11111111000100"], &["11111111000100"]),
            StubApi::default(),
        );

        h.runner(CancellationToken::new()).run().await.unwrap();

        assert_eq!(h.sink.statuses(), vec![STATUS_COMPLETED.to_string()]);
        // Terminal status is the last event
        assert_eq!(h.sink.events().last().unwrap().name(), "status");
    }

    #[tokio::test]
    async fn test_cancelled_before_first_item_processes_nothing() {
        let h = Harness::new(
            MemoryStore::new(&["11111111000100", "22222222000100"], &[]),
            StubApi::default().with_record("11111111000100"),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = h.runner(cancel).run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Stopped);
        assert!(h.api.calls().is_empty());
        assert!(h.sink.progress_snapshots().is_empty());
        assert_eq!(h.sink.statuses(), vec![STATUS_STOPPED.to_string()]);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_stops_at_next_iteration() {
        let cancel = CancellationToken::new();
        let h = Harness::new(
            MemoryStore::new(&["11111111000100", "22222222000100"], &[]),
            StubApi {
                cancel_on_fetch: Some(cancel.clone()),
                ..Default::default()
            }
            .with_record("11111111000100"),
        );

        let outcome = h.runner(cancel).run().await.unwrap();

        // First item finished, second never started
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(h.api.calls(), vec!["11111111000100"]);
        assert_eq!(h.sink.progress_snapshots().len(), 1);
        let last = h.sink.events().into_iter().last().unwrap();
        assert_eq!(
            last,
            ImportEvent::Status {
                message: STATUS_STOPPED.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_api_result_skips_insert_and_pause() {
        let h = Harness::new(
            MemoryStore::new(&["11111111000100"], &[]),
            StubApi::default().with_empty("11111111000100"),
        );

        let outcome = h.runner(CancellationToken::new()).run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert!(h.store.inserted_cnpjs().is_empty());
        assert_eq!(h.pacer.count(), 0);
        // Counters still advance for the visited item
        let last = h.sink.progress_snapshots().pop().unwrap();
        assert_eq!(last.consulted, 1);
        assert_eq!(last.session_consulted, 1);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_with_error_event() {
        let h = Harness::new(
            MemoryStore {
                fail_contains: true,
                ..MemoryStore::new(&["11111111000100"], &[])
            },
            StubApi::default(),
        );

        h.runner(CancellationToken::new()).execute().await;

        let events = h.sink.events();
        assert!(matches!(
            &events[events.len() - 2],
            ImportEvent::Error { .. }
        ));
        assert_eq!(
            events.last().unwrap(),
            &ImportEvent::Status {
                message: STATUS_ABORTED.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_event_order_for_skipped_item_is_log_then_progress() {
        let h = Harness::new(
            MemoryStore::new(&["11111111000100"], &["11111111000100"]),
            StubApi::default(),
        );

        h.runner(CancellationToken::new()).run().await.unwrap();

        let names: Vec<_> = h.sink.events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["log", "progress", "status"]);
    }
}
