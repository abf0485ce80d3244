use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::notices::clock::ManualClock;
use crate::notices::domain::{NoticeKind, Notification, NotificationId, Severity};
use crate::notices::ledger::DismissalLedger;
use crate::notices::orchestrator::{NoticeSnapshot, NotificationOrchestrator, PollSettings};
use crate::notices::source::{FetchError, NotificationSource};
use crate::notices::store::{MemorySessionStore, SessionStore, StoreError};

pub(super) type TestOrchestrator = NotificationOrchestrator<ScriptedSource, MemorySessionStore>;

/// Memory-backed store whose reads and writes can be switched off.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemorySessionStore,
    pub(crate) fail_reads: AtomicBool,
    pub(crate) fail_writes: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn failing_writes() -> Self {
        let store = Self::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }
}

impl SessionStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("storage disabled".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("quota exceeded".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

struct Step {
    delay: Duration,
    result: Result<Vec<Notification>, FetchError>,
}

/// Source that replays queued responses, each after its own delay. Once the
/// queue is drained it answers with an empty batch.
#[derive(Default)]
pub(super) struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub(super) fn respond(&self, delay: Duration, notices: Vec<Notification>) -> &Self {
        self.push(delay, Ok(notices))
    }

    pub(super) fn fail(&self, delay: Duration, error: FetchError) -> &Self {
        self.push(delay, Err(error))
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(&self, delay: Duration, result: Result<Vec<Notification>, FetchError>) -> &Self {
        self.steps
            .lock()
            .expect("script mutex poisoned")
            .push_back(Step { delay, result });
        self
    }
}

#[async_trait]
impl NotificationSource for ScriptedSource {
    async fn fetch(&self) -> Result<Vec<Notification>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().expect("script mutex poisoned").pop_front();
        match step {
            Some(Step { delay, result }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Ok(Vec::new()),
        }
    }
}

pub(super) struct Harness {
    pub(super) orchestrator: Arc<TestOrchestrator>,
    pub(super) source: Arc<ScriptedSource>,
    pub(super) store: Arc<MemorySessionStore>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0)
        .single()
        .expect("valid start time")
}

pub(super) fn settings() -> PollSettings {
    PollSettings {
        poll_interval: Duration::from_secs(60),
        fetch_timeout: Duration::from_secs(10),
    }
}

pub(super) fn harness() -> Harness {
    let source = Arc::new(ScriptedSource::default());
    let store = Arc::new(MemorySessionStore::default());
    let clock = Arc::new(ManualClock::new(start_time()));
    let ledger = DismissalLedger::new(store.clone(), clock.clone());
    let orchestrator = Arc::new(NotificationOrchestrator::new(
        source.clone(),
        ledger,
        settings(),
    ));

    Harness {
        orchestrator,
        source,
        store,
        clock,
    }
}

pub(super) fn notice(id: &str) -> Notification {
    Notification {
        id: NotificationId::from(id),
        kind: NoticeKind::Announcement,
        severity: Severity::Info,
        title: format!("Notice {id}"),
        message: Some("Scheduled work this weekend.".to_string()),
        dismissible: true,
        metadata: BTreeMap::new(),
    }
}

pub(super) fn pinned(id: &str) -> Notification {
    Notification {
        dismissible: false,
        ..notice(id)
    }
}

pub(super) fn disruption(id: &str, severity: Severity) -> Notification {
    Notification {
        kind: NoticeKind::ServiceDisruption,
        severity,
        ..notice(id)
    }
}

pub(super) fn visible_ids(snapshot: &NoticeSnapshot) -> Vec<String> {
    snapshot
        .visible
        .iter()
        .map(|notice| notice.id.0.clone())
        .collect()
}

pub(super) fn spawn_refresh(orchestrator: &Arc<TestOrchestrator>) -> tokio::task::JoinHandle<bool> {
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move { orchestrator.refresh().await })
}
