use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::classifier::{classify, BannerView};
use super::domain::{dedupe_by_id, Notification, NotificationId};
use super::ledger::DismissalLedger;
use super::source::{FetchError, NotificationSource, DEFAULT_FETCH_TIMEOUT};
use super::store::SessionStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(60_000);

/// What the rendering layer sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoticeSnapshot {
    pub visible: Vec<Notification>,
    pub is_loading: bool,
}

impl Default for NoticeSnapshot {
    fn default() -> Self {
        Self {
            visible: Vec::new(),
            is_loading: true,
        }
    }
}

impl NoticeSnapshot {
    pub fn banner(&self) -> BannerView {
        classify(&self.visible)
    }

    /// True while nothing should occupy banner space.
    pub fn is_blank(&self) -> bool {
        self.is_loading || self.visible.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Polls a [`NotificationSource`], hides dismissed notices and publishes the
/// visible set on a watch channel.
///
/// Every fetch takes a sequence number when it starts. A result is applied
/// only if no later fetch has started in the meantime and the polling loop has
/// not been stopped, so results land in start order even when responses
/// arrive out of order.
pub struct NotificationOrchestrator<S, K> {
    source: Arc<S>,
    ledger: DismissalLedger<K>,
    settings: PollSettings,
    batch: Mutex<Vec<Notification>>,
    snapshot: watch::Sender<NoticeSnapshot>,
    started: AtomicU64,
    activation: Mutex<Option<Arc<AtomicBool>>>,
}

impl<S, K> NotificationOrchestrator<S, K>
where
    S: NotificationSource + 'static,
    K: SessionStore + 'static,
{
    pub fn new(source: Arc<S>, ledger: DismissalLedger<K>, settings: PollSettings) -> Self {
        let (snapshot, _) = watch::channel(NoticeSnapshot::default());
        Self {
            source,
            ledger,
            settings,
            batch: Mutex::new(Vec::new()),
            snapshot,
            started: AtomicU64::new(0),
            activation: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<NoticeSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> NoticeSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn is_visible(&self, id: &NotificationId) -> bool {
        self.snapshot
            .borrow()
            .visible
            .iter()
            .any(|notice| &notice.id == id)
    }

    /// Fetches immediately, then once per poll interval until the returned
    /// handle is stopped or dropped. Activating again supersedes the previous
    /// handle: its loop ends and its in-flight fetches are discarded.
    pub fn activate(self: &Arc<Self>) -> PollHandle {
        let stopped = Arc::new(AtomicBool::new(false));
        let previous = self
            .activation
            .lock()
            .expect("activation mutex poisoned")
            .replace(Arc::clone(&stopped));
        if let Some(previous) = previous {
            if !previous.swap(true, Ordering::AcqRel) {
                debug!("notice polling re-activated; previous loop superseded");
            }
        }

        let this = Arc::clone(self);
        let flag = Arc::clone(&stopped);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.settings.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                let fetch = Arc::clone(&this);
                let activation = Arc::clone(&flag);
                tokio::spawn(async move {
                    fetch.fetch_and_apply(Some(activation)).await;
                });
            }
        });

        PollHandle { task, stopped }
    }

    /// Runs one fetch and applies it unless it went stale or polling was
    /// stopped meanwhile. Returns whether the result was applied.
    pub async fn refresh(&self) -> bool {
        let activation = self
            .activation
            .lock()
            .expect("activation mutex poisoned")
            .clone();
        self.fetch_and_apply(activation).await
    }

    async fn fetch_and_apply(&self, activation: Option<Arc<AtomicBool>>) -> bool {
        let seq = self.started.fetch_add(1, Ordering::AcqRel) + 1;

        let outcome = match tokio::time::timeout(self.settings.fetch_timeout, self.source.fetch())
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.settings.fetch_timeout)),
        };

        let mut batch = self.batch.lock().expect("notice batch mutex poisoned");

        if activation.is_some_and(|stopped| stopped.load(Ordering::Acquire)) {
            debug!(seq, "polling stopped; dropping notice fetch");
            return false;
        }
        let latest = self.started.load(Ordering::Acquire);
        if latest != seq {
            debug!(seq, latest, "newer notice fetch started; dropping stale result");
            return false;
        }

        let fetched = match outcome {
            Ok(notices) => dedupe_by_id(notices),
            Err(err) => {
                warn!(error = %err, "notice fetch failed; showing none this cycle");
                Vec::new()
            }
        };

        *batch = fetched;
        self.publish(&batch);
        debug!(seq, count = batch.len(), "notice batch applied");
        true
    }

    /// Hides a dismissible, currently visible notice and records the
    /// dismissal. Returns `false` without side effects otherwise.
    pub fn dismiss(&self, id: &NotificationId) -> bool {
        let batch = self.batch.lock().expect("notice batch mutex poisoned");

        let dismissible = batch
            .iter()
            .find(|notice| &notice.id == id)
            .is_some_and(|notice| notice.dismissible);
        if !dismissible {
            debug!(%id, "ignoring dismissal of unknown or pinned notice");
            return false;
        }

        let removed = self.snapshot.send_if_modified(|snapshot| {
            let before = snapshot.visible.len();
            snapshot.visible.retain(|notice| &notice.id != id);
            snapshot.visible.len() != before
        });
        if !removed {
            return false;
        }

        self.ledger.dismiss(id);
        true
    }

    /// Forgets every dismissal and shows the current batch again.
    pub fn reset_dismissals(&self) {
        let batch = self.batch.lock().expect("notice batch mutex poisoned");
        self.ledger.reset();
        if !self.snapshot.borrow().is_loading {
            self.publish(&batch);
        }
    }

    fn publish(&self, batch: &[Notification]) {
        let dismissed = self.ledger.load();
        let visible: Vec<Notification> = batch
            .iter()
            .filter(|notice| !notice.dismissible || !dismissed.contains(&notice.id))
            .cloned()
            .collect();

        let next = NoticeSnapshot {
            visible,
            is_loading: false,
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// Keeps the polling loop alive. Stopping or dropping it ends polling and
/// discards any fetch still in flight.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
    stopped: Arc<AtomicBool>,
}

impl PollHandle {
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.task.abort();
    }
}
