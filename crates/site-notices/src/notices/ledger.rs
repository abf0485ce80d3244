use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::clock::Clock;
use super::domain::NotificationId;
use super::store::{SessionStore, StoreError};

/// Session storage key holding the dismissal log.
pub const DISMISSAL_STORAGE_KEY: &str = "dismissed-site-notifications";

/// How long a dismissal hides its notice, in seconds.
pub const DEFAULT_DISMISSAL_TTL_SECS: i64 = 600;

/// Persisted form of one dismissal: `{ "id": "...", "at": <epoch millis> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DismissalRecord {
    pub id: NotificationId,
    #[serde(rename = "at")]
    pub dismissed_at_ms: i64,
}

impl DismissalRecord {
    pub fn dismissed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.dismissed_at_ms).single()
    }

    fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.dismissed_at() {
            Some(at) => now - at <= ttl,
            None => false,
        }
    }
}

/// Time-bounded memory of the notices a viewer has dismissed.
///
/// Every read and every write prunes expired records from the store. Storage
/// failures are logged and swallowed. The ledger also remembers each
/// dismissal in memory with its timestamp, and that view is merged into every
/// load, so a dismissal whose write failed stays hidden on the current page
/// until its TTL runs out.
pub struct DismissalLedger<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    dismissed: Mutex<HashMap<NotificationId, i64>>,
}

impl<S> DismissalLedger<S>
where
    S: SessionStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(store, clock, Duration::seconds(DEFAULT_DISMISSAL_TTL_SECS))
    }

    pub fn with_ttl(store: Arc<S>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            dismissed: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reads the log, merges it with the in-memory view, drops expired
    /// records, rewrites the survivors and returns their ids.
    pub fn load(&self) -> HashSet<NotificationId> {
        let mut dismissed = self.dismissed.lock().expect("ledger mutex poisoned");
        let now = self.clock.now();

        let stored = match self.read_live_records(now) {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "unable to read dismissed notices; keeping in-memory view");
                let records = self.merge(Vec::new(), &dismissed, now);
                *dismissed = index(&records);
                return dismissed.keys().cloned().collect();
            }
        };

        let records = self.merge(stored, &dismissed, now);
        if let Err(err) = self.write_records(&records) {
            warn!(error = %err, "unable to prune dismissed notices");
        }

        *dismissed = index(&records);
        dismissed.keys().cloned().collect()
    }

    /// Records that `id` was dismissed just now.
    ///
    /// When the log cannot be read the dismissal is kept in memory only;
    /// writing blind would overwrite records this ledger cannot see.
    pub fn dismiss(&self, id: &NotificationId) {
        let mut dismissed = self.dismissed.lock().expect("ledger mutex poisoned");
        let now = self.clock.now();
        dismissed.insert(id.clone(), now.timestamp_millis());

        let stored = match self.read_live_records(now) {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, %id, "unable to read dismissed notices; dismissal kept in memory");
                return;
            }
        };

        let records = self.merge(stored, &dismissed, now);
        match self.write_records(&records) {
            Ok(()) => debug!(%id, "notice dismissal persisted"),
            Err(err) => warn!(error = %err, %id, "unable to persist notice dismissal"),
        }
    }

    /// Forgets every dismissal, persisted and in memory.
    pub fn reset(&self) {
        let mut dismissed = self.dismissed.lock().expect("ledger mutex poisoned");
        dismissed.clear();
        if let Err(err) = self.store.remove(DISMISSAL_STORAGE_KEY) {
            warn!(error = %err, "unable to clear dismissed notices");
        }
    }

    /// Checks the in-memory view without touching storage.
    pub fn contains(&self, id: &NotificationId) -> bool {
        self.dismissed
            .lock()
            .expect("ledger mutex poisoned")
            .contains_key(id)
    }

    /// Stored records keep their order; ids known only in memory follow,
    /// oldest first. The later timestamp wins when both sides know an id.
    fn merge(
        &self,
        mut records: Vec<DismissalRecord>,
        memory: &HashMap<NotificationId, i64>,
        now: DateTime<Utc>,
    ) -> Vec<DismissalRecord> {
        let mut extra: Vec<DismissalRecord> = Vec::new();
        for (id, &at) in memory {
            match records.iter_mut().find(|record| &record.id == id) {
                Some(record) => record.dismissed_at_ms = record.dismissed_at_ms.max(at),
                None => extra.push(DismissalRecord {
                    id: id.clone(),
                    dismissed_at_ms: at,
                }),
            }
        }
        extra.sort_by(|a, b| {
            a.dismissed_at_ms
                .cmp(&b.dismissed_at_ms)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });

        records.extend(extra);
        records.retain(|record| record.is_live(now, self.ttl));
        records
    }

    fn read_live_records(&self, now: DateTime<Utc>) -> Result<Vec<DismissalRecord>, StoreError> {
        let Some(raw) = self.store.get(DISMISSAL_STORAGE_KEY)? else {
            return Ok(Vec::new());
        };

        let records: Vec<DismissalRecord> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "discarding unreadable dismissal log");
                Vec::new()
            }
        };

        Ok(records
            .into_iter()
            .filter(|record| record.is_live(now, self.ttl))
            .collect())
    }

    fn write_records(&self, records: &[DismissalRecord]) -> Result<(), StoreError> {
        let body = serde_json::to_string(records)?;
        self.store.set(DISMISSAL_STORAGE_KEY, &body)
    }
}

fn index(records: &[DismissalRecord]) -> HashMap<NotificationId, i64> {
    records
        .iter()
        .map(|record| (record.id.clone(), record.dismissed_at_ms))
        .collect()
}
