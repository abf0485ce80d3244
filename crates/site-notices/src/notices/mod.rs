//! Service-status notices: fetching, dismissal memory, classification and the
//! layout space the resulting banner takes up.

pub mod classifier;
pub mod clock;
pub mod domain;
pub mod layout;
pub mod ledger;
pub mod orchestrator;
pub mod router;
pub mod source;
pub mod store;

#[cfg(test)]
mod tests;

pub use classifier::{
    classify, partition, summarize, worst_severity, BannerView, DisruptionGroup, Partition,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{NoticeKind, Notification, NotificationId, Severity};
pub use layout::{BannerHeightWriter, BannerLayoutCoordinator, LayoutState};
pub use ledger::{DismissalLedger, DismissalRecord, DISMISSAL_STORAGE_KEY};
pub use orchestrator::{NoticeSnapshot, NotificationOrchestrator, PollHandle, PollSettings};
pub use router::{notice_router, NoticeRoutesState};
pub use source::{FetchError, HttpNotificationSource, NotificationSource};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};
