use metrics_exporter_prometheus::PrometheusHandle;
use site_notices::config::AppConfig;
use site_notices::error::AppError;
use site_notices::notices::{
    BannerLayoutCoordinator, DismissalLedger, FileSessionStore, HttpNotificationSource,
    LayoutState, MemorySessionStore, NotificationOrchestrator, SessionStore, StoreError,
    SystemClock,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Buffered size observations before the client's reports apply backpressure.
const SIZE_OBSERVATION_BUFFER: usize = 16;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Session storage picked by configuration.
#[derive(Debug)]
pub(crate) enum SessionBackend {
    Memory(MemorySessionStore),
    File(FileSessionStore),
}

impl SessionStore for SessionBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            SessionBackend::Memory(store) => store.get(key),
            SessionBackend::File(store) => store.get(key),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            SessionBackend::Memory(store) => store.set(key, value),
            SessionBackend::File(store) => store.set(key, value),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self {
            SessionBackend::Memory(store) => store.remove(key),
            SessionBackend::File(store) => store.remove(key),
        }
    }
}

pub(crate) type ServiceOrchestrator = NotificationOrchestrator<HttpNotificationSource, SessionBackend>;

/// Everything a host needs to run one viewing session.
pub(crate) struct NoticeEngine {
    pub(crate) orchestrator: Arc<ServiceOrchestrator>,
    pub(crate) coordinator: BannerLayoutCoordinator,
    pub(crate) layout: LayoutState,
    pub(crate) sizes: mpsc::Sender<f64>,
    pub(crate) size_inbox: mpsc::Receiver<f64>,
}

pub(crate) fn build_engine(config: &AppConfig) -> Result<NoticeEngine, AppError> {
    let source = HttpNotificationSource::new(&config.gateway.origin, config.polling.fetch_timeout)?;

    let store = match &config.dismissals.session_file {
        Some(path) => SessionBackend::File(FileSessionStore::new(path)),
        None => SessionBackend::Memory(MemorySessionStore::default()),
    };
    let ledger = DismissalLedger::with_ttl(
        Arc::new(store),
        Arc::new(SystemClock),
        config.dismissals.ttl,
    );

    let orchestrator = Arc::new(NotificationOrchestrator::new(
        Arc::new(source),
        ledger,
        config.polling.settings(),
    ));

    let (writer, layout) = LayoutState::channel();
    let coordinator = BannerLayoutCoordinator::new(writer);
    let (sizes, size_inbox) = mpsc::channel(SIZE_OBSERVATION_BUFFER);

    Ok(NoticeEngine {
        orchestrator,
        coordinator,
        layout,
        sizes,
        size_inbox,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_backend_delegates_to_memory_store() {
        let backend = SessionBackend::Memory(MemorySessionStore::default());

        backend.set("key", "value").expect("set succeeds");
        assert_eq!(backend.get("key").expect("get succeeds").as_deref(), Some("value"));

        backend.remove("key").expect("remove succeeds");
        assert!(backend.get("key").expect("get succeeds").is_none());
    }
}
