use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use super::orchestrator::NoticeSnapshot;

/// CSS custom property fixed-position regions read to clear the banner.
pub const BANNER_HEIGHT_PROPERTY: &str = "--site-notice-banner-height";

/// Read-only view of the shared page layout metrics.
///
/// Cheap to clone; hand one to every region that offsets itself below the
/// banner. Only the [`BannerHeightWriter`] can change the value.
#[derive(Debug, Clone)]
pub struct LayoutState {
    banner_height: watch::Receiver<f64>,
}

impl LayoutState {
    pub fn channel() -> (BannerHeightWriter, LayoutState) {
        let (tx, rx) = watch::channel(0.0);
        (
            BannerHeightWriter { tx },
            LayoutState { banner_height: rx },
        )
    }

    /// Current banner height in CSS pixels.
    pub fn banner_height(&self) -> f64 {
        *self.banner_height.borrow()
    }

    pub fn css_declaration(&self) -> String {
        format!("{BANNER_HEIGHT_PROPERTY}: {}px", self.banner_height())
    }

    /// Waits for the next change. Returns `false` once the writer is gone.
    pub async fn changed(&mut self) -> bool {
        self.banner_height.changed().await.is_ok()
    }
}

/// The single write handle for the banner height.
#[derive(Debug)]
pub struct BannerHeightWriter {
    tx: watch::Sender<f64>,
}

impl BannerHeightWriter {
    pub fn reader(&self) -> LayoutState {
        LayoutState {
            banner_height: self.tx.subscribe(),
        }
    }

    fn publish(&self, height: f64) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == height {
                false
            } else {
                *current = height;
                true
            }
        })
    }
}

/// Keeps the published banner height in step with what is rendered.
///
/// A blank snapshot (loading, or nothing visible) forces the height to zero
/// at once and mutes size observations until the banner has content again, so
/// a late measurement of a vanishing banner cannot resurrect its height.
#[derive(Debug)]
pub struct BannerLayoutCoordinator {
    writer: BannerHeightWriter,
    banner_present: bool,
}

impl BannerLayoutCoordinator {
    pub fn new(writer: BannerHeightWriter) -> Self {
        Self {
            writer,
            banner_present: false,
        }
    }

    pub fn layout(&self) -> LayoutState {
        self.writer.reader()
    }

    pub fn on_snapshot(&mut self, snapshot: &NoticeSnapshot) {
        if snapshot.is_blank() {
            self.banner_present = false;
            if self.writer.publish(0.0) {
                debug!("notice banner cleared; height reset");
            }
        } else {
            self.banner_present = true;
        }
    }

    /// Feeds one measurement of the rendered banner region.
    pub fn observe(&mut self, height: f64) {
        if !self.banner_present {
            trace!(height, "ignoring size observation for blank banner");
            return;
        }

        let height = if height.is_finite() && height > 0.0 {
            height
        } else {
            0.0
        };
        if self.writer.publish(height) {
            debug!(height, "notice banner height published");
        }
    }

    /// Drives the coordinator until either input closes, then clears the
    /// height.
    pub async fn run(
        mut self,
        mut snapshots: watch::Receiver<NoticeSnapshot>,
        mut sizes: mpsc::Receiver<f64>,
    ) {
        let initial = snapshots.borrow_and_update().clone();
        self.on_snapshot(&initial);

        loop {
            // Snapshots first: a size report for a banner that just appeared
            // must not be muted by the previous blank state.
            tokio::select! {
                biased;
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    self.on_snapshot(&snapshot);
                }
                size = sizes.recv() => match size {
                    Some(height) => self.observe(height),
                    None => break,
                },
            }
        }

        self.banner_present = false;
        self.writer.publish(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notices::domain::{Notification, NotificationId};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn showing(ids: &[&str]) -> NoticeSnapshot {
        NoticeSnapshot {
            visible: ids
                .iter()
                .map(|id| Notification {
                    id: NotificationId::from(*id),
                    kind: Default::default(),
                    severity: Default::default(),
                    title: id.to_string(),
                    message: None,
                    dismissible: true,
                    metadata: BTreeMap::new(),
                })
                .collect(),
            is_loading: false,
        }
    }

    fn coordinator() -> (BannerLayoutCoordinator, LayoutState) {
        let (writer, layout) = LayoutState::channel();
        (BannerLayoutCoordinator::new(writer), layout)
    }

    #[test]
    fn height_starts_at_zero_and_ignores_measurements_while_loading() {
        let (mut coordinator, layout) = coordinator();
        assert_eq!(layout.banner_height(), 0.0);

        coordinator.on_snapshot(&NoticeSnapshot::default());
        coordinator.observe(64.0);

        assert_eq!(layout.banner_height(), 0.0);
    }

    #[test]
    fn height_follows_measurements_while_banner_has_content() {
        let (mut coordinator, layout) = coordinator();

        coordinator.on_snapshot(&showing(&["a"]));
        coordinator.observe(48.0);
        assert_eq!(layout.banner_height(), 48.0);
        assert_eq!(
            layout.css_declaration(),
            "--site-notice-banner-height: 48px"
        );

        coordinator.on_snapshot(&showing(&["a", "b"]));
        coordinator.observe(96.5);
        assert_eq!(layout.banner_height(), 96.5);
    }

    #[test]
    fn empty_visible_set_resets_before_any_observation() {
        let (mut coordinator, layout) = coordinator();
        coordinator.on_snapshot(&showing(&["a"]));
        coordinator.observe(48.0);

        coordinator.on_snapshot(&showing(&[]));
        assert_eq!(layout.banner_height(), 0.0);

        coordinator.observe(48.0);
        assert_eq!(layout.banner_height(), 0.0, "late observation is muted");
    }

    #[test]
    fn invalid_measurements_publish_zero() {
        let (mut coordinator, layout) = coordinator();
        coordinator.on_snapshot(&showing(&["a"]));

        coordinator.observe(f64::NAN);
        assert_eq!(layout.banner_height(), 0.0);
        coordinator.observe(-3.0);
        assert_eq!(layout.banner_height(), 0.0);
    }

    #[tokio::test]
    async fn run_loop_tracks_snapshots_and_sizes() {
        let (coordinator, mut layout) = coordinator();
        let (snapshot_tx, snapshot_rx) = watch::channel(NoticeSnapshot::default());
        let (size_tx, size_rx) = mpsc::channel(8);

        let task = tokio::spawn(coordinator.run(snapshot_rx, size_rx));

        snapshot_tx.send_replace(showing(&["a"]));
        tokio::time::sleep(Duration::from_millis(5)).await;
        size_tx.send(40.0).await.expect("coordinator listening");
        assert!(layout.changed().await);
        assert_eq!(layout.banner_height(), 40.0);

        snapshot_tx.send_replace(showing(&[]));
        assert!(layout.changed().await);
        assert_eq!(layout.banner_height(), 0.0);

        drop(size_tx);
        task.await.expect("coordinator task finishes");
        assert_eq!(layout.banner_height(), 0.0);
    }

    #[tokio::test]
    async fn size_arriving_with_its_snapshot_is_not_dropped() {
        for _ in 0..200 {
            let (coordinator, mut layout) = coordinator();
            let (snapshot_tx, snapshot_rx) = watch::channel(NoticeSnapshot::default());
            let (size_tx, size_rx) = mpsc::channel(8);
            let task = tokio::spawn(coordinator.run(snapshot_rx, size_rx));
            tokio::task::yield_now().await;

            snapshot_tx.send_replace(showing(&["a"]));
            size_tx.send(40.0).await.expect("coordinator listening");

            tokio::time::timeout(Duration::from_secs(1), layout.changed())
                .await
                .expect("height published");
            assert_eq!(layout.banner_height(), 40.0);

            drop(size_tx);
            task.await.expect("coordinator task finishes");
        }
    }
}
