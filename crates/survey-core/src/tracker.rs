use crate::error::FeedError;
use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// One raw position update from the telemetry feed. Either coordinate may be
/// missing while the autopilot is still acquiring a fix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub latitude_deg: Option<f64>,
    pub longitude_deg: Option<f64>,
}

impl TelemetrySample {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg: Some(latitude_deg),
            longitude_deg: Some(longitude_deg),
        }
    }

    /// The sample as a position, if both coordinates are present, non-zero and
    /// in range. Zero is what autopilots report before the first fix.
    pub fn position(&self) -> Option<GeoPoint> {
        let lat = self.latitude_deg.filter(|v| *v != 0.0)?;
        let lon = self.longitude_deg.filter(|v| *v != 0.0)?;
        GeoPoint::new(lat, lon).ok()
    }
}

/// Anything that can report the vehicle's last known position.
pub trait PositionSource: Send + Sync {
    fn read(&self) -> Option<GeoPoint>;
}

/// Last known vehicle position, written by the feed task and read by anyone
/// holding a clone. Last write wins; readers may see a stale value.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    cell: Arc<watch::Sender<Option<GeoPoint>>>,
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { cell: Arc::new(tx) }
    }

    pub fn read(&self) -> Option<GeoPoint> {
        *self.cell.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<GeoPoint>> {
        self.cell.subscribe()
    }

    /// Stores the sample's position. Returns `false` if the sample was
    /// incomplete and ignored.
    pub fn update(&self, sample: &TelemetrySample) -> bool {
        match sample.position() {
            Some(point) => {
                self.cell.send_replace(Some(point));
                true
            }
            None => false,
        }
    }

    /// Reads `feed` until `cancel` fires. Cancellation ends silently with
    /// `Ok(())`; the feed closing underneath us is reported as
    /// [`FeedError::Closed`].
    pub async fn consume(
        &self,
        mut feed: watch::Receiver<TelemetrySample>,
        cancel: CancellationToken,
    ) -> Result<(), FeedError> {
        let initial = *feed.borrow_and_update();
        self.update(&initial);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("position feed cancelled");
                    return Ok(());
                }
                changed = feed.changed() => {
                    if changed.is_err() {
                        debug!("position feed closed");
                        return Err(FeedError::Closed);
                    }
                    let sample = *feed.borrow_and_update();
                    if !self.update(&sample) {
                        trace!(?sample, "ignoring incomplete position sample");
                    }
                }
            }
        }
    }

    /// Runs [`consume`](Self::consume) on a background task.
    pub fn spawn(
        &self,
        feed: watch::Receiver<TelemetrySample>,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<(), FeedError>> {
        let tracker = self.clone();
        tokio::spawn(async move { tracker.consume(feed, cancel).await })
    }
}

impl PositionSource for PositionTracker {
    fn read(&self) -> Option<GeoPoint> {
        PositionTracker::read(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_empty() {
        assert_eq!(PositionTracker::new().read(), None);
    }

    #[test]
    fn ignores_partial_and_default_samples() {
        let tracker = PositionTracker::new();
        let partial = [
            TelemetrySample::default(),
            TelemetrySample {
                latitude_deg: Some(47.1),
                longitude_deg: None,
            },
            TelemetrySample {
                latitude_deg: None,
                longitude_deg: Some(8.5),
            },
            TelemetrySample::new(0.0, 8.5),
            TelemetrySample::new(47.1, 0.0),
            TelemetrySample::new(91.0, 8.5),
            TelemetrySample::new(f64::NAN, 8.5),
        ];
        for sample in &partial {
            assert!(!tracker.update(sample), "accepted {sample:?}");
        }
        assert_eq!(tracker.read(), None);
    }

    #[test]
    fn last_write_wins() {
        let tracker = PositionTracker::new();
        assert!(tracker.update(&TelemetrySample::new(47.1, 8.5)));
        assert!(tracker.update(&TelemetrySample::new(47.2, 8.6)));
        // a partial update keeps the previous fix
        assert!(!tracker.update(&TelemetrySample {
            latitude_deg: Some(47.3),
            longitude_deg: None,
        }));
        assert_eq!(tracker.read(), Some(GeoPoint::new(47.2, 8.6).unwrap()));
    }

    #[test]
    fn clones_share_state() {
        let tracker = PositionTracker::new();
        let reader = tracker.clone();
        tracker.update(&TelemetrySample::new(47.1, 8.5));
        assert_eq!(reader.read(), tracker.read());
    }

    #[tokio::test]
    async fn consume_follows_feed_until_cancelled() {
        let (tx, rx) = watch::channel(TelemetrySample::new(47.1, 8.5));
        let tracker = PositionTracker::new();
        let cancel = CancellationToken::new();
        let handle = tracker.spawn(rx, cancel.clone());

        let mut updates = tracker.subscribe();
        updates
            .wait_for(|p| *p == Some(GeoPoint::new(47.1, 8.5).unwrap()))
            .await
            .unwrap();

        tx.send(TelemetrySample::new(47.2, 8.6)).unwrap();
        updates
            .wait_for(|p| *p == Some(GeoPoint::new(47.2, 8.6).unwrap()))
            .await
            .unwrap();

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("feed task did not stop")
            .unwrap();
        assert_eq!(result, Ok(()));
        // sender still alive: cancellation, not closure, ended the task
        drop(tx);
    }

    #[tokio::test]
    async fn closed_feed_is_reported() {
        let (tx, rx) = watch::channel(TelemetrySample::default());
        let tracker = PositionTracker::new();
        let handle = tracker.spawn(rx, CancellationToken::new());
        drop(tx);
        let result = handle.await.unwrap();
        assert_eq!(result, Err(FeedError::Closed));
    }
}
