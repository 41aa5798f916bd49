use crate::geo::{distance_meters, GeoPoint};
use crate::tracker::PositionSource;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrivalSettings {
    pub radius_m: f64,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ArrivalSettings {
    fn default() -> Self {
        Self {
            radius_m: 2.0,
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrivalOutcome {
    Reached { distance_m: f64 },
    /// The deadline passed first. Not an error: the caller carries on as if
    /// the vehicle were close enough.
    TimedOut { last_distance_m: Option<f64> },
}

impl ArrivalOutcome {
    pub fn is_reached(&self) -> bool {
        matches!(self, ArrivalOutcome::Reached { .. })
    }
}

/// Polls a [`PositionSource`] until the vehicle is within the arrival radius
/// of a target or the timeout elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrivalMonitor {
    settings: ArrivalSettings,
}

impl ArrivalMonitor {
    pub fn new(settings: ArrivalSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ArrivalSettings {
        &self.settings
    }

    pub async fn wait_until_reached<P>(&self, source: &P, target: GeoPoint) -> ArrivalOutcome
    where
        P: PositionSource + ?Sized,
    {
        let start = Instant::now();
        let mut last_distance_m = None;

        loop {
            if let Some(current) = source.read() {
                let distance_m = distance_meters(current, target);
                trace!(distance_m, "distance to target");
                last_distance_m = Some(distance_m);
                if distance_m <= self.settings.radius_m {
                    debug!(%target, distance_m, "target reached");
                    return ArrivalOutcome::Reached { distance_m };
                }
            }

            if start.elapsed() > self.settings.timeout {
                warn!(
                    %target,
                    ?last_distance_m,
                    timeout_s = self.settings.timeout.as_secs_f64(),
                    "arrival timeout reached, continuing"
                );
                return ArrivalOutcome::TimedOut { last_distance_m };
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
