//! Boundaries to the outside world. The mission controller only talks to the
//! vehicle, the operator and the log through these traits.

use crate::error::{CaptureError, ClassificationError, LogError, MissionError, TransportError};
use crate::geo::GeoPoint;
use crate::mission::{HomePosition, LogEntry, SurveyArea};
use crate::tracker::TelemetrySample;
use std::future::Future;
use tokio::sync::watch;

pub trait VehicleCommandPort: Send + Sync {
    fn connect(&self, address: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn arm(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn takeoff(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Fly to `target` at `altitude_msl_m`, facing `yaw_deg` (0 = north).
    fn goto_location(
        &self,
        target: GeoPoint,
        altitude_msl_m: f64,
        yaw_deg: f64,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn land(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

pub trait TelemetryPort: Send + Sync {
    /// Live position stream. Samples may be partially populated.
    fn position_feed(&self) -> watch::Receiver<TelemetrySample>;

    fn home_position(&self) -> impl Future<Output = Result<HomePosition, TransportError>> + Send;
}

pub trait CaptureAndLogPort: Send + Sync {
    /// Best effort; the mission continues on failure.
    fn take_photo(&self) -> impl Future<Output = Result<(), CaptureError>> + Send;

    fn append_log(&self, entry: &LogEntry) -> impl Future<Output = Result<(), LogError>> + Send;
}

pub trait ClassificationPort: Send + Sync {
    /// Asks the operator a yes/no question about the object at `label`.
    fn ask_yes_no(
        &self,
        label: &str,
    ) -> impl Future<Output = Result<bool, ClassificationError>> + Send;
}

pub trait AreaSource: Send + Sync {
    fn request_area(&self) -> impl Future<Output = Result<SurveyArea, MissionError>> + Send;
}

/// An area known up front, e.g. from command-line arguments.
impl AreaSource for SurveyArea {
    async fn request_area(&self) -> Result<SurveyArea, MissionError> {
        Ok(*self)
    }
}
