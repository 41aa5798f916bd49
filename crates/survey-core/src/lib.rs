pub mod arrival;
pub mod config;
pub mod error;
pub mod geo;
pub mod mission;
pub mod pattern;
pub mod ports;
pub mod tracker;

pub use config::MissionConfig;
pub use error::{
    CaptureError, ClassificationError, FeedError, LogError, MissionError, TransportError,
};

pub use arrival::{ArrivalMonitor, ArrivalOutcome, ArrivalSettings};
pub use geo::{bearing_degrees, distance_meters, interpolate, GeoPoint, EARTH_RADIUS_M};
pub use mission::{
    HomePosition, LogEntry, MissionController, MissionPhase, MissionStats, MissionSummary,
    SurveyArea,
};
pub use pattern::{
    generate_pattern, waypoint_count, CoveragePattern, Rectangle, Waypoint, MAX_WAYPOINTS,
    SCAN_LINE_LABEL,
};
pub use ports::{
    AreaSource, CaptureAndLogPort, ClassificationPort, TelemetryPort, VehicleCommandPort,
};
pub use tracker::{PositionSource, PositionTracker, TelemetrySample};
