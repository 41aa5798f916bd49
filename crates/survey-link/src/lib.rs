mod command;
pub mod config;
pub mod error;
mod event_loop;
pub mod port;
pub mod state;
pub mod vehicle;

pub use config::{RetryPolicy, VehicleConfig};
pub use error::VehicleError;
pub use port::SurveyVehicle;
pub use vehicle::Vehicle;

pub use state::{AutopilotType, GpsFixType, LinkState, Telemetry, VehicleClass, VehicleState};
