use crate::arrival::ArrivalSettings;
use crate::error::MissionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Link address handed to the vehicle port (e.g. `udpin:0.0.0.0:14540`).
    pub connect_address: String,
    pub altitude_above_home_m: f64,
    pub dwell: Duration,
    /// Fixed wait after takeoff before the survey starts. There is no
    /// altitude check; the vehicle is assumed to have climbed by then.
    pub takeoff_settle: Duration,
    pub takeoff_settle_margin: Duration,
    pub arrival: ArrivalSettings,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            connect_address: String::from("udpin:0.0.0.0:14540"),
            altitude_above_home_m: 10.0,
            dwell: Duration::from_secs(3),
            takeoff_settle: Duration::from_secs(8),
            takeoff_settle_margin: Duration::from_secs(10),
            arrival: ArrivalSettings::default(),
        }
    }
}

impl MissionConfig {
    pub fn settle_total(&self) -> Duration {
        self.takeoff_settle + self.takeoff_settle_margin
    }

    pub fn validate(&self) -> Result<(), MissionError> {
        if self.connect_address.trim().is_empty() {
            return Err(MissionError::InvalidConfig(
                "connect address must not be empty".to_string(),
            ));
        }
        if !self.altitude_above_home_m.is_finite() || self.altitude_above_home_m <= 0.0 {
            return Err(MissionError::InvalidConfig(format!(
                "altitude above home must be positive, got {}",
                self.altitude_above_home_m
            )));
        }
        if !self.arrival.radius_m.is_finite() || self.arrival.radius_m <= 0.0 {
            return Err(MissionError::InvalidConfig(format!(
                "arrival radius must be positive, got {}",
                self.arrival.radius_m
            )));
        }
        if self.arrival.poll_interval.is_zero() {
            return Err(MissionError::InvalidConfig(
                "arrival poll interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
