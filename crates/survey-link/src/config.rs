use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long to wait for a `COMMAND_ACK` and how often to resend the same
/// `COMMAND_LONG` before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub request_timeout_ms: u64,
    pub max_retries: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_timeout_ms: 1500,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VehicleConfig {
    pub gcs_system_id: u8,
    pub gcs_component_id: u8,
    pub retry_policy: RetryPolicy,
    pub auto_request_home: bool,
    pub command_buffer_size: usize,
    pub connect_timeout: Duration,
    pub home_timeout: Duration,
    /// Climb height for `NAV_TAKEOFF`, relative to home.
    pub takeoff_altitude_m: f32,
    /// Switch ArduPilot vehicles into GUIDED before arming.
    pub switch_to_guided: bool,
    /// Component id that receives `IMAGE_START_CAPTURE`.
    pub camera_component_id: u8,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            gcs_system_id: 255,
            gcs_component_id: 190,
            retry_policy: RetryPolicy::default(),
            auto_request_home: true,
            command_buffer_size: 32,
            connect_timeout: Duration::from_secs(30),
            home_timeout: Duration::from_secs(10),
            takeoff_altitude_m: 10.0,
            switch_to_guided: true,
            camera_component_id: 100,
        }
    }
}
