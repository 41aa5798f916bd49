//! Mission-facing adapter over [`Vehicle`].

use crate::config::VehicleConfig;
use crate::error::VehicleError;
use crate::vehicle::Vehicle;
use std::sync::{Arc, OnceLock};
use survey_core::{
    CaptureError, GeoPoint, HomePosition, TelemetryPort, TelemetrySample, TransportError,
    VehicleCommandPort,
};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Serves both vehicle ports from one MAVLink connection, opened by
/// [`VehicleCommandPort::connect`]. Clones share the connection.
#[derive(Clone, Default)]
pub struct SurveyVehicle {
    config: VehicleConfig,
    vehicle: Arc<OnceLock<Vehicle>>,
}

impl SurveyVehicle {
    pub fn new(config: VehicleConfig) -> Self {
        Self {
            config,
            vehicle: Arc::new(OnceLock::new()),
        }
    }

    /// The underlying handle, once connected.
    pub fn vehicle(&self) -> Option<&Vehicle> {
        self.vehicle.get()
    }

    pub async fn take_photo(&self) -> Result<(), CaptureError> {
        let vehicle = self
            .vehicle
            .get()
            .ok_or_else(|| CaptureError(VehicleError::NotConnected.to_string()))?;
        vehicle
            .take_photo()
            .await
            .map_err(|err| CaptureError(err.to_string()))
    }

    pub async fn disconnect(&self) {
        if let Some(vehicle) = self.vehicle.get() {
            if let Err(err) = vehicle.clone().disconnect().await {
                warn!("disconnect failed: {err}");
            }
        }
    }

    fn connected(&self, operation: &str) -> Result<&Vehicle, TransportError> {
        self.vehicle
            .get()
            .ok_or_else(|| TransportError::new(operation, VehicleError::NotConnected.to_string()))
    }
}

fn transport(operation: &'static str) -> impl FnOnce(VehicleError) -> TransportError {
    move |err| TransportError::new(operation, err.to_string())
}

impl VehicleCommandPort for SurveyVehicle {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        if self.vehicle.get().is_some() {
            debug!("already connected");
            return Ok(());
        }
        let vehicle = Vehicle::connect_with_config(address, self.config.clone())
            .await
            .map_err(transport("connect"))?;
        if self.vehicle.set(vehicle).is_err() {
            debug!("connection raced with another connect, keeping the first");
        }
        Ok(())
    }

    async fn arm(&self) -> Result<(), TransportError> {
        let vehicle = self.connected("arm")?;
        if self.config.switch_to_guided {
            vehicle.set_guided_mode().await.map_err(transport("set guided mode"))?;
        }
        vehicle.arm(false).await.map_err(transport("arm"))
    }

    async fn takeoff(&self) -> Result<(), TransportError> {
        let vehicle = self.connected("takeoff")?;
        vehicle
            .takeoff(self.config.takeoff_altitude_m)
            .await
            .map_err(transport("takeoff"))
    }

    async fn goto_location(
        &self,
        target: GeoPoint,
        altitude_msl_m: f64,
        yaw_deg: f64,
    ) -> Result<(), TransportError> {
        let vehicle = self.connected("goto")?;
        vehicle
            .goto(
                target.latitude_deg(),
                target.longitude_deg(),
                altitude_msl_m as f32,
                yaw_deg as f32,
            )
            .await
            .map_err(transport("goto"))
    }

    async fn land(&self) -> Result<(), TransportError> {
        let vehicle = self.connected("land")?;
        vehicle.land().await.map_err(transport("land"))
    }
}

impl TelemetryPort for SurveyVehicle {
    fn position_feed(&self) -> watch::Receiver<TelemetrySample> {
        match self.vehicle.get() {
            Some(vehicle) => vehicle.position_feed(),
            // Sender dropped right away: consumers see a closed feed.
            None => watch::channel(TelemetrySample::default()).1,
        }
    }

    async fn home_position(&self) -> Result<HomePosition, TransportError> {
        let vehicle = self.connected("home position")?;
        vehicle
            .wait_for_home(self.config.home_timeout)
            .await
            .map_err(transport("home position"))
    }
}
