use crate::command::Command;
use crate::config::VehicleConfig;
use crate::error::VehicleError;
use crate::event_loop::run_event_loop;
use crate::state::{create_channels, LinkState, StateChannels, Telemetry, VehicleState};
use mavlink::common::{self, MavCmd};
use std::sync::Arc;
use std::time::Duration;
use survey_core::{HomePosition, TelemetrySample};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Async MAVLink vehicle handle.
///
/// `Vehicle` is `Clone + Send + Sync`. Clones share the same connection.
/// When the last clone is dropped, the event loop is cancelled.
#[derive(Clone)]
pub struct Vehicle {
    inner: Arc<VehicleInner>,
}

struct VehicleInner {
    command_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
    channels: StateChannels,
    config: VehicleConfig,
}

impl Drop for VehicleInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Vehicle {
    /// Connect using a mavlink address string (e.g. `udpin:0.0.0.0:14540`).
    /// Waits for the first vehicle HEARTBEAT before returning.
    pub async fn connect(address: &str) -> Result<Self, VehicleError> {
        Self::connect_with_config(address, VehicleConfig::default()).await
    }

    pub async fn connect_with_config(
        address: &str,
        config: VehicleConfig,
    ) -> Result<Self, VehicleError> {
        let connection = mavlink::connect_async::<common::MavMessage>(address)
            .await
            .map_err(|err| VehicleError::ConnectionFailed(err.to_string()))?;

        let (writers, channels) = create_channels();
        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer_size);

        tokio::spawn(run_event_loop(
            connection,
            command_rx,
            writers,
            config.clone(),
            cancel.clone(),
        ));

        let connect_timeout = config.connect_timeout;
        let vehicle = Vehicle {
            inner: Arc::new(VehicleInner {
                command_tx,
                cancel,
                channels,
                config,
            }),
        };

        let mut state_rx = vehicle.state();
        let heartbeat = async { state_rx.wait_for(Option::is_some).await.map(|_| ()) };
        match tokio::time::timeout(connect_timeout, heartbeat).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(VehicleError::Disconnected),
            Err(_) => return Err(VehicleError::Timeout),
        }

        info!(%address, "vehicle heartbeat received");
        Ok(vehicle)
    }

    // --- Reactive state (watch channels) ---

    pub fn state(&self) -> watch::Receiver<Option<VehicleState>> {
        self.inner.channels.vehicle_state.clone()
    }

    pub fn telemetry(&self) -> watch::Receiver<Telemetry> {
        self.inner.channels.telemetry.clone()
    }

    /// Raw position samples as they arrive, fix or no fix.
    pub fn position_feed(&self) -> watch::Receiver<TelemetrySample> {
        self.inner.channels.position.clone()
    }

    pub fn home_position(&self) -> watch::Receiver<Option<HomePosition>> {
        self.inner.channels.home_position.clone()
    }

    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.inner.channels.link_state.clone()
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.inner.config
    }

    /// Waits until the autopilot has reported a home position.
    pub async fn wait_for_home(&self, timeout: Duration) -> Result<HomePosition, VehicleError> {
        let mut home_rx = self.home_position();
        let wait = async { home_rx.wait_for(Option::is_some).await.map(|home| *home) };
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(Some(home))) => Ok(home),
            Ok(Ok(None)) | Ok(Err(_)) => Err(VehicleError::Disconnected),
            Err(_) => Err(VehicleError::Timeout),
        }
    }

    // --- Vehicle commands ---

    pub async fn arm(&self, force: bool) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::Arm { force, reply }).await
    }

    pub async fn set_mode(&self, custom_mode: u32) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::SetMode { custom_mode, reply }).await
    }

    /// Switches to the autopilot's guided mode. A no-op for autopilots
    /// without a known guided mode number.
    pub async fn set_guided_mode(&self) -> Result<(), VehicleError> {
        let state = (*self.inner.channels.vehicle_state.borrow())
            .ok_or(VehicleError::IdentityUnknown)?;
        match state.guided_custom_mode() {
            Some(mode) if mode == state.custom_mode => Ok(()),
            Some(mode) => {
                debug!(mode, "switching to guided");
                self.set_mode(mode).await
            }
            None => {
                debug!(
                    autopilot = ?state.autopilot,
                    "no guided mode known, leaving mode as is"
                );
                Ok(())
            }
        }
    }

    pub async fn takeoff(&self, altitude_m: f32) -> Result<(), VehicleError> {
        self.command_long(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, altitude_m],
        )
        .await
    }

    /// Fly to a point at an absolute altitude, facing `yaw_deg` from north.
    pub async fn goto(
        &self,
        lat_deg: f64,
        lon_deg: f64,
        alt_msl_m: f32,
        yaw_deg: f32,
    ) -> Result<(), VehicleError> {
        let lat_e7 = (lat_deg * 1e7).round() as i32;
        let lon_e7 = (lon_deg * 1e7).round() as i32;
        let yaw_rad = yaw_deg.to_radians();
        self.send_command(|reply| Command::GuidedGoto {
            lat_e7,
            lon_e7,
            alt_msl_m,
            yaw_rad,
            reply,
        })
        .await
    }

    /// Land at the current position.
    pub async fn land(&self) -> Result<(), VehicleError> {
        self.command_long(MavCmd::MAV_CMD_NAV_LAND, [0.0; 7]).await
    }

    /// Single still image from the configured camera component.
    pub async fn take_photo(&self) -> Result<(), VehicleError> {
        let camera = self.inner.config.camera_component_id;
        self.send_command(|reply| Command::CommandLong {
            command: MavCmd::MAV_CMD_IMAGE_START_CAPTURE,
            params: [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            target_component: Some(camera),
            reply,
        })
        .await
    }

    pub async fn command_long(&self, cmd: MavCmd, params: [f32; 7]) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::CommandLong {
            command: cmd,
            params,
            target_component: None,
            reply,
        })
        .await
    }

    /// Gracefully disconnect from the vehicle.
    pub async fn disconnect(self) -> Result<(), VehicleError> {
        let _ = self.inner.command_tx.send(Command::Shutdown).await;
        Ok(())
    }

    async fn send_command(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<(), VehicleError>>) -> Command,
    ) -> Result<(), VehicleError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(make(tx))
            .await
            .map_err(|_| VehicleError::Disconnected)?;
        rx.await.map_err(|_| VehicleError::Disconnected)?
    }
}
