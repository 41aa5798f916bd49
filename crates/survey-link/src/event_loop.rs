use crate::command::Command;
use crate::config::VehicleConfig;
use crate::error::VehicleError;
use crate::state::{
    AutopilotType, GpsFixType, LinkState, StateWriters, VehicleClass, VehicleState,
};
use mavlink::common::{self, MavCmd, MavModeFlag, MavResult, MavType};
use mavlink::{AsyncMavConnection, MavHeader};
use std::time::Duration;
use survey_core::{GeoPoint, HomePosition};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const HOME_POSITION_MESSAGE_ID: f32 = 242.0;
const MAGIC_FORCE_ARM_VALUE: f32 = 2989.0;
const MODE_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

type Connection = Box<dyn AsyncMavConnection<common::MavMessage> + Sync + Send>;

#[derive(Debug, Clone, Copy)]
struct VehicleTarget {
    system_id: u8,
    component_id: u8,
}

/// Everything the loop owns. Commands and inbound traffic share one
/// connection, so waits for an ACK keep feeding state while they wait.
struct Link {
    connection: Connection,
    writers: StateWriters,
    config: VehicleConfig,
    cancel: CancellationToken,
    target: Option<VehicleTarget>,
    home_requested: bool,
}

pub(crate) async fn run_event_loop(
    connection: Connection,
    mut command_rx: mpsc::Receiver<Command>,
    writers: StateWriters,
    config: VehicleConfig,
    cancel: CancellationToken,
) {
    let mut link = Link {
        connection,
        writers,
        config,
        cancel,
        target: None,
        home_requested: false,
    };
    link.writers.link_state.send_replace(LinkState::Connected);

    loop {
        tokio::select! {
            biased;

            _ = link.cancel.cancelled() => {
                debug!("event loop cancelled");
                link.writers.link_state.send_replace(LinkState::Disconnected);
                break;
            }
            cmd = command_rx.recv() => match cmd {
                Some(Command::Shutdown) | None => {
                    debug!("event loop shutdown requested");
                    link.writers.link_state.send_replace(LinkState::Disconnected);
                    break;
                }
                Some(cmd) => link.handle_command(cmd).await,
            },
            result = link.connection.recv() => match result {
                Ok((header, msg)) => link.handle_inbound(header, msg).await,
                Err(err) => {
                    warn!("MAVLink recv error: {err}");
                    link.writers
                        .link_state
                        .send_replace(LinkState::Error(err.to_string()));
                    break;
                }
            },
        }
    }
}

impl Link {
    async fn handle_inbound(&mut self, header: MavHeader, msg: common::MavMessage) {
        update_vehicle_target(&mut self.target, &header, &msg);
        if !self.home_requested && self.config.auto_request_home {
            if let Some(target) = self.target {
                self.request_home_position(target).await;
                self.home_requested = true;
            }
        }
        update_state(&header, &msg, &self.writers);
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Arm { force, reply } => {
                let param2 = if force { MAGIC_FORCE_ARM_VALUE } else { 0.0 };
                let result = self
                    .command_long_ack(
                        MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
                        [1.0, param2, 0.0, 0.0, 0.0, 0.0, 0.0],
                        None,
                    )
                    .await;
                let _ = reply.send(result);
            }
            Command::SetMode { custom_mode, reply } => {
                let result = self.set_mode(custom_mode).await;
                let _ = reply.send(result);
            }
            Command::CommandLong {
                command,
                params,
                target_component,
                reply,
            } => {
                let result = self
                    .command_long_ack(command, params, target_component)
                    .await;
                let _ = reply.send(result);
            }
            Command::GuidedGoto {
                lat_e7,
                lon_e7,
                alt_msl_m,
                yaw_rad,
                reply,
            } => {
                let result = self.guided_goto(lat_e7, lon_e7, alt_msl_m, yaw_rad).await;
                let _ = reply.send(result);
            }
            Command::Shutdown => {}
        }
    }

    fn target(&self) -> Result<VehicleTarget, VehicleError> {
        self.target.ok_or(VehicleError::IdentityUnknown)
    }

    async fn send(&self, message: common::MavMessage) -> Result<(), VehicleError> {
        let header = MavHeader {
            system_id: self.config.gcs_system_id,
            component_id: self.config.gcs_component_id,
            sequence: 0,
        };
        self.connection
            .send(&header, &message)
            .await
            .map(|_| ())
            .map_err(VehicleError::io)
    }

    async fn request_home_position(&self, target: VehicleTarget) {
        let request = command_long(
            target.system_id,
            target.component_id,
            MavCmd::MAV_CMD_REQUEST_MESSAGE,
            [HOME_POSITION_MESSAGE_ID, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            0,
        );
        if let Err(err) = self.send(request).await {
            warn!("home position request failed: {err}");
        }
    }

    /// Sends a COMMAND_LONG and waits for its ACK, resending on silence.
    async fn command_long_ack(
        &mut self,
        command: MavCmd,
        params: [f32; 7],
        target_component: Option<u8>,
    ) -> Result<(), VehicleError> {
        let target = self.target()?;
        let component = target_component.unwrap_or(target.component_id);
        let policy = self.config.retry_policy;

        for attempt in 0..=policy.max_retries {
            if attempt > 0 {
                debug!(?command, attempt, "no ACK, resending");
            }
            self.send(command_long(target.system_id, component, command, params, attempt))
                .await?;

            let deadline = tokio::time::sleep(Duration::from_millis(policy.request_timeout_ms));
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(VehicleError::Cancelled),
                    _ = &mut deadline => break,
                    result = self.connection.recv() => {
                        let (header, msg) = result.map_err(VehicleError::io)?;
                        if let common::MavMessage::COMMAND_ACK(ack) = &msg {
                            if ack.command == command {
                                match ack.result {
                                    MavResult::MAV_RESULT_ACCEPTED => return Ok(()),
                                    MavResult::MAV_RESULT_IN_PROGRESS => {}
                                    other => {
                                        return Err(VehicleError::CommandRejected {
                                            command: format!("{command:?}"),
                                            result: format!("{other:?}"),
                                        });
                                    }
                                }
                            }
                        }
                        self.handle_inbound(header, msg).await;
                    }
                }
            }
        }

        Err(VehicleError::Timeout)
    }

    /// DO_SET_MODE, falling back to a confirming HEARTBEAT for autopilots
    /// that switch without acknowledging.
    async fn set_mode(&mut self, custom_mode: u32) -> Result<(), VehicleError> {
        let params = [1.0, custom_mode as f32, 0.0, 0.0, 0.0, 0.0, 0.0];
        match self
            .command_long_ack(MavCmd::MAV_CMD_DO_SET_MODE, params, None)
            .await
        {
            Ok(()) => return Ok(()),
            Err(VehicleError::Cancelled) => return Err(VehicleError::Cancelled),
            Err(err) => {
                debug!(
                    custom_mode,
                    "DO_SET_MODE not acknowledged ({err}), watching heartbeat"
                );
            }
        }

        let deadline = tokio::time::sleep(MODE_CONFIRM_TIMEOUT);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(VehicleError::Cancelled),
                _ = &mut deadline => {
                    return Err(VehicleError::CommandRejected {
                        command: format!("DO_SET_MODE({custom_mode})"),
                        result: "no confirming HEARTBEAT".to_string(),
                    });
                }
                result = self.connection.recv() => {
                    let (header, msg) = result.map_err(VehicleError::io)?;
                    let confirmed = matches!(
                        &msg,
                        common::MavMessage::HEARTBEAT(hb)
                            if hb.custom_mode == custom_mode && hb.mavtype != MavType::MAV_TYPE_GCS
                    );
                    self.handle_inbound(header, msg).await;
                    if confirmed {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Position target in the absolute (MSL) frame. Not acknowledged by the
    /// autopilot, so success only means the message went out.
    async fn guided_goto(
        &self,
        lat_e7: i32,
        lon_e7: i32,
        alt_msl_m: f32,
        yaw_rad: f32,
    ) -> Result<(), VehicleError> {
        let target = self.target()?;
        // Ignore velocity, acceleration and yaw rate; use position and yaw.
        let type_mask =
            common::PositionTargetTypemask::from_bits_truncate(0x09F8);

        self.send(common::MavMessage::SET_POSITION_TARGET_GLOBAL_INT(
            common::SET_POSITION_TARGET_GLOBAL_INT_DATA {
                time_boot_ms: 0,
                target_system: target.system_id,
                target_component: target.component_id,
                coordinate_frame: common::MavFrame::MAV_FRAME_GLOBAL,
                type_mask,
                lat_int: lat_e7,
                lon_int: lon_e7,
                alt: alt_msl_m,
                vx: 0.0,
                vy: 0.0,
                vz: 0.0,
                afx: 0.0,
                afy: 0.0,
                afz: 0.0,
                yaw: yaw_rad,
                yaw_rate: 0.0,
            },
        ))
        .await
    }
}

fn command_long(
    target_system: u8,
    target_component: u8,
    command: MavCmd,
    params: [f32; 7],
    confirmation: u8,
) -> common::MavMessage {
    common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
        target_system,
        target_component,
        command,
        confirmation,
        param1: params[0],
        param2: params[1],
        param3: params[2],
        param4: params[3],
        param5: params[4],
        param6: params[5],
        param7: params[6],
    })
}

/// Latches onto the first non-GCS system that sends a HEARTBEAT.
fn update_vehicle_target(
    target: &mut Option<VehicleTarget>,
    header: &MavHeader,
    message: &common::MavMessage,
) {
    if header.system_id == 0 {
        return;
    }
    if let common::MavMessage::HEARTBEAT(hb) = message {
        if hb.mavtype == MavType::MAV_TYPE_GCS {
            return;
        }
        if target.is_none() {
            debug!(
                system_id = header.system_id,
                component_id = header.component_id,
                "vehicle identified"
            );
        }
        *target = Some(VehicleTarget {
            system_id: header.system_id,
            component_id: header.component_id,
        });
    }
}

fn update_state(header: &MavHeader, message: &common::MavMessage, writers: &StateWriters) {
    match message {
        common::MavMessage::HEARTBEAT(hb) => {
            if header.system_id == 0 || hb.mavtype == MavType::MAV_TYPE_GCS {
                return;
            }
            writers.vehicle_state.send_replace(Some(VehicleState {
                armed: hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED),
                custom_mode: hb.custom_mode,
                vehicle_class: VehicleClass::from_mav(hb.mavtype),
                autopilot: AutopilotType::from_mav(hb.autopilot),
            }));
        }
        common::MavMessage::GLOBAL_POSITION_INT(data) => {
            writers.telemetry.send_modify(|t| {
                t.latitude_deg = Some(data.lat as f64 / 1e7);
                t.longitude_deg = Some(data.lon as f64 / 1e7);
                t.relative_altitude_m = Some(data.relative_alt as f64 / 1000.0);
                t.altitude_msl_m = Some(data.alt as f64 / 1000.0);
                let vx = data.vx as f64 / 100.0;
                let vy = data.vy as f64 / 100.0;
                t.speed_mps = Some((vx * vx + vy * vy).sqrt());
                if data.hdg != u16::MAX {
                    t.heading_deg = Some(data.hdg as f64 / 100.0);
                }
            });
            writers.position.send_replace(writers.telemetry.borrow().position_sample());
        }
        common::MavMessage::VFR_HUD(data) => {
            writers.telemetry.send_modify(|t| {
                t.speed_mps = Some(data.groundspeed as f64);
                t.heading_deg = Some(data.heading as f64);
            });
        }
        common::MavMessage::GPS_RAW_INT(data) => {
            writers.telemetry.send_modify(|t| {
                t.gps_fix_type = Some(GpsFixType::from_raw(data.fix_type as u8));
                if data.satellites_visible != u8::MAX {
                    t.satellites_visible = Some(data.satellites_visible);
                }
            });
        }
        common::MavMessage::HOME_POSITION(data) => {
            let lat = data.latitude as f64 / 1e7;
            let lon = data.longitude as f64 / 1e7;
            match GeoPoint::new(lat, lon) {
                Ok(point) if lat != 0.0 || lon != 0.0 => {
                    writers.home_position.send_replace(Some(HomePosition {
                        point,
                        altitude_msl_m: data.altitude as f64 / 1000.0,
                    }));
                }
                _ => debug!(lat, lon, "ignoring unset home position"),
            }
        }
        _ => {
            trace!("unhandled message type");
        }
    }
}
