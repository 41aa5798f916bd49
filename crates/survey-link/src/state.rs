use serde::{Deserialize, Serialize};
use survey_core::{HomePosition, TelemetrySample};
use tokio::sync::watch;

/// Latest HEARTBEAT contents of the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleState {
    pub armed: bool,
    pub custom_mode: u32,
    pub vehicle_class: VehicleClass,
    pub autopilot: AutopilotType,
}

impl VehicleState {
    /// Custom mode number for GUIDED flight, where the autopilot has one.
    pub fn guided_custom_mode(&self) -> Option<u32> {
        if self.autopilot != AutopilotType::ArduPilotMega {
            return None;
        }
        match self.vehicle_class {
            VehicleClass::Copter | VehicleClass::Other => Some(4),
            VehicleClass::Plane | VehicleClass::Rover => Some(15),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub latitude_deg: Option<f64>,
    pub longitude_deg: Option<f64>,
    pub relative_altitude_m: Option<f64>,
    pub altitude_msl_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub heading_deg: Option<f64>,
    pub gps_fix_type: Option<GpsFixType>,
    pub satellites_visible: Option<u8>,
}

impl Telemetry {
    pub fn position_sample(&self) -> TelemetrySample {
        TelemetrySample {
            latitude_deg: self.latitude_deg,
            longitude_deg: self.longitude_deg,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Error(String),
}

/// Airframe family, as far as mode numbering is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Copter,
    Plane,
    Rover,
    #[default]
    Other,
}

impl VehicleClass {
    pub(crate) fn from_mav(mav_type: mavlink::common::MavType) -> Self {
        use mavlink::common::MavType;
        match mav_type {
            MavType::MAV_TYPE_QUADROTOR
            | MavType::MAV_TYPE_HEXAROTOR
            | MavType::MAV_TYPE_OCTOROTOR
            | MavType::MAV_TYPE_TRICOPTER
            | MavType::MAV_TYPE_HELICOPTER
            | MavType::MAV_TYPE_COAXIAL => VehicleClass::Copter,
            MavType::MAV_TYPE_FIXED_WING => VehicleClass::Plane,
            MavType::MAV_TYPE_GROUND_ROVER | MavType::MAV_TYPE_SURFACE_BOAT => VehicleClass::Rover,
            _ => VehicleClass::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutopilotType {
    #[default]
    Unknown,
    Generic,
    ArduPilotMega,
    Px4,
}

impl AutopilotType {
    pub(crate) fn from_mav(autopilot: mavlink::common::MavAutopilot) -> Self {
        use mavlink::common::MavAutopilot;
        match autopilot {
            MavAutopilot::MAV_AUTOPILOT_GENERIC => AutopilotType::Generic,
            MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA => AutopilotType::ArduPilotMega,
            MavAutopilot::MAV_AUTOPILOT_PX4 => AutopilotType::Px4,
            _ => AutopilotType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpsFixType {
    #[default]
    NoFix,
    Fix2d,
    Fix3d,
    Dgps,
    RtkFloat,
    RtkFixed,
}

impl GpsFixType {
    pub(crate) fn from_raw(fix_type: u8) -> Self {
        match fix_type {
            2 => GpsFixType::Fix2d,
            3 => GpsFixType::Fix3d,
            4 => GpsFixType::Dgps,
            5 => GpsFixType::RtkFloat,
            6 => GpsFixType::RtkFixed,
            _ => GpsFixType::NoFix,
        }
    }
}

/// Writer side, owned by the event loop. Dropping it closes every reader.
pub(crate) struct StateWriters {
    /// `None` until the first vehicle HEARTBEAT.
    pub vehicle_state: watch::Sender<Option<VehicleState>>,
    pub telemetry: watch::Sender<Telemetry>,
    pub position: watch::Sender<TelemetrySample>,
    pub home_position: watch::Sender<Option<HomePosition>>,
    pub link_state: watch::Sender<LinkState>,
}

pub(crate) struct StateChannels {
    pub vehicle_state: watch::Receiver<Option<VehicleState>>,
    pub telemetry: watch::Receiver<Telemetry>,
    pub position: watch::Receiver<TelemetrySample>,
    pub home_position: watch::Receiver<Option<HomePosition>>,
    pub link_state: watch::Receiver<LinkState>,
}

pub(crate) fn create_channels() -> (StateWriters, StateChannels) {
    let (vehicle_state_tx, vehicle_state_rx) = watch::channel(None);
    let (telemetry_tx, telemetry_rx) = watch::channel(Telemetry::default());
    let (position_tx, position_rx) = watch::channel(TelemetrySample::default());
    let (home_tx, home_rx) = watch::channel(None);
    let (link_tx, link_rx) = watch::channel(LinkState::Connecting);

    (
        StateWriters {
            vehicle_state: vehicle_state_tx,
            telemetry: telemetry_tx,
            position: position_tx,
            home_position: home_tx,
            link_state: link_tx,
        },
        StateChannels {
            vehicle_state: vehicle_state_rx,
            telemetry: telemetry_rx,
            position: position_rx,
            home_position: home_rx,
            link_state: link_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::common::{MavAutopilot, MavType};

    #[test]
    fn guided_mode_follows_airframe() {
        let copter = VehicleState {
            autopilot: AutopilotType::from_mav(MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA),
            vehicle_class: VehicleClass::from_mav(MavType::MAV_TYPE_QUADROTOR),
            ..VehicleState::default()
        };
        assert_eq!(copter.guided_custom_mode(), Some(4));

        let plane = VehicleState {
            vehicle_class: VehicleClass::from_mav(MavType::MAV_TYPE_FIXED_WING),
            ..copter
        };
        assert_eq!(plane.guided_custom_mode(), Some(15));

        let px4 = VehicleState {
            autopilot: AutopilotType::Px4,
            ..copter
        };
        assert_eq!(px4.guided_custom_mode(), None);
    }

    #[test]
    fn gps_fix_from_raw() {
        assert_eq!(GpsFixType::from_raw(0), GpsFixType::NoFix);
        assert_eq!(GpsFixType::from_raw(1), GpsFixType::NoFix);
        assert_eq!(GpsFixType::from_raw(3), GpsFixType::Fix3d);
        assert_eq!(GpsFixType::from_raw(6), GpsFixType::RtkFixed);
        assert_eq!(GpsFixType::from_raw(42), GpsFixType::NoFix);
    }

    #[test]
    fn telemetry_position_sample_keeps_missing_fields() {
        let telemetry = Telemetry {
            latitude_deg: Some(47.0),
            ..Telemetry::default()
        };
        let sample = telemetry.position_sample();
        assert_eq!(sample.latitude_deg, Some(47.0));
        assert_eq!(sample.longitude_deg, None);
        assert!(sample.position().is_none());
    }
}
