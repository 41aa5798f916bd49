use crate::error::VehicleError;
use mavlink::common::MavCmd;
use tokio::sync::oneshot;

pub(crate) type Reply = oneshot::Sender<Result<(), VehicleError>>;

pub(crate) enum Command {
    Arm {
        force: bool,
        reply: Reply,
    },
    SetMode {
        custom_mode: u32,
        reply: Reply,
    },
    CommandLong {
        command: MavCmd,
        params: [f32; 7],
        /// Overrides the autopilot component, e.g. to address a camera.
        target_component: Option<u8>,
        reply: Reply,
    },
    GuidedGoto {
        lat_e7: i32,
        lon_e7: i32,
        alt_msl_m: f32,
        yaw_rad: f32,
        reply: Reply,
    },
    Shutdown,
}
