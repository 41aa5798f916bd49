use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use survey_core::{GeoPoint, MissionConfig};
use survey_link::VehicleConfig;

/// Fly a lawnmower survey and flag objects with the operator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// MAVLink address, e.g. `udpin:0.0.0.0:14540` or `tcpout:127.0.0.1:5760`
    #[arg(long, default_value = "udpin:0.0.0.0:14540")]
    pub address: String,

    /// Serial device to use instead of `--address`
    #[arg(long)]
    pub serial: Option<String>,

    #[arg(long, default_value_t = 57600)]
    pub baud: u32,

    /// Top-left corner as `lat,lon`; prompted for when missing
    #[arg(long, value_parser = parse_lat_lon, allow_hyphen_values = true)]
    pub nw: Option<GeoPoint>,

    /// Bottom-right corner as `lat,lon`; prompted for when missing
    #[arg(long, value_parser = parse_lat_lon, allow_hyphen_values = true)]
    pub se: Option<GeoPoint>,

    /// Distance between scan lines in meters
    #[arg(long)]
    pub spacing: Option<f64>,

    /// Detection log, appended to
    #[arg(long, default_value = "detections.log")]
    pub log: PathBuf,

    /// Survey height above home in meters
    #[arg(long)]
    pub altitude: Option<f64>,

    /// Hold time at each waypoint in seconds
    #[arg(long)]
    pub dwell: Option<f64>,

    #[arg(long)]
    pub arrival_radius: Option<f64>,

    /// Seconds to wait for arrival before moving on
    #[arg(long)]
    pub arrival_timeout: Option<f64>,

    /// Seconds to wait after takeoff, margin included
    #[arg(long)]
    pub settle: Option<f64>,

    /// Takeoff climb in meters above home
    #[arg(long)]
    pub takeoff_altitude: Option<f32>,

    /// Keep the current flight mode instead of switching to guided
    #[arg(long)]
    pub no_guided: bool,

    /// Print available serial ports and exit
    #[arg(long)]
    pub list_serial_ports: bool,
}

impl Args {
    pub fn connect_address(&self) -> String {
        match &self.serial {
            Some(port) => format!("serial:{port}:{}", self.baud),
            None => self.address.clone(),
        }
    }

    pub fn mission_config(&self) -> Result<MissionConfig> {
        let mut config = MissionConfig {
            connect_address: self.connect_address(),
            ..MissionConfig::default()
        };
        if let Some(altitude) = self.altitude {
            config.altitude_above_home_m = altitude;
        }
        if let Some(dwell) = self.dwell {
            config.dwell = seconds("dwell", dwell)?;
        }
        if let Some(radius) = self.arrival_radius {
            config.arrival.radius_m = radius;
        }
        if let Some(timeout) = self.arrival_timeout {
            config.arrival.timeout = seconds("arrival-timeout", timeout)?;
        }
        if let Some(settle) = self.settle {
            config.takeoff_settle = seconds("settle", settle)?;
            config.takeoff_settle_margin = Duration::ZERO;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn vehicle_config(&self) -> VehicleConfig {
        let mut config = VehicleConfig {
            switch_to_guided: !self.no_guided,
            ..VehicleConfig::default()
        };
        if let Some(altitude) = self.takeoff_altitude {
            config.takeoff_altitude_m = altitude;
        }
        config
    }
}

fn seconds(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("--{flag} must be a non-negative number of seconds, got {value}"))
}

/// Parses `lat,lon`, ignoring whitespace.
pub fn parse_lat_lon(input: &str) -> Result<GeoPoint, String> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let (lat, lon) = compact
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lon`, got `{input}`"))?;
    let lat: f64 = lat
        .parse()
        .map_err(|_| format!("invalid latitude `{lat}`"))?;
    let lon: f64 = lon
        .parse()
        .map_err(|_| format!("invalid longitude `{lon}`"))?;
    GeoPoint::new(lat, lon).map_err(|err| err.to_string())
}
