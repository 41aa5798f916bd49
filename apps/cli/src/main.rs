mod args;
mod detection_log;
mod prompt;

use anyhow::{Context, Result};
use args::Args;
use clap::Parser;
use detection_log::{DetectionLog, EvidenceRecorder};
use prompt::{TerminalArea, TerminalClassifier};
use std::time::Duration;
use survey_core::{generate_pattern, MissionController, MissionPhase};
use survey_link::{LinkState, SurveyVehicle, Vehicle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "survey=info,survey_core=info,survey_link=info";
const POSITION_REPORT_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    if args.list_serial_ports {
        let ports = serialport::available_ports().context("listing serial ports")?;
        for port in ports {
            println!("{}", port.port_name);
        }
        return Ok(());
    }

    let mission_config = args.mission_config()?;
    let area = TerminalArea::new(args.nw, args.se, args.spacing);
    if let Some(preset) = area.preset().context("invalid survey area")? {
        let pattern = generate_pattern(preset.rectangle(), preset.spacing_m())
            .context("invalid survey area")?;
        info!(
            waypoints = pattern.len(),
            lines = pattern.line_count(),
            "survey area from arguments"
        );
    }

    let vehicle = SurveyVehicle::new(args.vehicle_config());
    let log = DetectionLog::new(&args.log);
    info!(log = %log.path().display(), "detection log");

    let controller = MissionController::new(
        mission_config,
        vehicle.clone(),
        vehicle.clone(),
        EvidenceRecorder::new(vehicle.clone(), log),
        TerminalClassifier,
        area,
    );
    info!(run_id = %controller.run_id(), "starting survey");

    let stop_reporter = CancellationToken::new();
    let reporter = spawn_status_reporter(
        controller.phase(),
        vehicle.clone(),
        stop_reporter.clone(),
    );
    let result = controller.run().await;
    stop_reporter.cancel();
    if let Err(err) = reporter.await {
        warn!("status reporter failed: {err}");
    }
    vehicle.disconnect().await;

    let summary = result.context("survey mission failed")?;
    println!("\n{}\n{summary}\n{}", "-".repeat(60), "-".repeat(60));
    println!("Mission complete at Home!");
    Ok(())
}

/// Prints phase changes and, once connected, bridges link health and a
/// periodic position line into the log. The bridges stop with the reporter
/// when `cancel` fires or the phase channel closes.
fn spawn_status_reporter(
    mut phase_rx: watch::Receiver<MissionPhase>,
    vehicle: SurveyVehicle,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut bridges: Vec<JoinHandle<()>> = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = phase_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let phase = *phase_rx.borrow_and_update();
            println!("[{phase}]");
            if bridges.is_empty() {
                if let Some(handle) = vehicle.vehicle() {
                    bridges = spawn_link_bridges(handle);
                }
            }
        }
        for bridge in bridges {
            bridge.abort();
        }
    })
}

fn spawn_link_bridges(vehicle: &Vehicle) -> Vec<JoinHandle<()>> {
    let mut link_rx = vehicle.link_state();
    let link = tokio::spawn(async move {
        while link_rx.changed().await.is_ok() {
            let state = link_rx.borrow_and_update().clone();
            match state {
                LinkState::Error(err) => warn!("link error: {err}"),
                LinkState::Disconnected => warn!("link disconnected"),
                other => debug!(?other, "link state"),
            }
        }
    });

    let mut telemetry_rx = vehicle.telemetry();
    let position = tokio::spawn(async move {
        loop {
            tokio::time::sleep(POSITION_REPORT_INTERVAL).await;
            match telemetry_rx.has_changed() {
                Ok(true) => {
                    let t = telemetry_rx.borrow_and_update().clone();
                    info!(
                        lat = ?t.latitude_deg,
                        lon = ?t.longitude_deg,
                        rel_alt_m = ?t.relative_altitude_m,
                        fix = ?t.gps_fix_type,
                        "position"
                    );
                }
                Ok(false) => {}
                Err(_) => break,
            }
        }
    });

    vec![link, position]
}
