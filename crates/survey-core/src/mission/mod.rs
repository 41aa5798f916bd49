pub mod types;

pub use types::{
    HomePosition, LogEntry, MissionPhase, MissionStats, MissionSummary, SurveyArea,
};

use crate::arrival::{ArrivalMonitor, ArrivalOutcome};
use crate::config::MissionConfig;
use crate::error::{FeedError, MissionError};
use crate::geo::{bearing_degrees, GeoPoint};
use crate::pattern::generate_pattern;
use crate::ports::{
    AreaSource, CaptureAndLogPort, ClassificationPort, TelemetryPort, VehicleCommandPort,
};
use crate::tracker::PositionTracker;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Sequences a whole survey flight: connect, arm, take off, scan every
/// waypoint of the coverage pattern with a human decision at each, return
/// home and land.
///
/// Vehicle command failures abort the run and leave the vehicle in its last
/// commanded state. Capture, log and classification failures are logged and
/// the run continues.
pub struct MissionController<V, T, C, Q, A> {
    config: MissionConfig,
    vehicle: V,
    telemetry: T,
    recorder: C,
    classifier: Q,
    area: A,
    tracker: PositionTracker,
    phase: watch::Sender<MissionPhase>,
    run_id: Uuid,
}

impl<V, T, C, Q, A> MissionController<V, T, C, Q, A>
where
    V: VehicleCommandPort,
    T: TelemetryPort,
    C: CaptureAndLogPort,
    Q: ClassificationPort,
    A: AreaSource,
{
    pub fn new(
        config: MissionConfig,
        vehicle: V,
        telemetry: T,
        recorder: C,
        classifier: Q,
        area: A,
    ) -> Self {
        let (phase, _) = watch::channel(MissionPhase::default());
        Self {
            config,
            vehicle,
            telemetry,
            recorder,
            classifier,
            area,
            tracker: PositionTracker::new(),
            phase,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn phase(&self) -> watch::Receiver<MissionPhase> {
        self.phase.subscribe()
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub async fn run(&self) -> Result<MissionSummary, MissionError> {
        self.config.validate()?;

        self.set_phase(MissionPhase::Connecting);
        info!(
            run_id = %self.run_id,
            address = %self.config.connect_address,
            "connecting to vehicle"
        );
        self.vehicle.connect(&self.config.connect_address).await?;
        info!("vehicle connected");

        let cancel = CancellationToken::new();
        let feed_task = self
            .tracker
            .spawn(self.telemetry.position_feed(), cancel.clone());

        let result = self.fly().await;

        cancel.cancel();
        Self::join_feed(feed_task).await;

        let stats = match result {
            Ok(stats) => stats,
            Err(err) => {
                let phase = *self.phase.borrow();
                error!(%phase, "mission aborted: {err}");
                return Err(err);
            }
        };

        let summary = MissionSummary::new(self.run_id, &stats);
        info!(
            total = summary.points_visited,
            detected = summary.detected,
            clear = summary.clear,
            unclassified = summary.unclassified,
            arrival_timeouts = summary.arrival_timeouts,
            "mission complete"
        );
        self.append_log(summary.summary_note()).await;
        self.set_phase(MissionPhase::Complete);
        Ok(summary)
    }

    async fn fly(&self) -> Result<MissionStats, MissionError> {
        self.set_phase(MissionPhase::Arming);
        self.vehicle.arm().await?;
        info!("armed");

        self.set_phase(MissionPhase::TakingOff);
        self.vehicle.takeoff().await?;
        let settle = self.config.settle_total();
        info!(settle_s = settle.as_secs_f64(), "taking off, waiting to settle");
        tokio::time::sleep(settle).await;

        let home = self.telemetry.home_position().await?;
        let altitude_msl_m = home.altitude_msl_m + self.config.altitude_above_home_m;
        info!(home = %home.point, altitude_msl_m, "flight altitude set");

        self.set_phase(MissionPhase::AwaitingAreaInput);
        let area = self.area.request_area().await?;
        let pattern = generate_pattern(area.rectangle(), area.spacing_m())?;
        let total = pattern.len();
        info!(
            waypoints = total,
            lines = pattern.line_count(),
            path_length_m = pattern.path_length_m(),
            "generated coverage pattern"
        );

        let monitor = ArrivalMonitor::new(self.config.arrival);
        let mut stats = MissionStats::default();
        let mut previous = home.point;

        for (index, waypoint) in pattern.iter().enumerate() {
            self.set_phase(MissionPhase::Scanning { index, total });
            let label = format!("Scan WP {}", index + 1);
            self.navigate(&monitor, previous, waypoint.point, altitude_msl_m, &label, &mut stats)
                .await?;

            info!(%label, dwell_s = self.config.dwell.as_secs_f64(), "holding");
            tokio::time::sleep(self.config.dwell).await;

            self.classify(&label, waypoint.point, &mut stats).await;
            previous = waypoint.point;
        }

        self.set_phase(MissionPhase::ReturningHome);
        self.navigate(&monitor, previous, home.point, altitude_msl_m, "Home", &mut stats)
            .await?;

        self.set_phase(MissionPhase::Landing);
        self.vehicle.land().await?;
        info!("landing at home");

        Ok(stats)
    }

    async fn navigate(
        &self,
        monitor: &ArrivalMonitor,
        from: GeoPoint,
        to: GeoPoint,
        altitude_msl_m: f64,
        label: &str,
        stats: &mut MissionStats,
    ) -> Result<ArrivalOutcome, MissionError> {
        let yaw_deg = bearing_degrees(from, to);
        info!(%label, target = %to, altitude_msl_m, yaw_deg, "navigating");
        self.vehicle.goto_location(to, altitude_msl_m, yaw_deg).await?;

        let outcome = monitor.wait_until_reached(&self.tracker, to).await;
        match outcome {
            ArrivalOutcome::Reached { distance_m } => {
                debug!(%label, distance_m, "arrived");
            }
            ArrivalOutcome::TimedOut { .. } => {
                stats.arrival_timeouts += 1;
            }
        }
        Ok(outcome)
    }

    async fn classify(&self, label: &str, point: GeoPoint, stats: &mut MissionStats) {
        match self.classifier.ask_yes_no(label).await {
            Ok(true) => {
                info!(%label, "target confirmed");
                if let Err(err) = self.recorder.take_photo().await {
                    warn!(%label, "{err}");
                }
                self.append_log(format!("FLAG=True at {label} ({point})")).await;
                stats.detected += 1;
            }
            Ok(false) => {
                info!(%label, "clear");
                self.append_log(format!("FLAG=False at {label} ({point})")).await;
                stats.clear += 1;
            }
            Err(err) => {
                warn!(%label, "{err}");
                self.append_log(format!("UNCLASSIFIED at {label} ({point}): {err}"))
                    .await;
                stats.unclassified += 1;
            }
        }
    }

    async fn append_log(&self, note: String) {
        let entry = LogEntry::new(note);
        if let Err(err) = self.recorder.append_log(&entry).await {
            warn!(note = %entry.note, "{err}");
        }
    }

    async fn join_feed(task: JoinHandle<Result<(), FeedError>>) {
        match task.await {
            Ok(Ok(())) => debug!("position feed stopped"),
            Ok(Err(err)) => warn!("position feed ended early: {err}"),
            Err(err) => warn!("position feed task failed: {err}"),
        }
    }

    fn set_phase(&self, phase: MissionPhase) {
        debug!(%phase, "mission phase");
        self.phase.send_replace(phase);
    }
}
