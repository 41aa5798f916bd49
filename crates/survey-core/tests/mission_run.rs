use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use survey_core::{
    bearing_degrees, generate_pattern, AreaSource, CaptureAndLogPort, CaptureError,
    ClassificationError, ClassificationPort, GeoPoint, HomePosition, LogEntry, LogError,
    MissionConfig, MissionController, MissionError, MissionPhase, Rectangle, SurveyArea,
    TelemetryPort, TelemetrySample, TransportError, VehicleCommandPort,
};
use tokio::sync::watch;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Connect(String),
    Arm,
    Takeoff,
    Goto {
        target: GeoPoint,
        altitude_msl_m: f64,
        yaw_deg: f64,
    },
    Land,
}

struct VehicleInner {
    calls: Mutex<Vec<Call>>,
    feed: watch::Sender<TelemetrySample>,
    home: HomePosition,
    /// Jump straight to every goto target, as if the flight were instant.
    teleport: bool,
    fail_connect: bool,
    fail_goto_on: Option<usize>,
}

#[derive(Clone)]
struct FakeVehicle(Arc<VehicleInner>);

impl FakeVehicle {
    fn new(home: HomePosition) -> Self {
        Self::build(home, true, false, None)
    }

    fn build(
        home: HomePosition,
        teleport: bool,
        fail_connect: bool,
        fail_goto_on: Option<usize>,
    ) -> Self {
        let (feed, _) = watch::channel(TelemetrySample::new(
            home.point.latitude_deg(),
            home.point.longitude_deg(),
        ));
        Self(Arc::new(VehicleInner {
            calls: Mutex::new(Vec::new()),
            feed,
            home,
            teleport,
            fail_connect,
            fail_goto_on,
        }))
    }

    fn calls(&self) -> Vec<Call> {
        self.0.calls.lock().unwrap().clone()
    }

    fn gotos(&self) -> Vec<(GeoPoint, f64, f64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Goto {
                    target,
                    altitude_msl_m,
                    yaw_deg,
                } => Some((target, altitude_msl_m, yaw_deg)),
                _ => None,
            })
            .collect()
    }

    fn feed_listeners(&self) -> usize {
        self.0.feed.receiver_count()
    }

    fn record(&self, call: Call) {
        self.0.calls.lock().unwrap().push(call);
    }
}

impl VehicleCommandPort for FakeVehicle {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        if self.0.fail_connect {
            return Err(TransportError::new("connect", "no heartbeat"));
        }
        self.record(Call::Connect(address.to_string()));
        Ok(())
    }

    async fn arm(&self) -> Result<(), TransportError> {
        self.record(Call::Arm);
        Ok(())
    }

    async fn takeoff(&self) -> Result<(), TransportError> {
        self.record(Call::Takeoff);
        Ok(())
    }

    async fn goto_location(
        &self,
        target: GeoPoint,
        altitude_msl_m: f64,
        yaw_deg: f64,
    ) -> Result<(), TransportError> {
        let issued = self.gotos().len();
        if self.0.fail_goto_on == Some(issued) {
            return Err(TransportError::new("goto", "link lost"));
        }
        self.record(Call::Goto {
            target,
            altitude_msl_m,
            yaw_deg,
        });
        if self.0.teleport {
            self.0.feed.send_replace(TelemetrySample::new(
                target.latitude_deg(),
                target.longitude_deg(),
            ));
        }
        Ok(())
    }

    async fn land(&self) -> Result<(), TransportError> {
        self.record(Call::Land);
        Ok(())
    }
}

impl TelemetryPort for FakeVehicle {
    fn position_feed(&self) -> watch::Receiver<TelemetrySample> {
        self.0.feed.subscribe()
    }

    async fn home_position(&self) -> Result<HomePosition, TransportError> {
        Ok(self.0.home)
    }
}

#[derive(Default)]
struct RecorderInner {
    photos: AtomicUsize,
    fail_capture: bool,
    fail_log: bool,
    entries: Mutex<Vec<LogEntry>>,
}

#[derive(Clone, Default)]
struct FakeRecorder(Arc<RecorderInner>);

impl FakeRecorder {
    fn failing(fail_capture: bool, fail_log: bool) -> Self {
        Self(Arc::new(RecorderInner {
            fail_capture,
            fail_log,
            ..RecorderInner::default()
        }))
    }

    fn photos(&self) -> usize {
        self.0.photos.load(Ordering::SeqCst)
    }

    fn notes(&self) -> Vec<String> {
        self.0
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.note.clone())
            .collect()
    }

    fn count_prefix(&self, prefix: &str) -> usize {
        self.notes().iter().filter(|n| n.starts_with(prefix)).count()
    }
}

impl CaptureAndLogPort for FakeRecorder {
    async fn take_photo(&self) -> Result<(), CaptureError> {
        self.0.photos.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_capture {
            return Err(CaptureError("camera not responding".to_string()));
        }
        Ok(())
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<(), LogError> {
        if self.0.fail_log {
            return Err(LogError::Append("disk full".to_string()));
        }
        self.0.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct ScriptedClassifier {
    answers: Arc<Mutex<VecDeque<Result<bool, ClassificationError>>>>,
    labels: Arc<Mutex<Vec<String>>>,
}

impl ScriptedClassifier {
    fn new(answers: impl IntoIterator<Item = Result<bool, ClassificationError>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into_iter().collect())),
            labels: Arc::default(),
        }
    }

    fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

impl ClassificationPort for ScriptedClassifier {
    async fn ask_yes_no(&self, label: &str) -> Result<bool, ClassificationError> {
        self.labels.lock().unwrap().push(label.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(Ok(false))
    }
}

struct RejectingArea;

impl AreaSource for RejectingArea {
    async fn request_area(&self) -> Result<SurveyArea, MissionError> {
        Err(MissionError::InvalidConfig("spacing must be positive".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn point(lat: f64, lon: f64) -> GeoPoint {
    GeoPoint::new(lat, lon).unwrap()
}

fn home() -> HomePosition {
    HomePosition {
        point: point(46.9995, 7.9995),
        altitude_msl_m: 488.0,
    }
}

fn area() -> SurveyArea {
    let rect = Rectangle::from_corners(point(47.001, 8.0), point(47.0, 8.002)).unwrap();
    SurveyArea::new(rect, 50.0).unwrap()
}

fn waypoint_count() -> usize {
    let area = area();
    generate_pattern(area.rectangle(), area.spacing_m())
        .unwrap()
        .len()
}

fn config() -> MissionConfig {
    MissionConfig {
        connect_address: "udpin:127.0.0.1:14540".to_string(),
        ..MissionConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn scripted_run_counts_each_answer() {
    let n = waypoint_count();
    assert!(n >= 6);
    let answers: Vec<_> = (0..n).map(|i| Ok(i % 3 == 0)).collect();
    let k = (0..n).filter(|i| i % 3 == 0).count();

    let vehicle = FakeVehicle::new(home());
    let recorder = FakeRecorder::default();
    let classifier = ScriptedClassifier::new(answers);
    let controller = MissionController::new(
        config(),
        vehicle.clone(),
        vehicle.clone(),
        recorder.clone(),
        classifier.clone(),
        area(),
    );

    let start = Instant::now();
    let summary = controller.run().await.unwrap();

    assert_eq!(summary.detected as usize, k);
    assert_eq!(summary.clear as usize, n - k);
    assert_eq!(summary.points_visited as usize, n);
    assert_eq!(summary.unclassified, 0);
    assert_eq!(summary.arrival_timeouts, 0);
    assert_eq!(summary.run_id, controller.run_id());

    assert_eq!(recorder.photos(), k);
    assert_eq!(recorder.count_prefix("FLAG=True at Scan WP"), k);
    assert_eq!(recorder.count_prefix("FLAG=False at Scan WP"), n - k);
    assert_eq!(
        recorder.notes().last().unwrap(),
        &format!("SUMMARY | total={n} | detected={k} | clear={}", n - k)
    );

    let expected_labels: Vec<String> = (1..=n).map(|i| format!("Scan WP {i}")).collect();
    assert_eq!(classifier.labels(), expected_labels);

    // settle + one dwell per waypoint, no arrival waits beyond a poll or two
    assert!(start.elapsed() >= Duration::from_secs(18 + 3 * n as u64));

    assert_eq!(*controller.phase().borrow(), MissionPhase::Complete);
    assert_eq!(vehicle.feed_listeners(), 0, "feed task still running");
}

#[tokio::test(start_paused = true)]
async fn commands_follow_state_machine_order() {
    let n = waypoint_count();
    let vehicle = FakeVehicle::new(home());
    let controller = MissionController::new(
        config(),
        vehicle.clone(),
        vehicle.clone(),
        FakeRecorder::default(),
        ScriptedClassifier::default(),
        area(),
    );
    controller.run().await.unwrap();

    let calls = vehicle.calls();
    assert_eq!(calls[0], Call::Connect("udpin:127.0.0.1:14540".to_string()));
    assert_eq!(calls[1], Call::Arm);
    assert_eq!(calls[2], Call::Takeoff);
    assert_eq!(calls.last(), Some(&Call::Land));
    assert_eq!(calls.len(), 3 + (n + 1) + 1);

    let area = area();
    let pattern = generate_pattern(area.rectangle(), area.spacing_m()).unwrap();
    let gotos = vehicle.gotos();
    assert_eq!(gotos.len(), n + 1);

    let mut previous = home().point;
    for (waypoint, (target, altitude, yaw)) in pattern.iter().zip(&gotos) {
        assert_eq!(*target, waypoint.point);
        assert_eq!(*altitude, 498.0);
        assert_eq!(*yaw, bearing_degrees(previous, waypoint.point));
        previous = waypoint.point;
    }

    let (target, altitude, yaw) = gotos[n];
    assert_eq!(target, home().point);
    assert_eq!(altitude, 498.0);
    assert_eq!(yaw, bearing_degrees(previous, home().point));
}

#[tokio::test(start_paused = true)]
async fn capture_failure_does_not_stop_mission() {
    let n = waypoint_count();
    let vehicle = FakeVehicle::new(home());
    let recorder = FakeRecorder::failing(true, false);
    let controller = MissionController::new(
        config(),
        vehicle.clone(),
        vehicle.clone(),
        recorder.clone(),
        ScriptedClassifier::new((0..n).map(|_| Ok(true))),
        area(),
    );

    let summary = controller.run().await.unwrap();
    assert_eq!(summary.detected as usize, n);
    assert_eq!(recorder.photos(), n);
    assert_eq!(recorder.count_prefix("FLAG=True"), n);
    assert_eq!(vehicle.calls().last(), Some(&Call::Land));
}

#[tokio::test(start_paused = true)]
async fn log_failure_does_not_stop_mission() {
    let vehicle = FakeVehicle::new(home());
    let recorder = FakeRecorder::failing(false, true);
    let controller = MissionController::new(
        config(),
        vehicle.clone(),
        vehicle.clone(),
        recorder.clone(),
        ScriptedClassifier::new([Ok(true), Ok(false)]),
        area(),
    );

    let summary = controller.run().await.unwrap();
    assert_eq!(summary.detected, 1);
    assert!(recorder.notes().is_empty());
    assert_eq!(vehicle.calls().last(), Some(&Call::Land));
}

#[tokio::test(start_paused = true)]
async fn classification_failure_marks_waypoint_unclassified() {
    let n = waypoint_count();
    let vehicle = FakeVehicle::new(home());
    let recorder = FakeRecorder::default();
    let classifier = ScriptedClassifier::new([
        Ok(true),
        Err(ClassificationError("input closed".to_string())),
        Ok(false),
    ]);
    let controller = MissionController::new(
        config(),
        vehicle.clone(),
        vehicle.clone(),
        recorder.clone(),
        classifier,
        area(),
    );

    let summary = controller.run().await.unwrap();
    assert_eq!(summary.detected, 1);
    assert_eq!(summary.unclassified, 1);
    assert_eq!(summary.clear as usize, n - 2);
    assert_eq!(summary.points_visited as usize, n);
    assert_eq!(recorder.photos(), 1);
    assert_eq!(recorder.count_prefix("UNCLASSIFIED at Scan WP 2 "), 1);
}

#[tokio::test(start_paused = true)]
async fn unreachable_targets_time_out_and_continue() {
    let n = waypoint_count();
    let vehicle = FakeVehicle::build(home(), false, false, None);
    let mut config = config();
    config.arrival.timeout = Duration::from_secs(30);
    let controller = MissionController::new(
        config,
        vehicle.clone(),
        vehicle.clone(),
        FakeRecorder::default(),
        ScriptedClassifier::default(),
        area(),
    );

    let start = Instant::now();
    let summary = controller.run().await.unwrap();
    // the vehicle never left home, so only the return leg arrives
    assert_eq!(summary.arrival_timeouts as usize, n);
    assert_eq!(summary.clear as usize, n);
    assert!(start.elapsed() > Duration::from_secs(30 * n as u64));
    assert_eq!(vehicle.calls().last(), Some(&Call::Land));
}

#[tokio::test(start_paused = true)]
async fn navigate_failure_aborts_without_landing() {
    let vehicle = FakeVehicle::build(home(), true, false, Some(2));
    let recorder = FakeRecorder::default();
    let controller = MissionController::new(
        config(),
        vehicle.clone(),
        vehicle.clone(),
        recorder.clone(),
        ScriptedClassifier::default(),
        area(),
    );

    let err = controller.run().await.unwrap_err();
    match err {
        MissionError::Transport(err) => assert_eq!(err.operation, "goto"),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(vehicle.gotos().len(), 2);
    assert!(!vehicle.calls().contains(&Call::Land));
    assert_eq!(recorder.count_prefix("SUMMARY"), 0);
    assert_eq!(vehicle.feed_listeners(), 0, "feed task still running");
    assert_eq!(
        *controller.phase().borrow(),
        MissionPhase::Scanning {
            index: 2,
            total: waypoint_count()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn connect_failure_is_fatal() {
    let vehicle = FakeVehicle::build(home(), true, true, None);
    let controller = MissionController::new(
        config(),
        vehicle.clone(),
        vehicle.clone(),
        FakeRecorder::default(),
        ScriptedClassifier::default(),
        area(),
    );

    assert!(matches!(
        controller.run().await,
        Err(MissionError::Transport(_))
    ));
    assert!(vehicle.calls().is_empty());
    assert_eq!(*controller.phase().borrow(), MissionPhase::Connecting);
}

#[tokio::test(start_paused = true)]
async fn rejected_area_fails_before_scanning() {
    let vehicle = FakeVehicle::new(home());
    let controller = MissionController::new(
        config(),
        vehicle.clone(),
        vehicle.clone(),
        FakeRecorder::default(),
        ScriptedClassifier::default(),
        RejectingArea,
    );

    assert!(matches!(
        controller.run().await,
        Err(MissionError::InvalidConfig(_))
    ));
    assert!(vehicle.gotos().is_empty());
    assert_eq!(vehicle.feed_listeners(), 0);
    assert_eq!(*controller.phase().borrow(), MissionPhase::AwaitingAreaInput);
}

#[tokio::test(start_paused = true)]
async fn tracker_follows_vehicle_during_run() {
    let vehicle = FakeVehicle::new(home());
    let controller = MissionController::new(
        config(),
        vehicle.clone(),
        vehicle.clone(),
        FakeRecorder::default(),
        ScriptedClassifier::default(),
        area(),
    );
    controller.run().await.unwrap();
    // the last update before landing was the return-home goto
    assert_eq!(controller.tracker().read(), Some(home().point));
}
