//! [`ServiceLifecycle`] – init → run → shutdown for the whole robot.
//!
//! ```text
//!  Initializing ──transport up──▶ Running ──signal──▶ ShuttingDown ──▶ Stopped
//!       │
//!       └──transport failed──▶ Failed
//! ```
//!
//! While `Running` the calling thread blocks in
//! [`ShutdownSignal::wait_timeout`] for one tick period at a time.  Every
//! wake-up without a signal is one tick, decided by [`Supervisor::tick`]:
//!
//! 1. advance the [`PersistenceScheduler`] and save if due;
//! 2. stop the motors if the operator endpoint has been idle for the safety
//!    window;
//! 3. light the activity LED if any endpoint was used within the activity
//!    window.
//!
//! Teardown always saves once more, then stops the range finder, the camera,
//! the transport and the motors, and finally switches the LEDs off.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rexbot_hal::{ActuatorControl, Board, ErrorSink, FrameSink, ListenerChain, RangeFinder, VideoSource};
use rexbot_kernel::{
    ActivityHeartbeat, DEFAULT_ACTIVITY_WINDOW, DEFAULT_MOTOR_SAFETY_WINDOW,
    DEFAULT_SAVE_PERIOD_TICKS, MotorSafetyWatchdog, PersistenceScheduler, ShutdownSignal, Transport,
};
use rexbot_types::BotError;
use tracing::{debug, error, info, warn};

use crate::store::ConfigStore;

/// Path whose activity keeps the motors running.
pub const OPERATOR_ENDPOINT: &str = "/motors/config";

/// Default supervision tick.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1000);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Timing of the supervision loop.  Every value is independent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub tick_period: Duration,
    pub motor_safety_window: Duration,
    pub activity_window: Duration,
    pub save_period_ticks: u32,
    pub operator_endpoint: String,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            motor_safety_window: DEFAULT_MOTOR_SAFETY_WINDOW,
            activity_window: DEFAULT_ACTIVITY_WINDOW,
            save_period_ticks: DEFAULT_SAVE_PERIOD_TICKS,
            operator_endpoint: OPERATOR_ENDPOINT.to_string(),
        }
    }
}

/// Where the lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
    /// Stopped without ever reaching `Running`.
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Initializing => "initializing",
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting-down",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────────────────

/// What one tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub save_due: bool,
    pub stop_motors: bool,
    pub activity: bool,
}

/// The per-tick decision logic, free of any I/O.
///
/// # Example
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use rexbot_runtime::lifecycle::{Supervisor, SupervisorSettings};
///
/// let mut supervisor = Supervisor::new(&SupervisorSettings::default());
/// let t0 = Instant::now();
///
/// // Operator last seen at t0: motors keep running for just under a second.
/// let report = supervisor.decide(t0 + Duration::from_millis(999), t0, t0);
/// assert!(!report.stop_motors);
/// let report = supervisor.decide(t0 + Duration::from_millis(1000), t0, t0);
/// assert!(report.stop_motors);
/// ```
#[derive(Debug, Clone)]
pub struct Supervisor {
    scheduler: PersistenceScheduler,
    watchdog: MotorSafetyWatchdog,
    heartbeat: ActivityHeartbeat,
}

impl Supervisor {
    pub fn new(settings: &SupervisorSettings) -> Self {
        Self {
            scheduler: PersistenceScheduler::new(settings.save_period_ticks),
            watchdog: MotorSafetyWatchdog::new(
                settings.operator_endpoint.clone(),
                settings.motor_safety_window,
            ),
            heartbeat: ActivityHeartbeat::new(settings.activity_window),
        }
    }

    /// Evaluate one tick against the transport's activity record.
    pub fn tick(&mut self, now: Instant, transport: &dyn Transport) -> TickReport {
        let last_operator = transport.last_access(Some(self.watchdog.endpoint()));
        let last_any = transport.last_access(None);
        self.decide(now, last_operator, last_any)
    }

    /// Evaluate one tick from explicit last-access instants.
    pub fn decide(&mut self, now: Instant, last_operator: Instant, last_any: Instant) -> TickReport {
        TickReport {
            save_due: self.scheduler.on_tick(),
            stop_motors: self.watchdog.should_stop_since(last_operator, now),
            activity: self.heartbeat.is_active_since(last_any, now),
        }
    }

    /// Ticks counted since the last save.
    pub fn ticks_since_save(&self) -> u32 {
        self.scheduler.counter()
    }

    /// The shutdown save, which happens regardless of tick phase.
    fn force_save(&mut self) -> bool {
        self.scheduler.force()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceLifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the lifecycle drives.
pub struct Collaborators {
    pub board: Board,
    pub transport: Box<dyn Transport>,
    pub camera: Arc<dyn VideoSource>,
    /// Receives camera frames for the snapshot endpoint.
    pub frames: Arc<FrameSink>,
    pub motors: Arc<dyn ActuatorControl>,
    pub store: Box<dyn ConfigStore>,
    pub range_finder: Option<Arc<dyn RangeFinder>>,
}

/// Top-level driver.
///
/// [`run`][Self::run] is the normal entry point; [`start`][Self::start],
/// [`step`][Self::step], [`run_until_signaled`][Self::run_until_signaled]
/// and [`shutdown`][Self::shutdown] are its stages, public so each one can
/// be driven on its own.
pub struct ServiceLifecycle {
    settings: SupervisorSettings,
    supervisor: Supervisor,
    signal: ShutdownSignal,
    parts: Collaborators,
    state: LifecycleState,
}

impl ServiceLifecycle {
    pub fn new(settings: SupervisorSettings, parts: Collaborators, signal: ShutdownSignal) -> Self {
        Self {
            supervisor: Supervisor::new(&settings),
            settings,
            signal,
            parts,
            state: LifecycleState::Initializing,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Handle to the exit flag this lifecycle waits on.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Start every collaborator, then block until the shutdown signal and
    /// tear everything down.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Transport`] if the transport cannot start; the
    /// lifecycle then ends in [`LifecycleState::Failed`].
    pub fn run(&mut self) -> Result<(), BotError> {
        self.start()?;
        self.run_until_signaled();
        self.shutdown();
        Ok(())
    }

    /// `Initializing → Running`.
    pub fn start(&mut self) -> Result<(), BotError> {
        self.parts.board.init();

        if let Err(e) = self.parts.store.load() {
            warn!(error = %e, "failed to restore configuration");
        }

        let signal = self.signal.clone();
        let chain = ListenerChain::new()
            .with_frames(Arc::clone(&self.parts.frames))
            .with_errors(ErrorSink::new(move || {
                if signal.signal() {
                    info!(source = "video", "shutdown requested");
                }
            }));
        self.parts.camera.set_listener(chain);

        if let Err(e) = self.parts.transport.start() {
            error!(endpoint = %self.parts.transport.endpoint(), error = %e, "failed to start transport");
            self.parts.motors.stop();
            self.parts.board.release();
            self.state = LifecycleState::Failed;
            return Err(e);
        }
        info!(endpoint = %self.parts.transport.endpoint(), "transport started");

        if let Err(e) = self.parts.camera.start() {
            error!(error = %e, "failed to start video, shutting down");
            self.signal.signal();
        }
        if let Some(range_finder) = &self.parts.range_finder {
            range_finder.start_measurements();
        }

        self.state = LifecycleState::Running;
        info!(state = %self.state, "supervisor running");
        Ok(())
    }

    /// Apply one tick at `now`.
    pub fn step(&mut self, now: Instant) -> TickReport {
        let report = self.supervisor.tick(now, self.parts.transport.as_ref());
        if report.save_due {
            self.save();
        }
        if report.stop_motors {
            self.parts.motors.stop();
        }
        self.parts.board.set_activity(report.activity);
        report
    }

    /// Tick until the shutdown signal is raised.  Returns immediately unless
    /// the lifecycle is `Running`.
    pub fn run_until_signaled(&mut self) {
        if self.state != LifecycleState::Running {
            return;
        }
        while !self.signal.wait_timeout(self.settings.tick_period) {
            self.step(Instant::now());
        }
        info!(
            ticks_since_save = self.supervisor.ticks_since_save(),
            "shutdown requested"
        );
    }

    /// `Running → ShuttingDown → Stopped`.  A lifecycle that never ran is
    /// left as it is.
    pub fn shutdown(&mut self) {
        if self.state != LifecycleState::Running {
            return;
        }
        self.state = LifecycleState::ShuttingDown;

        if self.supervisor.force_save() {
            self.save();
        }
        if let Some(range_finder) = &self.parts.range_finder {
            range_finder.stop_measurements();
        }
        self.parts.camera.signal_stop();
        self.parts.camera.wait_for_stop();
        self.parts.transport.stop();
        self.parts.motors.stop();
        self.parts.board.release();

        self.state = LifecycleState::Stopped;
        info!(state = %self.state, "supervisor stopped");
    }

    fn save(&self) {
        match self.parts.store.save() {
            Ok(()) => debug!("configuration saved"),
            Err(e) => warn!(error = %e, "failed to save configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rexbot_hal::sim::{SimLed, SimLedHandle};
    use rexbot_kernel::ActivityLog;
    use std::sync::Mutex;

    // ── Recording collaborators ───────────────────────────────────────────────

    type Journal = Arc<Mutex<Vec<String>>>;

    fn note(journal: &Journal, entry: &str) {
        journal.lock().unwrap().push(entry.to_string());
    }

    fn count(journal: &Journal, entry: &str) -> usize {
        journal.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    struct FakeTransport {
        journal: Journal,
        activity: Arc<ActivityLog>,
        fail: bool,
    }

    impl Transport for FakeTransport {
        fn endpoint(&self) -> String {
            "fake://".to_string()
        }

        fn start(&mut self) -> Result<(), BotError> {
            note(&self.journal, "transport.start");
            if self.fail {
                return Err(BotError::Transport("address in use".to_string()));
            }
            Ok(())
        }

        fn stop(&mut self) {
            note(&self.journal, "transport.stop");
        }

        fn last_access(&self, endpoint: Option<&str>) -> Instant {
            self.activity
                .last_access(endpoint.unwrap_or(rexbot_kernel::ANY_ENDPOINT))
        }
    }

    struct FakeCamera {
        journal: Journal,
        chain: Mutex<ListenerChain>,
    }

    impl FakeCamera {
        fn fail(&self, fatal: bool) {
            self.chain.lock().unwrap().on_error("sensor lost", fatal);
        }
    }

    impl VideoSource for FakeCamera {
        fn set_listener(&self, chain: ListenerChain) {
            *self.chain.lock().unwrap() = chain;
        }

        fn start(&self) -> Result<(), BotError> {
            note(&self.journal, "camera.start");
            Ok(())
        }

        fn signal_stop(&self) {
            note(&self.journal, "camera.signal_stop");
        }

        fn wait_for_stop(&self) {
            note(&self.journal, "camera.wait_for_stop");
        }
    }

    struct FakeMotors(Journal);

    impl ActuatorControl for FakeMotors {
        fn stop(&self) {
            note(&self.0, "motors.stop");
        }

        fn is_moving(&self) -> bool {
            false
        }
    }

    struct FakeStore {
        journal: Journal,
        fail_save: bool,
    }

    impl ConfigStore for FakeStore {
        fn load(&self) -> Result<(), BotError> {
            note(&self.journal, "store.load");
            Ok(())
        }

        fn save(&self) -> Result<(), BotError> {
            note(&self.journal, "store.save");
            if self.fail_save {
                return Err(BotError::Persistence("disk full".to_string()));
            }
            Ok(())
        }
    }

    struct FakeRange(Journal);

    impl rexbot_hal::InformationSource for FakeRange {
        fn information(&self) -> rexbot_types::PropertyMap {
            rexbot_types::PropertyMap::new()
        }
    }

    impl RangeFinder for FakeRange {
        fn start_measurements(&self) {
            note(&self.0, "range.start");
        }

        fn stop_measurements(&self) {
            note(&self.0, "range.stop");
        }
    }

    struct Rig {
        lifecycle: ServiceLifecycle,
        journal: Journal,
        activity: Arc<ActivityLog>,
        camera: Arc<FakeCamera>,
        power: SimLedHandle,
        led: SimLedHandle,
    }

    fn rig(fail_transport: bool, fail_save: bool) -> Rig {
        let journal: Journal = Arc::default();
        let activity = Arc::new(ActivityLog::new());
        let camera = Arc::new(FakeCamera {
            journal: Arc::clone(&journal),
            chain: Mutex::new(ListenerChain::new()),
        });
        let power = SimLed::new("power");
        let led = SimLed::new("activity");
        let (power_handle, led_handle) = (power.handle(), led.handle());

        let parts = Collaborators {
            board: Board::new()
                .with_power_led(Box::new(power))
                .with_activity_led(Box::new(led)),
            transport: Box::new(FakeTransport {
                journal: Arc::clone(&journal),
                activity: Arc::clone(&activity),
                fail: fail_transport,
            }),
            camera: camera.clone(),
            frames: FrameSink::new(),
            motors: Arc::new(FakeMotors(Arc::clone(&journal))),
            store: Box::new(FakeStore {
                journal: Arc::clone(&journal),
                fail_save,
            }),
            range_finder: Some(Arc::new(FakeRange(Arc::clone(&journal)))),
        };
        Rig {
            lifecycle: ServiceLifecycle::new(SupervisorSettings::default(), parts, ShutdownSignal::new()),
            journal,
            activity,
            camera,
            power: power_handle,
            led: led_handle,
        }
    }

    // ── Supervisor ────────────────────────────────────────────────────────────

    #[test]
    fn operator_window_boundary() {
        let mut supervisor = Supervisor::new(&SupervisorSettings::default());
        let t0 = Instant::now();
        let ms = Duration::from_millis;

        assert!(!supervisor.decide(t0 + ms(999), t0, t0).stop_motors);
        assert!(supervisor.decide(t0 + ms(1000), t0, t0).stop_motors);
        assert!(supervisor.decide(t0 + ms(1500), t0, t0).stop_motors);
    }

    #[test]
    fn activity_window_is_independent_of_safety_window() {
        let mut supervisor = Supervisor::new(&SupervisorSettings::default());
        let t0 = Instant::now();
        let report = supervisor.decide(t0 + Duration::from_millis(1500), t0, t0);
        assert!(report.stop_motors);
        assert!(report.activity);
        let report = supervisor.decide(t0 + Duration::from_millis(2000), t0, t0);
        assert!(!report.activity);
    }

    #[test]
    fn save_due_on_sixtieth_tick_only() {
        let mut supervisor = Supervisor::new(&SupervisorSettings::default());
        let now = Instant::now();
        let due: Vec<usize> = (1..=180)
            .filter(|_| supervisor.decide(now, now, now).save_due)
            .collect();
        assert_eq!(due, vec![60, 120, 180]);
    }

    #[test]
    fn tick_reads_transport_activity() {
        let t0 = Instant::now();
        let activity = Arc::new(ActivityLog::with_epoch(t0));
        let transport = FakeTransport {
            journal: Arc::default(),
            activity: Arc::clone(&activity),
            fail: false,
        };
        let mut supervisor = Supervisor::new(&SupervisorSettings::default());

        activity.touch_at("/camera/jpeg", t0 + Duration::from_millis(900));
        let report = supervisor.tick(t0 + Duration::from_millis(1000), &transport);
        assert!(report.stop_motors);
        assert!(report.activity);

        activity.touch_at(OPERATOR_ENDPOINT, t0 + Duration::from_millis(1000));
        let report = supervisor.tick(t0 + Duration::from_millis(1999), &transport);
        assert!(!report.stop_motors);
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    #[test]
    fn start_follows_init_order() {
        let mut r = rig(false, false);
        r.lifecycle.start().unwrap();
        assert_eq!(r.lifecycle.state(), LifecycleState::Running);
        assert_eq!(
            *r.journal.lock().unwrap(),
            vec!["store.load", "transport.start", "camera.start", "range.start"]
        );
        assert!(r.power.is_on());
        assert!(!r.led.is_on());
    }

    #[test]
    fn transport_failure_never_starts_video() {
        let mut r = rig(true, false);
        let err = r.lifecycle.run().unwrap_err();
        assert!(matches!(err, BotError::Transport(_)));
        assert_eq!(r.lifecycle.state(), LifecycleState::Failed);
        assert_eq!(count(&r.journal, "camera.start"), 0);
        assert_eq!(count(&r.journal, "range.start"), 0);
        assert_eq!(count(&r.journal, "motors.stop"), 1);
        assert_eq!(count(&r.journal, "store.save"), 0);
        assert!(!r.power.is_on());
    }

    #[test]
    fn idle_operator_stops_motors_every_tick() {
        let mut r = rig(false, false);
        r.lifecycle.start().unwrap();
        let t0 = Instant::now();
        r.activity.touch_at(OPERATOR_ENDPOINT, t0);

        r.lifecycle.step(t0 + Duration::from_millis(999));
        assert_eq!(count(&r.journal, "motors.stop"), 0);
        assert!(r.led.is_on());

        for i in 0..3 {
            r.lifecycle.step(t0 + Duration::from_millis(1000 + i * 1000));
        }
        assert_eq!(count(&r.journal, "motors.stop"), 3);
        assert!(!r.led.is_on());
    }

    #[test]
    fn signal_mid_period_saves_exactly_once() {
        let mut r = rig(false, false);
        r.lifecycle.start().unwrap();
        let now = Instant::now();
        for _ in 0..44 {
            r.lifecycle.step(now);
        }
        r.lifecycle.shutdown_signal().signal();
        r.lifecycle.run_until_signaled();
        r.lifecycle.shutdown();

        assert_eq!(count(&r.journal, "store.save"), 1);
        assert_eq!(r.lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn teardown_order() {
        let mut r = rig(false, false);
        r.lifecycle.start().unwrap();
        r.journal.lock().unwrap().clear();
        r.lifecycle.shutdown_signal().signal();
        r.lifecycle.run_until_signaled();
        r.lifecycle.shutdown();

        assert_eq!(
            *r.journal.lock().unwrap(),
            vec![
                "store.save",
                "range.stop",
                "camera.signal_stop",
                "camera.wait_for_stop",
                "transport.stop",
                "motors.stop",
            ]
        );
        assert!(!r.power.is_on());
        assert!(!r.led.is_on());
    }

    #[test]
    fn save_failures_are_not_fatal() {
        let mut r = rig(false, true);
        r.lifecycle.shutdown_signal().signal();
        r.lifecycle.run().unwrap();
        assert_eq!(r.lifecycle.state(), LifecycleState::Stopped);
        assert_eq!(count(&r.journal, "store.save"), 1);
    }

    #[test]
    fn fatal_camera_error_raises_shutdown() {
        let mut r = rig(false, false);
        r.lifecycle.start().unwrap();
        let signal = r.lifecycle.shutdown_signal();

        r.camera.fail(false);
        assert!(!signal.is_signaled());
        r.camera.fail(true);
        assert!(signal.is_signaled());

        r.lifecycle.run_until_signaled();
        r.lifecycle.shutdown();
        assert_eq!(r.lifecycle.state(), LifecycleState::Stopped);
    }

    /// Counts `ERROR` events seen while installed as the default subscriber.
    struct ErrorCounter(Arc<std::sync::atomic::AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ErrorCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn fatal_camera_error_is_logged_once() {
        use tracing_subscriber::layer::SubscriberExt;

        let errors = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(Arc::clone(&errors)));

        let mut r = rig(false, false);
        r.lifecycle.start().unwrap();
        tracing::subscriber::with_default(subscriber, || r.camera.fail(true));

        assert!(r.lifecycle.shutdown_signal().is_signaled());
        assert_eq!(errors.load(std::sync::atomic::Ordering::SeqCst), 1);
        r.lifecycle.shutdown();
    }

    #[test]
    fn run_returns_after_signal_from_another_thread() {
        let mut r = rig(false, false);
        let signal = r.lifecycle.shutdown_signal();
        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            signal.signal();
        });
        r.lifecycle.run().unwrap();
        raiser.join().unwrap();
        assert_eq!(r.lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn shutdown_before_start_is_noop() {
        let mut r = rig(false, false);
        r.lifecycle.shutdown();
        assert_eq!(r.lifecycle.state(), LifecycleState::Initializing);
        assert!(r.journal.lock().unwrap().is_empty());
    }

    #[test]
    fn state_names() {
        assert_eq!(LifecycleState::ShuttingDown.to_string(), "shutting-down");
        assert_eq!(LifecycleState::Failed.to_string(), "failed");
    }
}
