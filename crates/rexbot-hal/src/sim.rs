//! In-process simulated drivers for development machines and CI.
//!
//! Every stub records what it was asked to do so tests can assert on it,
//! and always succeeds.
//!
//! | Driver | Stub behaviour |
//! |---|---|
//! | [`SimMotorDriver`] | Appends every `(left, right)` command to a shared log. |
//! | [`SimLed`] | Stores the last state and counts writes. |
//! | [`SimCamera`] | Emits grey [`Frame`]s at the configured rate on a worker thread. |
//! | [`SimRangeFinder`] | Reports a fixed distance while measuring. |

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rexbot_types::{BotError, PropertyMap};
use tracing::{debug, info};

use crate::board::StatusLed;
use crate::camera::{CameraSettings, CaptureFormat, Frame, FrameFormat, ListenerChain, VideoSource};
use crate::configurable::{Configurable, InformationSource};
use crate::motors::MotorDriver;
use crate::range::RangeFinder;

// ────────────────────────────────────────────────────────────────────────────
// Motors
// ────────────────────────────────────────────────────────────────────────────

/// Shared log of `(left, right)` power commands.
pub type CommandLog = Arc<Mutex<Vec<(i8, i8)>>>;

/// A simulated motor driver that records every command.
#[derive(Default)]
pub struct SimMotorDriver {
    commands: CommandLog,
}

impl SimMotorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the command log, valid after the driver is boxed.
    pub fn commands(&self) -> CommandLog {
        Arc::clone(&self.commands)
    }
}

impl MotorDriver for SimMotorDriver {
    fn id(&self) -> &str {
        "sim_motors"
    }

    fn set_power(&mut self, left: i8, right: i8) -> Result<(), BotError> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((left, right));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LEDs
// ────────────────────────────────────────────────────────────────────────────

/// Observer for a [`SimLed`] that has been handed to a [`Board`][crate::Board].
#[derive(Debug, Clone, Default)]
pub struct SimLedHandle {
    on: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl SimLedHandle {
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

/// A simulated LED.
pub struct SimLed {
    id: String,
    handle: SimLedHandle,
}

impl SimLed {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: SimLedHandle::default(),
        }
    }

    pub fn handle(&self) -> SimLedHandle {
        self.handle.clone()
    }
}

impl StatusLed for SimLed {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, on: bool) -> Result<(), BotError> {
        self.handle.on.store(on, Ordering::SeqCst);
        self.handle.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn state(&self) -> bool {
        self.handle.is_on()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera producing flat grey frames.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rexbot_hal::camera::{CaptureFormat, FrameSink, ListenerChain, VideoSource};
/// use rexbot_hal::sim::SimCamera;
///
/// let camera = SimCamera::new(CaptureFormat { width: 8, height: 6, frame_rate: 30, jpeg_quality: 10 });
/// let frames = FrameSink::new();
/// camera.set_listener(ListenerChain::new().with_frames(Arc::clone(&frames)));
///
/// camera.start().unwrap();
/// std::thread::sleep(Duration::from_millis(100));
/// camera.signal_stop();
/// camera.wait_for_stop();
///
/// assert!(frames.frames_received() > 0);
/// ```
pub struct SimCamera {
    format: CaptureFormat,
    settings: Mutex<CameraSettings>,
    listener: Arc<Mutex<ListenerChain>>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimCamera {
    pub fn new(format: CaptureFormat) -> Self {
        Self {
            format,
            settings: Mutex::new(CameraSettings::default()),
            listener: Arc::new(Mutex::new(ListenerChain::new())),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Report an error through the listener chain as a real driver would.
    pub fn inject_error(&self, message: &str, fatal: bool) {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_error(message, fatal);
    }
}

impl VideoSource for SimCamera {
    fn set_listener(&self, chain: ListenerChain) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = chain;
    }

    fn start(&self) -> Result<(), BotError> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::Release);

        let running = Arc::clone(&self.running);
        let listener = Arc::clone(&self.listener);
        let format = self.format;
        let interval = Duration::from_secs(1) / format.frame_rate.max(1);

        let handle = thread::Builder::new()
            .name("sim-camera".to_string())
            .spawn(move || {
                let pixels = (format.width as usize) * (format.height as usize);
                let mut shade: u8 = 0;
                while running.load(Ordering::Acquire) {
                    let frame = Arc::new(Frame {
                        width: format.width,
                        height: format.height,
                        format: FrameFormat::Gray8,
                        data: vec![shade; pixels],
                    });
                    listener
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .on_frame(frame);
                    shade = shade.wrapping_add(1);
                    thread::sleep(interval);
                }
                debug!("sim camera worker exited");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                BotError::HardwareFault {
                    component: "sim_camera".to_string(),
                    details: format!("failed to spawn capture thread: {e}"),
                }
            })?;

        *worker = Some(handle);
        info!(
            width = format.width,
            height = format.height,
            fps = format.frame_rate,
            "sim camera started"
        );
        Ok(())
    }

    fn signal_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn wait_for_stop(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::error!("sim camera worker panicked");
        }
    }
}

impl Configurable for SimCamera {
    fn properties(&self) -> PropertyMap {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_properties()
    }

    fn set_property(&self, name: &str, value: &str) -> Result<(), BotError> {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(name, value)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Range finder
// ────────────────────────────────────────────────────────────────────────────

/// A simulated distance sensor that always sees an obstacle at a fixed range.
pub struct SimRangeFinder {
    distance_cm: f32,
    measuring: AtomicBool,
}

impl SimRangeFinder {
    pub fn new(distance_cm: f32) -> Self {
        Self {
            distance_cm,
            measuring: AtomicBool::new(false),
        }
    }

    pub fn is_measuring(&self) -> bool {
        self.measuring.load(Ordering::SeqCst)
    }
}

impl InformationSource for SimRangeFinder {
    fn information(&self) -> PropertyMap {
        let reading = if self.is_measuring() {
            format!("{:.1}", self.distance_cm)
        } else {
            "0.0".to_string()
        };
        PropertyMap::from([
            ("median".to_string(), reading.clone()),
            ("last".to_string(), reading),
        ])
    }
}

impl RangeFinder for SimRangeFinder {
    fn start_measurements(&self) {
        self.measuring.store(true, Ordering::SeqCst);
    }

    fn stop_measurements(&self) {
        self.measuring.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{ErrorSink, FrameSink};
    use std::time::Instant;

    fn small_camera() -> SimCamera {
        SimCamera::new(CaptureFormat {
            width: 4,
            height: 4,
            frame_rate: 30,
            jpeg_quality: 10,
        })
    }

    #[test]
    fn sim_motor_driver_records_commands() {
        let mut driver = SimMotorDriver::new();
        let log = driver.commands();
        driver.set_power(10, -10).unwrap();
        driver.set_power(0, 0).unwrap();
        assert_eq!(log.lock().unwrap().as_slice(), &[(10, -10), (0, 0)]);
    }

    #[test]
    fn sim_led_toggle() {
        let mut led = SimLed::new("power");
        let handle = led.handle();
        assert_eq!(led.id(), "power");
        assert!(!led.state());
        led.set_state(true).unwrap();
        assert!(handle.is_on());
        assert_eq!(handle.writes(), 1);
    }

    #[test]
    fn sim_camera_delivers_frames_until_stopped() {
        let camera = small_camera();
        let frames = FrameSink::new();
        camera.set_listener(ListenerChain::new().with_frames(Arc::clone(&frames)));

        camera.start().unwrap();
        assert!(camera.is_running());
        let deadline = Instant::now() + Duration::from_secs(5);
        while frames.frames_received() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        camera.signal_stop();
        camera.wait_for_stop();
        assert!(!camera.is_running());

        let after_stop = frames.frames_received();
        assert!(after_stop > 0);
        thread::sleep(Duration::from_millis(80));
        assert_eq!(frames.frames_received(), after_stop);

        let latest = frames.latest().unwrap();
        assert_eq!(latest.data.len(), 16);
        assert_eq!(latest.format, FrameFormat::Gray8);
    }

    #[test]
    fn wait_for_stop_without_start_returns() {
        let camera = small_camera();
        camera.signal_stop();
        camera.wait_for_stop();
    }

    #[test]
    fn injected_fatal_error_reaches_error_sink() {
        let camera = small_camera();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        camera.set_listener(
            ListenerChain::new().with_errors(ErrorSink::new(move || flag.store(true, Ordering::SeqCst))),
        );
        camera.inject_error("sensor unplugged", true);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn sim_camera_is_configurable() {
        let camera = small_camera();
        camera.set_property("brightness", "70").unwrap();
        assert_eq!(camera.property("brightness").unwrap(), "70");
        assert!(camera.set_property("brightness", "-1").is_err());
    }

    #[test]
    fn range_finder_reports_only_while_measuring() {
        let sensor = SimRangeFinder::new(42.0);
        assert_eq!(sensor.information()["median"], "0.0");
        sensor.start_measurements();
        assert_eq!(sensor.information()["median"], "42.0");
        assert_eq!(sensor.information()["last"], "42.0");
        sensor.stop_measurements();
        assert!(!sensor.is_measuring());
    }
}
