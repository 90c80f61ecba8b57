//! Video sources and the listener chain that distributes their output.
//!
//! A [`VideoSource`] runs its own capture thread and reports to a single
//! [`ListenerChain`].  The chain is a plain tagged list: each
//! [`VideoListener`] variant decides which notifications it cares about.
//!
//! | Variant | Frames | Errors |
//! |---|---|---|
//! | [`VideoListener::Frames`] | stores the latest frame | ignored |
//! | [`VideoListener::Errors`] | ignored | logged; fatal ones invoke a callback |

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rexbot_types::{BotError, PropertyMap};
use tracing::{error, warn};

use crate::configurable::{parse_flag, parse_ranged};

// ────────────────────────────────────────────────────────────────────────────
// Frames
// ────────────────────────────────────────────────────────────────────────────

/// Pixel encoding of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// A complete JPEG image, ready to serve.
    Jpeg,
    /// Raw 8-bit greyscale, row-major.
    Gray8,
}

impl FrameFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "image/jpeg",
            FrameFormat::Gray8 => "application/octet-stream",
        }
    }
}

/// One captured image.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub data: Vec<u8>,
}

/// Capture parameters fixed before the source starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub jpeg_quality: u32,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 30,
            jpeg_quality: 10,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Listeners
// ────────────────────────────────────────────────────────────────────────────

/// Keeps the most recent frame for snapshot requests.
#[derive(Debug, Default)]
pub struct FrameSink {
    latest: Mutex<Option<Arc<Frame>>>,
    received: AtomicU64,
}

impl FrameSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The most recent frame, if any has arrived yet.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of frames received so far.
    pub fn frames_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    fn push(&self, frame: Arc<Frame>) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        self.received.fetch_add(1, Ordering::Relaxed);
    }
}

/// Logs video errors and runs `on_fatal` for fatal ones.
#[derive(Clone)]
pub struct ErrorSink {
    on_fatal: Arc<dyn Fn() + Send + Sync>,
}

impl ErrorSink {
    pub fn new(on_fatal: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            on_fatal: Arc::new(on_fatal),
        }
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink").finish_non_exhaustive()
    }
}

/// One entry of a [`ListenerChain`].
#[derive(Debug, Clone)]
pub enum VideoListener {
    Frames(Arc<FrameSink>),
    Errors(ErrorSink),
}

/// Ordered fan-out of video notifications.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use rexbot_hal::camera::{ErrorSink, FrameSink, ListenerChain};
///
/// let fatal = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fatal);
/// let frames = FrameSink::new();
///
/// let chain = ListenerChain::new()
///     .with_frames(Arc::clone(&frames))
///     .with_errors(ErrorSink::new(move || flag.store(true, Ordering::SeqCst)));
///
/// chain.on_error("sensor timeout", false);
/// assert!(!fatal.load(Ordering::SeqCst));
/// chain.on_error("camera disconnected", true);
/// assert!(fatal.load(Ordering::SeqCst));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ListenerChain {
    listeners: Vec<VideoListener>,
}

impl ListenerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: VideoListener) {
        self.listeners.push(listener);
    }

    pub fn with_frames(mut self, sink: Arc<FrameSink>) -> Self {
        self.add(VideoListener::Frames(sink));
        self
    }

    pub fn with_errors(mut self, sink: ErrorSink) -> Self {
        self.add(VideoListener::Errors(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver a new frame to every interested listener.
    pub fn on_frame(&self, frame: Arc<Frame>) {
        for listener in &self.listeners {
            if let VideoListener::Frames(sink) = listener {
                sink.push(Arc::clone(&frame));
            }
        }
    }

    /// Report a video error to every interested listener.
    pub fn on_error(&self, message: &str, fatal: bool) {
        for listener in &self.listeners {
            if let VideoListener::Errors(sink) = listener {
                if fatal {
                    error!(fatal, "video source: {message}");
                    (sink.on_fatal)();
                } else {
                    warn!(fatal, "video source: {message}");
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// VideoSource
// ────────────────────────────────────────────────────────────────────────────

/// A camera that captures on its own thread.
///
/// Methods take `&self` because the source is shared between the lifecycle
/// (start/stop) and request handlers (configuration).
pub trait VideoSource: Send + Sync {
    /// Replace the listener chain.  Must be called before [`start`][Self::start].
    fn set_listener(&self, chain: ListenerChain);

    /// Start capturing.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::HardwareFault`] if the device cannot be opened.
    fn start(&self) -> Result<(), BotError>;

    /// Ask the capture thread to stop; returns immediately.
    fn signal_stop(&self);

    /// Block until the capture thread has fully stopped.  Returns at once if
    /// the source was never started.
    fn wait_for_stop(&self);
}

// ────────────────────────────────────────────────────────────────────────────
// CameraSettings
// ────────────────────────────────────────────────────────────────────────────

/// Image-tuning settings persisted across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSettings {
    pub brightness: i32,
    pub contrast: i32,
    pub saturation: i32,
    pub sharpness: i32,
    pub hflip: bool,
    pub vflip: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            brightness: 50,
            contrast: 0,
            saturation: 0,
            sharpness: 0,
            hflip: false,
            vflip: false,
        }
    }
}

impl CameraSettings {
    pub fn to_properties(&self) -> PropertyMap {
        PropertyMap::from([
            ("brightness".to_string(), self.brightness.to_string()),
            ("contrast".to_string(), self.contrast.to_string()),
            ("saturation".to_string(), self.saturation.to_string()),
            ("sharpness".to_string(), self.sharpness.to_string()),
            ("hflip".to_string(), self.hflip.to_string()),
            ("vflip".to_string(), self.vflip.to_string()),
        ])
    }

    /// Validate and apply one named setting.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), BotError> {
        match name {
            "brightness" => self.brightness = parse_ranged(name, value, 0, 100)?,
            "contrast" => self.contrast = parse_ranged(name, value, -100, 100)?,
            "saturation" => self.saturation = parse_ranged(name, value, -100, 100)?,
            "sharpness" => self.sharpness = parse_ranged(name, value, -100, 100)?,
            "hflip" => self.hflip = parse_flag(name, value)?,
            "vflip" => self.vflip = parse_flag(name, value)?,
            _ => return Err(BotError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }
}
