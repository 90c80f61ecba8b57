//! Settings – `~/.rexbot/config.toml`, `REXBOT_*` variables and flags.
//!
//! Each source produces a [`Config`] layer in which every field is optional.
//! Layers are merged with [`Config::merge`] (later wins) and the result is
//! turned into concrete [`Settings`] by [`Settings::resolve`], which fills
//! defaults and clamps out-of-range values.
//!
//! Precedence, lowest first: built-in defaults, config file, environment,
//! command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rexbot_hal::CaptureFormat;
use rexbot_runtime::SupervisorSettings;
use rexbot_types::{AccessGroup, BotError};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Supported capture sizes, selected by index.
pub const VIDEO_SIZES: [(u32, u32); 5] = [(320, 240), (480, 360), (640, 480), (800, 600), (1120, 840)];

pub const DEFAULT_SIZE_INDEX: u8 = 2;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_JPEG_QUALITY: u32 = 10;
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REALM: &str = "rexbot";
pub const DEFAULT_TITLE: &str = "RexBot";

// ─────────────────────────────────────────────────────────────────────────────
// Layers
// ─────────────────────────────────────────────────────────────────────────────

/// Supervisor timings as stored in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_ms: Option<u64>,
    pub motor_safety_ms: Option<u64>,
    pub activity_ms: Option<u64>,
    pub save_period_ticks: Option<u32>,
}

/// One layer of settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub size: Option<u8>,
    pub fps: Option<u32>,
    pub jpeg_quality: Option<u32>,
    pub port: Option<u16>,
    pub realm: Option<String>,
    /// htdigest users file.
    pub htpass: Option<PathBuf>,
    pub viewer: Option<AccessGroup>,
    pub operator: Option<AccessGroup>,
    /// Where camera settings are saved.
    pub camera_config: Option<PathBuf>,
    /// Directory of static web content.
    pub web_content: Option<PathBuf>,
    pub title: Option<String>,
    pub distance_sensor: Option<bool>,
    #[serde(skip_serializing_if = "TimingConfig::is_empty")]
    pub timing: TimingConfig,
}

impl TimingConfig {
    fn is_empty(&self) -> bool {
        *self == TimingConfig::default()
    }
}

impl Config {
    /// Overlay `over` on `self`; set fields in `over` win.
    pub fn merge(self, over: Config) -> Config {
        Config {
            size: over.size.or(self.size),
            fps: over.fps.or(self.fps),
            jpeg_quality: over.jpeg_quality.or(self.jpeg_quality),
            port: over.port.or(self.port),
            realm: over.realm.or(self.realm),
            htpass: over.htpass.or(self.htpass),
            viewer: over.viewer.or(self.viewer),
            operator: over.operator.or(self.operator),
            camera_config: over.camera_config.or(self.camera_config),
            web_content: over.web_content.or(self.web_content),
            title: over.title.or(self.title),
            distance_sensor: over.distance_sensor.or(self.distance_sensor),
            timing: TimingConfig {
                tick_ms: over.timing.tick_ms.or(self.timing.tick_ms),
                motor_safety_ms: over.timing.motor_safety_ms.or(self.timing.motor_safety_ms),
                activity_ms: over.timing.activity_ms.or(self.timing.activity_ms),
                save_period_ticks: over
                    .timing
                    .save_period_ticks
                    .or(self.timing.save_period_ticks),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config file
// ─────────────────────────────────────────────────────────────────────────────

/// The user's home directory, or `.` when it cannot be determined.
pub fn home_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// `<home>/.rexbot/config.toml`.
pub fn config_path_for_home(home: &Path) -> PathBuf {
    home.join(".rexbot").join("config.toml")
}

/// `<home>/.rexbot/camera.toml`.
pub fn camera_config_path_for_home(home: &Path) -> PathBuf {
    home.join(".rexbot").join("camera.toml")
}

/// Load a config layer from `path`.  Returns `None` if the file does not
/// exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, BotError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| BotError::Settings(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| BotError::Settings(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

// ─────────────────────────────────────────────────────────────────────────────
// Environment
// ─────────────────────────────────────────────────────────────────────────────

/// Build a layer from `REXBOT_*` variables.
///
/// | Variable | Field |
/// |---|---|
/// | `REXBOT_PORT` | `port` |
/// | `REXBOT_TITLE` | `title` |
/// | `REXBOT_HTPASS` | `htpass` |
/// | `REXBOT_CAMERA_CONFIG` | `camera_config` |
pub fn env_layer() -> Config {
    env_layer_from(|key| std::env::var(key).ok())
}

/// [`env_layer`] over an arbitrary variable lookup.
pub(crate) fn env_layer_from(lookup: impl Fn(&str) -> Option<String>) -> Config {
    let mut cfg = Config::default();
    if let Some(v) = lookup("REXBOT_PORT") {
        match v.trim().parse::<u16>() {
            Ok(port) => cfg.port = Some(port),
            Err(_) => warn!(value = %v, "ignoring invalid REXBOT_PORT"),
        }
    }
    if let Some(v) = lookup("REXBOT_TITLE")
        && !v.is_empty()
    {
        cfg.title = Some(v);
    }
    if let Some(v) = lookup("REXBOT_HTPASS")
        && !v.is_empty()
    {
        cfg.htpass = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup("REXBOT_CAMERA_CONFIG")
        && !v.is_empty()
    {
        cfg.camera_config = Some(PathBuf::from(v));
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved settings
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the binary needs, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub size_index: u8,
    pub capture: CaptureFormat,
    pub port: u16,
    pub realm: String,
    pub htpass: Option<PathBuf>,
    pub viewer: Option<AccessGroup>,
    pub operator: Option<AccessGroup>,
    pub camera_config: PathBuf,
    pub web_content: Option<PathBuf>,
    pub title: String,
    pub distance_sensor: bool,
    pub supervisor: SupervisorSettings,
}

impl Settings {
    /// Apply defaults to `cfg`.  `home` locates the default camera config
    /// file.
    ///
    /// Frame rates outside 1–30 fall back to 30 and JPEG quality is clamped
    /// to 1–100.  Zero timing values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Settings`] for a size index above 4.
    pub fn resolve(cfg: Config, home: &Path) -> Result<Settings, BotError> {
        let size_index = cfg.size.unwrap_or(DEFAULT_SIZE_INDEX);
        let (width, height) = *VIDEO_SIZES.get(usize::from(size_index)).ok_or_else(|| {
            BotError::Settings(format!(
                "video size index {size_index} is out of range (0-{})",
                VIDEO_SIZES.len() - 1
            ))
        })?;

        let frame_rate = match cfg.fps {
            Some(fps) if (1..=30).contains(&fps) => fps,
            Some(fps) => {
                warn!(fps, "frame rate out of range, using {DEFAULT_FPS}");
                DEFAULT_FPS
            }
            None => DEFAULT_FPS,
        };
        let jpeg_quality = cfg.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);

        let defaults = SupervisorSettings::default();
        let supervisor = SupervisorSettings {
            tick_period: window_or_default("tick_ms", cfg.timing.tick_ms, defaults.tick_period),
            motor_safety_window: window_or_default(
                "motor_safety_ms",
                cfg.timing.motor_safety_ms,
                defaults.motor_safety_window,
            ),
            activity_window: window_or_default(
                "activity_ms",
                cfg.timing.activity_ms,
                defaults.activity_window,
            ),
            save_period_ticks: cfg
                .timing
                .save_period_ticks
                .unwrap_or(defaults.save_period_ticks),
            operator_endpoint: defaults.operator_endpoint,
        };

        Ok(Settings {
            size_index,
            capture: CaptureFormat {
                width,
                height,
                frame_rate,
                jpeg_quality,
            },
            port: cfg.port.unwrap_or(DEFAULT_PORT),
            realm: cfg
                .realm
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REALM.to_string()),
            htpass: cfg.htpass,
            viewer: cfg.viewer,
            operator: cfg.operator,
            camera_config: cfg
                .camera_config
                .unwrap_or_else(|| camera_config_path_for_home(home)),
            web_content: cfg.web_content,
            title: cfg
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            distance_sensor: cfg.distance_sensor.unwrap_or(false),
            supervisor,
        })
    }
}

/// A zero tick would spin the supervision loop and a zero window would stop
/// the motors on every tick, so zero means "use the default".
fn window_or_default(name: &str, millis: Option<u64>, default: Duration) -> Duration {
    match millis {
        Some(0) => {
            warn!(
                setting = name,
                default_ms = default.as_millis() as u64,
                "zero duration is invalid, using default"
            );
            default
        }
        Some(ms) => Duration::from_millis(ms),
        None => default,
    }
}
