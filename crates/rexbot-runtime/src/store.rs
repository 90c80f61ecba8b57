//! [`ConfigStore`] – persistence of device configuration across restarts.
//!
//! [`FileConfigStore`] keeps one [`Configurable`]'s property map in a TOML
//! file:
//!
//! ```toml
//! brightness = "60"
//! contrast = "0"
//! hflip = "false"
//! ```
//!
//! Hand-edited files may use bare integers, floats or booleans; they are
//! converted to their string form on load.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rexbot_hal::Configurable;
use rexbot_types::{BotError, PropertyMap};
use tracing::{debug, warn};

/// Loads and saves configuration for the supervision loop.
pub trait ConfigStore: Send {
    /// Restore saved configuration.  A store with nothing saved yet is not an
    /// error.
    fn load(&self) -> Result<(), BotError>;

    /// Persist the current configuration.
    fn save(&self) -> Result<(), BotError>;
}

/// TOML-file backed [`ConfigStore`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rexbot_hal::{CaptureFormat, Configurable};
/// use rexbot_hal::sim::SimCamera;
/// use rexbot_runtime::store::{ConfigStore, FileConfigStore};
///
/// let dir = tempfile::tempdir().unwrap();
/// let camera = Arc::new(SimCamera::new(CaptureFormat::default()));
/// let store = FileConfigStore::new(dir.path().join("camera.toml"), camera.clone());
///
/// store.load().unwrap(); // nothing saved yet
/// camera.set_property("brightness", "65").unwrap();
/// store.save().unwrap();
///
/// let fresh = Arc::new(SimCamera::new(CaptureFormat::default()));
/// FileConfigStore::new(dir.path().join("camera.toml"), fresh.clone()).load().unwrap();
/// assert_eq!(fresh.property("brightness").unwrap(), "65");
/// ```
pub struct FileConfigStore {
    path: PathBuf,
    target: Arc<dyn Configurable>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>, target: Arc<dyn Configurable>) -> Self {
        Self {
            path: path.into(),
            target,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    /// Properties the target rejects are logged and skipped so one stale
    /// entry does not discard the rest of the file.
    fn load(&self) -> Result<(), BotError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no saved configuration");
            return Ok(());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            BotError::Persistence(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let props = parse_table(&raw)
            .map_err(|e| BotError::Persistence(format!("{}: {e}", self.path.display())))?;

        let mut applied = 0usize;
        for (name, value) in &props {
            match self.target.set_property(name, value) {
                Ok(()) => applied += 1,
                Err(e) => warn!(path = %self.path.display(), error = %e, "skipping saved property"),
            }
        }
        debug!(path = %self.path.display(), applied, total = props.len(), "configuration restored");
        Ok(())
    }

    fn save(&self) -> Result<(), BotError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                BotError::Persistence(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let raw = toml::to_string(&self.target.properties())
            .map_err(|e| BotError::Persistence(format!("failed to serialize configuration: {e}")))?;

        // Write next to the target and rename so a crash mid-write never
        // leaves a truncated file behind.
        let staging = self.path.with_extension("toml.tmp");
        fs::write(&staging, raw).map_err(|e| {
            BotError::Persistence(format!("failed to write {}: {e}", staging.display()))
        })?;
        fs::rename(&staging, &self.path).map_err(|e| {
            BotError::Persistence(format!("failed to replace {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

fn parse_table(raw: &str) -> Result<PropertyMap, String> {
    let table: toml::Table = raw.parse().map_err(|e| format!("invalid TOML: {e}"))?;
    table
        .into_iter()
        .map(|(name, value)| match value {
            toml::Value::String(s) => Ok((name, s)),
            toml::Value::Integer(i) => Ok((name, i.to_string())),
            toml::Value::Float(f) => Ok((name, f.to_string())),
            toml::Value::Boolean(b) => Ok((name, b.to_string())),
            other => Err(format!("unsupported value for '{name}': {other}")),
        })
        .collect()
}
