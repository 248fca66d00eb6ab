//! Configuration loading and management
//!
//! Two layers: [`Config`] is resolved from the environment at startup and
//! never written back; [`Settings`] is the small JSON record shared with
//! the desktop front-end (device address and capture index).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Consecutive positive frames before the stable signal asserts
pub const DEFAULT_TRIGGER_FRAMES: u32 = 3;
/// Consecutive negative frames before the stable signal retracts
pub const DEFAULT_IDLE_FRAMES: u32 = 100;
/// Target-class confidence a frame must exceed to count as a detection
pub const DEFAULT_CONFIDENCE: f32 = 0.45;

const SETTINGS_FILE_NAME: &str = "bt_config.json";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the persisted settings JSON
    pub settings_path: PathBuf,

    /// Frame-scoring helper used for capture
    pub capture_command: Option<PathBuf>,

    /// Audio-route helper used by the actuator
    pub actuator_command: Option<PathBuf>,

    /// Debounce thresholds and loop timings
    pub tuning: Tuning,
}

/// Thresholds and polling intervals for every loop in the daemon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub trigger_frames: u32,
    pub idle_frames: u32,
    pub confidence: f32,
    /// Pause between detection cycles
    pub cycle_interval: Duration,
    /// Bounded wait after a failed acquisition or frame read
    pub retry_wait: Duration,
    /// Idle wait while detection is disabled
    pub disabled_wait: Duration,
    /// Status publisher poll period
    pub status_interval: Duration,
    /// Upper bound on a single actuator operation
    pub actuator_timeout: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            trigger_frames: DEFAULT_TRIGGER_FRAMES,
            idle_frames: DEFAULT_IDLE_FRAMES,
            confidence: DEFAULT_CONFIDENCE,
            cycle_interval: Duration::from_millis(5),
            retry_wait: Duration::from_millis(50),
            disabled_wait: Duration::from_millis(200),
            status_interval: Duration::from_millis(250),
            actuator_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let settings_path = match std::env::var_os("HOLDSENSE_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = std::env::var("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".config")
                    .join("holdsense")
                    .join(SETTINGS_FILE_NAME)
            }
        };

        let defaults = Tuning::default();
        let tuning = Tuning {
            trigger_frames: env_or("HOLDSENSE_TRIGGER_FRAMES", defaults.trigger_frames).max(1),
            idle_frames: env_or("HOLDSENSE_IDLE_FRAMES", defaults.idle_frames).max(1),
            confidence: env_or("HOLDSENSE_CONFIDENCE", defaults.confidence),
            cycle_interval: env_millis("HOLDSENSE_CYCLE_MS", defaults.cycle_interval),
            retry_wait: env_millis("HOLDSENSE_RETRY_MS", defaults.retry_wait),
            disabled_wait: env_millis("HOLDSENSE_DISABLED_MS", defaults.disabled_wait),
            status_interval: env_millis("HOLDSENSE_STATUS_MS", defaults.status_interval),
            actuator_timeout: Duration::from_secs(env_or(
                "HOLDSENSE_ACTUATOR_TIMEOUT_SECS",
                defaults.actuator_timeout.as_secs(),
            )),
        };

        Ok(Self {
            settings_path,
            capture_command: env_path("HOLDSENSE_CAPTURE_COMMAND"),
            actuator_command: env_path("HOLDSENSE_ACTUATOR_COMMAND"),
            tuning,
        })
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn env_or<T: FromStr + Copy + std::fmt::Debug>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(env_or(key, default.as_millis() as u64))
}

fn parse_or<T: FromStr + Copy + std::fmt::Debug>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, raw, ?default, "unparseable value, using default");
            default
        }
    }
}

/// Errors reading or writing the persisted settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings shared with the desktop front-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Bluetooth address (or platform device id) of the phone
    #[serde(rename = "phone_bt_address", default)]
    pub device_address: String,

    /// Camera index handed to the capture helper
    #[serde(
        rename = "webcam_index",
        default,
        deserialize_with = "capture_index_lenient"
    )]
    pub capture_index: u32,

    /// Initial state of automatic detection
    #[serde(default)]
    pub detection_enabled: bool,

    /// Initial state of the manual keybind
    #[serde(default = "default_true")]
    pub keybind_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_address: String::new(),
            capture_index: 0,
            detection_enabled: false,
            keybind_enabled: true,
        }
    }
}

impl Settings {
    /// Configured device address, if any
    pub fn device_address(&self) -> Option<&str> {
        let trimmed = self.device_address.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

fn default_true() -> bool {
    true
}

/// Accepts integers and numeric strings; anything negative or unparseable is 0
fn capture_index_lenient<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let index = match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(index.and_then(|i| u32::try_from(i).ok()).unwrap_or(0))
}

/// Reads and writes [`Settings`] at a fixed path
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, treating a missing or corrupt file as absent
    pub fn load(&self) -> Settings {
        match self.try_load() {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!(path = ?self.path, "no settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "ignoring unreadable settings");
                Settings::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<Settings>, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Persist a new capture index, keeping every other field as stored
    pub fn store_capture_index(&self, index: u32) -> Result<(), ConfigError> {
        let mut document = match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str::<serde_json::Value>(&raw)
                .ok()
                .filter(|v| v.is_object())
                .unwrap_or_else(|| serde_json::json!({})),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::json!({}),
            Err(e) => return Err(e.into()),
        };

        if let Some(map) = document.as_object_mut() {
            map.insert("webcam_index".to_string(), serde_json::json!(index));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&document)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("bt_config.json"))
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning = Tuning::default();
        assert_eq!(tuning.trigger_frames, 3);
        assert_eq!(tuning.idle_frames, 100);
        assert_eq!(tuning.actuator_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_or_falls_back() {
        assert_eq!(parse_or("K", "12", 3u32), 12);
        assert_eq!(parse_or("K", " 7 ", 3u32), 7);
        assert_eq!(parse_or("K", "many", 3u32), 3);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = store_in(&dir).load();
        assert_eq!(settings, Settings::default());
        assert!(settings.keybind_enabled);
        assert!(!settings.detection_enabled);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_load_front_end_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"phone_bt_address":"EC:AA:25:93:4D:48","webcam_index":2,
                "detection_enabled":true,"theme":"dark","PythonExePath":""}"#,
        )
        .unwrap();

        let settings = store.load();
        assert_eq!(settings.device_address(), Some("EC:AA:25:93:4D:48"));
        assert_eq!(settings.capture_index, 2);
        assert!(settings.detection_enabled);
        assert!(settings.keybind_enabled);
    }

    #[test]
    fn test_lenient_capture_index() {
        let settings: Settings = serde_json::from_str(r#"{"webcam_index":"1"}"#).unwrap();
        assert_eq!(settings.capture_index, 1);
        let settings: Settings = serde_json::from_str(r#"{"webcam_index":-4}"#).unwrap();
        assert_eq!(settings.capture_index, 0);
    }

    #[test]
    fn test_blank_address_is_absent() {
        let settings = Settings {
            device_address: "   ".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.device_address(), None);
    }

    #[test]
    fn test_store_capture_index_preserves_address() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"phone_bt_address":"AA:BB:CC:DD:EE:FF","theme":"auto"}"#,
        )
        .unwrap();

        store.store_capture_index(3).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["webcam_index"], 3);
        assert_eq!(raw["phone_bt_address"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(raw["theme"], "auto");
    }

    #[test]
    fn test_store_capture_index_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("bt_config.json"));
        store.store_capture_index(1).unwrap();
        assert_eq!(store.load().capture_index, 1);
    }
}
