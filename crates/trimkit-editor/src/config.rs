//! Editor configuration, loadable from JSON.

use crate::export::DEFAULT_PROGRESS_INTERVAL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use trimkit_core::{RationalTime, Result, TimeRange, TrimError};
use trimkit_media::PresetId;

/// Settings for one editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Shortest selectable range.
    pub minimum_duration: RationalTime,
    /// Longest selectable range.
    pub maximum_duration: RationalTime,
    /// Cadence at which the host calls the periodic tick.
    pub tick_interval: RationalTime,
    /// Export progress polling cadence.
    #[serde(with = "millis")]
    pub progress_interval: Duration,
    /// Quality preset; `None` exports without re-encoding.
    pub preset: Option<PresetId>,
    /// Where exports are written. Defaults to the user cache directory.
    pub output_dir: Option<PathBuf>,
    /// Selection to restore when the session opens.
    pub initial_selected_range: Option<TimeRange>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            minimum_duration: RationalTime::from_secs(1),
            maximum_duration: RationalTime::from_secs(600),
            tick_interval: RationalTime::new(1, 30),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            preset: None,
            output_dir: None,
            initial_selected_range: None,
        }
    }
}

impl EditorConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TrimError::InvalidParameter(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            TrimError::InvalidParameter(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.minimum_duration.is_negative() {
            return Err(TrimError::InvalidParameter(
                "minimum_duration must not be negative".into(),
            ));
        }
        if self.minimum_duration > self.maximum_duration {
            return Err(TrimError::InvalidParameter(format!(
                "minimum_duration {} exceeds maximum_duration {}",
                self.minimum_duration, self.maximum_duration
            )));
        }
        if self.tick_interval <= RationalTime::ZERO {
            return Err(TrimError::InvalidParameter(
                "tick_interval must be positive".into(),
            ));
        }
        if self.progress_interval.is_zero() {
            return Err(TrimError::InvalidParameter(
                "progress_interval must be positive".into(),
            ));
        }
        if let Some(range) = self.initial_selected_range {
            if range.start.is_negative() || range.duration.is_negative() {
                return Err(TrimError::InvalidParameter(format!(
                    "initial_selected_range {range} is negative"
                )));
            }
        }
        Ok(())
    }

    /// Tick cadence as a wall-clock duration.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval.to_seconds_f64().max(0.0))
    }

    /// Directory exports are written to.
    pub fn output_directory(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("trimkit")
                .join("exports")
        })
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
