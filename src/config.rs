// THEORY:
// Configuration comes in two shapes. `MotionOptions` is what a caller (or a
// TOML file) supplies: every field optional. `MotionConfig` is the resolved,
// validated form the engine runs on: defaults filled in and the diff grid
// derived from the capture size and the scale factor. Resolution either
// succeeds completely or fails with `MotionError::Configuration`; there is no
// half-applied state.

use crate::error::{MotionError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;
pub const DEFAULT_SCALE: u32 = 10;
pub const DEFAULT_PIXEL_DIFF_THRESHOLD: u32 = 32;
pub const DEFAULT_SCORE_THRESHOLD: u32 = 16;
pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 100;

/// Named score-threshold presets. Fewer changed pixels are needed to report
/// motion at higher sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    High,
    Medium,
    Low,
}

impl Sensitivity {
    pub fn score_threshold(self) -> u32 {
        match self {
            Sensitivity::High => 4,
            Sensitivity::Medium => 16,
            Sensitivity::Low => 64,
        }
    }
}

/// Caller-facing options. Unset fields fall back to the documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MotionOptions {
    pub capture_width: Option<u32>,
    pub capture_height: Option<u32>,
    pub scale: Option<u32>,
    pub pixel_diff_threshold: Option<u32>,
    /// Takes precedence over `sensitivity` when both are set.
    pub score_threshold: Option<u32>,
    pub sensitivity: Option<Sensitivity>,
    pub include_motion_box: Option<bool>,
    pub include_motion_pixels: Option<bool>,
    pub capture_interval_ms: Option<u64>,
}

/// Resolved engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionConfig {
    pub capture_width: u32,
    pub capture_height: u32,
    pub scale: u32,
    pub diff_width: u32,
    pub diff_height: u32,
    pub pixel_diff_threshold: u32,
    pub score_threshold: u32,
    pub include_motion_box: bool,
    pub include_motion_pixels: bool,
    pub capture_interval: Duration,
}

impl MotionConfig {
    /// Resolves `options` against the defaults. `None` is a configuration
    /// error: a session cannot start without an options object.
    pub fn from_options(options: Option<&MotionOptions>) -> Result<Self> {
        let options = options
            .ok_or_else(|| MotionError::Configuration("no options provided".into()))?;

        let scale = options.scale.unwrap_or(DEFAULT_SCALE);
        if scale == 0 {
            return Err(MotionError::Configuration("scale must be at least 1".into()));
        }

        let pixel_diff_threshold = options
            .pixel_diff_threshold
            .unwrap_or(DEFAULT_PIXEL_DIFF_THRESHOLD);
        validate_pixel_diff_threshold(pixel_diff_threshold)?;

        let capture_interval_ms = options
            .capture_interval_ms
            .unwrap_or(DEFAULT_CAPTURE_INTERVAL_MS);
        if capture_interval_ms == 0 {
            return Err(MotionError::Configuration(
                "capture interval must be at least 1ms".into(),
            ));
        }

        let score_threshold = options
            .score_threshold
            .or(options.sensitivity.map(Sensitivity::score_threshold))
            .unwrap_or(DEFAULT_SCORE_THRESHOLD);

        let config = Self {
            capture_width: 0,
            capture_height: 0,
            scale,
            diff_width: 0,
            diff_height: 0,
            pixel_diff_threshold,
            score_threshold,
            include_motion_box: options.include_motion_box.unwrap_or(false),
            include_motion_pixels: options.include_motion_pixels.unwrap_or(false),
            capture_interval: Duration::from_millis(capture_interval_ms),
        };

        config.with_capture_dimensions(
            options.capture_width.unwrap_or(DEFAULT_CAPTURE_WIDTH),
            options.capture_height.unwrap_or(DEFAULT_CAPTURE_HEIGHT),
        )
    }

    /// Returns a copy sized for a `width` x `height` capture, with the diff
    /// grid re-derived through `scale` (truncating).
    pub fn with_capture_dimensions(&self, width: u32, height: u32) -> Result<Self> {
        let diff_width = width / self.scale;
        let diff_height = height / self.scale;
        if diff_width == 0 || diff_height == 0 {
            return Err(MotionError::Configuration(format!(
                "capture size {width}x{height} at scale {} leaves an empty diff grid",
                self.scale
            )));
        }
        Ok(Self {
            capture_width: width,
            capture_height: height,
            diff_width,
            diff_height,
            ..self.clone()
        })
    }

    pub fn diff_pixel_count(&self) -> usize {
        self.diff_width as usize * self.diff_height as usize
    }
}

/// A weighted difference never exceeds this, so a higher pixel threshold could
/// never be met.
pub const MAX_PIXEL_DIFF_THRESHOLD: u32 = 255;

pub(crate) fn validate_pixel_diff_threshold(threshold: u32) -> Result<()> {
    if !(1..=MAX_PIXEL_DIFF_THRESHOLD).contains(&threshold) {
        return Err(MotionError::Configuration(format!(
            "pixel diff threshold must be between 1 and {MAX_PIXEL_DIFF_THRESHOLD}, got {threshold}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

/// File-level settings for the replay binary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub motion: MotionOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_options_is_a_configuration_error() {
        assert!(matches!(
            MotionConfig::from_options(None),
            Err(MotionError::Configuration(_))
        ));
    }

    #[test]
    fn empty_options_resolve_to_defaults() {
        let config = MotionConfig::from_options(Some(&MotionOptions::default())).unwrap();

        assert_eq!((config.capture_width, config.capture_height), (640, 480));
        assert_eq!((config.diff_width, config.diff_height), (64, 48));
        assert_eq!(config.scale, 10);
        assert_eq!(config.pixel_diff_threshold, 32);
        assert_eq!(config.score_threshold, 16);
        assert!(!config.include_motion_box);
        assert!(!config.include_motion_pixels);
        assert_eq!(config.capture_interval, Duration::from_millis(100));
    }

    #[test]
    fn diff_dimensions_truncate() {
        let options = MotionOptions {
            capture_width: Some(645),
            capture_height: Some(359),
            ..Default::default()
        };
        let config = MotionConfig::from_options(Some(&options)).unwrap();
        assert_eq!((config.diff_width, config.diff_height), (64, 35));

        // Re-deriving from the same capture size reproduces the same grid.
        let again = config.with_capture_dimensions(645, 359).unwrap();
        assert_eq!(again, config);
        assert_eq!(again.diff_pixel_count(), 64 * 35);
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let options = MotionOptions {
            scale: Some(4),
            include_motion_box: Some(true),
            ..Default::default()
        };
        assert_eq!(
            MotionConfig::from_options(Some(&options)).unwrap(),
            MotionConfig::from_options(Some(&options)).unwrap()
        );
    }

    #[test]
    fn explicit_zero_score_threshold_is_kept() {
        let options = MotionOptions {
            score_threshold: Some(0),
            sensitivity: Some(Sensitivity::Low),
            ..Default::default()
        };
        let config = MotionConfig::from_options(Some(&options)).unwrap();
        assert_eq!(config.score_threshold, 0);
    }

    #[test]
    fn sensitivity_sets_score_threshold() {
        let options = MotionOptions {
            sensitivity: Some(Sensitivity::High),
            ..Default::default()
        };
        let config = MotionConfig::from_options(Some(&options)).unwrap();
        assert_eq!(config.score_threshold, 4);
    }

    #[test]
    fn rejects_degenerate_values() {
        let cases = [
            MotionOptions {
                scale: Some(0),
                ..Default::default()
            },
            MotionOptions {
                pixel_diff_threshold: Some(0),
                ..Default::default()
            },
            MotionOptions {
                pixel_diff_threshold: Some(MAX_PIXEL_DIFF_THRESHOLD + 1),
                ..Default::default()
            },
            MotionOptions {
                pixel_diff_threshold: Some(500_000_000),
                ..Default::default()
            },
            MotionOptions {
                capture_width: Some(9),
                ..Default::default()
            },
            MotionOptions {
                capture_interval_ms: Some(0),
                ..Default::default()
            },
        ];
        for options in &cases {
            assert!(
                matches!(
                    MotionConfig::from_options(Some(options)),
                    Err(MotionError::Configuration(_))
                ),
                "{options:?} should be rejected"
            );
        }
    }

    #[test]
    fn parses_settings_from_toml() {
        let settings = Settings::parse(
            r#"
            [motion]
            capture_width = 320
            capture_height = 240
            sensitivity = "low"
            include_motion_box = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(settings.motion.capture_width, Some(320));
        assert_eq!(settings.motion.sensitivity, Some(Sensitivity::Low));
        assert_eq!(settings.motion.include_motion_box, Some(true));
        assert_eq!(settings.motion.scale, None);
        assert_eq!(settings.logging.level, "debug");

        let defaults = Settings::parse("").unwrap();
        assert_eq!(defaults.motion, MotionOptions::default());
        assert_eq!(defaults.logging.level, "info");
    }
}
