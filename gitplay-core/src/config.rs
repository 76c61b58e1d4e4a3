//! Session tuning, loadable from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! batch_size = 100
//! lookahead = 25
//!
//! [playback]
//! initial_speed = 4
//! max_speed = 32
//!
//! [layout]
//! container_width = 1000
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Commits fetched per `get_commits` request.
    pub batch_size: usize,
    /// Distance to the end of the current batch at which playback prefetches
    /// the next one.
    pub lookahead: usize,
    /// Pixels excluded at each edge of the timeline track.
    pub seek_margin_px: f64,
    /// Buffered notifications per subscriber before it starts lagging.
    pub event_capacity: usize,
    pub playback: PlaybackConfig,
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Commits per second when a repository is opened.
    pub initial_speed: u32,
    /// Speed after which `set_speed` wraps back to 1.
    pub max_speed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub container_width: f64,
    pub container_height: f64,
    /// Horizontal gap between a new window and the last placed one.
    pub gutter: f64,
    /// Vertical step applied to every new window.
    pub cascade_offset: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            lookahead: 25,
            seek_margin_px: 16.0,
            event_capacity: 256,
            playback: PlaybackConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            initial_speed: 4,
            max_speed: 32,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            container_width: 1000.0,
            container_height: 700.0,
            gutter: 20.0,
            cascade_offset: 30.0,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_initial_speed(mut self, speed: u32) -> Self {
        self.playback.initial_speed = speed;
        self
    }

    pub fn with_container(mut self, width: f64, height: f64) -> Self {
        self.layout.container_width = width;
        self.layout.container_height = height;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".into()));
        }
        if self.lookahead >= self.batch_size {
            return Err(Error::Config(format!(
                "lookahead ({}) must be smaller than batch_size ({})",
                self.lookahead, self.batch_size
            )));
        }
        let PlaybackConfig {
            initial_speed,
            max_speed,
        } = self.playback;
        if !max_speed.is_power_of_two() {
            return Err(Error::Config("max_speed must be a power of two".into()));
        }
        if !initial_speed.is_power_of_two() || initial_speed > max_speed {
            return Err(Error::Config(format!(
                "initial_speed must be a power of two no larger than {}",
                max_speed
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be positive".into()));
        }
        if self.seek_margin_px < 0.0
            || self.layout.gutter < 0.0
            || self.layout.cascade_offset < 0.0
        {
            return Err(Error::Config("margins and offsets cannot be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.lookahead, 25);
        assert_eq!(config.playback.initial_speed, 4);
        assert_eq!(config.playback.max_speed, 32);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = SessionConfig::from_toml_str(
            r#"
            batch_size = 50
            lookahead = 10

            [layout]
            gutter = 8.0
            "#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 50);
        assert_eq!(config.lookahead, 10);
        assert_eq!(config.layout.gutter, 8.0);
        assert_eq!(config.layout.cascade_offset, 30.0);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            SessionConfig::from_toml_str("batch_size = 0"),
            Err(Error::Config(_))
        ));
        assert!(SessionConfig::from_toml_str("lookahead = 200").is_err());
        assert!(SessionConfig::from_toml_str("[playback]\ninitial_speed = 3").is_err());
        assert!(SessionConfig::from_toml_str("[playback]\ninitial_speed = 64").is_err());
        assert!(SessionConfig::from_toml_str("batch_size = \"many\"").is_err());
    }
}
