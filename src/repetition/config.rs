//! Repetition detector settings.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult};

pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_REPEAT_THRESHOLD: usize = 3;
pub const DEFAULT_FLOOD_THRESHOLD: usize = 5;
pub const DEFAULT_PINGPONG_LENGTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepetitionConfig {
    /// Number of recorded calls kept in the sliding window.
    pub window_size: usize,
    /// Identical consecutive calls that make the next identical call fatal.
    pub repeat_threshold: usize,
    /// A tool seen more than this many times in the window triggers a warning.
    pub flood_threshold: usize,
    /// Minimum length of an A,B,A,B alternation, candidate included.
    pub pingpong_length: usize,
    pub detect_repeat: bool,
    pub detect_flood: bool,
    pub detect_pingpong: bool,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            repeat_threshold: DEFAULT_REPEAT_THRESHOLD,
            flood_threshold: DEFAULT_FLOOD_THRESHOLD,
            pingpong_length: DEFAULT_PINGPONG_LENGTH,
            detect_repeat: true,
            detect_flood: true,
            detect_pingpong: true,
        }
    }
}

impl RepetitionConfig {
    /// All detectors off; the guard only keeps history.
    pub fn disabled() -> Self {
        Self {
            detect_repeat: false,
            detect_flood: false,
            detect_pingpong: false,
            ..Default::default()
        }
    }

    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_repeat_threshold(mut self, threshold: usize) -> Self {
        self.repeat_threshold = threshold;
        self
    }

    pub fn with_flood_threshold(mut self, threshold: usize) -> Self {
        self.flood_threshold = threshold;
        self
    }

    pub fn with_pingpong_length(mut self, length: usize) -> Self {
        self.pingpong_length = length;
        self
    }

    pub fn with_detectors(mut self, repeat: bool, flood: bool, pingpong: bool) -> Self {
        self.detect_repeat = repeat;
        self.detect_flood = flood;
        self.detect_pingpong = pingpong;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: format!("repetition.{}", key),
            message,
        };

        if self.window_size == 0 {
            return Err(invalid("window_size", "must be at least 1".into()));
        }
        if self.repeat_threshold == 0 || self.repeat_threshold > self.window_size {
            return Err(invalid(
                "repeat_threshold",
                format!("must be between 1 and window_size ({})", self.window_size),
            ));
        }
        if self.flood_threshold == 0 || self.flood_threshold >= self.window_size {
            return Err(invalid(
                "flood_threshold",
                format!("must be between 1 and window_size - 1 ({})", self.window_size - 1),
            ));
        }
        if self.pingpong_length < 3 || self.pingpong_length > self.window_size {
            return Err(invalid(
                "pingpong_length",
                format!("must be between 3 and window_size ({})", self.window_size),
            ));
        }
        Ok(())
    }
}
