//! Configuration for content loading and request scheduling.
//!
//! Everything deserialises with defaults, so a renderer can keep these in a
//! JSON settings file and only spell out what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vctr::Framing;

use crate::color::ColorSelection;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid options: {0}")]
    Json(#[from] serde_json::Error),
}

/// Optional pipeline stages. All are off by default, which yields a single
/// ground-clamped primitive over an unframed JSON body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineStages {
    /// Validate the 12-byte `vctr` header before the JSON body.
    pub strict_framing: bool,
    /// Build a label collection from the payload's `labels` array.
    pub labels: bool,
    /// Closed, translucent extruded primitive instead of the ground-clamped one.
    pub extruded: bool,
    /// Polyline outline overlay for every polygon ring.
    pub outline: bool,
}

impl PipelineStages {
    pub fn framing(&self) -> Framing {
        if self.strict_framing {
            Framing::Strict
        } else {
            Framing::Unframed
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentOptions {
    pub color: ColorSelection,
    pub stages: PipelineStages,
}

impl ContentOptions {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

/// Admission limits for [`ThrottledScheduler`](crate::request::ThrottledScheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerLimits {
    pub max_requests: usize,
    pub max_requests_per_server: usize,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self {
            max_requests: 50,
            max_requests_per_server: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn empty_object_yields_defaults() {
        let opts = ContentOptions::from_json_str("{}").unwrap();
        assert_eq!(opts, ContentOptions::default());
        assert_eq!(opts.stages.framing(), Framing::Unframed);
    }

    #[test]
    fn stages_toggle_independently() {
        let opts = ContentOptions::from_json_str(
            r#"{"stages":{"outline":true,"strict_framing":true},
                "color":{"kind":"fixed","color":{"r":1,"g":0,"b":0,"a":0.5}}}"#,
        )
        .unwrap();

        assert!(opts.stages.outline);
        assert!(!opts.stages.labels);
        assert!(!opts.stages.extruded);
        assert_eq!(opts.stages.framing(), Framing::Strict);
        assert_eq!(opts.color.pick(), Color::RED.with_alpha(0.5));
    }

    #[test]
    fn unknown_colour_kind_is_rejected() {
        assert!(matches!(
            ContentOptions::from_json_str(r#"{"color":{"kind":"rainbow"}}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn scheduler_limits_default_to_fifty_and_six() {
        let limits: SchedulerLimits = serde_json::from_str(r#"{"max_requests":8}"#).unwrap();
        assert_eq!(limits.max_requests, 8);
        assert_eq!(limits.max_requests_per_server, 6);
    }
}
