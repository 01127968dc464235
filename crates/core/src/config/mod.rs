use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CapsuleError, Result};

/// Top-level configuration for one mixing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    pub timing: Timing,
    /// Reorder tracks by tempo before mixing.
    pub order: bool,
    /// Derive a sound-check gain for every track from its loudness.
    pub equalize: bool,
    pub ending: TerminationMode,
    pub on_analysis_error: AnalysisPolicy,
}

impl MixConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            CapsuleError::Config(format!("cannot read `{}`: {err}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|err| {
            CapsuleError::Config(format!("cannot parse `{}`: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.timing.validate()
    }
}

/// The two durations, in seconds, that shape every group of actions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Steady playback between two transitions.
    pub intermission: f64,
    /// Length of every fade and crossmatch.
    pub transition: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            intermission: 8.0,
            transition: 8.0,
        }
    }
}

impl Timing {
    /// Builds a validated timing pair.
    pub fn new(intermission: f64, transition: f64) -> Result<Self> {
        let timing = Self {
            intermission,
            transition,
        };
        timing.validate()?;
        Ok(timing)
    }

    pub fn validate(&self) -> Result<()> {
        check_duration("intermission", self.intermission)?;
        check_duration("transition", self.transition)
    }

    /// Both durations are strictly positive. Only then can a track be valid.
    pub fn is_usable(&self) -> bool {
        self.intermission > 0.0 && self.transition > 0.0
    }

    /// Shortest beat span a track needs: an entry window, one intermission
    /// and an exit window, none of them overlapping.
    pub fn min_track_span(&self) -> f64 {
        self.intermission + 2.0 * self.transition
    }
}

fn check_duration(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(CapsuleError::Config(format!(
            "{name} must be a finite number of seconds, got {value}"
        )));
    }
    if value < 0.0 {
        return Err(CapsuleError::Config(format!(
            "{name} must not be negative, got {value}"
        )));
    }
    Ok(())
}

/// How the final track leaves the mix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationMode {
    #[default]
    FadeOut,
    /// Play the last window at full volume and stop.
    Cut,
}

/// What the pipeline does when one source file cannot be analysed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPolicy {
    /// Stop the run at the first failing file.
    #[default]
    Abort,
    /// Log the failure and continue without that file.
    Skip,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_command_line_defaults() {
        let config = MixConfig::default();
        assert_eq!(config.timing.intermission, 8.0);
        assert_eq!(config.timing.transition, 8.0);
        assert!(!config.order);
        assert!(!config.equalize);
        assert_eq!(config.ending, TerminationMode::FadeOut);
        assert_eq!(config.on_analysis_error, AnalysisPolicy::Abort);
    }

    #[test]
    fn rejects_negative_and_non_finite_durations() {
        assert!(matches!(
            Timing::new(-1.0, 8.0),
            Err(CapsuleError::Config(_))
        ));
        assert!(matches!(
            Timing::new(8.0, f64::NAN),
            Err(CapsuleError::Config(_))
        ));
        assert!(matches!(
            Timing::new(f64::INFINITY, 8.0),
            Err(CapsuleError::Config(_))
        ));
    }

    #[test]
    fn zero_durations_are_accepted_but_unusable() {
        let timing = Timing::new(0.0, 8.0).unwrap();
        assert!(!timing.is_usable());
        assert!(Timing::new(4.0, 2.0).unwrap().is_usable());
    }

    #[test]
    fn loads_partial_json_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "timing": {{ "transition": 4.5 }}, "order": true, "ending": "cut" }}"#
        )
        .unwrap();

        let config = MixConfig::load(file.path()).unwrap();
        assert_eq!(config.timing.transition, 4.5);
        assert_eq!(config.timing.intermission, 8.0);
        assert!(config.order);
        assert_eq!(config.ending, TerminationMode::Cut);
    }

    #[test]
    fn load_rejects_negative_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "timing": {{ "intermission": -2 }} }}"#).unwrap();

        let err = MixConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("intermission"));
    }
}
