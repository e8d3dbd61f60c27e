//! Configuration system for rote.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RoteError, RoteResult};

/// A knowledge-score band mapped to a review interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBand {
    /// Lower bound of the band (inclusive).
    pub min_score: u8,
    /// Upper bound of the band (inclusive).
    pub max_score: u8,
    /// Review interval for scores in this band, in minutes.
    pub interval_minutes: u32,
}

impl ScoreBand {
    /// Whether the band contains `score`.
    pub fn contains(&self, score: u8) -> bool {
        self.min_score <= score && score <= self.max_score
    }

    /// The band's interval as a chrono duration.
    pub fn interval(&self) -> Duration {
        Duration::minutes(self.interval_minutes as i64)
    }
}

/// Constants for the mastery update rules.
///
/// Defaults follow the Leitner-style step table: struggling items come
/// back within the hour, mastered items weekly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Score increase for a correct answer.
    pub correct_boost: u8,
    /// Score decrease for an incorrect answer.
    pub incorrect_penalty: u8,
    /// Score bands mapped to review intervals. Must partition `[0, 100]`
    /// contiguously with non-decreasing intervals.
    pub bands: Vec<ScoreBand>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            correct_boost: 15,
            incorrect_penalty: 10,
            bands: vec![
                ScoreBand { min_score: 0, max_score: 20, interval_minutes: 30 },
                ScoreBand { min_score: 21, max_score: 50, interval_minutes: 4 * 60 },
                ScoreBand { min_score: 51, max_score: 70, interval_minutes: 24 * 60 },
                ScoreBand { min_score: 71, max_score: 89, interval_minutes: 72 * 60 },
                ScoreBand { min_score: 90, max_score: 100, interval_minutes: 168 * 60 },
            ],
        }
    }
}

impl LearningConfig {
    /// Validate the band table: a contiguous partition of `[0, 100]` with
    /// monotonically non-decreasing intervals.
    pub fn validate(&self) -> RoteResult<()> {
        if self.bands.is_empty() {
            return Err(RoteError::Configuration(
                "score band table must not be empty".to_string(),
            ));
        }
        if self.correct_boost == 0 {
            return Err(RoteError::Configuration(
                "correct_boost must be positive".to_string(),
            ));
        }

        let mut expected_min = 0u16;
        let mut last_interval = 0u32;
        for band in &self.bands {
            if u16::from(band.min_score) != expected_min {
                return Err(RoteError::Configuration(format!(
                    "score bands must be contiguous: expected band starting at {}, got {}",
                    expected_min, band.min_score
                )));
            }
            if band.max_score < band.min_score {
                return Err(RoteError::Configuration(format!(
                    "invalid band [{}, {}]",
                    band.min_score, band.max_score
                )));
            }
            if band.interval_minutes < last_interval {
                return Err(RoteError::Configuration(format!(
                    "band intervals must be non-decreasing: {}min after {}min",
                    band.interval_minutes, last_interval
                )));
            }
            last_interval = band.interval_minutes;
            expected_min = u16::from(band.max_score) + 1;
        }

        if expected_min != 101 {
            return Err(RoteError::Configuration(format!(
                "score bands must cover up to 100, last band ends at {}",
                expected_min.saturating_sub(1)
            )));
        }
        Ok(())
    }

    /// Review interval for a knowledge score.
    ///
    /// Scores are clamped to `[0, 100]` before the update rules run, so
    /// every score maps to exactly one band; the longest interval is the
    /// fallback should the table ever miss.
    pub fn interval_for(&self, score: u8) -> Duration {
        self.bands
            .iter()
            .find(|band| band.contains(score))
            .map(ScoreBand::interval)
            .unwrap_or_else(|| {
                self.bands
                    .iter()
                    .map(ScoreBand::interval)
                    .max()
                    .unwrap_or_else(|| Duration::minutes(168 * 60))
            })
    }
}

/// Main configuration for the rote engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoteConfig {
    /// Mastery update constants.
    pub learning: LearningConfig,
    /// Default tick interval for newly activated learners, in minutes.
    pub default_interval_minutes: u32,
    /// Bound on external question-generator calls, in seconds.
    pub generation_timeout_secs: u64,
    /// Bound on external answer-classifier calls, in seconds.
    pub grading_timeout_secs: u64,
    /// Path to the SQLite database.
    pub db_path: PathBuf,
}

impl Default for RoteConfig {
    fn default() -> Self {
        let rote_dir = dirs::home_dir()
            .map(|h| h.join(".rote"))
            .unwrap_or_else(|| PathBuf::from(".rote"));

        Self {
            learning: LearningConfig::default(),
            default_interval_minutes: 30,
            generation_timeout_secs: 30,
            grading_timeout_secs: 30,
            db_path: rote_dir.join("rote.db"),
        }
    }
}

impl RoteConfig {
    /// Bound for external question-generator calls.
    pub fn generation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.generation_timeout_secs)
    }

    /// Bound for external answer-classifier calls.
    pub fn grading_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.grading_timeout_secs)
    }

    /// Load configuration from a file (TOML or JSON by extension).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> RoteResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| RoteError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| RoteError::Configuration(e.to_string()))?,
            _ => {
                return Err(RoteError::Configuration(
                    "Unsupported config file format. Use .toml or .json".to_string(),
                ))
            }
        };
        config.learning.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        LearningConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_band_table() {
        let config = LearningConfig::default();
        assert_eq!(config.interval_for(0), Duration::minutes(30));
        assert_eq!(config.interval_for(20), Duration::minutes(30));
        assert_eq!(config.interval_for(21), Duration::hours(4));
        assert_eq!(config.interval_for(70), Duration::hours(24));
        assert_eq!(config.interval_for(89), Duration::hours(72));
        assert_eq!(config.interval_for(100), Duration::hours(168));
    }

    #[test]
    fn test_intervals_monotonic_across_bands() {
        let config = LearningConfig::default();
        let mut last = Duration::zero();
        for score in 0..=100u8 {
            let interval = config.interval_for(score);
            assert!(
                interval >= last,
                "interval shrank at score {}: {} < {}",
                score,
                interval,
                last
            );
            last = interval;
        }
    }

    #[test]
    fn test_validate_rejects_gap() {
        let config = LearningConfig {
            bands: vec![
                ScoreBand { min_score: 0, max_score: 20, interval_minutes: 30 },
                ScoreBand { min_score: 25, max_score: 100, interval_minutes: 60 },
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_shrinking_interval() {
        let config = LearningConfig {
            bands: vec![
                ScoreBand { min_score: 0, max_score: 50, interval_minutes: 60 },
                ScoreBand { min_score: 51, max_score: 100, interval_minutes: 30 },
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_table() {
        let config = LearningConfig {
            bands: vec![ScoreBand { min_score: 0, max_score: 90, interval_minutes: 30 }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rote.toml");
        std::fs::write(
            &path,
            r#"
default_interval_minutes = 45
generation_timeout_secs = 10
"#,
        )
        .unwrap();

        let config = RoteConfig::from_file(&path).unwrap();
        assert_eq!(config.default_interval_minutes, 45);
        assert_eq!(config.generation_timeout_secs, 10);
        assert_eq!(config.generation_timeout(), std::time::Duration::from_secs(10));
        // Learning constants fall back to defaults
        assert_eq!(config.learning.correct_boost, 15);
    }
}
