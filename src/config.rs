//! Configuration loaded from `config.toml`.
//!
//! Every key is optional; missing sections fall back to the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Rating, Scheme};

pub const DEFAULT_CONFIG_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheme: Scheme,
    pub database: Option<PathBuf>,
    pub script: Option<PathBuf>,
    pub review: ReviewConfig,
    pub display: DisplayConfig,
    pub planner: PlannerConfig,
    pub ease: EaseConfig,
    pub fsrs: FsrsConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ease.min > self.ease.max {
            return Err(Error::InvalidParameters(format!(
                "ease.min ({}) exceeds ease.max ({})",
                self.ease.min, self.ease.max
            )));
        }
        if !(self.ease.min..=self.ease.max).contains(&self.ease.fail_floor) {
            return Err(Error::InvalidParameters(
                "ease.fail_floor must lie within [ease.min, ease.max]".into(),
            ));
        }
        if !(self.fsrs.desired_retention > 0.0 && self.fsrs.desired_retention < 1.0) {
            return Err(Error::InvalidParameters(
                "fsrs.desired_retention must be in (0, 1)".into(),
            ));
        }
        if let Some(weights) = &self.fsrs.weights {
            if weights.len() != FSRS_WEIGHT_COUNT {
                return Err(Error::InvalidParameters(format!(
                    "fsrs.weights needs {} values, got {}",
                    FSRS_WEIGHT_COUNT,
                    weights.len()
                )));
            }
        }
        if self.planner.max_chunk == 0 || self.planner.extension_run == 0 {
            return Err(Error::InvalidParameters(
                "planner.max_chunk and planner.extension_run must be at least 1".into(),
            ));
        }
        if self.planner.relearn_span == 0 || self.planner.learn_new_lines == 0 {
            return Err(Error::InvalidParameters(
                "planner.relearn_span and planner.learn_new_lines must be at least 1".into(),
            ));
        }
        if let Advancement::Fixed { threshold: 0 } = self.display.advancement {
            return Err(Error::InvalidParameters(
                "display.advancement.threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// How far ahead a card counts as "due soon" for early review.
    /// Zero reduces reviewability to plain due-ness.
    pub due_soon_hours: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self { due_soon_hours: 6 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Advancement {
    /// Advance exactly when the streak reaches `threshold`.
    Fixed { threshold: u32 },
    /// Advance with probability 1/3, 2/3, 1 at streaks 4, 5, 6.
    Probabilistic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub advancement: Advancement,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            advancement: Advancement::Fixed { threshold: 3 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Known lines shown before an ingest span.
    pub ingest_prefix: usize,
    /// Most lines introduced by one ingest round.
    pub ingest_cap: usize,
    /// Known lines used as context when learning.
    pub learn_context: usize,
    /// Most new lines introduced by one learn round.
    pub learn_new_lines: usize,
    pub max_chunk: usize,
    /// Consecutive unreviewable lines that stop window extension.
    pub extension_run: usize,
    /// Lines (ending at the failure) rehearsed by relearn.
    pub relearn_span: usize,
    /// The single outcome recorded for a freshly learnt line.
    pub learn_rating: Rating,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            ingest_prefix: 3,
            ingest_cap: 20,
            learn_context: 2,
            learn_new_lines: 1,
            max_chunk: 3,
            extension_run: 3,
            relearn_span: 5,
            learn_rating: Rating::Hard,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EaseConfig {
    pub min: f64,
    pub max: f64,
    pub fail_floor: f64,
    pub hard: f64,
    pub good: f64,
    pub easy: f64,
    pub max_interval_days: i64,
}

impl EaseConfig {
    pub fn delta(&self, rating: Rating) -> f64 {
        match rating {
            Rating::Again => 0.0,
            Rating::Hard => self.hard,
            Rating::Good => self.good,
            Rating::Easy => self.easy,
        }
    }
}

impl Default for EaseConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 8.0,
            fail_floor: 0.0,
            hard: -1.0,
            good: 2.0,
            easy: 3.0,
            max_interval_days: 14,
        }
    }
}

pub const FSRS_WEIGHT_COUNT: usize = 21;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FsrsConfig {
    pub desired_retention: f64,
    pub learning_step_minutes: i64,
    pub max_interval_days: i64,
    /// Synthetic ratings fed for the first reviews after learning.
    pub warmup: Vec<Rating>,
    /// FSRS-6 weights; defaults to the published parameters.
    pub weights: Option<Vec<f32>>,
}

impl Default for FsrsConfig {
    fn default() -> Self {
        Self {
            desired_retention: 0.9,
            learning_step_minutes: 10,
            max_interval_days: 36500,
            warmup: vec![Rating::Again, Rating::Hard, Rating::Hard, Rating::Good],
            weights: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.scheme, Scheme::Ease);
        assert_eq!(config.planner.max_chunk, 3);
        assert_eq!(config.planner.learn_rating, Rating::Hard);
        assert_eq!(config.display.advancement, Advancement::Fixed { threshold: 3 });
        assert_eq!(config.fsrs.warmup.len(), 4);
    }

    #[test]
    fn parses_sections() {
        let config = Config::parse(
            r#"
            scheme = "fsrs"
            script = "/tmp/hamlet.txt"

            [planner]
            extension_run = 4
            learn_rating = "good"

            [display]
            advancement = { mode = "probabilistic" }

            [fsrs]
            desired_retention = 0.85
            warmup = ["again", "good"]
            "#,
        )
        .unwrap();
        assert_eq!(config.scheme, Scheme::Fsrs);
        assert_eq!(config.script, Some(PathBuf::from("/tmp/hamlet.txt")));
        assert_eq!(config.planner.extension_run, 4);
        assert_eq!(config.planner.ingest_cap, 20);
        assert_eq!(config.planner.learn_rating, Rating::Good);
        assert_eq!(config.display.advancement, Advancement::Probabilistic);
        assert_eq!(config.fsrs.warmup, vec![Rating::Again, Rating::Good]);
    }

    #[test]
    fn rejects_inverted_ease_range() {
        let err = Config::parse("[ease]\nmin = 5.0\nmax = 1.0\nfail_floor = 1.0").unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn rejects_bad_retention() {
        let err = Config::parse("[fsrs]\ndesired_retention = 1.0").unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn rejects_wrong_weight_count() {
        let err = Config::parse("[fsrs]\nweights = [0.1, 0.2]").unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn rejects_zero_chunk() {
        let err = Config::parse("[planner]\nmax_chunk = 0").unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn rejects_unknown_rating() {
        let err = Config::parse("[planner]\nlearn_rating = \"perfect\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scheme = \"fsrs\"").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.scheme, Scheme::Fsrs);
    }

    #[test]
    fn ease_delta_table() {
        let ease = EaseConfig::default();
        assert_eq!(ease.delta(Rating::Good), 2.0);
        assert_eq!(ease.delta(Rating::Hard), -1.0);
        assert_eq!(ease.delta(Rating::Again), 0.0);
    }
}
