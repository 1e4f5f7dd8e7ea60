use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::matching::MatchStrategy;
use crate::pricing::{EvEngineConfig, DEFAULT_MIN_EV, DEFAULT_SHARP_BOOK};
use crate::sources::DEFAULT_CACHE_TTL_SECS;
use crate::value::DEFAULT_CONFIDENCE_THRESHOLD;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub ev: EvConfig,
    #[serde(default)]
    pub value: ValueConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    Substring,
    #[default]
    TokenSet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub strategy: MatchingMode,
    /// Minimum pair score for token-set matching
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
}

fn default_min_similarity() -> f64 {
    0.5
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strategy: MatchingMode::default(),
            min_similarity: default_min_similarity(),
        }
    }
}

impl MatchingConfig {
    pub fn strategy(&self) -> MatchStrategy {
        match self.strategy {
            MatchingMode::Substring => MatchStrategy::Substring,
            MatchingMode::TokenSet => MatchStrategy::TokenSet {
                min_similarity: self.min_similarity,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvConfig {
    /// Book whose devigged prices are taken as fair
    #[serde(default = "default_sharp_book")]
    pub sharp_book: String,
    /// Minimum EV (percent) for a bet to be reported as actionable
    #[serde(default = "default_min_ev")]
    pub min_ev: f64,
    /// Books to score; empty scores every book
    #[serde(default)]
    pub books: Vec<String>,
    /// Score spread and total lines too
    #[serde(default = "default_true")]
    pub include_lines: bool,
}

fn default_sharp_book() -> String {
    DEFAULT_SHARP_BOOK.to_string()
}

fn default_min_ev() -> f64 {
    DEFAULT_MIN_EV
}

fn default_true() -> bool {
    true
}

impl Default for EvConfig {
    fn default() -> Self {
        Self {
            sharp_book: default_sharp_book(),
            min_ev: default_min_ev(),
            books: Vec::new(),
            include_lines: true,
        }
    }
}

impl EvConfig {
    pub fn engine_config(&self) -> EvEngineConfig {
        EvEngineConfig {
            sharp_book: self.sharp_book.clone(),
            min_ev: self.min_ev,
            books: self.books.clone(),
            include_lines: self.include_lines,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Prediction target the models were trained for
    #[serde(default = "default_target")]
    pub target: String,
    /// Book compared against the model; first fully priced book when unset
    #[serde(default)]
    pub market_book: Option<String>,
    /// Compare against devigged instead of raw implied probabilities
    #[serde(default)]
    pub devig_market: bool,
}

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_target() -> String {
    "home_team_winning".to_string()
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            target: default_target(),
            market_book: None,
            devig_market: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Cached snapshots younger than this are served without a live fetch
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Daily-rolling log files go here when set
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("ev.sharp_book", DEFAULT_SHARP_BOOK)?
            .set_default("ev.min_ev", DEFAULT_MIN_EV)?
            .set_default("value.confidence_threshold", DEFAULT_CONFIDENCE_THRESHOLD)?
            .set_default("sources.cache_ttl_secs", DEFAULT_CACHE_TTL_SECS)?
            // config/default.toml
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // config/{EDGE_ENV}, e.g. config/production.toml
            .add_source(
                File::from(config_dir.join(
                    std::env::var("EDGE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // EDGE__EV__MIN_EV, EDGE__VALUE__CONFIDENCE_THRESHOLD, ...
            .add_source(
                Environment::with_prefix("EDGE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.matching.min_similarity) {
            errors.push("matching.min_similarity must be between 0 and 1".to_string());
        }

        if self.ev.sharp_book.trim().is_empty() {
            errors.push("ev.sharp_book must not be empty".to_string());
        }
        if !self.ev.min_ev.is_finite() {
            errors.push("ev.min_ev must be finite".to_string());
        }
        if self.ev.books.iter().any(|b| b == &self.ev.sharp_book) {
            errors.push(format!(
                "ev.books must not include the sharp book {}",
                self.ev.sharp_book
            ));
        }

        let t = self.value.confidence_threshold;
        if !(0.5..1.0).contains(&t) {
            errors.push(format!(
                "value.confidence_threshold must be in [0.5, 1.0), got {t}"
            ));
        }
        if self.value.target.trim().is_empty() {
            errors.push("value.target must not be empty".to_string());
        }

        if self.sources.cache_ttl_secs == 0 {
            errors.push("sources.cache_ttl_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ev.sharp_book, "pinnacle");
        assert_eq!(config.ev.min_ev, 2.0);
        assert_eq!(config.value.confidence_threshold, 0.7);
        assert_eq!(config.sources.cache_ttl_secs, 900);
        assert_eq!(
            config.matching.strategy(),
            MatchStrategy::TokenSet {
                min_similarity: 0.5
            }
        );
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut config = AppConfig::default();
        config.value.confidence_threshold = 0.3;
        config.matching.min_similarity = 1.5;
        config.ev.books = vec!["pinnacle".to_string()];

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3, "{errors:?}");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            r#"
[matching]
strategy = "substring"

[ev]
sharp_book = "circa"
min_ev = 3.5
books = ["betmgm", "caesars"]

[value]
confidence_threshold = 0.65
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.matching.strategy(), MatchStrategy::Substring);
        assert_eq!(config.ev.sharp_book, "circa");
        assert_eq!(config.ev.min_ev, 3.5);
        assert_eq!(config.ev.books.len(), 2);
        assert_eq!(config.value.confidence_threshold, 0.65);
        assert_eq!(config.sources.cache_ttl_secs, 900);
        assert_eq!(config.logging.level, "info");
    }
}
