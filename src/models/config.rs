//! Configuration models for pagefetch.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at startup via config file and CLI flags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for pagefetch.
///
/// I^R resolved: Everything a run needs is fixed before the first page is requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote collection settings
    pub source: SourceConfig,

    /// Page loop settings
    pub run: RunConfig,

    /// Output and checkpoint locations
    #[serde(default)]
    pub output: OutputConfig,
}

/// Remote collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Collection URL (e.g. "https://www.ebi.ac.uk/metagenomics/api/v1/samples")
    pub base_url: String,

    /// Query parameter carrying the page index
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Records per page, sent only when set
    #[serde(default)]
    pub page_size: Option<u32>,

    /// Query parameter carrying the page size
    #[serde(default = "default_page_size_param")]
    pub page_size_param: String,

    /// Extra fixed query pairs (filters etc.)
    /// Values can contain ${ENV_VAR} for environment variable expansion
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_page_size_param() -> String {
    "page_size".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("pagefetch/", env!("CARGO_PKG_VERSION")).to_string()
}

/// How raw records become flat rows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlattenMode {
    /// `id` plus one column per metadata key (default)
    #[default]
    Metadata,
    /// Every nested object path becomes a dotted column
    Normalize,
}

/// Page loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of pages in the collection, fixed for the whole run
    pub total_pages: u32,

    /// Fixed delay between attempts on a transiently failing page
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: f64,

    /// Flattening strategy
    #[serde(default)]
    pub flatten: FlattenMode,

    /// Attribute holding the `{key, value}` list in metadata mode
    #[serde(default = "default_metadata_field")]
    pub metadata_field: String,
}

fn default_retry_delay() -> f64 {
    5.0
}

fn default_metadata_field() -> String {
    "sample-metadata".to_string()
}

impl RunConfig {
    /// Retry delay as a `Duration`. Fails on negative, NaN or overflowing seconds.
    pub fn retry_delay(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.retry_delay_secs).map_err(|e| {
            ConfigError::Invalid(format!(
                "run.retry_delay_secs = {} is not a valid delay: {e}",
                self.retry_delay_secs
            ))
        })
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output CSV path
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Checkpoint file path (plain-text page index)
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("output_data.csv")
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("progress_tracker.txt")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.source.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("source.base_url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "source.base_url must be http(s): {url}"
            )));
        }
        if self.run.total_pages == 0 {
            return Err(ConfigError::Invalid(
                "run.total_pages must be at least 1".to_string(),
            ));
        }
        self.run.retry_delay()?;
        if self.source.page_size == Some(0) {
            return Err(ConfigError::Invalid(
                "source.page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Fixed query pairs with environment variables expanded.
    pub fn resolved_query(&self) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .source
            .query
            .iter()
            .map(|(k, v)| (k.clone(), expand_env_vars(v)))
            .collect();
        if let Some(size) = self.source.page_size {
            query.push((self.source.page_size_param.clone(), size.to_string()));
        }
        query
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(s, |cap: &regex::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_else(|_| cap[0].to_string())
    })
    .into_owned()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[source]
base_url = "https://example.org/api/v1/samples"

[run]
total_pages = 3
"#;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.source.page_param, "page");
        assert_eq!(config.source.timeout_secs, 60);
        assert_eq!(config.run.retry_delay().unwrap(), Duration::from_secs(5));
        assert_eq!(config.run.flatten, FlattenMode::Metadata);
        assert_eq!(config.run.metadata_field, "sample-metadata");
        assert_eq!(config.output.path, PathBuf::from("output_data.csv"));
        assert_eq!(
            config.output.checkpoint_path,
            PathBuf::from("progress_tracker.txt")
        );
        assert!(config.resolved_query().is_empty());
    }

    #[test]
    fn test_query_and_page_size() {
        let text = r#"
[source]
base_url = "https://example.org/api"
page_size = 50
query = { biome = "root:Host-associated" }

[run]
total_pages = 10
flatten = "normalize"
"#;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.run.flatten, FlattenMode::Normalize);
        assert_eq!(
            config.resolved_query(),
            vec![
                ("biome".to_string(), "root:Host-associated".to_string()),
                ("page_size".to_string(), "50".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejects_zero_pages() {
        let text = MINIMAL.replace("total_pages = 3", "total_pages = 0");
        assert!(matches!(
            Config::from_toml(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_unrepresentable_retry_delay() {
        for bad in ["1e30", "-1.0", "nan", "inf"] {
            let text = format!("{MINIMAL}retry_delay_secs = {bad}\n");
            assert!(
                matches!(Config::from_toml(&text), Err(ConfigError::Invalid(_))),
                "retry_delay_secs = {bad}"
            );
        }

        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.run.retry_delay_secs = 0.25;
        assert_eq!(config.run.retry_delay().unwrap(), Duration::from_millis(250));
        config.run.retry_delay_secs = 1e30;
        assert!(config.validate().is_err());
        assert!(config.run.retry_delay().is_err());
    }

    #[test]
    fn test_rejects_non_http_url() {
        let text = MINIMAL.replace("https://", "ftp://");
        assert!(matches!(
            Config::from_toml(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_expand_env_vars_leaves_unknown() {
        assert_eq!(
            expand_env_vars("${PAGEFETCH_SURELY_UNSET_VAR}/x"),
            "${PAGEFETCH_SURELY_UNSET_VAR}/x"
        );
        assert_eq!(expand_env_vars("plain"), "plain");
    }
}
