//! LessonBuilder configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum number of packages researched per run
pub const DEFAULT_MAX_PACKAGES: usize = 3;

/// Maximum number of search queries issued per package
pub const DEFAULT_MAX_QUERIES_PER_PACKAGE: usize = 3;

/// Results requested from the search provider per query
pub const DEFAULT_RESULTS_PER_QUERY: usize = 5;

/// Maximum code blocks kept from a single fetched page
pub const DEFAULT_MAX_CODE_BLOCKS_PER_PAGE: usize = 10;

/// Extracted content below this many characters triggers the search-result fallback
pub const DEFAULT_MIN_DOC_CONTENT_CHARS: usize = 500;

/// Search-result pages fetched per package when the docs page is too thin
pub const DEFAULT_MAX_FALLBACK_PAGES: usize = 2;

/// Characters of each snippet embedded in the generation prompt
pub const DEFAULT_SNIPPET_PROMPT_CHARS: usize = 150;

/// Characters of aggregated doc content embedded in the generation prompt
pub const DEFAULT_DOC_PROMPT_CHARS: usize = 2000;

/// Timeout for every research call (search, registry lookup, page fetch)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Main LessonBuilder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Research aggregator limits and sources
    pub research: ResearchConfig,

    /// Web search provider selection
    pub search: SearchSettings,

    /// Where notebooks are written
    pub output: OutputConfig,

    /// Log level (overridden by --log-level)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set.
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::implicit_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed: a broken config file is reported later by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::implicit_paths(),
        };

        paths
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|config| config.log_level)
    }

    /// Project-local config first, then the user config directory
    fn implicit_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".lessonbuilder.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("lessonbuilder").join("lessonbuilder.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| eyre::eyre!("Environment variable {} is not set", self.api_key_env))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

/// Research aggregator configuration
///
/// The limits bound both latency and external-call volume of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Run the research step at all
    pub enabled: bool,

    #[serde(rename = "max-packages")]
    pub max_packages: usize,

    #[serde(rename = "max-queries-per-package")]
    pub max_queries_per_package: usize,

    #[serde(rename = "results-per-query")]
    pub results_per_query: usize,

    #[serde(rename = "max-code-blocks-per-page")]
    pub max_code_blocks_per_page: usize,

    #[serde(rename = "min-doc-content-chars")]
    pub min_doc_content_chars: usize,

    #[serde(rename = "max-fallback-pages")]
    pub max_fallback_pages: usize,

    #[serde(rename = "snippet-prompt-chars")]
    pub snippet_prompt_chars: usize,

    #[serde(rename = "doc-prompt-chars")]
    pub doc_prompt_chars: usize,

    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// User-Agent header sent with registry lookups and page fetches
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Search results outside these domains are dropped
    #[serde(rename = "trusted-domains")]
    pub trusted_domains: Vec<String>,

    /// Base URL of the package registry JSON API
    #[serde(rename = "registry-url")]
    pub registry_url: String,
}

impl ResearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_packages: DEFAULT_MAX_PACKAGES,
            max_queries_per_package: DEFAULT_MAX_QUERIES_PER_PACKAGE,
            results_per_query: DEFAULT_RESULTS_PER_QUERY,
            max_code_blocks_per_page: DEFAULT_MAX_CODE_BLOCKS_PER_PAGE,
            min_doc_content_chars: DEFAULT_MIN_DOC_CONTENT_CHARS,
            max_fallback_pages: DEFAULT_MAX_FALLBACK_PAGES,
            snippet_prompt_chars: DEFAULT_SNIPPET_PROMPT_CHARS,
            doc_prompt_chars: DEFAULT_DOC_PROMPT_CHARS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: format!("LessonBuilder/{} (research)", env!("CARGO_PKG_VERSION")),
            trusted_domains: [
                "readthedocs.io",
                "readthedocs.org",
                "pypi.org",
                "github.com",
                "docs.python.org",
                "realpython.com",
                "stackoverflow.com",
                "numpy.org",
                "pandas.pydata.org",
                "scikit-learn.org",
                "matplotlib.org",
                "pytorch.org",
                "tensorflow.org",
                "scipy.org",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
            registry_url: "https://pypi.org/pypi".to_string(),
        }
    }
}

/// Web search provider selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// "auto", "tavily", "brave", "serpapi" or "none"
    pub provider: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
        }
    }
}

/// Notebook output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory notebooks are written to
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.research.max_packages, 3);
        assert_eq!(config.research.max_queries_per_package, 3);
        assert_eq!(config.search.provider, "auto");
        assert_eq!(config.output.dir, PathBuf::from("."));
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_research_limits_match_constants() {
        let research = ResearchConfig::default();

        assert_eq!(research.min_doc_content_chars, DEFAULT_MIN_DOC_CONTENT_CHARS);
        assert_eq!(research.snippet_prompt_chars, 150);
        assert_eq!(research.doc_prompt_chars, 2000);
        assert_eq!(research.request_timeout(), Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS));
        assert!(research.trusted_domains.iter().any(|d| d == "readthedocs.io"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: anthropic
  model: claude-sonnet-4
  api-key-env: MY_API_KEY
  base-url: https://api.example.com
  max-tokens: 4096
  timeout-ms: 60000

research:
  enabled: false
  max-packages: 2
  trusted-domains:
    - docs.example.org

search:
  provider: brave

output:
  dir: notebooks

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.max_tokens, 4096);
        assert!(!config.research.enabled);
        assert_eq!(config.research.max_packages, 2);
        assert_eq!(config.research.trusted_domains, vec!["docs.example.org".to_string()]);
        assert_eq!(config.search.provider, "brave");
        assert_eq!(config.output.dir, PathBuf::from("notebooks"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
research:
  max-queries-per-package: 1
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.research.max_queries_per_package, 1);
        assert_eq!(config.research.max_packages, DEFAULT_MAX_PACKAGES);
        assert!(config.research.enabled);
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lb.yml");
        fs::write(&path, "output:\n  dir: out\nlog-level: trace\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("trace"));
    }

    #[test]
    fn test_load_explicit_missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yml");

        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }
}
