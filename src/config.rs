// Configuration module for friendly-fire-tracker
// Handles XDG-compliant directory paths and TOML configuration file

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const APP_NAME: &str = "friendly-fire-tracker";
const CONFIG_FILENAME: &str = "config.toml";
const PORTABLE_DATA_DIR: &str = "docs/data";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Directory paths (overrides XDG defaults)
    pub paths: PathsConfig,

    /// OMDb metadata API
    pub omdb: OmdbConfig,

    /// Streaming availability API
    pub streaming: StreamingConfig,

    /// Podcast episode scraper
    pub scraper: ScraperConfig,

    /// Feed-specific cleaning rules
    pub cleaning: CleaningRules,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Override data directory (movies.json, metadata.json)
    pub data_dir: Option<PathBuf>,

    /// Override config directory
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OmdbConfig {
    /// OMDb API key (required unless API calls are skipped)
    pub api_key: Option<String>,
    pub base_url: String,
    /// Pause after every live query
    pub rate_limit_ms: u64,
    /// Retries per query on transport failure
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for OmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "http://www.omdbapi.com/".to_string(),
            rate_limit_ms: 500,
            max_retries: 2,
            retry_delay_ms: 1000,
            timeout_secs: 10,
        }
    }
}

impl OmdbConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// RapidAPI key (required unless streaming calls are skipped)
    pub api_key: Option<String>,
    pub base_url: String,
    /// Value for the X-RapidAPI-Host header
    pub host: String,
    /// Country code used to pick offers out of the response
    pub country: String,
    pub rate_limit_ms: u64,
    /// Wait before the single retry after a 429
    pub rate_limit_retry_secs: u64,
    pub timeout_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://streaming-availability.p.rapidapi.com".to_string(),
            host: "streaming-availability.p.rapidapi.com".to_string(),
            country: "us".to_string(),
            rate_limit_ms: 1000,
            rate_limit_retry_secs: 5,
            timeout_secs: 15,
        }
    }
}

impl StreamingConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn rate_limit_retry(&self) -> Duration {
        Duration::from_secs(self.rate_limit_retry_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Podcast listing page; pages are requested as `{base_url}?_paged={n}`
    pub base_url: String,
    pub max_pages: u32,
    /// Pause between listing pages
    pub page_delay_ms: u64,
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `n * retry_delay_secs`
    pub retry_delay_secs: u64,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maximumfun.org/podcasts/friendly-fire/".to_string(),
            max_pages: 20,
            page_delay_ms: 2000,
            max_retries: 3,
            retry_delay_secs: 2,
            user_agent: "FriendlyFireBot/1.0 (Educational Project)".to_string(),
            timeout_secs: 10,
        }
    }
}

impl ScraperConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Literal find/replace pair
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Replacement {
    pub find: String,
    #[serde(default)]
    pub replace: String,
}

impl Replacement {
    pub fn new(find: &str, replace: &str) -> Self {
        Self {
            find: find.to_string(),
            replace: replace.to_string(),
        }
    }
}

/// Number token that stands for a fixed episode number
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NumberSentinel {
    pub token: String,
    pub number: String,
}

/// Every irregularity of the podcast feed, expressed as data
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningRules {
    /// Case-insensitive substrings; a match in the number token or title drops the episode
    pub exclude_patterns: Vec<String>,

    /// Known mis-decoded byte sequences and their replacement
    pub encoding_artifacts: Vec<Replacement>,

    /// Characters removed from titles
    pub quote_chars: Vec<char>,

    /// Literal prefixes removed from the number token
    pub number_prefixes: Vec<String>,

    /// Whole-token number fixes, applied after prefix stripping
    pub number_sentinels: Vec<NumberSentinel>,

    /// Exact substring fixes for mistitled episodes
    pub title_fixes: Vec<Replacement>,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                "TRANSCRIPT".to_string(),
                "Rogue One".to_string(),
                "Pork Chop Feed".to_string(),
                "Bonus".to_string(),
                "Live Show".to_string(),
                "Special".to_string(),
            ],
            encoding_artifacts: vec![Replacement::new("\u{e2}\u{20ac}\u{2122}", "")],
            quote_chars: vec!['\'', '"', '\u{2019}', '\u{2018}', '\u{201c}', '\u{201d}'],
            number_prefixes: vec!["Ep ".to_string(), "Episode ".to_string()],
            number_sentinels: vec![NumberSentinel {
                token: "Ep".to_string(),
                number: "100".to_string(),
            }],
            title_fixes: vec![Replacement::new(
                "100 Tora! Tora! Tora!",
                "Tora! Tora! Tora!",
            )],
        }
    }
}

/// Application paths following XDG Base Directory Specification on Unix
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for configuration files (config.toml)
    /// XDG: $XDG_CONFIG_HOME/friendly-fire-tracker or ~/.config/friendly-fire-tracker
    pub config_dir: PathBuf,

    /// Directory for the generated dataset
    /// XDG: $XDG_DATA_HOME/friendly-fire-tracker or ~/.local/share/friendly-fire-tracker
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Priority order:
    /// 1. Environment variables (FRIENDLY_FIRE_CONFIG_DIR, FRIENDLY_FIRE_DATA_DIR)
    /// 2. Config file overrides
    /// 3. XDG / platform directories
    /// 4. Current directory fallback
    pub fn new(config_overrides: &PathsConfig) -> Self {
        Self {
            config_dir: Self::resolve_dir(
                "FRIENDLY_FIRE_CONFIG_DIR",
                &config_overrides.config_dir,
                dirs::config_dir(),
            ),
            data_dir: Self::resolve_dir(
                "FRIENDLY_FIRE_DATA_DIR",
                &config_overrides.data_dir,
                dirs::data_dir(),
            ),
        }
    }

    /// Portable layout: config in the current directory, data in ./docs/data
    pub fn current_dir() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            config_dir: cwd.clone(),
            data_dir: cwd.join(PORTABLE_DATA_DIR),
        }
    }

    fn resolve_dir(
        env_var: &str,
        config_override: &Option<PathBuf>,
        platform_dir: Option<PathBuf>,
    ) -> PathBuf {
        if let Ok(path) = std::env::var(env_var) {
            return PathBuf::from(path);
        }

        if let Some(ref path) = config_override {
            return path.clone();
        }

        if let Some(dir) = platform_dir {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    pub fn movies_path(&self) -> PathBuf {
        self.data_dir.join("movies.json")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("metadata.json")
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    /// Log the configured paths
    pub fn log_paths(&self) {
        tracing::info!("Configuration directory: {}", self.config_dir.display());
        tracing::info!("Data directory: {}", self.data_dir.display());
    }
}

/// Application configuration - combines TOML file with environment overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: AppPaths,
    pub omdb: OmdbConfig,
    pub streaming: StreamingConfig,
    pub scraper: ScraperConfig,
    pub cleaning: CleaningRules,
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Self {
        let portable_mode = env_flag("FRIENDLY_FIRE_PORTABLE");

        if portable_mode {
            tracing::info!("Running in portable mode (using current directory)");
            let paths = AppPaths::current_dir();
            let config_file = Self::load_config_file(&paths.config_dir);
            return Self::build_with_paths(config_file, paths);
        }

        let config_dir = Self::find_config_dir();
        let config_file = Self::load_config_file(&config_dir);
        Self::build(config_file)
    }

    /// Find the config directory (for locating config.toml)
    fn find_config_dir() -> PathBuf {
        if let Ok(path) = std::env::var("FRIENDLY_FIRE_CONFIG_DIR") {
            return PathBuf::from(path);
        }

        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Load and parse the TOML config file
    fn load_config_file(config_dir: &std::path::Path) -> ConfigFile {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            tracing::debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
            return ConfigFile::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    ConfigFile::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        }
    }

    fn build(config_file: ConfigFile) -> Self {
        let paths = AppPaths::new(&config_file.paths);
        Self::build_with_paths(config_file, paths)
    }

    /// Build configuration from config file with environment overrides
    fn build_with_paths(config_file: ConfigFile, paths: AppPaths) -> Self {
        let mut omdb = config_file.omdb;
        // OMDb API key: env > config
        if let Ok(key) = std::env::var("OMDB_API_KEY") {
            omdb.api_key = Some(key);
        }

        let mut streaming = config_file.streaming;
        // RapidAPI key: env > config
        if let Ok(key) = std::env::var("RAPIDAPI_KEY") {
            streaming.api_key = Some(key);
        }
        if let Ok(country) = std::env::var("STREAMING_COUNTRY") {
            streaming.country = country;
        }

        Self {
            paths,
            omdb,
            streaming,
            scraper: config_file.scraper,
            cleaning: config_file.cleaning,
        }
    }

    /// Log configuration status
    pub fn log_config(&self) {
        self.paths.log_paths();

        if self.omdb.api_key.is_some() {
            tracing::info!("OMDb API key: configured");
        } else {
            tracing::info!("OMDb API key: missing");
            tracing::info!("Hint: Add [omdb] api_key to config.toml or set OMDB_API_KEY env var");
        }

        if self.streaming.api_key.is_some() {
            tracing::info!(
                "Streaming availability: configured (country: {})",
                self.streaming.country
            );
        } else {
            tracing::debug!("Streaming availability: no RapidAPI key");
        }

        tracing::debug!(
            "Cleaning rules: {} exclusions, {} title fixes",
            self.cleaning.exclude_patterns.len(),
            self.cleaning.title_fixes.len()
        );
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}
