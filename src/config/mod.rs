use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::OutputFormat;
use crate::TranscriptError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transcript engine tuning
    pub engine: EngineConfig,

    /// HTTP transport settings
    pub http: HttpConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resolved transcripts kept per session
    pub transcript_cache_size: usize,

    /// Transcript request params kept per session
    pub param_cache_size: usize,

    /// Alternate-language param lists kept per session
    pub language_cache_size: usize,

    /// Pause between the two caption toggle clicks
    pub toggle_delay_ms: u64,

    /// Interval between network log reads while waiting for an access token
    pub token_poll_interval_ms: u64,

    /// Give up waiting for an access token after this long
    pub token_timeout_ms: u64,

    /// Interval between element lookups while waiting for page controls
    pub element_poll_interval_ms: u64,

    /// Wait for the transcript item of the overflow menu
    pub menu_wait_ms: u64,

    /// Wait for the transcript panel tab list
    pub tablist_wait_ms: u64,

    /// Wait for transcript segments to render
    pub panel_wait_ms: u64,

    /// Pause after clicking the chapters tab
    pub chapter_switch_delay_ms: u64,

    /// Pause after clicking the transcript tab following a chapters switch
    pub chapter_return_delay_ms: u64,

    /// Pause after clicking the transcript tab directly
    pub tab_click_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Origin used to build watch page URLs
    pub origin: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Accept-Language header, if any
    pub accept_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Caption language to prefer (falls back to the page language)
    pub preferred_language: Option<String>,

    /// Default output format
    pub default_output_format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transcript_cache_size: 6,
            param_cache_size: 10,
            language_cache_size: 6,
            toggle_delay_ms: 120,
            token_poll_interval_ms: 80,
            token_timeout_ms: 1500,
            element_poll_interval_ms: 100,
            menu_wait_ms: 1500,
            tablist_wait_ms: 2000,
            panel_wait_ms: 7000,
            chapter_switch_delay_ms: 800,
            chapter_return_delay_ms: 300,
            tab_click_delay_ms: 120,
        }
    }
}

impl EngineConfig {
    pub fn toggle_delay(&self) -> Duration {
        Duration::from_millis(self.toggle_delay_ms)
    }

    pub fn token_poll_interval(&self) -> Duration {
        Duration::from_millis(self.token_poll_interval_ms)
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.token_timeout_ms)
    }

    pub fn element_poll_interval(&self) -> Duration {
        Duration::from_millis(self.element_poll_interval_ms)
    }

    pub fn menu_wait(&self) -> Duration {
        Duration::from_millis(self.menu_wait_ms)
    }

    pub fn tablist_wait(&self) -> Duration {
        Duration::from_millis(self.tablist_wait_ms)
    }

    pub fn panel_wait(&self) -> Duration {
        Duration::from_millis(self.panel_wait_ms)
    }

    pub fn chapter_switch_delay(&self) -> Duration {
        Duration::from_millis(self.chapter_switch_delay_ms)
    }

    pub fn chapter_return_delay(&self) -> Duration {
        Duration::from_millis(self.chapter_return_delay_ms)
    }

    pub fn tab_click_delay(&self) -> Duration {
        Duration::from_millis(self.tab_click_delay_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            origin: "https://www.youtube.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_secs: 30,
            accept_language: Some("en-US,en;q=0.9".to_string()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preferred_language: None,
            default_output_format: "text".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            http: HttpConfig::default(),
            app: AppConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // Local file wins so a checkout can carry its own settings
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-copier").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.http.origin).is_err() {
            return Err(TranscriptError::ConfigError(format!(
                "http.origin is not a valid URL: {}",
                self.http.origin
            ))
            .into());
        }

        if self.http.timeout_secs == 0 {
            return Err(TranscriptError::ConfigError("http.timeout_secs must be positive".into()).into());
        }

        if OutputFormat::from_name(&self.app.default_output_format).is_none() {
            return Err(TranscriptError::ConfigError(format!(
                "app.default_output_format must be text or json, got {}",
                self.app.default_output_format
            ))
            .into());
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Origin: {}", self.http.origin);
        println!("  Request Timeout: {}s", self.http.timeout_secs);
        if let Some(lang) = &self.app.preferred_language {
            println!("  Preferred Language: {}", lang);
        }
        println!("  Default Format: {}", self.app.default_output_format);
        println!(
            "  Cache Sizes: transcripts={}, params={}, languages={}",
            self.engine.transcript_cache_size,
            self.engine.param_cache_size,
            self.engine.language_cache_size
        );
        println!("  Panel Wait: {}ms", self.engine.panel_wait_ms);
    }
}
