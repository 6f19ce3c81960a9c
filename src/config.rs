//! TOML configuration.
//!
//! Every section is optional; a missing file at the default path yields
//! [`Config::default`]. API keys are never read from the file, only from
//! the environment variable named by `chat.api_key_env`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
}

/// Where the KB exports live and how they are laid out.
#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_root")]
    pub root: PathBuf,
    /// Year directories scanned under `root`, also used to date files.
    #[serde(default = "default_years")]
    pub years: Vec<String>,
    /// Failed-search exports, relative to `root`, one subdirectory per year.
    #[serde(default = "default_failed_searches_dir")]
    pub failed_searches_dir: PathBuf,
    /// Banner rows above the real header in failed-search and some article exports.
    #[serde(default = "default_header_skip_rows")]
    pub header_skip_rows: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: default_data_root(),
            years: default_years(),
            failed_searches_dir: default_failed_searches_dir(),
            header_skip_rows: default_header_skip_rows(),
        }
    }
}

impl DataConfig {
    pub fn failed_searches_path(&self) -> PathBuf {
        self.root.join(&self.failed_searches_dir)
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from("./eGain KB Data")
}
fn default_years() -> Vec<String> {
    (2019..=2025).map(|y| y.to_string()).collect()
}
fn default_failed_searches_dir() -> PathBuf {
    PathBuf::from("Failed searches")
}
fn default_header_skip_rows() -> usize {
    9
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_insights_json")]
    pub insights_json: String,
    #[serde(default = "default_summary_txt")]
    pub summary_txt: String,
    #[serde(default = "default_dashboard_html")]
    pub dashboard_html: String,
    #[serde(default = "default_tracker_csv")]
    pub tracker_csv: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            insights_json: default_insights_json(),
            summary_txt: default_summary_txt(),
            dashboard_html: default_dashboard_html(),
            tracker_csv: default_tracker_csv(),
        }
    }
}

impl OutputConfig {
    pub fn insights_json_path(&self) -> PathBuf {
        self.dir.join(&self.insights_json)
    }
    pub fn summary_txt_path(&self) -> PathBuf {
        self.dir.join(&self.summary_txt)
    }
    pub fn dashboard_html_path(&self) -> PathBuf {
        self.dir.join(&self.dashboard_html)
    }
    pub fn tracker_csv_path(&self) -> PathBuf {
        self.dir.join(&self.tracker_csv)
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_insights_json() -> String {
    "kb_insights_report.json".to_string()
}
fn default_summary_txt() -> String {
    "kb_summary_report.txt".to_string()
}
fn default_dashboard_html() -> String {
    "kb_dashboard.html".to_string()
}
fn default_tracker_csv() -> String {
    "improvement_tracker.csv".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// HTML page served at `GET /`.
    #[serde(default = "default_index_file")]
    pub index_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            index_file: default_index_file(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}
fn default_index_file() -> PathBuf {
    PathBuf::from("medical_assistant.html")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl ChatConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_system_prompt() -> String {
    "You are a helpful medical insurance assistant. You help users:\n\
     - Choose the right medical plan based on their needs\n\
     - Understand different plan types (HMO, PPO, etc.)\n\
     - Compare costs, coverage, and benefits\n\
     - Answer questions about medical insurance\n\
     \n\
     Be friendly, concise, and informative. When recommending plans, consider:\n\
     - Family size\n\
     - Healthcare usage (low, moderate, high)\n\
     - Budget constraints\n\
     - Preferred providers\n\
     \n\
     Current context: User is on Step 1 of 5 - Medical Plan Selection"
        .to_string()
}

/// Reads and validates a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a file that does not exist yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.data.years.is_empty() {
        bail!("data.years must list at least one year");
    }
    for year in &config.data.years {
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            bail!("data.years entries must be 4-digit years, got '{}'", year);
        }
    }
    if config.data.header_skip_rows >= 1000 {
        bail!("data.header_skip_rows must be < 1000");
    }

    if config.server.bind.trim().is_empty() {
        bail!("server.bind must not be empty");
    }

    match config.chat.provider.as_str() {
        "disabled" | "gemini" => {}
        other => bail!(
            "Unknown chat provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }
    if config.chat.is_enabled() && config.chat.model.trim().is_empty() {
        bail!(
            "chat.model must be specified when provider is '{}'",
            config.chat.provider
        );
    }

    Ok(())
}
