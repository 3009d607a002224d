use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DELVE_DIR: &str = ".delve";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Pause after each scripted phase announcement. Purely cosmetic.
    pub phase_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            phase_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub provider: String,
    pub searxng_endpoint: Option<String>,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "duckduckgo".to_string(),
            searxng_endpoint: None,
            max_results: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewsConfig {
    pub base_url: String,
    pub max_items: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://news.google.com".to_string(),
            max_items: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContentConfig {
    /// Pages whose main text is shorter than this are reported as unreadable.
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_chars: 100,
            max_chars: 20_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            user_agent: concat!("delve/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_iterations: usize,
    pub language: String,
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub news: NewsConfig,
    pub content: ContentConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "qwen3-4b".to_string(),
            temperature: 0.7,
            max_iterations: 20,
            language: "English".to_string(),
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            news: NewsConfig::default(),
            content: ContentConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

pub fn get_delve_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DELVE_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_delve_dir().join("config.toml")
}

impl Config {
    pub fn load_or_init(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);
        if path.exists() {
            load_config(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    toml::from_str(&content).with_context(|| format!("Failed to parse config from {}", path.display()))
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_or_init(Some(&tmp.path().join("nope.toml"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.model, "qwen3-4b");
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.provider = Some("ollama".into());
        config.server.phase_delay_ms = 0;
        config.search.provider = "searxng".into();
        config.search.searxng_endpoint = Some("http://localhost:8888".into());
        save_config(&config, &path).unwrap();

        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "model = \"llama3.2\"\n[server]\nport = 8080\n").unwrap();

        let config = Config::load_or_init(Some(&path)).unwrap();
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.news.max_items, 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        assert!(Config::load_or_init(Some(&path)).is_err());
    }
}
