use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_reveal_tick_ms() -> u64 {
    40
}

fn default_submit_delay_ms() -> u64 {
    600
}

fn default_suggestions() -> Vec<String> {
    vec![
        "My kitchen faucet keeps dripping. How do I fix it?".to_string(),
        "What causes a circuit breaker to trip repeatedly?".to_string(),
        "How can I repair a small crack in drywall?".to_string(),
        "My laptop overheats while charging. What should I check?".to_string(),
    ]
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeminiConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_reveal_tick_ms")]
    pub reveal_tick_ms: u64,
    #[serde(default = "default_submit_delay_ms")]
    pub submit_delay_ms: u64,
    #[serde(default = "default_suggestions")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_url: default_api_url(),
            model: default_model(),
            api_key: String::new(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            reveal_tick_ms: default_reveal_tick_ms(),
            submit_delay_ms: default_submit_delay_ms(),
            suggestions: default_suggestions(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 720,
            height: 820,
            min_width: 400,
            min_height: 480,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::get_config_path());
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                config.gemini.api_key = key.trim().to_string();
            }
        }
        if config.gemini.api_key.is_empty() {
            tracing::warn!("No Gemini API key configured; set GEMINI_API_KEY or gemini.api_key");
        }
        config
    }

    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Error parsing config.toml: {}. Using defaults.", e),
                },
                Err(e) => tracing::warn!("Error reading config.toml: {}. Using defaults.", e),
            }
        } else if let Some(parent) = config_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        Config::default()
    }

    pub fn get_config_path() -> PathBuf {
        if std::env::var_os("HOME").is_some() {
            Self::get_config_dir().join("config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/repairvision")
        } else {
            PathBuf::from(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nested/config.toml"));
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.chat.reveal_tick_ms, 40);
        assert_eq!(config.chat.submit_delay_ms, 600);
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[gemini]\nmodel = \"gemini-2.0-flash\"\n\n[chat]\nreveal_tick_ms = 10\n",
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.gemini.api_url, default_api_url());
        assert_eq!(config.chat.reveal_tick_ms, 10);
        assert_eq!(config.chat.submit_delay_ms, 600);
        assert_eq!(config.window.width, 720);
    }

    #[test]
    fn test_partial_window_table_keeps_other_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[gemini]\napi_key = \"k\"\n\n[window]\nwidth = 900\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.gemini.api_key, "k");
        assert_eq!(config.window.width, 900);
        assert_eq!(config.window.height, 820);
        assert_eq!(config.window.min_width, 400);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "gemini = [not toml").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
    }
}
