use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    #[default]
    Dark,
}

impl ThemePreference {
    pub fn toggled(self) -> Self {
        match self {
            ThemePreference::Light => ThemePreference::Dark,
            ThemePreference::Dark => ThemePreference::Light,
        }
    }

    /// Label for the toggle button: the theme it switches to.
    pub fn toggle_label(self) -> &'static str {
        match self {
            ThemePreference::Light => "Dark mode",
            ThemePreference::Dark => "Light mode",
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default)]
    theme: ThemePreference,
}

pub fn preferences_path() -> PathBuf {
    Config::get_config_dir().join("preferences.toml")
}

/// Stored theme, or dark when nothing usable is stored.
pub fn load_theme(path: &Path) -> ThemePreference {
    match fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<PreferencesFile>(&contents) {
            Ok(prefs) => prefs.theme,
            Err(e) => {
                tracing::warn!("Ignoring unreadable preferences {}: {}", path.display(), e);
                ThemePreference::default()
            }
        },
        Err(_) => ThemePreference::default(),
    }
}

pub fn save_theme(path: &Path, theme: ThemePreference) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = toml::to_string(&PreferencesFile { theme })?;
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_dark() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_theme(&dir.path().join("missing.toml")), ThemePreference::Dark);
    }

    #[test]
    fn test_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs/preferences.toml");

        let theme = load_theme(&path).toggled();
        assert_eq!(theme, ThemePreference::Light);
        save_theme(&path, theme).unwrap();

        assert_eq!(load_theme(&path), ThemePreference::Light);
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "theme = \"light\"");
    }

    #[test]
    fn test_garbage_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        fs::write(&path, "theme = \"purple\"").unwrap();
        assert_eq!(load_theme(&path), ThemePreference::Dark);
    }
}
