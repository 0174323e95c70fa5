//! Config I/O: load and save preferences as JSON.

use std::path::PathBuf;

use log::warn;

use super::Config;
use crate::error::{SessionError, SessionResult};

/// Get the config file path.
pub fn config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_default()
        .join("lecture-live-translator");
    let _ = std::fs::create_dir_all(&config_dir);
    config_dir.join("config.json")
}

/// Load config from disk. Missing or corrupt files fall back to defaults.
pub fn load_config(path: &std::path::Path) -> Config {
    if !path.exists() {
        return Config::default();
    }

    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(_) => return Config::default(),
    };

    match serde_json::from_str(&data) {
        Ok(config) => config,
        Err(e) => {
            warn!("[CONFIG] corrupt config, using defaults: {}", e);
            Config::default()
        }
    }
}

/// Save config to disk. Failures are logged, never raised.
pub fn save_config(path: &std::path::Path, config: &Config) {
    if let Err(e) = try_save(path, config) {
        warn!("[CONFIG] {}", e);
    }
}

fn try_save(path: &std::path::Path, config: &Config) -> SessionResult<()> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let data = serde_json::to_string_pretty(config)
        .map_err(|e| SessionError::Persistence(format!("serialize config: {}", e)))?;
    std::fs::write(path, data)
        .map_err(|e| SessionError::Persistence(format!("write {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::live::LiveVoice;
    use crate::config::ThemeMode;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "lecture-live-translator-config-{}-{}.json",
            name,
            std::process::id()
        ))
    }

    #[test]
    fn save_and_reload_round_trip() {
        let path = temp_path("roundtrip");
        let config = Config {
            gemini_api_key: "key".to_string(),
            theme: ThemeMode::Light,
            accent_color: "rose".to_string(),
            voice: LiveVoice::Puck,
        };
        save_config(&path, &config);

        let loaded = load_config(&path);
        assert_eq!(loaded.gemini_api_key, "key");
        assert_eq!(loaded.theme, ThemeMode::Light);
        assert_eq!(loaded.accent_color, "rose");
        assert_eq!(loaded.voice, LiveVoice::Puck);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = load_config(&temp_path("missing-never-written"));
        assert!(config.gemini_api_key.is_empty());
        assert_eq!(config.theme, ThemeMode::Dark);
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "}}}}").unwrap();
        let config = load_config(&path);
        assert_eq!(config.accent_color, "teal");
        let _ = std::fs::remove_file(path);
    }
}
