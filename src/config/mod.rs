//! User preferences: API key, theme, accent color, and voice.

mod io;

pub use io::{config_path, load_config, save_config};

use serde::{Deserialize, Serialize};

use crate::api::live::LiveVoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
}

fn default_theme() -> ThemeMode {
    ThemeMode::Dark
}

fn default_accent() -> String {
    "teal".to_string()
}

fn default_voice() -> LiveVoice {
    LiveVoice::Aoede
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default = "default_theme")]
    pub theme: ThemeMode,
    #[serde(default = "default_accent")]
    pub accent_color: String,
    #[serde(default = "default_voice")]
    pub voice: LiveVoice,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            theme: default_theme(),
            accent_color: default_accent(),
            voice: default_voice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"gemini_api_key": "k"}"#).unwrap();
        assert_eq!(config.gemini_api_key, "k");
        assert_eq!(config.theme, ThemeMode::Dark);
        assert_eq!(config.accent_color, "teal");
        assert_eq!(config.voice, LiveVoice::Aoede);
    }

    #[test]
    fn theme_serializes_lowercase() {
        let json = serde_json::to_string(&ThemeMode::Light).unwrap();
        assert_eq!(json, r#""light""#);
    }
}
