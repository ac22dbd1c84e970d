use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Config;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub speech: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: Option<String>,
    pub session_cookie: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// MIME type requested from the TTS endpoint.
    pub accept: Option<String>,
}

/// Platform config directory path: `<config_dir>/lector/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lector").join("config.toml"))
}

/// Load config by cascading CWD `.lector.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".lector.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        server: Some(ServerConfig {
            base_url: overlay
                .server
                .as_ref()
                .and_then(|s| s.base_url.clone())
                .or_else(|| base.server.as_ref().and_then(|s| s.base_url.clone())),
            session_cookie: overlay
                .server
                .as_ref()
                .and_then(|s| s.session_cookie.clone())
                .or_else(|| base.server.as_ref().and_then(|s| s.session_cookie.clone())),
            timeout_secs: overlay
                .server
                .as_ref()
                .and_then(|s| s.timeout_secs)
                .or_else(|| base.server.as_ref().and_then(|s| s.timeout_secs)),
        }),
        speech: Some(SpeechConfig {
            accept: overlay
                .speech
                .as_ref()
                .and_then(|s| s.accept.clone())
                .or_else(|| base.speech.as_ref().and_then(|s| s.accept.clone())),
        }),
    }
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(path)
}

impl ConfigFile {
    /// Resolve into a runtime [`Config`], filling gaps with defaults.
    pub fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            base_url: self
                .server
                .as_ref()
                .and_then(|s| s.base_url.clone())
                .unwrap_or(defaults.base_url),
            session_cookie: self.server.as_ref().and_then(|s| s.session_cookie.clone()),
            timeout_secs: self
                .server
                .as_ref()
                .and_then(|s| s.timeout_secs)
                .unwrap_or(defaults.timeout_secs),
            audio_accept: self
                .speech
                .as_ref()
                .and_then(|s| s.accept.clone())
                .unwrap_or(defaults.audio_accept),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_round_trip_toml() {
        let config = ConfigFile {
            server: Some(ServerConfig {
                base_url: Some("http://reader.local/api".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.server.unwrap().base_url.unwrap(),
            "http://reader.local/api"
        );
    }

    #[test]
    fn absent_fields_deserialize_as_none() {
        let toml_str = "[server]\nbase_url = \"http://reader.local\"\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        let server = parsed.server.unwrap();
        assert!(server.session_cookie.is_none());
        assert!(server.timeout_secs.is_none());
        assert!(parsed.speech.is_none());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            server: Some(ServerConfig {
                base_url: Some("http://base".to_string()),
                timeout_secs: Some(10),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            server: Some(ServerConfig {
                base_url: Some("http://overlay".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let server = merged.server.unwrap();
        assert_eq!(server.base_url.unwrap(), "http://overlay");
        // Base value preserved where the overlay is silent.
        assert_eq!(server.timeout_secs.unwrap(), 10);
    }

    #[test]
    fn into_config_applies_defaults() {
        let config = ConfigFile::default().into_config();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.audio_accept, "audio/mpeg");
        assert!(config.session_cookie.is_none());
    }
}
