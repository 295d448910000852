//! Runtime configuration read from the environment.
//!
//! Everything is resolved once at startup into an [`AppConfig`], which is then
//! handed to the provider and the router. Nothing here is global.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_DIFY_USER: &str = "avatar-ui-user";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "あなたはSpectraというAIアシスタントです。技術的で直接的なスタイルで簡潔に応答してください。";

/// Gemini (hosted LLM) connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub system_instruction: String,
}

/// Dify (workflow orchestration) connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifyConfig {
    pub api_key: String,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Value of the `user` field Dify requires on every request.
    pub user: String,
}

/// The one backend this process talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Gemini(GeminiConfig),
    Dify(DifyConfig),
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::Gemini(_) => "gemini",
            ProviderConfig::Dify(_) => "dify",
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub debug: bool,
    /// Directory served under `/static` (avatar images).
    pub static_dir: PathBuf,
}

/// Values injected into the UI page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    pub typewriter_delay: u32,
    pub avatar_name: String,
    pub avatar_full_name: String,
    pub mouth_animation_interval: u32,
    pub beep_frequency: u32,
    pub beep_duration: u32,
    pub beep_volume: f64,
    pub beep_volume_end: f64,
    pub avatar_image_idle: String,
    pub avatar_image_talk: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            typewriter_delay: 30,
            avatar_name: "Spectra".into(),
            avatar_full_name: "Spectra Communicator".into(),
            mouth_animation_interval: 100,
            beep_frequency: 600,
            beep_duration: 30,
            beep_volume: 0.1,
            beep_volume_end: 0.01,
            avatar_image_idle: "idle.png".into(),
            avatar_image_talk: "talk.png".into(),
        }
    }
}

impl UiConfig {
    /// Serialize for embedding into the page.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub server: ServerConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = match get("AI_PROVIDER").map(|p| p.to_lowercase()).as_deref() {
            Some("gemini") => ProviderConfig::Gemini(GeminiConfig {
                api_key: get("GEMINI_API_KEY").ok_or_else(|| missing("GEMINI_API_KEY"))?,
                base_url: trim_base(
                    get("GEMINI_BASE_URL")
                        .as_deref()
                        .unwrap_or(DEFAULT_GEMINI_BASE_URL),
                ),
                model: get("MODEL_NAME").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
                system_instruction: get("SYSTEM_INSTRUCTION")
                    .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.into()),
            }),
            Some("dify") => ProviderConfig::Dify(DifyConfig {
                api_key: get("DIFY_API_KEY").ok_or_else(|| missing("DIFY_API_KEY"))?,
                base_url: trim_base(
                    &get("DIFY_BASE_URL").ok_or_else(|| missing("DIFY_BASE_URL"))?,
                ),
                user: get("DIFY_USER").unwrap_or_else(|| DEFAULT_DIFY_USER.into()),
            }),
            Some(other) => {
                return Err(Error::Config(format!(
                    "unsupported AI_PROVIDER '{}' (expected 'gemini' or 'dify')",
                    other
                )))
            }
            None => {
                return Err(Error::Config(
                    "AI_PROVIDER is not set (expected 'gemini' or 'dify')".into(),
                ))
            }
        };

        // PORT is what container platforms inject; it wins over SERVER_PORT.
        let port = match get("PORT") {
            Some(_) => parse_var(&get, "PORT", DEFAULT_PORT)?,
            None => parse_var(&get, "SERVER_PORT", DEFAULT_PORT)?,
        };
        let server = ServerConfig {
            port,
            debug: get("DEBUG_MODE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        };

        let defaults = UiConfig::default();
        let ui = UiConfig {
            typewriter_delay: parse_var(&get, "TYPEWRITER_DELAY_MS", defaults.typewriter_delay)?,
            avatar_name: get("AVATAR_NAME").unwrap_or(defaults.avatar_name),
            avatar_full_name: get("AVATAR_FULL_NAME").unwrap_or(defaults.avatar_full_name),
            mouth_animation_interval: parse_var(
                &get,
                "MOUTH_ANIMATION_INTERVAL_MS",
                defaults.mouth_animation_interval,
            )?,
            beep_frequency: parse_var(&get, "BEEP_FREQUENCY_HZ", defaults.beep_frequency)?,
            beep_duration: parse_var(&get, "BEEP_DURATION_MS", defaults.beep_duration)?,
            beep_volume: parse_var(&get, "BEEP_VOLUME", defaults.beep_volume)?,
            beep_volume_end: parse_var(&get, "BEEP_VOLUME_END", defaults.beep_volume_end)?,
            avatar_image_idle: get("AVATAR_IMAGE_IDLE").unwrap_or(defaults.avatar_image_idle),
            avatar_image_talk: get("AVATAR_IMAGE_TALK").unwrap_or(defaults.avatar_image_talk),
        };

        debug!(provider = provider.name(), port, "configuration loaded");

        Ok(Self { provider, server, ui })
    }
}

/// Load `.env` from the working directory (or the nearest parent that has
/// one) into the process environment. Variables already set are kept.
///
/// Returns the file that was loaded, `None` when there is no `.env`.
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(Error::Config(format!("failed to read .env: {}", e))),
    }
}

/// Like [`load_dotenv`] for an explicit file, which must exist.
pub fn load_env_file(path: &Path) -> Result<()> {
    dotenvy::from_path(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))
}

fn missing(key: &str) -> Error {
    Error::Config(format!("{} is required for the selected AI_PROVIDER", key))
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn parse_var<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_dify_config() {
        let config = load(&[
            ("AI_PROVIDER", "dify"),
            ("DIFY_API_KEY", "app-123"),
            ("DIFY_BASE_URL", "https://dify.example.com/"),
        ])
        .unwrap();

        match config.provider {
            ProviderConfig::Dify(dify) => {
                assert_eq!(dify.api_key, "app-123");
                assert_eq!(dify.base_url, "https://dify.example.com");
                assert_eq!(dify.user, DEFAULT_DIFY_USER);
            }
            other => panic!("expected dify, got {:?}", other),
        }
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.server.debug);
        assert_eq!(config.server.static_dir, PathBuf::from(DEFAULT_STATIC_DIR));
        assert_eq!(config.ui, UiConfig::default());
    }

    #[test]
    fn test_gemini_defaults() {
        let config = load(&[("AI_PROVIDER", "Gemini"), ("GEMINI_API_KEY", "g-key")]).unwrap();
        match config.provider {
            ProviderConfig::Gemini(gemini) => {
                assert_eq!(gemini.model, DEFAULT_GEMINI_MODEL);
                assert_eq!(gemini.base_url, DEFAULT_GEMINI_BASE_URL);
                assert_eq!(gemini.system_instruction, DEFAULT_SYSTEM_INSTRUCTION);
            }
            other => panic!("expected gemini, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_provider() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("AI_PROVIDER"));
    }

    #[test]
    fn test_unknown_provider() {
        let err = load(&[("AI_PROVIDER", "openai")]).unwrap_err();
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_missing_credentials() {
        let err = load(&[("AI_PROVIDER", "dify"), ("DIFY_API_KEY", "k")]).unwrap_err();
        assert!(err.to_string().contains("DIFY_BASE_URL"));

        // Blank counts as unset
        let err = load(&[("AI_PROVIDER", "gemini"), ("GEMINI_API_KEY", "  ")]).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_port_precedence() {
        let base = [("AI_PROVIDER", "gemini"), ("GEMINI_API_KEY", "k")];

        let mut vars = base.to_vec();
        vars.push(("SERVER_PORT", "8000"));
        assert_eq!(load(&vars).unwrap().server.port, 8000);

        vars.push(("PORT", "8080"));
        assert_eq!(load(&vars).unwrap().server.port, 8080);
    }

    #[test]
    fn test_invalid_number() {
        let err = load(&[
            ("AI_PROVIDER", "gemini"),
            ("GEMINI_API_KEY", "k"),
            ("BEEP_VOLUME", "loud"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("BEEP_VOLUME"));
    }

    #[test]
    fn test_env_file_does_not_override() {
        let path = std::env::temp_dir().join(format!("sessionbuddy-{}.env", std::process::id()));
        std::fs::write(
            &path,
            "# comment\nSESSIONBUDDY_TEST_FROM_FILE=file\nSESSIONBUDDY_TEST_PRESET=file\n",
        )
        .unwrap();
        std::env::set_var("SESSIONBUDDY_TEST_PRESET", "process");

        load_env_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(std::env::var("SESSIONBUDDY_TEST_FROM_FILE").unwrap(), "file");
        assert_eq!(std::env::var("SESSIONBUDDY_TEST_PRESET").unwrap(), "process");

        let err = load_env_file(Path::new("/nonexistent/sessionbuddy.env")).unwrap_err();
        assert!(err.to_string().contains("sessionbuddy.env"));
    }

    #[test]
    fn test_ui_overrides_and_debug_flag() {
        let config = load(&[
            ("AI_PROVIDER", "gemini"),
            ("GEMINI_API_KEY", "k"),
            ("AVATAR_NAME", "Nova"),
            ("TYPEWRITER_DELAY_MS", "12"),
            ("DEBUG_MODE", "False"),
        ])
        .unwrap();
        assert_eq!(config.ui.avatar_name, "Nova");
        assert_eq!(config.ui.typewriter_delay, 12);
        assert!(!config.server.debug);

        let json = config.ui.to_json().unwrap();
        assert!(json.contains("\"avatar_name\":\"Nova\""));
    }
}
