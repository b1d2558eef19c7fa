use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides `[telegram] bot_token`.
pub const TOKEN_ENV: &str = "BOT_TOKEN";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub inline: InlineConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Drop updates that queued up while the bot was offline.
    #[serde(default = "default_skip_pending")]
    pub skip_pending_updates: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            skip_pending_updates: default_skip_pending(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BotConfig {
    /// Appended to the /help reply when set.
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InlineConfig {
    /// Seconds a personal inline result may be cached by the platform.
    #[serde(default = "default_cache_time")]
    pub cache_time: u32,
}

impl Default for InlineConfig {
    fn default() -> Self {
        Self {
            cache_time: default_cache_time(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatsBackendKind {
    #[default]
    Log,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub backend: StatsBackendKind,
    /// Required by the http backend.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: StatsBackendKind::default(),
            endpoint: None,
            queue_size: default_queue_size(),
        }
    }
}

fn default_skip_pending() -> bool {
    true
}

fn default_cache_time() -> u32 {
    3600
}

fn default_queue_size() -> usize {
    1024
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// A missing file is only an error when `required` is set; otherwise the
    /// defaults are used and the token must come from the environment.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() && !required {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.inline.cache_time == 0 {
            anyhow::bail!("[inline] cache_time must be positive");
        }
        if config.stats.enabled
            && config.stats.backend == StatsBackendKind::Http
            && config.stats.endpoint.is_none()
        {
            anyhow::bail!("[stats] backend = \"http\" requires an endpoint");
        }

        Ok(config)
    }

    /// Apply the environment override and return the credential, if any.
    pub fn credential(&self, env_token: Option<String>) -> Option<Credential> {
        env_token
            .or_else(|| self.telegram.bot_token.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Credential::new)
    }
}

/// Bot credential of the form `<numericBotID>:<secret>`.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    /// The bot's own user ID: the numeric prefix before the first `:`.
    pub fn bot_id(&self) -> Option<u64> {
        let (prefix, _) = self.0.split_once(':')?;
        prefix.parse().ok()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.bot_id() {
            Some(id) => write!(f, "Credential({}:***)", id),
            None => write!(f, "Credential(***)"),
        }
    }
}

/// Read-only runtime settings, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` disables the join handler.
    pub bot_id: Option<u64>,
    pub bot_username: Option<String>,
    pub inline_cache_time: u32,
    pub source_url: Option<String>,
}

impl Settings {
    pub fn new(config: &Config, credential: &Credential, bot_username: Option<String>) -> Self {
        Self {
            bot_id: credential.bot_id(),
            bot_username,
            inline_cache_time: config.inline.cache_time,
            source_url: config.bot.source_url.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_id: None,
            bot_username: None,
            inline_cache_time: default_cache_time(),
            source_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bot_id_from_credential() {
        assert_eq!(Credential::new("12345:ABCDEF").bot_id(), Some(12345));
        assert_eq!(Credential::new("abc:ABCDEF").bot_id(), None);
        assert_eq!(Credential::new("12345").bot_id(), None);
        assert_eq!(Credential::new(":secret").bot_id(), None);
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let out = format!("{:?}", Credential::new("12345:ABCDEF"));
        assert!(out.contains("12345"));
        assert!(!out.contains("ABCDEF"));
    }

    #[test]
    fn test_env_token_overrides_file() {
        let mut config = Config::default();
        config.telegram.bot_token = Some("1:file".to_string());

        let cred = config.credential(Some("2:env".to_string())).unwrap();
        assert_eq!(cred.token(), "2:env");

        let cred = config.credential(None).unwrap();
        assert_eq!(cred.token(), "1:file");
    }

    #[test]
    fn test_blank_token_is_missing() {
        let config = Config::default();
        assert!(config.credential(Some("   ".to_string())).is_none());
        assert!(config.credential(None).is_none());
    }

    #[test]
    fn test_missing_optional_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml"), false).unwrap();
        assert_eq!(config.inline.cache_time, 3600);
        assert!(config.telegram.skip_pending_updates);
        assert!(!config.stats.enabled);
    }

    #[test]
    fn test_missing_required_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("nope.toml"), true).is_err());
    }

    #[test]
    fn test_load_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[telegram]
bot_token = "12345:ABCDEF"
skip_pending_updates = false

[bot]
source_url = "https://example.com/idbot"

[inline]
cache_time = 60

[stats]
enabled = true
backend = "http"
endpoint = "http://localhost:9000/events"
"#
        )
        .unwrap();

        let config = Config::load(file.path(), true).unwrap();
        assert!(!config.telegram.skip_pending_updates);
        assert_eq!(config.inline.cache_time, 60);
        assert_eq!(config.stats.backend, StatsBackendKind::Http);
        assert_eq!(config.stats.queue_size, 1024);

        let cred = config.credential(None).unwrap();
        let settings = Settings::new(&config, &cred, Some("IdBot".to_string()));
        assert_eq!(settings.bot_id, Some(12345));
        assert_eq!(settings.inline_cache_time, 60);
        assert_eq!(
            settings.source_url.as_deref(),
            Some("https://example.com/idbot")
        );
    }

    #[test]
    fn test_zero_cache_time_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[inline]\ncache_time = 0").unwrap();
        assert!(Config::load(file.path(), true).is_err());
    }

    #[test]
    fn test_http_stats_requires_endpoint() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[stats]\nenabled = true\nbackend = \"http\"").unwrap();
        assert!(Config::load(file.path(), true).is_err());
    }
}
