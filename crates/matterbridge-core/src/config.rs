use crate::backoff::BackoffPolicy;
use crate::channel_map::ChannelMap;
use crate::error::{BridgeError, BridgeResult};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Full bridge configuration as loaded from `matterbridge.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    pub irc: IrcConfig,
    pub mattermost: MattermostConfig,
    /// Ordered channel mappings. Later duplicates overwrite earlier ones.
    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelMapping>,
}

/// Settings that belong to neither side.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralConfig {
    /// API key for the `!gif` media lookup. The public beta key is used when unset.
    #[serde(default)]
    pub giphy_api_key: Option<String>,
    /// Capacity of the queue between the remote session and the Remote->IRC pump.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Reconnect backoff bounds shared by both sessions.
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    pub server: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub skip_tls_verify: bool,
    pub nick: String,
    /// Server password (PASS).
    #[serde(default)]
    pub password: Option<String>,
    /// Default IRC channel for unmapped traffic.
    pub channel: String,
    #[serde(default = "default_nickserv_nick")]
    pub nickserv_nick: String,
    #[serde(default)]
    pub nickserv_password: Option<String>,
    /// How Mattermost senders are shown on IRC, `{NICK}` is substituted.
    #[serde(default)]
    pub remote_nick_format: Option<String>,
    /// Show Mattermost senders as `<nick>` when no format is configured.
    #[serde(default)]
    pub use_slack_circumfix: bool,
}

/// Which Mattermost delivery mode the bridge uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteMode {
    /// Persistent API session with a WebSocket event stream.
    #[default]
    Api,
    /// Incoming webhook for posting, outgoing webhook for receiving.
    Webhook,
}

/// How the NAMES list is rendered when sent to Mattermost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NickFormatter {
    #[default]
    Plain,
    Table,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MattermostConfig {
    #[serde(default)]
    pub mode: RemoteMode,
    /// Server host (and optional port) without scheme, API mode.
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Pre-obtained session token, used instead of login/password.
    #[serde(default)]
    pub token: Option<String>,
    /// Talk plain HTTP/WS instead of HTTPS/WSS.
    #[serde(default)]
    pub no_tls: bool,
    #[serde(default)]
    pub skip_tls_verify: bool,
    /// Default Mattermost channel for unmapped traffic.
    pub channel: String,
    #[serde(default)]
    pub show_join_part: bool,
    /// How IRC senders are shown on Mattermost, `{NICK}` is substituted.
    #[serde(default)]
    pub remote_nick_format: Option<String>,
    #[serde(default)]
    pub prefix_messages_with_nick: bool,
    #[serde(default)]
    pub nick_formatter: NickFormatter,
    #[serde(default = "default_nicks_per_row")]
    pub nicks_per_row: usize,
    #[serde(default)]
    pub icon_url: Option<String>,
    /// Incoming webhook URL, webhook mode.
    #[serde(default)]
    pub url: Option<String>,
    /// Listen address for outgoing webhook requests, webhook mode.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// One configured IRC <-> Mattermost channel pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelMapping {
    pub irc: String,
    pub mattermost: String,
    /// Outgoing webhook token identifying this channel in webhook mode.
    #[serde(default)]
    pub token: Option<String>,
}

/// How the API session authenticates. Chosen explicitly by configuration.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password { login: String, password: String },
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { login, .. } => f
                .debug_struct("Password")
                .field("login", login)
                .field("password", &"***")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
        }
    }
}

fn default_queue_capacity() -> usize {
    100
}
fn default_irc_port() -> u16 {
    6667
}
fn default_nickserv_nick() -> String {
    "NickServ".to_string()
}
fn default_nicks_per_row() -> usize {
    4
}
fn default_bind_address() -> String {
    "0.0.0.0:9999".to_string()
}

// ── Secret overrides ────────────────────────────────────────────────────────

/// Overrides `irc.password`.
pub const ENV_IRC_PASSWORD: &str = "MATTERBRIDGE_IRC_PASSWORD";
/// Overrides `irc.nickserv_password`.
pub const ENV_NICKSERV_PASSWORD: &str = "MATTERBRIDGE_NICKSERV_PASSWORD";
/// Overrides `mattermost.password` and clears any configured token.
pub const ENV_MATTERMOST_PASSWORD: &str = "MATTERBRIDGE_MATTERMOST_PASSWORD";
/// Overrides `mattermost.token` and clears any configured password.
pub const ENV_MATTERMOST_TOKEN: &str = "MATTERBRIDGE_MATTERMOST_TOKEN";

impl BridgeConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml(content: &str) -> BridgeResult<Self> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> BridgeResult<Self> {
        Self::from_toml(&read_file(path)?)
    }

    /// Like [`BridgeConfig::load`], with secrets overridden from the process
    /// environment before validation.
    pub fn load_with_env(path: &Path) -> BridgeResult<Self> {
        let mut config = Self::parse(&read_file(path)?)?;
        config.apply_secret_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> BridgeResult<Self> {
        toml::from_str(content).map_err(|e| BridgeError::Config(format!("Invalid TOML: {e}")))
    }

    /// Replace secrets with values returned by `lookup`. Empty values are ignored.
    pub fn apply_secret_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(password) = get(ENV_IRC_PASSWORD) {
            self.irc.password = Some(password);
        }
        if let Some(password) = get(ENV_NICKSERV_PASSWORD) {
            self.irc.nickserv_password = Some(password);
        }
        if let Some(password) = get(ENV_MATTERMOST_PASSWORD) {
            debug!("Mattermost password taken from the environment");
            self.mattermost.password = Some(password);
            self.mattermost.token = None;
        }
        if let Some(token) = get(ENV_MATTERMOST_TOKEN) {
            debug!("Mattermost token taken from the environment");
            self.mattermost.token = Some(token);
            self.mattermost.password = None;
        }
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.irc.server.trim().is_empty() {
            return Err(BridgeError::Config("irc.server must not be empty".into()));
        }
        if self.irc.nick.trim().is_empty() {
            return Err(BridgeError::Config("irc.nick must not be empty".into()));
        }
        if self.irc.channel.trim().is_empty() {
            return Err(BridgeError::Config("irc.channel must not be empty".into()));
        }
        if self.mattermost.channel.trim().is_empty() {
            return Err(BridgeError::Config("mattermost.channel must not be empty".into()));
        }
        if self.general.queue_capacity == 0 {
            return Err(BridgeError::Config("general.queue_capacity must be positive".into()));
        }
        match self.mattermost.mode {
            RemoteMode::Api => {
                if self.mattermost.server.trim().is_empty() {
                    return Err(BridgeError::Config("mattermost.server is required in api mode".into()));
                }
                if self.mattermost.team.trim().is_empty() {
                    return Err(BridgeError::Config("mattermost.team is required in api mode".into()));
                }
                self.credentials()?;
            }
            RemoteMode::Webhook => {
                if self.mattermost.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                    return Err(BridgeError::Config("mattermost.url is required in webhook mode".into()));
                }
            }
        }
        for mapping in &self.channels {
            if mapping.irc.trim().is_empty() || mapping.mattermost.trim().is_empty() {
                return Err(BridgeError::Config(
                    "channel mappings need both irc and mattermost names".into(),
                ));
            }
        }
        Ok(())
    }

    /// The API credentials: exactly one of `password` and `token` must be set.
    pub fn credentials(&self) -> BridgeResult<Credentials> {
        let mm = &self.mattermost;
        match (non_empty(&mm.password), non_empty(&mm.token)) {
            (Some(_), Some(_)) => Err(BridgeError::Config(
                "set either mattermost.password or mattermost.token, not both".into(),
            )),
            (Some(password), None) => {
                if mm.login.trim().is_empty() {
                    return Err(BridgeError::Config(
                        "mattermost.login is required with a password".into(),
                    ));
                }
                Ok(Credentials::Password {
                    login: mm.login.clone(),
                    password: password.to_string(),
                })
            }
            (None, Some(token)) => Ok(Credentials::Token(token.to_string())),
            (None, None) => Err(BridgeError::Config(
                "mattermost.password or mattermost.token is required in api mode".into(),
            )),
        }
    }

    /// Build the channel map from the configured mappings and defaults.
    pub fn channel_map(&self) -> ChannelMap {
        ChannelMap::new(&self.channels, &self.irc.channel, &self.mattermost.channel)
    }

    /// Outgoing webhook tokens and the Mattermost channel each one stands for.
    pub fn webhook_tokens(&self) -> Vec<(String, String)> {
        self.channels
            .iter()
            .filter_map(|m| {
                non_empty(&m.token).map(|token| (token.to_string(), m.mattermost.clone()))
            })
            .collect()
    }
}

fn read_file(path: &Path) -> BridgeResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("Failed to read config file '{}': {e}", path.display()))
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const API_CONFIG: &str = r##"
[irc]
server = "irc.example.net"
nick = "matterbot"
channel = "#main"

[mattermost]
server = "chat.example.com"
team = "eng"
login = "bot"
password = "secret"
channel = "town-square"

[[channel]]
irc = "#dev"
mattermost = "team-dev"
"##;

    #[test]
    fn test_api_config_defaults() {
        let config = BridgeConfig::from_toml(API_CONFIG).unwrap();
        assert_eq!(config.irc.port, 6667);
        assert_eq!(config.irc.nickserv_nick, "NickServ");
        assert_eq!(config.mattermost.mode, RemoteMode::Api);
        assert_eq!(config.mattermost.nick_formatter, NickFormatter::Plain);
        assert_eq!(config.mattermost.nicks_per_row, 4);
        assert_eq!(config.general.queue_capacity, 100);
        assert_eq!(config.general.backoff, BackoffPolicy::default());
        assert_eq!(config.channels.len(), 1);
        assert_eq!(
            config.credentials().unwrap(),
            Credentials::Password {
                login: "bot".into(),
                password: "secret".into()
            }
        );
        assert_eq!(config.channel_map().resolve_remote("#dev"), "team-dev");
    }

    #[test]
    fn test_token_credentials() {
        let toml = API_CONFIG.replace("password = \"secret\"", "token = \"abc123\"");
        let config = BridgeConfig::from_toml(&toml).unwrap();
        assert_eq!(config.credentials().unwrap(), Credentials::Token("abc123".into()));
    }

    #[test]
    fn test_password_and_token_rejected() {
        let toml = API_CONFIG.replace("password = \"secret\"", "password = \"x\"\ntoken = \"y\"");
        let err = BridgeConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let toml = API_CONFIG.replace("password = \"secret\"", "");
        assert!(BridgeConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_webhook_mode_requires_url() {
        let toml = r##"
[irc]
server = "irc.example.net"
nick = "matterbot"
channel = "#main"

[mattermost]
mode = "webhook"
channel = "town-square"
"##;
        assert!(BridgeConfig::from_toml(toml).is_err());

        let with_url = toml.replace(
            "mode = \"webhook\"",
            "mode = \"webhook\"\nurl = \"https://chat.example.com/hooks/abc\"",
        );
        let config = BridgeConfig::from_toml(&with_url).unwrap();
        assert_eq!(config.mattermost.mode, RemoteMode::Webhook);
        assert_eq!(config.mattermost.bind_address, "0.0.0.0:9999");
    }

    #[test]
    fn test_webhook_tokens() {
        let toml = format!(
            "{API_CONFIG}\n[[channel]]\nirc = \"#ops\"\nmattermost = \"team-ops\"\ntoken = \"tok-ops\"\n"
        );
        let config = BridgeConfig::from_toml(&toml).unwrap();
        assert_eq!(
            config.webhook_tokens(),
            vec![("tok-ops".to_string(), "team-ops".to_string())]
        );
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = Credentials::Password {
            login: "bot".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("bot"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_secret_overrides() {
        let mut config = BridgeConfig::parse(API_CONFIG).unwrap();
        let env: std::collections::HashMap<&str, &str> = [
            (ENV_IRC_PASSWORD, "server-pass"),
            (ENV_NICKSERV_PASSWORD, ""),
            (ENV_MATTERMOST_TOKEN, "tok-env"),
        ]
        .into_iter()
        .collect();
        config.apply_secret_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.irc.password.as_deref(), Some("server-pass"));
        assert_eq!(config.irc.nickserv_password, None);
        config.validate().unwrap();
        assert_eq!(config.credentials().unwrap(), Credentials::Token("tok-env".into()));
    }

    #[test]
    fn test_empty_nick_rejected() {
        let toml = API_CONFIG.replace("nick = \"matterbot\"", "nick = \"\"");
        assert!(BridgeConfig::from_toml(&toml).is_err());
    }
}
