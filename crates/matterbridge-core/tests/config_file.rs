#![allow(clippy::unwrap_used, clippy::expect_used)]

use matterbridge_core::{BridgeConfig, BridgeError, NickFormatter, RemoteMode};
use std::io::Write;

const FULL: &str = r##"
[general]
giphy_api_key = "gk"
queue_capacity = 32

[general.backoff]
min_ms = 500
max_ms = 60000
jitter = false

[irc]
server = "irc.libera.chat"
port = 6697
use_tls = true
nick = "matterbot"
channel = "#main"
nickserv_password = "ns"
use_slack_circumfix = true

[mattermost]
server = "chat.example.com"
team = "eng"
token = "tok"
channel = "town-square"
show_join_part = true
nick_formatter = "table"
nicks_per_row = 3

[[channel]]
irc = "#dev"
mattermost = "team-dev"

[[channel]]
irc = "#ops"
mattermost = "team-ops"
"##;

#[test]
fn test_load_full_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL.as_bytes()).unwrap();

    let config = BridgeConfig::load(file.path()).unwrap();
    assert_eq!(config.general.queue_capacity, 32);
    assert_eq!(config.general.backoff.min_ms, 500);
    assert!(!config.general.backoff.jitter);
    assert_eq!(config.irc.port, 6697);
    assert!(config.irc.use_tls);
    assert_eq!(config.mattermost.mode, RemoteMode::Api);
    assert_eq!(config.mattermost.nick_formatter, NickFormatter::Table);

    let map = config.channel_map();
    assert_eq!(map.resolve_remote("#ops"), "team-ops");
    assert_eq!(map.resolve_irc("team-dev"), "#dev");
    assert_eq!(map.resolve_irc("off-topic"), "#main");
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BridgeConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, BridgeError::Config(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_malformed_file_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[irc\nserver = ").unwrap();
    let err = BridgeConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, BridgeError::Config(_)));
}
