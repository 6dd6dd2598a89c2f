#![allow(clippy::unwrap_used, clippy::expect_used)]

use matterbridge_core::{BridgeConfig, MessageKind};
use matterbridge_mattermost::{OutboundPost, RemoteEvent, RemoteSession, WebhookSession};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(hook_url: &str) -> BridgeConfig {
    BridgeConfig::from_toml(&format!(
        r##"
[irc]
server = "irc.example.net"
nick = "matterbot"
channel = "#main"

[mattermost]
mode = "webhook"
url = "{hook_url}"
icon_url = "https://example.com/irc.png"
bind_address = "127.0.0.1:0"
channel = "town-square"

[[channel]]
irc = "#dev"
mattermost = "team-dev"
token = "tok-dev"
"##
    ))
    .unwrap()
}

#[tokio::test]
async fn test_send_posts_incoming_webhook_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/abc"))
        .and(body_json(json!({
            "channel": "team-dev",
            "username": "irc-alice",
            "icon_url": "https://example.com/irc.png",
            "text": "hello",
            "type": ""
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = WebhookSession::from_config(&config(&format!("{}/hooks/abc", server.uri()))).unwrap();
    session
        .send(&OutboundPost::new("#team-dev", "irc-alice", "hello", MessageKind::Normal))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_webhook_post_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Invalid webhook"))
        .mount(&server)
        .await;

    let mut session = WebhookSession::from_config(&config(&format!("{}/hooks/abc", server.uri()))).unwrap();
    let err = session
        .send(&OutboundPost::new("team-dev", "irc-alice", "hello", MessageKind::Normal))
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
    assert!(session.usernames_in_channel("team-dev").await.is_err());
    assert!(session.identity().is_none());
}

#[tokio::test]
async fn test_outgoing_webhook_becomes_event() {
    let mut session = WebhookSession::from_config(&config("http://127.0.0.1:1/hooks/abc")).unwrap();
    session.connect().await.unwrap();
    let addr = session.local_addr().unwrap();

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/"))
        .form(&[
            ("token", "tok-dev"),
            ("user_id", "u2"),
            ("user_name", "bob"),
            ("channel_name", "team-dev"),
            ("text", "ping from mm"),
        ])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let event = session.next_event().await.unwrap().unwrap();
    assert_eq!(
        event,
        RemoteEvent::posted("team-dev", Some("u2".into()), "bob", "ping from mm")
    );
}
