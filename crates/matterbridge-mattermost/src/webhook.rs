use crate::session::{OutboundPost, RemoteEvent, RemoteIdentity, RemoteSession};
use async_trait::async_trait;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    routing::post,
    Router,
};
use matterbridge_core::{BridgeConfig, BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Body posted to a Mattermost incoming webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingWebhookPayload {
    pub channel: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    pub text: String,
    /// Post type; empty for a regular post.
    #[serde(rename = "type", default)]
    pub post_type: String,
}

/// Form fields Mattermost sends to an outgoing webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutgoingWebhookRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// State shared with the outgoing webhook handler.
pub struct WebhookState {
    /// `(token, mattermost channel)` pairs. Empty disables token checks.
    tokens: Vec<(String, String)>,
    default_channel: String,
    events: mpsc::Sender<RemoteEvent>,
}

impl WebhookState {
    pub fn new(
        tokens: Vec<(String, String)>,
        default_channel: impl Into<String>,
        events: mpsc::Sender<RemoteEvent>,
    ) -> Self {
        Self {
            tokens,
            default_channel: default_channel.into(),
            events,
        }
    }

    /// Channel a request belongs to, or `None` when its token is unknown.
    fn channel_for(&self, request: &OutgoingWebhookRequest) -> Option<String> {
        if self.tokens.is_empty() {
            let channel = request
                .channel_name
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or(&self.default_channel);
            return Some(channel.to_string());
        }
        self.tokens
            .iter()
            .find(|(token, _)| validate_token(token, &request.token))
            .map(|(_, channel)| channel.clone())
    }
}

/// Constant-time token comparison.
pub fn validate_token(expected: &str, given: &str) -> bool {
    let a = expected.as_bytes();
    let b = given.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Router accepting Mattermost outgoing webhook requests on `/`.
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/", post(outgoing_webhook_handler))
        .with_state(state)
}

async fn outgoing_webhook_handler(
    State(state): State<Arc<WebhookState>>,
    Form(request): Form<OutgoingWebhookRequest>,
) -> StatusCode {
    let Some(channel) = state.channel_for(&request) else {
        warn!(user = %request.user_name, "Outgoing webhook with unknown token");
        return StatusCode::UNAUTHORIZED;
    };
    debug!(channel = %channel, user = %request.user_name, "<- mattermost webhook");

    let event = RemoteEvent::posted(channel, request.user_id, request.user_name, request.text);
    if state.events.send(event).await.is_err() {
        warn!("Webhook event queue closed");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

/// Mattermost session over webhooks: posts through an incoming webhook and
/// receives through an HTTP listener for outgoing webhooks.
///
/// Has no identity, cannot join channels and cannot list members.
pub struct WebhookSession {
    client: reqwest::Client,
    url: String,
    icon_url: Option<String>,
    bind_address: String,
    state: Arc<WebhookState>,
    events: mpsc::Receiver<RemoteEvent>,
    pending: Option<RemoteEvent>,
    local_addr: Option<SocketAddr>,
    shutdown: CancellationToken,
    server: Option<JoinHandle<()>>,
}

impl WebhookSession {
    pub fn from_config(config: &BridgeConfig) -> BridgeResult<Self> {
        let mm = &config.mattermost;
        let url = mm
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| BridgeError::Config("mattermost.url is required in webhook mode".into()))?;
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(mm.skip_tls_verify)
            .build()
            .map_err(|e| BridgeError::Http(format!("Failed to build HTTP client: {e}")))?;

        let (tx, rx) = mpsc::channel(config.general.queue_capacity.max(1));
        Ok(Self {
            client,
            url,
            icon_url: mm.icon_url.clone(),
            bind_address: mm.bind_address.clone(),
            state: Arc::new(WebhookState::new(config.webhook_tokens(), mm.channel.clone(), tx)),
            events: rx,
            pending: None,
            local_addr: None,
            shutdown: CancellationToken::new(),
            server: None,
        })
    }

    /// Address the outgoing webhook listener is bound to, once connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for WebhookSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl RemoteSession for WebhookSession {
    fn name(&self) -> &str {
        "mattermost-webhook"
    }

    fn identity(&self) -> Option<RemoteIdentity> {
        None
    }

    async fn connect(&mut self) -> BridgeResult<()> {
        if self.server.as_ref().is_some_and(|s| !s.is_finished()) {
            return Ok(());
        }
        let listener = tokio::net::TcpListener::bind(&self.bind_address)
            .await
            .map_err(|e| BridgeError::Config(format!("Cannot listen on {}: {e}", self.bind_address)))?;
        let addr = listener.local_addr()?;
        let app = webhook_router(self.state.clone());
        let shutdown = self.shutdown.clone();

        self.server = Some(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "Webhook listener stopped");
            }
        }));
        self.local_addr = Some(addr);
        info!(addr = %addr, "Listening for Mattermost outgoing webhooks");
        Ok(())
    }

    async fn send(&mut self, post: &OutboundPost) -> BridgeResult<()> {
        let payload = IncomingWebhookPayload {
            channel: post.channel.trim_start_matches('#').to_string(),
            username: post.author.clone(),
            icon_url: self.icon_url.clone(),
            text: post.text.clone(),
            post_type: String::new(),
        };
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BridgeError::Transient(format!("Incoming webhook: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Remote(format!("Incoming webhook returned {status}: {body}")));
        }
        debug!(channel = %payload.channel, "-> mattermost webhook");
        Ok(())
    }

    async fn join_channel(&mut self, _name: &str) -> BridgeResult<()> {
        Ok(())
    }

    async fn usernames_in_channel(&mut self, _channel: &str) -> BridgeResult<Vec<String>> {
        Err(BridgeError::Remote(
            "Listing channel members is not supported in webhook mode".into(),
        ))
    }

    async fn recv_incoming(&mut self) -> BridgeResult<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.events.recv().await {
            Some(event) => {
                self.pending = Some(event);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn take_event(&mut self) -> Option<RemoteEvent> {
        self.pending.take()
    }
}
