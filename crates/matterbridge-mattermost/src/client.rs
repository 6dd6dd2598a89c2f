use crate::api::{EventSocket, Frame, LoginSession, MattermostApi, Post, Team};
use crate::directory::{direct_message_peer, Directory};
use crate::session::{OutboundPost, RemoteEvent, RemoteIdentity, RemoteSession};
use async_trait::async_trait;
use matterbridge_core::{Backoff, BackoffPolicy, BridgeError, BridgeResult, Credentials};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Event envelope received over the Mattermost WebSocket.
#[derive(Debug, Deserialize)]
struct WsEvent {
    /// Empty for replies to client-initiated actions.
    #[serde(default)]
    event: String,
    #[serde(default)]
    data: HashMap<String, serde_json::Value>,
}

/// Persistent Mattermost session over the REST API and the event WebSocket.
///
/// Connecting runs login, team selection, WebSocket dial and directory
/// population. Network failures during login and dial are retried forever
/// with exponential backoff; refused credentials and a missing team are
/// fatal.
pub struct ApiSession<A: MattermostApi> {
    api: A,
    credentials: Credentials,
    team_name: String,
    backoff: Backoff,
    login: Option<LoginSession>,
    team: Option<Team>,
    directory: Directory,
    socket: Option<Box<dyn EventSocket>>,
    /// Frame read from the socket but not yet turned into an event.
    pending: Option<String>,
}

impl<A: MattermostApi> ApiSession<A> {
    pub fn new(
        api: A,
        credentials: Credentials,
        team_name: impl Into<String>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            api,
            credentials,
            team_name: team_name.into(),
            backoff: Backoff::new(policy),
            login: None,
            team: None,
            directory: Directory::new(),
            socket: None,
            pending: None,
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Consecutive failed connection attempts since the last success.
    pub fn reconnect_attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Sleep for the next backoff delay after a retryable failure.
    async fn pause(&mut self, step: &str, error: &BridgeError) {
        let delay = self.backoff.next_delay();
        warn!(
            step,
            error = %error,
            attempt = self.backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "Mattermost connection step failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }

    async fn login_with_retry(&mut self) -> BridgeResult<LoginSession> {
        loop {
            debug!(team = %self.team_name, attempt = self.backoff.attempts(), "Trying Mattermost login");
            match self.api.login(&self.credentials).await {
                Ok(login) => {
                    self.backoff.reset();
                    return Ok(login);
                }
                Err(e) if e.is_transient() => self.pause("login", &e).await,
                Err(e) => return Err(e),
            }
        }
    }

    async fn dial_with_retry(&mut self, login: &LoginSession) -> BridgeResult<Box<dyn EventSocket>> {
        loop {
            debug!("Opening Mattermost WebSocket");
            match self.api.connect_websocket(login).await {
                Ok(socket) => {
                    self.backoff.reset();
                    return Ok(socket);
                }
                Err(e) if e.is_transient() => self.pause("websocket", &e).await,
                Err(e) => return Err(e),
            }
        }
    }

    /// Log in and select the configured team.
    async fn bootstrap(&mut self) -> BridgeResult<(LoginSession, Team)> {
        loop {
            let login = self.login_with_retry().await?;
            let teams = match self.api.teams(&login).await {
                Ok(teams) => teams,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.pause("initial load", &e).await;
                    continue;
                }
            };
            let team = teams
                .into_iter()
                .find(|t| t.name == self.team_name)
                .ok_or_else(|| BridgeError::TeamNotFound(self.team_name.clone()))?;
            return Ok((login, team));
        }
    }

    fn logged_in(&self) -> BridgeResult<(&LoginSession, &Team)> {
        match (&self.login, &self.team) {
            (Some(login), Some(team)) => Ok((login, team)),
            _ => Err(BridgeError::Remote("Not logged in to Mattermost".into())),
        }
    }

    async fn refresh_users(&mut self) -> BridgeResult<()> {
        let (login, team) = self.logged_in()?;
        let users = self.api.team_users(login, &team.id).await?;
        debug!(count = users.len(), "Mattermost user directory refreshed");
        self.directory.set_users(users);
        Ok(())
    }

    async fn refresh_channels(&mut self) -> BridgeResult<()> {
        let (login, team) = self.logged_in()?;
        let joined = self.api.my_channels(login, &team.id).await?;
        let public = self.api.more_channels(login, &team.id).await?;
        debug!(joined = joined.len(), public = public.len(), "Mattermost channel directory refreshed");
        self.directory.set_channels(joined, public);
        Ok(())
    }

    async fn resolve_username(&mut self, user_id: &str) -> Option<String> {
        if let Some(name) = self.directory.username(user_id) {
            return Some(name.to_string());
        }
        debug!(user_id, "Unknown Mattermost user, refreshing directory");
        if let Err(e) = self.refresh_users().await {
            warn!(error = %e, "Failed to refresh Mattermost users");
            return None;
        }
        self.directory.username(user_id).map(str::to_string)
    }

    async fn resolve_channel_name(&mut self, channel_id: &str) -> Option<String> {
        if let Some(name) = self.directory.channel_name(channel_id) {
            return Some(name.to_string());
        }
        debug!(channel_id, "Unknown Mattermost channel, refreshing directory");
        if let Err(e) = self.refresh_channels().await {
            warn!(error = %e, "Failed to refresh Mattermost channels");
            return None;
        }
        self.directory.channel_name(channel_id).map(str::to_string)
    }

    async fn resolve_channel_id(&mut self, name: &str) -> Option<String> {
        if let Some(id) = self.directory.channel_id(name) {
            return Some(id.to_string());
        }
        debug!(channel = name, "Unknown Mattermost channel name, refreshing directory");
        if let Err(e) = self.refresh_channels().await {
            warn!(error = %e, "Failed to refresh Mattermost channels");
            return None;
        }
        self.directory.channel_id(name).map(str::to_string)
    }

    /// Turn one WebSocket text frame into an event, resolving ids to names.
    async fn process_frame(&mut self, text: &str) -> Option<RemoteEvent> {
        let envelope: WsEvent = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Ignoring non-event WebSocket frame");
                return None;
            }
        };
        if envelope.event.is_empty() {
            return None;
        }
        if envelope.event != "posted" {
            debug!(event = %envelope.event, "Unhandled Mattermost event");
            return Some(RemoteEvent::other(envelope.event));
        }

        let Some(raw) = envelope.data.get("post").and_then(|v| v.as_str()) else {
            warn!("Posted event without post payload");
            return None;
        };
        let post: Post = match serde_json::from_str(raw) {
            Ok(post) => post,
            Err(e) => {
                warn!(error = %e, "Malformed post payload");
                return None;
            }
        };

        let Some(username) = self.resolve_username(&post.user_id).await else {
            warn!(user_id = %post.user_id, "Dropping post from unknown Mattermost user");
            return None;
        };
        let Some(mut channel) = self.resolve_channel_name(&post.channel_id).await else {
            warn!(channel_id = %post.channel_id, "Dropping post in unknown Mattermost channel");
            return None;
        };

        let own_id = self.login.as_ref().map(|l| l.user.id.clone()).unwrap_or_default();
        if let Some(peer) = direct_message_peer(&channel, &own_id).map(str::to_string) {
            let Some(peer_name) = self.resolve_username(&peer).await else {
                warn!(user_id = %peer, "Dropping direct message with unknown Mattermost user");
                return None;
            };
            channel = peer_name;
        }

        Some(RemoteEvent::posted(channel, Some(post.user_id), username, post.message))
    }
}

#[async_trait]
impl<A: MattermostApi> RemoteSession for ApiSession<A> {
    fn name(&self) -> &str {
        "mattermost-api"
    }

    fn identity(&self) -> Option<RemoteIdentity> {
        self.login.as_ref().map(|l| RemoteIdentity {
            user_id: Some(l.user.id.clone()),
            username: l.user.username.clone(),
        })
    }

    async fn connect(&mut self) -> BridgeResult<()> {
        self.socket = None;
        self.pending = None;

        let (login, team) = self.bootstrap().await?;
        info!(
            user = %login.user.username,
            team = %team.name,
            team_id = %team.id,
            "Logged in to Mattermost"
        );
        let socket = self.dial_with_retry(&login).await?;
        self.login = Some(login);
        self.team = Some(team);
        self.socket = Some(socket);

        if let Err(e) = self.refresh_users().await {
            warn!(error = %e, "Failed to load Mattermost users");
        }
        if let Err(e) = self.refresh_channels().await {
            warn!(error = %e, "Failed to load Mattermost channels");
        }
        info!(
            users = self.directory.user_count(),
            channels = self.directory.channel_count(),
            "Mattermost session ready"
        );
        Ok(())
    }

    async fn send(&mut self, post: &OutboundPost) -> BridgeResult<()> {
        let channel = post.channel.trim_start_matches('#');
        let channel_id = self
            .resolve_channel_id(channel)
            .await
            .ok_or_else(|| BridgeError::Remote(format!("Unknown Mattermost channel '{channel}'")))?;
        let (login, _) = self.logged_in()?;
        debug!(channel, "-> mattermost");
        self.api.create_post(login, &channel_id, &post.text).await
    }

    async fn join_channel(&mut self, name: &str) -> BridgeResult<()> {
        let name = name.trim_start_matches('#');
        let channel_id = self
            .resolve_channel_id(name)
            .await
            .ok_or_else(|| BridgeError::Remote(format!("Failed to join '{name}': channel not found")))?;
        if self.directory.is_member(name) {
            debug!(channel = name, "Not joining, already a member");
            return Ok(());
        }
        let (login, _) = self.logged_in()?;
        self.api.join_channel(login, &channel_id).await?;
        self.directory.mark_joined(&channel_id);
        info!(channel = name, "Joined Mattermost channel");
        Ok(())
    }

    async fn usernames_in_channel(&mut self, channel: &str) -> BridgeResult<Vec<String>> {
        let channel = channel.trim_start_matches('#');
        let channel_id = self
            .resolve_channel_id(channel)
            .await
            .ok_or_else(|| BridgeError::Remote(format!("Unknown Mattermost channel '{channel}'")))?;
        let (login, _) = self.logged_in()?;
        let member_ids = self.api.channel_member_ids(login, &channel_id).await?;

        if member_ids.iter().any(|id| self.directory.username(id).is_none()) {
            if let Err(e) = self.refresh_users().await {
                warn!(error = %e, "Failed to refresh Mattermost users");
            }
        }
        Ok(member_ids
            .iter()
            .filter_map(|id| self.directory.username(id).map(str::to_string))
            .collect())
    }

    async fn recv_incoming(&mut self) -> BridgeResult<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        loop {
            let Some(socket) = self.socket.as_mut() else {
                return Ok(false);
            };
            match socket.next_frame().await {
                Ok(Some(Frame::Ping(payload))) => {
                    debug!("WebSocket ping");
                    if let Err(e) = socket.pong(payload).await {
                        warn!(error = %e, "Failed to answer WebSocket ping");
                        self.socket = None;
                        return Ok(false);
                    }
                }
                Ok(Some(Frame::Text(text))) => {
                    self.pending = Some(text);
                    return Ok(true);
                }
                Ok(None) => {
                    warn!("Mattermost WebSocket closed by server");
                    self.socket = None;
                    return Ok(false);
                }
                Err(e) => {
                    warn!(error = %e, "Mattermost WebSocket read error");
                    self.socket = None;
                    return Ok(false);
                }
            }
        }
    }

    async fn take_event(&mut self) -> Option<RemoteEvent> {
        let text = self.pending.take()?;
        self.process_frame(&text).await
    }
}
