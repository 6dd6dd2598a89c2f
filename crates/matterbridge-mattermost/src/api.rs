use async_trait::async_trait;
use matterbridge_core::{BridgeResult, Credentials};
use serde::{Deserialize, Serialize};

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub header: String,
    /// `O` open, `P` private, `D` direct, `G` group.
    #[serde(rename = "type", default)]
    pub channel_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub message: String,
}

/// A successful login: the bearer token and the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub token: String,
    pub user: User,
}

/// One frame read from the event WebSocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A JSON event or reply.
    Text(String),
    /// A keepalive that must be answered with a pong.
    Ping(Vec<u8>),
}

// ── Collaborator traits ─────────────────────────────────────────────────────

/// A live event stream from the server.
#[async_trait]
pub trait EventSocket: Send {
    /// Read the next frame. `Ok(None)` means the server closed the stream.
    /// Must be cancel-safe.
    async fn next_frame(&mut self) -> BridgeResult<Option<Frame>>;

    /// Answer a keepalive ping.
    async fn pong(&mut self, payload: Vec<u8>) -> BridgeResult<()>;
}

/// The Mattermost REST + WebSocket operations the session relies on.
///
/// `login` and `connect_websocket` report network failures as
/// `BridgeError::Transient` and refused credentials as
/// `BridgeError::AuthRejected`; the session retries only the former.
#[async_trait]
pub trait MattermostApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> BridgeResult<LoginSession>;

    async fn teams(&self, session: &LoginSession) -> BridgeResult<Vec<Team>>;

    async fn team_users(&self, session: &LoginSession, team_id: &str) -> BridgeResult<Vec<User>>;

    /// Channels of the team the user is a member of, direct messages included.
    async fn my_channels(&self, session: &LoginSession, team_id: &str) -> BridgeResult<Vec<Channel>>;

    /// Public channels of the team, joined or not.
    async fn more_channels(&self, session: &LoginSession, team_id: &str) -> BridgeResult<Vec<Channel>>;

    async fn create_post(&self, session: &LoginSession, channel_id: &str, message: &str) -> BridgeResult<()>;

    async fn join_channel(&self, session: &LoginSession, channel_id: &str) -> BridgeResult<()>;

    /// User ids of the members of a channel.
    async fn channel_member_ids(&self, session: &LoginSession, channel_id: &str) -> BridgeResult<Vec<String>>;

    async fn connect_websocket(&self, session: &LoginSession) -> BridgeResult<Box<dyn EventSocket>>;
}
