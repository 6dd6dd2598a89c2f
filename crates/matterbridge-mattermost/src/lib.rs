//! Mattermost side of the bridge.
//!
//! Provides the [`RemoteSession`] capability with two variants selected once
//! from configuration, plus a driver task that owns the session and serves
//! the relay through a [`RemoteHandle`].
//!
//! # Main types
//!
//! - [`RemoteSession`]: Connect, send, join and read events on Mattermost.
//! - [`ApiSession`]: Persistent REST + WebSocket session with reconnect backoff.
//! - [`WebhookSession`]: Incoming/outgoing webhook variant.
//! - [`RemoteHandle`]: Cloneable handle to a session running in its own task.

/// REST/WebSocket API collaborator and wire types.
pub mod api;
/// API-client session variant.
pub mod client;
/// Cached user and channel directories.
pub mod directory;
/// Task that owns a session and serves commands.
pub mod driver;
/// reqwest/tokio-tungstenite implementation of the API collaborator.
pub mod http;
/// Session capability and event types.
pub mod session;
/// Webhook session variant.
pub mod webhook;

pub use api::{Channel, EventSocket, Frame, LoginSession, MattermostApi, Post, Team, User};
pub use client::ApiSession;
pub use directory::Directory;
pub use driver::{spawn_session, RemoteCommand, RemoteHandle};
pub use http::HttpApi;
pub use session::{OutboundPost, RemoteAction, RemoteEvent, RemoteIdentity, RemoteSession};
pub use webhook::{
    validate_token, webhook_router, IncomingWebhookPayload, OutgoingWebhookRequest, WebhookSession,
    WebhookState,
};
