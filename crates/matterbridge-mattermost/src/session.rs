use async_trait::async_trait;
use matterbridge_core::{BridgeResult, MessageKind};
use serde::{Deserialize, Serialize};

/// Kind of a raw Mattermost event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteAction {
    /// A post was created.
    Posted,
    /// Any other event name, carried for logging.
    Other(String),
}

/// A Mattermost event with ids already resolved to names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub action: RemoteAction,
    /// Channel name. For direct messages, the other participant's username.
    pub channel: String,
    /// Author id when the transport provides one.
    pub user_id: Option<String>,
    /// Author username.
    pub username: String,
    pub text: String,
}

impl RemoteEvent {
    /// A "post created" event.
    pub fn posted(
        channel: impl Into<String>,
        user_id: Option<String>,
        username: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            action: RemoteAction::Posted,
            channel: channel.into(),
            user_id,
            username: username.into(),
            text: text.into(),
        }
    }

    /// Any event the relay does not act on.
    pub fn other(action: impl Into<String>) -> Self {
        Self {
            action: RemoteAction::Other(action.into()),
            channel: String::new(),
            user_id: None,
            username: String::new(),
            text: String::new(),
        }
    }
}

/// The bridge's own Mattermost identity, used to drop its own echoes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub user_id: Option<String>,
    pub username: String,
}

impl RemoteIdentity {
    /// Whether `event` was authored by this identity.
    pub fn authored(&self, event: &RemoteEvent) -> bool {
        match (&self.user_id, &event.user_id) {
            (Some(own), Some(author)) => own == author,
            _ => self.username == event.username,
        }
    }
}

/// A message to post on Mattermost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPost {
    /// Destination channel name.
    pub channel: String,
    /// Display name of the author (used by the webhook variant).
    pub author: String,
    pub text: String,
    pub kind: MessageKind,
}

impl OutboundPost {
    pub fn new(
        channel: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            channel: channel.into(),
            author: author.into(),
            text: text.into(),
            kind,
        }
    }
}

/// Capability shared by both Mattermost delivery modes.
///
/// A session is owned by exactly one task. Reading is split in two so the
/// owning task can race the wait against incoming commands:
/// [`RemoteSession::recv_incoming`] is cancel-safe and only buffers what
/// arrived, [`RemoteSession::take_event`] may do I/O to resolve it and is
/// always run to completion.
#[async_trait]
pub trait RemoteSession: Send {
    /// Short name of the variant, for logs.
    fn name(&self) -> &str;

    /// The identity whose posts must never be relayed back, if known.
    fn identity(&self) -> Option<RemoteIdentity>;

    /// Establish the session. Transient failures are retried internally,
    /// an `Err` is fatal.
    async fn connect(&mut self) -> BridgeResult<()>;

    /// Re-establish the session after [`RemoteSession::recv_incoming`]
    /// reported a lost connection.
    async fn reconnect(&mut self) -> BridgeResult<()> {
        self.connect().await
    }

    /// Post a message.
    async fn send(&mut self, post: &OutboundPost) -> BridgeResult<()>;

    /// Make sure the session is a member of the named channel.
    async fn join_channel(&mut self, name: &str) -> BridgeResult<()>;

    /// Usernames of the members of the named channel.
    async fn usernames_in_channel(&mut self, channel: &str) -> BridgeResult<Vec<String>>;

    /// Wait until an inbound item is buffered. Must be cancel-safe.
    ///
    /// Returns immediately while an item is still buffered. `Ok(false)`
    /// means the connection was lost and the caller should
    /// [`reconnect`](RemoteSession::reconnect). `Err` means the session
    /// cannot continue.
    async fn recv_incoming(&mut self) -> BridgeResult<bool>;

    /// Turn the buffered item into an event, consuming it. `None` when
    /// nothing is buffered or the item is not relayable.
    async fn take_event(&mut self) -> Option<RemoteEvent>;

    /// Wait for the next relayable event. `Ok(None)` means the connection
    /// was lost. Not cancel-safe.
    async fn next_event(&mut self) -> BridgeResult<Option<RemoteEvent>> {
        loop {
            if !self.recv_incoming().await? {
                return Ok(None);
            }
            if let Some(event) = self.take_event().await {
                return Ok(Some(event));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_matches_by_id_first() {
        let me = RemoteIdentity {
            user_id: Some("u1".into()),
            username: "bridge".into(),
        };
        let own = RemoteEvent::posted("town-square", Some("u1".into()), "renamed", "hi");
        let other = RemoteEvent::posted("town-square", Some("u2".into()), "bridge", "hi");
        assert!(me.authored(&own));
        assert!(!me.authored(&other));
    }

    #[test]
    fn test_identity_falls_back_to_username() {
        let me = RemoteIdentity {
            user_id: None,
            username: "bridge".into(),
        };
        assert!(me.authored(&RemoteEvent::posted("c", None, "bridge", "hi")));
        assert!(!me.authored(&RemoteEvent::posted("c", Some("u9".into()), "bob", "hi")));
    }
}
