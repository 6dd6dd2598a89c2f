use serde::{Deserialize, Serialize};

/// What a [`CanonicalMessage`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A regular chat line.
    Normal,
    /// A third-person emote (`/me waves`).
    Action,
    /// A join or part announcement.
    JoinPart,
    /// A bot command addressed to the bridge.
    Command,
}

/// The transport-agnostic message shape passed between the two relay pumps.
///
/// `origin_channel` is already expressed in the destination's naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    /// The message body, a single line unless produced for a multi-line capable sink.
    pub text: String,
    /// Channel the message is delivered to, in destination naming.
    pub origin_channel: String,
    /// Display name of the author.
    pub sender: String,
    /// The message kind.
    pub kind: MessageKind,
}

impl CanonicalMessage {
    /// Creates a new message.
    pub fn new(
        kind: MessageKind,
        sender: impl Into<String>,
        origin_channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            origin_channel: origin_channel.into(),
            sender: sender.into(),
            kind,
        }
    }

    /// Creates a new message with [`MessageKind::Normal`].
    pub fn normal(
        sender: impl Into<String>,
        origin_channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(MessageKind::Normal, sender, origin_channel, text)
    }

    /// Creates a new message with [`MessageKind::Command`].
    pub fn command(
        sender: impl Into<String>,
        origin_channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(MessageKind::Command, sender, origin_channel, text)
    }

    /// The first whitespace-separated word of the text, if any.
    pub fn first_word(&self) -> Option<&str> {
        self.text.split_whitespace().next()
    }
}
