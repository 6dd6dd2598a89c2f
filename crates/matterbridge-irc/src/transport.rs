use irc::client::Sender;
use irc::proto::Command;
use matterbridge_core::{BridgeError, BridgeResult};
use parking_lot::RwLock;

/// Outbound IRC operations. Calls never block; the connection task flushes
/// queued lines.
pub trait IrcTransport: Send + Sync {
    fn join(&self, channel: &str) -> BridgeResult<()>;

    fn privmsg(&self, target: &str, text: &str) -> BridgeResult<()>;

    /// Ask the server for the member list of `channel`.
    fn names(&self, channel: &str) -> BridgeResult<()>;
}

/// [`IrcTransport`] bound to whichever connection is currently live.
///
/// Between connections every call fails with [`BridgeError::Irc`].
#[derive(Default)]
pub struct IrcLink {
    sender: RwLock<Option<Sender>>,
}

impl IrcLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, sender: Sender) {
        *self.sender.write() = Some(sender);
    }

    pub fn detach(&self) {
        *self.sender.write() = None;
    }

    pub fn is_connected(&self) -> bool {
        self.sender.read().is_some()
    }

    fn send(&self, command: Command) -> BridgeResult<()> {
        let guard = self.sender.read();
        let sender = guard
            .as_ref()
            .ok_or_else(|| BridgeError::Irc("Not connected to IRC".into()))?;
        sender
            .send(command)
            .map_err(|e| BridgeError::Irc(format!("Failed to queue IRC command: {e}")))
    }
}

impl IrcTransport for IrcLink {
    fn join(&self, channel: &str) -> BridgeResult<()> {
        self.send(Command::JOIN(channel.to_string(), None, None))
    }

    fn privmsg(&self, target: &str, text: &str) -> BridgeResult<()> {
        self.send(Command::PRIVMSG(target.to_string(), text.to_string()))
    }

    fn names(&self, channel: &str) -> BridgeResult<()> {
        self.send(Command::NAMES(Some(channel.to_string()), None))
    }
}
