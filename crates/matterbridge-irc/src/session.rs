use crate::event::IrcEvent;
use crate::names::NickAccumulator;
use crate::transport::IrcTransport;
use matterbridge_core::IrcConfig;
use tracing::{debug, info, warn};

/// Notice text NickServ sends when the nick needs identification.
const NICKSERV_TRIGGER: &str = "This nickname is registered";

/// Connection lifecycle of an [`IrcSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrcState {
    Disconnected,
    /// Connected, waiting for the welcome numeric.
    Registering,
    /// Welcome received, channel joins being issued.
    Joining,
    Ready,
}

/// What the session hands to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcInbound {
    /// A channel message or emote.
    Message {
        nick: String,
        channel: String,
        text: String,
        action: bool,
    },
    /// Someone else joined or left; `text` reads "joins #dev" / "parts <reason>".
    JoinPart {
        nick: String,
        channel: String,
        text: String,
    },
    /// A completed NAMES listing, sorted.
    Names { channel: String, nicks: Vec<String> },
}

/// IRC connection state machine.
///
/// Owned by the connection task. Feeds on [`IrcEvent`]s and issues its own
/// protocol reactions (joins after welcome, NickServ identify) through the
/// transport it is given.
pub struct IrcSession {
    state: IrcState,
    requested_nick: String,
    /// Nick the server actually assigned.
    nick: String,
    channels: Vec<String>,
    show_join_part: bool,
    nickserv_nick: String,
    nickserv_password: Option<String>,
    names: NickAccumulator,
}

impl IrcSession {
    pub fn new(config: &IrcConfig, channels: Vec<String>, show_join_part: bool) -> Self {
        Self {
            state: IrcState::Disconnected,
            requested_nick: config.nick.clone(),
            nick: config.nick.clone(),
            channels,
            show_join_part,
            nickserv_nick: config.nickserv_nick.clone(),
            nickserv_password: config.nickserv_password.clone().filter(|p| !p.is_empty()),
            names: NickAccumulator::new(),
        }
    }

    pub fn state(&self) -> IrcState {
        self.state
    }

    /// The nick currently in use on the server.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// A transport connection was opened and registration sent.
    pub fn on_connected(&mut self) {
        self.state = IrcState::Registering;
    }

    /// The transport connection was lost.
    pub fn on_disconnected(&mut self) {
        self.state = IrcState::Disconnected;
        self.nick = self.requested_nick.clone();
        self.names.clear();
    }

    /// React to one event. Returns what the relay should see, if anything.
    pub fn handle(&mut self, event: IrcEvent, transport: &dyn IrcTransport) -> Option<IrcInbound> {
        match event {
            IrcEvent::Welcome { nick } => {
                if !nick.is_empty() {
                    self.nick = nick;
                }
                self.state = IrcState::Joining;
                info!(nick = %self.nick, "Registered on IRC, joining channels");
                for channel in &self.channels {
                    if let Err(e) = transport.join(channel) {
                        warn!(channel = %channel, error = %e, "Failed to join IRC channel");
                    }
                }
                self.state = IrcState::Ready;
                None
            }
            IrcEvent::Privmsg { nick, target, text } => self.channel_message(nick, target, text, false),
            IrcEvent::Action { nick, target, text } => self.channel_message(nick, target, text, true),
            IrcEvent::Join { nick, channel } => {
                let text = format!("joins {channel}");
                self.join_part(nick, channel, text)
            }
            IrcEvent::Part { nick, channel, reason } => {
                let text = format!("parts {}", reason.as_deref().unwrap_or(&channel));
                self.join_part(nick, channel, text)
            }
            IrcEvent::NamesReply { channel, nicks } => {
                self.names.add(&channel, nicks);
                None
            }
            IrcEvent::NamesEnd { channel } => {
                let nicks = self.names.flush(&channel);
                if nicks.is_empty() {
                    return None;
                }
                Some(IrcInbound::Names { channel, nicks })
            }
            IrcEvent::Notice { nick, text } => {
                if text.contains(NICKSERV_TRIGGER) {
                    self.identify(transport, &nick);
                }
                None
            }
            IrcEvent::Other { code } => {
                debug!(code = %code, "Ignoring IRC event");
                None
            }
        }
    }

    fn channel_message(&self, nick: String, target: String, text: String, action: bool) -> Option<IrcInbound> {
        if !target.starts_with(['#', '&']) {
            debug!(from = %nick, "Ignoring private IRC message");
            return None;
        }
        Some(IrcInbound::Message {
            nick,
            channel: target,
            text,
            action,
        })
    }

    fn join_part(&self, nick: String, channel: String, text: String) -> Option<IrcInbound> {
        if !self.show_join_part || nick.eq_ignore_ascii_case(&self.nick) {
            return None;
        }
        Some(IrcInbound::JoinPart { nick, channel, text })
    }

    fn identify(&self, transport: &dyn IrcTransport, from: &str) {
        let Some(password) = &self.nickserv_password else {
            debug!(from, "Nick registration notice but no NickServ password configured");
            return;
        };
        info!(service = %self.nickserv_nick, "Identifying with NickServ");
        if let Err(e) = transport.privmsg(&self.nickserv_nick, &format!("IDENTIFY {password}")) {
            warn!(error = %e, "Failed to send NickServ identify");
        }
    }
}
