use crate::format::{format_nicks, irc_display_prefix, prefix_with_nick, remote_nick};
use crate::media::MediaSearch;
use crate::normalize::MessageNormalizer;
use async_trait::async_trait;
use matterbridge_core::{BridgeConfig, CanonicalMessage, ChannelMap, MessageKind, NickFormatter};
use matterbridge_irc::{IrcHandler, IrcInbound, IrcTransport};
use matterbridge_mattermost::{OutboundPost, RemoteEvent, RemoteHandle};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reply to any IRC command other than `!users`.
const IRC_USAGE: &str = "Valid commands are: [!users, !help]";

/// Text relayed when a `!gif` lookup fails.
const MEDIA_ERROR: &str = "error";

/// Formatting switches for both relay directions.
#[derive(Debug, Clone, Default)]
pub struct RelayOptions {
    /// How IRC nicks appear on Mattermost, `{NICK}` substituted.
    pub remote_nick_format: Option<String>,
    /// Put the formatted sender in front of every Mattermost post.
    pub prefix_messages_with_nick: bool,
    /// How Mattermost usernames appear on IRC, `{NICK}` substituted.
    pub irc_nick_format: Option<String>,
    pub use_slack_circumfix: bool,
    pub nick_formatter: NickFormatter,
    pub nicks_per_row: usize,
}

impl RelayOptions {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            remote_nick_format: config.mattermost.remote_nick_format.clone(),
            prefix_messages_with_nick: config.mattermost.prefix_messages_with_nick,
            irc_nick_format: config.irc.remote_nick_format.clone(),
            use_slack_circumfix: config.irc.use_slack_circumfix,
            nick_formatter: config.mattermost.nick_formatter,
            nicks_per_row: config.mattermost.nicks_per_row,
        }
    }
}

/// The two relay pumps.
///
/// IRC->Mattermost runs inline on the IRC connection task through
/// [`IrcHandler`]; posts are queued on the session handle without waiting.
/// Mattermost->IRC runs as its own task in [`Relay::run_remote_pump`].
pub struct Relay {
    normalizer: MessageNormalizer,
    options: RelayOptions,
    remote: RemoteHandle,
    irc: Arc<dyn IrcTransport>,
    media: Arc<dyn MediaSearch>,
}

impl Relay {
    pub fn new(
        channel_map: ChannelMap,
        options: RelayOptions,
        remote: RemoteHandle,
        irc: Arc<dyn IrcTransport>,
        media: Arc<dyn MediaSearch>,
    ) -> Self {
        Self {
            normalizer: MessageNormalizer::new(channel_map),
            options,
            remote,
            irc,
            media,
        }
    }

    // ── IRC -> Mattermost ───────────────────────────────────────────────────

    /// Handle one item produced by the IRC session.
    pub fn handle_irc(&self, inbound: IrcInbound, own_nick: &str) {
        match inbound {
            IrcInbound::Message {
                nick,
                channel,
                text,
                action,
            } => {
                let Some(msg) = self.normalizer.from_irc(&nick, &channel, &text, action, own_nick) else {
                    return;
                };
                if msg.kind == MessageKind::Command {
                    self.answer_irc_command(msg);
                    return;
                }
                let author = remote_nick(&msg.sender, own_nick, self.options.remote_nick_format.as_deref());
                self.post(&author, &msg.origin_channel, &msg.text, msg.kind);
            }
            IrcInbound::JoinPart { nick, channel, text } => {
                let msg = self.normalizer.join_part(&nick, &channel, &text);
                let who = remote_nick(&msg.sender, own_nick, self.options.remote_nick_format.as_deref());
                self.post(own_nick, &msg.origin_channel, &format!("{who} {}", msg.text), msg.kind);
            }
            IrcInbound::Names { channel, nicks } => {
                let text = format_nicks(self.options.nick_formatter, &nicks, self.options.nicks_per_row);
                let remote_channel = self.normalizer.channel_map().resolve_remote(&channel);
                self.post(own_nick, remote_channel, &text, MessageKind::Normal);
            }
        }
    }

    fn post(&self, author: &str, channel: &str, text: &str, kind: MessageKind) {
        let text = if self.options.prefix_messages_with_nick {
            prefix_with_nick(author, text)
        } else {
            text.to_string()
        };
        debug!(channel, author, "-> mattermost");
        if let Err(e) = self.remote.send(OutboundPost::new(channel, author, text, kind)) {
            warn!(channel, error = %e, "Dropping message for Mattermost");
        }
    }

    /// Commands wait on Mattermost, so they are answered off the IRC task.
    fn answer_irc_command(&self, command: CanonicalMessage) {
        let irc = self.irc.clone();
        let remote = self.remote.clone();
        let irc_channel = command.origin_channel.clone();
        let remote_channel = self
            .normalizer
            .channel_map()
            .resolve_remote(&irc_channel)
            .to_string();
        info!(from = %command.sender, command = %command.text, "IRC bot command");

        tokio::spawn(async move {
            let reply = match command.text.as_str() {
                "!users" => match remote.usernames_in_channel(&remote_channel).await {
                    Ok(mut names) => {
                        names.sort();
                        format!("Users on Mattermost: {}", names.join(", "))
                    }
                    Err(e) => {
                        warn!(channel = %remote_channel, error = %e, "Cannot list Mattermost users");
                        return;
                    }
                },
                _ => IRC_USAGE.to_string(),
            };
            if let Err(e) = irc.privmsg(&irc_channel, &reply) {
                warn!(channel = %irc_channel, error = %e, "Failed to answer IRC command");
            }
        });
    }

    // ── Mattermost -> IRC ───────────────────────────────────────────────────

    /// Drain remote events until cancelled or the session stops.
    pub async fn run_remote_pump(self: Arc<Self>, mut events: mpsc::Receiver<RemoteEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_remote(event).await,
                    None => break,
                },
            }
        }
        debug!("Mattermost -> IRC pump stopped");
    }

    /// Relay one remote event to IRC.
    pub async fn handle_remote(&self, event: RemoteEvent) {
        let identity = self.remote.identity();
        for msg in self.normalizer.from_remote(&event, identity.as_ref()) {
            self.deliver_to_irc(msg).await;
        }
    }

    async fn deliver_to_irc(&self, msg: CanonicalMessage) {
        let channel = msg.origin_channel.as_str();
        if msg.kind == MessageKind::Command {
            let mut words = msg.text.split_whitespace();
            match words.next() {
                Some("!users") => {
                    info!(from = %msg.sender, channel, "Mattermost !users, querying IRC names");
                    if let Err(e) = self.irc.names(channel) {
                        warn!(channel, error = %e, "Failed to request IRC names");
                    }
                    return;
                }
                Some("!gif") => {
                    let keywords: Vec<String> = words.map(str::to_string).collect();
                    let url = match self.media.random(&keywords).await {
                        Ok(url) => url,
                        Err(e) => {
                            warn!(error = %e, "Media lookup failed");
                            MEDIA_ERROR.to_string()
                        }
                    };
                    self.privmsg(channel, &msg.sender, &url);
                    return;
                }
                _ => {}
            }
        }
        self.privmsg(channel, &msg.sender, &msg.text);
    }

    fn privmsg(&self, channel: &str, sender: &str, text: &str) {
        let prefix = irc_display_prefix(
            sender,
            self.options.irc_nick_format.as_deref(),
            self.options.use_slack_circumfix,
        );
        debug!(channel, sender, "-> irc");
        if let Err(e) = self.irc.privmsg(channel, &format!("{prefix}{text}")) {
            warn!(channel, error = %e, "Dropping message for IRC");
        }
    }
}

#[async_trait]
impl IrcHandler for Relay {
    async fn on_inbound(&self, inbound: IrcInbound, own_nick: &str) {
        self.handle_irc(inbound, own_nick);
    }
}
