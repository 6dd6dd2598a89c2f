use matterbridge_core::{CanonicalMessage, ChannelMap, MessageKind};
use matterbridge_mattermost::{RemoteAction, RemoteEvent, RemoteIdentity};

/// Mattermost commands that are handled instead of relayed line by line.
const REMOTE_COMMANDS: [&str; 2] = ["!users", "!gif"];

/// Turns transport events into [`CanonicalMessage`]s with channels already
/// mapped to the destination side.
#[derive(Debug, Clone)]
pub struct MessageNormalizer {
    channel_map: ChannelMap,
}

impl MessageNormalizer {
    pub fn new(channel_map: ChannelMap) -> Self {
        Self { channel_map }
    }

    pub fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    /// Normalize an IRC channel message.
    ///
    /// A message whose first word is the bridge's nick (ignoring trailing `:`
    /// and `,`) becomes a [`MessageKind::Command`] that stays on the IRC
    /// channel, with the command word as text. Emotes are rendered in the
    /// third person.
    pub fn from_irc(&self, nick: &str, channel: &str, text: &str, action: bool, own_nick: &str) -> Option<CanonicalMessage> {
        if text.trim().is_empty() {
            return None;
        }
        if let Some(command) = addressed_command(text, own_nick) {
            return Some(CanonicalMessage::command(nick, channel, command));
        }
        let remote_channel = self.channel_map.resolve_remote(channel);
        if action {
            Some(CanonicalMessage::new(
                MessageKind::Action,
                nick,
                remote_channel,
                format!("{nick} {text}"),
            ))
        } else {
            Some(CanonicalMessage::normal(nick, remote_channel, text))
        }
    }

    /// Normalize an IRC join or part; `text` is the "joins #dev" part.
    pub fn join_part(&self, nick: &str, channel: &str, text: &str) -> CanonicalMessage {
        CanonicalMessage::new(
            MessageKind::JoinPart,
            nick,
            self.channel_map.resolve_remote(channel),
            text,
        )
    }

    /// Normalize a Mattermost event for IRC.
    ///
    /// Only posts by someone other than `identity` produce messages. A post
    /// opening with `!users` or `!gif` yields one command message; anything
    /// else yields one message per non-empty line, where a lone `\r` also
    /// ends a line.
    pub fn from_remote(&self, event: &RemoteEvent, identity: Option<&RemoteIdentity>) -> Vec<CanonicalMessage> {
        if event.action != RemoteAction::Posted {
            return Vec::new();
        }
        if identity.is_some_and(|me| me.authored(event)) {
            return Vec::new();
        }
        let irc_channel = self.channel_map.resolve_irc(&event.channel);

        let first = event.text.split_whitespace().next();
        if first.is_some_and(|w| REMOTE_COMMANDS.contains(&w)) {
            return vec![CanonicalMessage::command(
                event.username.as_str(),
                irc_channel,
                event.text.trim(),
            )];
        }

        event
            .text
            .split(['\n', '\r'])
            .filter(|line| !line.trim().is_empty())
            .map(|line| CanonicalMessage::normal(event.username.as_str(), irc_channel, line))
            .collect()
    }
}

/// The command word of a message addressed to `own_nick`. Empty unless
/// exactly one word follows the nick, which gets the usage text.
fn addressed_command<'a>(text: &'a str, own_nick: &str) -> Option<&'a str> {
    let mut words = text.split_whitespace();
    let first = words.next()?.trim_end_matches([':', ',']);
    if first != own_nick {
        return None;
    }
    match (words.next(), words.next()) {
        (Some(command), None) => Some(command),
        _ => Some(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matterbridge_core::ChannelMapping;

    fn normalizer() -> MessageNormalizer {
        let mappings = vec![ChannelMapping {
            irc: "#dev".into(),
            mattermost: "team-dev".into(),
            token: None,
        }];
        MessageNormalizer::new(ChannelMap::new(&mappings, "#main", "town-square"))
    }

    fn me() -> RemoteIdentity {
        RemoteIdentity {
            user_id: Some("me".into()),
            username: "matterbot".into(),
        }
    }

    #[test]
    fn test_irc_message_mapped() {
        let msg = normalizer()
            .from_irc("alice", "#dev", "hello world", false, "matterbot")
            .unwrap();
        assert_eq!(msg, CanonicalMessage::normal("alice", "team-dev", "hello world"));

        let unmapped = normalizer()
            .from_irc("alice", "#random", "hi", false, "matterbot")
            .unwrap();
        assert_eq!(unmapped.origin_channel, "town-square");
    }

    #[test]
    fn test_irc_action_in_third_person() {
        let msg = normalizer()
            .from_irc("alice", "#dev", "waves", true, "matterbot")
            .unwrap();
        assert_eq!(msg.kind, MessageKind::Action);
        assert_eq!(msg.text, "alice waves");
    }

    #[test]
    fn test_command_detection_anchors_on_exact_nick() {
        let n = normalizer();
        for text in ["matterbot: !users", "matterbot, !users", "matterbot !users"] {
            let msg = n.from_irc("alice", "#dev", text, false, "matterbot").unwrap();
            assert_eq!(msg.kind, MessageKind::Command, "{text}");
            assert_eq!(msg.text, "!users");
            assert_eq!(msg.origin_channel, "#dev");
        }
        let help = n.from_irc("alice", "#dev", "matterbot:", false, "matterbot").unwrap();
        assert_eq!(help.kind, MessageKind::Command);
        assert_eq!(help.text, "");

        for text in ["matterbot2: !users", "hey matterbot: !users", "matterbot;: hi"] {
            let msg = n.from_irc("alice", "#dev", text, false, "matterbot").unwrap();
            assert_eq!(msg.kind, MessageKind::Normal, "{text}");
        }
    }

    #[test]
    fn test_trailing_words_after_command_get_usage() {
        let n = normalizer();
        for text in ["matterbot: !users please", "matterbot, !users #dev", "matterbot: what is this"] {
            let msg = n.from_irc("alice", "#dev", text, false, "matterbot").unwrap();
            assert_eq!(msg.kind, MessageKind::Command, "{text}");
            assert_eq!(msg.text, "", "{text}");
            assert_eq!(msg.first_word(), None, "{text}");
        }
    }

    #[test]
    fn test_own_posts_are_dropped() {
        let own = RemoteEvent::posted("team-dev", Some("me".into()), "matterbot", "echo");
        assert!(normalizer().from_remote(&own, Some(&me())).is_empty());
    }

    #[test]
    fn test_non_post_events_are_dropped() {
        assert!(normalizer()
            .from_remote(&RemoteEvent::other("typing"), Some(&me()))
            .is_empty());
    }

    #[test]
    fn test_multiline_split_in_order() {
        let event = RemoteEvent::posted("team-dev", Some("u2".into()), "bob", "line1\r\nline2\n\nline3");
        let msgs = normalizer().from_remote(&event, Some(&me()));
        let texts: Vec<&str> = msgs.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["line1", "line2", "line3"]);
        assert!(msgs.iter().all(|m| m.origin_channel == "#dev" && m.sender == "bob"));
    }

    #[test]
    fn test_lone_carriage_return_splits_line() {
        let event = RemoteEvent::posted("team-dev", Some("u2".into()), "bob", "a\rb\r\n\rc");
        let texts: Vec<String> = normalizer()
            .from_remote(&event, Some(&me()))
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remote_commands_are_one_message() {
        let event = RemoteEvent::posted("team-dev", None, "bob", "!gif cats\nmore");
        let msgs = normalizer().from_remote(&event, None);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].kind, MessageKind::Command);
        assert_eq!(msgs[0].first_word(), Some("!gif"));

        let plain = RemoteEvent::posted("team-dev", None, "bob", "!giffy");
        assert_eq!(normalizer().from_remote(&plain, None)[0].kind, MessageKind::Normal);
    }
}
