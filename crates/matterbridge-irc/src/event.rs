use irc::proto::{Command, Message, Response};

/// The IRC traffic the bridge reacts to, flattened out of the wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcEvent {
    /// `001`: registration completed under `nick`.
    Welcome { nick: String },
    Privmsg {
        nick: String,
        target: String,
        text: String,
    },
    /// CTCP `ACTION` (`/me`).
    Action {
        nick: String,
        target: String,
        text: String,
    },
    Join { nick: String, channel: String },
    Part {
        nick: String,
        channel: String,
        reason: Option<String>,
    },
    /// `353`: one chunk of a NAMES listing, mode prefixes stripped.
    NamesReply { channel: String, nicks: Vec<String> },
    /// `366`: end of a NAMES listing.
    NamesEnd { channel: String },
    Notice { nick: String, text: String },
    /// Anything else, by command name or numeric.
    Other { code: String },
}

const CTCP_ACTION: &str = "\u{1}ACTION ";

impl IrcEvent {
    pub fn from_message(message: &Message) -> Self {
        let nick = message.source_nickname().unwrap_or_default().to_string();
        match &message.command {
            Command::PRIVMSG(target, text) => {
                if let Some(action) = text.strip_prefix(CTCP_ACTION) {
                    IrcEvent::Action {
                        nick,
                        target: target.clone(),
                        text: action.trim_end_matches('\u{1}').to_string(),
                    }
                } else if text.starts_with('\u{1}') {
                    IrcEvent::Other { code: "CTCP".into() }
                } else {
                    IrcEvent::Privmsg {
                        nick,
                        target: target.clone(),
                        text: text.clone(),
                    }
                }
            }
            Command::NOTICE(_, text) => IrcEvent::Notice {
                nick,
                text: text.clone(),
            },
            Command::JOIN(channel, _, _) => IrcEvent::Join {
                nick,
                channel: channel.clone(),
            },
            Command::PART(channel, reason) => IrcEvent::Part {
                nick,
                channel: channel.clone(),
                reason: reason.clone().filter(|r| !r.is_empty()),
            },
            Command::Response(Response::RPL_WELCOME, args) => IrcEvent::Welcome {
                nick: args.first().cloned().unwrap_or_default(),
            },
            // [me, symbol, channel, names]
            Command::Response(Response::RPL_NAMREPLY, args) if args.len() >= 4 => IrcEvent::NamesReply {
                channel: args[2].clone(),
                nicks: args
                    .last()
                    .map(|names| parse_names(names))
                    .unwrap_or_default(),
            },
            // [me, channel, text]
            Command::Response(Response::RPL_ENDOFNAMES, args) if args.len() >= 2 => IrcEvent::NamesEnd {
                channel: args[1].clone(),
            },
            Command::Response(response, _) => IrcEvent::Other {
                code: format!("{:03}", *response as u16),
            },
            Command::Raw(code, _) => IrcEvent::Other { code: code.clone() },
            other => IrcEvent::Other {
                code: String::from(other)
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            },
        }
    }
}

/// Split a NAMES reply and strip channel membership prefixes.
fn parse_names(names: &str) -> Vec<String> {
    names
        .split_whitespace()
        .map(|n| n.trim_start_matches(['@', '+', '%', '~', '&']))
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn event(line: &str) -> IrcEvent {
        let message: Message = line.parse().unwrap();
        IrcEvent::from_message(&message)
    }

    #[test]
    fn test_privmsg() {
        assert_eq!(
            event(":alice!a@example.net PRIVMSG #dev :hello world\r\n"),
            IrcEvent::Privmsg {
                nick: "alice".into(),
                target: "#dev".into(),
                text: "hello world".into(),
            }
        );
    }

    #[test]
    fn test_action() {
        assert_eq!(
            event(":alice!a@example.net PRIVMSG #dev :\u{1}ACTION waves\u{1}\r\n"),
            IrcEvent::Action {
                nick: "alice".into(),
                target: "#dev".into(),
                text: "waves".into(),
            }
        );
        assert_eq!(
            event(":alice!a@example.net PRIVMSG matterbot :\u{1}VERSION\u{1}\r\n"),
            IrcEvent::Other { code: "CTCP".into() }
        );
    }

    #[test]
    fn test_welcome_carries_assigned_nick() {
        assert_eq!(
            event(":irc.example.net 001 matterbot_ :Welcome to ExampleNet\r\n"),
            IrcEvent::Welcome {
                nick: "matterbot_".into()
            }
        );
    }

    #[test]
    fn test_names_reply_strips_prefixes() {
        assert_eq!(
            event(":irc.example.net 353 matterbot = #dev :@alice +bob carol\r\n"),
            IrcEvent::NamesReply {
                channel: "#dev".into(),
                nicks: vec!["alice".into(), "bob".into(), "carol".into()],
            }
        );
        assert_eq!(
            event(":irc.example.net 366 matterbot #dev :End of /NAMES list.\r\n"),
            IrcEvent::NamesEnd {
                channel: "#dev".into()
            }
        );
    }

    #[test]
    fn test_join_part_notice() {
        assert_eq!(
            event(":bob!b@example.net JOIN #dev\r\n"),
            IrcEvent::Join {
                nick: "bob".into(),
                channel: "#dev".into()
            }
        );
        assert_eq!(
            event(":bob!b@example.net PART #dev :gone fishing\r\n"),
            IrcEvent::Part {
                nick: "bob".into(),
                channel: "#dev".into(),
                reason: Some("gone fishing".into()),
            }
        );
        assert_eq!(
            event(":NickServ!services@example.net NOTICE matterbot :This nickname is registered.\r\n"),
            IrcEvent::Notice {
                nick: "NickServ".into(),
                text: "This nickname is registered.".into(),
            }
        );
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(
            event(":irc.example.net 372 matterbot :- message of the day\r\n"),
            IrcEvent::Other { code: "372".into() }
        );
        assert_eq!(event("PING :irc.example.net\r\n"), IrcEvent::Other { code: "PING".into() });
    }
}
