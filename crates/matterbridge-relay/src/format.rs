use matterbridge_core::NickFormatter;

const NICK_PLACEHOLDER: &str = "{NICK}";

/// How an IRC nick is shown on Mattermost.
///
/// The bridge's own nick passes through untouched; otherwise the template
/// is applied, or `irc-<nick>` when none is configured.
pub fn remote_nick(nick: &str, own_nick: &str, template: Option<&str>) -> String {
    if nick == own_nick {
        return nick.to_string();
    }
    match template {
        Some(template) => template.replace(NICK_PLACEHOLDER, nick),
        None => format!("irc-{nick}"),
    }
}

/// Prefix put before a Mattermost username on IRC lines.
pub fn irc_display_prefix(username: &str, template: Option<&str>, slack_circumfix: bool) -> String {
    match template.filter(|t| !t.is_empty()) {
        Some(template) => template.replace(NICK_PLACEHOLDER, username),
        None if slack_circumfix => format!("<{username}> "),
        None => format!("{username}: "),
    }
}

/// Whether the text opens with a character Mattermost renders as markup.
pub fn is_markup(text: &str) -> bool {
    matches!(
        text.chars().next(),
        Some('|' | '#' | '_' | '*' | '~' | '-' | ':' | '>' | '=')
    )
}

/// Put the sender in front of the text, on its own paragraph when the text
/// starts with markup.
pub fn prefix_with_nick(nick: &str, text: &str) -> String {
    if is_markup(text) {
        format!("{nick}\n\n{text}")
    } else {
        format!("{nick} {text}")
    }
}

/// Render a NAMES listing for Mattermost.
pub fn format_nicks(formatter: NickFormatter, nicks: &[String], per_row: usize) -> String {
    match formatter {
        NickFormatter::Plain => plain_nicks(nicks),
        NickFormatter::Table => table_nicks(nicks, per_row),
    }
}

fn plain_nicks(nicks: &[String]) -> String {
    format!("{} currently on IRC", nicks.join(", "))
}

/// Markdown table with an `IRC users` header and `per_row` columns.
fn table_nicks(nicks: &[String], per_row: usize) -> String {
    let per_row = if per_row == 0 { 4 } else { per_row };
    let columns = per_row.min(nicks.len()).max(1);

    let mut out = String::from("|IRC users");
    out.push_str(&"|".repeat(columns));
    out.push_str("\r\n|");
    out.push_str(&":-|".repeat(columns));
    for row in nicks.chunks(per_row) {
        out.push_str("\r\n|");
        for nick in row {
            out.push_str(nick);
            out.push('|');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_remote_nick() {
        assert_eq!(remote_nick("alice", "matterbot", None), "irc-alice");
        assert_eq!(remote_nick("alice", "matterbot", Some("[irc] {NICK}")), "[irc] alice");
        assert_eq!(remote_nick("matterbot", "matterbot", Some("[irc] {NICK}")), "matterbot");
    }

    #[test]
    fn test_irc_display_prefix() {
        assert_eq!(irc_display_prefix("bob", None, false), "bob: ");
        assert_eq!(irc_display_prefix("bob", None, true), "<bob> ");
        assert_eq!(irc_display_prefix("bob", Some("[mm] {NICK} "), true), "[mm] bob ");
        assert_eq!(irc_display_prefix("bob", Some(""), false), "bob: ");
    }

    #[test]
    fn test_prefix_with_nick() {
        assert_eq!(prefix_with_nick("irc-alice", "hello"), "irc-alice hello");
        assert_eq!(prefix_with_nick("irc-alice", "# Title"), "irc-alice\n\n# Title");
        assert!(!is_markup(""));
        assert!(is_markup("> quote"));
    }

    #[test]
    fn test_plain_nicks() {
        assert_eq!(
            format_nicks(NickFormatter::Plain, &names(&["alice", "bob", "carol"]), 4),
            "alice, bob, carol currently on IRC"
        );
    }

    #[test]
    fn test_table_nicks() {
        assert_eq!(
            format_nicks(NickFormatter::Table, &names(&["a", "b", "c"]), 2),
            "|IRC users||\r\n|:-|:-|\r\n|a|b|\r\n|c|"
        );
        assert_eq!(
            format_nicks(NickFormatter::Table, &names(&["a", "b"]), 4),
            "|IRC users||\r\n|:-|:-|\r\n|a|b|"
        );
    }
}
