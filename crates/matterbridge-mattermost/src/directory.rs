use crate::api::{Channel, User};
use std::collections::HashMap;

/// Cached id <-> name lookups for users and channels of one team.
///
/// Owned by the session's event-processing context. Refreshing on a miss is
/// the session's job; the directory itself never performs I/O.
#[derive(Debug, Default, Clone)]
pub struct Directory {
    users: HashMap<String, User>,
    /// Channels the session is a member of.
    joined: Vec<Channel>,
    /// Public channels of the team.
    public: Vec<Channel>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the user directory.
    pub fn set_users(&mut self, users: Vec<User>) {
        self.users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
    }

    /// Replace the channel directory.
    pub fn set_channels(&mut self, joined: Vec<Channel>, public: Vec<Channel>) {
        self.joined = joined;
        self.public = public;
    }

    pub fn username(&self, user_id: &str) -> Option<&str> {
        self.users.get(user_id).map(|u| u.username.as_str())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn channel_count(&self) -> usize {
        self.all_channels().count()
    }

    fn all_channels(&self) -> impl Iterator<Item = &Channel> {
        self.joined.iter().chain(self.public.iter())
    }

    pub fn channel_name(&self, channel_id: &str) -> Option<&str> {
        self.all_channels()
            .find(|c| c.id == channel_id)
            .map(|c| c.name.as_str())
    }

    pub fn channel_id(&self, name: &str) -> Option<&str> {
        self.all_channels()
            .find(|c| c.name == name)
            .map(|c| c.id.as_str())
    }

    /// Whether the session is already a member of the named channel.
    pub fn is_member(&self, name: &str) -> bool {
        self.joined.iter().any(|c| c.name == name)
    }

    /// Record a successful join so later membership checks see it.
    pub fn mark_joined(&mut self, channel_id: &str) {
        if self.joined.iter().any(|c| c.id == channel_id) {
            return;
        }
        if let Some(channel) = self.public.iter().find(|c| c.id == channel_id) {
            self.joined.push(channel.clone());
        }
    }
}

/// For a direct-message channel name (`<user id>__<user id>`), the id of the
/// participant that is not `own_id`. `None` for any other channel name.
pub fn direct_message_peer<'a>(channel_name: &'a str, own_id: &str) -> Option<&'a str> {
    let (first, second) = channel_name.split_once("__")?;
    if first != own_id {
        Some(first)
    } else {
        Some(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str, name: &str) -> Channel {
        Channel {
            id: id.into(),
            name: name.into(),
            team_id: "t1".into(),
            header: String::new(),
            channel_type: "O".into(),
        }
    }

    fn user(id: &str, username: &str) -> User {
        User {
            id: id.into(),
            username: username.into(),
        }
    }

    #[test]
    fn test_lookups() {
        let mut dir = Directory::new();
        dir.set_users(vec![user("u1", "alice"), user("u2", "bob")]);
        dir.set_channels(vec![channel("c1", "town-square")], vec![channel("c2", "team-dev")]);

        assert_eq!(dir.username("u2"), Some("bob"));
        assert_eq!(dir.username("u3"), None);
        assert_eq!(dir.channel_name("c2"), Some("team-dev"));
        assert_eq!(dir.channel_id("town-square"), Some("c1"));
        assert!(dir.is_member("town-square"));
        assert!(!dir.is_member("team-dev"));
        assert_eq!(dir.user_count(), 2);
        assert_eq!(dir.channel_count(), 2);
    }

    #[test]
    fn test_mark_joined() {
        let mut dir = Directory::new();
        dir.set_channels(vec![], vec![channel("c2", "team-dev")]);
        dir.mark_joined("c2");
        dir.mark_joined("c2");
        assert!(dir.is_member("team-dev"));
        assert_eq!(dir.joined.len(), 1);
    }

    #[test]
    fn test_direct_message_peer() {
        assert_eq!(direct_message_peer("me__other", "me"), Some("other"));
        assert_eq!(direct_message_peer("other__me", "me"), Some("other"));
        assert_eq!(direct_message_peer("town-square", "me"), None);
    }
}
