use crate::config::ChannelMapping;
use std::collections::HashMap;

/// Bidirectional lookup between IRC channel names and Mattermost channel names.
///
/// Unmapped names fall back to the configured default channel of the
/// respective side, so all unmapped traffic flows between one "main" pair.
/// The map is immutable after construction and safe to share between tasks.
#[derive(Debug, Clone)]
pub struct ChannelMap {
    irc_to_remote: HashMap<String, String>,
    remote_to_irc: HashMap<String, String>,
    default_irc: String,
    default_remote: String,
}

impl ChannelMap {
    /// Build the map from mappings in configuration order.
    ///
    /// A later mapping that reuses an IRC or remote name replaces the whole
    /// earlier pair, so both directions always agree.
    pub fn new(
        mappings: &[ChannelMapping],
        default_irc: impl Into<String>,
        default_remote: impl Into<String>,
    ) -> Self {
        let mut irc_to_remote = HashMap::with_capacity(mappings.len());
        let mut remote_to_irc = HashMap::with_capacity(mappings.len());
        for mapping in mappings {
            if let Some(previous) = irc_to_remote.remove(&mapping.irc) {
                if previous != mapping.mattermost {
                    remote_to_irc.remove(&previous);
                    tracing::warn!(
                        irc = %mapping.irc,
                        previous = %previous,
                        replacement = %mapping.mattermost,
                        "Duplicate IRC channel mapping, last one wins"
                    );
                }
            }
            if let Some(previous) = remote_to_irc.remove(&mapping.mattermost) {
                if previous != mapping.irc {
                    irc_to_remote.remove(&previous);
                    tracing::warn!(
                        mattermost = %mapping.mattermost,
                        previous = %previous,
                        replacement = %mapping.irc,
                        "Duplicate Mattermost channel mapping, last one wins"
                    );
                }
            }
            irc_to_remote.insert(mapping.irc.clone(), mapping.mattermost.clone());
            remote_to_irc.insert(mapping.mattermost.clone(), mapping.irc.clone());
        }
        Self {
            irc_to_remote,
            remote_to_irc,
            default_irc: default_irc.into(),
            default_remote: default_remote.into(),
        }
    }

    /// The Mattermost channel an IRC channel relays to.
    pub fn resolve_remote(&self, irc_channel: &str) -> &str {
        self.irc_to_remote
            .get(irc_channel)
            .map_or(self.default_remote.as_str(), String::as_str)
    }

    /// The IRC channel a Mattermost channel relays to.
    pub fn resolve_irc(&self, remote_channel: &str) -> &str {
        self.remote_to_irc
            .get(remote_channel)
            .map_or(self.default_irc.as_str(), String::as_str)
    }

    /// Default IRC channel.
    pub fn default_irc(&self) -> &str {
        &self.default_irc
    }

    /// Default Mattermost channel.
    pub fn default_remote(&self) -> &str {
        &self.default_remote
    }

    /// Every IRC channel the bridge should sit in, default first, without duplicates.
    pub fn irc_channels(&self) -> Vec<String> {
        let mut channels = vec![self.default_irc.clone()];
        let mut mapped: Vec<&String> = self.irc_to_remote.keys().collect();
        mapped.sort();
        for channel in mapped {
            if !channels.contains(channel) {
                channels.push(channel.clone());
            }
        }
        channels
    }

    /// Every Mattermost channel the bridge should be a member of, default first.
    pub fn remote_channels(&self) -> Vec<String> {
        let mut channels = vec![self.default_remote.clone()];
        let mut mapped: Vec<&String> = self.remote_to_irc.keys().collect();
        mapped.sort();
        for channel in mapped {
            if !channels.contains(channel) {
                channels.push(channel.clone());
            }
        }
        channels
    }
}
