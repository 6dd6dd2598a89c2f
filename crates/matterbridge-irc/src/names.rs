use std::collections::HashMap;

/// Collects NAMES replies per channel until the end-of-list numeric arrives.
///
/// Keyed by channel so concurrent queries for different channels never mix.
#[derive(Debug, Default)]
pub struct NickAccumulator {
    pending: HashMap<String, Vec<String>>,
}

impl NickAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one reply chunk for `channel`.
    pub fn add(&mut self, channel: &str, nicks: impl IntoIterator<Item = String>) {
        self.pending
            .entry(channel.to_string())
            .or_default()
            .extend(nicks);
    }

    /// Take the sorted nicks collected for `channel`, leaving it empty.
    pub fn flush(&mut self, channel: &str) -> Vec<String> {
        let mut nicks = self.pending.remove(channel).unwrap_or_default();
        nicks.sort();
        nicks
    }

    pub fn is_empty(&self, channel: &str) -> bool {
        self.pending.get(channel).map_or(true, Vec::is_empty)
    }

    /// Drop everything, e.g. after the connection was lost mid-listing.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
