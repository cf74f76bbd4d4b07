//! Local view of which devices are in a session.

use bgtimer_types::{PresenceEntry, Timestamp};
use std::collections::BTreeMap;
use std::time::Duration;

/// Presence entries keyed by device id.
///
/// Always replaced wholesale from the inbound presence sub-document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet {
    entries: BTreeMap<String, PresenceEntry>,
}

impl PresenceSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every entry with `entries`.
    pub fn replace_all(&mut self, entries: BTreeMap<String, PresenceEntry>) {
        self.entries = entries;
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries, stale or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a device's entry.
    pub fn get(&self, device_id: &str) -> Option<&PresenceEntry> {
        self.entries.get(device_id)
    }

    /// Iterate over entries in device-id order.
    pub fn iter(&self) -> impl Iterator<Item = &PresenceEntry> {
        self.entries.values()
    }

    /// Number of devices counted as connected.
    ///
    /// With `stale_after` unset every entry counts. Otherwise only entries
    /// whose `lastSeen` is within the window of `now` count.
    pub fn connected_count(&self, now: Timestamp, stale_after: Option<Duration>) -> usize {
        match stale_after {
            None => self.entries.len(),
            Some(window) => {
                let window = window.as_millis() as u64;
                self.entries
                    .values()
                    .filter(|entry| now.millis_since(entry.last_seen) <= window)
                    .count()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgtimer_types::DeviceId;

    fn entry(id: &str, last_seen: u64) -> (String, PresenceEntry) {
        (
            id.to_string(),
            PresenceEntry {
                device_id: DeviceId::from_string(id),
                joined_at: Timestamp::from_millis(0),
                last_seen: Timestamp::from_millis(last_seen),
            },
        )
    }

    #[test]
    fn replace_all_drops_missing_devices() {
        let mut set = PresenceSet::new();
        set.replace_all([entry("a", 0), entry("b", 0)].into_iter().collect());
        set.replace_all([entry("b", 0)].into_iter().collect());

        assert_eq!(set.len(), 1);
        assert!(set.get("a").is_none());
        assert!(set.get("b").is_some());
    }

    #[test]
    fn iter_follows_device_order() {
        let mut set = PresenceSet::new();
        set.replace_all([entry("b", 0), entry("a", 0)].into_iter().collect());
        let ids: Vec<&str> = set.iter().map(|e| e.device_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn without_window_every_entry_counts() {
        let mut set = PresenceSet::new();
        set.replace_all([entry("a", 0), entry("b", 1)].into_iter().collect());
        assert_eq!(set.connected_count(Timestamp::from_millis(1_000_000), None), 2);
    }

    #[test]
    fn window_filters_stale_entries() {
        let mut set = PresenceSet::new();
        set.replace_all(
            [entry("old", 1_000), entry("fresh", 55_000)]
                .into_iter()
                .collect(),
        );
        let now = Timestamp::from_millis(60_000);
        assert_eq!(set.connected_count(now, Some(Duration::from_secs(30))), 1);
        assert_eq!(set.connected_count(now, Some(Duration::from_secs(60))), 2);
    }

    #[test]
    fn clear_empties_set() {
        let mut set = PresenceSet::new();
        set.replace_all([entry("a", 0)].into_iter().collect());
        set.clear();
        assert!(set.is_empty());
    }
}
