//! Active subscriber set
//!
//! Plain map owned by the coordination loop. Nothing here is synchronized;
//! the loop is the only code that ever touches it.

use std::collections::HashMap;

use super::entry::{SubscriberEntry, SubscriberId};

/// Map of currently registered subscribers
#[derive(Debug, Default)]
pub struct SubscriberSet {
    entries: HashMap<SubscriberId, SubscriberEntry>,

    /// Arrival sequence handed to the next inserted entry
    next_seq: u64,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber
    ///
    /// Returns `false` and leaves the existing entry untouched if the id is
    /// already registered.
    pub fn insert(&mut self, id: SubscriberId, mut entry: SubscriberEntry) -> bool {
        if self.contains(id) {
            return false;
        }
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(id, entry);
        true
    }

    /// Remove a subscriber, handing its entry (and sending half) to the caller
    pub fn remove(&mut self, id: SubscriberId) -> Option<SubscriberEntry> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ids in the order their registrations were processed
    pub fn ids(&self) -> Vec<SubscriberId> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_unstable_by_key(|(_, entry)| entry.seq);
        entries.into_iter().map(|(id, _)| *id).collect()
    }

    pub(super) fn iter_mut(&mut self) -> impl Iterator<Item = (&SubscriberId, &mut SubscriberEntry)> {
        self.entries.iter_mut()
    }

    /// Drop every entry, closing all subscriber channels
    pub(super) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}
