use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;

use config::shared::DedupCacheConfig;
use tokio::time::Instant;

use crate::types::MutationDigest;

#[derive(Debug)]
struct Entry {
    /// Most recently recorded digests, oldest first.
    digests: VecDeque<MutationDigest>,
    written_at: Instant,
    sequence: u64,
}

/// Bounded memory of the mutation digests recently processed for each row key.
///
/// Keeps up to `max_digests` digests per key and up to `max_capacity` keys. A key expires
/// `ttl` after it was last written. When full, the least recently written key is evicted.
///
/// Owned and mutated by the reconciliation loop only, so it carries no synchronisation.
#[derive(Debug)]
pub struct DigestDedupCache<K> {
    entries: HashMap<K, Entry>,
    /// Keys ordered by their last write. Since every write uses the same ttl this is also
    /// expiry order.
    write_order: BTreeMap<u64, K>,
    next_sequence: u64,
    max_digests: usize,
    max_capacity: usize,
    ttl: Duration,
}

impl<K> DigestDedupCache<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new(max_digests: usize, max_capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            write_order: BTreeMap::new(),
            next_sequence: 0,
            max_digests: max_digests.max(1),
            max_capacity: max_capacity.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &DedupCacheConfig) -> Self {
        Self::new(
            config.max_digests,
            config.max_capacity,
            Duration::from_millis(config.expire_after_ms),
        )
    }

    /// Returns whether `digest` was recorded for `key` and has not expired.
    pub fn seen(&mut self, key: &K, digest: &MutationDigest) -> bool {
        let now = Instant::now();
        let Some(entry) = self.entries.get(key) else {
            return false;
        };

        if self.is_expired(entry, now) {
            self.remove(key);
            return false;
        }

        entry.digests.contains(digest)
    }

    /// Records `digest` as processed for `key`, refreshing the key's expiry.
    pub fn record(&mut self, key: K, digest: MutationDigest) {
        let now = Instant::now();
        self.evict_expired(now);

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        match self.entries.get_mut(&key) {
            Some(entry) => {
                self.write_order.remove(&entry.sequence);
                entry.sequence = sequence;
                entry.written_at = now;
                if !entry.digests.contains(&digest) {
                    entry.digests.push_back(digest);
                    while entry.digests.len() > self.max_digests {
                        entry.digests.pop_front();
                    }
                }
            }
            None => {
                while self.entries.len() >= self.max_capacity {
                    let Some((_, oldest)) = self.write_order.pop_first() else {
                        break;
                    };
                    self.entries.remove(&oldest);
                }

                self.entries.insert(
                    key.clone(),
                    Entry {
                        digests: VecDeque::from([digest]),
                        written_at: now,
                        sequence,
                    },
                );
            }
        }

        self.write_order.insert(sequence, key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.written_at) >= self.ttl
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some((_, key)) = self.write_order.first_key_value() {
            let expired = self
                .entries
                .get(key)
                .is_none_or(|entry| self.is_expired(entry, now));
            if !expired {
                break;
            }

            if let Some((_, key)) = self.write_order.pop_first() {
                self.entries.remove(&key);
            }
        }
    }

    fn remove(&mut self, key: &K) {
        if let Some(entry) = self.entries.remove(key) {
            self.write_order.remove(&entry.sequence);
        }
    }
}
