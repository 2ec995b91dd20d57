//! At-least-once delivery bookkeeping.
//!
//! [[SeenIds]] remembers recently processed message ids so duplicates can be
//! dropped; [[PendingAcks]] holds outbound envelopes until they are
//! acknowledged, rebroadcasting them with exponential backoff and giving up
//! after a bounded number of retries.

use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use weftsync_messages::{Envelope, MessageId};

/// Retransmission schedule for unacknowledged envelopes.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Delay before the first rebroadcast; doubles per retry.
    pub initial_backoff: Duration,
    /// Upper bound on the per-retry delay.
    pub max_backoff: Duration,
    /// How many rebroadcasts to attempt before giving up.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, retries: u32) -> Duration {
        let doubled = self
            .initial_backoff
            .saturating_mul(1u32 << retries.min(16));
        doubled.min(self.max_backoff)
    }
}

/// A bounded, insertion-ordered set of processed message ids.
///
/// When the set outgrows its window the oldest half is dropped; a duplicate
/// delayed past that window may be processed again, which the id-idempotent
/// document layer tolerates.
#[derive(Debug)]
pub struct SeenIds {
    window: usize,
    order: VecDeque<MessageId>,
    present: AHashSet<MessageId>,
}

impl SeenIds {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            order: VecDeque::new(),
            present: AHashSet::new(),
        }
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.present.contains(id)
    }

    /// Records `id`; returns `false` if it was already present.
    pub fn record(&mut self, id: MessageId) -> bool {
        if !self.present.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.window {
            for _ in 0..self.window / 2 {
                if let Some(oldest) = self.order.pop_front() {
                    self.present.remove(&oldest);
                }
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug)]
struct PendingDelivery {
    envelope: Envelope,
    retries: u32,
    deadline: Option<Instant>,
    force_due: bool,
}

/// Outbound envelopes awaiting acknowledgement.
#[derive(Debug, Default)]
pub struct PendingAcks {
    entries: AHashMap<MessageId, PendingDelivery>,
}

impl PendingAcks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an envelope that was just handed to the transport.
    pub fn track(&mut self, envelope: Envelope) {
        let id = envelope.message_id.clone();
        self.entries.insert(
            id,
            PendingDelivery {
                envelope,
                retries: 0,
                deadline: None,
                force_due: false,
            },
        );
    }

    /// Removes the entry for `id`; returns whether it was present.
    pub fn acknowledge(&mut self, id: &MessageId) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks every entry due for rebroadcast at the next [[PendingAcks::due]].
    pub fn make_all_due(&mut self) {
        for entry in self.entries.values_mut() {
            entry.force_due = true;
        }
    }

    /// Advances the retransmission schedule to `now`.
    ///
    /// Returns the envelopes to rebroadcast and the message ids whose
    /// retries are exhausted (those entries are dropped).
    pub fn due(&mut self, now: Instant, policy: &RetryPolicy) -> (Vec<Envelope>, Vec<MessageId>) {
        let mut rebroadcast = Vec::new();
        let mut failed = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            let is_due = entry.force_due || entry.deadline.is_some_and(|deadline| now >= deadline);
            entry.force_due = false;
            if entry.deadline.is_none() {
                // Freshly tracked: the initial broadcast already happened,
                // only arm the first deadline.
                entry.deadline = Some(now + policy.backoff(entry.retries));
                if !is_due {
                    continue;
                }
            }
            if !is_due {
                continue;
            }
            if entry.retries >= policy.max_retries {
                failed.push(id.clone());
            } else {
                entry.retries += 1;
                entry.deadline = Some(now + policy.backoff(entry.retries));
                rebroadcast.push(entry.envelope.clone());
            }
        }
        for id in failed.iter() {
            self.entries.remove(id);
        }
        (rebroadcast, failed)
    }
}
