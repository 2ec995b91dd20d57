//! One replica of the shared document.
//!
//! The replica is a single-owner state machine: the host feeds it local
//! edits, received envelope bytes, and timer ticks, and each call runs to
//! completion before the next. Envelopes to broadcast and events for the
//! host come back as return values; nothing here touches the network.

use crate::cursors::{CursorRegistry, LoggedOpKind, OpLog, transform};
use crate::delivery::{PendingAcks, RetryPolicy, SeenIds};
use ahash::AHashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::time::Instant;
use weftsync_core::{CharId, SiteId, VectorClock};
use weftsync_data_types::text::{
    CharRecord, DeleteOutcome, Document, DocumentSnapshot, GcSweep, IntegrateOutcome,
    SnapshotError, TextChange, diff,
};
use weftsync_messages::{
    Ack, CursorReport, Envelope, MessageId, Operation, Payload, Presence, WireRecord,
};

/// Tunables of one replica. The defaults carry the protocol's recommended
/// values.
#[derive(Clone, Copy, Debug)]
pub struct ReplicaConfig {
    pub retry: RetryPolicy,
    /// Size of the dedup window for received message ids.
    pub seen_window: usize,
    /// How many silent ticks before a peer is considered gone.
    pub peer_ttl_ticks: u64,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            seen_window: 1000,
            peer_ttl_ticks: 30,
        }
    }
}

/// Something the host should react to.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A remote operation changed the document; refresh the view.
    RemoteApplied(Operation),
    /// A peer's caret moved; `position` is already translated into the
    /// local document.
    CursorMoved {
        site: SiteId,
        position: u32,
        selection: Option<(u32, u32)>,
    },
    PeerJoined(SiteId),
    PeerLeft(SiteId),
    /// An outbound envelope exhausted its retries. The document stays
    /// consistent either way.
    DeliveryFailed { message_id: MessageId },
}

/// How an inbound envelope was handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Decoded and dispatched.
    Applied,
    /// Dropped: we have processed this message id before.
    Duplicate,
    /// Dropped: our own broadcast came back around.
    Loopback,
    /// Dropped: addressed to a different site.
    NotAddressed,
    /// Dropped: the bytes did not decode.
    Malformed,
}

/// Everything produced by one [[Replica::apply_inbound]] call.
#[derive(Debug)]
pub struct Inbound {
    pub outcome: ApplyOutcome,
    pub events: SmallVec<[Event; 2]>,
    /// Envelopes to send back (acknowledgements).
    pub replies: SmallVec<[Envelope; 1]>,
}

impl Inbound {
    fn dropped(outcome: ApplyOutcome) -> Self {
        Self {
            outcome,
            events: SmallVec::new(),
            replies: SmallVec::new(),
        }
    }
}

/// Everything produced by one [[Replica::tick]] call.
#[derive(Debug, Default)]
pub struct Tick {
    /// Unacknowledged envelopes due for another broadcast.
    pub rebroadcast: Vec<Envelope>,
    pub events: SmallVec<[Event; 2]>,
}

/// Counters for envelopes dropped at the door.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub malformed: u64,
    pub duplicates: u64,
    pub loopbacks: u64,
}

/// What a [[Replica::gc]] pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    pub tombstones: GcSweep,
    pub log_pruned: usize,
}

/// The host-persistable state of a replica: the full record sequence
/// (tombstones included) and the vector clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSnapshot {
    pub document: DocumentSnapshot,
    pub clock: VectorClock,
}

#[derive(Debug, Default)]
struct PeerState {
    /// Componentwise max of every clock seen from this peer; the causal
    /// stability horizon for GC.
    observed_clock: VectorClock,
    last_seen_tick: u64,
}

#[derive(Debug)]
struct DeferredDelete {
    clock: VectorClock,
    origin: SiteId,
}

/// One replica of the collaborative document.
pub struct Replica {
    site: SiteId,
    session: String,
    config: ReplicaConfig,
    clock: VectorClock,
    next_counter: u64,
    document: Document,
    log: OpLog,
    seen: SeenIds,
    pending: PendingAcks,
    /// Deletes that overtook their insert, keyed by the missing target.
    deferred_deletes: AHashMap<CharId, DeferredDelete>,
    cursors: CursorRegistry,
    peers: AHashMap<SiteId, PeerState>,
    online: bool,
    tick_seq: u64,
    stats: Stats,
}

impl Replica {
    pub fn new(site: SiteId, config: ReplicaConfig) -> Self {
        Self {
            site,
            session: uuid::Uuid::new_v4().simple().to_string(),
            config,
            clock: VectorClock::new(),
            next_counter: 0,
            document: Document::new(),
            log: OpLog::new(),
            seen: SeenIds::new(config.seen_window),
            pending: PendingAcks::new(),
            deferred_deletes: AHashMap::new(),
            cursors: CursorRegistry::new(),
            peers: AHashMap::new(),
            online: true,
            tick_seq: 0,
            stats: Stats::default(),
        }
    }

    /// Rebuilds a replica from persisted state.
    ///
    /// The character counter resumes one past the largest counter this site
    /// ever used, so restored replicas never reuse an identity.
    pub fn restore(
        site: SiteId,
        config: ReplicaConfig,
        snapshot: ReplicaSnapshot,
    ) -> Result<Self, SnapshotError> {
        let document = Document::from_snapshot(snapshot.document)?;
        let next_counter = document.max_counter_of(&site).map_or(0, |max| max + 1);
        let mut replica = Self::new(site, config);
        replica.document = document;
        replica.clock = snapshot.clock;
        replica.next_counter = next_counter;
        Ok(replica)
    }

    pub fn site(&self) -> &SiteId {
        &self.site
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    pub fn text(&self) -> String {
        self.document.text()
    }

    pub fn visible_len(&self) -> u32 {
        self.document.visible_len() as u32
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn pending_deliveries(&self) -> usize {
        self.pending.len()
    }

    pub fn snapshot(&self) -> ReplicaSnapshot {
        ReplicaSnapshot {
            document: self.document.snapshot(),
            clock: self.clock.clone(),
        }
    }

    /// Inserts `value` at the visible `position` (clamped to the end) and
    /// returns the envelope to broadcast.
    pub fn local_insert(&mut self, position: u32, value: char) -> Envelope {
        self.clock.increment(&self.site);
        let id = CharId::new(self.site.clone(), self.next_counter);
        self.next_counter += 1;
        let record = CharRecord::new(value, id, self.clock.clone());
        let wire_record = WireRecord::from(&record);
        let visible_index = match self.document.integrate(record, &self.clock, position as usize)
        {
            IntegrateOutcome::Inserted { visible_index } => visible_index,
            IntegrateOutcome::Duplicate => unreachable!("freshly minted ids are unique"),
        };
        self.log.record(
            LoggedOpKind::Insert,
            visible_index as u32,
            self.clock.clone(),
            self.site.clone(),
        );
        self.outbound_operation(Operation::Insert {
            position: visible_index as u32,
            clock: self.clock.clone(),
            record: wire_record,
        })
    }

    /// Deletes the character at the visible `position`.
    ///
    /// Out-of-range positions are a no-op: nothing is emitted and the clock
    /// does not move.
    pub fn local_delete(&mut self, position: u32) -> Option<Envelope> {
        let target = self
            .document
            .record_at_visible(position as usize)?
            .id
            .clone();
        self.clock.increment(&self.site);
        match self.document.tombstone(&target, &self.clock) {
            DeleteOutcome::Deleted { visible_index } => {
                self.log.record(
                    LoggedOpKind::Delete,
                    visible_index as u32,
                    self.clock.clone(),
                    self.site.clone(),
                );
                Some(self.outbound_operation(Operation::Delete {
                    position: visible_index as u32,
                    clock: self.clock.clone(),
                    target_id: target,
                }))
            }
            // Visible positions only ever resolve to visible records.
            DeleteOutcome::AlreadyDeleted | DeleteOutcome::NotFound => None,
        }
    }

    /// Reconciles the document with a whole editor buffer.
    ///
    /// Diffs `new_text` against the current text and emits one operation per
    /// changed code point, front to back. This is the path for hosts that
    /// only observe "the buffer is now this".
    pub fn edit_text(&mut self, new_text: &str) -> Vec<Envelope> {
        let current = self.text();
        let mut envelopes = Vec::new();
        let mut offset = 0isize;
        for change in diff(&current, new_text) {
            match change {
                TextChange::Insert { at, value } => {
                    let mut position = (at as isize + offset) as usize;
                    for value in value.chars() {
                        envelopes.push(self.local_insert(position as u32, value));
                        position += 1;
                        offset += 1;
                    }
                }
                TextChange::Delete { at, len } => {
                    let position = (at as isize + offset) as usize;
                    for _ in 0..len {
                        if let Some(envelope) = self.local_delete(position as u32) {
                            envelopes.push(envelope);
                            offset -= 1;
                        }
                    }
                }
            }
        }
        debug_assert_eq!(self.text(), new_text);
        envelopes
    }

    /// Builds a cursor report for the host to broadcast. Debouncing is the
    /// host's business.
    pub fn report_cursor(&self, position: u32, selection: Option<(u32, u32)>) -> Envelope {
        Envelope::broadcast(
            self.site.clone(),
            Payload::Cursor(CursorReport {
                position,
                selection,
                clock: self.clock.clone(),
            }),
        )
    }

    /// Builds a presence heartbeat for the host to broadcast.
    pub fn heartbeat(&self) -> Envelope {
        Envelope::broadcast(
            self.site.clone(),
            Payload::Presence(Presence::now(self.session.clone())),
        )
    }

    /// A peer's caret, translated into the current document.
    pub fn cursor_of(&self, site: &SiteId) -> Option<(u32, Option<(u32, u32)>)> {
        let report = self.cursors.get(site)?;
        Some(transform(report, site, &self.log, self.visible_len()))
    }

    /// Processes one received envelope.
    pub fn apply_inbound(&mut self, bytes: &[u8]) -> Inbound {
        let envelope = match Envelope::from_bytes(bytes) {
            Ok(envelope) => envelope,
            Err(error) => {
                self.stats.malformed += 1;
                warn!("dropping malformed envelope: {error}");
                return Inbound::dropped(ApplyOutcome::Malformed);
            }
        };
        if envelope.origin_site == self.site {
            self.stats.loopbacks += 1;
            return Inbound::dropped(ApplyOutcome::Loopback);
        }

        let mut events = SmallVec::new();
        self.note_peer(&envelope.origin_site, &mut events);

        if !envelope.target.includes(&self.site) {
            return Inbound {
                outcome: ApplyOutcome::NotAddressed,
                events,
                replies: SmallVec::new(),
            };
        }
        if !self.seen.record(envelope.message_id.clone()) {
            self.stats.duplicates += 1;
            debug!("dropping duplicate envelope {}", envelope.message_id);
            return Inbound {
                outcome: ApplyOutcome::Duplicate,
                events,
                replies: SmallVec::new(),
            };
        }

        let mut replies = SmallVec::new();
        match envelope.payload {
            Payload::Operation(operation) => {
                self.clock.merge(operation.clock());
                self.observe_peer_clock(&envelope.origin_site, operation.clock());
                match operation {
                    Operation::Insert {
                        position,
                        clock,
                        record,
                    } => {
                        self.apply_remote_insert(position, clock, record, &mut events);
                    }
                    Operation::Delete {
                        clock, target_id, ..
                    } => {
                        self.apply_remote_delete(
                            clock,
                            target_id,
                            envelope.origin_site.clone(),
                            &mut events,
                        );
                    }
                }
                // Accepted (applied, buffered, or idempotently skipped):
                // acknowledge so the sender stops retransmitting.
                replies.push(Envelope::to_site(
                    self.site.clone(),
                    envelope.origin_site,
                    Payload::Ack(Ack {
                        ack_id: envelope.message_id,
                    }),
                ));
            }
            Payload::Ack(ack) => {
                if self.pending.acknowledge(&ack.ack_id) {
                    debug!("delivery of {} confirmed", ack.ack_id);
                }
            }
            Payload::Cursor(report) => {
                self.observe_peer_clock(&envelope.origin_site, &report.clock);
                if self.cursors.update(envelope.origin_site.clone(), report.clone()) {
                    let (position, selection) = transform(
                        &report,
                        &envelope.origin_site,
                        &self.log,
                        self.visible_len(),
                    );
                    events.push(Event::CursorMoved {
                        site: envelope.origin_site,
                        position,
                        selection,
                    });
                }
            }
            Payload::Presence(_) => {
                // Liveness was noted above; nothing else to do.
            }
        }

        Inbound {
            outcome: ApplyOutcome::Applied,
            events,
            replies,
        }
    }

    /// Advances timers: rebroadcasts overdue envelopes, reports exhausted
    /// deliveries, and expires silent peers. While offline nothing is due
    /// and no retries are burned.
    pub fn tick(&mut self, now: Instant) -> Tick {
        self.tick_seq += 1;
        let mut tick = Tick::default();
        if !self.online {
            return tick;
        }

        let (rebroadcast, failed) = self.pending.due(now, &self.config.retry);
        for envelope in rebroadcast.iter() {
            debug!("rebroadcasting {}", envelope.message_id);
        }
        for message_id in failed {
            warn!("delivery of {message_id} failed after retries");
            tick.events.push(Event::DeliveryFailed { message_id });
        }
        tick.rebroadcast = rebroadcast;

        let ttl = self.config.peer_ttl_ticks;
        let expired: Vec<SiteId> = self
            .peers
            .iter()
            .filter(|(_, state)| self.tick_seq.saturating_sub(state.last_seen_tick) > ttl)
            .map(|(site, _)| site.clone())
            .collect();
        for site in expired {
            self.peers.remove(&site);
            self.cursors.remove(&site);
            tick.events.push(Event::PeerLeft(site));
        }

        tick
    }

    /// The host's connectivity signal. Going online makes every pending
    /// envelope due at the next tick; nothing else is replayed.
    pub fn set_online(&mut self, online: bool) {
        if online && !self.online {
            self.pending.make_all_due();
        }
        self.online = online;
    }

    /// Collects tombstones beyond the `keep` most recent and prunes the
    /// operation log, both only up to the causal stability horizon: nothing
    /// a known peer has not yet observed is touched.
    pub fn gc(&mut self, keep_recent_tombstones: u32) -> GcReport {
        let peers = &self.peers;
        let stable = |clock: &VectorClock| {
            peers
                .values()
                .all(|state| state.observed_clock.dominates(clock))
        };
        let tombstones = self
            .document
            .collect_garbage(keep_recent_tombstones as usize, |record| {
                let deletions = record.deletion_clocks();
                if deletions.is_empty() {
                    return stable(&record.origin_clock);
                }
                // Every peer must have seen at least one delete of the
                // record, or collecting it could resurrect the character.
                peers.values().all(|state| {
                    deletions
                        .iter()
                        .any(|deleted| state.observed_clock.dominates(deleted))
                })
            });
        let log_pruned = self.log.prune(|op| stable(&op.clock));
        debug!(
            "gc: {} tombstones removed, {} unstable kept, {} log entries pruned",
            tombstones.removed, tombstones.retained, log_pruned
        );
        GcReport {
            tombstones,
            log_pruned,
        }
    }

    fn outbound_operation(&mut self, operation: Operation) -> Envelope {
        let envelope = Envelope::broadcast(self.site.clone(), Payload::Operation(operation));
        self.pending.track(envelope.clone());
        envelope
    }

    fn apply_remote_insert(
        &mut self,
        position: u32,
        clock: VectorClock,
        record: WireRecord,
        events: &mut SmallVec<[Event; 2]>,
    ) {
        let id = record.id.clone();
        let wire_record = record.clone();
        match self
            .document
            .integrate(record.into_record(), &clock, position as usize)
        {
            IntegrateOutcome::Inserted { visible_index } => {
                let origin = id.site.clone();
                self.log.record(
                    LoggedOpKind::Insert,
                    visible_index as u32,
                    clock.clone(),
                    origin,
                );
                events.push(Event::RemoteApplied(Operation::Insert {
                    position: visible_index as u32,
                    clock,
                    record: wire_record,
                }));
                self.retry_deferred_delete(&id, events);
            }
            IntegrateOutcome::Duplicate => {
                debug!("insert of {id} already present, skipping");
            }
        }
    }

    fn apply_remote_delete(
        &mut self,
        clock: VectorClock,
        target_id: CharId,
        origin: SiteId,
        events: &mut SmallVec<[Event; 2]>,
    ) {
        match self.document.tombstone(&target_id, &clock) {
            DeleteOutcome::Deleted { visible_index } => {
                self.log.record(
                    LoggedOpKind::Delete,
                    visible_index as u32,
                    clock.clone(),
                    origin,
                );
                events.push(Event::RemoteApplied(Operation::Delete {
                    position: visible_index as u32,
                    clock,
                    target_id,
                }));
            }
            DeleteOutcome::AlreadyDeleted => {
                debug!("delete of {target_id} already applied, skipping");
            }
            DeleteOutcome::NotFound => {
                debug!("delete of {target_id} arrived before its insert, buffering");
                self.deferred_deletes
                    .insert(target_id, DeferredDelete { clock, origin });
            }
        }
    }

    /// Applies a buffered delete whose target just arrived.
    fn retry_deferred_delete(&mut self, id: &CharId, events: &mut SmallVec<[Event; 2]>) {
        let Some(deferred) = self.deferred_deletes.remove(id) else {
            return;
        };
        if let DeleteOutcome::Deleted { visible_index } =
            self.document.tombstone(id, &deferred.clock)
        {
            self.log.record(
                LoggedOpKind::Delete,
                visible_index as u32,
                deferred.clock.clone(),
                deferred.origin,
            );
            events.push(Event::RemoteApplied(Operation::Delete {
                position: visible_index as u32,
                clock: deferred.clock,
                target_id: id.clone(),
            }));
        }
    }

    fn note_peer(&mut self, site: &SiteId, events: &mut SmallVec<[Event; 2]>) {
        let tick_seq = self.tick_seq;
        let state = self.peers.entry(site.clone()).or_insert_with(|| {
            events.push(Event::PeerJoined(site.clone()));
            PeerState::default()
        });
        state.last_seen_tick = tick_seq;
    }

    fn observe_peer_clock(&mut self, site: &SiteId, clock: &VectorClock) {
        if let Some(state) = self.peers.get_mut(site) {
            state.observed_clock.merge(clock);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica(site: &str) -> Replica {
        Replica::new(SiteId::from(site), ReplicaConfig::default())
    }

    fn deliver(envelope: &Envelope, to: &mut Replica) -> Inbound {
        to.apply_inbound(&envelope.to_bytes().unwrap())
    }

    fn type_str(replica: &mut Replica, text: &str) -> Vec<Envelope> {
        text.chars()
            .map(|value| {
                let at = replica.visible_len();
                replica.local_insert(at, value)
            })
            .collect()
    }

    #[test]
    fn local_edits_apply_immediately_and_are_tracked() {
        let mut a = replica("s-aa");
        let envelopes = type_str(&mut a, "hey");
        assert_eq!(a.text(), "hey");
        assert_eq!(a.pending_deliveries(), 3);
        assert_eq!(envelopes.len(), 3);

        let deleted = a.local_delete(1).expect("in range");
        assert_eq!(a.text(), "hy");
        assert_eq!(a.pending_deliveries(), 4);
        match &deleted.payload {
            Payload::Operation(Operation::Delete { target_id, .. }) => {
                assert_eq!(target_id.site, SiteId::from("s-aa"));
            }
            other => panic!("expected a delete, got {other:?}"),
        }

        // Out of range is a no-op: no envelope, no clock movement.
        let clock_before = a.clock().clone();
        assert!(a.local_delete(10).is_none());
        assert_eq!(a.clock(), &clock_before);
        assert_eq!(a.pending_deliveries(), 4);
    }

    #[test]
    fn remote_operations_flow_between_replicas() {
        let mut a = replica("s-aa");
        let mut b = replica("s-bb");

        for envelope in type_str(&mut a, "hi") {
            let inbound = deliver(&envelope, &mut b);
            assert_eq!(inbound.outcome, ApplyOutcome::Applied);
            assert_eq!(inbound.replies.len(), 1);
            // Route the ack back.
            let ack = &inbound.replies[0];
            deliver(ack, &mut a);
        }
        assert_eq!(b.text(), "hi");
        assert_eq!(a.pending_deliveries(), 0);
    }

    #[test]
    fn loopback_and_malformed_envelopes_are_dropped() {
        let mut a = replica("s-aa");
        let own = a.local_insert(0, 'x');
        let inbound = deliver(&own, &mut a);
        assert_eq!(inbound.outcome, ApplyOutcome::Loopback);

        let inbound = a.apply_inbound(b"{ not even json");
        assert_eq!(inbound.outcome, ApplyOutcome::Malformed);

        assert_eq!(a.stats().loopbacks, 1);
        assert_eq!(a.stats().malformed, 1);
        assert_eq!(a.text(), "x");
    }

    #[test]
    fn envelopes_addressed_elsewhere_are_ignored() {
        let mut a = replica("s-aa");
        let mut b = replica("s-bb");
        let insert = b.local_insert(0, 'q');
        deliver(&insert, &mut a);
        // a acks to b; c overhears it.
        let mut c = replica("s-cc");
        let ack = Envelope::to_site(
            SiteId::from("s-aa"),
            SiteId::from("s-bb"),
            Payload::Ack(Ack {
                ack_id: insert.message_id.clone(),
            }),
        );
        let inbound = deliver(&ack, &mut c);
        assert_eq!(inbound.outcome, ApplyOutcome::NotAddressed);
    }

    #[test]
    fn edit_text_reconciles_whole_buffers() {
        let mut a = replica("s-aa");
        let mut stream = a.edit_text("hello");
        assert_eq!(stream.len(), 5);
        assert_eq!(a.text(), "hello");

        stream.extend(a.edit_text("help!"));
        assert_eq!(a.text(), "help!");
        stream.extend(a.edit_text("helpful"));
        assert_eq!(a.text(), "helpful");

        // A peer that applies the operation stream converges.
        let mut b = replica("s-bb");
        for envelope in &stream {
            deliver(envelope, &mut b);
        }
        assert_eq!(b.text(), "helpful");
    }

    #[test]
    fn restore_continues_the_character_counter() {
        let mut a = replica("s-aa");
        type_str(&mut a, "abc");
        a.local_delete(0);
        let snapshot = a.snapshot();

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: ReplicaSnapshot = serde_json::from_str(&json).unwrap();
        let mut restored =
            Replica::restore(SiteId::from("s-aa"), ReplicaConfig::default(), decoded).unwrap();
        assert_eq!(restored.text(), "bc");
        assert_eq!(restored.clock(), a.clock());

        // New characters must not collide with pre-restart identities.
        restored.local_insert(0, 'z');
        let ids: Vec<_> = restored
            .document()
            .records()
            .map(|record| record.id.clone())
            .collect();
        assert_eq!(ids.len(), 4);
        let fresh = ids
            .iter()
            .filter(|id| id.counter >= 3 && id.site == SiteId::from("s-aa"))
            .count();
        assert_eq!(fresh, 1);
    }

    #[test]
    fn presence_heartbeats_join_peers_and_silence_expires_them() {
        let mut a = replica("s-aa");
        let mut b = replica("s-bb");
        let hello = b.heartbeat();
        let inbound = deliver(&hello, &mut a);
        assert_eq!(inbound.outcome, ApplyOutcome::Applied);
        assert_eq!(
            inbound.events.as_slice(),
            &[Event::PeerJoined(SiteId::from("s-bb"))]
        );

        // Quiet for longer than the TTL: the peer is dropped.
        let mut left = Vec::new();
        let mut now = Instant::now();
        for _ in 0..=ReplicaConfig::default().peer_ttl_ticks + 1 {
            now += std::time::Duration::from_secs(60);
            left.extend(a.tick(now).events);
        }
        assert!(left.contains(&Event::PeerLeft(SiteId::from("s-bb"))));
    }
}
