//! The wire unit exchanged between replicas.
//!
//! An [[Envelope]] carries one of four payloads: an operation (insert or
//! delete), an acknowledgement, a cursor report, or a presence heartbeat.
//! The encoding is the self-describing JSON shape of the protocol: clocks
//! are objects mapping site id strings to integers, character ids are the
//! textual `"<site>-<counter>"` form, and the target is either the string
//! `"broadcast"` or a site id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de, ser};
use snafu::{ResultExt, Snafu};
use std::fmt;
use weftsync_core::{CharId, SiteId, VectorClock};
use weftsync_data_types::text::CharRecord;

/// A message identifier unique across all replicas and time.
///
/// Built from the originating site, the wall clock, and a random salt; the
/// protocol itself treats it as opaque.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate(site: &SiteId) -> Self {
        Self(format!(
            "{site}:{}:{}",
            Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four envelope kinds of the protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Operation,
    Ack,
    Cursor,
    Presence,
}

impl EnvelopeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EnvelopeKind::Operation => "operation",
            EnvelopeKind::Ack => "ack",
            EnvelopeKind::Cursor => "cursor",
            EnvelopeKind::Presence => "presence",
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who an envelope is addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Broadcast,
    Site(SiteId),
}

impl Target {
    pub fn includes(&self, site: &SiteId) -> bool {
        match self {
            Target::Broadcast => true,
            Target::Site(addressee) => addressee == site,
        }
    }
}

impl Serialize for Target {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match self {
            Target::Broadcast => serializer.serialize_str("broadcast"),
            Target::Site(site) => site.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Ok(match text.as_str() {
            "broadcast" => Target::Broadcast,
            _ => Target::Site(SiteId::from(text)),
        })
    }
}

/// A character record as it travels inside an insert operation.
///
/// Deliberately redundant: `origin_site` repeats `id`'s site so that a
/// reader of the raw wire never has to parse the id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub value: char,
    pub id: CharId,
    pub origin_site: SiteId,
    pub origin_clock: VectorClock,
    pub visible: bool,
}

impl WireRecord {
    pub fn into_record(self) -> CharRecord {
        CharRecord::restore(
            self.value,
            self.id,
            self.origin_clock,
            self.visible,
            Vec::new(),
        )
    }
}

impl From<&CharRecord> for WireRecord {
    fn from(record: &CharRecord) -> Self {
        Self {
            value: record.value,
            id: record.id.clone(),
            origin_site: record.id.site.clone(),
            origin_clock: record.origin_clock.clone(),
            visible: record.visible(),
        }
    }
}

/// A document mutation, as issued by one replica.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Insert {
        /// The visible position targeted on the issuing replica.
        position: u32,
        /// The issuing replica's clock at the time of issue.
        clock: VectorClock,
        record: WireRecord,
    },
    Delete {
        position: u32,
        clock: VectorClock,
        target_id: CharId,
    },
}

impl Operation {
    pub fn clock(&self) -> &VectorClock {
        match self {
            Operation::Insert { clock, .. } => clock,
            Operation::Delete { clock, .. } => clock,
        }
    }

    pub fn position(&self) -> u32 {
        match self {
            Operation::Insert { position, .. } => *position,
            Operation::Delete { position, .. } => *position,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ack_id: MessageId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorReport {
    pub position: u32,
    pub selection: Option<(u32, u32)>,
    pub clock: VectorClock,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    /// Opaque session identifier, stable for the lifetime of a replica.
    pub session: String,
    /// Sender wall clock, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Presence {
    pub fn now(session: String) -> Self {
        Self {
            session,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// The payload of an [[Envelope]], dispatched on by kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Operation(Operation),
    Ack(Ack),
    Cursor(CursorReport),
    Presence(Presence),
}

impl Payload {
    pub const fn kind(&self) -> EnvelopeKind {
        match self {
            Payload::Operation(_) => EnvelopeKind::Operation,
            Payload::Ack(_) => EnvelopeKind::Ack,
            Payload::Cursor(_) => EnvelopeKind::Cursor,
            Payload::Presence(_) => EnvelopeKind::Presence,
        }
    }
}

/// The wire unit: one payload plus its routing metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub message_id: MessageId,
    pub origin_site: SiteId,
    pub target: Target,
    pub send_time: DateTime<Utc>,
    pub payload: Payload,
}

impl Envelope {
    /// A broadcast envelope with a fresh message id.
    pub fn broadcast(origin_site: SiteId, payload: Payload) -> Self {
        let message_id = MessageId::generate(&origin_site);
        Self {
            message_id,
            origin_site,
            target: Target::Broadcast,
            send_time: Utc::now(),
            payload,
        }
    }

    /// An envelope addressed to a single site, with a fresh message id.
    pub fn to_site(origin_site: SiteId, target: SiteId, payload: Payload) -> Self {
        let message_id = MessageId::generate(&origin_site);
        Self {
            message_id,
            origin_site,
            target: Target::Site(target),
            send_time: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.payload.kind()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).context(EncodeSnafu)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let raw: RawEnvelope = serde_json::from_slice(bytes).context(DecodeSnafu)?;
        let payload = match raw.kind.as_str() {
            "operation" => {
                Payload::Operation(serde_json::from_value(raw.payload).context(DecodeSnafu)?)
            }
            "ack" => Payload::Ack(serde_json::from_value(raw.payload).context(DecodeSnafu)?),
            "cursor" => Payload::Cursor(serde_json::from_value(raw.payload).context(DecodeSnafu)?),
            "presence" => {
                Payload::Presence(serde_json::from_value(raw.payload).context(DecodeSnafu)?)
            }
            unknown => {
                return UnknownKindSnafu {
                    kind: unknown.to_string(),
                }
                .fail();
            }
        };
        Ok(Self {
            message_id: raw.message_id,
            origin_site: raw.origin_site,
            target: raw.target,
            send_time: raw.send_time,
            payload,
        })
    }
}

impl Serialize for Envelope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        use ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Envelope", 6)?;
        state.serialize_field("kind", self.kind().as_str())?;
        state.serialize_field("message_id", &self.message_id)?;
        state.serialize_field("origin_site", &self.origin_site)?;
        state.serialize_field("target", &self.target)?;
        state.serialize_field("send_time", &self.send_time)?;
        match &self.payload {
            Payload::Operation(operation) => state.serialize_field("payload", operation)?,
            Payload::Ack(ack) => state.serialize_field("payload", ack)?,
            Payload::Cursor(cursor) => state.serialize_field("payload", cursor)?,
            Payload::Presence(presence) => state.serialize_field("payload", presence)?,
        }
        state.end()
    }
}

/// The shape-only half of decoding; the payload is dispatched by kind.
#[derive(Deserialize)]
struct RawEnvelope {
    kind: String,
    message_id: MessageId,
    origin_site: SiteId,
    target: Target,
    send_time: DateTime<Utc>,
    payload: serde_json::Value,
}

#[derive(Debug, Snafu)]
pub enum WireError {
    #[snafu(display("Envelope bytes did not parse"))]
    Decode { source: serde_json::Error },
    #[snafu(display("Envelope carried unknown kind '{kind}'"))]
    UnknownKind { kind: String },
    #[snafu(display("Envelope failed to encode"))]
    Encode { source: serde_json::Error },
}
