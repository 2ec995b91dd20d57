//! The replica state machine of the weftsync editing core.
//!
//! A [[Replica]] owns one copy of the shared document, tracks causality with
//! a vector clock, and speaks the envelope protocol: operations out with
//! at-least-once delivery, operations in with dedup and out-of-order
//! tolerance, plus cursor reports and presence heartbeats. The host drives
//! it with discrete events (local edits, received envelope bytes, timer
//! ticks), each processed to completion.

pub mod cursors;
pub mod delivery;
pub mod replica;

pub use delivery::RetryPolicy;
pub use replica::{
    ApplyOutcome, Event, GcReport, Inbound, Replica, ReplicaConfig, ReplicaSnapshot, Stats, Tick,
};
