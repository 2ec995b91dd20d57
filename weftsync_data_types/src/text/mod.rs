mod document;
pub use document::{
    CharRecord, DeleteOutcome, Document, DocumentSnapshot, GcSweep, IntegrateOutcome,
    SnapshotError, character_order,
};
/// Simple diffs on plain old strings.
mod text_diff;
pub use text_diff::{TextChange, apply_text_diff, diff};
