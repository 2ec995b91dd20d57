//! Remote caret tracking.
//!
//! Each peer's last cursor report is kept per site (newest report wins) and
//! translated into the local document by replaying the operations the
//! report could not have known about yet.

use ahash::AHashMap;
use weftsync_core::{HappenedBeforeOrd, HappenedBeforeOrdering, SiteId, VectorClock};
use weftsync_messages::CursorReport;

/// One operation as it applied to the local document.
#[derive(Clone, Debug, PartialEq)]
pub struct LoggedOp {
    pub kind: LoggedOpKind,
    /// The visible position the operation took effect at, locally.
    pub position: u32,
    pub clock: VectorClock,
    pub origin: SiteId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoggedOpKind {
    Insert,
    Delete,
}

/// The append-only log of applied operations, pruned once causally stable.
#[derive(Debug, Default)]
pub struct OpLog {
    entries: Vec<LoggedOp>,
}

impl OpLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: LoggedOpKind, position: u32, clock: VectorClock, origin: SiteId) {
        self.entries.push(LoggedOp {
            kind,
            position,
            clock,
            origin,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoggedOp> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops entries for which `prunable` holds; returns how many went.
    pub fn prune<F>(&mut self, prunable: F) -> usize
    where
        F: Fn(&LoggedOp) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|entry| !prunable(entry));
        before - self.entries.len()
    }
}

/// Translates `report` (sent by `reporter`) into the current document.
///
/// Only operations strictly after the report's clock move the caret; a
/// concurrent operation's effect on the peer's intent is unknown, and the
/// reporter's own operations are already reflected in its next report, so
/// both leave the caret where it was. Insertions at or before the caret
/// shift it right; deletions strictly before it shift it left, floored at
/// zero. The result is clamped to the visible length.
pub fn transform(
    report: &CursorReport,
    reporter: &SiteId,
    log: &OpLog,
    visible_len: u32,
) -> (u32, Option<(u32, u32)>) {
    let mut position = report.position;
    let mut selection = report.selection;
    for op in log.iter() {
        if &op.origin == reporter {
            continue;
        }
        if report.clock.hb_cmp(&op.clock) != HappenedBeforeOrdering::Before {
            continue;
        }
        position = shift(position, op);
        selection = selection.map(|(start, end)| (shift(start, op), shift(end, op)));
    }
    let clamp = |p: u32| p.min(visible_len);
    (
        clamp(position),
        selection.map(|(start, end)| (clamp(start), clamp(end))),
    )
}

fn shift(position: u32, op: &LoggedOp) -> u32 {
    match op.kind {
        LoggedOpKind::Insert if op.position <= position => position + 1,
        LoggedOpKind::Delete if op.position < position => position - 1,
        _ => position,
    }
}

/// The last cursor report of every known peer.
#[derive(Debug, Default)]
pub struct CursorRegistry {
    reports: AHashMap<SiteId, CursorReport>,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `report` for `site` unless the held report is newer.
    ///
    /// Returns whether the report was stored.
    pub fn update(&mut self, site: SiteId, report: CursorReport) -> bool {
        match self.reports.get(&site) {
            Some(held)
                if report.clock.hb_cmp(&held.clock) == HappenedBeforeOrdering::Before =>
            {
                false
            }
            _ => {
                self.reports.insert(site, report);
                true
            }
        }
    }

    pub fn get(&self, site: &SiteId) -> Option<&CursorReport> {
        self.reports.get(site)
    }

    pub fn remove(&mut self, site: &SiteId) {
        self.reports.remove(site);
    }

    pub fn sites(&self) -> impl Iterator<Item = &SiteId> {
        self.reports.keys()
    }
}
