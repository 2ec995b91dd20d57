//! Vector clocks and the "happened-before" order over them.
//!
//! A [[VectorClock]] is a partial mapping from [[SiteId]] to a monotone
//! counter; a missing entry is equivalent to zero. Clocks advance by local
//! increments and by componentwise-max merges of received clocks.

use crate::site::SiteId;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{cmp, collections::BTreeMap, fmt};

/// Establishes the "happened-before" order.
///
/// This is a form of partial order, but with an additional incomparable
/// variant of "concurrent": neither clock dominates the other.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HappenedBeforeOrdering {
    /// `a` happened strictly before `b`.
    Before,
    /// `a == b` (exactly at the same time).
    Equal,
    /// `a` happened strictly after `b`.
    After,
    /// `a` and `b` are concurrent.
    Concurrent,
}

impl HappenedBeforeOrdering {
    /// Reverses the ordering.
    ///
    /// - `Before` becomes `After`.
    /// - `After` becomes `Before`.
    /// - Everything else stays the same.
    pub const fn reverse(self) -> HappenedBeforeOrdering {
        match self {
            HappenedBeforeOrdering::Before => HappenedBeforeOrdering::After,
            HappenedBeforeOrdering::After => HappenedBeforeOrdering::Before,
            _ => self,
        }
    }
}

impl From<cmp::Ordering> for HappenedBeforeOrdering {
    fn from(value: cmp::Ordering) -> Self {
        match value {
            cmp::Ordering::Less => HappenedBeforeOrdering::Before,
            cmp::Ordering::Equal => HappenedBeforeOrdering::Equal,
            cmp::Ordering::Greater => HappenedBeforeOrdering::After,
        }
    }
}

impl From<HappenedBeforeOrdering> for Option<cmp::Ordering> {
    fn from(val: HappenedBeforeOrdering) -> Self {
        match val {
            HappenedBeforeOrdering::Before => Some(cmp::Ordering::Less),
            HappenedBeforeOrdering::Equal => Some(cmp::Ordering::Equal),
            HappenedBeforeOrdering::After => Some(cmp::Ordering::Greater),
            HappenedBeforeOrdering::Concurrent => None,
        }
    }
}

/// Trait for types that can establish a [happened-before order](HappenedBeforeOrdering).
///
/// The same rules as [[PartialOrd]] apply, with concurrent values being the
/// incomparable case.
pub trait HappenedBeforeOrd<Rhs = Self>: PartialEq<Rhs>
where
    Rhs: ?Sized,
{
    fn hb_cmp(&self, other: &Rhs) -> HappenedBeforeOrdering;
}

/// This is somewhat equivalent to a `Set<Ordering>`, just much more compact.
struct EncounteredOrderings {
    has_less: bool,
    has_greater: bool,
}

impl EncounteredOrderings {
    const fn none() -> Self {
        Self {
            has_less: false,
            has_greater: false,
        }
    }

    fn update(&mut self, ord: cmp::Ordering) {
        match ord {
            cmp::Ordering::Less => {
                self.has_less = true;
            }
            cmp::Ordering::Equal => (),
            cmp::Ordering::Greater => {
                self.has_greater = true;
            }
        }
    }

    const fn has_less_and_greater(&self) -> bool {
        self.has_less && self.has_greater
    }

    const fn to_hb(&self) -> HappenedBeforeOrdering {
        match (self.has_less, self.has_greater) {
            (true, true) => HappenedBeforeOrdering::Concurrent,
            (true, false) => HappenedBeforeOrdering::Before,
            (false, true) => HappenedBeforeOrdering::After,
            (false, false) => HappenedBeforeOrdering::Equal,
        }
    }
}

/// A version vector keyed by site id.
///
/// Sites join a document dynamically, so unlike a positional vector the
/// mapping representation never needs resizing coordination; any two clocks
/// are comparable. On the wire a clock is a JSON object mapping site id
/// strings to non-negative integers.
#[derive(Clone, Debug, Default, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    entries: BTreeMap<SiteId, u64>,
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        // A decoded clock may carry explicit zero entries; treat it the same
        // as one where the entry is simply absent.
        self.hb_cmp(other) == HappenedBeforeOrdering::Equal
    }
}

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The counter for `site`; zero if the site has never been observed.
    pub fn get(&self, site: &SiteId) -> u64 {
        self.entries.get(site).copied().unwrap_or(0)
    }

    /// Advances the component for `site` by one and returns the new value.
    pub fn increment(&mut self, site: &SiteId) -> u64 {
        let entry = self.entries.entry(site.clone()).or_insert(0);
        *entry = entry.checked_add(1).expect("Max version reached");
        *entry
    }

    /// Componentwise-max merge of `other` into this clock.
    pub fn merge(&mut self, other: &VectorClock) {
        for (site, &version) in other.entries.iter() {
            let entry = self.entries.entry(site.clone()).or_insert(0);
            *entry = (*entry).max(version);
        }
    }

    /// A fresh clock holding the merge of this clock and `other`.
    pub fn merged(&self, other: &VectorClock) -> VectorClock {
        let mut next = self.clone();
        next.merge(other);
        next
    }

    /// Whether every component of `other` is `<=` the matching component here.
    pub fn dominates(&self, other: &VectorClock) -> bool {
        other
            .entries
            .iter()
            .all(|(site, &version)| self.get(site) >= version)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in ascending site order.
    pub fn iter(&self) -> impl Iterator<Item = (&SiteId, u64)> {
        self.entries.iter().map(|(site, &version)| (site, version))
    }

    pub fn sites(&self) -> impl Iterator<Item = &SiteId> {
        self.entries.keys()
    }
}

impl<const N: usize> From<[(SiteId, u64); N]> for VectorClock {
    fn from(entries: [(SiteId, u64); N]) -> Self {
        Self {
            entries: BTreeMap::from(entries),
        }
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "〈{}〉",
            self.entries
                .iter()
                .map(|(site, version)| format!("{site}:{version}"))
                .join(", ")
        )
    }
}

impl HappenedBeforeOrd for VectorClock {
    fn hb_cmp(&self, other: &Self) -> HappenedBeforeOrdering {
        let mut orderings = EncounteredOrderings::none();
        for site in self.entries.keys().merge(other.entries.keys()).dedup() {
            orderings.update(self.get(site).cmp(&other.get(site)));
            if orderings.has_less_and_greater() {
                // We can stop checking early in this case.
                return HappenedBeforeOrdering::Concurrent;
            }
        }
        orderings.to_hb()
    }
}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        self.hb_cmp(other).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BEFORE: HappenedBeforeOrdering = HappenedBeforeOrdering::Before;
    const AFTER: HappenedBeforeOrdering = HappenedBeforeOrdering::After;
    const EQUAL: HappenedBeforeOrdering = HappenedBeforeOrdering::Equal;
    const CONCURRENT: HappenedBeforeOrdering = HappenedBeforeOrdering::Concurrent;

    fn vc(entries: &[(&str, u64)]) -> VectorClock {
        let mut clock = VectorClock::new();
        for (site, version) in entries {
            let site = SiteId::from(*site);
            for _ in 0..*version {
                clock.increment(&site);
            }
        }
        clock
    }

    #[test]
    fn missing_entries_read_as_zero() {
        let clock = vc(&[("a", 2)]);
        assert_eq!(clock.get(&SiteId::from("a")), 2);
        assert_eq!(clock.get(&SiteId::from("zzz")), 0);
    }

    #[test]
    fn basic_relationships() {
        assert_eq!(vc(&[]).hb_cmp(&vc(&[])), EQUAL);
        assert_eq!(vc(&[("a", 1)]).hb_cmp(&vc(&[("a", 1)])), EQUAL);
        assert_eq!(vc(&[("a", 1)]).hb_cmp(&vc(&[("a", 2)])), BEFORE);
        assert_eq!(vc(&[("a", 3)]).hb_cmp(&vc(&[("a", 2)])), AFTER);
        assert_eq!(vc(&[]).hb_cmp(&vc(&[("a", 1)])), BEFORE);
        assert_eq!(
            vc(&[("a", 1), ("b", 2)]).hb_cmp(&vc(&[("a", 1), ("b", 3)])),
            BEFORE
        );
        assert_eq!(vc(&[("a", 1)]).hb_cmp(&vc(&[("b", 1)])), CONCURRENT);
        assert_eq!(
            vc(&[("a", 2), ("b", 1)]).hb_cmp(&vc(&[("a", 1), ("b", 2)])),
            CONCURRENT
        );
    }

    #[test]
    fn merge_takes_componentwise_max() {
        let mut left = vc(&[("a", 3), ("b", 1)]);
        left.merge(&vc(&[("b", 4), ("c", 2)]));
        assert_eq!(left, vc(&[("a", 3), ("b", 4), ("c", 2)]));
    }

    #[test]
    fn dominates_matches_hb() {
        let big = vc(&[("a", 2), ("b", 2)]);
        let small = vc(&[("a", 1)]);
        assert!(big.dominates(&small));
        assert!(!small.dominates(&big));
        assert!(big.dominates(&big));
    }

    #[test]
    fn display_uses_angle_brackets() {
        assert_eq!(vc(&[("a", 1), ("b", 2)]).to_string(), "〈a:1, b:2〉");
        assert_eq!(vc(&[]).to_string(), "〈〉");
    }

    #[test]
    fn serializes_as_plain_object() {
        let clock = vc(&[("b", 2), ("a", 1)]);
        let json = serde_json::to_string(&clock).unwrap();
        assert_eq!(json, r#"{"a":1,"b":2}"#);
        let back: VectorClock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, clock);
    }

    fn clock_strategy() -> impl Strategy<Value = VectorClock> {
        prop::collection::btree_map("[a-d]", 0u64..20, 0..4).prop_map(|entries| {
            let mut clock = VectorClock::new();
            for (site, version) in entries {
                let site = SiteId::from(site.as_str());
                for _ in 0..version {
                    clock.increment(&site);
                }
            }
            clock
        })
    }

    proptest! {
        #[test]
        fn clock_invariants(
            v1 in clock_strategy(),
            v2 in clock_strategy(),
            v3 in clock_strategy(),
            site in "[a-d]",
        ) {
            let site = SiteId::from(site.as_str());

            // Reflexive.
            prop_assert_eq!(v1.hb_cmp(&v1), EQUAL);

            // Antisymmetric.
            prop_assert_eq!(v1.hb_cmp(&v2), v2.hb_cmp(&v1).reverse());

            // Equality agrees with the happened-before order.
            prop_assert_eq!(v1 == v2, v1.hb_cmp(&v2) == EQUAL);

            // Transitive.
            if v1.hb_cmp(&v2) == BEFORE && v2.hb_cmp(&v3) == BEFORE {
                prop_assert_eq!(v1.hb_cmp(&v3), BEFORE);
            }

            // An increment is strictly after the original.
            let mut next = v1.clone();
            next.increment(&site);
            prop_assert_eq!(v1.hb_cmp(&next), BEFORE);
            prop_assert_eq!(next.hb_cmp(&v1), AFTER);

            // A merge dominates both inputs and only moves forward.
            let merged = v1.merged(&v2);
            prop_assert!(merged.dominates(&v1));
            prop_assert!(merged.dominates(&v2));
            prop_assert_ne!(merged.hb_cmp(&v1), BEFORE);

            // Dominance is the non-strict side of happened-before.
            let le = matches!(v2.hb_cmp(&v1), BEFORE | EQUAL);
            prop_assert_eq!(v1.dominates(&v2), le);
        }
    }
}
