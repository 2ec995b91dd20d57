use serde::{Deserialize, Serialize, de, ser};
use snafu::{OptionExt, ResultExt, Snafu};
use std::{fmt, str::FromStr};

/// The opaque identifier of a single replica.
///
/// Site ids are immutable byte strings, compared lexicographically. They are
/// chosen once per replica at startup and never reused within a document's
/// history. On the wire a site id is a bare string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(Box<str>);

impl SiteId {
    /// Produces a fresh, globally unique site id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string().into_boxed_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SiteId {
    fn from(value: &str) -> Self {
        Self(Box::<str>::from(value))
    }
}
impl From<String> for SiteId {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}
impl AsRef<str> for SiteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl fmt::Debug for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A bit shorter than the full generated Debug.
        write!(f, "s\"{}\"", self.0)
    }
}
impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The globally unique, immutable identity of a single character.
///
/// Formed from the originating site and that site's per-character counter.
/// The counter is independent of the vector clock; it only ever moves
/// forward on its origin replica.
///
/// The textual (and wire) form is the concatenation `"<site>-<counter>"`.
/// Since site ids may themselves contain dashes, parsing splits on the
/// *last* dash.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CharId {
    pub site: SiteId,
    pub counter: u64,
}

impl CharId {
    pub const fn new(site: SiteId, counter: u64) -> Self {
        Self { site, counter }
    }
}

impl fmt::Display for CharId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.site, self.counter)
    }
}

#[derive(Debug, Snafu, PartialEq)]
pub enum ParseCharIdError {
    #[snafu(display("Character id '{input}' has no site/counter separator"))]
    MissingSeparator { input: String },
    #[snafu(display("Character id '{input}' has a malformed counter"))]
    InvalidCounter {
        input: String,
        source: std::num::ParseIntError,
    },
}

impl FromStr for CharId {
    type Err = ParseCharIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (site, counter) = s.rsplit_once('-').context(MissingSeparatorSnafu {
            input: s.to_string(),
        })?;
        let counter = counter.parse::<u64>().context(InvalidCounterSnafu {
            input: s.to_string(),
        })?;
        Ok(Self {
            site: SiteId::from(site),
            counter,
        })
    }
}

impl Serialize for CharId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CharId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn site_ids_compare_lexicographically() {
        assert!(SiteId::from("s-aa") < SiteId::from("s-bb"));
        assert!(SiteId::from("s-b") < SiteId::from("s-ba"));
        assert_eq!(SiteId::from("s-aa"), SiteId::from("s-aa"));
    }

    #[test]
    fn generated_site_ids_are_distinct() {
        assert_ne!(SiteId::generate(), SiteId::generate());
    }

    #[test]
    fn char_id_textual_form() {
        let id = CharId::new(SiteId::from("s-aa"), 7);
        assert_eq!(id.to_string(), "s-aa-7");
        assert_eq!("s-aa-7".parse::<CharId>().unwrap(), id);
    }

    #[test]
    fn char_id_parse_splits_on_last_dash() {
        let id: CharId = "a-b-c-12".parse().unwrap();
        assert_eq!(id.site, SiteId::from("a-b-c"));
        assert_eq!(id.counter, 12);
    }

    #[test]
    fn char_id_parse_rejects_garbage() {
        assert!(matches!(
            "nodash".parse::<CharId>(),
            Err(ParseCharIdError::MissingSeparator { .. })
        ));
        assert!(matches!(
            "site-notanumber".parse::<CharId>(),
            Err(ParseCharIdError::InvalidCounter { .. })
        ));
    }

    #[test]
    fn char_id_orders_by_site_then_counter() {
        let a1 = CharId::new(SiteId::from("s-aa"), 9);
        let a2 = CharId::new(SiteId::from("s-aa"), 10);
        let b = CharId::new(SiteId::from("s-bb"), 1);
        assert!(a1 < a2);
        assert!(a2 < b);
    }

    #[test]
    fn char_id_serializes_as_string() {
        let id = CharId::new(SiteId::from("s-aa"), 3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"s-aa-3\"");
        let back: CharId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    proptest! {
        #[test]
        fn char_id_roundtrips(site in "[a-z0-9-]{1,12}", counter in any::<u64>()) {
            let id = CharId::new(SiteId::from(site.as_str()), counter);
            let parsed: CharId = id.to_string().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }
    }
}
