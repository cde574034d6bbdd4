//! Core type definitions for tagstore.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond-precision wall-clock timestamp.
///
/// Timestamps order writes to an entity: every mutation stamps
/// `updated_at`, and the merge engine resolves concurrent versions by
/// picking the larger one. Serialized as a plain number on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    /// Returns a write stamp that never moves backwards relative to `self`.
    ///
    /// `updated_at` must never decrease across successive writes to the
    /// same id, even when the wall clock steps back.
    #[must_use]
    pub fn advanced_to(self, now: Timestamp) -> Self {
        if now.0 > self.0 {
            now
        } else {
            self
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// The kind of an entity, used to key tombstones.
///
/// A tagged sum rather than a bare string so the merge engine and ledger
/// can match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// A tag.
    Tag,
    /// A tagged page.
    Page,
}

impl EntityKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Tag => "tag",
            EntityKind::Page => "page",
        }
    }

    /// Parses a wire name back into a kind.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tag" => Some(EntityKind::Tag),
            "page" => Some(EntityKind::Page),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_ordering() {
        let t1 = Timestamp::from_millis(1000);
        let t2 = Timestamp::from_millis(2000);
        assert!(t1 < t2);
    }

    #[test]
    fn timestamp_never_decreases() {
        let prev = Timestamp::from_millis(5000);

        // Clock moved forward: take the new value.
        assert_eq!(
            prev.advanced_to(Timestamp::from_millis(6000)),
            Timestamp::from_millis(6000)
        );

        // Clock stepped back: hold the previous stamp.
        assert_eq!(prev.advanced_to(Timestamp::from_millis(4000)), prev);
        assert_eq!(prev.advanced_to(prev), prev);
    }

    #[test]
    fn timestamp_now_is_nonzero() {
        assert!(Timestamp::now().as_millis() > 0);
    }

    #[test]
    fn timestamp_serializes_as_number() {
        let json = serde_json::to_string(&Timestamp::from_millis(1234)).unwrap();
        assert_eq!(json, "1234");
    }

    #[test]
    fn entity_kind_roundtrip() {
        assert_eq!(EntityKind::parse("tag"), Some(EntityKind::Tag));
        assert_eq!(EntityKind::parse("page"), Some(EntityKind::Page));
        assert_eq!(EntityKind::parse("bookmark"), None);
        assert_eq!(format!("{}", EntityKind::Page), "page");
    }
}
