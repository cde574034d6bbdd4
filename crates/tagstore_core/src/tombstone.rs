//! Pending-delete tombstones and the ledger that tracks them.

use crate::types::EntityKind;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A marker recording that an entity was deleted locally and the deletion
/// has not yet been confirmed by the remote replica.
///
/// Serialized in the wire form `"<type>:<id>"` (`tag:` or `page:`), the
/// format the persisted snapshot uses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tombstone {
    /// Kind of the deleted entity.
    pub kind: EntityKind,
    /// Id of the deleted entity.
    pub id: String,
}

impl Tombstone {
    /// Creates a tombstone for an entity.
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Creates a tag tombstone.
    #[must_use]
    pub fn tag(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Tag, id)
    }

    /// Creates a page tombstone.
    #[must_use]
    pub fn page(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Page, id)
    }
}

impl fmt::Display for Tombstone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for Tombstone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("tombstone {s:?} is missing the ':' separator"))?;
        let kind = EntityKind::parse(kind)
            .ok_or_else(|| format!("unknown tombstone kind {kind:?}"))?;
        if id.is_empty() {
            return Err(format!("tombstone {s:?} has an empty id"));
        }
        Ok(Self::new(kind, id))
    }
}

impl Serialize for Tombstone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tombstone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// The set of pending-delete markers.
///
/// A tombstone is recorded inside the same atomic commit as the local
/// delete, and cleared only once a sync cycle confirms the remote replica
/// applied the deletion or observes that it never held the id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TombstoneLedger {
    pending: BTreeSet<Tombstone>,
}

impl TombstoneLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pending deletion. Idempotent.
    ///
    /// Returns true if the tombstone was not already present.
    pub fn record(&mut self, kind: EntityKind, id: impl Into<String>) -> bool {
        self.pending.insert(Tombstone::new(kind, id))
    }

    /// Clears a tombstone once the remote has confirmed the deletion.
    ///
    /// Returns true if the tombstone was present.
    pub fn clear(&mut self, tombstone: &Tombstone) -> bool {
        self.pending.remove(tombstone)
    }

    /// Returns true if a deletion of this entity is still pending.
    #[must_use]
    pub fn is_pending(&self, kind: EntityKind, id: &str) -> bool {
        self.pending
            .contains(&Tombstone::new(kind, id))
    }

    /// Iterates over pending tombstones in order.
    pub fn iter(&self) -> impl Iterator<Item = &Tombstone> {
        self.pending.iter()
    }

    /// Returns the number of pending tombstones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no deletions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_wire_form() {
        let t = Tombstone::tag("t1");
        assert_eq!(t.to_string(), "tag:t1");

        let p: Tombstone = "page:p9".parse().unwrap();
        assert_eq!(p, Tombstone::page("p9"));
    }

    #[test]
    fn tombstone_parse_rejects_garbage() {
        assert!("".parse::<Tombstone>().is_err());
        assert!("t1".parse::<Tombstone>().is_err());
        assert!("bookmark:t1".parse::<Tombstone>().is_err());
        assert!("tag:".parse::<Tombstone>().is_err());
    }

    #[test]
    fn tombstone_id_may_contain_colons() {
        // Only the first ':' separates kind from id.
        let t: Tombstone = "page:urn:x:1".parse().unwrap();
        assert_eq!(t.id, "urn:x:1");
        assert_eq!(t.to_string(), "page:urn:x:1");
    }

    #[test]
    fn tombstone_serde_as_string() {
        let json = serde_json::to_string(&Tombstone::tag("t1")).unwrap();
        assert_eq!(json, "\"tag:t1\"");

        let back: Tombstone = serde_json::from_str("\"page:p2\"").unwrap();
        assert_eq!(back, Tombstone::page("p2"));
    }

    #[test]
    fn ledger_record_is_idempotent() {
        let mut ledger = TombstoneLedger::new();
        assert!(ledger.record(EntityKind::Tag, "t1"));
        assert!(!ledger.record(EntityKind::Tag, "t1"));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_pending(EntityKind::Tag, "t1"));
    }

    #[test]
    fn ledger_kinds_do_not_collide() {
        let mut ledger = TombstoneLedger::new();
        ledger.record(EntityKind::Tag, "x");
        assert!(ledger.is_pending(EntityKind::Tag, "x"));
        assert!(!ledger.is_pending(EntityKind::Page, "x"));
    }

    #[test]
    fn ledger_clear() {
        let mut ledger = TombstoneLedger::new();
        ledger.record(EntityKind::Page, "p1");

        assert!(ledger.clear(&Tombstone::page("p1")));
        assert!(!ledger.clear(&Tombstone::page("p1")));
        assert!(ledger.is_empty());
    }

    #[test]
    fn ledger_serializes_as_string_array() {
        let mut ledger = TombstoneLedger::new();
        ledger.record(EntityKind::Tag, "t1");
        ledger.record(EntityKind::Page, "p1");

        let json = serde_json::to_string(&ledger).unwrap();
        assert_eq!(json, "[\"page:p1\",\"tag:t1\"]");

        let back: TombstoneLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
    }
}
