//! Entity definitions: tags and tagged pages.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Common surface of every entity the merge engine can reconcile.
pub trait Entity {
    /// Returns the unique id of this entity.
    fn id(&self) -> &str;

    /// Returns the time of the last write to this entity.
    fn updated_at(&self) -> Timestamp;

    /// Returns true if a remote replica marked this entity deleted.
    fn is_deleted(&self) -> bool;
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A tag.
///
/// Locally-deleted tags are removed from the collection outright (with a
/// tombstone recorded); the `deleted` flag only appears on entities echoed
/// back by the remote replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional display color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last write time.
    pub updated_at: Timestamp,
    /// Remote-originated soft-delete marker.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl Entity for Tag {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Input for creating a tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTag {
    /// Display name; must not be blank.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional display color.
    #[serde(default)]
    pub color: Option<String>,
}

/// Partial update for a tag. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPatch {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New display color.
    #[serde(default)]
    pub color: Option<String>,
}

impl TagPatch {
    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.color.is_none()
    }
}

/// A tagged page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Unique id.
    pub id: String,
    /// Page URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Host the URL points at.
    pub domain: String,
    /// Ids of the tags attached to this page. Order is irrelevant.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last write time.
    pub updated_at: Timestamp,
    /// Remote-originated soft-delete marker.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    /// Optional favicon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for Page {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Input for creating a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPage {
    /// Page URL; must not be blank.
    pub url: String,
    /// Page title; defaults to the URL when blank.
    #[serde(default)]
    pub title: String,
    /// Ids of tags to attach on creation.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Optional favicon URL.
    #[serde(default)]
    pub favicon: Option<String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update for a page. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePatch {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// Replacement tag set.
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    /// New favicon URL.
    #[serde(default)]
    pub favicon: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
}

impl PagePatch {
    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.tags.is_none()
            && self.favicon.is_none()
            && self.description.is_none()
    }
}

/// Extracts the host portion of a URL, without any external URL parser.
///
/// Falls back to the input itself when no scheme separator is present.
#[must_use]
pub(crate) fn domain_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(rest);
    // Strip userinfo and port.
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    let host = host.split_once(':').map_or(host, |(h, _)| h);
    host.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_wire_shape() {
        let tag = Tag {
            id: "t1".into(),
            name: "rust".into(),
            description: None,
            color: Some("#dea584".into()),
            created_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(2000),
            deleted: false,
        };

        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["id"], "t1");
        assert_eq!(json["createdAt"], 1000);
        assert_eq!(json["updatedAt"], 2000);
        // `deleted: false` and empty options are omitted from the record.
        assert!(json.get("deleted").is_none());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn tag_deleted_flag_roundtrip() {
        let json = r#"{"id":"t1","name":"x","createdAt":1,"updatedAt":2,"deleted":true}"#;
        let tag: Tag = serde_json::from_str(json).unwrap();
        assert!(tag.is_deleted());

        let json = r#"{"id":"t1","name":"x","createdAt":1,"updatedAt":2}"#;
        let tag: Tag = serde_json::from_str(json).unwrap();
        assert!(!tag.is_deleted());
    }

    #[test]
    fn page_tags_are_a_set() {
        let json = r#"{"id":"p1","url":"https://example.com","title":"Example",
                       "domain":"example.com","tags":["b","a","b"],
                       "createdAt":1,"updatedAt":2}"#;
        let page: Page = serde_json::from_str(json).unwrap();
        assert_eq!(page.tags.len(), 2);
        assert!(page.tags.contains("a"));
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("https://example.com/a/b?q=1"), "example.com");
        assert_eq!(domain_of("http://user@host.net:8080/x"), "host.net");
        assert_eq!(domain_of("example.org"), "example.org");
        assert_eq!(domain_of("https://sub.example.com#frag"), "sub.example.com");
    }

    #[test]
    fn empty_patches() {
        assert!(TagPatch::default().is_empty());
        assert!(PagePatch::default().is_empty());
        assert!(!TagPatch {
            name: Some("renamed".into()),
            ..TagPatch::default()
        }
        .is_empty());
    }
}
