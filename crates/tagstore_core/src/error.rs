//! Error types for tagstore core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
///
/// Validation and not-found errors abort a command before any commit, so
/// they have zero durable side effects. `Persistence` means the commit
/// write itself failed: in-memory state may have changed but the persisted
/// view stays authoritative, so the caller must treat the operation as
/// failed and retry.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad input; rejected before any state mutation.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// A referenced tag does not exist.
    #[error("tag not found: {id}")]
    TagNotFound {
        /// The missing tag id.
        id: String,
    },

    /// A referenced page does not exist.
    #[error("page not found: {id}")]
    PageNotFound {
        /// The missing page id.
        id: String,
    },

    /// A tag with this name already exists.
    #[error("duplicate tag name: {name:?}")]
    DuplicateTagName {
        /// The conflicting name.
        name: String,
    },

    /// The backing-store write failed during commit.
    #[error("persistence error: {0}")]
    Persistence(#[from] tagstore_storage::StorageError),

    /// A persisted snapshot could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a tag-not-found error.
    pub fn tag_not_found(id: impl Into<String>) -> Self {
        Self::TagNotFound { id: id.into() }
    }

    /// Creates a page-not-found error.
    pub fn page_not_found(id: impl Into<String>) -> Self {
        Self::PageNotFound { id: id.into() }
    }

    /// Creates a duplicate-tag-name error.
    pub fn duplicate_tag_name(name: impl Into<String>) -> Self {
        Self::DuplicateTagName { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            CoreError::tag_not_found("t1").to_string(),
            "tag not found: t1"
        );
        assert!(CoreError::duplicate_tag_name("rust")
            .to_string()
            .contains("rust"));
    }
}
