//! Registry inventory records and deletion candidates.

use chrono::{DateTime, Utc};
use std::fmt;

/// A repository as listed by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub uri: String,
}

/// One stored image revision, identified by its digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub repository_name: String,
    pub repository_uri: String,
    pub digest: String,
    /// Tags in the order the registry returned them; empty when untagged
    pub tags: Vec<String>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,
}

impl ImageRecord {
    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Stable single-string rendering of all tags, e.g. `[v1 latest]`
    pub fn joined_tags(&self) -> String {
        format!("[{}]", self.tags.join(" "))
    }
}

/// Why an image was selected for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    Untagged,
    NotInUse,
    /// In use, but older than the protected newest images
    InUseBeyondLatest,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SelectionReason::Untagged => "untagged",
            SelectionReason::NotInUse => "not in use",
            SelectionReason::InUseBeyondLatest => "in use, beyond protected latest",
        };
        f.write_str(label)
    }
}

/// An image digest selected for deletion in the current run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub repository_name: String,
    pub repository_uri: String,
    pub digest: String,
    /// Representative tag (first tag), empty for untagged images
    pub tag: String,
    /// Every tag on the digest; deleting by digest removes all of them
    pub all_tags: Vec<String>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,
    pub reason: SelectionReason,
}

impl Candidate {
    pub fn from_record(record: &ImageRecord, reason: SelectionReason) -> Self {
        Candidate {
            repository_name: record.repository_name.clone(),
            repository_uri: record.repository_uri.clone(),
            digest: record.digest.clone(),
            tag: record.tags.first().cloned().unwrap_or_default(),
            all_tags: record.tags.clone(),
            pushed_at: record.pushed_at,
            size_bytes: record.size_bytes,
            reason,
        }
    }

    pub fn is_untagged(&self) -> bool {
        self.tag.is_empty()
    }

    /// Tag for the delete call, `None` for untagged images
    pub fn delete_tag(&self) -> Option<&str> {
        if self.tag.is_empty() {
            None
        } else {
            Some(&self.tag)
        }
    }
}
