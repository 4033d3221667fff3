//! Deletion candidate selection.
//!
//! Given one repository's inventory, decides which digests are safe to delete:
//!
//! 1. Untagged images are always candidates.
//! 2. Tagged images whose tags match the hold expression are never candidates.
//! 3. With in-use protection on, a tagged image is in use when any of its tags appears in
//!    the [`InUseSet`]. The newest `protect_latest` in-use images are kept for rollback;
//!    older in-use images are candidates.
//! 4. Everything else is a candidate.
//!
//! The result lists untagged and not-in-use images in inventory order, followed by the
//! in-use images beyond the protected newest ones (newest first).

use crate::image::{Candidate, ImageRecord, SelectionReason};
use crate::inuse::InUseSet;
use crate::patterns::CompositePattern;
use crate::reference::normalize;

use tracing::debug;

/// Rules that keep images out of the candidate list
#[derive(Debug, Clone)]
pub struct ProtectionPolicy {
    pub hold_tags: CompositePattern,
    pub target_repos: CompositePattern,
    pub exclude_repos: Option<CompositePattern>,
    /// Number of newest in-use images kept per repository
    pub protect_latest: usize,
    pub protect_in_use: bool,
}

/// Select the digests to delete from one repository
pub fn select_candidates(
    images: &[ImageRecord],
    policy: &ProtectionPolicy,
    in_use: &InUseSet,
    repository_uri: &str,
) -> Vec<Candidate> {
    let repo_path = normalize(repository_uri);

    let mut not_in_use: Vec<Candidate> = Vec::new();
    let mut in_use_bucket: Vec<Candidate> = Vec::new();

    for image in images {
        if !image.is_tagged() {
            not_in_use.push(candidate(image, repository_uri, SelectionReason::Untagged));
            continue;
        }

        let joined = image.joined_tags();
        if policy.hold_tags.is_match(&joined) {
            debug!("Holding image {} with tags: {}", repo_path, joined);
            continue;
        }

        if policy.protect_in_use && in_use.any_tag_in_use(repo_path, &image.tags) {
            in_use_bucket.push(candidate(
                image,
                repository_uri,
                SelectionReason::InUseBeyondLatest,
            ));
        } else {
            not_in_use.push(candidate(image, repository_uri, SelectionReason::NotInUse));
        }
    }

    // Newest first; a missing push time sorts as oldest
    in_use_bucket.sort_by(|a, b| b.pushed_at.cmp(&a.pushed_at));

    let protected = policy.protect_latest.min(in_use_bucket.len());
    if protected > 0 {
        debug!(
            "Protecting {} in-use images (newest) in {}",
            protected, repo_path
        );
    }

    not_in_use.extend(in_use_bucket.into_iter().skip(protected));
    not_in_use
}

fn candidate(image: &ImageRecord, repository_uri: &str, reason: SelectionReason) -> Candidate {
    let mut cand = Candidate::from_record(image, reason);
    cand.repository_uri = repository_uri.to_string();
    cand
}
