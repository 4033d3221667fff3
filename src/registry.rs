//! The registry operations the cleaner depends on.

use crate::image::{Candidate, ImageRecord, Repository};

use anyhow::Result;

/// Blocking access to an image registry.
///
/// Every call completes before returning; the cleaner never issues two at once.
pub trait Registry {
    /// Host part of repository URIs in the target registry
    fn registry_host(&self) -> Result<String>;

    /// Every repository in the registry, unfiltered
    fn list_repositories(&self) -> Result<Vec<Repository>>;

    /// Every image in `repository`, all pages
    fn list_images(&self, repository: &Repository) -> Result<Vec<ImageRecord>>;

    /// Delete one image by digest (and tag, when tagged).
    /// Any per-item failure reported by the registry is an error.
    fn delete_image(&self, candidate: &Candidate) -> Result<()>;

    /// Delete a repository, including any images left in it
    fn delete_repository(&self, repository_name: &str) -> Result<()>;
}
