//! Repository scoping by target and exclude expressions.

use crate::image::Repository;
use crate::patterns::CompositePattern;

use tracing::debug;

/// Keep repositories whose name matches `include` and not `exclude`.
/// Exclusion is only evaluated for repositories that were included.
pub fn filter_repositories(
    repos: Vec<Repository>,
    include: &CompositePattern,
    exclude: Option<&CompositePattern>,
) -> Vec<Repository> {
    repos
        .into_iter()
        .filter(|repo| {
            if !include.is_match(&repo.name) {
                return false;
            }
            debug!("Matched repository: {}", repo.name);

            if let Some(exclude) = exclude {
                if exclude.is_match(&repo.name) {
                    debug!("Excluding repository: {}", repo.name);
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Whether the repository lives in the registry this run targets
pub fn in_target_registry(repo: &Repository, registry_host: &str) -> bool {
    repo.uri.starts_with(registry_host)
}
