//! Image reference normalization.
//!
//! The cluster reports images as `<registry>/<repo>:<tag>` and ECR reports repository
//! URIs as `<account>.dkr.ecr.<region>.amazonaws.com/<repo>`. Dropping everything up to
//! the first `/` makes both comparable as `<repo>[:<tag>]`.

/// Strip the registry host segment from a reference
pub fn normalize(uri: &str) -> &str {
    match uri.split_once('/') {
        Some((_, rest)) => rest,
        None => uri,
    }
}

/// Key under which an in-use `repo_path:tag` reference is recorded
pub fn in_use_key(repo_path: &str, tag: &str) -> String {
    format!("{}:{}", repo_path, tag)
}

/// Registry host for an account and region
pub fn ecr_registry_host(account_id: &str, region: &str) -> String {
    format!("{}.dkr.ecr.{}.amazonaws.com", account_id, region)
}
