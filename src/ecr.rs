//! Amazon ECR implementation of [`Registry`].
//!
//! The AWS SDK is async; a current-thread runtime owned by [`EcrRegistry`] drives each
//! call to completion so the cleaner stays strictly sequential.

use crate::image::{Candidate, ImageRecord, Repository};
use crate::reference::ecr_registry_host;
use crate::registry::Registry;
use crate::time::from_epoch;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ecr::types::{ImageFailure, ImageIdentifier};
use tokio::runtime::Runtime;
use tracing::debug;

pub struct EcrRegistry {
    runtime: Runtime,
    ecr: aws_sdk_ecr::Client,
    sts: aws_sdk_sts::Client,
    region: String,
}

impl EcrRegistry {
    /// Load credentials from the default provider chain for `region`
    pub fn connect(region: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start AWS runtime")?;

        let sdk_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load(),
        );

        Ok(EcrRegistry {
            ecr: aws_sdk_ecr::Client::new(&sdk_config),
            sts: aws_sdk_sts::Client::new(&sdk_config),
            runtime,
            region: region.to_string(),
        })
    }

    /// Account that owns the credentials
    pub fn account_id(&self) -> Result<String> {
        let identity = self
            .runtime
            .block_on(self.sts.get_caller_identity().send())
            .context("Failed to get AWS account ID")?;

        identity
            .account()
            .map(str::to_string)
            .context("Caller identity has no account")
    }
}

impl Registry for EcrRegistry {
    fn registry_host(&self) -> Result<String> {
        Ok(ecr_registry_host(&self.account_id()?, &self.region))
    }

    fn list_repositories(&self) -> Result<Vec<Repository>> {
        let repositories: Result<Vec<_>, _> = self.runtime.block_on(
            self.ecr
                .describe_repositories()
                .into_paginator()
                .items()
                .send()
                .collect(),
        );

        let repositories = repositories?
            .into_iter()
            .filter_map(|r| {
                Some(Repository {
                    name: r.repository_name?,
                    uri: r.repository_uri.unwrap_or_default(),
                })
            })
            .collect();

        Ok(repositories)
    }

    fn list_images(&self, repository: &Repository) -> Result<Vec<ImageRecord>> {
        let details: Result<Vec<_>, _> = self.runtime.block_on(
            self.ecr
                .describe_images()
                .repository_name(&repository.name)
                .into_paginator()
                .items()
                .send()
                .collect(),
        );

        let images: Vec<ImageRecord> = details?
            .into_iter()
            .map(|d| ImageRecord {
                repository_name: repository.name.clone(),
                repository_uri: repository.uri.clone(),
                digest: d.image_digest().unwrap_or_default().to_string(),
                tags: d.image_tags().to_vec(),
                pushed_at: d
                    .image_pushed_at()
                    .and_then(|ts| from_epoch(ts.secs(), ts.subsec_nanos())),
                size_bytes: d.image_size_in_bytes().and_then(|b| u64::try_from(b).ok()),
            })
            .collect();

        debug!(
            "Found {} images in repository {}",
            images.len(),
            repository.name
        );
        Ok(images)
    }

    fn delete_image(&self, candidate: &Candidate) -> Result<()> {
        let mut id = ImageIdentifier::builder().image_digest(&candidate.digest);
        if let Some(tag) = candidate.delete_tag() {
            id = id.image_tag(tag);
        }

        let output = self.runtime.block_on(
            self.ecr
                .batch_delete_image()
                .repository_name(&candidate.repository_name)
                .image_ids(id.build())
                .send(),
        )?;

        check_batch_failures(output.failures())?;

        debug!(
            "Deleted image response: {} ids removed",
            output.image_ids().len()
        );
        Ok(())
    }

    fn delete_repository(&self, repository_name: &str) -> Result<()> {
        self.runtime.block_on(
            self.ecr
                .delete_repository()
                .repository_name(repository_name)
                .force(true)
                .send(),
        )?;
        Ok(())
    }
}

/// A batch delete reports per-image failures in a successful response; any of them fails
/// the whole call
fn check_batch_failures(failures: &[ImageFailure]) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }

    let reasons: Vec<String> = failures
        .iter()
        .map(|f| {
            format!(
                "{} {}: {}",
                f.image_id()
                    .and_then(|id| id.image_digest())
                    .unwrap_or("<unknown digest>"),
                f.failure_code().map(|c| c.as_str()).unwrap_or("Unknown"),
                f.failure_reason().unwrap_or_default()
            )
        })
        .collect();
    anyhow::bail!("failed to delete image: {}", reasons.join(", "))
}
