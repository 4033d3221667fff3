//! Run orchestration: scan repositories, select candidates, confirm, delete, and remove
//! repositories left empty.

use crate::filter::{filter_repositories, in_target_registry};
use crate::image::{Candidate, ImageRecord, Repository};
use crate::inuse::InUseSet;
use crate::prompt::Confirm;
use crate::registry::Registry;
use crate::report::{candidate_line, format_reclaimable, log_summary, scanned_line};
use crate::selector::{select_candidates, ProtectionPolicy};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

/// Runtime flags (independent of the protection policy)
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub list_only: bool,
    pub auto_confirm: bool,
    /// Show a progress spinner on the terminal while scanning
    pub interactive: bool,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    NoRepositories,
    ListOnly,
    Declined,
    Completed,
}

/// Everything a run scanned, selected and changed
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub scanned: Vec<ImageRecord>,
    pub candidates: Vec<Candidate>,
    pub deleted_images: usize,
    pub failed_images: usize,
    /// Repositories deleted (or that would be, in dry-run mode)
    pub deleted_repositories: Vec<String>,
}

impl RunReport {
    fn new(outcome: RunOutcome) -> Self {
        RunReport {
            outcome,
            scanned: Vec::new(),
            candidates: Vec::new(),
            deleted_images: 0,
            failed_images: 0,
            deleted_repositories: Vec::new(),
        }
    }
}

pub struct Cleaner<'a, R: Registry> {
    registry: &'a R,
    policy: &'a ProtectionPolicy,
    in_use: &'a InUseSet,
    options: RunOptions,
}

impl<'a, R: Registry> Cleaner<'a, R> {
    pub fn new(
        registry: &'a R,
        policy: &'a ProtectionPolicy,
        in_use: &'a InUseSet,
        options: RunOptions,
    ) -> Self {
        Cleaner {
            registry,
            policy,
            in_use,
            options,
        }
    }

    /// Run once against repositories under `registry_host`.
    ///
    /// Only a failure to list repositories aborts the run; per-repository and per-image
    /// failures are logged and skipped.
    pub fn run(&self, registry_host: &str, confirm: &mut dyn Confirm) -> Result<RunReport> {
        let repos = self
            .registry
            .list_repositories()
            .context("Error fetching repositories")?;
        let repos = filter_repositories(
            repos,
            &self.policy.target_repos,
            self.policy.exclude_repos.as_ref(),
        );

        if repos.is_empty() {
            info!("No repositories found matching the provided pattern.");
            return Ok(RunReport::new(RunOutcome::NoRepositories));
        }

        let mut report = RunReport::new(RunOutcome::Completed);
        let scanned_repos = self.scan(&repos, registry_host, &mut report);

        log_summary(&report.scanned, &report.candidates);

        if self.options.list_only {
            info!("List-only mode enabled. Exiting without deletion.");
            report.outcome = RunOutcome::ListOnly;
            return Ok(report);
        }

        if report.candidates.is_empty() {
            info!("No candidate images for deletion.");
        } else {
            if !self.options.auto_confirm {
                let question = format!(
                    "Proceed with deletion of the above {} images ({})?",
                    report.candidates.len(),
                    format_reclaimable(&report.candidates)
                );
                if !confirm.confirm(&question) {
                    info!("Aborting deletion.");
                    report.outcome = RunOutcome::Declined;
                    return Ok(report);
                }
            }
            self.delete_candidates(&mut report);
        }

        info!("Checking for empty repositories to delete...");
        for repo in &scanned_repos {
            match self.registry.list_images(repo) {
                Ok(remaining) if remaining.is_empty() => {
                    info!("Repository {} is now empty. Deleting repository.", repo.name);
                    self.remove_repository(&repo.name, &mut report);
                }
                Ok(_) => {}
                Err(err) => error!(
                    "Error re-fetching images for repository {}: {:#}",
                    repo.name, err
                ),
            }
        }

        info!("Deletion process completed.");
        Ok(report)
    }

    /// Scan every repository, returning the ones that held images
    fn scan(
        &self,
        repos: &[Repository],
        registry_host: &str,
        report: &mut RunReport,
    ) -> Vec<Repository> {
        let progress = if self.options.interactive {
            let bar = ProgressBar::new(repos.len() as u64);
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{spinner:.green} [{pos}/{len}] {msg}")
            {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut scanned_repos = Vec::new();

        for repo in repos {
            progress.inc(1);
            if !in_target_registry(repo, registry_host) {
                continue;
            }
            progress.set_message(repo.name.clone());
            info!("Repository: {} (URI: {})", repo.name, repo.uri);

            let images = match self.registry.list_images(repo) {
                Ok(images) => images,
                Err(err) => {
                    error!(
                        "Error fetching images for repository {}: {:#}",
                        repo.name, err
                    );
                    continue;
                }
            };
            info!("Total images found: {}", images.len());

            if images.is_empty() {
                info!("Repository {} is empty. Deleting repository.", repo.name);
                self.remove_repository(&repo.name, report);
                continue;
            }

            for image in &images {
                info!("  {}", scanned_line(image));
            }

            let candidates = select_candidates(&images, self.policy, self.in_use, &repo.uri);
            if candidates.is_empty() {
                info!(
                    "No candidate images for deletion in repository '{}'.",
                    repo.name
                );
            } else {
                info!("Candidate images for deletion in repository '{}':", repo.name);
                for cand in &candidates {
                    info!("  {}", candidate_line(cand));
                }
            }

            report.scanned.extend(images);
            report.candidates.extend(candidates);
            scanned_repos.push(repo.clone());
        }

        progress.finish_and_clear();
        scanned_repos
    }

    fn delete_candidates(&self, report: &mut RunReport) {
        for cand in &report.candidates {
            if self.options.dry_run {
                info!(
                    "[Dry-run] Would delete image in repository {}: Tag {}, Digest {}",
                    cand.repository_name, cand.tag, cand.digest
                );
                continue;
            }

            match self.registry.delete_image(cand) {
                Ok(()) => {
                    info!(
                        "Deleted image (Tag {}, Digest {}) in repository {}",
                        cand.tag, cand.digest, cand.repository_name
                    );
                    report.deleted_images += 1;
                }
                Err(err) => {
                    error!(
                        "Error deleting image (Tag {}, Digest {}) in repository {}: {:#}",
                        cand.tag, cand.digest, cand.repository_name, err
                    );
                    report.failed_images += 1;
                }
            }
        }
    }

    fn remove_repository(&self, name: &str, report: &mut RunReport) {
        if self.options.dry_run {
            info!("[Dry-run] Would delete repository: {}", name);
            report.deleted_repositories.push(name.to_string());
            return;
        }

        match self.registry.delete_repository(name) {
            Ok(()) => {
                info!("Deleted repository: {}", name);
                report.deleted_repositories.push(name.to_string());
            }
            Err(err) => error!("Error deleting repository {}: {:#}", name, err),
        }
    }
}
