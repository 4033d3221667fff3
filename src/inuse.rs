//! The set of image references currently running in the cluster.
//!
//! The set is read from a persisted list when one exists and is non-empty; otherwise it
//! is fetched live from a [`ClusterSource`] and written back to that list so later runs
//! (and operators) can reuse or edit it.

use crate::reference::{in_use_key, normalize};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

/// Normalized `repo-path:tag` references confirmed in use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InUseSet {
    refs: HashSet<String>,
}

impl InUseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.refs.contains(reference)
    }

    /// Whether `repo_path:tag` is in use for any of `tags`
    pub fn any_tag_in_use<'a>(
        &self,
        repo_path: &str,
        tags: impl IntoIterator<Item = &'a String>,
    ) -> bool {
        tags.into_iter()
            .any(|tag| self.contains(&in_use_key(repo_path, tag)))
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// References in sorted order
    pub fn sorted(&self) -> Vec<&str> {
        let sorted: BTreeSet<&str> = self.refs.iter().map(String::as_str).collect();
        sorted.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for InUseSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        InUseSet {
            refs: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// A live source of image references running in the cluster
pub trait ClusterSource {
    /// Fully qualified image references (`registry/repo:tag`) of every workload container
    fn running_images(&self) -> Result<Vec<String>>;
}

/// Load the persisted list, or fetch from `source` and persist it when the list is
/// missing or empty.
pub fn build_in_use_set(list_file: &Path, source: &dyn ClusterSource) -> Result<InUseSet> {
    let has_list = fs::metadata(list_file)
        .map(|m| m.len() > 0)
        .unwrap_or(false);

    if has_list {
        load_in_use_list(list_file)
    } else {
        let images = source
            .running_images()
            .context("Failed to fetch in-use images from the cluster")?;
        let in_use: InUseSet = images.iter().map(|image| normalize(image)).collect();
        write_in_use_list(list_file, &in_use)?;
        info!(
            "Fetched {} unique images from k8s cluster and saved to {}",
            in_use.len(),
            list_file.display()
        );
        Ok(in_use)
    }
}

/// Build or load the set at the start of every run, which also refreshes a missing list.
///
/// When in-use protection is off the set only feeds the persisted list, so a cluster
/// failure is logged and an empty set returned instead of aborting the run.
pub fn in_use_for_run(
    list_file: &Path,
    source: &dyn ClusterSource,
    protect_in_use: bool,
) -> Result<InUseSet> {
    match build_in_use_set(list_file, source) {
        Ok(in_use) => Ok(in_use),
        Err(err) if !protect_in_use => {
            warn!("In-use protection is off; continuing without in-use images: {:#}", err);
            Ok(InUseSet::new())
        }
        Err(err) => Err(err),
    }
}

/// Read one reference per line, skipping blank lines
pub fn load_in_use_list(list_file: &Path) -> Result<InUseSet> {
    let content = fs::read_to_string(list_file)
        .with_context(|| format!("Failed to open image list file '{}'", list_file.display()))?;

    let in_use: InUseSet = content
        .lines()
        .filter(|line| !line.is_empty())
        .collect();

    info!(
        "Loaded {} in-use images from {}",
        in_use.len(),
        list_file.display()
    );
    Ok(in_use)
}

/// Write the set as a sorted plain-text list, creating parent directories
pub fn write_in_use_list(list_file: &Path, in_use: &InUseSet) -> Result<()> {
    if let Some(parent) = list_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create directory for image list file '{}'",
                list_file.display()
            )
        })?;
    }

    let mut body = String::new();
    for reference in in_use.sorted() {
        body.push_str(reference);
        body.push('\n');
    }

    fs::write(list_file, body)
        .with_context(|| format!("Failed to create image list file '{}'", list_file.display()))
}

/// Workload kinds whose pod specs are scanned for images
pub const WORKLOAD_KINDS: &[&str] = &[
    "pods",
    "deployments",
    "statefulsets",
    "jobs",
    "daemonsets",
    "cronjobs",
];

/// Reads workloads across all namespaces through `kubectl`.
///
/// Inside a pod kubectl picks up the service account automatically, so this works both
/// in-cluster and from a workstation with a kubeconfig.
pub struct KubectlSource {
    program: String,
}

impl KubectlSource {
    pub fn new() -> Self {
        Self::with_program("kubectl")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        KubectlSource {
            program: program.into(),
        }
    }

    fn list_kind(&self, kind: &str) -> Result<Vec<String>> {
        let output = Command::new(&self.program)
            .arg("get")
            .arg(kind)
            .arg("--all-namespaces")
            .arg("--output")
            .arg("json")
            .output()
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} get {} failed: {}",
                self.program,
                kind,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        images_from_workload_list(&output.stdout)
            .with_context(|| format!("Failed to parse {} list", kind))
    }
}

impl Default for KubectlSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterSource for KubectlSource {
    fn running_images(&self) -> Result<Vec<String>> {
        let mut images = Vec::new();
        let mut listed = 0;
        let mut last_error = None;

        // A kind that cannot be listed (RBAC, missing API) is skipped, but at least one
        // must succeed or the cluster was never reached
        for kind in WORKLOAD_KINDS {
            match self.list_kind(kind) {
                Ok(found) => {
                    debug!("Found {} container images in {}", found.len(), kind);
                    images.extend(found);
                    listed += 1;
                }
                Err(err) => {
                    warn!("Skipping {}: {:#}", kind, err);
                    last_error = Some(err);
                }
            }
        }

        if listed == 0 {
            let err = last_error.unwrap_or_else(|| anyhow::anyhow!("no workload kinds listed"));
            return Err(err.context("Could not list any workloads from the cluster"));
        }
        Ok(images)
    }
}

#[derive(Debug, Deserialize)]
struct WorkloadList {
    #[serde(default)]
    items: Vec<Workload>,
}

#[derive(Debug, Deserialize)]
struct Workload {
    #[serde(default)]
    spec: Option<WorkloadSpec>,
}

/// Covers pods (containers inline), templated workloads and cronjobs
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadSpec {
    #[serde(default)]
    template: Option<PodTemplate>,
    #[serde(default)]
    job_template: Option<JobTemplate>,
    #[serde(flatten)]
    pod: PodSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodSpec {
    #[serde(default)]
    containers: Vec<Container>,
    #[serde(default)]
    init_containers: Vec<Container>,
}

#[derive(Debug, Deserialize)]
struct PodTemplate {
    #[serde(default)]
    spec: PodSpec,
}

#[derive(Debug, Deserialize)]
struct JobTemplate {
    spec: JobSpec,
}

#[derive(Debug, Deserialize)]
struct JobSpec {
    template: PodTemplate,
}

#[derive(Debug, Deserialize)]
struct Container {
    #[serde(default)]
    image: Option<String>,
}

impl PodSpec {
    fn images(&self) -> impl Iterator<Item = &str> {
        self.containers
            .iter()
            .chain(&self.init_containers)
            .filter_map(|c| c.image.as_deref())
    }
}

/// Extract container and init-container images from a `kubectl get -o json` list
pub fn images_from_workload_list(json: &[u8]) -> Result<Vec<String>> {
    let list: WorkloadList = serde_json::from_slice(json)?;
    let mut images = Vec::new();

    for spec in list.items.iter().filter_map(|w| w.spec.as_ref()) {
        images.extend(spec.pod.images().map(str::to_string));
        if let Some(template) = &spec.template {
            images.extend(template.spec.images().map(str::to_string));
        }
        if let Some(job_template) = &spec.job_template {
            images.extend(job_template.spec.template.spec.images().map(str::to_string));
        }
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FixedSource(Vec<&'static str>);

    impl ClusterSource for FixedSource {
        fn running_images(&self) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct FailingSource;

    impl ClusterSource for FailingSource {
        fn running_images(&self) -> Result<Vec<String>> {
            anyhow::bail!("cluster unreachable")
        }
    }

    #[test]
    fn test_any_tag_in_use_is_per_tag() {
        let in_use: InUseSet = ["app:a", "app:b"].into_iter().collect();
        let tags = vec!["c".to_string(), "b".to_string()];
        assert!(in_use.any_tag_in_use("app", &tags));

        let in_use: InUseSet = ["app:[a b]"].into_iter().collect();
        let tags = vec!["a".to_string(), "b".to_string()];
        assert!(!in_use.any_tag_in_use("app", &tags));
    }

    #[test]
    fn test_fetches_and_persists_when_list_missing() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("IMG_LIST").join("PRE_IMG_LIST.txt");
        let source = FixedSource(vec![
            "123.dkr.ecr.us-east-1.amazonaws.com/web:v2",
            "123.dkr.ecr.us-east-1.amazonaws.com/web:v2",
            "busybox",
        ]);

        let in_use = build_in_use_set(&list, &source).unwrap();
        assert_eq!(in_use.len(), 2);
        assert!(in_use.contains("web:v2"));
        assert!(in_use.contains("busybox"));

        let written = fs::read_to_string(&list).unwrap();
        assert_eq!(written, "busybox\nweb:v2\n");
    }

    #[test]
    fn test_reads_existing_list_without_querying_cluster() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("list.txt");
        fs::write(&list, "web:v1\n\napi:v7\n").unwrap();

        let in_use = build_in_use_set(&list, &FailingSource).unwrap();
        assert_eq!(in_use.len(), 2);
        assert!(in_use.contains("api:v7"));
    }

    #[test]
    fn test_empty_list_triggers_fetch() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("list.txt");
        fs::write(&list, "").unwrap();

        let in_use = build_in_use_set(&list, &FixedSource(vec!["reg/app:v1"])).unwrap();
        assert!(in_use.contains("app:v1"));
        assert!(build_in_use_set(&dir.path().join("none.txt"), &FailingSource).is_err());
    }

    #[test]
    fn test_run_refreshes_list_even_without_protection() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("PRE_IMG_LIST.txt");

        let in_use = in_use_for_run(&list, &FixedSource(vec!["reg/api:v4"]), false).unwrap();
        assert!(in_use.contains("api:v4"));
        assert_eq!(fs::read_to_string(&list).unwrap(), "api:v4\n");
    }

    #[test]
    fn test_cluster_failure_is_fatal_only_with_protection() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("PRE_IMG_LIST.txt");

        assert!(in_use_for_run(&list, &FailingSource, true).is_err());

        let in_use = in_use_for_run(&list, &FailingSource, false).unwrap();
        assert!(in_use.is_empty());
        assert!(!list.exists());
    }

    #[test]
    fn test_unreachable_cluster_is_an_error_and_nothing_is_persisted() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("IMG_LIST").join("PRD_IMG_LIST.txt");
        let source = KubectlSource::with_program("/nonexistent/kubectl");

        let err = build_in_use_set(&list, &source).unwrap_err();
        assert!(format!("{:#}", err).contains("Could not list any workloads"));
        assert!(!list.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_kinds_that_fail_are_skipped_when_others_list() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let script = dir.path().join("kubectl");
        fs::write(
            &script,
            "#!/bin/sh\n\
             if [ \"$2\" = \"pods\" ]; then\n\
             echo '{\"items\": [{\"spec\": {\"containers\": [{\"image\": \"reg/web:v1\"}]}}]}'\n\
             else\n\
             echo 'forbidden' >&2; exit 1\n\
             fi\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let images = KubectlSource::with_program(script.to_string_lossy())
            .running_images()
            .unwrap();
        assert_eq!(images, vec!["reg/web:v1"]);
    }

    #[test]
    fn test_images_from_workload_list() {
        let json = br#"{
            "apiVersion": "v1",
            "kind": "List",
            "items": [
                {"kind": "Pod", "spec": {
                    "containers": [{"name": "web", "image": "reg/web:v1"}],
                    "initContainers": [{"name": "init", "image": "reg/init:v1"}]
                }},
                {"kind": "Deployment", "spec": {"replicas": 2, "template": {"spec": {
                    "containers": [{"name": "api", "image": "reg/api:v3"}]
                }}}},
                {"kind": "CronJob", "spec": {"schedule": "* * * * *", "jobTemplate": {"spec": {
                    "template": {"spec": {"containers": [{"name": "job", "image": "reg/job:v9"}]}}
                }}}}
            ]
        }"#;

        let images = images_from_workload_list(json).unwrap();
        assert_eq!(
            images,
            vec!["reg/web:v1", "reg/init:v1", "reg/api:v3", "reg/job:v9"]
        );
    }

    #[test]
    fn test_empty_workload_list() {
        let images = images_from_workload_list(br#"{"items": []}"#).unwrap();
        assert!(images.is_empty());
    }
}
