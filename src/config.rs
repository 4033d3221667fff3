//! Run configuration from the environment (or matching command line options).
//!
//! All settings are validated in one pass so a misconfigured deployment reports every
//! problem at once instead of failing on the first missing variable.

use crate::logging::LogSink;
use crate::patterns::{CompositePattern, PatternError};
use crate::selector::ProtectionPolicy;

use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Applied when `PROTECT_LATEST` is unset or not a non-negative integer
pub const DEFAULT_PROTECT_LATEST: usize = 3;

/// Directory holding the persisted in-use image lists
pub const DEFAULT_IMAGE_LIST_DIR: &str = "IMG_LIST";

#[derive(Parser, Debug, Default, Clone)]
#[command(
    author,
    version,
    about = "Delete ECR images that are not running in the cluster, honoring hold tags and rollback protection",
    long_about = None
)]
pub struct Args {
    /// Base directory for run logs
    #[arg(long, env = "LOGDIR")]
    pub log_dir: Option<PathBuf>,

    /// Repositories to scan, e.g. "^shop/ OR ^infra/"
    #[arg(long, env = "TARGET_REPO_REGEX")]
    pub target_repo_regex: Option<String>,

    /// Repositories to skip even when targeted
    #[arg(long, env = "EXCLUDE_REPO_REGEX")]
    pub exclude_repo_regex: Option<String>,

    /// Images with a tag matching this expression are never deleted
    #[arg(long, env = "HOLD_TAG_REGEX")]
    pub hold_tag_regex: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    pub aws_region: Option<String>,

    /// Cluster environment: pre, prd or mgmt
    #[arg(long = "env", env = "ENV")]
    pub environment: Option<String>,

    /// Directory of the persisted in-use image lists
    #[arg(long, env = "IMG_LIST_DIR", default_value = DEFAULT_IMAGE_LIST_DIR)]
    pub image_list_dir: PathBuf,

    /// Number of newest in-use images kept per repository
    #[arg(long, env = "PROTECT_LATEST")]
    pub protect_latest: Option<String>,

    /// Keep images that are running in the cluster ("true" to enable).
    /// The in-use list is loaded or refreshed on every run either way
    #[arg(long, env = "PROTECT_INUSE_BY_K8S")]
    pub protect_inuse_by_k8s: Option<String>,

    /// Verbose diagnostics ("true" to enable)
    #[arg(long, env = "DEBUG")]
    pub debug: Option<String>,

    /// Log deletions without performing them ("true" to enable)
    #[arg(long, env = "DRYRUN")]
    pub dry_run: Option<String>,

    /// Report candidates and exit ("true" to enable)
    #[arg(long, env = "LIST_ONLY")]
    pub list_only: Option<String>,

    /// Skip the confirmation prompt ("true" to enable)
    #[arg(long, env = "AUTO_CONFIRM")]
    pub auto_confirm: Option<String>,

    /// Also log to the terminal ("true" to enable)
    #[arg(long, env = "INTERACTIVE_MODE")]
    pub interactive_mode: Option<String>,
}

/// Cluster environment selecting the persisted in-use list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Pre,
    Prd,
    Mgmt,
}

impl Environment {
    /// File name of this environment's in-use image list
    pub fn image_list_file_name(&self) -> &'static str {
        match self {
            Environment::Pre => "PRE_IMG_LIST.txt",
            Environment::Prd => "PRD_IMG_LIST.txt",
            Environment::Mgmt => "MGMT_IMG_LIST.txt",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pre" => Ok(Environment::Pre),
            "prd" => Ok(Environment::Prd),
            "mgmt" => Ok(Environment::Mgmt),
            _ => Err(ConfigError::InvalidEnvironment(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Pre => "pre",
            Environment::Prd => "prd",
            Environment::Mgmt => "mgmt",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid ENV value '{0}'; must be one of: pre, prd, mgmt")]
    InvalidEnvironment(String),
    #[error("{var}: {source}")]
    InvalidPattern {
        var: &'static str,
        #[source]
        source: PatternError,
    },
}

/// Every problem found while validating the configuration
#[derive(Debug)]
pub struct ConfigErrors(pub Vec<ConfigError>);

impl std::error::Error for ConfigErrors {}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration ({} problems):", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub log_dir: PathBuf,
    pub log_file: PathBuf,
    pub aws_region: String,
    pub environment: Environment,
    pub image_list_file: PathBuf,
    pub policy: ProtectionPolicy,
    pub debug: bool,
    pub dry_run: bool,
    pub list_only: bool,
    pub auto_confirm: bool,
    pub interactive_mode: bool,
}

impl Config {
    /// Validate `args`, collecting every error.
    /// `log_file_name` is joined onto the log directory.
    pub fn from_args(args: Args, log_file_name: &str) -> Result<Config, ConfigErrors> {
        let mut errors = Vec::new();

        let log_dir = args
            .log_dir
            .filter(|dir| !dir.as_os_str().is_empty());
        if log_dir.is_none() {
            errors.push(ConfigError::Missing("LOGDIR"));
        }

        let target_repos = required_pattern(
            "TARGET_REPO_REGEX",
            args.target_repo_regex.as_deref(),
            &mut errors,
        );
        let hold_tags =
            required_pattern("HOLD_TAG_REGEX", args.hold_tag_regex.as_deref(), &mut errors);
        let exclude_repos = match non_empty(args.exclude_repo_regex.as_deref()) {
            Some(expr) => compile("EXCLUDE_REPO_REGEX", expr, &mut errors),
            None => None,
        };

        let aws_region = non_empty(args.aws_region.as_deref()).map(str::to_string);
        if aws_region.is_none() {
            errors.push(ConfigError::Missing("AWS_REGION"));
        }

        let environment = match non_empty(args.environment.as_deref()) {
            Some(value) => match value.parse::<Environment>() {
                Ok(env) => Some(env),
                Err(err) => {
                    errors.push(err);
                    None
                }
            },
            None => {
                errors.push(ConfigError::Missing("ENV"));
                None
            }
        };

        match (log_dir, target_repos, hold_tags, aws_region, environment) {
            (
                Some(log_dir),
                Some(target_repos),
                Some(hold_tags),
                Some(aws_region),
                Some(environment),
            ) if errors.is_empty() => {
                let policy = ProtectionPolicy {
                    hold_tags,
                    target_repos,
                    exclude_repos,
                    protect_latest: parse_protect_latest(args.protect_latest.as_deref()),
                    protect_in_use: flag(&args.protect_inuse_by_k8s),
                };

                Ok(Config {
                    log_file: log_dir.join(log_file_name),
                    log_dir,
                    aws_region,
                    image_list_file: args
                        .image_list_dir
                        .join(environment.image_list_file_name()),
                    environment,
                    policy,
                    debug: flag(&args.debug),
                    dry_run: flag(&args.dry_run),
                    list_only: flag(&args.list_only),
                    auto_confirm: flag(&args.auto_confirm),
                    interactive_mode: flag(&args.interactive_mode),
                })
            }
            _ => Err(ConfigErrors(errors)),
        }
    }

    /// Terminal output is kept only in interactive mode
    pub fn log_sink(&self) -> LogSink {
        if self.interactive_mode {
            LogSink::Both(self.log_file.clone())
        } else {
            LogSink::File(self.log_file.clone())
        }
    }
}

/// Boolean settings are enabled only by the literal value `true`
pub fn flag(value: &Option<String>) -> bool {
    value.as_deref() == Some("true")
}

/// Falls back to [`DEFAULT_PROTECT_LATEST`] when unset or unparsable
pub fn parse_protect_latest(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_PROTECT_LATEST)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn required_pattern(
    var: &'static str,
    value: Option<&str>,
    errors: &mut Vec<ConfigError>,
) -> Option<CompositePattern> {
    match non_empty(value) {
        Some(expr) => compile(var, expr, errors),
        None => {
            errors.push(ConfigError::Missing(var));
            None
        }
    }
}

fn compile(
    var: &'static str,
    expr: &str,
    errors: &mut Vec<ConfigError>,
) -> Option<CompositePattern> {
    match CompositePattern::parse_strict(expr) {
        Ok(pattern) => Some(pattern),
        Err(source) => {
            errors.push(ConfigError::InvalidPattern { var, source });
            None
        }
    }
}
