//! ecr-pruner - Registry Image Pruner
//!
//! Deletes images from Amazon ECR that are no longer needed, cross-referencing the images
//! stored in each targeted repository with the images running in the Kubernetes cluster.
//!
//! ## Selection rules
//!
//! - Untagged images are always deleted.
//! - Images with a tag matching the hold expression are never deleted.
//! - With in-use protection on, images running in the cluster are kept, but only the
//!   newest `PROTECT_LATEST` of them per repository; older running images are deleted.
//! - Everything else is deleted.
//!
//! Repositories left empty are removed. See [`selector`] for the decision engine and
//! [`cleaner`] for the run sequence.

pub mod cleaner;
pub mod config;
pub mod ecr;
pub mod filter;
pub mod image;
pub mod inuse;
pub mod logging;
pub mod patterns;
pub mod prompt;
pub mod reference;
pub mod registry;
pub mod report;
pub mod selector;
pub mod time;

// Re-export commonly used items
pub use cleaner::{Cleaner, RunOptions, RunOutcome, RunReport};
pub use config::{Args, Config, ConfigError, ConfigErrors, Environment};
pub use filter::filter_repositories;
pub use image::{Candidate, ImageRecord, Repository, SelectionReason};
pub use inuse::{build_in_use_set, in_use_for_run, ClusterSource, InUseSet, KubectlSource};
pub use logging::{init_logging, LogSink};
pub use patterns::{matches, CompositePattern, PatternError};
pub use prompt::{Confirm, TerminalPrompt};
pub use reference::normalize;
pub use registry::Registry;
pub use selector::{select_candidates, ProtectionPolicy};
