//! Container-Runtime: container engine access for avsctl
//!
//! ## Layer 1 - Runtime
//!
//! Thin subprocess wrapper around a docker-compatible engine. The rest of
//! avsctl only sees two capabilities:
//!
//! - `ContainerRuntime`: pull and run an image by reference
//! - `ImagePublisher`: push an image and read back its repository digest
//!
//! `DockerCli` implements both by shelling out; `fakes::RecordingRuntime`
//! records calls for tests.

mod docker;
mod error;
pub mod fakes;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use docker::{parse_repo_digest, run_args, DockerCli, RepoDigest, DEFAULT_ENGINE};
pub use error::RuntimeError;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Options for starting a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Container name; the engine picks one when absent
    pub name: Option<String>,
    /// Start in the background
    pub detached: bool,
    /// Environment passed with `-e`, in key order
    pub env: BTreeMap<String, String>,
    /// Override for the image's default command
    pub cmd: Vec<String>,
}

/// Pull and run images by reference.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn pull(&self, reference: &str) -> Result<()>;

    async fn run(&self, reference: &str, options: &RunOptions) -> Result<()>;
}

/// Push images and inspect what the registry recorded for them.
#[async_trait]
pub trait ImagePublisher: Send + Sync {
    async fn push(&self, image: &str) -> Result<()>;

    /// Repository digest of a local image that has been pushed or pulled.
    async fn repo_digest(&self, image: &str) -> Result<RepoDigest>;
}
