//! avsctl Core Library
//!
//! Domain logic between the ledger and the container engine: turning
//! on-chain releases into runnable references, publishing new releases and
//! metadata, and the persisted CLI configuration the binary reads.
//!
//! ## Layer 2 - Domain
//!
//! - `reference`: digest/registry to pullable reference
//! - `classify`: ledger revert text to operator guidance
//! - `controller`: resolve, validate, select, pull, run
//! - `publish`: push and metadata write flows
//! - `config` / `target`: contexts on disk and per-command target resolution
//! - `telemetry`: tracing subscriber setup for binaries

pub mod classify;
pub mod config;
pub mod controller;
mod error;
pub mod publish;
pub mod reference;
pub mod target;
pub mod telemetry;

pub use classify::{classify_read_error, ReleaseQuery};
pub use config::{CliConfig, ConfigStore, ContextConfig, ContextUpdate};
pub use controller::{
    artifact_reference, resolve_release, ArtifactSelection, Controller, PullOutcome, RunOutcome,
    RunSpec,
};
pub use error::{AvsctlError, Result};
pub use publish::{PublishOutcome, PushSpec};
pub use reference::{build_reference, digest_to_reference_string, ReferenceError};
pub use target::{Target, TargetArgs};

pub use container_runtime::{ContainerRuntime, DockerCli, ImagePublisher, RunOptions};
pub use release_ledger::{
    Address, Artifact, OperatorSet, Release, ReleaseId, ReleaseLedger, TxHandle,
};
