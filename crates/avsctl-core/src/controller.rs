//! Release resolution and container start-up.
//!
//! The controller is stateless per call: resolve a release (latest or by
//! id), reject releases without artifacts, select artifacts and hand each
//! one's reference to the container runtime in order. Nothing is retried.

use std::collections::BTreeMap;

use container_runtime::{ContainerRuntime, RunOptions};
use release_ledger::{Artifact, OperatorSet, Release, ReleaseId, ReleaseLedger};
use tracing::{debug, info, instrument};

use crate::classify::{classify_read_error, ReleaseQuery};
use crate::error::{AvsctlError, Result};
use crate::reference::{build_reference, digest_to_reference_string};

pub const ENV_AVS_ADDRESS: &str = "AVS_ADDRESS";
pub const ENV_OPERATOR_SET_ID: &str = "OPERATOR_SET_ID";
pub const ENV_RELEASE_ID: &str = "RELEASE_ID";
pub const ENV_UPGRADE_BY_TIME: &str = "UPGRADE_BY_TIME";

/// Which artifacts of a release are acted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArtifactSelection {
    /// Only the first artifact
    #[default]
    First,
    /// Every artifact, each handled independently
    All,
}

impl ArtifactSelection {
    /// Apply the policy. `release` must have at least one artifact.
    pub fn select<'r>(&self, release: &'r Release) -> &'r [Artifact] {
        match self {
            ArtifactSelection::First => &release.artifacts[..release.artifacts.len().min(1)],
            ArtifactSelection::All => &release.artifacts,
        }
    }
}

/// Parameters of one `run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub operator_set: OperatorSet,
    /// `None` means latest
    pub release_id: Option<ReleaseId>,
    pub name: Option<String>,
    pub detached: bool,
    /// Caller overrides; win over the injected release variables
    pub env: BTreeMap<String, String>,
    pub cmd: Vec<String>,
}

impl RunSpec {
    pub fn new(operator_set: OperatorSet) -> Self {
        Self {
            operator_set,
            release_id: None,
            name: None,
            detached: false,
            env: BTreeMap::new(),
            cmd: Vec::new(),
        }
    }
}

/// A container handed to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedContainer {
    pub reference: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub release_id: ReleaseId,
    pub upgrade_by_time: u32,
    pub containers: Vec<StartedContainer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    pub release_id: ReleaseId,
    pub references: Vec<String>,
}

/// Variables injected into every container started from a release.
pub fn release_env(set: OperatorSet, release_id: ReleaseId, release: &Release) -> BTreeMap<String, String> {
    BTreeMap::from([
        (ENV_AVS_ADDRESS.to_string(), set.avs.to_string()),
        (ENV_OPERATOR_SET_ID.to_string(), set.id.to_string()),
        (ENV_RELEASE_ID.to_string(), release_id.to_string()),
        (ENV_UPGRADE_BY_TIME.to_string(), release.upgrade_by_time.to_string()),
    ])
}

/// Pullable reference for one artifact.
pub fn artifact_reference(artifact: &Artifact) -> Result<String> {
    let digest = digest_to_reference_string(&artifact.digest);
    Ok(build_reference(&artifact.registry, &digest)?)
}

/// Pullable references for the selected artifacts of `release`.
pub fn artifact_references(release: &Release, selection: ArtifactSelection) -> Result<Vec<String>> {
    selection.select(release).iter().map(artifact_reference).collect()
}

/// Fetch the release `query` names, rewriting known revert causes.
pub async fn resolve_release(
    ledger: &dyn ReleaseLedger,
    set: OperatorSet,
    query: ReleaseQuery,
) -> Result<(Release, ReleaseId)> {
    let fetched = match query {
        ReleaseQuery::Latest => ledger.latest_release(set).await,
        ReleaseQuery::Id(id) => ledger.release(set, id).await.map(|r| (r, id)),
    };
    let (release, id) = fetched.map_err(|e| classify_read_error(e, query, set))?;
    debug!(release_id = id, artifacts = release.artifacts.len(), "release resolved");
    Ok((release, id))
}

/// Orchestrates ledger lookups and the container runtime.
pub struct Controller<'a> {
    ledger: &'a dyn ReleaseLedger,
    runtime: &'a dyn ContainerRuntime,
    selection: ArtifactSelection,
}

impl<'a> Controller<'a> {
    pub fn new(ledger: &'a dyn ReleaseLedger, runtime: &'a dyn ContainerRuntime) -> Self {
        Self {
            ledger,
            runtime,
            selection: ArtifactSelection::First,
        }
    }

    pub fn with_selection(mut self, selection: ArtifactSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Fetch a release, classifying lookup failures.
    pub async fn resolve(&self, set: OperatorSet, query: ReleaseQuery) -> Result<(Release, ReleaseId)> {
        resolve_release(self.ledger, set, query).await
    }

    /// Resolve a release and reject it if it has nothing to run.
    async fn resolve_runnable(&self, set: OperatorSet, query: ReleaseQuery) -> Result<(Release, ReleaseId)> {
        let (release, release_id) = self.resolve(set, query).await?;
        if release.artifacts.is_empty() {
            return Err(AvsctlError::NoArtifactsInRelease {
                release_id,
                avs: set.avs,
                operator_set_id: set.id,
            });
        }
        Ok((release, release_id))
    }

    /// Pull and run the selected artifacts of a release.
    #[instrument(skip_all, fields(operator_set = %spec.operator_set, release = %ReleaseQuery::from_option(spec.release_id)))]
    pub async fn execute(&self, spec: &RunSpec) -> Result<RunOutcome> {
        let set = spec.operator_set;
        let (release, release_id) = self
            .resolve_runnable(set, ReleaseQuery::from_option(spec.release_id))
            .await?;

        let mut env = release_env(set, release_id, &release);
        env.extend(spec.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        // Artifacts are handled one at a time; a bad one stops the loop but
        // leaves earlier containers running.
        let selected = self.selection.select(&release);
        let suffix_names = selected.len() > 1;
        let mut containers = Vec::with_capacity(selected.len());
        for (index, artifact) in selected.iter().enumerate() {
            let reference = artifact_reference(artifact)?;
            self.runtime
                .pull(&reference)
                .await
                .map_err(|e| AvsctlError::runtime("pull image", e))?;

            let name = spec
                .name
                .as_ref()
                .map(|n| if suffix_names { format!("{n}-{index}") } else { n.clone() });
            let options = RunOptions {
                name: name.clone(),
                detached: spec.detached,
                env: env.clone(),
                cmd: spec.cmd.clone(),
            };
            self.runtime
                .run(&reference, &options)
                .await
                .map_err(|e| AvsctlError::runtime("run container", e))?;

            info!(%reference, release_id, "container started");
            containers.push(StartedContainer { reference, name });
        }

        Ok(RunOutcome {
            release_id,
            upgrade_by_time: release.upgrade_by_time,
            containers,
        })
    }

    /// Pull the selected artifacts of a release without starting anything.
    ///
    /// The release count is checked first so an empty set or an id past the
    /// end is reported without relying on revert text.
    #[instrument(skip_all, fields(operator_set = %set, release = %ReleaseQuery::from_option(release_id)))]
    pub async fn pull(&self, set: OperatorSet, release_id: Option<ReleaseId>) -> Result<PullOutcome> {
        let query = ReleaseQuery::from_option(release_id);
        let total = self
            .ledger
            .total_releases(set)
            .await
            .map_err(AvsctlError::LedgerRead)?;
        if total == 0 {
            return Err(AvsctlError::NoReleasesAvailable {
                avs: set.avs,
                operator_set_id: set.id,
            });
        }
        if let ReleaseQuery::Id(id) = query {
            if id >= total {
                return Err(AvsctlError::ReleaseNotFound {
                    query,
                    total: Some(total),
                });
            }
        }

        let (release, release_id) = self.resolve_runnable(set, query).await?;
        let mut references = Vec::new();
        for artifact in self.selection.select(&release) {
            let reference = artifact_reference(artifact)?;
            self.runtime
                .pull(&reference)
                .await
                .map_err(|e| AvsctlError::runtime("pull image", e))?;
            info!(%reference, release_id, "image pulled");
            references.push(reference);
        }

        Ok(PullOutcome {
            release_id,
            references,
        })
    }
}
