//! Recording fake for the runtime capabilities (testing only)

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::{ContainerRuntime, ImagePublisher, RepoDigest, Result, RunOptions};

/// One call observed by [`RecordingRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Pull(String),
    Run(String, RunOptions),
    Push(String),
    Inspect(String),
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<RuntimeCall>,
    failures: HashMap<&'static str, String>,
    digests: HashMap<String, RepoDigest>,
}

/// Runtime that succeeds (unless told otherwise) and records every call.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    inner: Mutex<Recorded>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` (`"pull"`, `"run"`, `"push"` or `"inspect"`) fail with `output`.
    pub fn fail(&self, op: &'static str, output: &str) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert(op, output.to_string());
    }

    /// Digest reported by `repo_digest(image)`.
    pub fn set_repo_digest(&self, image: &str, digest: RepoDigest) {
        self.inner
            .lock()
            .unwrap()
            .digests
            .insert(image.to_string(), digest);
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// References passed to `pull`, in order.
    pub fn pulled(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RuntimeCall::Pull(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// `(reference, options)` passed to `run`, in order.
    pub fn runs(&self) -> Vec<(String, RunOptions)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RuntimeCall::Run(r, o) => Some((r, o)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: &'static str, call: RuntimeCall) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        match inner.failures.get(op) {
            Some(output) => Err(RuntimeError::CommandFailed {
                op: format!("docker {op}"),
                status: "exit status: 1".to_string(),
                output: output.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn pull(&self, reference: &str) -> Result<()> {
        self.record("pull", RuntimeCall::Pull(reference.to_string()))
    }

    async fn run(&self, reference: &str, options: &RunOptions) -> Result<()> {
        self.record(
            "run",
            RuntimeCall::Run(reference.to_string(), options.clone()),
        )
    }
}

#[async_trait]
impl ImagePublisher for RecordingRuntime {
    async fn push(&self, image: &str) -> Result<()> {
        self.record("push", RuntimeCall::Push(image.to_string()))
    }

    async fn repo_digest(&self, image: &str) -> Result<RepoDigest> {
        self.record("inspect", RuntimeCall::Inspect(image.to_string()))?;
        self.inner
            .lock()
            .unwrap()
            .digests
            .get(image)
            .cloned()
            .ok_or_else(|| RuntimeError::MissingRepoDigest {
                image: image.to_string(),
                output: "[]".to_string(),
            })
    }
}
