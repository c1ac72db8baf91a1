//! Docker CLI subprocess implementation.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::RuntimeError;
use crate::{ContainerRuntime, ImagePublisher, Result, RunOptions};

/// Engine binary used when none is configured.
pub const DEFAULT_ENGINE: &str = "docker";

const DIGEST_PREFIX: &str = "@sha256:";

/// Container engine driven through its command line.
///
/// Each call spawns one subprocess with piped output. The child is killed if
/// the calling future is dropped, so cancelling a command also stops the
/// engine invocation.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_ENGINE)
    }

    /// Use a different docker-compatible binary (e.g. `podman`).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run the engine with `args`, returning stdout on success.
    async fn exec(&self, op: &str, args: &[String]) -> Result<String> {
        debug!(binary = %self.binary, ?args, "{op}");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RuntimeError::CommandFailed {
                op: op.to_string(),
                status: output.status.to_string(),
                output: format!("{stdout}{stderr}").trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

/// Arguments for `run`: name, detach flag, sorted `-e` pairs, reference, command.
pub fn run_args(reference: &str, options: &RunOptions) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    if let Some(name) = options.name.as_deref().filter(|n| !n.is_empty()) {
        args.push("--name".to_string());
        args.push(name.to_string());
    }
    if options.detached {
        args.push("-d".to_string());
    }
    for (key, value) in &options.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(reference.to_string());
    args.extend(options.cmd.iter().cloned());
    args
}

/// Repository and content digest as recorded by a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDigest {
    /// Repository path without tag or digest, e.g. `ghcr.io/org/avs`
    pub repository: String,
    pub digest: [u8; 32],
}

/// Parse `inspect --format {{.RepoDigests}}` output.
///
/// Accepts either the bracketed list form (`[a@sha256:.. b@sha256:..]`) or
/// one entry per line; the first well-formed entry wins.
pub fn parse_repo_digest(output: &str) -> Option<RepoDigest> {
    output
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split_whitespace()
        .find_map(parse_entry)
}

fn parse_entry(entry: &str) -> Option<RepoDigest> {
    let (repository, hex_digest) = entry.split_once(DIGEST_PREFIX)?;
    if repository.is_empty() || hex_digest.len() != 64 {
        return None;
    }
    let mut digest = [0u8; 32];
    hex::decode_to_slice(hex_digest, &mut digest).ok()?;
    Some(RepoDigest {
        repository: repository.to_string(),
        digest,
    })
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn pull(&self, reference: &str) -> Result<()> {
        info!(reference, "pulling image");
        let args = vec!["pull".to_string(), reference.to_string()];
        self.exec("docker pull", &args).await?;
        Ok(())
    }

    async fn run(&self, reference: &str, options: &RunOptions) -> Result<()> {
        info!(reference, name = ?options.name, detached = options.detached, "starting container");
        let stdout = self.exec("docker run", &run_args(reference, options)).await?;
        if options.detached {
            let id = stdout.trim();
            if !id.is_empty() {
                info!(container = id, "container started");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ImagePublisher for DockerCli {
    async fn push(&self, image: &str) -> Result<()> {
        info!(image, "pushing image");
        let args = vec!["push".to_string(), image.to_string()];
        self.exec("docker push", &args).await?;
        Ok(())
    }

    async fn repo_digest(&self, image: &str) -> Result<RepoDigest> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{.RepoDigests}}".to_string(),
            image.to_string(),
        ];
        let output = self.exec("docker inspect", &args).await?;
        parse_repo_digest(&output).ok_or_else(|| RuntimeError::MissingRepoDigest {
            image: image.to_string(),
            output: output.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn run_args_orders_flags_env_reference_cmd() {
        let mut options = RunOptions {
            name: Some("avs-1".to_string()),
            detached: true,
            cmd: vec!["serve".to_string(), "--port=8080".to_string()],
            ..Default::default()
        };
        options.env.insert("RELEASE_ID".to_string(), "7".to_string());
        options.env.insert("AVS_ADDRESS".to_string(), "0xabc".to_string());

        assert_eq!(
            run_args("ghcr.io/org/img@sha256:aa", &options),
            vec![
                "run",
                "--name",
                "avs-1",
                "-d",
                "-e",
                "AVS_ADDRESS=0xabc",
                "-e",
                "RELEASE_ID=7",
                "ghcr.io/org/img@sha256:aa",
                "serve",
                "--port=8080",
            ]
        );
    }

    #[test]
    fn run_args_minimal() {
        assert_eq!(run_args("img", &RunOptions::default()), vec!["run", "img"]);
    }

    #[test]
    fn run_args_skips_empty_name() {
        let options = RunOptions {
            name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(run_args("img", &options), vec!["run", "img"]);
    }

    #[test]
    fn parses_bracketed_repo_digests() {
        let output = format!("[ghcr.io/org/avs@sha256:{HEX}]\n");
        let parsed = parse_repo_digest(&output).expect("digest");
        assert_eq!(parsed.repository, "ghcr.io/org/avs");
        assert_eq!(parsed.digest, [0xaa; 32]);
    }

    #[test]
    fn first_well_formed_entry_wins() {
        let output = format!("[broken@sha256:12 docker.io/org/avs@sha256:{HEX}]");
        let parsed = parse_repo_digest(&output).expect("digest");
        assert_eq!(parsed.repository, "docker.io/org/avs");
    }

    #[test]
    fn empty_repo_digests_yield_none() {
        assert!(parse_repo_digest("[]").is_none());
        assert!(parse_repo_digest("").is_none());
        assert!(parse_repo_digest("ghcr.io/org/avs:latest").is_none());
    }

    #[test]
    fn default_engine_is_docker() {
        assert_eq!(DockerCli::default().binary(), "docker");
        assert_eq!(DockerCli::with_binary("podman").binary(), "podman");
    }
}
