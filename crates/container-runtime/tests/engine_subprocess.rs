//! `DockerCli` against stand-in engine binaries.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use container_runtime::{ContainerRuntime, DockerCli, ImagePublisher, RunOptions, RuntimeError};
use tempfile::TempDir;

/// Write an executable shell script standing in for the engine.
fn fake_engine(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("engine");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

#[tokio::test]
async fn successful_engine_calls_return_ok() {
    let engine = DockerCli::with_binary("true");
    engine.pull("ghcr.io/org/img@sha256:aa").await.expect("pull");
    engine
        .run("ghcr.io/org/img@sha256:aa", &RunOptions::default())
        .await
        .expect("run");
}

#[tokio::test]
async fn failing_engine_reports_combined_output() {
    let dir = TempDir::new().expect("tempdir");
    let script = fake_engine(&dir, "echo out-line; echo err-line >&2; exit 3");
    let engine = DockerCli::with_binary(script.to_string_lossy());

    let err = engine.pull("img").await.unwrap_err();
    match &err {
        RuntimeError::CommandFailed { op, output, .. } => {
            assert_eq!(op, "docker pull");
            assert!(output.contains("out-line"));
            assert!(output.contains("err-line"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let engine = DockerCli::with_binary("/nonexistent/avsctl-engine");
    let err = engine.pull("img").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Spawn { .. }));
}

#[tokio::test]
async fn run_passes_arguments_through() {
    let dir = TempDir::new().expect("tempdir");
    let log = dir.path().join("args.log");
    let script = fake_engine(&dir, &format!("echo \"$@\" > {}", log.display()));
    let engine = DockerCli::with_binary(script.to_string_lossy());

    let mut options = RunOptions {
        name: Some("node".to_string()),
        detached: true,
        ..Default::default()
    };
    options.env.insert("RELEASE_ID".to_string(), "7".to_string());
    engine.run("img@sha256:aa", &options).await.expect("run");

    let recorded = std::fs::read_to_string(&log).expect("log");
    assert_eq!(recorded.trim(), "run --name node -d -e RELEASE_ID=7 img@sha256:aa");
}

#[tokio::test]
async fn repo_digest_parses_inspect_output() {
    let dir = TempDir::new().expect("tempdir");
    let hex = "ab".repeat(32);
    let script = fake_engine(&dir, &format!("echo '[ghcr.io/org/avs@sha256:{hex}]'"));
    let engine = DockerCli::with_binary(script.to_string_lossy());

    let digest = engine.repo_digest("ghcr.io/org/avs:v1").await.expect("digest");
    assert_eq!(digest.repository, "ghcr.io/org/avs");
    assert_eq!(digest.digest, [0xab; 32]);
}

#[tokio::test]
async fn repo_digest_missing_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let script = fake_engine(&dir, "echo '[]'");
    let engine = DockerCli::with_binary(script.to_string_lossy());

    let err = engine.repo_digest("local-only:dev").await.unwrap_err();
    assert!(matches!(err, RuntimeError::MissingRepoDigest { .. }));
}
