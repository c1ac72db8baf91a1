//! Push and metadata flows against the in-memory ledger.

use avsctl_core::publish::{
    publish_release, set_metadata_uri, PushSpec, DEFAULT_METADATA_GAS_LIMIT,
    DEFAULT_RELEASE_GAS_LIMIT,
};
use avsctl_core::AvsctlError;
use chrono::{TimeZone, Utc};
use container_runtime::fakes::{RecordingRuntime, RuntimeCall};
use container_runtime::RepoDigest;
use release_ledger::fakes::{MemoryReleaseLedger, PublishedWrite};
use release_ledger::{Address, Artifact, LedgerError, OperatorSet, ReleaseLedger};

fn set() -> OperatorSet {
    OperatorSet::new(Address::repeat_byte(0x0b), 2)
}

fn spec(images: &[&str]) -> PushSpec {
    PushSpec {
        operator_set: set(),
        images: images.iter().map(|s| s.to_string()).collect(),
        registry: None,
        upgrade_by_time: None,
        gas_limit: None,
        skip_push: false,
    }
}

fn runtime_with(image: &str, repository: &str, byte: u8) -> RecordingRuntime {
    let runtime = RecordingRuntime::new();
    runtime.set_repo_digest(
        image,
        RepoDigest {
            repository: repository.to_string(),
            digest: [byte; 32],
        },
    );
    runtime
}

#[tokio::test]
async fn push_requires_metadata_before_touching_docker() {
    let ledger = MemoryReleaseLedger::new();
    let runtime = runtime_with("img:v1", "ghcr.io/org/img", 0xaa);

    let err = publish_release(&ledger, &runtime, &spec(&["img:v1"]), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AvsctlError::MetadataUriNotSet { operator_set_id: 2, .. }));
    assert!(err.to_string().contains("avsctl metadata set --uri"));
    assert!(runtime.calls().is_empty());
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn push_publishes_digests_with_defaults() {
    let ledger = MemoryReleaseLedger::new();
    ledger.set_metadata(set(), "https://example.com/avs.json");
    let runtime = runtime_with("img:v1", "ghcr.io/org/img", 0xaa);
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

    let outcome = publish_release(&ledger, &runtime, &spec(&["img:v1"]), now)
        .await
        .expect("publish");

    assert_eq!(
        runtime.calls(),
        vec![
            RuntimeCall::Push("img:v1".to_string()),
            RuntimeCall::Inspect("img:v1".to_string()),
        ]
    );
    assert_eq!(outcome.artifacts, vec![Artifact::new("ghcr.io/org/img", [0xaa; 32])]);
    assert_eq!(
        i64::from(outcome.upgrade_by_time),
        now.timestamp() + 30 * 24 * 3600
    );

    match &ledger.writes()[..] {
        [PublishedWrite::Release { release, gas_limit, .. }] => {
            assert_eq!(*gas_limit, DEFAULT_RELEASE_GAS_LIMIT);
            assert_eq!(release.artifacts, outcome.artifacts);
        }
        other => panic!("unexpected writes {other:?}"),
    }

    let (latest, id) = ledger.latest_release(set()).await.expect("latest");
    assert_eq!(id, 0);
    assert_eq!(latest.upgrade_by_time, outcome.upgrade_by_time);
}

#[tokio::test]
async fn push_honours_overrides() {
    let ledger = MemoryReleaseLedger::new();
    ledger.set_metadata(set(), "ipfs://meta");
    let runtime = runtime_with("img:v2", "docker.io/org/img", 0x01);

    let mut spec = spec(&["img:v2"]);
    spec.skip_push = true;
    spec.registry = Some("registry.example.com/mirror/img".to_string());
    spec.upgrade_by_time = Some(1_900_000_000);
    spec.gas_limit = Some(900_000);

    let outcome = publish_release(&ledger, &runtime, &spec, Utc::now())
        .await
        .expect("publish");

    assert_eq!(runtime.calls(), vec![RuntimeCall::Inspect("img:v2".to_string())]);
    assert_eq!(outcome.artifacts[0].registry, "registry.example.com/mirror/img");
    assert_eq!(outcome.upgrade_by_time, 1_900_000_000);
    assert!(matches!(
        ledger.writes()[0],
        PublishedWrite::Release { gas_limit: 900_000, .. }
    ));
}

#[tokio::test]
async fn push_without_images_is_invalid() {
    let ledger = MemoryReleaseLedger::new();
    let runtime = RecordingRuntime::new();
    let err = publish_release(&ledger, &runtime, &spec(&[]), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AvsctlError::InvalidInput(_)));
}

#[tokio::test]
async fn push_image_failure_stops_before_publishing() {
    let ledger = MemoryReleaseLedger::new();
    ledger.set_metadata(set(), "ipfs://meta");
    let runtime = runtime_with("img:v1", "ghcr.io/org/img", 0xaa);
    runtime.fail("push", "denied: requested access to the resource is denied");

    let err = publish_release(&ledger, &runtime, &spec(&["img:v1"]), Utc::now())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to push image"));
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn push_without_signer_fails_at_submission() {
    let ledger = MemoryReleaseLedger::read_only();
    ledger.set_metadata(set(), "ipfs://meta");
    let runtime = runtime_with("img:v1", "ghcr.io/org/img", 0xaa);

    let err = publish_release(&ledger, &runtime, &spec(&["img:v1"]), Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "signer required for pushing releases");
}

#[tokio::test]
async fn rejected_transaction_surfaces_ledger_message_after_docker_work() {
    let ledger = MemoryReleaseLedger::new();
    ledger.set_metadata(set(), "ipfs://meta");
    ledger.fail_writes("insufficient funds for gas * price + value");
    let runtime = runtime_with("img:v1", "ghcr.io/org/img", 0xaa);

    let err = publish_release(&ledger, &runtime, &spec(&["img:v1"]), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AvsctlError::Ledger(LedgerError::Write { .. })));
    assert_eq!(
        err.to_string(),
        "failed to send transaction: insufficient funds for gas * price + value"
    );
    assert_eq!(runtime.calls().len(), 2);
    assert!(ledger.writes().is_empty());
    assert_eq!(ledger.total_releases(set()).await.unwrap(), 0);

    let err = set_metadata_uri(&ledger, set(), "ipfs://meta2", None)
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to send transaction"));
    assert_eq!(ledger.metadata_uri(set()).await.unwrap(), "ipfs://meta");
}

#[tokio::test]
async fn metadata_set_uses_default_gas_and_updates_ledger() {
    let ledger = MemoryReleaseLedger::new();

    let tx = set_metadata_uri(&ledger, set(), " https://example.com/avs.json ", None)
        .await
        .expect("set");
    assert_eq!(tx.nonce, 0);
    assert!(matches!(
        &ledger.writes()[0],
        PublishedWrite::MetadataUri { gas_limit, uri, .. }
            if *gas_limit == DEFAULT_METADATA_GAS_LIMIT && uri == "https://example.com/avs.json"
    ));
    assert_eq!(
        ledger.metadata_uri(set()).await.unwrap(),
        "https://example.com/avs.json"
    );
}

#[tokio::test]
async fn metadata_set_rejects_empty_uri() {
    let ledger = MemoryReleaseLedger::new();
    let err = set_metadata_uri(&ledger, set(), "  ", Some(1)).await.unwrap_err();
    assert!(matches!(err, AvsctlError::InvalidInput(_)));
    assert!(ledger.writes().is_empty());
}
