//! avsctl - on-chain AVS releases as running containers
//!
//! The `avsctl` command resolves releases recorded in the release manager
//! contract into pinned image references and starts them, and publishes new
//! releases and metadata back to the contract.
//!
//! ## Commands
//!
//! - `run`: pull and start the latest (or a given) release
//! - `pull`: pull release images without starting anything
//! - `push`: push images and publish them as a new release
//! - `metadata`: set or show the operator set's metadata URI
//! - `release`: inspect published releases
//! - `context`: manage saved defaults for the flags above
//! - `network`: show the connected chain and release manager

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use avsctl_core::config::parse_env_pair;
use avsctl_core::controller::artifact_references;
use avsctl_core::publish::{publish_release, set_metadata_uri};
use avsctl_core::target::parse_address;
use avsctl_core::{
    build_reference, classify_read_error, digest_to_reference_string, resolve_release,
    ArtifactSelection, CliConfig, ConfigStore, ContextConfig, ContextUpdate, Controller, PushSpec,
    ReleaseQuery, RunSpec, Target, TargetArgs,
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use container_runtime::{DockerCli, DEFAULT_ENGINE};
use release_ledger::{
    chain_name, resolve_release_manager, signer_from_credentials, LedgerTransport, ReleaseId,
    ReleaseLedger, ReleaseManagerClient, RpcTransport, Signer,
};
use tracing::{debug, info, warn, Level};

#[derive(Parser)]
#[command(name = "avsctl")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run and publish AVS releases from the on-chain release manager", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which operator set, where, and through which contract.
#[derive(Args, Debug, Clone, Default)]
struct TargetFlags {
    /// AVS contract address (uses context if not provided)
    #[arg(long)]
    avs: Option<String>,

    /// Operator set ID (uses context if not provided)
    #[arg(long)]
    operator_set: Option<u32>,

    /// ReleaseManager contract address (uses chain default if not provided)
    #[arg(long)]
    release_manager: Option<String>,

    /// Ethereum RPC URL (uses context if not provided)
    #[arg(long, env = "AVSCTL_RPC_URL")]
    rpc_url: Option<String>,
}

impl From<TargetFlags> for TargetArgs {
    fn from(flags: TargetFlags) -> Self {
        TargetArgs {
            avs: flags.avs,
            operator_set: flags.operator_set,
            release_manager: flags.release_manager,
            rpc_url: flags.rpc_url,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct EngineFlags {
    /// Container engine binary
    #[arg(long = "docker-bin", env = "AVSCTL_DOCKER", default_value = DEFAULT_ENGINE)]
    binary: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an AVS release in Docker
    Run(RunArgs),

    /// Pull the images of a release without starting them
    Pull(PullArgs),

    /// Push Docker images and publish them as an on-chain release
    Push(PushArgs),

    /// Manage metadata URIs for operator sets
    Metadata {
        #[command(subcommand)]
        action: MetadataAction,
    },

    /// Inspect published releases
    Release {
        #[command(subcommand)]
        action: ReleaseAction,
    },

    /// Manage named contexts
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Show the connected chain and its release manager
    Network {
        #[command(flatten)]
        target: TargetFlags,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    target: TargetFlags,

    #[command(flatten)]
    engine: EngineFlags,

    /// Specific release ID (defaults to latest)
    #[arg(long)]
    release_id: Option<ReleaseId>,

    /// Container name (defaults to `<context name>-<unix time>`)
    #[arg(long)]
    name: Option<String>,

    /// Run container in background
    #[arg(short, long)]
    detach: bool,

    /// Environment variables (KEY=VALUE), applied over the context's
    #[arg(short, long)]
    env: Vec<String>,

    /// Start every artifact of the release, not just the first
    #[arg(long)]
    all: bool,

    /// Command to run in the container; takes the remaining arguments
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    cmd: Vec<String>,
}

#[derive(Args, Debug)]
struct PullArgs {
    #[command(flatten)]
    target: TargetFlags,

    #[command(flatten)]
    engine: EngineFlags,

    /// Specific release ID (defaults to latest)
    #[arg(long)]
    release_id: Option<ReleaseId>,

    /// Pull every artifact of the release, not just the first
    #[arg(long)]
    all: bool,
}

#[derive(Args, Debug)]
struct PushArgs {
    #[command(flatten)]
    target: TargetFlags,

    #[command(flatten)]
    engine: EngineFlags,

    /// Docker image(s) to push (e.g., myregistry.io/myimage:tag)
    #[arg(long, required = true)]
    image: Vec<String>,

    /// Override the repository recorded on-chain (uses the image's by default)
    #[arg(long)]
    registry: Option<String>,

    /// Unix timestamp for upgrade deadline (defaults to 30 days from now)
    #[arg(long)]
    upgrade_by_time: Option<u32>,

    /// Gas limit for transaction
    #[arg(long)]
    gas_limit: Option<u64>,

    /// Skip Docker push (assumes image already in registry)
    #[arg(long)]
    skip_docker_push: bool,
}

#[derive(Subcommand)]
enum MetadataAction {
    /// Set metadata URI for an operator set
    Set {
        #[command(flatten)]
        target: TargetFlags,

        /// Metadata URI (e.g., https://example.com/metadata.json)
        #[arg(long)]
        uri: String,

        /// Gas limit for transaction
        #[arg(long)]
        gas_limit: Option<u64>,
    },
    /// Show the metadata URI of an operator set
    Get {
        #[command(flatten)]
        target: TargetFlags,
    },
}

#[derive(Subcommand)]
enum ReleaseAction {
    /// Show a release and its image references
    Show {
        #[command(flatten)]
        target: TargetFlags,

        /// Specific release ID (defaults to latest)
        #[arg(long)]
        release_id: Option<ReleaseId>,
    },
    /// Print the number of releases
    Count {
        #[command(flatten)]
        target: TargetFlags,
    },
    /// Print the upgrade deadline of the latest release
    Deadline {
        #[command(flatten)]
        target: TargetFlags,
    },
}

#[derive(Subcommand)]
enum ContextAction {
    /// Create a new context
    Create {
        /// Context name
        #[arg(long)]
        name: String,

        /// Switch to the new context
        #[arg(long = "use")]
        make_current: bool,

        #[command(flatten)]
        fields: ContextFields,
    },
    /// Switch the current context
    Use {
        /// Context name
        name: String,
    },
    /// List contexts
    List,
    /// Show a context (defaults to the current one), secrets masked
    Show {
        /// Context name
        name: Option<String>,
    },
    /// Set properties of the current context
    Set {
        /// Set the container name prefix
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        fields: ContextFields,
    },
    /// Delete a context
    Delete {
        /// Context name
        name: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct ContextFields {
    /// Set the AVS contract address
    #[arg(long)]
    avs_address: Option<String>,

    /// Set the operator set ID
    #[arg(long)]
    operator_set_id: Option<u32>,

    /// Set the Ethereum RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Set the release manager contract address
    #[arg(long)]
    release_manager: Option<String>,

    /// Set environment variables (KEY=VALUE)
    #[arg(long)]
    env: Vec<String>,

    /// Set ECDSA private key (hex encoded)
    #[arg(long)]
    ecdsa_private_key: Option<String>,

    /// Set path to keystore file
    #[arg(long)]
    keystore_path: Option<PathBuf>,

    /// Set keystore password
    #[arg(long)]
    keystore_password: Option<String>,
}

impl ContextFields {
    fn into_update(self, name: Option<String>) -> ContextUpdate {
        ContextUpdate {
            avs_address: self.avs_address,
            operator_set_id: self.operator_set_id,
            release_manager: self.release_manager,
            rpc_url: self.rpc_url,
            name,
            env: self.env,
            ecdsa_private_key: self.ecdsa_private_key,
            keystore_path: self.keystore_path,
            keystore_password: self.keystore_password,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    avsctl_core::telemetry::init_tracing(cli.json, level);

    let store = ConfigStore::from_env().context("Failed to locate avsctl configuration")?;

    // Dropping the command future kills any engine subprocess and aborts
    // in-flight RPC requests.
    tokio::select! {
        result = dispatch(cli.command, &store) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted");
            anyhow::bail!("interrupted")
        }
    }
}

async fn dispatch(command: Commands, store: &ConfigStore) -> Result<()> {
    match command {
        Commands::Run(args) => cmd_run(store, args).await,
        Commands::Pull(args) => cmd_pull(store, args).await,
        Commands::Push(args) => cmd_push(store, args).await,
        Commands::Metadata { action } => match action {
            MetadataAction::Set {
                target,
                uri,
                gas_limit,
            } => cmd_metadata_set(store, target, &uri, gas_limit).await,
            MetadataAction::Get { target } => cmd_metadata_get(store, target).await,
        },
        Commands::Release { action } => match action {
            ReleaseAction::Show { target, release_id } => {
                cmd_release_show(store, target, release_id).await
            }
            ReleaseAction::Count { target } => cmd_release_count(store, target).await,
            ReleaseAction::Deadline { target } => cmd_release_deadline(store, target).await,
        },
        Commands::Context { action } => match action {
            ContextAction::Create {
                name,
                make_current,
                fields,
            } => cmd_context_create(store, &name, make_current, fields),
            ContextAction::Use { name } => cmd_context_use(store, &name),
            ContextAction::List => cmd_context_list(store),
            ContextAction::Show { name } => cmd_context_show(store, name.as_deref()),
            ContextAction::Set { name, fields } => cmd_context_set(store, name, fields),
            ContextAction::Delete { name } => cmd_context_delete(store, &name),
        },
        Commands::Network { target } => cmd_network(store, target).await,
    }
}

// ========== Shared plumbing ==========

fn load_config(store: &ConfigStore) -> Result<CliConfig> {
    store
        .load()
        .with_context(|| format!("Failed to load configuration from {}", store.path().display()))
}

/// Resolve flags against the current context.
fn load_target(store: &ConfigStore, flags: TargetFlags) -> Result<(CliConfig, Target)> {
    let config = load_config(store)?;
    let target = TargetArgs::from(flags).resolve(config.current_or_none())?;
    debug!(operator_set = %target.operator_set, rpc_url = %target.rpc_url, "target resolved");
    Ok((config, target))
}

/// Signer configured in the current context.
fn context_signer(config: &CliConfig) -> Result<Arc<dyn Signer>> {
    let credentials = config
        .current_or_none()
        .map(ContextConfig::signer_credentials)
        .unwrap_or_default();
    let signer = signer_from_credentials(&credentials)?;
    debug!(signer = %signer.address(), "signer loaded");
    Ok(signer)
}

/// Open a ledger client for one command. The connection closes when the
/// client is dropped.
async fn connect(
    target: &Target,
    signer: Option<Arc<dyn Signer>>,
) -> Result<ReleaseManagerClient<RpcTransport>> {
    let transport = RpcTransport::connect(&target.rpc_url)?;
    let contract = resolve_release_manager(&transport, target.release_manager)
        .await
        .context("Failed to resolve release manager address")?;

    let client = ReleaseManagerClient::new(transport, contract);
    let client = match signer {
        Some(signer) => client.with_signer(signer),
        None => client,
    };
    debug!(
        contract = %client.contract(),
        signer = ?client.signer_address(),
        "release manager client ready"
    );
    Ok(client)
}

fn selection(all: bool) -> ArtifactSelection {
    if all {
        ArtifactSelection::All
    } else {
        ArtifactSelection::First
    }
}

fn format_deadline(upgrade_by_time: u32) -> String {
    match DateTime::from_timestamp(i64::from(upgrade_by_time), 0) {
        Some(at) => format!("{upgrade_by_time} ({})", at.to_rfc3339()),
        None => upgrade_by_time.to_string(),
    }
}

/// `<prefix>-<unix seconds>`, the prefix being the context's container
/// name, else the context's own name.
fn default_container_name(context: Option<(&str, &ContextConfig)>, now: DateTime<Utc>) -> String {
    let prefix = context
        .map(|(key, ctx)| {
            ctx.name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| key.to_string())
        })
        .unwrap_or_else(|| "avsctl".to_string());
    format!("{prefix}-{}", now.timestamp())
}

/// Context environment with `-e` flags applied on top.
fn merge_env(
    context: Option<&ContextConfig>,
    flags: &[String],
) -> avsctl_core::Result<BTreeMap<String, String>> {
    let mut env = context
        .map(|c| c.environment_vars.clone())
        .unwrap_or_default();
    for pair in flags {
        let (key, value) = parse_env_pair(pair)?;
        env.insert(key, value);
    }
    Ok(env)
}

// ========== Release Commands ==========

async fn cmd_run(store: &ConfigStore, args: RunArgs) -> Result<()> {
    let (config, target) = load_target(store, args.target)?;
    let context = config.current().ok();

    let env = merge_env(context.map(|(_, c)| c), &args.env)?;
    let name = args
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default_container_name(context, Utc::now()));

    let client = connect(&target, None).await?;
    let runtime = DockerCli::with_binary(args.engine.binary);
    let spec = RunSpec {
        operator_set: target.operator_set,
        release_id: args.release_id,
        name: Some(name),
        detached: args.detach,
        env,
        cmd: args.cmd,
    };

    let outcome = Controller::new(&client, &runtime)
        .with_selection(selection(args.all))
        .execute(&spec)
        .await?;

    println!(
        "Release {} (upgrade by {})",
        outcome.release_id,
        format_deadline(outcome.upgrade_by_time)
    );
    for container in &outcome.containers {
        println!(
            "Started {} from {}",
            container.name.as_deref().unwrap_or("-"),
            container.reference
        );
    }
    Ok(())
}

async fn cmd_pull(store: &ConfigStore, args: PullArgs) -> Result<()> {
    let (_, target) = load_target(store, args.target)?;
    let client = connect(&target, None).await?;
    let runtime = DockerCli::with_binary(args.engine.binary);

    let outcome = Controller::new(&client, &runtime)
        .with_selection(selection(args.all))
        .pull(target.operator_set, args.release_id)
        .await?;

    println!("Pulled release {}", outcome.release_id);
    for reference in &outcome.references {
        println!("  {reference}");
    }
    Ok(())
}

async fn cmd_push(store: &ConfigStore, args: PushArgs) -> Result<()> {
    let (config, target) = load_target(store, args.target)?;
    let signer = context_signer(&config)?;
    let client = connect(&target, Some(signer)).await?;
    let publisher = DockerCli::with_binary(args.engine.binary);

    let spec = PushSpec {
        operator_set: target.operator_set,
        images: args.image,
        registry: args.registry,
        upgrade_by_time: args.upgrade_by_time,
        gas_limit: args.gas_limit,
        skip_push: args.skip_docker_push,
    };
    let outcome = publish_release(&client, &publisher, &spec, Utc::now()).await?;

    println!("Release pushed successfully!");
    println!("  Transaction:  {}", outcome.tx.hash);
    println!("  AVS:          {}", target.operator_set.avs);
    println!("  Operator Set: {}", target.operator_set.id);
    println!("  Upgrade by:   {}", format_deadline(outcome.upgrade_by_time));
    println!("  Artifacts:");
    for artifact in &outcome.artifacts {
        let reference = build_reference(
            &artifact.registry,
            &digest_to_reference_string(&artifact.digest),
        )?;
        println!("    {reference}");
    }
    Ok(())
}

async fn cmd_metadata_set(
    store: &ConfigStore,
    flags: TargetFlags,
    uri: &str,
    gas_limit: Option<u64>,
) -> Result<()> {
    let (config, target) = load_target(store, flags)?;
    let signer = context_signer(&config)?;
    let client = connect(&target, Some(signer)).await?;

    let tx = set_metadata_uri(&client, target.operator_set, uri, gas_limit).await?;

    println!("Metadata URI set successfully!");
    println!("  Transaction:  {}", tx.hash);
    println!("  AVS:          {}", target.operator_set.avs);
    println!("  Operator Set: {}", target.operator_set.id);
    println!("  URI:          {}", uri.trim());
    Ok(())
}

async fn cmd_metadata_get(store: &ConfigStore, flags: TargetFlags) -> Result<()> {
    let (_, target) = load_target(store, flags)?;
    let client = connect(&target, None).await?;

    let uri = client.metadata_uri(target.operator_set).await?;
    if uri.is_empty() {
        println!("No metadata URI set for operator set {}", target.operator_set);
        println!();
        println!("To set one, run:");
        println!("  avsctl metadata set --uri <metadata-uri>");
    } else {
        println!("{uri}");
    }
    Ok(())
}

async fn cmd_release_show(
    store: &ConfigStore,
    flags: TargetFlags,
    release_id: Option<ReleaseId>,
) -> Result<()> {
    let (_, target) = load_target(store, flags)?;
    let client = connect(&target, None).await?;

    let query = ReleaseQuery::from_option(release_id);
    let (release, id) = resolve_release(&client, target.operator_set, query).await?;

    println!("Release ID:   {id}");
    println!("Upgrade by:   {}", format_deadline(release.upgrade_by_time));
    println!("Artifacts:");
    if release.artifacts.is_empty() {
        println!("  (none)");
    }
    for reference in artifact_references(&release, ArtifactSelection::All)? {
        println!("  {reference}");
    }
    Ok(())
}

async fn cmd_release_count(store: &ConfigStore, flags: TargetFlags) -> Result<()> {
    let (_, target) = load_target(store, flags)?;
    let client = connect(&target, None).await?;

    let total = client.total_releases(target.operator_set).await?;
    println!("{total}");
    Ok(())
}

async fn cmd_release_deadline(store: &ConfigStore, flags: TargetFlags) -> Result<()> {
    let (_, target) = load_target(store, flags)?;
    let client = connect(&target, None).await?;

    let set = target.operator_set;
    let deadline = client
        .latest_upgrade_by_time(set)
        .await
        .map_err(|e| classify_read_error(e, ReleaseQuery::Latest, set))?;
    println!("{}", format_deadline(deadline));
    Ok(())
}

async fn cmd_network(store: &ConfigStore, flags: TargetFlags) -> Result<()> {
    let config = load_config(store)?;
    let context = config.current_or_none();

    let rpc_url = flags
        .rpc_url
        .filter(|u| !u.is_empty())
        .or_else(|| context.and_then(|c| c.rpc_url.clone()))
        .filter(|u| !u.is_empty())
        .context("--rpc-url is required (or set it with `avsctl context set --rpc-url <url>`)")?;
    let explicit = flags
        .release_manager
        .or_else(|| context.and_then(|c| c.release_manager.clone()))
        .filter(|rm| !rm.is_empty())
        .map(|rm| parse_address("release manager address", &rm))
        .transpose()?;

    let transport = RpcTransport::connect(&rpc_url)?;
    let chain_id = transport
        .chain_id()
        .await
        .context("Failed to get chain ID")?;

    println!("RPC URL:         {rpc_url}");
    println!("Chain:           {} ({chain_id})", chain_name(chain_id));
    match resolve_release_manager(&transport, explicit).await {
        Ok(address) => println!("Release manager: {address}"),
        Err(e) => {
            debug!(error = %e, "no release manager for chain");
            println!("Release manager: none known (pass --release-manager)");
        }
    }
    Ok(())
}

// ========== Context Commands ==========

fn cmd_context_create(
    store: &ConfigStore,
    name: &str,
    make_current: bool,
    fields: ContextFields,
) -> Result<()> {
    let update = fields.into_update(None);
    let is_current = store.update(|config| {
        let mut context = ContextConfig::default();
        if update != ContextUpdate::default() {
            context.apply(update)?;
        }
        config.create(name, context, make_current)?;
        Ok(config.current_context == name)
    })?;

    info!(context = name, "context created");
    println!("Context '{name}' created");
    if is_current {
        println!("Switched to context '{name}'");
    }
    Ok(())
}

fn cmd_context_use(store: &ConfigStore, name: &str) -> Result<()> {
    store.update(|config| config.use_context(name))?;
    println!("Switched to context '{name}'");
    Ok(())
}

fn cmd_context_delete(store: &ConfigStore, name: &str) -> Result<()> {
    store.update(|config| config.delete(name))?;
    println!("Context '{name}' deleted");
    Ok(())
}

fn cmd_context_set(store: &ConfigStore, name: Option<String>, fields: ContextFields) -> Result<()> {
    let update = fields.into_update(name);
    let (context, changed) = store.update(|config| {
        let current = config.current()?.0.to_string();
        let changed = config.current_mut()?.apply(update)?;
        Ok((current, changed))
    })?;

    info!(context = %context, fields = ?changed, "context updated");
    println!("Context '{context}' updated");
    Ok(())
}

fn cmd_context_show(store: &ConfigStore, name: Option<&str>) -> Result<()> {
    let config = load_config(store)?;
    let (name, context) = match name {
        Some(name) => config
            .contexts
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .with_context(|| format!("context '{name}' not found"))?,
        None => config.current()?,
    };

    let marker = if name == config.current_context {
        " (current)"
    } else {
        ""
    };
    println!("Context: {name}{marker}");
    println!("{}", serde_json::to_string_pretty(&context.redacted())?);
    Ok(())
}

fn cmd_context_list(store: &ConfigStore) -> Result<()> {
    let config = load_config(store)?;
    if config.contexts.is_empty() {
        println!("No contexts configured.");
        println!();
        println!("Create one with:");
        println!("  avsctl context create --name <name> --use");
        return Ok(());
    }

    println!(
        "{:<8} {:<16} {:<42} {:<12} {:<32} SIGNER",
        "CURRENT", "NAME", "AVS ADDRESS", "OPERATOR SET", "RPC URL"
    );
    for (name, context) in &config.contexts {
        let marker = if *name == config.current_context { "*" } else { "" };
        println!(
            "{:<8} {:<16} {:<42} {:<12} {:<32} {}",
            marker,
            name,
            context.avs_address.as_deref().unwrap_or("-"),
            context
                .operator_set_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            context.rpc_url.as_deref().unwrap_or("-"),
            signer_label(context),
        );
    }
    Ok(())
}

/// Signer shown in listings. Keystores are named by path and never
/// decrypted here; only a raw key is turned into an address.
fn signer_label(context: &ContextConfig) -> String {
    let credentials = context.signer_credentials();
    if !credentials.is_configured() {
        return "-".to_string();
    }
    let has_raw_key = credentials
        .private_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());
    if !has_raw_key {
        if let Some(path) = &credentials.keystore_path {
            return format!("keystore:{}", path.display());
        }
    }
    match signer_from_credentials(&credentials) {
        Ok(signer) => signer.address().to_string(),
        Err(e) => {
            debug!(error = %e, "signer unavailable");
            "(invalid)".to_string()
        }
    }
}
