//! Error types for container-runtime

use thiserror::Error;

/// Errors raised while driving the container engine
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The engine binary could not be started at all
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran and exited unsuccessfully
    #[error("{op} failed ({status}): {output}")]
    CommandFailed {
        op: String,
        status: String,
        output: String,
    },

    /// `inspect` output did not contain a usable `repo@sha256:<hex>` entry
    #[error("no repository digest found for {image} in {output:?}")]
    MissingRepoDigest { image: String, output: String },
}
