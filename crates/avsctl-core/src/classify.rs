//! Ledger read failures to operator guidance.
//!
//! The release manager reports "no releases" and "bad id" as Solidity
//! panics, which reach us as text. This module is the only place that
//! rewrites such text; the table is deliberately small and anything it does
//! not recognise is passed through untouched.
//!
//! Known fragility: a node or contract upgrade that rewords these panics
//! silently disables classification (errors still surface, unrewritten).

use std::fmt;

use release_ledger::{LedgerError, OperatorSet, ReleaseId};

use crate::error::AvsctlError;

/// Which release a lookup asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseQuery {
    Latest,
    Id(ReleaseId),
}

impl ReleaseQuery {
    pub fn from_option(id: Option<ReleaseId>) -> Self {
        id.map_or(ReleaseQuery::Latest, ReleaseQuery::Id)
    }
}

impl fmt::Display for ReleaseQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseQuery::Latest => f.write_str("latest"),
            ReleaseQuery::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Empty release list: `latest` underflows computing `len - 1`.
const NO_RELEASES: &[&str] = &["arithmetic underflow", "NoReleases"];

/// Release id past the end of the list.
const OUT_OF_RANGE: &[&str] = &["array out-of-bounds"];

fn matches_any(message: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| message.contains(p))
}

/// Rewrite a release lookup failure into guidance where the cause is known.
pub fn classify_read_error(err: LedgerError, query: ReleaseQuery, set: OperatorSet) -> AvsctlError {
    let Some(message) = err.read_message() else {
        return AvsctlError::LedgerRead(err);
    };

    match query {
        ReleaseQuery::Latest if matches_any(message, NO_RELEASES) => {
            AvsctlError::NoReleasesAvailable {
                avs: set.avs,
                operator_set_id: set.id,
            }
        }
        _ if matches_any(message, OUT_OF_RANGE) => AvsctlError::ReleaseNotFound { query, total: None },
        _ => AvsctlError::LedgerRead(err),
    }
}
