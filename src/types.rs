//! Core types shared across the policy tooling

use std::path::PathBuf;
use thiserror::Error;

/// Screener keys read from and written to a sector's `screener_urls`
pub mod keys {
    pub const UNIVERSE: &str = "universe";
    pub const PULLBACK: &str = "pullback";
    pub const BREAKOUT: &str = "breakout";
    pub const GOLDEN_CROSS: &str = "golden_cross";

    pub const UNIVERSE_BEARISH: &str = "universe_bearish";
    pub const BOUNCE_BEARISH: &str = "bounce_bearish";
    pub const BREAKDOWN_BEARISH: &str = "breakdown_bearish";
    pub const DEATH_CROSS_BEARISH: &str = "death_cross_bearish";

    /// Any key containing this marker is treated as derived output
    pub const BEARISH_MARKER: &str = "bearish";
}

/// Errors raised while loading, transforming or writing a policy file
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to access policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy JSON {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize policy: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("policy document has no \"sectors\" array")]
    MissingSectors,

    #[error("sector #{index} is not a JSON object")]
    InvalidSector { index: usize },

    #[error("sector #{index} has screener_urls but no \"name\"")]
    MissingSectorName { index: usize },

    #[error("policy missing security section")]
    MissingSecuritySection,
}

pub type PolicyResult<T> = Result<T, PolicyError>;

/// What happened to a single sector during a transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectorOutcome {
    /// Sector has no `screener_urls`; left untouched
    Untouched,
    /// Sector is on the skip list; no bearish screeners emitted
    Skipped { removed: usize },
    /// Bearish screeners derived and merged
    Updated {
        removed: usize,
        added: Vec<String>,
    },
}

/// Per-sector entry of a [`TransformReport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorReport {
    pub name: Option<String>,
    pub outcome: SectorOutcome,
}

/// Summary of a whole-document transform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub sectors: Vec<SectorReport>,
}

impl TransformReport {
    /// Total number of bearish screeners written
    pub fn total_added(&self) -> usize {
        self.sectors
            .iter()
            .map(|s| match &s.outcome {
                SectorOutcome::Updated { added, .. } => added.len(),
                _ => 0,
            })
            .sum()
    }

    /// Total number of stale bearish keys deleted before recomputation
    pub fn total_removed(&self) -> usize {
        self.sectors
            .iter()
            .map(|s| match &s.outcome {
                SectorOutcome::Updated { removed, .. } | SectorOutcome::Skipped { removed } => {
                    *removed
                }
                SectorOutcome::Untouched => 0,
            })
            .sum()
    }

    /// Names of sectors skipped by the correction policy
    pub fn skipped(&self) -> Vec<&str> {
        self.sectors
            .iter()
            .filter(|s| matches!(s.outcome, SectorOutcome::Skipped { .. }))
            .filter_map(|s| s.name.as_deref())
            .collect()
    }
}
