//! Policy document load / transform / save
//!
//! The document is kept as an order-preserving JSON value so that every
//! field the transform does not touch is written back unchanged and in
//! place. Only [`PolicyDocument::load`] and [`PolicyDocument::save`] touch
//! the filesystem.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::TransformConfig;
use crate::derive::{create_bearish_urls, Derivation};
use crate::types::{keys, PolicyError, PolicyResult, SectorOutcome, SectorReport, TransformReport};

const SECTORS: &str = "sectors";
const SCREENER_URLS: &str = "screener_urls";
const NAME: &str = "name";

/// A parsed policy file
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDocument {
    root: Value,
}

impl PolicyDocument {
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn parse(contents: &str, path: impl AsRef<Path>) -> PolicyResult<Self> {
        let root = serde_json::from_str(contents).map_err(|source| PolicyError::Parse {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Read and parse a policy file
    pub fn load(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc = Self::parse(&contents, path)?;
        debug!("Loaded policy from {}", path.display());
        Ok(doc)
    }

    /// Render as 2-space indented JSON, non-ASCII left literal
    pub fn to_pretty_string(&self) -> PolicyResult<String> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    /// Overwrite `path` with this document
    ///
    /// Written to a sibling temporary file first and renamed into place.
    pub fn save(&self, path: impl AsRef<Path>) -> PolicyResult<()> {
        let path = path.as_ref();
        let contents = self.to_pretty_string()?;
        let tmp = temp_path(path);

        let io_err = |source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::write(&tmp, contents).map_err(io_err)?;
        if let Err(source) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(source));
        }

        info!("Wrote policy to {}", path.display());
        Ok(())
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Sector entries, or an error if the document has no `sectors` array
    pub fn sectors(&self) -> PolicyResult<&Vec<Value>> {
        self.root
            .get(SECTORS)
            .and_then(Value::as_array)
            .ok_or(PolicyError::MissingSectors)
    }

    /// Screener URLs of the named sector
    pub fn screener_urls(&self, sector_name: &str) -> Option<&Map<String, Value>> {
        self.sectors()
            .ok()?
            .iter()
            .find(|s| s.get(NAME).and_then(Value::as_str) == Some(sector_name))?
            .get(SCREENER_URLS)?
            .as_object()
    }

    /// Derive and merge bearish screeners for every sector
    ///
    /// Validation runs over all sectors before any is modified, so on error
    /// the returned document is never half-transformed.
    pub fn transform(mut self, config: &TransformConfig) -> PolicyResult<(Self, TransformReport)> {
        let sectors = self
            .root
            .get_mut(SECTORS)
            .and_then(Value::as_array_mut)
            .ok_or(PolicyError::MissingSectors)?;

        for (index, sector) in sectors.iter().enumerate() {
            let sector = sector
                .as_object()
                .ok_or(PolicyError::InvalidSector { index })?;
            if sector.contains_key(SCREENER_URLS) && !sector.contains_key(NAME) {
                return Err(PolicyError::MissingSectorName { index });
            }
        }

        let mut report = TransformReport::default();
        for sector in sectors.iter_mut() {
            // Checked above
            let Some(sector) = sector.as_object_mut() else {
                continue;
            };
            report.sectors.push(transform_sector(sector, config));
        }

        Ok((self, report))
    }
}

fn transform_sector(sector: &mut Map<String, Value>, config: &TransformConfig) -> SectorReport {
    let name = sector.get(NAME).map(display_name);

    let urls = sector.get_mut(SCREENER_URLS).and_then(Value::as_object_mut);
    let (Some(sector_name), Some(urls)) = (name.clone(), urls) else {
        return SectorReport {
            name,
            outcome: SectorOutcome::Untouched,
        };
    };

    info!("Processing {}...", sector_name);

    let mut removed = 0;
    if config.policy.clear_stale {
        let before = urls.len();
        urls.retain(|k, _| !k.contains(keys::BEARISH_MARKER));
        removed = before - urls.len();
        if removed > 0 {
            debug!("{}: cleared {} stale bearish screeners", sector_name, removed);
        }
    }

    let outcome = match create_bearish_urls(urls, &sector_name, config) {
        Derivation::Skipped => {
            info!("  [SKIP] No bearish screeners added");
            SectorOutcome::Skipped { removed }
        }
        Derivation::Derived(bearish) => {
            if bearish.is_empty() {
                info!("  [SKIP] No bearish screeners added");
            } else {
                info!("  [OK] Added {} bearish screeners", bearish.len());
            }
            let added = bearish.keys().cloned().collect();
            urls.extend(bearish);
            SectorOutcome::Updated { removed, added }
        }
    };

    SectorReport { name, outcome }
}

/// Sector name as text; non-string names use their JSON rendering
fn display_name(name: &Value) -> String {
    match name {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
