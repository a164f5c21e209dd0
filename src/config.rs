//! Transform configuration
//!
//! Describes how bearish screeners are derived from their bullish sources:
//! the replacement rule table, the correction policy layered on top of it,
//! and the sector filter table. Both historical behaviours are presets of
//! the same structure (see [`Variant`]); a JSON file can override either.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::types::keys;

/// Default location of the policy file, relative to the working directory
pub const DEFAULT_POLICY_PATH: &str = "data/policy.v1.json";

/// Main transform configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub rules: Vec<DerivationRule>,
    pub policy: CorrectionPolicy,
    pub sector_filters: SectorFilters,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig::for_variant(Variant::Corrected)
    }
}

impl TransformConfig {
    /// Build the preset for one of the two historical behaviours
    pub fn for_variant(variant: Variant) -> Self {
        let policy = match variant {
            Variant::Naive => CorrectionPolicy::none(),
            Variant::Corrected => CorrectionPolicy::default(),
        };

        TransformConfig {
            rules: DerivationRule::defaults(),
            policy,
            sector_filters: SectorFilters::default(),
        }
    }

    /// Load configuration from JSON file
    ///
    /// Omitted fields fall back to the corrected preset.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read transform config {}", path.display()))?;
        let config: TransformConfig =
            serde_json::from_str(&contents).context("Failed to parse transform config JSON")?;
        Ok(config)
    }

    /// Find the rule producing `target`
    pub fn rule_for(&self, target: &str) -> Option<&DerivationRule> {
        self.rules.iter().find(|r| r.target == target)
    }
}

/// Which historical behaviour to reproduce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Plain substitutions, merged over whatever is already there
    Naive,
    /// Substitutions plus sector skips, fragment removal, volume filter
    /// and stale-key cleanup
    #[default]
    Corrected,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variant::Naive => write!(f, "naive"),
            Variant::Corrected => write!(f, "corrected"),
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "naive" => Ok(Variant::Naive),
            "corrected" | "fixed" => Ok(Variant::Corrected),
            other => Err(format!(
                "unknown variant '{}', expected 'naive' or 'corrected'",
                other
            )),
        }
    }
}

/// Literal substring substitution, applied to every occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

impl Replacement {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// One bullish → bearish derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationRule {
    /// Existing screener key the URL is read from
    pub source: String,
    /// Screener key the derived URL is written to
    pub target: String,
    /// Applied in order
    pub replacements: Vec<Replacement>,
}

impl DerivationRule {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        replacements: Vec<Replacement>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            replacements,
        }
    }

    /// The four standard derivations
    pub fn defaults() -> Vec<DerivationRule> {
        let below_sma200 = || Replacement::new("ta_sma200_pa", "ta_sma200_pb");

        vec![
            // Stocks in downtrends
            DerivationRule::new(keys::UNIVERSE, keys::UNIVERSE_BEARISH, vec![below_sma200()]),
            // Bear flag: bounce above SMA50 inside a downtrend, RSI overbought
            DerivationRule::new(
                keys::PULLBACK,
                keys::BOUNCE_BEARISH,
                vec![
                    below_sma200(),
                    Replacement::new("ta_sma50_pb", "ta_sma50_pa"),
                    Replacement::new("ta_rsi_os40", "ta_rsi_ob60"),
                ],
            ),
            // 52-week lows
            DerivationRule::new(
                keys::BREAKOUT,
                keys::BREAKDOWN_BEARISH,
                vec![
                    below_sma200(),
                    Replacement::new("ta_highlow52w_nh", "ta_highlow52w_nl"),
                ],
            ),
            // SMA50 crossing below SMA200
            DerivationRule::new(
                keys::GOLDEN_CROSS,
                keys::DEATH_CROSS_BEARISH,
                vec![
                    below_sma200(),
                    Replacement::new("ta_sma50_pa200", "ta_sma50_pb200"),
                    Replacement::new("ta_pattern_tlsupport", "ta_pattern_tlresistance"),
                ],
            ),
        ]
    }

    /// Apply the replacement chain to a source URL
    pub fn apply(&self, url: &str) -> String {
        self.replacements
            .iter()
            .fold(url.to_string(), |acc, r| acc.replace(&r.from, &r.to))
    }
}

/// Extra rules layered over the derivation table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionPolicy {
    /// Sectors that never get bearish screeners
    pub skip_sectors: Vec<String>,
    pub fragment_removal: Option<FragmentRemoval>,
    pub volume_filter: Option<VolumeFilter>,
    /// Delete every existing bearish key before recomputing
    pub clear_stale: bool,
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        CorrectionPolicy {
            // Incompatible with trend-following
            skip_sectors: vec!["Utilities".to_string(), "Energy".to_string()],
            fragment_removal: Some(FragmentRemoval::default()),
            volume_filter: Some(VolumeFilter::default()),
            clear_stale: true,
        }
    }
}

impl CorrectionPolicy {
    /// No corrections at all
    pub fn none() -> Self {
        CorrectionPolicy {
            skip_sectors: Vec::new(),
            fragment_removal: None,
            volume_filter: None,
            clear_stale: false,
        }
    }

    pub fn skips(&self, sector_name: &str) -> bool {
        self.skip_sectors.iter().any(|s| s == sector_name)
    }
}

/// Filter tokens stripped from one derived screener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRemoval {
    pub target: String,
    pub fragments: Vec<String>,
}

impl Default for FragmentRemoval {
    /// Positive-fundamentals filters that conflict with a downtrend screen
    fn default() -> Self {
        FragmentRemoval {
            target: keys::UNIVERSE_BEARISH.to_string(),
            fragments: [
                "fa_epsyoy_pos",
                "fa_epsyoy1_pos",
                "fa_sales5years_pos",
                "fa_roe_pos",
                "fa_roe_o15",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Filter token added to one derived screener unless already present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeFilter {
    pub target: String,
    /// Token to insert
    pub filter: String,
    /// Insertion is skipped when this occurs anywhere in the URL
    pub presence_prefix: String,
    /// Query segment the token is inserted in front of. Compared against
    /// the whole segment: `ft=4` does not match `ft=45`.
    pub marker: String,
}

impl Default for VolumeFilter {
    fn default() -> Self {
        VolumeFilter {
            target: keys::BREAKDOWN_BEARISH.to_string(),
            filter: "sh_relvol_o2".to_string(),
            presence_prefix: "sh_relvol".to_string(),
            marker: "ft=4".to_string(),
        }
    }
}

/// Sector display name → screener sector filter code
///
/// Looked up for every processed sector but not wired into any rule yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorFilters(BTreeMap<String, String>);

impl Default for SectorFilters {
    fn default() -> Self {
        let table = [
            ("Healthcare", "sec_healthcare"),
            ("Technology", "sec_technology"),
            ("Consumer Discretionary", "sec_consumercyclical"),
            ("Industrials", "sec_industrialgoods"),
            ("Communication Services", "sec_communication"),
            ("Consumer Defensive", "sec_consumergoods"),
            ("Financials", "sec_financial"),
            ("Real Estate", "sec_realestate"),
            ("Energy", "sec_energy"),
            ("Utilities", "sec_utilities"),
        ];

        SectorFilters(
            table
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl SectorFilters {
    pub fn lookup(&self, sector_name: &str) -> Option<&str> {
        self.0.get(sector_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_corrected() {
        assert_eq!(
            TransformConfig::default(),
            TransformConfig::for_variant(Variant::Corrected)
        );
    }

    #[test]
    fn test_naive_has_no_policy() {
        let config = TransformConfig::for_variant(Variant::Naive);
        assert!(config.policy.skip_sectors.is_empty());
        assert!(config.policy.fragment_removal.is_none());
        assert!(config.policy.volume_filter.is_none());
        assert!(!config.policy.clear_stale);
        assert_eq!(config.rules.len(), 4);
    }

    #[test]
    fn test_rule_apply_in_order() {
        let config = TransformConfig::default();
        let rule = config.rule_for(keys::BOUNCE_BEARISH).unwrap();
        assert_eq!(
            rule.apply("f=ta_sma200_pa,ta_sma50_pb,ta_rsi_os40&ft=4"),
            "f=ta_sma200_pb,ta_sma50_pa,ta_rsi_ob60&ft=4"
        );
    }

    #[test]
    fn test_rule_replaces_every_occurrence() {
        let rule = DerivationRule::new("a", "b", vec![Replacement::new("x", "y")]);
        assert_eq!(rule.apply("x,x,zx"), "y,y,zy");
    }

    #[test]
    fn test_skips() {
        let policy = CorrectionPolicy::default();
        assert!(policy.skips("Energy"));
        assert!(policy.skips("Utilities"));
        assert!(!policy.skips("Technology"));
        assert!(!CorrectionPolicy::none().skips("Energy"));
    }

    #[test]
    fn test_sector_filters() {
        let filters = SectorFilters::default();
        assert_eq!(filters.len(), 10);
        assert_eq!(filters.lookup("Healthcare"), Some("sec_healthcare"));
        assert_eq!(filters.lookup("Real Estate"), Some("sec_realestate"));
        assert_eq!(filters.lookup("Crypto"), None);
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("naive".parse::<Variant>().unwrap(), Variant::Naive);
        assert_eq!("Corrected".parse::<Variant>().unwrap(), Variant::Corrected);
        assert!("bullish".parse::<Variant>().is_err());
        assert_eq!(Variant::Naive.to_string(), "naive");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TransformConfig =
            serde_json::from_str(r#"{"policy": {"skip_sectors": ["Financials"]}}"#).unwrap();
        assert_eq!(config.policy.skip_sectors, vec!["Financials".to_string()]);
        assert!(config.policy.clear_stale);
        assert!(config.policy.volume_filter.is_some());
        assert_eq!(config.rules, DerivationRule::defaults());
    }

    #[test]
    fn test_from_file_missing() {
        let err = TransformConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read transform config"));
    }
}
