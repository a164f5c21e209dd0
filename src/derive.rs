//! Bearish screener derivation for a single sector

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{DerivationRule, TransformConfig};
use crate::filters::ScreenerUrl;

/// Result of deriving one sector's bearish screeners
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// Sector is excluded by the correction policy
    Skipped,
    /// Derived target key → URL, in rule order. May be empty.
    Derived(Map<String, Value>),
}

impl Derivation {
    pub fn len(&self) -> usize {
        match self {
            Derivation::Skipped => 0,
            Derivation::Derived(urls) => urls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Derive bearish screener URLs from a sector's bullish ones
///
/// A rule whose source key is absent (or not a string) is silently left out.
pub fn create_bearish_urls(
    bullish_urls: &Map<String, Value>,
    sector_name: &str,
    config: &TransformConfig,
) -> Derivation {
    if config.policy.skips(sector_name) {
        warn!("Skipping {} (incompatible with trend-following)", sector_name);
        return Derivation::Skipped;
    }

    let sector_filter = config.sector_filters.lookup(sector_name).unwrap_or("");
    debug!("Sector filter for {}: {:?}", sector_name, sector_filter);

    let mut bearish = Map::new();
    for rule in &config.rules {
        let Some(source) = bullish_urls.get(&rule.source) else {
            continue;
        };
        let Some(source) = source.as_str() else {
            warn!(
                "{}: screener '{}' is not a string, skipping {}",
                sector_name, rule.source, rule.target
            );
            continue;
        };

        let url = derive_url(rule, source, config);
        debug!("{}: {} -> {}", sector_name, rule.target, url);
        bearish.insert(rule.target.clone(), Value::String(url));
    }

    Derivation::Derived(bearish)
}

/// Apply one rule plus whatever corrections target it
pub fn derive_url(rule: &DerivationRule, source: &str, config: &TransformConfig) -> String {
    let url = rule.apply(source);

    let removal = config
        .policy
        .fragment_removal
        .as_ref()
        .filter(|r| r.target == rule.target);
    let volume = config
        .policy
        .volume_filter
        .as_ref()
        .filter(|v| v.target == rule.target && !url.contains(&v.presence_prefix));

    if removal.is_none() && volume.is_none() {
        return url;
    }

    let mut parsed = ScreenerUrl::parse(&url);
    if let Some(removal) = removal {
        let removed = parsed.remove_tokens(&removal.fragments);
        if removed > 0 {
            debug!("{}: removed {} filter fragment(s)", rule.target, removed);
        }
    }
    if let Some(volume) = volume {
        parsed.insert_before_marker(&volume.filter, &volume.marker);
    }
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;
    use serde_json::json;

    fn urls(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn derived(d: Derivation) -> Map<String, Value> {
        match d {
            Derivation::Derived(m) => m,
            Derivation::Skipped => panic!("expected derived urls"),
        }
    }

    #[test]
    fn test_death_cross_example() {
        let config = TransformConfig::default();
        let out = derived(create_bearish_urls(
            &urls(json!({
                "golden_cross": "f=ta_sma200_pa,ta_sma50_pa200,ta_pattern_tlsupport&ft=4"
            })),
            "Technology",
            &config,
        ));
        assert_eq!(out.len(), 1);
        assert_eq!(
            out["death_cross_bearish"],
            "f=ta_sma200_pb,ta_sma50_pb200,ta_pattern_tlresistance&ft=4"
        );
    }

    #[test]
    fn test_missing_sources_are_omitted() {
        let config = TransformConfig::default();
        let out = derived(create_bearish_urls(
            &urls(json!({"universe": "f=ta_sma200_pa", "watchlist": "f=x"})),
            "Healthcare",
            &config,
        ));
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["universe_bearish"]);
    }

    #[test]
    fn test_non_string_source_is_ignored() {
        let config = TransformConfig::default();
        let out = derived(create_bearish_urls(
            &urls(json!({"universe": 42})),
            "Healthcare",
            &config,
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_skipped_sector() {
        let config = TransformConfig::default();
        let d = create_bearish_urls(
            &urls(json!({"universe": "f=ta_sma200_pa"})),
            "Utilities",
            &config,
        );
        assert_eq!(d, Derivation::Skipped);
        assert!(d.is_empty());
    }

    #[test]
    fn test_naive_does_not_skip() {
        let config = TransformConfig::for_variant(Variant::Naive);
        let d = create_bearish_urls(
            &urls(json!({"universe": "f=ta_sma200_pa"})),
            "Utilities",
            &config,
        );
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn test_universe_fragments_removed() {
        let config = TransformConfig::default();
        let out = derived(create_bearish_urls(
            &urls(json!({
                "universe": "v=111&f=cap_midover,fa_epsyoy_pos,ta_sma200_pa,fa_roe_pos,sh_price_o10&ft=4"
            })),
            "Financials",
            &config,
        ));
        assert_eq!(
            out["universe_bearish"],
            "v=111&f=cap_midover,ta_sma200_pb,sh_price_o10&ft=4"
        );
    }

    #[test]
    fn test_naive_keeps_fragments() {
        let config = TransformConfig::for_variant(Variant::Naive);
        let rule = config.rule_for("universe_bearish").unwrap();
        assert_eq!(
            derive_url(rule, "f=ta_sma200_pa,fa_roe_pos&ft=4", &config),
            "f=ta_sma200_pb,fa_roe_pos&ft=4"
        );
    }

    #[test]
    fn test_breakdown_gets_volume_filter() {
        let config = TransformConfig::default();
        let rule = config.rule_for("breakdown_bearish").unwrap();
        assert_eq!(
            derive_url(rule, "v=211&f=ta_sma200_pa,ta_highlow52w_nh&ft=4", &config),
            "v=211&f=ta_sma200_pb,ta_highlow52w_nl,sh_relvol_o2&ft=4"
        );
    }

    #[test]
    fn test_breakdown_existing_volume_filter_kept() {
        let config = TransformConfig::default();
        let rule = config.rule_for("breakdown_bearish").unwrap();
        assert_eq!(
            derive_url(rule, "f=sh_relvol_o1.5,ta_highlow52w_nh&ft=4", &config),
            "f=sh_relvol_o1.5,ta_highlow52w_nl&ft=4"
        );
    }

    #[test]
    fn test_volume_marker_matches_whole_segment() {
        let config = TransformConfig::default();
        let rule = config.rule_for("breakdown_bearish").unwrap();
        assert_eq!(
            derive_url(rule, "v=211&f=ta_highlow52w_nh&ft=45", &config),
            "v=211&f=ta_highlow52w_nl&ft=45"
        );
    }

    #[test]
    fn test_volume_filter_only_on_breakdown() {
        let config = TransformConfig::default();
        let rule = config.rule_for("bounce_bearish").unwrap();
        assert_eq!(
            derive_url(rule, "f=ta_sma200_pa,ta_sma50_pb,ta_rsi_os40&ft=4", &config),
            "f=ta_sma200_pb,ta_sma50_pa,ta_rsi_ob60&ft=4"
        );
    }

    #[test]
    fn test_bounce_sma50_substring_semantics() {
        // Substitution is textual: ta_sma50_pb200 contains ta_sma50_pb
        let config = TransformConfig::default();
        let rule = config.rule_for("bounce_bearish").unwrap();
        assert_eq!(
            derive_url(rule, "f=ta_sma50_pb200", &config),
            "f=ta_sma50_pa200"
        );
    }
}
