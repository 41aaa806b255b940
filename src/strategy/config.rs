//! Typed strategy configuration records
//!
//! Each strategy type has a closed configuration record, validated at the
//! boundary before the strategy is constructed. The tagged representation is
//! also what the strategy store persists, so serialize/deserialize is an
//! identity round-trip over constructor fields.

use serde::{Deserialize, Serialize};

/// Strategy type tags, as used on the wire and by the creator registry
pub const COMPOSITION: &str = "composition";
pub const RANGE_EXPANSION: &str = "range-expansion";
pub const EXTERNAL_SCORER: &str = "external-scorer";
pub const SIMILARITY_SEARCH: &str = "similarity-search";

/// Configuration for one strategy instance, tagged by strategy type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StrategyConfig {
    #[serde(rename = "composition")]
    #[serde(rename_all = "camelCase")]
    Composition {
        name: String,
        target_team_size: usize,
        min_team_size: usize,
        max_team_size: usize,
        number_of_teams: usize,
    },

    #[serde(rename = "range-expansion")]
    #[serde(rename_all = "camelCase")]
    RangeExpansion {
        name: String,
        /// Rating points added to each side of the window per elapsed interval
        range_expansion_amount: f64,
        /// Interval length in seconds
        range_expansion_time: u64,
    },

    #[serde(rename = "external-scorer")]
    #[serde(rename_all = "camelCase")]
    ExternalScorer {
        name: String,
        batch_size: usize,
        features: Vec<String>,
    },

    #[serde(rename = "similarity-search")]
    #[serde(rename_all = "camelCase")]
    SimilaritySearch {
        name: String,
        min_pool_size: usize,
        team_size: usize,
        number_of_teams: usize,
        required_statistics: Vec<String>,
    },
}

impl StrategyConfig {
    /// The strategy instance name this configuration constructs
    pub fn name(&self) -> &str {
        match self {
            StrategyConfig::Composition { name, .. } => name,
            StrategyConfig::RangeExpansion { name, .. } => name,
            StrategyConfig::ExternalScorer { name, .. } => name,
            StrategyConfig::SimilaritySearch { name, .. } => name,
        }
    }

    /// The type tag used to look up a creator
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyConfig::Composition { .. } => COMPOSITION,
            StrategyConfig::RangeExpansion { .. } => RANGE_EXPANSION,
            StrategyConfig::ExternalScorer { .. } => EXTERNAL_SCORER,
            StrategyConfig::SimilaritySearch { .. } => SIMILARITY_SEARCH,
        }
    }
}
