//! NodeSimilarity configuration.
//!
//! | Field | Default | Meaning |
//! |-------|---------|---------|
//! | `concurrency` | 4 | worker count |
//! | `metric` | `JACCARD` | similarity function |
//! | `top_k` / `bottom_k` | 10 / unset | per-node bound; `0` is unbounded, negative means bottom |
//! | `top_n` / `bottom_n` | unset | global bound over all pairs; `0` is unbounded |
//! | `similarity_cutoff` | 1e-42 | drop pairs scoring below; `0` compares every pair |
//! | `degree_cutoff` | 1 | skip nodes with fewer distinct neighbors |
//! | `upper_degree_cutoff` | `u32::MAX` | skip nodes with more distinct neighbors |

use serde::{Deserialize, Serialize};

use super::metric::SimilarityMetric;
use crate::concurrency::{validate_concurrency, DEFAULT_CONCURRENCY};
use crate::{Error, Result};

pub const DEFAULT_TOP_K: usize = 10;

/// Smallest positive score kept by default, so zero-overlap pairs drop out.
pub const DEFAULT_SIMILARITY_CUTOFF: f64 = 1e-42;

/// Which end of the ranking a bound keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionOrder {
    Highest,
    Lowest,
}

/// A resolved top-k or top-n bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Unbounded,
    Limited { limit: usize, order: SelectionOrder },
}

impl Bound {
    /// `0` lifts the bound; a negative value selects from the bottom.
    fn signed(value: i64) -> Self {
        let limit = value.unsigned_abs() as usize;
        if value == 0 {
            Bound::Unbounded
        } else if value < 0 {
            Bound::Limited { limit, order: SelectionOrder::Lowest }
        } else {
            Bound::Limited { limit, order: SelectionOrder::Highest }
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, Bound::Limited { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSimilarityConfig {
    pub concurrency: usize,
    pub metric: SimilarityMetric,
    pub top_k: Option<i64>,
    pub bottom_k: Option<i64>,
    pub top_n: Option<i64>,
    pub bottom_n: Option<i64>,
    pub similarity_cutoff: f64,
    pub degree_cutoff: u32,
    pub upper_degree_cutoff: u32,
}

impl Default for NodeSimilarityConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            metric: SimilarityMetric::default(),
            top_k: None,
            bottom_k: None,
            top_n: None,
            bottom_n: None,
            similarity_cutoff: DEFAULT_SIMILARITY_CUTOFF,
            degree_cutoff: 1,
            upper_degree_cutoff: u32::MAX,
        }
    }
}

impl NodeSimilarityConfig {
    pub fn builder() -> NodeSimilarityConfigBuilder {
        NodeSimilarityConfigBuilder { config: Self::default() }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_concurrency(self.concurrency)?;
        if self.top_k.is_some() && self.bottom_k.is_some() {
            return Err(invalid("top_k and bottom_k are mutually exclusive"));
        }
        if self.top_n.is_some() && self.bottom_n.is_some() {
            return Err(invalid("top_n and bottom_n are mutually exclusive"));
        }
        if self.bottom_k.is_some_and(|k| k <= 0) {
            return Err(invalid("bottom_k must be positive"));
        }
        if self.bottom_n.is_some_and(|n| n <= 0) {
            return Err(invalid("bottom_n must be positive"));
        }
        if !(0.0..=1.0).contains(&self.similarity_cutoff) {
            return Err(invalid("similarity_cutoff must be within [0, 1]"));
        }
        if self.upper_degree_cutoff == 0 {
            return Err(invalid("upper_degree_cutoff must be positive"));
        }
        if self.degree_cutoff > self.upper_degree_cutoff {
            return Err(invalid("degree_cutoff must not exceed upper_degree_cutoff"));
        }
        Ok(())
    }

    /// Per-node bound; `DEFAULT_TOP_K` highest when neither side is set.
    pub fn top_k_bound(&self) -> Bound {
        match (self.top_k, self.bottom_k) {
            (_, Some(k)) => Bound::Limited { limit: k as usize, order: SelectionOrder::Lowest },
            (Some(k), None) => Bound::signed(k),
            (None, None) => Bound::Limited { limit: DEFAULT_TOP_K, order: SelectionOrder::Highest },
        }
    }

    /// Global bound; unbounded when neither side is set.
    pub fn top_n_bound(&self) -> Bound {
        match (self.top_n, self.bottom_n) {
            (_, Some(n)) => Bound::Limited { limit: n as usize, order: SelectionOrder::Lowest },
            (Some(n), None) => Bound::signed(n),
            (None, None) => Bound::Unbounded,
        }
    }

    /// With a non-positive cutoff even disjoint pairs qualify, so candidates
    /// cannot come from shared neighbors alone.
    pub fn compares_all_pairs(&self) -> bool {
        self.similarity_cutoff <= 0.0
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfiguration(message.into())
}

/// Fluent construction; `build` validates.
#[derive(Debug, Clone)]
pub struct NodeSimilarityConfigBuilder {
    config: NodeSimilarityConfig,
}

impl NodeSimilarityConfigBuilder {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn metric(mut self, metric: SimilarityMetric) -> Self {
        self.config.metric = metric;
        self
    }

    pub fn top_k(mut self, top_k: i64) -> Self {
        self.config.top_k = Some(top_k);
        self
    }

    pub fn bottom_k(mut self, bottom_k: i64) -> Self {
        self.config.bottom_k = Some(bottom_k);
        self
    }

    pub fn top_n(mut self, top_n: i64) -> Self {
        self.config.top_n = Some(top_n);
        self
    }

    pub fn bottom_n(mut self, bottom_n: i64) -> Self {
        self.config.bottom_n = Some(bottom_n);
        self
    }

    pub fn similarity_cutoff(mut self, cutoff: f64) -> Self {
        self.config.similarity_cutoff = cutoff;
        self
    }

    pub fn degree_cutoff(mut self, cutoff: u32) -> Self {
        self.config.degree_cutoff = cutoff;
        self
    }

    pub fn upper_degree_cutoff(mut self, cutoff: u32) -> Self {
        self.config.upper_degree_cutoff = cutoff;
        self
    }

    pub fn build(self) -> Result<NodeSimilarityConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
