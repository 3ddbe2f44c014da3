use serde::Serialize;

use crate::config::{Config, EmptyBatchPolicy};
use crate::data::{load_sources, RawSources};
use crate::error::Result;
use crate::index::{build_from, IndependentSeries, Index, IndexSummary};
use crate::select::{individual, resolve, ChartFeed, Dataset, Selection};

/// Both indexes, built once and read-only afterwards.
///
/// This is the only surface the presentation layer needs.
#[derive(Debug, Clone)]
pub struct Dashboard {
    index: Index,
    independent: IndependentSeries,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonOptions {
    pub clients: Vec<String>,
    pub reps: Vec<i64>,
}

impl Dashboard {
    /// Load the three sources, then index them.
    pub async fn load(cfg: &Config) -> Result<Self> {
        let raw = load_sources(cfg).await?;
        Self::from_raw(raw, cfg.empty_batch)
    }

    pub fn from_raw(raw: RawSources, policy: EmptyBatchPolicy) -> Result<Self> {
        let (index, independent) = build_from(raw, policy)?;
        Ok(Self { index, independent })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn independent(&self) -> &IndependentSeries {
        &self.independent
    }

    pub fn summary(&self) -> IndexSummary {
        self.index.summary()
    }

    pub fn select(&self, selection: &Selection) -> ChartFeed {
        resolve(&self.index, selection)
    }

    pub fn individual(&self, client: &str, rep: i64) -> Dataset {
        individual(&self.independent, client, rep)
    }

    /// Dropdown contents for the individual comparison view.
    pub fn comparison_options(&self) -> ComparisonOptions {
        ComparisonOptions {
            clients: self.independent.clients().into_iter().map(String::from).collect(),
            reps: self.independent.reps(),
        }
    }
}
