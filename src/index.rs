//! Repetition → experiment → rounds index, plus the independent-training series.
//!
//! Both are built once from the raw sources and are read-only afterwards.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::EmptyBatchPolicy;
use crate::data::{FederatedRow, IndependentRow, RawSources};
use crate::error::{DashboardError, Result};
use crate::key::ExperimentKey;
use crate::logging::log_index_built;
use crate::scenario::Scenario;

/// Rows of one federated run, sorted by round.
pub type Bucket = [FederatedRow];

#[derive(Debug, Clone, Default)]
pub struct Index {
    by_rep: BTreeMap<i64, HashMap<String, Vec<FederatedRow>>>,
}

impl Index {
    /// Bucket for a structured key, if any rows exist for it.
    pub fn bucket(&self, rep: i64, key: &ExperimentKey) -> Option<&Bucket> {
        self.bucket_raw(rep, &key.encode())
    }

    /// Bucket for an already encoded key.
    pub fn bucket_raw(&self, rep: i64, key: &str) -> Option<&Bucket> {
        self.by_rep.get(&rep)?.get(key).map(Vec::as_slice)
    }

    pub fn repetitions(&self) -> impl Iterator<Item = i64> + '_ {
        self.by_rep.keys().copied()
    }

    /// Encoded keys present for `rep`, sorted.
    pub fn experiments(&self, rep: i64) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .by_rep
            .get(&rep)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    pub fn bucket_count(&self) -> usize {
        self.by_rep.values().map(HashMap::len).sum()
    }

    pub fn row_count(&self) -> usize {
        self.by_rep
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rep.is_empty()
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            repetitions: self
                .by_rep
                .keys()
                .map(|rep| RepSummary {
                    repetition: *rep,
                    experiments: self
                        .experiments(*rep)
                        .into_iter()
                        .map(|k| {
                            let summary = ExperimentSummary {
                                rows: self.bucket_raw(*rep, k).map_or(0, <[_]>::len),
                                scenario: ExperimentKey::parse(k)
                                    .map(|key| Scenario::from_key(&key.encode()).label()),
                            };
                            (k.to_string(), summary)
                        })
                        .collect(),
                })
                .collect(),
            buckets: self.bucket_count(),
            rows: self.row_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepSummary {
    pub repetition: i64,
    pub experiments: BTreeMap<String, ExperimentSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    pub rows: usize,
    /// None when the key does not name a known guest set.
    pub scenario: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub repetitions: Vec<RepSummary>,
    pub buckets: usize,
    pub rows: usize,
}

/// Independent-training rows, stable-sorted by epoch.
#[derive(Debug, Clone, Default)]
pub struct IndependentSeries {
    rows: Vec<IndependentRow>,
}

impl IndependentSeries {
    pub fn new(mut rows: Vec<IndependentRow>) -> Self {
        rows.sort_by(|a, b| a.epoch.total_cmp(&b.epoch));
        Self { rows }
    }

    pub fn rows(&self) -> &[IndependentRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct clients, sorted.
    pub fn clients(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.client.as_str()).collect();
        set.into_iter().collect()
    }

    /// Distinct reps, ascending.
    pub fn reps(&self) -> Vec<i64> {
        let set: BTreeSet<i64> = self.rows.iter().map(|r| r.rep).collect();
        set.into_iter().collect()
    }

    /// (epoch, mse) pairs for one client and rep, ascending by epoch.
    pub fn query(&self, client: &str, rep: i64) -> Vec<(f64, f64)> {
        let mut subset: Vec<&IndependentRow> = self
            .rows
            .iter()
            .filter(|r| r.client == client && r.rep == rep)
            .collect();
        subset.sort_by(|a, b| a.epoch.total_cmp(&b.epoch));
        subset.into_iter().map(|r| (r.epoch, r.mse)).collect()
    }
}

/// Amount added to every second-batch repetition.
pub fn repetition_shift(
    batch1: &[FederatedRow],
    batch2_len: usize,
    policy: EmptyBatchPolicy,
) -> Result<i64> {
    match batch1.iter().map(|r| r.repetition).max() {
        Some(max) => Ok(max),
        None if batch2_len == 0 => Ok(0),
        None => match policy {
            EmptyBatchPolicy::ZeroShift => Ok(0),
            EmptyBatchPolicy::Reject => Err(DashboardError::EmptyInput {
                batch2_rows: batch2_len,
            }),
        },
    }
}

/// Canonical form of a source key; keys that do not parse are kept verbatim.
fn bucket_key(raw: &str) -> String {
    ExperimentKey::parse(raw)
        .map(|k| k.encode())
        .unwrap_or_else(|| raw.to_string())
}

/// Shift, concatenate, group and sort the raw inputs.
pub fn build(
    batch1: Vec<FederatedRow>,
    batch2: Vec<FederatedRow>,
    independent: Vec<IndependentRow>,
    policy: EmptyBatchPolicy,
) -> Result<(Index, IndependentSeries)> {
    let shift = repetition_shift(&batch1, batch2.len(), policy)?;

    let shifted = batch2
        .into_iter()
        .map(|mut row| -> Result<FederatedRow> {
            row.repetition = row.repetition.checked_add(shift).ok_or_else(|| {
                DashboardError::load(
                    "batch2",
                    format!("repetition {} overflows when shifted by {}", row.repetition, shift),
                )
            })?;
            Ok(row)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut by_rep: BTreeMap<i64, HashMap<String, Vec<FederatedRow>>> = BTreeMap::new();
    for row in batch1.into_iter().chain(shifted) {
        by_rep
            .entry(row.repetition)
            .or_default()
            .entry(bucket_key(&row.experiment))
            .or_default()
            .push(row);
    }
    for bucket in by_rep.values_mut().flat_map(HashMap::values_mut) {
        // Vec::sort_by is stable: equal rounds keep input order
        bucket.sort_by(|a, b| a.round.total_cmp(&b.round));
    }

    let index = Index { by_rep };
    let series = IndependentSeries::new(independent);
    log_index_built(shift, index.by_rep.len(), index.bucket_count(), index.row_count());
    Ok((index, series))
}

/// [`build`] over a loaded [`RawSources`].
pub fn build_from(raw: RawSources, policy: EmptyBatchPolicy) -> Result<(Index, IndependentSeries)> {
    build(raw.batch1, raw.batch2, raw.independent, policy)
}
