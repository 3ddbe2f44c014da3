//! Turn a UI selection into chart-ready datasets.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::data::FederatedRow;
use crate::error::{DashboardError, Result};
use crate::index::{Bucket, IndependentSeries, Index};
use crate::key::{ClientId, ExperimentKey, CLIENTS};
use crate::logging::log_selection;
use crate::scenario::{
    client_color, client_name, independent_display_name, Scenario, INDIVIDUAL_COLOR,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub color: &'static str,
    pub points: Vec<Point>,
}

/// The three federated charts for one selection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartFeed {
    pub key: String,
    pub scenario: String,
    pub training_loss: Vec<Dataset>,
    pub test_mse: Vec<Dataset>,
    pub contribution: Vec<Dataset>,
    /// Selected reps with no bucket for `key`.
    pub missing_reps: Vec<i64>,
}

impl ChartFeed {
    pub fn is_empty(&self) -> bool {
        self.training_loss.is_empty() && self.test_mse.is_empty() && self.contribution.is_empty()
    }
}

/// Checked guests and checked repetitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub guests: BTreeSet<ClientId>,
    pub reps: Vec<i64>,
}

impl Selection {
    pub fn new(guests: impl IntoIterator<Item = ClientId>, reps: impl IntoIterator<Item = i64>) -> Self {
        Self {
            guests: guests.into_iter().filter(ClientId::is_guest).collect(),
            reps: reps.into_iter().collect(),
        }
    }

    /// Parse comma-separated guest ids and reps, e.g. `guest_1,guest_3` and `1,3`.
    pub fn parse(guests: &str, reps: &str) -> Result<Self> {
        let guests = guests
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<ClientId>)
            .collect::<Result<Vec<_>>>()?;
        let reps = reps
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| DashboardError::InvalidSelection(format!("bad rep '{}'", s)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(guests, reps))
    }

    pub fn key(&self) -> ExperimentKey {
        ExperimentKey::from_selection(&self.guests)
    }
}

/// Chart metric shown by the metric selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TrainingLoss,
    TestMse,
    Contribution,
}

impl Metric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "trainingLoss" | "training_loss" => Some(Metric::TrainingLoss),
            "testMSE" | "test_mse" => Some(Metric::TestMse),
            "contrib" | "contribution" => Some(Metric::Contribution),
            _ => None,
        }
    }

    pub fn axis_title(&self) -> &'static str {
        match self {
            Metric::TrainingLoss => "Training Loss",
            Metric::TestMse => "Test MSE",
            Metric::Contribution => "Client Contribution",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Metric::TrainingLoss => "Shows how well the model is fitting the training data; lower values indicate a better fit.",
            Metric::TestMse => "Shows prediction error on unseen data; lower values mean the model generalizes more accurately.",
            Metric::Contribution => "Shows each client's impact on the model's performance; larger values indicate greater contribution.",
        }
    }

    pub fn datasets<'a>(&self, feed: &'a ChartFeed) -> &'a [Dataset] {
        match self {
            Metric::TrainingLoss => &feed.training_loss,
            Metric::TestMse => &feed.test_mse,
            Metric::Contribution => &feed.contribution,
        }
    }
}

fn series(bucket: &Bucket, value: impl Fn(&FederatedRow) -> f64) -> Vec<Point> {
    bucket
        .iter()
        .map(|r| Point {
            x: r.round,
            y: value(r),
        })
        .collect()
}

/// Contribution curve of `client` within one bucket.
///
/// Empty when the first row does not carry a numeric value for the client,
/// or when the client is a guest that is not part of `selected_guests`.
pub fn contribution_series(
    bucket: &Bucket,
    client: ClientId,
    selected_guests: &BTreeSet<ClientId>,
) -> Vec<Point> {
    let tracked = bucket
        .first()
        .and_then(|r| r.ablation(client))
        .is_some_and(|v| !v.is_nan());
    if !tracked {
        return Vec::new();
    }
    if client.is_guest() && !selected_guests.contains(&client) {
        return Vec::new();
    }
    series(bucket, |r| r.ablation(client).unwrap_or(f64::NAN))
}

/// Build every federated dataset for `selection`.
///
/// Reps without a bucket for the selection's key contribute nothing and are
/// reported in `missing_reps`.
pub fn resolve(index: &Index, selection: &Selection) -> ChartFeed {
    let experiment = selection.key();
    let key = experiment.encode();
    let scenario = Scenario::from_key(&key);
    let mut feed = ChartFeed {
        key: key.clone(),
        scenario: scenario.label().to_string(),
        ..ChartFeed::default()
    };

    for &rep in &selection.reps {
        let Some(bucket) = index.bucket(rep, &experiment) else {
            feed.missing_reps.push(rep);
            continue;
        };
        let suffix = format!(" (Rep {})", rep);

        feed.training_loss.push(Dataset {
            label: format!("{}{}", scenario.label(), suffix),
            color: scenario.color(),
            points: series(bucket, |r| r.training_loss),
        });
        feed.test_mse.push(Dataset {
            label: format!("{}{}", scenario.label(), suffix),
            color: scenario.color(),
            points: series(bucket, |r| r.test_mse),
        });

        for client in CLIENTS {
            let points = contribution_series(bucket, client, &selection.guests);
            if points.is_empty() {
                continue;
            }
            feed.contribution.push(Dataset {
                label: format!("{}{}", client_name(client), suffix),
                color: client_color(client),
                points,
            });
        }
    }

    log_selection(
        &key,
        &selection.reps,
        feed.training_loss.len() + feed.test_mse.len() + feed.contribution.len(),
        feed.missing_reps.len(),
    );
    feed
}

/// Individual comparison dataset for one client and rep.
pub fn individual(series: &IndependentSeries, client: &str, rep: i64) -> Dataset {
    Dataset {
        label: format!("{} · Rep {}", independent_display_name(client), rep),
        color: INDIVIDUAL_COLOR,
        points: series
            .query(client, rep)
            .into_iter()
            .map(|(x, y)| Point { x, y })
            .collect(),
    }
}
