//! Federated-learning experiment dashboard core.
//!
//! Loads the federated result batches and the independent-training export,
//! indexes them by repetition and experiment key, and resolves UI selections
//! into chart-ready series.

pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod index;
pub mod key;
pub mod logging;
pub mod scenario;
pub mod select;

pub use dashboard::Dashboard;
pub use error::{DashboardError, Result};
pub use key::{experiment_key, ClientId, ExperimentKey};
pub use scenario::{combo_color, scenario_name, Scenario};
pub use select::{contribution_series, ChartFeed, Dataset, Point, Selection};
