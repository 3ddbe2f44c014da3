use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

/// Failures that halt dashboard initialization.
///
/// Lookup misses and untracked contribution fields are not errors; they
/// resolve to empty series.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// One of the three input sources could not be read or parsed.
    #[error("failed to load {source_name}: {message}")]
    LoadFailure { source_name: String, message: String },

    /// The first batch is empty, so the repetition shift for the second batch is undefined.
    #[error("first batch has no rows but second batch has {batch2_rows}; repetition shift is undefined")]
    EmptyInput { batch2_rows: usize },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background load task panicked or was cancelled.
    #[error("load task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}

impl DashboardError {
    pub fn load(source_name: &str, message: impl Into<String>) -> Self {
        DashboardError::LoadFailure {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}
