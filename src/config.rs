use std::path::{Path, PathBuf};

/// What to do when the first federated batch is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyBatchPolicy {
    /// Fail with `EmptyInput` when the second batch has rows to shift.
    Reject,
    /// Shift the second batch by zero.
    ZeroShift,
}

impl EmptyBatchPolicy {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "zero_shift" | "zero" => EmptyBatchPolicy::ZeroShift,
            _ => EmptyBatchPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub batch1_path: PathBuf,
    pub batch2_path: PathBuf,
    pub independent_path: PathBuf,
    pub empty_batch: EmptyBatchPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(
            std::env::var("FLDASH_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        );
        let batch1 = std::env::var("FLDASH_BATCH1").unwrap_or_else(|_| "3clients_newgt_v1.csv".to_string());
        let batch2 = std::env::var("FLDASH_BATCH2").unwrap_or_else(|_| "3clients_newgt_v2.csv".to_string());
        let independent = std::env::var("FLDASH_INDEPENDENT").unwrap_or_else(|_| "independent_1500.csv".to_string());
        let empty_batch = EmptyBatchPolicy::parse(
            &std::env::var("FLDASH_EMPTY_BATCH").unwrap_or_default(),
        );
        Self {
            batch1_path: resolve(&data_dir, &batch1),
            batch2_path: resolve(&data_dir, &batch2),
            independent_path: resolve(&data_dir, &independent),
            data_dir,
            empty_batch,
        }
    }

    /// Config rooted at `data_dir` with the default file names.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            batch1_path: data_dir.join("3clients_newgt_v1.csv"),
            batch2_path: data_dir.join("3clients_newgt_v2.csv"),
            independent_path: data_dir.join("independent_1500.csv"),
            empty_batch: EmptyBatchPolicy::Reject,
        }
    }
}

fn resolve(data_dir: &Path, name: &str) -> PathBuf {
    let p = PathBuf::from(name);
    if p.is_absolute() {
        p
    } else {
        data_dir.join(p)
    }
}
