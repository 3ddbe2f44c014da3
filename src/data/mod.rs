//! CSV loading for the federated batches and the independent-training export.
//!
//! Cells are coerced loosely: numeric cells that are missing or unparsable
//! become `NaN` instead of failing the load. Only the repetition columns are
//! strict, since they become index keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{DashboardError, Result};
use crate::key::{ClientId, CLIENTS};
use crate::logging::{log_load_complete, log_source_loaded};

pub const FEDERATED_COLUMNS: [&str; 9] = [
    "repetition",
    "experiment",
    "round",
    "training_loss",
    "test_mse",
    "ablation_host",
    "ablation_guest_1",
    "ablation_guest_2",
    "ablation_guest_3",
];

pub const INDEPENDENT_COLUMNS: [&str; 4] = ["client", "rep", "epoch", "mse"];

/// One round of one federated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedRow {
    pub repetition: i64,
    pub experiment: String,
    pub round: f64,
    pub training_loss: f64,
    pub test_mse: f64,
    /// Contribution per client; a client with no (or an empty) column is absent.
    pub ablation: BTreeMap<ClientId, f64>,
}

impl FederatedRow {
    pub fn ablation(&self, client: ClientId) -> Option<f64> {
        self.ablation.get(&client).copied()
    }
}

/// One epoch of a client trained on its own data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndependentRow {
    pub client: String,
    pub rep: i64,
    pub epoch: f64,
    pub mse: f64,
}

/// The three inputs, as read, before any indexing.
#[derive(Debug, Clone, Default)]
pub struct RawSources {
    pub batch1: Vec<FederatedRow>,
    pub batch2: Vec<FederatedRow>,
    pub independent: Vec<IndependentRow>,
}

// =============================================================================
// Cell coercion
// =============================================================================

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn require_column(headers: &csv::StringRecord, name: &str, source_name: &str) -> Result<usize> {
    column_index(headers, name)
        .ok_or_else(|| DashboardError::load(source_name, format!("missing column '{}'", name)))
}

fn cell<'a>(record: &'a csv::StringRecord, idx: usize) -> &'a str {
    record.get(idx).map(str::trim).unwrap_or("")
}

/// Number or `NaN`.
pub fn coerce_f64(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Integer key; integral floats such as `3.0` are accepted.
pub fn coerce_key(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    match raw.parse::<f64>() {
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => {
            Some(v as i64)
        }
        _ => None,
    }
}

// =============================================================================
// Parsers
// =============================================================================

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader)
}

pub fn parse_federated<R: Read>(reader: R, source_name: &str) -> Result<Vec<FederatedRow>> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers()?.clone();
    let rep_idx = require_column(&headers, "repetition", source_name)?;
    let exp_idx = require_column(&headers, "experiment", source_name)?;
    let round_idx = require_column(&headers, "round", source_name)?;
    let loss_idx = column_index(&headers, "training_loss");
    let mse_idx = column_index(&headers, "test_mse");
    let ablation_idx: Vec<(ClientId, usize)> = CLIENTS
        .iter()
        .filter_map(|c| column_index(&headers, &c.ablation_field()).map(|i| (*c, i)))
        .collect();

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let repetition = coerce_key(cell(&record, rep_idx)).ok_or_else(|| {
            DashboardError::load(
                source_name,
                format!("record {}: bad repetition '{}'", line + 1, cell(&record, rep_idx)),
            )
        })?;
        let mut ablation = BTreeMap::new();
        for (client, idx) in &ablation_idx {
            let raw = cell(&record, *idx);
            if !raw.is_empty() {
                ablation.insert(*client, coerce_f64(raw));
            }
        }
        rows.push(FederatedRow {
            repetition,
            experiment: cell(&record, exp_idx).to_string(),
            round: coerce_f64(cell(&record, round_idx)),
            training_loss: loss_idx.map(|i| coerce_f64(cell(&record, i))).unwrap_or(f64::NAN),
            test_mse: mse_idx.map(|i| coerce_f64(cell(&record, i))).unwrap_or(f64::NAN),
            ablation,
        });
    }
    Ok(rows)
}

pub fn parse_independent<R: Read>(reader: R, source_name: &str) -> Result<Vec<IndependentRow>> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers()?.clone();
    let client_idx = require_column(&headers, "client", source_name)?;
    let rep_idx = require_column(&headers, "rep", source_name)?;
    let epoch_idx = require_column(&headers, "epoch", source_name)?;
    let mse_idx = column_index(&headers, "mse");

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let rep = coerce_key(cell(&record, rep_idx)).ok_or_else(|| {
            DashboardError::load(
                source_name,
                format!("record {}: bad rep '{}'", line + 1, cell(&record, rep_idx)),
            )
        })?;
        rows.push(IndependentRow {
            client: cell(&record, client_idx).to_string(),
            rep,
            epoch: coerce_f64(cell(&record, epoch_idx)),
            mse: mse_idx.map(|i| coerce_f64(cell(&record, i))).unwrap_or(f64::NAN),
        });
    }
    Ok(rows)
}

fn open(path: &Path, source_name: &str) -> Result<File> {
    File::open(path).map_err(|e| DashboardError::load(source_name, format!("{}: {}", path.display(), e)))
}

/// Wrap any parse failure so the caller sees which source broke.
fn tag<T>(res: Result<T>, source_name: &str) -> Result<T> {
    res.map_err(|e| match e {
        DashboardError::LoadFailure { .. } => e,
        other => DashboardError::load(source_name, other.to_string()),
    })
}

pub fn read_federated(path: &Path, source_name: &str) -> Result<Vec<FederatedRow>> {
    let rows = tag(parse_federated(open(path, source_name)?, source_name), source_name)?;
    log_source_loaded(source_name, &path.display().to_string(), rows.len());
    Ok(rows)
}

pub fn read_independent(path: &Path, source_name: &str) -> Result<Vec<IndependentRow>> {
    let rows = tag(parse_independent(open(path, source_name)?, source_name), source_name)?;
    log_source_loaded(source_name, &path.display().to_string(), rows.len());
    Ok(rows)
}

// =============================================================================
// Load barrier
// =============================================================================

async fn blocking<T, F>(source_name: &'static str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tag(tokio::task::spawn_blocking(f).await.map_err(DashboardError::from), source_name)?
}

/// Read all three sources concurrently.
///
/// Either every source loads or the first failure is returned; there is no
/// partial result and no retry.
pub async fn load_sources(cfg: &Config) -> Result<RawSources> {
    let p1 = cfg.batch1_path.clone();
    let p2 = cfg.batch2_path.clone();
    let p3 = cfg.independent_path.clone();

    let (batch1, batch2, independent) = tokio::try_join!(
        blocking("batch1", move || read_federated(&p1, "batch1")),
        blocking("batch2", move || read_federated(&p2, "batch2")),
        blocking("independent", move || read_independent(&p3, "independent")),
    )?;

    log_load_complete(batch1.len(), batch2.len(), independent.len());
    Ok(RawSources {
        batch1,
        batch2,
        independent,
    })
}

// =============================================================================
// Dataset manifest
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Federated,
    Independent,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub path: String,
    pub hash_sha256: String,
    pub kind: DatasetKind,
    pub row_count: u64,
    pub columns: Vec<String>,
    pub missing_columns: Vec<String>,
    pub rep_min: Option<i64>,
    pub rep_max: Option<i64>,
    pub nan_cells: u64,
    pub warnings: Vec<String>,
    pub generated_at_epoch: u64,
}

/// Describe a CSV without indexing it.
pub fn analyze_csv(path: &Path, now_ts: u64) -> Result<DatasetManifest> {
    let hash = file_sha256(path)?;
    let mut rdr = csv_reader(File::open(path)?);
    let headers = rdr.headers()?.clone();
    let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();

    let kind = if column_index(&headers, "experiment").is_some() {
        DatasetKind::Federated
    } else if column_index(&headers, "client").is_some() {
        DatasetKind::Independent
    } else {
        DatasetKind::Unknown
    };
    let expected: &[&str] = match kind {
        DatasetKind::Federated => &FEDERATED_COLUMNS,
        DatasetKind::Independent => &INDEPENDENT_COLUMNS,
        DatasetKind::Unknown => &[],
    };
    let missing_columns: Vec<String> = expected
        .iter()
        .filter(|c| column_index(&headers, c).is_none())
        .map(|c| c.to_string())
        .collect();
    let rep_idx = column_index(&headers, "repetition").or_else(|| column_index(&headers, "rep"));
    // Every expected column except the string ones is numeric
    let numeric_idx: Vec<usize> = expected
        .iter()
        .filter(|c| **c != "experiment" && **c != "client")
        .filter_map(|c| column_index(&headers, c))
        .collect();

    let mut warnings = Vec::new();
    let mut row_count = 0u64;
    let mut nan_cells = 0u64;
    let mut rep_min: Option<i64> = None;
    let mut rep_max: Option<i64> = None;

    for (line, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(err) => {
                warnings.push(format!("bad_record {}: {}", line + 1, err));
                continue;
            }
        };
        row_count += 1;
        if let Some(idx) = rep_idx {
            match coerce_key(cell(&record, idx)) {
                Some(rep) => {
                    rep_min = Some(rep_min.map_or(rep, |v| v.min(rep)));
                    rep_max = Some(rep_max.map_or(rep, |v| v.max(rep)));
                }
                None => warnings.push(format!("bad_repetition at record {}", line + 1)),
            }
        }
        nan_cells += numeric_idx
            .iter()
            .filter(|i| {
                let raw = cell(&record, **i);
                !raw.is_empty() && coerce_f64(raw).is_nan()
            })
            .count() as u64;
    }

    if !missing_columns.is_empty() {
        warnings.push(format!("missing_columns: {:?}", missing_columns));
    }
    if kind == DatasetKind::Unknown {
        warnings.push("unrecognized_header".to_string());
    }

    Ok(DatasetManifest {
        path: path.display().to_string(),
        hash_sha256: hash,
        kind,
        row_count,
        columns,
        missing_columns,
        rep_min,
        rep_max,
        nan_cells,
        warnings,
        generated_at_epoch: now_ts,
    })
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    const FED: &str = "\
repetition,experiment,round,training_loss,test_mse,ablation_host,ablation_guest_1,ablation_guest_2,ablation_guest_3
1,host+(),1,0.9,1.1,0.2,,,
1,\"host+('guest_1', 'guest_3')\",2,0.8,1.0,0.1,0.05,,0.02
2,\"host+('guest_2',)\",1,oops,1.2,0.3,,0.4,
";

    #[test]
    fn test_parse_federated_quoted_keys() {
        let rows = parse_federated(FED.as_bytes(), "t").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].experiment, "host+('guest_1', 'guest_3')");
        assert_eq!(rows[2].experiment, "host+('guest_2',)");
        assert_eq!(rows[1].ablation(ClientId::Guest3), Some(0.02));
        assert_eq!(rows[0].ablation(ClientId::Guest1), None);
    }

    #[test]
    fn test_bad_numbers_become_nan() {
        let rows = parse_federated(FED.as_bytes(), "t").unwrap();
        assert!(rows[2].training_loss.is_nan());
        assert_eq!(rows[2].test_mse, 1.2);
    }

    #[test]
    fn test_missing_ablation_columns() {
        let csv = "repetition,experiment,round,training_loss,test_mse\n1,host+(),1,0.5,0.6\n";
        let rows = parse_federated(csv.as_bytes(), "t").unwrap();
        assert!(rows[0].ablation.is_empty());
    }

    #[test]
    fn test_bad_repetition_is_load_failure() {
        let csv = "repetition,experiment,round\nx,host+(),1\n";
        let err = parse_federated(csv.as_bytes(), "batch1").unwrap_err();
        assert!(matches!(err, DashboardError::LoadFailure { ref source_name, .. } if source_name == "batch1"));
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "repetition,round\n1,1\n";
        assert!(parse_federated(csv.as_bytes(), "t").is_err());
    }

    #[test]
    fn test_parse_independent() {
        let csv = "client,rep,epoch,mse\nhost,1,2,0.5\nguest_1,1.0,1,\n";
        let rows = parse_independent(csv.as_bytes(), "t").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].rep, 1);
        assert!(rows[1].mse.is_nan());
    }

    #[test]
    fn test_coerce_key() {
        assert_eq!(coerce_key("3"), Some(3));
        assert_eq!(coerce_key(" 4.0 "), Some(4));
        assert_eq!(coerce_key("4.5"), None);
        assert_eq!(coerce_key(""), None);
        assert_eq!(coerce_key("1e19"), None);
        assert_eq!(coerce_key("-1e19"), None);
        assert_eq!(coerce_key("9223372036854775807"), Some(i64::MAX));
    }

    #[test]
    fn test_out_of_range_repetition_is_load_failure() {
        let csv = "repetition,experiment,round\n1e19,host+(),1\n";
        let err = parse_federated(csv.as_bytes(), "batch2").unwrap_err();
        assert!(matches!(err, DashboardError::LoadFailure { .. }));
    }

    #[test]
    fn test_manifest_path() {
        let p = default_manifest_path(Path::new("data/a.csv"));
        assert_eq!(p, PathBuf::from("data/a.csv.manifest.json"));
    }
}
