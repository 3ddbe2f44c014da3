//! End-to-end: CSV files on disk through the load barrier, index and selection.

use std::fs;
use std::path::Path;

use fldash::config::{Config, EmptyBatchPolicy};
use fldash::{ClientId, Dashboard, DashboardError, Selection};
use tempfile::TempDir;

const HEADER: &str = "repetition,experiment,round,training_loss,test_mse,ablation_host,ablation_guest_1,ablation_guest_2,ablation_guest_3";

fn write_sources(dir: &Path, batch1: &[&str], batch2: &[&str], independent: &[&str]) -> Config {
    let cfg = Config::with_data_dir(dir);
    let join = |header: &str, rows: &[&str]| {
        let mut out = format!("{}\n", header);
        for r in rows {
            out.push_str(r);
            out.push('\n');
        }
        out
    };
    fs::write(&cfg.batch1_path, join(HEADER, batch1)).unwrap();
    fs::write(&cfg.batch2_path, join(HEADER, batch2)).unwrap();
    fs::write(&cfg.independent_path, join("client,rep,epoch,mse", independent)).unwrap();
    cfg
}

fn standard(dir: &Path) -> Config {
    write_sources(
        dir,
        &[
            "1,host+(),2,0.8,1.0,0.3,,,",
            "1,host+(),1,0.9,1.1,0.4,,,",
            "2,\"host+('guest_1', 'guest_3')\",1,0.7,0.9,0.2,0.1,,0.05",
            "2,\"host+('guest_1', 'guest_3')\",2,0.6,0.8,0.2,0.12,,0.06",
        ],
        &[
            "1,\"host+('guest_1',)\",1,0.5,0.7,0.3,0.2,,",
            "2,\"host+('guest_1', 'guest_2', 'guest_3')\",1,0.4,0.6,0.1,0.1,0.1,",
        ],
        &[
            "host,1,2,0.4",
            "guest_1,1,1,0.9",
            "host,1,1,0.5",
            "host,2,1,0.7",
        ],
    )
}

#[tokio::test]
async fn second_batch_is_shifted_past_first() {
    let dir = TempDir::new().unwrap();
    let dash = Dashboard::load(&standard(dir.path())).await.unwrap();

    let reps: Vec<i64> = dash.index().repetitions().collect();
    assert_eq!(reps, vec![1, 2, 3, 4]);

    let feed = dash.select(&Selection::new([ClientId::Guest1], [3]));
    assert_eq!(feed.key, "host+('guest_1',)");
    assert_eq!(feed.scenario, "Host + LTA");
    assert_eq!(feed.training_loss.len(), 1);
    let loss = &feed.training_loss[0];
    assert_eq!(loss.label, "Host + LTA (Rep 3)");
    assert_eq!(loss.color, "#9467bd");
    assert_eq!((loss.points[0].x, loss.points[0].y), (1.0, 0.5));
    assert!(feed.missing_reps.is_empty());
}

#[tokio::test]
async fn host_only_rows_are_sorted_by_round() {
    let dir = TempDir::new().unwrap();
    let dash = Dashboard::load(&standard(dir.path())).await.unwrap();
    let feed = dash.select(&Selection::new(Vec::<ClientId>::new(), [1]));
    let xs: Vec<f64> = feed.test_mse[0].points.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![1.0, 2.0]);
    // Only the host tracks a contribution in host-only runs
    assert_eq!(feed.contribution.len(), 1);
    assert_eq!(feed.contribution[0].label, "HDB Carpark (Rep 1)");
}

#[tokio::test]
async fn missing_field_yields_no_contribution_curve() {
    let dir = TempDir::new().unwrap();
    let dash = Dashboard::load(&standard(dir.path())).await.unwrap();
    // Rep 4 full-set run has no ablation_guest_3 value on its first row
    let feed = dash.select(&Selection::new(
        [ClientId::Guest1, ClientId::Guest2, ClientId::Guest3],
        [4],
    ));
    assert_eq!(feed.scenario, "Host + LTA + Housing + Grab");
    let labels: Vec<&str> = feed.contribution.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["HDB Carpark (Rep 4)", "LTA (Rep 4)", "HDB Housing (Rep 4)"]
    );
}

#[tokio::test]
async fn lookup_miss_is_empty_not_error() {
    let dir = TempDir::new().unwrap();
    let dash = Dashboard::load(&standard(dir.path())).await.unwrap();
    let feed = dash.select(&Selection::new([ClientId::Guest2], [1, 2, 99]));
    assert!(feed.is_empty());
    assert_eq!(feed.missing_reps, vec![1, 2, 99]);
}

#[tokio::test]
async fn individual_comparison_query() {
    let dir = TempDir::new().unwrap();
    let dash = Dashboard::load(&standard(dir.path())).await.unwrap();
    let ds = dash.individual("host", 1);
    assert_eq!(ds.label, "HDB Carpark Data · Rep 1");
    let pts: Vec<(f64, f64)> = ds.points.iter().map(|p| (p.x, p.y)).collect();
    assert_eq!(pts, vec![(1.0, 0.5), (2.0, 0.4)]);
    let opts = dash.comparison_options();
    assert_eq!(opts.clients, vec!["guest_1".to_string(), "host".to_string()]);
    assert_eq!(opts.reps, vec![1, 2]);
}

#[tokio::test]
async fn missing_source_aborts_whole_load() {
    let dir = TempDir::new().unwrap();
    let cfg = standard(dir.path());
    fs::remove_file(&cfg.independent_path).unwrap();
    let err = Dashboard::load(&cfg).await.unwrap_err();
    assert!(matches!(err, DashboardError::LoadFailure { ref source_name, .. } if source_name == "independent"));
}

#[tokio::test]
async fn empty_first_batch_policy() {
    let dir = TempDir::new().unwrap();
    let mut cfg = write_sources(dir.path(), &[], &["1,host+(),1,0.5,0.7,0.3,,,"], &[]);
    let err = Dashboard::load(&cfg).await.unwrap_err();
    assert!(matches!(err, DashboardError::EmptyInput { batch2_rows: 1 }));

    cfg.empty_batch = EmptyBatchPolicy::ZeroShift;
    let dash = Dashboard::load(&cfg).await.unwrap();
    assert_eq!(dash.index().repetitions().collect::<Vec<_>>(), vec![1]);
}
