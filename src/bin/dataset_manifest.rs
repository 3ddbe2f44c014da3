use fldash::config::Config;
use fldash::data::{analyze_csv, default_manifest_path};
use serde_json::json;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    // No arguments: describe the three configured sources
    let mut paths: Vec<PathBuf> = env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        let cfg = Config::from_env();
        paths = vec![cfg.batch1_path, cfg.batch2_path, cfg.independent_path];
    }

    let now_ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut failures = 0;
    for path in &paths {
        let manifest = match analyze_csv(path, now_ts) {
            Ok(m) => m,
            Err(err) => {
                eprintln!("analysis failed for {}: {}", path.display(), err);
                failures += 1;
                continue;
            }
        };
        if !manifest.missing_columns.is_empty() {
            eprintln!(
                "{}: missing columns {:?}",
                path.display(),
                manifest.missing_columns
            );
        }

        let out_path = default_manifest_path(path);
        let payload = match serde_json::to_string_pretty(&json!({ "manifest": manifest })) {
            Ok(p) => p,
            Err(err) => {
                eprintln!("failed to encode manifest: {}", err);
                failures += 1;
                continue;
            }
        };
        if let Err(err) = fs::write(&out_path, payload) {
            eprintln!("failed to write {}: {}", out_path.display(), err);
            failures += 1;
            continue;
        }
        println!("wrote manifest {}", out_path.display());
    }

    if failures > 0 {
        std::process::exit(3);
    }
}
