//! Randomized checks of the index invariants, seeded for reproducibility.

use std::collections::BTreeMap;

use fldash::config::EmptyBatchPolicy;
use fldash::data::{FederatedRow, IndependentRow};
use fldash::index::build;
use fldash::key::{ExperimentKey, GUESTS};
use fldash::{experiment_key, scenario_name};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn random_key(rng: &mut StdRng) -> String {
    let guests: Vec<_> = GUESTS.iter().copied().filter(|_| rng.gen_bool(0.5)).collect();
    ExperimentKey::new(&guests).encode()
}

/// `tag` is stored in test_mse so tie order can be checked.
fn random_batch(rng: &mut StdRng, reps: i64, n: usize) -> Vec<FederatedRow> {
    (0..n)
        .map(|tag| FederatedRow {
            repetition: rng.gen_range(1..=reps),
            experiment: random_key(rng),
            round: rng.gen_range(1..=6) as f64,
            training_loss: rng.gen(),
            test_mse: tag as f64,
            ablation: BTreeMap::new(),
        })
        .collect()
}

#[test]
fn shifted_ranges_never_overlap() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let reps1 = rng.gen_range(1..6);
        let reps2 = rng.gen_range(1..6);
        let b1 = random_batch(&mut rng, reps1, 40);
        let b2 = random_batch(&mut rng, reps2, 40);
        let max1 = b1.iter().map(|r| r.repetition).max().unwrap();
        let b2_keys: Vec<(i64, String)> = b2.iter().map(|r| (r.repetition, r.experiment.clone())).collect();

        let (index, _) = build(b1, b2, vec![], EmptyBatchPolicy::Reject).unwrap();
        for (rep, exp) in b2_keys {
            assert!(rep + max1 > max1);
            assert!(index.bucket_raw(rep + max1, &exp).is_some());
        }
    }
}

#[test]
fn buckets_sorted_and_stable_for_ties() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut b1 = random_batch(&mut rng, 3, 200);
    b1.shuffle(&mut rng);
    // Input position per tag, to verify stability
    let position: BTreeMap<i64, usize> = b1.iter().enumerate().map(|(i, r)| (r.test_mse as i64, i)).collect();

    let (index, _) = build(b1, vec![], vec![], EmptyBatchPolicy::Reject).unwrap();
    for rep in index.repetitions() {
        for exp in index.experiments(rep) {
            let bucket = index.bucket_raw(rep, exp).unwrap();
            assert!(!bucket.is_empty());
            for pair in bucket.windows(2) {
                assert!(pair[0].round <= pair[1].round);
                if pair[0].round == pair[1].round {
                    assert!(position[&(pair[0].test_mse as i64)] < position[&(pair[1].test_mse as i64)]);
                }
            }
        }
    }
}

#[test]
fn independent_series_is_stable_by_epoch() {
    let mut rng = StdRng::seed_from_u64(3);
    let rows: Vec<IndependentRow> = (0..100)
        .map(|i| IndependentRow {
            client: ["host", "guest_1"][rng.gen_range(0..2)].to_string(),
            rep: rng.gen_range(1..3),
            epoch: rng.gen_range(1..10) as f64,
            mse: i as f64,
        })
        .collect();
    let (_, series) = build(vec![], vec![], rows, EmptyBatchPolicy::Reject).unwrap();
    for pair in series.rows().windows(2) {
        assert!(pair[0].epoch <= pair[1].epoch);
        if pair[0].epoch == pair[1].epoch {
            assert!(pair[0].mse < pair[1].mse);
        }
    }
    let first = series.query("host", 1);
    assert_eq!(first, series.query("host", 1));
}

#[test]
fn selection_key_matches_ingestion_key() {
    for mask in 0u8..8 {
        let ids: Vec<&str> = GUESTS
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, g)| g.as_str())
            .collect();
        let structured = ExperimentKey::parse(&experiment_key(&ids)).unwrap();
        assert_eq!(structured.encode(), experiment_key(&ids));
        assert!(!scenario_name(&structured.encode()).is_empty());
    }
}
