//! End-to-end behavior on synthetic streams.

mod common;

use common::LinearStream;
use rulestream::{DenseRecord, Record, RuleSet, RulestreamConfig, SparseRecord};

#[test]
fn test_learns_linear_stream_better_than_global_mean() {
    common::init_logging();
    let mut stream = LinearStream::new(11, 0.05);
    let mut learner = RuleSet::new(RulestreamConfig::default()).unwrap();

    let mut target_sum = 0.0;
    for _ in 0..10_000 {
        let record = stream.next_record();
        target_sum += record.target();
        learner.train(&record);
    }
    let global_mean = target_sum / 10_000.0;

    assert!(
        !learner.rules().is_empty(),
        "a structured stream should induce at least one rule"
    );

    let mut model_error = 0.0;
    let mut baseline_error = 0.0;
    for _ in 0..500 {
        let record = stream.next_record();
        model_error += (learner.predict(&record) - record.target()).abs();
        baseline_error += (global_mean - record.target()).abs();
    }
    assert!(
        model_error < baseline_error,
        "model mae {} should beat global-mean mae {}",
        model_error / 500.0,
        baseline_error / 500.0
    );
}

#[test]
fn test_abrupt_concept_change_prunes_rules() {
    common::init_logging();
    let mut stream = LinearStream::new(23, 0.05);
    let mut learner = RuleSet::new(RulestreamConfig::default()).unwrap();

    for _ in 0..5_000 {
        learner.train(&stream.next_record());
    }
    assert!(
        !learner.rules().is_empty(),
        "rules must exist before the change for pruning to be observable"
    );

    stream.flip();
    for _ in 0..5_000 {
        learner.train(&stream.next_record());
    }
    assert!(
        learner.stats().drift_removals >= 1,
        "sign flip should trip the drift detector, stats: {:?}",
        learner.stats()
    );
}

#[test]
fn test_outlier_is_suppressed_not_learned() {
    common::init_logging();
    let mut stream = LinearStream::new(31, 0.05);
    let mut config = RulestreamConfig::default();
    // A huge grace period keeps everything on the default rule.
    config.grace_period = 1_000_000;
    let mut learner = RuleSet::new(config).unwrap();

    for _ in 0..500 {
        learner.train(&stream.next_record());
    }
    let seen_before = learner.default_rule().instances_seen();

    // One attribute three orders of magnitude out of range.
    let outlier = DenseRecord::new(vec![1000.0, 0.5], 0.0);
    learner.train(&outlier);

    assert_eq!(learner.stats().anomalies_suppressed, 1);
    assert_eq!(
        learner.default_rule().instances_seen(),
        seen_before,
        "a suppressed instance must not touch rule statistics"
    );

    // The stream continues unharmed.
    for _ in 0..100 {
        learner.train(&stream.next_record());
    }
    assert_eq!(
        learner.default_rule().instances_seen(),
        seen_before + 100.0
    );
}

#[test]
fn test_identical_seeds_give_identical_models() {
    common::init_logging();
    let config = RulestreamConfig::default();
    let mut a = RuleSet::new(config.clone()).unwrap();
    let mut b = RuleSet::new(config).unwrap();

    let mut stream_a = LinearStream::new(47, 0.05);
    let mut stream_b = LinearStream::new(47, 0.05);
    for _ in 0..8_000 {
        a.train(&stream_a.next_record());
        b.train(&stream_b.next_record());
    }

    assert_eq!(a.rules().len(), b.rules().len());
    let probe = DenseRecord::new(vec![0.3, 0.7], 0.0);
    assert_eq!(a.predict(&probe), b.predict(&probe));
}

#[test]
fn test_sparse_records_interoperate_with_dense() {
    common::init_logging();
    let mut stream = LinearStream::new(59, 0.05);
    let mut learner = RuleSet::new(RulestreamConfig::default()).unwrap();
    for _ in 0..3_000 {
        learner.train(&stream.next_record());
    }

    // Absent sparse entries read as zero, so this probe is (0.4, 0.0).
    let sparse = SparseRecord::new(2, vec![0], vec![0.4], 3.0 * 0.4);
    let dense = DenseRecord::new(vec![0.4, 0.0], 3.0 * 0.4);
    assert_eq!(learner.predict(&sparse), learner.predict(&dense));
}

#[test]
fn test_ordered_and_unordered_both_learn() {
    common::init_logging();
    for ordered in [false, true] {
        let mut stream = LinearStream::new(61, 0.05);
        let mut config = RulestreamConfig::default();
        config.ordered = ordered;
        let mut learner = RuleSet::new(config).unwrap();
        for _ in 0..6_000 {
            learner.train(&stream.next_record());
        }
        let mut total = 0.0;
        for _ in 0..200 {
            let record = stream.next_record();
            let prediction = learner.predict(&record);
            assert!(
                prediction.is_finite(),
                "ordered={} must produce finite predictions",
                ordered
            );
            total += (prediction - record.target()).abs();
        }
        let mae = total / 200.0;
        assert!(mae < 1.0, "ordered={} mae {} too high", ordered, mae);
    }
}
