//! Property tests for the pure calculators and the classifier.

use proptest::prelude::*;
use vigil_core::stability::{BOOST_FACTOR, MAX_STABILITY};
use vigil_core::{classify, compute, compute_stability, Participant, ScoreInputs, StatusThresholds};

fn finite() -> impl Strategy<Value = f64> {
    -1.0e6..1.0e6f64
}

fn any_f64() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => finite(),
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

fn participant(name: &'static str) -> impl Strategy<Value = Participant> {
    (any_f64(), any_f64()).prop_map(move |(clearance, reach)| Participant::new(name, clearance, reach))
}

proptest! {
    #[test]
    fn score_is_always_within_unit_interval(
        alignment in any_f64(),
        coherence in any_f64(),
        harmonic in any_f64(),
        intensity in any_f64(),
        belief in any_f64(),
        trust in any_f64(),
        hz in prop_oneof![Just(432.0), Just(528.0), 0.0..1000.0f64],
    ) {
        let score = compute(&ScoreInputs {
            alignment_index: alignment,
            coherence_factor: coherence,
            harmonic_quotient: harmonic,
            intensity,
            belief,
            trust,
            reference_hz: hz,
        });
        prop_assert!((0.0..=1.0).contains(&score), "score out of range: {score}");
    }

    #[test]
    fn classification_is_monotonic(a in -50.0..150.0f64, b in -50.0..150.0f64) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify(lo) <= classify(hi));
    }

    #[test]
    fn custom_thresholds_are_monotonic(
        optimal in 60.0..100.0f64,
        gap1 in 1.0..20.0f64,
        gap2 in 1.0..20.0f64,
        a in 0.0..100.0f64,
        b in 0.0..100.0f64,
    ) {
        let thresholds = StatusThresholds::new(optimal, optimal - gap1, optimal - gap1 - gap2)
            .expect("strictly decreasing");
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(thresholds.classify(lo) <= thresholds.classify(hi));
    }

    #[test]
    fn stability_is_bounded_and_boost_tracks_value(
        a in participant("helm"),
        b in participant("ops"),
        c in participant("science"),
    ) {
        let metric = compute_stability(&[a, b, c]);
        prop_assert!(metric.value >= 0.0 && metric.value <= MAX_STABILITY);
        prop_assert!((metric.boost - metric.value * BOOST_FACTOR).abs() < 1e-12);
    }

    #[test]
    fn incomplete_cohort_is_zero(a in participant("helm"), b in participant("ops")) {
        let metric = compute_stability(&[a, b]);
        prop_assert_eq!(metric.value, 0.0);
        prop_assert_eq!(metric.boost, 0.0);
    }
}
