//! Property tests for forward-return labeling.
//!
//! Uses proptest to verify:
//! 1. The forward return is the percent change to the close `horizon` bars ahead
//! 2. Classification is monotone in the return

use proptest::prelude::*;
use signal_core::config::LabelConfig;
use signal_features::Labeler;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_close() -> impl Strategy<Value = f64> {
    1.0..100_000.0_f64
}

fn arb_return() -> impl Strategy<Value = f64> {
    -50.0..50.0_f64
}

fn arb_threshold() -> impl Strategy<Value = f64> {
    0.0..5.0_f64
}

// ── 1. Forward return ────────────────────────────────────────────────

proptest! {
    #[test]
    fn forward_return_is_percent_change(c0 in arb_close(), c1 in arb_close()) {
        let returns = Labeler::default().forward_returns(&[c0, c1]);

        prop_assert_eq!(returns.len(), 2);
        prop_assert_eq!(returns[0], Some((c1 - c0) / c0 * 100.0));
        prop_assert_eq!(returns[1], None);
    }

    #[test]
    fn forward_return_uses_horizon(
        closes in prop::collection::vec(arb_close(), 2..40),
        horizon in 1usize..5,
    ) {
        let labeler = Labeler::new(&LabelConfig { threshold_pct: 0.5, horizon });
        let returns = labeler.forward_returns(&closes);

        prop_assert_eq!(returns.len(), closes.len());
        for (t, r) in returns.iter().enumerate() {
            match closes.get(t + horizon) {
                Some(&future) => {
                    prop_assert_eq!(*r, Some((future - closes[t]) / closes[t] * 100.0));
                }
                None => prop_assert_eq!(*r, None),
            }
        }
    }
}

// ── 2. Monotone classification ───────────────────────────────────────

proptest! {
    #[test]
    fn classification_is_monotone(
        a in arb_return(),
        b in arb_return(),
        threshold_pct in arb_threshold(),
    ) {
        let labeler = Labeler::new(&LabelConfig { threshold_pct, horizon: 1 });
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        let low_signal = labeler.classify(low).unwrap();
        let high_signal = labeler.classify(high).unwrap();
        prop_assert!(low_signal.numeric() <= high_signal.numeric());
    }
}
