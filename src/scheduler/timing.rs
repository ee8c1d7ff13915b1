//! Tick interval selection.

use rand::Rng;
use std::time::Duration;

use crate::config::Config;

/// Draw the pause before the next tick, uniformly from
/// `[min_interval_ms, max_interval_ms]` (inclusive). Called once per tick so
/// consecutive gaps never repeat a fixed cadence.
pub fn sample_delay<R: Rng + ?Sized>(rng: &mut R, config: &Config) -> Duration {
    let ms = rng.random_range(config.min_interval_ms()..=config.max_interval_ms());
    Duration::from_millis(u64::from(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigDraft, validate_config};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config(min: u32, max: u32) -> Config {
        validate_config(&ConfigDraft {
            min_interval_ms: min,
            max_interval_ms: max,
            ..ConfigDraft::default()
        })
        .unwrap()
    }

    #[test]
    fn samples_stay_within_bounds_and_spread_evenly() {
        let cfg = config(1_000, 2_000);
        let mut rng = StdRng::seed_from_u64(2024);
        const SAMPLES: usize = 20_000;
        const BUCKETS: usize = 10;
        let mut histogram = [0usize; BUCKETS];
        let (mut lo, mut hi) = (u128::MAX, 0u128);

        for _ in 0..SAMPLES {
            let ms = sample_delay(&mut rng, &cfg).as_millis();
            assert!((1_000..=2_000).contains(&ms));
            lo = lo.min(ms);
            hi = hi.max(ms);
            let bucket = (((ms - 1_000) as usize) * BUCKETS / 1_001).min(BUCKETS - 1);
            histogram[bucket] += 1;
        }

        // Each bucket should hold ~10% of the draws.
        let expected = SAMPLES / BUCKETS;
        for (i, count) in histogram.iter().enumerate() {
            let deviation = count.abs_diff(expected) as f64 / expected as f64;
            assert!(deviation < 0.1, "bucket {i} has {count} samples");
        }
        // Both ends of the range are reachable in practice.
        assert!(lo < 1_010 && hi > 1_990);
    }

    #[test]
    fn degenerate_range_is_constant() {
        let cfg = config(1_500, 1_500);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(sample_delay(&mut rng, &cfg), Duration::from_millis(1_500));
        }
    }

    #[test]
    fn consecutive_delays_vary() {
        let cfg = config(1_000, 3_600_000);
        let mut rng = StdRng::seed_from_u64(8);
        let a = sample_delay(&mut rng, &cfg);
        let b = sample_delay(&mut rng, &cfg);
        let c = sample_delay(&mut rng, &cfg);
        assert!(a != b || b != c);
    }
}
