// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::repro::ReproMode;

/// Running compensated sum (Kahan-Babuska).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    pub const fn new() -> Self {
        Self {
            sum: 0.0,
            compensation: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn total(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Population mean and variance (denominator = count) of `values`.
///
/// Returns `None` for an empty input. The variance is never negative. Values
/// are accumulated relative to the first one, so a constant input yields that
/// value and a zero variance exactly.
pub fn population_moments(values: &[f64], mode: ReproMode) -> Option<(f64, f64)> {
    let shift = *values.first()?;
    let count = values.len() as f64;

    let moments = match mode {
        ReproMode::Balanced => {
            let offset = values.iter().map(|value| value - shift).sum::<f64>() / count;
            let squared = values
                .iter()
                .map(|value| {
                    let centered = (value - shift) - offset;
                    centered * centered
                })
                .sum::<f64>();
            (shift + offset, squared / count)
        }
        ReproMode::Strict => {
            let mut sum = KahanSum::new();
            values.iter().for_each(|value| sum.add(value - shift));
            let offset = sum.total() / count;
            let mut squared = KahanSum::new();
            for value in values {
                let centered = (value - shift) - offset;
                squared.add(centered * centered);
            }
            (shift + offset, squared.total() / count)
        }
        ReproMode::Fast => {
            let (sum, sum_sq) = values.iter().fold((0.0_f64, 0.0_f64), |(s, sq), value| {
                let shifted = value - shift;
                (s + shifted, sq + shifted * shifted)
            });
            let offset = sum / count;
            (shift + offset, (sum_sq / count - offset * offset).max(0.0))
        }
    };
    Some(moments)
}

#[cfg(test)]
mod tests {
    use super::{KahanSum, population_moments};
    use crate::ReproMode;

    #[test]
    fn kahan_recovers_small_terms_lost_by_naive_sum() {
        let mut kahan = KahanSum::new();
        let mut naive = 0.0_f64;
        kahan.add(1.0e16);
        naive += 1.0e16;
        for _ in 0..10 {
            kahan.add(1.0);
            naive += 1.0;
        }
        kahan.add(-1.0e16);
        naive -= 1.0e16;

        assert_eq!(kahan.total(), 10.0);
        assert_ne!(naive, 10.0);
    }

    #[test]
    fn population_moments_use_count_denominator() {
        for mode in [ReproMode::Strict, ReproMode::Balanced, ReproMode::Fast] {
            let (mean, variance) =
                population_moments(&[1.0, 2.0], mode).expect("non-empty input");
            assert_eq!(mean, 1.5);
            assert_eq!(variance, 0.25);
            assert!(population_moments(&[], mode).is_none());
        }
    }

    #[test]
    fn fast_mode_never_reports_negative_variance() {
        let values = vec![0.1_f64; 1000];
        let (_, variance) = population_moments(&values, ReproMode::Fast).expect("non-empty");
        assert!(variance >= 0.0);
    }

    #[test]
    fn constant_input_is_exact_in_every_mode() {
        for v in [0.1_f64, -3.3, 1.0e-7, 123_456.7] {
            let values = vec![v; 37];
            for mode in ReproMode::ALL {
                assert_eq!(population_moments(&values, mode), Some((v, 0.0)));
            }
        }
    }
}
