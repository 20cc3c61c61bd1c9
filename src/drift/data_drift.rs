//! Two-sample Kolmogorov-Smirnov test

use std::cmp::Ordering;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::drift::{DriftDetector, DriftResult};
use crate::error::{MaintenanceError, Result};

/// Kolmogorov-Smirnov test for distribution comparison
///
/// The p-value uses the asymptotic Kolmogorov distribution with Stephens'
/// small-sample correction. Drift is reported when `p_value < alpha`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KolmogorovSmirnovTest {
    /// Significance level (alpha)
    alpha: f64,
}

impl KolmogorovSmirnovTest {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    /// Maximum distance between the two empirical CDFs
    pub fn statistic(reference: &[f64], test: &[f64]) -> f64 {
        let mut a = reference.to_vec();
        let mut b = test.to_vec();
        a.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
        b.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));

        let (n1, n2) = (a.len() as f64, b.len() as f64);
        let (mut i, mut j) = (0usize, 0usize);
        let mut d: f64 = 0.0;
        while i < a.len() && j < b.len() {
            let x = a[i].min(b[j]);
            while i < a.len() && a[i] <= x {
                i += 1;
            }
            while j < b.len() && b[j] <= x {
                j += 1;
            }
            d = d.max((i as f64 / n1 - j as f64 / n2).abs());
        }
        d
    }

    /// Asymptotic two-sided p-value of a statistic for sample sizes `n1` and `n2`
    pub fn p_value(statistic: f64, n1: usize, n2: usize) -> f64 {
        if statistic <= 0.0 {
            return 1.0;
        }
        let en = ((n1 * n2) as f64 / (n1 + n2) as f64).sqrt();
        kolmogorov_survival((en + 0.12 + 0.11 / en) * statistic)
    }
}

/// Survival function of the Kolmogorov distribution
fn kolmogorov_survival(lambda: f64) -> f64 {
    let a2 = -2.0 * lambda * lambda;
    let mut sign = 1.0;
    let mut sum = 0.0;
    let mut previous = 0.0;
    for j in 1..=100 {
        let term = sign * 2.0 * (a2 * (j * j) as f64).exp();
        sum += term;
        if term.abs() <= 1e-3 * previous || term.abs() <= 1e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    // Series did not converge, which only happens as lambda approaches zero
    1.0
}

impl Default for KolmogorovSmirnovTest {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl DriftDetector for KolmogorovSmirnovTest {
    fn detect(&self, reference: &Array1<f64>, test: &Array1<f64>) -> Result<DriftResult> {
        if reference.is_empty() || test.is_empty() {
            return Err(MaintenanceError::ValidationError(
                "Empty arrays provided".to_string(),
            ));
        }

        let reference: Vec<f64> = reference.iter().copied().collect();
        let test: Vec<f64> = test.iter().copied().collect();
        let statistic = Self::statistic(&reference, &test);
        let p_value = Self::p_value(statistic, reference.len(), test.len());

        Ok(DriftResult {
            drift_detected: p_value < self.alpha,
            score: statistic,
            p_value,
            threshold: self.alpha,
        })
    }

    fn threshold(&self) -> f64 {
        self.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_identical_samples() {
        let data = Array1::from_vec(vec![3.0, 1.0, 2.0, 2.0, 5.0]);
        let result = KolmogorovSmirnovTest::default().detect(&data, &data).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.p_value, 1.0);
        assert!(!result.drift_detected);
    }

    #[test]
    fn test_ks_test_no_drift() {
        let ref_data = Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let test_data = Array1::from_vec(vec![1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5, 9.5, 10.5]);

        let result = KolmogorovSmirnovTest::new(0.05).detect(&ref_data, &test_data).unwrap();
        assert!((result.score - 0.1).abs() < 1e-12);
        assert!(!result.drift_detected);
    }

    #[test]
    fn test_ks_test_with_drift() {
        let ref_data = Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let test_data = Array1::from_vec(vec![
            100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0, 170.0, 180.0, 190.0,
        ]);

        let result = KolmogorovSmirnovTest::new(0.05).detect(&ref_data, &test_data).unwrap();
        assert_eq!(result.score, 1.0);
        assert!(result.p_value < 0.001);
        assert!(result.drift_detected);
    }

    #[test]
    fn test_large_same_distribution() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let a: Vec<f64> = (0..2000).map(|_| rng.gen::<f64>()).collect();
        let b: Vec<f64> = (0..500).map(|_| rng.gen::<f64>()).collect();

        let d = KolmogorovSmirnovTest::statistic(&a, &b);
        let p = KolmogorovSmirnovTest::p_value(d, a.len(), b.len());
        assert!(p > 0.01, "p = {}", p);
    }

    #[test]
    fn test_survival_bounds() {
        assert_eq!(kolmogorov_survival(0.0), 1.0);
        assert!(kolmogorov_survival(3.0) < 1e-6);
        let mid = kolmogorov_survival(1.36);
        assert!((mid - 0.05).abs() < 0.005);
    }

    #[test]
    fn test_empty_input() {
        let empty = Array1::<f64>::zeros(0);
        let data = Array1::from_vec(vec![1.0]);
        assert!(KolmogorovSmirnovTest::default().detect(&empty, &data).is_err());
    }
}
