//! Linear classifiers

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::training::{check_fit_input, sorted_classes, Classifier};

/// Binary logistic regression with L2 penalty, fit by gradient descent
///
/// Minimises `mean(log_loss) + ||w||^2 / (2 * C * n)`, the per-sample form
/// of `C * sum(log_loss) + ||w||^2 / 2`. The intercept is not penalised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Gradient norm below which fitting stops
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    classes: Vec<f64>,
    n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 2000,
            tol: 1e-6,
            learning_rate: 0.5,
            classes: Vec::new(),
            n_iter: 0,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Iterations run by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        if !(self.c > 0.0) {
            return Err(MaintenanceError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let classes = sorted_classes(y);
        if classes.len() != 2 {
            return Err(MaintenanceError::TrainingError(format!(
                "logistic regression needs exactly 2 classes, found {}",
                classes.len()
            )));
        }

        let n_samples = x.nrows() as f64;
        let target = y.mapv(|v| if v == classes[1] { 1.0 } else { 0.0 });
        let penalty = 1.0 / (self.c * n_samples);
        let lr = self.learning_rate;

        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;
        let mut n_iter = self.max_iter;

        for iter in 0..self.max_iter {
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - &target;
            let dw = x.t().dot(&errors) / n_samples + &weights * penalty;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                n_iter = iter;
                break;
            }

            weights = weights - dw * lr;
            bias -= lr * db;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.classes = classes;
        self.n_iter = n_iter;
        Ok(self)
    }

    /// Probability of the larger class label
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(MaintenanceError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let intercept = self.intercept.unwrap_or(0.0);
        Ok(Self::sigmoid(&(x.dot(coefficients) + intercept)))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let (negative, positive) = (self.classes[0], self.classes[1]);
        Ok(proba.mapv(|p| if p > 0.5 { positive } else { negative }))
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LogisticRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::accuracy_score;
    use crate::training::tests::two_blobs;
    use ndarray::array;

    #[test]
    fn test_logistic_regression_separates_blobs() {
        let (x, y) = two_blobs(20);
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(accuracy_score(&y, &model.predict(&x).unwrap()), 1.0);
        assert!(model.coefficients.as_ref().unwrap()[0] > 0.0);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = two_blobs(10);
        let mut model = LogisticRegression::new().with_max_iter(50);
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_labels_other_than_zero_one() {
        let x = array![[0.0], [0.1], [0.9], [1.0]];
        let y = array![2.0, 2.0, 5.0, 5.0];
        let mut model = LogisticRegression::new().with_c(100.0);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut model = LogisticRegression::new().with_c(0.0);
        assert!(model.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).is_err());

        let mut model = LogisticRegression::new();
        assert!(model.fit(&array![[0.0], [1.0], [2.0]], &array![0.0, 1.0, 2.0]).is_err());
        assert!(matches!(
            LogisticRegression::new().predict(&array![[0.0]]),
            Err(MaintenanceError::ModelNotFitted)
        ));
    }
}
