//! Small linear models: standard scaler, ridge regression, L2 logistic
//! regression, plus the evaluation metrics and permutation importance.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;

use super::features::N_FEATURES;

type Row = [f64; N_FEATURES];

/// Logistic regression gradient descent settings.
const LOGISTIC_ITERATIONS: usize = 400;
const LOGISTIC_LEARNING_RATE: f64 = 0.5;

/// Z-score scaling fitted on training rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scaler {
    pub means: Vec<f64>,
    /// Standard deviation per column, 1.0 where the column is constant.
    pub scales: Vec<f64>,
}

impl Scaler {
    pub fn fit(x: &[Row]) -> Self {
        let n = x.len().max(1) as f64;
        let mut means = vec![0.0_f64; N_FEATURES];
        let mut vars = vec![0.0_f64; N_FEATURES];

        for row in x {
            for (d, &v) in row.iter().enumerate() {
                means[d] += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }
        for row in x {
            for (d, &v) in row.iter().enumerate() {
                let diff = v - means[d];
                vars[d] += diff * diff;
            }
        }
        let scales = vars
            .iter()
            .map(|v| {
                let sd = (v / n).sqrt();
                if sd < 1e-12 { 1.0 } else { sd }
            })
            .collect();

        Self { means, scales }
    }

    pub fn transform_row(&self, row: &Row) -> Row {
        let mut out = [0.0; N_FEATURES];
        for d in 0..N_FEATURES {
            out[d] = (row[d] - self.means[d]) / self.scales[d];
        }
        out
    }

    pub fn transform(&self, x: &[Row]) -> Vec<Row> {
        x.iter().map(|r| self.transform_row(r)).collect()
    }
}

/// Ridge regression on scaled inputs. The intercept is not penalised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RidgeModel {
    pub alpha: f64,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl RidgeModel {
    /// Closed-form fit: `(XcᵀXc + αI) w = Xcᵀ(y - ȳ)` on column-centred `X`.
    /// Returns `None` when the system is singular (only possible with `alpha == 0`).
    pub fn fit(x: &[Row], y: &[f64], alpha: f64) -> Option<Self> {
        let n = x.len();
        if n == 0 {
            return None;
        }
        let y_mean = y.iter().sum::<f64>() / n as f64;
        let mut x_mean = [0.0; N_FEATURES];
        for row in x {
            for d in 0..N_FEATURES {
                x_mean[d] += row[d] / n as f64;
            }
        }

        let mut a = vec![vec![0.0_f64; N_FEATURES]; N_FEATURES];
        let mut b = vec![0.0_f64; N_FEATURES];
        for (row, &target) in x.iter().zip(y) {
            let yc = target - y_mean;
            for i in 0..N_FEATURES {
                let xi = row[i] - x_mean[i];
                b[i] += xi * yc;
                for j in 0..N_FEATURES {
                    a[i][j] += xi * (row[j] - x_mean[j]);
                }
            }
        }
        for (i, a_row) in a.iter_mut().enumerate() {
            a_row[i] += alpha;
        }

        let coefficients = solve(a, b)?;
        let intercept = y_mean - dot(&coefficients, &x_mean);
        Some(Self { alpha, intercept, coefficients })
    }

    pub fn predict_row(&self, row: &Row) -> f64 {
        self.intercept + dot(&self.coefficients, row)
    }

    pub fn predict(&self, x: &[Row]) -> Vec<f64> {
        x.iter().map(|r| self.predict_row(r)).collect()
    }
}

/// Binary classifier; degrades to a constant when training saw one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    Constant { class: bool },
    Logistic { intercept: f64, coefficients: Vec<f64>, l2: f64 },
}

impl Classifier {
    /// L2-regularised logistic regression by full-batch gradient descent.
    pub fn fit(x: &[Row], y: &[bool], l2: f64) -> Self {
        let positives = y.iter().filter(|&&c| c).count();
        if positives == 0 || positives == y.len() {
            return Classifier::Constant { class: positives > 0 };
        }

        let n = x.len() as f64;
        let mut w = vec![0.0_f64; N_FEATURES];
        let mut bias = 0.0_f64;

        for _ in 0..LOGISTIC_ITERATIONS {
            let mut grad_w = vec![0.0_f64; N_FEATURES];
            let mut grad_b = 0.0_f64;
            for (row, &label) in x.iter().zip(y) {
                let err = sigmoid(bias + dot(&w, row)) - if label { 1.0 } else { 0.0 };
                grad_b += err;
                for d in 0..N_FEATURES {
                    grad_w[d] += err * row[d];
                }
            }
            for d in 0..N_FEATURES {
                w[d] -= LOGISTIC_LEARNING_RATE * (grad_w[d] + l2 * w[d]) / n;
            }
            bias -= LOGISTIC_LEARNING_RATE * grad_b / n;
        }

        Classifier::Logistic { intercept: bias, coefficients: w, l2 }
    }

    pub fn predict_row(&self, row: &Row) -> bool {
        match self {
            Classifier::Constant { class } => *class,
            Classifier::Logistic { intercept, coefficients, .. } => {
                sigmoid(intercept + dot(coefficients, row)) >= 0.5
            }
        }
    }

    pub fn predict(&self, x: &[Row]) -> Vec<bool> {
        x.iter().map(|r| self.predict_row(r)).collect()
    }
}

/// Coefficient of determination. A constant target scores 1.0 when
/// predicted exactly, else 0.0.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(y, p)| (y - p).powi(2)).sum();
    if ss_tot < 1e-12 {
        return if ss_res < 1e-12 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true.iter().zip(y_pred).map(|(y, p)| (y - p).abs()).sum::<f64>() / y_true.len() as f64
}

pub fn accuracy(y_true: &[bool], y_pred: &[bool]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    hits as f64 / y_true.len() as f64
}

/// Mean drop in R² when each column is shuffled, per column.
///
/// Each column gets its own RNG derived from `seed`, so the result does not
/// depend on thread scheduling.
pub fn permutation_importance(
    model: &RidgeModel,
    x: &[Row],
    y: &[f64],
    repeats: usize,
    seed: u64,
) -> Vec<f64> {
    let baseline = r2_score(y, &model.predict(x));
    let repeats = repeats.max(1);

    (0..N_FEATURES)
        .into_par_iter()
        .map(|col| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(col as u64));
            let mut column: Vec<f64> = x.iter().map(|r| r[col]).collect();
            let mut rows = x.to_vec();
            let mut total = 0.0;
            for _ in 0..repeats {
                column.shuffle(&mut rng);
                for (row, &v) in rows.iter_mut().zip(&column) {
                    row[col] = v;
                }
                total += baseline - r2_score(y, &model.predict(&rows));
            }
            total / repeats as f64
        })
        .collect()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut out = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = (i + 1..n).map(|k| a[i][k] * out[k]).sum();
        out[i] = (b[i] - tail) / a[i][i];
    }
    Some(out)
}
