use crate::config::DeltaMetric;
use serde::{Deserialize, Serialize};

/// Shape parameters (α, β) of the Beta prior at one point of the iteration.
///
/// Each step produces a new pair instead of updating the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub alpha: f64,
    pub beta: f64,
}

impl Params {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    pub fn is_finite(&self) -> bool {
        self.alpha.is_finite() && self.beta.is_finite()
    }

    /// Finite and strictly positive, i.e. a proper Beta distribution
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.alpha > 0.0 && self.beta > 0.0
    }

    pub fn sum(&self) -> f64 {
        self.alpha + self.beta
    }

    /// Change from `previous` to `self`.
    ///
    /// The relative metric divides by the current values and reports an
    /// infinite delta when either of them is exactly zero.
    pub fn delta(&self, previous: &Params, metric: DeltaMetric) -> f64 {
        match metric {
            DeltaMetric::Absolute => (self.alpha - previous.alpha)
                .abs()
                .max((self.beta - previous.beta).abs()),
            DeltaMetric::Relative => {
                if self.alpha == 0.0 || self.beta == 0.0 {
                    return f64::INFINITY;
                }
                let d_alpha = ((self.alpha - previous.alpha) / self.alpha).abs();
                let d_beta = ((self.beta - previous.beta) / self.beta).abs();
                d_alpha.max(d_beta)
            }
        }
    }
}
