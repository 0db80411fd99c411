use crate::digamma::digamma;
use crate::params::Params;
use crate::record::Record;
use std::ops::Add;

/// Digamma sums over a batch for one fixed-point update.
///
/// `alpha_term`: Σ ψ(c + α) - ψ(α)
/// `beta_term`: Σ ψ(i - c + β) - ψ(β)
/// `total_term`: Σ ψ(i + α + β) - ψ(α + β), the denominator shared by both updates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DigammaSums {
    pub alpha_term: f64,
    pub beta_term: f64,
    pub total_term: f64,
}

impl DigammaSums {
    /// Single pass over `records`
    pub fn sequential(records: &[Record], params: Params) -> Self {
        let psi_alpha = digamma(params.alpha);
        let psi_beta = digamma(params.beta);
        let sum = params.sum();
        let psi_sum = digamma(sum);
        let mut sums = DigammaSums::default();
        for record in records {
            sums.alpha_term += digamma(record.clicks() as f64 + params.alpha) - psi_alpha;
            sums.beta_term += digamma(record.non_clicks() + params.beta) - psi_beta;
            sums.total_term += digamma(record.impressions() as f64 + sum) - psi_sum;
        }
        sums
    }

    /// Split `records` in halves until each part has at most `threshold`
    /// records, summing the halves with `rayon::join` on the current pool.
    ///
    /// The result may differ from `sequential` in the last bits because the
    /// additions happen in a different order.
    pub fn parallel(records: &[Record], params: Params, threshold: usize) -> Self {
        if records.len() <= threshold.max(1) {
            return Self::sequential(records, params);
        }
        let (left, right) = records.split_at(records.len() / 2);
        let (left, right) = rayon::join(
            || Self::parallel(left, params, threshold),
            || Self::parallel(right, params, threshold),
        );
        left + right
    }

    pub fn is_finite(&self) -> bool {
        self.alpha_term.is_finite() && self.beta_term.is_finite() && self.total_term.is_finite()
    }
}

impl Add for DigammaSums {
    type Output = DigammaSums;

    fn add(self, rhs: DigammaSums) -> DigammaSums {
        DigammaSums {
            alpha_term: self.alpha_term + rhs.alpha_term,
            beta_term: self.beta_term + rhs.beta_term,
            total_term: self.total_term + rhs.total_term,
        }
    }
}
