use crate::params::Params;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;
use std::fmt;

/// Fitted Beta prior for one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingResult {
    pub group_id: i64,
    pub alpha: f64,
    pub beta: f64,
}

impl SmoothingResult {
    pub fn new(group_id: i64, alpha: f64, beta: f64) -> Self {
        Self {
            group_id,
            alpha,
            beta,
        }
    }

    pub fn from_params(group_id: i64, params: Params) -> Self {
        Self::new(group_id, params.alpha, params.beta)
    }

    pub fn params(&self) -> Params {
        Params::new(self.alpha, self.beta)
    }

    /// Posterior mean CTR of `record` under the fitted prior:
    /// `(α + clicks) / (α + β + impressions)`
    pub fn smoothing_ctr(&self, record: &Record) -> f64 {
        (self.alpha + record.clicks() as f64)
            / (self.alpha + self.beta + record.impressions() as f64)
    }

    /// Smoothed CTR of a record without any impressions
    pub fn prior_mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn prior_variance(&self) -> f64 {
        let sum = self.alpha + self.beta;
        self.alpha * self.beta / (sum * sum * (sum + 1.0))
    }

    /// α + β, the number of pseudo-impressions the prior adds to every record
    pub fn prior_strength(&self) -> f64 {
        self.alpha + self.beta
    }

    /// Beta-Binomial marginal log-likelihood of `records`.
    pub fn log_likelihood(&self, records: &[Record]) -> f64 {
        let (a, b) = (self.alpha, self.beta);
        let log_beta_prior = ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
        records
            .iter()
            .map(|record| {
                let n = record.impressions() as f64;
                let k = record.clicks() as f64;
                let log_choose = ln_gamma(n + 1.0) - ln_gamma(k + 1.0) - ln_gamma(n - k + 1.0);
                let log_beta_posterior =
                    ln_gamma(k + a) + ln_gamma(n - k + b) - ln_gamma(n + a + b);
                log_choose + log_beta_posterior - log_beta_prior
            })
            .sum()
    }
}

impl fmt::Display for SmoothingResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "group {}: α = {:.6}, β = {:.6}",
            self.group_id, self.alpha, self.beta
        )
    }
}
