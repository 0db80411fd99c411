use crate::params::Params;
use crate::record::Record;
use crate::reducer::DigammaSums;

/// Fixed-point map for the Beta-Binomial maximum likelihood estimate over
/// one batch.
///
/// One step is `α' = α Σ[ψ(c+α) - ψ(α)] / Σ[ψ(i+α+β) - ψ(α+β)]` and the
/// symmetric update for β with `i - c` in place of `c`.
#[derive(Debug, Clone, Copy)]
pub struct FixedPoint<'a> {
    records: &'a [Record],
    parallel_threshold: usize,
}

impl<'a> FixedPoint<'a> {
    pub fn new(records: &'a [Record], parallel_threshold: usize) -> Self {
        Self {
            records,
            parallel_threshold,
        }
    }

    pub fn sums(&self, params: Params) -> DigammaSums {
        if self.records.len() > self.parallel_threshold {
            DigammaSums::parallel(self.records, params, self.parallel_threshold)
        } else {
            DigammaSums::sequential(self.records, params)
        }
    }

    /// One plain update. The result is not validated and may be non-finite.
    pub fn update(&self, params: Params) -> Params {
        let sums = self.sums(params);
        Params::new(
            params.alpha * sums.alpha_term / sums.total_term,
            params.beta * sums.beta_term / sums.total_term,
        )
    }

    /// Two plain updates followed by Steffensen extrapolation of each
    /// coordinate. The result may be negative and must be checked.
    pub fn accelerate(&self, params: Params) -> Params {
        let first = self.update(params);
        let second = self.update(first);
        Params::new(
            steffensen(params.alpha, first.alpha, second.alpha),
            steffensen(params.beta, first.beta, second.beta),
        )
    }
}

/// `x - (φ - x)² / (φφ - 2φ + x)`, or `x` when the denominator is zero.
pub fn steffensen(x: f64, phi: f64, phiphi: f64) -> f64 {
    let a = phi - x;
    let b = phiphi - 2.0 * phi + x;
    if b == 0.0 {
        return x;
    }
    // a * (a / b) keeps precision when a is tiny
    x - a * (a / b)
}
