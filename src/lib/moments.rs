use crate::config::VarianceEstimator;
use crate::params::Params;
use crate::record::Record;
use crate::solver::FailureCause;
use log::debug;

/// Variances at or below this fraction of `mean (1 - mean)` are treated as zero
const VARIANCE_FLOOR: f64 = 1e-12;

/// Mean and variance of the per-record CTRs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CtrMoments {
    pub mean: f64,
    pub variance: f64,
    pub count: usize,
}

impl CtrMoments {
    pub fn from_records(records: &[Record], estimator: VarianceEstimator) -> Self {
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for record in records {
            let ctr = record.ctr();
            sum += ctr;
            sum_sq += ctr * ctr;
        }
        let n = records.len() as f64;
        let mean = sum / n;
        let variance = match estimator {
            VarianceEstimator::Sample => (sum_sq - sum * sum / n) / (n - 1.0),
            VarianceEstimator::Population => sum_sq / n - mean * mean,
        };
        Self {
            mean,
            variance,
            count: records.len(),
        }
    }
}

/// Method-of-moments starting point for (α, β).
///
/// Matches the Beta mean and variance to the CTR sample:
/// `common = mean (1 - mean) / var - 1`, `α = common mean`, `β = common (1 - mean)`.
pub fn initial_guess(
    records: &[Record],
    estimator: VarianceEstimator,
) -> Result<Params, FailureCause> {
    if records.is_empty() {
        return Err(FailureCause::NoInformativeRecords);
    }
    let moments = CtrMoments::from_records(records, estimator);
    // Identical ratios can leave a rounding-sized variance of either sign
    let floor = VARIANCE_FLOOR * moments.mean * (1.0 - moments.mean);
    if !moments.variance.is_finite() || moments.variance <= floor.max(0.0) {
        debug!(
            "Variance {} over {} records, cannot fit Beta distribution.",
            moments.variance, moments.count
        );
        return Err(FailureCause::ZeroVariance);
    }
    let common = moments.mean * (1.0 - moments.mean) / moments.variance - 1.0;
    let params = Params::new(common * moments.mean, common * (1.0 - moments.mean));
    if !params.is_valid() {
        debug!(
            "Method of moments gave α = {}, β = {} (mean {}, variance {})",
            params.alpha, params.beta, moments.mean, moments.variance
        );
        return Err(FailureCause::InvalidInitialGuess);
    }
    Ok(params)
}
