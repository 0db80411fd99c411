use crate::record::Record;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{Beta, ContinuousCDF};
use statrs::function::gamma::ln_gamma;

/// Draw `count` records with `impressions` trials each from a
/// Beta(`alpha`, `beta`)-Binomial model, reproducibly for a given `seed`.
pub fn sample_beta_binomial(
    alpha: f64,
    beta: f64,
    impressions: u64,
    count: usize,
    seed: u64,
) -> Vec<Record> {
    let prior = Beta::new(alpha, beta).expect("valid Beta parameters");
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let p = prior.inverse_cdf(rng.random::<f64>());
            let clicks = (0..impressions).filter(|_| rng.random::<f64>() < p).count();
            Record::new(clicks as u64, impressions)
        })
        .collect()
}

/// `count` records with `impressions` trials each, spread over the click
/// counts in proportion to the Beta(`alpha`, `beta`)-Binomial probabilities.
///
/// Rounding uses largest remainders, so the batch has exactly `count` records
/// and its empirical distribution approaches the model as `count` grows.
pub fn expected_beta_binomial(
    alpha: f64,
    beta: f64,
    impressions: u64,
    count: usize,
) -> Vec<Record> {
    let ln_beta = |a: f64, b: f64| ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
    let n = impressions as f64;
    let weights: Vec<f64> = (0..=impressions)
        .map(|k| {
            let k = k as f64;
            let ln_choose = ln_gamma(n + 1.0) - ln_gamma(k + 1.0) - ln_gamma(n - k + 1.0);
            (ln_choose + ln_beta(k + alpha, n - k + beta) - ln_beta(alpha, beta)).exp()
                * count as f64
        })
        .collect();
    let mut counts: Vec<usize> = weights.iter().map(|w| w.floor() as usize).collect();
    let remaining = count.saturating_sub(counts.iter().sum());
    let mut by_remainder: Vec<usize> = (0..weights.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = weights[a] - weights[a].floor();
        let rb = weights[b] - weights[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &k in by_remainder.iter().take(remaining) {
        counts[k] += 1;
    }
    counts
        .iter()
        .enumerate()
        .flat_map(|(clicks, &times)| {
            std::iter::repeat_n(Record::new(clicks as u64, impressions), times)
        })
        .collect()
}

/// 50 records at 10% and 50 records at 1%, all with 100 impressions
pub fn two_level_batch() -> Vec<Record> {
    let mut records = vec![Record::new(10, 100); 50];
    records.extend(vec![Record::new(1, 100); 50]);
    records
}
