use std::f64::consts::PI;

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_860_606_512_090_082;

/// Below this the O(x) expansion around zero is used
const SMALL_LIMIT: f64 = 1e-5;

/// At or above this the asymptotic series is used
const LARGE_LIMIT: f64 = 49.0;

/// Digamma function ψ(x), after Bernardo's AS 103.
///
/// Accurate to about 1e-8 absolute for x >= 1e-5 and 1e-8 relative for x > 0.
/// Positive arguments below `LARGE_LIMIT` are shifted up with
/// ψ(x + 1) = ψ(x) + 1/x, at most 49 steps. Negative arguments go through the
/// reflection ψ(x) = ψ(1 - x) - π / tan(πx), and the poles at zero and the
/// negative integers give NaN.
pub fn digamma(x: f64) -> f64 {
    if x.is_nan() || x.is_infinite() {
        return x;
    }
    if x <= 0.0 {
        if x == x.floor() {
            return f64::NAN;
        }
        return digamma(1.0 - x) - PI / (PI * x).tan();
    }
    let mut x = x;
    let mut acc = 0.0;
    loop {
        if x > 0.0 && x <= SMALL_LIMIT {
            return acc - EULER_GAMMA - 1.0 / x;
        }
        if x >= LARGE_LIMIT {
            // ln(x) - 1/2x - 1/12x^2 + 1/120x^4 - 1/252x^6
            let inv = 1.0 / (x * x);
            return acc + x.ln()
                - 0.5 / x
                - inv * ((1.0 / 12.0) + inv * (1.0 / 120.0 - inv / 252.0));
        }
        acc -= 1.0 / x;
        x += 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_digamma_at_one() {
        assert_abs_diff_eq!(digamma(1.0), -EULER_GAMMA, epsilon = 1e-8);
    }

    #[test]
    fn test_recurrence() {
        for x in [5.0, 50.0, 500.0] {
            let diff = digamma(x + 1.0) - digamma(x);
            assert_abs_diff_eq!(diff, 1.0 / x, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_against_statrs() {
        for x in [1e-3, 0.1, 0.5, 2.0, 7.5, 48.9, 49.0, 120.0, 1e4] {
            let expected = statrs::function::gamma::digamma(x);
            assert_abs_diff_eq!(digamma(x), expected, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_small_argument() {
        let x = 1e-6;
        assert_abs_diff_eq!(digamma(x), -EULER_GAMMA - 1.0 / x, epsilon = 1e-6);
    }

    #[test]
    fn test_non_finite_passthrough() {
        assert!(digamma(f64::NAN).is_nan());
        assert_eq!(digamma(f64::INFINITY), f64::INFINITY);
        assert_eq!(digamma(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn test_poles() {
        for x in [0.0, -1.0, -2.0, -1e17, f64::MIN] {
            assert!(digamma(x).is_nan(), "ψ({}) should be NaN", x);
        }
    }

    #[test]
    fn test_negative_argument() {
        // ψ(-1/2) = ψ(3/2) = 2 - γ - 2 ln 2
        let expected = 2.0 - EULER_GAMMA - 2.0 * 2f64.ln();
        assert_abs_diff_eq!(digamma(-0.5), expected, epsilon = 1e-8);
        // the recurrence holds across zero
        let x = -0.3;
        assert_abs_diff_eq!(digamma(x + 1.0), digamma(x) + 1.0 / x, epsilon = 1e-7);
        assert!(digamma(-1e12 + 0.5).is_finite());
    }

    #[test]
    fn test_half() {
        // ψ(1/2) = -γ - 2 ln 2
        let expected = -EULER_GAMMA - 2.0 * 2f64.ln();
        assert_abs_diff_eq!(digamma(0.5), expected, epsilon = 1e-8);
    }
}
