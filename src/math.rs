//! Small numerical helpers: stable log-sum forms for the copula densities,
//! the Debye function, and order-statistic interpolation.

/// Stable `log(1 + exp(x))`.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Stable `log(exp(a) + exp(b))`.
#[inline]
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + (-(a - b).abs()).exp().ln_1p()
}

/// First-order Debye function `D1(x) = (1/x) ∫_0^x t / (e^t - 1) dt`.
///
/// Defined for either sign of `x`; `D1(0) = 1`. Composite Simpson rule.
pub fn debye1(x: f64) -> f64 {
    if x.abs() < 1e-10 {
        return 1.0;
    }
    let integrand = |t: f64| if t.abs() < 1e-12 { 1.0 } else { t / t.exp_m1() };
    const STEPS: usize = 400;
    let h = x / STEPS as f64;
    let mut acc = integrand(0.0) + integrand(x);
    for i in 1..STEPS {
        let w = if i % 2 == 1 { 4.0 } else { 2.0 };
        acc += w * integrand(i as f64 * h);
    }
    acc * h / 3.0 / x
}

/// Linearly interpolated quantile of an ascending slice, `h = p (n - 1)`.
///
/// Returns `None` for an empty slice. `p` is clamped to `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let h = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log1pexp_matches_naive_moderate_values() {
        for x in [-10.0, -2.0, -0.1, 0.0, 0.1, 2.0, 10.0] {
            let naive = (1.0 + f64::exp(x)).ln();
            assert!((naive - log1pexp(x)).abs() < 1e-12, "x={x}");
        }
        assert!((log1pexp(1e6) - 1e6).abs() < 1e-6);
    }

    #[test]
    fn log_add_exp_handles_underflow() {
        let v = log_add_exp(-1000.0, -1000.0);
        assert!((v - (-1000.0 + 2f64.ln())).abs() < 1e-12);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, 3.0), 3.0);
    }

    #[test]
    fn debye1_reference_values() {
        // D1(1) = 0.777504634112248...
        assert!((debye1(1.0) - 0.777_504_634_112_248).abs() < 1e-9);
        // D1(-x) = D1(x) + x / 2
        assert!((debye1(-2.0) - (debye1(2.0) + 1.0)).abs() < 1e-9);
        assert_eq!(debye1(0.0), 1.0);
    }

    #[test]
    fn quantile_interpolates_between_order_statistics() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&xs, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&xs, 0.5), Some(3.0));
        assert_eq!(quantile_sorted(&xs, 1.0), Some(5.0));
        assert!((quantile_sorted(&xs, 0.95).unwrap() - 4.8).abs() < 1e-12);
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }
}
