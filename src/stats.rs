//! Descriptive statistics and the location tests run by the report.
//!
//! Every test returns `None` when it is undefined for the input (too few
//! values, zero variance) instead of producing NaN.

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Pearson correlation of paired observations.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Equal-width histogram over [min, max]. Returns (lower edge, upper edge, count).
pub fn histogram(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return vec![(min, max, values.len())];
    }
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (min + width * i as f64, min + width * (i + 1) as f64, c))
        .collect()
}

/// Average ranks (1-based) plus the tie correction term sum(t^3 - t).
fn average_ranks(values: &[f64]) -> (Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && values[order[j]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = rank;
        }
        let t = (j - i) as f64;
        ties += t * t * t - t;
        i = j;
    }
    (ranks, ties)
}

fn standard_normal() -> Option<Normal> {
    Normal::new(0.0, 1.0).ok()
}

/// Two-sided one-sample Student t-test of the mean against `mu`.
pub fn ttest_1samp(values: &[f64], mu: f64) -> Option<TestResult> {
    let n = values.len();
    let m = mean(values)?;
    let s = sample_std(values)?;
    if s == 0.0 {
        return None;
    }
    let t = (m - mu) / (s / (n as f64).sqrt());
    let dist = StudentsT::new(0.0, 1.0, (n - 1) as f64).ok()?;
    let p = 2.0 * dist.cdf(-t.abs());
    Some(TestResult {
        statistic: t,
        p_value: p.min(1.0),
    })
}

/// Largest sample for which the signed-rank null distribution is enumerated.
const WILCOXON_EXACT_MAX_N: usize = 50;

/// P(R+ <= t) under the null for `n` untied ranks, by counting rank subsets.
fn signed_rank_cdf(n: usize, t: f64) -> f64 {
    let max_sum = n * (n + 1) / 2;
    let mut counts = vec![0.0f64; max_sum + 1];
    counts[0] = 1.0;
    for rank in 1..=n {
        for sum in (rank..=max_sum).rev() {
            counts[sum] += counts[sum - rank];
        }
    }
    let total = 2f64.powi(n as i32);
    let limit = t.floor() as usize;
    counts[..=limit.min(max_sum)].iter().sum::<f64>() / total
}

/// Two-sided Wilcoxon signed-rank test of `values - mu`, zero differences
/// dropped. Small samples (n <= 50) without ties or zeros use the exact null
/// distribution; otherwise the normal approximation with tie correction.
pub fn wilcoxon_signed_rank(values: &[f64], mu: f64) -> Option<TestResult> {
    let diffs: Vec<f64> = values.iter().map(|v| v - mu).filter(|d| *d != 0.0).collect();
    let had_zeros = diffs.len() < values.len();
    let n = diffs.len();
    if n == 0 {
        return None;
    }
    let abs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let (ranks, ties) = average_ranks(&abs);

    let r_plus: f64 = diffs
        .iter()
        .zip(&ranks)
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();
    let nf = n as f64;
    let r_minus = nf * (nf + 1.0) / 2.0 - r_plus;
    let t = r_plus.min(r_minus);

    if n <= WILCOXON_EXACT_MAX_N && !had_zeros && ties == 0.0 {
        let p = 2.0 * signed_rank_cdf(n, t);
        return Some(TestResult {
            statistic: t,
            p_value: p.min(1.0),
        });
    }

    let expected = nf * (nf + 1.0) / 4.0;
    let var = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - ties / 48.0;
    if var <= 0.0 {
        return None;
    }
    let z = (t - expected) / var.sqrt();
    let p = 2.0 * standard_normal()?.cdf(-z.abs());
    Some(TestResult {
        statistic: t,
        p_value: p.min(1.0),
    })
}

/// Two-sided Mann-Whitney U test, normal approximation with tie and
/// continuity correction. The statistic is U for the first sample.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Option<TestResult> {
    let (n1, n2) = (x.len(), y.len());
    if n1 == 0 || n2 == 0 {
        return None;
    }
    let combined: Vec<f64> = x.iter().chain(y).copied().collect();
    let (ranks, ties) = average_ranks(&combined);

    let (n1f, n2f) = (n1 as f64, n2 as f64);
    let n = n1f + n2f;
    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - n1f * (n1f + 1.0) / 2.0;
    let u2 = n1f * n2f - u1;
    let u = u1.max(u2);

    let mu = n1f * n2f / 2.0;
    let sigma = (n1f * n2f / 12.0 * ((n + 1.0) - ties / (n * (n - 1.0)))).sqrt();
    if !(sigma > 0.0) {
        return None;
    }
    let z = (u - mu - 0.5) / sigma;
    let p = 2.0 * standard_normal()?.cdf(-z);
    Some(TestResult {
        statistic: u1,
        p_value: p.min(1.0),
    })
}

/// Evaluate c[0] + c[1] x + c[2] x^2 + ...
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, coef| acc * x + coef)
}

const SW_C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const SW_C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const SW_C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const SW_C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const SW_C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const SW_C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const SW_G: [f64; 2] = [-2.273, 0.459];

/// Above this size Royston's p-value approximation is outside its fitted range.
const SW_MAX_ACCURATE_N: usize = 5000;

/// Shapiro-Wilk W test for normality (Royston's approximation). Computed for
/// any n >= 3; p-values for n > 5000 may be inaccurate.
pub fn shapiro_wilk(values: &[f64]) -> Option<TestResult> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    if n > SW_MAX_ACCURATE_N {
        log::warn!("shapiro-wilk on {n} values: p-value may not be accurate for n > {SW_MAX_ACCURATE_N}");
    }
    let mut x = values.to_vec();
    x.sort_by(f64::total_cmp);
    if x[n - 1] - x[0] <= 0.0 {
        return None;
    }

    let norm = standard_normal()?;
    let an = n as f64;
    let nn2 = n / 2;
    let mut a = vec![0.0; nn2];

    if n == 3 {
        a[0] = std::f64::consts::FRAC_1_SQRT_2;
    } else {
        let m: Vec<f64> = (1..=nn2)
            .map(|i| norm.inverse_cdf((i as f64 - 0.375) / (an + 0.25)))
            .collect();
        let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
        let ssumm2 = summ2.sqrt();
        let rsn = 1.0 / an.sqrt();
        let a1 = poly(&SW_C1, rsn) - m[0] / ssumm2;

        let (first, fac) = if n > 5 {
            let a2 = -m[1] / ssumm2 + poly(&SW_C2, rsn);
            let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
                / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
                .sqrt();
            a[1] = a2;
            (2, fac)
        } else {
            let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
            (1, fac)
        };
        a[0] = a1;
        for i in first..nn2 {
            a[i] = -m[i] / fac;
        }
    }

    let xm = x.iter().sum::<f64>() / an;
    let ssq: f64 = x.iter().map(|v| (v - xm) * (v - xm)).sum();
    let num: f64 = (0..nn2).map(|i| a[i] * (x[n - 1 - i] - x[i])).sum();
    let w = (num * num / ssq).min(1.0);

    let p = if n == 3 {
        let stqr = std::f64::consts::FRAC_PI_3;
        (6.0 / std::f64::consts::PI * (w.sqrt().asin() - stqr)).clamp(0.0, 1.0)
    } else {
        let w1 = (1.0 - w).ln();
        let (y, m, s) = if n <= 11 {
            let gamma = poly(&SW_G, an);
            if w1 >= gamma {
                return Some(TestResult {
                    statistic: w,
                    p_value: 1e-99,
                });
            }
            (-(gamma - w1).ln(), poly(&SW_C3, an), poly(&SW_C4, an).exp())
        } else {
            let xx = an.ln();
            (w1, poly(&SW_C5, xx), poly(&SW_C6, xx).exp())
        };
        norm.cdf(-(y - m) / s)
    };

    Some(TestResult {
        statistic: w,
        p_value: p,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn descriptive() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(mean(&v), Some(2.5));
        assert!(close(sample_std(&v).unwrap(), 1.2909944487358056, 1e-12));
        assert_eq!(quantile(&v, 0.25), Some(1.75));
        assert_eq!(quantile(&v, 0.5), Some(2.5));
        assert_eq!(quantile(&v, 0.75), Some(3.25));
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn pearson_perfect_and_constant() {
        let pairs = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        assert!(close(pearson(&pairs).unwrap(), 1.0, 1e-12));
        let inverse = [(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)];
        assert!(close(pearson(&inverse).unwrap(), -1.0, 1e-12));
        assert_eq!(pearson(&[(1.0, 1.0), (2.0, 1.0)]), None);
    }

    #[test]
    fn histogram_bins_cover_range() {
        let h = histogram(&[0.0, 0.1, 0.5, 0.9, 1.0], 2);
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].2 + h[1].2, 5);
        assert_eq!(h[0].2, 2);
        assert_eq!(histogram(&[0.3, 0.3], 10), vec![(0.3, 0.3, 2)]);
    }

    #[test]
    fn ranks_average_ties() {
        let (ranks, ties) = average_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
        assert_eq!(ties, 6.0);
    }

    #[test]
    fn ttest_centered_sample() {
        let r = ttest_1samp(&[1.0, 2.0, 3.0, 4.0, 5.0], 3.0).unwrap();
        assert!(close(r.statistic, 0.0, 1e-12));
        assert!(close(r.p_value, 1.0, 1e-9));
    }

    #[test]
    fn ttest_shifted_sample() {
        let r = ttest_1samp(&[0.6, 0.7, 0.8, 0.9, 1.0], 0.5).unwrap();
        assert!(close(r.statistic, 4.242640687119285, 1e-9));
        assert!(close(r.p_value, 0.013236, 1e-4));
    }

    #[test]
    fn ttest_constant_sample_undefined() {
        assert_eq!(ttest_1samp(&[0.5, 0.5, 0.5], 0.5), None);
    }

    #[test]
    fn wilcoxon_all_above_reference() {
        let values: Vec<f64> = (1..=20).map(|i| 0.5 + i as f64 / 100.0).collect();
        let r = wilcoxon_signed_rank(&values, 0.5).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert!(r.p_value < 0.001);
    }

    #[test]
    fn wilcoxon_symmetric_sample() {
        let r = wilcoxon_signed_rank(&[0.25, 0.75, 0.375, 0.625, 0.5], 0.5).unwrap();
        assert!(close(r.statistic, 5.0, 1e-12));
        assert!(close(r.p_value, 1.0, 1e-9));
    }

    #[test]
    fn wilcoxon_small_untied_sample_is_exact() {
        let r = wilcoxon_signed_rank(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.0).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert!(close(r.p_value, 0.0625, 1e-12));

        // ranks 1, 2, 4, 5 positive and 3 negative: T = 3, P(R+ <= 3) = 5/32
        let r = wilcoxon_signed_rank(&[1.0, 2.0, -3.0, 4.0, 5.0], 0.0).unwrap();
        assert_eq!(r.statistic, 3.0);
        assert!(close(r.p_value, 0.3125, 1e-12));
    }

    #[test]
    fn signed_rank_distribution_sums_to_one() {
        assert!(close(signed_rank_cdf(10, 55.0), 1.0, 1e-12));
        assert!(close(signed_rank_cdf(3, 0.0), 0.125, 1e-12));
    }

    #[test]
    fn wilcoxon_all_zero_differences_undefined() {
        assert_eq!(wilcoxon_signed_rank(&[0.5, 0.5], 0.5), None);
    }

    #[test]
    fn mann_whitney_against_constant() {
        let x: Vec<f64> = (0..30).map(|i| 0.6 + i as f64 / 100.0).collect();
        let y = vec![0.5; x.len()];
        let r = mann_whitney_u(&x, &y).unwrap();
        assert_eq!(r.statistic, 900.0);
        assert!(r.p_value < 1e-6);
    }

    #[test]
    fn mann_whitney_identical_samples() {
        let x = [0.1, 0.2, 0.3, 0.4];
        let r = mann_whitney_u(&x, &x).unwrap();
        assert_eq!(r.statistic, 8.0);
        assert!(r.p_value > 0.9);
    }

    #[test]
    fn mann_whitney_all_equal_undefined() {
        assert_eq!(mann_whitney_u(&[0.5, 0.5], &[0.5, 0.5]), None);
    }

    #[test]
    fn shapiro_normal_scores_look_normal() {
        let norm = Normal::new(0.0, 1.0).unwrap();
        let n = 50;
        let values: Vec<f64> = (1..=n)
            .map(|i| norm.inverse_cdf((i as f64 - 0.375) / (n as f64 + 0.25)))
            .collect();
        let r = shapiro_wilk(&values).unwrap();
        assert!(r.statistic > 0.98, "W = {}", r.statistic);
        assert!(r.p_value > 0.5, "p = {}", r.p_value);
    }

    #[test]
    fn shapiro_outlier_rejects_normality() {
        let mut values = vec![1.0; 19];
        for (i, v) in values.iter_mut().enumerate() {
            *v += i as f64 * 0.01;
        }
        values.push(100.0);
        let r = shapiro_wilk(&values).unwrap();
        assert!(r.statistic < 0.5, "W = {}", r.statistic);
        assert!(r.p_value < 1e-4, "p = {}", r.p_value);
    }

    #[test]
    fn shapiro_matches_reference_example() {
        let values = [148.0, 154.0, 158.0, 160.0, 161.0, 162.0, 166.0, 170.0, 182.0, 195.0, 236.0];
        let r = shapiro_wilk(&values).unwrap();
        assert!(close(r.statistic, 0.7888, 1e-3), "W = {}", r.statistic);
        assert!(close(r.p_value, 0.0067, 5e-4), "p = {}", r.p_value);
    }

    #[test]
    fn shapiro_small_samples() {
        let r = shapiro_wilk(&[1.0, 2.0, 3.0]).unwrap();
        assert!(close(r.statistic, 1.0, 1e-9));
        assert!(close(r.p_value, 1.0, 1e-6));

        let r = shapiro_wilk(&[1.0, 2.0, 4.0, 8.0, 16.0]).unwrap();
        assert!(r.statistic > 0.0 && r.statistic < 1.0);
        assert!((0.0..=1.0).contains(&r.p_value));
    }

    #[test]
    fn shapiro_runs_on_large_samples() {
        let norm = Normal::new(0.0, 1.0).unwrap();
        let n = 6000;
        let values: Vec<f64> = (1..=n)
            .map(|i| norm.inverse_cdf((i as f64 - 0.375) / (n as f64 + 0.25)))
            .collect();
        let r = shapiro_wilk(&values).unwrap();
        assert!(r.statistic > 0.99, "W = {}", r.statistic);
        assert!((0.0..=1.0).contains(&r.p_value));

        let skewed: Vec<f64> = (1..=n).map(|i| (i as f64 / 500.0).exp()).collect();
        let r = shapiro_wilk(&skewed).unwrap();
        assert!(r.p_value < 1e-6, "p = {}", r.p_value);
    }

    #[test]
    fn shapiro_undefined_inputs() {
        assert_eq!(shapiro_wilk(&[1.0, 2.0]), None);
        assert_eq!(shapiro_wilk(&[0.4; 10]), None);
    }
}
