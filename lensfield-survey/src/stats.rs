//! Elementary statistics for lens-versus-control comparisons.
//!
//! Only what the survey jobs need: the 2x2 chi-squared test of "field has
//! at least one match", the Poisson excess test on total counts, and the
//! two-sample Kolmogorov-Smirnov test on pairwise-separation
//! distributions.

use lensfield_core::SkyPoint;

/// Result of a chi-squared contingency test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquared {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: u32,
}

/// Pearson chi-squared test on a 2x2 table with Yates' continuity
/// correction.
///
/// A table with an empty row or column has no defined expectation; it
/// yields statistic 0 and p-value 1 rather than an error.
pub fn chi2_contingency_2x2(table: [[u64; 2]; 2]) -> ChiSquared {
    let rows = [
        (table[0][0] + table[0][1]) as f64,
        (table[1][0] + table[1][1]) as f64,
    ];
    let cols = [
        (table[0][0] + table[1][0]) as f64,
        (table[0][1] + table[1][1]) as f64,
    ];
    let total = rows[0] + rows[1];

    if rows.contains(&0.0) || cols.contains(&0.0) {
        return ChiSquared {
            statistic: 0.0,
            p_value: 1.0,
            dof: 1,
        };
    }

    let mut statistic = 0.0;
    for (i, row) in table.iter().enumerate() {
        for (j, &observed) in row.iter().enumerate() {
            let expected = rows[i] * cols[j] / total;
            let deviation = (observed as f64 - expected).abs();
            let corrected = (deviation - 0.5).max(0.0);
            statistic += corrected * corrected / expected;
        }
    }

    ChiSquared {
        statistic,
        p_value: chi2_sf_1dof(statistic),
        dof: 1,
    }
}

/// Survival function of chi-squared with one degree of freedom.
fn chi2_sf_1dof(x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    libm::erfc(libm::sqrt(x / 2.0))
}

/// P(X > k) for X ~ Poisson(mu).
///
/// Returns 1 for negative `k` and NaN for a negative or non-finite mean.
pub fn poisson_sf(k: i64, mu: f64) -> f64 {
    if !mu.is_finite() || mu < 0.0 {
        return f64::NAN;
    }
    if k < 0 {
        return 1.0;
    }
    if mu == 0.0 {
        return 0.0;
    }

    let ln_mu = libm::log(mu);
    let pmf = |j: i64| libm::exp(j as f64 * ln_mu - mu - libm::lgamma(j as f64 + 1.0));

    if k as f64 >= mu {
        // Upper tail directly; terms shrink monotonically past the mode.
        let mut j = k + 1;
        let mut term = pmf(j);
        let mut sum = 0.0;
        while term > 0.0 && term > sum * 1e-17 {
            sum += term;
            j += 1;
            term *= mu / j as f64;
        }
        sum.min(1.0)
    } else {
        let cdf: f64 = (0..=k).map(pmf).sum();
        (1.0 - cdf).clamp(0.0, 1.0)
    }
}

/// Two-sample Kolmogorov-Smirnov result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsTest {
    /// Largest distance between the two empirical CDFs.
    pub statistic: f64,
    /// Two-sided p-value, exact for small samples.
    pub p_value: f64,
}

/// Largest `n * m` for which [`ks_2samp`] walks the exact null distribution.
pub const KS_EXACT_MAX_CELLS: usize = 1_000_000;

/// Two-sample KS test. `None` if either sample is empty.
///
/// NaN values are ignored. Up to [`KS_EXACT_MAX_CELLS`] the p-value is the
/// exact permutation probability `P(D >= d)`, which assumes no ties; above
/// it the asymptotic Kolmogorov tail with Stephens' small-sample correction
/// is used.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> Option<KsTest> {
    let mut a: Vec<f64> = a.iter().copied().filter(|v| !v.is_nan()).collect();
    let mut b: Vec<f64> = b.iter().copied().filter(|v| !v.is_nan()).collect();
    if a.is_empty() || b.is_empty() {
        return None;
    }
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0, 0);
    let mut statistic: f64 = 0.0;
    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        let diff = (i as f64 / n as f64 - j as f64 / m as f64).abs();
        statistic = statistic.max(diff);
    }

    let p_value = if n.saturating_mul(m) <= KS_EXACT_MAX_CELLS {
        ks_exact_sf(n, m, statistic)
    } else {
        let en = libm::sqrt((n * m) as f64 / (n + m) as f64);
        kolmogorov_sf((en + 0.12 + 0.11 / en) * statistic)
    };
    Some(KsTest { statistic, p_value })
}

/// `P(D >= d)` for samples of size `n` and `m` under the null hypothesis.
///
/// Each ordering of the pooled sample is a monotone lattice path from
/// `(0, 0)` to `(n, m)`, all equally likely. The walk carries the
/// probability of reaching `(i, j)` without touching `|i m - j n| >= h`,
/// where `h = d n m`.
fn ks_exact_sf(n: usize, m: usize, d: f64) -> f64 {
    let h = (d * (n * m) as f64).round() as i64;
    if h <= 0 {
        return 1.0;
    }
    let (ni, mi) = (n as i64, m as i64);
    let outside = |i: usize, j: usize| (i as i64 * mi - j as i64 * ni).abs() >= h;

    let mut prev = vec![0.0_f64; m + 1];
    let mut row = vec![0.0_f64; m + 1];
    for i in 0..=n {
        for j in 0..=m {
            let mut p = if i == 0 && j == 0 { 1.0 } else { 0.0 };
            if i > 0 {
                // Step in the first sample from (i - 1, j).
                p += prev[j] * (n - i + 1) as f64 / (n + m - i - j + 1) as f64;
            }
            if j > 0 {
                p += row[j - 1] * (m - j + 1) as f64 / (n + m - i - j + 1) as f64;
            }
            row[j] = if outside(i, j) { 0.0 } else { p };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    (1.0 - prev[m]).clamp(0.0, 1.0)
}

/// Kolmogorov distribution tail, `2 sum (-1)^(j-1) exp(-2 j^2 lambda^2)`.
fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;
    for j in 1..=100 {
        let jf = j as f64;
        let term = sign * libm::exp(a2 * jf * jf);
        sum += term;
        if term.abs() <= 1e-10 * previous || term.abs() <= 1e-16 * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    // The series does not converge for very small lambda, where the tail is 1.
    1.0
}

/// Great-circle separations in arcminutes between every pair of points
/// (upper triangle, row-major).
pub fn pairwise_separations(points: &[SkyPoint]) -> Vec<f64> {
    let n = points.len();
    let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            out.push(a.separation(b).arcminutes());
        }
    }
    out
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Number of fields with at least one match.
pub fn positive_count(counts: &[usize]) -> usize {
    counts.iter().filter(|&&c| c > 0).count()
}

/// Lens fields against control fields at one search radius.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldComparison {
    pub lens_fields: usize,
    pub control_fields: usize,
    pub lens_positive: usize,
    pub control_positive: usize,
    pub lens_total: usize,
    pub control_total: usize,
    pub mean_lens: Option<f64>,
    pub mean_control: Option<f64>,
    /// Positive-field fractions compared with a 2x2 contingency test.
    pub chi2: ChiSquared,
    /// Chance of seeing at least `lens_total` matches if lens fields
    /// matched at the control rate.
    pub poisson_p: f64,
}

impl FieldComparison {
    /// Builds the comparison from per-field counts. Fields whose query
    /// failed are expected to be left out by the caller, not passed as 0.
    pub fn from_counts(lens: &[usize], control: &[usize]) -> Self {
        let lens_positive = positive_count(lens);
        let control_positive = positive_count(control);
        let lens_total: usize = lens.iter().sum();
        let control_total: usize = control.iter().sum();

        let table = [
            [lens_positive as u64, (lens.len() - lens_positive) as u64],
            [
                control_positive as u64,
                (control.len() - control_positive) as u64,
            ],
        ];

        let as_f64 = |c: &[usize]| c.iter().map(|&v| v as f64).collect::<Vec<_>>();

        Self {
            lens_fields: lens.len(),
            control_fields: control.len(),
            lens_positive,
            control_positive,
            lens_total,
            control_total,
            mean_lens: mean(&as_f64(lens)),
            mean_control: mean(&as_f64(control)),
            chi2: chi2_contingency_2x2(table),
            poisson_p: poisson_sf(lens_total as i64 - 1, control_total as f64),
        }
    }

    pub fn lens_fraction(&self) -> Option<f64> {
        fraction(self.lens_positive, self.lens_fields)
    }

    pub fn control_fraction(&self) -> Option<f64> {
        fraction(self.control_positive, self.control_fields)
    }
}

fn fraction(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64)
}
