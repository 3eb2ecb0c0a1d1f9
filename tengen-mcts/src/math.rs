//! Numeric helpers: atomic float accumulators and the Student-t quantile
//! table backing LCB move ordering.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;

/// Significance level used when no explicit one is configured.
pub const DEFAULT_CI_ALPHA: f32 = 1e-5;

const Z_ENTRIES: usize = 1000;

static Z_TABLE: OnceLock<Vec<f32>> = OnceLock::new();

/// Add `value` to an `f64` stored as bits in an atomic cell.
///
/// Readers may observe the cell between a visit-count increment and the
/// matching accumulation; the search tolerates that (PUCT is robust to small
/// transient inconsistencies).
#[inline]
pub(crate) fn atomic_add_f64(cell: &AtomicU64, value: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = f64::from_bits(current) + value;
        match cell.compare_exchange_weak(
            current,
            next.to_bits(),
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(observed) => current = observed,
        }
    }
}

#[inline]
pub(crate) fn load_f64(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Relaxed))
}

#[inline]
pub(crate) fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

#[inline]
pub(crate) fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

/// Initialize the Student-t critical value table for significance `ci_alpha`.
///
/// The table is a process-wide singleton: the first initialization wins and
/// later calls with a different alpha are no-ops. Call this before the first
/// search; otherwise the table self-initializes with [`DEFAULT_CI_ALPHA`].
pub fn init_z_table(ci_alpha: f32) {
    Z_TABLE.get_or_init(|| build_z_table(ci_alpha));
}

/// Upper critical value of the Student-t distribution for `v` degrees of
/// freedom at the configured significance level.
///
/// The quantile flattens out for large `v`, so degrees of freedom beyond the
/// table simply reuse the last entry.
pub fn cached_t_quantile(v: i32) -> f32 {
    let table = Z_TABLE.get_or_init(|| build_z_table(DEFAULT_CI_ALPHA));
    if v < 1 {
        return table[0];
    }
    let v = v as usize;
    if v < Z_ENTRIES {
        table[v - 1]
    } else {
        table[Z_ENTRIES - 1]
    }
}

fn build_z_table(ci_alpha: f32) -> Vec<f32> {
    (1..=Z_ENTRIES)
        .map(|df| t_quantile(df as f64, ci_alpha as f64) as f32)
        .collect()
}

/// Upper one-sided Student-t quantile: t such that `P(T > t) = alpha`.
fn t_quantile(ndf: f64, alpha: f64) -> f64 {
    // Hill's approximation works on the two-tailed probability.
    let p = (2.0 * alpha).clamp(f64::MIN_POSITIVE, 1.0);

    if ndf < 1.5 {
        // Exact for one degree of freedom (Cauchy).
        let half = p * PI / 2.0;
        return libm::cos(half) / libm::sin(half);
    }
    if ndf < 2.5 {
        // Exact for two degrees of freedom.
        return libm::sqrt(2.0 / (p * (2.0 - p)) - 2.0);
    }

    let a = 1.0 / (ndf - 0.5);
    let b = 48.0 / (a * a);
    let mut c = ((20700.0 * a / b - 98.0) * a - 16.0) * a + 96.36;
    let d = ((94.5 / (b + c) - 3.0) / b + 1.0) * libm::sqrt(a * PI / 2.0) * ndf;
    let mut x = d * p;
    let mut y = libm::pow(x, 2.0 / ndf);

    if y > 0.05 + a {
        // Asymptotic inverse expansion about the normal quantile.
        x = normal_quantile_upper(p * 0.5);
        y = x * x;
        if ndf < 5.0 {
            c += 0.3 * (ndf - 4.5) * (x + 0.6);
        }
        c = (((0.05 * d * x - 5.0) * x - 7.0) * x - 2.0) * x + b + c;
        y = (((((0.4 * y + 6.3) * y + 36.0) * y + 94.5) / c - y - 3.0) / b + 1.0) * x;
        y = a * y * y;
        y = if y > 0.002 {
            libm::exp(y) - 1.0
        } else {
            0.5 * y * y + y
        };
    } else {
        y = ((1.0 / (((ndf + 6.0) / (ndf * y) - 0.089 * d - 0.822) * (ndf + 2.0) * 3.0)
            + 0.5 / (ndf + 4.0))
            * y
            - 1.0)
            * (ndf + 1.0)
            / (ndf + 2.0)
            + 1.0 / y;
    }

    libm::sqrt(ndf * y)
}

/// Upper-tail standard normal quantile: z such that `P(N > z) = q`.
fn normal_quantile_upper(q: f64) -> f64 {
    -normal_quantile(q)
}

/// Lower-tail standard normal quantile (Acklam's rational approximation).
fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = libm::sqrt(-2.0 * libm::log(p));
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = libm::sqrt(-2.0 * libm::log(1.0 - p));
        -((((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_quantile() {
        // Φ⁻¹(0.975) ≈ 1.9600
        assert!((normal_quantile(0.975) - 1.96).abs() < 1e-3);
        // Φ⁻¹(0.5) = 0
        assert!(normal_quantile(0.5).abs() < 1e-9);
        // Symmetry.
        assert!((normal_quantile(0.1) + normal_quantile(0.9)).abs() < 1e-6);
    }

    #[test]
    fn test_t_quantile_known_values() {
        // Upper 5% critical values.
        assert!((t_quantile(1.0, 0.05) - 6.3138).abs() < 0.01);
        assert!((t_quantile(2.0, 0.05) - 2.9200).abs() < 0.01);
        assert!((t_quantile(10.0, 0.05) - 1.8125).abs() < 0.02);
        assert!((t_quantile(100.0, 0.05) - 1.6602).abs() < 0.02);
    }

    #[test]
    fn test_t_quantile_monotone_in_df() {
        // More data, tighter bound: quantile decreases with df.
        let mut last = f64::INFINITY;
        for df in [1.0, 2.0, 3.0, 5.0, 10.0, 30.0, 100.0] {
            let q = t_quantile(df, 0.05);
            assert!(q < last, "df={df} q={q} last={last}");
            last = q;
        }
    }

    #[test]
    fn test_cached_quantile_clamps() {
        assert!((cached_t_quantile(0) - cached_t_quantile(1)).abs() < 1e-6);
        assert!((cached_t_quantile(5000) - cached_t_quantile(999)).abs() < 1e-6);
    }

    #[test]
    fn test_atomic_add_f64() {
        let cell = AtomicU64::new(0f64.to_bits());
        atomic_add_f64(&cell, 1.25);
        atomic_add_f64(&cell, -0.25);
        assert!((load_f64(&cell) - 1.0).abs() < 1e-12);
    }
}
