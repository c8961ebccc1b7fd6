//! Robust location and scale estimators.

/// Scale factor turning a median absolute deviation into a Gaussian sigma.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Median of `values`; `None` when empty. NaNs sort last.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Greater));
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some(0.5 * (sorted[n / 2 - 1] + sorted[n / 2]))
    }
}

/// Weighted median absolute deviation of `x` about `centre`, scaled to
/// sigma. The deviation is taken where the cumulative weight of the
/// sorted deviations first reaches half the total.
pub fn weighted_scaled_mad(x: &[f64], weights: &[f64], centre: f64) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if x.len() != weights.len() || total <= 0.0 {
        return None;
    }
    let mut deviations: Vec<(f64, f64)> = x
        .iter()
        .zip(weights)
        .map(|(v, w)| ((v - centre).abs(), *w))
        .collect();
    deviations.sort_by(|a, b| a.0.total_cmp(&b.0));
    let half = 0.5 * total;
    let mut cum = 0.0;
    for (dev, w) in deviations {
        cum += w;
        if cum >= half {
            return Some(MAD_TO_SIGMA * dev);
        }
    }
    None
}

/// Weighted median of `(x, weight)` samples treated as a histogram with
/// unit-width bins centred on `x`: the point where the cumulative weight
/// reaches half the total, linearly interpolated inside the crossing bin.
///
/// `None` when the total weight is not positive.
pub fn histogram_median(x: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if x.len() != weights.len() || total <= 0.0 {
        return None;
    }
    let half = 0.5 * total;
    let mut cum = 0.0;
    for (&xi, &wi) in x.iter().zip(weights) {
        if wi > 0.0 && cum + wi >= half {
            return Some(xi - 0.5 + (half - cum) / wi);
        }
        cum += wi;
    }
    x.last().copied()
}
