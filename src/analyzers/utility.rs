use serde::Serialize;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the sample standard deviation (n - 1 denominator) given a
/// pre-computed mean. Undefined for fewer than two values.
pub fn sample_stddev(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;

    Some(variance.sqrt())
}

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Descriptive statistics of a travel-time sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

/// Summarizes `values`; `None` for an empty sample.
pub fn describe(values: &[f64]) -> Option<Describe> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let avg = mean(&sorted);
    Some(Describe {
        count: sorted.len(),
        mean: avg,
        std: sample_stddev(&sorted, avg),
        min: *sorted.first()?,
        q25: quantile(&sorted, 0.25)?,
        q50: quantile(&sorted, 0.5)?,
        q75: quantile(&sorted, 0.75)?,
        max: *sorted.last()?,
    })
}
