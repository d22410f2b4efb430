/// Trailing maximum over the last `period` sessions, inclusive of the current
/// one. Positions with fewer than `period` observed sessions yield `None`.
pub fn calculate_rolling_max(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling_fold(values, period, f64::max)
}

/// Trailing minimum over the last `period` sessions, inclusive of the current
/// one. Positions with fewer than `period` observed sessions yield `None`.
pub fn calculate_rolling_min(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling_fold(values, period, f64::min)
}

fn rolling_fold<F>(values: &[Option<f64>], period: usize, fold: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut output = Vec::with_capacity(values.len());
    for end in 0..values.len() {
        if end + 1 < period {
            output.push(None);
            continue;
        }
        let window = &values[end + 1 - period..=end];
        let aggregate = window
            .iter()
            .try_fold(None, |acc: Option<f64>, value| {
                (*value).map(|v| Some(acc.map_or(v, |a| fold(a, v))))
            })
            .flatten();
        output.push(aggregate);
    }
    output
}

/// Percent change against the value `period` sessions earlier, as a ratio.
pub fn calculate_pct_change(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut output = vec![None; values.len()];
    if period == 0 {
        return output;
    }
    for idx in period..values.len() {
        if let (Some(previous), Some(current)) = (values[idx - period], values[idx]) {
            if previous.abs() >= f64::EPSILON {
                output[idx] = Some(current / previous - 1.0);
            }
        }
    }
    output
}

/// Moves every value one position later. The first slot takes `fill`.
pub fn shift_forward<T: Clone>(values: &[T], fill: T) -> Vec<T> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut shifted = Vec::with_capacity(values.len());
    shifted.push(fill);
    shifted.extend_from_slice(&values[..values.len() - 1]);
    shifted
}
