//! Feerate statistics shared by block ingestion and the projection engine.

/// Median of a set of feerates. Even-sized inputs average the two middle values.
///
/// Returns `0.0` for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let len = sorted.len();
    if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[(len - 1) / 2]
    }
}

/// Pick `range_length` representative feerates from a slice sorted by
/// descending feerate.
///
/// The result starts with the lowest feerate, walks evenly spaced samples
/// towards the top and ends with the highest feerate.
pub fn fees_in_range(feerates_desc: &[f64], range_length: usize) -> Vec<f64> {
    let (Some(&lowest), Some(&highest)) = (feerates_desc.last(), feerates_desc.first()) else {
        return Vec::new();
    };
    if range_length < 2 {
        return vec![highest];
    }

    let len = feerates_desc.len();
    let chunk = 1.0 / (range_length - 1) as f64;
    let mut range = Vec::with_capacity(range_length);
    range.push(lowest);
    for items_to_add in (1..range_length - 1).rev() {
        let index = ((len as f64) * chunk * items_to_add as f64).floor() as usize;
        range.push(feerates_desc[index.min(len - 1)]);
    }
    range.push(highest);
    range
}
