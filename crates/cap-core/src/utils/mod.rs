/// Shared index arithmetic for symmetric (non-decreasing) tuples of filter indices.
pub mod combinatorics;
/// Useful enumerations for selectors and multiplicity conventions.
pub mod enums;
/// Three- and four-vectors with the kinematic helpers used by filters and digitization.
pub mod vectors;

/// A helper method to get histogram edges from evenly-spaced `bins` over a given `range`
/// # See Also
/// [`Axis`](crate::histograms::Axis)
/// [`get_bin_index`]
pub fn get_bin_edges(bins: usize, range: (f64, f64)) -> Vec<f64> {
    let bin_width = (range.1 - range.0) / (bins as f64);
    (0..=bins)
        .map(|i| range.0 + (i as f64 * bin_width))
        .collect()
}

/// A helper method to obtain the (zero-based) index of a bin where a value should go in a
/// histogram with evenly spaced `bins` over a given `range`
///
/// Values outside of `[limits.0, limits.1)` (including NaN) have no bin.
///
/// # See Also
/// [`Axis`](crate::histograms::Axis)
/// [`get_bin_edges`]
pub fn get_bin_index(value: f64, bins: usize, limits: (f64, f64)) -> Option<usize> {
    if bins > 0 && value >= limits.0 && value < limits.1 {
        let bin_width = (limits.1 - limits.0) / bins as f64;
        let bin_index = ((value - limits.0) / bin_width).floor() as usize;
        Some(bin_index.min(bins - 1))
    } else {
        None
    }
}
