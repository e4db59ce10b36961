use cap_core::{CapError, CapResult, Histogram1D, Histogram2D};

pub(crate) fn check_1d(a: &Histogram1D, b: &Histogram1D) -> CapResult<()> {
    if a.same_dimensions(b) {
        Ok(())
    } else {
        Err(CapError::DimensionMismatch {
            name: b.name().to_string(),
        })
    }
}

pub(crate) fn check_2d(a: &Histogram2D, b: &Histogram2D) -> CapResult<()> {
    if a.same_dimensions(b) {
        Ok(())
    } else {
        Err(CapError::DimensionMismatch {
            name: b.name().to_string(),
        })
    }
}

/// `out = num / den` over the in-range bins. Bins with `den <= 0` are left untouched.
pub(crate) fn divide_1d(
    num: &Histogram1D,
    den: &Histogram1D,
    out: &mut Histogram1D,
) -> CapResult<()> {
    check_1d(out, num)?;
    check_1d(out, den)?;
    for bin in 1..=out.n_bins() {
        let d = den.bin_content(bin);
        if d > 0.0 {
            out.set_bin_content(bin, num.bin_content(bin) / d);
            out.set_bin_error(bin, num.bin_error(bin) / d);
        }
    }
    Ok(())
}

/// `out = num / den` over the in-range bins. Bins with `den <= 0` are left untouched.
pub(crate) fn divide_2d(
    num: &Histogram2D,
    den: &Histogram2D,
    out: &mut Histogram2D,
) -> CapResult<()> {
    check_2d(out, num)?;
    check_2d(out, den)?;
    for iy in 1..=out.n_bins_y() {
        for ix in 1..=out.n_bins_x() {
            let d = den.bin_content(ix, iy);
            if d > 0.0 {
                out.set_bin_content(ix, iy, num.bin_content(ix, iy) / d);
                out.set_bin_error(ix, iy, num.bin_error(ix, iy) / d);
            }
        }
    }
    Ok(())
}

/// Overwrite each in-range bin of `out` for which `f(bin)` is `Some`.
pub(crate) fn set_bins_1d(out: &mut Histogram1D, f: impl Fn(usize) -> Option<f64>) {
    for bin in 1..=out.n_bins() {
        if let Some(value) = f(bin) {
            out.set_bin_content(bin, value);
        }
    }
}

/// Overwrite each in-range bin of `out` for which `f(ix, iy)` is `Some`.
pub(crate) fn set_bins_2d(out: &mut Histogram2D, f: impl Fn(usize, usize) -> Option<f64>) {
    for iy in 1..=out.n_bins_y() {
        for ix in 1..=out.n_bins_x() {
            if let Some(value) = f(ix, iy) {
                out.set_bin_content(ix, iy, value);
            }
        }
    }
}

/// `out[i][j] = a[i] * b[j]` over the in-range bins.
pub(crate) fn outer_product(
    a: &Histogram1D,
    b: &Histogram1D,
    out: &mut Histogram2D,
) -> CapResult<()> {
    if !(out.x_axis().same_binning(a.x_axis()) && out.y_axis().same_binning(b.x_axis())) {
        return Err(CapError::DimensionMismatch {
            name: out.name().to_string(),
        });
    }
    for iy in 1..=out.n_bins_y() {
        for ix in 1..=out.n_bins_x() {
            out.set_bin_content(ix, iy, a.bin_content(ix) * b.bin_content(iy));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cap_core::Axis;

    use super::*;

    #[test]
    fn test_divide_skips_empty_denominators() {
        let axis = Axis::new(3, 0.0, 3.0, "x");
        let mut num = Histogram1D::new("num", "num", axis.clone());
        let mut den = Histogram1D::new("den", "den", axis.clone());
        let mut out = Histogram1D::new("out", "out", axis);
        num.add_bin_content(1, 6.0);
        num.add_bin_content(2, 6.0);
        den.add_bin_content(1, 3.0);
        out.set_bin_content(2, -7.0);
        divide_1d(&num, &den, &mut out).unwrap();
        assert_relative_eq!(out.bin_content(1), 2.0);
        assert_relative_eq!(out.bin_content(2), -7.0);
    }

    #[test]
    fn test_outer_product() {
        let x = Axis::new(2, 0.0, 2.0, "x");
        let y = Axis::new(3, 0.0, 3.0, "y");
        let mut a = Histogram1D::new("a", "a", x.clone());
        let mut b = Histogram1D::new("b", "b", y.clone());
        a.add_bin_content(1, 2.0);
        a.add_bin_content(2, 3.0);
        b.add_bin_content(3, 5.0);
        let mut out = Histogram2D::new("out", "out", x.clone(), y);
        outer_product(&a, &b, &mut out).unwrap();
        assert_relative_eq!(out.bin_content(2, 3), 15.0);
        assert_relative_eq!(out.bin_content(1, 1), 0.0);
        let mut wrong = Histogram2D::new("wrong", "wrong", x.clone(), x);
        assert!(outer_product(&a, &b, &mut wrong).is_err());
    }
}
