use cap_core::{make_name, Axis, CapResult, Configuration, HistogramCollection, HistogramGroup, H2ID};
use serde::{Deserialize, Serialize};

use crate::HistogramSource;

/// Transverse maps of a collision geometry on a 200×200 grid over $`[-20, 20]^2`$ fm: the
/// edge density, the normalized radius and the two components of the density gradient.
///
/// Maps are written point by point with [`set_point`](Self::set_point) and read back with
/// [`radius_and_gradient`](Self::radius_and_gradient), for instance to orient radial boosts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollisionGeometryGradientHistograms {
    configuration: Configuration,
    histograms: HistogramCollection,
    pub(crate) edge: H2ID,
    pub(crate) radius: H2ID,
    pub(crate) gx: H2ID,
    pub(crate) gy: H2ID,
}

impl CollisionGeometryGradientHistograms {
    pub fn new(name: &str) -> Self {
        Self {
            configuration: Configuration::new(name),
            histograms: HistogramCollection::new(name),
            edge: H2ID::default(),
            radius: H2ID::default(),
            gx: H2ID::default(),
            gy: H2ID::default(),
        }
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        let x = Axis::new(200, -20.0, 20.0, "x (fm)");
        let y = Axis::new(200, -20.0, 20.0, "y (fm)");
        let mut map = |what: &str, title: &str| {
            source.h2(h, make_name(&[&bn, what]), title, x.clone(), y.clone())
        };
        self.edge = map("edge", "Edge")?;
        self.radius = map("radius", "r/r_{max}")?;
        self.gx = map("gx", "g_{x}")?;
        self.gy = map("gy", "g_{y}")?;
        Ok(())
    }

    /// Store the values of the cell holding `(x, y)`, replacing what it held.
    pub fn set_point(&mut self, x: f64, y: f64, edge: f64, radius: f64, gx: f64, gy: f64) {
        if !self.begin_fill() {
            return;
        }
        let h = &mut self.histograms;
        let (ix, iy) = h[self.radius].get_bin(x, y);
        for (id, value) in [(self.edge, edge), (self.radius, radius), (self.gx, gx), (self.gy, gy)] {
            h[id].set_bin_content(ix, iy, value);
        }
    }

    /// The radius and gradient `(r, gx, gy)` stored in the cell holding `(x, y)`.
    ///
    /// Points outside the grid read the (empty) under- and overflow cells.
    pub fn radius_and_gradient(&self, x: f64, y: f64) -> (f64, f64, f64) {
        let h = &self.histograms;
        let (ix, iy) = h[self.radius].get_bin(x, y);
        (
            h[self.radius].bin_content(ix, iy),
            h[self.gx].bin_content(ix, iy),
            h[self.gy].bin_content(ix, iy),
        )
    }
}

impl_histogram_group!(CollisionGeometryGradientHistograms);
