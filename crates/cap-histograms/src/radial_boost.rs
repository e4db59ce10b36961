use cap_core::{
    make_name, Axis, AxisBinning, CapResult, Configuration, HistogramCollection, HistogramGroup,
    H1ID, H2ID, TWO_PI,
};
use serde::{Deserialize, Serialize};

use crate::{merged_configuration, HistogramSource};

/// Distributions of the sources of a radial-flow boost: their azimuth, radius, boost velocity
/// and transverse position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RadialBoostHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    pub(crate) phi: H1ID,
    pub(crate) r: H1ID,
    pub(crate) beta: H1ID,
    pub(crate) xy: H2ID,
}

impl RadialBoostHistos {
    pub fn default_configuration() -> Configuration {
        let mut configuration = Configuration::new("RadialBoostHistos");
        configuration.add_parameter("nBins_phi", 36);
        configuration.add_parameter("min_phi", 0.0);
        configuration.add_parameter("max_phi", TWO_PI);
        configuration.add_parameter("nBins_r", 100);
        configuration.add_parameter("min_r", 0.0);
        configuration.add_parameter("max_r", 10.0);
        configuration.add_parameter("nBins_beta", 100);
        configuration.add_parameter("min_beta", 0.0);
        configuration.add_parameter("max_beta", 1.0);
        configuration
    }

    pub fn new(name: &str, configuration: &Configuration) -> Self {
        Self {
            configuration: merged_configuration(name, Self::default_configuration(), configuration),
            histograms: HistogramCollection::new(name),
            phi: H1ID::default(),
            r: H1ID::default(),
            beta: H1ID::default(),
            xy: H2ID::default(),
        }
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let c = &self.configuration;
        let binning = |key: &str| AxisBinning::from_configuration(c, key);
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        self.phi = source.h1(h, make_name(&[&bn, "ns_phi"]), "N_{s}", binning("phi").axis("#phi"))?;
        self.r = source.h1(h, make_name(&[&bn, "ns_r"]), "N_{s}", binning("r").axis("r"))?;
        self.beta = source.h1(
            h,
            make_name(&[&bn, "ns_beta"]),
            "N_{s}",
            binning("beta").axis("#beta_{s}"),
        )?;
        self.xy = source.h2(
            h,
            make_name(&[&bn, "ns_xy"]),
            "N_{s}",
            Axis::new(40, -10.0, 10.0, "x"),
            Axis::new(40, -10.0, 10.0, "y"),
        )?;
        Ok(())
    }

    /// Record one boosted source at `(x, y)`, radius `r` and azimuth `phi`, boosted with
    /// velocity `beta`.
    pub fn fill(&mut self, x: f64, y: f64, r: f64, phi: f64, beta: f64, weight: f64) {
        if !self.begin_fill() {
            return;
        }
        let h = &mut self.histograms;
        h[self.phi].fill(phi, weight);
        h[self.r].fill(r, weight);
        h[self.beta].fill(beta, weight);
        h[self.xy].fill(x, y, weight);
    }
}

impl_histogram_group!(RadialBoostHistos);
