use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{configuration::Configuration, data::Particle, histograms::Axis, TWO_PI};

/// Even binning of one kinematic variable, read from `nBins_<key>`, `min_<key>` and
/// `max_<key>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisBinning {
    pub n_bins: usize,
    pub min: f64,
    pub max: f64,
}

impl AxisBinning {
    pub fn new(n_bins: usize, min: f64, max: f64) -> Self {
        Self { n_bins, min, max }
    }
    /// Read the binning for `key` from a configuration.
    pub fn from_configuration(configuration: &Configuration, key: &str) -> Self {
        Self {
            n_bins: configuration.value_bins(&format!("nBins_{key}")),
            min: configuration.value_double(&format!("min_{key}")),
            max: configuration.value_double(&format!("max_{key}")),
        }
    }
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
    pub fn width(&self) -> f64 {
        self.range() / self.n_bins as f64
    }
    /// The one-based bin of `value`.
    ///
    /// Values at or above `max` (and NaN) give `-1`. Values below `min` give an index `<= 0`
    /// which is not clamped.
    pub fn bin_for(&self, value: f64) -> i32 {
        if value.is_nan() || self.n_bins == 0 {
            return -1;
        }
        let index = 1 + (self.n_bins as f64 * (value - self.min) / self.range()).floor() as i32;
        if index > self.n_bins as i32 {
            -1
        } else {
            index
        }
    }
    /// A histogram axis with this binning.
    pub fn axis<T: Into<String>>(&self, title: T) -> Axis {
        Axis::new(self.n_bins, self.min, self.max, title)
    }
}

/// The pT, $`\phi`$, $`\eta`$ and $`y`$ binnings used to digitize particles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinningSet {
    pub pt: AxisBinning,
    pub phi: AxisBinning,
    pub eta: AxisBinning,
    pub y: AxisBinning,
}

impl BinningSet {
    pub fn from_configuration(configuration: &Configuration) -> Self {
        Self {
            pt: AxisBinning::from_configuration(configuration, "pt"),
            phi: AxisBinning::from_configuration(configuration, "phi"),
            eta: AxisBinning::from_configuration(configuration, "eta"),
            y: AxisBinning::from_configuration(configuration, "y"),
        }
    }
    pub fn pt_bin_for(&self, pt: f64) -> i32 {
        self.pt.bin_for(pt)
    }
    /// Negative angles are shifted by $`2\pi`$ first.
    pub fn phi_bin_for(&self, phi: f64) -> i32 {
        self.phi.bin_for(if phi < 0.0 { phi + TWO_PI } else { phi })
    }
    pub fn eta_bin_for(&self, eta: f64) -> i32 {
        self.eta.bin_for(eta)
    }
    pub fn y_bin_for(&self, y: f64) -> i32 {
        self.y.bin_for(y)
    }
}

/// The bins a particle falls into, computed once per event and shared by every group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleDigit {
    pub i_pt: i32,
    pub i_phi: i32,
    pub i_eta: i32,
    pub i_y: i32,
    pub pt: f64,
    pub e: f64,
}

impl ParticleDigit {
    pub fn from_particle(particle: &Particle, binning: &BinningSet) -> Self {
        let momentum = particle.momentum();
        let pt = momentum.pt();
        Self {
            i_pt: binning.pt_bin_for(pt),
            i_phi: binning.phi_bin_for(momentum.phi()),
            i_eta: binning.eta_bin_for(momentum.eta()),
            i_y: binning.y_bin_for(momentum.rapidity()),
            pt,
            e: momentum.e,
        }
    }
    pub fn reset(&mut self) {
        *self = Self::default();
    }
    /// Whether the pT, $`\phi`$ and $`\eta`$ bins are all in range.
    pub fn in_eta_acceptance(&self) -> bool {
        self.i_pt > 0 && self.i_phi > 0 && self.i_eta > 0
    }
    /// Whether the pT, $`\phi`$ and $`y`$ bins are all in range.
    pub fn in_y_acceptance(&self) -> bool {
        self.i_pt > 0 && self.i_phi > 0 && self.i_y > 0
    }
}

impl Display for ParticleDigit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "iPt: {} iPhi: {} iEta: {} iY: {} pt: {} e: {}",
            self.i_pt, self.i_phi, self.i_eta, self.i_y, self.pt, self.e
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{data::test_event, PI};

    fn binning() -> BinningSet {
        let mut configuration = Configuration::new("Binning");
        configuration.add_parameter("nBins_pt", 10);
        configuration.add_parameter("min_pt", 0.0);
        configuration.add_parameter("max_pt", 1.0);
        configuration.add_parameter("nBins_phi", 36);
        configuration.add_parameter("min_phi", 0.0);
        configuration.add_parameter("max_phi", TWO_PI);
        configuration.add_parameter("nBins_eta", 20);
        configuration.add_parameter("min_eta", -1.0);
        configuration.add_parameter("max_eta", 1.0);
        configuration.add_parameter("nBins_y", 20);
        configuration.add_parameter("min_y", -1.0);
        configuration.add_parameter("max_y", 1.0);
        BinningSet::from_configuration(&configuration)
    }

    #[test]
    fn test_pt_bins() {
        let binning = binning();
        assert_eq!(binning.pt_bin_for(0.05), 1);
        assert_eq!(binning.pt_bin_for(0.95), 10);
        assert_eq!(binning.pt_bin_for(1.0), -1);
    }

    #[test]
    fn test_bin_edges_are_not_clamped() {
        let binning = binning();
        assert_eq!(binning.pt_bin_for(0.0), 1);
        assert_eq!(binning.pt_bin_for(1.0), -1);
        assert!(binning.pt_bin_for(-1.0) <= 0);
        assert_eq!(binning.pt_bin_for(-1.0), -9);
        assert_eq!(binning.pt_bin_for(f64::NAN), -1);
    }

    #[test]
    fn test_phi_wraps() {
        let binning = binning();
        assert_eq!(binning.phi_bin_for(-0.4 * PI), binning.phi_bin_for(1.6 * PI));
        assert_eq!(binning.phi_bin_for(-0.4 * PI), 29);
    }

    #[test]
    fn test_digitize() {
        let event = test_event();
        let binning = binning();
        let mut digit = ParticleDigit::from_particle(&event.particles[0], &binning);
        assert_relative_eq!(digit.pt, 0.5);
        assert_eq!(digit.i_pt, 6);
        assert_eq!(digit.i_phi, 1);
        assert!(digit.in_eta_acceptance());
        let proton = ParticleDigit::from_particle(&event.particles[3], &binning);
        assert_eq!(proton.i_pt, -1);
        assert!(!proton.in_eta_acceptance());
        digit.reset();
        assert_eq!(digit, ParticleDigit::default());
    }
}
