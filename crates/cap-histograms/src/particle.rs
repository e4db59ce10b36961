use cap_core::{
    histograms::require_derivable, make_name, AxisBinning, BinningSet, CapResult, Configuration,
    GroupState, HistogramCollection, HistogramGroup, Particle, ParticleDigit, H1ID, H2ID, TWO_PI,
};
use serde::{Deserialize, Serialize};

use crate::{
    binops::{divide_1d, divide_2d},
    merged_configuration, HistogramSource,
};

/// Single-particle densities for one (event filter, particle filter) combination.
///
/// Always holds `n1`, `n1_eTotal`, `n1_pt` and `n1_ptXS`. With `fillEta` (`fillY`) it adds the
/// $`(\eta, \varphi)`$ ($`(y, \varphi)`$) density `n1_phiEta` (`n1_phiY`) and, with `fillP2`,
/// the matching $`p_T`$-weighted density `spt_phiEta` (`spt_phiY`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticleHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    binning: BinningSet,
    fill_eta: bool,
    fill_y: bool,
    fill_p2: bool,
    pub(crate) n1: H1ID,
    pub(crate) n1_e_total: H1ID,
    pub(crate) n1_pt: H1ID,
    pub(crate) n1_pt_xs: H1ID,
    pub(crate) n1_phi_eta: Option<H2ID>,
    pub(crate) spt_phi_eta: Option<H2ID>,
    pub(crate) n1_phi_y: Option<H2ID>,
    pub(crate) spt_phi_y: Option<H2ID>,
}

impl ParticleHistos {
    /// The parameters this group reads, with their default values.
    pub fn default_configuration() -> Configuration {
        let mut configuration = Configuration::new("ParticleHistos");
        configuration.add_parameter("nBins_n1", 100);
        configuration.add_parameter("min_n1", 0.0);
        configuration.add_parameter("max_n1", 100.0);
        configuration.add_parameter("nBins_pt", 100);
        configuration.add_parameter("min_pt", 0.0);
        configuration.add_parameter("max_pt", 100.0);
        configuration.add_parameter("nBins_phi", 36);
        configuration.add_parameter("min_phi", 0.0);
        configuration.add_parameter("max_phi", TWO_PI);
        configuration.add_parameter("nBins_eta", 20);
        configuration.add_parameter("min_eta", -1.0);
        configuration.add_parameter("max_eta", 1.0);
        configuration.add_parameter("nBins_y", 20);
        configuration.add_parameter("min_y", -1.0);
        configuration.add_parameter("max_y", 1.0);
        configuration.add_parameter("fillEta", true);
        configuration.add_parameter("fillY", false);
        configuration.add_parameter("fillP2", false);
        configuration
    }

    /// Create an (uncreated) group named `name`, overlaying `configuration` on the defaults.
    pub fn new(name: &str, configuration: &Configuration) -> Self {
        let configuration = merged_configuration(name, Self::default_configuration(), configuration);
        let binning = BinningSet::from_configuration(&configuration);
        Self {
            configuration,
            histograms: HistogramCollection::new(name),
            binning,
            fill_eta: false,
            fill_y: false,
            fill_p2: false,
            n1: H1ID::default(),
            n1_e_total: H1ID::default(),
            n1_pt: H1ID::default(),
            n1_pt_xs: H1ID::default(),
            n1_phi_eta: None,
            spt_phi_eta: None,
            n1_phi_y: None,
            spt_phi_y: None,
        }
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let c = &self.configuration;
        self.fill_eta = c.value_bool("fillEta");
        self.fill_y = c.value_bool("fillY");
        self.fill_p2 = c.value_bool("fillP2");
        self.binning = BinningSet::from_configuration(c);
        let n1 = AxisBinning::from_configuration(c, "n1");
        let e_total = AxisBinning::new(n1.n_bins, n1.min, 10.0 * n1.max);
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        let BinningSet { pt, phi, eta, y } = &self.binning;

        self.n1 = source.h1(h, make_name(&[&bn, "n1"]), "n_1", n1.axis("n_1"))?;
        self.n1_e_total = source.h1(h, make_name(&[&bn, "n1_eTotal"]), "n1_eTotal", e_total.axis("E"))?;
        self.n1_pt = source.h1(h, make_name(&[&bn, "n1_pt"]), "N", pt.axis("p_{T}"))?;
        self.n1_pt_xs = source.h1(
            h,
            make_name(&[&bn, "n1_ptXS"]),
            "1/p_{T} dN/p_{T}",
            pt.axis("p_{T}"),
        )?;
        if self.fill_eta {
            self.n1_phi_eta = Some(source.h2(
                h,
                make_name(&[&bn, "n1_phiEta"]),
                "N",
                eta.axis("#eta"),
                phi.axis("#varphi"),
            )?);
            if self.fill_p2 {
                self.spt_phi_eta = Some(source.h2(
                    h,
                    make_name(&[&bn, "spt_phiEta"]),
                    "#sum p_{T}",
                    eta.axis("#eta"),
                    phi.axis("#varphi"),
                )?);
            }
        }
        if self.fill_y {
            self.n1_phi_y = Some(source.h2(
                h,
                make_name(&[&bn, "n1_phiY"]),
                "N",
                y.axis("y"),
                phi.axis("#varphi"),
            )?);
            if self.fill_p2 {
                self.spt_phi_y = Some(source.h2(
                    h,
                    make_name(&[&bn, "spt_phiY"]),
                    "#sum p_{T}",
                    y.axis("y"),
                    phi.axis("#varphi"),
                )?);
            }
        }
        Ok(())
    }

    /// The binning used to digitize particles for this group.
    pub fn binning(&self) -> &BinningSet {
        &self.binning
    }

    /// Fill with the digits of the accepted particles of one event.
    ///
    /// Digits outside the $`p_T`$ range skip the $`p_T`$ spectra, and digits with any
    /// non-positive bin index skip the two-dimensional densities. `n1` and `n1_eTotal` receive
    /// the digit count and summed energy.
    pub fn fill_digits(&mut self, digits: &[ParticleDigit], weight: f64) {
        if !self.begin_fill() {
            return;
        }
        let mut n_singles = 0.0;
        let mut total_energy = 0.0;
        for digit in digits {
            n_singles += 1.0;
            total_energy += digit.e;
            if digit.i_pt > 0 {
                let bin = digit.i_pt as usize;
                self.histograms[self.n1_pt].add_bin_content(bin, weight);
                self.histograms[self.n1_pt_xs].add_bin_content(bin, weight / digit.pt);
            }
            if digit.in_eta_acceptance() {
                let (ix, iy) = (digit.i_eta as usize, digit.i_phi as usize);
                if let Some(id) = self.n1_phi_eta {
                    self.histograms[id].add_bin_content(ix, iy, weight);
                }
                if let Some(id) = self.spt_phi_eta {
                    self.histograms[id].add_bin_content(ix, iy, weight * digit.pt);
                }
            }
            if digit.in_y_acceptance() {
                let (ix, iy) = (digit.i_y as usize, digit.i_phi as usize);
                if let Some(id) = self.n1_phi_y {
                    self.histograms[id].add_bin_content(ix, iy, weight);
                }
                if let Some(id) = self.spt_phi_y {
                    self.histograms[id].add_bin_content(ix, iy, weight * digit.pt);
                }
            }
        }
        for id in [self.n1_pt, self.n1_pt_xs] {
            let entries = self.histograms[id].entries();
            self.histograms[id].set_entries(entries + n_singles);
        }
        for id in [
            self.n1_phi_eta,
            self.spt_phi_eta,
            self.n1_phi_y,
            self.spt_phi_y,
        ]
        .into_iter()
        .flatten()
        {
            let entries = self.histograms[id].entries();
            self.histograms[id].set_entries(entries + n_singles);
        }
        self.histograms[self.n1].fill(n_singles, weight);
        self.histograms[self.n1_e_total].fill(total_energy, weight);
    }

    /// Fill with one particle, binning its kinematics directly.
    pub fn fill_particle(&mut self, particle: &Particle, weight: f64) {
        if !self.begin_fill() {
            return;
        }
        let momentum = particle.momentum();
        let pt = momentum.pt();
        let phi = match momentum.phi() {
            phi if phi < 0.0 => phi + TWO_PI,
            phi => phi,
        };
        self.histograms[self.n1_pt].fill(pt, weight);
        self.histograms[self.n1_pt_xs].fill(pt, weight / pt);
        let eta = momentum.eta();
        if let Some(id) = self.n1_phi_eta {
            self.histograms[id].fill(eta, phi, weight);
        }
        if let Some(id) = self.spt_phi_eta {
            self.histograms[id].fill(eta, phi, weight * pt);
        }
        let rapidity = momentum.rapidity();
        if let Some(id) = self.n1_phi_y {
            self.histograms[id].fill(rapidity, phi, weight);
        }
        if let Some(id) = self.spt_phi_y {
            self.histograms[id].fill(rapidity, phi, weight * pt);
        }
    }

    /// Fill the multiplicity and total-energy distributions. Call once per event.
    pub fn fill_multiplicity(&mut self, n_accepted: f64, total_energy: f64, weight: f64) {
        if !self.begin_fill() {
            return;
        }
        self.histograms[self.n1].fill(n_accepted, weight);
        self.histograms[self.n1_e_total].fill(total_energy, weight);
    }
}

impl_histogram_group!(ParticleHistos);

/// Projections and average-$`p_T`$ maps computed from a frozen [`ParticleHistos`].
///
/// Holds `n1_phi`, plus `n1_eta` (`fillEta`) and `n1_y` (`fillY`). With `fillP2` it also
/// holds the $`p_T`$ sums `sumpt1_*` and averages `pt_*` along each projection, and the
/// average maps `pt_phiEta`/`pt_phiY`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticleDerivedHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    fill_eta: bool,
    fill_y: bool,
    fill_p2: bool,
    pub(crate) n1_phi: H1ID,
    pub(crate) sumpt1_phi: Option<H1ID>,
    pub(crate) pt_phi: Option<H1ID>,
    pub(crate) n1_eta: Option<H1ID>,
    pub(crate) sumpt1_eta: Option<H1ID>,
    pub(crate) pt_eta: Option<H1ID>,
    pub(crate) pt_phi_eta: Option<H2ID>,
    pub(crate) n1_y: Option<H1ID>,
    pub(crate) sumpt1_y: Option<H1ID>,
    pub(crate) pt_y: Option<H1ID>,
    pub(crate) pt_phi_y: Option<H2ID>,
}

impl ParticleDerivedHistos {
    pub fn new(name: &str, configuration: &Configuration) -> Self {
        Self {
            configuration: merged_configuration(
                name,
                ParticleHistos::default_configuration(),
                configuration,
            ),
            histograms: HistogramCollection::new(name),
            fill_eta: false,
            fill_y: false,
            fill_p2: false,
            n1_phi: H1ID::default(),
            sumpt1_phi: None,
            pt_phi: None,
            n1_eta: None,
            sumpt1_eta: None,
            pt_eta: None,
            pt_phi_eta: None,
            n1_y: None,
            sumpt1_y: None,
            pt_y: None,
            pt_phi_y: None,
        }
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let c = &self.configuration;
        self.fill_eta = c.value_bool("fillEta");
        self.fill_y = c.value_bool("fillY");
        self.fill_p2 = c.value_bool("fillP2");
        let BinningSet { phi, eta, y, .. } = BinningSet::from_configuration(c);
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        let name = |s: &str| make_name(&[&bn, s]);

        self.n1_phi = source.h1(h, name("n1_phi"), "#rho_{1}(#varphi)", phi.axis("#varphi"))?;
        if self.fill_p2 {
            self.sumpt1_phi = Some(source.h1(h, name("sumpt1_phi"), "#sum p_{T}", phi.axis("#varphi"))?);
            self.pt_phi = Some(source.h1(h, name("pt_phi"), "<p_{T}>", phi.axis("#varphi"))?);
        }
        if self.fill_eta {
            self.n1_eta = Some(source.h1(h, name("n1_eta"), "#rho_{1}(#eta)", eta.axis("#eta"))?);
            if self.fill_p2 {
                self.sumpt1_eta = Some(source.h1(h, name("sumpt1_eta"), "#sum p_{T}", eta.axis("#eta"))?);
                self.pt_eta = Some(source.h1(h, name("pt_eta"), "<p_{T}>", eta.axis("#eta"))?);
                self.pt_phi_eta = Some(source.h2(
                    h,
                    name("pt_phiEta"),
                    "<p_{T}>",
                    eta.axis("#eta"),
                    phi.axis("#varphi"),
                )?);
            }
        }
        if self.fill_y {
            self.n1_y = Some(source.h1(h, name("n1_y"), "#rho_{1}(y)", y.axis("y"))?);
            if self.fill_p2 {
                self.sumpt1_y = Some(source.h1(h, name("sumpt1_y"), "#sum p_{T}", y.axis("y"))?);
                self.pt_y = Some(source.h1(h, name("pt_y"), "<p_{T}>", y.axis("y"))?);
                self.pt_phi_y = Some(source.h2(
                    h,
                    name("pt_phiY"),
                    "<p_{T}>",
                    y.axis("y"),
                    phi.axis("#varphi"),
                )?);
            }
        }
        Ok(())
    }

    /// Compute the projections and averages of a frozen `base`.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::InvalidState`](cap_core::CapError::InvalidState) unless `base` is
    /// frozen and this group freshly created, and
    /// [`CapError::DimensionMismatch`](cap_core::CapError::DimensionMismatch) if the two groups
    /// were built with different binnings.
    pub fn calculate_derived_histograms(&mut self, base: &ParticleHistos) -> CapResult<()> {
        require_derivable(&[base.histograms()], &self.histograms)?;
        let source = base.histograms();
        // the phi projection comes from the eta map when both maps exist
        let phi_maps = [
            (base.n1_phi_eta, base.spt_phi_eta, self.n1_eta, self.sumpt1_eta, self.pt_eta),
            (base.n1_phi_y, base.spt_phi_y, self.n1_y, self.sumpt1_y, self.pt_y),
        ];
        let mut phi_done = false;
        for (n1_map, spt_map, n1_proj, spt_proj, pt_proj) in phi_maps {
            let Some(n1_map) = n1_map else { continue };
            let n1_map = &source[n1_map];
            if !phi_done {
                self.histograms[self.n1_phi].add(&n1_map.projection_y("n1_phi"), 1.0)?;
            }
            if let Some(id) = n1_proj {
                self.histograms[id].add(&n1_map.projection_x("n1_x"), 1.0)?;
            }
            if let Some(spt_map) = spt_map {
                let spt_map = &source[spt_map];
                if !phi_done {
                    if let (Some(spt_phi), Some(pt_phi)) = (self.sumpt1_phi, self.pt_phi) {
                        self.histograms[spt_phi].add(&spt_map.projection_y("spt_phi"), 1.0)?;
                        let mut average = self.histograms[pt_phi].clone();
                        divide_1d(
                            &self.histograms[spt_phi],
                            &self.histograms[self.n1_phi],
                            &mut average,
                        )?;
                        self.histograms[pt_phi] = average;
                    }
                }
                if let (Some(spt), Some(pt), Some(n1)) = (spt_proj, pt_proj, n1_proj) {
                    self.histograms[spt].add(&spt_map.projection_x("spt_x"), 1.0)?;
                    let mut average = self.histograms[pt].clone();
                    divide_1d(&self.histograms[spt], &self.histograms[n1], &mut average)?;
                    self.histograms[pt] = average;
                }
            }
            phi_done = true;
        }
        for (n1_map, spt_map, pt_map) in [
            (base.n1_phi_eta, base.spt_phi_eta, self.pt_phi_eta),
            (base.n1_phi_y, base.spt_phi_y, self.pt_phi_y),
        ] {
            if let (Some(n1_map), Some(spt_map), Some(pt_map)) = (n1_map, spt_map, pt_map) {
                divide_2d(&source[spt_map], &source[n1_map], &mut self.histograms[pt_map])?;
            }
        }
        self.histograms.set_state(GroupState::DerivedComputed);
        Ok(())
    }
}

impl_histogram_group!(ParticleDerivedHistos);

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cap_core::{data::test_event, CapError, HistogramStore};

    use super::*;

    fn configuration() -> Configuration {
        let mut configuration = Configuration::new("test");
        configuration.add_parameter("nBins_pt", 10);
        configuration.add_parameter("min_pt", 0.0);
        configuration.add_parameter("max_pt", 1.0);
        configuration.add_parameter("nBins_phi", 4);
        configuration.add_parameter("fillP2", true);
        configuration
    }

    fn digit(i_pt: i32, i_phi: i32, i_eta: i32, pt: f64) -> ParticleDigit {
        ParticleDigit {
            i_pt,
            i_phi,
            i_eta,
            i_y: 1,
            pt,
            e: 2.0 * pt,
        }
    }

    #[test]
    fn test_configuration_overlay() {
        let histos = ParticleHistos::new("P", &configuration());
        assert_eq!(histos.configuration().value_int("nBins_pt"), 10);
        assert_eq!(histos.configuration().value_int("nBins_eta"), 20);
        assert!(histos.configuration().value_bool("fillP2"));
        assert_eq!(histos.binning().phi.n_bins, 4);
    }

    #[test]
    fn test_fill_digits() {
        let mut histos = ParticleHistos::new("P", &configuration());
        histos.create_histograms().unwrap();
        let digits = vec![
            digit(3, 1, 5, 0.25),
            digit(3, 2, 5, 0.25),
            digit(-1, 2, 5, 1.5),
            digit(4, 0, 5, 0.35),
        ];
        histos.fill_digits(&digits, 1.0);
        let h = histos.histograms();
        assert_relative_eq!(h[histos.n1_pt].bin_content(3), 2.0);
        assert_relative_eq!(h[histos.n1_pt].bin_content(4), 1.0);
        assert_relative_eq!(h[histos.n1_pt_xs].bin_content(3), 8.0);
        assert_eq!(h[histos.n1_pt].entries(), 4.0);
        let phi_eta = &h[histos.n1_phi_eta.unwrap()];
        assert_relative_eq!(phi_eta.integral(), 2.0);
        assert_relative_eq!(phi_eta.bin_content(5, 2), 1.0);
        assert_relative_eq!(h[histos.spt_phi_eta.unwrap()].integral(), 0.5);
        assert_relative_eq!(h[histos.n1].bin_content(5), 1.0);
        assert_relative_eq!(h[histos.n1_e_total].integral(), 1.0);
        assert!(histos.n1_phi_y.is_none());
        assert_eq!(histos.state(), GroupState::Filling);
    }

    #[test]
    fn test_fill_after_freeze_is_ignored() {
        let mut histos = ParticleHistos::new("P", &configuration());
        histos.fill_multiplicity(3.0, 1.0, 1.0);
        histos.create_histograms().unwrap();
        histos.fill_multiplicity(3.0, 1.0, 1.0);
        histos.freeze(None).unwrap();
        histos.fill_multiplicity(3.0, 1.0, 1.0);
        assert_relative_eq!(histos.histograms()[histos.n1].integral(), 1.0);
    }

    #[test]
    fn test_fill_particle() {
        let event = test_event();
        let mut histos = ParticleHistos::new("P", &configuration());
        histos.create_histograms().unwrap();
        histos.fill_particle(&event.particles[0], 1.0);
        let h = histos.histograms();
        assert_relative_eq!(h[histos.n1_pt].bin_content(6), 1.0);
        assert_relative_eq!(h[histos.n1_phi_eta.unwrap()].integral(), 1.0);
    }

    #[test]
    fn test_derived_projections_and_averages() {
        let mut histos = ParticleHistos::new("P", &configuration());
        histos.create_histograms().unwrap();
        histos.fill_digits(&[digit(3, 1, 5, 0.2), digit(5, 1, 6, 0.4), digit(3, 3, 6, 0.3)], 1.0);
        histos.freeze(None).unwrap();

        let mut derived = ParticleDerivedHistos::new("P", &configuration());
        derived.create_histograms().unwrap();
        derived.calculate_derived_histograms(&histos).unwrap();
        let h = derived.histograms();
        assert_relative_eq!(h[derived.n1_phi].bin_content(1), 2.0);
        assert_relative_eq!(h[derived.n1_phi].bin_content(3), 1.0);
        assert_relative_eq!(h[derived.n1_eta.unwrap()].bin_content(6), 2.0);
        assert_relative_eq!(h[derived.pt_phi.unwrap()].bin_content(1), 0.3);
        assert_relative_eq!(h[derived.pt_phi.unwrap()].bin_content(2), 0.0);
        assert_relative_eq!(h[derived.pt_eta.unwrap()].bin_content(6), 0.35);
        assert_relative_eq!(h[derived.pt_phi_eta.unwrap()].bin_content(6, 3), 0.3);
        assert_eq!(derived.state(), GroupState::DerivedComputed);
        assert!(matches!(
            derived.calculate_derived_histograms(&histos),
            Err(CapError::InvalidState { .. })
        ));
        derived.reset();
        assert!(derived.calculate_derived_histograms(&histos).is_ok());
    }

    #[test]
    fn test_derived_requires_frozen_base() {
        let mut histos = ParticleHistos::new("P", &configuration());
        histos.create_histograms().unwrap();
        let mut derived = ParticleDerivedHistos::new("P", &configuration());
        derived.create_histograms().unwrap();
        assert!(derived.calculate_derived_histograms(&histos).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let mut histos = ParticleHistos::new("P", &configuration());
        histos.create_histograms().unwrap();
        histos.fill_digits(&[digit(3, 1, 5, 0.2)], 2.0);
        histos.freeze(None).unwrap();
        let mut store = HistogramStore::new();
        histos.save_histograms(&mut store);
        assert!(store.contains("P_n1_phiEta"));
        assert!(store.contains("P_spt_phiEta"));
        let mut loaded = ParticleHistos::new("P", &configuration());
        loaded.load_histograms(&store).unwrap();
        assert_eq!(loaded.state(), GroupState::Frozen);
        assert_relative_eq!(loaded.histograms()[loaded.n1_pt].bin_content(3), 2.0);

        let mut mismatched = configuration();
        mismatched.add_parameter("fillY", true);
        let mut incomplete = ParticleHistos::new("P", &mismatched);
        assert!(matches!(
            incomplete.load_histograms(&store),
            Err(CapError::HistogramNotFound { .. })
        ));
        assert_eq!(incomplete.state(), GroupState::Uncreated);
        assert_eq!(incomplete.histograms().n_histograms(), 0);
    }
}
