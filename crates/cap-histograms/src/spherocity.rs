use cap_core::{
    index_for_combination, make_name, n_combinations, AxisBinning, CapResult, Configuration,
    HistogramCollection, HistogramGroup, Particle, H1ID, H2ID, PI,
};
use serde::{Deserialize, Serialize};

use crate::{merged_configuration, HistogramSource};

/// Transverse spherocities `(S0, S1)` of a set of particles, scanning `n_steps` directions of
/// the unit vector $`\hat{n}`$ over half a turn.
///
/// ```math
/// S_0 = \frac{\pi^2}{4} \min_{\hat{n}} \left( \frac{\sum_i |\vec{p}_{T,i} \times \hat{n}|}{\sum_i p_{T,i}} \right)^2
/// ```
///
/// `S1` is the same estimator with every transverse momentum replaced by a unit vector.
/// Particles with vanishing transverse momentum are ignored. Returns [`None`] if no particle
/// is left or `n_steps` is zero.
///
/// ```
/// use std::sync::Arc;
/// use cap_core::{Particle, ParticleType, Vec3};
/// use cap_histograms::transverse_spherocity;
///
/// let pion = Arc::new(ParticleType::from_pdg(211).unwrap());
/// let particles = [
///     Particle::on_shell(pion.clone(), Vec3::new(1.0, 0.0, 0.0)),
///     Particle::on_shell(pion, Vec3::new(-2.0, 0.0, 0.3)),
/// ];
/// let (s0, s1) = transverse_spherocity(&particles, 360).unwrap();
/// assert!(s0 < 1e-12 && s1 < 1e-12);
/// ```
pub fn transverse_spherocity<'a>(
    particles: impl IntoIterator<Item = &'a Particle>,
    n_steps: usize,
) -> Option<(f64, f64)> {
    let momenta: Vec<(f64, f64, f64)> = particles
        .into_iter()
        .map(|particle| {
            let p = particle.momentum();
            (p.px, p.py, p.pt())
        })
        .filter(|&(_, _, pt)| pt > 0.0)
        .collect();
    if momenta.is_empty() || n_steps == 0 {
        return None;
    }
    let pt_sum: f64 = momenta.iter().map(|&(_, _, pt)| pt).sum();
    let n = momenta.len() as f64;
    let step = PI / n_steps as f64;
    let (mut s0, mut s1) = (f64::INFINITY, f64::INFINITY);
    for k in 0..n_steps {
        let (ny, nx) = (k as f64 * step).sin_cos();
        let (weighted, unit) = momenta
            .iter()
            .fold((0.0, 0.0), |(weighted, unit), &(px, py, pt)| {
                let cross = (ny * px - nx * py).abs();
                (weighted + cross, unit + cross / pt)
            });
        s0 = s0.min((weighted / pt_sum).powi(2));
        s1 = s1.min((unit / n).powi(2));
    }
    let factor = PI * PI / 4.0;
    Some((factor * s0, factor * s1))
}

/// Distributions of the transverse spherocities `S0` and `S1`, one set per particle filter,
/// plus the `S0` correlations of every pair of distinct filters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransverseSpherocityHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    filter_names: Vec<String>,
    pub(crate) s0: Vec<H1ID>,
    pub(crate) s1: Vec<H1ID>,
    pub(crate) s1_vs_s0: Vec<H2ID>,
    /// Indexed by the combination `(k1, k2 - 1)` of `n - 1` filters.
    pub(crate) s0_vs_s0: Vec<H2ID>,
}

impl TransverseSpherocityHistos {
    pub fn default_configuration() -> Configuration {
        let mut configuration = Configuration::new("TransverseSpherocityHistos");
        configuration.add_parameter("fillS0", true);
        configuration.add_parameter("fillS1", false);
        configuration.add_parameter("fillS1VsS0", false);
        configuration.add_parameter("fillCorrelationHistos", false);
        configuration.add_parameter("nSteps", 1000);
        configuration.add_parameter("nBins_spherocity", 100);
        configuration.add_parameter("min_spherocity", 0.0);
        configuration.add_parameter("max_spherocity", 1.0);
        configuration
    }

    pub fn new<S: AsRef<str>>(name: &str, configuration: &Configuration, filter_names: &[S]) -> Self {
        Self {
            configuration: merged_configuration(name, Self::default_configuration(), configuration),
            histograms: HistogramCollection::new(name),
            filter_names: filter_names.iter().map(|s| s.as_ref().to_string()).collect(),
            s0: Vec::new(),
            s1: Vec::new(),
            s1_vs_s0: Vec::new(),
            s0_vs_s0: Vec::new(),
        }
    }

    /// The number of directions scanned by [`transverse_spherocity`].
    pub fn n_steps(&self) -> usize {
        self.configuration.value_bins("nSteps")
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let c = &self.configuration;
        let (fill_s0, fill_s1) = (c.value_bool("fillS0"), c.value_bool("fillS1"));
        let fill_s1_vs_s0 = c.value_bool("fillS1VsS0");
        let correlations = c.value_bool("fillCorrelationHistos");
        let s = AxisBinning::from_configuration(c, "spherocity");
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        let n = self.filter_names.len();
        self.s0 = Vec::new();
        self.s1 = Vec::new();
        self.s1_vs_s0 = Vec::new();
        self.s0_vs_s0 = Vec::new();
        for pf in &self.filter_names {
            if fill_s0 {
                self.s0.push(source.h1(h, make_name(&[&bn, pf, "S0"]), "N", s.axis("S_{0}"))?);
            }
            if fill_s1 {
                self.s1.push(source.h1(h, make_name(&[&bn, pf, "S1"]), "N", s.axis("S_{1}"))?);
            }
            if fill_s1_vs_s0 {
                self.s1_vs_s0.push(source.h2(
                    h,
                    make_name(&[&bn, pf, "S1VsS0"]),
                    "N",
                    s.axis("S_{0}"),
                    s.axis("S_{1}"),
                )?);
            }
        }
        if correlations && n > 1 {
            self.s0_vs_s0 = vec![H2ID::default(); n_combinations(n - 1, 2)];
            for k1 in 0..n {
                for k2 in k1 + 1..n {
                    let (pf1, pf2) = (&self.filter_names[k1], &self.filter_names[k2]);
                    self.s0_vs_s0[index_for_combination(&[k1, k2 - 1], n - 1)] = source.h2(
                        h,
                        make_name(&[&bn, pf1, pf2, "S0VsS0"]),
                        "N",
                        s.axis(format!("S_{{0}}^{{{pf1}}}")),
                        s.axis(format!("S_{{0}}^{{{pf2}}}")),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Fill with the spherocities of one event, one entry per particle filter.
    pub fn fill(&mut self, s0: &[f64], s1: &[f64], weight: f64) {
        if !self.begin_fill() {
            return;
        }
        let n = self.filter_names.len();
        let needs_s0 = !(self.s0.is_empty() && self.s1_vs_s0.is_empty() && self.s0_vs_s0.is_empty());
        let needs_s1 = !(self.s1.is_empty() && self.s1_vs_s0.is_empty());
        if (needs_s0 && s0.len() < n) || (needs_s1 && s1.len() < n) {
            log::error!(
                "Group \"{}\" expects {n} spherocity values per estimator",
                self.histograms.name()
            );
            return;
        }
        let h = &mut self.histograms;
        for (&id, &value) in self.s0.iter().zip(s0) {
            h[id].fill(value, weight);
        }
        for (&id, &value) in self.s1.iter().zip(s1) {
            h[id].fill(value, weight);
        }
        for (k, &id) in self.s1_vs_s0.iter().enumerate() {
            h[id].fill(s0[k], s1[k], weight);
        }
        if self.s0_vs_s0.is_empty() {
            return;
        }
        for k1 in 0..n {
            for k2 in k1 + 1..n {
                let id = self.s0_vs_s0[index_for_combination(&[k1, k2 - 1], n - 1)];
                h[id].fill(s0[k1], s0[k2], weight);
            }
        }
    }
}

impl_histogram_group!(TransverseSpherocityHistos);
