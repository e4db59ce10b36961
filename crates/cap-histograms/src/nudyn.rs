use cap_core::{
    histograms::require_derivable, index_for_combination, make_name, make_name_indexed, Axis,
    AxisBinning, CapError, CapResult, Combinations, Configuration, GroupState, Histogram1D,
    HistogramCollection, HistogramGroup, MultiplicityType, H1ID,
};
use serde::{Deserialize, Serialize};

use crate::{merged_configuration, HistogramSource};

/// An integrated (single-bin) histogram and its multiplicity-differential partner.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct MomentIds {
    pub(crate) integrated: H1ID,
    pub(crate) vs_mult: H1ID,
}

impl MomentIds {
    fn get(&self, vs_mult: bool) -> H1ID {
        if vs_mult {
            self.vs_mult
        } else {
            self.integrated
        }
    }
}

/// Shape shared by the primary and derived groups, read from the configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct MomentLayout {
    n_filters: usize,
    multiplicity_type: MultiplicityType,
    pair_only: bool,
    mult: AxisBinning,
}

impl MomentLayout {
    fn from_configuration(configuration: &Configuration) -> CapResult<Self> {
        Ok(Self {
            n_filters: configuration.value_bins("nFilters"),
            multiplicity_type: MultiplicityType::from_code(
                configuration.value_int("multiplicityType"),
            )?,
            pair_only: configuration.value_bool("pairOnly"),
            mult: AxisBinning::from_configuration(configuration, "mult"),
        })
    }

    fn max_order(&self) -> usize {
        if self.pair_only {
            2
        } else {
            4
        }
    }

    fn axes(&self) -> (Axis, Axis) {
        let title = self.multiplicity_type.axis_title();
        (
            AxisBinning::new(1, self.mult.min, self.mult.max).axis(title),
            self.mult.axis(title),
        )
    }

    /// Create or load `bn_what_i1i2..` and `bn_what_i1i2.._vsMult` for every index tuple of
    /// `order` filters.
    fn build_family(
        &self,
        source: HistogramSource,
        h: &mut HistogramCollection,
        bn: &str,
        what: &str,
        order: usize,
    ) -> CapResult<Vec<MomentIds>> {
        let (integrated, vs_mult) = self.axes();
        let base = make_name(&[bn, what]);
        let suffix = self.multiplicity_type.suffix().trim_start_matches('_');
        Combinations::new(self.n_filters, order)
            .map(|tuple| {
                Ok(MomentIds {
                    integrated: source.h1(
                        h,
                        make_name_indexed(&base, &tuple, ""),
                        what,
                        integrated.clone(),
                    )?,
                    vs_mult: source.h1(
                        h,
                        make_name_indexed(&base, &tuple, suffix),
                        what,
                        vs_mult.clone(),
                    )?,
                })
            })
            .collect()
    }
}

fn nudyn_defaults(name: &str) -> Configuration {
    let mut configuration = Configuration::new(name);
    configuration.add_parameter("nFilters", 1);
    configuration.add_parameter("multiplicityType", 1);
    configuration.add_parameter("pairOnly", true);
    configuration.add_parameter("nBins_mult", 200);
    configuration.add_parameter("min_mult", 0.0);
    configuration.add_parameter("max_mult", 200.0);
    configuration
}

/// The factorial moment $`n_{i_1}(n_{i_2} - \delta_{i_1 i_2})\cdots`$ of one event for a
/// non-decreasing tuple of filter indices.
///
/// Each factor is lowered by the number of earlier indices equal to its own, which for
/// non-decreasing tuples are the immediately preceding ones.
pub fn factorial_moment(counts: &[f64], tuple: &[usize]) -> f64 {
    let mut product = 1.0;
    let mut repeats = 0.0;
    for (position, &index) in tuple.iter().enumerate() {
        if position > 0 && tuple[position - 1] == index {
            repeats += 1.0;
        } else {
            repeats = 0.0;
        }
        product *= counts[index] - repeats;
    }
    product
}

/// Event-averaged factorial moments $`f_1 \ldots f_4`$ of the accepted-particle counts of
/// several filters, integrated and as a function of the event multiplicity (or centrality).
///
/// `fill` accumulates weighted sums together with the sum of event weights per multiplicity
/// bin, and `freeze` turns the sums into per-event means.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NuDynHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    layout: Option<MomentLayout>,
    pub(crate) weights: MomentIds,
    /// `moments[k - 1]` holds the order-`k` moments in [`Combinations`] order.
    pub(crate) moments: Vec<Vec<MomentIds>>,
}

impl NuDynHistos {
    /// The parameters this group reads, with their default values.
    pub fn default_configuration() -> Configuration {
        nudyn_defaults("NuDynHistos")
    }

    pub fn new(name: &str, configuration: &Configuration) -> Self {
        Self {
            configuration: merged_configuration(name, Self::default_configuration(), configuration),
            histograms: HistogramCollection::new(name),
            layout: None,
            weights: MomentIds::default(),
            moments: Vec::new(),
        }
    }

    pub fn n_filters(&self) -> usize {
        self.layout.as_ref().map_or(0, |layout| layout.n_filters)
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let layout = MomentLayout::from_configuration(&self.configuration)?;
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        let (integrated, vs_mult) = layout.axes();
        let suffix = layout.multiplicity_type.suffix().trim_start_matches('_');
        self.weights = MomentIds {
            integrated: source.h1(h, make_name(&[&bn, "sumw"]), "#sum w", integrated)?,
            vs_mult: source.h1(h, make_name(&[&bn, "sumw", suffix]), "#sum w", vs_mult)?,
        };
        self.moments = (1..=layout.max_order())
            .map(|order| layout.build_family(source, h, &bn, &format!("f{order}"), order))
            .collect::<CapResult<Vec<_>>>()?;
        self.layout = Some(layout);
        Ok(())
    }

    /// Accumulate the factorial moments of one event with `counts[i]` particles accepted by
    /// filter `i`, at multiplicity (or centrality) `mult`.
    ///
    /// The integrated histograms take every event. The differential ones drop events whose
    /// `mult` is outside the configured range.
    pub fn fill(&mut self, mult: f64, counts: &[f64], weight: f64) {
        if !self.begin_fill() {
            return;
        }
        let Some(layout) = &self.layout else {
            return;
        };
        if counts.len() < layout.n_filters {
            log::error!(
                "Group \"{}\" expects {} particle counts, got {}",
                self.histograms.name(),
                layout.n_filters,
                counts.len()
            );
            return;
        }
        let h = &mut self.histograms;
        h[self.weights.integrated].add_bin_content(1, weight);
        h[self.weights.vs_mult].fill(mult, weight);
        for (order, family) in self.moments.iter().enumerate() {
            for (tuple, ids) in Combinations::new(layout.n_filters, order + 1).zip(family) {
                let value = weight * factorial_moment(counts, &tuple);
                h[ids.integrated].add_bin_content(1, value);
                h[ids.vs_mult].fill(mult, value);
            }
        }
    }

    fn finalize_means(&mut self) -> CapResult<()> {
        let h = &mut self.histograms;
        let integrated = h[self.weights.integrated].clone();
        let vs_mult = h[self.weights.vs_mult].clone();
        for ids in self.moments.iter().flatten() {
            to_means(&mut h[ids.integrated], &integrated);
            to_means(&mut h[ids.vs_mult], &vs_mult);
        }
        Ok(())
    }

    /// The mean moment of `tuple` (in any order) in `bin`.
    fn moment(&self, tuple: &[usize], vs_mult: bool, bin: usize) -> f64 {
        let mut key = [0; 4];
        let key = &mut key[..tuple.len()];
        key.copy_from_slice(tuple);
        key.sort_unstable();
        let ids = self.moments[tuple.len() - 1][index_for_combination(key, self.n_filters())];
        self.histograms[ids.get(vs_mult)].bin_content(bin)
    }
}

impl_histogram_group!(NuDynHistos, finalize = finalize_means);

fn to_means(sums: &mut Histogram1D, weights: &Histogram1D) {
    for bin in 1..=sums.n_bins() {
        let w = weights.bin_content(bin);
        if w > 0.0 {
            sums.set_bin_content(bin, sums.bin_content(bin) / w);
            sums.set_bin_error(bin, sums.bin_error(bin) / w);
        }
    }
}

/// The multivariate factorial cumulant of `tuple` given the factorial moments `f`.
fn factorial_cumulant(f: impl Fn(&[usize]) -> f64, tuple: &[usize]) -> f64 {
    match *tuple {
        [i, j] => f(&[i, j]) - f(&[i]) * f(&[j]),
        [i, j, k] => {
            f(&[i, j, k]) - f(&[i, j]) * f(&[k]) - f(&[i, k]) * f(&[j]) - f(&[j, k]) * f(&[i])
                + 2.0 * f(&[i]) * f(&[j]) * f(&[k])
        }
        [i, j, k, l] => {
            let (fi, fj, fk, fl) = (f(&[i]), f(&[j]), f(&[k]), f(&[l]));
            let (fij, fik, fil) = (f(&[i, j]), f(&[i, k]), f(&[i, l]));
            let (fjk, fjl, fkl) = (f(&[j, k]), f(&[j, l]), f(&[k, l]));
            f(&[i, j, k, l])
                - (f(&[i, j, k]) * fl + f(&[i, j, l]) * fk + f(&[i, k, l]) * fj
                    + f(&[j, k, l]) * fi)
                - (fij * fkl + fik * fjl + fil * fjk)
                + 2.0
                    * (fij * fk * fl
                        + fik * fj * fl
                        + fil * fj * fk
                        + fjk * fi * fl
                        + fjl * fi * fk
                        + fkl * fi * fj)
                - 6.0 * fi * fj * fk * fl
        }
        _ => f(tuple),
    }
}

/// Factorial cumulants $`F_k`$, normalized factorial moments $`R_k`$ and
/// $`\nu_{\text{dyn}}`$ computed from a frozen [`NuDynHistos`].
///
/// ```math
/// \nu_{\text{dyn}}^{(a,b)} = R_2^{(a,a)} + R_2^{(b,b)} - 2 R_2^{(a,b)}
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NuDynDerivedHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    layout: Option<MomentLayout>,
    /// `cumulants[k - 2]` holds $`F_k`$.
    pub(crate) cumulants: Vec<Vec<MomentIds>>,
    /// `normalized[k - 2]` holds $`R_k`$.
    pub(crate) normalized: Vec<Vec<MomentIds>>,
    pub(crate) nudyn: Vec<MomentIds>,
}

impl NuDynDerivedHistos {
    pub fn new(name: &str, configuration: &Configuration) -> Self {
        Self {
            configuration: merged_configuration(name, nudyn_defaults(name), configuration),
            histograms: HistogramCollection::new(name),
            layout: None,
            cumulants: Vec::new(),
            normalized: Vec::new(),
            nudyn: Vec::new(),
        }
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let layout = MomentLayout::from_configuration(&self.configuration)?;
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        self.cumulants = Vec::new();
        self.normalized = Vec::new();
        self.nudyn = layout.build_family(source, h, &bn, "nudyn", 2)?;
        for order in 2..=layout.max_order() {
            self.cumulants
                .push(layout.build_family(source, h, &bn, &format!("F{order}"), order)?);
            self.normalized
                .push(layout.build_family(source, h, &bn, &format!("R{order}"), order)?);
        }
        self.layout = Some(layout);
        Ok(())
    }

    /// Compute every cumulant of a frozen `base`.
    ///
    /// Bins in which one of the involved filters has a non-positive mean count are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::InvalidState`] unless `base` is frozen and this group freshly
    /// created, and [`CapError::DimensionMismatch`] if the two groups disagree on the number
    /// of filters, the moment orders or the multiplicity binning.
    pub fn calculate_derived_histograms(&mut self, base: &NuDynHistos) -> CapResult<()> {
        require_derivable(&[base.histograms()], &self.histograms)?;
        let (Some(layout), Some(base_layout)) = (&self.layout, &base.layout) else {
            return Err(CapError::InvalidState {
                group: self.histograms.name().to_string(),
                expected: GroupState::Created.to_string(),
                found: self.histograms.state().to_string(),
            });
        };
        if layout.n_filters != base_layout.n_filters
            || layout.max_order() > base_layout.max_order()
            || layout.mult != base_layout.mult
        {
            return Err(CapError::DimensionMismatch {
                name: self.histograms.name().to_string(),
            });
        }
        let n = layout.n_filters;
        let h = &mut self.histograms;
        for (vs_mult, n_bins) in [(false, 1), (true, layout.mult.n_bins)] {
            for bin in 1..=n_bins {
                let f = |tuple: &[usize]| base.moment(tuple, vs_mult, bin);
                let f1: Vec<f64> = (0..n).map(|i| f(&[i])).collect();
                let accepted = |tuple: &[usize]| tuple.iter().all(|&i| f1[i] > 0.0);
                for (family, (cumulants, normalized)) in
                    self.cumulants.iter().zip(&self.normalized).enumerate()
                {
                    let order = family + 2;
                    let ids = cumulants.iter().zip(normalized);
                    for (tuple, (c, r)) in Combinations::new(n, order).zip(ids) {
                        if !accepted(&tuple) {
                            continue;
                        }
                        let product: f64 = tuple.iter().map(|&i| f1[i]).product();
                        h[c.get(vs_mult)].set_bin_content(bin, factorial_cumulant(f, &tuple));
                        h[r.get(vs_mult)].set_bin_content(bin, f(&tuple) / product);
                    }
                }
                let r2 = |a: usize, b: usize| f(&[a, b]) / (f1[a] * f1[b]);
                for (tuple, ids) in Combinations::new(n, 2).zip(&self.nudyn) {
                    let (a, b) = (tuple[0], tuple[1]);
                    if a == b || !accepted(&tuple) {
                        continue;
                    }
                    h[ids.get(vs_mult)]
                        .set_bin_content(bin, r2(a, a) + r2(b, b) - 2.0 * r2(a, b));
                }
            }
        }
        self.histograms.set_state(GroupState::DerivedComputed);
        Ok(())
    }
}

impl_histogram_group!(NuDynDerivedHistos);
