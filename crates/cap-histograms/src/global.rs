use cap_core::{
    histograms::require_derivable, index_for_combination, make_name, n_combinations, AxisBinning,
    CapResult, Configuration, EventProperties, GroupState, HistogramCollection, HistogramGroup,
    H1ID, H2ID,
};
use serde::{Deserialize, Serialize};

use crate::{
    binops::{check_1d, set_bins_1d},
    merged_configuration, HistogramSource,
};

/// Per-filter distributions of one event-wide quantity.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct GlobalFilterIds {
    pub(crate) n: H1ID,
    pub(crate) e: H1ID,
    pub(crate) q: H1ID,
    pub(crate) s: H1ID,
    pub(crate) b: H1ID,
    /// $`\sum p_T`$ of the event, binned in the multiplicity.
    pub(crate) pt_sum_vs_n: H1ID,
    /// The multiplicity of the event, binned in itself.
    pub(crate) n_sum_vs_n: H1ID,
}

/// Correlations of two different filters' quantities with themselves.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct SameQuantityIds {
    pub(crate) n_vs_n: H2ID,
    pub(crate) e_vs_e: H2ID,
    pub(crate) q_vs_q: H2ID,
    pub(crate) b_vs_b: H2ID,
}

/// Correlations between different quantities of two (possibly equal) filters.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct CrossQuantityIds {
    pub(crate) e_vs_n: H2ID,
    pub(crate) q_vs_n: H2ID,
    pub(crate) b_vs_n: H2ID,
    pub(crate) q_vs_e: H2ID,
    pub(crate) b_vs_e: H2ID,
    pub(crate) b_vs_q: H2ID,
}

/// Event-wide multiplicity, energy, charge, strangeness and baryon-number distributions, one
/// set per particle filter.
///
/// With `fillCorrelationHistos` it also correlates the quantities of every pair of filters
/// `k1 <= k2`. Same-quantity correlations exist only for `k1 < k2`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    filter_names: Vec<String>,
    pub(crate) filters: Vec<GlobalFilterIds>,
    /// Indexed by the combination `(k1, k2 - 1)` of `n - 1` filters.
    pub(crate) same: Vec<SameQuantityIds>,
    /// Indexed by the combination `(k1, k2)` of `n` filters.
    pub(crate) cross: Vec<CrossQuantityIds>,
}

impl GlobalHistos {
    /// The parameters this group reads, with their default values.
    pub fn default_configuration() -> Configuration {
        let mut configuration = Configuration::new("GlobalHistos");
        configuration.add_parameter("fillCorrelationHistos", false);
        for (key, min, max) in [
            ("n", 0.0, 1000.0),
            ("e", 0.0, 1000.0),
            ("q", -50.0, 50.0),
            ("b", -50.0, 50.0),
        ] {
            configuration.add_parameter(format!("nBins_{key}"), 100);
            configuration.add_parameter(format!("nBins_{key}2"), 20);
            configuration.add_parameter(format!("min_{key}"), min);
            configuration.add_parameter(format!("max_{key}"), max);
        }
        configuration
    }

    /// Create an (uncreated) group for the particle filters named `filter_names`.
    pub fn new<S: AsRef<str>>(name: &str, configuration: &Configuration, filter_names: &[S]) -> Self {
        Self {
            configuration: merged_configuration(name, Self::default_configuration(), configuration),
            histograms: HistogramCollection::new(name),
            filter_names: filter_names.iter().map(|s| s.as_ref().to_string()).collect(),
            filters: Vec::new(),
            same: Vec::new(),
            cross: Vec::new(),
        }
    }

    pub fn n_filters(&self) -> usize {
        self.filter_names.len()
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let c = &self.configuration;
        let correlations = c.value_bool("fillCorrelationHistos");
        let binning = |key: &str| AxisBinning::from_configuration(c, key);
        let coarse = |key: &str| {
            let fine = binning(key);
            AxisBinning::new(c.value_bins(&format!("nBins_{key}2")), fine.min, fine.max)
        };
        let (n, e, q, b) = (binning("n"), binning("e"), binning("q"), binning("b"));
        let (n2, e2, q2, b2) = (coarse("n"), coarse("e"), coarse("q"), coarse("b"));
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        let n_filters = self.filter_names.len();

        self.filters = Vec::with_capacity(n_filters);
        for pf in &self.filter_names {
            let name = |what: &str| make_name(&[&bn, pf, what]);
            self.filters.push(GlobalFilterIds {
                n: source.h1(h, name("n"), "N", n.axis("n"))?,
                e: source.h1(h, name("e"), "N", e.axis("e"))?,
                q: source.h1(h, name("q"), "N", q.axis("q"))?,
                s: source.h1(h, name("s"), "N", b.axis("s"))?,
                b: source.h1(h, name("b"), "N", b.axis("b"))?,
                pt_sum_vs_n: source.h1(h, name("ptSumVsN"), "#sum p_{T}", n.axis("n"))?,
                n_sum_vs_n: source.h1(h, name("nSumVsN"), "#sum n", n.axis("n"))?,
            });
        }

        self.same = Vec::new();
        self.cross = Vec::new();
        if !correlations || n_filters == 0 {
            return Ok(());
        }
        self.same = vec![SameQuantityIds::default(); n_combinations(n_filters - 1, 2)];
        self.cross = vec![CrossQuantityIds::default(); n_combinations(n_filters, 2)];
        for k1 in 0..n_filters {
            for k2 in k1..n_filters {
                let (pf1, pf2) = (&self.filter_names[k1], &self.filter_names[k2]);
                let name = |x: &str, y: &str| make_name(&[&bn, pf1, x, pf2, y]);
                if k1 != k2 {
                    self.same[index_for_combination(&[k1, k2 - 1], n_filters - 1)] =
                        SameQuantityIds {
                            n_vs_n: source.h2(h, name("n", "n"), "N", n2.axis("n"), n2.axis("n"))?,
                            e_vs_e: source.h2(h, name("e", "e"), "N", e2.axis("e"), e2.axis("e"))?,
                            q_vs_q: source.h2(h, name("q", "q"), "N", q2.axis("q"), q2.axis("q"))?,
                            b_vs_b: source.h2(h, name("b", "b"), "N", b2.axis("b"), b2.axis("b"))?,
                        };
                }
                self.cross[index_for_combination(&[k1, k2], n_filters)] = CrossQuantityIds {
                    e_vs_n: source.h2(h, name("n", "e"), "N", n2.axis("n"), e2.axis("e"))?,
                    q_vs_n: source.h2(h, name("n", "q"), "N", n2.axis("n"), q2.axis("q"))?,
                    b_vs_n: source.h2(h, name("n", "b"), "N", n2.axis("n"), b2.axis("b"))?,
                    q_vs_e: source.h2(h, name("e", "q"), "N", e2.axis("e"), q2.axis("q"))?,
                    b_vs_e: source.h2(h, name("e", "b"), "N", e2.axis("e"), b2.axis("b"))?,
                    b_vs_q: source.h2(h, name("q", "b"), "N", q2.axis("q"), b2.axis("b"))?,
                };
            }
        }
        Ok(())
    }

    /// Fill with the per-filter sums of one event.
    ///
    /// `properties` must hold one entry per particle filter in each of its filtered vectors
    /// (see [`EventProperties::fill_filtered`]); otherwise the event is logged and skipped.
    pub fn fill(&mut self, properties: &EventProperties, weight: f64) {
        if !self.begin_fill() {
            return;
        }
        let n_filters = self.filter_names.len();
        let EventProperties {
            n_filtered: n,
            pt_filtered: pt,
            e_filtered: e,
            q_filtered: q,
            s_filtered: s,
            b_filtered: b,
            ..
        } = properties;
        if [n, pt, e, q, s, b].iter().any(|v| v.len() < n_filters) {
            log::error!(
                "Group \"{}\" expects {n_filters} filtered values per quantity, skipping event",
                self.histograms.name()
            );
            return;
        }
        let h = &mut self.histograms;
        for (k, ids) in self.filters.iter().enumerate() {
            h[ids.n].fill(n[k], weight);
            h[ids.e].fill(e[k], weight);
            h[ids.q].fill(q[k], weight);
            h[ids.s].fill(s[k], weight);
            h[ids.b].fill(b[k], weight);
            h[ids.pt_sum_vs_n].fill(n[k], weight * pt[k]);
            h[ids.n_sum_vs_n].fill(n[k], weight * n[k]);
        }
        if self.cross.is_empty() {
            return;
        }
        for k1 in 0..n_filters {
            for k2 in k1..n_filters {
                if k1 != k2 {
                    let ids = self.same[index_for_combination(&[k1, k2 - 1], n_filters - 1)];
                    h[ids.n_vs_n].fill(n[k1], n[k2], weight);
                    h[ids.e_vs_e].fill(e[k1], e[k2], weight);
                    h[ids.q_vs_q].fill(q[k1], q[k2], weight);
                    h[ids.b_vs_b].fill(b[k1], b[k2], weight);
                }
                let ids = self.cross[index_for_combination(&[k1, k2], n_filters)];
                h[ids.e_vs_n].fill(n[k1], e[k2], weight);
                h[ids.q_vs_n].fill(n[k1], q[k2], weight);
                h[ids.b_vs_n].fill(n[k1], b[k2], weight);
                h[ids.q_vs_e].fill(e[k1], q[k2], weight);
                h[ids.b_vs_e].fill(e[k1], b[k2], weight);
                h[ids.b_vs_q].fill(q[k1], b[k2], weight);
            }
        }
    }
}

impl_histogram_group!(GlobalHistos);

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct AveragePtIds {
    pub(crate) incl: H1ID,
    pub(crate) incl_vs_n: H1ID,
}

/// Inclusive average transverse momenta computed from a frozen [`GlobalHistos`].
///
/// Per filter, `ptAvgIncl` holds $`\sum p_T / \sum n`$ over all events in a single bin and
/// `ptAvgInclVsN` the same ratio for the events of each multiplicity bin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalDerivedHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    filter_names: Vec<String>,
    pub(crate) filters: Vec<AveragePtIds>,
}

impl GlobalDerivedHistos {
    pub fn new<S: AsRef<str>>(name: &str, configuration: &Configuration, filter_names: &[S]) -> Self {
        Self {
            configuration: merged_configuration(
                name,
                GlobalHistos::default_configuration(),
                configuration,
            ),
            histograms: HistogramCollection::new(name),
            filter_names: filter_names.iter().map(|s| s.as_ref().to_string()).collect(),
            filters: Vec::new(),
        }
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let n = AxisBinning::from_configuration(&self.configuration, "n");
        let integrated = AxisBinning::new(1, n.min, n.max);
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        self.filters = Vec::with_capacity(self.filter_names.len());
        for pf in &self.filter_names {
            self.filters.push(AveragePtIds {
                incl: source.h1(
                    h,
                    make_name(&[&bn, pf, "ptAvgIncl"]),
                    "<p_{T}>",
                    integrated.axis("n"),
                )?,
                incl_vs_n: source.h1(
                    h,
                    make_name(&[&bn, pf, "ptAvgInclVsN"]),
                    "<p_{T}>",
                    n.axis("n"),
                )?,
            });
        }
        Ok(())
    }

    /// Compute the average transverse momenta of a frozen `base`.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::InvalidState`](cap_core::CapError::InvalidState) unless `base` is
    /// frozen and this group freshly created, and
    /// [`CapError::DimensionMismatch`](cap_core::CapError::DimensionMismatch) if the groups
    /// disagree on the filters or the multiplicity binning.
    pub fn calculate_derived_histograms(&mut self, base: &GlobalHistos) -> CapResult<()> {
        require_derivable(&[base.histograms()], &self.histograms)?;
        if base.filters.len() != self.filters.len() {
            return Err(cap_core::CapError::DimensionMismatch {
                name: self.histograms.name().to_string(),
            });
        }
        let source = base.histograms();
        let h = &mut self.histograms;
        for (ids, base_ids) in self.filters.iter().zip(&base.filters) {
            let pt_sum = &source[base_ids.pt_sum_vs_n];
            let n_sum = &source[base_ids.n_sum_vs_n];
            check_1d(&h[ids.incl_vs_n], pt_sum)?;
            set_bins_1d(&mut h[ids.incl_vs_n], |bin| {
                let d = n_sum.bin_content(bin);
                (d > 0.0).then(|| pt_sum.bin_content(bin) / d)
            });
            let total = n_sum.integral();
            if total > 0.0 {
                h[ids.incl].set_bin_content(1, pt_sum.integral() / total);
            }
        }
        self.histograms.set_state(GroupState::DerivedComputed);
        Ok(())
    }
}

impl_histogram_group!(GlobalDerivedHistos);

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cap_core::{CapError, HistogramStore};

    use super::*;

    fn properties(n: &[f64], pt: &[f64]) -> EventProperties {
        EventProperties {
            n_filtered: n.to_vec(),
            pt_filtered: pt.to_vec(),
            e_filtered: n.iter().map(|v| 2.0 * v).collect(),
            q_filtered: vec![1.0; n.len()],
            s_filtered: vec![0.0; n.len()],
            b_filtered: vec![-1.0; n.len()],
            ..Default::default()
        }
    }

    fn correlated() -> Configuration {
        let mut configuration = Configuration::new("test");
        configuration.add_parameter("fillCorrelationHistos", true);
        configuration.add_parameter("nBins_n", 10);
        configuration.add_parameter("max_n", 10.0);
        configuration
    }

    #[test]
    fn test_correlation_catalogue() {
        let mut histos = GlobalHistos::new("G", &correlated(), &["A", "B", "C"]);
        histos.create_histograms().unwrap();
        // 3 filters: 7 1D each, 3 same-quantity sets of 4, 6 cross-quantity sets of 6
        assert_eq!(histos.histograms().n_histograms(), 3 * 7 + 3 * 4 + 6 * 6);
        assert!(histos.histograms().find_2d("G_A_n_C_n").is_some());
        assert!(histos.histograms().find_2d("G_A_n_A_n").is_none());
        assert!(histos.histograms().find_2d("G_B_q_B_b").is_some());
    }

    #[test]
    fn test_fill_indexes_filter_pairs() {
        let mut histos = GlobalHistos::new("G", &correlated(), &["A", "B", "C"]);
        histos.create_histograms().unwrap();
        histos.fill(&properties(&[1.5, 2.5, 3.5], &[1.0, 2.0, 3.0]), 1.0);
        let h = histos.histograms();
        let ac = histos.same[index_for_combination(&[0, 1], 2)];
        assert_eq!(h[ac.n_vs_n].name(), "G_A_n_C_n");
        assert_relative_eq!(h[ac.n_vs_n].integral(), 1.0);
        let bc = histos.cross[index_for_combination(&[1, 2], 3)];
        assert_eq!(h[bc.e_vs_n].name(), "G_B_n_C_e");
        let (ix, iy) = h[bc.e_vs_n].get_bin(2.5, 7.0);
        assert_relative_eq!(h[bc.e_vs_n].bin_content(ix, iy), 1.0);
        let a = histos.filters[0];
        assert_relative_eq!(h[a.n].bin_content(2), 1.0);
        assert_relative_eq!(h[a.pt_sum_vs_n].bin_content(2), 1.0);
        assert_relative_eq!(h[a.n_sum_vs_n].bin_content(2), 1.5);
    }

    #[test]
    fn test_short_properties_are_skipped() {
        let mut histos = GlobalHistos::new("G", &correlated(), &["A", "B"]);
        histos.create_histograms().unwrap();
        histos.fill(&properties(&[1.0], &[1.0]), 1.0);
        assert_relative_eq!(histos.histograms()[histos.filters[0].n].integral(), 0.0);
    }

    #[test]
    fn test_average_pt() {
        let mut histos = GlobalHistos::new("G", &correlated(), &["A"]);
        histos.create_histograms().unwrap();
        histos.fill(&properties(&[2.0], &[1.0]), 1.0);
        histos.fill(&properties(&[2.0], &[3.0]), 1.0);
        histos.fill(&properties(&[4.0], &[6.0]), 1.0);
        histos.freeze(None).unwrap();
        let mut derived = GlobalDerivedHistos::new("GD", &correlated(), &["A"]);
        derived.create_histograms().unwrap();
        derived.calculate_derived_histograms(&histos).unwrap();
        let h = derived.histograms();
        let ids = derived.filters[0];
        assert_relative_eq!(h[ids.incl_vs_n].bin_content(3), 1.0);
        assert_relative_eq!(h[ids.incl_vs_n].bin_content(5), 1.5);
        assert_relative_eq!(h[ids.incl_vs_n].bin_content(1), 0.0);
        assert_relative_eq!(h[ids.incl].bin_content(1), 10.0 / 8.0);

        let mut mismatched = GlobalDerivedHistos::new("GD", &correlated(), &["A", "B"]);
        mismatched.create_histograms().unwrap();
        assert!(matches!(
            mismatched.calculate_derived_histograms(&histos),
            Err(CapError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_load_requires_correlations() {
        let mut histos = GlobalHistos::new("G", &Configuration::new("plain"), &["A", "B"]);
        histos.create_histograms().unwrap();
        histos.freeze(None).unwrap();
        let mut store = HistogramStore::new();
        histos.save_histograms(&mut store);
        let mut loaded = GlobalHistos::new("G", &Configuration::new("plain"), &["A", "B"]);
        loaded.load_histograms(&store).unwrap();
        assert_eq!(loaded.filters.len(), 2);
        let mut with_correlations = GlobalHistos::new("G", &correlated(), &["A", "B"]);
        assert!(matches!(
            with_correlations.load_histograms(&store),
            Err(CapError::HistogramNotFound { .. })
        ));
    }
}
