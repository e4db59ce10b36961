use cap_core::{
    histograms::require_derivable, make_name, Axis, AxisBinning, BinningSet, CapError, CapResult,
    Configuration, GroupState, Histogram1D, Histogram2D, HistogramCollection, HistogramGroup,
    ParticleDigit, H1ID, H2ID, TWO_PI,
};
use serde::{Deserialize, Serialize};

use crate::{
    binops::{check_2d, outer_product, set_bins_2d},
    merged_configuration,
    particle::{ParticleDerivedHistos, ParticleHistos},
    HistogramSource,
};

/// Names and titles of one longitudinal variable ($`\eta`$ or $`y`$) paired with $`\varphi`$.
#[derive(Clone, Copy, Debug)]
struct Longitudinal {
    rapidity: bool,
    grid: &'static str,
    delta_grid: &'static str,
    title: &'static str,
    delta_title: &'static str,
    n1_map: &'static str,
    spt_map: &'static str,
    n1: &'static str,
    spt: &'static str,
}

const ETA: Longitudinal = Longitudinal {
    rapidity: false,
    grid: "etaEta",
    delta_grid: "DetaDphi",
    title: "#eta",
    delta_title: "#Delta#eta",
    n1_map: "n1_phiEta",
    spt_map: "spt_phiEta",
    n1: "n1_eta",
    spt: "sumpt1_eta",
};

const RAPIDITY: Longitudinal = Longitudinal {
    rapidity: true,
    grid: "yY",
    delta_grid: "DyDphi",
    title: "y",
    delta_title: "#Delta y",
    n1_map: "n1_phiY",
    spt_map: "spt_phiY",
    n1: "n1_y",
    spt: "sumpt1_y",
};

/// The $`\Delta\varphi`$ axis: one bin per $`\varphi`$ bin, centered on zero. The shifted
/// axis is rotated down by a quarter turn so that the near side sits in the middle.
fn delta_phi_axis(phi: &AxisBinning, shifted: bool) -> Axis {
    let n_bins = phi.n_bins;
    let width = TWO_PI / n_bins as f64;
    let shift = if shifted {
        width * (n_bins / 4) as f64
    } else {
        0.0
    };
    let min = -width / 2.0 - shift;
    Axis::new(n_bins, min, min + TWO_PI, "#Delta#varphi")
}

/// The axis of a difference of two variables binned with `x`.
fn delta_axis(x: &AxisBinning, title: &str) -> Axis {
    Axis::new(
        (2 * x.n_bins).saturating_sub(1),
        x.min - x.max,
        x.max - x.min,
        title,
    )
}

fn required<T>(id: Option<T>, group: &str, histogram: &str) -> CapResult<T> {
    id.ok_or_else(|| CapError::HistogramNotFound {
        name: make_name(&[group, histogram]),
    })
}

/// Fold the product of two $`(x, \varphi)`$ densities onto the $`(\Delta x, \Delta\varphi)`$
/// grid, with the same index arithmetic as [`ParticlePairHistos::fill`].
fn reduce_to_delta(a: &Histogram2D, b: &Histogram2D, out: &mut Histogram2D) -> CapResult<()> {
    check_2d(a, b)?;
    let (n_x, n_phi) = (a.n_bins_x(), a.n_bins_y());
    if out.n_bins_x() != (2 * n_x).saturating_sub(1) || out.n_bins_y() != n_phi {
        return Err(CapError::DimensionMismatch {
            name: out.name().to_string(),
        });
    }
    for i_phi1 in 1..=n_phi {
        for i_x1 in 1..=n_x {
            let v1 = a.bin_content(i_x1, i_phi1);
            if v1 == 0.0 {
                continue;
            }
            for i_phi2 in 1..=n_phi {
                let i_dphi = (i_phi1 + n_phi - i_phi2) % n_phi + 1;
                for i_x2 in 1..=n_x {
                    out.add_bin_content(i_x1 + n_x - i_x2, i_dphi, v1 * b.bin_content(i_x2, i_phi2));
                }
            }
        }
    }
    Ok(())
}

/// Copy `source` into `out`, rotating the $`\Delta\varphi`$ (y) axis by a quarter of its bins.
fn shift_delta_phi(source: &Histogram2D, out: &mut Histogram2D) -> CapResult<()> {
    if source.n_bins_x() != out.n_bins_x() || source.n_bins_y() != out.n_bins_y() {
        return Err(CapError::DimensionMismatch {
            name: out.name().to_string(),
        });
    }
    let n_phi = source.n_bins_y();
    let quarter = n_phi / 4;
    for i_phi in 1..=n_phi {
        let shifted = (i_phi - 1 + quarter) % n_phi + 1;
        for ix in 1..=source.n_bins_x() {
            out.set_bin_content(ix, shifted, source.bin_content(ix, i_phi));
            out.set_bin_error(ix, shifted, source.bin_error(ix, i_phi));
        }
    }
    Ok(())
}

/// The longitudinal pair densities of a [`ParticlePairHistos`].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct LongitudinalPairIds {
    pub(crate) n2_xx: H2ID,
    pub(crate) n2_dxdphi: H2ID,
    pub(crate) ptpt_xx: Option<H2ID>,
    pub(crate) ptpt_dxdphi: Option<H2ID>,
}

impl LongitudinalPairIds {
    fn build(
        source: HistogramSource,
        h: &mut HistogramCollection,
        bn: &str,
        l: &Longitudinal,
        x: &AxisBinning,
        phi: &AxisBinning,
        fill_p2: bool,
    ) -> CapResult<Self> {
        let x1 = || x.axis(format!("{}_{{1}}", l.title));
        let x2 = || x.axis(format!("{}_{{2}}", l.title));
        let dx = || delta_axis(x, l.delta_title);
        let dphi = || delta_phi_axis(phi, false);
        let n2_xx = source.h2(h, make_name(&[bn, "n2", l.grid]), "N_{2}", x1(), x2())?;
        let n2_dxdphi = source.h2(h, make_name(&[bn, "n2", l.delta_grid]), "N_{2}", dx(), dphi())?;
        let (ptpt_xx, ptpt_dxdphi) = if fill_p2 {
            (
                Some(source.h2(h, make_name(&[bn, "ptpt", l.grid]), "p_{T}p_{T}", x1(), x2())?),
                Some(source.h2(
                    h,
                    make_name(&[bn, "ptpt", l.delta_grid]),
                    "p_{T}p_{T}",
                    dx(),
                    dphi(),
                )?),
            )
        } else {
            (None, None)
        };
        Ok(Self {
            n2_xx,
            n2_dxdphi,
            ptpt_xx,
            ptpt_dxdphi,
        })
    }
}

/// Two-particle densities for one (event filter, particle filter 1, particle filter 2)
/// combination.
///
/// Pairs are binned in $`(p_{T,1}, p_{T,2})`$ and $`(\varphi_1, \varphi_2)`$, and with
/// `fillEta` (`fillY`) in $`(\eta_1, \eta_2)`$ and $`(\Delta\eta, \Delta\varphi)`$
/// ($`(y_1, y_2)`$ and $`(\Delta y, \Delta\varphi)`$). `fillP2` adds the matching
/// $`p_{T,1}p_{T,2}`$-weighted sums.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticlePairHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    binning: BinningSet,
    pub(crate) n2: H1ID,
    pub(crate) n2_ptpt: H2ID,
    pub(crate) n2_phi_phi: H2ID,
    pub(crate) ptpt_phi_phi: Option<H2ID>,
    pub(crate) eta: Option<LongitudinalPairIds>,
    pub(crate) y: Option<LongitudinalPairIds>,
}

impl ParticlePairHistos {
    /// The parameters this group reads, with their default values.
    pub fn default_configuration() -> Configuration {
        let mut configuration = Configuration::new("ParticlePairHistos");
        configuration.add_parameter("nBins_n1", 100);
        configuration.add_parameter("min_n1", 0.0);
        configuration.add_parameter("max_n1", 100.0);
        configuration.add_parameter("nBins_pt", 18);
        configuration.add_parameter("min_pt", 0.2);
        configuration.add_parameter("max_pt", 2.0);
        configuration.add_parameter("nBins_phi", 72);
        configuration.add_parameter("min_phi", 0.0);
        configuration.add_parameter("max_phi", TWO_PI);
        configuration.add_parameter("nBins_eta", 20);
        configuration.add_parameter("min_eta", -1.0);
        configuration.add_parameter("max_eta", 1.0);
        configuration.add_parameter("nBins_y", 20);
        configuration.add_parameter("min_y", -1.0);
        configuration.add_parameter("max_y", 1.0);
        configuration.add_parameter("nBins_n2", 100);
        configuration.add_parameter("min_n2", 0.0);
        configuration.add_parameter("max_n2", 1000.0);
        configuration.add_parameter("fillEta", true);
        configuration.add_parameter("fillY", false);
        configuration.add_parameter("fillP2", false);
        configuration
    }

    pub fn new(name: &str, configuration: &Configuration) -> Self {
        let configuration = merged_configuration(name, Self::default_configuration(), configuration);
        let binning = BinningSet::from_configuration(&configuration);
        Self {
            configuration,
            histograms: HistogramCollection::new(name),
            binning,
            n2: H1ID::default(),
            n2_ptpt: H2ID::default(),
            n2_phi_phi: H2ID::default(),
            ptpt_phi_phi: None,
            eta: None,
            y: None,
        }
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let c = &self.configuration;
        let fill_eta = c.value_bool("fillEta");
        let fill_y = c.value_bool("fillY");
        let fill_p2 = c.value_bool("fillP2");
        self.binning = BinningSet::from_configuration(c);
        let n2 = AxisBinning::from_configuration(c, "n2");
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        let BinningSet { pt, phi, eta, y } = &self.binning;

        self.n2 = source.h1(h, make_name(&[&bn, "n2"]), "n_{2}", n2.axis("n_{2}"))?;
        self.n2_ptpt = source.h2(
            h,
            make_name(&[&bn, "n2_ptpt"]),
            "N_{2}",
            pt.axis("p_{T,1}"),
            pt.axis("p_{T,2}"),
        )?;
        self.n2_phi_phi = source.h2(
            h,
            make_name(&[&bn, "n2_phiPhi"]),
            "N_{2}",
            phi.axis("#varphi_{1}"),
            phi.axis("#varphi_{2}"),
        )?;
        self.ptpt_phi_phi = if fill_p2 {
            Some(source.h2(
                h,
                make_name(&[&bn, "ptpt_phiPhi"]),
                "p_{T}p_{T}",
                phi.axis("#varphi_{1}"),
                phi.axis("#varphi_{2}"),
            )?)
        } else {
            None
        };
        self.eta = if fill_eta {
            Some(LongitudinalPairIds::build(source, h, &bn, &ETA, eta, phi, fill_p2)?)
        } else {
            None
        };
        self.y = if fill_y {
            Some(LongitudinalPairIds::build(source, h, &bn, &RAPIDITY, y, phi, fill_p2)?)
        } else {
            None
        };
        Ok(())
    }

    /// Fill with all pairs of `digits1` × `digits2`.
    ///
    /// With `same` both lists hold the same particles: each unordered pair is visited once,
    /// self-pairs never occur, and the pair is deposited in both orders. Otherwise the fill
    /// is directional. `n2` receives the number of pairs deposited.
    pub fn fill(
        &mut self,
        digits1: &[ParticleDigit],
        digits2: &[ParticleDigit],
        same: bool,
        weight: f64,
    ) {
        if !self.begin_fill() {
            return;
        }
        let mut n_pairs = 0.0;
        for (i1, d1) in digits1.iter().enumerate() {
            let start = if same { i1 + 1 } else { 0 };
            for d2 in digits2.iter().skip(start) {
                n_pairs += 1.0;
                self.fill_pair(d1, d2, weight);
                if same {
                    n_pairs += 1.0;
                    self.fill_pair(d2, d1, weight);
                }
            }
        }
        let mut ids = vec![self.n2_ptpt, self.n2_phi_phi];
        ids.extend(self.ptpt_phi_phi);
        for l in [self.eta, self.y].into_iter().flatten() {
            ids.extend([l.n2_xx, l.n2_dxdphi]);
            ids.extend(l.ptpt_xx);
            ids.extend(l.ptpt_dxdphi);
        }
        for id in ids {
            let entries = self.histograms[id].entries();
            self.histograms[id].set_entries(entries + n_pairs);
        }
        self.histograms[self.n2].fill(n_pairs, weight);
    }

    fn fill_pair(&mut self, d1: &ParticleDigit, d2: &ParticleDigit, weight: f64) {
        let pt_weight = weight * d1.pt * d2.pt;
        if d1.i_pt > 0 && d2.i_pt > 0 {
            self.histograms[self.n2_ptpt].add_bin_content(d1.i_pt as usize, d2.i_pt as usize, weight);
        }
        if d1.i_phi <= 0 || d2.i_phi <= 0 {
            return;
        }
        let (i_phi1, i_phi2) = (d1.i_phi as usize, d2.i_phi as usize);
        self.histograms[self.n2_phi_phi].add_bin_content(i_phi1, i_phi2, weight);
        if let Some(id) = self.ptpt_phi_phi {
            self.histograms[id].add_bin_content(i_phi1, i_phi2, pt_weight);
        }
        let n_phi = self.binning.phi.n_bins as i32;
        let i_dphi = (d1.i_phi - d2.i_phi).rem_euclid(n_phi) as usize + 1;
        let planes = [
            (self.eta, d1.i_eta, d2.i_eta, self.binning.eta.n_bins as i32),
            (self.y, d1.i_y, d2.i_y, self.binning.y.n_bins as i32),
        ];
        for (ids, x1, x2, n_x) in planes {
            let Some(ids) = ids else { continue };
            if x1 <= 0 || x2 <= 0 {
                continue;
            }
            let i_dx = (x1 - x2 + n_x) as usize;
            let (x1, x2) = (x1 as usize, x2 as usize);
            self.histograms[ids.n2_xx].add_bin_content(x1, x2, weight);
            self.histograms[ids.n2_dxdphi].add_bin_content(i_dx, i_dphi, weight);
            if let Some(id) = ids.ptpt_xx {
                self.histograms[id].add_bin_content(x1, x2, pt_weight);
            }
            if let Some(id) = ids.ptpt_dxdphi {
                self.histograms[id].add_bin_content(i_dx, i_dphi, pt_weight);
            }
        }
    }
}

impl_histogram_group!(ParticlePairHistos);

/// Scale factors shared by the correlators of one derived calculation.
#[derive(Clone, Copy, Debug)]
struct Normalization {
    bin_correction: f64,
    /// $`\langle p_T\rangle_1 \langle p_T\rangle_2`$
    pt_product: f64,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct MomentumCorrelators {
    pub(crate) pt1pt1: H2ID,
    pub(crate) dptdpt: H2ID,
    pub(crate) p2: H2ID,
    pub(crate) g2: H2ID,
}

/// $`R_2`$ and, with `fillP2`, the transverse-momentum correlators on one two-particle grid.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct Correlators {
    pub(crate) n1n1: H2ID,
    pub(crate) r2: H2ID,
    pub(crate) momentum: Option<MomentumCorrelators>,
}

impl Correlators {
    fn build(
        source: HistogramSource,
        h: &mut HistogramCollection,
        bn: &str,
        grid: &str,
        x: Axis,
        y: Axis,
        with_momentum: bool,
    ) -> CapResult<Self> {
        let n1n1 = source.h2(
            h,
            make_name(&[bn, "n1n1", grid]),
            "<n_{1}><n_{1}>",
            x.clone(),
            y.clone(),
        )?;
        let r2 = source.h2(h, make_name(&[bn, "R2", grid]), "R_{2}", x.clone(), y.clone())?;
        let momentum = if with_momentum {
            Some(MomentumCorrelators {
                pt1pt1: source.h2(
                    h,
                    make_name(&[bn, "pt1pt1", grid]),
                    "<p_{T}><p_{T}>",
                    x.clone(),
                    y.clone(),
                )?,
                dptdpt: source.h2(
                    h,
                    make_name(&[bn, "DptDpt", grid]),
                    "<#Delta p_{T} #Delta p_{T}>",
                    x.clone(),
                    y.clone(),
                )?,
                p2: source.h2(h, make_name(&[bn, "P2", grid]), "P_{2}", x.clone(), y.clone())?,
                g2: source.h2(h, make_name(&[bn, "G2", grid]), "G_{2}", x, y)?,
            })
        } else {
            None
        };
        Ok(Self { n1n1, r2, momentum })
    }

    /// Fill $`R_2`$ (and the momentum correlators) from the pair sums, given that `n1n1` (and
    /// `pt1pt1`) already hold the products of the single densities.
    fn compute(
        &self,
        h: &mut HistogramCollection,
        n2: &Histogram2D,
        ptpt: Option<&Histogram2D>,
        norm: Normalization,
    ) -> CapResult<()> {
        check_2d(&h[self.n1n1], n2)?;
        let n1n1 = h[self.n1n1].clone();
        let bc = norm.bin_correction;
        set_bins_2d(&mut h[self.r2], |ix, iy| {
            let d = n1n1.bin_content(ix, iy);
            (d > 0.0).then(|| bc * n2.bin_content(ix, iy) / d - 1.0)
        });
        let (Some(m), Some(ptpt)) = (self.momentum, ptpt) else {
            return Ok(());
        };
        check_2d(&n1n1, ptpt)?;
        let pt1pt1 = h[m.pt1pt1].clone();
        let dptdpt = |ix: usize, iy: usize| {
            let d = n1n1.bin_content(ix, iy);
            (d > 0.0).then(|| {
                bc * ptpt.bin_content(ix, iy)
                    - bc * n2.bin_content(ix, iy) * pt1pt1.bin_content(ix, iy) / d
            })
        };
        set_bins_2d(&mut h[m.dptdpt], &dptdpt);
        let pt_product = norm.pt_product;
        if pt_product > 0.0 {
            set_bins_2d(&mut h[m.p2], |ix, iy| {
                dptdpt(ix, iy).map(|v| v / n1n1.bin_content(ix, iy) / pt_product)
            });
            set_bins_2d(&mut h[m.g2], |ix, iy| {
                let d = n1n1.bin_content(ix, iy);
                (d > 0.0).then(|| {
                    (bc * ptpt.bin_content(ix, iy) - pt1pt1.bin_content(ix, iy)) / d / pt_product
                })
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct ShiftedMomentum {
    pub(crate) dptdpt: H2ID,
    pub(crate) p2: H2ID,
    pub(crate) g2: H2ID,
}

/// Copies of the $`\Delta\varphi`$ grids on the shifted axis.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct ShiftedCorrelators {
    pub(crate) r2: H2ID,
    pub(crate) rho2: H2ID,
    pub(crate) b2ab: H2ID,
    pub(crate) b2ba: H2ID,
    pub(crate) momentum: Option<ShiftedMomentum>,
}

/// The correlators of one longitudinal variable: the $`(x_1, x_2)`$ grid, the
/// $`(\Delta x, \Delta\varphi)`$ grid with its balance-function ingredients, and their
/// shifted copies.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct DeltaCorrelators {
    pub(crate) xx: Correlators,
    pub(crate) dxdphi: Correlators,
    pub(crate) rho2: H2ID,
    pub(crate) b2ab: H2ID,
    pub(crate) b2ba: H2ID,
    pub(crate) shifted: ShiftedCorrelators,
}

impl DeltaCorrelators {
    fn build(
        source: HistogramSource,
        h: &mut HistogramCollection,
        bn: &str,
        l: &Longitudinal,
        x: &AxisBinning,
        phi: &AxisBinning,
        with_momentum: bool,
    ) -> CapResult<Self> {
        let xx = Correlators::build(
            source,
            h,
            bn,
            l.grid,
            x.axis(format!("{}_{{1}}", l.title)),
            x.axis(format!("{}_{{2}}", l.title)),
            with_momentum,
        )?;
        let dx = delta_axis(x, l.delta_title);
        let dphi = delta_phi_axis(phi, false);
        let dxdphi =
            Correlators::build(source, h, bn, l.delta_grid, dx.clone(), dphi.clone(), with_momentum)?;
        let delta = |h: &mut HistogramCollection, what: &str, title: &str| {
            source.h2(h, make_name(&[bn, what, l.delta_grid]), title, dx.clone(), dphi.clone())
        };
        let rho2 = delta(h, "rho2", "#rho_{2}")?;
        let b2ab = delta(h, "B2AB", "B_{2}^{A|B}")?;
        let b2ba = delta(h, "B2BA", "B_{2}^{B|A}")?;
        let dphi_shft = delta_phi_axis(phi, true);
        let shifted = |h: &mut HistogramCollection, what: &str, title: &str| {
            source.h2(
                h,
                make_name(&[bn, what, l.delta_grid, "shft"]),
                title,
                dx.clone(),
                dphi_shft.clone(),
            )
        };
        let shifted = ShiftedCorrelators {
            r2: shifted(h, "R2", "R_{2}")?,
            rho2: shifted(h, "rho2", "#rho_{2}")?,
            b2ab: shifted(h, "B2AB", "B_{2}^{A|B}")?,
            b2ba: shifted(h, "B2BA", "B_{2}^{B|A}")?,
            momentum: if with_momentum {
                Some(ShiftedMomentum {
                    dptdpt: shifted(h, "DptDpt", "<#Delta p_{T} #Delta p_{T}>")?,
                    p2: shifted(h, "P2", "P_{2}")?,
                    g2: shifted(h, "G2", "G_{2}")?,
                })
            } else {
                None
            },
        };
        Ok(Self {
            xx,
            dxdphi,
            rho2,
            b2ab,
            b2ba,
            shifted,
        })
    }

    fn compute(
        &self,
        h: &mut HistogramCollection,
        pairs: PairDensities,
        a: &SingleDensities,
        b: &SingleDensities,
        norm: Normalization,
    ) -> CapResult<()> {
        outer_product(a.n1, b.n1, &mut h[self.xx.n1n1])?;
        reduce_to_delta(a.n1_map, b.n1_map, &mut h[self.dxdphi.n1n1])?;
        if let (Some(xx), Some(dxdphi), Some((a_map, a_proj)), Some((b_map, b_proj))) =
            (self.xx.momentum, self.dxdphi.momentum, a.pt, b.pt)
        {
            outer_product(a_proj, b_proj, &mut h[xx.pt1pt1])?;
            reduce_to_delta(a_map, b_map, &mut h[dxdphi.pt1pt1])?;
        }
        self.xx.compute(h, pairs.n2_xx, pairs.ptpt_xx, norm)?;
        self.dxdphi.compute(h, pairs.n2_dxdphi, pairs.ptpt_dxdphi, norm)?;

        let n2 = pairs.n2_dxdphi;
        let n1n1 = h[self.dxdphi.n1n1].clone();
        let bc = norm.bin_correction;
        let c2 = |ix: usize, iy: usize| bc * n2.bin_content(ix, iy) - n1n1.bin_content(ix, iy);
        set_bins_2d(&mut h[self.rho2], |ix, iy| Some(bc * n2.bin_content(ix, iy)));
        for (target, trigger) in [
            (self.b2ab, a.n1_map.integral()),
            (self.b2ba, b.n1_map.integral()),
        ] {
            if trigger > 0.0 {
                set_bins_2d(&mut h[target], |ix, iy| Some(c2(ix, iy) / trigger));
            }
        }

        let mut shifts = vec![
            (self.dxdphi.r2, self.shifted.r2),
            (self.rho2, self.shifted.rho2),
            (self.b2ab, self.shifted.b2ab),
            (self.b2ba, self.shifted.b2ba),
        ];
        if let (Some(m), Some(s)) = (self.dxdphi.momentum, self.shifted.momentum) {
            shifts.extend([(m.dptdpt, s.dptdpt), (m.p2, s.p2), (m.g2, s.g2)]);
        }
        for (from, to) in shifts {
            let source = h[from].clone();
            shift_delta_phi(&source, &mut h[to])?;
        }
        Ok(())
    }
}

/// The pair sums of one longitudinal variable.
#[derive(Clone, Copy)]
struct PairDensities<'a> {
    n2_xx: &'a Histogram2D,
    n2_dxdphi: &'a Histogram2D,
    ptpt_xx: Option<&'a Histogram2D>,
    ptpt_dxdphi: Option<&'a Histogram2D>,
}

impl<'a> PairDensities<'a> {
    fn new(
        pair: &'a ParticlePairHistos,
        l: &Longitudinal,
        with_momentum: bool,
    ) -> CapResult<Self> {
        let ids = required(
            if l.rapidity { pair.y } else { pair.eta },
            pair.name(),
            &format!("n2_{}", l.grid),
        )?;
        let h = pair.histograms();
        let momentum = |id: Option<H2ID>, grid: &str| -> CapResult<Option<&'a Histogram2D>> {
            if with_momentum {
                Ok(Some(&h[required(id, pair.name(), &format!("ptpt_{grid}"))?]))
            } else {
                Ok(None)
            }
        };
        Ok(Self {
            n2_xx: &h[ids.n2_xx],
            n2_dxdphi: &h[ids.n2_dxdphi],
            ptpt_xx: momentum(ids.ptpt_xx, l.grid)?,
            ptpt_dxdphi: momentum(ids.ptpt_dxdphi, l.delta_grid)?,
        })
    }
}

/// The single-particle densities of one longitudinal variable.
struct SingleDensities<'a> {
    n1_map: &'a Histogram2D,
    n1: &'a Histogram1D,
    /// The $`p_T`$-weighted map and its projection.
    pt: Option<(&'a Histogram2D, &'a Histogram1D)>,
}

impl<'a> SingleDensities<'a> {
    fn new(
        base: &'a ParticleHistos,
        derived: &'a ParticleDerivedHistos,
        l: &Longitudinal,
        with_momentum: bool,
    ) -> CapResult<Self> {
        let (n1_map, spt_map, n1, spt) = if l.rapidity {
            (base.n1_phi_y, base.spt_phi_y, derived.n1_y, derived.sumpt1_y)
        } else {
            (base.n1_phi_eta, base.spt_phi_eta, derived.n1_eta, derived.sumpt1_eta)
        };
        let maps = base.histograms();
        let projections = derived.histograms();
        let pt = if with_momentum {
            Some((
                &maps[required(spt_map, base.name(), l.spt_map)?],
                &projections[required(spt, derived.name(), l.spt)?],
            ))
        } else {
            None
        };
        Ok(Self {
            n1_map: &maps[required(n1_map, base.name(), l.n1_map)?],
            n1: &projections[required(n1, derived.name(), l.n1)?],
            pt,
        })
    }
}

/// The integrated $`\langle p_T\rangle`$ of a derived single-particle group.
fn average_pt(derived: &ParticleDerivedHistos) -> CapResult<f64> {
    let h = derived.histograms();
    let sum = &h[required(derived.sumpt1_phi, derived.name(), "sumpt1_phi")?];
    let n = h[derived.n1_phi].integral();
    Ok(if n > 0.0 { sum.integral() / n } else { 0.0 })
}

/// Correlation functions computed from two frozen single-particle groups, their derived
/// groups and the frozen pair group.
///
/// For each grid $`g`$ (`ptpt`, `phiPhi`, and with `fillEta`/`fillY` the `etaEta`,
/// `DetaDphi`, `yY` and `DyDphi` grids) this holds the product of single densities
/// `n1n1_g` and $`R_2 = c\,n_2/(n_1 n_1) - 1`$ as `R2_g`, where $`c`$ is the bin correction.
/// With `fillP2` (except on `ptpt`) it adds `pt1pt1_g`, `DptDpt_g`, `P2_g` and `G2_g`. The
/// $`\Delta\varphi`$ grids also carry `rho2`, `B2AB` and `B2BA`, the pair cumulant
/// $`c\,n_2 - n_1 n_1`$ per trigger of species A and B, and `_shft` copies rotated by a
/// quarter of the $`\Delta\varphi`$ bins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticlePairDerivedHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    pub(crate) ptpt: Correlators,
    pub(crate) phi_phi: Correlators,
    pub(crate) eta: Option<DeltaCorrelators>,
    pub(crate) y: Option<DeltaCorrelators>,
}

impl ParticlePairDerivedHistos {
    pub fn new(name: &str, configuration: &Configuration) -> Self {
        Self {
            configuration: merged_configuration(
                name,
                ParticlePairHistos::default_configuration(),
                configuration,
            ),
            histograms: HistogramCollection::new(name),
            ptpt: Correlators::default(),
            phi_phi: Correlators::default(),
            eta: None,
            y: None,
        }
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let c = &self.configuration;
        let fill_eta = c.value_bool("fillEta");
        let fill_y = c.value_bool("fillY");
        let fill_p2 = c.value_bool("fillP2");
        let BinningSet { pt, phi, eta, y } = BinningSet::from_configuration(c);
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        self.ptpt = Correlators::build(
            source,
            h,
            &bn,
            "ptpt",
            pt.axis("p_{T,1}"),
            pt.axis("p_{T,2}"),
            false,
        )?;
        self.phi_phi = Correlators::build(
            source,
            h,
            &bn,
            "phiPhi",
            phi.axis("#varphi_{1}"),
            phi.axis("#varphi_{2}"),
            fill_p2,
        )?;
        self.eta = if fill_eta {
            Some(DeltaCorrelators::build(source, h, &bn, &ETA, &eta, &phi, fill_p2)?)
        } else {
            None
        };
        self.y = if fill_y {
            Some(DeltaCorrelators::build(source, h, &bn, &RAPIDITY, &y, &phi, fill_p2)?)
        } else {
            None
        };
        Ok(())
    }

    /// Compute the correlation functions of species 1 and 2.
    ///
    /// `bin_correction` multiplies the pair sums before they are compared with the products
    /// of single densities.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::InvalidState`] unless every source is frozen (or derived) and this
    /// group freshly created, [`CapError::HistogramNotFound`] if a source lacks a histogram
    /// this group needs, and [`CapError::DimensionMismatch`] if the binnings disagree.
    pub fn calculate_derived_histograms(
        &mut self,
        particle1: &ParticleHistos,
        particle2: &ParticleHistos,
        derived1: &ParticleDerivedHistos,
        derived2: &ParticleDerivedHistos,
        pair: &ParticlePairHistos,
        bin_correction: f64,
    ) -> CapResult<()> {
        require_derivable(
            &[
                particle1.histograms(),
                particle2.histograms(),
                derived1.histograms(),
                derived2.histograms(),
                pair.histograms(),
            ],
            &self.histograms,
        )?;
        let with_momentum = self.phi_phi.momentum.is_some();
        let norm = Normalization {
            bin_correction,
            pt_product: if with_momentum {
                average_pt(derived1)? * average_pt(derived2)?
            } else {
                0.0
            },
        };
        let pairs = pair.histograms();
        let h = &mut self.histograms;

        outer_product(
            &particle1.histograms()[particle1.n1_pt],
            &particle2.histograms()[particle2.n1_pt],
            &mut h[self.ptpt.n1n1],
        )?;
        self.ptpt.compute(h, &pairs[pair.n2_ptpt], None, norm)?;

        let (t1, t2) = (derived1.histograms(), derived2.histograms());
        outer_product(&t1[derived1.n1_phi], &t2[derived2.n1_phi], &mut h[self.phi_phi.n1n1])?;
        let ptpt_phi_phi = match self.phi_phi.momentum {
            Some(m) => {
                outer_product(
                    &t1[required(derived1.sumpt1_phi, derived1.name(), "sumpt1_phi")?],
                    &t2[required(derived2.sumpt1_phi, derived2.name(), "sumpt1_phi")?],
                    &mut h[m.pt1pt1],
                )?;
                Some(&pairs[required(pair.ptpt_phi_phi, pair.name(), "ptpt_phiPhi")?])
            }
            None => None,
        };
        self.phi_phi.compute(h, &pairs[pair.n2_phi_phi], ptpt_phi_phi, norm)?;

        for (ids, l) in [(self.eta, &ETA), (self.y, &RAPIDITY)] {
            let Some(ids) = ids else { continue };
            let a = SingleDensities::new(particle1, derived1, l, with_momentum)?;
            let b = SingleDensities::new(particle2, derived2, l, with_momentum)?;
            let pairs = PairDensities::new(pair, l, with_momentum)?;
            ids.compute(h, pairs, &a, &b, norm)?;
        }
        self.histograms.set_state(GroupState::DerivedComputed);
        Ok(())
    }
}

impl_histogram_group!(ParticlePairDerivedHistos);

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct CombinedMomentum {
    pub(crate) dptdpt: H2ID,
    pub(crate) p2: H2ID,
    pub(crate) g2: H2ID,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct CombinedGrid {
    pub(crate) r2: H2ID,
    pub(crate) momentum: Option<CombinedMomentum>,
}

impl CombinedGrid {
    fn build(
        source: HistogramSource,
        h: &mut HistogramCollection,
        bn: &str,
        grid: &[&str],
        x: Axis,
        y: Axis,
        with_momentum: bool,
    ) -> CapResult<Self> {
        let name = |what: &str| {
            let mut parts = vec![bn, what];
            parts.extend_from_slice(grid);
            make_name(&parts)
        };
        let r2 = source.h2(h, name("R2"), "R_{2}", x.clone(), y.clone())?;
        let momentum = if with_momentum {
            Some(CombinedMomentum {
                dptdpt: source.h2(
                    h,
                    name("DptDpt"),
                    "<#Delta p_{T} #Delta p_{T}>",
                    x.clone(),
                    y.clone(),
                )?,
                p2: source.h2(h, name("P2"), "P_{2}", x.clone(), y.clone())?,
                g2: source.h2(h, name("G2"), "G_{2}", x, y)?,
            })
        } else {
            None
        };
        Ok(Self { r2, momentum })
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub(crate) struct CombinedLongitudinal {
    pub(crate) xx: CombinedGrid,
    pub(crate) dxdphi_shft: CombinedGrid,
    pub(crate) bf: H2ID,
}

/// Linear combinations of the four charge combinations `++`, `+-`, `-+` and `--` of
/// [`ParticlePairDerivedHistos`].
///
/// Every output is $`a_{++} X_{++} + a_{+-} X_{+-} + a_{-+} X_{-+} + a_{--} X_{--}`$ with the
/// coefficients `a_pp`, `a_pm`, `a_mp` and `a_mm`. The defaults give the charge-independent
/// combination. The balance functions `BF_DetaDphi_shft` and `BF_DyDphi_shft` do not depend
/// on the coefficients:
/// $`\tfrac12 (B^{A|B}_{+-} - B^{A|B}_{++} + B^{B|A}_{-+} - B^{B|A}_{--})`$.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticlePairCombinedHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    pub(crate) r2_ptpt: H2ID,
    pub(crate) phi_phi: CombinedGrid,
    pub(crate) eta: Option<CombinedLongitudinal>,
    pub(crate) y: Option<CombinedLongitudinal>,
}

impl ParticlePairCombinedHistos {
    pub fn default_configuration() -> Configuration {
        let mut configuration = ParticlePairHistos::default_configuration();
        configuration.set_name("ParticlePairCombinedHistos");
        configuration.add_parameter("a_pp", 0.25);
        configuration.add_parameter("a_pm", 0.25);
        configuration.add_parameter("a_mp", 0.25);
        configuration.add_parameter("a_mm", 0.25);
        configuration
    }

    pub fn new(name: &str, configuration: &Configuration) -> Self {
        Self {
            configuration: merged_configuration(
                name,
                Self::default_configuration(),
                configuration,
            ),
            histograms: HistogramCollection::new(name),
            r2_ptpt: H2ID::default(),
            phi_phi: CombinedGrid::default(),
            eta: None,
            y: None,
        }
    }

    /// The charge-independent combination $`\tfrac14 (++ + +- + -+ + --)`$.
    pub fn charge_independent(name: &str, configuration: &Configuration) -> Self {
        let mut combined = Self::new(name, configuration);
        combined.set_coefficients([0.25, 0.25, 0.25, 0.25]);
        combined
    }

    /// The charge-dependent combination $`\tfrac14 (+- + -+ - ++ - --)`$.
    pub fn charge_dependent(name: &str, configuration: &Configuration) -> Self {
        let mut combined = Self::new(name, configuration);
        combined.set_coefficients([-0.25, 0.25, 0.25, -0.25]);
        combined
    }

    fn set_coefficients(&mut self, coefficients: [f64; 4]) {
        for (key, value) in ["a_pp", "a_pm", "a_mp", "a_mm"].into_iter().zip(coefficients) {
            self.configuration.set_parameter(key, value);
        }
    }

    /// The coefficients of `++`, `+-`, `-+` and `--`.
    pub fn coefficients(&self) -> [f64; 4] {
        let c = &self.configuration;
        [
            c.value_double("a_pp"),
            c.value_double("a_pm"),
            c.value_double("a_mp"),
            c.value_double("a_mm"),
        ]
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let c = &self.configuration;
        let fill_eta = c.value_bool("fillEta");
        let fill_y = c.value_bool("fillY");
        let fill_p2 = c.value_bool("fillP2");
        let BinningSet { pt, phi, eta, y } = BinningSet::from_configuration(c);
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        self.r2_ptpt = source.h2(
            h,
            make_name(&[&bn, "R2_ptpt"]),
            "R_{2}",
            pt.axis("p_{T,1}"),
            pt.axis("p_{T,2}"),
        )?;
        self.phi_phi = CombinedGrid::build(
            source,
            h,
            &bn,
            &["phiPhi"],
            phi.axis("#varphi_{1}"),
            phi.axis("#varphi_{2}"),
            fill_p2,
        )?;
        let longitudinal = |h: &mut HistogramCollection,
                            l: &Longitudinal,
                            x: &AxisBinning|
         -> CapResult<CombinedLongitudinal> {
            let dx = delta_axis(x, l.delta_title);
            let dphi = delta_phi_axis(&phi, true);
            Ok(CombinedLongitudinal {
                xx: CombinedGrid::build(
                    source,
                    h,
                    &bn,
                    &[l.grid],
                    x.axis(format!("{}_{{1}}", l.title)),
                    x.axis(format!("{}_{{2}}", l.title)),
                    fill_p2,
                )?,
                dxdphi_shft: CombinedGrid::build(
                    source,
                    h,
                    &bn,
                    &[l.delta_grid, "shft"],
                    dx.clone(),
                    dphi.clone(),
                    fill_p2,
                )?,
                bf: source.h2(
                    h,
                    make_name(&[&bn, "BF", l.delta_grid, "shft"]),
                    "B",
                    dx,
                    dphi,
                )?,
            })
        };
        self.eta = if fill_eta {
            Some(longitudinal(h, &ETA, &eta)?)
        } else {
            None
        };
        self.y = if fill_y {
            Some(longitudinal(h, &RAPIDITY, &y)?)
        } else {
            None
        };
        Ok(())
    }

    /// Combine the four charge combinations.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::InvalidState`] unless every source is derived (or loaded) and this
    /// group freshly created, [`CapError::HistogramNotFound`] if a source lacks a grid this
    /// group combines, and [`CapError::DimensionMismatch`] if the binnings disagree.
    pub fn calculate_derived_histograms(
        &mut self,
        pp: &ParticlePairDerivedHistos,
        pm: &ParticlePairDerivedHistos,
        mp: &ParticlePairDerivedHistos,
        mm: &ParticlePairDerivedHistos,
    ) -> CapResult<()> {
        let sources = [pp, pm, mp, mm];
        require_derivable(&sources.map(|s| s.histograms()), &self.histograms)?;
        let coefficients = self.coefficients();
        let h = &mut self.histograms;
        combine(h, self.r2_ptpt, &sources, "R2_ptpt", coefficients, |s| Some(s.ptpt.r2))?;
        combine_grid(h, &self.phi_phi, &sources, "phiPhi", coefficients, |s| {
            Some(CombinedSource::from(s.phi_phi))
        })?;
        for (ids, l) in [(self.eta, &ETA), (self.y, &RAPIDITY)] {
            let Some(ids) = ids else { continue };
            let pick = |s: &ParticlePairDerivedHistos| if l.rapidity { s.y } else { s.eta };
            combine_grid(h, &ids.xx, &sources, l.grid, coefficients, |s| {
                pick(s).map(|d| CombinedSource::from(d.xx))
            })?;
            combine_grid(h, &ids.dxdphi_shft, &sources, l.delta_grid, coefficients, |s| {
                pick(s).map(|d| CombinedSource {
                    r2: d.shifted.r2,
                    momentum: d.shifted.momentum.map(|m| (m.dptdpt, m.p2, m.g2)),
                })
            })?;
            let what = format!("B2AB_{}_shft", l.delta_grid);
            combine(h, ids.bf, &[pm, pp], &what, [0.5, -0.5], |s| {
                pick(s).map(|d| d.shifted.b2ab)
            })?;
            let what = format!("B2BA_{}_shft", l.delta_grid);
            combine(h, ids.bf, &[mp, mm], &what, [0.5, -0.5], |s| {
                pick(s).map(|d| d.shifted.b2ba)
            })?;
        }
        self.histograms.set_state(GroupState::DerivedComputed);
        Ok(())
    }
}

impl_histogram_group!(ParticlePairCombinedHistos);

/// The ids of one grid in a source of [`ParticlePairCombinedHistos`].
struct CombinedSource {
    r2: H2ID,
    momentum: Option<(H2ID, H2ID, H2ID)>,
}

impl From<Correlators> for CombinedSource {
    fn from(c: Correlators) -> Self {
        Self {
            r2: c.r2,
            momentum: c.momentum.map(|m| (m.dptdpt, m.p2, m.g2)),
        }
    }
}

/// `h[target] += Σ coefficient × source`, picking the source histogram with `select`.
fn combine<const N: usize>(
    h: &mut HistogramCollection,
    target: H2ID,
    sources: &[&ParticlePairDerivedHistos; N],
    what: &str,
    coefficients: [f64; N],
    select: impl Fn(&ParticlePairDerivedHistos) -> Option<H2ID>,
) -> CapResult<()> {
    for (&source, coefficient) in sources.iter().zip(coefficients) {
        let id = required(select(source), source.name(), what)?;
        h[target].add(&source.histograms()[id], coefficient)?;
    }
    Ok(())
}

fn combine_grid(
    h: &mut HistogramCollection,
    target: &CombinedGrid,
    sources: &[&ParticlePairDerivedHistos; 4],
    grid: &str,
    coefficients: [f64; 4],
    select: impl Fn(&ParticlePairDerivedHistos) -> Option<CombinedSource>,
) -> CapResult<()> {
    combine(h, target.r2, sources, &format!("R2_{grid}"), coefficients, |s| {
        select(s).map(|c| c.r2)
    })?;
    if let Some(m) = target.momentum {
        let momentum = |s: &ParticlePairDerivedHistos| select(s).and_then(|c| c.momentum);
        combine(h, m.dptdpt, sources, &format!("DptDpt_{grid}"), coefficients, |s| {
            momentum(s).map(|ids| ids.0)
        })?;
        combine(h, m.p2, sources, &format!("P2_{grid}"), coefficients, |s| {
            momentum(s).map(|ids| ids.1)
        })?;
        combine(h, m.g2, sources, &format!("G2_{grid}"), coefficients, |s| {
            momentum(s).map(|ids| ids.2)
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cap_core::{CapError, HistogramStore};

    use super::*;

    fn configuration() -> Configuration {
        let mut configuration = Configuration::new("test");
        configuration.add_parameter("nBins_pt", 2);
        configuration.add_parameter("min_pt", 0.0);
        configuration.add_parameter("max_pt", 2.0);
        configuration.add_parameter("nBins_phi", 4);
        configuration.add_parameter("nBins_eta", 2);
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
            e: pt,
        }
    }

    #[test]
    fn test_delta_axes() {
        let phi = AxisBinning::new(72, 0.0, TWO_PI);
        let axis = delta_phi_axis(&phi, false);
        assert_relative_eq!(axis.min(), -TWO_PI / 144.0);
        assert_relative_eq!(axis.max(), TWO_PI - TWO_PI / 144.0);
        let shifted = delta_phi_axis(&phi, true);
        assert_relative_eq!(shifted.min(), -TWO_PI / 144.0 - TWO_PI / 4.0);
        let eta = delta_axis(&AxisBinning::new(20, -1.0, 1.0), "#Delta#eta");
        assert_eq!(eta.n_bins(), 39);
        assert_relative_eq!(eta.min(), -2.0);
        assert_relative_eq!(eta.max(), 2.0);
    }

    #[test]
    fn test_same_species_fill_is_symmetric() {
        let mut histos = ParticlePairHistos::new("Pair", &configuration());
        histos.create_histograms().unwrap();
        let digits = vec![digit(1, 1, 1, 0.5), digit(2, 3, 2, 1.5)];
        histos.fill(&digits, &digits, true, 2.0);
        let h = histos.histograms();
        let phi_phi = &h[histos.n2_phi_phi];
        assert_relative_eq!(phi_phi.bin_content(1, 3), 2.0);
        assert_relative_eq!(phi_phi.bin_content(3, 1), 2.0);
        assert_relative_eq!(phi_phi.bin_content(1, 1), 0.0);
        assert_relative_eq!(phi_phi.bin_content(3, 3), 0.0);
        assert_relative_eq!(phi_phi.integral(), 4.0);
        assert_eq!(phi_phi.entries(), 2.0);
        let eta = histos.eta.unwrap();
        assert_relative_eq!(h[eta.n2_xx].bin_content(1, 2), 2.0);
        assert_relative_eq!(h[eta.n2_xx].bin_content(2, 1), 2.0);
        // (1 - 2 + 2, (1 - 3) mod 4 + 1) and its mirror (2 - 1 + 2, (3 - 1) mod 4 + 1)
        assert_relative_eq!(h[eta.n2_dxdphi].bin_content(1, 3), 2.0);
        assert_relative_eq!(h[eta.n2_dxdphi].bin_content(3, 3), 2.0);
        assert_relative_eq!(h[eta.ptpt_dxdphi.unwrap()].integral(), 3.0);
        assert_relative_eq!(h[histos.n2].bin_content(1), 2.0);
    }

    #[test]
    fn test_same_species_single_particle_has_no_pairs() {
        let mut histos = ParticlePairHistos::new("Pair", &configuration());
        histos.create_histograms().unwrap();
        let digits = vec![digit(1, 1, 1, 0.5)];
        histos.fill(&digits, &digits, true, 1.0);
        let h = histos.histograms();
        assert_relative_eq!(h[histos.n2_phi_phi].integral(), 0.0);
        assert_relative_eq!(h[histos.n2_ptpt].integral(), 0.0);
        assert_relative_eq!(h[histos.n2].bin_content(1), 1.0);
    }

    #[test]
    fn test_cross_species_fill_is_directional() {
        let a = vec![digit(1, 1, 1, 0.5)];
        let b = vec![digit(2, 2, 2, 1.5)];
        let mut ab = ParticlePairHistos::new("Pair_AB", &configuration());
        let mut ba = ParticlePairHistos::new("Pair_BA", &configuration());
        ab.create_histograms().unwrap();
        ba.create_histograms().unwrap();
        ab.fill(&a, &b, false, 1.0);
        let h = ab.histograms();
        assert_relative_eq!(h[ab.n2_phi_phi].bin_content(1, 2), 1.0);
        assert_relative_eq!(h[ab.n2_phi_phi].bin_content(2, 1), 0.0);
        assert_relative_eq!(h[ab.n2_phi_phi].integral(), 1.0);
        assert_relative_eq!(ba.histograms()[ba.n2_phi_phi].integral(), 0.0);
        ba.fill(&b, &a, false, 1.0);
        assert_relative_eq!(ba.histograms()[ba.n2_phi_phi].bin_content(2, 1), 1.0);
        assert_relative_eq!(ab.histograms()[ab.n2_phi_phi].integral(), 1.0);
    }

    #[test]
    fn test_out_of_acceptance_digits_are_skipped() {
        let mut histos = ParticlePairHistos::new("Pair", &configuration());
        histos.create_histograms().unwrap();
        histos.fill(&[digit(-1, 1, 0, 5.0)], &[digit(1, 2, 1, 0.5)], false, 1.0);
        let h = histos.histograms();
        assert_relative_eq!(h[histos.n2_ptpt].integral(), 0.0);
        assert_relative_eq!(h[histos.n2_phi_phi].integral(), 1.0);
        assert_relative_eq!(h[histos.eta.unwrap().n2_xx].integral(), 0.0);
    }

    #[test]
    fn test_reduce_and_shift() {
        let x = Axis::new(2, -1.0, 1.0, "x");
        let phi = Axis::new(4, 0.0, TWO_PI, "phi");
        let mut a = Histogram2D::new("a", "a", x.clone(), phi.clone());
        let mut b = Histogram2D::new("b", "b", x, phi);
        a.add_bin_content(1, 1, 2.0);
        b.add_bin_content(2, 2, 3.0);
        b.add_bin_content(1, 1, 1.0);
        let dx = delta_axis(&AxisBinning::new(2, -1.0, 1.0), "dx");
        let dphi = delta_phi_axis(&AxisBinning::new(4, 0.0, TWO_PI), false);
        let mut out = Histogram2D::new("out", "out", dx.clone(), dphi);
        reduce_to_delta(&a, &b, &mut out).unwrap();
        assert_relative_eq!(out.bin_content(1, 4), 6.0);
        assert_relative_eq!(out.bin_content(2, 1), 2.0);
        assert_relative_eq!(out.integral(), 8.0);
        let mut shifted = Histogram2D::new(
            "shifted",
            "shifted",
            dx,
            delta_phi_axis(&AxisBinning::new(4, 0.0, TWO_PI), true),
        );
        shift_delta_phi(&out, &mut shifted).unwrap();
        assert_relative_eq!(shifted.bin_content(1, 1), 6.0);
        assert_relative_eq!(shifted.bin_content(2, 2), 2.0);
    }

    /// One event with a single particle of species A and one of species B, frozen into the
    /// single, derived single and pair groups.
    fn frozen_sources() -> (
        ParticleHistos,
        ParticleHistos,
        ParticleDerivedHistos,
        ParticleDerivedHistos,
        ParticlePairHistos,
    ) {
        let cfg = configuration();
        let a = [digit(1, 1, 1, 0.5)];
        let b = [digit(2, 2, 2, 1.5)];
        let mut p1 = ParticleHistos::new("A", &cfg);
        let mut p2 = ParticleHistos::new("B", &cfg);
        let mut pair = ParticlePairHistos::new("AB", &cfg);
        p1.create_histograms().unwrap();
        p2.create_histograms().unwrap();
        pair.create_histograms().unwrap();
        p1.fill_digits(&a, 1.0);
        p2.fill_digits(&b, 1.0);
        pair.fill(&a, &b, false, 1.0);
        p1.freeze(None).unwrap();
        p2.freeze(None).unwrap();
        pair.freeze(None).unwrap();
        let mut d1 = ParticleDerivedHistos::new("A_derived", &cfg);
        let mut d2 = ParticleDerivedHistos::new("B_derived", &cfg);
        d1.create_histograms().unwrap();
        d2.create_histograms().unwrap();
        d1.calculate_derived_histograms(&p1).unwrap();
        d2.calculate_derived_histograms(&p2).unwrap();
        (p1, p2, d1, d2, pair)
    }

    fn derived_pair(name: &str, bin_correction: f64) -> ParticlePairDerivedHistos {
        let (p1, p2, d1, d2, pair) = frozen_sources();
        let mut derived = ParticlePairDerivedHistos::new(name, &configuration());
        derived.create_histograms().unwrap();
        derived
            .calculate_derived_histograms(&p1, &p2, &d1, &d2, &pair, bin_correction)
            .unwrap();
        derived
    }

    #[test]
    fn test_pair_correlators() {
        let derived = derived_pair("AB_derived", 2.0);
        let h = derived.histograms();
        assert_eq!(derived.state(), GroupState::DerivedComputed);
        assert_relative_eq!(h[derived.ptpt.n1n1].bin_content(1, 2), 1.0);
        assert_relative_eq!(h[derived.ptpt.r2].bin_content(1, 2), 1.0);
        assert_relative_eq!(h[derived.ptpt.r2].bin_content(2, 1), 0.0);
        assert_relative_eq!(h[derived.phi_phi.r2].bin_content(1, 2), 1.0);
        let m = derived.phi_phi.momentum.unwrap();
        assert_relative_eq!(h[m.pt1pt1].bin_content(1, 2), 0.75);
        assert_relative_eq!(h[m.dptdpt].bin_content(1, 2), 0.0);
        assert_relative_eq!(h[m.g2].bin_content(1, 2), 1.0);

        let eta = derived.eta.unwrap();
        assert_relative_eq!(h[eta.xx.r2].bin_content(1, 2), 1.0);
        assert_relative_eq!(h[eta.dxdphi.n1n1].bin_content(1, 4), 1.0);
        assert_relative_eq!(h[eta.dxdphi.r2].bin_content(1, 4), 1.0);
        assert_relative_eq!(h[eta.rho2].bin_content(1, 4), 2.0);
        assert_relative_eq!(h[eta.b2ab].bin_content(1, 4), 1.0);
        assert_relative_eq!(h[eta.b2ba].bin_content(1, 4), 1.0);
        assert_relative_eq!(h[eta.shifted.r2].bin_content(1, 1), 1.0);
        assert_relative_eq!(h[eta.shifted.b2ab].bin_content(1, 1), 1.0);
        assert!(derived.y.is_none());
    }

    #[test]
    fn test_pair_correlators_require_frozen_sources() {
        let (p1, p2, d1, d2, mut pair) = frozen_sources();
        pair.reset();
        let mut derived = ParticlePairDerivedHistos::new("AB_derived", &configuration());
        derived.create_histograms().unwrap();
        assert!(matches!(
            derived.calculate_derived_histograms(&p1, &p2, &d1, &d2, &pair, 1.0),
            Err(CapError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_pair_correlators_report_missing_momentum_sums() {
        let (p1, p2, d1, d2, pair) = frozen_sources();
        let mut without_p2 = configuration();
        without_p2.add_parameter("fillP2", false);
        let mut plain_pair = ParticlePairHistos::new("AB", &without_p2);
        plain_pair.create_histograms().unwrap();
        plain_pair.freeze(None).unwrap();
        let mut derived = ParticlePairDerivedHistos::new("AB_derived", &configuration());
        derived.create_histograms().unwrap();
        assert!(matches!(
            derived.calculate_derived_histograms(&p1, &p2, &d1, &d2, &plain_pair, 1.0),
            Err(CapError::HistogramNotFound { .. })
        ));
        let mut derived = ParticlePairDerivedHistos::new("AB_derived", &configuration());
        derived.create_histograms().unwrap();
        assert!(derived
            .calculate_derived_histograms(&p1, &p2, &d1, &d2, &pair, 1.0)
            .is_ok());
    }

    #[test]
    fn test_combined_linear_combination() {
        let pp = derived_pair("pp", 2.0);
        let pm = derived_pair("pm", 3.0);
        let mp = derived_pair("mp", 4.0);
        let mm = derived_pair("mm", 5.0);
        let mut cfg = configuration();
        cfg.add_parameter("a_pp", 1.0);
        cfg.add_parameter("a_pm", -1.0);
        cfg.add_parameter("a_mp", 0.5);
        cfg.add_parameter("a_mm", 2.0);
        let mut combined = ParticlePairCombinedHistos::new("CD", &cfg);
        assert_eq!(combined.coefficients(), [1.0, -1.0, 0.5, 2.0]);
        combined.create_histograms().unwrap();
        combined
            .calculate_derived_histograms(&pp, &pm, &mp, &mm)
            .unwrap();
        let h = combined.histograms();
        // R2 = c - 1 in the filled bin for each source
        let expected = 1.0 * 1.0 - 1.0 * 2.0 + 0.5 * 3.0 + 2.0 * 4.0;
        assert_relative_eq!(h[combined.r2_ptpt].bin_content(1, 2), expected);
        assert_relative_eq!(h[combined.phi_phi.r2].bin_content(1, 2), expected);
        let eta = combined.eta.unwrap();
        assert_relative_eq!(h[eta.dxdphi_shft.r2].bin_content(1, 1), expected);
        // B2 = c - 1 per trigger: BF = (2 - 1 + 3 - 4) / 2
        assert_relative_eq!(h[eta.bf].bin_content(1, 1), 0.0);
        assert_relative_eq!(
            h[eta.xx.momentum.unwrap().g2].bin_content(1, 2),
            1.0 * 1.0 - 1.0 * 2.0 + 0.5 * 3.0 + 2.0 * 4.0
        );
    }

    #[test]
    fn test_combined_presets() {
        let ci = ParticlePairCombinedHistos::charge_independent("CI", &configuration());
        assert_eq!(ci.coefficients(), [0.25; 4]);
        let cd = ParticlePairCombinedHistos::charge_dependent("CD", &configuration());
        assert_eq!(cd.coefficients(), [-0.25, 0.25, 0.25, -0.25]);
    }

    #[test]
    fn test_combined_rejects_mismatched_sources() {
        let pp = derived_pair("pp", 1.0);
        let mut coarse = configuration();
        coarse.add_parameter("nBins_phi", 8);
        let mut combined = ParticlePairCombinedHistos::new("CI", &coarse);
        combined.create_histograms().unwrap();
        assert!(matches!(
            combined.calculate_derived_histograms(&pp, &pp, &pp, &pp),
            Err(CapError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_derived_pair_store_round_trip() {
        let derived = derived_pair("AB_derived", 2.0);
        let mut store = HistogramStore::new();
        derived.save_histograms(&mut store);
        assert!(store.contains("AB_derived_R2_DetaDphi_shft"));
        assert!(store.contains("AB_derived_B2BA_DetaDphi"));
        let mut loaded = ParticlePairDerivedHistos::new("AB_derived", &configuration());
        loaded.load_histograms(&store).unwrap();
        let eta = loaded.eta.unwrap();
        assert_relative_eq!(loaded.histograms()[eta.dxdphi.r2].bin_content(1, 4), 1.0);
    }
}
