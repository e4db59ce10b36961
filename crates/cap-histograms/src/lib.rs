//! # cap-histograms
//!
//! Histogram groups filled by `cap` analyzers, and the calculators which turn frozen groups
//! into correlation functions, balance functions and factorial cumulants.
#![warn(clippy::perf, clippy::style)]

use cap_core::{Axis, CapResult, HistogramCollection, HistogramStore, H1ID, H2ID};

/// Implement [`HistogramGroup`](cap_core::HistogramGroup) for a struct with `configuration`
/// and `histograms` fields and a `build(&mut self, HistogramSource) -> CapResult<()>` method.
///
/// A failed build leaves the group empty and [`GroupState::Uncreated`](cap_core::GroupState).
/// `finalize = method` forwards [`HistogramGroup::finalize`](cap_core::HistogramGroup::finalize)
/// to `method`.
macro_rules! impl_histogram_group {
    (@impl $group:ty, { $($extra:tt)* }) => {
        impl ::cap_core::HistogramGroup for $group {
            fn configuration(&self) -> &::cap_core::Configuration {
                &self.configuration
            }
            fn histograms(&self) -> &::cap_core::HistogramCollection {
                &self.histograms
            }
            fn histograms_mut(&mut self) -> &mut ::cap_core::HistogramCollection {
                &mut self.histograms
            }
            fn create_histograms(&mut self) -> ::cap_core::CapResult<()> {
                self.histograms
                    .require_state(&[::cap_core::GroupState::Uncreated])?;
                if let Err(err) = self.build($crate::HistogramSource::Create) {
                    self.histograms.clear();
                    return Err(err);
                }
                self.histograms.set_state(::cap_core::GroupState::Created);
                log::debug!(
                    "Created group \"{}\" with {} histograms",
                    self.histograms.name(),
                    self.histograms.n_histograms()
                );
                Ok(())
            }
            fn load_histograms(
                &mut self,
                store: &::cap_core::HistogramStore,
            ) -> ::cap_core::CapResult<()> {
                self.histograms
                    .require_state(&[::cap_core::GroupState::Uncreated])?;
                if let Err(err) = self.build($crate::HistogramSource::Load(store)) {
                    self.histograms.clear();
                    return Err(err);
                }
                self.histograms.set_state(::cap_core::GroupState::Frozen);
                Ok(())
            }
            $($extra)*
        }
    };
    ($group:ty) => {
        impl_histogram_group!(@impl $group, {});
    };
    ($group:ty, finalize = $finalize:ident) => {
        impl_histogram_group!(@impl $group, {
            fn finalize(&mut self) -> ::cap_core::CapResult<()> {
                self.$finalize()
            }
        });
    };
}

mod binops;

/// Thin drivers which apply filters to events and fill the groups of this crate.
pub mod analyzers;
/// Per-cell radius and gradient maps of a collision geometry.
pub mod collision_geometry;
/// Counters of executed tasks, accepted events and accepted particles.
pub mod event_count;
/// Event-wide multiplicity, energy, charge, strangeness and baryon-number distributions.
pub mod global;
/// Factorial moments, factorial cumulants and $`\nu_{\text{dyn}}`$.
pub mod nudyn;
/// Two-particle densities and the correlation functions derived from them.
pub mod pair;
/// Single-particle densities.
pub mod particle;
/// Distributions of radial-flow boosts.
pub mod radial_boost;
/// Transverse spherocity.
pub mod spherocity;

pub use crate::analyzers::{
    Analyzer, GlobalAnalyzer, NuDynAnalyzer, ParticleAnalyzer, ParticlePairAnalyzer,
    TransverseSpherocityAnalyzer,
};
pub use crate::collision_geometry::CollisionGeometryGradientHistograms;
pub use crate::event_count::EventCountHistos;
pub use crate::global::{GlobalDerivedHistos, GlobalHistos};
pub use crate::nudyn::{factorial_moment, NuDynDerivedHistos, NuDynHistos};
pub use crate::pair::{
    ParticlePairCombinedHistos, ParticlePairDerivedHistos, ParticlePairHistos,
};
pub use crate::particle::{ParticleDerivedHistos, ParticleHistos};
pub use crate::radial_boost::RadialBoostHistos;
pub use crate::spherocity::{transverse_spherocity, TransverseSpherocityHistos};

/// Where the histograms of a group come from: freshly created, or copied out of a store.
///
/// Groups describe their histograms once, in a private `build` method, and this switch decides
/// whether each one is created or loaded.
#[derive(Clone, Copy, Debug)]
pub(crate) enum HistogramSource<'a> {
    Create,
    Load(&'a HistogramStore),
}

impl HistogramSource<'_> {
    pub(crate) fn h1(
        self,
        histograms: &mut HistogramCollection,
        name: String,
        title: &str,
        x: Axis,
    ) -> CapResult<H1ID> {
        match self {
            HistogramSource::Create => Ok(histograms.create_1d(name, title, x)),
            HistogramSource::Load(store) => histograms.load_1d(store, &name),
        }
    }
    pub(crate) fn h2(
        self,
        histograms: &mut HistogramCollection,
        name: String,
        title: &str,
        x: Axis,
        y: Axis,
    ) -> CapResult<H2ID> {
        match self {
            HistogramSource::Create => Ok(histograms.create_2d(name, title, x, y)),
            HistogramSource::Load(store) => histograms.load_2d(store, &name),
        }
    }
}

/// Overlay `overrides` onto `defaults` and rename the result.
pub(crate) fn merged_configuration(
    name: &str,
    mut defaults: cap_core::Configuration,
    overrides: &cap_core::Configuration,
) -> cap_core::Configuration {
    defaults.set_parameters(overrides);
    defaults.set_name(name);
    defaults
}
