//! `cap` is a library for filtering collision events and particles and turning them into
//! binned single- and two-particle densities, correlation functions, balance functions and
//! factorial cumulants.
//!
//! <div class="warning">
//!
//! The API is not stable and may change before the 1.0.0 release.
//!
//! </div>
//!
//! # Table of Contents
//! - [Key Features](#key-features)
//! - [Quick Start](#quick-start)
//! - [Group Lifecycle](#group-lifecycle)
//! - [Configuration](#configuration)
//! - [Storage Format](#storage-format)
//! - [Logging](#logging)
//!
//! # Key Features
//! * [`Filter`]s built from typed selectors, which accept an event or particle only if every
//!   condition holds.
//! * Histogram groups ([`ParticleHistos`], [`ParticlePairHistos`], [`GlobalHistos`],
//!   [`NuDynHistos`], ...) with a fixed naming scheme, so a run can be saved and the same
//!   groups loaded back later.
//! * Calculators which combine frozen groups into $`R_2`$, $`P_2`$, $`G_2`$, balance
//!   functions and factorial cumulants.
//! * [`Analyzer`]s which drive the groups from a stream of [`Event`]s.
//!
//! # Quick Start
//! An analyzer owns its filters and groups. The event loop belongs to the caller:
//! ```
//! use std::sync::Arc;
//! use cap::prelude::*;
//!
//! let context = Arc::new(RunContext::new());
//! let mut analyzer = ParticlePairAnalyzer::new(
//!     "Pair",
//!     &Configuration::new("Pair"),
//!     context,
//!     vec![EventFilter::open()],
//!     ParticleFilter::charged_hadron_filters(&KinematicCuts::new()),
//! );
//! analyzer.create_histograms()?;
//! for _ in 0..10 {
//!     analyzer.analyze(&cap::data::test_event());
//! }
//! analyzer.finish()?;
//! let mut store = HistogramStore::new();
//! analyzer.save(&mut store);
//! analyzer.derived(&mut store)?;
//! assert!(store.contains("PairDerived_All_HPHM_R2_phiPhi"));
//! # Ok::<(), CapError>(())
//! ```
//!
//! # Group Lifecycle
//! Every [`HistogramGroup`] moves through the states of [`GroupState`]:
//! - `Uncreated` until [`HistogramGroup::create_histograms`] or
//!   [`HistogramGroup::load_histograms`] is called,
//! - `Created` while it is being filled,
//! - `Frozen` after [`HistogramGroup::freeze`] (or after loading), when it may only be read,
//! - `DerivedComputed` for derived groups whose calculation has run.
//!
//! Filling a group which is not `Created` is logged and ignored. Derived calculations check
//! their sources and target and return [`CapError::InvalidState`] otherwise.
//!
//! # Configuration
//! Each group starts from its own default [`Configuration`] and overlays the keys of the one it
//! is given. Keys which the defaults do not declare are ignored, so one configuration can be
//! shared by several groups. Configurations round-trip through a plain text format with
//! [`Configuration::write_to_file`] and [`Configuration::read_from_file`].
//!
//! # Storage Format
//! A [`HistogramStore`] maps histogram names to histograms and is written to disk with
//! [`bincode`](https://github.com/bincode-org/bincode). Paths go through shell expansion.
//!
//! # Logging
//! `cap` logs through the [`log`](https://docs.rs/log) facade. Install any logger in the
//! binary to see the messages; rejected fills and skipped events are reported at `warn` and
//! `error`, per-run summaries at `info`.
#![warn(clippy::perf, clippy::style, missing_docs)]

/// Events, particles and particle species.
pub mod data {
    pub use cap_core::data::{test_event, Event, EventProperties, Particle, ParticleType, Statistics};
}
/// Event and particle filters and the selectors they are built from.
pub mod filters {
    pub use cap_core::filters::*;
}
/// Binned aggregates, groups of them and their storage.
pub mod histograms {
    pub use cap_core::histograms::*;
    pub use cap_histograms::{
        CollisionGeometryGradientHistograms, EventCountHistos, GlobalDerivedHistos, GlobalHistos,
        NuDynDerivedHistos, NuDynHistos, ParticleDerivedHistos, ParticleHistos,
        ParticlePairCombinedHistos, ParticlePairDerivedHistos, ParticlePairHistos,
        RadialBoostHistos, TransverseSpherocityHistos,
    };
}
/// Drivers which fill histogram groups from events.
pub mod analyzers {
    pub use cap_histograms::analyzers::*;
}
/// Utility functions, enums, and vectors
pub mod utils {
    pub use cap_core::utils::*;
}
/// Useful traits for all crate structs
pub mod traits {
    pub use cap_core::traits::*;
    pub use cap_histograms::Analyzer;
}
/// Everything needed to set up and run an analysis.
pub mod prelude {
    pub use crate::traits::*;
    pub use cap_core::{
        CapError, CapResult, Configuration, Event, EventFilter, EventProperties, GroupState,
        HistogramStore, KinematicCuts, Particle, ParticleFilter, ParticleType, RunContext,
        TaskStatus, Vec3, Vec4,
    };
    pub use cap_histograms::{
        GlobalAnalyzer, NuDynAnalyzer, ParticleAnalyzer, ParticlePairAnalyzer,
        TransverseSpherocityAnalyzer,
    };
}

pub use cap_core::{
    combination_for_index, index_for_combination, make_name, make_name_indexed,
    make_name_with_filter, n_combinations, Axis, AxisBinning, BinningSet, CapError, CapResult,
    Combinations, Condition, Configuration, Event, EventFilter, EventProperties, EventSelector,
    Filter, GroupState, Histogram, Histogram1D, Histogram2D, HistogramCollection,
    HistogramGroup, HistogramStore, Kinematic, KinematicCuts, Liveness, MultiplicityType,
    Particle, ParticleDigit, ParticleFilter, ParticleSelector, ParticleType, Resolution,
    RunContext, Species, TaskStatus, Vec3, Vec4, H1ID, H2ID, PI, TWO_PI,
};
pub use cap_histograms::{
    factorial_moment, transverse_spherocity, Analyzer,
    CollisionGeometryGradientHistograms, EventCountHistos, GlobalAnalyzer, GlobalDerivedHistos,
    GlobalHistos, NuDynAnalyzer, NuDynDerivedHistos, NuDynHistos, ParticleAnalyzer,
    ParticleDerivedHistos, ParticleHistos, ParticlePairAnalyzer, ParticlePairCombinedHistos,
    ParticlePairDerivedHistos, ParticlePairHistos, RadialBoostHistos,
    TransverseSpherocityAnalyzer, TransverseSpherocityHistos,
};
pub use serde::{Deserialize, Serialize};
