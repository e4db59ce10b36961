//! # cap-core
//!
//! This is an internal crate used by `cap`.
#![warn(clippy::perf, clippy::style)]
#![allow(clippy::excessive_precision)]

use thiserror::Error;

/// A typed key/value parameter store shared by tasks and histogram groups.
pub mod configuration;
/// The [`RunContext`](crate::context::RunContext) which carries the run status between
/// components.
pub mod context;
/// Particles, particle types, events and event-level properties.
pub mod data;
/// Conditions, generic filters and their event/particle specializations.
pub mod filters;
/// Binned aggregates, histogram collections and persistent histogram stores.
pub mod histograms;
/// Utility functions, enums, and traits
pub mod utils;
/// Useful traits for all crate structs
pub mod traits {
    pub use crate::filters::Selector;
    pub use crate::histograms::HistogramGroup;
    pub use crate::configuration::ParameterValue;
}

pub use crate::configuration::Configuration;
pub use crate::context::{RunContext, TaskStatus};
pub use crate::data::{Event, EventProperties, Particle, ParticleType};
pub use crate::filters::{
    event::{EventFilter, EventSelector},
    particle::{KinematicCuts, ParticleFilter, ParticleSelector},
    Condition, Filter, Resolution,
};
pub use crate::histograms::{
    digit::{AxisBinning, BinningSet, ParticleDigit},
    naming::{make_name, make_name_indexed, make_name_with_filter},
    Axis, GroupState, H1ID, H2ID, Histogram, Histogram1D, Histogram2D, HistogramCollection,
    HistogramGroup, HistogramStore,
};
pub use crate::utils::combinatorics::{
    combination_for_index, index_for_combination, n_combinations, Combinations,
};
pub use crate::utils::enums::{Kinematic, Liveness, MultiplicityType, Species};
pub use crate::utils::vectors::{Vec3, Vec4};

/// The mathematical constant $`\pi`$.
pub const PI: f64 = std::f64::consts::PI;
/// The mathematical constant $`2\pi`$.
pub const TWO_PI: f64 = std::f64::consts::TAU;

pub type CapResult<T> = Result<T, CapError>;

/// The error type used by all `cap` internal methods
#[derive(Error, Debug)]
pub enum CapError {
    /// An alias for [`std::io::Error`].
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    /// An alias for [`shellexpand::LookupError`].
    #[error("Failed to expand path: {0}")]
    LookupError(#[from] shellexpand::LookupError<std::env::VarError>),
    /// An error returned by the Rust encoder
    #[error("Encoder error: {0}")]
    EncodeError(#[from] bincode::error::EncodeError),
    /// An error returned by the Rust decoder
    #[error("Decoder error: {0}")]
    DecodeError(#[from] bincode::error::DecodeError),
    /// An error which occurs when the user tries to parse an invalid string of text, typically
    /// into an enum variant or a configuration line.
    #[error("Failed to parse string: \"{name}\" does not correspond to a valid \"{object}\"!")]
    ParseError {
        /// The string which was parsed
        name: String,
        /// The name of the object it failed to parse into
        object: String,
    },
    /// An integer `(filter_type, filter_subtype)` pair which does not map onto any selector.
    #[error("No selector corresponds to filter type {filter_type} and subtype {filter_subtype}!")]
    UnknownSelector {
        /// The filter type code
        filter_type: i32,
        /// The filter subtype code
        filter_subtype: i32,
    },
    /// A parameter lookup which found no value of the requested kind.
    #[error("No '{kind}' parameter named \"{name}\"!")]
    ParameterNotFound {
        /// The (possibly path-qualified) parameter name
        name: String,
        /// The requested value kind
        kind: String,
    },
    /// A required histogram is missing from a [`HistogramStore`].
    #[error("Histogram \"{name}\" was not found!")]
    HistogramNotFound {
        /// Name of the missing histogram
        name: String,
    },
    /// Two histograms which must share binning do not.
    #[error("Histogram \"{name}\" does not have the expected dimensions!")]
    DimensionMismatch {
        /// Name of the offending histogram
        name: String,
    },
    /// An operation was attempted on a histogram group in the wrong lifecycle state.
    #[error("Group \"{group}\" is {found} but must be {expected}!")]
    InvalidState {
        /// Name of the group
        group: String,
        /// The state(s) the operation requires
        expected: String,
        /// The state the group was in
        found: String,
    },
    /// A fatal failure which the caller is expected to treat as the end of the run.
    #[error("Fatal: {reason}")]
    Fatal {
        /// Description of the failure
        reason: String,
    },
    /// A custom fallback error for errors too complex or too infrequent to warrant their own error
    /// category.
    #[error("{0}")]
    Custom(String),
}

impl Clone for CapError {
    // error types are rarely cloneable, so clones collapse into the message
    fn clone(&self) -> Self {
        let err_string = self.to_string();
        CapError::Custom(err_string)
    }
}
