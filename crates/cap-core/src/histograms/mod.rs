use std::{
    fmt::Display,
    fs::File,
    io::{BufReader, BufWriter},
    ops::{Index, IndexMut},
    path::PathBuf,
};

use accurate::{sum::Klein, traits::*};
use indexmap::IndexMap;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    configuration::Configuration,
    context::{RunContext, TaskStatus},
    utils::{get_bin_edges, get_bin_index},
    CapError, CapResult,
};

/// Pre-computed bin indices of particles and the binning helpers which produce them.
pub mod digit;
/// Helpers which build histogram names from base names, filter names and indices.
pub mod naming;

fn sum_f64(values: &[f64]) -> f64 {
    #[cfg(feature = "rayon")]
    return values
        .par_iter()
        .copied()
        .parallel_sum_with_accumulator::<Klein<f64>>();
    #[cfg(not(feature = "rayon"))]
    return values.iter().copied().sum_with_accumulator::<Klein<f64>>();
}

/// An evenly binned axis.
///
/// Bin `0` collects underflow, bins `1..=n_bins` cover $`[\text{min}, \text{max})`$ and bin
/// `n_bins + 1` collects overflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    n_bins: usize,
    min: f64,
    max: f64,
    title: String,
}

impl Axis {
    pub fn new<T: Into<String>>(n_bins: usize, min: f64, max: f64, title: T) -> Self {
        Self {
            n_bins,
            min,
            max,
            title: title.into(),
        }
    }
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }
    pub fn min(&self) -> f64 {
        self.min
    }
    pub fn max(&self) -> f64 {
        self.max
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }
    /// The bin holding `value`. NaN lands in the overflow bin.
    pub fn find_bin(&self, value: f64) -> usize {
        if value < self.min {
            0
        } else {
            get_bin_index(value, self.n_bins, (self.min, self.max))
                .map_or(self.n_bins + 1, |index| index + 1)
        }
    }
    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        self.min + (bin as f64 - 1.0) * self.width()
    }
    pub fn bin_center(&self, bin: usize) -> f64 {
        self.min + (bin as f64 - 0.5) * self.width()
    }
    /// The `n_bins + 1` edges of the in-range bins.
    pub fn edges(&self) -> Vec<f64> {
        get_bin_edges(self.n_bins, (self.min, self.max))
    }
    /// Same bin count and range (titles are ignored).
    pub fn same_binning(&self, other: &Axis) -> bool {
        self.n_bins == other.n_bins && self.min == other.min && self.max == other.max
    }
}

/// A one-dimensional weighted histogram.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    name: String,
    title: String,
    x: Axis,
    contents: Vec<f64>,
    sumw2: Vec<f64>,
    entries: f64,
}

impl Histogram1D {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, title: T, x: Axis) -> Self {
        let n = x.n_bins + 2;
        Self {
            name: name.into(),
            title: title.into(),
            x,
            contents: vec![0.0; n],
            sumw2: vec![0.0; n],
            entries: 0.0,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn x_axis(&self) -> &Axis {
        &self.x
    }
    pub fn n_bins(&self) -> usize {
        self.x.n_bins
    }
    pub fn get_bin(&self, x: f64) -> usize {
        self.x.find_bin(x)
    }
    /// Add `weight` to the bin holding `x` and count one entry.
    pub fn fill(&mut self, x: f64, weight: f64) {
        let bin = self.get_bin(x);
        self.add_bin_content(bin, weight);
        self.entries += 1.0;
    }
    /// Add `weight` to a bin without counting an entry. Out-of-range bins are ignored.
    pub fn add_bin_content(&mut self, bin: usize, weight: f64) {
        if bin < self.contents.len() {
            self.contents[bin] += weight;
            self.sumw2[bin] += weight * weight;
        }
    }
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }
    pub fn set_bin_content(&mut self, bin: usize, value: f64) {
        if bin < self.contents.len() {
            self.contents[bin] = value;
        }
    }
    pub fn bin_error(&self, bin: usize) -> f64 {
        self.sumw2.get(bin).map_or(0.0, |w2| w2.sqrt())
    }
    pub fn set_bin_error(&mut self, bin: usize, error: f64) {
        if bin < self.sumw2.len() {
            self.sumw2[bin] = error * error;
        }
    }
    pub fn entries(&self) -> f64 {
        self.entries
    }
    pub fn set_entries(&mut self, entries: f64) {
        self.entries = entries;
    }
    /// Contents of the in-range bins `1..=n_bins`.
    pub fn values(&self) -> &[f64] {
        &self.contents[1..=self.x.n_bins]
    }
    /// Sum of the in-range bin contents.
    pub fn integral(&self) -> f64 {
        sum_f64(self.values())
    }
    pub fn scale(&mut self, factor: f64) {
        self.contents.iter_mut().for_each(|c| *c *= factor);
        self.sumw2.iter_mut().for_each(|w2| *w2 *= factor * factor);
    }
    pub fn reset(&mut self) {
        self.contents.iter_mut().for_each(|c| *c = 0.0);
        self.sumw2.iter_mut().for_each(|w2| *w2 = 0.0);
        self.entries = 0.0;
    }
    pub fn same_dimensions(&self, other: &Histogram1D) -> bool {
        self.x.same_binning(&other.x)
    }
    /// Add `coefficient * other` bin by bin.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::DimensionMismatch`] if the binnings differ.
    pub fn add(&mut self, other: &Histogram1D, coefficient: f64) -> CapResult<()> {
        if !self.same_dimensions(other) {
            return Err(CapError::DimensionMismatch {
                name: other.name.clone(),
            });
        }
        for (bin, (c, w2)) in self.contents.iter_mut().zip(self.sumw2.iter_mut()).enumerate() {
            *c += coefficient * other.contents[bin];
            *w2 += coefficient * coefficient * other.sumw2[bin];
        }
        self.entries += other.entries;
        Ok(())
    }
}

/// A two-dimensional weighted histogram.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    name: String,
    title: String,
    x: Axis,
    y: Axis,
    contents: Vec<f64>,
    sumw2: Vec<f64>,
    entries: f64,
}

impl Histogram2D {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, title: T, x: Axis, y: Axis) -> Self {
        let n = (x.n_bins + 2) * (y.n_bins + 2);
        Self {
            name: name.into(),
            title: title.into(),
            x,
            y,
            contents: vec![0.0; n],
            sumw2: vec![0.0; n],
            entries: 0.0,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn x_axis(&self) -> &Axis {
        &self.x
    }
    pub fn y_axis(&self) -> &Axis {
        &self.y
    }
    pub fn n_bins_x(&self) -> usize {
        self.x.n_bins
    }
    pub fn n_bins_y(&self) -> usize {
        self.y.n_bins
    }
    fn global_bin(&self, ix: usize, iy: usize) -> Option<usize> {
        (ix < self.x.n_bins + 2 && iy < self.y.n_bins + 2).then(|| ix + (self.x.n_bins + 2) * iy)
    }
    pub fn get_bin(&self, x: f64, y: f64) -> (usize, usize) {
        (self.x.find_bin(x), self.y.find_bin(y))
    }
    pub fn fill(&mut self, x: f64, y: f64, weight: f64) {
        let (ix, iy) = self.get_bin(x, y);
        self.add_bin_content(ix, iy, weight);
        self.entries += 1.0;
    }
    /// Add `weight` to bin `(ix, iy)` without counting an entry. Out-of-range bins are ignored.
    pub fn add_bin_content(&mut self, ix: usize, iy: usize, weight: f64) {
        if let Some(bin) = self.global_bin(ix, iy) {
            self.contents[bin] += weight;
            self.sumw2[bin] += weight * weight;
        }
    }
    pub fn bin_content(&self, ix: usize, iy: usize) -> f64 {
        self.global_bin(ix, iy).map_or(0.0, |bin| self.contents[bin])
    }
    pub fn set_bin_content(&mut self, ix: usize, iy: usize, value: f64) {
        if let Some(bin) = self.global_bin(ix, iy) {
            self.contents[bin] = value;
        }
    }
    pub fn bin_error(&self, ix: usize, iy: usize) -> f64 {
        self.global_bin(ix, iy).map_or(0.0, |bin| self.sumw2[bin].sqrt())
    }
    pub fn set_bin_error(&mut self, ix: usize, iy: usize, error: f64) {
        if let Some(bin) = self.global_bin(ix, iy) {
            self.sumw2[bin] = error * error;
        }
    }
    pub fn entries(&self) -> f64 {
        self.entries
    }
    pub fn set_entries(&mut self, entries: f64) {
        self.entries = entries;
    }
    /// Sum of the in-range bin contents.
    pub fn integral(&self) -> f64 {
        let in_range: Vec<f64> = (1..=self.y.n_bins)
            .flat_map(|iy| (1..=self.x.n_bins).map(move |ix| (ix, iy)))
            .map(|(ix, iy)| self.bin_content(ix, iy))
            .collect();
        sum_f64(&in_range)
    }
    pub fn scale(&mut self, factor: f64) {
        self.contents.iter_mut().for_each(|c| *c *= factor);
        self.sumw2.iter_mut().for_each(|w2| *w2 *= factor * factor);
    }
    pub fn reset(&mut self) {
        self.contents.iter_mut().for_each(|c| *c = 0.0);
        self.sumw2.iter_mut().for_each(|w2| *w2 = 0.0);
        self.entries = 0.0;
    }
    pub fn same_dimensions(&self, other: &Histogram2D) -> bool {
        self.x.same_binning(&other.x) && self.y.same_binning(&other.y)
    }
    /// Add `coefficient * other` bin by bin.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::DimensionMismatch`] if the binnings differ.
    pub fn add(&mut self, other: &Histogram2D, coefficient: f64) -> CapResult<()> {
        if !self.same_dimensions(other) {
            return Err(CapError::DimensionMismatch {
                name: other.name.clone(),
            });
        }
        for (bin, (c, w2)) in self.contents.iter_mut().zip(self.sumw2.iter_mut()).enumerate() {
            *c += coefficient * other.contents[bin];
            *w2 += coefficient * coefficient * other.sumw2[bin];
        }
        self.entries += other.entries;
        Ok(())
    }
    /// Project onto the $`x`$ axis, summing the in-range $`y`$ bins.
    pub fn projection_x<N: Into<String>>(&self, name: N) -> Histogram1D {
        let mut projection = Histogram1D::new(name, self.title.clone(), self.x.clone());
        for ix in 0..self.x.n_bins + 2 {
            for iy in 1..=self.y.n_bins {
                let bin = ix + (self.x.n_bins + 2) * iy;
                projection.contents[ix] += self.contents[bin];
                projection.sumw2[ix] += self.sumw2[bin];
            }
        }
        projection.entries = self.entries;
        projection
    }
    /// Project onto the $`y`$ axis, summing the in-range $`x`$ bins.
    pub fn projection_y<N: Into<String>>(&self, name: N) -> Histogram1D {
        let mut projection = Histogram1D::new(name, self.title.clone(), self.y.clone());
        for iy in 0..self.y.n_bins + 2 {
            for ix in 1..=self.x.n_bins {
                let bin = ix + (self.x.n_bins + 2) * iy;
                projection.contents[iy] += self.contents[bin];
                projection.sumw2[iy] += self.sumw2[bin];
            }
        }
        projection.entries = self.entries;
        projection
    }
}

/// Either kind of histogram, as held by a [`HistogramStore`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Histogram {
    OneD(Histogram1D),
    TwoD(Histogram2D),
}

impl Histogram {
    pub fn name(&self) -> &str {
        match self {
            Histogram::OneD(h) => h.name(),
            Histogram::TwoD(h) => h.name(),
        }
    }
}

/// A tag which refers to a [`Histogram1D`] owned by a [`HistogramCollection`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct H1ID(pub(crate) usize);

/// A tag which refers to a [`Histogram2D`] owned by a [`HistogramCollection`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct H2ID(pub(crate) usize);

impl Display for H1ID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "H1(id={})", self.0)
    }
}

impl Display for H2ID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "H2(id={})", self.0)
    }
}

/// Lifecycle of a histogram group.
///
/// `Uncreated -> Created -> Filling -> Frozen -> DerivedComputed`. Primary groups stop at
/// `Frozen`, derived groups go from `Created` straight to `DerivedComputed`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupState {
    Uncreated,
    Created,
    Filling,
    Frozen,
    DerivedComputed,
}

impl Display for GroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupState::Uncreated => write!(f, "Uncreated"),
            GroupState::Created => write!(f, "Created"),
            GroupState::Filling => write!(f, "Filling"),
            GroupState::Frozen => write!(f, "Frozen"),
            GroupState::DerivedComputed => write!(f, "DerivedComputed"),
        }
    }
}

/// The histograms owned by one group, addressed by [`H1ID`]/[`H2ID`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistogramCollection {
    name: String,
    h1: Vec<Histogram1D>,
    h2: Vec<Histogram2D>,
    state: GroupState,
}

impl HistogramCollection {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            h1: Vec::new(),
            h2: Vec::new(),
            state: GroupState::Uncreated,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn state(&self) -> GroupState {
        self.state
    }
    pub fn set_state(&mut self, state: GroupState) {
        self.state = state;
    }
    /// Fail with [`CapError::InvalidState`] unless the collection is in one of `allowed`.
    pub fn require_state(&self, allowed: &[GroupState]) -> CapResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CapError::InvalidState {
                group: self.name.clone(),
                expected: allowed
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(" or "),
                found: self.state.to_string(),
            })
        }
    }
    pub fn create_1d<N: Into<String>, T: Into<String>>(
        &mut self,
        name: N,
        title: T,
        x: Axis,
    ) -> H1ID {
        self.push_1d(Histogram1D::new(name, title, x))
    }
    pub fn create_2d<N: Into<String>, T: Into<String>>(
        &mut self,
        name: N,
        title: T,
        x: Axis,
        y: Axis,
    ) -> H2ID {
        self.push_2d(Histogram2D::new(name, title, x, y))
    }
    /// Take ownership of an already built histogram.
    pub fn push_1d(&mut self, histogram: Histogram1D) -> H1ID {
        self.h1.push(histogram);
        H1ID(self.h1.len() - 1)
    }
    pub fn push_2d(&mut self, histogram: Histogram2D) -> H2ID {
        self.h2.push(histogram);
        H2ID(self.h2.len() - 1)
    }
    /// Copy the named histogram out of `store`.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::HistogramNotFound`] if `store` has no 1D histogram called `name`.
    pub fn load_1d(&mut self, store: &HistogramStore, name: &str) -> CapResult<H1ID> {
        let histogram = store.get_1d(name)?.clone();
        Ok(self.push_1d(histogram))
    }
    /// Copy the named histogram out of `store`.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::HistogramNotFound`] if `store` has no 2D histogram called `name`.
    pub fn load_2d(&mut self, store: &HistogramStore, name: &str) -> CapResult<H2ID> {
        let histogram = store.get_2d(name)?.clone();
        Ok(self.push_2d(histogram))
    }
    pub fn n_histograms(&self) -> usize {
        self.h1.len() + self.h2.len()
    }
    pub fn histograms_1d(&self) -> &[Histogram1D] {
        &self.h1
    }
    pub fn histograms_2d(&self) -> &[Histogram2D] {
        &self.h2
    }
    /// Look up a 1D histogram by name.
    pub fn find_1d(&self, name: &str) -> Option<&Histogram1D> {
        self.h1.iter().find(|h| h.name() == name)
    }
    /// Look up a 2D histogram by name.
    pub fn find_2d(&self, name: &str) -> Option<&Histogram2D> {
        self.h2.iter().find(|h| h.name() == name)
    }
    /// Copy every histogram into `store`, replacing histograms with the same names.
    pub fn save_into(&self, store: &mut HistogramStore) {
        for h in &self.h1 {
            store.insert(Histogram::OneD(h.clone()));
        }
        for h in &self.h2 {
            store.insert(Histogram::TwoD(h.clone()));
        }
    }
    pub fn scale(&mut self, factor: f64) {
        self.h1.iter_mut().for_each(|h| h.scale(factor));
        self.h2.iter_mut().for_each(|h| h.scale(factor));
    }
    /// Drop every histogram and return to [`GroupState::Uncreated`].
    pub fn clear(&mut self) {
        self.h1.clear();
        self.h2.clear();
        self.state = GroupState::Uncreated;
    }
    /// Zero every histogram.
    pub fn reset_contents(&mut self) {
        self.h1.iter_mut().for_each(Histogram1D::reset);
        self.h2.iter_mut().for_each(Histogram2D::reset);
    }
}

impl Index<H1ID> for HistogramCollection {
    type Output = Histogram1D;

    fn index(&self, id: H1ID) -> &Self::Output {
        &self.h1[id.0]
    }
}

impl IndexMut<H1ID> for HistogramCollection {
    fn index_mut(&mut self, id: H1ID) -> &mut Self::Output {
        &mut self.h1[id.0]
    }
}

impl Index<H2ID> for HistogramCollection {
    type Output = Histogram2D;

    fn index(&self, id: H2ID) -> &Self::Output {
        &self.h2[id.0]
    }
}

impl IndexMut<H2ID> for HistogramCollection {
    fn index_mut(&mut self, id: H2ID) -> &mut Self::Output {
        &mut self.h2[id.0]
    }
}

/// An insertion-ordered, persistent set of named histograms.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramStore {
    histograms: IndexMap<String, Histogram>,
}

impl HistogramStore {
    pub fn new() -> Self {
        Self::default()
    }
    /// Insert a histogram under its own name, replacing any previous one.
    pub fn insert(&mut self, histogram: Histogram) {
        self.histograms
            .insert(histogram.name().to_string(), histogram);
    }
    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.histograms.contains_key(name)
    }
    pub fn get_1d(&self, name: &str) -> CapResult<&Histogram1D> {
        match self.histograms.get(name) {
            Some(Histogram::OneD(h)) => Ok(h),
            _ => Err(CapError::HistogramNotFound {
                name: name.to_string(),
            }),
        }
    }
    pub fn get_2d(&self, name: &str) -> CapResult<&Histogram2D> {
        match self.histograms.get(name) {
            Some(Histogram::TwoD(h)) => Ok(h),
            _ => Err(CapError::HistogramNotFound {
                name: name.to_string(),
            }),
        }
    }
    pub fn remove(&mut self, name: &str) -> Option<Histogram> {
        self.histograms.shift_remove(name)
    }
    pub fn len(&self) -> usize {
        self.histograms.len()
    }
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.histograms.keys().map(String::as_str)
    }
    /// Write the store to a file. The path may contain `~` and environment variables.
    pub fn write(&self, file_path: &str) -> CapResult<()> {
        let path = PathBuf::from(&*shellexpand::full(file_path)?);
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        Ok(())
    }
    /// Read a store written by [`HistogramStore::write`].
    pub fn read(file_path: &str) -> CapResult<Self> {
        let path = PathBuf::from(&*shellexpand::full(file_path)?);
        let mut reader = BufReader::new(File::open(path)?);
        Ok(bincode::serde::decode_from_std_read(
            &mut reader,
            bincode::config::standard(),
        )?)
    }
}

/// Check the preconditions of a derived calculation: every source must be frozen (or loaded
/// from a store) and the target freshly created.
pub fn require_derivable(
    sources: &[&HistogramCollection],
    target: &HistogramCollection,
) -> CapResult<()> {
    for source in sources {
        source.require_state(&[GroupState::Frozen, GroupState::DerivedComputed])?;
    }
    target.require_state(&[GroupState::Created])
}

/// A named group of histograms with a lifecycle.
///
/// Implementors own a [`HistogramCollection`] and a [`Configuration`] and build their
/// histograms in [`HistogramGroup::create_histograms`] or pull them from a store in
/// [`HistogramGroup::load_histograms`]. The provided methods manage the lifecycle.
pub trait HistogramGroup {
    fn configuration(&self) -> &Configuration;
    fn histograms(&self) -> &HistogramCollection;
    fn histograms_mut(&mut self) -> &mut HistogramCollection;

    /// Build the histograms of this group and move it to [`GroupState::Created`].
    fn create_histograms(&mut self) -> CapResult<()>;

    /// Load the histograms of this group from `store`.
    ///
    /// Stored aggregates are final, so a loaded group is [`GroupState::Frozen`].
    fn load_histograms(&mut self, store: &HistogramStore) -> CapResult<()>;

    /// Hook run by [`HistogramGroup::freeze`] before scaling.
    fn finalize(&mut self) -> CapResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        self.histograms().name()
    }
    fn state(&self) -> GroupState {
        self.histograms().state()
    }
    /// Copy every histogram of this group into `store`.
    fn save_histograms(&self, store: &mut HistogramStore) {
        self.histograms().save_into(store);
    }
    /// Check that the group accepts fills and mark it as filling.
    ///
    /// Fills on a group which is not created, or already frozen, are logged and must be
    /// skipped by the caller.
    fn begin_fill(&mut self) -> bool {
        let collection = self.histograms_mut();
        match collection.state() {
            GroupState::Created | GroupState::Filling => {
                collection.set_state(GroupState::Filling);
                true
            }
            state => {
                log::error!(
                    "Group \"{}\" cannot be filled while {state}",
                    collection.name()
                );
                false
            }
        }
    }
    /// End filling, optionally scaling every histogram by `scale`.
    fn freeze(&mut self, scale: Option<f64>) -> CapResult<()> {
        self.histograms()
            .require_state(&[GroupState::Created, GroupState::Filling])?;
        self.finalize()?;
        let collection = self.histograms_mut();
        if let Some(factor) = scale {
            collection.scale(factor);
        }
        collection.set_state(GroupState::Frozen);
        Ok(())
    }
    /// Zero every histogram and return to [`GroupState::Created`].
    fn reset(&mut self) {
        let collection = self.histograms_mut();
        collection.reset_contents();
        if collection.state() != GroupState::Uncreated {
            collection.set_state(GroupState::Created);
        }
    }
    /// Load from `store`, escalating `context` to [`TaskStatus::Fatal`] on failure.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::Fatal`] wrapping the load error.
    fn load_or_escalate(&mut self, store: &HistogramStore, context: &RunContext) -> CapResult<()> {
        match self.load_histograms(store) {
            Ok(()) => Ok(()),
            Err(err) => {
                let reason = format!("cannot load group \"{}\": {err}", self.name());
                context.report_fatal(reason.clone());
                debug_assert_eq!(context.status(), TaskStatus::Fatal);
                Err(CapError::Fatal { reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_axis_conventions() {
        let axis = Axis::new(10, 0.0, 1.0, "x");
        assert_eq!(axis.find_bin(-0.1), 0);
        assert_eq!(axis.find_bin(0.0), 1);
        assert_eq!(axis.find_bin(0.95), 10);
        assert_eq!(axis.find_bin(1.0), 11);
        assert_eq!(axis.find_bin(f64::NAN), 11);
        assert_relative_eq!(axis.bin_center(1), 0.05);
        assert_relative_eq!(axis.bin_low_edge(10), 0.9);
        assert_relative_eq!(axis.width(), 0.1);
    }

    #[test]
    fn test_fill_and_integral() {
        let mut h = Histogram1D::new("h", "h", Axis::new(4, 0.0, 4.0, "x"));
        h.fill(0.5, 1.0);
        h.fill(1.5, 2.0);
        h.fill(1.5, 2.0);
        h.fill(9.0, 5.0);
        h.add_bin_content(4, 0.5);
        assert_eq!(h.entries(), 4.0);
        assert_relative_eq!(h.bin_content(2), 4.0);
        assert_relative_eq!(h.bin_error(2), 8.0_f64.sqrt());
        assert_relative_eq!(h.bin_content(5), 5.0);
        assert_relative_eq!(h.integral(), 5.5);
        h.scale(2.0);
        assert_relative_eq!(h.bin_content(2), 8.0);
        assert_relative_eq!(h.bin_error(2), 2.0 * 8.0_f64.sqrt());
        h.reset();
        assert_eq!(h.integral(), 0.0);
        assert_eq!(h.entries(), 0.0);
    }

    #[test]
    fn test_add_checks_dimensions() {
        let mut a = Histogram1D::new("a", "a", Axis::new(4, 0.0, 4.0, "x"));
        let mut b = Histogram1D::new("b", "b", Axis::new(4, 0.0, 4.0, "other title"));
        let c = Histogram1D::new("c", "c", Axis::new(5, 0.0, 4.0, "x"));
        a.fill(1.0, 1.0);
        b.fill(1.0, 3.0);
        a.add(&b, -0.5).unwrap();
        assert_relative_eq!(a.bin_content(2), -0.5);
        assert!(matches!(
            a.add(&c, 1.0),
            Err(CapError::DimensionMismatch { name }) if name == "c"
        ));
    }

    #[test]
    fn test_projections() {
        let mut h = Histogram2D::new(
            "h",
            "h",
            Axis::new(2, 0.0, 2.0, "x"),
            Axis::new(3, 0.0, 3.0, "y"),
        );
        h.fill(0.5, 0.5, 1.0);
        h.fill(0.5, 2.5, 2.0);
        h.fill(1.5, 1.5, 4.0);
        h.fill(1.5, 7.0, 8.0);
        let px = h.projection_x("px");
        assert_relative_eq!(px.bin_content(1), 3.0);
        assert_relative_eq!(px.bin_content(2), 4.0);
        let py = h.projection_y("py");
        assert_relative_eq!(py.bin_content(1), 1.0);
        assert_relative_eq!(py.bin_content(2), 4.0);
        assert_relative_eq!(py.bin_content(3), 2.0);
        assert_relative_eq!(py.bin_content(4), 8.0);
        assert_relative_eq!(h.integral(), 7.0);
        assert_eq!(h.get_bin(1.5, -1.0), (2, 0));
    }

    struct Counts {
        configuration: Configuration,
        collection: HistogramCollection,
        counts: Option<H1ID>,
    }

    impl Counts {
        fn new() -> Self {
            Self {
                configuration: Configuration::new("Counts"),
                collection: HistogramCollection::new("Counts"),
                counts: None,
            }
        }
    }

    impl HistogramGroup for Counts {
        fn configuration(&self) -> &Configuration {
            &self.configuration
        }
        fn histograms(&self) -> &HistogramCollection {
            &self.collection
        }
        fn histograms_mut(&mut self) -> &mut HistogramCollection {
            &mut self.collection
        }
        fn create_histograms(&mut self) -> CapResult<()> {
            self.collection.require_state(&[GroupState::Uncreated])?;
            self.counts = Some(
                self.collection
                    .create_1d("Counts_n", "n", Axis::new(5, 0.0, 5.0, "n")),
            );
            self.collection.set_state(GroupState::Created);
            Ok(())
        }
        fn load_histograms(&mut self, store: &HistogramStore) -> CapResult<()> {
            self.collection.require_state(&[GroupState::Uncreated])?;
            self.counts = Some(self.collection.load_1d(store, "Counts_n")?);
            self.collection.set_state(GroupState::Frozen);
            Ok(())
        }
    }

    #[test]
    fn test_group_lifecycle() {
        let mut group = Counts::new();
        assert!(!group.begin_fill());
        group.create_histograms().unwrap();
        assert!(group.create_histograms().is_err());
        assert!(group.begin_fill());
        let id = group.counts.unwrap();
        group.histograms_mut()[id].fill(2.5, 1.0);
        group.freeze(Some(0.5)).unwrap();
        assert_eq!(group.state(), GroupState::Frozen);
        assert!(!group.begin_fill());
        assert!(matches!(
            group.freeze(None),
            Err(CapError::InvalidState { .. })
        ));
        assert_relative_eq!(group.histograms()[id].bin_content(3), 0.5);
        group.reset();
        assert_eq!(group.state(), GroupState::Created);
        assert_eq!(group.histograms()[id].integral(), 0.0);
    }

    #[test]
    fn test_store_round_trip_and_fatal_load() {
        let mut group = Counts::new();
        group.create_histograms().unwrap();
        group.begin_fill();
        let id = group.counts.unwrap();
        group.histograms_mut()[id].fill(1.5, 3.0);
        group.freeze(None).unwrap();
        let mut store = HistogramStore::new();
        group.save_histograms(&mut store);
        let path = env::temp_dir().join(format!("cap_store_{}.bin", fastrand::u64(..)));
        let path_str = path.to_string_lossy().to_string();
        store.write(&path_str).unwrap();
        let restored = HistogramStore::read(&path_str).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(restored, store);

        let mut loaded = Counts::new();
        let context = RunContext::new();
        loaded.load_or_escalate(&restored, &context).unwrap();
        assert_eq!(loaded.state(), GroupState::Frozen);
        assert_relative_eq!(loaded.histograms()[loaded.counts.unwrap()].bin_content(2), 3.0);
        assert!(!context.is_fatal());

        let mut missing = Counts::new();
        let err = missing
            .load_or_escalate(&HistogramStore::new(), &context)
            .unwrap_err();
        assert!(matches!(err, CapError::Fatal { .. }));
        assert!(context.is_fatal());
        assert_eq!(context.fatal_reasons().len(), 1);
    }

    #[test]
    fn test_derivable_preconditions() {
        let mut source = HistogramCollection::new("source");
        let mut target = HistogramCollection::new("target");
        source.set_state(GroupState::Filling);
        target.set_state(GroupState::Created);
        assert!(require_derivable(&[&source], &target).is_err());
        source.set_state(GroupState::Frozen);
        assert!(require_derivable(&[&source], &target).is_ok());
        target.set_state(GroupState::DerivedComputed);
        assert!(matches!(
            require_derivable(&[&source], &target),
            Err(CapError::InvalidState { found, .. }) if found == "DerivedComputed"
        ));
    }
}
