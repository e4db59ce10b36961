use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

use crate::CapResult;

/// Event filters and the [`EventSelector`](event::EventSelector) which reads
/// [`EventProperties`](crate::data::EventProperties).
pub mod event;
/// Particle filters, their [`ParticleSelector`](particle::ParticleSelector) and the standard
/// filter factories.
pub mod particle;

/// The outcome of extracting the quantity a [`Condition`] tests from an object.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// A scalar to be tested against the condition limits.
    Value(f64),
    /// A precomputed yes/no answer (species and liveness tests).
    Flag(bool),
    /// The quantity could not be extracted. The reason is logged and the object rejected.
    Unresolved(String),
}

/// A quantity which can be extracted from objects of type [`Selector::Target`].
///
/// Selectors replace the integer `(filter_type, filter_subtype)` pairs of configuration files
/// with sum types. [`Selector::from_codes`] and [`Selector::codes`] convert between the two.
pub trait Selector: Clone + Debug + Display + PartialEq + Send + Sync {
    /// The type of object this selector reads from.
    type Target;
    /// Extract the quantity from `target`.
    fn resolve(&self, target: &Self::Target) -> Resolution;
    /// Build a selector from its integer codes.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::UnknownSelector`](crate::CapError::UnknownSelector) if the codes do
    /// not name a known quantity.
    fn from_codes(filter_type: i32, filter_subtype: i32) -> CapResult<Self>;
    /// The integer codes of this selector.
    fn codes(&self) -> (i32, i32);
}

/// A test of one selected quantity against a pair of limits.
///
/// If `low == high` the condition is an equality test. Otherwise it accepts the half-open range
/// $`[\text{low}, \text{high})`$.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition<S> {
    selector: S,
    low: f64,
    high: f64,
}

impl<S: Selector> Condition<S> {
    pub fn new(selector: S, low: f64, high: f64) -> Self {
        Self {
            selector,
            low,
            high,
        }
    }
    pub fn selector(&self) -> &S {
        &self.selector
    }
    pub fn low(&self) -> f64 {
        self.low
    }
    pub fn high(&self) -> f64 {
        self.high
    }
    pub fn is_equality(&self) -> bool {
        self.low == self.high
    }
    /// Test a value against the limits.
    pub fn accept(&self, value: f64) -> bool {
        if self.is_equality() {
            value == self.low
        } else {
            self.low <= value && value < self.high
        }
    }
    /// Resolve the selector against `target` and test the result.
    ///
    /// Unresolvable quantities are logged and rejected.
    fn accept_target(&self, target: &S::Target, filter_name: &str) -> bool {
        match self.selector.resolve(target) {
            Resolution::Value(value) => self.accept(value),
            Resolution::Flag(flag) => flag,
            Resolution::Unresolved(reason) => {
                log::error!(
                    "Filter \"{filter_name}\": cannot resolve {}: {reason}",
                    self.selector
                );
                false
            }
        }
    }
}

impl<S: Selector> Display for Condition<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (filter_type, filter_subtype) = self.selector.codes();
        if self.is_equality() {
            write!(
                f,
                "{} == {} [{filter_type}:{filter_subtype}]",
                self.selector, self.low
            )
        } else {
            write!(
                f,
                "{} <= {} < {} [{filter_type}:{filter_subtype}]",
                self.low, self.selector, self.high
            )
        }
    }
}

/// A named conjunction of [`Condition`]s.
///
/// A filter without conditions accepts everything. Otherwise the conditions are tested in
/// order and the first failure rejects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter<S> {
    name: String,
    title: String,
    conditions: Vec<Condition<S>>,
}

impl<S: Selector> Filter<S> {
    /// An empty (accept-all) filter.
    pub fn new<N: Into<String>, T: Into<String>>(name: N, title: T) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            conditions: Vec::new(),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn set_name<N: Into<String>>(&mut self, name: N) {
        self.name = name.into();
    }
    pub fn set_title<T: Into<String>>(&mut self, title: T) {
        self.title = title.into();
    }
    /// Append a condition.
    pub fn add_condition(&mut self, selector: S, low: f64, high: f64) {
        self.conditions.push(Condition::new(selector, low, high));
    }
    /// Append a condition and return the filter.
    pub fn with_condition(mut self, selector: S, low: f64, high: f64) -> Self {
        self.add_condition(selector, low, high);
        self
    }
    /// Append a condition given by integer codes.
    ///
    /// # Errors
    ///
    /// Returns [`CapError::UnknownSelector`](crate::CapError::UnknownSelector) for codes with no
    /// selector. The filter is left unchanged in that case.
    pub fn add_condition_codes(
        &mut self,
        filter_type: i32,
        filter_subtype: i32,
        low: f64,
        high: f64,
    ) -> CapResult<()> {
        let selector = S::from_codes(filter_type, filter_subtype)?;
        self.add_condition(selector, low, high);
        Ok(())
    }
    pub fn n_conditions(&self) -> usize {
        self.conditions.len()
    }
    pub fn conditions(&self) -> &[Condition<S>] {
        &self.conditions
    }
    /// Check whether `target` passes every condition.
    pub fn accept(&self, target: &S::Target) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.accept_target(target, &self.name))
    }
}

impl<S: Selector> Display for Filter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Filter {} ({})", self.name, self.title)?;
        for (k, condition) in self.conditions.iter().enumerate() {
            writeln!(f, "  [{k}] {condition}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::CapError;

    /// Reads one slot of a slice and counts how often it was asked to.
    #[derive(Clone, Debug)]
    struct CountingSelector {
        slot: usize,
        calls: Arc<AtomicUsize>,
    }

    impl PartialEq for CountingSelector {
        fn eq(&self, other: &Self) -> bool {
            self.slot == other.slot
        }
    }

    impl Display for CountingSelector {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "slot {}", self.slot)
        }
    }

    impl Selector for CountingSelector {
        type Target = Vec<f64>;

        fn resolve(&self, target: &Self::Target) -> Resolution {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match target.get(self.slot) {
                Some(value) => Resolution::Value(*value),
                None => Resolution::Unresolved(format!("no slot {}", self.slot)),
            }
        }
        fn from_codes(filter_type: i32, filter_subtype: i32) -> CapResult<Self> {
            if filter_type == 0 && filter_subtype >= 0 {
                Ok(Self {
                    slot: filter_subtype as usize,
                    calls: Arc::new(AtomicUsize::new(0)),
                })
            } else {
                Err(CapError::UnknownSelector {
                    filter_type,
                    filter_subtype,
                })
            }
        }
        fn codes(&self) -> (i32, i32) {
            (0, self.slot as i32)
        }
    }

    fn counting(slot: usize) -> (CountingSelector, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingSelector {
                slot,
                calls: calls.clone(),
            },
            calls,
        )
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter: Filter<CountingSelector> = Filter::new("All", "All");
        assert!(filter.accept(&vec![]));
        assert!(filter.accept(&vec![f64::NAN, -1e300]));
        assert_eq!(filter.n_conditions(), 0);
    }

    #[test]
    fn test_short_circuit() {
        let (s0, c0) = counting(0);
        let (s1, c1) = counting(1);
        let (s2, c2) = counting(2);
        let filter = Filter::new("f", "f")
            .with_condition(s0, 0.0, 1.0)
            .with_condition(s1, 0.0, 1.0)
            .with_condition(s2, 0.0, 1.0);
        assert!(!filter.accept(&vec![0.5, 2.0, 0.5]));
        assert_eq!(c0.load(Ordering::SeqCst), 1);
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 0);
        assert!(filter.accept(&vec![0.5, 0.5, 0.5]));
        assert_eq!(c2.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_conjunction_matches_conditions() {
        let (s0, _) = counting(0);
        let (s1, _) = counting(1);
        let filter = Filter::new("f", "f")
            .with_condition(s0, -1.0, 1.0)
            .with_condition(s1, 2.0, 2.0);
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..200 {
            let x = vec![rng.f64() * 4.0 - 2.0, if rng.bool() { 2.0 } else { 1.5 }];
            let expected =
                filter.conditions()[0].accept(x[0]) && filter.conditions()[1].accept(x[1]);
            assert_eq!(filter.accept(&x), expected);
        }
    }

    #[test]
    fn test_half_open_range() {
        let (s0, _) = counting(0);
        let condition = Condition::new(s0, 0.2, 2.0);
        assert!(condition.accept(0.2));
        assert!(!condition.accept(2.0));
        assert!(condition.accept(2.0 - f64::EPSILON));
        assert!(condition.accept(f64::from_bits(2.0_f64.to_bits() - 1)));
        assert!(!condition.accept(f64::from_bits(0.2_f64.to_bits() - 1)));
        assert!(!condition.accept(f64::NAN));
    }

    #[test]
    fn test_equality_condition() {
        let (s0, _) = counting(0);
        let condition = Condition::new(s0, 1111.0, 1111.0);
        assert!(condition.is_equality());
        assert!(condition.accept(1111.0));
        assert!(!condition.accept(1111.5));
    }

    #[test]
    fn test_unresolved_rejects() {
        let (s5, _) = counting(5);
        let filter = Filter::new("f", "f").with_condition(s5, 0.0, 1.0);
        assert!(!filter.accept(&vec![0.5]));
    }

    #[test]
    fn test_condition_codes() {
        let mut filter: Filter<CountingSelector> = Filter::new("f", "f");
        filter.add_condition_codes(0, 1, 0.0, 1.0).unwrap();
        assert_eq!(filter.conditions()[0].selector().codes(), (0, 1));
        let err = filter.add_condition_codes(3, 1, 0.0, 1.0).unwrap_err();
        assert!(matches!(
            err,
            CapError::UnknownSelector {
                filter_type: 3,
                filter_subtype: 1
            }
        ));
        assert_eq!(filter.n_conditions(), 1);
    }
}
