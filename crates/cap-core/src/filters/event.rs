use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    data::{Event, EventProperties},
    filters::{Filter, Resolution, Selector},
    CapError, CapResult,
};

/// Event-level quantities an [`EventFilter`] can cut on.
///
/// Each variant holds an index into the corresponding vector of
/// [`EventProperties`](crate::data::EventProperties).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSelector {
    /// A generator model parameter (type 0).
    ModelParameter(usize),
    /// The number of particles accepted by a particle filter (type 1).
    NFiltered(usize),
    /// The energy accepted by a particle filter (type 2).
    EFiltered(usize),
    /// The net charge accepted by a particle filter (type 3).
    QFiltered(usize),
    /// The net strangeness accepted by a particle filter (type 4).
    SFiltered(usize),
    /// The net baryon number accepted by a particle filter (type 5).
    BFiltered(usize),
}

impl EventSelector {
    fn source<'a>(&self, properties: &'a EventProperties) -> (&'a [f64], usize) {
        match *self {
            EventSelector::ModelParameter(i) => (&properties.model_parameters, i),
            EventSelector::NFiltered(i) => (&properties.n_filtered, i),
            EventSelector::EFiltered(i) => (&properties.e_filtered, i),
            EventSelector::QFiltered(i) => (&properties.q_filtered, i),
            EventSelector::SFiltered(i) => (&properties.s_filtered, i),
            EventSelector::BFiltered(i) => (&properties.b_filtered, i),
        }
    }
}

impl Display for EventSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSelector::ModelParameter(i) => write!(f, "modelParameters[{i}]"),
            EventSelector::NFiltered(i) => write!(f, "nFiltered[{i}]"),
            EventSelector::EFiltered(i) => write!(f, "eFiltered[{i}]"),
            EventSelector::QFiltered(i) => write!(f, "qFiltered[{i}]"),
            EventSelector::SFiltered(i) => write!(f, "sFiltered[{i}]"),
            EventSelector::BFiltered(i) => write!(f, "bFiltered[{i}]"),
        }
    }
}

impl Selector for EventSelector {
    type Target = Event;

    fn resolve(&self, target: &Event) -> Resolution {
        let Some(properties) = target.properties() else {
            return Resolution::Unresolved(format!(
                "event {} has no properties",
                target.event_number
            ));
        };
        let (values, index) = self.source(properties);
        match values.get(index) {
            Some(value) => Resolution::Value(*value),
            None => Resolution::Unresolved(format!(
                "index {index} out of bounds for {} entries",
                values.len()
            )),
        }
    }

    fn from_codes(filter_type: i32, filter_subtype: i32) -> CapResult<Self> {
        let unknown = CapError::UnknownSelector {
            filter_type,
            filter_subtype,
        };
        let Ok(index) = usize::try_from(filter_subtype) else {
            return Err(unknown);
        };
        match filter_type {
            0 => Ok(Self::ModelParameter(index)),
            1 => Ok(Self::NFiltered(index)),
            2 => Ok(Self::EFiltered(index)),
            3 => Ok(Self::QFiltered(index)),
            4 => Ok(Self::SFiltered(index)),
            5 => Ok(Self::BFiltered(index)),
            _ => Err(unknown),
        }
    }

    fn codes(&self) -> (i32, i32) {
        let (filter_type, index) = match *self {
            EventSelector::ModelParameter(i) => (0, i),
            EventSelector::NFiltered(i) => (1, i),
            EventSelector::EFiltered(i) => (2, i),
            EventSelector::QFiltered(i) => (3, i),
            EventSelector::SFiltered(i) => (4, i),
            EventSelector::BFiltered(i) => (5, i),
        };
        (filter_type, index as i32)
    }
}

/// A [`Filter`] over [`Event`]s.
pub type EventFilter = Filter<EventSelector>;

impl EventFilter {
    /// A filter named "All" which accepts every event.
    pub fn open() -> Self {
        Self::new("All", "All")
    }

    /// A filter on one model parameter, named after its range.
    pub fn model_parameter_range(index: usize, min: f64, max: f64) -> Self {
        let name = format!("MP{index}_{min}To{max}");
        let title = format!("{min} #leq p_{{{index}}} < {max}");
        Self::new(name, title).with_condition(EventSelector::ModelParameter(index), min, max)
    }

    /// A filter on the number of particles accepted by particle filter `index`.
    pub fn multiplicity_range(index: usize, min: f64, max: f64) -> Self {
        let name = format!("N{index}_{min}To{max}");
        let title = format!("{min} #leq n_{{{index}}} < {max}");
        Self::new(name, title).with_condition(EventSelector::NFiltered(index), min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_event;

    #[test]
    fn test_open_filter_accepts_without_properties() {
        let event = Event::new(7, vec![]);
        assert!(EventFilter::open().accept(&event));
        assert_eq!(EventFilter::open().name(), "All");
    }

    #[test]
    fn test_missing_properties_reject() {
        let event = Event::new(7, vec![]);
        let filter = EventFilter::model_parameter_range(0, 0.0, 1.0);
        assert!(!filter.accept(&event));
    }

    #[test]
    fn test_model_parameter() {
        let event = test_event();
        assert!(EventFilter::model_parameter_range(0, 0.5, 1.0).accept(&event));
        assert!(!EventFilter::model_parameter_range(0, 0.0, 0.7).accept(&event));
        // out of bounds
        assert!(!EventFilter::model_parameter_range(3, -1e9, 1e9).accept(&event));
    }

    #[test]
    fn test_filtered_counts() {
        let mut event = test_event();
        if let Some(properties) = event.properties.as_mut() {
            properties.n_filtered = vec![12.0, 3.0];
            properties.q_filtered = vec![-1.0];
        }
        let mut filter = EventFilter::new("nq", "nq");
        filter.add_condition_codes(1, 1, 2.0, 4.0).unwrap();
        filter.add_condition_codes(3, 0, -1.0, -1.0).unwrap();
        assert!(filter.accept(&event));
        assert!(!EventFilter::multiplicity_range(0, 0.0, 12.0).accept(&event));
        assert!(!EventFilter::new("e", "e")
            .with_condition(EventSelector::EFiltered(0), 0.0, 1.0)
            .accept(&event));
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            EventSelector::from_codes(5, 2).unwrap(),
            EventSelector::BFiltered(2)
        );
        assert_eq!(EventSelector::SFiltered(3).codes(), (4, 3));
        assert!(EventSelector::from_codes(6, 0).is_err());
        assert!(EventSelector::from_codes(1, -1).is_err());
    }
}
