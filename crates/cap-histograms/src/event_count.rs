use cap_core::{make_name, Axis, CapResult, Configuration, HistogramCollection, HistogramGroup, H1ID};
use serde::{Deserialize, Serialize};

use crate::HistogramSource;

/// Bookkeeping counters of an analyzer: how often it ran, how many events each event filter
/// accepted and how many particles each (event filter, particle filter) combination accepted.
///
/// Counters are integer-centered, so event filter `i` sits in the bin centered on `i` and
/// combination `(iE, iP)` in the one centered on `iE * nParticleFilters + iP`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventCountHistos {
    configuration: Configuration,
    histograms: HistogramCollection,
    n_event_filters: usize,
    n_particle_filters: usize,
    pub(crate) task_executed: H1ID,
    pub(crate) event_accepted: H1ID,
    pub(crate) particle_accepted: H1ID,
}

impl EventCountHistos {
    pub fn new(name: &str, n_event_filters: usize, n_particle_filters: usize) -> Self {
        Self {
            configuration: Configuration::new(name),
            histograms: HistogramCollection::new(name),
            n_event_filters,
            n_particle_filters,
            task_executed: H1ID::default(),
            event_accepted: H1ID::default(),
            particle_accepted: H1ID::default(),
        }
    }

    /// The flat index of an (event filter, particle filter) combination.
    pub fn index(&self, i_event_filter: usize, i_particle_filter: usize) -> usize {
        i_event_filter * self.n_particle_filters + i_particle_filter
    }

    fn build(&mut self, source: HistogramSource) -> CapResult<()> {
        let bn = self.histograms.name().to_string();
        let h = &mut self.histograms;
        let counter = |n: usize, title: &str| Axis::new(n, -0.5, n as f64 - 0.5, title);
        let n = self.n_event_filters * self.n_particle_filters;
        self.task_executed = source.h1(
            h,
            make_name(&[&bn, "nTaskExecuted"]),
            "Count",
            counter(1, "nTaskExecuted"),
        )?;
        self.event_accepted = source.h1(
            h,
            make_name(&[&bn, "nEventAccepted"]),
            "Count",
            counter(self.n_event_filters, "event filter"),
        )?;
        self.particle_accepted = source.h1(
            h,
            make_name(&[&bn, "nParticleAccepted"]),
            "Count",
            counter(n, "event x particle filter"),
        )?;
        Ok(())
    }

    /// Record the counters of a run. Meant to be called once, before saving.
    pub fn fill(
        &mut self,
        n_task_executed: u64,
        n_events_accepted: &[u64],
        n_particles_accepted: &[u64],
    ) {
        if !self.begin_fill() {
            return;
        }
        let n = self.n_event_filters * self.n_particle_filters;
        if n_events_accepted.len() < self.n_event_filters || n_particles_accepted.len() < n {
            log::error!(
                "Group \"{}\" expects {} event and {} particle counters",
                self.histograms.name(),
                self.n_event_filters,
                n
            );
            return;
        }
        let h = &mut self.histograms;
        h[self.task_executed].fill(0.0, n_task_executed as f64);
        for (i, &count) in n_events_accepted.iter().take(self.n_event_filters).enumerate() {
            h[self.event_accepted].fill(i as f64, count as f64);
        }
        for (i, &count) in n_particles_accepted.iter().take(n).enumerate() {
            h[self.particle_accepted].fill(i as f64, count as f64);
        }
    }
}

impl_histogram_group!(EventCountHistos);
