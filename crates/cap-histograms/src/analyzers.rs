use std::sync::Arc;

use cap_core::{
    make_name, BinningSet, CapResult, Configuration, Event, EventFilter, HistogramGroup,
    HistogramStore, MultiplicityType, Particle, ParticleDigit, ParticleFilter, RunContext,
};

use crate::{
    merged_configuration, transverse_spherocity, EventCountHistos, GlobalDerivedHistos,
    GlobalHistos, NuDynDerivedHistos, NuDynHistos, ParticleDerivedHistos, ParticleHistos,
    ParticlePairCombinedHistos, ParticlePairDerivedHistos, ParticlePairHistos,
    TransverseSpherocityHistos,
};

/// A driver which applies event and particle filters to events and fills histogram groups.
///
/// An external event loop calls [`Analyzer::analyze`] once per event and [`Analyzer::finish`]
/// at the end of the run. Every analyzer shares a [`RunContext`] with the loop and stops
/// analyzing once the run turns fatal.
pub trait Analyzer {
    fn name(&self) -> &str;
    /// Create every group this analyzer fills.
    fn create_histograms(&mut self) -> CapResult<()>;
    /// Load every group from `store`, escalating the run context on failure.
    fn load_histograms(&mut self, store: &HistogramStore) -> CapResult<()>;
    fn analyze(&mut self, event: &Event);
    /// Record the event counters and freeze every group.
    fn finish(&mut self) -> CapResult<()>;
    fn save(&self, store: &mut HistogramStore);
    /// Compute the derived groups of the frozen (or loaded) groups and save them into `store`.
    fn derived(&self, store: &mut HistogramStore) -> CapResult<()>;
}

/// State every analyzer carries: its filters, its counters and the run context.
#[derive(Debug)]
struct AnalyzerCore {
    name: String,
    configuration: Configuration,
    context: Arc<RunContext>,
    event_filters: Vec<EventFilter>,
    particle_filters: Vec<ParticleFilter>,
    counts: EventCountHistos,
    n_task_executed: u64,
    n_events_accepted: Vec<u64>,
    n_particles_accepted: Vec<u64>,
}

impl AnalyzerCore {
    fn new(
        name: &str,
        defaults: Configuration,
        configuration: &Configuration,
        context: Arc<RunContext>,
        event_filters: Vec<EventFilter>,
        particle_filters: Vec<ParticleFilter>,
    ) -> Self {
        let (n_event_filters, n_particle_filters) = (event_filters.len(), particle_filters.len());
        Self {
            name: name.to_string(),
            configuration: merged_configuration(name, defaults, configuration),
            context,
            event_filters,
            particle_filters,
            counts: EventCountHistos::new(name, n_event_filters, n_particle_filters),
            n_task_executed: 0,
            n_events_accepted: vec![0; n_event_filters],
            n_particles_accepted: vec![0; n_event_filters * n_particle_filters],
        }
    }

    /// `name_eventFilter_parts...`, the name of a group of this analyzer.
    fn group_name(&self, i_event_filter: usize, parts: &[&str]) -> String {
        let mut all = vec![self.name.as_str(), self.event_filters[i_event_filter].name()];
        all.extend_from_slice(parts);
        make_name(&all)
    }

    /// Like [`AnalyzerCore::group_name`], for the derived groups.
    fn derived_name(&self, i_event_filter: usize, parts: &[&str]) -> String {
        let prefix = format!("{}Derived", self.name);
        let mut all = vec![prefix.as_str(), self.event_filters[i_event_filter].name()];
        all.extend_from_slice(parts);
        make_name(&all)
    }

    fn particle_filter_names(&self) -> Vec<String> {
        self.particle_filters.iter().map(|f| f.name().to_string()).collect()
    }

    /// Count one execution and return the event filters accepting `event`.
    ///
    /// Nothing is accepted once the run is fatal.
    fn begin_event(&mut self, event: &Event) -> Vec<usize> {
        if self.context.is_fatal() {
            return Vec::new();
        }
        self.n_task_executed += 1;
        let accepted: Vec<usize> = self
            .event_filters
            .iter()
            .enumerate()
            .filter(|(_, filter)| filter.accept(event))
            .map(|(i, _)| i)
            .collect();
        for &i in &accepted {
            self.n_events_accepted[i] += 1;
        }
        accepted
    }

    fn count_particles(&mut self, i_event_filter: usize, i_particle_filter: usize, n: usize) {
        let index = self.counts.index(i_event_filter, i_particle_filter);
        self.n_particles_accepted[index] += n as u64;
    }

    /// The particles of `event` accepted by each particle filter.
    fn filtered_particles<'a>(&self, event: &'a Event) -> Vec<Vec<&'a Particle>> {
        self.particle_filters
            .iter()
            .map(|filter| event.particles.iter().filter(|p| filter.accept(p)).collect())
            .collect()
    }

    /// Digits of the particles of `event` accepted by each particle filter. A particle is
    /// digitized at most once.
    fn digitize(&self, event: &Event, binning: &BinningSet) -> Vec<Vec<ParticleDigit>> {
        let mut lists = vec![Vec::new(); self.particle_filters.len()];
        for particle in &event.particles {
            let mut digit = None;
            for (list, filter) in lists.iter_mut().zip(&self.particle_filters) {
                if filter.accept(particle) {
                    list.push(
                        digit
                            .get_or_insert_with(|| ParticleDigit::from_particle(particle, binning))
                            .clone(),
                    );
                }
            }
        }
        lists
    }

    fn create(&mut self) -> CapResult<()> {
        self.counts.create_histograms()
    }

    fn load(&mut self, store: &HistogramStore) -> CapResult<()> {
        self.counts.load_or_escalate(store, &self.context)
    }

    fn finish(&mut self) -> CapResult<()> {
        self.counts.fill(
            self.n_task_executed,
            &self.n_events_accepted,
            &self.n_particles_accepted,
        );
        self.counts.freeze(None)?;
        log::info!(
            "{}: {} executions, {:?} events accepted",
            self.name,
            self.n_task_executed,
            self.n_events_accepted
        );
        Ok(())
    }
}

fn create_all<G: HistogramGroup>(groups: &mut [G]) -> CapResult<()> {
    groups.iter_mut().try_for_each(|g| g.create_histograms())
}

fn load_all<G: HistogramGroup>(
    groups: &mut [G],
    store: &HistogramStore,
    context: &RunContext,
) -> CapResult<()> {
    groups
        .iter_mut()
        .try_for_each(|g| g.load_or_escalate(store, context))
}

fn freeze_all<G: HistogramGroup>(groups: &mut [G]) -> CapResult<()> {
    groups.iter_mut().try_for_each(|g| g.freeze(None))
}

fn save_all<G: HistogramGroup>(groups: &[G], store: &mut HistogramStore) {
    groups.iter().for_each(|g| g.save_histograms(store));
}

/// Single-particle densities for every (event filter, particle filter) combination.
///
/// Groups are named `name_eventFilter_particleFilter`.
#[derive(Debug)]
pub struct ParticleAnalyzer {
    core: AnalyzerCore,
    binning: BinningSet,
    singles: Vec<ParticleHistos>,
}

impl ParticleAnalyzer {
    pub fn new(
        name: &str,
        configuration: &Configuration,
        context: Arc<RunContext>,
        event_filters: Vec<EventFilter>,
        particle_filters: Vec<ParticleFilter>,
    ) -> Self {
        let core = AnalyzerCore::new(
            name,
            ParticleHistos::default_configuration(),
            configuration,
            context,
            event_filters,
            particle_filters,
        );
        let binning = BinningSet::from_configuration(&core.configuration);
        let singles = (0..core.event_filters.len())
            .flat_map(|ie| {
                core.particle_filters
                    .iter()
                    .map(|pf| ParticleHistos::new(&core.group_name(ie, &[pf.name()]), &core.configuration))
                    .collect::<Vec<_>>()
            })
            .collect();
        Self {
            core,
            binning,
            singles,
        }
    }

    /// The group of event filter `ie` and particle filter `ip`.
    pub fn single(&self, ie: usize, ip: usize) -> &ParticleHistos {
        &self.singles[ie * self.core.particle_filters.len() + ip]
    }

    pub fn event_counts(&self) -> &EventCountHistos {
        &self.core.counts
    }
}

impl Analyzer for ParticleAnalyzer {
    fn name(&self) -> &str {
        &self.core.name
    }
    fn create_histograms(&mut self) -> CapResult<()> {
        self.core.create()?;
        create_all(&mut self.singles)
    }
    fn load_histograms(&mut self, store: &HistogramStore) -> CapResult<()> {
        self.core.load(store)?;
        load_all(&mut self.singles, store, &self.core.context)
    }
    fn analyze(&mut self, event: &Event) {
        let accepted = self.core.begin_event(event);
        if accepted.is_empty() {
            return;
        }
        let lists = self.core.digitize(event, &self.binning);
        let n_particle_filters = lists.len();
        for ie in accepted {
            for (ip, digits) in lists.iter().enumerate() {
                self.core.count_particles(ie, ip, digits.len());
                self.singles[ie * n_particle_filters + ip].fill_digits(digits, 1.0);
            }
        }
    }
    fn finish(&mut self) -> CapResult<()> {
        self.core.finish()?;
        freeze_all(&mut self.singles)
    }
    fn save(&self, store: &mut HistogramStore) {
        self.core.counts.save_histograms(store);
        save_all(&self.singles, store);
    }
    fn derived(&self, store: &mut HistogramStore) -> CapResult<()> {
        let n_particle_filters = self.core.particle_filters.len();
        for (index, single) in self.singles.iter().enumerate() {
            let (ie, ip) = (index / n_particle_filters, index % n_particle_filters);
            let name = self
                .core
                .derived_name(ie, &[self.core.particle_filters[ip].name()]);
            let mut derived = ParticleDerivedHistos::new(&name, &self.core.configuration);
            derived.create_histograms()?;
            derived.calculate_derived_histograms(single)?;
            derived.save_histograms(store);
        }
        Ok(())
    }
}

type CombinedBuilder = fn(&str, &Configuration) -> ParticlePairCombinedHistos;

/// Single-particle densities plus two-particle densities for every ordered pair of particle
/// filters, per event filter.
///
/// Pair groups are named `name_eventFilter_pf1pf2`. Same-filter pairs are filled
/// symmetrically, the others directionally.
///
/// With `calculateCombinations`, [`Analyzer::derived`] also combines the four charge
/// orderings of each species into charge-independent (`CI`) and charge-dependent (`CD`)
/// correlators. The particle filters must then list every positive species first and the
/// negative ones in the same order after them, as
/// [`ParticleFilter::plus_minus_hadron_filters`] does.
#[derive(Debug)]
pub struct ParticlePairAnalyzer {
    core: AnalyzerCore,
    binning: BinningSet,
    singles: Vec<ParticleHistos>,
    pairs: Vec<ParticlePairHistos>,
}

impl ParticlePairAnalyzer {
    pub fn default_configuration() -> Configuration {
        let mut configuration = ParticlePairHistos::default_configuration();
        configuration.set_name("ParticlePairAnalyzer");
        configuration.add_parameter("binCorrection", 1.0);
        configuration.add_parameter("calculateCombinations", false);
        configuration
    }

    pub fn new(
        name: &str,
        configuration: &Configuration,
        context: Arc<RunContext>,
        event_filters: Vec<EventFilter>,
        particle_filters: Vec<ParticleFilter>,
    ) -> Self {
        let core = AnalyzerCore::new(
            name,
            Self::default_configuration(),
            configuration,
            context,
            event_filters,
            particle_filters,
        );
        let binning = BinningSet::from_configuration(&core.configuration);
        let mut singles = Vec::new();
        let mut pairs = Vec::new();
        for ie in 0..core.event_filters.len() {
            for pf in &core.particle_filters {
                singles.push(ParticleHistos::new(
                    &core.group_name(ie, &[pf.name()]),
                    &core.configuration,
                ));
            }
            for pf1 in &core.particle_filters {
                for pf2 in &core.particle_filters {
                    let pair = format!("{}{}", pf1.name(), pf2.name());
                    pairs.push(ParticlePairHistos::new(
                        &core.group_name(ie, &[&pair]),
                        &core.configuration,
                    ));
                }
            }
        }
        Self {
            core,
            binning,
            singles,
            pairs,
        }
    }

    fn n_particle_filters(&self) -> usize {
        self.core.particle_filters.len()
    }

    pub fn single(&self, ie: usize, ip: usize) -> &ParticleHistos {
        &self.singles[ie * self.n_particle_filters() + ip]
    }

    /// The pair group of event filter `ie` and particle filters `(i1, i2)`.
    pub fn pair(&self, ie: usize, i1: usize, i2: usize) -> &ParticlePairHistos {
        let n = self.n_particle_filters();
        &self.pairs[(ie * n + i1) * n + i2]
    }

    pub fn event_counts(&self) -> &EventCountHistos {
        &self.core.counts
    }

    fn derived_pairs(
        &self,
        ie: usize,
        singles: &[ParticleDerivedHistos],
        store: &mut HistogramStore,
    ) -> CapResult<Vec<ParticlePairDerivedHistos>> {
        let n = self.n_particle_filters();
        let bin_correction = self.core.configuration.value_double("binCorrection");
        let mut derived = Vec::with_capacity(n * n);
        for i1 in 0..n {
            for i2 in 0..n {
                let (pf1, pf2) = (
                    self.core.particle_filters[i1].name(),
                    self.core.particle_filters[i2].name(),
                );
                let name = self.core.derived_name(ie, &[&format!("{pf1}{pf2}")]);
                let mut pair = ParticlePairDerivedHistos::new(&name, &self.core.configuration);
                pair.create_histograms()?;
                pair.calculate_derived_histograms(
                    self.single(ie, i1),
                    self.single(ie, i2),
                    &singles[i1],
                    &singles[i2],
                    self.pair(ie, i1, i2),
                    bin_correction,
                )?;
                pair.save_histograms(store);
                derived.push(pair);
            }
        }
        Ok(derived)
    }

    fn combinations(
        &self,
        ie: usize,
        pairs: &[ParticlePairDerivedHistos],
        store: &mut HistogramStore,
    ) -> CapResult<()> {
        let n = self.n_particle_filters();
        if n % 2 != 0 {
            log::warn!(
                "{}: cannot combine charges of {n} particle filters",
                self.core.name
            );
            return Ok(());
        }
        let n_species = n / 2;
        for plus in 0..n_species {
            let minus = plus + n_species;
            let species = format!(
                "{}{}",
                self.core.particle_filters[plus].name(),
                self.core.particle_filters[minus].name()
            );
            let pick = move |i1: usize, i2: usize| &pairs[i1 * n + i2];
            let builders: [(&str, CombinedBuilder); 2] = [
                ("CI", ParticlePairCombinedHistos::charge_independent),
                ("CD", ParticlePairCombinedHistos::charge_dependent),
            ];
            for (suffix, build) in builders {
                let name = self.core.derived_name(ie, &[&species, suffix]);
                let mut combined = build(&name, &self.core.configuration);
                combined.create_histograms()?;
                combined.calculate_derived_histograms(
                    pick(plus, plus),
                    pick(plus, minus),
                    pick(minus, plus),
                    pick(minus, minus),
                )?;
                combined.save_histograms(store);
            }
        }
        Ok(())
    }
}

impl Analyzer for ParticlePairAnalyzer {
    fn name(&self) -> &str {
        &self.core.name
    }
    fn create_histograms(&mut self) -> CapResult<()> {
        self.core.create()?;
        create_all(&mut self.singles)?;
        create_all(&mut self.pairs)
    }
    fn load_histograms(&mut self, store: &HistogramStore) -> CapResult<()> {
        self.core.load(store)?;
        load_all(&mut self.singles, store, &self.core.context)?;
        load_all(&mut self.pairs, store, &self.core.context)
    }
    fn analyze(&mut self, event: &Event) {
        let accepted = self.core.begin_event(event);
        if accepted.is_empty() {
            return;
        }
        let lists = self.core.digitize(event, &self.binning);
        let n = lists.len();
        for ie in accepted {
            for (i1, digits1) in lists.iter().enumerate() {
                self.core.count_particles(ie, i1, digits1.len());
                self.singles[ie * n + i1].fill_digits(digits1, 1.0);
                for (i2, digits2) in lists.iter().enumerate() {
                    self.pairs[(ie * n + i1) * n + i2].fill(digits1, digits2, i1 == i2, 1.0);
                }
            }
        }
    }
    fn finish(&mut self) -> CapResult<()> {
        self.core.finish()?;
        freeze_all(&mut self.singles)?;
        freeze_all(&mut self.pairs)
    }
    fn save(&self, store: &mut HistogramStore) {
        self.core.counts.save_histograms(store);
        save_all(&self.singles, store);
        save_all(&self.pairs, store);
    }
    fn derived(&self, store: &mut HistogramStore) -> CapResult<()> {
        let combine = self.core.configuration.value_bool("calculateCombinations");
        for ie in 0..self.core.event_filters.len() {
            let mut singles = Vec::with_capacity(self.n_particle_filters());
            for (ip, pf) in self.core.particle_filters.iter().enumerate() {
                let name = self.core.derived_name(ie, &[pf.name()]);
                let mut derived = ParticleDerivedHistos::new(&name, &self.core.configuration);
                derived.create_histograms()?;
                derived.calculate_derived_histograms(self.single(ie, ip))?;
                derived.save_histograms(store);
                singles.push(derived);
            }
            let pairs = self.derived_pairs(ie, &singles, store)?;
            if combine {
                self.combinations(ie, &pairs, store)?;
            }
        }
        Ok(())
    }
}

/// Factorial moments of the accepted-particle counts of all particle filters, one group per
/// event filter named `name_eventFilter_pf1pf2...`.
///
/// `multiplicityType` selects the independent variable: 0 for the fractional cross section,
/// 1 or 2 for the reference multiplicity of the event.
#[derive(Debug)]
pub struct NuDynAnalyzer {
    core: AnalyzerCore,
    multiplicity_type: MultiplicityType,
    groups: Vec<NuDynHistos>,
}

impl NuDynAnalyzer {
    pub fn new(
        name: &str,
        configuration: &Configuration,
        context: Arc<RunContext>,
        event_filters: Vec<EventFilter>,
        particle_filters: Vec<ParticleFilter>,
    ) -> Self {
        let mut core = AnalyzerCore::new(
            name,
            NuDynHistos::default_configuration(),
            configuration,
            context,
            event_filters,
            particle_filters,
        );
        core.configuration
            .add_parameter("nFilters", core.particle_filters.len() as i32);
        let filters = core.particle_filter_names().concat();
        let groups = (0..core.event_filters.len())
            .map(|ie| NuDynHistos::new(&core.group_name(ie, &[&filters]), &core.configuration))
            .collect();
        Self {
            core,
            multiplicity_type: MultiplicityType::Total,
            groups,
        }
    }

    pub fn group(&self, ie: usize) -> &NuDynHistos {
        &self.groups[ie]
    }

    fn read_multiplicity_type(&mut self) -> CapResult<()> {
        self.multiplicity_type =
            MultiplicityType::from_code(self.core.configuration.value_int("multiplicityType"))?;
        Ok(())
    }
}

impl Analyzer for NuDynAnalyzer {
    fn name(&self) -> &str {
        &self.core.name
    }
    fn create_histograms(&mut self) -> CapResult<()> {
        self.read_multiplicity_type()?;
        self.core.create()?;
        create_all(&mut self.groups)
    }
    fn load_histograms(&mut self, store: &HistogramStore) -> CapResult<()> {
        self.read_multiplicity_type()?;
        self.core.load(store)?;
        load_all(&mut self.groups, store, &self.core.context)
    }
    fn analyze(&mut self, event: &Event) {
        let accepted = self.core.begin_event(event);
        if accepted.is_empty() {
            return;
        }
        let counts: Vec<f64> = self
            .core
            .filtered_particles(event)
            .iter()
            .map(|list| list.len() as f64)
            .collect();
        let mult = event.properties().map(|properties| match self.multiplicity_type {
            MultiplicityType::Centrality => properties.fractional_cross_section,
            MultiplicityType::Total | MultiplicityType::Accepted => {
                properties.reference_multiplicity
            }
        });
        for ie in accepted {
            for (ip, &count) in counts.iter().enumerate() {
                self.core.count_particles(ie, ip, count as usize);
            }
            match mult {
                Some(mult) => self.groups[ie].fill(mult, &counts, 1.0),
                None => log::warn!(
                    "{}: event {} has no properties, skipping",
                    self.core.name,
                    event.event_number
                ),
            }
        }
    }
    fn finish(&mut self) -> CapResult<()> {
        self.core.finish()?;
        freeze_all(&mut self.groups)
    }
    fn save(&self, store: &mut HistogramStore) {
        self.core.counts.save_histograms(store);
        save_all(&self.groups, store);
    }
    fn derived(&self, store: &mut HistogramStore) -> CapResult<()> {
        let filters = self.core.particle_filter_names().concat();
        for (ie, group) in self.groups.iter().enumerate() {
            let name = self.core.derived_name(ie, &[&filters]);
            let mut derived = NuDynDerivedHistos::new(&name, &self.core.configuration);
            derived.create_histograms()?;
            derived.calculate_derived_histograms(group)?;
            derived.save_histograms(store);
        }
        Ok(())
    }
}

/// Event-wide sums over the particles of each particle filter, one group per event filter
/// named `name_eventFilter`.
#[derive(Debug)]
pub struct GlobalAnalyzer {
    core: AnalyzerCore,
    groups: Vec<GlobalHistos>,
}

impl GlobalAnalyzer {
    pub fn new(
        name: &str,
        configuration: &Configuration,
        context: Arc<RunContext>,
        event_filters: Vec<EventFilter>,
        particle_filters: Vec<ParticleFilter>,
    ) -> Self {
        let core = AnalyzerCore::new(
            name,
            GlobalHistos::default_configuration(),
            configuration,
            context,
            event_filters,
            particle_filters,
        );
        let filters = core.particle_filter_names();
        let groups = (0..core.event_filters.len())
            .map(|ie| GlobalHistos::new(&core.group_name(ie, &[]), &core.configuration, &filters))
            .collect();
        Self { core, groups }
    }

    pub fn group(&self, ie: usize) -> &GlobalHistos {
        &self.groups[ie]
    }
}

impl Analyzer for GlobalAnalyzer {
    fn name(&self) -> &str {
        &self.core.name
    }
    fn create_histograms(&mut self) -> CapResult<()> {
        self.core.create()?;
        create_all(&mut self.groups)
    }
    fn load_histograms(&mut self, store: &HistogramStore) -> CapResult<()> {
        self.core.load(store)?;
        load_all(&mut self.groups, store, &self.core.context)
    }
    fn analyze(&mut self, event: &Event) {
        let accepted = self.core.begin_event(event);
        if accepted.is_empty() {
            return;
        }
        let mut properties = event.properties().cloned().unwrap_or_default();
        properties.fill_filtered(&event.particles, &self.core.particle_filters);
        for ie in accepted {
            for (ip, &n) in properties.n_filtered.iter().enumerate() {
                self.core.count_particles(ie, ip, n as usize);
            }
            self.groups[ie].fill(&properties, 1.0);
        }
    }
    fn finish(&mut self) -> CapResult<()> {
        self.core.finish()?;
        freeze_all(&mut self.groups)
    }
    fn save(&self, store: &mut HistogramStore) {
        self.core.counts.save_histograms(store);
        save_all(&self.groups, store);
    }
    fn derived(&self, store: &mut HistogramStore) -> CapResult<()> {
        let filters = self.core.particle_filter_names();
        for (ie, group) in self.groups.iter().enumerate() {
            let name = self.core.derived_name(ie, &[]);
            let mut derived = GlobalDerivedHistos::new(&name, &self.core.configuration, &filters);
            derived.create_histograms()?;
            derived.calculate_derived_histograms(group)?;
            derived.save_histograms(store);
        }
        Ok(())
    }
}

/// Transverse spherocities of the particles of each particle filter, one group per event
/// filter named `name_eventFilter`.
///
/// Events in which some particle filter accepts no particle with non-zero transverse
/// momentum have no defined spherocity and are not filled.
#[derive(Debug)]
pub struct TransverseSpherocityAnalyzer {
    core: AnalyzerCore,
    groups: Vec<TransverseSpherocityHistos>,
}

impl TransverseSpherocityAnalyzer {
    pub fn new(
        name: &str,
        configuration: &Configuration,
        context: Arc<RunContext>,
        event_filters: Vec<EventFilter>,
        particle_filters: Vec<ParticleFilter>,
    ) -> Self {
        let core = AnalyzerCore::new(
            name,
            TransverseSpherocityHistos::default_configuration(),
            configuration,
            context,
            event_filters,
            particle_filters,
        );
        let filters = core.particle_filter_names();
        let groups = (0..core.event_filters.len())
            .map(|ie| {
                TransverseSpherocityHistos::new(
                    &core.group_name(ie, &[]),
                    &core.configuration,
                    &filters,
                )
            })
            .collect();
        Self { core, groups }
    }

    pub fn group(&self, ie: usize) -> &TransverseSpherocityHistos {
        &self.groups[ie]
    }
}

impl Analyzer for TransverseSpherocityAnalyzer {
    fn name(&self) -> &str {
        &self.core.name
    }
    fn create_histograms(&mut self) -> CapResult<()> {
        self.core.create()?;
        create_all(&mut self.groups)
    }
    fn load_histograms(&mut self, store: &HistogramStore) -> CapResult<()> {
        self.core.load(store)?;
        load_all(&mut self.groups, store, &self.core.context)
    }
    fn analyze(&mut self, event: &Event) {
        let accepted = self.core.begin_event(event);
        if accepted.is_empty() {
            return;
        }
        let lists = self.core.filtered_particles(event);
        let n_steps = self.core.configuration.value_bins("nSteps");
        let spherocities: Option<Vec<(f64, f64)>> = lists
            .iter()
            .map(|list| transverse_spherocity(list.iter().copied(), n_steps))
            .collect();
        for ie in accepted {
            for (ip, list) in lists.iter().enumerate() {
                self.core.count_particles(ie, ip, list.len());
            }
            match &spherocities {
                Some(values) => {
                    let (s0, s1): (Vec<f64>, Vec<f64>) = values.iter().copied().unzip();
                    self.groups[ie].fill(&s0, &s1, 1.0);
                }
                None => log::debug!(
                    "{}: event {} has an empty particle filter, skipping",
                    self.core.name,
                    event.event_number
                ),
            }
        }
    }
    fn finish(&mut self) -> CapResult<()> {
        self.core.finish()?;
        freeze_all(&mut self.groups)
    }
    fn save(&self, store: &mut HistogramStore) {
        self.core.counts.save_histograms(store);
        save_all(&self.groups, store);
    }
    fn derived(&self, _store: &mut HistogramStore) -> CapResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cap_core::{data::test_event, CapError, KinematicCuts, TaskStatus};

    use super::*;

    fn charged() -> Vec<ParticleFilter> {
        ParticleFilter::charged_hadron_filters(&KinematicCuts::new())
    }

    fn run<A: Analyzer>(analyzer: &mut A, n_events: usize) -> HistogramStore {
        analyzer.create_histograms().unwrap();
        let event = test_event();
        for _ in 0..n_events {
            analyzer.analyze(&event);
        }
        analyzer.finish().unwrap();
        let mut store = HistogramStore::new();
        analyzer.save(&mut store);
        store
    }

    #[test]
    fn test_particle_analyzer() {
        let context = Arc::new(RunContext::new());
        let mut analyzer = ParticleAnalyzer::new(
            "Single",
            &Configuration::new("test"),
            context,
            vec![EventFilter::open()],
            charged(),
        );
        let store = run(&mut analyzer, 2);
        let plus = store.get_1d("Single_All_HP_n1").unwrap();
        assert_relative_eq!(plus.bin_content(plus.get_bin(3.0)), 2.0);
        assert_relative_eq!(store.get_1d("Single_All_HM_n1_pt").unwrap().integral(), 2.0);
        let counts = store.get_1d("Single_nParticleAccepted").unwrap();
        assert_relative_eq!(counts.bin_content(1), 6.0);
        assert_relative_eq!(counts.bin_content(2), 2.0);
        assert_relative_eq!(store.get_1d("Single_nTaskExecuted").unwrap().bin_content(1), 2.0);
        let mut derived = HistogramStore::new();
        analyzer.derived(&mut derived).unwrap();
        assert!(derived.contains("SingleDerived_All_HP_n1_phi"));
        assert_eq!(analyzer.single(0, 0).state(), cap_core::GroupState::Frozen);
    }

    #[test]
    fn test_pair_analyzer() {
        let context = Arc::new(RunContext::new());
        let mut configuration = Configuration::new("test");
        configuration.add_parameter("calculateCombinations", true);
        let mut analyzer = ParticlePairAnalyzer::new(
            "Pair",
            &configuration,
            context,
            vec![EventFilter::open()],
            charged(),
        );
        let store = run(&mut analyzer, 1);
        let n2 = |name: &str| store.get_2d(name).unwrap().integral();
        assert_relative_eq!(n2("Pair_All_HPHP_n2_phiPhi"), 6.0);
        assert_relative_eq!(n2("Pair_All_HPHM_n2_phiPhi"), 3.0);
        assert_relative_eq!(n2("Pair_All_HMHP_n2_phiPhi"), 3.0);
        assert_relative_eq!(n2("Pair_All_HMHM_n2_phiPhi"), 0.0);
        assert_eq!(analyzer.pair(0, 1, 0).name(), "Pair_All_HMHP");
        let mut derived = HistogramStore::new();
        analyzer.derived(&mut derived).unwrap();
        assert!(derived.contains("PairDerived_All_HPHM_R2_phiPhi"));
        assert!(derived.contains("PairDerived_All_HPHM_CI_R2_phiPhi"));
        assert!(derived.contains("PairDerived_All_HPHM_CD_BF_DetaDphi_shft"));
    }

    #[test]
    fn test_nudyn_analyzer() {
        let context = Arc::new(RunContext::new());
        let mut analyzer = NuDynAnalyzer::new(
            "NuDyn",
            &Configuration::new("test"),
            context,
            vec![EventFilter::open()],
            charged(),
        );
        let store = run(&mut analyzer, 3);
        assert_eq!(analyzer.group(0).name(), "NuDyn_All_HPHM");
        assert_relative_eq!(store.get_1d("NuDyn_All_HPHM_f1_0").unwrap().bin_content(1), 3.0);
        assert_relative_eq!(store.get_1d("NuDyn_All_HPHM_f2_00").unwrap().bin_content(1), 6.0);
        let f2 = store.get_1d("NuDyn_All_HPHM_f2_01_vsMult").unwrap();
        // reference multiplicity 4
        assert_relative_eq!(f2.bin_content(5), 3.0);
        let mut derived = HistogramStore::new();
        analyzer.derived(&mut derived).unwrap();
        let r2 = derived.get_1d("NuDynDerived_All_HPHM_R2_00").unwrap();
        assert_relative_eq!(r2.bin_content(1), 6.0 / 9.0);
    }

    #[test]
    fn test_global_analyzer() {
        let context = Arc::new(RunContext::new());
        let mut analyzer = GlobalAnalyzer::new(
            "Global",
            &Configuration::new("test"),
            context,
            vec![EventFilter::open()],
            charged(),
        );
        let store = run(&mut analyzer, 1);
        let q = store.get_1d("Global_All_HM_q").unwrap();
        assert_relative_eq!(q.bin_content(q.get_bin(-1.0)), 1.0);
        let mut derived = HistogramStore::new();
        analyzer.derived(&mut derived).unwrap();
        let pt = derived.get_1d("GlobalDerived_All_HM_ptAvgIncl").unwrap();
        assert_relative_eq!(pt.bin_content(1), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_spherocity_analyzer() {
        let context = Arc::new(RunContext::new());
        let mut analyzer = TransverseSpherocityAnalyzer::new(
            "Spherocity",
            &Configuration::new("test"),
            context,
            vec![EventFilter::open()],
            charged(),
        );
        let store = run(&mut analyzer, 1);
        // a single negative hadron is perfectly jetty
        let s0 = store.get_1d("Spherocity_All_HM_S0").unwrap();
        assert_relative_eq!(s0.bin_content(1), 1.0);
        assert_relative_eq!(store.get_1d("Spherocity_All_HP_S0").unwrap().integral(), 1.0);
    }

    #[test]
    fn test_fatal_context_stops_analysis() {
        let context = Arc::new(RunContext::new());
        let mut analyzer = ParticleAnalyzer::new(
            "Single",
            &Configuration::new("test"),
            context.clone(),
            vec![EventFilter::open()],
            charged(),
        );
        let empty = HistogramStore::new();
        assert!(matches!(
            analyzer.load_histograms(&empty),
            Err(CapError::Fatal { .. })
        ));
        assert_eq!(context.status(), TaskStatus::Fatal);

        let mut other = ParticleAnalyzer::new(
            "Other",
            &Configuration::new("test"),
            context,
            vec![EventFilter::open()],
            charged(),
        );
        let store = run(&mut other, 2);
        assert_relative_eq!(store.get_1d("Other_nTaskExecuted").unwrap().integral(), 0.0);
        assert_relative_eq!(store.get_1d("Other_All_HP_n1").unwrap().integral(), 0.0);
    }
}
