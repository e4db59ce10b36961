use std::{fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    filters::particle::ParticleFilter,
    utils::vectors::{Vec3, Vec4},
};

/// Quantum statistics of a [`ParticleType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistics {
    Boson,
    Fermion,
}

/// PDG codes of the charmed hadrons which are recognized even when their charm number was not
/// recorded.
const CHARMED_PDG_CODES: &[i32] = &[
    411, 421, 10411, 10421, 413, 423, 10413, 10423, 415, 425, 431, 10431, 433, 10433, 20433, 435,
    441, 10441, 100441, 443, 10443, 20443, 100433, 30443, 445, 100445, 4122, 4222, 4212, 4112,
    4224, 4214, 4114, 4232, 4132, 4322, 4312, 4324, 4314, 4332, 4334, 4412, 4422, 4414, 4424,
    4432, 4434, 4444,
];

/// Static properties shared by all particles of one species.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleType {
    /// The PDG Monte Carlo code.
    pub pdg_code: i32,
    pub name: String,
    /// A ROOT-style LaTeX title, e.g. `#pi^{+}`.
    pub title: String,
    /// Mass in GeV.
    pub mass: f64,
    /// Electric charge in units of $`e`$.
    pub charge: i32,
    pub baryon: i32,
    pub strange: i32,
    pub charm: i32,
    pub bottom: i32,
    pub top: i32,
    pub lepton_electron: i32,
    pub lepton_muon: i32,
    pub lepton_tau: i32,
    pub statistics: Statistics,
}

impl ParticleType {
    fn hadron(
        pdg_code: i32,
        name: &str,
        title: &str,
        mass: f64,
        charge: i32,
        baryon: i32,
        strange: i32,
    ) -> Self {
        Self {
            pdg_code,
            name: name.to_string(),
            title: title.to_string(),
            mass,
            charge,
            baryon,
            strange,
            charm: 0,
            bottom: 0,
            top: 0,
            lepton_electron: 0,
            lepton_muon: 0,
            lepton_tau: 0,
            statistics: if baryon != 0 {
                Statistics::Fermion
            } else {
                Statistics::Boson
            },
        }
    }

    fn lepton(pdg_code: i32, name: &str, title: &str, mass: f64, charge: i32) -> Self {
        // particles carry positive codes and negative charge
        let number = if pdg_code > 0 { 1 } else { -1 };
        let (lepton_electron, lepton_muon, lepton_tau) = match pdg_code.abs() {
            11 => (number, 0, 0),
            13 => (0, number, 0),
            _ => (0, 0, number),
        };
        Self {
            lepton_electron,
            lepton_muon,
            lepton_tau,
            statistics: Statistics::Fermion,
            ..Self::hadron(pdg_code, name, title, mass, charge, 0, 0)
        }
    }

    fn anti(&self, name: &str, title: &str) -> Self {
        Self {
            pdg_code: -self.pdg_code,
            name: name.to_string(),
            title: title.to_string(),
            charge: -self.charge,
            baryon: -self.baryon,
            strange: -self.strange,
            charm: -self.charm,
            bottom: -self.bottom,
            top: -self.top,
            lepton_electron: -self.lepton_electron,
            lepton_muon: -self.lepton_muon,
            lepton_tau: -self.lepton_tau,
            ..self.clone()
        }
    }

    /// Look up one of the built-in species by PDG code.
    ///
    /// The table covers the photon, the charged leptons, the light mesons and the ground-state
    /// baryon octet and decuplet members referred to by the particle filters, together with their
    /// antiparticles.
    pub fn from_pdg(pdg_code: i32) -> Option<Self> {
        let ptype = match pdg_code.abs() {
            22 => Self {
                statistics: Statistics::Boson,
                ..Self::hadron(22, "gamma", "#gamma", 0.0, 0, 0, 0)
            },
            11 => Self::lepton(11, "e-", "e^{-}", 0.000510999, -1),
            13 => Self::lepton(13, "mu-", "#mu^{-}", 0.105658, -1),
            15 => Self::lepton(15, "tau-", "#tau^{-}", 1.77686, -1),
            111 => Self::hadron(111, "pi0", "#pi^{0}", 0.134977, 0, 0, 0),
            211 => Self::hadron(211, "pi+", "#pi^{+}", 0.139570, 1, 0, 0),
            130 => Self::hadron(130, "K0L", "K^{0}_{L}", 0.497611, 0, 0, 0),
            310 => Self::hadron(310, "K0S", "K^{0}_{S}", 0.497611, 0, 0, 0),
            311 => Self::hadron(311, "K0", "K^{0}", 0.497611, 0, 0, 1),
            321 => Self::hadron(321, "K+", "K^{+}", 0.493677, 1, 0, 1),
            2212 => Self::hadron(2212, "p", "p", 0.938272, 1, 1, 0),
            2112 => Self::hadron(2112, "n", "n", 0.939565, 0, 1, 0),
            3122 => Self::hadron(3122, "Lambda", "#Lambda", 1.115683, 0, 1, -1),
            3222 => Self::hadron(3222, "Sigma+", "#Sigma^{+}", 1.18937, 1, 1, -1),
            3212 => Self::hadron(3212, "Sigma0", "#Sigma^{0}", 1.192642, 0, 1, -1),
            3112 => Self::hadron(3112, "Sigma-", "#Sigma^{-}", 1.197449, -1, 1, -1),
            3322 => Self::hadron(3322, "Xi0", "#Xi^{0}", 1.31486, 0, 1, -2),
            3312 => Self::hadron(3312, "Xi-", "#Xi^{-}", 1.32171, -1, 1, -2),
            3334 => Self::hadron(3334, "Omega-", "#Omega^{-}", 1.67245, -1, 1, -3),
            _ => return None,
        };
        if pdg_code > 0 {
            return Some(ptype);
        }
        // self-conjugate states have no negative code
        let (name, title) = match pdg_code {
            -22 | -111 | -130 | -310 => return None,
            -11 => ("e+".to_string(), "e^{+}".to_string()),
            -13 => ("mu+".to_string(), "#mu^{+}".to_string()),
            -15 => ("tau+".to_string(), "#tau^{+}".to_string()),
            -211 => ("pi-".to_string(), "#pi^{-}".to_string()),
            -321 => ("K-".to_string(), "K^{-}".to_string()),
            _ => (
                format!("{}bar", ptype.name),
                format!("#bar{{{}}}", ptype.title),
            ),
        };
        Some(ptype.anti(&name, &title))
    }

    pub fn is_fermion(&self) -> bool {
        self.statistics == Statistics::Fermion
    }
    pub fn is_boson(&self) -> bool {
        self.statistics == Statistics::Boson
    }
    pub fn is_photon(&self) -> bool {
        self.pdg_code == 22
    }
    pub fn is_lepton(&self) -> bool {
        self.lepton_electron != 0 || self.lepton_muon != 0 || self.lepton_tau != 0
    }
    pub fn is_electron(&self) -> bool {
        self.pdg_code == 11
    }
    pub fn is_positron(&self) -> bool {
        self.pdg_code == -11
    }
    pub fn is_muon(&self) -> bool {
        self.pdg_code == 13
    }
    pub fn is_anti_muon(&self) -> bool {
        self.pdg_code == -13
    }
    pub fn is_tau(&self) -> bool {
        self.pdg_code == 15
    }
    pub fn is_anti_tau(&self) -> bool {
        self.pdg_code == -15
    }
    pub fn is_charged(&self) -> bool {
        self.charge != 0
    }
    /// Baryons and bosons above the gauge/Higgs range.
    pub fn is_hadron(&self) -> bool {
        self.baryon != 0 || (self.is_boson() && self.pdg_code.abs() > 40)
    }
    pub fn is_pion(&self) -> bool {
        matches!(self.pdg_code, 211 | 111 | -211)
    }
    pub fn is_pion_p(&self) -> bool {
        self.pdg_code == 211
    }
    pub fn is_pion_m(&self) -> bool {
        self.pdg_code == -211
    }
    pub fn is_pion_0(&self) -> bool {
        self.pdg_code == 111
    }
    pub fn is_kaon(&self) -> bool {
        matches!(self.pdg_code, 321 | -321 | 311 | -311 | 130 | 310)
    }
    pub fn is_kaon_p(&self) -> bool {
        self.pdg_code == 321
    }
    pub fn is_kaon_m(&self) -> bool {
        self.pdg_code == -321
    }
    pub fn is_kaon_0(&self) -> bool {
        self.pdg_code == 311
    }
    pub fn is_kaon_0_bar(&self) -> bool {
        self.pdg_code == -311
    }
    pub fn is_kaon_0_s(&self) -> bool {
        self.pdg_code == 310
    }
    pub fn is_kaon_0_l(&self) -> bool {
        self.pdg_code == 130
    }
    pub fn is_baryon(&self) -> bool {
        self.baryon != 0
    }
    pub fn is_baryon_plus(&self) -> bool {
        self.baryon > 0
    }
    pub fn is_baryon_minus(&self) -> bool {
        self.baryon < 0
    }
    pub fn is_strange(&self) -> bool {
        self.strange != 0
    }
    pub fn is_strange_plus(&self) -> bool {
        self.strange > 0
    }
    pub fn is_strange_minus(&self) -> bool {
        self.strange < 0
    }
    pub fn is_charm(&self) -> bool {
        self.charm != 0 || CHARMED_PDG_CODES.contains(&self.pdg_code)
    }
    pub fn is_charm_plus(&self) -> bool {
        self.charm > 0
    }
    pub fn is_charm_minus(&self) -> bool {
        self.charm < 0
    }
    pub fn is_bottom(&self) -> bool {
        self.bottom != 0
    }
    pub fn is_bottom_plus(&self) -> bool {
        self.bottom > 0
    }
    pub fn is_bottom_minus(&self) -> bool {
        self.bottom < 0
    }
    pub fn is_top(&self) -> bool {
        self.top != 0
    }
    pub fn is_proton(&self) -> bool {
        self.pdg_code == 2212
    }
    pub fn is_anti_proton(&self) -> bool {
        self.pdg_code == -2212
    }
    pub fn is_neutron(&self) -> bool {
        self.pdg_code == 2112
    }
    pub fn is_anti_neutron(&self) -> bool {
        self.pdg_code == -2112
    }
    pub fn is_lambda(&self) -> bool {
        self.pdg_code == 3122
    }
    pub fn is_anti_lambda(&self) -> bool {
        self.pdg_code == -3122
    }
    pub fn is_sigma_p(&self) -> bool {
        self.pdg_code == 3222
    }
    pub fn is_sigma_0(&self) -> bool {
        self.pdg_code == 3212
    }
    pub fn is_sigma_m(&self) -> bool {
        self.pdg_code == 3112
    }
    pub fn is_anti_sigma_p(&self) -> bool {
        self.pdg_code == -3222
    }
    pub fn is_anti_sigma_0(&self) -> bool {
        self.pdg_code == -3212
    }
    pub fn is_anti_sigma_m(&self) -> bool {
        self.pdg_code == -3112
    }
    pub fn is_xi_0(&self) -> bool {
        self.pdg_code == 3322
    }
    pub fn is_xi_m(&self) -> bool {
        self.pdg_code == 3312
    }
    pub fn is_anti_xi_0(&self) -> bool {
        self.pdg_code == -3322
    }
    pub fn is_anti_xi_m(&self) -> bool {
        self.pdg_code == -3312
    }
    pub fn is_omega_m(&self) -> bool {
        self.pdg_code == 3334
    }
    pub fn is_anti_omega_m(&self) -> bool {
        self.pdg_code == -3334
    }
}

impl Display for ParticleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (pdg = {}, m = {:.6} GeV, q = {}, B = {}, S = {})",
            self.name, self.pdg_code, self.mass, self.charge, self.baryon, self.strange
        )
    }
}

/// A single particle of an [`Event`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    ptype: Arc<ParticleType>,
    momentum: Vec4,
    position: Vec4,
    live: bool,
}

impl Particle {
    /// A live particle produced at the origin.
    pub fn new(ptype: Arc<ParticleType>, momentum: Vec4) -> Self {
        Self {
            ptype,
            momentum,
            position: Vec4::default(),
            live: true,
        }
    }
    /// A live particle of the given type with three-momentum `p3`, put on its mass shell.
    pub fn on_shell(ptype: Arc<ParticleType>, p3: Vec3) -> Self {
        let momentum = p3.with_mass(ptype.mass);
        Self::new(ptype, momentum)
    }
    pub fn with_position(mut self, position: Vec4) -> Self {
        self.position = position;
        self
    }
    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }
    pub fn particle_type(&self) -> &ParticleType {
        &self.ptype
    }
    pub fn momentum(&self) -> &Vec4 {
        &self.momentum
    }
    /// Production point $`(x, y, z, t)`$.
    pub fn position(&self) -> &Vec4 {
        &self.position
    }
    pub fn is_live(&self) -> bool {
        self.live
    }
    /// Mark the particle as decayed or otherwise removed from the final state.
    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }
}

/// Event-level properties which event filters and multiplicity-differential groups read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventProperties {
    /// Impact parameter in fm.
    pub impact_parameter: f64,
    /// Fractional cross section in percent.
    pub fractional_cross_section: f64,
    pub reference_multiplicity: f64,
    /// Generator-specific parameters.
    pub model_parameters: Vec<f64>,
    /// Accepted-particle counts, one entry per particle filter.
    pub n_filtered: Vec<f64>,
    /// Summed transverse momenta, one entry per particle filter.
    pub pt_filtered: Vec<f64>,
    /// Summed energies, one entry per particle filter.
    pub e_filtered: Vec<f64>,
    /// Net charges, one entry per particle filter.
    pub q_filtered: Vec<f64>,
    /// Net strangeness, one entry per particle filter.
    pub s_filtered: Vec<f64>,
    /// Net baryon numbers, one entry per particle filter.
    pub b_filtered: Vec<f64>,
}

impl EventProperties {
    /// Overwrite the filtered vectors with the sums over `particles` accepted by each filter.
    pub fn fill_filtered(&mut self, particles: &[Particle], filters: &[ParticleFilter]) {
        let n_filters = filters.len();
        self.n_filtered = vec![0.0; n_filters];
        self.pt_filtered = vec![0.0; n_filters];
        self.e_filtered = vec![0.0; n_filters];
        self.q_filtered = vec![0.0; n_filters];
        self.s_filtered = vec![0.0; n_filters];
        self.b_filtered = vec![0.0; n_filters];
        for particle in particles {
            let ptype = particle.particle_type();
            let momentum = particle.momentum();
            for (k, filter) in filters.iter().enumerate() {
                if filter.accept(particle) {
                    self.n_filtered[k] += 1.0;
                    self.pt_filtered[k] += momentum.pt();
                    self.e_filtered[k] += momentum.e;
                    self.q_filtered[k] += ptype.charge as f64;
                    self.s_filtered[k] += ptype.strange as f64;
                    self.b_filtered[k] += ptype.baryon as f64;
                }
            }
        }
    }
}

impl Display for EventProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "EventProperties:")?;
        writeln!(f, "  impact parameter: {}", self.impact_parameter)?;
        writeln!(
            f,
            "  fractional cross section: {}",
            self.fractional_cross_section
        )?;
        writeln!(f, "  reference multiplicity: {}", self.reference_multiplicity)?;
        writeln!(f, "  model parameters: {:?}", self.model_parameters)?;
        writeln!(f, "  n: {:?}", self.n_filtered)?;
        writeln!(f, "  pt: {:?}", self.pt_filtered)?;
        writeln!(f, "  e: {:?}", self.e_filtered)?;
        writeln!(f, "  q: {:?}", self.q_filtered)?;
        writeln!(f, "  s: {:?}", self.s_filtered)?;
        writeln!(f, "  b: {:?}", self.b_filtered)
    }
}

/// One collision event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_number: u64,
    pub particles: Vec<Particle>,
    pub properties: Option<EventProperties>,
}

impl Event {
    pub fn new(event_number: u64, particles: Vec<Particle>) -> Self {
        Self {
            event_number,
            particles,
            properties: None,
        }
    }
    pub fn with_properties(mut self, properties: EventProperties) -> Self {
        self.properties = Some(properties);
        self
    }
    pub fn n_particles(&self) -> usize {
        self.particles.len()
    }
    pub fn properties(&self) -> Option<&EventProperties> {
        self.properties.as_ref()
    }
    pub fn properties_mut(&mut self) -> Option<&mut EventProperties> {
        self.properties.as_mut()
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Event {}:", self.event_number)?;
        for particle in &self.particles {
            writeln!(
                f,
                "  {:>8} {}{}",
                particle.particle_type().name,
                particle.momentum().to_p4_string(),
                if particle.is_live() { "" } else { " (decayed)" }
            )?;
        }
        if let Some(properties) = &self.properties {
            write!(f, "{properties}")?;
        }
        Ok(())
    }
}

/// A small event which can be used to test filters and groups: a $`\pi^+`$, a $`\pi^-`$, a
/// $`K^+`$, a proton and a decayed $`\Lambda`$, with reference multiplicity 4.
pub fn test_event() -> Event {
    let builtin = |pdg_code: i32| {
        Arc::new(
            ParticleType::from_pdg(pdg_code)
                .unwrap_or_else(|| ParticleType::hadron(pdg_code, "unknown", "?", 0.0, 0, 0, 0)),
        )
    };
    Event::new(
        1,
        vec![
            Particle::on_shell(builtin(211), Vec3::new(0.5, 0.0, 0.1)),
            Particle::on_shell(builtin(-211), Vec3::new(-0.3, 0.4, -0.2)),
            Particle::on_shell(builtin(321), Vec3::new(0.0, 0.8, 0.3)),
            Particle::on_shell(builtin(2212), Vec3::new(1.0, 1.0, 0.5)),
            Particle::on_shell(builtin(3122), Vec3::new(0.2, -0.6, 0.0)).with_live(false),
        ],
    )
    .with_properties(EventProperties {
        impact_parameter: 3.5,
        fractional_cross_section: 12.5,
        reference_multiplicity: 4.0,
        model_parameters: vec![0.7],
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_antiparticles() {
        let pbar = ParticleType::from_pdg(-2212).unwrap();
        assert_eq!(pbar.charge, -1);
        assert_eq!(pbar.baryon, -1);
        assert_eq!(pbar.name, "pbar");
        assert!(pbar.is_anti_proton());
        assert!(pbar.is_baryon_minus());
        let kminus = ParticleType::from_pdg(-321).unwrap();
        assert!(kminus.is_kaon_m());
        assert!(kminus.is_strange_minus());
        assert!(ParticleType::from_pdg(-111).is_none());
        assert!(ParticleType::from_pdg(999).is_none());
    }

    #[test]
    fn test_lepton_codes() {
        let electron = ParticleType::from_pdg(11).unwrap();
        let positron = ParticleType::from_pdg(-11).unwrap();
        let anti_muon = ParticleType::from_pdg(-13).unwrap();
        assert!(electron.is_electron() && !electron.is_positron());
        assert!(positron.is_positron() && !positron.is_electron());
        assert_eq!(positron.charge, 1);
        assert!(anti_muon.is_anti_muon() && anti_muon.is_lepton());
        assert!(!electron.is_hadron());
    }

    #[test]
    fn test_hadron_predicates() {
        let pi0 = ParticleType::from_pdg(111).unwrap();
        assert!(pi0.is_hadron() && !pi0.is_charged() && pi0.is_pion_0());
        let gamma = ParticleType::from_pdg(22).unwrap();
        assert!(!gamma.is_hadron() && gamma.is_photon());
        let k0s = ParticleType::from_pdg(310).unwrap();
        assert!(k0s.is_kaon() && k0s.is_kaon_0_s());
        let lambda = ParticleType::from_pdg(3122).unwrap();
        assert!(lambda.is_hadron() && lambda.is_strange_minus() && lambda.is_fermion());
        let d_plus = ParticleType {
            pdg_code: 411,
            ..ParticleType::hadron(411, "D+", "D^{+}", 1.8696, 1, 0, 0)
        };
        assert!(d_plus.is_charm());
    }

    #[test]
    fn test_fill_filtered() {
        let mut event = test_event();
        let filters = vec![ParticleFilter::all_live()];
        let particles = event.particles.clone();
        let properties = event.properties_mut().unwrap();
        properties.fill_filtered(&particles, &filters);
        assert_eq!(properties.n_filtered, vec![4.0]);
        assert_eq!(properties.q_filtered, vec![2.0]);
        assert_eq!(properties.b_filtered, vec![1.0]);
        assert_eq!(properties.s_filtered, vec![1.0]);
        let e_live: f64 = particles
            .iter()
            .filter(|p| p.is_live())
            .map(|p| p.momentum().e)
            .sum();
        assert_relative_eq!(properties.e_filtered[0], e_live);
    }
}
