use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    data::{Particle, ParticleType},
    filters::{Filter, Resolution, Selector},
    utils::enums::{Kinematic, Liveness, Species},
    CapError, CapResult,
};

/// Particle-level quantities a [`ParticleFilter`] can cut on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleSelector {
    /// Liveness requirement (type 0). Ignores the condition limits.
    Liveness(Liveness),
    /// Electric charge (type 1).
    Charge,
    /// PDG code (type 2).
    PdgCode,
    /// Species membership (type 4). Ignores the condition limits.
    Species(Species),
    /// A kinematic variable of the four-momentum (type 5).
    Kinematic(Kinematic),
}

impl Display for ParticleSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticleSelector::Liveness(liveness) => write!(f, "liveness({liveness})"),
            ParticleSelector::Charge => write!(f, "charge"),
            ParticleSelector::PdgCode => write!(f, "pdg"),
            ParticleSelector::Species(species) => write!(f, "species({species})"),
            ParticleSelector::Kinematic(kinematic) => write!(f, "{kinematic}"),
        }
    }
}

/// Check the species membership of a particle type.
fn is_species(ptype: &ParticleType, species: Species) -> bool {
    match species {
        Species::Photon => ptype.is_photon(),
        Species::Lepton => ptype.is_lepton(),
        Species::Electron => ptype.is_electron() || ptype.is_positron(),
        Species::ElectronMinus => ptype.is_electron(),
        Species::ElectronPlus => ptype.is_positron(),
        Species::Muon => ptype.is_muon() || ptype.is_anti_muon(),
        Species::MuonMinus => ptype.is_muon(),
        Species::MuonPlus => ptype.is_anti_muon(),
        Species::Tau => ptype.is_tau() || ptype.is_anti_tau(),
        Species::TauMinus => ptype.is_tau(),
        Species::TauPlus => ptype.is_anti_tau(),
        Species::Strange => ptype.is_strange(),
        Species::StrangePlus => ptype.is_strange_plus(),
        Species::StrangeMinus => ptype.is_strange_minus(),
        Species::Charm => ptype.is_charm(),
        Species::CharmPlus => ptype.is_charm_plus(),
        Species::CharmMinus => ptype.is_charm_minus(),
        Species::Bottom => ptype.is_bottom(),
        Species::BottomPlus => ptype.is_bottom_plus(),
        Species::BottomMinus => ptype.is_bottom_minus(),
        Species::Top => ptype.is_top(),
        Species::Hadron => ptype.is_hadron(),
        Species::ChargedHadron => ptype.is_hadron() && ptype.is_charged(),
        Species::PionKaonProton => {
            ptype.is_pion_p()
                || ptype.is_pion_m()
                || ptype.is_kaon_p()
                || ptype.is_kaon_m()
                || ptype.is_proton()
                || ptype.is_anti_proton()
        }
        Species::HadronPlus => ptype.is_pion_p() || ptype.is_kaon_p() || ptype.is_proton(),
        Species::HadronMinus => ptype.is_pion_m() || ptype.is_kaon_m() || ptype.is_anti_proton(),
        Species::Pion => ptype.is_pion(),
        Species::PionPlus => ptype.is_pion_p(),
        Species::PionZero => ptype.is_pion_0(),
        Species::PionMinus => ptype.is_pion_m(),
        Species::Kaon => ptype.is_kaon(),
        Species::KaonPlus => ptype.is_kaon_p(),
        Species::KaonMinus => ptype.is_kaon_m(),
        Species::KaonZero => ptype.is_kaon_0(),
        Species::AntiKaonZero => ptype.is_kaon_0_bar(),
        Species::KaonZeroShort => ptype.is_kaon_0_s(),
        Species::KaonZeroLong => ptype.is_kaon_0_l(),
        Species::Baryon => ptype.is_baryon(),
        Species::BaryonPlus => ptype.is_baryon_plus(),
        Species::BaryonMinus => ptype.is_baryon_minus(),
        Species::ProtonOrAntiProton => ptype.is_proton() || ptype.is_anti_proton(),
        Species::Proton => ptype.is_proton(),
        Species::AntiProton => ptype.is_anti_proton(),
        Species::LambdaOrAntiLambda => ptype.is_lambda() || ptype.is_anti_lambda(),
        Species::Lambda => ptype.is_lambda(),
        Species::AntiLambda => ptype.is_anti_lambda(),
        Species::SigmaPlus => ptype.is_sigma_p(),
        Species::SigmaZero => ptype.is_sigma_0(),
        Species::SigmaMinus => ptype.is_sigma_m(),
        Species::AntiSigmaPlus => ptype.is_anti_sigma_p(),
        Species::AntiSigmaZero => ptype.is_anti_sigma_0(),
        Species::AntiSigmaMinus => ptype.is_anti_sigma_m(),
        Species::XiZero => ptype.is_xi_0(),
        Species::XiMinus => ptype.is_xi_m(),
        Species::AntiXiZero => ptype.is_anti_xi_0(),
        Species::AntiXiMinus => ptype.is_anti_xi_m(),
        Species::OmegaMinus => ptype.is_omega_m(),
        Species::AntiOmegaPlus => ptype.is_anti_omega_m(),
    }
}

impl Selector for ParticleSelector {
    type Target = Particle;

    fn resolve(&self, target: &Particle) -> Resolution {
        let ptype = target.particle_type();
        let momentum = target.momentum();
        match self {
            ParticleSelector::Liveness(liveness) => Resolution::Flag(liveness.matches(target.is_live())),
            ParticleSelector::Charge => Resolution::Value(ptype.charge as f64),
            ParticleSelector::PdgCode => Resolution::Value(ptype.pdg_code as f64),
            ParticleSelector::Species(species) => Resolution::Flag(is_species(ptype, *species)),
            ParticleSelector::Kinematic(kinematic) => Resolution::Value(match kinematic {
                Kinematic::P => momentum.p(),
                Kinematic::Pt => momentum.pt(),
                Kinematic::E => momentum.e,
                Kinematic::Px => momentum.px,
                Kinematic::Py => momentum.py,
                Kinematic::Pz => momentum.pz,
                Kinematic::Phi => momentum.phi(),
                Kinematic::Eta => momentum.eta(),
                Kinematic::Y => momentum.rapidity(),
            }),
        }
    }

    /// Build a selector from its codes.
    ///
    /// The charge (1) and PDG (2) types ignore the subtype.
    fn from_codes(filter_type: i32, filter_subtype: i32) -> CapResult<Self> {
        let selector = match filter_type {
            0 => Liveness::from_code(filter_subtype).map(Self::Liveness),
            1 => Some(Self::Charge),
            2 => Some(Self::PdgCode),
            4 => Species::from_code(filter_subtype).map(Self::Species),
            5 => Kinematic::from_code(filter_subtype).map(Self::Kinematic),
            _ => None,
        };
        selector.ok_or(CapError::UnknownSelector {
            filter_type,
            filter_subtype,
        })
    }

    fn codes(&self) -> (i32, i32) {
        match self {
            ParticleSelector::Liveness(liveness) => (0, liveness.code()),
            ParticleSelector::Charge => (1, 0),
            ParticleSelector::PdgCode => (2, 0),
            ParticleSelector::Species(species) => (4, species.code()),
            ParticleSelector::Kinematic(kinematic) => (5, kinematic.code()),
        }
    }
}

/// Optional kinematic acceptance shared by the standard filter factories.
///
/// Each range is half-open, `[min, max)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicCuts {
    pub pt: Option<(f64, f64)>,
    pub eta: Option<(f64, f64)>,
    pub y: Option<(f64, f64)>,
}

impl KinematicCuts {
    /// No cuts.
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_pt(mut self, min: f64, max: f64) -> Self {
        self.pt = Some((min, max));
        self
    }
    pub fn with_eta(mut self, min: f64, max: f64) -> Self {
        self.eta = Some((min, max));
        self
    }
    pub fn with_y(mut self, min: f64, max: f64) -> Self {
        self.y = Some((min, max));
        self
    }
    fn apply(&self, filter: &mut ParticleFilter) {
        if let Some((min, max)) = self.pt {
            filter.add_condition(ParticleSelector::Kinematic(Kinematic::Pt), min, max);
        }
        if let Some((min, max)) = self.eta {
            filter.add_condition(ParticleSelector::Kinematic(Kinematic::Eta), min, max);
        }
        if let Some((min, max)) = self.y {
            filter.add_condition(ParticleSelector::Kinematic(Kinematic::Y), min, max);
        }
    }
}

/// A [`Filter`] over [`Particle`]s.
pub type ParticleFilter = Filter<ParticleSelector>;

const PLUS_MINUS_HADRONS: [(&str, &str, Species); 6] = [
    ("PiP", "#pi^{+}", Species::PionPlus),
    ("KP", "K^{+}", Species::KaonPlus),
    ("PP", "p", Species::Proton),
    ("PiM", "#pi^{-}", Species::PionMinus),
    ("KM", "K^{-}", Species::KaonMinus),
    ("PM", "#bar{p}", Species::AntiProton),
];

const BARYONS: [(i32, &str, &str); 18] = [
    (2212, "P", "p"),
    (-2212, "PBar", "#bar{p}"),
    (2112, "N", "n"),
    (-2112, "NBar", "#bar{n}"),
    (3122, "Lambda", "#Lambda"),
    (-3122, "LambdaBar", "#bar{#Lambda}"),
    (3222, "SigmaP", "#Sigma^{+}"),
    (-3222, "SigmaPBar", "#bar{#Sigma^{+}}"),
    (3212, "Sigma0", "#Sigma^{0}"),
    (-3212, "Sigma0Bar", "#bar{#Sigma^{0}}"),
    (3112, "SigmaM", "#Sigma^{-}"),
    (-3112, "SigmaMBar", "#bar{#Sigma^{-}}"),
    (3322, "Xi0", "#Xi^{0}"),
    (-3322, "Xi0Bar", "#bar{#Xi^{0}}"),
    (3312, "XiM", "#Xi^{-}"),
    (-3312, "XiMBar", "#bar{#Xi^{-}}"),
    (3334, "OmegaM", "#Omega^{-}"),
    (-3334, "OmegaMBar", "#bar{#Omega^{-}}"),
];

impl ParticleFilter {
    /// A filter named "All" which accepts every live particle.
    pub fn all_live() -> Self {
        Self::new("All", "All").with_condition(ParticleSelector::Liveness(Liveness::Live), 0.0, 0.0)
    }

    /// A live-particle filter on one [`Species`] followed by the given cuts.
    pub fn species_filter(name: &str, title: &str, species: Species, cuts: &KinematicCuts) -> Self {
        let mut filter = Self::new(name, title)
            .with_condition(ParticleSelector::Liveness(Liveness::Live), 0.0, 0.0)
            .with_condition(ParticleSelector::Species(species), 0.0, 0.0);
        cuts.apply(&mut filter);
        filter
    }

    /// Six filters for identified charged hadrons, positives first: PiP, KP, PP, PiM, KM, PM.
    pub fn plus_minus_hadron_filters(cuts: &KinematicCuts) -> Vec<Self> {
        PLUS_MINUS_HADRONS
            .iter()
            .map(|(name, title, species)| Self::species_filter(name, title, *species, cuts))
            .collect()
    }

    /// Two filters for positive (HP) and negative (HM) light charged hadrons.
    pub fn charged_hadron_filters(cuts: &KinematicCuts) -> Vec<Self> {
        vec![
            Self::species_filter("HP", "h^{+}", Species::HadronPlus, cuts),
            Self::species_filter("HM", "h^{-}", Species::HadronMinus, cuts),
        ]
    }

    /// A live-particle filter on one exact PDG code followed by the given cuts.
    pub fn baryon_filter(pdg_code: i32, name: &str, title: &str, cuts: &KinematicCuts) -> Self {
        let code = pdg_code as f64;
        let mut filter = Self::new(name, title)
            .with_condition(ParticleSelector::Liveness(Liveness::Live), 0.0, 0.0)
            .with_condition(ParticleSelector::PdgCode, code, code);
        cuts.apply(&mut filter);
        filter
    }

    /// Filters for the ground-state baryons, each followed by its antiparticle.
    pub fn baryon_filters(cuts: &KinematicCuts) -> Vec<Self> {
        BARYONS
            .iter()
            .map(|(pdg_code, name, title)| Self::baryon_filter(*pdg_code, name, title, cuts))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::utils::vectors::Vec3;

    fn particle(pdg_code: i32, p3: Vec3) -> Particle {
        Particle::on_shell(Arc::new(ParticleType::from_pdg(pdg_code).unwrap()), p3)
    }

    #[test]
    fn test_plus_minus_filters() {
        let cuts = KinematicCuts::new().with_pt(0.2, 2.0).with_eta(-1.0, 1.0);
        let filters = ParticleFilter::plus_minus_hadron_filters(&cuts);
        let names: Vec<&str> = filters.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["PiP", "KP", "PP", "PiM", "KM", "PM"]);
        assert_eq!(filters[5].title(), "#bar{p}");
        let codes: Vec<(i32, i32)> = filters[0]
            .conditions()
            .iter()
            .map(|c| c.selector().codes())
            .collect();
        assert_eq!(codes, vec![(0, 1), (4, 1111), (5, 1), (5, 7)]);
    }

    #[test]
    fn test_live_pion_plus_is_accepted() {
        let cuts = KinematicCuts::new().with_pt(0.2, 2.0);
        let pip = &ParticleFilter::plus_minus_hadron_filters(&cuts)[0];
        let mut pion = particle(211, Vec3::new(0.5, 0.3, 0.1));
        assert!(pip.accept(&pion));
        pion.set_live(false);
        assert!(!pip.accept(&pion));
        let slow = particle(211, Vec3::new(0.1, 0.0, 0.1));
        assert!(!pip.accept(&slow));
        let negative = particle(-211, Vec3::new(0.5, 0.3, 0.1));
        assert!(!pip.accept(&negative));
    }

    #[test]
    fn test_charged_hadron_filters() {
        let filters = ParticleFilter::charged_hadron_filters(&KinematicCuts::new());
        let p3 = Vec3::new(0.4, 0.4, 0.0);
        for code in [211, 321, 2212] {
            assert!(filters[0].accept(&particle(code, p3)));
            assert!(!filters[1].accept(&particle(code, p3)));
            assert!(filters[1].accept(&particle(-code, p3)));
        }
        assert!(!filters[0].accept(&particle(3222, p3)));
        assert_eq!(filters[1].title(), "h^{-}");
    }

    #[test]
    fn test_species_spot_checks() {
        let resolve = |species: Species, code: i32| {
            ParticleSelector::Species(species).resolve(&particle(code, Vec3::new(1.0, 0.0, 0.0)))
        };
        assert_eq!(resolve(Species::PionKaonProton, -321), Resolution::Flag(true));
        assert_eq!(resolve(Species::PionKaonProton, 111), Resolution::Flag(false));
        assert_eq!(resolve(Species::ElectronPlus, -11), Resolution::Flag(true));
        assert_eq!(resolve(Species::ElectronPlus, 11), Resolution::Flag(false));
        assert_eq!(resolve(Species::MuonPlus, -13), Resolution::Flag(true));
        assert_eq!(resolve(Species::ChargedHadron, 3112), Resolution::Flag(true));
        assert_eq!(resolve(Species::Hadron, 22), Resolution::Flag(false));
        assert_eq!(resolve(Species::AntiOmegaPlus, -3334), Resolution::Flag(true));
        assert_eq!(resolve(Species::KaonZeroLong, 130), Resolution::Flag(true));
    }

    #[test]
    fn test_kinematic_and_code_conditions() {
        let mut filter = ParticleFilter::new("q", "q");
        filter.add_condition_codes(1, 0, 1.0, 1.0).unwrap();
        filter.add_condition_codes(5, 8, -0.5, 0.5).unwrap();
        assert!(filter.accept(&particle(2212, Vec3::new(0.5, 0.0, 0.1))));
        assert!(!filter.accept(&particle(-2212, Vec3::new(0.5, 0.0, 0.1))));
        assert!(!filter.accept(&particle(2212, Vec3::new(0.1, 0.0, 5.0))));
        assert!(filter.add_condition_codes(4, 1233, 0.0, 0.0).is_err());
        assert!(filter.add_condition_codes(3, 0, 0.0, 0.0).is_err());
        assert!(filter.add_condition_codes(0, 3, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_baryon_filters() {
        let filters = ParticleFilter::baryon_filters(&KinematicCuts::new().with_y(-1.0, 1.0));
        assert_eq!(filters.len(), 18);
        let lambda_bar = filters.iter().find(|f| f.name() == "LambdaBar").unwrap();
        assert!(lambda_bar.accept(&particle(-3122, Vec3::new(0.3, 0.3, 0.0))));
        assert!(!lambda_bar.accept(&particle(3122, Vec3::new(0.3, 0.3, 0.0))));
        let all = ParticleFilter::all_live();
        assert!(all.accept(&particle(22, Vec3::new(0.3, 0.3, 0.0))));
    }
}
