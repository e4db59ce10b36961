use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{CapError, CapResult};

/// Liveness requirement of a particle filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Liveness {
    /// Only particles which have decayed or were otherwise removed.
    NotLive,
    /// Only particles still present in the final state.
    Live,
    /// Any particle.
    Any,
}

impl Liveness {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::NotLive),
            1 => Some(Self::Live),
            2 => Some(Self::Any),
            _ => None,
        }
    }
    pub fn code(&self) -> i32 {
        match self {
            Self::NotLive => 0,
            Self::Live => 1,
            Self::Any => 2,
        }
    }
    /// Check a particle's liveness flag against this requirement.
    pub fn matches(&self, live: bool) -> bool {
        match self {
            Self::NotLive => !live,
            Self::Live => live,
            Self::Any => true,
        }
    }
}

impl Display for Liveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Liveness::NotLive => write!(f, "NotLive"),
            Liveness::Live => write!(f, "Live"),
            Liveness::Any => write!(f, "Any"),
        }
    }
}

impl FromStr for Liveness {
    type Err = CapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "notlive" | "not live" | "dead" => Ok(Self::NotLive),
            "live" | "alive" => Ok(Self::Live),
            "any" | "all" => Ok(Self::Any),
            _ => Err(CapError::ParseError {
                name: s.to_string(),
                object: "Liveness".to_string(),
            }),
        }
    }
}

/// Kinematic variables a particle filter can cut on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kinematic {
    /// Momentum magnitude.
    P,
    /// Transverse momentum.
    Pt,
    /// Energy.
    E,
    Px,
    Py,
    Pz,
    /// Azimuthal angle in $`(-\pi, \pi]`$.
    Phi,
    /// Pseudorapidity.
    Eta,
    /// Rapidity.
    Y,
}

impl Kinematic {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::P),
            1 => Some(Self::Pt),
            2 => Some(Self::E),
            3 => Some(Self::Px),
            4 => Some(Self::Py),
            5 => Some(Self::Pz),
            6 => Some(Self::Phi),
            7 => Some(Self::Eta),
            8 => Some(Self::Y),
            _ => None,
        }
    }
    pub fn code(&self) -> i32 {
        match self {
            Self::P => 0,
            Self::Pt => 1,
            Self::E => 2,
            Self::Px => 3,
            Self::Py => 4,
            Self::Pz => 5,
            Self::Phi => 6,
            Self::Eta => 7,
            Self::Y => 8,
        }
    }
}

impl Display for Kinematic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kinematic::P => write!(f, "p"),
            Kinematic::Pt => write!(f, "pt"),
            Kinematic::E => write!(f, "E"),
            Kinematic::Px => write!(f, "px"),
            Kinematic::Py => write!(f, "py"),
            Kinematic::Pz => write!(f, "pz"),
            Kinematic::Phi => write!(f, "phi"),
            Kinematic::Eta => write!(f, "eta"),
            Kinematic::Y => write!(f, "y"),
        }
    }
}

impl FromStr for Kinematic {
    type Err = CapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "p" | "momentum" => Ok(Self::P),
            "pt" | "transverse momentum" => Ok(Self::Pt),
            "e" | "energy" => Ok(Self::E),
            "px" => Ok(Self::Px),
            "py" => Ok(Self::Py),
            "pz" => Ok(Self::Pz),
            "phi" => Ok(Self::Phi),
            "eta" | "pseudorapidity" => Ok(Self::Eta),
            "y" | "rapidity" => Ok(Self::Y),
            _ => Err(CapError::ParseError {
                name: s.to_string(),
                object: "Kinematic".to_string(),
            }),
        }
    }
}

macro_rules! species {
    ($($(#[$meta:meta])* $variant:ident = $code:literal, $label:literal;)*) => {
        /// Species categories a particle filter can require.
        ///
        /// Each variant carries the integer subtype code used in configuration files.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Species {
            $($(#[$meta])* $variant,)*
        }

        impl Species {
            /// Every species, in code order.
            pub const ALL: &'static [Species] = &[$(Species::$variant,)*];

            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)*
                    _ => None,
                }
            }
            pub fn code(&self) -> i32 {
                match self {
                    $(Self::$variant => $code,)*
                }
            }
        }

        impl Display for Species {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Species::$variant => write!(f, $label),)*
                }
            }
        }

        impl FromStr for Species {
            type Err = CapError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)*
                    _ => Err(CapError::ParseError {
                        name: s.to_string(),
                        object: "Species".to_string(),
                    }),
                }
            }
        }
    };
}

species! {
    Photon = 0, "photon";
    Lepton = 10, "lepton";
    Electron = 11, "e";
    ElectronMinus = 12, "e-";
    ElectronPlus = 13, "e+";
    Muon = 14, "mu";
    MuonMinus = 15, "mu-";
    MuonPlus = 16, "mu+";
    Tau = 17, "tau";
    TauMinus = 18, "tau-";
    TauPlus = 19, "tau+";
    Strange = 40, "strange";
    StrangePlus = 41, "strange+";
    StrangeMinus = 42, "strange-";
    Charm = 50, "charm";
    CharmPlus = 51, "charm+";
    CharmMinus = 52, "charm-";
    Bottom = 60, "bottom";
    BottomPlus = 61, "bottom+";
    BottomMinus = 62, "bottom-";
    Top = 70, "top";
    Hadron = 1100, "hadron";
    ChargedHadron = 1101, "h";
    /// The explicit $`\pi^\pm`$, $`K^\pm`$, $`p`$, $`\bar{p}`$ list.
    PionKaonProton = 1102, "pi/K/p";
    HadronPlus = 1103, "h+";
    HadronMinus = 1104, "h-";
    Pion = 1110, "pi";
    PionPlus = 1111, "pi+";
    PionZero = 1112, "pi0";
    PionMinus = 1113, "pi-";
    Kaon = 1120, "K";
    KaonPlus = 1121, "K+";
    KaonMinus = 1122, "K-";
    KaonZero = 1123, "K0";
    AntiKaonZero = 1124, "K0bar";
    KaonZeroShort = 1125, "K0S";
    KaonZeroLong = 1126, "K0L";
    Baryon = 1200, "baryon";
    BaryonPlus = 1201, "baryon+";
    BaryonMinus = 1202, "baryon-";
    ProtonOrAntiProton = 1210, "p/pbar";
    Proton = 1211, "p";
    AntiProton = 1212, "pbar";
    LambdaOrAntiLambda = 1220, "Lambda/Lambdabar";
    Lambda = 1221, "Lambda";
    AntiLambda = 1222, "Lambdabar";
    SigmaPlus = 1230, "Sigma+";
    SigmaZero = 1231, "Sigma0";
    SigmaMinus = 1232, "Sigma-";
    AntiSigmaPlus = 1241, "Sigma+bar";
    AntiSigmaZero = 1242, "Sigma0bar";
    AntiSigmaMinus = 1243, "Sigma-bar";
    XiZero = 1244, "Xi0";
    XiMinus = 1245, "Xi-";
    AntiXiZero = 1246, "Xi0bar";
    AntiXiMinus = 1247, "Xi-bar";
    OmegaMinus = 1248, "Omega-";
    AntiOmegaPlus = 1249, "Omega+bar";
}

/// The event property used as the independent variable of multiplicity-differential moments.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiplicityType {
    /// Fractional cross section (centrality, in percent).
    Centrality,
    /// Total reference multiplicity.
    Total,
    /// Accepted reference multiplicity.
    Accepted,
}

impl MultiplicityType {
    pub fn from_code(code: i32) -> CapResult<Self> {
        match code {
            0 => Ok(Self::Centrality),
            1 => Ok(Self::Total),
            2 => Ok(Self::Accepted),
            _ => Err(CapError::ParseError {
                name: code.to_string(),
                object: "MultiplicityType".to_string(),
            }),
        }
    }
    pub fn code(&self) -> i32 {
        match self {
            Self::Centrality => 0,
            Self::Total => 1,
            Self::Accepted => 2,
        }
    }
    /// Suffix appended to the names of multiplicity-differential histograms.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Centrality => "_vsCent",
            Self::Total | Self::Accepted => "_vsMult",
        }
    }
    /// Axis title of multiplicity-differential histograms.
    pub fn axis_title(&self) -> &'static str {
        match self {
            Self::Centrality => "%",
            Self::Total => "mult_{Tot}",
            Self::Accepted => "mult_{acc}",
        }
    }
}

impl Display for MultiplicityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultiplicityType::Centrality => write!(f, "Centrality"),
            MultiplicityType::Total => write!(f, "Total"),
            MultiplicityType::Accepted => write!(f, "Accepted"),
        }
    }
}

impl FromStr for MultiplicityType {
    type Err = CapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "centrality" | "cent" | "0" => Ok(Self::Centrality),
            "total" | "tot" | "1" => Ok(Self::Total),
            "accepted" | "acc" | "2" => Ok(Self::Accepted),
            _ => Err(CapError::ParseError {
                name: s.to_string(),
                object: "MultiplicityType".to_string(),
            }),
        }
    }
}
