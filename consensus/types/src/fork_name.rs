use crate::{ChainSpec, Epoch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The consensus forks, in activation order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum ForkName {
    Base,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
    Electra,
}

impl ForkName {
    pub fn list_all() -> Vec<ForkName> {
        use strum::IntoEnumIterator;
        ForkName::iter().collect()
    }

    pub fn latest() -> ForkName {
        ForkName::Electra
    }

    /// True from Altair onwards: sync committees exist.
    pub fn altair_enabled(self) -> bool {
        self >= ForkName::Altair
    }

    /// True from Bellatrix onwards: execution payloads (and the optimistic
    /// sync machinery around them) exist.
    pub fn bellatrix_enabled(self) -> bool {
        self >= ForkName::Bellatrix
    }

    /// True from Capella onwards: BLS-to-execution changes exist.
    pub fn capella_enabled(self) -> bool {
        self >= ForkName::Capella
    }

    /// True from Deneb onwards: blob sidecars and KZG commitments exist.
    pub fn deneb_enabled(self) -> bool {
        self >= ForkName::Deneb
    }

    /// True from Electra onwards: committee-bits attestations exist.
    pub fn electra_enabled(self) -> bool {
        self >= ForkName::Electra
    }

    /// Returns a spec where every fork up to and including `self` activates
    /// at genesis. The usual way tests pin a fork.
    pub fn make_genesis_spec(self, spec: ChainSpec) -> ChainSpec {
        ChainSpec::make_genesis_spec(self, spec)
    }

    /// The epoch at which this fork activates, if scheduled.
    pub fn activation_epoch(self, spec: &ChainSpec) -> Option<Epoch> {
        match self {
            ForkName::Base => Some(Epoch::new(0)),
            ForkName::Altair => spec.altair_fork_epoch,
            ForkName::Bellatrix => spec.bellatrix_fork_epoch,
            ForkName::Capella => spec.capella_fork_epoch,
            ForkName::Deneb => spec.deneb_fork_epoch,
            ForkName::Electra => spec.electra_fork_epoch,
        }
    }
}

impl FromStr for ForkName {
    type Err = String;

    fn from_str(fork_name: &str) -> Result<Self, String> {
        Ok(match fork_name.to_lowercase().as_str() {
            "phase0" | "base" => ForkName::Base,
            "altair" => ForkName::Altair,
            "bellatrix" | "merge" => ForkName::Bellatrix,
            "capella" => ForkName::Capella,
            "deneb" => ForkName::Deneb,
            "electra" => ForkName::Electra,
            _ => return Err(format!("unknown fork name: {fork_name}")),
        })
    }
}

impl fmt::Display for ForkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ForkName::Base => "phase0".fmt(f),
            ForkName::Altair => "altair".fmt(f),
            ForkName::Bellatrix => "bellatrix".fmt(f),
            ForkName::Capella => "capella".fmt(f),
            ForkName::Deneb => "deneb".fmt(f),
            ForkName::Electra => "electra".fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_ordering() {
        let all = ForkName::list_all();
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(all.first(), Some(&ForkName::Base));
        assert_eq!(all.last(), Some(&ForkName::latest()));
    }

    #[test]
    fn enabled_predicates_are_monotonic() {
        assert!(!ForkName::Base.altair_enabled());
        assert!(ForkName::Altair.altair_enabled());
        assert!(ForkName::Electra.deneb_enabled());
        assert!(!ForkName::Deneb.electra_enabled());
    }

    #[test]
    fn string_round_trip() {
        for fork in ForkName::list_all() {
            assert_eq!(ForkName::from_str(&fork.to_string()).unwrap(), fork);
        }
        assert_eq!(ForkName::from_str("merge").unwrap(), ForkName::Bellatrix);
        assert!(ForkName::from_str("fulu").is_err());
    }
}
