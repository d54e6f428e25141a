//! Hardfork selection for the development chain.

use revm::primitives::SpecId;
use serde::{Deserialize, Serialize};

/// The EVM rule set the chain runs under. The fork is fixed for the lifetime of the
/// chain; there are no activation heights on a development chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Hardfork {
    /// Byzantium.
    Byzantium,
    /// Constantinople.
    Constantinople,
    /// Petersburg (Constantinople fix).
    Petersburg,
    /// Istanbul.
    Istanbul,
    /// Muir Glacier.
    MuirGlacier,
    /// Berlin.
    Berlin,
    /// London.
    London,
    /// The Merge.
    Merge,
    /// Shanghai.
    #[default]
    Shanghai,
    /// Cancun.
    Cancun,
}

impl Hardfork {
    /// Maps the fork onto the VM's [SpecId].
    pub const fn spec_id(self) -> SpecId {
        match self {
            Self::Byzantium => SpecId::BYZANTIUM,
            Self::Constantinople => SpecId::CONSTANTINOPLE,
            Self::Petersburg => SpecId::PETERSBURG,
            Self::Istanbul => SpecId::ISTANBUL,
            Self::MuirGlacier => SpecId::MUIR_GLACIER,
            Self::Berlin => SpecId::BERLIN,
            Self::London => SpecId::LONDON,
            Self::Merge => SpecId::MERGE,
            Self::Shanghai => SpecId::SHANGHAI,
            Self::Cancun => SpecId::CANCUN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_shanghai() {
        assert_eq!(Hardfork::default(), Hardfork::Shanghai);
        assert_eq!(Hardfork::default().spec_id(), SpecId::SHANGHAI);
    }

    #[test]
    fn test_serde_names_are_camel_case() {
        let fork: Hardfork = serde_json::from_str("\"muirGlacier\"").unwrap();
        assert_eq!(fork, Hardfork::MuirGlacier);
        assert!(serde_json::from_str::<Hardfork>("\"spuriousDragon\"").is_err());
    }
}
