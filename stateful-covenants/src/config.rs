use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use kaspa_addresses::Prefix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{ProgramSet, StateCodec};
use crate::driver::CallDriver;
use crate::model::ContractKind;
use crate::provider::Provider;
use crate::signer::Signer;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid engine config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
    Simnet,
}

impl Network {
    pub fn prefix(self) -> Prefix {
        match self {
            Self::Mainnet => Prefix::Mainnet,
            Self::Testnet => Prefix::Testnet,
            Self::Devnet => Prefix::Devnet,
            Self::Simnet => Prefix::Simnet,
        }
    }
}

/// Hex-encoded verification program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program(#[serde(with = "crate::serde_hex")] pub Vec<u8>);

/// Engine settings, loaded from JSON.
///
/// ```json
/// { "network": "testnet", "fee": 1000, "programs": { "debit_card": "51" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub network: Network,
    /// Fee applied to calls that do not set one.
    pub fee: u64,
    pub programs: BTreeMap<ContractKind, Program>,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&json)
    }

    pub fn prefix(&self) -> Prefix {
        self.network.prefix()
    }

    pub fn codec(&self) -> StateCodec {
        let programs = self.programs.iter().fold(ProgramSet::new(), |set, (kind, program)| set.with_program(*kind, program.0.clone()));
        StateCodec::new(programs)
    }

    /// A driver using this config's codec and default fee.
    pub fn driver<S: Signer, P: Provider>(&self, signer: S, provider: P) -> CallDriver<S, P> {
        CallDriver::new(self.codec(), signer, provider).with_default_fee(self.fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.prefix(), Prefix::Testnet);
        assert_eq!(config.codec().programs(), &ProgramSet::new());
    }

    #[test]
    fn programs_are_hex_per_kind() {
        let config = EngineConfig::from_json_str(r#"{"network":"mainnet","fee":500,"programs":{"tradeable":"7551"}}"#).unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.fee, 500);
        assert_eq!(config.codec().programs().get(ContractKind::Tradeable), &[0x75, 0x51]);
        assert!(config.codec().programs().get(ContractKind::Sellable).is_empty());
    }

    #[test]
    fn rejects_unknown_fields_and_bad_hex() {
        assert!(matches!(EngineConfig::from_json_str(r#"{"fees":1}"#), Err(ConfigError::Parse(_))));
        assert!(matches!(EngineConfig::from_json_str(r#"{"programs":{"sellable":"zz"}}"#), Err(ConfigError::Parse(_))));
        assert!(matches!(EngineConfig::from_json_str(r#"{"programs":{"auction":"51"}}"#), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = EngineConfig::from_path("/nonexistent/engine.json").unwrap_err();
        assert!(err.to_string().starts_with("failed to read /nonexistent/engine.json"));
    }
}
