use covenant_sdk::{FieldError, LayoutError};
use kaspa_consensus_core::Hash;
use kaspa_txscript::script_builder::ScriptBuilderError;
use thiserror::Error;

use crate::model::ContractKind;
use crate::provider::ProviderError;
use crate::signer::SignerError;

#[derive(Debug, Error)]
pub enum CovenantError {
    #[error("{method}: signature does not verify against {expected}")]
    AuthorizationFailure { method: &'static str, expected: String },
    #[error("{method}: {detail}")]
    InvariantViolation { method: &'static str, detail: String },
    #[error("outputs hash {actual} does not match committed hash {expected}")]
    CommitmentMismatch { expected: Hash, actual: Hash },
    #[error("malformed state: {0}")]
    MalformedState(String),
    #[error("no transaction builder bound for {kind}.{method}")]
    BuilderUnbound { kind: ContractKind, method: &'static str },
    #[error("insufficient funds: {available} available, {required} required")]
    InsufficientFunds { available: u64, required: u64 },
    #[error("terminal spend has neither a destination nor a change recipient")]
    MissingDestination,
    #[error("change of {0} has no change recipient")]
    MissingChangeRecipient(u64),
    #[error("input mismatch: {0}")]
    InputMismatch(String),
    #[error("value overflow in {0}")]
    ValueOverflow(&'static str),
    #[error("script build error: {0}")]
    ScriptBuild(#[from] ScriptBuilderError),
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl CovenantError {
    pub fn invariant(method: &'static str, detail: impl Into<String>) -> Self {
        Self::InvariantViolation { method, detail: detail.into() }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedState(detail.into())
    }
}

impl From<LayoutError> for CovenantError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::ScriptBuilder(err) => Self::ScriptBuild(err),
            other => Self::MalformedState(other.to_string()),
        }
    }
}

impl From<FieldError> for CovenantError {
    fn from(err: FieldError) -> Self {
        Self::MalformedState(err.to_string())
    }
}
