use std::fmt;
use std::sync::Arc;

use kaspa_consensus_core::tx::{Transaction, TransactionId, TransactionOutpoint, TransactionOutput};
use thiserror::Error;

/// An unspent output together with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: TransactionOutpoint,
    pub output: TransactionOutput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    MissingInput(TransactionOutpoint),
    DoubleSpend(TransactionOutpoint),
    NoInputs,
    ValueOverflow,
    OutputsExceedInputs { inputs: u64, outputs: u64 },
    InvalidSignature { input: usize, reason: String },
    UnsupportedScript { input: usize },
    Covenant { input: usize, reason: String },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInput(outpoint) => write!(f, "input {outpoint} does not exist"),
            Self::DoubleSpend(outpoint) => write!(f, "input {outpoint} is already spent"),
            Self::NoInputs => write!(f, "transaction has no inputs"),
            Self::ValueOverflow => write!(f, "value overflow"),
            Self::OutputsExceedInputs { inputs, outputs } => write!(f, "outputs {outputs} exceed inputs {inputs}"),
            Self::InvalidSignature { input, reason } => write!(f, "invalid signature on input {input}: {reason}"),
            Self::UnsupportedScript { input } => write!(f, "input {input} spends an unsupported script"),
            Self::Covenant { input, reason } => write!(f, "covenant check failed on input {input}: {reason}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transaction rejected: {0}")]
    Rejected(RejectionReason),
    #[error("utxo {0} not found")]
    UnknownUtxo(TransactionOutpoint),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// External view of the ledger: UTXO lookup and transaction submission.
pub trait Provider {
    fn get_utxo(&self, outpoint: &TransactionOutpoint) -> Result<Utxo, ProviderError>;

    fn broadcast(&self, tx: &Transaction) -> Result<TransactionId, ProviderError>;
}

impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn get_utxo(&self, outpoint: &TransactionOutpoint) -> Result<Utxo, ProviderError> {
        (**self).get_utxo(outpoint)
    }

    fn broadcast(&self, tx: &Transaction) -> Result<TransactionId, ProviderError> {
        (**self).broadcast(tx)
    }
}
