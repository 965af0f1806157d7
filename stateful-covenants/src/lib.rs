//! State-transition and covenant-verification engine for state-carrying UTXO contracts.
//!
//! A contract instance lives in exactly one unspent output. Each call computes the successor
//! state ([`model::Covenant::apply`]), the outputs a valid spend must commit to
//! ([`transition::Transition::expected_outputs`]), and a spending transaction that produces
//! exactly those outputs ([`tx_builder::CovenantTxBuilder`]). [`driver::CallDriver`] signs and
//! submits the result through the external [`signer::Signer`] and [`provider::Provider`].

pub mod codec;
pub mod commitment;
pub mod config;
pub mod contracts;
pub mod driver;
pub mod errors;
pub mod ledger;
pub mod model;
pub mod provider;
pub mod rule;
pub mod serde_hex;
pub mod signer;
pub mod transition;
pub mod tx_builder;
pub mod unlock;

pub use codec::{ProgramSet, StateCodec};
pub use config::{EngineConfig, Network};
pub use contracts::{DebitCard, Depositable, Sellable, Tradeable};
pub use driver::{CallDriver, CallOutcome};
pub use errors::CovenantError;
pub use ledger::MemoryLedger;
pub use model::{ContractInstance, ContractKind, Covenant, Method, Role, State};
pub use provider::{Provider, ProviderError, RejectionReason, Utxo};
pub use signer::{LocalSigner, Signer, SignerError};
pub use transition::{Guard, Payout, Transition};
pub use tx_builder::{BuildOptions, BuilderTable, CovenantTxBuilder, FundingInput};
