use kaspa_consensus_core::tx::{Transaction, TransactionId, TransactionOutpoint, TransactionOutput};
use kaspa_txscript::script_builder::ScriptBuilder;
use secp256k1::XOnlyPublicKey;
use tracing::{debug, info, warn};

use crate::codec::StateCodec;
use crate::commitment::spend_sighash;
use crate::errors::CovenantError;
use crate::model::{ContractInstance, Covenant, State};
use crate::provider::Provider;
use crate::signer::Signer;
use crate::transition::Transition;
use crate::tx_builder::{BuildOptions, BuilderTable, CovenantTxBuilder};
use crate::unlock::{UnlockScript, signature_push};

/// Result of a broadcast call.
#[derive(Debug, Clone)]
pub struct CallOutcome<C: Covenant> {
    pub tx_id: TransactionId,
    pub tx: Transaction,
    pub transition: Transition<C>,
    /// The successor instance, `None` after a terminal call.
    pub next: Option<ContractInstance<C>>,
}

/// Runs calls end to end: build, sign, broadcast, then read the successor back from the
/// broadcast transaction.
///
/// Calls are strictly sequential. Nothing is retried: a rejection from the provider is
/// returned to the caller as is.
pub struct CallDriver<S, P> {
    codec: StateCodec,
    signer: S,
    provider: P,
    default_fee: u64,
}

impl<S: Signer, P: Provider> CallDriver<S, P> {
    pub fn new(codec: StateCodec, signer: S, provider: P) -> Self {
        Self { codec, signer, provider, default_fee: 0 }
    }

    pub fn with_default_fee(mut self, fee: u64) -> Self {
        self.default_fee = fee;
        self
    }

    pub fn codec(&self) -> &StateCodec {
        &self.codec
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn with_fee(&self, mut options: BuildOptions) -> BuildOptions {
        options.fee.get_or_insert(self.default_fee);
        options
    }

    /// Signs the pay-to-pubkey inputs starting at `first`, one key per input.
    fn sign_inputs(
        &self,
        tx: &mut Transaction,
        entries: &[TransactionOutput],
        funding_keys: &[XOnlyPublicKey],
        first: usize,
    ) -> Result<(), CovenantError> {
        for (offset, key) in funding_keys.iter().enumerate() {
            let index = first + offset;
            let sighash = spend_sighash(tx, entries, index)?;
            let signature = self.signer.sign(sighash, key)?;
            tx.inputs[index].signature_script = ScriptBuilder::new().add_data(&signature_push(&signature))?.drain();
        }
        Ok(())
    }

    fn submit(&self, tx: &Transaction, what: &str) -> Result<TransactionId, CovenantError> {
        match self.provider.broadcast(tx) {
            Ok(tx_id) => {
                info!(target: "covenant::driver", %tx_id, what, "broadcast accepted");
                Ok(tx_id)
            }
            Err(err) => {
                warn!(target: "covenant::driver", tx_id = %tx.id(), what, error = %err, "broadcast rejected");
                Err(err.into())
            }
        }
    }

    /// Funds, signs and broadcasts a new instance of `state` holding `balance`.
    pub fn deploy<C: Covenant>(&self, state: State<C>, balance: u64, options: BuildOptions) -> Result<ContractInstance<C>, CovenantError> {
        let options = self.with_fee(options);
        let builders = BuilderTable::<C>::new();
        let mint = CovenantTxBuilder::new(&self.codec, &builders).build_mint(state, balance, &options)?;

        let mut tx = mint.tx;
        self.sign_inputs(&mut tx, &mint.entries, &mint.funding_keys, 0)?;
        tx.finalize();

        let tx_id = self.submit(&tx, C::KIND.name())?;
        let instance = ContractInstance::from_tx(&self.codec, &tx, 0)?;
        info!(target: "covenant::driver", kind = %C::KIND, %tx_id, balance, "deployed contract");
        Ok(instance)
    }

    /// Loads the instance currently held by `outpoint`.
    pub fn fetch<C: Covenant>(&self, outpoint: &TransactionOutpoint) -> Result<ContractInstance<C>, CovenantError> {
        let utxo = self.provider.get_utxo(outpoint)?;
        ContractInstance::from_utxo(&self.codec, &utxo)
    }

    /// Builds, signs and broadcasts `call` on `instance` using the builder bound in `builders`.
    pub fn call<C: Covenant>(
        &self,
        builders: &BuilderTable<C>,
        instance: &ContractInstance<C>,
        call: C::Call,
        options: BuildOptions,
    ) -> Result<CallOutcome<C>, CovenantError> {
        let options = self.with_fee(options);
        let spend = CovenantTxBuilder::new(&self.codec, builders).build(instance, call, &options).inspect_err(|err| {
            warn!(target: "covenant::driver", kind = %C::KIND, location = %instance.location, error = %err, "call aborted before broadcast")
        })?;
        let method = spend.transition.method_name();
        debug!(target: "covenant::driver", kind = %C::KIND, method, terminal = spend.transition.is_terminal(), "built transition");

        let mut tx = spend.tx;
        let signature = match &spend.guard {
            Some(guard) => Some(self.signer.sign(spend_sighash(&tx, &spend.entries, 0)?, &guard.key)?),
            None => None,
        };
        tx.inputs[0].signature_script = UnlockScript::<C>::new(signature, spend.call, spend.change).encode()?;
        self.sign_inputs(&mut tx, &spend.entries, &spend.funding_keys, 1)?;
        tx.finalize();

        let tx_id = self.submit(&tx, method)?;
        let next = if spend.transition.is_terminal() { None } else { Some(ContractInstance::from_tx(&self.codec, &tx, 0)?) };
        Ok(CallOutcome { tx_id, tx, transition: spend.transition, next })
    }
}
