use std::collections::{HashMap, HashSet};
use std::fmt;

use kaspa_consensus_core::Hash;
use kaspa_consensus_core::hashing::sighash::SigHashReusedValues;
use kaspa_consensus_core::tx::{PopulatedTransaction, ScriptPublicKey, Transaction, TransactionId, TransactionOutpoint, TransactionOutput};
use kaspa_txscript::caches::Cache;
use kaspa_txscript::opcodes::codes::{OpCheckSig, OpData32};
use kaspa_txscript::{SigCacheKey, TxScriptEngine};
use kaspa_txscript_errors::TxScriptError;
use parking_lot::Mutex;
use tracing::debug;

use crate::codec::StateCodec;
use crate::commitment::utxo_entries;
use crate::provider::{Provider, ProviderError, RejectionReason, Utxo};
use crate::rule::verify_covenant_spend;

const SIG_CACHE_SIZE: u64 = 10_000;

#[derive(Debug, Default)]
struct LedgerState {
    utxos: HashMap<TransactionOutpoint, TransactionOutput>,
    spent: HashSet<TransactionOutpoint>,
    accepted: Vec<TransactionId>,
    minted: u64,
}

/// In-memory UTXO set that validates transactions the way the ledger would.
///
/// Pay-to-pubkey spends run through the script engine; covenant spends must pass
/// [`verify_covenant_spend`]. The first transaction to spend an output wins; later attempts
/// are rejected as double spends.
pub struct MemoryLedger {
    codec: StateCodec,
    state: Mutex<LedgerState>,
    sig_cache: Cache<SigCacheKey, bool>,
}

impl fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLedger").field("codec", &self.codec).field("state", &self.state).finish_non_exhaustive()
    }
}

impl MemoryLedger {
    pub fn new(codec: StateCodec) -> Self {
        Self { codec, state: Mutex::new(LedgerState::default()), sig_cache: Cache::new(SIG_CACHE_SIZE) }
    }

    /// Creates an output out of thin air.
    pub fn fund(&self, script: ScriptPublicKey, value: u64) -> Utxo {
        let mut state = self.state.lock();
        state.minted += 1;
        let outpoint = TransactionOutpoint::new(Hash::from_u64_word(u64::MAX - state.minted), 0);
        let output = TransactionOutput::new(value, script);
        state.utxos.insert(outpoint, output.clone());
        Utxo { outpoint, output }
    }

    pub fn is_unspent(&self, outpoint: &TransactionOutpoint) -> bool {
        self.state.lock().utxos.contains_key(outpoint)
    }

    pub fn is_spent(&self, outpoint: &TransactionOutpoint) -> bool {
        self.state.lock().spent.contains(outpoint)
    }

    pub fn accepted(&self) -> Vec<TransactionId> {
        self.state.lock().accepted.clone()
    }

    fn validate(&self, state: &LedgerState, tx: &Transaction) -> Result<(), RejectionReason> {
        if tx.inputs.is_empty() {
            return Err(RejectionReason::NoInputs);
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            let outpoint = input.previous_outpoint;
            if state.spent.contains(&outpoint) || !seen.insert(outpoint) {
                return Err(RejectionReason::DoubleSpend(outpoint));
            }
            let entry = state.utxos.get(&outpoint).ok_or(RejectionReason::MissingInput(outpoint))?;
            entries.push(entry.clone());
        }

        let inputs = entries.iter().try_fold(0u64, |acc, entry| acc.checked_add(entry.value)).ok_or(RejectionReason::ValueOverflow)?;
        let outputs =
            tx.outputs.iter().try_fold(0u64, |acc, output| acc.checked_add(output.value)).ok_or(RejectionReason::ValueOverflow)?;
        if outputs > inputs {
            return Err(RejectionReason::OutputsExceedInputs { inputs, outputs });
        }

        let populated = PopulatedTransaction::new(tx, utxo_entries(&entries));
        for (index, entry) in entries.iter().enumerate() {
            let script = entry.script_public_key.script();
            if self.codec.is_covenant_script(script) {
                verify_covenant_spend(&self.codec, tx, &entries, index)
                    .map_err(|err| RejectionReason::Covenant { input: index, reason: err.to_string() })?;
            } else if is_pay_to_pubkey(script) {
                self.execute_input(&populated, index)
                    .map_err(|err| RejectionReason::InvalidSignature { input: index, reason: err.to_string() })?;
            } else {
                return Err(RejectionReason::UnsupportedScript { input: index });
            }
        }
        Ok(())
    }

    fn execute_input(&self, populated: &PopulatedTransaction<'_>, index: usize) -> Result<(), TxScriptError> {
        let mut reused_values = SigHashReusedValues::new();
        let mut engine = TxScriptEngine::from_transaction_input(
            populated,
            &populated.tx.inputs[index],
            index,
            &populated.entries[index],
            &mut reused_values,
            &self.sig_cache,
        )?;
        engine.execute()
    }
}

fn is_pay_to_pubkey(script: &[u8]) -> bool {
    matches!(script, [OpData32, key @ .., OpCheckSig] if key.len() == 32)
}

impl Provider for MemoryLedger {
    fn get_utxo(&self, outpoint: &TransactionOutpoint) -> Result<Utxo, ProviderError> {
        let state = self.state.lock();
        let output = state.utxos.get(outpoint).ok_or(ProviderError::UnknownUtxo(*outpoint))?;
        Ok(Utxo { outpoint: *outpoint, output: output.clone() })
    }

    fn broadcast(&self, tx: &Transaction) -> Result<TransactionId, ProviderError> {
        let mut state = self.state.lock();
        self.validate(&state, tx).map_err(ProviderError::Rejected)?;

        let tx_id = tx.id();
        for input in &tx.inputs {
            state.utxos.remove(&input.previous_outpoint);
            state.spent.insert(input.previous_outpoint);
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            state.utxos.insert(TransactionOutpoint::new(tx_id, index as u32), output.clone());
        }
        state.accepted.push(tx_id);
        debug!(target: "covenant::ledger", %tx_id, inputs = tx.inputs.len(), outputs = tx.outputs.len(), "accepted transaction");
        Ok(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{LocalSigner, Signer, pay_to_pubkey};
    use kaspa_addresses::Prefix;
    use kaspa_consensus_core::constants::TX_VERSION;
    use kaspa_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
    use crate::commitment::spend_sighash;
    use crate::unlock::signature_push;
    use kaspa_consensus_core::tx::TransactionInput;
    use kaspa_txscript::script_builder::ScriptBuilder;
    use secp256k1::{Keypair, Secp256k1, SecretKey, XOnlyPublicKey};

    fn keypair(byte: u8) -> Keypair {
        Keypair::from_secret_key(&Secp256k1::new(), &SecretKey::from_slice(&[byte; 32]).unwrap())
    }

    fn spend(utxo: &Utxo, value: u64, signer: &LocalSigner, key: &XOnlyPublicKey) -> Transaction {
        let input = TransactionInput::new(utxo.outpoint, vec![], 0, 1);
        let output = TransactionOutput::new(value, pay_to_pubkey(key));
        let mut tx = Transaction::new(TX_VERSION, vec![input], vec![output], 0, SUBNETWORK_ID_NATIVE, 0, vec![]);
        let sighash = spend_sighash(&tx, &[utxo.output.clone()], 0).unwrap();
        let sig = signer.sign(sighash, key).unwrap();
        tx.inputs[0].signature_script = ScriptBuilder::new().add_data(&signature_push(&sig)).unwrap().drain();
        tx.finalize();
        tx
    }

    #[test]
    fn first_spend_wins() {
        let owner = keypair(1);
        let key = owner.x_only_public_key().0;
        let signer = LocalSigner::new(Prefix::Testnet).with_keypair(owner);
        let ledger = MemoryLedger::new(StateCodec::default());
        let utxo = ledger.fund(pay_to_pubkey(&key), 100);

        let first = spend(&utxo, 90, &signer, &key);
        let tx_id = ledger.broadcast(&first).unwrap();
        assert!(ledger.is_spent(&utxo.outpoint));
        assert!(ledger.is_unspent(&TransactionOutpoint::new(tx_id, 0)));

        let second = spend(&utxo, 80, &signer, &key);
        let err = ledger.broadcast(&second).unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(RejectionReason::DoubleSpend(outpoint)) if outpoint == utxo.outpoint));
        assert_eq!(ledger.accepted(), vec![tx_id]);
    }

    #[test]
    fn rejects_bad_signature_and_inflation() {
        let owner = keypair(1);
        let key = owner.x_only_public_key().0;
        let ledger = MemoryLedger::new(StateCodec::default());
        let utxo = ledger.fund(pay_to_pubkey(&key), 100);

        let thief = keypair(2);
        let thief_signer = LocalSigner::new(Prefix::Testnet).with_keypair(thief);
        let mut forged = spend(&utxo, 90, &thief_signer, &thief.x_only_public_key().0);
        forged.outputs[0] = TransactionOutput::new(90, pay_to_pubkey(&key));
        assert!(matches!(ledger.broadcast(&forged), Err(ProviderError::Rejected(RejectionReason::InvalidSignature { input: 0, .. }))));

        let signer = LocalSigner::new(Prefix::Testnet).with_keypair(owner);
        let inflated = spend(&utxo, 101, &signer, &key);
        assert!(matches!(
            ledger.broadcast(&inflated),
            Err(ProviderError::Rejected(RejectionReason::OutputsExceedInputs { inputs: 100, outputs: 101 }))
        ));
        assert!(ledger.is_unspent(&utxo.outpoint));
    }

    #[test]
    fn bare_schnorr_signature_without_hash_type_is_rejected() {
        let owner = keypair(1);
        let key = owner.x_only_public_key().0;
        let signer = LocalSigner::new(Prefix::Testnet).with_keypair(owner);
        let ledger = MemoryLedger::new(StateCodec::default());
        let utxo = ledger.fund(pay_to_pubkey(&key), 100);

        let mut tx = spend(&utxo, 90, &signer, &key);
        let sighash = spend_sighash(&tx, &[utxo.output.clone()], 0).unwrap();
        let sig = signer.sign(sighash, &key).unwrap();
        tx.inputs[0].signature_script = ScriptBuilder::new().add_data(&sig.serialize()).unwrap().drain();
        tx.finalize();

        let err = ledger.broadcast(&tx).unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(RejectionReason::InvalidSignature { input: 0, .. })));
        assert!(ledger.is_unspent(&utxo.outpoint));
    }
}
