//! Hashes binding a spend to its outputs.
//!
//! The output commitment is keyed BLAKE2b-256 with the transaction signing key, over
//! `value (u64 LE) || script version (u16 LE) || script length (u64 LE) || script` per output.
//! Signatures use the consensus Schnorr sighash.

use blake2b_simd::{Params, State as Blake2bState};
use kaspa_consensus_core::Hash;
use kaspa_consensus_core::hashing::sighash::{SigHashReusedValues, calc_schnorr_signature_hash};
use kaspa_consensus_core::hashing::sighash_type::SIG_HASH_ALL;
use kaspa_consensus_core::tx::{PopulatedTransaction, Transaction, TransactionOutput, UtxoEntry};

use crate::errors::CovenantError;

const SIGNING_HASH_KEY: &[u8] = b"TransactionSigningHash";

fn hasher() -> Blake2bState {
    Params::new().hash_length(32).key(SIGNING_HASH_KEY).to_state()
}

fn finalize(state: &Blake2bState) -> Hash {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(state.finalize().as_bytes());
    Hash::from_bytes(bytes)
}

fn write_output(state: &mut Blake2bState, output: &TransactionOutput) {
    let script = output.script_public_key.script();
    state.update(&output.value.to_le_bytes());
    state.update(&output.script_public_key.version().to_le_bytes());
    state.update(&(script.len() as u64).to_le_bytes());
    state.update(script);
}

/// Commitment to an ordered output list (`hashOutputs`).
pub fn hash_outputs(outputs: &[TransactionOutput]) -> Hash {
    let mut state = hasher();
    for output in outputs {
        write_output(&mut state, output);
    }
    finalize(&state)
}

/// Schnorr `SIG_HASH_ALL` digest for input `index` of `tx`.
///
/// `entries` holds the previous output of every input, in input order.
pub fn spend_sighash(tx: &Transaction, entries: &[TransactionOutput], index: usize) -> Result<Hash, CovenantError> {
    if entries.len() != tx.inputs.len() {
        return Err(CovenantError::InputMismatch(format!(
            "{} previous outputs supplied for {} inputs",
            entries.len(),
            tx.inputs.len()
        )));
    }
    if index >= tx.inputs.len() {
        return Err(CovenantError::InputMismatch(format!("transaction has no input {index}")));
    }
    let populated = PopulatedTransaction::new(tx, utxo_entries(entries));
    Ok(calc_schnorr_signature_hash(&populated, index, SIG_HASH_ALL, &mut SigHashReusedValues::new()))
}

/// Lifts previous outputs into UTXO entries. DAA score and coinbase flag are not signed.
pub fn utxo_entries(entries: &[TransactionOutput]) -> Vec<UtxoEntry> {
    entries.iter().map(|output| UtxoEntry::new(output.value, output.script_public_key.clone(), 0, false)).collect()
}
