//! Transition validity: authorization and output commitment.
//!
//! [`verify_covenant_spend`] is the ledger-side view of a covenant spend. It decodes the
//! previous state and the unlocking script, re-runs the transition, and accepts the spend only
//! if the signature satisfies a guard and the actual outputs hash to the expected ones.

use kaspa_consensus_core::Hash;
use kaspa_consensus_core::tx::{Transaction, TransactionOutput};
use secp256k1::schnorr::Signature;

use crate::codec::StateCodec;
use crate::commitment::{hash_outputs, spend_sighash};
use crate::contracts::{DebitCard, Depositable, Sellable, Tradeable};
use crate::errors::CovenantError;
use crate::model::{ContractInstance, ContractKind, Covenant};
use crate::signer::verify_signature;
use crate::transition::{Guard, Transition};
use crate::unlock::UnlockScript;

/// Returns the first guard `signature` satisfies, or `None` when the call needs no signature.
pub fn authorize<'t, C: Covenant>(
    transition: &'t Transition<C>,
    sighash: Hash,
    signature: Option<&Signature>,
) -> Result<Option<&'t Guard>, CovenantError> {
    if !transition.requires_signature() {
        return Ok(None);
    }
    let failure = || CovenantError::AuthorizationFailure { method: transition.method_name(), expected: transition.expected_keys() };
    let signature = signature.ok_or_else(failure)?;
    transition.guards.iter().find(|guard| verify_signature(sighash, signature, &guard.key)).map(Some).ok_or_else(failure)
}

/// Exact-byte comparison of two output lists through their commitment hash.
pub fn check_commitment(expected: &[TransactionOutput], actual: &[TransactionOutput]) -> Result<(), CovenantError> {
    let expected = hash_outputs(expected);
    let actual = hash_outputs(actual);
    if expected != actual {
        return Err(CovenantError::CommitmentMismatch { expected, actual });
    }
    Ok(())
}

/// Checks that input `index` of `tx`, spending the `C` instance held by `entries[index]`, is valid.
///
/// `entries` holds the previous output of every input of `tx`, in input order.
pub fn verify_spend<C: Covenant>(
    codec: &StateCodec,
    tx: &Transaction,
    entries: &[TransactionOutput],
    index: usize,
) -> Result<Transition<C>, CovenantError> {
    let input = tx.inputs.get(index).ok_or_else(|| CovenantError::InputMismatch(format!("transaction has no input {index}")))?;
    let spent = entries.get(index).ok_or_else(|| CovenantError::InputMismatch(format!("no previous output for input {index}")))?;
    let (state, balance) = codec.decode::<C>(spent)?;
    let instance = ContractInstance { state, balance, location: input.previous_outpoint };
    let unlock = UnlockScript::<C>::decode(&input.signature_script)?;

    let transition = C::apply(&instance, &unlock.call)?;
    let sighash = spend_sighash(tx, entries, index)?;
    let guard = authorize(&transition, sighash, unlock.signature.as_ref())?;

    if let Some(expected) = transition.expected_outputs(codec, guard, unlock.change.as_ref())? {
        check_commitment(&expected, &tx.outputs)?;
    }
    Ok(transition)
}

/// Dispatches [`verify_spend`] on the variant named by the spent script's header.
pub fn verify_covenant_spend(
    codec: &StateCodec,
    tx: &Transaction,
    entries: &[TransactionOutput],
    index: usize,
) -> Result<ContractKind, CovenantError> {
    let spent = entries.get(index).ok_or_else(|| CovenantError::InputMismatch(format!("no previous output for input {index}")))?;
    let kind = codec.decode_kind(spent.script_public_key.script())?;
    match kind {
        ContractKind::DebitCard => verify_spend::<DebitCard>(codec, tx, entries, index).map(|_| kind),
        ContractKind::Depositable => verify_spend::<Depositable>(codec, tx, entries, index).map(|_| kind),
        ContractKind::Tradeable => verify_spend::<Tradeable>(codec, tx, entries, index).map(|_| kind),
        ContractKind::Sellable => verify_spend::<Sellable>(codec, tx, entries, index).map(|_| kind),
    }
}
