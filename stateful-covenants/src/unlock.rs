//! Unlocking script carried by a covenant spend.
//!
//! ```text
//! <signature | OpFalse> <ARGS_VERSION || args> <change | OpFalse> <selector>
//! ```
//!
//! The declared change output is part of what the spend commits to, so a verifier can
//! rebuild the expected output list from the previous state and this script alone.

use covenant_sdk::{FieldReader, FieldWriter, ScriptCursor};
use kaspa_consensus_core::hashing::sighash_type::SIG_HASH_ALL;
use kaspa_consensus_core::tx::{ScriptPublicKey, TransactionOutput};
use kaspa_txscript::script_builder::ScriptBuilder;
use secp256k1::schnorr::Signature;

use crate::errors::CovenantError;
use crate::model::{Covenant, Method};

pub const ARGS_VERSION: u8 = 1;

/// Schnorr signature followed by its `SIG_HASH_ALL` type byte, as pushed in signature scripts.
pub fn signature_push(signature: &Signature) -> Vec<u8> {
    let mut push = Vec::with_capacity(65);
    push.extend_from_slice(&signature.serialize());
    push.push(SIG_HASH_ALL.to_u8());
    push
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockScript<C: Covenant> {
    pub signature: Option<Signature>,
    pub call: C::Call,
    pub change: Option<TransactionOutput>,
}

impl<C: Covenant> UnlockScript<C> {
    pub fn new(signature: Option<Signature>, call: C::Call, change: Option<TransactionOutput>) -> Self {
        Self { signature, call, change }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CovenantError> {
        let mut args = FieldWriter::versioned(ARGS_VERSION);
        C::write_args(&self.call, &mut args)?;

        let change = match &self.change {
            Some(output) => {
                let mut blob = FieldWriter::new();
                blob.put_u64(output.value).put_u16(output.script_public_key.version()).put_bytes(output.script_public_key.script())?;
                Some(blob.finish())
            }
            None => None,
        };

        let signature = self.signature.as_ref().map(signature_push);

        let mut builder = ScriptBuilder::new();
        builder.add_data(signature.as_deref().unwrap_or_default())?;
        builder.add_data(args.as_slice())?;
        builder.add_data(change.as_deref().unwrap_or_default())?;
        builder.add_i64(C::method(&self.call).selector() as i64)?;
        Ok(builder.drain())
    }

    pub fn decode(script: &[u8]) -> Result<Self, CovenantError> {
        let mut cursor = ScriptCursor::new(script);
        let signature = cursor.read_push("signature")?;
        let args = cursor.read_push("call arguments")?;
        let change = cursor.read_push("change output")?;
        let selector = cursor.read_push("method selector")?;
        cursor.finish()?;

        let signature = match signature.as_slice() {
            [] => None,
            [sig @ .., hash_type] if sig.len() == 64 => {
                if *hash_type != SIG_HASH_ALL.to_u8() {
                    return Err(CovenantError::malformed(format!("signature hash type {hash_type:#04x} is not SIG_HASH_ALL")));
                }
                Some(Signature::from_slice(sig).map_err(|err| CovenantError::malformed(format!("signature: {err}")))?)
            }
            other => return Err(CovenantError::malformed(format!("signature push has {} bytes, expected 65", other.len()))),
        };

        let selector = match selector.as_slice() {
            [] => 0,
            [n] if *n < 0x80 => *n,
            other => return Err(CovenantError::malformed(format!("invalid method selector {}", hex::encode(other)))),
        };
        let method = C::Method::from_selector(selector)
            .ok_or_else(|| CovenantError::malformed(format!("{} has no method with selector {selector}", C::KIND)))?;

        let mut reader = FieldReader::versioned(&args, "call arguments", ARGS_VERSION)?;
        let call = C::read_args(method, &mut reader)?;
        reader.finish()?;

        let change = if change.is_empty() {
            None
        } else {
            let mut reader = FieldReader::new(&change);
            let value = reader.u64("change value")?;
            let version = reader.u16("change script version")?;
            let script = reader.bytes("change script")?;
            reader.finish()?;
            Some(TransactionOutput::new(value, ScriptPublicKey::new(version, script.into())))
        };

        Ok(Self { signature, call, change })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{DebitCard, DebitCardCall, Sellable, SellableCall, Tradeable, TradeableCall};
    use kaspa_consensus_core::Hash;
    use secp256k1::{Keypair, Message, Secp256k1, SecretKey};

    fn keypair(byte: u8) -> Keypair {
        Keypair::from_secret_key(&Secp256k1::new(), &SecretKey::from_slice(&[byte; 32]).unwrap())
    }

    #[test]
    fn signed_call_with_change_decodes() {
        let sig = keypair(1).sign_schnorr(Message::from_digest(Hash::from_u64_word(1).as_bytes()));
        let change = TransactionOutput::new(12, ScriptPublicKey::new(0, vec![0x51].into()));
        let unlock = UnlockScript::<DebitCard>::new(
            Some(sig),
            DebitCardCall::Withdraw { value: 3, reason: "rent".into() },
            Some(change),
        );
        assert_eq!(UnlockScript::<DebitCard>::decode(&unlock.encode().unwrap()).unwrap(), unlock);
    }

    #[test]
    fn first_method_without_args_uses_small_pushes() {
        let unlock = UnlockScript::<Tradeable>::new(None, TradeableCall::SetAsk { ask: 0 }, None);
        let script = unlock.encode().unwrap();
        assert_eq!(UnlockScript::<Tradeable>::decode(&script).unwrap(), unlock);

        // Only the version byte: it is pushed as a small integer.
        let unlock = UnlockScript::<Sellable>::new(None, SellableCall::Remove, None);
        assert_eq!(UnlockScript::<Sellable>::decode(&unlock.encode().unwrap()).unwrap(), unlock);
    }

    #[test]
    fn unknown_selector_and_short_signature_are_malformed() {
        let mut builder = ScriptBuilder::new();
        builder.add_data(&[]).unwrap().add_data(&[ARGS_VERSION]).unwrap().add_data(&[]).unwrap().add_i64(9).unwrap();
        let err = UnlockScript::<Sellable>::decode(&builder.drain()).unwrap_err();
        assert_eq!(err.to_string(), "malformed state: Sellable has no method with selector 9");

        let mut builder = ScriptBuilder::new();
        builder.add_data(&[7; 10]).unwrap().add_data(&[ARGS_VERSION]).unwrap().add_data(&[]).unwrap().add_i64(2).unwrap();
        assert!(matches!(UnlockScript::<Sellable>::decode(&builder.drain()), Err(CovenantError::MalformedState(_))));
    }

    #[test]
    fn signature_carries_sighash_all_type_byte() {
        let sig = keypair(1).sign_schnorr(Message::from_digest(Hash::from_u64_word(1).as_bytes()));
        let unlock = UnlockScript::<Sellable>::new(Some(sig), SellableCall::Remove, None);
        let script = unlock.encode().unwrap();
        let mut cursor = ScriptCursor::new(&script);
        let push = cursor.read_push("signature").unwrap();
        assert_eq!(push.len(), 65);
        assert_eq!(push[64], SIG_HASH_ALL.to_u8());

        // A bare 64-byte signature has no hash type.
        let mut builder = ScriptBuilder::new();
        builder.add_data(&sig.serialize()).unwrap().add_data(&[ARGS_VERSION]).unwrap().add_data(&[]).unwrap().add_i64(2).unwrap();
        let err = UnlockScript::<Sellable>::decode(&builder.drain()).unwrap_err();
        assert_eq!(err.to_string(), "malformed state: signature push has 64 bytes, expected 65");

        let mut wrong_type = signature_push(&sig);
        wrong_type[64] = 0x02;
        let mut builder = ScriptBuilder::new();
        builder.add_data(&wrong_type).unwrap().add_data(&[ARGS_VERSION]).unwrap().add_data(&[]).unwrap().add_i64(2).unwrap();
        assert!(matches!(UnlockScript::<Sellable>::decode(&builder.drain()), Err(CovenantError::MalformedState(_))));
    }
}
