use std::collections::HashMap;

use kaspa_addresses::{Address, Prefix, Version};
use kaspa_consensus_core::Hash;
use kaspa_consensus_core::tx::ScriptPublicKey;
use kaspa_txscript::pay_to_address_script;
use secp256k1::{Keypair, Message, SECP256K1, XOnlyPublicKey, schnorr::Signature};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("no signing key held for {0}")]
    UnknownKey(XOnlyPublicKey),
    #[error("signing failed: {0}")]
    Backend(String),
}

/// External holder of private keys. The engine only ever sees public keys and signatures.
pub trait Signer {
    fn sign(&self, sighash: Hash, key: &XOnlyPublicKey) -> Result<Signature, SignerError>;

    fn derive(&self, key: &XOnlyPublicKey) -> Result<Address, SignerError>;
}

impl<S: Signer + ?Sized> Signer for &S {
    fn sign(&self, sighash: Hash, key: &XOnlyPublicKey) -> Result<Signature, SignerError> {
        (**self).sign(sighash, key)
    }

    fn derive(&self, key: &XOnlyPublicKey) -> Result<Address, SignerError> {
        (**self).derive(key)
    }
}

pub fn derive_address(prefix: Prefix, key: &XOnlyPublicKey) -> Address {
    Address::new(prefix, Version::PubKey, &key.serialize())
}

/// Locking script paying to `key`: `<key> OpCheckSig`.
pub fn pay_to_pubkey(key: &XOnlyPublicKey) -> ScriptPublicKey {
    pay_to_address_script(&derive_address(Prefix::Mainnet, key))
}

pub fn verify_signature(sighash: Hash, signature: &Signature, key: &XOnlyPublicKey) -> bool {
    let msg = Message::from_digest(sighash.as_bytes());
    SECP256K1.verify_schnorr(signature, &msg, key).is_ok()
}

/// In-process signer over a set of keypairs.
#[derive(Debug, Clone)]
pub struct LocalSigner {
    prefix: Prefix,
    keys: HashMap<XOnlyPublicKey, Keypair>,
}

impl LocalSigner {
    pub fn new(prefix: Prefix) -> Self {
        Self { prefix, keys: HashMap::new() }
    }

    pub fn with_keypair(mut self, keypair: Keypair) -> Self {
        self.add_keypair(keypair);
        self
    }

    pub fn add_keypair(&mut self, keypair: Keypair) -> XOnlyPublicKey {
        let key = keypair.x_only_public_key().0;
        self.keys.insert(key, keypair);
        key
    }

    pub fn holds(&self, key: &XOnlyPublicKey) -> bool {
        self.keys.contains_key(key)
    }
}

impl Signer for LocalSigner {
    fn sign(&self, sighash: Hash, key: &XOnlyPublicKey) -> Result<Signature, SignerError> {
        let keypair = self.keys.get(key).ok_or(SignerError::UnknownKey(*key))?;
        let msg = Message::from_digest(sighash.as_bytes());
        Ok(keypair.sign_schnorr(msg))
    }

    fn derive(&self, key: &XOnlyPublicKey) -> Result<Address, SignerError> {
        Ok(derive_address(self.prefix, key))
    }
}
