#![allow(dead_code)]

use std::sync::Arc;

use kaspa_addresses::{Address, Prefix};
use rand::{RngCore, thread_rng};
use secp256k1::{Keypair, Secp256k1, SecretKey, XOnlyPublicKey};
use stateful_covenants::signer::{derive_address, pay_to_pubkey};
use stateful_covenants::{CallDriver, FundingInput, LocalSigner, MemoryLedger, StateCodec};

pub fn random_keypair() -> Keypair {
    let secp = Secp256k1::new();
    let mut rng = thread_rng();
    let mut sk_bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut sk_bytes);
        if let Ok(secret_key) = SecretKey::from_slice(&sk_bytes) {
            return Keypair::from_secret_key(&secp, &secret_key);
        }
    }
}

pub fn xonly(keypair: &Keypair) -> XOnlyPublicKey {
    keypair.x_only_public_key().0
}

pub fn address(keypair: &Keypair) -> Address {
    derive_address(Prefix::Testnet, &xonly(keypair))
}

/// A ledger plus a driver whose signer holds `keys`.
pub struct Harness {
    pub ledger: Arc<MemoryLedger>,
    pub driver: CallDriver<LocalSigner, Arc<MemoryLedger>>,
}

impl Harness {
    pub fn new(keys: &[&Keypair]) -> Self {
        Self::with_codec(StateCodec::default(), keys)
    }

    pub fn with_codec(codec: StateCodec, keys: &[&Keypair]) -> Self {
        let ledger = Arc::new(MemoryLedger::new(codec.clone()));
        let signer = keys.iter().fold(LocalSigner::new(Prefix::Testnet), |signer, key| signer.with_keypair(**key));
        let driver = CallDriver::new(codec, signer, ledger.clone());
        Self { ledger, driver }
    }

    /// A fresh pay-to-pubkey output of `value` owned by `owner`.
    pub fn funding(&self, owner: &Keypair, value: u64) -> FundingInput {
        let utxo = self.ledger.fund(pay_to_pubkey(&xonly(owner)), value);
        FundingInput::new(utxo, xonly(owner))
    }
}
