use kaspa_consensus_core::Hash;
use kaspa_consensus_core::tx::TransactionOutpoint;
use proptest::prelude::*;
use secp256k1::{Keypair, Secp256k1, SecretKey, XOnlyPublicKey};
use stateful_covenants::contracts::{DebitCardCall, DebitCardFields, DepositableCall, TradeableCall, TradeableFields};
use stateful_covenants::{ContractInstance, Covenant, CovenantError, DebitCard, Depositable, State, Tradeable};

fn key(seed: u8) -> XOnlyPublicKey {
    let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
    Keypair::from_secret_key(&Secp256k1::new(), &secret).x_only_public_key().0
}

fn at<C: Covenant>(state: State<C>, balance: u64) -> ContractInstance<C> {
    ContractInstance { state, balance, location: TransactionOutpoint::new(Hash::from_u64_word(7), 0) }
}

proptest! {
    #[test]
    fn frozen_card_never_charges(balance in any::<u64>(), value in any::<u64>()) {
        let card = at(DebitCard::mint(key(1), key(2)).successor(DebitCardFields { active: false }), balance);
        let result = DebitCard::apply(&card, &DebitCardCall::Charge { value, reason: String::new() });
        prop_assert!(
            matches!(result, Err(CovenantError::InvariantViolation { method: "charge", .. })),
            "frozen charge was not rejected"
        );
    }

    #[test]
    fn deposits_only_add_to_balance(balance in 0u64..u64::MAX / 2, amount in 0u64..u64::MAX / 2, active in any::<bool>()) {
        let card = at(DebitCard::mint(key(1), key(2)).successor(DebitCardFields { active }), balance);
        let next = DebitCard::apply(&card, &DebitCardCall::Deposit { value: amount, reason: "top up".into() }).unwrap().successor.unwrap();
        prop_assert_eq!(next.balance, balance + amount);
        prop_assert_eq!(next.state, card.state);

        let wallet = at(Depositable::new(key(3)), balance);
        let next = Depositable::apply(&wallet, &DepositableCall::Deposit { amount, note: String::new() }).unwrap().successor.unwrap();
        prop_assert_eq!(next.balance, balance + amount);
        prop_assert_eq!(next.state, wallet.state);
    }

    #[test]
    fn outstanding_bid_must_strictly_increase(current in 1u64..1_000_000, bid in 0u64..2_000_000, ask in 0u64..3_000_000) {
        let fields = TradeableFields { owner: key(1), ask, bid: current, bidder: key(2) };
        let listing = at(Tradeable::new(b"lot".to_vec(), key(1), ask).successor(fields), 1 + current);
        let result = Tradeable::apply(&listing, &TradeableCall::PlaceBid { bid, bidder: key(3) });
        if bid > current {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(CovenantError::InvariantViolation { method: "placeBid", .. })), "bid {} accepted", bid);
        }
    }
}
