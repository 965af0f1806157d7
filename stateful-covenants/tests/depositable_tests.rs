mod common;

use common::{Harness, address, random_keypair, xonly};
use stateful_covenants::contracts::DepositableCall;
use stateful_covenants::tx_builder::CovenantTxBuilder;
use stateful_covenants::unlock::UnlockScript;
use stateful_covenants::{BuildOptions, BuilderTable, CovenantError, Depositable, Provider, ProviderError, RejectionReason};

#[test]
fn anyone_deposits_and_owner_unlocks() {
    let owner = random_keypair();
    let donor = random_keypair();
    let h = Harness::new(&[&owner, &donor]);
    let builders = BuilderTable::<Depositable>::standard();

    let wallet = h.driver.deploy(Depositable::new(xonly(&owner)), 3, BuildOptions::new().fund(h.funding(&owner, 3))).unwrap();

    let deposit = DepositableCall::Deposit { amount: 20, note: "gift".to_string() };
    let options = BuildOptions::new().fund(h.funding(&donor, 25)).change_to(address(&donor)).fee(1);
    let outcome = h.driver.call(&builders, &wallet, deposit, options).unwrap();
    let wallet = outcome.next.unwrap();
    assert_eq!(wallet.balance, 23);
    assert_eq!(wallet.state.fields().owner, xonly(&owner));
    assert_eq!(outcome.tx.outputs[1].value, 4);

    let outcome = h.driver.call(&builders, &wallet, DepositableCall::Unlock, BuildOptions::new().pay_to(address(&owner))).unwrap();
    assert!(outcome.next.is_none());
    assert_eq!(outcome.tx.outputs[0].value, 23);
}

#[test]
fn unlock_without_signature_is_rejected_by_the_ledger() {
    let owner = random_keypair();
    let h = Harness::new(&[&owner]);
    let builders = BuilderTable::<Depositable>::standard();
    let wallet = h.driver.deploy(Depositable::new(xonly(&owner)), 3, BuildOptions::new().fund(h.funding(&owner, 3))).unwrap();

    let thief = random_keypair();
    let spend = CovenantTxBuilder::new(h.driver.codec(), &builders)
        .build(&wallet, DepositableCall::Unlock, &BuildOptions::new().pay_to(address(&thief)))
        .unwrap();
    let mut tx = spend.tx;
    tx.inputs[0].signature_script = UnlockScript::<Depositable>::new(None, spend.call, None).encode().unwrap();
    tx.finalize();

    let err = h.ledger.broadcast(&tx).unwrap_err();
    match err {
        ProviderError::Rejected(RejectionReason::Covenant { input: 0, reason }) => {
            assert_eq!(reason, format!("unlock: signature does not verify against owner key {}", xonly(&owner)));
        }
        other => panic!("expected covenant rejection, got {other}"),
    }
    assert!(h.ledger.is_unspent(&wallet.location));
}

#[test]
fn deposit_overflow_is_caught_before_broadcast() {
    let owner = random_keypair();
    let h = Harness::new(&[&owner]);
    let builders = BuilderTable::<Depositable>::standard();
    let wallet = h.driver.deploy(Depositable::new(xonly(&owner)), 3, BuildOptions::new().fund(h.funding(&owner, 3))).unwrap();

    let deposit = DepositableCall::Deposit { amount: u64::MAX, note: String::new() };
    let err = h.driver.call(&builders, &wallet, deposit, BuildOptions::new()).unwrap_err();
    assert!(matches!(err, CovenantError::ValueOverflow("deposit")));
    assert_eq!(h.ledger.accepted().len(), 1);
}
