//! The four contract variants.

mod debit_card;
mod depositable;
mod sellable;
mod tradeable;

pub use debit_card::{DEBIT_CARD_VERSION, DebitCard, DebitCardCall, DebitCardFields, DebitCardFixed, DebitCardMethod};
pub use depositable::{Depositable, DepositableCall, DepositableFields, DepositableMethod};
pub use sellable::{Sellable, SellableCall, SellableFields, SellableFixed, SellableMethod};
pub use tradeable::{Tradeable, TradeableCall, TradeableFields, TradeableFixed, TradeableMethod};

use covenant_sdk::{FieldReader, FieldWriter};
use secp256k1::XOnlyPublicKey;

use crate::errors::CovenantError;

fn put_key(out: &mut FieldWriter, key: &XOnlyPublicKey) {
    out.put_fixed(&key.serialize());
}

fn read_key(reader: &mut FieldReader<'_>, field: &'static str) -> Result<XOnlyPublicKey, CovenantError> {
    let bytes = reader.array::<32>(field)?;
    XOnlyPublicKey::from_slice(&bytes).map_err(|_| CovenantError::malformed(format!("field `{field}` is not a valid x-only public key")))
}

fn read_text(reader: &mut FieldReader<'_>, field: &'static str) -> Result<String, CovenantError> {
    String::from_utf8(reader.bytes(field)?).map_err(|_| CovenantError::malformed(format!("field `{field}` is not valid utf-8")))
}

fn debit(method: &'static str, balance: u64, value: u64) -> Result<u64, CovenantError> {
    balance.checked_sub(value).ok_or_else(|| CovenantError::invariant(method, format!("{method} {value} exceeds balance {balance}")))
}

fn credit(method: &'static str, balance: u64, value: u64) -> Result<u64, CovenantError> {
    balance.checked_add(value).ok_or(CovenantError::ValueOverflow(method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Method;

    fn assert_table<M: Method>(expected: &[(M, u8)]) {
        assert_eq!(M::ALL.len(), expected.len());
        for (method, selector) in expected {
            assert_eq!(method.selector(), *selector, "{}", method.name());
            assert_eq!(M::from_selector(*selector), Some(*method));
        }
        assert_eq!(M::from_selector(expected.len() as u8), None);
    }

    #[test]
    fn selectors_are_stable_per_variant() {
        assert_table(&[
            (DebitCardMethod::Charge, 0),
            (DebitCardMethod::Freeze, 1),
            (DebitCardMethod::Activate, 2),
            (DebitCardMethod::Deposit, 3),
            (DebitCardMethod::Withdraw, 4),
            (DebitCardMethod::Cancel, 5),
        ]);
        assert_table(&[(DepositableMethod::Unlock, 0), (DepositableMethod::Deposit, 1)]);
        assert_table(&[(TradeableMethod::SetAsk, 0), (TradeableMethod::Remove, 1), (TradeableMethod::PlaceBid, 2)]);
        assert_table(&[(SellableMethod::SetPrice, 0), (SellableMethod::Buy, 1), (SellableMethod::Remove, 2)]);
    }
}
