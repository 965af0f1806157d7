use covenant_sdk::{FieldError, FieldReader, FieldWriter};
use secp256k1::XOnlyPublicKey;
use serde::Serialize;

use super::{put_key, read_key};
use crate::errors::CovenantError;
use crate::model::{ContractInstance, ContractKind, Covenant, Method, Role, State};
use crate::transition::{Guard, Payout, Transition};

/// Asset with a fixed price; paying the price to the owner is the buyer's authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sellable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellableFixed {
    #[serde(with = "crate::serde_hex")]
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellableFields {
    pub owner: XOnlyPublicKey,
    pub price: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SellableMethod {
    SetPrice,
    Buy,
    Remove,
}

impl Method for SellableMethod {
    const ALL: &'static [Self] = &[Self::SetPrice, Self::Buy, Self::Remove];

    fn name(self) -> &'static str {
        match self {
            Self::SetPrice => "setPrice",
            Self::Buy => "buy",
            Self::Remove => "remove",
        }
    }

    fn selector(self) -> u8 {
        match self {
            Self::SetPrice => 0,
            Self::Buy => 1,
            Self::Remove => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellableCall {
    SetPrice { price: u64 },
    Buy { buyer: XOnlyPublicKey },
    Remove,
}

impl Sellable {
    pub fn new(content: Vec<u8>, owner: XOnlyPublicKey, price: u64) -> State<Self> {
        State::new(SellableFixed { content }, SellableFields { owner, price })
    }
}

impl Covenant for Sellable {
    const KIND: ContractKind = ContractKind::Sellable;

    type Fixed = SellableFixed;
    type Fields = SellableFields;
    type Method = SellableMethod;
    type Call = SellableCall;

    fn write_fixed(fixed: &SellableFixed, out: &mut FieldWriter) -> Result<(), FieldError> {
        out.put_bytes(&fixed.content)?;
        Ok(())
    }

    fn read_fixed(reader: &mut FieldReader<'_>) -> Result<SellableFixed, CovenantError> {
        Ok(SellableFixed { content: reader.bytes("content")? })
    }

    fn write_fields(fields: &SellableFields, out: &mut FieldWriter) {
        put_key(out, &fields.owner);
        out.put_u64(fields.price);
    }

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<SellableFields, CovenantError> {
        Ok(SellableFields { owner: read_key(reader, "owner")?, price: reader.u64("price")? })
    }

    fn write_args(call: &SellableCall, out: &mut FieldWriter) -> Result<(), FieldError> {
        match call {
            SellableCall::SetPrice { price } => {
                out.put_u64(*price);
            }
            SellableCall::Buy { buyer } => put_key(out, buyer),
            SellableCall::Remove => {}
        }
        Ok(())
    }

    fn read_args(method: SellableMethod, reader: &mut FieldReader<'_>) -> Result<SellableCall, CovenantError> {
        Ok(match method {
            SellableMethod::SetPrice => SellableCall::SetPrice { price: reader.u64("price")? },
            SellableMethod::Buy => SellableCall::Buy { buyer: read_key(reader, "buyer")? },
            SellableMethod::Remove => SellableCall::Remove,
        })
    }

    fn method(call: &SellableCall) -> SellableMethod {
        match call {
            SellableCall::SetPrice { .. } => SellableMethod::SetPrice,
            SellableCall::Buy { .. } => SellableMethod::Buy,
            SellableCall::Remove => SellableMethod::Remove,
        }
    }

    fn apply(instance: &ContractInstance<Self>, call: &SellableCall) -> Result<Transition<Self>, CovenantError> {
        let state = &instance.state;
        let current = state.fields();
        let method = Self::method(call);

        Ok(match call {
            SellableCall::SetPrice { price } => {
                Transition::next(method, state.successor(SellableFields { price: *price, ..current.clone() }), instance.balance)
                    .guarded_by(Guard::new(Role::Owner, current.owner))
            }
            SellableCall::Buy { buyer } => {
                Transition::next(method, state.successor(SellableFields { owner: *buyer, ..current.clone() }), instance.balance)
                    .with_payout(Payout::new("payment", current.owner, current.price))
            }
            SellableCall::Remove => Transition::terminal(method).guarded_by(Guard::new(Role::Owner, current.owner)),
        })
    }
}
