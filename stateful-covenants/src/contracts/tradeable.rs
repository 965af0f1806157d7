use covenant_sdk::{FieldError, FieldReader, FieldWriter};
use secp256k1::XOnlyPublicKey;
use serde::Serialize;

use super::{credit, put_key, read_key};
use crate::errors::CovenantError;
use crate::model::{ContractInstance, ContractKind, Covenant, Method, Role, State};
use crate::transition::{Guard, Payout, Transition};

/// Asset that changes hands once a bid beats the owner's ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tradeable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeableFixed {
    #[serde(with = "crate::serde_hex")]
    pub content: Vec<u8>,
}

/// `owner` moves to the winning bidder when a trade clears, so it lives with the mutable
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeableFields {
    pub owner: XOnlyPublicKey,
    pub ask: u64,
    pub bid: u64,
    pub bidder: XOnlyPublicKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeableMethod {
    SetAsk,
    Remove,
    PlaceBid,
}

impl Method for TradeableMethod {
    const ALL: &'static [Self] = &[Self::SetAsk, Self::Remove, Self::PlaceBid];

    fn name(self) -> &'static str {
        match self {
            Self::SetAsk => "setAsk",
            Self::Remove => "remove",
            Self::PlaceBid => "placeBid",
        }
    }

    fn selector(self) -> u8 {
        match self {
            Self::SetAsk => 0,
            Self::Remove => 1,
            Self::PlaceBid => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeableCall {
    SetAsk { ask: u64 },
    Remove,
    PlaceBid { bid: u64, bidder: XOnlyPublicKey },
}

impl Tradeable {
    /// A listing with no bid; the owner stands in as bidder.
    pub fn new(content: Vec<u8>, owner: XOnlyPublicKey, ask: u64) -> State<Self> {
        State::new(TradeableFixed { content }, TradeableFields { owner, ask, bid: 0, bidder: owner })
    }
}

impl Covenant for Tradeable {
    const KIND: ContractKind = ContractKind::Tradeable;

    type Fixed = TradeableFixed;
    type Fields = TradeableFields;
    type Method = TradeableMethod;
    type Call = TradeableCall;

    fn write_fixed(fixed: &TradeableFixed, out: &mut FieldWriter) -> Result<(), FieldError> {
        out.put_bytes(&fixed.content)?;
        Ok(())
    }

    fn read_fixed(reader: &mut FieldReader<'_>) -> Result<TradeableFixed, CovenantError> {
        Ok(TradeableFixed { content: reader.bytes("content")? })
    }

    fn write_fields(fields: &TradeableFields, out: &mut FieldWriter) {
        put_key(out, &fields.owner);
        out.put_u64(fields.ask).put_u64(fields.bid);
        put_key(out, &fields.bidder);
    }

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<TradeableFields, CovenantError> {
        Ok(TradeableFields {
            owner: read_key(reader, "owner")?,
            ask: reader.u64("ask")?,
            bid: reader.u64("bid")?,
            bidder: read_key(reader, "bidder")?,
        })
    }

    fn write_args(call: &TradeableCall, out: &mut FieldWriter) -> Result<(), FieldError> {
        match call {
            TradeableCall::SetAsk { ask } => {
                out.put_u64(*ask);
            }
            TradeableCall::Remove => {}
            TradeableCall::PlaceBid { bid, bidder } => {
                out.put_u64(*bid);
                put_key(out, bidder);
            }
        }
        Ok(())
    }

    fn read_args(method: TradeableMethod, reader: &mut FieldReader<'_>) -> Result<TradeableCall, CovenantError> {
        Ok(match method {
            TradeableMethod::SetAsk => TradeableCall::SetAsk { ask: reader.u64("ask")? },
            TradeableMethod::Remove => TradeableCall::Remove,
            TradeableMethod::PlaceBid => TradeableCall::PlaceBid { bid: reader.u64("bid")?, bidder: read_key(reader, "bidder")? },
        })
    }

    fn method(call: &TradeableCall) -> TradeableMethod {
        match call {
            TradeableCall::SetAsk { .. } => TradeableMethod::SetAsk,
            TradeableCall::Remove => TradeableMethod::Remove,
            TradeableCall::PlaceBid { .. } => TradeableMethod::PlaceBid,
        }
    }

    fn apply(instance: &ContractInstance<Self>, call: &TradeableCall) -> Result<Transition<Self>, CovenantError> {
        let state = &instance.state;
        let current = state.fields();
        let method = Self::method(call);

        Ok(match call {
            TradeableCall::SetAsk { ask } => {
                Transition::next(method, state.successor(TradeableFields { ask: *ask, ..current.clone() }), instance.balance)
                    .guarded_by(Guard::new(Role::Owner, current.owner))
            }
            TradeableCall::Remove => Transition::terminal(method).guarded_by(Guard::new(Role::Owner, current.owner)),
            TradeableCall::PlaceBid { bid, bidder } => {
                let (bid, bidder) = (*bid, *bidder);
                if current.bid > 0 && bid <= current.bid {
                    return Err(CovenantError::invariant(
                        "placeBid",
                        format!("bid {bid} is not greater than current bid {}", current.bid),
                    ));
                }
                let escrowed = credit("placeBid", instance.balance, bid)?;

                if current.ask > 0 && bid > current.ask {
                    // Trade clears: the previous bidder gets their escrow back and the new
                    // bidder takes ownership.
                    let balance = escrowed.checked_sub(current.bid).ok_or_else(|| {
                        CovenantError::invariant(
                            "placeBid",
                            format!("refund {} exceeds escrowed balance {escrowed}", current.bid),
                        )
                    })?;
                    let fields = TradeableFields { owner: bidder, ask: 0, bid: 0, bidder };
                    Transition::next(method, state.successor(fields), balance).with_payout(Payout::new(
                        "refund",
                        current.bidder,
                        current.bid,
                    ))
                } else {
                    Transition::next(method, state.successor(TradeableFields { bid, bidder, ..current.clone() }), escrowed)
                }
            }
        })
    }
}
