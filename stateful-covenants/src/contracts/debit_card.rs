use covenant_sdk::{FieldError, FieldReader, FieldWriter};
use secp256k1::XOnlyPublicKey;
use serde::Serialize;

use super::{credit, debit, put_key, read_key, read_text};
use crate::errors::CovenantError;
use crate::model::{ContractInstance, ContractKind, Covenant, Method, Role, State};
use crate::transition::{Guard, Payout, Transition};

/// Layout version string written into every minted card.
pub const DEBIT_CARD_VERSION: &str = "0.2.2";

/// Prepaid account spent by an app and controlled by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitCard;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebitCardFixed {
    pub app: XOnlyPublicKey,
    pub player: XOnlyPublicKey,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebitCardFields {
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebitCardMethod {
    Charge,
    Freeze,
    Activate,
    Deposit,
    Withdraw,
    Cancel,
}

impl Method for DebitCardMethod {
    const ALL: &'static [Self] = &[Self::Charge, Self::Freeze, Self::Activate, Self::Deposit, Self::Withdraw, Self::Cancel];

    fn name(self) -> &'static str {
        match self {
            Self::Charge => "charge",
            Self::Freeze => "freeze",
            Self::Activate => "activate",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Cancel => "cancel",
        }
    }

    fn selector(self) -> u8 {
        match self {
            Self::Charge => 0,
            Self::Freeze => 1,
            Self::Activate => 2,
            Self::Deposit => 3,
            Self::Withdraw => 4,
            Self::Cancel => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitCardCall {
    Charge { value: u64, reason: String },
    Freeze,
    Activate,
    Deposit { value: u64, reason: String },
    Withdraw { value: u64, reason: String },
    Cancel { reason: String },
}

impl DebitCard {
    /// A fresh, active card.
    pub fn mint(app: XOnlyPublicKey, player: XOnlyPublicKey) -> State<Self> {
        State::new(DebitCardFixed { app, player, version: DEBIT_CARD_VERSION.to_string() }, DebitCardFields { active: true })
    }
}

impl Covenant for DebitCard {
    const KIND: ContractKind = ContractKind::DebitCard;

    type Fixed = DebitCardFixed;
    type Fields = DebitCardFields;
    type Method = DebitCardMethod;
    type Call = DebitCardCall;

    fn write_fixed(fixed: &DebitCardFixed, out: &mut FieldWriter) -> Result<(), FieldError> {
        put_key(out, &fixed.app);
        put_key(out, &fixed.player);
        out.put_bytes(fixed.version.as_bytes())?;
        Ok(())
    }

    fn read_fixed(reader: &mut FieldReader<'_>) -> Result<DebitCardFixed, CovenantError> {
        Ok(DebitCardFixed { app: read_key(reader, "app")?, player: read_key(reader, "player")?, version: read_text(reader, "version")? })
    }

    fn write_fields(fields: &DebitCardFields, out: &mut FieldWriter) {
        out.put_bool(fields.active);
    }

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<DebitCardFields, CovenantError> {
        Ok(DebitCardFields { active: reader.bool("active")? })
    }

    fn write_args(call: &DebitCardCall, out: &mut FieldWriter) -> Result<(), FieldError> {
        match call {
            DebitCardCall::Charge { value, reason } | DebitCardCall::Deposit { value, reason } | DebitCardCall::Withdraw { value, reason } => {
                out.put_u64(*value).put_bytes(reason.as_bytes())?;
            }
            DebitCardCall::Cancel { reason } => {
                out.put_bytes(reason.as_bytes())?;
            }
            DebitCardCall::Freeze | DebitCardCall::Activate => {}
        }
        Ok(())
    }

    fn read_args(method: DebitCardMethod, reader: &mut FieldReader<'_>) -> Result<DebitCardCall, CovenantError> {
        Ok(match method {
            DebitCardMethod::Charge => DebitCardCall::Charge { value: reader.u64("value")?, reason: read_text(reader, "reason")? },
            DebitCardMethod::Freeze => DebitCardCall::Freeze,
            DebitCardMethod::Activate => DebitCardCall::Activate,
            DebitCardMethod::Deposit => DebitCardCall::Deposit { value: reader.u64("value")?, reason: read_text(reader, "reason")? },
            DebitCardMethod::Withdraw => DebitCardCall::Withdraw { value: reader.u64("value")?, reason: read_text(reader, "reason")? },
            DebitCardMethod::Cancel => DebitCardCall::Cancel { reason: read_text(reader, "reason")? },
        })
    }

    fn method(call: &DebitCardCall) -> DebitCardMethod {
        match call {
            DebitCardCall::Charge { .. } => DebitCardMethod::Charge,
            DebitCardCall::Freeze => DebitCardMethod::Freeze,
            DebitCardCall::Activate => DebitCardMethod::Activate,
            DebitCardCall::Deposit { .. } => DebitCardMethod::Deposit,
            DebitCardCall::Withdraw { .. } => DebitCardMethod::Withdraw,
            DebitCardCall::Cancel { .. } => DebitCardMethod::Cancel,
        }
    }

    fn apply(instance: &ContractInstance<Self>, call: &DebitCardCall) -> Result<Transition<Self>, CovenantError> {
        let state = &instance.state;
        let DebitCardFixed { app, player, .. } = *state.fixed();
        let method = Self::method(call);

        let transition = match call {
            DebitCardCall::Charge { value, .. } => {
                if !state.fields().active {
                    return Err(CovenantError::invariant("charge", format!("card is frozen, cannot charge {value}")));
                }
                let balance = debit("charge", instance.balance, *value)?;
                Transition::next(method, state.clone(), balance).guarded_by(Guard::new(Role::App, app))
            }
            DebitCardCall::Freeze => Transition::next(method, state.successor(DebitCardFields { active: false }), instance.balance)
                .guarded_by(Guard::new(Role::Player, player)),
            DebitCardCall::Activate => Transition::next(method, state.successor(DebitCardFields { active: true }), instance.balance)
                .guarded_by(Guard::new(Role::Player, player)),
            DebitCardCall::Deposit { value, .. } => Transition::next(method, state.clone(), credit("deposit", instance.balance, *value)?),
            DebitCardCall::Withdraw { value, .. } => {
                let balance = debit("withdraw", instance.balance, *value)?;
                Transition::next(method, state.clone(), balance).guarded_by(Guard::new(Role::Player, player))
            }
            // A player signature closes the card to any destination. The app may only close it
            // by returning the whole balance to the player.
            DebitCardCall::Cancel { .. } => Transition::terminal(method)
                .guarded_by(Guard::new(Role::Player, player))
                .guarded_by(Guard::pinned(Role::App, app, vec![Payout::new("closure", player, instance.balance)])),
        };
        Ok(transition)
    }
}
