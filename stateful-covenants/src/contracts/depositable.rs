use covenant_sdk::{FieldError, FieldReader, FieldWriter};
use secp256k1::XOnlyPublicKey;
use serde::Serialize;

use super::{credit, put_key, read_key, read_text};
use crate::errors::CovenantError;
use crate::model::{ContractInstance, ContractKind, Covenant, Method, Role, State};
use crate::transition::{Guard, Transition};

/// Wallet that anyone may top up and only the owner may empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Depositable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositableFields {
    pub owner: XOnlyPublicKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepositableMethod {
    Unlock,
    Deposit,
}

impl Method for DepositableMethod {
    const ALL: &'static [Self] = &[Self::Unlock, Self::Deposit];

    fn name(self) -> &'static str {
        match self {
            Self::Unlock => "unlock",
            Self::Deposit => "deposit",
        }
    }

    fn selector(self) -> u8 {
        match self {
            Self::Unlock => 0,
            Self::Deposit => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositableCall {
    Unlock,
    Deposit { amount: u64, note: String },
}

impl Depositable {
    pub fn new(owner: XOnlyPublicKey) -> State<Self> {
        State::new((), DepositableFields { owner })
    }
}

impl Covenant for Depositable {
    const KIND: ContractKind = ContractKind::Depositable;

    type Fixed = ();
    type Fields = DepositableFields;
    type Method = DepositableMethod;
    type Call = DepositableCall;

    fn write_fixed(_: &(), _: &mut FieldWriter) -> Result<(), FieldError> {
        Ok(())
    }

    fn read_fixed(_: &mut FieldReader<'_>) -> Result<(), CovenantError> {
        Ok(())
    }

    fn write_fields(fields: &DepositableFields, out: &mut FieldWriter) {
        put_key(out, &fields.owner);
    }

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<DepositableFields, CovenantError> {
        Ok(DepositableFields { owner: read_key(reader, "owner")? })
    }

    fn write_args(call: &DepositableCall, out: &mut FieldWriter) -> Result<(), FieldError> {
        if let DepositableCall::Deposit { amount, note } = call {
            out.put_u64(*amount).put_bytes(note.as_bytes())?;
        }
        Ok(())
    }

    fn read_args(method: DepositableMethod, reader: &mut FieldReader<'_>) -> Result<DepositableCall, CovenantError> {
        Ok(match method {
            DepositableMethod::Unlock => DepositableCall::Unlock,
            DepositableMethod::Deposit => DepositableCall::Deposit { amount: reader.u64("amount")?, note: read_text(reader, "note")? },
        })
    }

    fn method(call: &DepositableCall) -> DepositableMethod {
        match call {
            DepositableCall::Unlock => DepositableMethod::Unlock,
            DepositableCall::Deposit { .. } => DepositableMethod::Deposit,
        }
    }

    fn apply(instance: &ContractInstance<Self>, call: &DepositableCall) -> Result<Transition<Self>, CovenantError> {
        let method = Self::method(call);
        Ok(match call {
            DepositableCall::Unlock => Transition::terminal(method).guarded_by(Guard::new(Role::Owner, instance.state.fields().owner)),
            DepositableCall::Deposit { amount, .. } => {
                Transition::next(method, instance.state.clone(), credit("deposit", instance.balance, *amount)?)
            }
        })
    }
}
