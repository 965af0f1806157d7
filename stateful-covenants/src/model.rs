use std::fmt::{self, Debug, Display};
use std::hash::Hash;

use covenant_sdk::{FieldError, FieldReader, FieldWriter};
use kaspa_consensus_core::tx::{Transaction, TransactionOutpoint, TransactionOutput};
use serde::{Deserialize, Serialize};

use crate::codec::StateCodec;
use crate::errors::CovenantError;
use crate::provider::Utxo;
use crate::transition::Transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    DebitCard,
    Depositable,
    Tradeable,
    Sellable,
}

impl ContractKind {
    pub const ALL: [ContractKind; 4] = [Self::DebitCard, Self::Depositable, Self::Tradeable, Self::Sellable];

    /// Tag byte stored in the locking-script header.
    pub fn tag(self) -> u8 {
        match self {
            Self::DebitCard => 1,
            Self::Depositable => 2,
            Self::Tradeable => 3,
            Self::Sellable => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::DebitCard => "DebitCard",
            Self::Depositable => "Depositable",
            Self::Tradeable => "Tradeable",
            Self::Sellable => "Sellable",
        }
    }
}

impl Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named key holder a guard checks a signature against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    App,
    Player,
    Owner,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::App => "app",
            Self::Player => "player",
            Self::Owner => "owner",
        })
    }
}

/// A contract's method table. [`Method::ALL`] lists the methods in selector order.
pub trait Method: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    /// Number pushed last in the unlocking script to pick this method.
    fn selector(self) -> u8;

    fn from_selector(selector: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|method| method.selector() == selector)
    }
}

/// Capability interface implemented once per contract variant.
///
/// `Fixed` holds the fields set at construction and `Fields` the ones a transition may
/// replace. The serializers define the canonical byte layout; `apply` is the pure
/// transition function.
pub trait Covenant: Copy + Debug + PartialEq + Eq + Send + Sync + 'static {
    const KIND: ContractKind;

    type Fixed: Clone + Debug + PartialEq + Eq + Serialize;
    type Fields: Clone + Debug + PartialEq + Eq + Serialize;
    type Method: Method;
    type Call: Clone + Debug + PartialEq + Eq;

    fn write_fixed(fixed: &Self::Fixed, out: &mut FieldWriter) -> Result<(), FieldError>;
    fn read_fixed(reader: &mut FieldReader<'_>) -> Result<Self::Fixed, CovenantError>;

    fn write_fields(fields: &Self::Fields, out: &mut FieldWriter);
    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self::Fields, CovenantError>;

    /// Writes the method's ordered argument list.
    fn write_args(call: &Self::Call, out: &mut FieldWriter) -> Result<(), FieldError>;
    fn read_args(method: Self::Method, reader: &mut FieldReader<'_>) -> Result<Self::Call, CovenantError>;

    fn method(call: &Self::Call) -> Self::Method;

    fn apply(instance: &ContractInstance<Self>, call: &Self::Call) -> Result<Transition<Self>, CovenantError>;
}

/// Contract state split into its immutable and mutable halves.
///
/// The immutable half can only be set by [`State::new`]; successors carry it over unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State<C: Covenant> {
    fixed: C::Fixed,
    fields: C::Fields,
}

impl<C: Covenant> State<C> {
    pub fn new(fixed: C::Fixed, fields: C::Fields) -> Self {
        Self { fixed, fields }
    }

    pub fn fixed(&self) -> &C::Fixed {
        &self.fixed
    }

    pub fn fields(&self) -> &C::Fields {
        &self.fields
    }

    pub fn successor(&self, fields: C::Fields) -> Self {
        Self { fixed: self.fixed.clone(), fields }
    }
}

/// A contract state bound to the output currently holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInstance<C: Covenant> {
    pub state: State<C>,
    /// Always equal to the value of the backing output.
    pub balance: u64,
    pub location: TransactionOutpoint,
}

impl<C: Covenant> ContractInstance<C> {
    pub fn from_utxo(codec: &StateCodec, utxo: &Utxo) -> Result<Self, CovenantError> {
        let (state, balance) = codec.decode::<C>(&utxo.output)?;
        Ok(Self { state, balance, location: utxo.outpoint })
    }

    /// Materializes the instance held by output `index` of `tx`.
    pub fn from_tx(codec: &StateCodec, tx: &Transaction, index: u32) -> Result<Self, CovenantError> {
        let output = tx
            .outputs
            .get(index as usize)
            .ok_or_else(|| CovenantError::malformed(format!("transaction {} has no output {index}", tx.id())))?;
        let (state, balance) = codec.decode::<C>(output)?;
        Ok(Self { state, balance, location: TransactionOutpoint::new(tx.id(), index) })
    }

    pub fn output(&self, codec: &StateCodec) -> Result<TransactionOutput, CovenantError> {
        codec.encode(&self.state, self.balance)
    }

    pub fn utxo(&self, codec: &StateCodec) -> Result<Utxo, CovenantError> {
        Ok(Utxo { outpoint: self.location, output: self.output(codec)? })
    }
}
