use kaspa_consensus_core::tx::TransactionOutput;
use secp256k1::XOnlyPublicKey;

use crate::codec::StateCodec;
use crate::errors::CovenantError;
use crate::model::{Covenant, Method, Role, State};
use crate::signer::pay_to_pubkey;

/// An extra output a transition requires, paid to the address derived from `recipient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub purpose: &'static str,
    pub recipient: XOnlyPublicKey,
    pub amount: u64,
}

impl Payout {
    pub fn new(purpose: &'static str, recipient: XOnlyPublicKey, amount: u64) -> Self {
        Self { purpose, recipient, amount }
    }

    pub fn output(&self) -> TransactionOutput {
        TransactionOutput::new(self.amount, pay_to_pubkey(&self.recipient))
    }
}

/// One way of authorizing a transition: a signature by `key`.
///
/// A pinned guard also fixes the complete output set of a terminal spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub role: Role,
    pub key: XOnlyPublicKey,
    pub pinned: Option<Vec<Payout>>,
}

impl Guard {
    pub fn new(role: Role, key: XOnlyPublicKey) -> Self {
        Self { role, key, pinned: None }
    }

    /// Zero-value payouts are dropped.
    pub fn pinned(role: Role, key: XOnlyPublicKey, payouts: Vec<Payout>) -> Self {
        Self { role, key, pinned: Some(payouts.into_iter().filter(|payout| payout.amount > 0).collect()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Successor<C: Covenant> {
    pub state: State<C>,
    pub balance: u64,
}

/// The effects of applying one call to one instance.
///
/// `guards` is ordered: a signature is checked against each key in turn and the first match
/// decides. An empty list means anyone may call. `successor` is `None` for terminal calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<C: Covenant> {
    pub method: C::Method,
    pub guards: Vec<Guard>,
    pub successor: Option<Successor<C>>,
    pub payouts: Vec<Payout>,
}

impl<C: Covenant> Transition<C> {
    pub fn next(method: C::Method, state: State<C>, balance: u64) -> Self {
        Self { method, guards: Vec::new(), successor: Some(Successor { state, balance }), payouts: Vec::new() }
    }

    pub fn terminal(method: C::Method) -> Self {
        Self { method, guards: Vec::new(), successor: None, payouts: Vec::new() }
    }

    pub fn guarded_by(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Adds an effect output. Zero-value payouts are dropped.
    pub fn with_payout(mut self, payout: Payout) -> Self {
        if payout.amount > 0 {
            self.payouts.push(payout);
        }
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.successor.is_none()
    }

    pub fn requires_signature(&self) -> bool {
        !self.guards.is_empty()
    }

    pub fn method_name(&self) -> &'static str {
        self.method.name()
    }

    /// Guards in order, as `<role> key <x-only hex>`.
    pub(crate) fn expected_keys(&self) -> String {
        self.guards.iter().map(|guard| format!("{} key {}", guard.role, guard.key)).collect::<Vec<_>>().join(" or ")
    }

    /// Picks the guard a caller wants to authorize with, defaulting to the first one.
    pub fn select_guard(&self, role: Option<Role>) -> Result<Option<&Guard>, CovenantError> {
        if self.guards.is_empty() {
            return Ok(None);
        }
        let guard = match role {
            Some(role) => self.guards.iter().find(|guard| guard.role == role),
            None => self.guards.first(),
        };
        guard.map(Some).ok_or_else(|| CovenantError::AuthorizationFailure {
            method: self.method_name(),
            expected: self.expected_keys(),
        })
    }

    /// Sum of the state output and effect outputs.
    pub fn committed_value(&self) -> Result<u64, CovenantError> {
        let state = self.successor.as_ref().map_or(0, |successor| successor.balance);
        self.payouts
            .iter()
            .try_fold(state, |acc, payout| acc.checked_add(payout.amount))
            .ok_or(CovenantError::ValueOverflow("committed outputs"))
    }

    /// The exact output list a valid spend must carry, or `None` when the destination of funds
    /// is unconstrained.
    ///
    /// Non-terminal: state output, then payouts, then the declared change. Terminal: the
    /// pinned payouts of the authorizing guard, if it has any.
    pub fn expected_outputs(
        &self,
        codec: &StateCodec,
        guard: Option<&Guard>,
        change: Option<&TransactionOutput>,
    ) -> Result<Option<Vec<TransactionOutput>>, CovenantError> {
        let Some(successor) = &self.successor else {
            return Ok(guard.and_then(|guard| guard.pinned.as_ref()).map(|pinned| pinned.iter().map(Payout::output).collect()));
        };

        let mut outputs = Vec::with_capacity(2 + self.payouts.len());
        outputs.push(codec.encode(&successor.state, successor.balance)?);
        outputs.extend(self.payouts.iter().map(Payout::output));
        outputs.extend(change.cloned());
        Ok(Some(outputs))
    }
}
