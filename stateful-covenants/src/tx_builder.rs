use std::collections::HashMap;
use std::fmt;

use kaspa_addresses::Address;
use kaspa_consensus_core::constants::TX_VERSION;
use kaspa_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
use kaspa_consensus_core::tx::{Transaction, TransactionInput, TransactionOutput};
use kaspa_txscript::pay_to_address_script;
use secp256k1::XOnlyPublicKey;
use tracing::{debug, warn};

use crate::codec::StateCodec;
use crate::errors::CovenantError;
use crate::model::{ContractInstance, Covenant, Method, Role, State};
use crate::provider::Utxo;
use crate::rule::check_commitment;
use crate::transition::{Guard, Transition};

/// A pay-to-pubkey UTXO spent alongside the covenant to cover escrow and fees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingInput {
    pub utxo: Utxo,
    /// Key the funding output is locked to; the signer must hold it.
    pub owner: XOnlyPublicKey,
}

impl FundingInput {
    pub fn new(utxo: Utxo, owner: XOnlyPublicKey) -> Self {
        Self { utxo, owner }
    }

    pub fn value(&self) -> u64 {
        self.utxo.output.value
    }
}

/// Caller-supplied parameters for building a spend.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub funding: Vec<FundingInput>,
    /// Receives whatever the committed outputs and the fee leave over.
    pub change: Option<Address>,
    /// Payout recipient for terminal calls that do not pin their outputs.
    pub destination: Option<Address>,
    /// `None` lets the driver apply its default.
    pub fee: Option<u64>,
    /// Which guard to satisfy when a call accepts several signers.
    pub authorize_as: Option<Role>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fund(mut self, input: FundingInput) -> Self {
        self.funding.push(input);
        self
    }

    pub fn change_to(mut self, address: Address) -> Self {
        self.change = Some(address);
        self
    }

    pub fn pay_to(mut self, address: Address) -> Self {
        self.destination = Some(address);
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn authorize_as(mut self, role: Role) -> Self {
        self.authorize_as = Some(role);
        self
    }

    fn fee_or_zero(&self) -> u64 {
        self.fee.unwrap_or_default()
    }

    fn funding_total(&self) -> Result<u64, CovenantError> {
        self.funding
            .iter()
            .try_fold(0u64, |acc, input| acc.checked_add(input.value()))
            .ok_or(CovenantError::ValueOverflow("funding inputs"))
    }
}

/// Everything a builder function sees.
pub struct BuildContext<'a, C: Covenant> {
    pub codec: &'a StateCodec,
    pub instance: &'a ContractInstance<C>,
    pub transition: &'a Transition<C>,
    pub guard: Option<&'a Guard>,
    pub options: &'a BuildOptions,
}

/// What a builder function produces: the inputs besides the covenant input, and the outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembled {
    pub funding: Vec<FundingInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Declared change, which must also appear as the last output.
    pub change: Option<TransactionOutput>,
}

pub type BuilderFn<C> = Box<dyn Fn(&BuildContext<'_, C>) -> Result<Assembled, CovenantError> + Send + Sync>;

/// Per-call table of transaction builders, keyed by method.
pub struct BuilderTable<C: Covenant> {
    builders: HashMap<C::Method, BuilderFn<C>>,
}

impl<C: Covenant> BuilderTable<C> {
    /// An empty table. Every call fails with `BuilderUnbound` until a builder is bound.
    pub fn new() -> Self {
        Self { builders: HashMap::new() }
    }

    /// Every method bound to [`standard_builder`].
    pub fn standard() -> Self {
        C::Method::ALL.iter().fold(Self::new(), |table, method| table.bind(*method, standard_builder::<C>))
    }

    pub fn bind<F>(mut self, method: C::Method, builder: F) -> Self
    where
        F: Fn(&BuildContext<'_, C>) -> Result<Assembled, CovenantError> + Send + Sync + 'static,
    {
        self.builders.insert(method, Box::new(builder));
        self
    }

    pub fn unbind(mut self, method: C::Method) -> Self {
        self.builders.remove(&method);
        self
    }

    pub fn is_bound(&self, method: C::Method) -> bool {
        self.builders.contains_key(&method)
    }

    pub fn get(&self, method: C::Method) -> Result<&BuilderFn<C>, CovenantError> {
        self.builders.get(&method).ok_or(CovenantError::BuilderUnbound { kind: C::KIND, method: method.name() })
    }
}

impl<C: Covenant> Default for BuilderTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Covenant> fmt::Debug for BuilderTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = C::Method::ALL.iter().filter(|method| self.is_bound(**method)).map(|method| method.name()).collect::<Vec<_>>();
        f.debug_struct("BuilderTable").field("kind", &C::KIND).field("bound", &bound).finish()
    }
}

fn change_output(options: &BuildOptions, amount: u64) -> Result<Option<TransactionOutput>, CovenantError> {
    if amount == 0 {
        return Ok(None);
    }
    let address = options.change.as_ref().ok_or(CovenantError::MissingChangeRecipient(amount))?;
    Ok(Some(TransactionOutput::new(amount, pay_to_address_script(address))))
}

/// Default builder: spends the covenant plus all funding inputs and allocates outputs.
///
/// - Non-terminal: the committed outputs, then change of
///   `balance + funding - committed - fee`.
/// - Terminal with a pinned guard: exactly the pinned payouts; funding pays the fee.
/// - Other terminal calls: one payout of `balance + funding - fee` to the destination, or to
///   the change recipient when no destination is given.
pub fn standard_builder<C: Covenant>(ctx: &BuildContext<'_, C>) -> Result<Assembled, CovenantError> {
    let options = ctx.options;
    let fee = options.fee_or_zero();
    let available = ctx.instance.balance.checked_add(options.funding_total()?).ok_or(CovenantError::ValueOverflow("spend inputs"))?;

    if !ctx.transition.is_terminal() {
        let committed = ctx.transition.committed_value()?;
        let required = committed.checked_add(fee).ok_or(CovenantError::ValueOverflow("committed outputs"))?;
        let leftover = available.checked_sub(required).ok_or(CovenantError::InsufficientFunds { available, required })?;
        let change = change_output(options, leftover)?;
        let outputs = ctx.transition.expected_outputs(ctx.codec, ctx.guard, change.as_ref())?.unwrap_or_default();
        return Ok(Assembled { funding: options.funding.clone(), outputs, change });
    }

    if let Some(pinned) = ctx.guard.and_then(|guard| guard.pinned.as_ref()) {
        let committed = pinned.iter().map(|payout| payout.amount).sum::<u64>();
        let required = committed.checked_add(fee).ok_or(CovenantError::ValueOverflow("pinned outputs"))?;
        let surplus = available.checked_sub(required).ok_or(CovenantError::InsufficientFunds { available, required })?;
        if surplus > 0 {
            warn!(
                target: "covenant::builder",
                kind = %C::KIND,
                method = ctx.transition.method_name(),
                surplus,
                "pinned outputs leave funding surplus, paying it as fee"
            );
        }
        let outputs = pinned.iter().map(|payout| payout.output()).collect();
        return Ok(Assembled { funding: options.funding.clone(), outputs, change: None });
    }

    let address = options.destination.as_ref().or(options.change.as_ref()).ok_or(CovenantError::MissingDestination)?;
    let amount = available.checked_sub(fee).ok_or(CovenantError::InsufficientFunds { available, required: fee })?;
    let outputs = if amount > 0 { vec![TransactionOutput::new(amount, pay_to_address_script(address))] } else { Vec::new() };
    Ok(Assembled { funding: options.funding.clone(), outputs, change: None })
}

/// A covenant spend ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedSpend<C: Covenant> {
    /// Input 0 spends the covenant; the rest are funding inputs in order.
    pub tx: Transaction,
    /// Previous outputs, aligned with `tx.inputs`.
    pub entries: Vec<TransactionOutput>,
    /// Signing key for each funding input, aligned with `tx.inputs[1..]`.
    pub funding_keys: Vec<XOnlyPublicKey>,
    pub call: C::Call,
    pub transition: Transition<C>,
    pub guard: Option<Guard>,
    pub change: Option<TransactionOutput>,
}

/// A deployment transaction ready for signing. Output 0 holds the new instance.
#[derive(Debug, Clone)]
pub struct UnsignedMint<C: Covenant> {
    pub tx: Transaction,
    pub entries: Vec<TransactionOutput>,
    pub funding_keys: Vec<XOnlyPublicKey>,
    pub state: State<C>,
    pub balance: u64,
}

fn assemble_tx(inputs: &[Utxo], outputs: Vec<TransactionOutput>) -> Transaction {
    let inputs = inputs.iter().map(|utxo| TransactionInput::new(utxo.outpoint, vec![], 0, 1)).collect();
    Transaction::new(TX_VERSION, inputs, outputs, 0, SUBNETWORK_ID_NATIVE, 0, vec![])
}

fn sum_values<'a>(values: impl IntoIterator<Item = &'a TransactionOutput>, what: &'static str) -> Result<u64, CovenantError> {
    values.into_iter().try_fold(0u64, |acc, output| acc.checked_add(output.value)).ok_or(CovenantError::ValueOverflow(what))
}

/// Turns a call on an instance into an unsigned spending transaction.
///
/// The bound builder only chooses inputs and outputs. The covenant input, the output
/// commitment and value conservation are checked here, so a faulty builder fails with
/// `CommitmentMismatch` before anything is signed.
pub struct CovenantTxBuilder<'a, C: Covenant> {
    codec: &'a StateCodec,
    builders: &'a BuilderTable<C>,
}

impl<'a, C: Covenant> CovenantTxBuilder<'a, C> {
    pub fn new(codec: &'a StateCodec, builders: &'a BuilderTable<C>) -> Self {
        Self { codec, builders }
    }

    pub fn build(&self, instance: &ContractInstance<C>, call: C::Call, options: &BuildOptions) -> Result<UnsignedSpend<C>, CovenantError> {
        let builder = self.builders.get(C::method(&call))?;
        let transition = C::apply(instance, &call)?;
        let guard = transition.select_guard(options.authorize_as)?.cloned();

        let ctx = BuildContext { codec: self.codec, instance, transition: &transition, guard: guard.as_ref(), options };
        let assembled = builder(&ctx)?;
        debug!(
            target: "covenant::builder",
            kind = %C::KIND,
            method = transition.method_name(),
            funding = assembled.funding.len(),
            outputs = assembled.outputs.len(),
            "assembled covenant spend"
        );

        let covenant_utxo = instance.utxo(self.codec)?;
        if assembled.funding.iter().any(|input| input.utxo.outpoint == instance.location) {
            return Err(CovenantError::InputMismatch(format!("covenant input {} is spent twice", instance.location)));
        }

        if let Some(expected) = transition.expected_outputs(self.codec, guard.as_ref(), assembled.change.as_ref())? {
            check_commitment(&expected, &assembled.outputs)?;
        }

        let mut inputs = Vec::with_capacity(1 + assembled.funding.len());
        inputs.push(covenant_utxo);
        inputs.extend(assembled.funding.iter().map(|input| input.utxo.clone()));

        let total_in = sum_values(inputs.iter().map(|utxo| &utxo.output), "spend inputs")?;
        let total_out = sum_values(&assembled.outputs, "spend outputs")?;
        if total_out > total_in {
            return Err(CovenantError::InsufficientFunds { available: total_in, required: total_out });
        }

        let entries = inputs.iter().map(|utxo| utxo.output.clone()).collect();
        let tx = assemble_tx(&inputs, assembled.outputs);
        Ok(UnsignedSpend {
            tx,
            entries,
            funding_keys: assembled.funding.iter().map(|input| input.owner).collect(),
            call,
            transition,
            guard,
            change: assembled.change,
        })
    }

    /// Builds a transaction creating a new instance of `state` holding `balance`.
    pub fn build_mint(&self, state: State<C>, balance: u64, options: &BuildOptions) -> Result<UnsignedMint<C>, CovenantError> {
        let available = options.funding_total()?;
        let required = balance.checked_add(options.fee_or_zero()).ok_or(CovenantError::ValueOverflow("mint outputs"))?;
        let leftover = available.checked_sub(required).ok_or(CovenantError::InsufficientFunds { available, required })?;

        let mut outputs = vec![self.codec.encode(&state, balance)?];
        outputs.extend(change_output(options, leftover)?);
        debug!(target: "covenant::builder", kind = %C::KIND, balance, outputs = outputs.len(), "assembled mint");

        let inputs = options.funding.iter().map(|input| input.utxo.clone()).collect::<Vec<_>>();
        Ok(UnsignedMint {
            tx: assemble_tx(&inputs, outputs),
            entries: inputs.into_iter().map(|utxo| utxo.output).collect(),
            funding_keys: options.funding.iter().map(|input| input.owner).collect(),
            state,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{DebitCard, DebitCardCall, DebitCardMethod, Sellable, SellableCall};
    use crate::signer::{derive_address, pay_to_pubkey};
    use kaspa_addresses::Prefix;
    use kaspa_consensus_core::Hash;
    use kaspa_consensus_core::tx::TransactionOutpoint;
    use secp256k1::{Keypair, Secp256k1, SecretKey};

    fn key(byte: u8) -> XOnlyPublicKey {
        let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
        Keypair::from_secret_key(&Secp256k1::new(), &secret).x_only_public_key().0
    }

    fn funding(value: u64, owner: XOnlyPublicKey) -> FundingInput {
        let outpoint = TransactionOutpoint::new(Hash::from_u64_word(99), 0);
        FundingInput::new(Utxo { outpoint, output: TransactionOutput::new(value, pay_to_pubkey(&owner)) }, owner)
    }

    fn card(balance: u64) -> ContractInstance<DebitCard> {
        ContractInstance {
            state: DebitCard::mint(key(1), key(2)),
            balance,
            location: TransactionOutpoint::new(Hash::from_u64_word(1), 0),
        }
    }

    #[test]
    fn empty_table_reports_unbound_method() {
        let codec = StateCodec::default();
        let table = BuilderTable::<DebitCard>::new();
        let err = CovenantTxBuilder::new(&codec, &table).build(&card(5), DebitCardCall::Freeze, &BuildOptions::new()).unwrap_err();
        assert_eq!(err.to_string(), "no transaction builder bound for DebitCard.freeze");

        let table = BuilderTable::<DebitCard>::standard().unbind(DebitCardMethod::Freeze);
        assert!(!table.is_bound(DebitCardMethod::Freeze));
        assert!(table.is_bound(DebitCardMethod::Charge));
    }

    #[test]
    fn deposit_puts_state_first_and_change_last() {
        let codec = StateCodec::default();
        let table = BuilderTable::standard();
        let change = derive_address(Prefix::Testnet, &key(3));
        let options = BuildOptions::new().fund(funding(20, key(3))).change_to(change.clone()).fee(2);

        let spend = CovenantTxBuilder::new(&codec, &table)
            .build(&card(1), DebitCardCall::Deposit { value: 10, reason: "test".into() }, &options)
            .unwrap();
        assert_eq!(spend.tx.inputs.len(), 2);
        assert_eq!(spend.tx.inputs[0].previous_outpoint, card(1).location);
        assert_eq!(spend.tx.outputs[0], codec.encode(&DebitCard::mint(key(1), key(2)), 11).unwrap());
        assert_eq!(spend.tx.outputs[1], TransactionOutput::new(8, pay_to_address_script(&change)));
        assert_eq!(spend.change, Some(spend.tx.outputs[1].clone()));
    }

    #[test]
    fn charge_releases_value_into_change() {
        let codec = StateCodec::default();
        let table = BuilderTable::standard();
        let options = BuildOptions::new().change_to(derive_address(Prefix::Testnet, &key(1)));

        let spend = CovenantTxBuilder::new(&codec, &table)
            .build(&card(10), DebitCardCall::Charge { value: 4, reason: "fee".into() }, &options)
            .unwrap();
        assert_eq!(spend.tx.outputs.iter().map(|output| output.value).collect::<Vec<_>>(), vec![6, 4]);
        assert_eq!(spend.guard.map(|guard| guard.role), Some(Role::App));

        let err = CovenantTxBuilder::new(&codec, &table)
            .build(&card(10), DebitCardCall::Charge { value: 4, reason: "fee".into() }, &BuildOptions::new())
            .unwrap_err();
        assert!(matches!(err, CovenantError::MissingChangeRecipient(4)));
    }

    #[test]
    fn buy_without_payment_is_insufficient() {
        let codec = StateCodec::default();
        let table = BuilderTable::standard();
        let instance = ContractInstance {
            state: Sellable::new(b"deed".to_vec(), key(1), 50),
            balance: 1,
            location: TransactionOutpoint::new(Hash::from_u64_word(1), 0),
        };
        let err = CovenantTxBuilder::new(&codec, &table)
            .build(&instance, SellableCall::Buy { buyer: key(2) }, &BuildOptions::new())
            .unwrap_err();
        assert!(matches!(err, CovenantError::InsufficientFunds { available: 1, required: 51 }));
    }

    #[test]
    fn terminal_without_recipient_fails() {
        let codec = StateCodec::default();
        let table = BuilderTable::standard();
        let err = CovenantTxBuilder::new(&codec, &table)
            .build(&card(5), DebitCardCall::Cancel { reason: String::new() }, &BuildOptions::new())
            .unwrap_err();
        assert!(matches!(err, CovenantError::MissingDestination));
    }

    #[test]
    fn app_cancel_pays_player_regardless_of_destination() {
        let codec = StateCodec::default();
        let table = BuilderTable::standard();
        let options = BuildOptions::new().pay_to(derive_address(Prefix::Testnet, &key(9))).authorize_as(Role::App);
        let spend =
            CovenantTxBuilder::new(&codec, &table).build(&card(5), DebitCardCall::Cancel { reason: String::new() }, &options).unwrap();
        assert_eq!(spend.tx.outputs, vec![TransactionOutput::new(5, pay_to_pubkey(&key(2)))]);
    }

    #[test]
    fn faulty_builder_is_caught_before_signing() {
        let codec = StateCodec::default();
        let table = BuilderTable::<DebitCard>::new().bind(DebitCardMethod::Freeze, |ctx: &BuildContext<'_, DebitCard>| {
            // Re-emits the current state instead of the frozen successor.
            let output = ctx.instance.output(ctx.codec)?;
            Ok(Assembled { funding: Vec::new(), outputs: vec![output], change: None })
        });
        let err = CovenantTxBuilder::new(&codec, &table).build(&card(5), DebitCardCall::Freeze, &BuildOptions::new()).unwrap_err();
        assert!(matches!(err, CovenantError::CommitmentMismatch { .. }));
    }

    #[test]
    fn mint_requires_balance_plus_fee() {
        let codec = StateCodec::default();
        let table = BuilderTable::<DebitCard>::new();
        let options = BuildOptions::new().fund(funding(5, key(3))).fee(1);
        let err = CovenantTxBuilder::new(&codec, &table).build_mint(DebitCard::mint(key(1), key(2)), 5, &options).unwrap_err();
        assert!(matches!(err, CovenantError::InsufficientFunds { available: 5, required: 6 }));

        let mint = CovenantTxBuilder::new(&codec, &table).build_mint(DebitCard::mint(key(1), key(2)), 4, &options).unwrap();
        assert_eq!(mint.tx.outputs.len(), 1);
        assert_eq!(mint.tx.outputs[0].value, 4);
    }
}
