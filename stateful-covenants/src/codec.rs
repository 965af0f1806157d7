use std::collections::BTreeMap;

use covenant_sdk::{FieldReader, FieldWriter, build_state_script, parse_state_script, peek_tag};
use kaspa_consensus_core::tx::{ScriptPublicKey, TransactionOutput};
use serde_json::{Value, json};

use crate::contracts::{DebitCard, Depositable, Sellable, Tradeable};
use crate::errors::CovenantError;
use crate::model::{ContractKind, Covenant, State};

/// Verification program placed between the header and the state of each variant's script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramSet {
    programs: BTreeMap<ContractKind, Vec<u8>>,
}

impl ProgramSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, kind: ContractKind, program: Vec<u8>) -> Self {
        self.programs.insert(kind, program);
        self
    }

    /// Empty for kinds without a registered program.
    pub fn get(&self, kind: ContractKind) -> &[u8] {
        self.programs.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Maps contract states to locking scripts and back.
///
/// Encoding is deterministic: the same state and balance always give the same output bytes.
#[derive(Debug, Clone, Default)]
pub struct StateCodec {
    programs: ProgramSet,
}

impl StateCodec {
    pub fn new(programs: ProgramSet) -> Self {
        Self { programs }
    }

    pub fn programs(&self) -> &ProgramSet {
        &self.programs
    }

    pub fn locking_script<C: Covenant>(&self, state: &State<C>) -> Result<ScriptPublicKey, CovenantError> {
        let mut fixed = FieldWriter::new();
        C::write_fixed(state.fixed(), &mut fixed)?;
        let mut fields = FieldWriter::new();
        C::write_fields(state.fields(), &mut fields);

        let script = build_state_script(C::KIND.tag(), fixed.as_slice(), self.programs.get(C::KIND), fields.as_slice())?;
        Ok(ScriptPublicKey::new(0, script.into()))
    }

    /// The output holding `state` with `balance` as its value.
    pub fn encode<C: Covenant>(&self, state: &State<C>, balance: u64) -> Result<TransactionOutput, CovenantError> {
        Ok(TransactionOutput::new(balance, self.locking_script(state)?))
    }

    pub fn decode<C: Covenant>(&self, output: &TransactionOutput) -> Result<(State<C>, u64), CovenantError> {
        let spk = &output.script_public_key;
        if spk.version() != 0 {
            return Err(CovenantError::malformed(format!("unsupported script version {}", spk.version())));
        }

        let kind = self.decode_kind(spk.script())?;
        if kind != C::KIND {
            return Err(CovenantError::malformed(format!("expected {} script, found {kind}", C::KIND)));
        }

        let parsed = parse_state_script(spk.script(), |_| Some(self.programs.get(kind)))?;

        let mut reader = FieldReader::new(&parsed.fixed);
        let fixed = C::read_fixed(&mut reader)?;
        reader.finish()?;

        let mut reader = FieldReader::new(&parsed.fields);
        let fields = C::read_fields(&mut reader)?;
        reader.finish()?;

        Ok((State::new(fixed, fields), output.value))
    }

    /// Reads the variant from a script header without decoding the state.
    pub fn decode_kind(&self, script: &[u8]) -> Result<ContractKind, CovenantError> {
        let tag = peek_tag(script)?;
        ContractKind::from_tag(tag).ok_or_else(|| CovenantError::malformed(format!("unknown contract kind tag {tag}")))
    }

    pub fn is_covenant_script(&self, script: &[u8]) -> bool {
        self.decode_kind(script).is_ok()
    }

    /// Decodes any variant into a JSON summary of its kind, balance and fields.
    pub fn describe(&self, output: &TransactionOutput) -> Result<Value, CovenantError> {
        match self.decode_kind(output.script_public_key.script())? {
            ContractKind::DebitCard => self.describe_as::<DebitCard>(output),
            ContractKind::Depositable => self.describe_as::<Depositable>(output),
            ContractKind::Tradeable => self.describe_as::<Tradeable>(output),
            ContractKind::Sellable => self.describe_as::<Sellable>(output),
        }
    }

    fn describe_as<C: Covenant>(&self, output: &TransactionOutput) -> Result<Value, CovenantError> {
        let (state, balance) = self.decode::<C>(output)?;
        Ok(json!({
            "kind": C::KIND,
            "balance": balance,
            "fixed": state.fixed(),
            "fields": state.fields(),
        }))
    }
}
