//! Locking-script template for state-carrying covenants.
//!
//! A stateful covenant output commits to its whole state inside the locking script, so the
//! script is split into a fixed part (identical for every instance with the same immutable
//! fields) and a state part that changes on every transition:
//!
//! ```text
//! OpFalse OpIf <header> OpEndIf <program> OpReturn <state>
//!
//! header = MAGIC || kind tag || immutable fields
//! state  = STATE_VERSION || mutable fields
//! ```
//!
//! The header sits inside a branch that never executes, so the immutable constants are part
//! of the script hash without being evaluated. Everything after `OpReturn` is data only.
//! Both pushes are at least two bytes long, which keeps them out of the small-integer
//! opcode range and makes the push encoding unambiguous.

use kaspa_txscript::{
    opcodes::codes::*,
    script_builder::{ScriptBuilder, ScriptBuilderError},
};
use thiserror::Error;

pub const TEMPLATE_MAGIC: &[u8; 4] = b"scov";
pub const STATE_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("script ends before {0}")]
    Truncated(&'static str),
    #[error("expected {expected} at offset {offset}, found opcode 0x{found:02x}")]
    UnexpectedOpcode { expected: &'static str, offset: usize, found: u8 },
    #[error("template header does not start with the covenant magic")]
    BadMagic,
    #[error("unknown template kind tag {0}")]
    UnknownTag(u8),
    #[error("template program does not match the program registered for this kind")]
    ProgramMismatch,
    #[error("unsupported state version {0}")]
    StateVersion(u8),
    #[error("{what} at offset {offset} is not minimally encoded")]
    NonMinimalPush { what: &'static str, offset: usize },
    #[error("{0} trailing bytes after the state push")]
    TrailingBytes(usize),
    #[error("script builder error: {0}")]
    ScriptBuilder(#[from] ScriptBuilderError),
}

/// Computes the serialized size of a data push (opcode + optional length bytes + data).
pub fn compute_push_size(data: &[u8]) -> Result<usize, ScriptBuilderError> {
    Ok(ScriptBuilder::new().add_data(data)?.drain().len())
}

/// Opcode [`ScriptBuilder::add_data`] uses to push `data`.
fn minimal_push_opcode(data: &[u8]) -> u8 {
    match data {
        [] | [0] => OpFalse,
        [n @ 1..=16] => OpTrue + *n - 1,
        [0x81] => Op1Negate,
        _ if data.len() <= OpData75 as usize => data.len() as u8,
        _ if data.len() <= u8::MAX as usize => OpPushData1,
        _ if data.len() <= u16::MAX as usize => OpPushData2,
        _ => OpPushData4,
    }
}

/// Sequential reader over script bytes, decoding one opcode or push at a time.
#[derive(Debug, Clone)]
pub struct ScriptCursor<'a> {
    script: &'a [u8],
    offset: usize,
}

impl<'a> ScriptCursor<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.script.len()
    }

    fn take(&mut self, what: &'static str, len: usize) -> Result<&'a [u8], LayoutError> {
        if self.script.len() - self.offset < len {
            return Err(LayoutError::Truncated(what));
        }
        let slice = &self.script[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn next_opcode(&mut self, what: &'static str) -> Result<u8, LayoutError> {
        Ok(self.take(what, 1)?[0])
    }

    pub fn expect_opcode(&mut self, opcode: u8, what: &'static str) -> Result<(), LayoutError> {
        let offset = self.offset;
        match self.next_opcode(what)? {
            found if found == opcode => Ok(()),
            found => Err(LayoutError::UnexpectedOpcode { expected: what, offset, found }),
        }
    }

    /// Consumes `expected` verbatim or fails with [`LayoutError::ProgramMismatch`].
    pub fn expect_bytes(&mut self, expected: &[u8]) -> Result<(), LayoutError> {
        let available = &self.script[self.offset..];
        if !available.starts_with(expected) {
            return Err(LayoutError::ProgramMismatch);
        }
        self.offset += expected.len();
        Ok(())
    }

    /// Reads one push operation and returns the pushed bytes.
    ///
    /// Small-integer opcodes are expanded back to their data: `OpFalse` pushes an empty
    /// vector, `Op1`..`Op16` push a single byte and `Op1Negate` pushes `0x81`. A push must use
    /// the same opcode [`ScriptBuilder::add_data`] would, so every payload has one encoding.
    pub fn read_push(&mut self, what: &'static str) -> Result<Vec<u8>, LayoutError> {
        let offset = self.offset;
        let opcode = self.next_opcode(what)?;
        let data = match opcode {
            OpFalse => Vec::new(),
            OpData1..=OpData75 => self.take(what, opcode as usize)?.to_vec(),
            OpPushData1 => {
                let len = self.take(what, 1)?[0] as usize;
                self.take(what, len)?.to_vec()
            }
            OpPushData2 => {
                let len = self.take(what, 2)?;
                let len = u16::from_le_bytes([len[0], len[1]]) as usize;
                self.take(what, len)?.to_vec()
            }
            OpPushData4 => {
                let len = self.take(what, 4)?;
                let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
                self.take(what, len)?.to_vec()
            }
            Op1Negate => vec![0x81],
            OpTrue..=Op16 => vec![opcode - OpTrue + 1],
            found => return Err(LayoutError::UnexpectedOpcode { expected: what, offset, found }),
        };
        if minimal_push_opcode(&data) != opcode {
            return Err(LayoutError::NonMinimalPush { what, offset });
        }
        Ok(data)
    }

    /// Fails if any bytes are left unread.
    pub fn finish(self) -> Result<(), LayoutError> {
        match self.script.len() - self.offset {
            0 => Ok(()),
            n => Err(LayoutError::TrailingBytes(n)),
        }
    }
}

/// The decoded pieces of a state-carrying locking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateScript {
    pub tag: u8,
    /// Serialized immutable fields (header without magic and tag).
    pub fixed: Vec<u8>,
    /// Serialized mutable fields (state push without the version byte).
    pub fields: Vec<u8>,
}

/// Assembles a locking script from its parts.
pub fn build_state_script(tag: u8, fixed: &[u8], program: &[u8], fields: &[u8]) -> Result<Vec<u8>, LayoutError> {
    let mut header = Vec::with_capacity(TEMPLATE_MAGIC.len() + 1 + fixed.len());
    header.extend_from_slice(TEMPLATE_MAGIC);
    header.push(tag);
    header.extend_from_slice(fixed);

    let mut state = Vec::with_capacity(1 + fields.len());
    state.push(STATE_VERSION);
    state.extend_from_slice(fields);

    let mut builder = ScriptBuilder::new();
    builder.add_op(OpFalse)?.add_op(OpIf)?.add_data(&header)?.add_op(OpEndIf)?;
    if !program.is_empty() {
        builder.add_ops(program)?;
    }
    builder.add_op(OpReturn)?.add_data(&state)?;
    Ok(builder.drain())
}

fn read_header(cursor: &mut ScriptCursor<'_>) -> Result<(u8, Vec<u8>), LayoutError> {
    cursor.expect_opcode(OpFalse, "OpFalse")?;
    cursor.expect_opcode(OpIf, "OpIf")?;
    let header = cursor.read_push("template header")?;
    cursor.expect_opcode(OpEndIf, "OpEndIf")?;

    match header.strip_prefix(TEMPLATE_MAGIC.as_slice()) {
        Some([tag, fixed @ ..]) => Ok((*tag, fixed.to_vec())),
        _ => Err(LayoutError::BadMagic),
    }
}

/// Returns the kind tag of a state-carrying script without decoding the rest of it.
pub fn peek_tag(script: &[u8]) -> Result<u8, LayoutError> {
    read_header(&mut ScriptCursor::new(script)).map(|(tag, _)| tag)
}

/// Splits a locking script back into header fields and state fields.
///
/// `program_for` resolves the program expected for the tag found in the header; a `None`
/// answer rejects the tag as unknown.
pub fn parse_state_script<'p, F>(script: &[u8], program_for: F) -> Result<StateScript, LayoutError>
where
    F: FnOnce(u8) -> Option<&'p [u8]>,
{
    let mut cursor = ScriptCursor::new(script);
    let (tag, fixed) = read_header(&mut cursor)?;
    let program = program_for(tag).ok_or(LayoutError::UnknownTag(tag))?;
    cursor.expect_bytes(program)?;
    cursor.expect_opcode(OpReturn, "OpReturn")?;
    let state = cursor.read_push("state push")?;
    cursor.finish()?;

    match state.split_first() {
        Some((&STATE_VERSION, fields)) => Ok(StateScript { tag, fixed, fields: fields.to_vec() }),
        Some((&version, _)) => Err(LayoutError::StateVersion(version)),
        None => Err(LayoutError::Truncated("state version")),
    }
}
