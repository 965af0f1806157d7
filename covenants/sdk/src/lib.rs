//! Script layout primitives for state-carrying covenants.
//!
//! This crate knows nothing about individual contracts. It provides the byte layout that
//! every stateful covenant output shares ([`template`]) and the canonical encoding used for
//! the fields inside it ([`fields`]).

pub mod fields;
pub mod template;

pub use fields::{FieldError, FieldReader, FieldWriter};
pub use template::{
    LayoutError, STATE_VERSION, ScriptCursor, StateScript, TEMPLATE_MAGIC, build_state_script, compute_push_size, parse_state_script,
    peek_tag,
};
