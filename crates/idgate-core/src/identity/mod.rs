//! Public identity records
//!
//! - `meta`: immutable key record, first writer wins
//! - `document`: visas and bulletins, latest per type wins
//! - `group`: group command history used for member-list freshness

pub mod document;
pub mod group;
pub mod meta;

pub use document::{last_bulletin, last_document, last_visa, Document, DocumentType};
pub use group::{earliest_history_time, GroupCommand, GroupCommandKind};
pub use meta::Meta;
