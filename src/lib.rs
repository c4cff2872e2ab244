//! A schema-driven dissector for the X11 wire protocol.
//!
//! Schema documents (the XML-XCB family) are compiled into a [`wire::Context`],
//! which a [`wire::Conversation`] binds to a single connection's dynamic state.
//! [`wire::examine`] then turns a raw byte buffer into a labeled [`wire::Item`] tree.

pub mod wire;

pub use wire::{
    compile_sources, examine, Context, Conversation, ConversationFlags, Definition, DefinitionId,
    Diagnostic, DiagnosticKind, Direction, DissectError, DissectOutcome, ErrorCode, Extension,
    Item, ItemError, Registry, Severity, SeverityMap,
};
