mod compiler;
mod context;
mod cycle_guard;
mod diagnostics;
mod dissector;
mod error_codes;
pub mod expression;
mod item;
mod model;
mod registry;
mod session;

pub use compiler::{compile_sources, ContextBuilder};
pub use context::{Context, Extension};
pub use diagnostics::Diagnostic;
pub use dissector::{examine, DissectError, DissectOutcome, Direction};
pub use error_codes::{ErrorCode, Severity, SeverityMap};
pub use item::{Item, ItemError, ScalarValue};
pub use model::{Definition, DefinitionId, DefinitionKind, FieldDefinition, PrimitiveClass};
pub use registry::Registry;
pub use session::{Conversation, ConversationFlags};

// Re-exported so callers matching on diagnostic kinds don't need a second `use`.
pub use diagnostics::DiagnosticKind;
