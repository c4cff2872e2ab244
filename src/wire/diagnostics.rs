use crate::wire::error_codes::{ErrorCode, Severity, SeverityMap};
use std::fmt;

/// What went wrong, with enough detail to render a useful message.
///
/// Unlike the teacher's text-span diagnostics, schema documents are consumed
/// as already-parsed element trees, so there is no source span to point at;
/// diagnostics instead carry the name of the offending definition or field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    DuplicateDefinition { name: String },
    UnresolvedTypeReference { field: String, type_name: String },
    MissingRequiredAttribute { element: String, attribute: String },
    MalformedExpression { reason: String },
    TypedefCycle { chain: Vec<String> },
    EventNumberOutOfRange { extension: String, number: u32 },
    UnsupportedSchemaTag { tag: String },
    MalformedXml { source: String, reason: String },
    UnknownExtension { xname: String },
}

impl DiagnosticKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            DiagnosticKind::DuplicateDefinition { .. } => ErrorCode::DuplicateDefinition,
            DiagnosticKind::UnresolvedTypeReference { .. } => ErrorCode::UnresolvedTypeReference,
            DiagnosticKind::MissingRequiredAttribute { .. } => ErrorCode::MissingRequiredAttribute,
            DiagnosticKind::MalformedExpression { .. } => ErrorCode::MalformedExpression,
            DiagnosticKind::TypedefCycle { .. } => ErrorCode::TypedefCycle,
            DiagnosticKind::EventNumberOutOfRange { .. } => ErrorCode::EventNumberOutOfRange,
            DiagnosticKind::UnsupportedSchemaTag { .. } => ErrorCode::UnsupportedSchemaTag,
            DiagnosticKind::MalformedXml { .. } => ErrorCode::MalformedXml,
            DiagnosticKind::UnknownExtension { .. } => ErrorCode::UnknownExtension,
        }
    }

    pub fn default_severity(&self) -> Severity {
        SeverityMap::default()[self.code()]
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::DuplicateDefinition { name } => {
                write!(f, "definition {name:?} was already registered; keeping the first one")
            }
            DiagnosticKind::UnresolvedTypeReference { field, type_name } => {
                write!(f, "field {field:?} references unknown type {type_name:?}")
            }
            DiagnosticKind::MissingRequiredAttribute { element, attribute } => {
                write!(f, "<{element}> is missing required attribute {attribute:?}")
            }
            DiagnosticKind::MalformedExpression { reason } => {
                write!(f, "malformed length expression: {reason}")
            }
            DiagnosticKind::TypedefCycle { chain } => {
                write!(f, "cyclic typedef chain: {}", chain.join(" -> "))
            }
            DiagnosticKind::EventNumberOutOfRange { extension, number } => {
                write!(f, "extension {extension:?} event number {number} exceeds range")
            }
            DiagnosticKind::UnsupportedSchemaTag { tag } => {
                write!(f, "<{tag}> is recognized but not dissected")
            }
            DiagnosticKind::MalformedXml { source, reason } => {
                write!(f, "skipping {source:?}: {reason}")
            }
            DiagnosticKind::UnknownExtension { xname } => {
                write!(f, "no extension registered with xname {xname:?}")
            }
        }
    }
}

/// A single diagnostic raised while compiling a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind) -> Diagnostic {
        Diagnostic { kind }
    }

    pub fn severity(&self) -> Severity {
        self.kind.default_severity()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_definition_displays_the_conflicting_name() {
        let diag = Diagnostic::new(DiagnosticKind::DuplicateDefinition {
            name: "CARD8".into(),
        });
        assert_eq!(
            diag.to_string(),
            "definition \"CARD8\" was already registered; keeping the first one"
        );
    }

    #[test]
    fn typedef_cycle_severity_is_error() {
        let diag = Diagnostic::new(DiagnosticKind::TypedefCycle {
            chain: vec!["A".into(), "B".into(), "A".into()],
        });
        assert_eq!(diag.severity(), Severity::Error);
    }
}
