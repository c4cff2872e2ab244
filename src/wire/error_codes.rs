use enum_map::{enum_map, Enum, EnumMap};
use std::ops::Index;
use strum::{AsRefStr, EnumString};

/// A stable, serializable identifier for every kind of diagnostic the schema
/// compiler and dissector can raise, independent of its human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Enum)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    DuplicateDefinition,
    UnresolvedTypeReference,
    MissingRequiredAttribute,
    MalformedExpression,
    UnknownFieldRef,
    TypedefCycle,
    EventNumberOutOfRange,
    UnsupportedSchemaTag,
    MalformedXml,
    UnknownExtension,
    InvalidDirection,
    RootTruncated,
    FieldTruncated,
    DivideByZero,
    ShiftOutOfRange,
    SchemaGap,
}

/// How seriously a diagnostic of a given [`ErrorCode`] should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Maps every [`ErrorCode`] to a default [`Severity`].
///
/// Mirrors the teacher's `EnumMap`-backed severity table; unlike a text-span
/// diagnostic renderer, nothing here is user-configurable yet, but the shape
/// leaves room for it.
#[derive(Debug, Clone)]
pub struct SeverityMap {
    map: EnumMap<ErrorCode, Severity>,
}

impl Default for SeverityMap {
    fn default() -> Self {
        SeverityMap {
            map: enum_map! {
                ErrorCode::DuplicateDefinition => Severity::Warning,
                ErrorCode::UnresolvedTypeReference => Severity::Warning,
                ErrorCode::MissingRequiredAttribute => Severity::Warning,
                ErrorCode::MalformedExpression => Severity::Error,
                ErrorCode::UnknownFieldRef => Severity::Error,
                ErrorCode::TypedefCycle => Severity::Error,
                ErrorCode::EventNumberOutOfRange => Severity::Error,
                ErrorCode::UnsupportedSchemaTag => Severity::Warning,
                ErrorCode::MalformedXml => Severity::Error,
                ErrorCode::UnknownExtension => Severity::Warning,
                ErrorCode::InvalidDirection => Severity::Error,
                ErrorCode::RootTruncated => Severity::Error,
                ErrorCode::FieldTruncated => Severity::Error,
                ErrorCode::DivideByZero => Severity::Error,
                ErrorCode::ShiftOutOfRange => Severity::Error,
                ErrorCode::SchemaGap => Severity::Error,
            },
        }
    }
}

impl Index<ErrorCode> for SeverityMap {
    type Output = Severity;

    fn index(&self, index: ErrorCode) -> &Severity {
        &self.map[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_definition_defaults_to_warning() {
        let severities = SeverityMap::default();
        assert_eq!(severities[ErrorCode::DuplicateDefinition], Severity::Warning);
    }

    #[test]
    fn divide_by_zero_defaults_to_error() {
        let severities = SeverityMap::default();
        assert_eq!(severities[ErrorCode::DivideByZero], Severity::Error);
    }

    #[test]
    fn error_code_round_trips_through_snake_case_strings() {
        use std::str::FromStr;
        assert_eq!(
            ErrorCode::from_str("typedef_cycle"),
            Ok(ErrorCode::TypedefCycle)
        );
        assert_eq!(ErrorCode::TypedefCycle.as_ref(), "typedef_cycle");
    }
}
