use crate::wire::expression::Expression;

/// Index into a [`Registry`](crate::wire::Registry)'s definition arena.
///
/// Definitions are never removed once registered, so a `DefinitionId` handed
/// out by a `Registry` remains valid for the registry's whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId(pub(crate) usize);

/// The byte width and interpretation of a primitive scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveClass {
    Boolean,
    Char,
    Signed,
    Unsigned,
}

/// A named field inside a [`DefinitionKind::Struct`] or [`DefinitionKind::Union`].
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    /// `None` when the referenced type name could not be resolved while
    /// compiling the schema. Only becomes an error if dissection reaches it.
    pub definition: Option<DefinitionId>,
    /// Present on `<list>` fields; evaluated against already-decoded siblings
    /// to determine the number of elements.
    pub length: Option<Expression>,
}

impl FieldDefinition {
    pub fn fixed(name: impl Into<String>, definition: Option<DefinitionId>) -> FieldDefinition {
        FieldDefinition {
            name: name.into(),
            definition,
            length: None,
        }
    }

    pub fn list(
        name: impl Into<String>,
        definition: Option<DefinitionId>,
        length: Expression,
    ) -> FieldDefinition {
        FieldDefinition {
            name: name.into(),
            definition,
            length: Some(length),
        }
    }

    pub fn is_list(&self) -> bool {
        self.length.is_some()
    }
}

/// The shape of a [`Definition`].
#[derive(Debug, Clone)]
pub enum DefinitionKind {
    Primitive {
        size: usize,
        class: PrimitiveClass,
    },
    Struct {
        fields: Vec<FieldDefinition>,
    },
    /// Framework only; field overlay semantics are not dissected.
    Union {
        fields: Vec<FieldDefinition>,
    },
    Typedef {
        target: DefinitionId,
    },
}

/// A named type known to a [`Registry`](crate::wire::Registry).
#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    pub kind: DefinitionKind,
}

impl Definition {
    pub fn primitive(name: impl Into<String>, size: usize, class: PrimitiveClass) -> Definition {
        Definition {
            name: name.into(),
            kind: DefinitionKind::Primitive { size, class },
        }
    }

    pub fn is_typedef(&self) -> bool {
        matches!(self.kind, DefinitionKind::Typedef { .. })
    }
}
