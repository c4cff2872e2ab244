use crate::wire::model::DefinitionId;

/// The decoded value stored at a primitive [`Item`], widened to a type wide
/// enough to hold any of the 1/2/4-byte primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarValue {
    Bool(bool),
    Char(u8),
    Signed(i64),
    Unsigned(u64),
}

/// Why an [`Item`] is incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// The buffer ended before this item (or one of its fields) could be read.
    Truncated,
    /// A schema inconsistency (unresolved type, bad length expression, ...)
    /// prevented further decoding.
    Schema(String),
}

/// One node of a dissected parse tree.
///
/// Struct definitions produce an `Item` with one child per field; list
/// fields produce an `Item` whose children are named `"[0]"`, `"[1]"`, ...;
/// primitive definitions produce a leaf `Item` with `value` set.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub definition: DefinitionId,
    /// Byte offset of this item's first byte within the buffer passed to [`crate::wire::examine`].
    pub offset: usize,
    pub value: Option<ScalarValue>,
    pub children: Vec<Item>,
    pub error: Option<ItemError>,
}

impl Item {
    pub fn leaf(
        name: impl Into<String>,
        definition: DefinitionId,
        offset: usize,
        value: ScalarValue,
    ) -> Item {
        Item {
            name: name.into(),
            definition,
            offset,
            value: Some(value),
            children: Vec::new(),
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.children.iter().all(Item::is_complete)
    }
}
