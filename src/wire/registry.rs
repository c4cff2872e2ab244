use crate::wire::model::{Definition, DefinitionId};
use std::collections::HashMap;

/// An append-only, insertion-ordered arena of [`Definition`]s.
///
/// Lookup is by name. On a duplicate name the first registration wins for
/// lookup purposes; the caller is expected to have already recorded a
/// diagnostic for the collision.
#[derive(Debug, Default)]
pub struct Registry {
    definitions: Vec<Definition>,
    by_name: HashMap<String, DefinitionId>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Registers `definition` under `name` unless that name is already taken,
    /// in which case the existing id is returned and the new definition is
    /// discarded (first-wins).
    pub fn insert(&mut self, name: String, definition: Definition) -> (DefinitionId, bool) {
        if let Some(&existing) = self.by_name.get(&name) {
            return (existing, false);
        }
        let id = DefinitionId(self.definitions.len());
        self.definitions.push(definition);
        self.by_name.insert(name, id);
        (id, true)
    }

    pub fn get(&self, id: DefinitionId) -> &Definition {
        &self.definitions[id.0]
    }

    pub fn get_mut(&mut self, id: DefinitionId) -> &mut Definition {
        &mut self.definitions[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<DefinitionId> {
        self.by_name.get(name).copied()
    }

    /// Resolves `name`, qualifying it with `extension_prefix` first (when
    /// present) and falling back to the unqualified, core-scope name.
    pub fn resolve(&self, name: &str, extension_prefix: Option<&str>) -> Option<DefinitionId> {
        if let Some(prefix) = extension_prefix {
            let qualified = qualify(prefix, name);
            if let Some(id) = self.lookup(&qualified) {
                return Some(id);
            }
        }
        self.lookup(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefinitionId, &Definition)> {
        self.definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (DefinitionId(i), d))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Follows a typedef chain to its first non-typedef target.
    pub fn resolve_typedef(&self, mut id: DefinitionId) -> DefinitionId {
        while let crate::wire::model::DefinitionKind::Typedef { target } = self.get(id).kind {
            id = target;
        }
        id
    }
}

/// Qualifies `name` with an extension's short name, e.g. `"bigreq"` + `"Enable"`
/// becomes `"bigreqEnable"`, matching the reference implementation's
/// concatenation-based name mangling.
pub fn qualify(extension_prefix: &str, name: &str) -> String {
    format!("{extension_prefix}{name}")
}
