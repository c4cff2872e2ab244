use crate::wire::model::{Definition, DefinitionId};
use crate::wire::registry::Registry;
use std::rc::Rc;

/// An extension's short name, wire name, and the event/error tables the
/// schema compiler has appended to it so far.
///
/// `events`/`errors` are appended to by both `event`/`error` and their
/// `eventcopy`/`errorcopy` counterparts; the reference implementation built
/// the `eventcopy` record but never linked it into this table, which meant an
/// extension's copied events were silently undissectable.
#[derive(Debug, Clone)]
pub struct Extension {
    pub name: String,
    pub xname: String,
    pub events: Vec<(u32, DefinitionId)>,
    pub errors: Vec<(u32, DefinitionId)>,
}

impl Extension {
    pub fn new(name: String, xname: String) -> Extension {
        Extension {
            name,
            xname,
            events: Vec::new(),
            errors: Vec::new(),
        }
    }
}

struct ContextInner {
    registry: Registry,
    extensions: Vec<Extension>,
    core_events: Vec<Option<DefinitionId>>,
    core_errors: Vec<Option<DefinitionId>>,
}

/// The process-wide, immutable-after-construction set of compiled
/// definitions, shared by every [`Conversation`](crate::wire::Conversation)
/// built from it.
///
/// Reference counting is modeled with `Rc`: [`Context::acquire`] clones the
/// handle and [`Context::release`] drops it, standing in for the reference
/// implementation's manual `ref`/`unref` pair. Because Rust's `Drop` already
/// frees the inner data once the last handle goes away, `release` never
/// needs to report "this was the last reference and the context was freed" —
/// it has nothing useful to return, unlike the C API it parities.
#[derive(Clone)]
pub struct Context(Rc<ContextInner>);

impl Context {
    pub(crate) fn new(
        registry: Registry,
        extensions: Vec<Extension>,
        core_events: Vec<Option<DefinitionId>>,
        core_errors: Vec<Option<DefinitionId>>,
    ) -> Context {
        Context(Rc::new(ContextInner {
            registry,
            extensions,
            core_events,
            core_errors,
        }))
    }

    pub fn registry(&self) -> &Registry {
        &self.0.registry
    }

    /// The read-only, insertion-ordered sequence of every definition this
    /// context holds (core primitives plus every loaded extension's types),
    /// mirroring `xamine_context_definitions` from the reference API.
    pub fn definitions(&self) -> impl Iterator<Item = (DefinitionId, &Definition)> {
        self.0.registry.iter()
    }

    pub fn core_event(&self, number: u32) -> Option<DefinitionId> {
        self.0.core_events.get(number as usize).copied().flatten()
    }

    pub fn core_error(&self, code: u32) -> Option<DefinitionId> {
        self.0.core_errors.get(code as usize).copied().flatten()
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.0.extensions
    }

    pub fn find_extension(&self, xname: &str) -> Option<&Extension> {
        self.0.extensions.iter().find(|e| e.xname == xname)
    }

    /// Clones this handle, mirroring `xamine_context_ref`.
    pub fn acquire(&self) -> Context {
        self.clone()
    }

    /// Drops this handle, mirroring `xamine_context_unref`. The inner
    /// registry is freed once the last handle is dropped.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::compiler::ContextBuilder;

    #[test]
    fn acquire_yields_an_independent_handle_to_the_same_registry() {
        let (ctx, _) = ContextBuilder::new().build();
        let acquired = ctx.acquire();
        assert_eq!(ctx.registry().len(), acquired.registry().len());
    }

    #[test]
    fn definitions_exposes_the_bootstrapped_primitives_in_insertion_order() {
        let (ctx, _) = ContextBuilder::new().build();
        let names: Vec<&str> = ctx.definitions().map(|(_, def)| def.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["char", "BOOL", "BYTE", "CARD8", "CARD16", "CARD32", "INT8", "INT16", "INT32"]
        );
    }

    #[test]
    fn find_extension_is_none_for_unknown_xname() {
        let (ctx, _) = ContextBuilder::new().build();
        assert!(ctx.find_extension("NO-SUCH-EXTENSION").is_none());
    }
}
