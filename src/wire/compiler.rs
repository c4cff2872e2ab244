use crate::wire::context::{Context, Extension};
use crate::wire::cycle_guard::CycleGuard;
use crate::wire::diagnostics::{Diagnostic, DiagnosticKind};
use crate::wire::expression::{parse_literal, BinaryOp, Expression};
use crate::wire::model::{Definition, DefinitionId, DefinitionKind, FieldDefinition, PrimitiveClass};
use crate::wire::registry::{qualify, Registry};
use roxmltree::{Document, Node};
use tracing::debug;

const CORE_EVENT_SLOTS: usize = 64;
const CORE_ERROR_SLOTS: usize = 128;

/// Accumulates schema documents into a [`Context`].
///
/// Mirrors the reference implementation's bootstrap-then-fold-in-documents
/// shape, but takes already-parsed `roxmltree::Document`s rather than file
/// paths: opening files and globbing a search path is the host application's
/// job, not the compiler's.
pub struct ContextBuilder {
    registry: Registry,
    extensions: Vec<Extension>,
    core_events: Vec<Option<DefinitionId>>,
    core_errors: Vec<Option<DefinitionId>>,
    diagnostics: Vec<Diagnostic>,
    /// Tracks each typedef's dependency on its target, so a chain that closes
    /// back on itself is caught at compile time rather than looping forever
    /// the first time the dissector follows it.
    typedef_cycles: CycleGuard<DefinitionId>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        ContextBuilder::new()
    }
}

impl ContextBuilder {
    pub fn new() -> ContextBuilder {
        let mut registry = Registry::new();
        for (name, size, class) in [
            ("char", 1, PrimitiveClass::Char),
            ("BOOL", 1, PrimitiveClass::Boolean),
            ("BYTE", 1, PrimitiveClass::Unsigned),
            ("CARD8", 1, PrimitiveClass::Unsigned),
            ("CARD16", 2, PrimitiveClass::Unsigned),
            ("CARD32", 4, PrimitiveClass::Unsigned),
            ("INT8", 1, PrimitiveClass::Signed),
            ("INT16", 2, PrimitiveClass::Signed),
            ("INT32", 4, PrimitiveClass::Signed),
        ] {
            registry.insert(name.to_string(), Definition::primitive(name, size, class));
        }

        ContextBuilder {
            registry,
            extensions: Vec::new(),
            core_events: vec![None; CORE_EVENT_SLOTS],
            core_errors: vec![None; CORE_ERROR_SLOTS],
            diagnostics: Vec::new(),
            typedef_cycles: CycleGuard::default(),
        }
    }

    /// Records that `id` (a typedef) depends on `target`, raising
    /// [`DiagnosticKind::TypedefCycle`] if this closes a cycle. The chain of
    /// already-registered names is included in the diagnostic for context.
    fn guard_typedef_edge(&mut self, id: DefinitionId, target: DefinitionId) {
        if let Err(cycle) = self.typedef_cycles.add(id, &[target]) {
            let chain = cycle
                .cycle()
                .iter()
                .map(|id| self.registry.get(*id).name.clone())
                .collect();
            self.diagnostics
                .push(Diagnostic::new(DiagnosticKind::TypedefCycle { chain }));
        }
    }

    /// Folds one schema document into the context under construction.
    pub fn load_document(&mut self, document: &Document) {
        let root = document.root_element();
        let extension_xname = root.attribute("extension-xname");

        let extension_index = extension_xname.map(|xname| {
            if let Some(index) = self.extensions.iter().position(|e| e.xname == xname) {
                index
            } else {
                let name = root.attribute("extension-name").unwrap_or(xname).to_string();
                self.extensions.push(Extension::new(name, xname.to_string()));
                self.extensions.len() - 1
            }
        });

        for elem in root.children().filter(Node::is_element) {
            self.load_element(elem, extension_index);
        }
    }

    fn prefix<'a>(&'a self, extension_index: Option<usize>) -> Option<&'a str> {
        extension_index.map(|i| self.extensions[i].name.as_str())
    }

    fn load_element(&mut self, elem: Node, extension_index: Option<usize>) {
        match elem.tag_name().name() {
            "struct" => self.load_struct(elem, extension_index),
            "xidtype" => self.load_xidtype(elem, extension_index),
            "typedef" => self.load_typedef(elem, extension_index),
            "event" => self.load_event(elem, extension_index),
            "eventcopy" => self.load_eventcopy(elem, extension_index),
            tag @ ("errorcopy" | "error" | "union" | "enum" | "import" | "request") => {
                debug!(tag, "schema tag recognized but not dissected");
                self.diagnostics.push(Diagnostic::new(DiagnosticKind::UnsupportedSchemaTag {
                    tag: tag.to_string(),
                }));
            }
            other => {
                debug!(tag = other, "ignoring unknown schema element");
            }
        }
    }

    fn load_struct(&mut self, elem: Node, extension_index: Option<usize>) {
        let Some(name) = elem.attribute("name") else {
            self.missing_attribute(&elem, "name");
            return;
        };
        let qualified = self.qualify_name(name, extension_index);
        let fields = self.parse_fields(elem, extension_index);
        self.register(qualified, Definition {
            name: name.to_string(),
            kind: DefinitionKind::Struct { fields },
        });
    }

    fn load_xidtype(&mut self, elem: Node, extension_index: Option<usize>) {
        let Some(name) = elem.attribute("name") else {
            self.missing_attribute(&elem, "name");
            return;
        };
        let qualified = self.qualify_name(name, extension_index);
        self.register(
            qualified,
            Definition::primitive(name, 4, PrimitiveClass::Unsigned),
        );
    }

    fn load_typedef(&mut self, elem: Node, extension_index: Option<usize>) {
        let (Some(newname), Some(oldname)) = (elem.attribute("newname"), elem.attribute("oldname"))
        else {
            self.missing_attribute(&elem, "newname/oldname");
            return;
        };
        let qualified = self.qualify_name(newname, extension_index);
        let target = self.resolve_type(oldname, extension_index, newname);
        let Some(target) = target else { return };
        let (id, inserted) = self.register(qualified, Definition {
            name: newname.to_string(),
            kind: DefinitionKind::Typedef { target },
        });
        if inserted {
            self.guard_typedef_edge(id, target);
        }
    }

    fn load_event(&mut self, elem: Node, extension_index: Option<usize>) {
        let Some(number) = elem.attribute("number").and_then(|n| n.parse::<u32>().ok()) else {
            self.missing_attribute(&elem, "number");
            return;
        };
        if number as usize >= CORE_EVENT_SLOTS {
            self.diagnostics.push(Diagnostic::new(DiagnosticKind::EventNumberOutOfRange {
                extension: self.prefix(extension_index).unwrap_or("core").to_string(),
                number,
            }));
            return;
        }
        let Some(name) = elem.attribute("name") else {
            self.missing_attribute(&elem, "name");
            return;
        };

        let mut fields = self.parse_fields(elem, extension_index);
        if fields.is_empty() {
            fields.push(FieldDefinition::fixed("pad", self.registry.lookup("CARD8")));
        }

        // `sequence` is spliced in after the first declared field, not before
        // it: response_type, <first field>, sequence, <rest>. This matches
        // the real X11 event wire layout, not a naive "all synthesized
        // fields first" ordering.
        let rest = fields.split_off(1);
        let mut all_fields = vec![FieldDefinition::fixed("response_type", self.registry.lookup("BYTE"))];
        all_fields.append(&mut fields);
        let no_sequence_number = elem.attribute("no-sequence-number") == Some("true");
        if !no_sequence_number {
            all_fields.push(FieldDefinition::fixed("sequence", self.registry.lookup("CARD16")));
        }
        all_fields.extend(rest);

        let qualified = self.qualify_name(name, extension_index);
        let (id, inserted) = self.register(qualified, Definition {
            name: name.to_string(),
            kind: DefinitionKind::Struct { fields: all_fields },
        });
        if !inserted {
            return;
        }

        match extension_index {
            Some(i) => self.extensions[i].events.push((number, id)),
            None => self.core_events[number as usize] = Some(id),
        }
    }

    fn load_eventcopy(&mut self, elem: Node, extension_index: Option<usize>) {
        let Some(number) = elem.attribute("number").and_then(|n| n.parse::<u32>().ok()) else {
            self.missing_attribute(&elem, "number");
            return;
        };
        if number as usize >= CORE_EVENT_SLOTS {
            self.diagnostics.push(Diagnostic::new(DiagnosticKind::EventNumberOutOfRange {
                extension: self.prefix(extension_index).unwrap_or("core").to_string(),
                number,
            }));
            return;
        }
        let (Some(name), Some(reference)) = (elem.attribute("name"), elem.attribute("ref")) else {
            self.missing_attribute(&elem, "name/ref");
            return;
        };
        let Some(target) = self.resolve_type(reference, extension_index, name) else {
            return;
        };

        let (id, inserted) = self.register(name.to_string(), Definition {
            name: name.to_string(),
            kind: DefinitionKind::Typedef { target },
        });
        if !inserted {
            return;
        }
        self.guard_typedef_edge(id, target);

        // Unlike the event it copies, a plain `eventcopy` record is spliced onto
        // the owning extension's table directly: both branches append.
        match extension_index {
            Some(i) => self.extensions[i].events.push((number, id)),
            None => self.core_events[number as usize] = Some(id),
        }
    }

    fn parse_fields(&mut self, elem: Node, extension_index: Option<usize>) -> Vec<FieldDefinition> {
        let mut fields = Vec::new();
        for child in elem.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "doc" => continue,
                "pad" => {
                    let bytes = child
                        .attribute("bytes")
                        .and_then(|b| b.parse::<i64>().ok())
                        .unwrap_or(0);
                    fields.push(FieldDefinition::list(
                        "pad",
                        self.registry.lookup("CARD8"),
                        Expression::Literal(bytes),
                    ));
                }
                "field" => {
                    let Some(name) = child.attribute("name") else {
                        self.missing_attribute(&child, "name");
                        continue;
                    };
                    let Some(type_name) = child.attribute("type") else {
                        self.missing_attribute(&child, "type");
                        continue;
                    };
                    let definition = self.resolve_type(type_name, extension_index, name);
                    fields.push(FieldDefinition::fixed(name, definition));
                }
                "list" => {
                    let Some(name) = child.attribute("name") else {
                        self.missing_attribute(&child, "name");
                        continue;
                    };
                    let Some(type_name) = child.attribute("type") else {
                        self.missing_attribute(&child, "type");
                        continue;
                    };
                    let definition = self.resolve_type(type_name, extension_index, name);
                    let length_node = child.children().find(Node::is_element);
                    let length = match length_node.and_then(|n| self.parse_expression(n)) {
                        Some(expr) => expr,
                        None => {
                            self.diagnostics.push(Diagnostic::new(DiagnosticKind::MalformedExpression {
                                reason: format!("<list name={name:?}> has no length expression"),
                            }));
                            continue;
                        }
                    };
                    fields.push(FieldDefinition::list(name, definition, length));
                }
                _ => {}
            }
        }
        fields
    }

    fn parse_expression(&mut self, elem: Node) -> Option<Expression> {
        match elem.tag_name().name() {
            "value" => {
                let text = elem.text().unwrap_or("").trim();
                match parse_literal(text) {
                    Some(value) => Some(Expression::Literal(value)),
                    None => {
                        self.diagnostics.push(Diagnostic::new(DiagnosticKind::MalformedExpression {
                            reason: format!("unparsable literal {text:?}"),
                        }));
                        None
                    }
                }
            }
            "fieldref" => {
                let name = elem.text().unwrap_or("").trim().to_string();
                Some(Expression::FieldRef(name))
            }
            "op" => {
                let op_name = elem.attribute("op")?;
                let op = match BinaryOp::from_xml_name(op_name) {
                    Some(op) => op,
                    None => {
                        self.diagnostics.push(Diagnostic::new(DiagnosticKind::MalformedExpression {
                            reason: format!("unknown operator {op_name:?}"),
                        }));
                        return None;
                    }
                };
                let mut children = elem.children().filter(Node::is_element);
                let lhs = children.next().and_then(|n| self.parse_expression(n))?;
                let rhs = children.next().and_then(|n| self.parse_expression(n))?;
                Some(Expression::Binary(op, Box::new(lhs), Box::new(rhs)))
            }
            other => {
                self.diagnostics.push(Diagnostic::new(DiagnosticKind::MalformedExpression {
                    reason: format!("unexpected expression element <{other}>"),
                }));
                None
            }
        }
    }

    fn qualify_name(&self, name: &str, extension_index: Option<usize>) -> String {
        match self.prefix(extension_index) {
            Some(prefix) => qualify(prefix, name),
            None => name.to_string(),
        }
    }

    fn resolve_type(
        &mut self,
        type_name: &str,
        extension_index: Option<usize>,
        field_name: &str,
    ) -> Option<DefinitionId> {
        let resolved = self.registry.resolve(type_name, self.prefix(extension_index));
        if resolved.is_none() {
            self.diagnostics.push(Diagnostic::new(DiagnosticKind::UnresolvedTypeReference {
                field: field_name.to_string(),
                type_name: type_name.to_string(),
            }));
        }
        resolved
    }

    fn register(&mut self, name: String, definition: Definition) -> (DefinitionId, bool) {
        let (id, inserted) = self.registry.insert(name.clone(), definition);
        if !inserted {
            self.diagnostics.push(Diagnostic::new(DiagnosticKind::DuplicateDefinition { name }));
        }
        (id, inserted)
    }

    fn missing_attribute(&mut self, elem: &Node, attribute: &str) {
        self.diagnostics.push(Diagnostic::new(DiagnosticKind::MissingRequiredAttribute {
            element: elem.tag_name().name().to_string(),
            attribute: attribute.to_string(),
        }));
    }

    /// Finalizes the registry and extensions into a [`Context`], returning any
    /// diagnostics accumulated while loading documents.
    pub fn build(self) -> (Context, Vec<Diagnostic>) {
        let context = Context::new(
            self.registry,
            self.extensions,
            self.core_events,
            self.core_errors,
        );
        (context, self.diagnostics)
    }
}

/// Convenience wrapper: parses raw XML text for each `(source_name, xml_text)`
/// pair and folds the successfully-parsed documents into a fresh [`Context`].
/// A source that fails to parse is skipped and logged, not fatal to the rest —
/// this is sugar on top of the core, which only ever consumes already-parsed
/// `roxmltree::Document`s.
pub fn compile_sources(sources: &[(&str, &str)]) -> (Context, Vec<Diagnostic>) {
    let mut builder = ContextBuilder::new();
    for (source_name, xml_text) in sources {
        match Document::parse(xml_text) {
            Ok(document) => builder.load_document(&document),
            Err(err) => {
                tracing::warn!(source = *source_name, error = %err, "skipping malformed schema document");
                builder.diagnostics.push(Diagnostic::new(DiagnosticKind::MalformedXml {
                    source: source_name.to_string(),
                    reason: err.to_string(),
                }));
            }
        }
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::model::DefinitionKind;

    #[test]
    fn bootstraps_nine_core_primitives() {
        let (ctx, diagnostics) = ContextBuilder::new().build();
        assert!(diagnostics.is_empty());
        for name in ["char", "BOOL", "BYTE", "CARD8", "CARD16", "CARD32", "INT8", "INT16", "INT32"] {
            assert!(ctx.registry().lookup(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn xidtype_registers_as_a_four_byte_unsigned_primitive() {
        let xml = r#"<xcb header="core"><xidtype name="Window" /></xcb>"#;
        let (ctx, diagnostics) = compile_sources(&[("core", xml)]);
        assert!(diagnostics.is_empty());
        let id = ctx.registry().lookup("Window").expect("Window registered");
        assert_matches::assert_matches!(
            &ctx.registry().get(id).kind,
            DefinitionKind::Primitive { size: 4, .. }
        );
    }

    #[test]
    fn loads_a_simple_struct() {
        let xml = r#"<xcb header="core">
            <struct name="POINT">
                <field name="x" type="INT16" />
                <field name="y" type="INT16" />
            </struct>
        </xcb>"#;
        let (ctx, diagnostics) = compile_sources(&[("core", xml)]);
        assert!(diagnostics.is_empty());
        let id = ctx.registry().lookup("POINT").expect("POINT registered");
        match &ctx.registry().get(id).kind {
            DefinitionKind::Struct { fields } => assert_eq!(fields.len(), 2),
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn event_splices_sequence_after_the_first_declared_field() {
        // Matches the real X11 event wire layout (and the reference
        // implementation's field-list splicing): response_type, <first
        // declared field>, sequence, <rest>, not all synthesized fields
        // bunched up front.
        let xml = r#"<xcb header="core">
            <event name="KeyPress" number="2">
                <field name="detail" type="BYTE" />
                <field name="root" type="CARD32" />
            </event>
        </xcb>"#;
        let (ctx, diagnostics) = compile_sources(&[("core", xml)]);
        assert!(diagnostics.is_empty());
        let id = ctx.core_event(2).expect("event 2 registered");
        match &ctx.registry().get(id).kind {
            DefinitionKind::Struct { fields } => {
                assert_eq!(fields[0].name, "response_type");
                assert_eq!(fields[1].name, "detail");
                assert_eq!(fields[2].name, "sequence");
                assert_eq!(fields[3].name, "root");
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn event_with_no_declared_fields_gets_a_pad_before_sequence() {
        let xml = r#"<xcb header="core">
            <event name="Empty" number="3" />
        </xcb>"#;
        let (ctx, diagnostics) = compile_sources(&[("core", xml)]);
        assert!(diagnostics.is_empty());
        let id = ctx.core_event(3).expect("event 3 registered");
        match &ctx.registry().get(id).kind {
            DefinitionKind::Struct { fields } => {
                assert_eq!(fields[0].name, "response_type");
                assert_eq!(fields[1].name, "pad");
                assert_eq!(fields[2].name, "sequence");
                assert_eq!(fields.len(), 3);
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn event_numbered_exactly_at_the_slot_count_is_rejected_not_panicking() {
        let xml = r#"<xcb header="core">
            <event name="OffByOne" number="64">
                <field name="x" type="CARD8" />
            </event>
        </xcb>"#;
        let (ctx, diagnostics) = compile_sources(&[("core", xml)]);
        assert_eq!(diagnostics.len(), 1);
        assert!(ctx.registry().lookup("OffByOne").is_none());
    }

    #[test]
    fn eventcopy_is_spliced_onto_extension_event_table() {
        let xml = r#"<xcb header="bigreq" extension-xname="BIG-REQUESTS" extension-name="bigreq">
            <event name="Enable" number="0">
                <field name="maximum_request_length" type="CARD32" />
            </event>
            <eventcopy name="EnableCopy" number="1" ref="bigreqEnable" />
        </xcb>"#;
        let (ctx, diagnostics) = compile_sources(&[("bigreq", xml)]);
        assert!(diagnostics.is_empty());
        let extension = ctx.find_extension("BIG-REQUESTS").expect("extension registered");
        assert_eq!(extension.events.len(), 2);
        assert_eq!(extension.events[1].0, 1);
    }

    #[test]
    fn unknown_type_reference_is_reported_but_not_fatal() {
        let xml = r#"<xcb header="core">
            <struct name="Weird">
                <field name="x" type="NoSuchType" />
            </struct>
        </xcb>"#;
        let (ctx, diagnostics) = compile_sources(&[("core", xml)]);
        assert_eq!(diagnostics.len(), 1);
        let id = ctx.registry().lookup("Weird").unwrap();
        match &ctx.registry().get(id).kind {
            DefinitionKind::Struct { fields } => assert!(fields[0].definition.is_none()),
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn malformed_document_is_skipped_and_logged() {
        let (ctx, diagnostics) = compile_sources(&[("broken", "<xcb><unterminated>")]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(ctx.registry().len(), 9); // only the bootstrapped primitives
    }

    #[test]
    fn extension_qualified_type_resolves_before_unqualified() {
        let xml = r#"<xcb header="xfixes" extension-xname="XFIXES" extension-name="xfixes">
            <xidtype name="Region" />
            <struct name="Holder">
                <field name="region" type="Region" />
            </struct>
        </xcb>"#;
        let (ctx, diagnostics) = compile_sources(&[("xfixes", xml)]);
        assert!(diagnostics.is_empty());
        assert!(ctx.registry().lookup("xfixesRegion").is_some());
        assert!(ctx.registry().lookup("Region").is_none());
    }
}
