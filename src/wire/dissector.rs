use crate::wire::diagnostics::{Diagnostic, DiagnosticKind};
use crate::wire::error_codes::ErrorCode;
use crate::wire::expression::Eval;
use crate::wire::item::{Item, ItemError, ScalarValue};
use crate::wire::model::{DefinitionId, DefinitionKind, FieldDefinition, PrimitiveClass};
use crate::wire::registry::Registry;
use crate::wire::session::Conversation;

/// Which half of a request/response pair a buffer represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Reserved: request dissection is not yet implemented, matching the
    /// reference implementation.
    Request,
    Response,
}

/// Why dissection of part of a buffer could not be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DissectError {
    /// The buffer ended before a definition (or one of its fields) could be read.
    Truncated,
    /// A schema inconsistency surfaced while interpreting the bytes (unresolved
    /// type, bad length expression).
    Schema(Diagnostic),
}

impl DissectError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DissectError::Truncated => ErrorCode::FieldTruncated,
            DissectError::Schema(_) => ErrorCode::SchemaGap,
        }
    }
}

/// The result of a successful call to [`examine`]: a (possibly partial) parse
/// tree plus the error that stopped it early, if any.
#[derive(Debug, Clone)]
pub struct DissectOutcome {
    pub item: Item,
    pub error: Option<DissectError>,
}

/// Tracks cursor position through the buffer as dissection recurses, plus
/// whether the peer's byte order matches the host's (decided once, up front,
/// rather than threaded through every recursive call).
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    needs_byteswap: bool,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], peer_is_little_endian: bool) -> Cursor<'a> {
        let host_is_little_endian = cfg!(target_endian = "little");
        Cursor {
            buf,
            pos: 0,
            needs_byteswap: peer_is_little_endian != host_is_little_endian,
        }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }
}

/// Dissects `buffer` against the definition selected by `direction` and the
/// buffer's own header byte(s).
///
/// Returns `None` when the direction/kind is unimplemented, the buffer is too
/// short to even carry a response header, or no definition is registered for
/// the selected code. Otherwise returns `Some`, with `error` set when
/// truncation or a schema problem stopped dissection partway through —
/// the tree built so far is still returned.
pub fn examine(conversation: &Conversation, direction: Direction, buffer: &[u8]) -> Option<DissectOutcome> {
    let definition = match direction {
        Direction::Request => return None,
        Direction::Response => {
            if buffer.len() < 32 {
                return None;
            }
            let response_type = buffer[0];
            if response_type == 0 {
                let error_code = buffer[1];
                conversation.lookup_error(error_code)?
            } else if response_type == 1 {
                return None; // replies: not yet implemented
            } else {
                let event_code = response_type & !0x80;
                conversation.lookup_event(event_code)?
            }
        }
    };

    let registry = conversation.context().registry();
    let mut cursor = Cursor::new(buffer, conversation.peer_is_little_endian());
    let (item, error) = dissect_definition(registry, &mut cursor, definition, &[]);
    Some(DissectOutcome { item, error })
}

/// Dissects one definition at the cursor's current position, returning the
/// produced item and, if dissection stopped early, the error that caused it.
/// `siblings` is the already-decoded field list of the enclosing struct, used
/// only to resolve list-length expressions below this point.
fn dissect_definition(
    registry: &Registry,
    cursor: &mut Cursor,
    id: DefinitionId,
    siblings: &[Item],
) -> (Item, Option<DissectError>) {
    let definition = registry.get(id);
    match &definition.kind {
        DefinitionKind::Typedef { target } => {
            let (mut item, error) = dissect_definition(registry, cursor, *target, siblings);
            item.definition = id;
            (item, error)
        }
        DefinitionKind::Struct { fields } | DefinitionKind::Union { fields } => {
            dissect_struct(registry, cursor, id, fields)
        }
        DefinitionKind::Primitive { size, class } => dissect_primitive(cursor, id, *size, *class),
    }
}

fn dissect_struct(
    registry: &Registry,
    cursor: &mut Cursor,
    id: DefinitionId,
    fields: &[FieldDefinition],
) -> (Item, Option<DissectError>) {
    let start_offset = cursor.pos;
    let mut children = Vec::with_capacity(fields.len());
    let mut stopped: Option<DissectError> = None;

    for field in fields {
        let (item, error) = dissect_field(registry, cursor, field, &children);
        children.push(item);
        if error.is_some() {
            stopped = error;
            break;
        }
    }

    let item = Item {
        name: String::new(),
        definition: id,
        offset: start_offset,
        value: None,
        children,
        error: stopped.as_ref().map(error_marker),
    };
    (item, stopped)
}

fn dissect_field(
    registry: &Registry,
    cursor: &mut Cursor,
    field: &FieldDefinition,
    siblings: &[Item],
) -> (Item, Option<DissectError>) {
    let Some(definition) = field.definition else {
        let diag = Diagnostic::new(DiagnosticKind::UnresolvedTypeReference {
            field: field.name.clone(),
            type_name: "<unresolved>".to_string(),
        });
        let item = Item {
            name: field.name.clone(),
            definition: DefinitionId(0),
            offset: cursor.pos,
            value: None,
            children: Vec::new(),
            error: Some(ItemError::Schema(diag.to_string())),
        };
        return (item, Some(DissectError::Schema(diag)));
    };

    match &field.length {
        Some(length_expr) => {
            let start_offset = cursor.pos;
            let count = match length_expr.eval(siblings) {
                Ok(n) if n >= 0 => n as usize,
                Ok(negative) => {
                    let diag = Diagnostic::new(DiagnosticKind::MalformedExpression {
                        reason: format!("list length evaluated to negative value {negative}"),
                    });
                    return schema_error_item(&field.name, start_offset, diag);
                }
                Err(eval_err) => {
                    let diag = Diagnostic::new(DiagnosticKind::MalformedExpression {
                        reason: eval_err.to_string(),
                    });
                    return schema_error_item(&field.name, start_offset, diag);
                }
            };

            let mut children = Vec::with_capacity(count);
            let mut stopped = None;
            for i in 0..count {
                let (mut item, error) = dissect_definition(registry, cursor, definition, &[]);
                item.name = format!("[{i}]");
                children.push(item);
                if error.is_some() {
                    stopped = error;
                    break;
                }
            }

            let item = Item {
                name: field.name.clone(),
                definition,
                offset: start_offset,
                value: None,
                children,
                error: stopped.as_ref().map(error_marker),
            };
            (item, stopped)
        }
        None => {
            let (mut item, error) = dissect_definition(registry, cursor, definition, siblings);
            item.name = field.name.clone();
            (item, error)
        }
    }
}

fn dissect_primitive(
    cursor: &mut Cursor,
    id: DefinitionId,
    size: usize,
    class: PrimitiveClass,
) -> (Item, Option<DissectError>) {
    let offset = cursor.pos;
    let Some(bytes) = cursor.take(size) else {
        let item = Item {
            name: String::new(),
            definition: id,
            offset,
            value: None,
            children: Vec::new(),
            error: Some(ItemError::Truncated),
        };
        return (item, Some(DissectError::Truncated));
    };

    let value = decode_scalar(bytes, class, cursor.needs_byteswap);
    (Item::leaf(String::new(), id, offset, value), None)
}

/// Decodes a primitive byte slice, reversing it first when the peer's byte
/// order disagrees with the host's (single-byte values need no reordering).
fn decode_scalar(bytes: &[u8], class: PrimitiveClass, needs_byteswap: bool) -> ScalarValue {
    let mut buf = [0u8; 8];
    if needs_byteswap && bytes.len() > 1 {
        for (dst, src) in buf.iter_mut().zip(bytes.iter().rev()) {
            *dst = *src;
        }
    } else {
        buf[..bytes.len()].copy_from_slice(bytes);
    }
    match class {
        PrimitiveClass::Boolean => ScalarValue::Bool(bytes[0] != 0),
        PrimitiveClass::Char => ScalarValue::Char(bytes[0]),
        PrimitiveClass::Signed => {
            let signed = match bytes.len() {
                1 => bytes[0] as i8 as i64,
                2 => i16::from_ne_bytes([buf[0], buf[1]]) as i64,
                4 => i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]) as i64,
                _ => unreachable!("primitives are 1, 2, or 4 bytes"),
            };
            ScalarValue::Signed(signed)
        }
        PrimitiveClass::Unsigned => {
            let unsigned = match bytes.len() {
                1 => bytes[0] as u64,
                2 => u16::from_ne_bytes([buf[0], buf[1]]) as u64,
                4 => u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]) as u64,
                _ => unreachable!("primitives are 1, 2, or 4 bytes"),
            };
            ScalarValue::Unsigned(unsigned)
        }
    }
}

fn schema_error_item(name: &str, offset: usize, diag: Diagnostic) -> (Item, Option<DissectError>) {
    let item = Item {
        name: name.to_string(),
        definition: DefinitionId(0),
        offset,
        value: None,
        children: Vec::new(),
        error: Some(ItemError::Schema(diag.to_string())),
    };
    (item, Some(DissectError::Schema(diag)))
}

fn error_marker(error: &DissectError) -> ItemError {
    match error {
        DissectError::Truncated => ItemError::Truncated,
        DissectError::Schema(diag) => ItemError::Schema(diag.to_string()),
    }
}
