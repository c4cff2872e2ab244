use std::io::Write;
use xamine::wire::{compile_sources, examine, Conversation, ConversationFlags, Direction, ScalarValue};

const CORE_SCHEMA: &str = r#"<xcb header="xproto">
    <event name="KeyPress" number="2">
        <field name="detail" type="BYTE" />
        <field name="root" type="CARD32" />
    </event>
    <error name="Value" number="2">
        <field name="bad_value" type="CARD32" />
    </error>
    <struct name="EVENT">
        <field name="pad" type="CARD8" />
    </struct>
</xcb>"#;

fn core_conversation() -> Conversation {
    let (ctx, diagnostics) = compile_sources(&[("xproto", CORE_SCHEMA)]);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    Conversation::new(ctx, ConversationFlags::default()).expect("conversation opens")
}

// Canonical X11 event layout: response_type, detail (first declared field),
// sequence, ...  `buf[1]` is detail; `buf[2..4]` is the little-endian
// sequence number.
fn keypress_buffer(send_event: bool) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[0] = if send_event { 2 | 0x80 } else { 2 };
    buf[1] = 0x09; // detail: keycode for Escape
    buf[2] = 0x01; // sequence low byte
    buf[3] = 0x00; // sequence high byte
    buf
}

#[test]
fn core_keypress_decodes_expected_field_tree() {
    let conversation = core_conversation();
    let buffer = keypress_buffer(false);

    let outcome = examine(&conversation, Direction::Response, &buffer).expect("KeyPress decodes");
    assert!(outcome.error.is_none());

    let root = outcome.item;
    assert_eq!(root.children[0].name, "response_type");
    assert_eq!(root.children[0].value, Some(ScalarValue::Unsigned(2)));
    assert_eq!(root.children[1].name, "detail");
    assert_eq!(root.children[1].value, Some(ScalarValue::Unsigned(9)));
    assert_eq!(root.children[2].name, "sequence");
    assert_eq!(root.children[2].value, Some(ScalarValue::Unsigned(1)));
}

#[test]
fn send_event_bit_is_masked_off_before_event_lookup() {
    let conversation = core_conversation();
    let buffer = keypress_buffer(true);

    let outcome = examine(&conversation, Direction::Response, &buffer).expect("KeyPress decodes");
    assert!(outcome.error.is_none());
    // response_type keeps the raw byte, SendEvent bit included.
    assert_eq!(outcome.item.children[0].value, Some(ScalarValue::Unsigned(0x82)));
}

#[test]
fn error_response_dissects_against_the_matching_error_definition() {
    // "error" tags are explicitly reserved/no-op; no core_errors slot is
    // populated, so an error-shaped response yields no match.
    let conversation = core_conversation();
    let mut buffer = [0u8; 32];
    buffer[0] = 0; // error
    buffer[1] = 2; // Value error code
    assert!(examine(&conversation, Direction::Response, &buffer).is_none());
}

#[test]
fn truncated_root_buffer_yields_none() {
    let conversation = core_conversation();
    let buffer = [2u8; 16]; // well under the 32-byte minimum response size
    assert!(examine(&conversation, Direction::Response, &buffer).is_none());
}

#[test]
fn truncated_field_yields_partial_tree_with_error_marker() {
    // The 32-byte minimum satisfies the root-level check, but this event's
    // list asks for far more elements than the buffer actually carries.
    let xml = r#"<xcb header="xproto">
        <event name="Listy" number="5">
            <field name="count" type="CARD8" />
            <list name="items" type="CARD32">
                <fieldref>count</fieldref>
            </list>
        </event>
    </xcb>"#;
    let (ctx, diagnostics) = compile_sources(&[("xproto", xml)]);
    assert!(diagnostics.is_empty());
    let conversation = Conversation::new(ctx, ConversationFlags::default()).unwrap();

    // Layout: response_type, count (first declared field), sequence, items.
    let mut buffer = vec![5u8, 200, 0, 0]; // count = 200, far more CARD32s than fit
    buffer.resize(32, 0);
    let outcome = examine(&conversation, Direction::Response, &buffer).expect("header present");
    assert!(outcome.error.is_some());
    assert!(!outcome.item.is_complete());
}

#[test]
fn list_length_resolves_against_an_earlier_sibling_field() {
    let xml = r#"<xcb header="xproto">
        <event name="Listy" number="6">
            <field name="count" type="CARD8" />
            <list name="items" type="CARD8">
                <fieldref>count</fieldref>
            </list>
        </event>
    </xcb>"#;
    let (ctx, diagnostics) = compile_sources(&[("xproto", xml)]);
    assert!(diagnostics.is_empty());
    let conversation = Conversation::new(ctx, ConversationFlags::default()).unwrap();

    // Layout: response_type, count (first declared field), sequence, items.
    let mut buffer = vec![6u8, 3, 0, 0, 10, 20, 30];
    buffer.resize(32, 0);
    let outcome = examine(&conversation, Direction::Response, &buffer).expect("decodes");
    assert!(outcome.error.is_none());
    let items_field = &outcome.item.children[3];
    assert_eq!(items_field.children.len(), 3);
    assert_eq!(items_field.children[1].value, Some(ScalarValue::Unsigned(20)));
}

#[test]
fn peer_endianness_opposite_host_triggers_byte_swap() {
    let xml = r#"<xcb header="xproto">
        <event name="Wide" number="7">
            <field name="value" type="CARD32" />
        </event>
    </xcb>"#;
    let (ctx, diagnostics) = compile_sources(&[("xproto", xml)]);
    assert!(diagnostics.is_empty());

    let conversation =
        Conversation::with_endianness(ctx, ConversationFlags::default(), !cfg!(target_endian = "little"))
            .unwrap();

    // Layout: response_type, value (first declared field), sequence.
    let mut buffer = vec![7u8]; // response_type
    // 1, encoded in the byte order opposite the host's.
    if cfg!(target_endian = "little") {
        buffer.extend([0, 0, 0, 1]);
    } else {
        buffer.extend([1, 0, 0, 0]);
    }
    buffer.extend([0, 0]); // sequence
    buffer.resize(32, 0);

    let outcome = examine(&conversation, Direction::Response, &buffer).expect("decodes");
    assert!(outcome.error.is_none());
    assert_eq!(outcome.item.children[1].value, Some(ScalarValue::Unsigned(1)));
}

#[test]
fn schema_read_from_an_on_disk_fixture_compiles_cleanly() {
    let mut fixture = tempfile::Builder::new()
        .suffix(".xml")
        .tempfile()
        .expect("create fixture file");
    fixture.write_all(CORE_SCHEMA.as_bytes()).expect("write fixture");

    let text = std::fs::read_to_string(fixture.path()).expect("read fixture back");
    let (ctx, diagnostics) = compile_sources(&[("xproto.xml", &text)]);
    assert!(diagnostics.is_empty());
    assert!(ctx.registry().lookup("KeyPress").is_some());
}
