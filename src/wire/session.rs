use crate::wire::context::Context;
use crate::wire::model::DefinitionId;
use parking_lot::Mutex;
use std::rc::Rc;

/// Flags a caller can request when opening a [`Conversation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversationFlags {
    /// Reserved: no flag is currently defined, matching the reference
    /// implementation's empty `xamine_conversation_flags` enum.
    pub _reserved: (),
}

#[derive(Debug, Default)]
struct DynamicTables {
    /// opcode -> index into the bound Context's extension list
    opcodes: Vec<(u8, usize)>,
    events: Vec<Option<DefinitionId>>,
    errors: Vec<Option<DefinitionId>>,
}

impl DynamicTables {
    fn new() -> DynamicTables {
        DynamicTables {
            opcodes: Vec::new(),
            // Indexed by absolute wire code (events: 64..127, errors: 128..255),
            // matching register_extension/lookup_event/lookup_error below.
            events: vec![None; 128],
            errors: vec![None; 256],
        }
    }
}

struct ConversationInner {
    context: Context,
    peer_is_little_endian: bool,
    dynamic: Mutex<DynamicTables>,
}

/// Per-connection dissection state: which [`Context`] it is bound to, the
/// peer's byte order, and the dynamic extension opcode/event/error tables
/// built up as extensions are negotiated on this connection.
///
/// The table mutations are guarded by a lock even though this crate never
/// drives them from more than one thread, so a `Conversation` may still be
/// safely shared across threads by an embedder that does.
#[derive(Clone)]
pub struct Conversation(Rc<ConversationInner>);

impl Conversation {
    /// Opens a conversation bound to `context`, defaulting to host
    /// endianness. The real negotiation mechanism (reading the peer's
    /// connection-setup byte) is outside this crate's scope; use
    /// [`Conversation::with_endianness`] once the peer's byte order is known.
    pub fn new(context: Context, _flags: ConversationFlags) -> Option<Conversation> {
        Some(Conversation(Rc::new(ConversationInner {
            context,
            peer_is_little_endian: cfg!(target_endian = "little"),
            dynamic: Mutex::new(DynamicTables::new()),
        })))
    }

    pub fn with_endianness(
        context: Context,
        _flags: ConversationFlags,
        peer_is_little_endian: bool,
    ) -> Option<Conversation> {
        Some(Conversation(Rc::new(ConversationInner {
            context,
            peer_is_little_endian,
            dynamic: Mutex::new(DynamicTables::new()),
        })))
    }

    pub fn context(&self) -> &Context {
        &self.0.context
    }

    pub fn peer_is_little_endian(&self) -> bool {
        self.0.peer_is_little_endian
    }

    /// Registers an extension's negotiated opcode, copying its event/error
    /// tables into this conversation's code-indexed slots (events at 64+,
    /// errors at 128+), so later lookups by wire code succeed.
    pub fn register_extension(&self, opcode: u8, xname: &str) -> bool {
        let Some(extension) = self.0.context.find_extension(xname) else {
            return false;
        };
        let index = self
            .0
            .context
            .extensions()
            .iter()
            .position(|e| e.xname == xname)
            .unwrap();

        let mut dynamic = self.0.dynamic.lock();
        dynamic.opcodes.push((opcode, index));
        for &(number, definition) in &extension.events {
            let slot = 64 + number as usize;
            if slot < dynamic.events.len() {
                dynamic.events[slot] = Some(definition);
            }
        }
        for &(code, definition) in &extension.errors {
            let slot = 128 + code as usize;
            if slot < dynamic.errors.len() {
                dynamic.errors[slot] = Some(definition);
            }
        }
        true
    }

    pub fn lookup_event(&self, code: u8) -> Option<DefinitionId> {
        if (code as usize) < 64 {
            self.0.context.core_event(code as u32)
        } else {
            self.0.dynamic.lock().events.get(code as usize).copied().flatten()
        }
    }

    pub fn lookup_error(&self, code: u8) -> Option<DefinitionId> {
        if (code as usize) < 128 {
            self.0.context.core_error(code as u32)
        } else {
            self.0.dynamic.lock().errors.get(code as usize).copied().flatten()
        }
    }

    pub fn acquire(&self) -> Conversation {
        self.clone()
    }

    pub fn release(self) {
        drop(self);
    }
}
