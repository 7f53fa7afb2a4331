//! Path events and the per-state event log.
//!
//! Events are immutable once built. The log is a persistent cons list: `add`
//! prepends, so the head is always the newest event and branching states
//! share their common prefix structurally.

use std::sync::Arc;

/// Separator between a symbol dump and its constraint text. Two characters
/// that survive XML escaping and can't appear inside either side.
pub const OP_CONSTRAINT: &str = "@=";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Call,
    Assume,
    Eop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEvent {
    kind: EventKind,
    /// "file:line" of the call site; empty for other kinds.
    code: String,
    /// Rendered payload: symbolic value dump, syntactic call text, or the
    /// serialized constraint.
    sv: String,
}

impl PathEvent {
    pub fn call(code: String, payload: String) -> Self {
        Self {
            kind: EventKind::Call,
            code,
            sv: payload,
        }
    }

    pub fn assume(serialized: String) -> Self {
        Self {
            kind: EventKind::Assume,
            code: String::new(),
            sv: serialized,
        }
    }

    pub fn eop() -> Self {
        Self {
            kind: EventKind::Eop,
            code: String::new(),
            sv: String::new(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    fn kind_tag(&self) -> &'static str {
        match self.kind {
            EventKind::Call => "@LOG_CALL",
            EventKind::Assume => "@LOG_ASSUME",
            EventKind::Eop => "@LOG_EOP",
        }
    }

    pub fn as_string(&self) -> String {
        let mut out = format!("<KIND>{}</KIND>", self.kind_tag());
        match self.kind {
            EventKind::Call => {
                out.push_str(&format!(
                    "<CODE>{}</CODE><CALL>{}</CALL>",
                    self.code,
                    encode_xml(&self.sv)
                ));
            }
            EventKind::Assume => {
                out.push_str(&format!("<COND>{}</COND>", encode_xml(&self.sv)));
            }
            EventKind::Eop => {}
        }
        out
    }
}

/// Payloads contain rendered comparisons, so bare `<`/`>`/`&` are common.
/// Ampersand must go first or it would re-escape the other replacements.
pub fn encode_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Debug, Clone, Default)]
pub struct EventList(Option<Arc<ListNode>>);

#[derive(Debug)]
struct ListNode {
    event: PathEvent,
    rest: EventList,
}

impl EventList {
    pub fn new() -> Self {
        Self(None)
    }

    /// Pure append: the receiver is unchanged, the new list's head is `event`.
    #[must_use]
    pub fn add(&self, event: PathEvent) -> Self {
        Self(Some(Arc::new(ListNode {
            event,
            rest: self.clone(),
        })))
    }

    /// Newest event, if any.
    pub fn head(&self) -> Option<&PathEvent> {
        self.0.as_deref().map(|node| &node.event)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Newest-first iteration.
    pub fn iter(&self) -> impl Iterator<Item = &PathEvent> {
        Iter(self.0.as_deref())
    }
}

struct Iter<'a>(Option<&'a ListNode>);

impl<'a> Iterator for Iter<'a> {
    type Item = &'a PathEvent;

    fn next(&mut self) -> Option<&'a PathEvent> {
        let node = self.0?;
        self.0 = node.rest.0.as_deref();
        Some(&node.event)
    }
}

impl PartialEq for EventList {
    /// Exact sequence equality. Shared tails (the common case for states on
    /// the same path) short-circuit on pointer identity.
    fn eq(&self, other: &Self) -> bool {
        let mut a = &self.0;
        let mut b = &other.0;
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(x, y) {
                        return true;
                    }
                    if x.event != y.event {
                        return false;
                    }
                    a = &x.rest.0;
                    b = &y.rest.0;
                }
                _ => return false,
            }
        }
    }
}

impl Eq for EventList {}
