//! The trace core: per-state event logs, engine callbacks, and the
//! deduplicating exploded-graph traversal that serializes the final report.

use crate::ast::{CType, Expr, Scope};
use crate::engine::{ExplodedGraph, LocationContext, NodeId, ProgramState, SVal, SymExpr};

pub mod constraints;
pub mod event;
pub mod printer;

pub use event::{EventKind, EventList, PathEvent};

use constraints::extract_constraint;
use printer::SymStmtPrinter;

pub const REPORT_BEGIN: &str = "\n@SYM_EXEC_EXTRACTOR_BEGIN\n";
pub const REPORT_END: &str = "\n@SYM_EXEC_EXTRACTOR_END\n";

/// Compiler hints that forward their argument unchanged; recording them as
/// calls would only add noise to every branch-heavy path.
const NOOP_BUILTINS: &[&str] = &["__builtin_expect"];

/// Engine state plus the event log accumulated along the path to it.
/// Appending shares the engine state, so derived states are cheap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceState {
    pub core: ProgramState,
    pub events: EventList,
}

impl TraceState {
    pub fn new(core: ProgramState) -> Self {
        Self {
            core,
            events: EventList::new(),
        }
    }

    #[must_use]
    pub fn add_event(&self, event: PathEvent) -> Self {
        Self {
            core: self.core.clone(),
            events: self.events.add(event),
        }
    }
}

/// What the engine hands our callbacks at each hook point.
pub struct CheckerCtx<'a> {
    pub state: &'a TraceState,
    pub lctx: &'a LocationContext,
    pub scope: &'a Scope,
}

#[derive(Debug, Default)]
pub struct TraceCollector;

impl TraceCollector {
    pub fn new() -> Self {
        Self
    }

    /// Assume hook. Appends a constraint event only for the narrow shape we
    /// can say something about: a symbol compared against an integer
    /// literal, where the store knows the left-hand symbol. Everything else
    /// passes through unchanged.
    pub fn eval_assume(
        &self,
        state: TraceState,
        cond: &SVal,
        _assumption: bool,
    ) -> TraceState {
        if let Some(sym) = cond.as_symbol() {
            if let SymExpr::SymInt { lhs, .. } = &**sym {
                if let Some(serialized) = extract_constraint(&state.core, lhs) {
                    return state.add_event(PathEvent::assume(serialized));
                }
            }
        }
        state
    }

    /// Post-call hook. Records every call except no-op builtins.
    pub fn check_post_call(&self, ctx: &CheckerCtx, call: &Expr) -> TraceState {
        if let Some(name) = call.callee_name() {
            if NOOP_BUILTINS.contains(&name) {
                return ctx.state.clone();
            }
        }
        ctx.state.add_event(call_event(ctx, call))
    }

    /// End-of-function hook. Only the outermost frame ends a path; returns
    /// from inlined frames continue in the caller.
    pub fn check_end_function(&self, ctx: &CheckerCtx) -> TraceState {
        if !ctx.lctx.in_top_frame() {
            return ctx.state.clone();
        }
        ctx.state.add_event(PathEvent::eop())
    }

    /// End-of-analysis hook: reduce the finished graph to the report.
    pub fn check_end_analysis(&self, graph: &ExplodedGraph<TraceState>) -> String {
        log::debug!(
            "emitting report: {} roots, {} nodes",
            graph.roots().len(),
            graph.len()
        );
        let mut out = String::new();
        out.push_str(REPORT_BEGIN);
        let mut visited = Vec::new();
        for &root in graph.roots() {
            out.push_str("<TREE>\n");
            dump_tree(&mut out, graph, &mut visited, root, None);
            out.push_str("</TREE>\n");
        }
        out.push_str(REPORT_END);
        out
    }
}

/// Payload for a call event, in preference order: the call result's symbolic
/// value; an indirect-call marker when the callee is an unresolvable
/// pointer; the syntactic call text otherwise.
fn call_event(ctx: &CheckerCtx, call: &Expr) -> PathEvent {
    let code = call.loc.without_column();
    let payload = match ctx.state.core.sval(call).as_symbol() {
        Some(sym) => sym.to_string(),
        None => match indirect_callee_type(ctx.scope, call) {
            Some(ty) => format!("# indirect call: {ty}"),
            None => {
                let mut text = String::new();
                SymStmtPrinter::new(&mut text, &ctx.state.core, true).print_expr(call);
                text
            }
        },
    };
    PathEvent::call(code, payload)
}

/// The callee's declared type, when the call goes through a function
/// pointer that no resolution strategy can pin down. Direct calls (names
/// not bound to a pointer in scope) return None.
fn indirect_callee_type<'a>(scope: &'a Scope, call: &Expr) -> Option<&'a CType> {
    let name = call.callee_name()?;
    match scope.lookup(name) {
        Some(ty @ CType::Ptr(_)) => Some(ty),
        _ => None,
    }
}

/// Depth-first report emission with suffix deduplication.
///
/// `visited` is a path-local cycle guard: pushed on entry, popped on every
/// exit, so a node may validly reappear on a sibling path. A node is worth
/// emitting iff its log is non-empty and differs from the last log that
/// produced output (`prev`); invalid nodes recurse without advancing `prev`,
/// so a later descendant still diffs against the last actual emitter.
fn dump_tree(
    out: &mut String,
    graph: &ExplodedGraph<TraceState>,
    visited: &mut Vec<NodeId>,
    cur: NodeId,
    prev: Option<NodeId>,
) {
    if visited.contains(&cur) {
        return;
    }
    visited.push(cur);

    let cur_events = &graph.node(cur).state.events;
    let valid = !cur_events.is_empty()
        && match prev {
            None => true,
            Some(prev) => graph.node(prev).state.events != *cur_events,
        };

    if valid {
        out.push_str("<NODE>\n");
        // Logs grow one event per engine step, so the head is exactly the
        // event this node added.
        let newest = cur_events.head().expect("validity implies a non-empty log");
        out.push_str(&newest.as_string());
        out.push('\n');
    }

    let next_prev = if valid { Some(cur) } else { prev };
    for &succ in graph.succs(cur) {
        dump_tree(out, graph, visited, succ, next_prev);
    }

    if valid {
        out.push_str("</NODE>\n");
    }
    visited.pop();
}
