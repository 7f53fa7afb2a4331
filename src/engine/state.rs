//! Persistent program state: environment bindings plus the constraint store.
//!
//! States are immutable values. Every "mutation" clones the underlying maps
//! behind fresh `Arc`s and leaves the original state untouched, which is what
//! lets exploded-graph nodes share state cheaply along a path.

use std::fmt::{self, Display};
use std::sync::Arc;

use crate::HashMap;
use crate::ast::{Expr, ExprId};
use crate::engine::{SVal, SymExpr};

/// Disjoint inclusive ranges still considered possible for a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSet(pub Vec<(i64, i64)>);

impl Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, (lo, hi)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[{lo}, {hi}]")?;
        }
        write!(f, " }}")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintStore {
    ranges: HashMap<Arc<SymExpr>, RangeSet>,
}

impl ConstraintStore {
    /// Writes everything currently known about `sym`; writes nothing if the
    /// store has no entry for it.
    pub fn print_symbol_cond(&self, sym: &SymExpr, out: &mut String) {
        if let Some(ranges) = self.ranges.get(sym) {
            out.push_str(&ranges.to_string());
        }
    }

    fn with(&self, sym: Arc<SymExpr>, ranges: RangeSet) -> Self {
        let mut next = self.clone();
        next.ranges.insert(sym, ranges);
        next
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramState {
    bindings: Arc<HashMap<ExprId, SVal>>,
    constraints: Arc<ConstraintStore>,
}

impl ProgramState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value the engine computed for `expr`, or `Unknown`.
    pub fn sval(&self, expr: &Expr) -> SVal {
        self.bindings
            .get(&expr.id)
            .cloned()
            .unwrap_or(SVal::Unknown)
    }

    pub fn bind(&self, expr: &Expr, val: SVal) -> Self {
        let mut bindings = (*self.bindings).clone();
        bindings.insert(expr.id, val);
        Self {
            bindings: Arc::new(bindings),
            constraints: self.constraints.clone(),
        }
    }

    pub fn constrain(&self, sym: Arc<SymExpr>, ranges: RangeSet) -> Self {
        Self {
            bindings: self.bindings.clone(),
            constraints: Arc::new(self.constraints.with(sym, ranges)),
        }
    }

    pub fn constraints(&self) -> &ConstraintStore {
        &self.constraints
    }

    /// True when both states point at the same underlying storage, i.e. one
    /// was derived from the other without touching bindings or constraints.
    pub fn shares_backing(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bindings, &other.bindings)
            && Arc::ptr_eq(&self.constraints, &other.constraints)
    }
}

/// Call frame the engine is currently exploring. Only the top frame emits
/// end-of-path events; inlined frames return to their caller instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationContext {
    pub function: String,
    depth: u32,
}

impl LocationContext {
    pub fn top(function: &str) -> Self {
        Self {
            function: function.to_owned(),
            depth: 0,
        }
    }

    pub fn inlined(function: &str, depth: u32) -> Self {
        Self {
            function: function.to_owned(),
            depth,
        }
    }

    pub fn in_top_frame(&self) -> bool {
        self.depth == 0
    }
}
