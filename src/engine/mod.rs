//! Engine-side data model consumed by the trace core.
//!
//! The path-sensitive exploration loop itself lives in the analysis engine;
//! this module only defines the values it hands to our callbacks: symbols
//! and symbolic expressions, loc/nonloc values, the persistent program state
//! with its constraint store, and the exploded graph of visited states.

use std::fmt::{self, Display};
use std::sync::Arc;

use crate::ast::{BinOp, CType};

pub mod graph;
pub mod state;

pub use graph::{ExplodedGraph, NodeId};
pub use state::{ConstraintStore, LocationContext, ProgramState, RangeSet};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Symbolic expression tree. Leaf symbols stand for unknown runtime values;
/// interior nodes are comparisons/arithmetic the engine built on top of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymExpr {
    /// Plain data symbol, `$1`.
    Data(SymbolId),
    /// Value a memory region held at function entry, `reg_$0<x>`.
    Region { id: SymbolId, name: String },
    /// Symbol conjured for an otherwise untracked result, `conj_$2{int}`.
    Conjured { id: SymbolId, ty: CType },
    /// Symbol compared/combined with an integer literal, `(reg_$0<x>) == 1`.
    SymInt {
        lhs: Arc<SymExpr>,
        op: BinOp,
        rhs: i64,
    },
    /// Symbol combined with another symbol.
    SymSym {
        lhs: Arc<SymExpr>,
        op: BinOp,
        rhs: Arc<SymExpr>,
    },
}

impl SymExpr {
    pub fn is_conjured(&self) -> bool {
        matches!(self, Self::Conjured { .. })
    }
}

impl Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(id) => write!(f, "{id}"),
            Self::Region { id, name } => write!(f, "reg_{id}<{name}>"),
            Self::Conjured { id, ty } => write!(f, "conj_{id}{{{ty}}}"),
            Self::SymInt { lhs, op, rhs } => write!(f, "({lhs}) {op} {rhs}"),
            Self::SymSym { lhs, op, rhs } => write!(f, "({lhs}) {op} ({rhs})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemRegion {
    Var(String),
    Field { base: Box<MemRegion>, field: String },
    Element { base: Box<MemRegion>, index: i64 },
}

impl Display for MemRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "{name}"),
            Self::Field { base, field } => write!(f, "{base}.{field}"),
            Self::Element { base, index } => write!(f, "{base}[{index}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loc {
    ConcreteInt(u64),
    Region(MemRegion),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NonLoc {
    ConcreteInt(i64),
    Symbol(Arc<SymExpr>),
}

/// Value the engine computed for an expression, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum SVal {
    Unknown,
    Undefined,
    Loc(Loc),
    NonLoc(NonLoc),
}

impl SVal {
    pub fn sym(expr: SymExpr) -> Self {
        Self::NonLoc(NonLoc::Symbol(Arc::new(expr)))
    }

    pub fn is_unknown_or_undef(&self) -> bool {
        matches!(self, Self::Unknown | Self::Undefined)
    }

    pub fn as_symbol(&self) -> Option<&Arc<SymExpr>> {
        match self {
            Self::NonLoc(NonLoc::Symbol(sym)) => Some(sym),
            _ => None,
        }
    }

    /// Locations backed by a plain memory region render as a bare region
    /// name, which carries no information the syntactic form doesn't.
    pub fn is_region_loc(&self) -> bool {
        matches!(self, Self::Loc(Loc::Region(_)))
    }
}

impl Display for SVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Undefined => write!(f, "Undefined"),
            Self::Loc(Loc::ConcreteInt(v)) => write!(f, "{v}"),
            Self::Loc(Loc::Region(r)) => write!(f, "&{r}"),
            Self::NonLoc(NonLoc::ConcreteInt(v)) => write!(f, "{v}"),
            Self::NonLoc(NonLoc::Symbol(sym)) => write!(f, "{sym}"),
        }
    }
}
