//! Constraint extraction: "what does the store currently know about this
//! symbol", serialized as `<symbol>@=<constraint-text>`.

use std::sync::Arc;

use crate::engine::{ProgramState, SymExpr};
use crate::trace::event::OP_CONSTRAINT;

/// None when the store has nothing to say about `sym`; the caller then
/// appends no event at all.
pub fn extract_constraint(state: &ProgramState, sym: &Arc<SymExpr>) -> Option<String> {
    let mut cond = String::new();
    state.constraints().print_symbol_cond(sym, &mut cond);
    if cond.is_empty() {
        return None;
    }
    Some(format!("{sym}{OP_CONSTRAINT}{cond}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{RangeSet, SymbolId};

    #[test]
    fn test_extract_constraint() {
        let sym = Arc::new(SymExpr::Region {
            id: SymbolId(0),
            name: "fd".into(),
        });
        let state = ProgramState::new();
        assert_eq!(extract_constraint(&state, &sym), None);

        let state = state.constrain(sym.clone(), RangeSet(vec![(-1, -1), (3, 3)]));
        assert_eq!(
            extract_constraint(&state, &sym).as_deref(),
            Some("reg_$0<fd>@={ [-1, -1], [3, 3] }")
        );
    }
}
