//! Statement printer that prefers symbolic values over syntax.
//!
//! A conventional recursive C pretty-printer with one twist: before printing
//! any expression syntactically, it asks the program state for the
//! expression's evaluated value and, if that value is informative, renders
//! the value instead and stops recursing into the sub-expression.

use crate::ast::{Expr, ExprKind, Stmt, UnOp, VarDecl};
use crate::engine::ProgramState;

pub struct SymStmtPrinter<'a> {
    out: &'a mut String,
    state: &'a ProgramState,
    /// Rendering an addressable position: prefer the bare symbol over the
    /// full value, and refuse to substitute symbols with no binding yet.
    is_lvalue: bool,
    indent: usize,
}

impl<'a> SymStmtPrinter<'a> {
    pub fn new(out: &'a mut String, state: &'a ProgramState, is_lvalue: bool) -> Self {
        Self {
            out,
            state,
            is_lvalue,
            indent: 0,
        }
    }

    /// Substitution guard, run at the entry of every expression visit.
    /// Returns true when a symbolic rendering was written and the caller
    /// must not print the node syntactically.
    fn try_eval_sym(&mut self, expr: &Expr) -> bool {
        let val = self.state.sval(expr);
        if val.is_unknown_or_undef() {
            return false;
        }

        if self.is_lvalue {
            if let Some(sym) = val.as_symbol() {
                // A symbol conjured on this very step has no prior binding
                // and conveys nothing; keep the source spelling instead.
                if sym.is_conjured() {
                    return false;
                }
                self.out.push_str(&sym.to_string());
                return true;
            }
        }

        // Region-backed locations render as a bare region name, which is
        // strictly less readable than the expression itself.
        if val.is_region_loc() {
            return false;
        }

        self.out.push_str(&val.to_string());
        true
    }

    pub fn print_expr(&mut self, expr: &Expr) {
        // Size-of keeps its syntactic form: the type/size being asked about
        // is the whole point of the expression.
        let exempt = matches!(
            expr.kind,
            ExprKind::SizeOfType(_) | ExprKind::SizeOfExpr(_)
        );
        if !exempt && self.try_eval_sym(expr) {
            return;
        }

        match &expr.kind {
            ExprKind::IntLit(v) => self.word(&v.to_string()),
            ExprKind::StrLit(s) => {
                self.out.push('"');
                self.out.push_str(s);
                self.out.push('"');
            }
            ExprKind::DeclRef(name) => self.word(name),
            ExprKind::Paren(sub) => {
                self.out.push('(');
                self.print_expr(sub);
                self.out.push(')');
            }
            ExprKind::Unary { op, sub } => {
                if op.is_postfix() {
                    self.print_expr(sub);
                    self.word(op.as_str());
                } else {
                    self.word(op.as_str());
                    // '-(-x)' must not print as '--x'
                    if matches!(op, UnOp::Plus | UnOp::Minus)
                        && matches!(sub.kind, ExprKind::Unary { .. })
                    {
                        self.out.push(' ');
                    }
                    self.print_expr(sub);
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.print_expr(lhs);
                self.word(&format!(" {op} "));
                self.print_expr(rhs);
            }
            ExprKind::Conditional { cond, then, els } => {
                self.print_expr(cond);
                self.word(" ? ");
                self.print_expr(then);
                self.word(" : ");
                self.print_expr(els);
            }
            ExprKind::Call { callee, args } => {
                match expr.callee_name() {
                    Some(name) => self.word(name),
                    None => self.print_expr(callee),
                }
                self.out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.word(", ");
                    }
                    self.print_expr(arg);
                }
                self.out.push(')');
            }
            ExprKind::Member { base, field, arrow } => {
                self.print_expr(base);
                self.word(if *arrow { "->" } else { "." });
                self.word(field);
            }
            ExprKind::Index { base, index } => {
                self.print_expr(base);
                self.out.push('[');
                self.print_expr(index);
                self.out.push(']');
            }
            // The value, not the conversion, is what downstream consumers
            // parse; casts print as their operand.
            ExprKind::Cast { sub, .. } => self.print_expr(sub),
            ExprKind::SizeOfType(ty) => self.word(&format!("sizeof({ty})")),
            ExprKind::SizeOfExpr(sub) => {
                self.word("sizeof ");
                self.print_expr(sub);
            }
        }
    }

    pub fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Null => self.line(";"),
            Stmt::Compound(_) => {
                self.do_indent();
                self.print_raw_compound(stmt);
                self.out.push('\n');
            }
            Stmt::Decl(decl) => {
                self.do_indent();
                self.print_raw_decl(decl);
                self.out.push_str(";\n");
            }
            Stmt::Expr(expr) => {
                self.do_indent();
                self.print_expr(expr);
                self.out.push_str(";\n");
            }
            Stmt::If { .. } => {
                self.do_indent();
                self.print_raw_if(stmt);
            }
            Stmt::While { cond, body } => {
                self.do_indent();
                self.out.push_str("while (");
                self.print_expr(cond);
                self.out.push_str(")\n");
                self.print_substmt(body);
            }
            Stmt::Return(expr) => {
                self.do_indent();
                self.out.push_str("return");
                if let Some(expr) = expr {
                    self.out.push(' ');
                    self.print_expr(expr);
                }
                self.out.push_str(";\n");
            }
            Stmt::Break => self.line("break;"),
            Stmt::Continue => self.line("continue;"),
        }
    }

    fn print_raw_compound(&mut self, stmt: &Stmt) {
        let Stmt::Compound(stmts) = stmt else {
            unreachable!("print_raw_compound on non-compound statement");
        };
        self.out.push_str("{\n");
        self.indent += 1;
        for s in stmts {
            self.print_stmt(s);
        }
        self.indent -= 1;
        self.do_indent();
        self.out.push('}');
    }

    fn print_raw_decl(&mut self, decl: &VarDecl) {
        self.word(&format!("{} {}", decl.ty, decl.name));
        if let Some(init) = &decl.init {
            self.word(" = ");
            self.print_expr(init);
        }
    }

    fn print_raw_if(&mut self, stmt: &Stmt) {
        let Stmt::If { cond, then, els } = stmt else {
            unreachable!("print_raw_if on non-if statement");
        };
        self.out.push_str("if (");
        self.print_expr(cond);
        self.out.push(')');

        if matches!(**then, Stmt::Compound(_)) {
            self.out.push(' ');
            self.print_raw_compound(then);
            self.out.push(if els.is_some() { ' ' } else { '\n' });
        } else {
            self.out.push('\n');
            self.print_substmt(then);
            if els.is_some() {
                self.do_indent();
            }
        }

        if let Some(els) = els {
            self.out.push_str("else");
            match &**els {
                Stmt::Compound(_) => {
                    self.out.push(' ');
                    self.print_raw_compound(els);
                    self.out.push('\n');
                }
                Stmt::If { .. } => {
                    self.out.push(' ');
                    self.print_raw_if(els);
                }
                _ => {
                    self.out.push('\n');
                    self.print_substmt(els);
                }
            }
        }
    }

    fn print_substmt(&mut self, stmt: &Stmt) {
        self.indent += 1;
        self.print_stmt(stmt);
        self.indent -= 1;
    }

    fn line(&mut self, text: &str) {
        self.do_indent();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn do_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn word(&mut self, text: &str) {
        self.out.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, CType, SourceLoc};
    use crate::engine::{Loc, MemRegion, SVal, SymExpr, SymbolId};

    fn loc() -> SourceLoc {
        SourceLoc::new("t.c", 1, 1)
    }

    fn expr(id: u32, kind: ExprKind) -> Expr {
        let mut e = Expr::new(loc(), kind);
        e.id = id;
        e
    }

    fn render(state: &ProgramState, e: &Expr, is_lvalue: bool) -> String {
        let mut out = String::new();
        SymStmtPrinter::new(&mut out, state, is_lvalue).print_expr(e);
        out
    }

    #[test]
    fn test_syntactic_fallback_without_bindings() {
        let call = expr(
            1,
            ExprKind::Call {
                callee: Box::new(expr(2, ExprKind::DeclRef("foo".into()))),
                args: vec![expr(3, ExprKind::IntLit(7))],
            },
        );
        let state = ProgramState::new();
        assert_eq!(render(&state, &call, true), "foo(7)");
    }

    #[test]
    fn test_symbol_substitution_stops_recursion() {
        let inner = expr(2, ExprKind::DeclRef("x".into()));
        let sum = expr(
            1,
            ExprKind::Binary {
                op: BinOp::Add,
                lhs: Box::new(inner.clone()),
                rhs: Box::new(expr(3, ExprKind::IntLit(1))),
            },
        );
        let state = ProgramState::new().bind(
            &sum,
            SVal::sym(SymExpr::Region {
                id: SymbolId(0),
                name: "x".into(),
            }),
        );
        // the whole sum has a value: neither `x` nor `1` appears
        assert_eq!(render(&state, &sum, true), "reg_$0<x>");
    }

    #[test]
    fn test_conjured_symbol_keeps_source_spelling_in_lvalue_mode() {
        let x = expr(1, ExprKind::DeclRef("x".into()));
        let conj = SVal::sym(SymExpr::Conjured {
            id: SymbolId(5),
            ty: CType::Int,
        });
        let state = ProgramState::new().bind(&x, conj);
        assert_eq!(render(&state, &x, true), "x");
        // rvalue mode has no use for the spelling; the value wins
        assert_eq!(render(&state, &x, false), "conj_$5{int}");
    }

    #[test]
    fn test_region_loc_workaround() {
        let buf = expr(1, ExprKind::DeclRef("buf".into()));
        let state =
            ProgramState::new().bind(&buf, SVal::Loc(Loc::Region(MemRegion::Var("buf".into()))));
        assert_eq!(render(&state, &buf, true), "buf");
        assert_eq!(render(&state, &buf, false), "buf");
    }

    #[test]
    fn test_sizeof_is_exempt_from_substitution() {
        let so = expr(1, ExprKind::SizeOfType(CType::Long));
        let state = ProgramState::new().bind(&so, SVal::NonLoc(crate::engine::NonLoc::ConcreteInt(8)));
        assert_eq!(render(&state, &so, false), "sizeof(long)");
    }

    #[test]
    fn test_cast_prints_operand_only() {
        let cast = expr(
            1,
            ExprKind::Cast {
                ty: CType::Void.ptr_to(),
                sub: Box::new(expr(2, ExprKind::DeclRef("p".into()))),
            },
        );
        assert_eq!(render(&ProgramState::new(), &cast, false), "p");
    }

    #[test]
    fn test_statement_printing() {
        let body = Stmt::Compound(vec![
            Stmt::Decl(VarDecl {
                name: "fd".into(),
                ty: CType::Int,
                init: Some(expr(1, ExprKind::IntLit(0))),
            }),
            Stmt::If {
                cond: expr(
                    2,
                    ExprKind::Binary {
                        op: BinOp::Lt,
                        lhs: Box::new(expr(3, ExprKind::DeclRef("fd".into()))),
                        rhs: Box::new(expr(4, ExprKind::IntLit(0))),
                    },
                ),
                then: Box::new(Stmt::Return(Some(expr(5, ExprKind::IntLit(-1))))),
                els: None,
            },
            Stmt::Return(None),
        ]);
        let mut out = String::new();
        let state = ProgramState::new();
        SymStmtPrinter::new(&mut out, &state, false).print_stmt(&body);
        assert_eq!(
            out,
            "{\n  int fd = 0;\n  if (fd < 0)\n    return -1;\n  return;\n}\n"
        );
    }
}
