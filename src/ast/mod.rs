//! Model of the program under analysis: a closed set of C-like expression
//! and statement kinds, typed function declarations, and source locations.
//!
//! Modules are loaded from JSON. Expression ids are not part of the file
//! format; [`Module::number_exprs`] assigns them in a deterministic pre-order
//! pass so that engine-side environment bindings can key on them.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::HashMap;

/// Identity of an expression node within its module, for environment lookups.
pub type ExprId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub fn new(file: &str, line: u32, column: u32) -> Self {
        Self {
            file: file.to_owned(),
            line,
            column,
        }
    }

    /// Call events group paths by statement; the column would split
    /// textually-identical call sites apart.
    pub fn without_column(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

impl Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CType {
    Void,
    Char,
    Int,
    UInt,
    Long,
    ULong,
    Named(String),
    Ptr(Box<CType>),
    Func { ret: Box<CType>, params: Vec<CType> },
}

impl CType {
    pub fn ptr_to(self) -> Self {
        Self::Ptr(Box::new(self))
    }
}

impl Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Char => write!(f, "char"),
            Self::Int => write!(f, "int"),
            Self::UInt => write!(f, "unsigned int"),
            Self::Long => write!(f, "long"),
            Self::ULong => write!(f, "unsigned long"),
            Self::Named(name) => write!(f, "{name}"),
            // Function pointers get the C spelling, `ret (*)(params)`.
            Self::Ptr(inner) => match &**inner {
                Self::Func { ret, params } => {
                    write!(f, "{ret} (*)(")?;
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{p}")?;
                    }
                    write!(f, ")")
                }
                inner => write!(f, "{inner} *"),
            },
            Self::Func { ret, params } => {
                write!(f, "{ret} (")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Xor,
    Or,
    LAnd,
    LOr,
    Assign,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&",
            Self::Xor => "^",
            Self::Or => "|",
            Self::LAnd => "&&",
            Self::LOr => "||",
            Self::Assign => "=",
        }
    }
}

impl Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    PostInc,
    PostDec,
    PreInc,
    PreDec,
    AddrOf,
    Deref,
    Plus,
    Minus,
    Not,
    LNot,
}

impl UnOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostInc | Self::PreInc => "++",
            Self::PostDec | Self::PreDec => "--",
            Self::AddrOf => "&",
            Self::Deref => "*",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Not => "~",
            Self::LNot => "!",
        }
    }

    pub fn is_postfix(&self) -> bool {
        matches!(self, Self::PostInc | Self::PostDec)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    IntLit(i64),
    StrLit(String),
    DeclRef(String),
    Paren(Box<Expr>),
    Unary {
        op: UnOp,
        sub: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        base: Box<Expr>,
        field: String,
        arrow: bool,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Cast {
        ty: CType,
        sub: Box<Expr>,
    },
    SizeOfType(CType),
    SizeOfExpr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(skip)]
    pub id: ExprId,
    pub loc: SourceLoc,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(loc: SourceLoc, kind: ExprKind) -> Self {
        Self { id: 0, loc, kind }
    }

    /// The name the call site spells out, looking through parens and casts.
    /// `Some` does not imply a direct call: the name may be bound to a
    /// function pointer in the enclosing scope.
    pub fn callee_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Call { callee, .. } => callee.as_name(),
            _ => None,
        }
    }

    fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::DeclRef(name) => Some(name),
            ExprKind::Paren(sub) | ExprKind::Cast { sub, .. } => sub.as_name(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub ty: CType,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Null,
    Compound(Vec<Stmt>),
    Decl(VarDecl),
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        els: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: CType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub ret: CType,
    pub params: Vec<Param>,
    pub body: Option<Stmt>,
    pub loc: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub functions: Vec<FunctionDecl>,
}

impl Module {
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        let mut module: Module = serde_json::from_str(data)?;
        module.number_exprs();
        Ok(module)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Assigns fresh ids to every expression, pre-order, starting at 1.
    /// Id 0 is reserved for detached nodes that never entered a module.
    pub fn number_exprs(&mut self) {
        let mut next: ExprId = 1;
        for func in &mut self.functions {
            if let Some(body) = &mut func.body {
                number_stmt(body, &mut next);
            }
        }
    }
}

fn number_stmt(stmt: &mut Stmt, next: &mut ExprId) {
    match stmt {
        Stmt::Null | Stmt::Break | Stmt::Continue => {}
        Stmt::Compound(stmts) => {
            for s in stmts {
                number_stmt(s, next);
            }
        }
        Stmt::Decl(decl) => {
            if let Some(init) = &mut decl.init {
                number_expr(init, next);
            }
        }
        Stmt::Expr(e) => number_expr(e, next),
        Stmt::If { cond, then, els } => {
            number_expr(cond, next);
            number_stmt(then, next);
            if let Some(els) = els {
                number_stmt(els, next);
            }
        }
        Stmt::While { cond, body } => {
            number_expr(cond, next);
            number_stmt(body, next);
        }
        Stmt::Return(e) => {
            if let Some(e) = e {
                number_expr(e, next);
            }
        }
    }
}

fn number_expr(expr: &mut Expr, next: &mut ExprId) {
    expr.id = *next;
    *next += 1;
    match &mut expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::StrLit(_)
        | ExprKind::DeclRef(_)
        | ExprKind::SizeOfType(_) => {}
        ExprKind::Paren(sub)
        | ExprKind::Unary { sub, .. }
        | ExprKind::Cast { sub, .. }
        | ExprKind::SizeOfExpr(sub) => number_expr(sub, next),
        ExprKind::Binary { lhs, rhs, .. } => {
            number_expr(lhs, next);
            number_expr(rhs, next);
        }
        ExprKind::Conditional { cond, then, els } => {
            number_expr(cond, next);
            number_expr(then, next);
            number_expr(els, next);
        }
        ExprKind::Call { callee, args } => {
            number_expr(callee, next);
            for arg in args {
                number_expr(arg, next);
            }
        }
        ExprKind::Member { base, .. } => number_expr(base, next),
        ExprKind::Index { base, index } => {
            number_expr(base, next);
            number_expr(index, next);
        }
    }
}

/// Pre-order walk over every expression in a statement tree.
pub fn visit_exprs<'a>(stmt: &'a Stmt, f: &mut impl FnMut(&'a Expr)) {
    match stmt {
        Stmt::Null | Stmt::Break | Stmt::Continue => {}
        Stmt::Compound(stmts) => {
            for s in stmts {
                visit_exprs(s, f);
            }
        }
        Stmt::Decl(decl) => {
            if let Some(init) = &decl.init {
                visit_expr(init, f);
            }
        }
        Stmt::Expr(e) => visit_expr(e, f),
        Stmt::If { cond, then, els } => {
            visit_expr(cond, f);
            visit_exprs(then, f);
            if let Some(els) = els {
                visit_exprs(els, f);
            }
        }
        Stmt::While { cond, body } => {
            visit_expr(cond, f);
            visit_exprs(body, f);
        }
        Stmt::Return(e) => {
            if let Some(e) = e {
                visit_expr(e, f);
            }
        }
    }
}

fn visit_expr<'a>(expr: &'a Expr, f: &mut impl FnMut(&'a Expr)) {
    f(expr);
    match &expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::StrLit(_)
        | ExprKind::DeclRef(_)
        | ExprKind::SizeOfType(_) => {}
        ExprKind::Paren(sub)
        | ExprKind::Unary { sub, .. }
        | ExprKind::Cast { sub, .. }
        | ExprKind::SizeOfExpr(sub) => visit_expr(sub, f),
        ExprKind::Binary { lhs, rhs, .. } => {
            visit_expr(lhs, f);
            visit_expr(rhs, f);
        }
        ExprKind::Conditional { cond, then, els } => {
            visit_expr(cond, f);
            visit_expr(then, f);
            visit_expr(els, f);
        }
        ExprKind::Call { callee, args } => {
            visit_expr(callee, f);
            for arg in args {
                visit_expr(arg, f);
            }
        }
        ExprKind::Member { base, .. } => visit_expr(base, f),
        ExprKind::Index { base, index } => {
            visit_expr(base, f);
            visit_expr(index, f);
        }
    }
}

/// Declared types for a function's parameters and locals, by name.
#[derive(Debug, Default)]
pub struct Scope {
    vars: HashMap<String, CType>,
}

impl Scope {
    pub fn of(func: &FunctionDecl) -> Self {
        let mut vars = HashMap::default();
        for param in &func.params {
            vars.insert(param.name.clone(), param.ty.clone());
        }
        if let Some(body) = &func.body {
            collect_decls(body, &mut vars);
        }
        Self { vars }
    }

    pub fn lookup(&self, name: &str) -> Option<&CType> {
        self.vars.get(name)
    }
}

fn collect_decls(stmt: &Stmt, vars: &mut HashMap<String, CType>) {
    match stmt {
        Stmt::Decl(decl) => {
            vars.insert(decl.name.clone(), decl.ty.clone());
        }
        Stmt::Compound(stmts) => {
            for s in stmts {
                collect_decls(s, vars);
            }
        }
        Stmt::If { then, els, .. } => {
            collect_decls(then, vars);
            if let Some(els) = els {
                collect_decls(els, vars);
            }
        }
        Stmt::While { body, .. } => collect_decls(body, vars),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLoc {
        SourceLoc::new("test.c", 1, 1)
    }

    #[test]
    fn test_ctype_display() {
        assert_eq!(CType::Int.to_string(), "int");
        assert_eq!(CType::Int.ptr_to().to_string(), "int *");
        let fp = CType::Func {
            ret: Box::new(CType::Int),
            params: vec![CType::Int, CType::Char.ptr_to()],
        }
        .ptr_to();
        assert_eq!(fp.to_string(), "int (*)(int, char *)");
    }

    #[test]
    fn test_loc_without_column() {
        let loc = SourceLoc::new("a.c", 12, 7);
        assert_eq!(loc.to_string(), "a.c:12:7");
        assert_eq!(loc.without_column(), "a.c:12");
    }

    #[test]
    fn test_callee_name_through_parens_and_casts() {
        let callee = Expr::new(
            loc(),
            ExprKind::Paren(Box::new(Expr::new(
                loc(),
                ExprKind::Cast {
                    ty: CType::Void.ptr_to(),
                    sub: Box::new(Expr::new(loc(), ExprKind::DeclRef("open".into()))),
                },
            ))),
        );
        let call = Expr::new(
            loc(),
            ExprKind::Call {
                callee: Box::new(callee),
                args: vec![],
            },
        );
        assert_eq!(call.callee_name(), Some("open"));
    }

    #[test]
    fn test_number_exprs_is_deterministic() {
        let make = || {
            let mut module = Module {
                functions: vec![FunctionDecl {
                    name: "f".into(),
                    ret: CType::Void,
                    params: vec![],
                    body: Some(Stmt::Expr(Expr::new(
                        loc(),
                        ExprKind::Binary {
                            op: BinOp::Add,
                            lhs: Box::new(Expr::new(loc(), ExprKind::IntLit(1))),
                            rhs: Box::new(Expr::new(loc(), ExprKind::IntLit(2))),
                        },
                    ))),
                    loc: loc(),
                }],
            };
            module.number_exprs();
            module
        };
        let (a, b) = (make(), make());
        let mut ids_a = Vec::new();
        let mut ids_b = Vec::new();
        visit_exprs(a.functions[0].body.as_ref().unwrap(), &mut |e| {
            ids_a.push(e.id)
        });
        visit_exprs(b.functions[0].body.as_ref().unwrap(), &mut |e| {
            ids_b.push(e.id)
        });
        assert_eq!(ids_a, vec![1, 2, 3]);
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_module_json_round_trip() {
        let module = Module {
            functions: vec![FunctionDecl {
                name: "main".into(),
                ret: CType::Int,
                params: vec![Param {
                    name: "argc".into(),
                    ty: CType::Int,
                }],
                body: Some(Stmt::Return(Some(Expr::new(loc(), ExprKind::IntLit(0))))),
                loc: loc(),
            }],
        };
        let json = serde_json::to_string(&module).unwrap();
        let back = Module::from_json(&json).unwrap();
        assert_eq!(back.functions[0].name, "main");
        match &back.functions[0].body {
            Some(Stmt::Return(Some(e))) => assert_eq!(e.id, 1),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_scope_covers_params_and_locals() {
        let func = FunctionDecl {
            name: "f".into(),
            ret: CType::Void,
            params: vec![Param {
                name: "x".into(),
                ty: CType::Int,
            }],
            body: Some(Stmt::Compound(vec![Stmt::Decl(VarDecl {
                name: "p".into(),
                ty: CType::Char.ptr_to(),
                init: None,
            })])),
            loc: loc(),
        };
        let scope = Scope::of(&func);
        assert_eq!(scope.lookup("x"), Some(&CType::Int));
        assert_eq!(scope.lookup("p"), Some(&CType::Char.ptr_to()));
        assert_eq!(scope.lookup("y"), None);
    }
}
