//! Config-driven call-graph walker.
//!
//! Reads a target map (`<opLabel> <funcName>` per line), then writes one
//! trace file per defined target function: the function's name followed by
//! the names of every callee reachable through direct calls, depth-first,
//! each function descended into at most once. Indirect calls are recorded
//! as explicit markers; resolving them is stubbed out.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::ast::{CType, Expr, ExprKind, FunctionDecl, Module, Scope, visit_exprs};
use crate::{HashMap, HashSet};

/// Function name to operation label, parsed from the config file.
#[derive(Debug, Default)]
pub(crate) struct Targets {
    map: HashMap<String, String>,
}

impl Targets {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("error loading '{}'", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub(crate) fn parse(text: &str) -> Self {
        let mut map = HashMap::default();
        for line in text.lines() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // vfs.inode_operations.setattr   myfs_setattr
            let mut tokens = line.split_whitespace();
            let Some(op) = tokens.next() else { continue };
            let Some(func) = tokens.next() else { continue };
            map.insert(func.to_owned(), op.to_owned());
        }
        Self { map }
    }

    pub(crate) fn get(&self, func: &str) -> Option<&str> {
        self.map.get(func).map(String::as_str)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

pub(crate) struct Driver<'m> {
    module: &'m Module,
    targets: Targets,
    out_dir: PathBuf,
}

impl<'m> Driver<'m> {
    pub(crate) fn new(module: &'m Module, targets: Targets, out_dir: PathBuf) -> Self {
        Self {
            module,
            targets,
            out_dir,
        }
    }

    /// Walks every configured target defined in the module. Returns how many
    /// trace files were written; any filesystem error aborts the run.
    pub(crate) fn run(&self) -> Result<usize> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("error creating '{}'", self.out_dir.display()))?;

        let mut written = 0;
        for func in &self.module.functions {
            if func.body.is_none() {
                continue;
            }
            let Some(op) = self.targets.get(&func.name) else {
                continue;
            };
            let path = self.out_dir.join(format!("{op}.{}.trace", func.name));
            let mut out = std::fs::File::create(&path)
                .with_context(|| format!("error opening '{}'", path.display()))?;

            log::debug!("tracing {} -> {}", func.name, path.display());
            let mut visited = HashSet::default();
            visited.insert(func.name.clone());
            writeln!(out, "{}", func.name)
                .with_context(|| format!("error writing '{}'", path.display()))?;
            self.walk(func, &mut visited, &mut out)
                .with_context(|| format!("error writing '{}'", path.display()))?;
            written += 1;
        }
        Ok(written)
    }

    fn walk(
        &self,
        func: &FunctionDecl,
        visited: &mut HashSet<String>,
        out: &mut dyn Write,
    ) -> std::io::Result<()> {
        let scope = Scope::of(func);
        let Some(body) = &func.body else {
            return Ok(());
        };

        let mut calls = Vec::new();
        visit_exprs(body, &mut |e| {
            if matches!(e.kind, ExprKind::Call { .. }) {
                calls.push(e);
            }
        });

        for call in calls {
            match self.direct_callee(call, &scope) {
                Some(name) => {
                    writeln!(out, "{name}")?;
                    // descend into definitions we have, once each
                    if let Some(def) = self.module.function(name) {
                        if def.body.is_some() && visited.insert(name.to_owned()) {
                            self.walk(def, visited, out)?;
                        }
                    }
                }
                None => {
                    match callee_type(call, &scope) {
                        Some(ty) => writeln!(out, "# indirect call: {ty}")?,
                        None => writeln!(out, "# indirect call: <unknown type>")?,
                    };
                }
            }
        }
        Ok(())
    }

    /// A call is direct when its spelled-out name is not shadowed by a
    /// pointer variable in scope, or when the stubbed resolver names a
    /// target (it never does).
    fn direct_callee<'c>(&self, call: &'c Expr, scope: &Scope) -> Option<&'c str> {
        let name = call.callee_name();
        match name {
            Some(n) if !matches!(scope.lookup(n), Some(CType::Ptr(_))) => Some(n),
            _ => self.resolve_callee(call),
        }
    }

    /// Indirect call targets are never resolved; every caller must handle
    /// None. TODO: points-to based resolution for function pointers that
    /// are only ever assigned one function's address.
    fn resolve_callee(&self, _call: &Expr) -> Option<&'static str> {
        None
    }
}

/// Declared type of the called pointer, for the indirect-call marker.
fn callee_type<'a>(call: &Expr, scope: &'a Scope) -> Option<&'a CType> {
    let name = call.callee_name()?;
    scope.lookup(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Param, SourceLoc, Stmt, VarDecl};

    fn loc() -> SourceLoc {
        SourceLoc::new("t.c", 1, 1)
    }

    fn call_stmt(name: &str) -> Stmt {
        Stmt::Expr(Expr::new(
            loc(),
            ExprKind::Call {
                callee: Box::new(Expr::new(loc(), ExprKind::DeclRef(name.into()))),
                args: vec![],
            },
        ))
    }

    fn func(name: &str, body: Vec<Stmt>) -> FunctionDecl {
        FunctionDecl {
            name: name.into(),
            ret: CType::Void,
            params: vec![],
            body: Some(Stmt::Compound(body)),
            loc: loc(),
        }
    }

    #[test]
    fn test_targets_parsing() {
        let targets = Targets::parse(
            "# comment\n\
             \n\
             vfs.setattr   myfs_setattr\n\
             \t vfs.open myfs_open extra-ignored\n\
             lonely-token\n",
        );
        assert_eq!(targets.len(), 2);
        assert_eq!(targets.get("myfs_setattr"), Some("vfs.setattr"));
        assert_eq!(targets.get("myfs_open"), Some("vfs.open"));
        assert_eq!(targets.get("lonely-token"), None);
    }

    #[test]
    fn test_missing_config_is_fatal() {
        assert!(Targets::load(Path::new("/nonexistent/targets.conf")).is_err());
    }

    #[test]
    fn test_walk_recurses_once_per_function() {
        let mut module = Module {
            functions: vec![
                func("entry", vec![call_stmt("helper"), call_stmt("helper")]),
                func("helper", vec![call_stmt("entry"), call_stmt("leaf")]),
            ],
        };
        module.number_exprs();

        let dir = tempfile::tempdir().unwrap();
        let targets = Targets::parse("op entry");
        let driver = Driver::new(&module, targets, dir.path().to_path_buf());
        assert_eq!(driver.run().unwrap(), 1);

        let text = std::fs::read_to_string(dir.path().join("op.entry.trace")).unwrap();
        // helper is named at both call sites but descended into once;
        // the cycle back to entry is cut by the visited set
        assert_eq!(text, "entry\nhelper\nentry\nleaf\nhelper\n");
    }

    #[test]
    fn test_indirect_call_marker() {
        let mut entry = func("entry", vec![call_stmt("handler")]);
        if let Some(Stmt::Compound(body)) = &mut entry.body {
            body.insert(
                0,
                Stmt::Decl(VarDecl {
                    name: "handler".into(),
                    ty: CType::Func {
                        ret: Box::new(CType::Int),
                        params: vec![CType::Int],
                    }
                    .ptr_to(),
                    init: None,
                }),
            );
        }
        let mut module = Module {
            functions: vec![entry],
        };
        module.number_exprs();

        let dir = tempfile::tempdir().unwrap();
        let driver = Driver::new(&module, Targets::parse("op entry"), dir.path().to_path_buf());
        driver.run().unwrap();

        let text = std::fs::read_to_string(dir.path().join("op.entry.trace")).unwrap();
        assert_eq!(text, "entry\n# indirect call: int (*)(int)\n");
    }

    #[test]
    fn test_params_can_make_calls_indirect() {
        let mut entry = func("entry", vec![call_stmt("cb")]);
        entry.params = vec![Param {
            name: "cb".into(),
            ty: CType::Func {
                ret: Box::new(CType::Void),
                params: vec![],
            }
            .ptr_to(),
        }];
        let mut module = Module {
            functions: vec![entry],
        };
        module.number_exprs();

        let dir = tempfile::tempdir().unwrap();
        let driver = Driver::new(&module, Targets::parse("op entry"), dir.path().to_path_buf());
        driver.run().unwrap();

        let text = std::fs::read_to_string(dir.path().join("op.entry.trace")).unwrap();
        assert_eq!(text, "entry\n# indirect call: void (*)()\n");
    }
}
