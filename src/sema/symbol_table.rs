//! Scope-trie symbol table
//!
//! Locals are kept in one [`TrieTree`] per function. Each trie node stands
//! for one scope-defining AST node (the function, an `if` or a `while`) and
//! holds the names declared directly in that scope. A position's *trie
//! order*, its scope-defining ancestors from the function inward, is the
//! path used both to insert and to look up.
//!
//! Lookup follows that path as far as trie nodes exist and then scans it
//! innermost first, so an inner declaration shadows an outer one with the
//! same name.
//!
//! Nothing is pushed or popped while walking statements: the syntax tree
//! already records the nesting, and the trie reuses it.
//!
//! Functions live in a separate flat table keyed by name.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::parser::ast::{Ast, NodeId};
use crate::types::TypeRef;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("redeclaration of '{name}' in the same scope")]
    DuplicateLocal { name: String },
    #[error("undefined reference to '{name}'")]
    UndefinedVariable { name: String },
    #[error("redefinition of function '{name}'")]
    DuplicateFunction { name: String },
    #[error("undefined reference to function '{name}'")]
    UndefinedFunction { name: String },
}

/// A declared local: its type and the backend's handle to its storage.
#[derive(Debug, Clone)]
pub struct Symbol<V> {
    pub ty: TypeRef,
    pub value: V,
}

#[derive(Debug)]
struct TrieNode<V> {
    scope_def: NodeId,
    locals: FxHashMap<String, Symbol<V>>,
    children: FxHashMap<NodeId, TrieNode<V>>,
}

impl<V> TrieNode<V> {
    fn new(scope_def: NodeId) -> Self {
        Self {
            scope_def,
            locals: FxHashMap::default(),
            children: FxHashMap::default(),
        }
    }

    fn count(&self) -> usize {
        1 + self.children.values().map(TrieNode::count).sum::<usize>()
    }
}

#[derive(Debug)]
pub struct TrieTree<V> {
    head: TrieNode<V>,
}

impl<V> TrieTree<V> {
    /// Empty trie for the function declared at `function`.
    pub fn new(function: NodeId) -> Self {
        Self { head: TrieNode::new(function) }
    }

    pub fn function(&self) -> NodeId {
        self.head.scope_def
    }

    /// Number of scopes that have been materialized.
    pub fn scope_count(&self) -> usize {
        self.head.count()
    }

    /// Declare `name` in the scope that immediately encloses `pos`.
    pub fn insert(
        &mut self,
        ast: &Ast,
        pos: NodeId,
        name: &str,
        ty: TypeRef,
        value: V,
    ) -> Result<(), SymbolError> {
        let order = ast.trie_order(pos);
        assert_eq!(
            order.first(),
            Some(&self.head.scope_def),
            "symbol position is outside this trie's function"
        );

        let mut node = &mut self.head;
        for scope in &order[1..] {
            node = node
                .children
                .entry(*scope)
                .or_insert_with(|| TrieNode::new(*scope));
        }
        assert_eq!(
            Some(node.scope_def),
            ast.scope_decl_loc(pos),
            "declaration landed outside its enclosing scope"
        );

        if node.locals.contains_key(name) {
            return Err(SymbolError::DuplicateLocal { name: name.to_string() });
        }
        tracing::trace!(name, scope = ?node.scope_def, "declare local");
        node.locals.insert(name.to_string(), Symbol { ty, value });
        Ok(())
    }

    /// Resolve `name` as seen from `pos`.
    pub fn lookup(&self, ast: &Ast, pos: NodeId, name: &str) -> Result<&Symbol<V>, SymbolError> {
        let order = ast.trie_order(pos);
        let mut path = vec![&self.head];
        if order.first() == Some(&self.head.scope_def) {
            for scope in &order[1..] {
                match path[path.len() - 1].children.get(scope) {
                    Some(child) => path.push(child),
                    None => break,
                }
            }
        }

        path.iter()
            .rev()
            .find_map(|node| node.locals.get(name))
            .ok_or_else(|| SymbolError::UndefinedVariable { name: name.to_string() })
    }
}

/// A function known to the table, with the backend handle assigned when it
/// was declared.
#[derive(Debug, Clone)]
pub struct FunctionEntry<F> {
    pub decl: NodeId,
    pub handle: F,
}

#[derive(Debug)]
pub struct SymbolTable<V, F> {
    tries: FxHashMap<NodeId, TrieTree<V>>,
    functions: FxHashMap<String, FunctionEntry<F>>,
}

impl<V, F> Default for SymbolTable<V, F> {
    fn default() -> Self {
        Self {
            tries: FxHashMap::default(),
            functions: FxHashMap::default(),
        }
    }
}

impl<V, F> SymbolTable<V, F> {
    pub fn new() -> Self {
        Self::default()
    }

    fn enclosing_function(ast: &Ast, pos: NodeId) -> NodeId {
        ast.first_function_decl(pos)
            .unwrap_or_else(|| panic!("{pos:?} is not inside a function"))
    }

    pub fn insert(
        &mut self,
        ast: &Ast,
        pos: NodeId,
        name: &str,
        ty: TypeRef,
        value: V,
    ) -> Result<(), SymbolError> {
        let function = Self::enclosing_function(ast, pos);
        self.tries
            .entry(function)
            .or_insert_with(|| TrieTree::new(function))
            .insert(ast, pos, name, ty, value)
    }

    pub fn lookup(&self, ast: &Ast, pos: NodeId, name: &str) -> Result<&Symbol<V>, SymbolError> {
        let function = Self::enclosing_function(ast, pos);
        match self.tries.get(&function) {
            Some(trie) => trie.lookup(ast, pos, name),
            None => Err(SymbolError::UndefinedVariable { name: name.to_string() }),
        }
    }

    pub fn trie(&self, function: NodeId) -> Option<&TrieTree<V>> {
        self.tries.get(&function)
    }

    pub fn add_function(&mut self, name: &str, decl: NodeId, handle: F) -> Result<(), SymbolError> {
        if self.functions.contains_key(name) {
            return Err(SymbolError::DuplicateFunction { name: name.to_string() });
        }
        tracing::trace!(name, "declare function");
        self.functions.insert(name.to_string(), FunctionEntry { decl, handle });
        Ok(())
    }

    pub fn function(&self, name: &str) -> Result<&FunctionEntry<F>, SymbolError> {
        self.functions
            .get(name)
            .ok_or_else(|| SymbolError::UndefinedFunction { name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{NodeKind, TreeCode};
    use crate::parser::{CompilationUnit, Parser};
    use crate::types::Type;

    const SHADOWING: &str = "\
function f gives int [int a,] {
  if a gt 0 then
    int a = 5;
    ret a;
  end
  ret a;
}
";

    fn parse(source: &str) -> CompilationUnit {
        let unit = Parser::new(source).parse();
        assert!(!unit.have_error(), "{}", unit.diagnostics.render());
        unit
    }

    /// Identifier nodes in creation order.
    fn identifiers(unit: &CompilationUnit, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![unit.functions[0]];
        while let Some(id) = stack.pop() {
            if matches!(unit.ast.kind(id), NodeKind::Identifier { name: n } if n == name) {
                found.push(id);
            }
            stack.extend(unit.ast.children(id).iter().copied());
        }
        found.sort();
        found
    }

    /// Populate the table the way lowering does: arguments at the argument
    /// list, declarations at their statement.
    fn populate(unit: &CompilationUnit) -> SymbolTable<&'static str, ()> {
        let function = unit.functions[0];
        let NodeKind::FunctionDecl { args, .. } = unit.ast.kind(function) else {
            panic!("expected a function");
        };
        let mut table = SymbolTable::new();
        table.insert(&unit.ast, *args, "a", Type::int(), "param").unwrap();
        for decl in unit.ast.declarations(function) {
            let NodeKind::Declaration { name, ty, .. } = unit.ast.kind(decl) else {
                unreachable!();
            };
            table.insert(&unit.ast, decl, name, ty.clone(), "inner").unwrap();
        }
        table
    }

    #[test]
    fn test_shadowing() {
        let unit = parse(SHADOWING);
        let table = populate(&unit);
        let uses = identifiers(&unit, "a");
        assert_eq!(uses.len(), 3);
        let [cond, inside, after] = [uses[0], uses[1], uses[2]];

        assert_eq!(table.lookup(&unit.ast, inside, "a").unwrap().value, "inner");
        assert_eq!(table.lookup(&unit.ast, after, "a").unwrap().value, "param");
        assert_eq!(table.lookup(&unit.ast, cond, "a").unwrap().value, "param");
    }

    #[test]
    fn test_trie_shape() {
        let unit = parse(SHADOWING);
        let table = populate(&unit);
        let trie = table.trie(unit.functions[0]).unwrap();
        assert_eq!(trie.function(), unit.functions[0]);
        assert_eq!(trie.scope_count(), 2);
    }

    #[test]
    fn test_lookup_skips_scopes_without_declarations() {
        let source = "\
function f gives int [] {
  int x = 1;
  while x lt 3 then
    if x eq 2 then
      x = 7;
    end
  end
  ret x;
}
";
        let unit = parse(source);
        let function = unit.functions[0];
        let mut table: SymbolTable<i32, ()> = SymbolTable::new();
        let decl = unit.ast.declarations(function)[0];
        table.insert(&unit.ast, decl, "x", Type::int(), 1).unwrap();

        for use_site in identifiers(&unit, "x") {
            assert_eq!(table.lookup(&unit.ast, use_site, "x").unwrap().value, 1);
        }
        assert_eq!(table.trie(function).unwrap().scope_count(), 1);
    }

    #[test]
    fn test_duplicate_and_undefined() {
        let unit = parse(SHADOWING);
        let mut table = populate(&unit);
        let decl = unit.ast.declarations(unit.functions[0])[0];
        assert_eq!(
            table.insert(&unit.ast, decl, "a", Type::int(), "again"),
            Err(SymbolError::DuplicateLocal { name: "a".into() })
        );
        let after = *identifiers(&unit, "a").last().unwrap();
        assert_eq!(
            table.lookup(&unit.ast, after, "b").unwrap_err(),
            SymbolError::UndefinedVariable { name: "b".into() }
        );
        assert_eq!(unit.ast.code(unit.ast.scope_decl_loc(decl).unwrap()), TreeCode::If);
    }

    #[test]
    fn test_function_table() {
        let mut table: SymbolTable<(), u32> = SymbolTable::new();
        let unit = parse(SHADOWING);
        table.add_function("f", unit.functions[0], 7).unwrap();
        assert_eq!(table.function("f").unwrap().handle, 7);
        assert_eq!(
            table.add_function("f", unit.functions[0], 8),
            Err(SymbolError::DuplicateFunction { name: "f".into() })
        );
        assert!(matches!(
            table.function("g"),
            Err(SymbolError::UndefinedFunction { .. })
        ));
    }
}
