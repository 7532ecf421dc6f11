//! Abstract syntax tree
//!
//! Nodes live in a single [`Ast`] arena and refer to each other by
//! [`NodeId`]. Every node records its source position, a non-owning parent
//! link and an ordered child list; [`Ast::add_child`] and
//! [`Ast::remove_child`] are the only ways to change those edges, so the two
//! directions never disagree.
//!
//! Node variants form a closed [`NodeKind`] sum type. The addressable
//! expressions (identifiers, member access, array access, dereference) are
//! the *locators*; a [`Locator`] handle can only be obtained for those.
//!
//! # Postfix chains
//!
//! `a.b[i].c` is stored as a chain whose root carries the base name `a` and
//! whose later links point back at the link before them:
//!
//! ```text
//! MemberAccess(base: Name("a"), member: "b") ── child ─▶
//!     ArrayAccess(base: Parent(#0), index: i) ── child ─▶
//!         MemberAccess(base: Parent(#1), member: "c")
//! ```
//!
//! A `deref<p>` may also root a chain, with its `child` pointing at the first
//! `.`/`[]` link.

use std::fmt::Write as _;
use std::ops::Index;

use super::lexer::TokenKind;
use super::stream::FilePos;
use crate::types::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An expression known to be addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator(NodeId);

impl Locator {
    /// For a node the caller has just built as a locator variant.
    pub(crate) fn of(id: NodeId) -> Self {
        Self(id)
    }

    pub fn id(self) -> NodeId {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
}

impl BinaryOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Add => BinaryOp::Add,
            TokenKind::Subtract => BinaryOp::Subtract,
            TokenKind::Multiply => BinaryOp::Multiply,
            TokenKind::Divide => BinaryOp::Divide,
            TokenKind::EqualKeyword => BinaryOp::Equal,
            TokenKind::NEquals => BinaryOp::NotEqual,
            TokenKind::GreaterThan => BinaryOp::GreaterThan,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            TokenKind::LessThan => BinaryOp::LessThan,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            _ => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "eq",
            BinaryOp::NotEqual => "ne",
            BinaryOp::GreaterThan => "gt",
            BinaryOp::GreaterEqual => "ge",
            BinaryOp::LessThan => "lt",
            BinaryOp::LessEqual => "le",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
}

/// Where a postfix link gets the storage it indexes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostfixBase {
    /// Root of a chain: a variable resolved through the symbol table.
    Name(String),
    /// Later link: the previous link of the chain.
    Parent(Locator),
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    FunctionDecl {
        name: String,
        return_type: TypeRef,
        args: NodeId,
        body: Vec<NodeId>,
        is_extern: bool,
    },
    FunctionArgList {
        params: Vec<Parameter>,
    },
    Assignment {
        target: Locator,
        value: NodeId,
    },
    Return {
        value: Option<NodeId>,
    },
    If {
        cond: NodeId,
        body: Vec<NodeId>,
    },
    While {
        cond: NodeId,
        body: Vec<NodeId>,
    },
    Declaration {
        name: String,
        ty: TypeRef,
        init: Option<NodeId>,
    },
    CallStatement {
        call: NodeId,
    },

    Constant {
        value: i64,
    },
    Call {
        name: String,
        args: Vec<NodeId>,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Cast {
        ty: TypeRef,
        expr: NodeId,
    },
    Identifier {
        name: String,
    },
    MemberAccess {
        base: PostfixBase,
        member: String,
        child: Option<NodeId>,
    },
    ArrayAccess {
        base: PostfixBase,
        index: NodeId,
        child: Option<NodeId>,
    },
    DeRef {
        expr: NodeId,
        child: Option<NodeId>,
    },
    Ref {
        expr: Locator,
    },
    StringLiteral {
        value: String,
    },
}

/// Data-free tag of a [`NodeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeCode {
    FunctionDecl,
    FunctionArgList,
    Assignment,
    Return,
    If,
    While,
    Declaration,
    CallStatement,
    Constant,
    Call,
    Binary,
    Cast,
    Identifier,
    MemberAccess,
    ArrayAccess,
    DeRef,
    Ref,
    StringLiteral,
}

impl TreeCode {
    pub fn defines_scope(self) -> bool {
        matches!(self, TreeCode::FunctionDecl | TreeCode::If | TreeCode::While)
    }
}

/// What a node can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Statement,
    /// Produces a value only.
    Value,
    /// Produces a value and can also be addressed.
    Locator,
}

impl NodeKind {
    pub fn code(&self) -> TreeCode {
        match self {
            NodeKind::FunctionDecl { .. } => TreeCode::FunctionDecl,
            NodeKind::FunctionArgList { .. } => TreeCode::FunctionArgList,
            NodeKind::Assignment { .. } => TreeCode::Assignment,
            NodeKind::Return { .. } => TreeCode::Return,
            NodeKind::If { .. } => TreeCode::If,
            NodeKind::While { .. } => TreeCode::While,
            NodeKind::Declaration { .. } => TreeCode::Declaration,
            NodeKind::CallStatement { .. } => TreeCode::CallStatement,
            NodeKind::Constant { .. } => TreeCode::Constant,
            NodeKind::Call { .. } => TreeCode::Call,
            NodeKind::Binary { .. } => TreeCode::Binary,
            NodeKind::Cast { .. } => TreeCode::Cast,
            NodeKind::Identifier { .. } => TreeCode::Identifier,
            NodeKind::MemberAccess { .. } => TreeCode::MemberAccess,
            NodeKind::ArrayAccess { .. } => TreeCode::ArrayAccess,
            NodeKind::DeRef { .. } => TreeCode::DeRef,
            NodeKind::Ref { .. } => TreeCode::Ref,
            NodeKind::StringLiteral { .. } => TreeCode::StringLiteral,
        }
    }

    pub fn capability(&self) -> Capability {
        match self.code() {
            TreeCode::FunctionDecl
            | TreeCode::FunctionArgList
            | TreeCode::Assignment
            | TreeCode::Return
            | TreeCode::If
            | TreeCode::While
            | TreeCode::Declaration
            | TreeCode::CallStatement => Capability::Statement,
            TreeCode::Identifier
            | TreeCode::MemberAccess
            | TreeCode::ArrayAccess
            | TreeCode::DeRef => Capability::Locator,
            TreeCode::Constant
            | TreeCode::Call
            | TreeCode::Binary
            | TreeCode::Cast
            | TreeCode::Ref
            | TreeCode::StringLiteral => Capability::Value,
        }
    }

    /// The subtrees a node owns at construction time, in source order.
    fn operands(&self) -> Vec<NodeId> {
        match self {
            NodeKind::FunctionDecl { args, body, .. } => {
                std::iter::once(*args).chain(body.iter().copied()).collect()
            }
            NodeKind::Assignment { target, value } => vec![target.id(), *value],
            NodeKind::Return { value } => value.iter().copied().collect(),
            NodeKind::If { cond, body } | NodeKind::While { cond, body } => {
                std::iter::once(*cond).chain(body.iter().copied()).collect()
            }
            NodeKind::Declaration { init, .. } => init.iter().copied().collect(),
            NodeKind::CallStatement { call } => vec![*call],
            NodeKind::Call { args, .. } => args.clone(),
            NodeKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            NodeKind::Cast { expr, .. } => vec![*expr],
            NodeKind::ArrayAccess { index, .. } => vec![*index],
            NodeKind::DeRef { expr, .. } => vec![*expr],
            NodeKind::Ref { expr } => vec![expr.id()],
            NodeKind::FunctionArgList { .. }
            | NodeKind::Constant { .. }
            | NodeKind::Identifier { .. }
            | NodeKind::MemberAccess { .. }
            | NodeKind::StringLiteral { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: FilePos,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a node and adopt the subtrees named by its kind.
    pub fn add(&mut self, kind: NodeKind, pos: FilePos) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("syntax tree too large"));
        let operands = kind.operands();
        self.nodes.push(Node { kind, pos, parent: None, children: Vec::new() });
        for child in operands {
            self.add_child(id, child);
        }
        id
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        assert!(
            self[child].parent.is_none(),
            "node {child:?} already has parent {:?}",
            self[child].parent
        );
        assert_ne!(parent, child, "node cannot parent itself");
        self.nodes[parent.index()].children.push(child);
        self.nodes[child.index()].parent = Some(parent);
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let children = &mut self.nodes[parent.index()].children;
        let at = children
            .iter()
            .position(|c| *c == child)
            .unwrap_or_else(|| panic!("{child:?} is not a child of {parent:?}"));
        children.remove(at);
        self.nodes[child.index()].parent = None;
    }

    /// Hang `child` off the end of the postfix chain at `tail`.
    pub fn link_postfix(&mut self, tail: Locator, child: NodeId) {
        match &mut self.nodes[tail.id().index()].kind {
            NodeKind::MemberAccess { child: slot, .. }
            | NodeKind::ArrayAccess { child: slot, .. }
            | NodeKind::DeRef { child: slot, .. } => {
                assert!(slot.is_none(), "postfix link already has a child");
                *slot = Some(child);
            }
            other => panic!("{:?} cannot carry a postfix child", other.code()),
        }
        self.add_child(tail.id(), child);
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self[id].kind
    }

    pub fn code(&self, id: NodeId) -> TreeCode {
        self[id].kind.code()
    }

    pub fn pos(&self, id: NodeId) -> FilePos {
        self[id].pos
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    pub fn as_locator(&self, id: NodeId) -> Option<Locator> {
        (self[id].kind.capability() == Capability::Locator).then_some(Locator(id))
    }

    pub fn does_define_scope(&self, id: NodeId) -> bool {
        self.code(id).defines_scope()
    }

    /// Nearest scope-defining ancestor of `id`.
    ///
    /// This is not a plain walk to the first scope-defining ancestor: the
    /// condition of an `if`/`while` is evaluated before the block is
    /// entered, so it belongs to the scope around the statement rather than
    /// to the statement's own scope.
    pub fn scope_decl_loc(&self, id: NodeId) -> Option<NodeId> {
        let mut below = id;
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.does_define_scope(node) && !self.is_condition_of(node, below) {
                return Some(node);
            }
            below = node;
            current = self.parent(node);
        }
        None
    }

    fn is_condition_of(&self, statement: NodeId, child: NodeId) -> bool {
        match self.kind(statement) {
            NodeKind::If { cond, .. } | NodeKind::While { cond, .. } => *cond == child,
            _ => false,
        }
    }

    /// The function declaration containing `id`, or `id` itself.
    pub fn first_function_decl(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.code(node) == TreeCode::FunctionDecl {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Scope-defining ancestors of `id`, outermost first.
    pub fn trie_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut scope = self.scope_decl_loc(id);
        while let Some(node) = scope {
            order.push(node);
            scope = self.scope_decl_loc(node);
        }
        order.reverse();
        order
    }

    pub fn body(&self, id: NodeId) -> &[NodeId] {
        match self.kind(id) {
            NodeKind::FunctionDecl { body, .. }
            | NodeKind::If { body, .. }
            | NodeKind::While { body, .. } => body,
            _ => &[],
        }
    }

    /// Every declaration statement inside a scope-defining node, descending
    /// through nested `if`/`while` blocks, in source order.
    pub fn declarations(&self, scope: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.collect_declarations(scope, &mut found);
        found
    }

    fn collect_declarations(&self, scope: NodeId, found: &mut Vec<NodeId>) {
        for &statement in self.body(scope) {
            match self.code(statement) {
                TreeCode::Declaration => found.push(statement),
                TreeCode::If | TreeCode::While => self.collect_declarations(statement, found),
                _ => {}
            }
        }
    }

    /// Indented, one-node-per-line rendering of the subtree at `id`.
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(id, 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let _ = write!(out, "{:indent$}", "", indent = depth * 2);
        let _ = match self.kind(id) {
            NodeKind::FunctionDecl { name, return_type, is_extern, .. } => {
                let prefix = if *is_extern { "external " } else { "" };
                writeln!(out, "{prefix}FunctionDecl {name} gives {return_type}")
            }
            NodeKind::FunctionArgList { params } => {
                let list: Vec<String> =
                    params.iter().map(|p| format!("{} {}", p.ty, p.name)).collect();
                writeln!(out, "FunctionArgList [{}]", list.join(", "))
            }
            NodeKind::Assignment { .. } => writeln!(out, "Assignment"),
            NodeKind::Return { .. } => writeln!(out, "Return"),
            NodeKind::If { .. } => writeln!(out, "If"),
            NodeKind::While { .. } => writeln!(out, "While"),
            NodeKind::Declaration { name, ty, .. } => writeln!(out, "Declaration {ty} {name}"),
            NodeKind::CallStatement { .. } => writeln!(out, "CallStatement"),
            NodeKind::Constant { value } => writeln!(out, "Constant {value}"),
            NodeKind::Call { name, .. } => writeln!(out, "Call {name}"),
            NodeKind::Binary { op, .. } => writeln!(out, "Binary {}", op.symbol()),
            NodeKind::Cast { ty, .. } => writeln!(out, "Cast {ty}"),
            NodeKind::Identifier { name } => writeln!(out, "Identifier {name}"),
            NodeKind::MemberAccess { base, member, .. } => match base {
                PostfixBase::Name(name) => writeln!(out, "MemberAccess {name}.{member}"),
                PostfixBase::Parent(_) => writeln!(out, "MemberAccess .{member}"),
            },
            NodeKind::ArrayAccess { base, .. } => match base {
                PostfixBase::Name(name) => writeln!(out, "ArrayAccess {name}[]"),
                PostfixBase::Parent(_) => writeln!(out, "ArrayAccess []"),
            },
            NodeKind::DeRef { .. } => writeln!(out, "DeRef"),
            NodeKind::Ref { .. } => writeln!(out, "Ref"),
            NodeKind::StringLiteral { value } => writeln!(out, "StringLiteral {value:?}"),
        };
        for &child in self.children(id) {
            self.dump_into(child, depth + 1, out);
        }
    }
}
