//! Statement and expression nodes of the declaration-tree model.
//!
//! Operation bodies are kept as structured statement sequences so the matcher
//! can compare loops, conditionals and calls between candidate pairs instead
//! of raw text. The node set is closed: every source construct the tree
//! builder does not model explicitly lands in an `Other` variant carrying its
//! grammar kind and text.
//!
//! Traversal goes through [`crate::visitor::Visitor`]; nothing here walks the
//! tree itself except the small helpers on [`Expr`].

use serde::{Deserialize, Serialize};

use crate::types::Span;

/// An ordered statement sequence (function body, loop body, branch).
pub type Block = Vec<Statement>;

/// A statement with its source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StmtKind,
    pub span: Span,
}

impl Statement {
    /// Create a statement.
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Statement { kind, span }
    }

    /// Create a statement without position information.
    pub fn bare(kind: StmtKind) -> Self {
        Statement {
            kind,
            span: Span::default(),
        }
    }
}

/// Closed set of statement kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    /// Bare expression statement (calls, docstrings, ...).
    Expr { value: Expr },
    /// `a = b`, `a = b = c`, `a: int = b`, `a: int`.
    Assign {
        targets: Vec<Expr>,
        value: Option<Expr>,
        annotation: Option<String>,
    },
    /// `a += b`.
    AugAssign { target: Expr, op: String, value: Expr },
    Return { value: Option<Expr> },
    /// `if`/`elif`/`else`; `elif` chains nest in `orelse`.
    If { test: Expr, body: Block, orelse: Block },
    For {
        target: Expr,
        iter: Expr,
        body: Block,
        orelse: Block,
        is_async: bool,
    },
    While { test: Expr, body: Block, orelse: Block },
    Try {
        body: Block,
        handlers: Vec<ExceptHandler>,
        orelse: Block,
        finalbody: Block,
    },
    With { items: Vec<Expr>, body: Block },
    Raise { exc: Option<Expr> },
    Assert { test: Expr, msg: Option<Expr> },
    Delete { targets: Vec<Expr> },
    Import { module: String, names: Vec<String> },
    Global { names: Vec<String> },
    Nonlocal { names: Vec<String> },
    Pass,
    Break,
    Continue,
    /// Function defined inside another function body.
    FunctionDef { name: String, body: Block },
    /// Class defined inside a function body.
    ClassDef { name: String, body: Block },
    Other { kind: String, text: String },
}

impl StmtKind {
    /// Short stable name of the statement kind.
    pub fn name(&self) -> &'static str {
        match self {
            StmtKind::Expr { .. } => "expr",
            StmtKind::Assign { .. } => "assign",
            StmtKind::AugAssign { .. } => "aug_assign",
            StmtKind::Return { .. } => "return",
            StmtKind::If { .. } => "if",
            StmtKind::For { .. } => "for",
            StmtKind::While { .. } => "while",
            StmtKind::Try { .. } => "try",
            StmtKind::With { .. } => "with",
            StmtKind::Raise { .. } => "raise",
            StmtKind::Assert { .. } => "assert",
            StmtKind::Delete { .. } => "delete",
            StmtKind::Import { .. } => "import",
            StmtKind::Global { .. } => "global",
            StmtKind::Nonlocal { .. } => "nonlocal",
            StmtKind::Pass => "pass",
            StmtKind::Break => "break",
            StmtKind::Continue => "continue",
            StmtKind::FunctionDef { .. } => "def",
            StmtKind::ClassDef { .. } => "class",
            StmtKind::Other { .. } => "other",
        }
    }
}

/// One `except` clause of a `try` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    /// Exception type expressions (empty for a bare `except:`).
    pub types: Vec<Expr>,
    /// Bound name in `except E as name`.
    pub name: Option<String>,
    pub body: Block,
}

/// Kind of a literal expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    Str,
    Int,
    Float,
    Bool,
    None,
    Ellipsis,
}

/// Kind of a display or comprehension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    List,
    Tuple,
    Set,
    /// Dict displays store keys and values interleaved: `[k0, v0, k1, v1, ...]`.
    Dict,
    Generator,
}

impl CollectionKind {
    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::List => "list",
            CollectionKind::Tuple => "tuple",
            CollectionKind::Set => "set",
            CollectionKind::Dict => "dict",
            CollectionKind::Generator => "generator",
        }
    }
}

/// Closed set of expression kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    Name { id: String },
    Attribute { value: Box<Expr>, attr: String },
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// `name=value` inside a call argument list.
    Keyword { name: String, value: Box<Expr> },
    Literal { kind: LiteralKind, text: String },
    BinOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp { op: String, operand: Box<Expr> },
    BoolOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<String>,
        comparators: Vec<Expr>,
    },
    Subscript { value: Box<Expr>, index: Vec<Expr> },
    Collection {
        kind: CollectionKind,
        elements: Vec<Expr>,
    },
    /// Comprehension: the produced element followed by its `for`/`if` parts.
    Comprehension {
        kind: CollectionKind,
        element: Box<Expr>,
        clauses: Vec<Expr>,
    },
    Lambda { params: Vec<String>, body: Box<Expr> },
    Conditional {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Await { value: Box<Expr> },
    Yield { value: Option<Box<Expr>> },
    Starred { value: Box<Expr> },
    Other { kind: String, text: String },
}

impl Expr {
    /// Shorthand for a name expression.
    pub fn name(id: impl Into<String>) -> Self {
        Expr::Name { id: id.into() }
    }

    /// Shorthand for a call with a simple or dotted callee.
    ///
    /// `Expr::call("B.compute", vec![])` builds `Attribute(Name(B), compute)` as callee.
    pub fn call(callee: &str, args: Vec<Expr>) -> Self {
        let mut parts = callee.split('.');
        let first = parts.next().unwrap_or_default();
        let func = parts.fold(Expr::name(first), |value, attr| Expr::Attribute {
            value: Box::new(value),
            attr: attr.to_string(),
        });
        Expr::Call {
            func: Box::new(func),
            args,
        }
    }

    /// Shorthand for a literal.
    pub fn literal(kind: LiteralKind, text: impl Into<String>) -> Self {
        Expr::Literal {
            kind,
            text: text.into(),
        }
    }

    /// Simple name of a call target: `f` for `f()`, `m` for `a.b.m()`.
    pub fn callee_name(&self) -> Option<&str> {
        match self {
            Expr::Name { id } => Some(id),
            Expr::Attribute { attr, .. } => Some(attr),
            _ => None,
        }
    }

    /// Dotted text of a name/attribute chain, `None` for anything else.
    pub fn dotted(&self) -> Option<String> {
        match self {
            Expr::Name { id } => Some(id.clone()),
            Expr::Attribute { value, attr } => value.dotted().map(|base| format!("{base}.{attr}")),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_shorthand_builds_attribute_chain() {
        let call = Expr::call("self.helper.run", vec![]);
        match call {
            Expr::Call { func, .. } => {
                assert_eq!(func.callee_name(), Some("run"));
                assert_eq!(func.dotted().as_deref(), Some("self.helper.run"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn dotted_is_none_for_computed_receivers() {
        let expr = Expr::Attribute {
            value: Box::new(Expr::call("factory", vec![])),
            attr: "create".to_string(),
        };
        assert_eq!(expr.dotted(), None);
        assert_eq!(expr.callee_name(), Some("create"));
    }

    #[test]
    fn statement_kind_names_are_stable() {
        assert_eq!(StmtKind::Pass.name(), "pass");
        assert_eq!(
            StmtKind::Return {
                value: Some(Expr::name("x"))
            }
            .name(),
            "return"
        );
    }

    #[test]
    fn statements_serialize_with_tag() {
        let stmt = Statement::bare(StmtKind::Return {
            value: Some(Expr::literal(LiteralKind::Int, "1")),
        });
        let json = serde_json::to_string(&stmt).unwrap();
        assert!(json.contains("\"stmt\":\"return\""));
        assert!(json.contains("\"expr\":\"literal\""));
    }
}
