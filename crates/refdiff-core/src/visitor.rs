//! Visitor infrastructure for statement/expression traversal.
//!
//! The node set in [`crate::ast`] is a closed sum type, so a single pair of
//! walk functions covers every kind exhaustively. Collectors implement
//! [`Visitor`] and override only the hooks they care about.
//!
//! # Traversal Order
//!
//! - **Depth-first, pre-order** for `visit_*` methods
//! - **Post-order** for `leave_stmt`
//! - Children are visited in source order
//!
//! # Example
//!
//! ```
//! use refdiff_core::ast::{Expr, Statement, StmtKind};
//! use refdiff_core::visitor::{walk_block, VisitResult, Visitor};
//!
//! struct CallCounter(usize);
//!
//! impl Visitor for CallCounter {
//!     fn visit_expr(&mut self, expr: &Expr) -> VisitResult {
//!         if matches!(expr, Expr::Call { .. }) {
//!             self.0 += 1;
//!         }
//!         VisitResult::Continue
//!     }
//! }
//!
//! let body = vec![Statement::bare(StmtKind::Expr {
//!     value: Expr::call("print", vec![Expr::call("len", vec![])]),
//! })];
//! let mut counter = CallCounter(0);
//! walk_block(&mut counter, &body);
//! assert_eq!(counter.0, 2);
//! ```

use crate::ast::{Block, Expr, Statement, StmtKind};

/// Result of visiting a node - controls traversal behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VisitResult {
    /// Continue traversal into children.
    #[default]
    Continue,
    /// Skip children, continue with siblings.
    SkipChildren,
    /// Stop traversal entirely.
    Stop,
}

/// Read-only visitor over statements and expressions.
pub trait Visitor {
    fn visit_stmt(&mut self, _stmt: &Statement) -> VisitResult {
        VisitResult::Continue
    }

    fn leave_stmt(&mut self, _stmt: &Statement) {}

    fn visit_expr(&mut self, _expr: &Expr) -> VisitResult {
        VisitResult::Continue
    }
}

/// Walk every statement of a block. Returns `false` if traversal was stopped.
pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, block: &[Statement]) -> bool {
    block.iter().all(|stmt| walk_stmt(visitor, stmt))
}

fn walk_exprs<V: Visitor + ?Sized>(visitor: &mut V, exprs: &[Expr]) -> bool {
    exprs.iter().all(|expr| walk_expr(visitor, expr))
}

fn walk_opt_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: Option<&Expr>) -> bool {
    expr.is_none_or(|e| walk_expr(visitor, e))
}

/// Walk a statement and its children. Returns `false` if traversal was stopped.
pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Statement) -> bool {
    match visitor.visit_stmt(stmt) {
        VisitResult::Stop => return false,
        VisitResult::SkipChildren => {
            visitor.leave_stmt(stmt);
            return true;
        }
        VisitResult::Continue => {}
    }

    let keep_going = match &stmt.kind {
        StmtKind::Expr { value } => walk_expr(visitor, value),
        StmtKind::Assign { targets, value, .. } => {
            walk_exprs(visitor, targets) && walk_opt_expr(visitor, value.as_ref())
        }
        StmtKind::AugAssign { target, value, .. } => {
            walk_expr(visitor, target) && walk_expr(visitor, value)
        }
        StmtKind::Return { value } => walk_opt_expr(visitor, value.as_ref()),
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            walk_expr(visitor, test) && walk_block(visitor, body) && walk_block(visitor, orelse)
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            walk_expr(visitor, target)
                && walk_expr(visitor, iter)
                && walk_block(visitor, body)
                && walk_block(visitor, orelse)
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            walk_block(visitor, body)
                && handlers
                    .iter()
                    .all(|h| walk_exprs(visitor, &h.types) && walk_block(visitor, &h.body))
                && walk_block(visitor, orelse)
                && walk_block(visitor, finalbody)
        }
        StmtKind::With { items, body } => walk_exprs(visitor, items) && walk_block(visitor, body),
        StmtKind::Raise { exc } => walk_opt_expr(visitor, exc.as_ref()),
        StmtKind::Assert { test, msg } => {
            walk_expr(visitor, test) && walk_opt_expr(visitor, msg.as_ref())
        }
        StmtKind::Delete { targets } => walk_exprs(visitor, targets),
        StmtKind::FunctionDef { body, .. } | StmtKind::ClassDef { body, .. } => {
            walk_block(visitor, body)
        }
        StmtKind::Import { .. }
        | StmtKind::Global { .. }
        | StmtKind::Nonlocal { .. }
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Other { .. } => true,
    };

    if keep_going {
        visitor.leave_stmt(stmt);
    }
    keep_going
}

/// Walk an expression and its children. Returns `false` if traversal was stopped.
pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) -> bool {
    match visitor.visit_expr(expr) {
        VisitResult::Stop => return false,
        VisitResult::SkipChildren => return true,
        VisitResult::Continue => {}
    }

    match expr {
        Expr::Name { .. } | Expr::Literal { .. } | Expr::Other { .. } => true,
        Expr::Attribute { value, .. }
        | Expr::Keyword { value, .. }
        | Expr::Await { value }
        | Expr::Starred { value } => walk_expr(visitor, value),
        Expr::UnaryOp { operand, .. } => walk_expr(visitor, operand),
        Expr::Call { func, args } => walk_expr(visitor, func) && walk_exprs(visitor, args),
        Expr::BinOp { left, right, .. } | Expr::BoolOp { left, right, .. } => {
            walk_expr(visitor, left) && walk_expr(visitor, right)
        }
        Expr::Compare {
            left, comparators, ..
        } => walk_expr(visitor, left) && walk_exprs(visitor, comparators),
        Expr::Subscript { value, index } => walk_expr(visitor, value) && walk_exprs(visitor, index),
        Expr::Collection { elements, .. } => walk_exprs(visitor, elements),
        Expr::Comprehension {
            element, clauses, ..
        } => walk_expr(visitor, element) && walk_exprs(visitor, clauses),
        Expr::Lambda { body, .. } => walk_expr(visitor, body),
        Expr::Conditional { test, body, orelse } => {
            walk_expr(visitor, test) && walk_expr(visitor, body) && walk_expr(visitor, orelse)
        }
        Expr::Yield { value } => walk_opt_expr(visitor, value.as_deref()),
    }
}

// ============================================================================
// Collectors
// ============================================================================

/// Collects the simple names of every call target in a body, in source order.
///
/// `self.helper()` and `helper()` both record `helper`; a call through a
/// computed receiver (`factory().create()`) records `create`.
#[derive(Debug, Default)]
pub struct CallCollector {
    pub callees: Vec<String>,
}

impl CallCollector {
    /// Collect call targets from a block.
    pub fn collect(block: &Block) -> Vec<String> {
        let mut collector = CallCollector::default();
        walk_block(&mut collector, block);
        collector.callees
    }
}

impl Visitor for CallCollector {
    fn visit_expr(&mut self, expr: &Expr) -> VisitResult {
        if let Expr::Call { func, .. } = expr {
            if let Some(name) = func.callee_name() {
                self.callees.push(name.to_string());
            }
        }
        VisitResult::Continue
    }
}

// ============================================================================
// Tests
// ============================================================================
