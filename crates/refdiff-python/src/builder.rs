// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Python Tree Builder: tree-sitter parse trees to declaration-tree models.
//!
//! One call to [`PythonTreeBuilder::build_file`] turns the source of one file
//! into its type declarations:
//! - the synthetic module container (always first) holding free functions
//! - every top-level class and every class nested in a class
//!
//! Operation bodies are lowered onto the closed statement/expression sums of
//! [`refdiff_core::ast`]. Grammar kinds without a dedicated variant become
//! `Other { kind, text }`. `ERROR` nodes in the parse tree are skipped, so a
//! file with syntax errors still yields every declaration tree-sitter could
//! recover.
//!
//! # Conventions
//!
//! | Source | Model |
//! |--------|-------|
//! | `@staticmethod` | `is_static`, no receiver |
//! | `@abstractmethod`, `@abc.abstractmethod` | `is_abstract` |
//! | first parameter of a non-static method | `receiver` |
//! | `class A(ABC)`, `metaclass=ABCMeta`, any abstract method | abstract class |
//! | superclass ending in `Enum` or `Flag` | [`TypeKind::Enum`] |
//! | class-level assignment, `self.x = ...` in `__init__` | [`Field`] |
//!
//! A later definition of the same qualified name in one file replaces the
//! earlier one, as it does at runtime.

use thiserror::Error;
use tracing::debug;
use tree_sitter::{Node, Parser};

use refdiff_core::ast::{
    Block, CollectionKind, ExceptHandler, Expr, LiteralKind, Statement, StmtKind,
};
use refdiff_core::error::RefdiffError;
use refdiff_core::model::{Field, Operation, Parameter, ParameterKind, TypeDecl, TypeKind};
use refdiff_core::types::Span;
use refdiff_core::visitor::{walk_block, VisitResult, Visitor};

use crate::files::FileError;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while building a model from Python sources.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The Python grammar could not be loaded into the parser.
    #[error("failed to load Python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// The parser produced no tree at all.
    #[error("failed to parse {path}")]
    ParseFailed { path: String },

    /// Reading the revision failed.
    #[error(transparent)]
    File(#[from] FileError),
}

/// Result type for build operations.
pub type BuildResult<T> = Result<T, BuildError>;

impl From<BuildError> for RefdiffError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::File(FileError::NotFound { path }) => RefdiffError::FileNotFound { path },
            BuildError::File(FileError::Io { path, source }) => RefdiffError::Io {
                path,
                message: source.to_string(),
            },
            other => RefdiffError::InternalError {
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Module Paths
// ============================================================================

/// Dotted module path of a revision-relative file path.
///
/// `pkg/util.py` becomes `pkg.util`; `pkg/__init__.py` becomes `pkg`.
pub fn module_path_for(path: &str) -> String {
    let path = path.replace('\\', "/");
    let stem = path.strip_suffix(".py").unwrap_or(&path);
    let dotted = stem.trim_start_matches("./").replace('/', ".");
    match dotted.strip_suffix(".__init__") {
        Some(package) => package.to_string(),
        None if dotted == "__init__" => String::new(),
        None => dotted,
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Reusable tree-sitter parser configured for Python.
pub struct PythonTreeBuilder {
    parser: Parser,
}

impl PythonTreeBuilder {
    /// Create a builder with the Python grammar loaded.
    pub fn new() -> BuildResult<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        Ok(PythonTreeBuilder { parser })
    }

    /// Build the type declarations of one file.
    ///
    /// The first element is always the module container of `path`.
    pub fn build_file(&mut self, path: &str, source: &str) -> BuildResult<Vec<TypeDecl>> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| BuildError::ParseFailed {
                path: path.to_string(),
            })?;
        let root = tree.root_node();
        if root.has_error() {
            debug!(path, "parse tree contains errors, skipping ERROR nodes");
        }

        let module = module_path_for(path);
        let mut file = FileBuilder::new(source.as_bytes(), &module, path);
        file.build_module(root);
        debug!(path, types = file.types.len(), "built file");
        Ok(file.types)
    }
}

/// Per-file lowering state.
struct FileBuilder<'a> {
    src: &'a [u8],
    module: &'a str,
    path: &'a str,
    /// Module container first, then classes in source order.
    types: Vec<TypeDecl>,
}

/// Where an operation is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Module,
    Class,
}

impl<'a> FileBuilder<'a> {
    fn new(src: &'a [u8], module: &'a str, path: &'a str) -> Self {
        FileBuilder {
            src,
            module,
            path,
            types: vec![TypeDecl::module_container(module, path)],
        }
    }

    fn text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.src).unwrap_or_default().to_string()
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn build_module(&mut self, root: Node<'_>) {
        for child in named_children(root) {
            let (definition, decorators) = self.unwrap_decorated(child);
            match definition.kind() {
                "class_definition" => self.build_class(definition, None),
                "function_definition" => {
                    let op = self.build_operation(definition, decorators, Owner::Module);
                    replace_or_push(&mut self.types[0].operations, op);
                }
                _ => {}
            }
        }
    }

    /// Split a `decorated_definition` into its definition and decorator texts.
    fn unwrap_decorated<'t>(&self, node: Node<'t>) -> (Node<'t>, Vec<String>) {
        if node.kind() != "decorated_definition" {
            return (node, Vec::new());
        }
        let decorators = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "decorator")
            .map(|d| {
                let text = self.text(d);
                text.trim_start_matches('@').trim().to_string()
            })
            .collect();
        match node.child_by_field_name("definition") {
            Some(definition) => (definition, decorators),
            None => (node, decorators),
        }
    }

    fn build_class(&mut self, node: Node<'_>, outer: Option<&str>) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let mut decl = TypeDecl::class(name.as_str(), self.module, self.path);
        if let Some(outer) = outer {
            decl.qualified_name = format!("{outer}.{name}");
            decl.outer = Some(outer.to_string());
        }
        decl.span = span_of(node);

        let mut metaclass = None;
        if let Some(bases) = node.child_by_field_name("superclasses") {
            for base in named_children(bases) {
                if base.kind() == "keyword_argument" {
                    if self.field_text(base, "name").as_deref() == Some("metaclass") {
                        metaclass = self.field_text(base, "value");
                    }
                    continue;
                }
                decl.superclasses.push(self.text(base));
            }
        }
        if decl.superclasses.iter().any(|s| is_enum_base(s)) {
            decl.kind = TypeKind::Enum;
        }

        let mut nested = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for child in named_children(body) {
                let (definition, decorators) = self.unwrap_decorated(child);
                match definition.kind() {
                    "function_definition" => {
                        let op = self.build_operation(definition, decorators, Owner::Class);
                        replace_or_push(&mut decl.operations, op);
                    }
                    "class_definition" => nested.push(definition),
                    "expression_statement" => self.class_level_fields(definition, &mut decl),
                    _ => {}
                }
            }
        }

        let constructor_fields: Vec<Field> = decl
            .operations
            .iter()
            .filter(|op| op.is_constructor)
            .flat_map(SelfFieldCollector::collect)
            .collect();
        for field in constructor_fields {
            if !decl.fields.iter().any(|f| f.name == field.name) {
                decl.fields.push(field);
            }
        }

        decl.is_abstract = decl.superclasses.iter().any(|s| s == "ABC" || s == "abc.ABC")
            || metaclass.as_deref().is_some_and(|m| m == "ABCMeta" || m == "abc.ABCMeta")
            || decl.operations.iter().any(|op| op.is_abstract);

        // A redefinition drops the earlier class together with its nested classes.
        let qualified = decl.qualified_name.clone();
        let nested_prefix = format!("{qualified}.");
        self.types.retain(|t| {
            t.qualified_name != qualified && !t.qualified_name.starts_with(&nested_prefix)
        });
        self.types.push(decl);

        for inner in nested {
            self.build_class(inner, Some(&qualified));
        }
    }

    fn class_level_fields(&self, statement: Node<'_>, decl: &mut TypeDecl) {
        for assignment in named_children(statement) {
            if assignment.kind() != "assignment" {
                continue;
            }
            let annotation = self.field_text(assignment, "type");
            let Some(left) = assignment.child_by_field_name("left") else {
                continue;
            };
            let names: Vec<Node<'_>> = if left.kind() == "identifier" {
                vec![left]
            } else {
                named_children(left)
                    .into_iter()
                    .filter(|n| n.kind() == "identifier")
                    .collect()
            };
            for target in names {
                let mut field = Field::new(self.text(target));
                field.annotation = annotation.clone();
                field.is_class_level = true;
                field.span = span_of(assignment);
                decl.fields.retain(|f| f.name != field.name);
                decl.fields.push(field);
            }
        }
    }

    fn build_operation(&self, node: Node<'_>, decorators: Vec<String>, owner: Owner) -> Operation {
        let name = self.field_text(node, "name").unwrap_or_default();
        let mut op = Operation::new(name);
        op.span = span_of(node);
        op.is_async = node.child(0).is_some_and(|c| c.kind() == "async");
        op.return_type = self.field_text(node, "return_type");
        op.is_static = decorators.iter().any(|d| d == "staticmethod");
        op.is_abstract = decorators
            .iter()
            .any(|d| d == "abstractmethod" || d.ends_with(".abstractmethod"));
        op.decorators = decorators;

        let mut params = node
            .child_by_field_name("parameters")
            .map(|p| self.build_parameters(p))
            .unwrap_or_default();
        if owner == Owner::Class
            && !op.is_static
            && params
                .first()
                .is_some_and(|p| p.kind == ParameterKind::Positional)
        {
            op.receiver = Some(params.remove(0).name);
        }
        op.params = params;

        op.body = node
            .child_by_field_name("body")
            .map(|b| self.build_block(b))
            .unwrap_or_default();
        op
    }

    fn build_parameters(&self, node: Node<'_>) -> Vec<Parameter> {
        let mut params = Vec::new();
        let mut keyword_only = false;
        for child in named_children(node) {
            let mut param = match child.kind() {
                "identifier" => Parameter::new(self.text(child)),
                "typed_parameter" => {
                    let inner = named_children(child).into_iter().next();
                    let mut param = match inner {
                        Some(inner) => self.splat_or_name(inner),
                        None => Parameter::new(""),
                    };
                    param.annotation = self.field_text(child, "type");
                    param
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = self.field_text(child, "name").unwrap_or_default();
                    let mut param = Parameter::new(name);
                    param.annotation = self.field_text(child, "type");
                    param.default = self.field_text(child, "value");
                    param
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => self.splat_or_name(child),
                "keyword_separator" => {
                    keyword_only = true;
                    continue;
                }
                _ => continue,
            };
            match param.kind {
                ParameterKind::VarArgs => keyword_only = true,
                ParameterKind::Positional if keyword_only => {
                    param.kind = ParameterKind::KeywordOnly
                }
                _ => {}
            }
            params.push(param);
        }
        params
    }

    fn splat_or_name(&self, node: Node<'_>) -> Parameter {
        let kind = match node.kind() {
            "list_splat_pattern" => ParameterKind::VarArgs,
            "dictionary_splat_pattern" => ParameterKind::KwArgs,
            _ => return Parameter::new(self.text(node)),
        };
        let name = named_children(node)
            .into_iter()
            .next()
            .map(|n| self.text(n))
            .unwrap_or_default();
        Parameter {
            kind,
            ..Parameter::new(name)
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn build_block(&self, node: Node<'_>) -> Block {
        named_children(node)
            .into_iter()
            .filter(|c| !c.is_error())
            .map(|c| self.build_stmt(c))
            .collect()
    }

    fn block_field(&self, node: Node<'_>, field: &str) -> Block {
        node.child_by_field_name(field)
            .map(|b| self.build_block(b))
            .unwrap_or_default()
    }

    /// Body of an `else_clause` (or `finally_clause`) node.
    fn clause_body(&self, node: Node<'_>) -> Block {
        if let Some(body) = node.child_by_field_name("body") {
            return self.build_block(body);
        }
        named_children(node)
            .into_iter()
            .find(|c| c.kind() == "block")
            .map(|b| self.build_block(b))
            .unwrap_or_default()
    }

    fn optional_clause(&self, node: Node<'_>, field: &str) -> Block {
        node.child_by_field_name(field)
            .map(|c| self.clause_body(c))
            .unwrap_or_default()
    }

    fn build_stmt(&self, node: Node<'_>) -> Statement {
        let kind = match node.kind() {
            "expression_statement" => self.expression_statement(node),
            "return_statement" => StmtKind::Return {
                value: first_named(node).map(|v| self.expr(v)),
            },
            "if_statement" => {
                let alternatives: Vec<Node<'_>> = {
                    let mut cursor = node.walk();
                    node.children_by_field_name("alternative", &mut cursor)
                        .collect()
                };
                StmtKind::If {
                    test: self.field_expr(node, "condition"),
                    body: self.block_field(node, "consequence"),
                    orelse: self.else_chain(&alternatives),
                }
            }
            "for_statement" => StmtKind::For {
                target: self.field_expr(node, "left"),
                iter: self.field_expr(node, "right"),
                body: self.block_field(node, "body"),
                orelse: self.optional_clause(node, "alternative"),
                is_async: node.child(0).is_some_and(|c| c.kind() == "async"),
            },
            "while_statement" => StmtKind::While {
                test: self.field_expr(node, "condition"),
                body: self.block_field(node, "body"),
                orelse: self.optional_clause(node, "alternative"),
            },
            "try_statement" => self.try_statement(node),
            "with_statement" => StmtKind::With {
                items: self.with_items(node),
                body: self.block_field(node, "body"),
            },
            "raise_statement" => StmtKind::Raise {
                exc: first_named(node).map(|e| self.expr(e)),
            },
            "assert_statement" => {
                let mut parts = named_children(node).into_iter().map(|n| self.expr(n));
                StmtKind::Assert {
                    test: parts.next().unwrap_or_else(missing),
                    msg: parts.next(),
                }
            }
            "delete_statement" => StmtKind::Delete {
                targets: match first_named(node).map(|t| self.expr(t)) {
                    Some(Expr::Collection {
                        kind: CollectionKind::Tuple,
                        elements,
                    }) => elements,
                    Some(target) => vec![target],
                    None => Vec::new(),
                },
            },
            "import_statement" => StmtKind::Import {
                module: String::new(),
                names: named_children(node)
                    .into_iter()
                    .map(|n| self.imported_name(n))
                    .collect(),
            },
            "import_from_statement" => {
                let mut cursor = node.walk();
                let mut names: Vec<String> = node
                    .children_by_field_name("name", &mut cursor)
                    .map(|n| self.imported_name(n))
                    .collect();
                if named_children(node).iter().any(|n| n.kind() == "wildcard_import") {
                    names.push("*".to_string());
                }
                StmtKind::Import {
                    module: self.field_text(node, "module_name").unwrap_or_default(),
                    names,
                }
            }
            "global_statement" => StmtKind::Global {
                names: named_children(node)
                    .into_iter()
                    .map(|n| self.text(n))
                    .collect(),
            },
            "nonlocal_statement" => StmtKind::Nonlocal {
                names: named_children(node)
                    .into_iter()
                    .map(|n| self.text(n))
                    .collect(),
            },
            "pass_statement" => StmtKind::Pass,
            "break_statement" => StmtKind::Break,
            "continue_statement" => StmtKind::Continue,
            "function_definition" => StmtKind::FunctionDef {
                name: self.field_text(node, "name").unwrap_or_default(),
                body: self.block_field(node, "body"),
            },
            "class_definition" => StmtKind::ClassDef {
                name: self.field_text(node, "name").unwrap_or_default(),
                body: self.block_field(node, "body"),
            },
            "decorated_definition" => {
                let (definition, _) = self.unwrap_decorated(node);
                if definition.kind() == "decorated_definition" {
                    self.other_stmt(node)
                } else {
                    return Statement::new(self.build_stmt(definition).kind, span_of(node));
                }
            }
            _ => self.other_stmt(node),
        };
        Statement::new(kind, span_of(node))
    }

    fn other_stmt(&self, node: Node<'_>) -> StmtKind {
        StmtKind::Other {
            kind: node.kind().to_string(),
            text: self.text(node),
        }
    }

    fn expression_statement(&self, node: Node<'_>) -> StmtKind {
        let children = named_children(node);
        match children.as_slice() {
            [single] if single.kind() == "assignment" => self.assignment(*single),
            [single] if single.kind() == "augmented_assignment" => StmtKind::AugAssign {
                target: self.field_expr(*single, "left"),
                op: self.field_text(*single, "operator").unwrap_or_default(),
                value: self.field_expr(*single, "right"),
            },
            [single] => StmtKind::Expr {
                value: self.expr(*single),
            },
            many => StmtKind::Expr {
                value: Expr::Collection {
                    kind: CollectionKind::Tuple,
                    elements: many.iter().map(|n| self.expr(*n)).collect(),
                },
            },
        }
    }

    /// `a = b = value` collects both targets.
    fn assignment(&self, node: Node<'_>) -> StmtKind {
        let annotation = self.field_text(node, "type");
        let mut targets = Vec::new();
        let mut current = node;
        let value = loop {
            if let Some(left) = current.child_by_field_name("left") {
                targets.push(self.expr(left));
            }
            match current.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = right,
                Some(right) => break Some(self.expr(right)),
                None => break None,
            }
        };
        StmtKind::Assign {
            targets,
            value,
            annotation,
        }
    }

    /// `elif` clauses nest as a single `If` in the else branch.
    fn else_chain(&self, alternatives: &[Node<'_>]) -> Block {
        let Some((first, rest)) = alternatives.split_first() else {
            return Vec::new();
        };
        if first.kind() == "elif_clause" {
            let nested = StmtKind::If {
                test: self.field_expr(*first, "condition"),
                body: self.block_field(*first, "consequence"),
                orelse: self.else_chain(rest),
            };
            vec![Statement::new(nested, span_of(*first))]
        } else {
            self.clause_body(*first)
        }
    }

    fn try_statement(&self, node: Node<'_>) -> StmtKind {
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "except_clause" | "except_group_clause" => {
                    handlers.push(self.except_handler(child))
                }
                "else_clause" => orelse = self.clause_body(child),
                "finally_clause" => finalbody = self.clause_body(child),
                _ => {}
            }
        }
        StmtKind::Try {
            body: self.block_field(node, "body"),
            handlers,
            orelse,
            finalbody,
        }
    }

    fn except_handler(&self, node: Node<'_>) -> ExceptHandler {
        let children = named_children(node);
        let body = children
            .iter()
            .find(|c| c.kind() == "block")
            .map(|b| self.build_block(*b))
            .unwrap_or_default();
        let parts: Vec<Node<'_>> = children
            .into_iter()
            .filter(|c| c.kind() != "block")
            .collect();

        let (types, name) = match parts.as_slice() {
            [] => (Vec::new(), None),
            [pattern] if pattern.kind() == "as_pattern" => {
                let inner = named_children(*pattern);
                let types = inner
                    .first()
                    .map(|t| vec![self.expr(*t)])
                    .unwrap_or_default();
                let name = pattern
                    .child_by_field_name("alias")
                    .or_else(|| inner.get(1).copied())
                    .map(|a| self.text(a));
                (types, name)
            }
            [exc] => (vec![self.expr(*exc)], None),
            [exc, alias, ..] => (vec![self.expr(*exc)], Some(self.text(*alias))),
        };
        ExceptHandler { types, name, body }
    }

    fn with_items(&self, node: Node<'_>) -> Vec<Expr> {
        let mut items = Vec::new();
        for clause in named_children(node) {
            if clause.kind() != "with_clause" {
                continue;
            }
            for item in named_children(clause) {
                let Some(value) = item.child_by_field_name("value") else {
                    continue;
                };
                // `open(p) as f` keeps the context expression only.
                let context = if value.kind() == "as_pattern" {
                    first_named(value).unwrap_or(value)
                } else {
                    value
                };
                items.push(self.expr(context));
            }
        }
        items
    }

    fn imported_name(&self, node: Node<'_>) -> String {
        if node.kind() == "aliased_import" {
            self.field_text(node, "name").unwrap_or_default()
        } else {
            self.text(node)
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn field_expr(&self, node: Node<'_>, field: &str) -> Expr {
        node.child_by_field_name(field)
            .map(|n| self.expr(n))
            .unwrap_or_else(missing)
    }

    fn boxed(&self, node: Node<'_>, field: &str) -> Box<Expr> {
        Box::new(self.field_expr(node, field))
    }

    fn exprs(&self, node: Node<'_>) -> Vec<Expr> {
        named_children(node)
            .into_iter()
            .map(|n| self.expr(n))
            .collect()
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        match node.kind() {
            "identifier" => Expr::name(self.text(node)),
            "attribute" => Expr::Attribute {
                value: self.boxed(node, "object"),
                attr: self.field_text(node, "attribute").unwrap_or_default(),
            },
            "call" => {
                let args = match node.child_by_field_name("arguments") {
                    Some(a) if a.kind() == "argument_list" => self.exprs(a),
                    Some(a) => vec![self.expr(a)],
                    None => Vec::new(),
                };
                Expr::Call {
                    func: self.boxed(node, "function"),
                    args,
                }
            }
            "keyword_argument" => Expr::Keyword {
                name: self.field_text(node, "name").unwrap_or_default(),
                value: self.boxed(node, "value"),
            },
            "string" | "concatenated_string" => Expr::literal(LiteralKind::Str, self.text(node)),
            "integer" => Expr::literal(LiteralKind::Int, self.text(node)),
            "float" => Expr::literal(LiteralKind::Float, self.text(node)),
            "true" | "false" => Expr::literal(LiteralKind::Bool, self.text(node)),
            "none" => Expr::literal(LiteralKind::None, self.text(node)),
            "ellipsis" => Expr::literal(LiteralKind::Ellipsis, "..."),
            "binary_operator" => Expr::BinOp {
                op: self.operator(node),
                left: self.boxed(node, "left"),
                right: self.boxed(node, "right"),
            },
            "boolean_operator" => Expr::BoolOp {
                op: self.operator(node),
                left: self.boxed(node, "left"),
                right: self.boxed(node, "right"),
            },
            "unary_operator" => Expr::UnaryOp {
                op: self.operator(node),
                operand: self.boxed(node, "argument"),
            },
            "not_operator" => Expr::UnaryOp {
                op: "not".to_string(),
                operand: self.boxed(node, "argument"),
            },
            "comparison_operator" => self.comparison(node),
            "subscript" => {
                let mut cursor = node.walk();
                let index = node
                    .children_by_field_name("subscript", &mut cursor)
                    .map(|n| self.expr(n))
                    .collect();
                Expr::Subscript {
                    value: self.boxed(node, "value"),
                    index,
                }
            }
            "list" | "list_pattern" => self.collection(node, CollectionKind::List),
            "tuple" | "tuple_pattern" | "expression_list" | "pattern_list" => {
                self.collection(node, CollectionKind::Tuple)
            }
            "set" => self.collection(node, CollectionKind::Set),
            "dictionary" => {
                let mut elements = Vec::new();
                for child in named_children(node) {
                    if child.kind() == "pair" {
                        elements.push(self.field_expr(child, "key"));
                        elements.push(self.field_expr(child, "value"));
                    } else {
                        elements.push(self.expr(child));
                    }
                }
                Expr::Collection {
                    kind: CollectionKind::Dict,
                    elements,
                }
            }
            "list_comprehension" => self.comprehension(node, CollectionKind::List),
            "set_comprehension" => self.comprehension(node, CollectionKind::Set),
            "dictionary_comprehension" => self.comprehension(node, CollectionKind::Dict),
            "generator_expression" => self.comprehension(node, CollectionKind::Generator),
            "lambda" => Expr::Lambda {
                params: node
                    .child_by_field_name("parameters")
                    .map(|p| self.build_parameters(p).into_iter().map(|p| p.name).collect())
                    .unwrap_or_default(),
                body: self.boxed(node, "body"),
            },
            "conditional_expression" => {
                let mut parts = named_children(node).into_iter().map(|n| self.expr(n));
                let body = parts.next().unwrap_or_else(missing);
                let test = parts.next().unwrap_or_else(missing);
                let orelse = parts.next().unwrap_or_else(missing);
                Expr::Conditional {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                }
            }
            "await" => Expr::Await {
                value: self.first_expr(node),
            },
            "yield" => Expr::Yield {
                value: first_named(node).map(|n| Box::new(self.expr(n))),
            },
            "list_splat"
            | "dictionary_splat"
            | "list_splat_pattern"
            | "dictionary_splat_pattern" => Expr::Starred {
                value: self.first_expr(node),
            },
            "parenthesized_expression" | "type" => match first_named(node) {
                Some(inner) => self.expr(inner),
                None => self.other_expr(node),
            },
            _ => self.other_expr(node),
        }
    }

    fn other_expr(&self, node: Node<'_>) -> Expr {
        Expr::Other {
            kind: node.kind().to_string(),
            text: self.text(node),
        }
    }

    fn first_expr(&self, node: Node<'_>) -> Box<Expr> {
        Box::new(first_named(node).map_or_else(missing, |n| self.expr(n)))
    }

    /// Operator token, taken from the grammar kind so `not in` has one spelling.
    fn operator(&self, node: Node<'_>) -> String {
        node.child_by_field_name("operator")
            .map(|o| o.kind().to_string())
            .unwrap_or_default()
    }

    fn comparison(&self, node: Node<'_>) -> Expr {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "comment" {
                continue;
            }
            if child.is_named() {
                operands.push(self.expr(child));
            } else {
                ops.push(child.kind().to_string());
            }
        }
        let mut operands = operands.into_iter();
        Expr::Compare {
            left: Box::new(operands.next().unwrap_or_else(missing)),
            ops,
            comparators: operands.collect(),
        }
    }

    fn collection(&self, node: Node<'_>, kind: CollectionKind) -> Expr {
        Expr::Collection {
            kind,
            elements: self.exprs(node),
        }
    }

    fn comprehension(&self, node: Node<'_>, kind: CollectionKind) -> Expr {
        let element = match node.child_by_field_name("body") {
            Some(pair) if pair.kind() == "pair" => Expr::Collection {
                kind: CollectionKind::Dict,
                elements: vec![self.field_expr(pair, "key"), self.field_expr(pair, "value")],
            },
            Some(body) => self.expr(body),
            None => missing(),
        };
        let mut clauses = Vec::new();
        for clause in named_children(node) {
            match clause.kind() {
                "for_in_clause" => {
                    clauses.push(self.field_expr(clause, "left"));
                    clauses.push(self.field_expr(clause, "right"));
                }
                "if_clause" => clauses.extend(self.exprs(clause)),
                _ => {}
            }
        }
        Expr::Comprehension {
            kind,
            element: Box::new(element),
            clauses,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Named children without comments.
fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

fn first_named<'t>(node: Node<'t>) -> Option<Node<'t>> {
    named_children(node).into_iter().next()
}

fn missing() -> Expr {
    Expr::Other {
        kind: "missing".to_string(),
        text: String::new(),
    }
}

fn span_of(node: Node<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span::new(
        start.row as u32 + 1,
        start.column as u32 + 1,
        end.row as u32 + 1,
        end.column as u32 + 1,
    )
}

/// Superclass text such as `Enum`, `enum.IntEnum` or `Flag[int]`.
fn is_enum_base(superclass: &str) -> bool {
    let base = superclass.split('[').next().unwrap_or(superclass);
    let last = base.rsplit('.').next().unwrap_or(base);
    last.ends_with("Enum") || last.ends_with("Flag")
}

/// Later definitions of the same name replace earlier ones.
fn replace_or_push(operations: &mut Vec<Operation>, op: Operation) {
    operations.retain(|existing| existing.name != op.name);
    operations.push(op);
}

/// Collects `self.<name> = ...` targets of a constructor body.
struct SelfFieldCollector<'o> {
    receiver: &'o str,
    fields: Vec<Field>,
}

impl SelfFieldCollector<'_> {
    fn collect(op: &Operation) -> Vec<Field> {
        let Some(receiver) = op.receiver.as_deref() else {
            return Vec::new();
        };
        let mut collector = SelfFieldCollector {
            receiver,
            fields: Vec::new(),
        };
        walk_block(&mut collector, &op.body);
        collector.fields
    }
}

impl Visitor for SelfFieldCollector<'_> {
    fn visit_stmt(&mut self, stmt: &Statement) -> VisitResult {
        let (targets, annotation) = match &stmt.kind {
            StmtKind::FunctionDef { .. } | StmtKind::ClassDef { .. } => {
                return VisitResult::SkipChildren
            }
            StmtKind::Assign {
                targets,
                annotation,
                ..
            } => (targets.as_slice(), annotation),
            _ => return VisitResult::Continue,
        };
        for target in targets {
            let Expr::Attribute { value, attr } = target else {
                continue;
            };
            if !matches!(value.as_ref(), Expr::Name { id } if id == self.receiver) {
                continue;
            }
            if self.fields.iter().any(|f| &f.name == attr) {
                continue;
            }
            let mut field = Field::new(attr.as_str());
            field.annotation = annotation.clone();
            field.span = stmt.span;
            self.fields.push(field);
        }
        VisitResult::Continue
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use refdiff_core::model::Visibility;

    fn build(path: &str, source: &str) -> Vec<TypeDecl> {
        PythonTreeBuilder::new()
            .unwrap()
            .build_file(path, source)
            .unwrap()
    }

    fn class<'t>(types: &'t [TypeDecl], qualified_name: &str) -> &'t TypeDecl {
        types
            .iter()
            .find(|t| t.qualified_name == qualified_name)
            .unwrap_or_else(|| panic!("no type {qualified_name}"))
    }

    fn op<'t>(decl: &'t TypeDecl, name: &str) -> &'t Operation {
        decl.operations
            .iter()
            .find(|o| o.name == name)
            .unwrap_or_else(|| panic!("no operation {name}"))
    }

    mod module_path_tests {
        use super::*;

        #[test]
        fn plain_file() {
            assert_eq!(module_path_for("calc.py"), "calc");
        }

        #[test]
        fn nested_package_file() {
            assert_eq!(module_path_for("pkg/sub/util.py"), "pkg.sub.util");
        }

        #[test]
        fn package_init() {
            assert_eq!(module_path_for("pkg/__init__.py"), "pkg");
        }

        #[test]
        fn windows_separators() {
            assert_eq!(module_path_for("pkg\\util.py"), "pkg.util");
        }
    }

    mod declaration_tests {
        use super::*;

        #[test]
        fn module_container_comes_first() {
            let types = build("calc.py", "def main():\n    pass\n\nclass A:\n    pass\n");
            assert_eq!(types.len(), 2);
            assert!(types[0].is_module());
            assert_eq!(types[0].qualified_name, "calc");
            assert_eq!(types[0].operations[0].name, "main");
            assert_eq!(types[0].operations[0].receiver, None);
            assert_eq!(types[1].qualified_name, "calc.A");
        }

        #[test]
        fn nested_classes_are_qualified() {
            let source = r#"class Outer:
    class Inner:
        def f(self):
            return 1
"#;
            let types = build("m.py", source);
            let inner = class(&types, "m.Outer.Inner");
            assert_eq!(inner.outer.as_deref(), Some("m.Outer"));
            assert_eq!(inner.operations.len(), 1);
            assert!(class(&types, "m.Outer").operations.is_empty());
        }

        #[test]
        fn superclasses_and_metaclass() {
            let source = r#"class A(Base, metaclass=ABCMeta):
    pass

class B(abc.ABC):
    pass

class C(Base):
    pass
"#;
            let types = build("m.py", source);
            let a = class(&types, "m.A");
            assert_eq!(a.superclasses, vec!["Base"]);
            assert!(a.is_abstract);
            assert!(class(&types, "m.B").is_abstract);
            assert!(!class(&types, "m.C").is_abstract);
        }

        #[test]
        fn enum_classes() {
            let source = "class Color(enum.Enum):\n    RED = 1\n    GREEN = 2\n";
            let types = build("m.py", source);
            let color = class(&types, "m.Color");
            assert_eq!(color.kind, TypeKind::Enum);
            let names: Vec<&str> = color.fields.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["RED", "GREEN"]);
            assert!(color.fields.iter().all(|f| f.is_class_level));
        }

        #[test]
        fn redefinition_keeps_last() {
            let source = r#"class A:
    def f(self):
        pass

class A:
    def g(self):
        pass
"#;
            let types = build("m.py", source);
            assert_eq!(
                types.iter().filter(|t| t.qualified_name == "m.A").count(),
                1
            );
            let a = class(&types, "m.A");
            assert_eq!(a.operations.len(), 1);
            assert_eq!(a.operations[0].name, "g");
        }

        #[test]
        fn private_class_visibility() {
            let types = build("m.py", "class _Hidden:\n    pass\n");
            assert_eq!(class(&types, "m._Hidden").visibility, Visibility::Protected);
        }

        #[test]
        fn syntax_errors_do_not_lose_valid_classes() {
            let source = "class Good:\n    def ok(self):\n        return 1\n\ndef broken(:\n";
            let types = build("m.py", source);
            assert!(types.iter().any(|t| t.qualified_name == "m.Good"));
        }
    }

    mod operation_tests {
        use super::*;

        #[test]
        fn receiver_is_split_from_parameters() {
            let source = "class A:\n    def f(self, x, y=2):\n        return x\n";
            let types = build("m.py", source);
            let f = op(class(&types, "m.A"), "f");
            assert_eq!(f.receiver.as_deref(), Some("self"));
            assert_eq!(f.param_names(), vec!["x", "y"]);
            assert_eq!(f.params[1].default.as_deref(), Some("2"));
        }

        #[test]
        fn static_and_class_methods() {
            let source = r#"class A:
    @staticmethod
    def s(x):
        return x

    @classmethod
    def c(cls, x):
        return x
"#;
            let types = build("m.py", source);
            let a = class(&types, "m.A");
            let s = op(a, "s");
            assert!(s.is_static);
            assert_eq!(s.receiver, None);
            assert_eq!(s.param_names(), vec!["x"]);
            let c = op(a, "c");
            assert!(!c.is_static);
            assert_eq!(c.receiver.as_deref(), Some("cls"));
            assert_eq!(c.decorators, vec!["classmethod"]);
        }

        #[test]
        fn abstract_method_makes_class_abstract() {
            let source = r#"class Shape:
    @abc.abstractmethod
    def area(self) -> float:
        ...
"#;
            let types = build("m.py", source);
            let shape = class(&types, "m.Shape");
            let area = op(shape, "area");
            assert!(area.is_abstract);
            assert_eq!(area.return_type.as_deref(), Some("float"));
            assert!(shape.is_abstract);
        }

        #[test]
        fn parameter_kinds_and_annotations() {
            let source = r#"def f(a: int, *args, key: str = 'k', **kwargs):
    pass

def g(a, *, b):
    pass
"#;
            let types = build("m.py", source);
            let module = &types[0];
            let f = op(module, "f");
            let kinds: Vec<ParameterKind> = f.params.iter().map(|p| p.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    ParameterKind::Positional,
                    ParameterKind::VarArgs,
                    ParameterKind::KeywordOnly,
                    ParameterKind::KwArgs,
                ]
            );
            assert_eq!(f.params[0].annotation.as_deref(), Some("int"));
            assert_eq!(f.params[1].name, "args");
            assert_eq!(f.params[2].annotation.as_deref(), Some("str"));
            let g = op(module, "g");
            assert_eq!(g.params[1].kind, ParameterKind::KeywordOnly);
        }

        #[test]
        fn async_and_constructor_flags() {
            let source = r#"class A:
    def __init__(self):
        pass

    async def fetch(self):
        pass
"#;
            let types = build("m.py", source);
            let a = class(&types, "m.A");
            assert!(op(a, "__init__").is_constructor);
            assert!(op(a, "fetch").is_async);
        }

        #[test]
        fn constructor_assignments_become_fields() {
            let source = r#"class A:
    count: int = 0

    def __init__(self, x):
        self.x = x
        self._y: list = []
        if x:
            self.__z = 1
        self.count = 1
"#;
            let types = build("m.py", source);
            let a = class(&types, "m.A");
            let names: Vec<&str> = a.fields.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["count", "x", "_y", "__z"]);
            assert!(a.fields[0].is_class_level);
            assert_eq!(a.fields[0].annotation.as_deref(), Some("int"));
            assert_eq!(a.fields[2].visibility, Visibility::Protected);
            assert_eq!(a.fields[3].visibility, Visibility::Private);
        }
    }

    mod statement_tests {
        use super::*;

        fn body(source: &str) -> Block {
            let types = build("m.py", source);
            types[0].operations[0].body.clone()
        }

        #[test]
        fn assignment_and_call() {
            let source = "def f():\n    x = helper(1, key=2)\n    x += 1\n    return x\n";
            let body = body(source);
            assert_eq!(body.len(), 3);
            let StmtKind::Assign { targets, value, .. } = &body[0].kind else {
                panic!("expected assignment, got {:?}", body[0].kind);
            };
            assert_eq!(targets, &[Expr::name("x")]);
            let Some(Expr::Call { func, args }) = value else {
                panic!("expected call");
            };
            assert_eq!(func.callee_name(), Some("helper"));
            assert!(matches!(&args[1], Expr::Keyword { name, .. } if name == "key"));
            assert!(matches!(&body[1].kind, StmtKind::AugAssign { op, .. } if op == "+="));
            assert!(matches!(&body[2].kind, StmtKind::Return { value: Some(_) }));
        }

        #[test]
        fn elif_chain_nests() {
            let source = r#"def f(x):
    if x > 1:
        return 1
    elif x < 0:
        return 2
    else:
        return 3
"#;
            let body = body(source);
            let StmtKind::If { test, orelse, .. } = &body[0].kind else {
                panic!("expected if");
            };
            assert!(matches!(test, Expr::Compare { ops, .. } if ops == &[">"]));
            assert_eq!(orelse.len(), 1);
            let StmtKind::If { orelse: inner, .. } = &orelse[0].kind else {
                panic!("expected nested if");
            };
            assert!(matches!(inner[0].kind, StmtKind::Return { .. }));
        }

        #[test]
        fn loops_and_try() {
            let source = r#"def f(items):
    for i in items:
        continue
    while True:
        break
    try:
        pass
    except ValueError as e:
        raise
    finally:
        cleanup()
"#;
            let body = body(source);
            assert!(matches!(body[0].kind, StmtKind::For { .. }));
            assert!(matches!(body[1].kind, StmtKind::While { .. }));
            let StmtKind::Try {
                handlers,
                finalbody,
                ..
            } = &body[2].kind
            else {
                panic!("expected try");
            };
            assert_eq!(handlers.len(), 1);
            assert_eq!(handlers[0].types, vec![Expr::name("ValueError")]);
            assert_eq!(handlers[0].name.as_deref(), Some("e"));
            assert_eq!(finalbody.len(), 1);
        }

        #[test]
        fn method_call_on_receiver() {
            let types = build("m.py", "class A:\n    def f(self):\n        self.g(1)\n");
            let f = op(class(&types, "m.A"), "f");
            let StmtKind::Expr {
                value: Expr::Call { func, .. },
            } = &f.body[0].kind
            else {
                panic!("expected call statement");
            };
            assert_eq!(func.dotted().as_deref(), Some("self.g"));
        }

        #[test]
        fn unknown_constructs_become_other() {
            let source = "def f(x):\n    match x:\n        case 1:\n            pass\n";
            let body = body(source);
            assert!(
                matches!(&body[0].kind, StmtKind::Other { kind, .. } if kind == "match_statement")
            );
        }

        #[test]
        fn spans_are_one_indexed() {
            let body = body("def f():\n    return 1\n");
            assert_eq!(body[0].span.start_line, 2);
            assert_eq!(body[0].span.start_col, 5);
        }
    }
}
