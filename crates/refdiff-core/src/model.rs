//! Declaration model: the whole-program view of one revision.
//!
//! This module provides the data model consumed by the matcher:
//! - [`Model`]: every type declaration of a revision, grouped by file
//! - [`TypeDecl`]: a class (or the synthetic module-level container of a file)
//! - [`Operation`]: a method or free function, with its structured body
//! - [`Parameter`] and [`Field`]: single-variable declarations
//!
//! # Ownership
//!
//! Operations are owned by exactly one [`TypeDecl`]. Free functions belong to
//! the synthetic container of kind [`TypeKind::Module`] of their file. Each
//! type belongs to exactly one file. Cross references use index newtypes
//! ([`TypeId`], [`OperationRef`]) into the owning model rather than pointers.
//!
//! # Visibility Model
//!
//! | Python name | Visibility |
//! |-------------|------------|
//! | `name`, `__dunder__` | [`Visibility::Public`] |
//! | `_name` | [`Visibility::Protected`] |
//! | `__name` | [`Visibility::Private`] |
//!
//! Visibility is computed once by the tree builder and stored; the matcher
//! never looks at naming conventions.
//!
//! # Lifecycle
//!
//! A model is built once per revision and is read-only afterwards: [`Model`]
//! exposes no mutation API.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::Block;
use crate::types::Span;

// ============================================================================
// ID Types
// ============================================================================

/// Index of a type declaration within a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Create a new type ID.
    pub fn new(id: u32) -> Self {
        TypeId(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type_{}", self.0)
    }
}

/// Position of an operation: owning type plus index in its operation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct OperationRef {
    pub owner: TypeId,
    pub index: u32,
}

impl OperationRef {
    /// Create a new operation reference.
    pub fn new(owner: TypeId, index: u32) -> Self {
        OperationRef { owner, index }
    }
}

impl fmt::Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op_{}_{}", self.owner.0, self.index)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Access level, derived from Python naming conventions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// Infer visibility from a Python identifier.
    ///
    /// Dunder names (`__init__`) are public; a leading double underscore
    /// without the trailing pair is name-mangled and therefore private.
    pub fn from_python_name(name: &str) -> Self {
        if name.starts_with("__") && name.ends_with("__") && name.len() > 4 {
            Visibility::Public
        } else if name.starts_with("__") {
            Visibility::Private
        } else if name.starts_with('_') {
            Visibility::Protected
        } else {
            Visibility::Public
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of type declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Enum,
    /// Synthetic container for the free functions of one file.
    Module,
}

impl TypeKind {
    pub fn is_module(&self) -> bool {
        matches!(self, TypeKind::Module)
    }
}

/// Boolean modifier carried by operations and types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Static,
    Abstract,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Static => f.write_str("static"),
            Modifier::Abstract => f.write_str("abstract"),
        }
    }
}

/// Kind of parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[default]
    Positional,
    KeywordOnly,
    /// `*args`
    VarArgs,
    /// `**kwargs`
    KwArgs,
}

// ============================================================================
// Declarations
// ============================================================================

/// A parameter of an operation. The implicit receiver is not a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Best-effort annotation text.
    pub annotation: Option<String>,
    /// Default value text.
    pub default: Option<String>,
    pub kind: ParameterKind,
}

impl Parameter {
    /// Positional parameter without annotation or default.
    pub fn new(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            annotation: None,
            default: None,
            kind: ParameterKind::Positional,
        }
    }

    /// Parameter with a type annotation.
    pub fn typed(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Parameter {
            annotation: Some(annotation.into()),
            ..Parameter::new(name)
        }
    }
}

/// A field: class-level assignment or `self.<name>` assigned in the constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub annotation: Option<String>,
    pub visibility: Visibility,
    /// Declared at class level rather than on the instance.
    pub is_class_level: bool,
    pub span: Span,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Field {
            visibility: Visibility::from_python_name(&name),
            name,
            annotation: None,
            is_class_level: false,
            span: Span::default(),
        }
    }
}

/// A method or free function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    /// Name of the implicit receiver (`self`, `cls`), if any.
    pub receiver: Option<String>,
    pub params: Vec<Parameter>,
    /// Best-effort return annotation text.
    pub return_type: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_constructor: bool,
    pub is_async: bool,
    /// Decorator texts without the leading `@`.
    pub decorators: Vec<String>,
    pub body: Block,
    pub span: Span,
}

impl Operation {
    /// Create an operation with an empty body and no parameters.
    ///
    /// Visibility and the constructor flag are inferred from the name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Operation {
            visibility: Visibility::from_python_name(&name),
            is_constructor: name == "__init__",
            name,
            receiver: None,
            params: Vec::new(),
            return_type: None,
            is_static: false,
            is_abstract: false,
            is_async: false,
            decorators: Vec::new(),
            body: Vec::new(),
            span: Span::default(),
        }
    }

    /// Method with a `self` receiver.
    pub fn method(name: impl Into<String>) -> Self {
        Operation {
            receiver: Some("self".to_string()),
            ..Operation::new(name)
        }
    }

    pub fn with_params(mut self, params: Vec<Parameter>) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Block) -> Self {
        self.body = body;
        self
    }

    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    /// Dunder names like `__init__` or `__eq__`.
    pub fn is_dunder(&self) -> bool {
        self.name.len() > 4 && self.name.starts_with("__") && self.name.ends_with("__")
    }

    /// Coarse signature: name plus parameter types (`_` when unannotated).
    ///
    /// `def sum(self, x: int, y)` yields `sum(int, _)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let ty = p.annotation.as_deref().unwrap_or("_");
                match p.kind {
                    ParameterKind::VarArgs => format!("*{ty}"),
                    ParameterKind::KwArgs => format!("**{ty}"),
                    _ => ty.to_string(),
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    /// Current value of a modifier flag.
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Static => self.is_static,
            Modifier::Abstract => self.is_abstract,
        }
    }
}

/// A type declaration (class, enum, or synthetic module container).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    /// Simple name. For module containers, the last module path segment.
    pub name: String,
    /// Module path plus enclosing class names plus `name`.
    /// For module containers, the module path.
    pub qualified_name: String,
    /// Dotted module path of the defining file.
    pub module: String,
    /// Revision-relative path of the defining file.
    pub file: String,
    pub kind: TypeKind,
    /// Superclass expressions as written (`Base`, `abc.ABC`).
    pub superclasses: Vec<String>,
    /// Qualified name of the enclosing class for nested classes.
    pub outer: Option<String>,
    pub visibility: Visibility,
    pub is_abstract: bool,
    pub operations: Vec<Operation>,
    pub fields: Vec<Field>,
    pub span: Span,
}

impl TypeDecl {
    /// Create a top-level class.
    pub fn class(
        name: impl Into<String>,
        module: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let module = module.into();
        TypeDecl {
            qualified_name: qualify(&module, &name),
            visibility: Visibility::from_python_name(&name),
            name,
            module,
            file: file.into(),
            kind: TypeKind::Class,
            superclasses: Vec::new(),
            outer: None,
            is_abstract: false,
            operations: Vec::new(),
            fields: Vec::new(),
            span: Span::default(),
        }
    }

    /// Create the synthetic module-level container of a file.
    pub fn module_container(module: impl Into<String>, file: impl Into<String>) -> Self {
        let module = module.into();
        let name = module.rsplit('.').next().unwrap_or_default().to_string();
        TypeDecl {
            name,
            qualified_name: module.clone(),
            module,
            file: file.into(),
            kind: TypeKind::Module,
            superclasses: Vec::new(),
            outer: None,
            visibility: Visibility::Public,
            is_abstract: false,
            operations: Vec::new(),
            fields: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_superclasses(mut self, superclasses: &[&str]) -> Self {
        self.superclasses = superclasses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn is_module(&self) -> bool {
        self.kind.is_module()
    }

    /// Whether `modifier` applies to this type. Types are never static.
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Static => false,
            Modifier::Abstract => self.is_abstract,
        }
    }
}

/// Join a module path and a name with a dot, skipping an empty module.
pub fn qualify(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{module}.{name}")
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Invariant violations in a model handed to the diff engine.
///
/// These indicate a bug in the producer of the model, not a property of the
/// analysed source code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Two declarations share the same identity.
    #[error("duplicate type '{qualified_name}' in {file}")]
    DuplicateType { qualified_name: String, file: String },

    /// A type has no owning file.
    #[error("type '{qualified_name}' has an empty file path")]
    EmptyFilePath { qualified_name: String },

    /// A type names a file the model does not contain.
    #[error("type '{qualified_name}' refers to unknown file {file}")]
    UnknownFile { qualified_name: String, file: String },

    /// A file is listed twice.
    #[error("file listed twice: {file}")]
    DuplicateFile { file: String },

    /// An operation reference points outside the model.
    #[error("operation reference {reference} does not exist")]
    DanglingOperation { reference: String },
}

// ============================================================================
// Model
// ============================================================================

/// Whole-program model of one revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    files: Vec<String>,
    types: Vec<TypeDecl>,
}

impl Model {
    /// Create a model from its files and type declarations.
    ///
    /// Files referenced by types but missing from `files` are added. Call
    /// [`Model::validate`] (or `diff`, which does) to check invariants.
    pub fn new(files: Vec<String>, types: Vec<TypeDecl>) -> Self {
        let mut files = files;
        let mut known: HashSet<String> = files.iter().cloned().collect();
        for ty in &types {
            if !ty.file.is_empty() && known.insert(ty.file.clone()) {
                files.push(ty.file.clone());
            }
        }
        Model { files, types }
    }

    /// Create a model whose file list is derived from the types.
    pub fn from_types(types: Vec<TypeDecl>) -> Self {
        Model::new(Vec::new(), types)
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn types(&self) -> &[TypeDecl] {
        &self.types
    }

    /// Iterate types with their IDs in declaration order.
    pub fn type_entries(&self) -> impl Iterator<Item = (TypeId, &TypeDecl)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (TypeId::new(i as u32), t))
    }

    /// Class and enum declarations, excluding module containers.
    pub fn classes(&self) -> impl Iterator<Item = (TypeId, &TypeDecl)> {
        self.type_entries().filter(|(_, t)| !t.is_module())
    }

    pub fn type_decl(&self, id: TypeId) -> Option<&TypeDecl> {
        self.types.get(id.index())
    }

    pub fn operation(&self, op: OperationRef) -> Option<&Operation> {
        self.type_decl(op.owner)
            .and_then(|t| t.operations.get(op.index as usize))
    }

    /// Iterate every operation with its reference, types in order.
    pub fn operations(&self) -> impl Iterator<Item = (OperationRef, &Operation)> {
        self.type_entries().flat_map(|(tid, t)| {
            t.operations
                .iter()
                .enumerate()
                .map(move |(i, op)| (OperationRef::new(tid, i as u32), op))
        })
    }

    /// Free (module-level) functions.
    pub fn free_functions(&self) -> impl Iterator<Item = (OperationRef, &Operation)> {
        self.operations()
            .filter(|(r, _)| self.types[r.owner.index()].is_module())
    }

    /// Find a type by qualified name.
    pub fn find_type(&self, qualified_name: &str) -> Option<TypeId> {
        self.type_entries()
            .find(|(_, t)| t.qualified_name == qualified_name)
            .map(|(id, _)| id)
    }

    /// Qualified name of an operation: container qualified name plus op name.
    pub fn operation_qualified_name(&self, op: OperationRef) -> Option<String> {
        let owner = self.type_decl(op.owner)?;
        let operation = self.operation(op)?;
        Some(qualify(&owner.qualified_name, &operation.name))
    }

    /// Resolve the superclass expressions of a type to types of this model.
    ///
    /// Resolution uses the last dotted segment. A candidate in the same
    /// module wins; otherwise the first declaration with that simple name.
    /// Unresolvable bases (`object`, library classes) are skipped.
    pub fn superclasses_of(&self, id: TypeId) -> Vec<TypeId> {
        let Some(ty) = self.type_decl(id) else {
            return Vec::new();
        };
        ty.superclasses
            .iter()
            .filter_map(|base| {
                let simple = base.rsplit('.').next().unwrap_or(base);
                let mut candidates = self
                    .classes()
                    .filter(|(cid, c)| *cid != id && c.name == simple);
                let first = candidates.next()?;
                let same_module = std::iter::once(first)
                    .chain(candidates)
                    .find(|(_, c)| c.module == ty.module);
                Some(same_module.unwrap_or(first).0)
            })
            .collect()
    }

    /// Direct subclasses of a type, in declaration order.
    pub fn subclasses_of(&self, id: TypeId) -> Vec<TypeId> {
        self.classes()
            .filter(|(cid, _)| self.superclasses_of(*cid).contains(&id))
            .map(|(cid, _)| cid)
            .collect()
    }

    /// Whether `ancestor` is a (transitive) superclass of `id`.
    pub fn is_subtype_of(&self, id: TypeId, ancestor: TypeId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = self.superclasses_of(id);
        while let Some(next) = stack.pop() {
            if next == ancestor {
                return true;
            }
            if seen.insert(next) {
                stack.extend(self.superclasses_of(next));
            }
        }
        false
    }

    /// Check the invariants the diff engine relies on.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut files = HashSet::new();
        for file in &self.files {
            if !files.insert(file.as_str()) {
                return Err(ModelError::DuplicateFile { file: file.clone() });
            }
        }

        let mut identities: HashSet<(&str, &str)> = HashSet::new();
        for ty in &self.types {
            if ty.file.is_empty() {
                return Err(ModelError::EmptyFilePath {
                    qualified_name: ty.qualified_name.clone(),
                });
            }
            if !files.contains(ty.file.as_str()) {
                return Err(ModelError::UnknownFile {
                    qualified_name: ty.qualified_name.clone(),
                    file: ty.file.clone(),
                });
            }
            if !identities.insert((ty.qualified_name.as_str(), ty.file.as_str())) {
                return Err(ModelError::DuplicateType {
                    qualified_name: ty.qualified_name.clone(),
                    file: ty.file.clone(),
                });
            }
        }
        Ok(())
    }

    /// Check that an operation reference points into this model.
    pub fn check_operation(&self, op: OperationRef) -> Result<&Operation, ModelError> {
        self.operation(op).ok_or_else(|| ModelError::DanglingOperation {
            reference: op.to_string(),
        })
    }

    /// Names of all modules in the model.
    pub fn modules(&self) -> BTreeSet<&str> {
        self.types.iter().map(|t| t.module.as_str()).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
