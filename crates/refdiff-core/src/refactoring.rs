//! Typed refactoring records.
//!
//! A [`Refactoring`] references entities of both revisions through
//! descriptors that carry identity only (qualified name and file), so a
//! record stays meaningful after the models it was computed from are dropped.
//! Two records describing the same change on the same entities compare equal,
//! which is what deduplication and test assertions rely on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{qualify, Modifier, Operation, TypeDecl, Visibility};

// ============================================================================
// Entity Descriptors
// ============================================================================

/// Identity of a type declaration in one revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub qualified_name: String,
    pub name: String,
    pub file: String,
}

impl TypeDescriptor {
    pub fn of(ty: &TypeDecl) -> Self {
        TypeDescriptor {
            qualified_name: ty.qualified_name.clone(),
            name: ty.name.clone(),
            file: ty.file.clone(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name)
    }
}

/// Identity of an operation in one revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Qualified name of the owning type (or module).
    pub container: String,
    pub name: String,
    pub signature: String,
    pub file: String,
}

impl OperationDescriptor {
    pub fn of(owner: &TypeDecl, op: &Operation) -> Self {
        OperationDescriptor {
            container: owner.qualified_name.clone(),
            name: op.name.clone(),
            signature: op.signature(),
            file: owner.file.clone(),
        }
    }

    /// `container.name`
    pub fn qualified_name(&self) -> String {
        qualify(&self.container, &self.name)
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", qualify(&self.container, &self.signature))
    }
}

/// Either kind of entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum EntityDescriptor {
    Type(TypeDescriptor),
    Operation(OperationDescriptor),
}

impl EntityDescriptor {
    pub fn qualified_name(&self) -> String {
        match self {
            EntityDescriptor::Type(t) => t.qualified_name.clone(),
            EntityDescriptor::Operation(o) => o.qualified_name(),
        }
    }
}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityDescriptor::Type(t) => t.fmt(f),
            EntityDescriptor::Operation(o) => o.fmt(f),
        }
    }
}

// ============================================================================
// Refactoring Kind
// ============================================================================

/// Category tag of a refactoring record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefactoringKind {
    RenameClass,
    MoveClass,
    MoveAndRenameClass,
    ExtractSuperclass,
    ExtractSubclass,
    ChangeClassVisibility,
    AddClassModifier,
    RemoveClassModifier,
    RenameOperation,
    MoveOperation,
    MoveAndRenameOperation,
    PullUpOperation,
    PushDownOperation,
    ExtractOperation,
    ExtractAndMoveOperation,
    InlineOperation,
    ChangeOperationVisibility,
    AddOperationModifier,
    RemoveOperationModifier,
    ChangeReturnType,
    AddParameter,
    RemoveParameter,
    RenameParameter,
    ChangeParameterType,
}

impl RefactoringKind {
    /// All kinds, in reporting order.
    pub const ALL: [RefactoringKind; 24] = [
        RefactoringKind::RenameClass,
        RefactoringKind::MoveClass,
        RefactoringKind::MoveAndRenameClass,
        RefactoringKind::ExtractSuperclass,
        RefactoringKind::ExtractSubclass,
        RefactoringKind::ChangeClassVisibility,
        RefactoringKind::AddClassModifier,
        RefactoringKind::RemoveClassModifier,
        RefactoringKind::RenameOperation,
        RefactoringKind::MoveOperation,
        RefactoringKind::MoveAndRenameOperation,
        RefactoringKind::PullUpOperation,
        RefactoringKind::PushDownOperation,
        RefactoringKind::ExtractOperation,
        RefactoringKind::ExtractAndMoveOperation,
        RefactoringKind::InlineOperation,
        RefactoringKind::ChangeOperationVisibility,
        RefactoringKind::AddOperationModifier,
        RefactoringKind::RemoveOperationModifier,
        RefactoringKind::ChangeReturnType,
        RefactoringKind::AddParameter,
        RefactoringKind::RemoveParameter,
        RefactoringKind::RenameParameter,
        RefactoringKind::ChangeParameterType,
    ];

    /// Stable snake_case identifier, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefactoringKind::RenameClass => "rename_class",
            RefactoringKind::MoveClass => "move_class",
            RefactoringKind::MoveAndRenameClass => "move_and_rename_class",
            RefactoringKind::ExtractSuperclass => "extract_superclass",
            RefactoringKind::ExtractSubclass => "extract_subclass",
            RefactoringKind::ChangeClassVisibility => "change_class_visibility",
            RefactoringKind::AddClassModifier => "add_class_modifier",
            RefactoringKind::RemoveClassModifier => "remove_class_modifier",
            RefactoringKind::RenameOperation => "rename_operation",
            RefactoringKind::MoveOperation => "move_operation",
            RefactoringKind::MoveAndRenameOperation => "move_and_rename_operation",
            RefactoringKind::PullUpOperation => "pull_up_operation",
            RefactoringKind::PushDownOperation => "push_down_operation",
            RefactoringKind::ExtractOperation => "extract_operation",
            RefactoringKind::ExtractAndMoveOperation => "extract_and_move_operation",
            RefactoringKind::InlineOperation => "inline_operation",
            RefactoringKind::ChangeOperationVisibility => "change_operation_visibility",
            RefactoringKind::AddOperationModifier => "add_operation_modifier",
            RefactoringKind::RemoveOperationModifier => "remove_operation_modifier",
            RefactoringKind::ChangeReturnType => "change_return_type",
            RefactoringKind::AddParameter => "add_parameter",
            RefactoringKind::RemoveParameter => "remove_parameter",
            RefactoringKind::RenameParameter => "rename_parameter",
            RefactoringKind::ChangeParameterType => "change_parameter_type",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            RefactoringKind::RenameClass => "Rename Class",
            RefactoringKind::MoveClass => "Move Class",
            RefactoringKind::MoveAndRenameClass => "Move And Rename Class",
            RefactoringKind::ExtractSuperclass => "Extract Superclass",
            RefactoringKind::ExtractSubclass => "Extract Subclass",
            RefactoringKind::ChangeClassVisibility => "Change Class Visibility",
            RefactoringKind::AddClassModifier => "Add Class Modifier",
            RefactoringKind::RemoveClassModifier => "Remove Class Modifier",
            RefactoringKind::RenameOperation => "Rename Operation",
            RefactoringKind::MoveOperation => "Move Operation",
            RefactoringKind::MoveAndRenameOperation => "Move And Rename Operation",
            RefactoringKind::PullUpOperation => "Pull Up Operation",
            RefactoringKind::PushDownOperation => "Push Down Operation",
            RefactoringKind::ExtractOperation => "Extract Operation",
            RefactoringKind::ExtractAndMoveOperation => "Extract And Move Operation",
            RefactoringKind::InlineOperation => "Inline Operation",
            RefactoringKind::ChangeOperationVisibility => "Change Operation Visibility",
            RefactoringKind::AddOperationModifier => "Add Operation Modifier",
            RefactoringKind::RemoveOperationModifier => "Remove Operation Modifier",
            RefactoringKind::ChangeReturnType => "Change Return Type",
            RefactoringKind::AddParameter => "Add Parameter",
            RefactoringKind::RemoveParameter => "Remove Parameter",
            RefactoringKind::RenameParameter => "Rename Parameter",
            RefactoringKind::ChangeParameterType => "Change Parameter Type",
        }
    }
}

impl fmt::Display for RefactoringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Refactoring Record
// ============================================================================

/// One detected refactoring.
///
/// Variants are ordered the same way as [`RefactoringKind`], so the derived
/// `Ord` sorts records by kind and then by the entities involved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Refactoring {
    RenameClass {
        before: TypeDescriptor,
        after: TypeDescriptor,
    },
    MoveClass {
        before: TypeDescriptor,
        after: TypeDescriptor,
    },
    MoveAndRenameClass {
        before: TypeDescriptor,
        after: TypeDescriptor,
    },
    ExtractSuperclass {
        /// Existing types, as they were before, that now inherit the new type.
        subclasses: Vec<TypeDescriptor>,
        superclass: TypeDescriptor,
    },
    ExtractSubclass {
        base_before: TypeDescriptor,
        base_after: TypeDescriptor,
        subclass: TypeDescriptor,
    },
    ChangeClassVisibility {
        before: TypeDescriptor,
        after: TypeDescriptor,
        from: Visibility,
        to: Visibility,
    },
    AddClassModifier {
        before: TypeDescriptor,
        after: TypeDescriptor,
        modifier: Modifier,
    },
    RemoveClassModifier {
        before: TypeDescriptor,
        after: TypeDescriptor,
        modifier: Modifier,
    },
    RenameOperation {
        before: OperationDescriptor,
        after: OperationDescriptor,
    },
    MoveOperation {
        before: OperationDescriptor,
        after: OperationDescriptor,
    },
    MoveAndRenameOperation {
        before: OperationDescriptor,
        after: OperationDescriptor,
    },
    PullUpOperation {
        before: OperationDescriptor,
        after: OperationDescriptor,
    },
    PushDownOperation {
        before: OperationDescriptor,
        after: OperationDescriptor,
    },
    ExtractOperation {
        source_before: OperationDescriptor,
        source_after: OperationDescriptor,
        extracted: OperationDescriptor,
    },
    ExtractAndMoveOperation {
        source_before: OperationDescriptor,
        source_after: OperationDescriptor,
        extracted: OperationDescriptor,
    },
    InlineOperation {
        inlined: OperationDescriptor,
        target_before: OperationDescriptor,
        target_after: OperationDescriptor,
    },
    ChangeOperationVisibility {
        before: OperationDescriptor,
        after: OperationDescriptor,
        from: Visibility,
        to: Visibility,
    },
    AddOperationModifier {
        before: OperationDescriptor,
        after: OperationDescriptor,
        modifier: Modifier,
    },
    RemoveOperationModifier {
        before: OperationDescriptor,
        after: OperationDescriptor,
        modifier: Modifier,
    },
    ChangeReturnType {
        before: OperationDescriptor,
        after: OperationDescriptor,
        original_type: Option<String>,
        changed_type: Option<String>,
    },
    AddParameter {
        before: OperationDescriptor,
        after: OperationDescriptor,
        parameter: String,
    },
    RemoveParameter {
        before: OperationDescriptor,
        after: OperationDescriptor,
        parameter: String,
    },
    RenameParameter {
        before: OperationDescriptor,
        after: OperationDescriptor,
        from: String,
        to: String,
    },
    ChangeParameterType {
        before: OperationDescriptor,
        after: OperationDescriptor,
        parameter: String,
        original_type: Option<String>,
        changed_type: Option<String>,
    },
}

impl Refactoring {
    /// Category tag of this record.
    pub fn kind(&self) -> RefactoringKind {
        match self {
            Refactoring::RenameClass { .. } => RefactoringKind::RenameClass,
            Refactoring::MoveClass { .. } => RefactoringKind::MoveClass,
            Refactoring::MoveAndRenameClass { .. } => RefactoringKind::MoveAndRenameClass,
            Refactoring::ExtractSuperclass { .. } => RefactoringKind::ExtractSuperclass,
            Refactoring::ExtractSubclass { .. } => RefactoringKind::ExtractSubclass,
            Refactoring::ChangeClassVisibility { .. } => RefactoringKind::ChangeClassVisibility,
            Refactoring::AddClassModifier { .. } => RefactoringKind::AddClassModifier,
            Refactoring::RemoveClassModifier { .. } => RefactoringKind::RemoveClassModifier,
            Refactoring::RenameOperation { .. } => RefactoringKind::RenameOperation,
            Refactoring::MoveOperation { .. } => RefactoringKind::MoveOperation,
            Refactoring::MoveAndRenameOperation { .. } => RefactoringKind::MoveAndRenameOperation,
            Refactoring::PullUpOperation { .. } => RefactoringKind::PullUpOperation,
            Refactoring::PushDownOperation { .. } => RefactoringKind::PushDownOperation,
            Refactoring::ExtractOperation { .. } => RefactoringKind::ExtractOperation,
            Refactoring::ExtractAndMoveOperation { .. } => RefactoringKind::ExtractAndMoveOperation,
            Refactoring::InlineOperation { .. } => RefactoringKind::InlineOperation,
            Refactoring::ChangeOperationVisibility { .. } => {
                RefactoringKind::ChangeOperationVisibility
            }
            Refactoring::AddOperationModifier { .. } => RefactoringKind::AddOperationModifier,
            Refactoring::RemoveOperationModifier { .. } => RefactoringKind::RemoveOperationModifier,
            Refactoring::ChangeReturnType { .. } => RefactoringKind::ChangeReturnType,
            Refactoring::AddParameter { .. } => RefactoringKind::AddParameter,
            Refactoring::RemoveParameter { .. } => RefactoringKind::RemoveParameter,
            Refactoring::RenameParameter { .. } => RefactoringKind::RenameParameter,
            Refactoring::ChangeParameterType { .. } => RefactoringKind::ChangeParameterType,
        }
    }

    /// Entities of the before revision referenced by this record.
    pub fn before_entities(&self) -> Vec<EntityDescriptor> {
        use EntityDescriptor::{Operation as Op, Type};
        match self {
            Refactoring::RenameClass { before, .. }
            | Refactoring::MoveClass { before, .. }
            | Refactoring::MoveAndRenameClass { before, .. }
            | Refactoring::ChangeClassVisibility { before, .. }
            | Refactoring::AddClassModifier { before, .. }
            | Refactoring::RemoveClassModifier { before, .. } => vec![Type(before.clone())],
            Refactoring::ExtractSuperclass { subclasses, .. } => {
                subclasses.iter().cloned().map(Type).collect()
            }
            Refactoring::ExtractSubclass { base_before, .. } => vec![Type(base_before.clone())],
            Refactoring::RenameOperation { before, .. }
            | Refactoring::MoveOperation { before, .. }
            | Refactoring::MoveAndRenameOperation { before, .. }
            | Refactoring::PullUpOperation { before, .. }
            | Refactoring::PushDownOperation { before, .. }
            | Refactoring::ChangeOperationVisibility { before, .. }
            | Refactoring::AddOperationModifier { before, .. }
            | Refactoring::RemoveOperationModifier { before, .. }
            | Refactoring::ChangeReturnType { before, .. }
            | Refactoring::AddParameter { before, .. }
            | Refactoring::RemoveParameter { before, .. }
            | Refactoring::RenameParameter { before, .. }
            | Refactoring::ChangeParameterType { before, .. } => vec![Op(before.clone())],
            Refactoring::ExtractOperation { source_before, .. }
            | Refactoring::ExtractAndMoveOperation { source_before, .. } => {
                vec![Op(source_before.clone())]
            }
            Refactoring::InlineOperation {
                inlined,
                target_before,
                ..
            } => vec![Op(inlined.clone()), Op(target_before.clone())],
        }
    }

    /// Entities of the after revision referenced by this record.
    pub fn after_entities(&self) -> Vec<EntityDescriptor> {
        use EntityDescriptor::{Operation as Op, Type};
        match self {
            Refactoring::RenameClass { after, .. }
            | Refactoring::MoveClass { after, .. }
            | Refactoring::MoveAndRenameClass { after, .. }
            | Refactoring::ChangeClassVisibility { after, .. }
            | Refactoring::AddClassModifier { after, .. }
            | Refactoring::RemoveClassModifier { after, .. } => vec![Type(after.clone())],
            Refactoring::ExtractSuperclass { superclass, .. } => vec![Type(superclass.clone())],
            Refactoring::ExtractSubclass {
                base_after,
                subclass,
                ..
            } => vec![Type(base_after.clone()), Type(subclass.clone())],
            Refactoring::RenameOperation { after, .. }
            | Refactoring::MoveOperation { after, .. }
            | Refactoring::MoveAndRenameOperation { after, .. }
            | Refactoring::PullUpOperation { after, .. }
            | Refactoring::PushDownOperation { after, .. }
            | Refactoring::ChangeOperationVisibility { after, .. }
            | Refactoring::AddOperationModifier { after, .. }
            | Refactoring::RemoveOperationModifier { after, .. }
            | Refactoring::ChangeReturnType { after, .. }
            | Refactoring::AddParameter { after, .. }
            | Refactoring::RemoveParameter { after, .. }
            | Refactoring::RenameParameter { after, .. }
            | Refactoring::ChangeParameterType { after, .. } => vec![Op(after.clone())],
            Refactoring::ExtractOperation {
                source_after,
                extracted,
                ..
            }
            | Refactoring::ExtractAndMoveOperation {
                source_after,
                extracted,
                ..
            } => vec![Op(source_after.clone()), Op(extracted.clone())],
            Refactoring::InlineOperation { target_after, .. } => vec![Op(target_after.clone())],
        }
    }

    /// Modifier added or removed, for modifier records.
    pub fn modifier(&self) -> Option<Modifier> {
        match self {
            Refactoring::AddClassModifier { modifier, .. }
            | Refactoring::RemoveClassModifier { modifier, .. }
            | Refactoring::AddOperationModifier { modifier, .. }
            | Refactoring::RemoveOperationModifier { modifier, .. } => Some(*modifier),
            _ => None,
        }
    }

    /// Type annotation before the change, for type-change records.
    pub fn original_type(&self) -> Option<&str> {
        match self {
            Refactoring::ChangeReturnType { original_type, .. }
            | Refactoring::ChangeParameterType { original_type, .. } => original_type.as_deref(),
            _ => None,
        }
    }

    /// Type annotation after the change, for type-change records.
    pub fn changed_type(&self) -> Option<&str> {
        match self {
            Refactoring::ChangeReturnType { changed_type, .. }
            | Refactoring::ChangeParameterType { changed_type, .. } => changed_type.as_deref(),
            _ => None,
        }
    }

    /// Visibility before and after, for visibility records.
    pub fn visibility_change(&self) -> Option<(Visibility, Visibility)> {
        match self {
            Refactoring::ChangeClassVisibility { from, to, .. }
            | Refactoring::ChangeOperationVisibility { from, to, .. } => Some((*from, *to)),
            _ => None,
        }
    }

    /// Whether the record references a type with this qualified name, or an
    /// operation owned by it.
    pub fn involves_type(&self, qualified_name: &str) -> bool {
        self.entities().any(|e| match e {
            EntityDescriptor::Type(t) => t.qualified_name == qualified_name,
            EntityDescriptor::Operation(o) => o.container == qualified_name,
        })
    }

    /// Whether the record references an operation with this qualified name.
    pub fn involves_operation(&self, qualified_name: &str) -> bool {
        self.entities().any(|e| match e {
            EntityDescriptor::Operation(o) => o.qualified_name() == qualified_name,
            EntityDescriptor::Type(_) => false,
        })
    }

    fn entities(&self) -> impl Iterator<Item = EntityDescriptor> {
        self.before_entities()
            .into_iter()
            .chain(self.after_entities())
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Refactoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match self {
            Refactoring::ChangeClassVisibility {
                after, from, to, ..
            } => write!(f, "{kind}\t{after} ({from} -> {to})"),
            Refactoring::ChangeOperationVisibility {
                after, from, to, ..
            } => write!(f, "{kind}\t{after} ({from} -> {to})"),
            Refactoring::AddClassModifier {
                after, modifier, ..
            }
            | Refactoring::RemoveClassModifier {
                after, modifier, ..
            } => write!(f, "{kind}\t{modifier} on {after}"),
            Refactoring::AddOperationModifier {
                after, modifier, ..
            }
            | Refactoring::RemoveOperationModifier {
                after, modifier, ..
            } => write!(f, "{kind}\t{modifier} on {after}"),
            Refactoring::ChangeReturnType {
                after,
                original_type,
                changed_type,
                ..
            } => write!(
                f,
                "{kind}\t{after} ({} -> {})",
                original_type.as_deref().unwrap_or("-"),
                changed_type.as_deref().unwrap_or("-")
            ),
            Refactoring::AddParameter {
                after, parameter, ..
            }
            | Refactoring::RemoveParameter {
                after, parameter, ..
            } => write!(f, "{kind}\t{parameter} in {after}"),
            Refactoring::RenameParameter { after, from, to, .. } => {
                write!(f, "{kind}\t{from} -> {to} in {after}")
            }
            Refactoring::ChangeParameterType {
                after,
                parameter,
                original_type,
                changed_type,
                ..
            } => write!(
                f,
                "{kind}\t{parameter} in {after} ({} -> {})",
                original_type.as_deref().unwrap_or("-"),
                changed_type.as_deref().unwrap_or("-")
            ),
            _ => write!(
                f,
                "{kind}\t{} -> {}",
                join(&self.before_entities()),
                join(&self.after_entities())
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
