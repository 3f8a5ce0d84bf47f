//! Diff result: the ordered, deduplicated refactoring list plus the match
//! evidence and the added/removed entity sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matcher::{MatchEvidence, MatchResult};
use crate::model::{Model, OperationRef, TypeId};
use crate::refactoring::{
    EntityDescriptor, OperationDescriptor, Refactoring, RefactoringKind, TypeDescriptor,
};

/// One accepted pair with the evidence that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub before: EntityDescriptor,
    pub after: EntityDescriptor,
    #[serde(flatten)]
    pub evidence: MatchEvidence,
}

/// Outcome of diffing two models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    refactorings: Vec<Refactoring>,
    matches: Vec<EntityMatch>,
    added_types: Vec<TypeDescriptor>,
    removed_types: Vec<TypeDescriptor>,
    added_operations: Vec<OperationDescriptor>,
    removed_operations: Vec<OperationDescriptor>,
}

impl DiffResult {
    /// Assemble a result from raw classifier output and the match result.
    ///
    /// Records are normalized (a move and a rename of the same pair become
    /// one move-and-rename), sorted and deduplicated.
    pub fn new(
        records: Vec<Refactoring>,
        matches: &MatchResult,
        before: &Model,
        after: &Model,
    ) -> Self {
        let refactorings = normalize(records);

        let mut entity_matches = Vec::new();
        for m in &matches.types {
            let (Some(b), Some(a)) = (before.type_decl(m.before), after.type_decl(m.after)) else {
                continue;
            };
            if b.is_module() {
                continue;
            }
            entity_matches.push(EntityMatch {
                before: EntityDescriptor::Type(TypeDescriptor::of(b)),
                after: EntityDescriptor::Type(TypeDescriptor::of(a)),
                evidence: m.evidence,
            });
        }
        for m in &matches.operations {
            let (Some(b), Some(a)) = (operation(before, m.before), operation(after, m.after)) else {
                continue;
            };
            entity_matches.push(EntityMatch {
                before: EntityDescriptor::Operation(b),
                after: EntityDescriptor::Operation(a),
                evidence: m.evidence,
            });
        }

        let types_of = |model: &Model, ids: &[TypeId]| {
            ids.iter()
                .filter_map(|id| model.type_decl(*id))
                .filter(|t| !t.is_module())
                .map(TypeDescriptor::of)
                .collect::<Vec<_>>()
        };
        let ops_of = |model: &Model, refs: &[OperationRef]| {
            refs.iter()
                .filter_map(|r| operation(model, *r))
                .collect::<Vec<_>>()
        };

        DiffResult {
            refactorings,
            matches: entity_matches,
            added_types: types_of(after, &matches.added_types),
            removed_types: types_of(before, &matches.removed_types),
            added_operations: ops_of(after, &matches.added_operations),
            removed_operations: ops_of(before, &matches.removed_operations),
        }
    }

    /// All refactorings, ordered by kind and then by the entities involved.
    pub fn refactorings(&self) -> &[Refactoring] {
        &self.refactorings
    }

    pub fn into_refactorings(self) -> Vec<Refactoring> {
        self.refactorings
    }

    pub fn is_empty(&self) -> bool {
        self.refactorings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.refactorings.len()
    }

    /// Accepted pairs (excluding module containers) with their evidence.
    pub fn matches(&self) -> &[EntityMatch] {
        &self.matches
    }

    pub fn added_types(&self) -> &[TypeDescriptor] {
        &self.added_types
    }

    pub fn removed_types(&self) -> &[TypeDescriptor] {
        &self.removed_types
    }

    pub fn added_operations(&self) -> &[OperationDescriptor] {
        &self.added_operations
    }

    pub fn removed_operations(&self) -> &[OperationDescriptor] {
        &self.removed_operations
    }

    /// Records of one kind.
    pub fn of_kind(&self, kind: RefactoringKind) -> impl Iterator<Item = &Refactoring> {
        self.refactorings.iter().filter(move |r| r.kind() == kind)
    }

    /// Records referencing a type (or an operation it owns) by qualified name.
    pub fn for_type<'s>(
        &'s self,
        qualified_name: &'s str,
    ) -> impl Iterator<Item = &'s Refactoring> {
        self.refactorings
            .iter()
            .filter(move |r| r.involves_type(qualified_name))
    }

    /// Records referencing an operation by qualified name.
    pub fn for_operation<'s>(
        &'s self,
        qualified_name: &'s str,
    ) -> impl Iterator<Item = &'s Refactoring> {
        self.refactorings
            .iter()
            .filter(move |r| r.involves_operation(qualified_name))
    }

    /// Number of records per kind, only kinds that occur.
    pub fn summary(&self) -> BTreeMap<RefactoringKind, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.refactorings {
            *counts.entry(r.kind()).or_insert(0) += 1;
        }
        counts
    }
}

fn operation(model: &Model, r: OperationRef) -> Option<OperationDescriptor> {
    let owner = model.type_decl(r.owner)?;
    let op = model.operation(r)?;
    Some(OperationDescriptor::of(owner, op))
}

/// Merge move and rename records of the same pair, sort and deduplicate.
fn normalize(records: Vec<Refactoring>) -> Vec<Refactoring> {
    let mut records: Vec<Refactoring> = records.into_iter().map(combine_single).collect();

    let renames: Vec<(EntityDescriptor, EntityDescriptor)> = records
        .iter()
        .filter_map(|r| match r {
            Refactoring::RenameClass { before, after } => Some((
                EntityDescriptor::Type(before.clone()),
                EntityDescriptor::Type(after.clone()),
            )),
            Refactoring::RenameOperation { before, after } => Some((
                EntityDescriptor::Operation(before.clone()),
                EntityDescriptor::Operation(after.clone()),
            )),
            _ => None,
        })
        .collect();

    let mut merged = Vec::new();
    records.retain(|r| {
        let pair = match r {
            Refactoring::MoveClass { before, after } => (
                EntityDescriptor::Type(before.clone()),
                EntityDescriptor::Type(after.clone()),
            ),
            Refactoring::MoveOperation { before, after } => (
                EntityDescriptor::Operation(before.clone()),
                EntityDescriptor::Operation(after.clone()),
            ),
            _ => return true,
        };
        if renames.contains(&pair) {
            merged.push(pair);
            return false;
        }
        true
    });
    records.retain(|r| match r {
        Refactoring::RenameClass { before, after } => !merged.contains(&(
            EntityDescriptor::Type(before.clone()),
            EntityDescriptor::Type(after.clone()),
        )),
        Refactoring::RenameOperation { before, after } => !merged.contains(&(
            EntityDescriptor::Operation(before.clone()),
            EntityDescriptor::Operation(after.clone()),
        )),
        _ => true,
    });
    for (before, after) in merged {
        match (before, after) {
            (EntityDescriptor::Type(before), EntityDescriptor::Type(after)) => {
                records.push(Refactoring::MoveAndRenameClass { before, after })
            }
            (EntityDescriptor::Operation(before), EntityDescriptor::Operation(after)) => {
                records.push(Refactoring::MoveAndRenameOperation { before, after })
            }
            _ => {}
        }
    }

    records.sort();
    records.dedup();
    records
}

/// A lone move or rename whose entities differ in both name and location is
/// reported as the combined record.
fn combine_single(record: Refactoring) -> Refactoring {
    match record {
        Refactoring::MoveClass { before, after } | Refactoring::RenameClass { before, after }
            if before.name != after.name && before.file != after.file =>
        {
            Refactoring::MoveAndRenameClass { before, after }
        }
        Refactoring::MoveOperation { before, after }
        | Refactoring::RenameOperation { before, after }
            if before.name != after.name && before.container != after.container =>
        {
            Refactoring::MoveAndRenameOperation { before, after }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(container: &str, name: &str) -> OperationDescriptor {
        OperationDescriptor {
            container: container.to_string(),
            name: name.to_string(),
            signature: format!("{name}()"),
            file: "m.py".to_string(),
        }
    }

    #[test]
    fn move_and_rename_of_same_pair_are_merged() {
        let records = normalize(vec![
            Refactoring::RenameOperation {
                before: op("m.A", "f"),
                after: op("m.A", "f"),
            },
            Refactoring::MoveOperation {
                before: op("m.A", "f"),
                after: op("m.A", "f"),
            },
        ]);
        assert_eq!(
            records,
            vec![Refactoring::MoveAndRenameOperation {
                before: op("m.A", "f"),
                after: op("m.A", "f"),
            }]
        );
    }

    #[test]
    fn move_with_different_name_becomes_combined() {
        let records = normalize(vec![Refactoring::MoveOperation {
            before: op("m.A", "f"),
            after: op("m.B", "g"),
        }]);
        assert_eq!(records[0].kind(), RefactoringKind::MoveAndRenameOperation);
    }

    #[test]
    fn duplicates_are_removed_and_order_is_stable() {
        let pull = Refactoring::PullUpOperation {
            before: op("m.Dog", "speak"),
            after: op("m.Animal", "speak"),
        };
        let rename = Refactoring::RenameOperation {
            before: op("m.A", "f"),
            after: op("m.A", "g"),
        };
        let a = normalize(vec![pull.clone(), rename.clone(), pull.clone()]);
        let b = normalize(vec![rename.clone(), pull.clone()]);
        assert_eq!(a, b);
        assert_eq!(a, vec![rename, pull]);
    }

    #[test]
    fn summary_counts_kinds() {
        let result = DiffResult {
            refactorings: normalize(vec![
                Refactoring::RenameOperation {
                    before: op("m.A", "f"),
                    after: op("m.A", "g"),
                },
                Refactoring::RenameOperation {
                    before: op("m.A", "h"),
                    after: op("m.A", "i"),
                },
            ]),
            ..DiffResult::default()
        };
        let summary = result.summary();
        assert_eq!(summary.get(&RefactoringKind::RenameOperation), Some(&2));
        assert_eq!(result.of_kind(RefactoringKind::RenameOperation).count(), 2);
        assert_eq!(result.for_operation("m.A.g").count(), 1);
        assert_eq!(result.for_type("m.A").count(), 2);
    }
}
