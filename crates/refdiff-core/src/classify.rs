//! Refactoring classification.
//!
//! Turns matched pairs and leftover entities into typed [`Refactoring`]
//! records. Each matched pair is classified once, most specific rule first:
//!
//! 1. Structural change of the pair: move-and-rename, then pull-up/push-down,
//!    then plain move or rename.
//! 2. Attribute changes, each reported independently: visibility, static and
//!    abstract modifiers, return type, parameters.
//!
//! Extract, inline and extract-superclass/subclass are derived from the
//! candidates the matcher left behind. A pair or entity no rule applies to
//! produces no record.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::DiffConfig;
use crate::matcher::{MatchResult, MatchTier, ModelProfiles, OperationMatch, TypeMatch};
use crate::model::{Model, Modifier, Operation, OperationRef, TypeDecl, TypeId};
use crate::refactoring::{OperationDescriptor, Refactoring, TypeDescriptor};
use crate::similarity::body_similarity;

/// Read-only inputs of classification.
pub struct Classifier<'a> {
    before: &'a Model,
    after: &'a Model,
    before_profiles: &'a ModelProfiles,
    after_profiles: &'a ModelProfiles,
    config: &'a DiffConfig,
    matches: &'a MatchResult,
}

impl<'a> Classifier<'a> {
    pub fn new(
        before: &'a Model,
        after: &'a Model,
        before_profiles: &'a ModelProfiles,
        after_profiles: &'a ModelProfiles,
        config: &'a DiffConfig,
        matches: &'a MatchResult,
    ) -> Self {
        Classifier {
            before,
            after,
            before_profiles,
            after_profiles,
            config,
            matches,
        }
    }

    /// Classify everything. Records are unsorted and may contain duplicates.
    pub fn run(&self) -> Vec<Refactoring> {
        let mut out = Vec::new();
        for m in &self.matches.types {
            self.classify_type(m, &mut out);
        }
        for m in &self.matches.operations {
            self.classify_operation(m, &mut out);
        }
        self.classify_extracts(&mut out);
        self.classify_inlines(&mut out);
        self.classify_hierarchy(&mut out);
        debug!(records = out.len(), "classification complete");
        out
    }

    // ------------------------------------------------------------------------
    // Descriptors
    // ------------------------------------------------------------------------

    fn type_before(&self, id: TypeId) -> Option<(&'a TypeDecl, TypeDescriptor)> {
        let ty = self.before.type_decl(id)?;
        Some((ty, TypeDescriptor::of(ty)))
    }

    fn type_after(&self, id: TypeId) -> Option<(&'a TypeDecl, TypeDescriptor)> {
        let ty = self.after.type_decl(id)?;
        Some((ty, TypeDescriptor::of(ty)))
    }

    fn op_before(&self, r: OperationRef) -> Option<(&'a Operation, OperationDescriptor)> {
        let owner = self.before.type_decl(r.owner)?;
        let op = self.before.operation(r)?;
        Some((op, OperationDescriptor::of(owner, op)))
    }

    fn op_after(&self, r: OperationRef) -> Option<(&'a Operation, OperationDescriptor)> {
        let owner = self.after.type_decl(r.owner)?;
        let op = self.after.operation(r)?;
        Some((op, OperationDescriptor::of(owner, op)))
    }

    fn body_score(&self, before: OperationRef, after: OperationRef) -> f64 {
        body_similarity(
            self.before_profiles.operation(before),
            self.after_profiles.operation(after),
        )
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    fn classify_type(&self, m: &TypeMatch, out: &mut Vec<Refactoring>) {
        let (Some((b, bd)), Some((a, ad))) = (self.type_before(m.before), self.type_after(m.after))
        else {
            return;
        };
        if b.is_module() || a.is_module() {
            return;
        }

        if m.evidence.tier != MatchTier::Exact && !m.evidence.via_outer {
            let renamed = b.name != a.name;
            let moved = b.file != a.file || parent(&b.qualified_name) != parent(&a.qualified_name);
            let record = match (renamed, moved) {
                (true, true) => Some(Refactoring::MoveAndRenameClass {
                    before: bd.clone(),
                    after: ad.clone(),
                }),
                (true, false) => Some(Refactoring::RenameClass {
                    before: bd.clone(),
                    after: ad.clone(),
                }),
                (false, true) => Some(Refactoring::MoveClass {
                    before: bd.clone(),
                    after: ad.clone(),
                }),
                (false, false) => None,
            };
            out.extend(record);
        }

        if b.visibility != a.visibility {
            out.push(Refactoring::ChangeClassVisibility {
                before: bd.clone(),
                after: ad.clone(),
                from: b.visibility,
                to: a.visibility,
            });
        }
        match (b.is_abstract, a.is_abstract) {
            (false, true) => out.push(Refactoring::AddClassModifier {
                before: bd,
                after: ad,
                modifier: Modifier::Abstract,
            }),
            (true, false) => out.push(Refactoring::RemoveClassModifier {
                before: bd,
                after: ad,
                modifier: Modifier::Abstract,
            }),
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    fn classify_operation(&self, m: &OperationMatch, out: &mut Vec<Refactoring>) {
        let (Some((b, bd)), Some((a, ad))) = (self.op_before(m.before), self.op_after(m.after))
        else {
            return;
        };

        if m.evidence.tier != MatchTier::Exact {
            let renamed = b.name != a.name;
            let moved = self.matches.type_partner(m.before.owner) != Some(m.after.owner);
            match (renamed, moved) {
                (true, true) => out.push(Refactoring::MoveAndRenameOperation {
                    before: bd.clone(),
                    after: ad.clone(),
                }),
                (true, false) => out.push(Refactoring::RenameOperation {
                    before: bd.clone(),
                    after: ad.clone(),
                }),
                (false, true) => self.classify_relocation(m, &bd, &ad, out),
                (false, false) => {}
            }
        }

        attribute_changes(b, a, &bd, &ad, out);
    }

    /// Same-name operation in a different container: pull-up, push-down or move.
    fn classify_relocation(
        &self,
        m: &OperationMatch,
        bd: &OperationDescriptor,
        ad: &OperationDescriptor,
        out: &mut Vec<Refactoring>,
    ) {
        let unchanged = self.body_score(m.before, m.after) >= self.config.pull_up_threshold;
        let source_after = self.matches.type_partner(m.before.owner);
        let target = m.after.owner;

        if let Some(source_after) = source_after.filter(|_| unchanged) {
            if self.after.is_subtype_of(source_after, target) {
                out.push(Refactoring::PullUpOperation {
                    before: bd.clone(),
                    after: ad.clone(),
                });
                self.sibling_pull_ups(m, ad, out);
                return;
            }
            if self.after.is_subtype_of(target, source_after) {
                out.push(Refactoring::PushDownOperation {
                    before: bd.clone(),
                    after: ad.clone(),
                });
                self.sibling_push_downs(m, bd, source_after, out);
                return;
            }
        }

        out.push(Refactoring::MoveOperation {
            before: bd.clone(),
            after: ad.clone(),
        });
    }

    /// Removed copies of a pulled-up operation in other subclasses.
    fn sibling_pull_ups(
        &self,
        m: &OperationMatch,
        ad: &OperationDescriptor,
        out: &mut Vec<Refactoring>,
    ) {
        let Some(name) = self.after.operation(m.after).map(|op| op.name.as_str()) else {
            return;
        };
        for &removed in &self.matches.removed_operations {
            if removed.owner == m.before.owner {
                continue;
            }
            let Some((op, desc)) = self.op_before(removed) else {
                continue;
            };
            if op.name != name {
                continue;
            }
            let Some(owner_after) = self.matches.type_partner(removed.owner) else {
                continue;
            };
            if self.after.is_subtype_of(owner_after, m.after.owner)
                && self.body_score(removed, m.after) >= self.config.pull_up_threshold
            {
                out.push(Refactoring::PullUpOperation {
                    before: desc,
                    after: ad.clone(),
                });
            }
        }
    }

    /// Added copies of a pushed-down operation in other subclasses.
    fn sibling_push_downs(
        &self,
        m: &OperationMatch,
        bd: &OperationDescriptor,
        superclass_after: TypeId,
        out: &mut Vec<Refactoring>,
    ) {
        let Some(name) = self.before.operation(m.before).map(|op| op.name.as_str()) else {
            return;
        };
        for &added in &self.matches.added_operations {
            if added.owner == m.after.owner {
                continue;
            }
            let Some((op, desc)) = self.op_after(added) else {
                continue;
            };
            if op.name == name
                && self.after.is_subtype_of(added.owner, superclass_after)
                && self.body_score(m.before, added) >= self.config.pull_up_threshold
            {
                out.push(Refactoring::PushDownOperation {
                    before: bd.clone(),
                    after: desc,
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Extract / inline
    // ------------------------------------------------------------------------

    fn classify_extracts(&self, out: &mut Vec<Refactoring>) {
        for candidate in &self.matches.extract_candidates {
            let source = candidate.source;
            let Some((source_op, source_before)) = self.op_before(source.before) else {
                continue;
            };
            let Some((_, source_after)) = self.op_after(source.after) else {
                continue;
            };
            let Some((extracted_op, extracted)) = self.op_after(candidate.extracted) else {
                continue;
            };

            if candidate.extracted.owner == source.after.owner {
                out.push(Refactoring::ExtractOperation {
                    source_before,
                    source_after,
                    extracted,
                });
                continue;
            }

            out.push(Refactoring::ExtractAndMoveOperation {
                source_before: source_before.clone(),
                source_after,
                extracted: extracted.clone(),
            });
            if source_op.name == extracted_op.name {
                out.push(Refactoring::MoveOperation {
                    before: source_before,
                    after: extracted,
                });
            } else {
                out.push(Refactoring::MoveAndRenameOperation {
                    before: source_before,
                    after: extracted,
                });
            }
        }
    }

    fn classify_inlines(&self, out: &mut Vec<Refactoring>) {
        for candidate in &self.matches.inline_candidates {
            let (Some((_, inlined)), Some((_, target_before)), Some((_, target_after))) = (
                self.op_before(candidate.inlined),
                self.op_before(candidate.target.before),
                self.op_after(candidate.target.after),
            ) else {
                continue;
            };
            out.push(Refactoring::InlineOperation {
                inlined,
                target_before,
                target_after,
            });
        }
    }

    // ------------------------------------------------------------------------
    // Extract superclass / subclass
    // ------------------------------------------------------------------------

    /// Members (operations and fields) an existing type lost between revisions.
    fn lost_members(&self, before: TypeId, after: TypeId) -> BTreeSet<&'a str> {
        let (Some(b), Some(a)) = (self.before.type_decl(before), self.after.type_decl(after)) else {
            return BTreeSet::new();
        };
        let kept = member_names(a);
        member_names(b).difference(&kept).copied().collect()
    }

    fn classify_hierarchy(&self, out: &mut Vec<Refactoring>) {
        for &new_type in &self.matches.added_types {
            let Some((t, td)) = self.type_after(new_type) else {
                continue;
            };
            if t.is_module() {
                continue;
            }
            let absorbed = member_names(t);

            let mut subclasses: Vec<TypeDescriptor> = self
                .after
                .subclasses_of(new_type)
                .into_iter()
                .filter_map(|sub_after| {
                    let sub_before = self.matches.type_partner_rev(sub_after)?;
                    let lost = self.lost_members(sub_before, sub_after);
                    if lost.is_disjoint(&absorbed) {
                        return None;
                    }
                    self.type_before(sub_before).map(|(_, d)| d)
                })
                .collect();
            if subclasses.len() >= 2 {
                subclasses.sort();
                out.push(Refactoring::ExtractSuperclass {
                    subclasses,
                    superclass: td,
                });
                continue;
            }

            for base_after in self.after.superclasses_of(new_type) {
                let Some(base_before) = self.matches.type_partner_rev(base_after) else {
                    continue;
                };
                let lost = self.lost_members(base_before, base_after);
                if lost.is_disjoint(&absorbed) {
                    continue;
                }
                let (Some((_, base_before)), Some((_, base_after))) =
                    (self.type_before(base_before), self.type_after(base_after))
                else {
                    continue;
                };
                out.push(Refactoring::ExtractSubclass {
                    base_before,
                    base_after,
                    subclass: td.clone(),
                });
            }
        }
    }
}

fn parent(qualified_name: &str) -> &str {
    qualified_name
        .rsplit_once('.')
        .map_or("", |(parent, _)| parent)
}

fn member_names(ty: &TypeDecl) -> BTreeSet<&str> {
    ty.operations
        .iter()
        .map(|op| op.name.as_str())
        .chain(ty.fields.iter().map(|f| f.name.as_str()))
        .collect()
}

// ============================================================================
// Attribute Changes
// ============================================================================

/// Independent scalar attribute changes of a matched operation pair.
fn attribute_changes(
    b: &Operation,
    a: &Operation,
    bd: &OperationDescriptor,
    ad: &OperationDescriptor,
    out: &mut Vec<Refactoring>,
) {
    if b.visibility != a.visibility {
        out.push(Refactoring::ChangeOperationVisibility {
            before: bd.clone(),
            after: ad.clone(),
            from: b.visibility,
            to: a.visibility,
        });
    }

    for modifier in [Modifier::Static, Modifier::Abstract] {
        match (b.has_modifier(modifier), a.has_modifier(modifier)) {
            (false, true) => out.push(Refactoring::AddOperationModifier {
                before: bd.clone(),
                after: ad.clone(),
                modifier,
            }),
            (true, false) => out.push(Refactoring::RemoveOperationModifier {
                before: bd.clone(),
                after: ad.clone(),
                modifier,
            }),
            _ => {}
        }
    }

    if b.return_type != a.return_type {
        out.push(Refactoring::ChangeReturnType {
            before: bd.clone(),
            after: ad.clone(),
            original_type: b.return_type.clone(),
            changed_type: a.return_type.clone(),
        });
    }

    parameter_changes(b, a, bd, ad, out);
}

fn parameter_changes(
    b: &Operation,
    a: &Operation,
    bd: &OperationDescriptor,
    ad: &OperationDescriptor,
    out: &mut Vec<Refactoring>,
) {
    let before_names = b.param_names();
    let after_names = a.param_names();
    let mut renamed_from = BTreeSet::new();
    let mut renamed_to = BTreeSet::new();

    if before_names.len() == after_names.len() {
        for (old, new) in before_names.iter().zip(&after_names) {
            if old != new && !after_names.contains(old) && !before_names.contains(new) {
                renamed_from.insert(*old);
                renamed_to.insert(*new);
                out.push(Refactoring::RenameParameter {
                    before: bd.clone(),
                    after: ad.clone(),
                    from: old.to_string(),
                    to: new.to_string(),
                });
            }
        }
    }

    for name in &before_names {
        if !after_names.contains(name) && !renamed_from.contains(name) {
            out.push(Refactoring::RemoveParameter {
                before: bd.clone(),
                after: ad.clone(),
                parameter: name.to_string(),
            });
        }
    }
    for name in &after_names {
        if !before_names.contains(name) && !renamed_to.contains(name) {
            out.push(Refactoring::AddParameter {
                before: bd.clone(),
                after: ad.clone(),
                parameter: name.to_string(),
            });
        }
    }

    for old in &b.params {
        let Some(new) = a.params.iter().find(|p| p.name == old.name) else {
            continue;
        };
        if old.annotation != new.annotation {
            out.push(Refactoring::ChangeParameterType {
                before: bd.clone(),
                after: ad.clone(),
                parameter: old.name.clone(),
                original_type: old.annotation.clone(),
                changed_type: new.annotation.clone(),
            });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
