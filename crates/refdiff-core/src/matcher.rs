//! Entity matching between two revisions.
//!
//! Types are paired first, then operations, each in tiers that only look at
//! entities left unresolved by earlier tiers:
//!
//! | Tier | Types | Operations |
//! |------|-------|------------|
//! | 1 | same qualified name and file | same name in partnered containers |
//! | 2 | same simple name elsewhere | same name, other container |
//! | 3 | same file, other name, similar | same container, other name, similar, shared names |
//! | 4 | similar structure only, strict, mutual unique best | similar body only, strict, mutual unique best |
//!
//! Whatever is left is added or removed. Leftover operations are then
//! checked for extract and inline candidates.
//!
//! Candidates within tiers 2 and 3 are ranked by score, then by edit
//! distance between qualified names, then by container kind, then by
//! discovery order, and assigned greedily. Every tier compares at most
//! `n * m` pairs of unresolved entities, which is the scaling limit of a diff.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::DiffConfig;
use crate::model::{Model, OperationRef, TypeId};
use crate::similarity::{
    body_similarity, edit_distance, parameter_similarity, shares_vocabulary, BodyProfile, TokenBag,
    TypeProfile,
};

// ============================================================================
// Evidence
// ============================================================================

/// Matcher tier that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Same identity in both revisions.
    Exact = 1,
    /// Same simple name, different location.
    SameName = 2,
    /// Same location, different name.
    SameContainer = 3,
    /// Different name and location, matched on body alone.
    BodyOnly = 4,
}

impl MatchTier {
    pub fn number(&self) -> u8 {
        *self as u8
    }
}

/// Why a match was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchEvidence {
    pub tier: MatchTier,
    /// Similarity score in `0.0..=1.0`.
    pub score: f64,
    /// Paired because the enclosing class was paired (nested classes).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub via_outer: bool,
}

impl MatchEvidence {
    pub fn new(tier: MatchTier, score: f64) -> Self {
        MatchEvidence {
            tier,
            score,
            via_outer: false,
        }
    }
}

/// A matched pair of type declarations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeMatch {
    pub before: TypeId,
    pub after: TypeId,
    pub evidence: MatchEvidence,
}

/// A matched pair of operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationMatch {
    pub before: OperationRef,
    pub after: OperationRef,
    pub evidence: MatchEvidence,
}

/// An added operation carved out of a matched one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractCandidate {
    /// The matched pair the body was taken from.
    pub source: OperationMatch,
    /// The added operation, in the after model.
    pub extracted: OperationRef,
    /// Fraction of the extracted body found in the source before.
    pub coverage: f64,
}

/// A removed operation absorbed into its single caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InlineCandidate {
    /// The removed operation, in the before model.
    pub inlined: OperationRef,
    /// The matched caller.
    pub target: OperationMatch,
    /// Fraction of the inlined body found in the caller after.
    pub coverage: f64,
}

/// Output of the matcher.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub types: Vec<TypeMatch>,
    pub operations: Vec<OperationMatch>,
    pub added_types: Vec<TypeId>,
    pub removed_types: Vec<TypeId>,
    pub added_operations: Vec<OperationRef>,
    pub removed_operations: Vec<OperationRef>,
    pub extract_candidates: Vec<ExtractCandidate>,
    pub inline_candidates: Vec<InlineCandidate>,
}

impl MatchResult {
    /// After partner of a before type.
    pub fn type_partner(&self, before: TypeId) -> Option<TypeId> {
        self.types
            .iter()
            .find(|m| m.before == before)
            .map(|m| m.after)
    }

    /// Before partner of an after type.
    pub fn type_partner_rev(&self, after: TypeId) -> Option<TypeId> {
        self.types
            .iter()
            .find(|m| m.after == after)
            .map(|m| m.before)
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// Body and type profiles of one model, indexed like the model.
#[derive(Debug, Clone)]
pub struct ModelProfiles {
    operations: Vec<Vec<BodyProfile>>,
    types: Vec<TypeProfile>,
}

impl ModelProfiles {
    pub fn new(model: &Model) -> Self {
        let operations: Vec<Vec<BodyProfile>> = model
            .types()
            .iter()
            .map(|t| t.operations.iter().map(BodyProfile::of_operation).collect())
            .collect();
        let types = model
            .types()
            .iter()
            .zip(&operations)
            .map(|(t, ops)| TypeProfile::new(t, ops))
            .collect();
        ModelProfiles { operations, types }
    }

    /// Profile of an operation. References come from the same model.
    pub fn operation(&self, op: OperationRef) -> &BodyProfile {
        &self.operations[op.owner.index()][op.index as usize]
    }

    pub fn type_profile(&self, id: TypeId) -> &TypeProfile {
        &self.types[id.index()]
    }
}

// ============================================================================
// Candidate Ranking
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Candidate<T> {
    before: T,
    after: T,
    score: f64,
    distance: usize,
    same_kind: bool,
    order: (usize, usize),
}

/// Best candidates first: score, then name distance, then same kind, then
/// discovery order.
fn rank<T>(a: &Candidate<T>, b: &Candidate<T>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.distance.cmp(&b.distance))
        .then(b.same_kind.cmp(&a.same_kind))
        .then(a.order.cmp(&b.order))
}

/// Greedy assignment over ranked candidates.
fn assign<T: Copy + Eq + std::hash::Hash>(mut candidates: Vec<Candidate<T>>) -> Vec<Candidate<T>> {
    candidates.sort_by(rank);
    let mut taken_before = HashSet::new();
    let mut taken_after = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            if taken_before.contains(&c.before) || taken_after.contains(&c.after) {
                return false;
            }
            taken_before.insert(c.before);
            taken_after.insert(c.after);
            true
        })
        .collect()
}

/// Mutual unique best matching over a full score matrix.
///
/// A pair is accepted when each side's best candidate is the other and
/// neither side has a second candidate with the same score.
fn mutual_best(scores: &[Vec<Option<f64>>]) -> Vec<(usize, usize, f64)> {
    fn unique_best(values: impl Iterator<Item = (usize, f64)>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        let mut tied = false;
        for (i, v) in values {
            match best {
                Some((_, b)) if v > b => {
                    best = Some((i, v));
                    tied = false;
                }
                Some((_, b)) if v == b => tied = true,
                None => best = Some((i, v)),
                _ => {}
            }
        }
        if tied {
            None
        } else {
            best.map(|(i, _)| i)
        }
    }

    let mut accepted = Vec::new();
    for (i, row) in scores.iter().enumerate() {
        let scored = row
            .iter()
            .enumerate()
            .filter_map(|(j, s)| s.map(|s| (j, s)));
        let Some(j) = unique_best(scored) else {
            continue;
        };
        let column = scores
            .iter()
            .enumerate()
            .filter_map(|(k, other)| other[j].map(|s| (k, s)));
        if unique_best(column) == Some(i) {
            if let Some(score) = row[j] {
                accepted.push((i, j, score));
            }
        }
    }
    accepted
}

// ============================================================================
// Entity Matcher
// ============================================================================

/// Pairs entities of a before model with entities of an after model.
pub struct EntityMatcher<'a> {
    before: &'a Model,
    after: &'a Model,
    before_profiles: &'a ModelProfiles,
    after_profiles: &'a ModelProfiles,
    config: &'a DiffConfig,
    /// Restrict type tiers 2-4 to top-level classes.
    top_level_only: bool,
    type_pairs: HashMap<TypeId, (TypeId, MatchEvidence)>,
    type_pairs_rev: HashMap<TypeId, TypeId>,
    op_pairs: HashMap<OperationRef, (OperationRef, MatchEvidence)>,
    op_pairs_rev: HashMap<OperationRef, OperationRef>,
}

impl<'a> EntityMatcher<'a> {
    pub fn new(
        before: &'a Model,
        after: &'a Model,
        before_profiles: &'a ModelProfiles,
        after_profiles: &'a ModelProfiles,
        config: &'a DiffConfig,
    ) -> Self {
        EntityMatcher {
            before,
            after,
            before_profiles,
            after_profiles,
            config,
            top_level_only: false,
            type_pairs: HashMap::new(),
            type_pairs_rev: HashMap::new(),
            op_pairs: HashMap::new(),
            op_pairs_rev: HashMap::new(),
        }
    }

    /// Run every tier and collect the result.
    pub fn run(mut self) -> MatchResult {
        self.match_types();
        self.match_operations();

        let mut result = MatchResult::default();
        for (before, _) in self.before.type_entries() {
            if let Some((after, evidence)) = self.type_pairs.get(&before) {
                result.types.push(TypeMatch {
                    before,
                    after: *after,
                    evidence: *evidence,
                });
            } else {
                result.removed_types.push(before);
            }
        }
        result.added_types = self
            .after
            .type_entries()
            .map(|(id, _)| id)
            .filter(|id| !self.type_pairs_rev.contains_key(id))
            .collect();

        for (before, _) in self.before.operations() {
            if let Some((after, evidence)) = self.op_pairs.get(&before) {
                result.operations.push(OperationMatch {
                    before,
                    after: *after,
                    evidence: *evidence,
                });
            } else {
                result.removed_operations.push(before);
            }
        }
        result.added_operations = self
            .after
            .operations()
            .map(|(r, _)| r)
            .filter(|r| !self.op_pairs_rev.contains_key(r))
            .collect();

        result.extract_candidates = self.extract_candidates(&result);
        result.inline_candidates = self.inline_candidates(&result);

        debug!(
            types = result.types.len(),
            operations = result.operations.len(),
            added_types = result.added_types.len(),
            removed_types = result.removed_types.len(),
            added_operations = result.added_operations.len(),
            removed_operations = result.removed_operations.len(),
            extract = result.extract_candidates.len(),
            inline = result.inline_candidates.len(),
            "matching complete"
        );
        result
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    fn pair_types(&mut self, before: TypeId, after: TypeId, evidence: MatchEvidence) {
        trace!(
            %before,
            %after,
            tier = evidence.tier.number(),
            score = evidence.score,
            "type match"
        );
        self.type_pairs.insert(before, (after, evidence));
        self.type_pairs_rev.insert(after, before);
    }

    fn unmatched_types_before(&self) -> Vec<TypeId> {
        self.before
            .classes()
            .filter(|(id, t)| {
                !self.type_pairs.contains_key(id) && !(self.top_level_only && t.outer.is_some())
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn unmatched_types_after(&self) -> Vec<TypeId> {
        self.after
            .classes()
            .filter(|(id, t)| {
                !self.type_pairs_rev.contains_key(id) && !(self.top_level_only && t.outer.is_some())
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn match_types(&mut self) {
        // Tier 1: exact identity. Module containers only ever match here.
        let after_index: HashMap<(&str, &str), TypeId> = self
            .after
            .type_entries()
            .map(|(id, t)| ((t.qualified_name.as_str(), t.file.as_str()), id))
            .collect();
        let exact: Vec<(TypeId, TypeId)> = self
            .before
            .type_entries()
            .filter_map(|(id, t)| {
                let after = after_index.get(&(t.qualified_name.as_str(), t.file.as_str()))?;
                let a = self.after.type_decl(*after)?;
                (a.is_module() == t.is_module()).then_some((id, *after))
            })
            .collect();
        for (before, after) in exact {
            self.pair_types(before, after, MatchEvidence::new(MatchTier::Exact, 1.0));
        }
        self.propagate_nested_types();

        // Enclosing classes first, so nested classes can follow them.
        for top_level_only in [true, false] {
            self.top_level_only = top_level_only;
            self.match_types_by_name();
            self.propagate_nested_types();

            self.match_types_in_file();
            self.propagate_nested_types();

            self.match_types_by_structure();
            self.propagate_nested_types();
        }
        self.top_level_only = false;
    }

    /// Pair unmatched nested classes whose enclosing classes are paired.
    fn propagate_nested_types(&mut self) {
        let top_level_only = std::mem::replace(&mut self.top_level_only, false);
        loop {
            let mut found = Vec::new();
            for before in self.unmatched_types_before() {
                let Some(b) = self.before.type_decl(before) else {
                    continue;
                };
                let Some(outer_before) = b.outer.as_deref().and_then(|o| self.before.find_type(o))
                else {
                    continue;
                };
                let Some((outer_after, outer_evidence)) =
                    self.type_pairs.get(&outer_before).copied()
                else {
                    continue;
                };
                let Some(outer_after_qn) = self
                    .after
                    .type_decl(outer_after)
                    .map(|t| t.qualified_name.clone())
                else {
                    continue;
                };
                let partner = self.unmatched_types_after().into_iter().find(|a| {
                    self.after.type_decl(*a).is_some_and(|t| {
                        t.name == b.name && t.outer.as_deref() == Some(outer_after_qn.as_str())
                    })
                });
                if let Some(after) = partner {
                    let mut evidence = MatchEvidence::new(outer_evidence.tier, 1.0);
                    evidence.via_outer = outer_evidence.tier != MatchTier::Exact;
                    if !evidence.via_outer {
                        evidence.tier = MatchTier::Exact;
                    }
                    found.push((before, after, evidence));
                }
            }
            if found.is_empty() {
                break;
            }
            for (before, after, evidence) in found {
                if !self.type_pairs.contains_key(&before)
                    && !self.type_pairs_rev.contains_key(&after)
                {
                    self.pair_types(before, after, evidence);
                }
            }
        }
        self.top_level_only = top_level_only;
    }

    fn type_candidate(
        &self,
        before: TypeId,
        after: TypeId,
        score: f64,
        order: (usize, usize),
    ) -> Option<Candidate<TypeId>> {
        let b = self.before.type_decl(before)?;
        let a = self.after.type_decl(after)?;
        Some(Candidate {
            before,
            after,
            score,
            distance: edit_distance(&b.qualified_name, &a.qualified_name),
            same_kind: b.kind == a.kind,
            order,
        })
    }

    /// Tier 2: same simple name, different location.
    fn match_types_by_name(&mut self) {
        let befores = self.unmatched_types_before();
        let afters = self.unmatched_types_after();
        let mut candidates = Vec::new();
        for (i, &before) in befores.iter().enumerate() {
            let Some(b) = self.before.type_decl(before) else {
                continue;
            };
            for (j, &after) in afters.iter().enumerate() {
                let Some(a) = self.after.type_decl(after) else {
                    continue;
                };
                if a.name != b.name {
                    continue;
                }
                let bp = self.before_profiles.type_profile(before);
                let ap = self.after_profiles.type_profile(after);
                let score = bp.member_similarity(ap).max(bp.similarity(ap));
                if score >= self.config.move_threshold {
                    candidates.extend(self.type_candidate(before, after, score, (i, j)));
                }
            }
        }
        for c in assign(candidates) {
            self.pair_types(
                c.before,
                c.after,
                MatchEvidence::new(MatchTier::SameName, c.score),
            );
        }
    }

    /// Tier 3: same file, different name.
    fn match_types_in_file(&mut self) {
        let befores = self.unmatched_types_before();
        let afters = self.unmatched_types_after();
        let mut candidates = Vec::new();
        for (i, &before) in befores.iter().enumerate() {
            let Some(b) = self.before.type_decl(before) else {
                continue;
            };
            let bp = self.before_profiles.type_profile(before);
            if bp.bag.total() < self.config.min_body_tokens {
                continue;
            }
            for (j, &after) in afters.iter().enumerate() {
                let Some(a) = self.after.type_decl(after) else {
                    continue;
                };
                if a.file != b.file || a.name == b.name {
                    continue;
                }
                let score = bp.similarity(self.after_profiles.type_profile(after));
                if score >= self.config.rename_threshold {
                    candidates.extend(self.type_candidate(before, after, score, (i, j)));
                }
            }
        }
        for c in assign(candidates) {
            self.pair_types(
                c.before,
                c.after,
                MatchEvidence::new(MatchTier::SameContainer, c.score),
            );
        }
    }

    /// Tier 4: structure only, strict threshold, mutual unique best.
    fn match_types_by_structure(&mut self) {
        let befores = self.unmatched_types_before();
        let afters = self.unmatched_types_after();
        let scores: Vec<Vec<Option<f64>>> = befores
            .iter()
            .map(|&before| {
                let bp = self.before_profiles.type_profile(before);
                afters
                    .iter()
                    .map(|&after| {
                        if bp.bag.total() < self.config.min_body_tokens {
                            return None;
                        }
                        let score = bp.similarity(self.after_profiles.type_profile(after));
                        (score >= self.config.move_rename_threshold).then_some(score)
                    })
                    .collect()
            })
            .collect();
        for (i, j, score) in mutual_best(&scores) {
            self.pair_types(
                befores[i],
                afters[j],
                MatchEvidence::new(MatchTier::BodyOnly, score),
            );
        }
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    fn pair_operations(
        &mut self,
        before: OperationRef,
        after: OperationRef,
        evidence: MatchEvidence,
    ) {
        trace!(
            %before,
            %after,
            tier = evidence.tier.number(),
            score = evidence.score,
            "operation match"
        );
        self.op_pairs.insert(before, (after, evidence));
        self.op_pairs_rev.insert(after, before);
    }

    fn unmatched_ops_before(&self) -> Vec<OperationRef> {
        self.before
            .operations()
            .map(|(r, _)| r)
            .filter(|r| !self.op_pairs.contains_key(r))
            .collect()
    }

    fn unmatched_ops_after(&self) -> Vec<OperationRef> {
        self.after
            .operations()
            .map(|(r, _)| r)
            .filter(|r| !self.op_pairs_rev.contains_key(r))
            .collect()
    }

    fn containers_partnered(&self, before: TypeId, after: TypeId) -> bool {
        self.type_pairs.get(&before).map(|(a, _)| *a) == Some(after)
    }

    fn op_candidate(
        &self,
        before: OperationRef,
        after: OperationRef,
        score: f64,
        order: (usize, usize),
    ) -> Option<Candidate<OperationRef>> {
        let b_name = self.before.operation_qualified_name(before)?;
        let a_name = self.after.operation_qualified_name(after)?;
        let b_kind = self.before.type_decl(before.owner)?.kind;
        let a_kind = self.after.type_decl(after.owner)?.kind;
        Some(Candidate {
            before,
            after,
            score,
            distance: edit_distance(&b_name, &a_name),
            same_kind: b_kind == a_kind,
            order,
        })
    }

    fn body_score(&self, before: OperationRef, after: OperationRef) -> f64 {
        body_similarity(
            self.before_profiles.operation(before),
            self.after_profiles.operation(after),
        )
    }

    fn is_substantial(&self, profile: &BodyProfile) -> bool {
        profile.size() >= self.config.min_body_tokens
    }

    fn match_operations(&mut self) {
        // Tier 1: same name in partnered containers, paired in declaration order.
        let mut exact = Vec::new();
        for (before, b) in self.before.operations() {
            let Some((after_owner, _)) = self.type_pairs.get(&before.owner) else {
                continue;
            };
            let Some(owner) = self.after.type_decl(*after_owner) else {
                continue;
            };
            let taken: Vec<OperationRef> = exact.iter().map(|(_, a)| *a).collect();
            let partner = owner
                .operations
                .iter()
                .enumerate()
                .map(|(i, op)| (OperationRef::new(*after_owner, i as u32), op))
                .find(|(r, op)| op.name == b.name && !taken.contains(r));
            if let Some((after, _)) = partner {
                exact.push((before, after));
            }
        }
        for (before, after) in exact {
            self.pair_operations(before, after, MatchEvidence::new(MatchTier::Exact, 1.0));
        }

        self.match_operations_by_name();
        self.match_operations_in_container();
        self.match_operations_by_body();
    }

    /// Tier 2: same name, container not partnered.
    fn match_operations_by_name(&mut self) {
        let befores = self.unmatched_ops_before();
        let afters = self.unmatched_ops_after();
        let mut candidates = Vec::new();
        for (i, &before) in befores.iter().enumerate() {
            let Some(b) = self.before.operation(before) else {
                continue;
            };
            if b.is_dunder() {
                continue;
            }
            for (j, &after) in afters.iter().enumerate() {
                let Some(a) = self.after.operation(after) else {
                    continue;
                };
                if a.name != b.name || self.containers_partnered(before.owner, after.owner) {
                    continue;
                }
                let score = 0.8 * self.body_score(before, after) + 0.2 * parameter_similarity(b, a);
                if score >= self.config.move_threshold {
                    candidates.extend(self.op_candidate(before, after, score, (i, j)));
                }
            }
        }
        for c in assign(candidates) {
            self.pair_operations(
                c.before,
                c.after,
                MatchEvidence::new(MatchTier::SameName, c.score),
            );
        }
    }

    /// Tier 3: partnered container, different name, some shared vocabulary.
    fn match_operations_in_container(&mut self) {
        let befores = self.unmatched_ops_before();
        let afters = self.unmatched_ops_after();
        let mut candidates = Vec::new();
        for (i, &before) in befores.iter().enumerate() {
            let Some(b) = self.before.operation(before) else {
                continue;
            };
            if b.is_dunder() || !self.is_substantial(self.before_profiles.operation(before)) {
                continue;
            }
            for (j, &after) in afters.iter().enumerate() {
                let Some(a) = self.after.operation(after) else {
                    continue;
                };
                if a.is_dunder()
                    || a.name == b.name
                    || !self.containers_partnered(before.owner, after.owner)
                {
                    continue;
                }
                let score = self.body_score(before, after);
                if score >= self.config.rename_threshold
                    && shares_vocabulary(
                        self.before_profiles.operation(before),
                        self.after_profiles.operation(after),
                    )
                {
                    candidates.extend(self.op_candidate(before, after, score, (i, j)));
                }
            }
        }
        for c in assign(candidates) {
            self.pair_operations(
                c.before,
                c.after,
                MatchEvidence::new(MatchTier::SameContainer, c.score),
            );
        }
    }

    /// Tier 4: body only, strict threshold, mutual unique best.
    fn match_operations_by_body(&mut self) {
        let befores = self.unmatched_ops_before();
        let afters = self.unmatched_ops_after();
        let scores: Vec<Vec<Option<f64>>> = befores
            .iter()
            .map(|&before| {
                let op = self.before.operation(before);
                let substantial = self.is_substantial(self.before_profiles.operation(before))
                    && op.is_some_and(|b| !b.is_dunder());
                afters
                    .iter()
                    .map(|&after| {
                        if !substantial
                            || self.after.operation(after).is_none_or(|a| a.is_dunder())
                        {
                            return None;
                        }
                        let score = self.body_score(before, after);
                        (score >= self.config.move_rename_threshold).then_some(score)
                    })
                    .collect()
            })
            .collect();
        for (i, j, score) in mutual_best(&scores) {
            self.pair_operations(
                befores[i],
                afters[j],
                MatchEvidence::new(MatchTier::BodyOnly, score),
            );
        }
    }

    // ------------------------------------------------------------------------
    // Tier 5: extract and inline candidates
    // ------------------------------------------------------------------------

    /// Added operations whose body came out of a matched operation that now
    /// calls them.
    fn extract_candidates(&self, result: &MatchResult) -> Vec<ExtractCandidate> {
        let mut found = Vec::new();
        for &extracted in &result.added_operations {
            let Some(new_op) = self.after.operation(extracted) else {
                continue;
            };
            let new_profile = self.after_profiles.operation(extracted);
            if !self.is_substantial(new_profile) {
                continue;
            }
            for source in &result.operations {
                let before_profile = self.before_profiles.operation(source.before);
                let after_profile = self.after_profiles.operation(source.after);
                if !after_profile.calls_name(&new_op.name)
                    || before_profile.calls_name(&new_op.name)
                {
                    continue;
                }
                let removed: TokenBag = before_profile.bag.difference(&after_profile.bag);
                if removed.is_empty() {
                    continue;
                }
                let coverage = new_profile.bag.containment_in(&before_profile.bag);
                if coverage >= self.config.extract_threshold {
                    debug!(%extracted, source = %source.before, coverage, "extract candidate");
                    found.push(ExtractCandidate {
                        source: *source,
                        extracted,
                        coverage,
                    });
                }
            }
        }
        found
    }

    /// Removed operations called exactly once, from a matched operation that
    /// absorbed their body.
    fn inline_candidates(&self, result: &MatchResult) -> Vec<InlineCandidate> {
        let mut found = Vec::new();
        for &inlined in &result.removed_operations {
            let Some(old_op) = self.before.operation(inlined) else {
                continue;
            };
            let inlined_profile = self.before_profiles.operation(inlined);
            if !self.is_substantial(inlined_profile) {
                continue;
            }
            let callers: Vec<(OperationRef, usize)> = self
                .before
                .operations()
                .filter(|(r, _)| *r != inlined)
                .map(|(r, _)| (r, self.before_profiles.operation(r).call_count(&old_op.name)))
                .filter(|(_, count)| *count > 0)
                .collect();
            let [(caller, 1)] = callers.as_slice() else {
                continue;
            };
            let Some(target) = result.operations.iter().find(|m| m.before == *caller) else {
                continue;
            };
            let before_profile = self.before_profiles.operation(target.before);
            let after_profile = self.after_profiles.operation(target.after);
            if after_profile.calls_name(&old_op.name) {
                continue;
            }
            if after_profile.bag.difference(&before_profile.bag).is_empty() {
                continue;
            }
            let coverage = inlined_profile.bag.containment_in(&after_profile.bag);
            if coverage >= self.config.extract_threshold {
                debug!(%inlined, target = %target.before, coverage, "inline candidate");
                found.push(InlineCandidate {
                    inlined,
                    target: *target,
                    coverage,
                });
            }
        }
        found
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, LiteralKind, Statement, StmtKind};
    use crate::model::{Operation, Parameter, TypeDecl};

    fn ret(value: Expr) -> Statement {
        Statement::bare(StmtKind::Return { value: Some(value) })
    }

    fn sum_body() -> Vec<Statement> {
        vec![ret(Expr::BinOp {
            op: "+".to_string(),
            left: Box::new(Expr::name("x")),
            right: Box::new(Expr::name("y")),
        })]
    }

    fn sum_method(name: &str) -> Operation {
        Operation::method(name)
            .with_params(vec![Parameter::new("x"), Parameter::new("y")])
            .with_body(sum_body())
    }

    fn greet_method(name: &str) -> Operation {
        Operation::method(name).with_body(vec![Statement::bare(StmtKind::Expr {
            value: Expr::call("print", vec![Expr::literal(LiteralKind::Str, "'hi'")]),
        })])
    }

    fn run(before: &Model, after: &Model) -> MatchResult {
        let config = DiffConfig::default();
        let bp = ModelProfiles::new(before);
        let ap = ModelProfiles::new(after);
        EntityMatcher::new(before, after, &bp, &ap, &config).run()
    }

    mod type_tiers {
        use super::*;

        #[test]
        fn identical_models_match_exactly() {
            let model = Model::from_types(vec![
                TypeDecl::module_container("calc", "calc.py"),
                TypeDecl::class("Calculator", "calc", "calc.py").with_operation(sum_method("sum")),
            ]);
            let result = run(&model, &model);
            assert_eq!(result.types.len(), 2);
            let tiers: Vec<MatchTier> = result.types.iter().map(|m| m.evidence.tier).collect();
            assert_eq!(tiers, vec![MatchTier::Exact; 2]);
            assert!(result.added_types.is_empty());
            assert!(result.removed_types.is_empty());
            assert!(result.added_operations.is_empty());
        }

        #[test]
        fn renamed_class_matches_in_tier_three() {
            let before = Model::from_types(vec![
                TypeDecl::class("Calculator", "calc", "calc.py").with_operation(sum_method("sum")),
            ]);
            let renamed = TypeDecl::class("AdvancedCalculator", "calc", "calc.py")
                .with_operation(sum_method("sum"));
            let after = Model::from_types(vec![renamed]);
            let result = run(&before, &after);
            assert_eq!(result.types.len(), 1);
            assert_eq!(result.types[0].evidence.tier, MatchTier::SameContainer);
            assert_eq!(result.operations[0].evidence.tier, MatchTier::Exact);
        }

        #[test]
        fn moved_class_matches_in_tier_two() {
            let before = Model::from_types(vec![
                TypeDecl::class("Utils", "helper", "helper.py").with_operation(sum_method("add")),
            ]);
            let after = Model::from_types(vec![
                TypeDecl::class("Utils", "common", "common.py").with_operation(sum_method("add")),
            ]);
            let result = run(&before, &after);
            assert_eq!(result.types[0].evidence.tier, MatchTier::SameName);
        }

        #[test]
        fn unrelated_class_stays_added() {
            let before = Model::from_types(vec![
                TypeDecl::class("Calculator", "calc", "calc.py").with_operation(sum_method("sum")),
            ]);
            let after = Model::from_types(vec![
                TypeDecl::class("Calculator", "calc", "calc.py").with_operation(sum_method("sum")),
                TypeDecl::class("Greeter", "calc", "calc.py").with_operation(greet_method("greet")),
            ]);
            let result = run(&before, &after);
            assert_eq!(result.added_types, vec![TypeId::new(1)]);
            assert_eq!(result.added_operations.len(), 1);
        }

        #[test]
        fn nested_class_follows_renamed_outer() {
            let mut inner_before = TypeDecl::class("Inner", "m", "m.py");
            inner_before.qualified_name = "m.Outer.Inner".to_string();
            inner_before.outer = Some("m.Outer".to_string());
            let mut inner_after = TypeDecl::class("Inner", "m", "m.py");
            inner_after.qualified_name = "m.Renamed.Inner".to_string();
            inner_after.outer = Some("m.Renamed".to_string());

            let before = Model::from_types(vec![
                TypeDecl::class("Outer", "m", "m.py").with_operation(sum_method("sum")),
                inner_before,
            ]);
            let after = Model::from_types(vec![
                TypeDecl::class("Renamed", "m", "m.py").with_operation(sum_method("sum")),
                inner_after,
            ]);
            let result = run(&before, &after);
            let inner = result
                .types
                .iter()
                .find(|m| m.before == TypeId::new(1))
                .unwrap();
            assert_eq!(inner.after, TypeId::new(1));
            assert!(inner.evidence.via_outer);
        }
    }

    mod operation_tiers {
        use super::*;

        #[test]
        fn renamed_method_matches_in_tier_three() {
            let before = Model::from_types(vec![
                TypeDecl::class("C", "m", "m.py").with_operation(sum_method("add")),
            ]);
            let after = Model::from_types(vec![
                TypeDecl::class("C", "m", "m.py").with_operation(sum_method("plus")),
            ]);
            let result = run(&before, &after);
            assert_eq!(result.operations.len(), 1);
            assert_eq!(result.operations[0].evidence.tier, MatchTier::SameContainer);
        }

        #[test]
        fn moved_method_matches_in_tier_two() {
            let before = Model::from_types(vec![
                TypeDecl::class("A", "m", "m.py")
                    .with_operation(sum_method("add"))
                    .with_operation(greet_method("greet")),
                TypeDecl::class("B", "m", "m.py").with_operation(greet_method("hello")),
            ]);
            let after = Model::from_types(vec![
                TypeDecl::class("A", "m", "m.py").with_operation(greet_method("greet")),
                TypeDecl::class("B", "m", "m.py")
                    .with_operation(greet_method("hello"))
                    .with_operation(sum_method("add")),
            ]);
            let result = run(&before, &after);
            let moved = result
                .operations
                .iter()
                .find(|m| m.evidence.tier == MatchTier::SameName)
                .unwrap();
            assert_eq!(moved.before, OperationRef::new(TypeId::new(0), 0));
            assert_eq!(moved.after, OperationRef::new(TypeId::new(1), 1));
        }

        #[test]
        fn ambiguous_body_only_match_is_rejected() {
            let before = Model::from_types(vec![
                TypeDecl::class("A", "a", "a.py").with_operation(sum_method("add")),
            ]);
            let after = Model::from_types(vec![
                TypeDecl::class("A", "a", "a.py"),
                TypeDecl::class("B", "b", "b.py")
                    .with_operation(sum_method("plus"))
                    .with_operation(sum_method("total")),
            ]);
            let result = run(&before, &after);
            assert!(result.operations.is_empty());
            assert_eq!(result.removed_operations.len(), 1);
            assert_eq!(result.added_operations.len(), 2);
        }

        #[test]
        fn unique_body_only_match_is_accepted() {
            let before = Model::from_types(vec![
                TypeDecl::class("A", "a", "a.py").with_operation(sum_method("add")),
            ]);
            let after = Model::from_types(vec![
                TypeDecl::class("A", "a", "a.py"),
                TypeDecl::class("B", "b", "b.py").with_operation(sum_method("plus")),
            ]);
            let result = run(&before, &after);
            assert_eq!(result.operations.len(), 1);
            assert_eq!(result.operations[0].evidence.tier, MatchTier::BodyOnly);
        }
    }

    mod tie_breaking {
        use super::*;
        use crate::model::TypeKind;

        #[test]
        fn equal_scores_prefer_closer_name() {
            // Discovery order alone would pick `total`.
            let before = Model::from_types(vec![
                TypeDecl::class("C", "m", "m.py").with_operation(sum_method("add")),
            ]);
            let container = TypeDecl::class("C", "m", "m.py")
                .with_operation(sum_method("total"))
                .with_operation(sum_method("plus"));
            let after = Model::from_types(vec![container]);
            let result = run(&before, &after);
            assert_eq!(result.operations.len(), 1);
            assert_eq!(result.operations[0].evidence.score, 1.0);
            assert_eq!(
                result.operations[0].after,
                OperationRef::new(TypeId::new(0), 1)
            );
            assert_eq!(
                result.added_operations,
                vec![OperationRef::new(TypeId::new(0), 0)]
            );
        }

        #[test]
        fn equal_scores_and_distances_follow_discovery_order() {
            let before = Model::from_types(vec![
                TypeDecl::class("C", "m", "m.py").with_operation(sum_method("add")),
            ]);
            let container = TypeDecl::class("C", "m", "m.py")
                .with_operation(sum_method("ady"))
                .with_operation(sum_method("adx"));
            let after = Model::from_types(vec![container]);
            let result = run(&before, &after);
            assert_eq!(result.operations.len(), 1);
            assert_eq!(
                result.operations[0].after,
                OperationRef::new(TypeId::new(0), 0)
            );

            // Same outcome on every run.
            assert_eq!(run(&before, &after).operations, result.operations);
        }

        #[test]
        fn equal_scores_and_distances_prefer_same_kind() {
            let mut as_enum = TypeDecl::class("Shape", "b", "b.py");
            as_enum.kind = TypeKind::Enum;
            let as_enum = as_enum.with_operation(sum_method("area"));
            let before = Model::from_types(vec![
                TypeDecl::class("Shape", "a", "a.py").with_operation(sum_method("area")),
            ]);
            let after = Model::from_types(vec![
                as_enum,
                TypeDecl::class("Shape", "c", "c.py").with_operation(sum_method("area")),
            ]);
            let result = run(&before, &after);
            assert_eq!(result.types.len(), 1);
            assert_eq!(result.types[0].evidence.tier, MatchTier::SameName);
            assert_eq!(result.types[0].after, TypeId::new(1));
            assert_eq!(result.added_types, vec![TypeId::new(0)]);
        }
    }

    mod candidates {
        use super::*;

        fn compute_body() -> Vec<Statement> {
            vec![
                Statement::bare(StmtKind::Assign {
                    targets: vec![Expr::name("total")],
                    value: Some(Expr::BinOp {
                        op: "*".to_string(),
                        left: Box::new(Expr::name("price")),
                        right: Box::new(Expr::name("qty")),
                    }),
                    annotation: None,
                }),
                ret(Expr::name("total")),
            ]
        }

        fn log_start() -> Statement {
            Statement::bare(StmtKind::Expr {
                value: Expr::call("log", vec![Expr::literal(LiteralKind::Str, "'start'")]),
            })
        }

        #[test]
        fn extracted_helper_is_a_candidate() {
            let mut before_body = compute_body();
            before_body.insert(0, log_start());
            let before_order = TypeDecl::class("Order", "m", "m.py")
                .with_operation(Operation::method("checkout").with_body(before_body));
            let before = Model::from_types(vec![before_order]);

            let checkout = Operation::method("checkout").with_body(vec![
                log_start(),
                ret(Expr::call("self.compute_total", vec![])),
            ]);
            let helper = Operation::method("compute_total").with_body(compute_body());
            let after_order = TypeDecl::class("Order", "m", "m.py")
                .with_operation(checkout)
                .with_operation(helper);
            let after = Model::from_types(vec![after_order]);

            let result = run(&before, &after);
            assert_eq!(result.extract_candidates.len(), 1);
            let candidate = result.extract_candidates[0];
            assert_eq!(candidate.extracted, OperationRef::new(TypeId::new(0), 1));
            assert!(candidate.coverage >= 0.99);
        }

        #[test]
        fn inlined_helper_is_a_candidate() {
            let checkout = Operation::method("checkout")
                .with_body(vec![ret(Expr::call("self.compute_total", vec![]))]);
            let before_order = TypeDecl::class("Order", "m", "m.py")
                .with_operation(checkout)
                .with_operation(Operation::method("compute_total").with_body(compute_body()));
            let before = Model::from_types(vec![before_order]);
            let after_order = TypeDecl::class("Order", "m", "m.py")
                .with_operation(Operation::method("checkout").with_body(compute_body()));
            let after = Model::from_types(vec![after_order]);

            let result = run(&before, &after);
            assert_eq!(result.inline_candidates.len(), 1);
            assert_eq!(
                result.inline_candidates[0].inlined,
                OperationRef::new(TypeId::new(0), 1)
            );
        }
    }
}
