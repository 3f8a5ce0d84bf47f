//! Body and structure similarity.
//!
//! Operation bodies are reduced to a bag of structural tokens: statement
//! kinds, call targets, attribute and variable names, literals and operators.
//! The name of the entity being compared is replaced by a placeholder so that
//! a renamed recursive function still compares equal, and the implicit
//! receiver (`self`, `cls`) is dropped since it carries no information.
//!
//! Token bags are compared with a multiset Dice coefficient. A second,
//! order-sensitive component compares the sequence of statement kinds so that
//! bodies with the same vocabulary but different control flow score lower.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ast::{Block, Expr, Statement, StmtKind};
use crate::model::{Operation, TypeDecl};
use crate::visitor::{walk_block, CallCollector, VisitResult, Visitor};

/// Placeholder for references to the entity's own name.
const SELF_TOKEN: &str = "$self";

// ============================================================================
// Fingerprint
// ============================================================================

/// SHA-256 of the normalized token sequence of a body.
///
/// Equal fingerprints mean the bodies are identical up to the entity's own
/// name and the receiver name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyFingerprint(pub String);

impl BodyFingerprint {
    fn of(tokens: &[String]) -> Self {
        let mut hasher = Sha256::new();
        for token in tokens {
            hasher.update(token.as_bytes());
            hasher.update([0u8]);
        }
        BodyFingerprint(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for BodyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

struct TokenCollector<'a> {
    own_name: &'a str,
    receiver: Option<&'a str>,
    tokens: Vec<String>,
    kinds: Vec<&'static str>,
}

impl<'a> TokenCollector<'a> {
    fn new(own_name: &'a str, receiver: Option<&'a str>) -> Self {
        TokenCollector {
            own_name,
            receiver,
            tokens: Vec::new(),
            kinds: Vec::new(),
        }
    }

    fn name_token(&self, prefix: &str, name: &str) -> String {
        if name == self.own_name {
            format!("{prefix}:{SELF_TOKEN}")
        } else {
            format!("{prefix}:{name}")
        }
    }
}

impl Visitor for TokenCollector<'_> {
    fn visit_stmt(&mut self, stmt: &Statement) -> VisitResult {
        let kind = stmt.kind.name();
        self.kinds.push(kind);
        self.tokens.push(format!("stmt:{kind}"));
        match &stmt.kind {
            StmtKind::Assign {
                annotation: Some(annotation),
                ..
            } => self.tokens.push(format!("ann:{annotation}")),
            StmtKind::AugAssign { op, .. } => self.tokens.push(format!("op:{op}")),
            StmtKind::Import { module, names } => {
                self.tokens.push(format!("import:{module}"));
                self.tokens
                    .extend(names.iter().map(|n| format!("import:{module}.{n}")));
            }
            StmtKind::Other { kind, .. } => self.tokens.push(format!("other:{kind}")),
            _ => {}
        }
        VisitResult::Continue
    }

    fn visit_expr(&mut self, expr: &Expr) -> VisitResult {
        match expr {
            Expr::Name { id } => {
                if Some(id.as_str()) != self.receiver {
                    let token = self.name_token("name", id);
                    self.tokens.push(token);
                }
            }
            Expr::Attribute { attr, .. } => {
                let token = self.name_token("attr", attr);
                self.tokens.push(token);
            }
            Expr::Call { func, .. } => {
                if let Some(callee) = func.callee_name() {
                    let token = self.name_token("call", callee);
                    self.tokens.push(token);
                }
            }
            Expr::Keyword { name, .. } => self.tokens.push(format!("kw:{name}")),
            Expr::Literal { text, .. } => self.tokens.push(format!("lit:{text}")),
            Expr::BinOp { op, .. } | Expr::UnaryOp { op, .. } | Expr::BoolOp { op, .. } => {
                self.tokens.push(format!("op:{op}"))
            }
            Expr::Compare { ops, .. } => self.tokens.extend(ops.iter().map(|o| format!("cmp:{o}"))),
            Expr::Subscript { .. } => self.tokens.push("subscript".to_string()),
            Expr::Collection { kind, .. } => self.tokens.push(format!("coll:{}", kind.name())),
            Expr::Comprehension { kind, .. } => self.tokens.push(format!("comp:{}", kind.name())),
            Expr::Lambda { .. } => self.tokens.push("lambda".to_string()),
            Expr::Conditional { .. } => self.tokens.push("cond".to_string()),
            Expr::Await { .. } => self.tokens.push("await".to_string()),
            Expr::Yield { .. } => self.tokens.push("yield".to_string()),
            Expr::Starred { .. } => self.tokens.push("star".to_string()),
            Expr::Other { kind, text } => self.tokens.push(format!("other:{kind}:{text}")),
        }
        VisitResult::Continue
    }
}

// ============================================================================
// Body Profile
// ============================================================================

/// Precomputed comparison data for one operation body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyProfile {
    /// Token multiset.
    pub bag: TokenBag,
    /// Statement kinds in pre-order.
    pub kinds: Vec<&'static str>,
    pub fingerprint: BodyFingerprint,
    /// Names, calls and literals only: the part of the bag that says what a
    /// body is about rather than how it is shaped.
    pub vocabulary: TokenBag,
    /// Simple names of every call target, in source order.
    pub calls: Vec<String>,
}

impl BodyProfile {
    /// Profile a body, normalizing references to `own_name`.
    pub fn of_block(body: &Block, own_name: &str, receiver: Option<&str>) -> Self {
        let mut collector = TokenCollector::new(own_name, receiver);
        walk_block(&mut collector, body);
        let fingerprint = BodyFingerprint::of(&collector.tokens);
        let vocabulary = TokenBag::from_tokens(
            collector
                .tokens
                .iter()
                .filter(|t| is_vocabulary(t))
                .cloned(),
        );
        BodyProfile {
            bag: TokenBag::from_tokens(collector.tokens),
            kinds: collector.kinds,
            fingerprint,
            vocabulary,
            calls: CallCollector::collect(body),
        }
    }

    /// Profile an operation body.
    pub fn of_operation(op: &Operation) -> Self {
        Self::of_block(&op.body, &op.name, op.receiver.as_deref())
    }

    /// Total number of tokens.
    pub fn size(&self) -> u32 {
        self.bag.total()
    }

    /// Whether the body contains a call to `name`.
    pub fn calls_name(&self, name: &str) -> bool {
        self.calls.iter().any(|c| c == name)
    }

    /// Number of calls to `name`.
    pub fn call_count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| *c == name).count()
    }
}

/// Tokens naming something the body refers to.
fn is_vocabulary(token: &str) -> bool {
    const PREFIXES: &[&str] = &["name:", "attr:", "call:", "kw:", "lit:", "ann:", "import:"];
    PREFIXES.iter().any(|p| token.starts_with(p))
}

/// Whether two bodies refer to at least one common name, call or literal.
///
/// Bodies that agree only in shape (`return self.name` against
/// `return self.age`) do not. Identical bodies always do.
pub fn shares_vocabulary(a: &BodyProfile, b: &BodyProfile) -> bool {
    a.fingerprint == b.fingerprint || a.vocabulary.overlap(&b.vocabulary) > 0
}

/// Combined body similarity in `0.0..=1.0`.
///
/// Identical fingerprints score 1.0. Otherwise three quarters of the score
/// come from the token bags and one quarter from the statement-kind order.
pub fn body_similarity(a: &BodyProfile, b: &BodyProfile) -> f64 {
    if a.fingerprint == b.fingerprint {
        return 1.0;
    }
    0.75 * a.bag.dice(&b.bag) + 0.25 * lcs_ratio(&a.kinds, &b.kinds)
}

// ============================================================================
// Token Bag
// ============================================================================

/// Multiset of tokens with deterministic iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBag {
    counts: BTreeMap<String, u32>,
    total: u32,
}

impl TokenBag {
    pub fn from_tokens<I: IntoIterator<Item = String>>(tokens: I) -> Self {
        let mut bag = TokenBag::default();
        for token in tokens {
            bag.add(token, 1);
        }
        bag
    }

    pub fn add(&mut self, token: String, count: u32) {
        if count == 0 {
            return;
        }
        *self.counts.entry(token).or_insert(0) += count;
        self.total += count;
    }

    /// Add every token of `other`.
    pub fn merge(&mut self, other: &TokenBag) {
        for (token, count) in &other.counts {
            self.add(token.clone(), *count);
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count(&self, token: &str) -> u32 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    /// Size of the multiset intersection.
    pub fn overlap(&self, other: &TokenBag) -> u32 {
        self.counts
            .iter()
            .map(|(token, count)| (*count).min(other.count(token)))
            .sum()
    }

    /// Multiset Dice coefficient. Two empty bags are identical.
    pub fn dice(&self, other: &TokenBag) -> f64 {
        let total = self.total + other.total;
        if total == 0 {
            return 1.0;
        }
        2.0 * f64::from(self.overlap(other)) / f64::from(total)
    }

    /// Fraction of `self` found in `other`. An empty bag is not contained.
    pub fn containment_in(&self, other: &TokenBag) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.overlap(other)) / f64::from(self.total)
    }

    /// Multiset difference `self - other`.
    pub fn difference(&self, other: &TokenBag) -> TokenBag {
        let mut result = TokenBag::default();
        for (token, count) in &self.counts {
            let remaining = count.saturating_sub(other.count(token));
            result.add(token.clone(), remaining);
        }
        result
    }
}

// ============================================================================
// Type Profile
// ============================================================================

/// Comparison data for a type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeProfile {
    /// Union of all operation bags plus member, field and base tokens.
    pub bag: TokenBag,
    /// Operation signatures and field names.
    pub members: BTreeSet<String>,
}

impl TypeProfile {
    /// Build a type profile from already computed operation profiles.
    pub fn new(ty: &TypeDecl, operations: &[BodyProfile]) -> Self {
        let mut bag = TokenBag::default();
        let mut members = BTreeSet::new();
        for (op, profile) in ty.operations.iter().zip(operations) {
            bag.merge(&profile.bag);
            bag.add(format!("member:{}", op.name), 1);
            members.insert(op.signature());
        }
        for field in &ty.fields {
            bag.add(format!("field:{}", field.name), 1);
            members.insert(format!("field {}", field.name));
        }
        for base in &ty.superclasses {
            bag.add(format!("base:{base}"), 1);
        }
        TypeProfile { bag, members }
    }

    /// Structural similarity of two types.
    pub fn similarity(&self, other: &TypeProfile) -> f64 {
        self.bag.dice(&other.bag)
    }

    /// Overlap of member signatures.
    pub fn member_similarity(&self, other: &TypeProfile) -> f64 {
        jaccard(&self.members, &other.members)
    }
}

// ============================================================================
// Scalar Metrics
// ============================================================================

/// Jaccard index of two sets. Two empty sets are identical.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Length of the longest common subsequence relative to the longer input.
pub fn lcs_ratio<T: PartialEq>(a: &[T], b: &[T]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()] as f64 / longest as f64
}

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Similarity of two parameter lists by name. Two empty lists are identical.
pub fn parameter_similarity(a: &Operation, b: &Operation) -> f64 {
    if a.signature() == b.signature() && a.param_names() == b.param_names() {
        return 1.0;
    }
    let a_names: BTreeSet<&str> = a.param_names().into_iter().collect();
    let b_names: BTreeSet<&str> = b.param_names().into_iter().collect();
    jaccard(&a_names, &b_names)
}

// ============================================================================
// Tests
// ============================================================================
