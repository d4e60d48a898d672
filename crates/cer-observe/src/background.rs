use std::collections::BTreeMap;
use std::fmt;

use cer_core::RelationalPredicate;

use crate::unify::unify_conjunction;

/// One piece of inferred background knowledge: `pre => post` (implication)
/// or `pre <=> post` (equivalence), stated over canonical variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundRule {
    pre: Vec<RelationalPredicate>,
    post: RelationalPredicate,
    equivalence: bool,
}

impl BackgroundRule {
    pub fn implication(mut pre: Vec<RelationalPredicate>, post: RelationalPredicate) -> Self {
        pre.sort();
        pre.dedup();
        Self {
            pre,
            post,
            equivalence: false,
        }
    }

    pub fn equivalence(mut pre: Vec<RelationalPredicate>, post: RelationalPredicate) -> Self {
        pre.sort();
        pre.dedup();
        Self {
            pre,
            post,
            equivalence: true,
        }
    }

    pub fn pre(&self) -> &[RelationalPredicate] {
        &self.pre
    }

    pub fn post(&self) -> &RelationalPredicate {
        &self.post
    }

    pub fn is_equivalence(&self) -> bool {
        self.equivalence
    }

    /// Key identifying the right-hand side, used by the redundancy filter.
    pub fn post_key(&self) -> String {
        self.post.to_string()
    }

    /// True when this rule's precondition is at least as general as
    /// `other`'s: every conjunct of `self.pre` matches into `other.pre`.
    /// A more general rule implies the same RHS from less.
    pub fn subsumes(&self, other: &Self) -> bool {
        self.post == other.post
            && self.pre.len() <= other.pre.len()
            && !unify_conjunction(&self.pre, &other.pre).is_empty()
    }
}

impl fmt::Display for BackgroundRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cond in &self.pre {
            write!(f, "{cond} ")?;
        }
        write!(f, "{} {}", if self.equivalence { "<=>" } else { "=>" }, self.post)
    }
}

/// Background-knowledge store with the non-redundancy filter.
///
/// Rules are grouped by right-hand side. An equivalence on some RHS beats
/// every inference rule on that RHS: inserting the equivalence removes the
/// inference rules, and later inference rules on that RHS are rejected.
/// Within a kind, a rule subsumed by a strictly more general one is never
/// kept.
#[derive(Debug, Clone, Default)]
pub struct NonRedundantBackgroundKnowledge {
    by_post: BTreeMap<String, Vec<BackgroundRule>>,
}

impl NonRedundantBackgroundKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_post.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_post.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &BackgroundRule> {
        self.by_post.values().flatten()
    }

    pub fn rules_for_post(&self, post: &RelationalPredicate) -> &[BackgroundRule] {
        self.by_post
            .get(&post.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Insert a rule, enforcing non-redundancy. Returns whether the rule
    /// was kept.
    pub fn insert(&mut self, rule: BackgroundRule) -> bool {
        let bucket = self.by_post.entry(rule.post_key()).or_default();

        if !rule.is_equivalence() && bucket.iter().any(|r| r.is_equivalence()) {
            // An equivalence with this RHS already exists; the inference
            // rule adds nothing.
            return false;
        }

        if bucket.iter().any(|r| r == &rule || r.subsumes(&rule)) {
            return false;
        }

        if rule.is_equivalence() {
            // A new equivalence supersedes the inference rules on its RHS.
            bucket.retain(|r| r.is_equivalence());
        }
        // Drop stored rules the newcomer subsumes.
        bucket.retain(|r| !rule.subsumes(r));

        bucket.push(rule);
        true
    }
}
