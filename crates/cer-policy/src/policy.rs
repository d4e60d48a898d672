use std::fmt;

use cer_core::RelationalRule;

use crate::arena::{RuleId, SlotId};

/// One rule inside a sampled policy, with the slot and arena ids it was
/// drawn from so elite counting can credit the right distributions.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub slot: SlotId,
    pub id: RuleId,
    pub rule: RelationalRule,
    /// Appended maximally-general fallback rather than a sampled draw.
    /// Appended rules keep covering from re-triggering when an LGG rule
    /// simply was not sampled; they do not count toward elite tallies.
    pub appended: bool,
}

#[derive(Debug, Clone)]
pub enum PolicyItem {
    Rule(PolicyRule),
    /// A nested sub-policy, for modular goal composition.
    Module(Policy),
}

/// An ordered list of rules (and sub-policies) tried first-match-first
/// by the evaluator. Policies are cheap, regenerated per evaluation, and
/// never outlive the generator state they were sampled from.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    items: Vec<PolicyItem>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rule(&mut self, rule: PolicyRule) {
        self.items.push(PolicyItem::Rule(rule));
    }

    pub fn push_module(&mut self, module: Policy) {
        self.items.push(PolicyItem::Module(module));
    }

    pub fn items(&self) -> &[PolicyItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every rule in the policy, depth-first through modules.
    pub fn rules(&self) -> Vec<&PolicyRule> {
        let mut out = Vec::new();
        collect(&self.items, &mut out);
        out
    }

    /// The rules that came from distribution draws, in order. These are
    /// what elite counting tallies.
    pub fn sampled_rules(&self) -> Vec<&PolicyRule> {
        self.rules().into_iter().filter(|r| !r.appended).collect()
    }

    pub fn contains_rule(&self, rule: &RelationalRule) -> bool {
        self.rules().iter().any(|r| r.rule.same_rule(rule))
    }

    pub fn covers_action(&self, action: &str) -> bool {
        self.rules().iter().any(|r| r.rule.action().name() == action)
    }
}

fn collect<'a>(items: &'a [PolicyItem], out: &mut Vec<&'a PolicyRule>) {
    for item in items {
        match item {
            PolicyItem::Rule(rule) => out.push(rule),
            PolicyItem::Module(module) => collect(&module.items, out),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, rule) in self.rules().iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", rule.rule)?;
        }
        Ok(())
    }
}
