use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CerError, Result};
use crate::schema::PredicateSignature;
use crate::term::Term;

/// A single relational fact or condition: a predicate name, its ordered
/// arguments, and an optional negation.
///
/// Predicates order by name, then argument-wise, then by negation, so they
/// can live in `BTreeSet`s and compare deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelationalPredicate {
    name: String,
    args: Vec<Term>,
    negated: bool,
}

impl RelationalPredicate {
    pub fn new(name: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            args,
            negated: false,
        }
    }

    pub fn negated(name: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            args,
            negated: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Term] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// The same predicate with the negation flipped.
    pub fn negate(&self) -> Self {
        Self {
            name: self.name.clone(),
            args: self.args.clone(),
            negated: !self.negated,
        }
    }

    /// True when this predicate and `other` are the same literal up to
    /// negation (one is exactly the negation of the other).
    pub fn contradicts(&self, other: &Self) -> bool {
        self.negated != other.negated && self.name == other.name && self.args == other.args
    }

    /// All distinct variable names, in first-appearance order.
    pub fn variables(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for arg in &self.args {
            if let Some(v) = arg.as_variable() {
                if !seen.contains(&v) {
                    seen.push(v);
                }
            }
        }
        seen
    }

    /// All distinct constant names, in first-appearance order.
    pub fn constants(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for arg in &self.args {
            if let Some(c) = arg.as_constant() {
                if !seen.contains(&c) {
                    seen.push(c);
                }
            }
        }
        seen
    }

    /// True when any argument equals one of `terms`.
    pub fn shares_term(&self, terms: &[Term]) -> bool {
        self.args.iter().any(|a| terms.contains(a))
    }

    /// Apply a variable substitution. Unmapped variables pass through.
    pub fn substitute(&self, bindings: &BTreeMap<String, Term>) -> Self {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                Term::Variable(name) => bindings.get(name).cloned().unwrap_or_else(|| arg.clone()),
                other => other.clone(),
            })
            .collect();
        Self {
            name: self.name.clone(),
            args,
            negated: self.negated,
        }
    }

    /// Replace each distinct argument with a canonical variable (`?X0`,
    /// `?X1`, ...), returning the canonical predicate and the inverse map
    /// from canonical variable name back to the original term.
    ///
    /// Repeated arguments map to the same canonical variable, preserving
    /// the predicate's internal argument structure.
    pub fn canonicalize(&self) -> (Self, BTreeMap<String, Term>) {
        let mut forward: Vec<(Term, String)> = Vec::new();
        let mut inverse = BTreeMap::new();
        let args = self
            .args
            .iter()
            .map(|arg| {
                if let Some((_, canon)) = forward.iter().find(|(orig, _)| orig == arg) {
                    return Term::Variable(canon.clone());
                }
                let canon = format!("?X{}", forward.len());
                forward.push((arg.clone(), canon.clone()));
                inverse.insert(canon.clone(), arg.clone());
                Term::Variable(canon)
            })
            .collect();
        (
            Self {
                name: self.name.clone(),
                args,
                negated: self.negated,
            },
            inverse,
        )
    }

    /// A signature string describing which argument positions are bound.
    ///
    /// Used as the key of the negated belief table: `(on a ?X)` and
    /// `(on b ?Y)` share the structure `on/b,f`.
    pub fn argument_structure(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 2 * self.args.len() + 1);
        out.push_str(&self.name);
        out.push('/');
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push(match arg {
                Term::Variable(_) => 'f',
                Term::Constant(_) => 'b',
                Term::Number(_) | Term::Range { .. } => 'n',
            });
        }
        out
    }

    /// Check arity and per-position types against the schema declaration
    /// for this predicate name. A position declared `number` takes numeric
    /// terms (numbers and ranges), any other type takes constants, and a
    /// variable matches either.
    pub fn check_signature(&self, signature: &PredicateSignature) -> Result<()> {
        if signature.name != self.name {
            return Err(CerError::SchemaMismatch {
                predicate: self.to_string(),
                message: format!("declared as `{}`", signature.name),
            });
        }
        if signature.arg_types.len() != self.args.len() {
            return Err(CerError::SchemaMismatch {
                predicate: self.to_string(),
                message: format!(
                    "expected {} arguments, found {}",
                    signature.arg_types.len(),
                    self.args.len()
                ),
            });
        }
        for (position, (arg, declared)) in
            self.args.iter().zip(&signature.arg_types).enumerate()
        {
            if matches!(arg, Term::Variable(_)) {
                continue;
            }
            let numeric_term = matches!(arg, Term::Number(_) | Term::Range { .. });
            if numeric_term != (declared == "number") {
                return Err(CerError::SchemaMismatch {
                    predicate: self.to_string(),
                    message: format!("argument {position} must be of type `{declared}`"),
                });
            }
        }
        Ok(())
    }
}

impl Ord for RelationalPredicate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.args.cmp(&other.args))
            .then_with(|| self.negated.cmp(&other.negated))
    }
}

impl PartialOrd for RelationalPredicate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RelationalPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("(not ")?;
        }
        write!(f, "({}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        f.write_str(")")?;
        if self.negated {
            f.write_str(")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_ab() -> RelationalPredicate {
        RelationalPredicate::new("on", vec![Term::constant("a"), Term::constant("b")])
    }

    #[test]
    fn displays_as_parenthesized_tuple() {
        assert_eq!(on_ab().to_string(), "(on a b)");
        assert_eq!(on_ab().negate().to_string(), "(not (on a b))");
    }

    #[test]
    fn canonicalize_maps_repeated_terms_once() {
        let p = RelationalPredicate::new(
            "between",
            vec![Term::constant("a"), Term::constant("b"), Term::constant("a")],
        );
        let (canon, inverse) = p.canonicalize();
        assert_eq!(canon.to_string(), "(between ?X0 ?X1 ?X0)");
        assert_eq!(inverse.len(), 2);
        assert_eq!(inverse["?X0"], Term::constant("a"));
    }

    #[test]
    fn contradiction_requires_matching_literal() {
        let p = on_ab();
        assert!(p.contradicts(&p.negate()));
        assert!(!p.contradicts(&p));
        let q = RelationalPredicate::negated("on", vec![Term::constant("b"), Term::constant("a")]);
        assert!(!p.contradicts(&q));
    }

    #[test]
    fn argument_structure_distinguishes_bound_and_free() {
        let p = RelationalPredicate::new("on", vec![Term::constant("a"), Term::variable("?X0")]);
        assert_eq!(p.argument_structure(), "on/b,f");
    }

    #[test]
    fn signature_check_enforces_arity_and_position_types() {
        let sig = PredicateSignature::new("height", vec!["object".into(), "number".into()]);

        let good =
            RelationalPredicate::new("height", vec![Term::constant("a"), Term::Number(2.0)]);
        assert!(good.check_signature(&sig).is_ok());

        // Variables match any declared type.
        let open =
            RelationalPredicate::new("height", vec![Term::variable("?X"), Term::variable("?H")]);
        assert!(open.check_signature(&sig).is_ok());

        let short = RelationalPredicate::new("height", vec![Term::constant("a")]);
        assert!(short.check_signature(&sig).is_err());

        let swapped =
            RelationalPredicate::new("height", vec![Term::Number(2.0), Term::constant("a")]);
        assert!(swapped.check_signature(&sig).is_err());

        let renamed = RelationalPredicate::new("on", vec![Term::constant("a"), Term::Number(2.0)]);
        assert!(renamed.check_signature(&sig).is_err());
    }

    #[test]
    fn substitution_leaves_unmapped_variables() {
        let p = RelationalPredicate::new("on", vec![Term::variable("?A"), Term::variable("?B")]);
        let mut bindings = BTreeMap::new();
        bindings.insert("?A".to_string(), Term::constant("a"));
        assert_eq!(p.substitute(&bindings).to_string(), "(on a ?B)");
    }
}
