use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One argument of a relational predicate.
///
/// A single tagged variant covers every argument kind the learner handles;
/// all consumers match exhaustively. Variables carry their leading `?` in
/// the stored name so they round-trip through the textual protocol without
/// re-prefixing.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Term {
    /// A bound constant, e.g. `a` in `(on a b)`.
    Constant(String),
    /// A free variable, e.g. `?X0`.
    Variable(String),
    /// A numeric value.
    Number(f64),
    /// A numeric range guard `min<=max`, inclusive at both ends.
    Range { min: f64, max: f64 },
}

impl Term {
    pub fn constant(name: impl Into<String>) -> Self {
        Term::Constant(name.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        let name = name.into();
        debug_assert!(name.starts_with('?'), "variable names carry the `?` prefix");
        Term::Variable(name)
    }

    /// Canonical variable for argument position `index` (`?X0`, `?X1`, ...).
    pub fn canonical_variable(index: usize) -> Self {
        Term::Variable(format!("?X{index}"))
    }

    pub fn range(min: f64, max: f64) -> Self {
        Term::Range { min, max }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Term::Number(_) | Term::Range { .. })
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&str> {
        match self {
            Term::Constant(name) => Some(name),
            _ => None,
        }
    }

    /// True when `value` falls inside this term's numeric extent.
    ///
    /// A plain number covers exactly itself; a range covers its closed
    /// interval; symbolic terms cover nothing.
    pub fn covers_number(&self, value: f64) -> bool {
        match self {
            Term::Number(n) => (n - value).abs() <= f64::EPSILON,
            Term::Range { min, max } => *min <= value && value <= *max,
            Term::Constant(_) | Term::Variable(_) => false,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Term::Constant(_) => 0,
            Term::Variable(_) => 1,
            Term::Number(_) => 2,
            Term::Range { .. } => 3,
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Term {}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Term::Constant(a), Term::Constant(b)) => a.cmp(b),
            (Term::Variable(a), Term::Variable(b)) => a.cmp(b),
            (Term::Number(a), Term::Number(b)) => a.total_cmp(b),
            (
                Term::Range { min: a_min, max: a_max },
                Term::Range { min: b_min, max: b_max },
            ) => a_min.total_cmp(b_min).then(a_max.total_cmp(b_max)),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant_rank().hash(state);
        match self {
            Term::Constant(name) | Term::Variable(name) => name.hash(state),
            Term::Number(n) => n.to_bits().hash(state),
            Term::Range { min, max } => {
                min.to_bits().hash(state);
                max.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(name) | Term::Variable(name) => f.write_str(name),
            Term::Number(n) => write!(f, "{n}"),
            Term::Range { min, max } => write!(f, "{min}<={max}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_groups_variants() {
        let mut terms = vec![
            Term::range(0.0, 1.0),
            Term::variable("?X0"),
            Term::Number(3.5),
            Term::constant("a"),
        ];
        terms.sort();
        assert_eq!(terms[0], Term::constant("a"));
        assert_eq!(terms[1], Term::variable("?X0"));
        assert_eq!(terms[2], Term::Number(3.5));
        assert_eq!(terms[3], Term::range(0.0, 1.0));
    }

    #[test]
    fn range_coverage_is_inclusive() {
        let r = Term::range(-1.0, 2.0);
        assert!(r.covers_number(-1.0));
        assert!(r.covers_number(2.0));
        assert!(r.covers_number(0.0));
        assert!(!r.covers_number(2.5));
    }

    #[test]
    fn display_round_trips_through_format() {
        assert_eq!(Term::constant("blk").to_string(), "blk");
        assert_eq!(Term::variable("?X1").to_string(), "?X1");
        assert_eq!(Term::Number(2.5).to_string(), "2.5");
        assert_eq!(Term::range(0.0, 3.2).to_string(), "0<=3.2");
    }
}
