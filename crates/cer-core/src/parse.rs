//! Textual fact/rule protocol.
//!
//! Facts are whitespace-separated parenthesized tuples, `(on a b)`, with
//! negation written `(not (on a b))` and numeric range guards written as
//! `min<=max` bounds inside an argument position. A rule separates its
//! condition conjunction from its action with the infix `=>`:
//!
//! ```text
//! (clear ?X) (clear ?Y) => (move ?X ?Y)
//! ```
//!
//! Parsing and serialization round-trip losslessly with respect to the
//! condition set and the action.

use crate::error::{CerError, Result};
use crate::predicate::RelationalPredicate;
use crate::rule::{RelationalRule, RULE_INFIX};
use crate::term::Term;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Atom(String),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut atom = String::new();
    let flush = |atom: &mut String, tokens: &mut Vec<Token>| {
        if !atom.is_empty() {
            tokens.push(Token::Atom(std::mem::take(atom)));
        }
    };
    for ch in text.chars() {
        match ch {
            '(' => {
                flush(&mut atom, &mut tokens);
                tokens.push(Token::Open);
            }
            ')' => {
                flush(&mut atom, &mut tokens);
                tokens.push(Token::Close);
            }
            c if c.is_whitespace() => flush(&mut atom, &mut tokens),
            c => atom.push(c),
        }
    }
    flush(&mut atom, &mut tokens);
    Ok(tokens)
}

/// Classify one atom into a term.
///
/// `?`-prefixed atoms are variables, `a<=b` atoms are range guards, atoms
/// that parse as `f64` are numbers, everything else is a constant.
fn classify_atom(atom: &str) -> Term {
    if atom.starts_with('?') {
        return Term::Variable(atom.to_string());
    }
    if let Some((lo, hi)) = atom.split_once("<=") {
        if let (Ok(min), Ok(max)) = (lo.parse::<f64>(), hi.parse::<f64>()) {
            return Term::Range { min, max };
        }
    }
    if let Ok(n) = atom.parse::<f64>() {
        return Term::Number(n);
    }
    Term::Constant(atom.to_string())
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self> {
        Ok(Self {
            text,
            tokens: tokenize(text)?,
            position: 0,
        })
    }

    fn err(&self, message: impl Into<String>) -> CerError {
        CerError::parse(self.text, message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect_open(&mut self) -> Result<()> {
        match self.next() {
            Some(Token::Open) => Ok(()),
            other => Err(self.err(format!("expected `(`, found {other:?}"))),
        }
    }

    fn predicate(&mut self) -> Result<RelationalPredicate> {
        self.expect_open()?;
        let name = match self.next() {
            Some(Token::Atom(name)) => name,
            other => return Err(self.err(format!("expected predicate name, found {other:?}"))),
        };

        // `(not (...))` wraps a single nested tuple.
        if name == "not" {
            let inner = self.predicate()?;
            return match self.next() {
                Some(Token::Close) => Ok(inner.negate()),
                other => Err(self.err(format!("expected `)` after negation, found {other:?}"))),
            };
        }

        let mut args = Vec::new();
        loop {
            match self.next() {
                Some(Token::Atom(atom)) => args.push(classify_atom(&atom)),
                Some(Token::Close) => return Ok(RelationalPredicate::new(name, args)),
                Some(Token::Open) => {
                    return Err(self.err("nested tuples are only valid under `not`"))
                }
                None => return Err(self.err("unbalanced `(`")),
            }
        }
    }

    fn at_infix(&self) -> bool {
        matches!(self.peek(), Some(Token::Atom(a)) if a == RULE_INFIX)
    }

    fn at_end(&self) -> bool {
        self.peek().is_none()
    }
}

/// Parse a single fact/condition tuple.
pub fn parse_predicate(text: &str) -> Result<RelationalPredicate> {
    let mut parser = Parser::new(text)?;
    let predicate = parser.predicate()?;
    if !parser.at_end() {
        return Err(parser.err("trailing input after predicate"));
    }
    Ok(predicate)
}

/// Parse a whitespace-separated list of fact tuples (a state scan).
pub fn parse_facts(text: &str) -> Result<Vec<RelationalPredicate>> {
    let mut parser = Parser::new(text)?;
    let mut facts = Vec::new();
    while !parser.at_end() {
        facts.push(parser.predicate()?);
    }
    Ok(facts)
}

/// Parse a full rule: `cond cond ... => (action ...)`.
pub fn parse_rule(text: &str) -> Result<RelationalRule> {
    let mut parser = Parser::new(text)?;
    let mut conditions = Vec::new();
    while !parser.at_infix() {
        if parser.at_end() {
            return Err(parser.err(format!("missing `{RULE_INFIX}` separator")));
        }
        conditions.push(parser.predicate()?);
    }
    parser.next(); // consume the infix
    let action = parser.predicate()?;
    if !parser.at_end() {
        return Err(parser.err("trailing input after action"));
    }
    if action.is_negated() {
        return Err(CerError::IllegalRule(format!(
            "action `{action}` is negated"
        )));
    }
    Ok(RelationalRule::new(conditions, action))
}
