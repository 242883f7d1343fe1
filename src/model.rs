use std::fmt;

use indexmap::{IndexMap, IndexSet};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Variable bindings produced by unification.
///
/// Keys are variable names (with their `?` marker), values are the constants
/// they are bound to. A substitution never maps a variable to another variable.
pub type Substitution = IndexMap<String, String>;

/// A term: either a variable or a constant symbol
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Term {
    /// A variable that can be unified with symbols (e.g., `?x`, `?y`)
    Variable(String),
    /// A concrete symbol/constant (e.g., `alice`, `bob`)
    Symbol(String),
}

impl Term {
    /// Creates a variable term. The name is kept verbatim, marker included.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Creates a constant term.
    pub fn symbol(value: impl Into<String>) -> Self {
        Self::Symbol(value.into())
    }

    /// Returns `true` for [`Term::Variable`].
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// The textual form of the term.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Variable(name) | Self::Symbol(name) => name,
        }
    }

    /// Replaces a bound variable by its constant; everything else is copied.
    #[must_use]
    pub fn resolve(&self, mapping: &Substitution) -> Term {
        match self {
            Self::Variable(name) => mapping
                .get(name)
                .map_or_else(|| self.clone(), |value| Self::Symbol(value.clone())),
            Self::Symbol(_) => self.clone(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate applied to arguments (e.g., `edge(?x, b)`)
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Atom {
    /// The name of the predicate (e.g., `"edge"`, `"path"`)
    pub predicate: String,
    /// The arguments/terms of the predicate, in positional order
    pub terms: Vec<Term>,
}

impl Atom {
    /// Creates an atom.
    pub fn new(predicate: impl Into<String>, terms: Vec<Term>) -> Self {
        Self {
            predicate: predicate.into(),
            terms,
        }
    }

    /// Number of arguments.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Returns `true` if no argument is a variable.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        !self.terms.iter().any(Term::is_variable)
    }

    /// Variable names in order of first occurrence.
    #[must_use]
    pub fn variables(&self) -> IndexSet<&str> {
        self.terms
            .iter()
            .filter_map(|term| match term {
                Term::Variable(var) => Some(var.as_str()),
                Term::Symbol(_) => None,
            })
            .collect()
    }

    /// Unifies this pattern with a ground atom.
    ///
    /// This is the fast path used by the indices. The caller guarantees that
    /// `other` is ground and has the same predicate and arity; those
    /// preconditions are only checked in debug builds.
    ///
    /// Returns `None` if some variable would need two different values or a
    /// constant differs from the ground argument at its position. An empty
    /// substitution is a successful match that bound nothing.
    #[must_use]
    pub fn unify_with_ground(&self, other: &Atom) -> Option<Substitution> {
        debug_assert_eq!(self.predicate, other.predicate);
        debug_assert_eq!(self.arity(), other.arity());
        debug_assert!(other.is_ground(), "`{other}` is not ground");

        let mut mapping = Substitution::new();

        self.terms
            .iter()
            .zip(&other.terms)
            .try_for_each(|(pattern, value)| {
                let value = value.as_str();
                match pattern {
                    Term::Symbol(sym) => (sym == value).then_some(()).ok_or(()),
                    Term::Variable(var) => {
                        if let Some(bound) = mapping.get(var) {
                            (bound == value).then_some(()).ok_or(())
                        } else {
                            mapping.insert(var.clone(), value.to_string());
                            Ok(())
                        }
                    }
                }
            })
            .ok()?;

        Some(mapping)
    }

    /// Checked variant of [`Atom::unify_with_ground`] for callers that cannot
    /// guarantee its preconditions.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first reason the atoms do not unify:
    /// different predicates or arities, a non-ground `other`, a conflicting
    /// variable binding, or mismatching constants.
    pub fn try_unify_with_ground(&self, other: &Atom) -> Result<Substitution> {
        if self.predicate != other.predicate {
            return Err(Error::PredicateMismatch {
                expected: self.predicate.clone(),
                found: other.predicate.clone(),
            });
        }
        if self.arity() != other.arity() {
            return Err(Error::ArityMismatch {
                expected: self.arity(),
                found: other.arity(),
            });
        }
        if !other.is_ground() {
            return Err(Error::NotGround {
                atom: other.to_string(),
            });
        }

        let mut mapping = Substitution::new();
        for (position, (pattern, value)) in self.terms.iter().zip(&other.terms).enumerate() {
            let value = value.as_str();
            match pattern {
                Term::Symbol(sym) if sym != value => {
                    return Err(Error::ConstantMismatch {
                        position,
                        expected: sym.clone(),
                        found: value.to_string(),
                    });
                }
                Term::Symbol(_) => {}
                Term::Variable(var) => match mapping.get(var) {
                    Some(bound) if bound != value => {
                        return Err(Error::ConflictingBinding {
                            variable: var.clone(),
                            bound: bound.clone(),
                            found: value.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        mapping.insert(var.clone(), value.to_string());
                    }
                },
            }
        }

        Ok(mapping)
    }

    /// Applies `mapping` to every argument, producing a new atom.
    #[must_use]
    pub fn resolve(&self, mapping: &Substitution) -> Atom {
        Atom {
            predicate: self.predicate.clone(),
            terms: self.terms.iter().map(|term| term.resolve(mapping)).collect(),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{term}")?;
        }
        f.write_str(")")
    }
}

/// A Horn rule (e.g., `path(?x, ?y) :- edge(?x, ?y).`)
///
/// A rule with an empty body is a fact: its head holds unconditionally.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule {
    /// The conclusion/consequent of the rule
    pub head: Atom,
    /// The conditions/antecedents that must be satisfied
    pub body: Vec<Atom>,
}

impl Rule {
    /// Creates a rule.
    #[must_use]
    pub fn new(head: Atom, body: Vec<Atom>) -> Self {
        Self { head, body }
    }

    /// Creates a rule with an empty body.
    #[must_use]
    pub fn fact(head: Atom) -> Self {
        Self::new(head, Vec::new())
    }

    /// Returns `true` when the body is empty.
    #[must_use]
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// Returns `true` if every head variable occurs in some body atom.
    ///
    /// Only range-restricted programs are guaranteed to reach a fixpoint.
    #[must_use]
    pub fn is_range_restricted(&self) -> bool {
        let body_vars: IndexSet<&str> = self
            .body
            .iter()
            .flat_map(|atom| atom.variables())
            .collect();

        self.head
            .variables()
            .iter()
            .all(|var| body_vars.contains(var))
    }

    /// Resolves away the body atom at `idx`.
    ///
    /// The new rule has `mapping` applied to its head and to every remaining
    /// body atom, in their original order.
    #[must_use]
    pub fn resolve(&self, idx: usize, mapping: &Substitution) -> Rule {
        Rule {
            head: self.head.resolve(mapping),
            body: self
                .body
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, atom)| atom.resolve(mapping))
                .collect(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        for (i, atom) in self.body.iter().enumerate() {
            f.write_str(if i == 0 { " :- " } else { ", " })?;
            write!(f, "{atom}")?;
        }
        f.write_str(".")
    }
}

/// A program: rules plus standalone facts, used as the initial load payload
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Program {
    /// Rules with a non-empty body
    pub rules: Vec<Rule>,
    /// Facts supplied directly
    pub facts: Vec<Atom>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule. Empty-body rules are stored as facts.
    pub fn add_rule(&mut self, rule: Rule) {
        if rule.is_fact() {
            self.facts.push(rule.head);
        } else {
            self.rules.push(rule);
        }
    }

    /// Adds a fact.
    pub fn add_fact(&mut self, fact: Atom) {
        self.facts.push(fact);
    }

    /// Appends the rules and facts of `other`.
    pub fn merge(&mut self, other: &Program) {
        self.rules.extend(other.rules.iter().cloned());
        self.facts.extend(other.facts.iter().cloned());
    }

    /// Returns `true` if the program has neither rules nor facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.facts.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .rules
            .iter()
            .map(ToString::to_string)
            .chain(self.facts.iter().map(|fact| format!("{fact}.")));
        for (i, line) in lines.enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(&line)?;
        }
        Ok(())
    }
}
