use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::{Equivalent, IndexMap, IndexSet};
use smallvec::{smallvec, SmallVec};

use crate::model::{Atom, Rule, Term};

/// Edge label of the trie: a concrete constant, or the wildcard recorded for
/// a position that held a variable when the pattern was inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Key {
    Wildcard,
    Constant(String),
}

/// Borrowed form of [`Key`] used for lookups without allocating.
#[derive(Debug, Clone, Copy)]
enum KeyRef<'a> {
    Wildcard,
    Constant(&'a str),
}

impl Key {
    fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }
}

impl From<&Term> for Key {
    fn from(term: &Term) -> Self {
        match term {
            Term::Variable(_) => Self::Wildcard,
            Term::Symbol(value) => Self::Constant(value.clone()),
        }
    }
}

impl<'a> From<&'a Term> for KeyRef<'a> {
    fn from(term: &'a Term) -> Self {
        match term {
            Term::Variable(_) => Self::Wildcard,
            Term::Symbol(value) => Self::Constant(value),
        }
    }
}

// Key and KeyRef must hash identically for `Equivalent` lookups.
impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Wildcard => KeyRef::Wildcard.hash(state),
            Self::Constant(value) => KeyRef::Constant(value).hash(state),
        }
    }
}

impl Hash for KeyRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Wildcard => state.write_u8(0),
            Self::Constant(value) => {
                state.write_u8(1);
                value.hash(state);
            }
        }
    }
}

impl Equivalent<Key> for KeyRef<'_> {
    fn equivalent(&self, key: &Key) -> bool {
        match (self, key) {
            (Self::Wildcard, Key::Wildcard) => true,
            (Self::Constant(value), Key::Constant(stored)) => *value == stored,
            _ => false,
        }
    }
}

/// One level of the trie.
///
/// A pattern of arity `n` descends through `n` branch levels and ends in a
/// leaf holding the stored values.
#[derive(Debug, Clone)]
enum Node<V> {
    Branch(IndexMap<Key, Node<V>>),
    Leaf(Vec<V>),
}

impl<V> Node<V> {
    fn empty(remaining: usize) -> Self {
        if remaining == 0 {
            Self::Leaf(Vec::new())
        } else {
            Self::Branch(IndexMap::new())
        }
    }

    fn collect_into<'a>(&'a self, out: &mut IndexSet<&'a V>)
    where
        V: Eq + Hash,
    {
        match self {
            Self::Leaf(values) => out.extend(values),
            Self::Branch(children) => {
                for child in children.values() {
                    child.collect_into(out);
                }
            }
        }
    }
}

/// Trie from atom patterns to values.
///
/// The first level is the predicate name and arity, then one level per
/// argument position keyed by the constant at that position or by a wildcard
/// where the pattern had a variable. The leaf keeps values in insertion order
/// and does not deduplicate them; that is up to the caller.
#[derive(Debug, Clone)]
pub struct PatternIndex<V> {
    predicates: IndexMap<String, IndexMap<usize, Node<V>>>,
}

impl<V> Default for PatternIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PatternIndex<V> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            predicates: IndexMap::new(),
        }
    }

    fn root(&self, atom: &Atom) -> Option<&Node<V>> {
        self.predicates
            .get(atom.predicate.as_str())
            .and_then(|by_arity| by_arity.get(&atom.arity()))
    }

    /// Stores `value` under the pattern of `atom`.
    pub fn add(&mut self, atom: &Atom, value: V) {
        let arity = atom.arity();
        let mut node = self
            .predicates
            .entry(atom.predicate.clone())
            .or_default()
            .entry(arity)
            .or_insert_with(|| Node::empty(arity));

        for (depth, term) in atom.terms.iter().enumerate() {
            node = match node {
                Node::Branch(children) => children
                    .entry(Key::from(term))
                    .or_insert_with(|| Node::empty(arity - depth - 1)),
                // Roots are split by arity, so a leaf is only ever met past the last argument.
                Node::Leaf(_) => return,
            };
        }

        if let Node::Leaf(values) = node {
            values.push(value);
        }
    }

    /// Values stored under exactly the pattern of `atom`, variables standing
    /// for the wildcard key.
    #[must_use]
    pub fn get_values(&self, atom: &Atom) -> &[V] {
        let Some(mut node) = self.root(atom) else {
            return &[];
        };

        for term in &atom.terms {
            let Node::Branch(children) = node else {
                return &[];
            };
            let Some(child) = children.get(&KeyRef::from(term)) else {
                return &[];
            };
            node = child;
        }

        match node {
            Node::Leaf(values) => values,
            Node::Branch(_) => &[],
        }
    }

    /// Values whose pattern generalizes `atom`.
    ///
    /// At every position the wildcard branch is followed; when the query has
    /// a constant there, the branch keyed by that constant is followed too.
    #[must_use]
    pub fn get_more_general_matches(&self, atom: &Atom) -> Vec<&V> {
        let mut matches = Vec::new();
        let Some(root) = self.root(atom) else {
            return matches;
        };

        let mut pending: SmallVec<[(&Node<V>, usize); 8]> = smallvec![(root, 0)];
        while let Some((node, depth)) = pending.pop() {
            match node {
                Node::Leaf(values) => matches.extend(values),
                Node::Branch(children) => {
                    let Some(term) = atom.terms.get(depth) else {
                        continue;
                    };
                    if let Term::Symbol(value) = term {
                        if let Some(child) = children.get(&KeyRef::Constant(value)) {
                            pending.push((child, depth + 1));
                        }
                    }
                    if let Some(child) = children.get(&KeyRef::Wildcard) {
                        pending.push((child, depth + 1));
                    }
                }
            }
        }

        matches
    }

    /// Values stored under fully concrete keys that specialize `atom`.
    ///
    /// A constant in the query follows only the branch with that constant; a
    /// variable follows every constant branch. Wildcard branches are never
    /// entered, so patterns stored with variables are never returned.
    #[must_use]
    pub fn get_more_specific_matches(&self, atom: &Atom) -> Vec<&V> {
        let mut matches = Vec::new();
        let Some(root) = self.root(atom) else {
            return matches;
        };

        let mut pending: SmallVec<[(&Node<V>, usize); 8]> = smallvec![(root, 0)];
        while let Some((node, depth)) = pending.pop() {
            match node {
                Node::Leaf(values) => matches.extend(values),
                Node::Branch(children) => match atom.terms.get(depth) {
                    Some(Term::Symbol(value)) => {
                        if let Some(child) = children.get(&KeyRef::Constant(value)) {
                            pending.push((child, depth + 1));
                        }
                    }
                    Some(Term::Variable(_)) => pending.extend(
                        children
                            .iter()
                            .filter(|(key, _)| !key.is_wildcard())
                            .map(|(_, child)| (child, depth + 1)),
                    ),
                    None => {}
                },
            }
        }

        matches
    }

    /// Every stored value, deduplicated, in traversal order.
    #[must_use]
    pub fn get_all_values(&self) -> Vec<&V>
    where
        V: Eq + Hash,
    {
        let mut values = IndexSet::new();
        for node in self.predicates.values().flat_map(IndexMap::values) {
            node.collect_into(&mut values);
        }
        values.into_iter().collect()
    }
}

/// Index of rule body atoms.
///
/// Each body atom of a rule is stored as a pattern, tagged with its position
/// so a matching fact can resolve exactly that atom away.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    index: PatternIndex<(usize, Arc<Rule>)>,
}

impl RuleIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every body atom of `rule`.
    pub fn add_rule(&mut self, rule: Rule) {
        let rule = Arc::new(rule);
        for (idx, atom) in rule.body.iter().enumerate() {
            self.index.add(atom, (idx, Arc::clone(&rule)));
        }
    }

    /// Rules obtained by resolving a body atom of an indexed rule against
    /// the ground `fact`.
    ///
    /// Candidates whose repeated variables bind inconsistently are skipped.
    #[must_use]
    pub fn get_resolutions(&self, fact: &Atom) -> Vec<Rule> {
        self.index
            .get_more_general_matches(fact)
            .into_iter()
            .filter_map(|(idx, rule)| {
                let mapping = rule.body.get(*idx)?.unify_with_ground(fact)?;
                Some(rule.resolve(*idx, &mapping))
            })
            .collect()
    }
}

/// Index of ground facts, each stored under itself.
#[derive(Debug, Clone, Default)]
pub struct FactIndex {
    index: PatternIndex<Atom>,
}

impl FactIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a ground fact.
    pub fn add_fact(&mut self, fact: Atom) {
        self.index.add(&fact, fact.clone());
    }

    /// Rules obtained by resolving any body atom of `rule` against a stored
    /// fact.
    #[must_use]
    pub fn get_resolutions(&self, rule: &Rule) -> Vec<Rule> {
        rule.body
            .iter()
            .enumerate()
            .flat_map(|(idx, pattern)| {
                self.index
                    .get_more_specific_matches(pattern)
                    .into_iter()
                    .filter_map(move |fact| {
                        pattern
                            .unify_with_ground(fact)
                            .map(|mapping| rule.resolve(idx, &mapping))
                    })
            })
            .collect()
    }

    /// All stored facts.
    #[must_use]
    pub fn get_all_facts(&self) -> Vec<Atom> {
        self.index.get_all_values().into_iter().cloned().collect()
    }

    /// Answers a pattern query.
    ///
    /// Every stored fact that unifies with `query` is returned as `query`
    /// with the bindings applied, without duplicates.
    #[must_use]
    pub fn get_matching_facts(&self, query: &Atom) -> Vec<Atom> {
        let answers: IndexSet<Atom> = self
            .index
            .get_more_specific_matches(query)
            .into_iter()
            .filter_map(|fact| query.unify_with_ground(fact))
            .map(|mapping| query.resolve(&mapping))
            .collect();

        answers.into_iter().collect()
    }
}
