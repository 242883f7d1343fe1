use indexmap::IndexSet;
use log::{debug, trace, warn};

use crate::index::{FactIndex, RuleIndex};
use crate::model::{Atom, Program, Rule};

/// Item waiting in the fixpoint worklist
#[derive(Debug)]
enum Pending {
    Fact(Atom),
    Rule(Rule),
}

/// The forward-chaining evaluation engine
///
/// Facts and rules are propagated as soon as they are pushed: a new fact is
/// resolved against every indexed rule body atom it can satisfy, and a new
/// rule is resolved against every fact already known. Each resolution yields
/// a smaller rule, which is pushed in turn, until rules shrink to facts and
/// nothing new appears.
///
/// Termination is only guaranteed for range-restricted programs, where every
/// head variable also occurs in the body.
#[derive(Debug, Default)]
pub struct Engine {
    program: Program,
    rule_index: RuleIndex,
    fact_index: FactIndex,
    /// Every fact ever registered
    known_facts: IndexSet<Atom>,
    /// Every rule with a non-empty body ever registered
    known_rules: IndexSet<Rule>,
}

impl Engine {
    /// Builds the fixpoint model of `program`
    #[must_use]
    pub fn new(program: Program) -> Self {
        let mut engine = Self::default();
        engine.push_program(&program);
        engine
    }

    /// The program pushed so far, rules and facts as supplied
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Pushes every rule of `program`, then every fact, and records both in
    /// [`Engine::program`].
    pub fn push_program(&mut self, program: &Program) {
        debug!(
            "pushing program with {} rules and {} facts",
            program.rules.len(),
            program.facts.len()
        );
        self.program.merge(program);

        let rules = program.rules.iter().cloned().map(Pending::Rule);
        let facts = program.facts.iter().cloned().map(Pending::Fact);
        self.propagate(rules.chain(facts));
    }

    /// Pushes a rule; an empty-body rule is pushed as a fact
    pub fn push_rule(&mut self, rule: Rule) {
        self.propagate([Pending::Rule(rule)]);
    }

    /// Pushes a ground fact
    pub fn push_fact(&mut self, fact: Atom) {
        self.propagate([Pending::Fact(fact)]);
    }

    /// Pushes rules one after the other
    pub fn push_rules(&mut self, rules: impl IntoIterator<Item = Rule>) {
        self.propagate(rules.into_iter().map(Pending::Rule));
    }

    /// Pushes facts one after the other
    pub fn push_facts(&mut self, facts: impl IntoIterator<Item = Atom>) {
        self.propagate(facts.into_iter().map(Pending::Fact));
    }

    /// All facts known at the fixpoint
    #[must_use]
    pub fn get_facts(&self) -> Vec<Atom> {
        self.fact_index.get_all_facts()
    }

    /// Known facts matching `query`, each written as `query` with its
    /// variables replaced by the matching constants.
    #[must_use]
    pub fn get_matching_facts(&self, query: &Atom) -> Vec<Atom> {
        self.fact_index.get_matching_facts(query)
    }

    /// Returns whether any known fact matches `query`
    #[must_use]
    pub fn ask(&self, query: &Atom) -> bool {
        !self.get_matching_facts(query).is_empty()
    }

    /// Number of known facts
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.known_facts.len()
    }

    /// Number of known rules, partially resolved ones included
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.known_rules.len()
    }

    /// Known facts as a JSON array
    ///
    /// # Errors
    ///
    /// Fails only if serialization itself fails.
    #[cfg(feature = "serde")]
    pub fn facts_to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.get_facts())
    }

    /// Runs the worklist until it is empty.
    ///
    /// The worklist is a stack and derived items are pushed in reverse, so
    /// items are processed depth-first in the order they were produced.
    fn propagate<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = Pending>,
    {
        let mut worklist: Vec<Pending> = items.into_iter().collect();
        for item in &worklist {
            if let Pending::Rule(rule) = item {
                warn_if_unsafe(rule);
            }
        }
        worklist.reverse();

        let mut steps = 0usize;
        while let Some(item) = worklist.pop() {
            steps += 1;
            let derived = match item {
                Pending::Fact(fact) => self.register_fact(fact),
                Pending::Rule(rule) => self.register_rule(rule),
            };
            worklist.extend(derived.into_iter().rev().map(Pending::Rule));
        }

        debug!(
            "fixpoint reached after {steps} steps: {} facts, {} rules",
            self.fact_count(),
            self.rule_count()
        );
    }

    /// Indexes a new fact and returns the rules it resolves.
    fn register_fact(&mut self, fact: Atom) -> Vec<Rule> {
        if self.known_facts.contains(&fact) {
            return Vec::new();
        }
        if !fact.is_ground() {
            warn!("dropping non-ground fact `{fact}`");
            return Vec::new();
        }

        trace!("new fact {fact}");
        self.known_facts.insert(fact.clone());
        let derived = self.rule_index.get_resolutions(&fact);
        self.fact_index.add_fact(fact);
        derived
    }

    /// Indexes a new rule and returns its resolutions against known facts.
    fn register_rule(&mut self, rule: Rule) -> Vec<Rule> {
        if rule.is_fact() {
            return self.register_fact(rule.head);
        }
        if self.known_rules.contains(&rule) {
            return Vec::new();
        }

        trace!("new rule {rule}");
        self.known_rules.insert(rule.clone());
        // Indexing only catches facts that arrive later; existing ones are resolved now.
        let derived = self.fact_index.get_resolutions(&rule);
        self.rule_index.add_rule(rule);
        derived
    }
}

fn warn_if_unsafe(rule: &Rule) {
    if !rule.is_range_restricted() {
        warn!("rule `{rule}` is not range-restricted, evaluation may not terminate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Term;

    fn sym(value: &str) -> Term {
        Term::symbol(value)
    }

    fn var(name: &str) -> Term {
        Term::variable(name)
    }

    fn edge(from: &str, to: &str) -> Atom {
        Atom::new("edge", vec![sym(from), sym(to)])
    }

    fn path(from: &str, to: &str) -> Atom {
        Atom::new("path", vec![sym(from), sym(to)])
    }

    /// `path(?x, ?y) :- edge(?x, ?y).` and `path(?x, ?z) :- edge(?x, ?y), path(?y, ?z).`
    fn path_rules() -> Vec<Rule> {
        vec![
            Rule::new(
                Atom::new("path", vec![var("?x"), var("?y")]),
                vec![Atom::new("edge", vec![var("?x"), var("?y")])],
            ),
            Rule::new(
                Atom::new("path", vec![var("?x"), var("?z")]),
                vec![
                    Atom::new("edge", vec![var("?x"), var("?y")]),
                    Atom::new("path", vec![var("?y"), var("?z")]),
                ],
            ),
        ]
    }

    fn path_program() -> Program {
        let mut program = Program::new();
        for rule in path_rules() {
            program.add_rule(rule);
        }
        program
    }

    fn sorted_facts(engine: &Engine) -> Vec<Atom> {
        let mut facts = engine.get_facts();
        facts.sort();
        facts
    }

    #[test]
    fn test_engine_keeps_program_and_asserts_fact() {
        let head = Atom::new("p", vec![sym("a")]);
        let atom1 = Atom::new("p", vec![sym("a"), var("?x")]);
        let atom2 = Atom::new("q", vec![sym("b"), var("?y")]);

        let mut program = Program::new();
        program.add_rule(Rule::new(head.clone(), vec![atom1.clone(), atom2]));
        program.add_rule(Rule::new(head.clone(), vec![atom1]));
        program.add_fact(head.clone());

        let engine = Engine::new(program.clone());

        assert_eq!(engine.program(), &program);
        assert_eq!(engine.get_facts(), vec![head]);
    }

    #[test]
    fn test_empty_engine_returns_no_facts() {
        let engine = Engine::default();
        assert!(engine.get_facts().is_empty());
        assert_eq!(engine.fact_count(), 0);
        assert!(engine.program().is_empty());
    }

    #[test]
    fn test_single_fact_without_rules() {
        let mut engine = Engine::default();

        engine.push_fact(Atom {
            predicate: "test".to_string(),
            terms: vec![Term::Symbol("value".to_string())],
        });

        let facts = engine.get_facts();
        assert_eq!(facts.len(), 1, "Should have exactly one fact");
        assert_eq!(facts[0].to_string(), "test(value)");
    }

    #[test]
    fn test_incremental_transitive_closure() {
        let mut engine = Engine::new(path_program());
        assert!(engine.get_facts().is_empty());

        engine.push_fact(edge("a", "b"));
        assert_eq!(sorted_facts(&engine), vec![edge("a", "b"), path("a", "b")]);

        engine.push_fact(edge("c", "d"));
        assert_eq!(
            sorted_facts(&engine),
            vec![edge("a", "b"), edge("c", "d"), path("a", "b"), path("c", "d")]
        );

        engine.push_fact(edge("b", "c"));
        assert_eq!(
            sorted_facts(&engine),
            vec![
                edge("a", "b"),
                edge("b", "c"),
                edge("c", "d"),
                path("a", "b"),
                path("a", "c"),
                path("a", "d"),
                path("b", "c"),
                path("b", "d"),
                path("c", "d"),
            ]
        );
    }

    #[test]
    fn test_longer_chain() {
        let mut engine = Engine::default();

        // Create a longer chain: a -> b -> c -> d -> e
        let edges = vec![("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")];
        for (from, to) in edges {
            engine.push_fact(edge(from, to));
        }
        engine.push_rules(path_rules());

        let paths = engine.get_matching_facts(&Atom::new("path", vec![var("?x"), var("?y")]));
        assert_eq!(paths.len(), 10, "Should have 10 path facts, got {paths:?}");

        for (from, to) in [("a", "e"), ("b", "d"), ("c", "e"), ("d", "e")] {
            assert!(
                paths.contains(&path(from, to)),
                "Missing expected path: path({from}, {to})"
            );
        }
    }

    #[test]
    fn test_rule_fires_on_preexisting_facts() {
        let mut engine = Engine::default();

        // Add facts for a small graph
        engine.push_fact(edge("1", "2"));
        engine.push_fact(edge("2", "3"));
        engine.push_fact(edge("3", "4"));

        // A rule whose body is satisfied entirely by facts that are already known
        engine.push_rule(Rule {
            head: Atom {
                predicate: "triangle".to_string(),
                terms: vec![
                    Term::Variable("?x".to_string()),
                    Term::Variable("?y".to_string()),
                    Term::Variable("?z".to_string()),
                ],
            },
            body: vec![
                Atom {
                    predicate: "edge".to_string(),
                    terms: vec![
                        Term::Variable("?x".to_string()),
                        Term::Variable("?y".to_string()),
                    ],
                },
                Atom {
                    predicate: "edge".to_string(),
                    terms: vec![
                        Term::Variable("?y".to_string()),
                        Term::Variable("?z".to_string()),
                    ],
                },
            ],
        });

        let mut triangles =
            engine.get_matching_facts(&Atom::new("triangle", vec![var("?a"), var("?b"), var("?c")]));
        triangles.sort();

        assert_eq!(
            triangles,
            vec![
                Atom::new("triangle", vec![sym("1"), sym("2"), sym("3")]),
                Atom::new("triangle", vec![sym("2"), sym("3"), sym("4")]),
            ]
        );
    }

    #[test]
    fn test_correctness_large_graph() {
        let mut engine = Engine::default();

        // Create a more complex graph with cycles and multiple paths
        let edges = vec![
            ("a", "b"),
            ("b", "c"),
            ("c", "d"),
            ("d", "e"),
            ("a", "f"),
            ("f", "g"),
            ("g", "d"),
            ("e", "h"),
            ("h", "i"),
            ("i", "j"),
            ("b", "k"),
            ("k", "l"),
            ("l", "m"),
            ("j", "a"),
        ];

        engine.push_rules(path_rules());
        for (from, to) in edges {
            engine.push_fact(edge(from, to));
        }

        // Every node lies on the cycle a..j or hangs off it, so a reaches all 13 nodes.
        let from_a = engine.get_matching_facts(&Atom::new("path", vec![sym("a"), var("?to")]));
        assert_eq!(from_a.len(), 13);

        for (from, to) in [("a", "e"), ("a", "d"), ("b", "m"), ("j", "m"), ("a", "a")] {
            assert!(
                engine.ask(&path(from, to)),
                "Should be able to reach {to} from {from}"
            );
        }
        assert!(!engine.ask(&path("m", "a")));
    }

    #[test]
    fn test_idempotent_pushes() {
        let mut engine = Engine::new(path_program());
        engine.push_fact(edge("a", "b"));
        engine.push_fact(edge("b", "c"));
        let before = sorted_facts(&engine);
        let rules_before = engine.rule_count();

        engine.push_fact(edge("a", "b"));
        engine.push_rules(path_rules());
        engine.push_fact(path("a", "c"));

        assert_eq!(sorted_facts(&engine), before);
        assert_eq!(engine.rule_count(), rules_before);
        assert_eq!(engine.fact_count(), before.len());
    }

    #[test]
    fn test_order_independence() {
        let facts = vec![edge("a", "b"), edge("b", "c"), edge("c", "a"), edge("c", "d")];

        let mut rules_first = Engine::default();
        rules_first.push_rules(path_rules());
        rules_first.push_facts(facts.clone());

        let mut facts_first = Engine::default();
        facts_first.push_facts(facts.iter().rev().cloned());
        facts_first.push_rules(path_rules().into_iter().rev());

        assert_eq!(sorted_facts(&rules_first), sorted_facts(&facts_first));
        assert_eq!(rules_first.fact_count(), 4 + 12);
    }

    #[test]
    fn test_empty_body_rule_is_a_fact() {
        let mut as_rule = Engine::new(path_program());
        as_rule.push_rule(Rule::fact(edge("a", "b")));

        let mut as_fact = Engine::new(path_program());
        as_fact.push_fact(edge("a", "b"));

        assert_eq!(sorted_facts(&as_rule), sorted_facts(&as_fact));
        assert_eq!(as_rule.rule_count(), as_fact.rule_count());
    }

    #[test]
    fn test_query_materializes_in_query_variables() {
        let mut engine = Engine::default();
        engine.push_fact(Atom::new("s", vec![sym("a")]));
        engine.push_fact(Atom::new("s", vec![sym("b")]));

        let mut answers = engine.get_matching_facts(&Atom::new("s", vec![var("?x")]));
        answers.sort();

        assert_eq!(
            answers,
            vec![Atom::new("s", vec![sym("a")]), Atom::new("s", vec![sym("b")])]
        );
    }

    #[test]
    fn test_query_with_constants_only() {
        let mut engine = Engine::default();
        engine.push_fact(Atom::new("friend", vec![sym("alice"), sym("bob")]));

        let query = Atom::new("friend", vec![sym("alice"), sym("bob")]);
        assert_eq!(engine.get_matching_facts(&query), vec![query.clone()]);
        assert!(engine.ask(&query));
        assert!(!engine.ask(&Atom::new("friend", vec![sym("bob"), sym("alice")])));
    }

    #[test]
    fn test_query_nonexistent_predicate() {
        let engine = Engine::default();
        let query = Atom::new("nonexistent", vec![var("?x")]);

        assert!(engine.get_matching_facts(&query).is_empty());
        assert!(!engine.ask(&query));
    }

    #[test]
    fn test_query_with_indexed_constant() {
        let mut engine = Engine::default();

        for i in 0..100 {
            engine.push_fact(Atom::new(
                "number",
                vec![Term::Symbol(format!("group_{}", i % 10)), Term::Symbol(i.to_string())],
            ));
        }

        let query = Atom::new("number", vec![sym("group_5"), var("?x")]);
        let mut numbers: Vec<i32> = engine
            .get_matching_facts(&query)
            .iter()
            .map(|fact| fact.terms[1].as_str().parse::<i32>().unwrap())
            .collect();
        numbers.sort_unstable();

        let expected: Vec<i32> = (0..10).map(|i| i * 10 + 5).collect();
        assert_eq!(numbers, expected);
    }

    #[test]
    fn test_repeated_variable_unification_with_rule() {
        let mut engine = Engine::default();

        engine.push_fact(Atom::new("likes", vec![sym("alice"), sym("pizza")]));
        engine.push_fact(Atom::new("likes", vec![sym("bob"), sym("bob")]));

        // narcissist(?x) :- likes(?x, ?x).
        engine.push_rule(Rule::new(
            Atom::new("narcissist", vec![var("?x")]),
            vec![Atom::new("likes", vec![var("?x"), var("?x")])],
        ));

        let narcissists = engine.get_matching_facts(&Atom::new("narcissist", vec![var("?who")]));
        assert_eq!(narcissists, vec![Atom::new("narcissist", vec![sym("bob")])]);
    }

    #[test]
    fn test_rule_with_constant_in_body() {
        let mut engine = Engine::default();
        engine.push_fact(Atom::new("likes", vec![sym("alice"), sym("pizza")]));
        engine.push_fact(Atom::new("likes", vec![sym("bob"), sym("burger")]));

        engine.push_rule(Rule::new(
            Atom::new("pizza_lover", vec![var("?x")]),
            vec![Atom::new("likes", vec![var("?x"), sym("pizza")])],
        ));
        engine.push_fact(Atom::new("likes", vec![sym("carol"), sym("pizza")]));

        let mut lovers = engine.get_matching_facts(&Atom::new("pizza_lover", vec![var("?x")]));
        lovers.sort();
        assert_eq!(
            lovers,
            vec![
                Atom::new("pizza_lover", vec![sym("alice")]),
                Atom::new("pizza_lover", vec![sym("carol")]),
            ]
        );
    }

    #[test]
    fn test_same_predicate_with_different_arities() {
        let mut engine = Engine::default();
        engine.push_fact(Atom::new("test", vec![sym("a"), sym("b")]));
        engine.push_fact(Atom::new("test", vec![sym("x"), sym("y"), sym("z")]));

        assert_eq!(engine.fact_count(), 2);
        assert_eq!(
            engine.get_matching_facts(&Atom::new("test", vec![var("?a"), var("?b"), var("?c")])),
            vec![Atom::new("test", vec![sym("x"), sym("y"), sym("z")])]
        );
    }

    #[test]
    fn test_zero_arity_atoms() {
        let mut engine = Engine::default();
        engine.push_rule(Rule::new(
            Atom::new("ready", vec![]),
            vec![Atom::new("started", vec![]), Atom::new("configured", vec![])],
        ));
        engine.push_fact(Atom::new("started", vec![]));
        assert!(!engine.ask(&Atom::new("ready", vec![])));

        engine.push_fact(Atom::new("configured", vec![]));
        assert!(engine.ask(&Atom::new("ready", vec![])));
    }

    #[test]
    fn test_push_program_merges_into_program() {
        let mut engine = Engine::new(path_program());
        let mut extra = Program::new();
        extra.add_fact(edge("a", "b"));

        engine.push_program(&extra);

        assert_eq!(engine.program().rules.len(), 2);
        assert_eq!(engine.program().facts, vec![edge("a", "b")]);
        assert!(engine.ask(&path("a", "b")));
    }

    #[test]
    fn test_unsafe_rule_drops_non_ground_conclusions() {
        let mut engine = Engine::default();
        // ?y never occurs in the body.
        engine.push_rule(Rule::new(
            Atom::new("pair", vec![var("?x"), var("?y")]),
            vec![Atom::new("node", vec![var("?x")])],
        ));
        engine.push_fact(Atom::new("node", vec![sym("a")]));

        assert_eq!(engine.get_facts(), vec![Atom::new("node", vec![sym("a")])]);
        assert_eq!(engine.fact_count(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_facts_to_json() {
        let mut engine = Engine::default();
        engine.push_fact(Atom::new("s", vec![sym("a")]));

        let json = engine.facts_to_json().unwrap();
        let facts: Vec<Atom> = serde_json::from_str(&json).unwrap();
        assert_eq!(facts, vec![Atom::new("s", vec![sym("a")])]);
    }
}
