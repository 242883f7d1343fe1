//! # Trielog
//!
//! A forward-chaining Datalog engine for function-free Horn clauses.
//!
//! ## Features
//!
//! - Incremental evaluation: every pushed fact or rule is propagated to the
//!   fixpoint immediately
//! - Trie-indexed resolution in both directions (facts against rule bodies,
//!   rules against known facts)
//! - Pattern queries against the computed model
//! - Optional textual syntax (`parsing` feature) and an async shared engine
//!   (`async` feature)
//!
//! ## Example
//!
//! ```rust
//! use trielog::{Atom, Engine, Program, Rule, Term};
//!
//! let mut program = Program::new();
//! program.add_rule(Rule::new(
//!     Atom::new("path", vec![Term::variable("?x"), Term::variable("?y")]),
//!     vec![Atom::new("edge", vec![Term::variable("?x"), Term::variable("?y")])],
//! ));
//!
//! let mut engine = Engine::new(program);
//! engine.push_fact(Atom::new("edge", vec![Term::symbol("a"), Term::symbol("b")]));
//!
//! let paths = engine.get_matching_facts(&Atom::new(
//!     "path",
//!     vec![Term::variable("?from"), Term::variable("?to")],
//! ));
//! assert_eq!(paths[0].to_string(), "path(a, b)");
//! ```

/// Evaluation engine.
pub mod engine;
/// Error types.
pub mod error;
/// Pattern tries for rules and facts.
pub mod index;
/// Program file loading.
#[cfg(feature = "parsing")]
pub mod loader;
/// Terms, atoms, rules and programs.
pub mod model;
/// Textual syntax.
#[cfg(feature = "parsing")]
pub mod parser;
/// Engine shared between async tasks.
#[cfg(feature = "async")]
pub mod shared;

pub use engine::Engine;
pub use error::{Error, Result};
pub use index::{FactIndex, PatternIndex, RuleIndex};
#[cfg(feature = "parsing")]
pub use loader::load_program;
pub use model::{Atom, Program, Rule, Substitution, Term};
#[cfg(feature = "parsing")]
pub use parser::{parse_atom, parse_program, parse_query, parse_rule, parse_term};
#[cfg(feature = "async")]
pub use shared::SharedEngine;
