use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;

use crate::engine::Engine;
use crate::model::{Atom, Program, Rule};

/// An [`Engine`] that can be shared between tasks.
///
/// Pushes take the write lock and run to the fixpoint before releasing it.
/// Reads take the read lock and may run concurrently with each other.
#[derive(Debug, Clone, Default)]
pub struct SharedEngine {
    inner: Arc<RwLock<Engine>>,
}

impl SharedEngine {
    /// Builds the fixpoint model of `program`.
    #[must_use]
    pub fn new(program: Program) -> Self {
        Self::from(Engine::new(program))
    }

    /// See [`Engine::push_fact`].
    pub async fn push_fact(&self, fact: Atom) {
        self.inner.write().await.push_fact(fact);
    }

    /// See [`Engine::push_rule`].
    pub async fn push_rule(&self, rule: Rule) {
        self.inner.write().await.push_rule(rule);
    }

    /// See [`Engine::push_program`].
    pub async fn push_program(&self, program: &Program) {
        self.inner.write().await.push_program(program);
    }

    /// See [`Engine::get_facts`].
    pub async fn get_facts(&self) -> Vec<Atom> {
        self.inner.read().await.get_facts()
    }

    /// See [`Engine::get_matching_facts`].
    pub async fn get_matching_facts(&self, query: &Atom) -> Vec<Atom> {
        self.inner.read().await.get_matching_facts(query)
    }

    /// Answers several queries concurrently, in order.
    pub async fn query_all(&self, queries: &[Atom]) -> Vec<Vec<Atom>> {
        join_all(queries.iter().map(|query| self.get_matching_facts(query))).await
    }
}

impl From<Engine> for SharedEngine {
    fn from(engine: Engine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }
}
