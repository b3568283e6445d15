use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::overrides::Overrides;
use crate::error::{ChainBuildError, TaskError};

/// One named step of a task chain.
///
/// `args` is the workflow input, identical for every step. Anything derived goes through `overrides`.
/// Returning an error leaves the chain at this step; [`TaskError::Retryable`] marks "not yet".
#[async_trait]
pub trait TaskStep<A>: Send + Sync {
    async fn run(&self, args: &A, overrides: &mut Overrides) -> Result<(), TaskError>;
}

/// Registration of a step, with the override keys it consumes and produces.
pub struct StepSpec<A> {
    name: &'static str,
    next: Option<&'static str>,
    reads: Vec<&'static str>,
    writes: Vec<&'static str>,
    step: Arc<dyn TaskStep<A>>,
}

impl<A> StepSpec<A> {
    pub fn new(name: &'static str, step: impl TaskStep<A> + 'static) -> Self {
        Self { name, next: None, reads: Vec::new(), writes: Vec::new(), step: Arc::new(step) }
    }

    pub fn next(mut self, next: &'static str) -> Self {
        self.next = Some(next);
        self
    }

    pub fn reads(mut self, keys: &[&'static str]) -> Self {
        self.reads.extend_from_slice(keys);
        self
    }

    pub fn writes(mut self, keys: &[&'static str]) -> Self {
        self.writes.extend_from_slice(keys);
        self
    }
}

pub struct TaskChainBuilder<A> {
    name: String,
    steps: Vec<StepSpec<A>>,
}

impl<A> TaskChainBuilder<A> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), steps: Vec::new() }
    }

    pub fn step(mut self, spec: StepSpec<A>) -> Self {
        self.steps.push(spec);
        self
    }

    /// Checks the chain shape: one initial step, known `next` names, no cycle, and every read override
    /// written by an earlier step.
    pub fn build(self) -> Result<TaskChain<A>, ChainBuildError> {
        if self.steps.is_empty() {
            return Err(ChainBuildError::Empty { chain: self.name });
        }

        let mut steps = HashMap::with_capacity(self.steps.len());
        for spec in self.steps {
            if steps.contains_key(spec.name) {
                return Err(ChainBuildError::DuplicateStep { step: spec.name.to_string() });
            }
            steps.insert(spec.name, spec);
        }

        for spec in steps.values() {
            if let Some(next) = spec.next {
                if !steps.contains_key(next) {
                    return Err(ChainBuildError::UnknownNext { step: spec.name.to_string(), next: next.to_string() });
                }
            }
        }

        let targets: HashSet<&str> = steps.values().filter_map(|spec| spec.next).collect();
        let mut initial: Vec<&'static str> = steps.keys().copied().filter(|name| !targets.contains(name)).collect();
        if initial.len() != 1 {
            initial.sort_unstable();
            return Err(ChainBuildError::InitialStep {
                chain: self.name,
                found: initial.into_iter().map(String::from).collect(),
            });
        }
        let initial = initial[0];

        let mut order = Vec::with_capacity(steps.len());
        let mut written: HashSet<&str> = HashSet::new();
        let mut current = Some(initial);
        while let Some(name) = current {
            if order.contains(&name) {
                return Err(ChainBuildError::Cycle { step: name.to_string() });
            }
            let spec = &steps[name];
            if let Some(key) = spec.reads.iter().find(|key| !written.contains(*key)) {
                return Err(ChainBuildError::UnsatisfiedRead { step: name.to_string(), key: key.to_string() });
            }
            written.extend(spec.writes.iter().copied());
            order.push(name);
            current = spec.next;
        }

        if let Some(unreached) = steps.keys().find(|name| !order.contains(*name)) {
            return Err(ChainBuildError::Cycle { step: unreached.to_string() });
        }

        Ok(TaskChain { name: self.name, initial, order, steps })
    }
}

/// Validated, immutable chain definition.
pub struct TaskChain<A> {
    name: String,
    initial: &'static str,
    order: Vec<&'static str>,
    steps: HashMap<&'static str, StepSpec<A>>,
}

impl<A> TaskChain<A> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial(&self) -> &'static str {
        self.initial
    }

    /// Step names in execution order.
    pub fn order(&self) -> &[&'static str] {
        &self.order
    }

    pub fn next(&self, step: &str) -> Option<&'static str> {
        self.steps.get(step).and_then(|spec| spec.next)
    }

    pub(crate) fn step(&self, name: &str) -> Option<Arc<dyn TaskStep<A>>> {
        self.steps.get(name).map(|spec| spec.step.clone())
    }
}
