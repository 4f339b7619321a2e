#![forbid(unsafe_code)]

//! Debugging wrapper that logs what flows through a stage.

use std::fmt;

use crate::publisher::Subscription;
use crate::stage::{Stage, StageId};

/// Wraps a stage and emits a `stage.input` / `stage.output` debug event pair
/// around every `process` call. Otherwise transparent: output and watch are
/// the wrapped stage's, so a queue treats it exactly like the inner stage.
pub struct TracedStage<S> {
    id: StageId,
    label: &'static str,
    inner: S,
}

impl<S> TracedStage<S> {
    pub fn new(label: &'static str, inner: S) -> Self {
        Self {
            id: StageId::next(),
            label,
            inner,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<T, S> Stage<T> for TracedStage<S>
where
    T: fmt::Debug,
    S: Stage<T>,
{
    fn id(&self) -> StageId {
        self.id
    }

    fn process(&self, input: T, force: bool) -> T {
        tracing::debug!(
            message = "stage.input",
            label = self.label,
            stage = self.inner.id().raw(),
            force,
            value = ?input
        );
        let output = self.inner.process(input, force);
        tracing::debug!(
            message = "stage.output",
            label = self.label,
            stage = self.inner.id().raw(),
            value = ?output
        );
        output
    }

    fn output(&self) -> Option<T> {
        self.inner.output()
    }

    fn watch(&self, on_change: Box<dyn Fn(&T)>) -> Option<Subscription> {
        self.inner.watch(on_change)
    }
}

impl<S: fmt::Debug> fmt::Debug for TracedStage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedStage")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("inner", &self.inner)
            .finish()
    }
}
