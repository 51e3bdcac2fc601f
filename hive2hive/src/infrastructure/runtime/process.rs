// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Process Engine
//!
//! The composable, rollback-capable step pipeline every high-level
//! operation is built from. A process component is anything
//! implementing [`ProcessStep`]: an atomic step, or a composite running
//! children sequentially or in parallel. Composites hold children as
//! the same capability set, so pipelines nest freely without a class
//! hierarchy.
//!
//! ## Lifecycle
//!
//! ```text
//! Ready → Running → Succeeded
//!                 ↘ RollingBack → RolledBack
//! ```
//!
//! Transitions outside this machine fail with `InvalidProcessState`.
//! When a child fails, the composite rolls back every already-succeeded
//! child in reverse order, then surfaces the first failure as a
//! `ProcessExecution` error carrying the failing step's name and cause.
//! Failure is a return value, not an unwind: steps report
//! `Result<_, H2HError>` and composites inspect it.
//!
//! ## Cancellation
//!
//! Cancellation is cooperative. Every execution carries a
//! [`CancelToken`]; steps call `ensure_active` at their suspension
//! points (overlay round-trips, waits). Parallel composites hand their
//! children a linked child token so that one failing sibling cancels
//! the others without touching the rest of the process tree.
//!
//! ## Rollback Contract
//!
//! Steps record what they provided in the shared context and undo
//! exactly that on rollback. Rollback must be idempotent and tolerate
//! running on a step that never executed (a no-op by default).
//!
//! ## Results
//!
//! Result-bearing processes write their typed result into the shared
//! context; the pipeline's `run` function extracts it after the
//! composite reaches `Succeeded`. There is no separate result channel.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use hive2hive_domain::H2HError;

/// Lifecycle state of a process component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Succeeded,
    Failed,
    RollingBack,
    RolledBack,
}

/// Observer of a process component's terminal events.
pub trait ProcessListener: Send + Sync {
    /// The component reached `Succeeded`
    fn on_succeeded(&self) {}
    /// The component failed; rollback has already completed
    fn on_failed(&self, _reason: &H2HError) {}
    /// The component reached any terminal state
    fn on_finished(&self) {}
}

struct TokenInner {
    cancelled: AtomicBool,
    parent: Option<CancelToken>,
}

/// Cooperative cancellation token with parent linkage.
///
/// A token is cancelled when its own flag or any ancestor's flag is
/// set. Child tokens let a composite cancel its own subtree only.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Creates a root token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Creates a token linked below this one
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Requests cancellation of this token's subtree
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true when this token or any ancestor is cancelled
    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(token) = current {
            if token.inner.cancelled.load(Ordering::SeqCst) {
                return true;
            }
            current = token.inner.parent.as_ref();
        }
        false
    }

    /// Fails with `AbortedByUser` when cancelled; steps call this at
    /// suspension points
    pub fn ensure_active(&self) -> Result<(), H2HError> {
        if self.is_cancelled() {
            Err(H2HError::AbortedByUser("process cancelled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit of executable, compensable work.
///
/// `C` is the operation's shared context; steps communicate through it
/// and record there what a later rollback must undo.
#[async_trait]
pub trait ProcessStep<C: Send + Sync>: Send + Sync {
    /// Returns the step name used in failure reasons and logs
    fn name(&self) -> &str;

    /// Performs the step's work
    async fn execute(&self, ctx: &C, token: &CancelToken) -> Result<(), H2HError>;

    /// Undoes the step's work. Must be idempotent and a no-op when the
    /// step never executed.
    async fn rollback(&self, _ctx: &C) -> Result<(), H2HError> {
        Ok(())
    }
}

struct ProcessCore {
    name: String,
    state: Mutex<ProcessState>,
    listeners: Mutex<Vec<Arc<dyn ProcessListener>>>,
}

impl ProcessCore {
    fn new(name: String) -> Self {
        Self {
            name,
            state: Mutex::new(ProcessState::Ready),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    fn transition(&self, from: ProcessState, to: ProcessState) -> Result<(), H2HError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(H2HError::InvalidProcessState(format!(
                "process '{}' cannot move {:?} → {:?} while {:?}",
                self.name, from, to, *state
            )));
        }
        *state = to;
        Ok(())
    }

    fn force(&self, to: ProcessState) {
        *self.state.lock() = to;
    }

    fn notify_succeeded(&self) {
        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            listener.on_succeeded();
            listener.on_finished();
        }
    }

    fn notify_failed(&self, reason: &H2HError) {
        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            listener.on_failed(reason);
            listener.on_finished();
        }
    }
}

/// Runs child steps in order; a failure rolls back the already-succeeded
/// prefix in reverse.
pub struct SequentialProcess<C: Send + Sync> {
    core: ProcessCore,
    steps: Vec<Arc<dyn ProcessStep<C>>>,
}

impl<C: Send + Sync + 'static> SequentialProcess<C> {
    /// Creates an empty sequential composite
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ProcessCore::new(name.into()),
            steps: Vec::new(),
        }
    }

    /// Appends a step, builder style
    pub fn with_step(mut self, step: Arc<dyn ProcessStep<C>>) -> Self {
        self.steps.push(step);
        self
    }

    /// Registers a listener for terminal events
    pub fn subscribe(&self, listener: Arc<dyn ProcessListener>) {
        self.core.listeners.lock().push(listener);
    }

    /// Returns the current lifecycle state
    pub fn state(&self) -> ProcessState {
        self.core.state()
    }

    /// Runs the composite to a terminal state with a fresh root token
    pub async fn execute_blocking(&self, ctx: &C) -> Result<(), H2HError> {
        self.run(ctx, &CancelToken::new()).await
    }

    /// Runs the composite to a terminal state under the given token
    pub async fn run(&self, ctx: &C, token: &CancelToken) -> Result<(), H2HError> {
        self.core.transition(ProcessState::Ready, ProcessState::Running)?;

        let mut executed: Vec<&Arc<dyn ProcessStep<C>>> = Vec::new();
        for step in &self.steps {
            let result = match token.ensure_active() {
                Ok(()) => {
                    debug!(process = %self.core.name, step = step.name(), "executing step");
                    step.execute(ctx, token).await
                }
                Err(aborted) => Err(aborted),
            };
            match result {
                Ok(()) => executed.push(step),
                Err(cause) => {
                    let reason = failure_reason(&self.core.name, step.name(), cause);
                    self.core.force(ProcessState::RollingBack);
                    rollback_reverse(&executed, ctx).await;
                    self.core.force(ProcessState::RolledBack);
                    self.core.notify_failed(&reason);
                    return Err(reason);
                }
            }
        }

        self.core.force(ProcessState::Succeeded);
        self.core.notify_succeeded();
        Ok(())
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> ProcessStep<C> for SequentialProcess<C> {
    fn name(&self) -> &str {
        &self.core.name
    }

    async fn execute(&self, ctx: &C, token: &CancelToken) -> Result<(), H2HError> {
        self.run(ctx, token).await
    }

    async fn rollback(&self, ctx: &C) -> Result<(), H2HError> {
        // Rolling back a nested composite undoes all of its steps; a
        // composite that never ran rolls back nothing.
        if self.core.state() != ProcessState::Succeeded {
            return Ok(());
        }
        self.core.force(ProcessState::RollingBack);
        let executed: Vec<&Arc<dyn ProcessStep<C>>> = self.steps.iter().collect();
        rollback_reverse(&executed, ctx).await;
        self.core.force(ProcessState::RolledBack);
        Ok(())
    }
}

/// Runs child steps concurrently; the first failure cancels the
/// remaining children and rolls back those that succeeded.
pub struct ParallelProcess<C: Send + Sync> {
    core: ProcessCore,
    steps: Vec<Arc<dyn ProcessStep<C>>>,
}

impl<C: Send + Sync + 'static> ParallelProcess<C> {
    /// Creates an empty parallel composite
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ProcessCore::new(name.into()),
            steps: Vec::new(),
        }
    }

    /// Appends a step, builder style
    pub fn with_step(mut self, step: Arc<dyn ProcessStep<C>>) -> Self {
        self.steps.push(step);
        self
    }

    /// Returns the current lifecycle state
    pub fn state(&self) -> ProcessState {
        self.core.state()
    }

    /// Runs all children concurrently under a linked child token
    pub async fn run(&self, ctx: &C, token: &CancelToken) -> Result<(), H2HError> {
        use futures::stream::{FuturesUnordered, StreamExt};

        self.core.transition(ProcessState::Ready, ProcessState::Running)?;

        let child_token = token.child();
        let mut pending: FuturesUnordered<_> = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let child_token = child_token.clone();
                async move { (index, step.execute(ctx, &child_token).await) }
            })
            .collect();

        let mut succeeded: Vec<usize> = Vec::new();
        let mut first_failure: Option<(usize, H2HError)> = None;
        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(()) => succeeded.push(index),
                Err(cause) => {
                    if first_failure.is_none() {
                        // Cancel the siblings; they unwind cooperatively.
                        child_token.cancel();
                        first_failure = Some((index, cause));
                    }
                }
            }
        }

        match first_failure {
            None => {
                self.core.force(ProcessState::Succeeded);
                self.core.notify_succeeded();
                Ok(())
            }
            Some((index, cause)) => {
                let reason = failure_reason(&self.core.name, self.steps[index].name(), cause);
                self.core.force(ProcessState::RollingBack);
                succeeded.sort_unstable();
                let executed: Vec<&Arc<dyn ProcessStep<C>>> =
                    succeeded.iter().map(|&i| &self.steps[i]).collect();
                rollback_reverse(&executed, ctx).await;
                self.core.force(ProcessState::RolledBack);
                self.core.notify_failed(&reason);
                Err(reason)
            }
        }
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> ProcessStep<C> for ParallelProcess<C> {
    fn name(&self) -> &str {
        &self.core.name
    }

    async fn execute(&self, ctx: &C, token: &CancelToken) -> Result<(), H2HError> {
        self.run(ctx, token).await
    }

    async fn rollback(&self, ctx: &C) -> Result<(), H2HError> {
        if self.core.state() != ProcessState::Succeeded {
            return Ok(());
        }
        self.core.force(ProcessState::RollingBack);
        let executed: Vec<&Arc<dyn ProcessStep<C>>> = self.steps.iter().collect();
        rollback_reverse(&executed, ctx).await;
        self.core.force(ProcessState::RolledBack);
        Ok(())
    }
}

fn failure_reason(process: &str, step: &str, cause: H2HError) -> H2HError {
    match cause {
        // Cancellation and lifecycle violations keep their kind so
        // callers can distinguish them from domain failures.
        H2HError::AbortedByUser(_) | H2HError::InvalidProcessState(_) => cause,
        other => H2HError::ProcessExecution(format!("{}: step '{}' failed: {}", process, step, other)),
    }
}

async fn rollback_reverse<C: Send + Sync>(executed: &[&Arc<dyn ProcessStep<C>>], ctx: &C) {
    for step in executed.iter().rev() {
        debug!(step = step.name(), "rolling back step");
        if let Err(error) = step.rollback(ctx).await {
            // Rollback keeps going; compensation is best-effort.
            warn!(step = step.name(), %error, "rollback of step failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct TestContext {
        log: Mutex<Vec<String>>,
    }

    impl TestContext {
        fn log(&self, entry: impl Into<String>) {
            self.log.lock().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.log.lock().clone()
        }
    }

    struct RecordingStep {
        name: String,
        fail: bool,
    }

    impl RecordingStep {
        fn ok(name: &str) -> Arc<dyn ProcessStep<TestContext>> {
            Arc::new(Self {
                name: name.to_string(),
                fail: false,
            })
        }

        fn failing(name: &str) -> Arc<dyn ProcessStep<TestContext>> {
            Arc::new(Self {
                name: name.to_string(),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl ProcessStep<TestContext> for RecordingStep {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&self, ctx: &TestContext, _token: &CancelToken) -> Result<(), H2HError> {
            if self.fail {
                return Err(H2HError::process_execution(format!("{} exploded", self.name)));
            }
            ctx.log(format!("execute {}", self.name));
            Ok(())
        }

        async fn rollback(&self, ctx: &TestContext) -> Result<(), H2HError> {
            ctx.log(format!("rollback {}", self.name));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingListener {
        succeeded: AtomicUsize,
        failed: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ProcessListener for CountingListener {
        fn on_succeeded(&self) {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        }
        fn on_failed(&self, _reason: &H2HError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_finished(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Tests the happy path through a sequential composite.
    ///
    /// Validates that:
    /// - Steps run in declaration order
    /// - The terminal state is Succeeded
    /// - Listeners observe on_succeeded and on_finished once each
    #[tokio::test]
    async fn test_sequential_success() {
        let process = SequentialProcess::new("op")
            .with_step(RecordingStep::ok("a"))
            .with_step(RecordingStep::ok("b"));
        let listener = Arc::new(CountingListener::default());
        process.subscribe(listener.clone());

        let ctx = TestContext::default();
        process.execute_blocking(&ctx).await.unwrap();

        assert_eq!(ctx.entries(), vec!["execute a", "execute b"]);
        assert_eq!(process.state(), ProcessState::Succeeded);
        assert_eq!(listener.succeeded.load(Ordering::SeqCst), 1);
        assert_eq!(listener.finished.load(Ordering::SeqCst), 1);
    }

    /// Tests reverse-order rollback on a mid-pipeline failure.
    ///
    /// Validates that:
    /// - Steps after the failing one never run
    /// - Succeeded steps roll back in reverse order
    /// - The error names the failing step
    /// - The terminal state is RolledBack
    #[tokio::test]
    async fn test_sequential_failure_rolls_back_in_reverse() {
        let process = SequentialProcess::new("op")
            .with_step(RecordingStep::ok("a"))
            .with_step(RecordingStep::ok("b"))
            .with_step(RecordingStep::failing("boom"))
            .with_step(RecordingStep::ok("never"));
        let listener = Arc::new(CountingListener::default());
        process.subscribe(listener.clone());

        let ctx = TestContext::default();
        let error = process.execute_blocking(&ctx).await.unwrap_err();

        assert_eq!(
            ctx.entries(),
            vec!["execute a", "execute b", "rollback b", "rollback a"]
        );
        assert!(matches!(error, H2HError::ProcessExecution(_)));
        assert!(error.to_string().contains("boom"));
        assert_eq!(process.state(), ProcessState::RolledBack);
        assert_eq!(listener.failed.load(Ordering::SeqCst), 1);
    }

    /// Tests the lifecycle guard against double starts.
    #[tokio::test]
    async fn test_double_start_rejected() {
        let process = SequentialProcess::new("op").with_step(RecordingStep::ok("a"));
        let ctx = TestContext::default();
        process.execute_blocking(&ctx).await.unwrap();

        let error = process.execute_blocking(&ctx).await.unwrap_err();
        assert!(matches!(error, H2HError::InvalidProcessState(_)));
    }

    /// Tests pre-start cancellation surfacing as AbortedByUser with a
    /// clean rollback of nothing.
    #[tokio::test]
    async fn test_cancelled_before_start() {
        let process = SequentialProcess::new("op").with_step(RecordingStep::ok("a"));
        let ctx = TestContext::default();
        let token = CancelToken::new();
        token.cancel();

        let error = process.run(&ctx, &token).await.unwrap_err();
        assert!(matches!(error, H2HError::AbortedByUser(_)));
        assert!(ctx.entries().is_empty());
        assert_eq!(process.state(), ProcessState::RolledBack);
    }

    /// Tests that a failing parallel child cancels its siblings.
    ///
    /// A slow sibling observes the child token at its suspension point
    /// and aborts; the fast succeeded sibling is rolled back.
    #[tokio::test]
    async fn test_parallel_failure_cancels_siblings() {
        struct SlowStep;

        #[async_trait]
        impl ProcessStep<TestContext> for SlowStep {
            fn name(&self) -> &str {
                "slow"
            }

            async fn execute(&self, ctx: &TestContext, token: &CancelToken) -> Result<(), H2HError> {
                for _ in 0..50 {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    token.ensure_active()?;
                }
                ctx.log("execute slow");
                Ok(())
            }
        }

        let process = ParallelProcess::new("fanout")
            .with_step(RecordingStep::ok("fast"))
            .with_step(Arc::new(SlowStep))
            .with_step(RecordingStep::failing("boom"));

        let ctx = TestContext::default();
        let error = process.run(&ctx, &CancelToken::new()).await.unwrap_err();

        assert!(error.to_string().contains("boom"));
        let entries = ctx.entries();
        assert!(entries.contains(&"execute fast".to_string()));
        assert!(entries.contains(&"rollback fast".to_string()));
        // The slow sibling was cancelled, never completed
        assert!(!entries.contains(&"execute slow".to_string()));
        assert_eq!(process.state(), ProcessState::RolledBack);
    }

    /// Tests that a parallel child token does not leak cancellation to
    /// the parent token.
    #[tokio::test]
    async fn test_parallel_cancel_stays_local() {
        let process = ParallelProcess::new("fanout").with_step(RecordingStep::failing("boom"));
        let ctx = TestContext::default();
        let token = CancelToken::new();
        let _ = process.run(&ctx, &token).await;
        assert!(!token.is_cancelled());
    }

    /// Tests nesting: a sequential composite as a parallel child.
    #[tokio::test]
    async fn test_composites_nest() {
        let inner = SequentialProcess::new("inner")
            .with_step(RecordingStep::ok("i1"))
            .with_step(RecordingStep::ok("i2"));
        let process = ParallelProcess::new("outer").with_step(Arc::new(inner) as Arc<dyn ProcessStep<TestContext>>);

        let ctx = TestContext::default();
        process.run(&ctx, &CancelToken::new()).await.unwrap();
        assert_eq!(ctx.entries(), vec!["execute i1", "execute i2"]);
    }
}
