//! Control Loop Driver
//!
//! Drives repeated think/act steps under a step budget and a loop-detection
//! policy, in one of two modes:
//!
//! - [`Agent::run`] completes on the caller's task and returns the step log.
//! - [`Agent::run_stream`] spawns the loop onto its own task and returns a
//!   [`RunStream`] of [`RunEvent`]s.
//!
//! Entry is guarded by a compare-and-swap `Idle -> Running`, so at most one run
//! is active per agent. Conversation and counters are reset when a run exits,
//! whichever way it exits. The state itself is left as the run ended it; call
//! [`Agent::reset`] to make a finished agent runnable again.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{FutureExt, Stream};
use tokio::sync::{Mutex, MutexGuard, Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::event::RunEvent;
use crate::loop_detect::is_stuck;
use crate::message::{Conversation, Message};
use crate::state::{AgentState, StateCell};
use crate::step::{Step, StepContext, execute_step};

/// Mutable per-run bookkeeping
#[derive(Clone, Debug, Default)]
pub struct AgentRuntime {
    pub current_step: usize,
    pub stuck_count: usize,
    pub conversation: Conversation,
}

impl AgentRuntime {
    fn reset(&mut self) {
        self.conversation.clear();
        self.current_step = 0;
        self.stuck_count = 0;
    }
}

struct Inner<S> {
    runtime: AgentRuntime,
    step: S,
}

/// Holds the runtime for the duration of a run and resets it on drop.
struct RunGuard<'a, S>(MutexGuard<'a, Inner<S>>);

impl<S> Drop for RunGuard<'_, S> {
    fn drop(&mut self) {
        self.0.runtime.reset();
    }
}

/// Where the loop reports its events
enum Sink<'a> {
    Log(&'a mut Vec<String>),
    Channel {
        tx: &'a mpsc::Sender<RunEvent>,
        progress: &'a Notify,
        stop: &'a CancellationToken,
    },
}

impl Sink<'_> {
    /// Whether the run was stopped from outside (timeout or cancel).
    fn stopped(&self) -> bool {
        match self {
            Self::Log(_) => false,
            Self::Channel { stop, .. } => stop.is_cancelled(),
        }
    }

    /// Fails with the reason the loop has to end early.
    async fn emit(&mut self, event: RunEvent) -> std::result::Result<(), LoopEnd> {
        match self {
            Self::Log(lines) => {
                if let Some(line) = event.line() {
                    lines.push(line.to_string());
                }
                Ok(())
            }
            Self::Channel { tx, progress, stop } => {
                // Nothing may follow the failure event of a stopped run.
                let sent = tokio::select! {
                    biased;
                    () = stop.cancelled() => return Err(LoopEnd::Stopped),
                    sent = tx.send(event) => sent,
                };
                if sent.is_err() {
                    return Err(LoopEnd::ConsumerGone);
                }
                progress.notify_one();
                Ok(())
            }
        }
    }
}

enum LoopEnd {
    Completed,
    ConsumerGone,
    /// Timed out or cancelled, noticed between steps
    Stopped,
}

/// An agent: configuration, state machine and the step strategy it drives
pub struct Agent<S> {
    config: AgentConfig,
    state: StateCell,
    inner: Mutex<Inner<S>>,
}

impl<S: Step> Agent<S> {
    /// Create an idle agent around `step`.
    pub fn new(config: AgentConfig, step: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: StateCell::default(),
            inner: Mutex::new(Inner {
                runtime: AgentRuntime::default(),
                step,
            }),
        })
    }

    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> AgentState {
        self.state.get()
    }

    /// Copy of the runtime bookkeeping. Waits for an active run to exit.
    pub async fn runtime(&self) -> AgentRuntime {
        self.inner.lock().await.runtime.clone()
    }

    /// Move a `Finished` or `Error` agent back to `Idle`.
    pub fn reset(&self) -> Result<()> {
        let state = self.state.get();
        if !state.is_terminal() {
            return Err(AgentError::InvalidState(state));
        }
        self.state
            .transition(state, AgentState::Idle)
            .map_err(AgentError::InvalidState)
    }

    /// Run the agent to completion and return the step log, one line per event.
    ///
    /// Precondition failures are returned as errors and leave the state
    /// untouched. A failure during the run moves the agent to `Error` and is
    /// reported as the returned string.
    pub async fn run(&self, user_prompt: &str) -> Result<String> {
        self.begin(user_prompt)?;

        let span = tracing::info_span!(
            "agent_run",
            agent = %self.config.name,
            run_id = %Uuid::new_v4(),
            mode = "blocking"
        );

        async {
            let mut guard = RunGuard(self.inner.lock().await);
            guard.0.runtime.conversation.push(Message::user(user_prompt));

            let mut lines = Vec::new();
            let outcome = self.drive(&mut guard.0, &mut Sink::Log(&mut lines)).await;
            if let Err(e) = &outcome {
                self.state.set(AgentState::Error);
                tracing::error!(error = %e, "Error running agent");
            }
            drop(guard);

            match outcome {
                Ok(_) => Ok(lines.join("\n")),
                Err(e) => Ok(format!("Error running agent: {e}")),
            }
        }
        .instrument(span)
        .await
    }

    /// Check preconditions and claim the agent for a run.
    fn begin(&self, user_prompt: &str) -> Result<()> {
        let state = self.state.get();
        if state != AgentState::Idle {
            return Err(AgentError::InvalidState(state));
        }
        if user_prompt.trim().is_empty() {
            return Err(AgentError::InvalidArgument(
                "user prompt cannot be empty".into(),
            ));
        }
        self.state
            .transition(AgentState::Idle, AgentState::Running)
            .map_err(AgentError::InvalidState)
    }

    /// The step loop shared by both modes.
    ///
    /// A stop request is honoured between steps only: a step that has
    /// started always runs to completion.
    async fn drive(&self, inner: &mut Inner<S>, sink: &mut Sink<'_>) -> Result<LoopEnd> {
        let config = &self.config;
        let Inner { runtime, step } = inner;

        while runtime.current_step < config.max_steps && self.state.get() != AgentState::Finished
        {
            if sink.stopped() {
                return Ok(LoopEnd::Stopped);
            }
            runtime.current_step += 1;
            let current = runtime.current_step;
            tracing::info!(step = current, max_steps = config.max_steps, "Running step");

            let mut ctx = StepContext::new(&mut runtime.conversation, config, current);
            let summary = AssertUnwindSafe(execute_step(&mut *step, &mut ctx))
                .catch_unwind()
                .await
                .map_err(|panic| AgentError::RunFailure(panic_message(&*panic)))??;
            if sink.stopped() {
                tracing::info!(step = current, "Step completed after the run was stopped");
                return Ok(LoopEnd::Stopped);
            }
            if ctx.finish_requested() {
                self.state.set(AgentState::Finished);
            }

            if let Err(end) = sink.emit(RunEvent::step(current, &summary)).await {
                return Ok(end);
            }

            if is_stuck(&runtime.conversation, config.duplicate_threshold, config.check_range) {
                runtime.stuck_count += 1;
                tracing::warn!(
                    step = current,
                    stuck_count = runtime.stuck_count,
                    "Detected potential loop"
                );
                if let Err(end) = sink.emit(RunEvent::loop_warning(current)).await {
                    return Ok(end);
                }

                if runtime.stuck_count >= config.stuck_limit {
                    tracing::error!(step = current, "Agent terminated due to repeated loop detection");
                    self.state.set(AgentState::Finished);
                    if let Err(end) = sink.emit(RunEvent::repeated_loop(current)).await {
                        return Ok(end);
                    }
                    break;
                }
            } else {
                runtime.stuck_count = 0;
            }
        }

        if self.state.get() != AgentState::Finished && runtime.current_step >= config.max_steps {
            self.state.set(AgentState::Finished);
            tracing::info!(max_steps = config.max_steps, "Reached max steps");
            let event = RunEvent::max_steps(runtime.current_step, config.max_steps);
            if let Err(end) = sink.emit(event).await {
                return Ok(end);
            }
        }

        Ok(LoopEnd::Completed)
    }
}

impl<S: Step + 'static> Agent<S> {
    /// Start a run on its own task and return its event stream.
    ///
    /// Precondition failures are delivered as the only event of an already
    /// closed stream. Must be called from within a Tokio runtime.
    pub fn run_stream(self: &Arc<Self>, user_prompt: &str) -> RunStream {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let cancel = CancellationToken::new();

        if let Err(e) = self.begin(user_prompt) {
            tracing::warn!(agent = %self.config.name, error = %e, "Rejected streaming run");
            // The channel is fresh and has capacity, so this cannot fail.
            let _ = tx.try_send(RunEvent::failed(&e));
            return RunStream::new(rx, cancel, None);
        }

        let span = tracing::info_span!(
            "agent_run",
            agent = %self.config.name,
            run_id = %Uuid::new_v4(),
            mode = "streaming"
        );
        let agent = Arc::clone(self);
        let prompt = user_prompt.to_string();
        let token = cancel.clone();
        let task = tokio::spawn(
            async move { agent.stream_task(prompt, tx, token).await }.instrument(span),
        );

        RunStream::new(rx, cancel, Some(task))
    }

    async fn stream_task(&self, prompt: String, tx: mpsc::Sender<RunEvent>, cancel: CancellationToken) {
        let timeout = self.config.stream_timeout;
        let stop = cancel.child_token();
        let progress = Notify::new();

        let last = {
            let mut guard = RunGuard(self.inner.lock().await);
            guard.0.runtime.conversation.push(Message::user(prompt));

            let watchdog = async {
                loop {
                    tokio::select! {
                        () = progress.notified() => {}
                        () = tokio::time::sleep(timeout) => break,
                    }
                }
            };

            let mut sink = Sink::Channel {
                tx: &tx,
                progress: &progress,
                stop: &stop,
            };
            let drive = self.drive(&mut guard.0, &mut sink);
            tokio::pin!(drive);

            let interrupted = tokio::select! {
                outcome = &mut drive => Ok(outcome),
                () = watchdog => Err(AgentError::Timeout(timeout)),
                () = cancel.cancelled() => Err(AgentError::Cancelled),
            };

            match interrupted {
                Ok(outcome) => self.settle_stream(outcome),
                Err(e) => {
                    // Report now, then let the step in flight finish before cleanup.
                    stop.cancel();
                    self.state.set(AgentState::Error);
                    tracing::error!(error = %e, "Error running agent");
                    let _ = tx.send(RunEvent::failed(&e)).await;

                    if let Err(late) = drive.await {
                        tracing::warn!(error = %late, "Step failed after the run was stopped");
                    }
                    None
                }
            }
        };

        if let Some(event) = last {
            let _ = tx.send(event).await;
        }
    }

    /// Settle the state of a loop that ended by itself and pick its closing event.
    fn settle_stream(&self, outcome: Result<LoopEnd>) -> Option<RunEvent> {
        let err = match outcome {
            Ok(LoopEnd::Completed) => return Some(RunEvent::Completed),
            Ok(LoopEnd::ConsumerGone) => {
                let _ = self
                    .state
                    .transition(AgentState::Running, AgentState::Finished);
                tracing::info!("Stream consumer went away, run stopped");
                return None;
            }
            // Only a cancelled token can stop the loop before the select sees it
            Ok(LoopEnd::Stopped) => AgentError::Cancelled,
            Err(e) => e,
        };

        self.state.set(AgentState::Error);
        tracing::error!(error = %err, "Error running agent");
        Some(RunEvent::failed(&err))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map_or_else(|| "step panicked".into(), |msg| format!("step panicked: {msg}"))
}

/// Handle to a streaming run
pub struct RunStream {
    events: ReceiverStream<RunEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RunStream {
    fn new(
        rx: mpsc::Receiver<RunEvent>,
        cancel: CancellationToken,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            events: ReceiverStream::new(rx),
            cancel,
            task,
        }
    }

    /// Stop the run. The stream ends with a cancellation failure event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the run was rejected before it started
    pub const fn was_rejected(&self) -> bool {
        self.task.is_none()
    }

    /// Drain the stream into its log lines.
    pub async fn collect_lines(mut self) -> Vec<String> {
        use futures::StreamExt;

        let mut lines = Vec::new();
        while let Some(event) = self.next().await {
            if let Some(line) = event.line() {
                lines.push(line.to_string());
            }
        }
        lines
    }
}

impl Stream for RunStream {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}
