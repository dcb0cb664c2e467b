//! Bounded-wait reconciliation for asynchronously provisioned resources
//!
//! After a creation request the backend hands out an identifier while the
//! resource is still being built. [`Reconciler`] polls a caller-supplied
//! [`StatusFetch`] at a fixed interval until the resource reaches a terminal
//! status, the deadline passes, or the caller cancels.
//!
//! Each iteration runs in this order:
//!
//! ```text
//! sleep(interval) -> cancelled? -> fetch -> classify -> deadline reached? -> repeat
//! ```
//!
//! Classification happens before the deadline check, so a fetch that lands
//! after the deadline but reports `online` is still a success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default total wait for a resource to become ready
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Default delay between status queries
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

const READY_STATUS: &str = "online";
const FAILED_STATUS: &str = "error";

/// Backend-assigned identifier of a resource being provisioned
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProvisioningHandle(String);

impl ProvisioningHandle {
    pub fn new(id: impl Into<String>) -> Result<Self, ReconcileError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ReconcileError::InvalidHandle);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProvisioningHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProvisioningHandle {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProvisioningHandle> for String {
    fn from(handle: ProvisioningHandle) -> Self {
        handle.0
    }
}

/// Lifecycle class of a backend status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningStatus {
    /// Anything that is not a recognized terminal status
    Pending(String),
    Ready,
    Failed,
}

impl ProvisioningStatus {
    /// Classify a raw status. Matching is exact and case-sensitive.
    pub fn classify(status: &str) -> Self {
        match status {
            READY_STATUS => ProvisioningStatus::Ready,
            FAILED_STATUS => ProvisioningStatus::Failed,
            other => ProvisioningStatus::Pending(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProvisioningStatus::Pending(_))
    }
}

/// One observation returned by a status query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub status: String,
    pub addresses: Vec<String>,
    pub floating_ip_requested: Option<bool>,
}

impl StatusReport {
    pub fn new(status: impl Into<String>, addresses: Vec<String>) -> Self {
        Self {
            status: status.into(),
            addresses,
            floating_ip_requested: None,
        }
    }

    pub fn with_floating_ip(mut self, requested: bool) -> Self {
        self.floating_ip_requested = Some(requested);
        self
    }
}

/// Attributes of a resource that reached the ready state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningResult {
    pub status: String,
    pub addresses: Vec<String>,
    pub floating_ip_requested: Option<bool>,
}

impl From<StatusReport> for ProvisioningResult {
    fn from(report: StatusReport) -> Self {
        Self {
            status: report.status,
            addresses: report.addresses,
            floating_ip_requested: report.floating_ip_requested,
        }
    }
}

/// Timing for a single reconciliation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Maximum wall-clock time measured from the start of the loop
    pub deadline: Duration,

    /// Delay before every status query, including the first
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Failure reported by a [`StatusFetch`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("resource not found")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

/// Outcome of a reconciliation that did not end in the ready state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Provisioning handle must not be empty")]
    InvalidHandle,

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("Resource '{handle}' not found")]
    NotFound { handle: String },

    #[error("Resource '{handle}' is in an error state")]
    ProvisionFailed { handle: String },

    #[error("Timed out after {elapsed:?} waiting for '{handle}' to become online")]
    Timeout { handle: String, elapsed: Duration },

    #[error("Error fetching status of '{handle}': {cause}")]
    TransientFetchFailure { handle: String, cause: String },
}

/// A single status query against the backend
///
/// Implementations must be safe to call repeatedly; the reconciler never
/// retries a failed call on its own.
#[async_trait]
pub trait StatusFetch: Send + Sync {
    async fn fetch(&self, handle: &ProvisioningHandle) -> Result<StatusReport, FetchError>;
}

/// Time source used by the reconciler
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Position of a reconciliation in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileState {
    Pending { attempts: u32 },
    Ready(ProvisioningResult),
    Failed,
    TimedOut { attempts: u32 },
    Cancelled,
}

impl ReconcileState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReconcileState::Pending { .. })
    }
}

/// Polls a [`StatusFetch`] until the resource settles
pub struct Reconciler<C = TokioClock> {
    config: PollConfig,
    clock: C,
}

impl Reconciler<TokioClock> {
    pub fn new(config: PollConfig) -> Self {
        Self::with_clock(config, TokioClock)
    }
}

impl<C: Clock> Reconciler<C> {
    pub fn with_clock(config: PollConfig, clock: C) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Drive the state machine to a terminal state.
    ///
    /// Fetch errors end the loop immediately; retrying the whole call is up
    /// to the caller.
    pub async fn reconcile<F>(
        &self,
        handle: &ProvisioningHandle,
        fetch: &F,
        cancel: &CancellationToken,
    ) -> Result<ProvisioningResult, ReconcileError>
    where
        F: StatusFetch + ?Sized,
    {
        let started = self.clock.now();
        // None when the deadline lies beyond what Instant can represent
        let deadline_at = started.checked_add(self.config.deadline);
        let mut state = ReconcileState::Pending { attempts: 0 };

        tracing::debug!(
            handle = %handle,
            deadline = ?self.config.deadline,
            interval = ?self.config.interval,
            "Waiting for resource to become online"
        );

        while let ReconcileState::Pending { attempts } = state {
            state = self
                .advance(handle, fetch, cancel, attempts, deadline_at)
                .await?;
        }

        match state {
            ReconcileState::Ready(result) => {
                tracing::info!(handle = %handle, addresses = ?result.addresses, "Resource is online");
                Ok(result)
            }
            ReconcileState::Failed => Err(ReconcileError::ProvisionFailed {
                handle: handle.to_string(),
            }),
            ReconcileState::TimedOut { attempts } => {
                let elapsed = self.clock.now().saturating_duration_since(started);
                tracing::warn!(handle = %handle, attempts, ?elapsed, "Timed out waiting for resource");
                Err(ReconcileError::Timeout {
                    handle: handle.to_string(),
                    elapsed,
                })
            }
            ReconcileState::Cancelled => {
                tracing::info!(handle = %handle, "Reconciliation cancelled");
                Err(ReconcileError::Cancelled)
            }
            ReconcileState::Pending { .. } => unreachable!("loop exits only on terminal state"),
        }
    }

    /// Run one iteration: wait, check cancellation, fetch, classify, check deadline.
    async fn advance<F>(
        &self,
        handle: &ProvisioningHandle,
        fetch: &F,
        cancel: &CancellationToken,
        attempts: u32,
        deadline_at: Option<Instant>,
    ) -> Result<ReconcileState, ReconcileError>
    where
        F: StatusFetch + ?Sized,
    {
        // A cancellation during the wait only shortens it; the check below decides.
        tokio::select! {
            _ = self.clock.sleep(self.config.interval) => {}
            _ = cancel.cancelled() => {}
        }

        if cancel.is_cancelled() {
            return Ok(ReconcileState::Cancelled);
        }

        let attempt = attempts + 1;
        let report = fetch.fetch(handle).await.map_err(|e| match e {
            FetchError::NotFound => ReconcileError::NotFound {
                handle: handle.to_string(),
            },
            FetchError::Other(cause) => ReconcileError::TransientFetchFailure {
                handle: handle.to_string(),
                cause,
            },
        })?;

        tracing::debug!(handle = %handle, attempt, status = %report.status, "Polled resource status");

        match ProvisioningStatus::classify(&report.status) {
            ProvisioningStatus::Ready => return Ok(ReconcileState::Ready(report.into())),
            ProvisioningStatus::Failed => return Ok(ReconcileState::Failed),
            ProvisioningStatus::Pending(_) => {}
        }

        if deadline_at.is_some_and(|at| self.clock.now() >= at) {
            return Ok(ReconcileState::TimedOut { attempts: attempt });
        }

        Ok(ReconcileState::Pending { attempts: attempt })
    }
}

/// Reconcile with the wall clock.
pub async fn reconcile<F>(
    handle: &ProvisioningHandle,
    fetch: &F,
    config: PollConfig,
    cancel: &CancellationToken,
) -> Result<ProvisioningResult, ReconcileError>
where
    F: StatusFetch + ?Sized,
{
    Reconciler::new(config).reconcile(handle, fetch, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INTERVAL: Duration = Duration::from_secs(10);

    /// Virtual time that only moves when slept on or advanced explicitly
    struct ManualClock {
        origin: Instant,
        elapsed: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                origin: Instant::now(),
                elapsed: Mutex::new(Duration::ZERO),
            })
        }

        fn advance(&self, by: Duration) {
            *self.elapsed.lock().unwrap() += by;
        }

        fn elapsed(&self) -> Duration {
            *self.elapsed.lock().unwrap()
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        async fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    enum Reply {
        Status(&'static str, Vec<&'static str>),
        NotFound,
        Broken(&'static str),
    }

    struct Step {
        reply: Reply,
        latency: Duration,
    }

    /// Replays a fixed script; once exhausted it keeps reporting "provisioning".
    struct ScriptedFetch {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        clock: Arc<ManualClock>,
        cancel_on_call: Option<(usize, CancellationToken)>,
    }

    impl ScriptedFetch {
        fn new(clock: &Arc<ManualClock>, replies: Vec<Reply>) -> Self {
            let steps = replies
                .into_iter()
                .map(|reply| Step {
                    reply,
                    latency: Duration::ZERO,
                })
                .collect();
            Self {
                steps: Mutex::new(steps),
                calls: AtomicUsize::new(0),
                clock: Arc::clone(clock),
                cancel_on_call: None,
            }
        }

        fn with_steps(clock: &Arc<ManualClock>, steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
                clock: Arc::clone(clock),
                cancel_on_call: None,
            }
        }

        fn cancelling_on(mut self, call: usize, token: CancellationToken) -> Self {
            self.cancel_on_call = Some((call, token));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusFetch for ScriptedFetch {
        async fn fetch(&self, _handle: &ProvisioningHandle) -> Result<StatusReport, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((on, token)) = &self.cancel_on_call {
                if *on == call {
                    token.cancel();
                }
            }

            let step = self.steps.lock().unwrap().pop_front();
            let Some(step) = step else {
                return Ok(StatusReport::new("provisioning", Vec::new()));
            };
            self.clock.advance(step.latency);

            match step.reply {
                Reply::Status(status, addresses) => Ok(StatusReport::new(
                    status,
                    addresses.into_iter().map(String::from).collect(),
                )),
                Reply::NotFound => Err(FetchError::NotFound),
                Reply::Broken(cause) => Err(FetchError::Other(cause.to_string())),
            }
        }
    }

    fn handle() -> ProvisioningHandle {
        ProvisioningHandle::new("web-01").unwrap()
    }

    fn config(deadline: Duration) -> PollConfig {
        PollConfig {
            deadline,
            interval: INTERVAL,
        }
    }

    async fn run(
        clock: &Arc<ManualClock>,
        fetch: &ScriptedFetch,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProvisioningResult, ReconcileError> {
        Reconciler::with_clock(config(deadline), Arc::clone(clock))
            .reconcile(&handle(), fetch, cancel)
            .await
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::new(&clock, vec![Reply::Status("online", vec!["10.0.0.5"])]);

        let result = run(&clock, &fetch, DEFAULT_DEADLINE, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, "online");
        assert_eq!(result.addresses, vec!["10.0.0.5".to_string()]);
        assert_eq!(fetch.calls(), 1);
        // the first query waits a full interval
        assert_eq!(clock.elapsed(), INTERVAL);
    }

    #[tokio::test]
    async fn test_pending_then_success() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::new(
            &clock,
            vec![
                Reply::Status("provisioning", vec![]),
                Reply::Status("provisioning", vec![]),
                Reply::Status("online", vec!["10.0.0.5", "203.0.113.7"]),
            ],
        );

        let result = run(&clock, &fetch, DEFAULT_DEADLINE, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fetch.calls(), 3);
        assert_eq!(clock.elapsed(), INTERVAL * 3);
        assert_eq!(
            result.addresses,
            vec!["10.0.0.5".to_string(), "203.0.113.7".to_string()]
        );
    }

    #[tokio::test]
    async fn test_error_status_is_terminal() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::new(
            &clock,
            vec![
                Reply::Status("provisioning", vec![]),
                Reply::Status("error", vec![]),
                Reply::Status("online", vec!["10.0.0.5"]),
            ],
        );

        let err = run(&clock, &fetch, DEFAULT_DEADLINE, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReconcileError::ProvisionFailed {
                handle: "web-01".to_string()
            }
        );
        assert_eq!(fetch.calls(), 2);
    }

    #[tokio::test]
    async fn test_timeout_after_two_attempts() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::new(&clock, vec![]);

        let err = run(&clock, &fetch, INTERVAL * 2, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReconcileError::Timeout {
                handle: "web-01".to_string(),
                elapsed: INTERVAL * 2,
            }
        );
        assert_eq!(fetch.calls(), 2);
        assert!(err.to_string().contains("web-01"));
    }

    #[tokio::test]
    async fn test_ready_wins_over_elapsed_deadline() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::with_steps(
            &clock,
            vec![
                Step {
                    reply: Reply::Status("provisioning", vec![]),
                    latency: Duration::ZERO,
                },
                Step {
                    reply: Reply::Status("online", vec!["10.0.0.5"]),
                    latency: Duration::from_secs(30),
                },
            ],
        );

        let result = run(&clock, &fetch, INTERVAL * 2, &CancellationToken::new()).await;

        assert_eq!(result.unwrap().addresses, vec!["10.0.0.5".to_string()]);
        assert_eq!(fetch.calls(), 2);
        assert!(clock.elapsed() > INTERVAL * 2);
    }

    #[tokio::test]
    async fn test_slow_pending_fetch_times_out() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::with_steps(
            &clock,
            vec![Step {
                reply: Reply::Status("provisioning", vec![]),
                latency: Duration::from_secs(25),
            }],
        );

        let err = run(&clock, &fetch, INTERVAL * 2, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Timeout { .. }));
        assert_eq!(fetch.calls(), 1);
    }

    #[tokio::test]
    async fn test_not_found_short_circuits() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::new(&clock, vec![Reply::NotFound]);

        let err = run(&clock, &fetch, Duration::from_secs(3600), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReconcileError::NotFound {
                handle: "web-01".to_string()
            }
        );
        assert_eq!(fetch.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_retried() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::new(
            &clock,
            vec![
                Reply::Status("provisioning", vec![]),
                Reply::Broken("503 Service Unavailable"),
                Reply::Status("online", vec!["10.0.0.5"]),
            ],
        );

        let err = run(&clock, &fetch, DEFAULT_DEADLINE, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ReconcileError::TransientFetchFailure { handle, cause } => {
                assert_eq!(handle, "web-01");
                assert_eq!(cause, "503 Service Unavailable");
            }
            other => panic!("expected TransientFetchFailure, got {other:?}"),
        }
        assert_eq!(fetch.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_fetch() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::new(&clock, vec![Reply::Status("online", vec!["10.0.0.5"])]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run(&clock, &fetch, DEFAULT_DEADLINE, &cancel).await.unwrap_err();

        assert_eq!(err, ReconcileError::Cancelled);
        assert_eq!(fetch.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_fetch_stops_next_iteration() {
        let clock = ManualClock::new();
        let cancel = CancellationToken::new();
        // the in-flight fetch completes; the following iteration sees the cancellation
        let fetch = ScriptedFetch::new(
            &clock,
            vec![
                Reply::Status("provisioning", vec![]),
                Reply::Status("provisioning", vec![]),
                Reply::Status("online", vec!["10.0.0.5"]),
            ],
        )
        .cancelling_on(2, cancel.clone());

        let err = run(&clock, &fetch, DEFAULT_DEADLINE, &cancel).await.unwrap_err();

        assert_eq!(err, ReconcileError::Cancelled);
        assert_eq!(fetch.calls(), 2);
    }

    #[tokio::test]
    async fn test_near_miss_statuses_keep_polling() {
        let clock = ManualClock::new();
        let fetch = ScriptedFetch::new(
            &clock,
            vec![
                Reply::Status("Online", vec![]),
                Reply::Status("ERROR", vec![]),
                Reply::Status("online ", vec![]),
                Reply::Status("errored", vec![]),
                Reply::Status("online", vec!["10.0.0.5"]),
            ],
        );

        let result = run(&clock, &fetch, DEFAULT_DEADLINE, &CancellationToken::new()).await;

        assert!(result.is_ok());
        assert_eq!(fetch.calls(), 5);
    }

    #[tokio::test]
    async fn test_unbounded_deadline_keeps_polling() {
        for deadline in [Duration::MAX, Duration::from_secs(u64::MAX)] {
            let clock = ManualClock::new();
            let fetch = ScriptedFetch::new(
                &clock,
                vec![
                    Reply::Status("provisioning", vec![]),
                    Reply::Status("provisioning", vec![]),
                    Reply::Status("online", vec!["10.0.0.5"]),
                ],
            );

            let result = run(&clock, &fetch, deadline, &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(result.status, "online");
            assert_eq!(fetch.calls(), 3);
        }
    }

    #[test]
    fn test_classify_is_exact() {
        assert_eq!(ProvisioningStatus::classify("online"), ProvisioningStatus::Ready);
        assert_eq!(ProvisioningStatus::classify("error"), ProvisioningStatus::Failed);
        for raw in ["", "Online", "ONLINE", " online", "Error", "error!", "building", "offline"] {
            let status = ProvisioningStatus::classify(raw);
            assert_eq!(status, ProvisioningStatus::Pending(raw.to_string()));
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn test_empty_handle_rejected() {
        assert_eq!(
            ProvisioningHandle::new("").unwrap_err(),
            ReconcileError::InvalidHandle
        );
        assert!(serde_json::from_str::<ProvisioningHandle>("\"\"").is_err());
        let handle: ProvisioningHandle = serde_json::from_str("\"web-01\"").unwrap();
        assert_eq!(handle.as_str(), "web-01");
    }

    #[test]
    fn test_floating_ip_flag_carried_into_result() {
        let report = StatusReport::new("online", vec!["10.0.0.5".to_string()]).with_floating_ip(true);
        let result = ProvisioningResult::from(report);
        assert_eq!(result.floating_ip_requested, Some(true));
    }
}
