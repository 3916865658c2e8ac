//! Execution-status poller.
//!
//! Drives `Running -> {Succeeded | Failed | Cancelled}` with a fixed delay
//! between checks. The loop is bounded by the attempt cap and the wall-clock
//! budget of the [`PollPolicy`]; a successful run yields a [`SucceededQuery`],
//! the only value the result materializer accepts.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, PollPolicy};
use crate::data::ExecutionStatus;
use crate::errors::PipelineError;
use crate::transport::QueryEngine;
use crate::types::QueryHandle;

/// Proof that the engine reported `SUCCEEDED` for a handle.
///
/// Only [`StatusPoller`] constructs this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SucceededQuery {
    handle: QueryHandle,
    attempts: usize,
    elapsed: Duration,
}

impl SucceededQuery {
    pub fn handle(&self) -> &QueryHandle {
        &self.handle
    }

    /// Status checks issued, the successful one included.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Polls a query handle until it reaches a terminal state or a limit.
pub struct StatusPoller {
    policy: PollPolicy,
}

impl StatusPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    /// Block until `handle` succeeds, fails, or a poll limit is hit.
    pub fn wait(
        &self,
        engine: &dyn QueryEngine,
        handle: QueryHandle,
    ) -> Result<SucceededQuery, PipelineError> {
        let started = Instant::now();
        let mut attempts = 0usize;
        loop {
            let status = engine.status(&handle)?;
            attempts += 1;
            match status {
                ExecutionStatus::Succeeded => {
                    let elapsed = started.elapsed();
                    info!(
                        "[diabetes-lake:poll] {handle} succeeded after {attempts} checks ({:.1}s)",
                        elapsed.as_secs_f64()
                    );
                    return Ok(SucceededQuery {
                        handle,
                        attempts,
                        elapsed,
                    });
                }
                ExecutionStatus::Running => {
                    debug!("[diabetes-lake:poll] {handle} still running (check {attempts})");
                }
                ExecutionStatus::Failed(_) | ExecutionStatus::Cancelled(_) => {
                    let reason = status.reason().unwrap_or("no reason given").to_string();
                    warn!(
                        "[diabetes-lake:poll] {handle} finished as {}: {reason}",
                        status.state()
                    );
                    if self.policy.on_failure == FailurePolicy::Stop {
                        return Err(PipelineError::ExecutionFailure {
                            handle,
                            state: status.state(),
                            reason,
                        });
                    }
                }
            }

            let elapsed = started.elapsed();
            let attempts_exhausted = self
                .policy
                .max_attempts
                .is_some_and(|max| attempts >= max);
            let time_exhausted = self
                .policy
                .timeout
                .is_some_and(|timeout| elapsed + self.policy.interval > timeout);
            if attempts_exhausted || time_exhausted {
                return Err(PipelineError::Timeout {
                    handle,
                    attempts,
                    elapsed,
                });
            }
            thread::sleep(self.policy.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ExecutionState;
    use crate::transport::memory::ScriptedQueryEngine;

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: Some(20),
            timeout: None,
            on_failure: FailurePolicy::Stop,
        }
    }

    #[test]
    fn running_running_succeeded_takes_three_checks() {
        let engine = ScriptedQueryEngine::new("q").with_statuses(vec![
            ExecutionStatus::Running,
            ExecutionStatus::Running,
            ExecutionStatus::Succeeded,
        ]);
        let done = StatusPoller::new(fast_policy())
            .wait(&engine, engine.handle().clone())
            .unwrap();
        assert_eq!(done.attempts(), 3);
        assert_eq!(engine.status_checks(), 3);
        assert_eq!(done.handle().as_str(), "q");
    }

    #[test]
    fn failure_stops_immediately_under_stop_policy() {
        let engine = ScriptedQueryEngine::new("q")
            .with_statuses(vec![ExecutionStatus::Failed(Some("table not found".into()))]);
        let err = StatusPoller::new(fast_policy())
            .wait(&engine, engine.handle().clone())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExecutionFailure { state: ExecutionState::Failed, ref reason, .. }
                if reason == "table not found"
        ));
        assert_eq!(engine.status_checks(), 1);
    }

    #[test]
    fn keep_polling_runs_until_the_attempt_cap() {
        let engine =
            ScriptedQueryEngine::new("q").with_statuses(vec![ExecutionStatus::Cancelled(None)]);
        let policy = PollPolicy {
            max_attempts: Some(4),
            on_failure: FailurePolicy::KeepPolling,
            ..fast_policy()
        };
        let err = StatusPoller::new(policy)
            .wait(&engine, engine.handle().clone())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { attempts: 4, .. }));
        assert_eq!(engine.status_checks(), 4);
    }

    #[test]
    fn keep_polling_recovers_if_engine_later_succeeds() {
        let engine = ScriptedQueryEngine::new("q").with_statuses(vec![
            ExecutionStatus::Failed(None),
            ExecutionStatus::Succeeded,
        ]);
        let policy = PollPolicy {
            on_failure: FailurePolicy::KeepPolling,
            ..fast_policy()
        };
        let done = StatusPoller::new(policy)
            .wait(&engine, engine.handle().clone())
            .unwrap();
        assert_eq!(done.attempts(), 2);
    }

    #[test]
    fn wall_clock_budget_produces_timeout() {
        let engine = ScriptedQueryEngine::new("q").with_statuses(vec![ExecutionStatus::Running]);
        let policy = PollPolicy {
            interval: Duration::from_millis(5),
            max_attempts: None,
            timeout: Some(Duration::from_millis(20)),
            on_failure: FailurePolicy::Stop,
        };
        let err = StatusPoller::new(policy)
            .wait(&engine, engine.handle().clone())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { .. }));
        assert!(engine.status_checks() >= 1);
    }

    #[test]
    fn success_on_first_check_does_not_sleep() {
        let engine = ScriptedQueryEngine::new("q");
        let policy = PollPolicy {
            interval: Duration::from_secs(60),
            ..fast_policy()
        };
        let done = StatusPoller::new(policy)
            .wait(&engine, engine.handle().clone())
            .unwrap();
        assert_eq!(done.attempts(), 1);
        assert!(done.elapsed() < Duration::from_secs(60));
    }
}
