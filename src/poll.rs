use std::future::Future;
use std::time::Duration;

use crate::error::HubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    Ready(T),
    Pending,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollState<T> {
    Pending { attempts: u32 },
    Ready(T),
    Exhausted,
}

impl<T> PollState<T> {
    pub fn start() -> Self {
        PollState::Pending { attempts: 0 }
    }

    pub fn advance(self, policy: &PollPolicy, probe: Probe<T>) -> Self {
        match self {
            PollState::Pending { attempts } => {
                let attempts = attempts + 1;
                match probe {
                    Probe::Ready(value) => PollState::Ready(value),
                    Probe::Pending | Probe::Failed(_) if attempts >= policy.max_attempts => {
                        PollState::Exhausted
                    }
                    Probe::Pending | Probe::Failed(_) => PollState::Pending { attempts },
                }
            }
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Pending { .. })
    }
}

/// Repeats `attempt` until `is_ready` extracts a value or the policy runs out,
/// sleeping `policy.interval()` between attempts. Failed attempts consume
/// budget like pending ones.
pub async fn poll_until_ready<R, T, F, Fut, P>(
    policy: &PollPolicy,
    mut attempt: F,
    is_ready: P,
) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<R, HubError>>,
    P: Fn(R) -> Option<T>,
{
    let mut state = PollState::start();
    while let PollState::Pending { attempts } = state {
        let probe = match attempt(attempts + 1).await {
            Ok(response) => match is_ready(response) {
                Some(value) => Probe::Ready(value),
                None => Probe::Pending,
            },
            Err(err) => {
                tracing::debug!(attempt = attempts + 1, error = %err, "poll attempt failed");
                Probe::Failed(err.to_string())
            }
        };
        state = state.advance(policy, probe);
        if !state.is_terminal() {
            tokio::time::sleep(policy.interval).await;
        }
    }

    match state {
        PollState::Ready(value) => Some(value),
        PollState::Pending { .. } | PollState::Exhausted => None,
    }
}
