//! First-success-wins runner
//!
//! Resolution strategies, payload variants and association probes are all
//! ordered lists of `Attempt`s. The runner walks the list strictly in
//! order, stops at the first hit, and keeps a log of everything it tried
//! so callers can report attempt counts and the last failure.

use crate::error::CrmError;
use async_trait::async_trait;

/// One candidate step in an ordered fallback chain.
///
/// `Ok(Some(_))` is a hit and ends the chain. `Ok(None)` means the step
/// ran but found nothing (e.g. a listing endpoint that is not enabled).
/// `Err(_)` is a failure; the chain continues either way.
#[async_trait]
pub trait Attempt<C: Sync>: Send + Sync {
    type Output: Send;

    /// Short description for diagnostics (endpoint, variant name)
    fn label(&self) -> String;

    async fn attempt(&self, ctx: &C) -> Result<Option<Self::Output>, CrmError>;
}

#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Hit,
    Miss,
    Failed(CrmError),
}

#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub label: String,
    pub outcome: AttemptOutcome,
}

/// What a runner tried, in order.
#[derive(Debug, Clone, Default)]
pub struct AttemptLog {
    pub records: Vec<AttemptRecord>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, outcome: AttemptOutcome) {
        self.records.push(AttemptRecord {
            label: label.into(),
            outcome,
        });
    }

    /// Append another log's records after this one's.
    pub fn extend(&mut self, other: AttemptLog) {
        self.records.extend(other.records);
    }

    pub fn attempts(&self) -> usize {
        self.records.len()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.label.as_str()).collect()
    }

    /// The most recent failure, if any attempt failed.
    pub fn last_error(&self) -> Option<&CrmError> {
        self.records.iter().rev().find_map(|r| match &r.outcome {
            AttemptOutcome::Failed(e) => Some(e),
            _ => None,
        })
    }

    /// Message of the last failure, or a note that every attempt came up empty.
    pub fn last_error_message(&self) -> String {
        match self.last_error() {
            Some(e) => e.to_string(),
            None if self.records.is_empty() => "no attempts were made".to_string(),
            None => "every attempt returned no match".to_string(),
        }
    }
}

/// Run `attempts` in order and return the first hit.
///
/// On exhaustion the log is returned as the error so the caller can build
/// its own typed failure from it.
pub async fn first_success<C, T>(
    attempts: &[Box<dyn Attempt<C, Output = T>>],
    ctx: &C,
) -> Result<(T, AttemptLog), AttemptLog>
where
    C: Sync,
    T: Send,
{
    let mut log = AttemptLog::new();

    for step in attempts {
        let label = step.label();
        match step.attempt(ctx).await {
            Ok(Some(value)) => {
                tracing::debug!(attempt = %label, "attempt succeeded");
                log.push(label, AttemptOutcome::Hit);
                return Ok((value, log));
            }
            Ok(None) => {
                tracing::debug!(attempt = %label, "attempt found nothing");
                log.push(label, AttemptOutcome::Miss);
            }
            Err(e) => {
                tracing::debug!(attempt = %label, error = %e, "attempt failed");
                log.push(label, AttemptOutcome::Failed(e));
            }
        }
    }

    Err(log)
}
