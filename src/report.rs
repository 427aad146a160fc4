use std::time::Instant;

use serde::Serialize;

use crate::domain::{CompoundRecord, ProviderKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial { failed_units: usize },
    Failed { reason: String },
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderReport {
    pub provider: ProviderKind,
    pub outcome: Outcome,
    pub records: usize,
    pub elapsed_ms: u64,
}

impl ProviderReport {
    pub fn log(&self) {
        match &self.outcome {
            Outcome::Success | Outcome::Skipped => tracing::info!(
                provider = %self.provider,
                records = self.records,
                elapsed_ms = self.elapsed_ms,
                outcome = ?self.outcome,
                "provider finished"
            ),
            Outcome::Partial { failed_units } => tracing::warn!(
                provider = %self.provider,
                records = self.records,
                elapsed_ms = self.elapsed_ms,
                failed_units,
                "provider finished with dropped units"
            ),
            Outcome::Failed { reason } => tracing::warn!(
                provider = %self.provider,
                elapsed_ms = self.elapsed_ms,
                reason = %reason,
                "provider failed"
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub records: Vec<CompoundRecord>,
    pub report: ProviderReport,
}

impl ProviderResponse {
    pub fn skipped(provider: ProviderKind) -> Self {
        Self {
            records: Vec::new(),
            report: ProviderReport {
                provider,
                outcome: Outcome::Skipped,
                records: 0,
                elapsed_ms: 0,
            },
        }
    }

    pub fn failed(provider: ProviderKind, reason: impl Into<String>, started: Instant) -> Self {
        Self {
            records: Vec::new(),
            report: ProviderReport {
                provider,
                outcome: Outcome::Failed {
                    reason: reason.into(),
                },
                records: 0,
                elapsed_ms: elapsed_ms(started),
            },
        }
    }

    pub fn completed(
        provider: ProviderKind,
        records: Vec<CompoundRecord>,
        failed_units: usize,
        started: Instant,
    ) -> Self {
        let outcome = if failed_units == 0 {
            Outcome::Success
        } else {
            Outcome::Partial { failed_units }
        };
        Self {
            report: ProviderReport {
                provider,
                outcome,
                records: records.len(),
                elapsed_ms: elapsed_ms(started),
            },
            records,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
