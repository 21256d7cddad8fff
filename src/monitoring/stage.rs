//! Scoped timing for pipeline stages
//!
//! A [`StageSpan`] enters a tracing span on creation and reports the stage
//! when dropped, so every exit path (including `?` and panics) emits
//! exactly one completion record.

use super::metrics::PipelineMetrics;
use crate::error::PipelineError;
use std::time::Instant;
use tracing::{error, info, span::EnteredSpan, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failure,
}

impl StageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Success => "success",
            StageOutcome::Failure => "failure",
        }
    }
}

pub struct StageSpan<'a> {
    stage: &'static str,
    start: Instant,
    outcome: Option<StageOutcome>,
    metrics: Option<&'a PipelineMetrics>,
    _entered: EnteredSpan,
}

impl<'a> StageSpan<'a> {
    pub fn enter(stage: &'static str, metrics: Option<&'a PipelineMetrics>) -> Self {
        let entered = tracing::span!(Level::INFO, "stage", name = stage).entered();
        info!(stage, ">>>>>> stage started <<<<<<");
        Self {
            stage,
            start: Instant::now(),
            outcome: None,
            metrics,
            _entered: entered,
        }
    }

    pub fn succeed(mut self) {
        self.outcome = Some(StageOutcome::Success);
    }

    /// Log the error with its code; the span still closes on drop
    pub fn fail(mut self, err: &PipelineError) {
        error!(stage = self.stage, code = err.code(), error = %err, "Stage failed");
        self.outcome = Some(StageOutcome::Failure);
    }

    /// Close with the outcome of `result`
    pub fn finish<T>(self, result: &Result<T, PipelineError>) {
        match result {
            Ok(_) => self.succeed(),
            Err(e) => self.fail(e),
        }
    }
}

impl Drop for StageSpan<'_> {
    fn drop(&mut self) {
        // No explicit outcome means the stage unwound or returned early
        let outcome = self.outcome.unwrap_or(StageOutcome::Failure);
        let elapsed = self.start.elapsed();
        info!(
            stage = self.stage,
            duration_ms = elapsed.as_millis() as u64,
            outcome = outcome.as_str(),
            "<<<<<< stage finished >>>>>>"
        );
        if let Some(metrics) = self.metrics {
            metrics.record_stage(self.stage, outcome == StageOutcome::Success, elapsed.as_secs_f64());
        }
    }
}
