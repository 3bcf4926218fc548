//! Playback and teardown reports.

use std::fmt;

use crate::RenderError;

/// One step of session teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownStep {
    /// Stopping the render stream.
    Stop,
    /// Releasing the audio client.
    ReleaseClient,
    /// Releasing the render-buffer handle.
    ReleaseRenderBuffer,
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stop => "stop",
            Self::ReleaseClient => "release client",
            Self::ReleaseRenderBuffer => "release render buffer",
        };
        f.write_str(name)
    }
}

/// A teardown step that failed and was suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    /// The step that failed.
    pub step: TeardownStep,
    /// The backend's error message.
    pub error: String,
}

/// Result of a best-effort session teardown.
///
/// Teardown never fails; failures of individual steps are collected here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Steps that failed, in the order they ran.
    pub suppressed: Vec<TeardownFailure>,
}

impl TeardownReport {
    /// Records a failed step.
    ///
    /// A failure after device loss is expected and only logged at debug.
    pub fn record(&mut self, step: TeardownStep, error: &RenderError) {
        if error.is_device_lost() {
            tracing::debug!(%step, "teardown step failed after device loss: {}", error);
        } else {
            tracing::warn!(%step, "teardown step failed: {}", error);
        }
        self.suppressed.push(TeardownFailure {
            step,
            error: error.to_string(),
        });
    }

    /// Returns `true` if every step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.suppressed.is_empty()
    }
}

/// Why the streaming loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackOutcome {
    /// Every byte of the source was committed.
    Completed,
    /// The user asked to quit.
    Quit,
    /// The sink went away mid-stream.
    DeviceLost,
    /// The source ran dry before its declared length.
    SourceTruncated,
}

impl fmt::Display for PlaybackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::Quit => "quit",
            Self::DeviceLost => "device lost",
            Self::SourceTruncated => "source truncated",
        };
        f.write_str(name)
    }
}

/// Summary of one playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Why the streaming loop ended.
    pub outcome: PlaybackOutcome,
    /// Sample-data bytes read from the source and committed.
    pub bytes_consumed: u64,
    /// Declared sample-data length of the source.
    pub total_bytes: u64,
    /// Lease/commit cycles that advanced playback.
    pub cycles: u64,
    /// Iterations skipped because the sink already held a full chunk.
    pub skipped_iterations: u64,
    /// Leases refused as transiently unavailable.
    pub buffer_retries: u64,
    /// Number of times playback was paused.
    pub pauses: u64,
    /// Whether the sink was drained before teardown.
    pub drained: bool,
    /// Suppressed teardown failures.
    pub teardown: TeardownReport,
}

impl PlaybackReport {
    /// Fraction of the source that was committed, in `0.0..=1.0`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            self.bytes_consumed as f64 / self.total_bytes as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_report_records_in_order() {
        let mut report = TeardownReport::default();
        assert!(report.is_clean());

        report.record(TeardownStep::Stop, &RenderError::Backend("boom".into()));
        report.record(
            TeardownStep::ReleaseClient,
            &RenderError::device_lost("gone"),
        );

        assert!(!report.is_clean());
        assert_eq!(report.suppressed[0].step, TeardownStep::Stop);
        assert_eq!(report.suppressed[0].error, "audio backend error: boom");
        assert_eq!(report.suppressed[1].step, TeardownStep::ReleaseClient);
    }

    #[test]
    fn test_progress() {
        let mut report = PlaybackReport {
            outcome: PlaybackOutcome::Quit,
            bytes_consumed: 50,
            total_bytes: 200,
            cycles: 1,
            skipped_iterations: 0,
            buffer_retries: 0,
            pauses: 0,
            drained: true,
            teardown: TeardownReport::default(),
        };
        assert!((report.progress() - 0.25).abs() < f64::EPSILON);

        report.total_bytes = 0;
        assert!((report.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(PlaybackOutcome::SourceTruncated.to_string(), "source truncated");
    }
}
