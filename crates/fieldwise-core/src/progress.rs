use serde::{Deserialize, Serialize};

/// Pipeline stages in execution order. Each carries a weight proportional to
/// its typical share of wall-clock time, so reported percentages move
/// smoothly rather than jumping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractingText,
    Analyzing,
    Parsing,
    Validating,
    Refining,
    Saving,
    Complete,
}

impl Stage {
    #[must_use]
    pub fn weight(self) -> u8 {
        match self {
            Self::ExtractingText => 10,
            Self::Analyzing => 55,
            Self::Parsing => 10,
            Self::Validating => 10,
            Self::Refining => 10,
            Self::Saving => 5,
            Self::Complete => 0,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ExtractingText => "extracting text",
            Self::Analyzing => "analyzing document",
            Self::Parsing => "parsing response",
            Self::Validating => "validating fields",
            Self::Refining => "refining low-confidence fields",
            Self::Saving => "assembling result",
            Self::Complete => "complete",
        }
    }

    const ORDER: [Self; 7] = [
        Self::ExtractingText,
        Self::Analyzing,
        Self::Parsing,
        Self::Validating,
        Self::Refining,
        Self::Saving,
        Self::Complete,
    ];

    /// Cumulative percentage at the point this stage begins.
    #[must_use]
    pub fn percent(self) -> u8 {
        Self::ORDER
            .iter()
            .take_while(|s| **s != self)
            .map(|s| s.weight())
            .sum()
    }
}

/// One progress notification. Percent is monotone across a run even when
/// stages are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub percent: u8,
    pub elapsed_ms: u64,
    pub detail: String,
}

impl ProgressEvent {
    #[must_use]
    pub fn new(stage: Stage, elapsed_ms: u64, detail: impl Into<String>) -> Self {
        Self {
            stage,
            percent: stage.percent(),
            elapsed_ms,
            detail: detail.into(),
        }
    }
}

/// Receives progress notifications from a running pipeline. Implementations
/// must not block for long; the pipeline awaits each report inline.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, event: ProgressEvent);
}

/// Discards all events.
pub struct NullSink;

#[async_trait::async_trait]
impl ProgressSink for NullSink {
    async fn report(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentages_are_monotone() {
        let mut last = 0;
        for stage in Stage::ORDER {
            let pct = stage.percent();
            assert!(pct >= last, "{stage:?} went backwards");
            last = pct;
        }
    }

    #[test]
    fn test_complete_is_full() {
        assert_eq!(Stage::Complete.percent(), 100);
    }

    #[test]
    fn test_event_carries_stage_percent() {
        let event = ProgressEvent::new(Stage::Validating, 1500, "33 fields");
        assert_eq!(event.percent, Stage::Validating.percent());
        assert_eq!(event.elapsed_ms, 1500);
        assert_eq!(event.detail, "33 fields");
    }
}
