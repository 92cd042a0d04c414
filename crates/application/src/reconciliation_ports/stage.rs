use std::fmt::{Display, Formatter};

use cisync_core::{AppError, AppResult};

/// Processing state of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconciliationStage {
    /// Event accepted for processing.
    Received,
    /// Required fields checked.
    Validated,
    /// Configuration item built.
    Transformed,
    /// CMDB create or update acknowledged.
    Upserted,
    /// Processing finished.
    Done,
    /// Processing stopped with an error.
    Failed,
}

impl ReconciliationStage {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Transformed => "transformed",
            Self::Upserted => "upserted",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "received" => Ok(Self::Received),
            "validated" => Ok(Self::Validated),
            "transformed" => Ok(Self::Transformed),
            "upserted" => Ok(Self::Upserted),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown reconciliation stage '{value}'"
            ))),
        }
    }

    /// Returns whether the state machine allows moving to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Done | Self::Failed, _) => false,
            (_, Self::Failed) => true,
            (Self::Received, Self::Validated)
            | (Self::Validated, Self::Transformed)
            | (Self::Transformed, Self::Upserted)
            | (Self::Upserted, Self::Done) => true,
            _ => false,
        }
    }
}

impl Display for ReconciliationStage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Ordered record of the stages one event passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTrail {
    stages: Vec<ReconciliationStage>,
}

impl StageTrail {
    /// Starts a trail in [`ReconciliationStage::Received`].
    #[must_use]
    pub fn received() -> Self {
        Self {
            stages: vec![ReconciliationStage::Received],
        }
    }

    /// Returns the latest stage.
    #[must_use]
    pub fn current(&self) -> ReconciliationStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(ReconciliationStage::Received)
    }

    /// Moves to the next stage, rejecting transitions the state machine forbids.
    pub fn advance(&mut self, next: ReconciliationStage) -> AppResult<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(AppError::Internal(format!(
                "illegal reconciliation transition {current} -> {next}"
            )));
        }

        self.stages.push(next);
        Ok(())
    }

    /// Enters [`ReconciliationStage::Failed`] and returns the stage reached
    /// before it. A trail that already ended is left unchanged.
    pub fn fail(&mut self) -> ReconciliationStage {
        let reached = self.current();
        if reached.can_transition_to(ReconciliationStage::Failed) {
            self.stages.push(ReconciliationStage::Failed);
        }
        reached
    }

    /// Returns every visited stage in order.
    #[must_use]
    pub fn stages(&self) -> &[ReconciliationStage] {
        &self.stages
    }

    /// Consumes the trail.
    #[must_use]
    pub fn into_stages(self) -> Vec<ReconciliationStage> {
        self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::{ReconciliationStage, StageTrail};

    #[test]
    fn happy_path_walks_every_stage() {
        let mut trail = StageTrail::received();
        for stage in [
            ReconciliationStage::Validated,
            ReconciliationStage::Transformed,
            ReconciliationStage::Upserted,
            ReconciliationStage::Done,
        ] {
            assert!(trail.advance(stage).is_ok());
        }
        assert_eq!(trail.stages().len(), 5);
        assert_eq!(trail.current(), ReconciliationStage::Done);
    }

    #[test]
    fn failed_is_reachable_from_every_non_terminal_stage() {
        for stage in [
            ReconciliationStage::Received,
            ReconciliationStage::Validated,
            ReconciliationStage::Transformed,
            ReconciliationStage::Upserted,
        ] {
            assert!(stage.can_transition_to(ReconciliationStage::Failed));
        }
        assert!(!ReconciliationStage::Done.can_transition_to(ReconciliationStage::Failed));
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut trail = StageTrail::received();
        assert!(trail.advance(ReconciliationStage::Upserted).is_err());
        assert_eq!(trail.current(), ReconciliationStage::Received);
    }

    #[test]
    fn failing_reports_the_last_stage_reached() {
        let mut trail = StageTrail::received();
        assert!(trail.advance(ReconciliationStage::Validated).is_ok());
        assert!(trail.advance(ReconciliationStage::Transformed).is_ok());

        assert_eq!(trail.fail(), ReconciliationStage::Transformed);
        assert_eq!(trail.current(), ReconciliationStage::Failed);
        assert!(trail.advance(ReconciliationStage::Upserted).is_err());

        assert_eq!(trail.fail(), ReconciliationStage::Failed);
        assert_eq!(trail.stages().len(), 4);
    }

    #[test]
    fn stage_storage_value_parses_back() {
        assert_eq!(
            ReconciliationStage::parse("transformed").ok(),
            Some(ReconciliationStage::Transformed)
        );
        assert!(ReconciliationStage::parse("exploded").is_err());
    }
}
