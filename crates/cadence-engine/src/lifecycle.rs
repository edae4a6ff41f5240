//! Candidate state machine with validated transitions.
//!
//! Every candidate follows:
//! Fetched -> Gated -> {Skipped | Attempting} -> {Recorded | Errored} -> Released
//!
//! A candidate with both a like and a comment attempt goes back to
//! Attempting after its first outcome. Released is terminal and reachable
//! from every other stage, so cleanup can run on any exit path.

use std::fmt;

use crate::error::LifecycleError;

/// Stage of one candidate within an engagement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateStage {
    Fetched,
    Gated,
    Skipped,
    Attempting,
    Recorded,
    Errored,
    Released,
}

impl fmt::Display for CandidateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateStage::Fetched => write!(f, "fetched"),
            CandidateStage::Gated => write!(f, "gated"),
            CandidateStage::Skipped => write!(f, "skipped"),
            CandidateStage::Attempting => write!(f, "attempting"),
            CandidateStage::Recorded => write!(f, "recorded"),
            CandidateStage::Errored => write!(f, "errored"),
            CandidateStage::Released => write!(f, "released"),
        }
    }
}

/// Validate that a stage transition is allowed.
pub fn validate_transition(from: CandidateStage, to: CandidateStage) -> Result<(), LifecycleError> {
    use CandidateStage::*;

    let valid = match (from, to) {
        (Released, _) => false,
        (_, Released) => true,
        (Fetched, Gated)
        | (Gated, Skipped)
        | (Gated, Attempting)
        | (Attempting, Recorded)
        | (Attempting, Errored)
        // The comment generator declined to write anything.
        | (Attempting, Skipped)
        | (Recorded, Attempting)
        | (Errored, Attempting) => true,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(LifecycleError { from, to })
    }
}

/// Tracks one candidate's progress through its stages.
#[derive(Debug)]
pub struct CandidateLifecycle {
    stage: CandidateStage,
}

impl Default for CandidateLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateLifecycle {
    pub fn new() -> Self {
        Self {
            stage: CandidateStage::Fetched,
        }
    }

    pub fn stage(&self) -> CandidateStage {
        self.stage
    }

    pub fn advance(&mut self, to: CandidateStage) -> Result<(), LifecycleError> {
        validate_transition(self.stage, to)?;
        self.stage = to;
        Ok(())
    }
}
