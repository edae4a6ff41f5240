//! Engagement engine for Cadence.
//!
//! Decides per candidate whether to like or comment, paces actions across
//! the day, and records every outcome in the action ledger so repeated runs
//! never act twice on the same item.

pub mod cancel;
pub mod collaborator;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod orchestrator;
pub mod scheduler;

pub use cancel::CancelSignal;
pub use collaborator::{
    ActionExecutor, Collaborators, CommentGenerator, ContentSource, EnrichmentSource,
    MediaFetcher, MediaHandle, NoMedia,
};
pub use error::{ActionError, CleanupError, LifecycleError, RunError};
pub use gate::{ActionPlan, ContentGate, Decision, GatePath, LedgerLookup};
pub use lifecycle::{CandidateLifecycle, CandidateStage};
pub use orchestrator::{EngagementOrchestrator, RunPlan, RunSummary, StopReason};
pub use scheduler::{PacingScheduler, WaitOutcome, WakingHours};
