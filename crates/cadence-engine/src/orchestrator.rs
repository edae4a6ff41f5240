//! Engagement run orchestrator.
//!
//! Walks topic tags and their candidates in randomized order, asks the gate
//! what to do with each one, calls the executor for allowed actions, writes
//! every outcome to the ledger and paces the next step.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use cadence_core::clock::Clock;
use cadence_core::config::{CadenceConfig, PacingConfig};
use cadence_core::error::CadenceError;
use cadence_core::random::RandomSource;
use cadence_core::types::{
    normalize_tags, ActionRecord, CandidateDetails, CandidateItem, EnrichmentContext,
    ExclusionPolicy, ProbabilityPolicy, QuotaState,
};
use cadence_storage::ActionLedger;

use crate::cancel::CancelSignal;
use crate::collaborator::{Collaborators, MediaGuard};
use crate::error::{ActionError, RunError};
use crate::gate::ContentGate;
use crate::lifecycle::{CandidateLifecycle, CandidateStage};
use crate::scheduler::{PacingScheduler, WaitOutcome};

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub hashtags: Vec<String>,
    pub avoid_hashtags: Vec<String>,
    pub like_limit: u32,
    pub comment_limit: u32,
    pub per_tag_limit: usize,
    pub allow_sensitive: bool,
    pub call_timeout: Duration,
    pub policy: ProbabilityPolicy,
    pub pacing: PacingConfig,
}

impl RunPlan {
    pub fn from_config(config: &CadenceConfig) -> Self {
        Self {
            hashtags: config.run.normalized_hashtags(),
            avoid_hashtags: config.run.normalized_avoid_hashtags(),
            like_limit: config.run.likes_per_day,
            comment_limit: config.run.comments_per_day,
            per_tag_limit: config.run.per_tag_limit,
            allow_sensitive: config.run.allow_sensitive,
            call_timeout: Duration::from_secs(config.run.call_timeout_secs),
            policy: config.policy.clone(),
            pacing: config.pacing.clone(),
        }
    }

    pub fn total_daily_quota(&self) -> u32 {
        self.like_limit.saturating_add(self.comment_limit)
    }

    /// Same plan with topic and avoid tags normalized and deduplicated.
    pub fn normalized(mut self) -> Self {
        self.hashtags = normalize_tags(&self.hashtags);
        self.avoid_hashtags = normalize_tags(&self.avoid_hashtags);
        self
    }

    /// Reject plans that cannot run. Nothing is written when this fails.
    pub fn validate(&self) -> Result<(), RunError> {
        if normalize_tags(&self.hashtags).is_empty() {
            return Err(RunError::Configuration(
                "at least one hashtag is required".to_string(),
            ));
        }
        if self.total_daily_quota() == 0 {
            return Err(RunError::Configuration(
                "like and comment limits cannot both be zero".to_string(),
            ));
        }
        if self.per_tag_limit == 0 {
            return Err(RunError::Configuration(
                "per-tag candidate limit must be positive".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(RunError::Configuration(
                "call timeout must be positive".to_string(),
            ));
        }
        self.pacing.validate().map_err(configuration)?;
        self.policy.validate().map_err(configuration)?;
        Ok(())
    }
}

fn configuration(err: CadenceError) -> RunError {
    match err {
        CadenceError::Config(msg) => RunError::Configuration(msg),
        other => RunError::Configuration(other.to_string()),
    }
}

/// Why a run ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuotaExhausted,
    CandidatesExhausted,
    Cancelled,
}

/// Totals for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub likes: u32,
    pub comments: u32,
    /// Error records written.
    pub errors: u32,
    pub candidates_seen: u32,
    pub stop_reason: StopReason,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            likes: 0,
            comments: 0,
            errors: 0,
            candidates_seen: 0,
            stop_reason: StopReason::CandidatesExhausted,
        }
    }
}

/// Mutable state threaded through one run.
struct RunState {
    quota: QuotaState,
    summary: RunSummary,
}

/// Drives one engagement run end to end.
pub struct EngagementOrchestrator {
    ledger: ActionLedger,
    collaborators: Collaborators,
    plan: RunPlan,
    clock: Arc<dyn Clock>,
    cancel: CancelSignal,
}

impl EngagementOrchestrator {
    pub fn new(
        ledger: ActionLedger,
        collaborators: Collaborators,
        plan: RunPlan,
        clock: Arc<dyn Clock>,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            ledger,
            collaborators,
            plan: plan.normalized(),
            clock,
            cancel,
        }
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Run until both quotas are spent, candidates run out, or the run is
    /// cancelled.
    ///
    /// Returns `Err` for configuration problems (before anything is written)
    /// and for an expired session, which ends the run after the current
    /// candidate's media has been released.
    pub async fn run(&self, rng: &mut dyn RandomSource) -> Result<RunSummary, RunError> {
        self.plan.validate()?;

        let gate = ContentGate::new(
            ExclusionPolicy::new(&self.plan.avoid_hashtags),
            self.plan.policy.clone(),
        );
        let scheduler = PacingScheduler::new(
            self.plan.total_daily_quota(),
            self.plan.policy.clone(),
            &self.plan.pacing,
            Arc::clone(&self.clock),
            self.cancel.clone(),
        );
        let mut state = RunState {
            quota: QuotaState::new(self.plan.like_limit, self.plan.comment_limit),
            summary: RunSummary::default(),
        };

        info!(
            tags = self.plan.hashtags.len(),
            like_limit = self.plan.like_limit,
            comment_limit = self.plan.comment_limit,
            min_gap_secs = scheduler.min_gap_secs() as u64,
            "Engagement run starting"
        );

        let stop_reason = self.drive(&gate, &scheduler, &mut state, rng).await?;
        state.summary.stop_reason = stop_reason;

        let summary = state.summary;
        info!(
            likes = summary.likes,
            comments = summary.comments,
            errors = summary.errors,
            candidates = summary.candidates_seen,
            stop_reason = ?summary.stop_reason,
            "Engagement run finished"
        );
        Ok(summary)
    }

    async fn drive(
        &self,
        gate: &ContentGate,
        scheduler: &PacingScheduler,
        state: &mut RunState,
        rng: &mut dyn RandomSource,
    ) -> Result<StopReason, RunError> {
        if scheduler.await_waking_hours().await == WaitOutcome::Cancelled {
            return Ok(StopReason::Cancelled);
        }
        let mut last = self.clock.now();

        for tag_index in rng.permutation(self.plan.hashtags.len()) {
            let tag = &self.plan.hashtags[tag_index];
            if self.cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }

            let fetched = self
                .call(
                    self.collaborators
                        .source
                        .fetch_recent_candidates(tag, self.plan.per_tag_limit),
                )
                .await;
            let mut candidates = match fetched {
                Ok(candidates) => candidates,
                Err(ActionError::AuthExpired(reason)) => return Err(RunError::AuthExpired(reason)),
                Err(e) => {
                    warn!(tag = %tag, error = %e, "Candidate fetch failed");
                    let record = ActionRecord::untargeted_error(
                        self.clock.now(),
                        Some(tag.as_str()),
                        format!("fetch failed: {}", e),
                    );
                    if self.write(&record) {
                        state.summary.errors += 1;
                    }
                    continue;
                }
            };
            candidates.truncate(self.plan.per_tag_limit);
            debug!(tag = %tag, count = candidates.len(), "Candidates fetched");

            for index in rng.permutation(candidates.len()) {
                state.summary.candidates_seen += 1;
                self.process_candidate(&candidates[index], gate, state, rng)
                    .await?;

                if state.quota.is_exhausted() {
                    return Ok(StopReason::QuotaExhausted);
                }
                match scheduler.advance_and_wait(last, rng).await {
                    Some(next) => last = next,
                    None => return Ok(StopReason::Cancelled),
                }
            }
        }

        Ok(StopReason::CandidatesExhausted)
    }

    /// Handle one candidate. The media guard is dropped before this returns,
    /// whatever the outcome.
    async fn process_candidate(
        &self,
        candidate: &CandidateItem,
        gate: &ContentGate,
        state: &mut RunState,
        rng: &mut dyn RandomSource,
    ) -> Result<(), RunError> {
        let mut lifecycle = CandidateLifecycle::new();

        let handle = match candidate.content_url.as_deref() {
            Some(url) => tokio::time::timeout(
                self.plan.call_timeout,
                self.collaborators.media.fetch(url),
            )
            .await
            .unwrap_or(None),
            None => None,
        };
        if candidate.content_url.is_some() && handle.is_none() {
            debug!(target_id = %candidate.id, "Media unavailable");
        }
        let media = MediaGuard::new(self.collaborators.media.as_ref(), handle, &candidate.id);

        let result = self
            .engage(candidate, gate, &media, &mut lifecycle, state, rng)
            .await;

        drop(media);
        step(&mut lifecycle, CandidateStage::Released);
        result
    }

    async fn engage(
        &self,
        candidate: &CandidateItem,
        gate: &ContentGate,
        media: &MediaGuard<'_>,
        lifecycle: &mut CandidateLifecycle,
        state: &mut RunState,
        rng: &mut dyn RandomSource,
    ) -> Result<(), RunError> {
        step(lifecycle, CandidateStage::Gated);
        let plan = match gate.evaluate(candidate, &state.quota, &self.ledger, rng) {
            Ok(plan) => plan,
            Err(e) => {
                error!(
                    target_id = %candidate.id,
                    error = %e,
                    "Dedup lookup failed, skipping candidate"
                );
                step(lifecycle, CandidateStage::Skipped);
                return Ok(());
            }
        };
        debug!(
            target_id = %candidate.id,
            path = ?plan.path,
            like = ?plan.like,
            comment = ?plan.comment,
            "Gate decision"
        );
        if plan.is_skip() {
            step(lifecycle, CandidateStage::Skipped);
            return Ok(());
        }

        if plan.like.is_attempt() {
            step(lifecycle, CandidateStage::Attempting);
            match self.call(self.collaborators.executor.like(&candidate.id)).await {
                Ok(()) => {
                    state.quota.record_like();
                    state.summary.likes += 1;
                    info!(target_id = %candidate.id, tag = %candidate.topic_tag, "Liked");
                    let written = self.write(&ActionRecord::like(self.clock.now(), candidate));
                    step(lifecycle, outcome_stage(written));
                }
                Err(ActionError::AuthExpired(reason)) => return Err(RunError::AuthExpired(reason)),
                Err(e) => self.record_failure(candidate, "like", &e, lifecycle, state),
            }
        }

        if plan.comment.is_attempt() {
            step(lifecycle, CandidateStage::Attempting);
            self.try_comment(candidate, media, lifecycle, state).await?;
        }

        Ok(())
    }

    async fn try_comment(
        &self,
        candidate: &CandidateItem,
        media: &MediaGuard<'_>,
        lifecycle: &mut CandidateLifecycle,
        state: &mut RunState,
    ) -> Result<(), RunError> {
        let details = self.candidate_details(candidate, media).await?;
        let enrichment = self.enrichment(candidate).await;

        let text = match self.collaborators.generator.generate(
            &details,
            self.plan.allow_sensitive,
            enrichment.as_ref(),
        ) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(target_id = %candidate.id, "No comment generated");
                step(lifecycle, CandidateStage::Skipped);
                return Ok(());
            }
            Err(ActionError::AuthExpired(reason)) => return Err(RunError::AuthExpired(reason)),
            Err(e) => {
                self.record_failure(candidate, "comment generation", &e, lifecycle, state);
                return Ok(());
            }
        };

        match self
            .call(self.collaborators.executor.comment(&candidate.id, &text))
            .await
        {
            Ok(()) => {
                state.quota.record_comment();
                state.summary.comments += 1;
                info!(target_id = %candidate.id, tag = %candidate.topic_tag, "Commented");
                let written =
                    self.write(&ActionRecord::comment(self.clock.now(), candidate, text));
                step(lifecycle, outcome_stage(written));
            }
            Err(ActionError::AuthExpired(reason)) => return Err(RunError::AuthExpired(reason)),
            Err(e) => self.record_failure(candidate, "comment", &e, lifecycle, state),
        }
        Ok(())
    }

    /// Generator input, with the followed-author flag refreshed from the
    /// content source when it answers.
    async fn candidate_details(
        &self,
        candidate: &CandidateItem,
        media: &MediaGuard<'_>,
    ) -> Result<CandidateDetails, RunError> {
        let mut details = CandidateDetails::from_candidate(candidate);
        details.media_path = media.path();
        details.avoid_tags = self.plan.avoid_hashtags.clone();

        if !candidate.author_id.is_empty() {
            match self
                .call(self.collaborators.source.is_author_followed(&candidate.author_id))
                .await
            {
                Ok(followed) => details.is_followed_author = followed,
                Err(ActionError::AuthExpired(reason)) => {
                    return Err(RunError::AuthExpired(reason))
                }
                Err(e) => {
                    debug!(author_id = %candidate.author_id, error = %e, "Follow lookup failed")
                }
            }
        }
        Ok(details)
    }

    async fn enrichment(&self, candidate: &CandidateItem) -> Option<EnrichmentContext> {
        let source = self.collaborators.enrichment.as_ref()?;
        match self.call(source.lookup(candidate)).await {
            Ok(context) => context.filter(|c| !c.is_empty()),
            Err(e) => {
                warn!(target_id = %candidate.id, error = %e, "Enrichment lookup failed");
                None
            }
        }
    }

    fn record_failure(
        &self,
        candidate: &CandidateItem,
        action: &str,
        err: &ActionError,
        lifecycle: &mut CandidateLifecycle,
        state: &mut RunState,
    ) {
        warn!(target_id = %candidate.id, action, error = %err, "Action failed");
        let detail = format!("{} failed: {}", action, err);
        if self.write(&ActionRecord::error(self.clock.now(), candidate, detail)) {
            state.summary.errors += 1;
        }
        step(lifecycle, CandidateStage::Errored);
    }

    /// Append to the ledger. A failed write is logged and reported as
    /// `false`; it never ends the run.
    fn write(&self, record: &ActionRecord) -> bool {
        match self.ledger.record_action(record) {
            Ok(_) => true,
            Err(e) => {
                error!(kind = %record.kind, error = %e, "Ledger write failed");
                false
            }
        }
    }

    /// Bound a collaborator call by the per-call timeout.
    async fn call<T, F>(&self, fut: F) -> Result<T, ActionError>
    where
        F: Future<Output = Result<T, ActionError>>,
    {
        match tokio::time::timeout(self.plan.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ActionError::Timeout(self.plan.call_timeout.as_secs())),
        }
    }
}

fn outcome_stage(written: bool) -> CandidateStage {
    if written {
        CandidateStage::Recorded
    } else {
        CandidateStage::Errored
    }
}

fn step(lifecycle: &mut CandidateLifecycle, to: CandidateStage) {
    if let Err(e) = lifecycle.advance(to) {
        warn!(error = %e, "Unexpected candidate transition");
    }
}
