//! Per-candidate engagement decisions.
//!
//! The gate is a pure function of the candidate, the quota counters, the
//! exclusion and probability policies, the ledger's dedup answers and the
//! random source. Checks run in a fixed order and each probabilistic skip is
//! drawn only after the quota and dedup checks for that action have passed.

use cadence_core::error::CadenceError;
use cadence_core::random::RandomSource;
use cadence_core::types::{
    ActionKind, CandidateItem, ExclusionPolicy, ProbabilityPolicy, QuotaState,
};
use cadence_storage::ActionLedger;

/// Dedup view of the ledger.
pub trait LedgerLookup {
    fn has_action(&self, target_id: &str, kind: ActionKind) -> Result<bool, CadenceError>;
}

impl LedgerLookup for ActionLedger {
    fn has_action(&self, target_id: &str, kind: ActionKind) -> Result<bool, CadenceError> {
        ActionLedger::has_action(self, target_id, kind)
    }
}

/// Whether to attempt one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Attempt,
}

impl Decision {
    fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Decision::Attempt
        } else {
            Decision::Skip
        }
    }

    pub fn is_attempt(self) -> bool {
        self == Decision::Attempt
    }
}

/// Which branch of the gate produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePath {
    /// Idle browsing: looked at the item, did nothing.
    ViewOnly,
    /// Giveaway content: like at most.
    Promotional,
    /// Carries an avoided tag: like at most.
    AvoidedTag,
    Normal,
}

/// Independent like and comment decisions for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPlan {
    pub like: Decision,
    pub comment: Decision,
    pub path: GatePath,
}

impl ActionPlan {
    pub fn is_skip(&self) -> bool {
        !self.like.is_attempt() && !self.comment.is_attempt()
    }
}

/// Stateless gate over candidates.
#[derive(Debug, Clone)]
pub struct ContentGate {
    exclusions: ExclusionPolicy,
    policy: ProbabilityPolicy,
}

impl ContentGate {
    pub fn new(exclusions: ExclusionPolicy, policy: ProbabilityPolicy) -> Self {
        Self { exclusions, policy }
    }

    pub fn exclusions(&self) -> &ExclusionPolicy {
        &self.exclusions
    }

    /// Decide what to do with `candidate`.
    pub fn evaluate(
        &self,
        candidate: &CandidateItem,
        quota: &QuotaState,
        ledger: &dyn LedgerLookup,
        rng: &mut dyn RandomSource,
    ) -> Result<ActionPlan, CadenceError> {
        if rng.chance(self.policy.view_only_skip) {
            return Ok(ActionPlan {
                like: Decision::Skip,
                comment: Decision::Skip,
                path: GatePath::ViewOnly,
            });
        }

        let excluded = if candidate.is_promotional() {
            Some(GatePath::Promotional)
        } else if self.exclusions.hits_avoid_tag(candidate) {
            Some(GatePath::AvoidedTag)
        } else {
            None
        };

        if let Some(path) = excluded {
            let like = self.like_allowed(
                candidate,
                quota,
                ledger,
                rng,
                self.policy.exclusion_like_skip,
            )?;
            return Ok(ActionPlan {
                like: Decision::from_allowed(like),
                comment: Decision::Skip,
                path,
            });
        }

        let like =
            self.like_allowed(candidate, quota, ledger, rng, self.policy.normal_like_skip)?;
        let comment = quota.comments_remaining()
            && !ledger.has_action(&candidate.id, ActionKind::Comment)?
            && !rng.chance(self.policy.normal_comment_skip);

        Ok(ActionPlan {
            like: Decision::from_allowed(like),
            comment: Decision::from_allowed(comment),
            path: GatePath::Normal,
        })
    }

    fn like_allowed(
        &self,
        candidate: &CandidateItem,
        quota: &QuotaState,
        ledger: &dyn LedgerLookup,
        rng: &mut dyn RandomSource,
        skip_probability: f64,
    ) -> Result<bool, CadenceError> {
        Ok(quota.likes_remaining()
            && !ledger.has_action(&candidate.id, ActionKind::Like)?
            && !rng.chance(skip_probability))
    }
}
