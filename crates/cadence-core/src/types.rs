use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CadenceError, Result};

/// Literal term marking promotional giveaway content.
pub const GIVEAWAY_TERM: &str = "giveaway";

// =============================================================================
// Enums
// =============================================================================

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Like,
    Comment,
    Error,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Like => "like",
            ActionKind::Comment => "comment",
            ActionKind::Error => "error",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "like" => Ok(ActionKind::Like),
            "comment" => Ok(ActionKind::Comment),
            "error" => Ok(ActionKind::Error),
            _ => Err(format!("Unknown action kind: {}", s)),
        }
    }
}

// =============================================================================
// Ledger records
// =============================================================================

/// One immutable ledger fact about an attempted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ActionKind,
    pub target_id: Option<String>,
    pub topic_tag: Option<String>,
    /// Set only for successful comments.
    pub comment_text: Option<String>,
    /// Set only for `ActionKind::Error`.
    pub error_detail: Option<String>,
    pub content_link: Option<String>,
}

impl ActionRecord {
    pub fn like(timestamp: DateTime<Utc>, candidate: &CandidateItem) -> Self {
        Self {
            timestamp,
            kind: ActionKind::Like,
            target_id: Some(candidate.id.clone()),
            topic_tag: Some(candidate.topic_tag.clone()),
            comment_text: None,
            error_detail: None,
            content_link: non_empty(&candidate.permalink),
        }
    }

    pub fn comment(timestamp: DateTime<Utc>, candidate: &CandidateItem, text: String) -> Self {
        Self {
            timestamp,
            kind: ActionKind::Comment,
            target_id: Some(candidate.id.clone()),
            topic_tag: Some(candidate.topic_tag.clone()),
            comment_text: Some(text),
            error_detail: None,
            content_link: non_empty(&candidate.permalink),
        }
    }

    /// A failure bound to a specific candidate.
    pub fn error(
        timestamp: DateTime<Utc>,
        candidate: &CandidateItem,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind: ActionKind::Error,
            target_id: Some(candidate.id.clone()),
            topic_tag: Some(candidate.topic_tag.clone()),
            comment_text: None,
            error_detail: Some(detail.into()),
            content_link: non_empty(&candidate.permalink),
        }
    }

    /// A failure not tied to any item, e.g. a candidate fetch for a tag.
    pub fn untargeted_error(
        timestamp: DateTime<Utc>,
        topic_tag: Option<&str>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind: ActionKind::Error,
            target_id: None,
            topic_tag: topic_tag.map(str::to_string),
            comment_text: None,
            error_detail: Some(detail.into()),
            content_link: None,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// =============================================================================
// Candidates
// =============================================================================

/// A content item discovered under a topic tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: String,
    pub topic_tag: String,
    pub author_id: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub caption: String,
    /// Lowercase hashtags found on the item.
    #[serde(default)]
    pub hashtags: BTreeSet<String>,
    pub content_url: Option<String>,
    #[serde(default)]
    pub is_own_content: bool,
    #[serde(default)]
    pub is_followed_author: bool,
    #[serde(default)]
    pub permalink: String,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
}

impl CandidateItem {
    /// True when the item advertises a giveaway: the term appears in the
    /// caption or in a hashtag (any case), or is the topic tag itself.
    pub fn is_promotional(&self) -> bool {
        self.caption.to_lowercase().contains(GIVEAWAY_TERM)
            || self
                .hashtags
                .iter()
                .any(|h| h.to_lowercase().contains(GIVEAWAY_TERM))
            || self.topic_tag.eq_ignore_ascii_case(GIVEAWAY_TERM)
    }
}

/// Context produced by an enrichment source for the comment generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentContext {
    /// Free-form facts, e.g. titles the account owner has read.
    pub notes: Vec<String>,
}

impl EnrichmentContext {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Typed payload handed to the comment generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDetails {
    pub target_id: String,
    pub author_id: String,
    pub author_name: String,
    pub caption: String,
    pub topic_tag: String,
    pub permalink: String,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    /// Local copy of the item's media, when one could be fetched.
    pub media_path: Option<PathBuf>,
    pub is_own_content: bool,
    pub is_followed_author: bool,
    /// Topics the generated text must steer clear of.
    pub avoid_tags: Vec<String>,
}

impl CandidateDetails {
    pub fn from_candidate(candidate: &CandidateItem) -> Self {
        Self {
            target_id: candidate.id.clone(),
            author_id: candidate.author_id.clone(),
            author_name: candidate.author_name.clone(),
            caption: candidate.caption.clone(),
            topic_tag: candidate.topic_tag.clone(),
            permalink: candidate.permalink.clone(),
            like_count: candidate.like_count,
            comment_count: candidate.comment_count,
            media_path: None,
            is_own_content: candidate.is_own_content,
            is_followed_author: candidate.is_followed_author,
            avoid_tags: Vec::new(),
        }
    }
}

// =============================================================================
// Run state and policies
// =============================================================================

/// Per-run action counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub like_limit: u32,
    pub comment_limit: u32,
    pub likes_done: u32,
    pub comments_done: u32,
}

impl QuotaState {
    pub fn new(like_limit: u32, comment_limit: u32) -> Self {
        Self {
            like_limit,
            comment_limit,
            likes_done: 0,
            comments_done: 0,
        }
    }

    pub fn total_daily_quota(&self) -> u32 {
        self.like_limit.saturating_add(self.comment_limit)
    }

    pub fn likes_remaining(&self) -> bool {
        self.likes_done < self.like_limit
    }

    pub fn comments_remaining(&self) -> bool {
        self.comments_done < self.comment_limit
    }

    pub fn is_exhausted(&self) -> bool {
        !self.likes_remaining() && !self.comments_remaining()
    }

    /// Count a successful like. Never exceeds the limit.
    pub fn record_like(&mut self) {
        if self.likes_remaining() {
            self.likes_done += 1;
        }
    }

    /// Count a successful comment. Never exceeds the limit.
    pub fn record_comment(&mut self) {
        if self.comments_remaining() {
            self.comments_done += 1;
        }
    }
}

/// Tags whose presence forbids commenting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionPolicy {
    pub avoid_tags: BTreeSet<String>,
}

impl ExclusionPolicy {
    pub fn new<I, S>(avoid_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            avoid_tags: avoid_tags
                .into_iter()
                .filter_map(|t| normalize_tag(t.as_ref()))
                .collect(),
        }
    }

    pub fn hits_avoid_tag(&self, candidate: &CandidateItem) -> bool {
        candidate
            .hashtags
            .iter()
            .any(|h| self.avoid_tags.contains(&h.to_lowercase()))
    }
}

/// Probabilities that shape human-like behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilityPolicy {
    /// Chance of only looking at an item.
    pub view_only_skip: f64,
    /// Chance of skipping an eligible like on an excluded item.
    pub exclusion_like_skip: f64,
    pub normal_like_skip: f64,
    pub normal_comment_skip: f64,
    /// Chance of a long pause after a pacing delay.
    pub long_break_prob: f64,
    /// Bounds of a long pause, in seconds.
    pub long_break_range: [f64; 2],
}

impl Default for ProbabilityPolicy {
    fn default() -> Self {
        Self {
            view_only_skip: 0.08,
            exclusion_like_skip: 0.15,
            normal_like_skip: 0.10,
            normal_comment_skip: 0.18,
            long_break_prob: 0.12,
            long_break_range: [60.0, 180.0],
        }
    }
}

impl ProbabilityPolicy {
    /// Policy that never skips and never takes a long break.
    pub fn never_skip() -> Self {
        Self {
            view_only_skip: 0.0,
            exclusion_like_skip: 0.0,
            normal_like_skip: 0.0,
            normal_comment_skip: 0.0,
            long_break_prob: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            ("view_only_skip", self.view_only_skip),
            ("exclusion_like_skip", self.exclusion_like_skip),
            ("normal_like_skip", self.normal_like_skip),
            ("normal_comment_skip", self.normal_comment_skip),
            ("long_break_prob", self.long_break_prob),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(CadenceError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        let [low, high] = self.long_break_range;
        if low < 0.0 || low > high {
            return Err(CadenceError::Config(format!(
                "invalid long_break_range [{}, {}]",
                low, high
            )));
        }
        Ok(())
    }
}

/// Normalize a user-entered tag: trim, drop a leading `#`, lowercase.
/// Returns `None` for tags that end up empty.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#').trim().to_lowercase();
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// Normalize a list of tags, dropping empties and later duplicates.
pub fn normalize_tags<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw.iter().filter_map(|t| normalize_tag(t.as_ref())) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
