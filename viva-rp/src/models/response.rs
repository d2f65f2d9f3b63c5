//! Response record: one candidate's pass through one interview
//!
//! The lifecycle state machine only moves forward:
//! Created -> Started -> Ended -> Analysed, with Failed reachable from
//! Started/Ended and terminal for the automatic pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ScoreDocument;

/// Progress marker for a single interview attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Attempt registered, call not yet live
    Created,
    /// Candidate joined, call in progress
    Started,
    /// Call finished, transcript may be present, not yet scored
    Ended,
    /// Scoring document persisted
    Analysed,
    /// Automatic pipeline gave up; manual reset required
    Failed,
}

impl LifecycleState {
    /// Stored database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Created => "Created",
            LifecycleState::Started => "Started",
            LifecycleState::Ended => "Ended",
            LifecycleState::Analysed => "Analysed",
            LifecycleState::Failed => "Failed",
        }
    }

    /// Parse the stored database representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Created" => Some(LifecycleState::Created),
            "Started" => Some(LifecycleState::Started),
            "Ended" => Some(LifecycleState::Ended),
            "Analysed" => Some(LifecycleState::Analysed),
            "Failed" => Some(LifecycleState::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-assigned hiring verdict, independent of lifecycle state
///
/// Overwrite-last-wins; mutable at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    NoStatus,
    Selected,
    Potential,
    NotSelected,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::NoStatus => "NoStatus",
            Disposition::Selected => "Selected",
            Disposition::Potential => "Potential",
            Disposition::NotSelected => "NotSelected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NoStatus" => Some(Disposition::NoStatus),
            "Selected" => Some(Disposition::Selected),
            "Potential" => Some(Disposition::Potential),
            "NotSelected" => Some(Disposition::NotSelected),
            _ => None,
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One interview attempt, keyed by the provider-assigned call id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Provider-assigned call id; globally unique, exists before the row
    pub call_id: String,
    /// Owning interview definition; immutable after creation
    pub interview_id: String,
    /// Respondent identity (email); None when the interview is anonymous
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Current lifecycle state
    pub lifecycle_state: LifecycleState,
    /// Call duration in whole seconds; set once from provider timestamps
    pub duration_seconds: Option<i64>,
    /// Client heartbeat tab-switch counter; monotonically non-decreasing
    pub tab_switch_count: i64,
    /// Raw provider transcript; set once, immutable thereafter
    pub transcript: Option<String>,
    /// AI scoring document; write-once, presence guards re-analysis
    pub analytics: Option<ScoreDocument>,
    /// Operator verdict
    pub disposition: Disposition,
    /// Reason recorded by hard_failure, cleared on reset
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client/operator-facing view of a response, returned by the poll endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub call_id: String,
    pub interview_id: String,
    pub lifecycle_state: LifecycleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    pub tab_switch_count: i64,
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<ScoreDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Response> for ResponseSnapshot {
    fn from(r: Response) -> Self {
        Self {
            call_id: r.call_id,
            interview_id: r.interview_id,
            lifecycle_state: r.lifecycle_state,
            duration_seconds: r.duration_seconds,
            tab_switch_count: r.tab_switch_count,
            disposition: r.disposition,
            analytics: r.analytics,
            failure_reason: r.failure_reason,
            updated_at: r.updated_at,
        }
    }
}
