//! Interview definition (external collaborator, read-mostly)
//!
//! The pipeline never mutates an interview except to flip `is_active` off
//! when the response cap is reached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interview definition supplying questions and access policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    pub interview_id: String,
    pub title: String,
    /// Scoring objective fed to the provider prompt
    pub objective: String,
    /// Ordered question texts
    pub questions: Vec<String>,
    /// Anonymous interviews skip all identity checks
    pub is_anonymous: bool,
    /// Explicit respondent allow-list; None = open to any identity
    pub allowlist: Option<Vec<String>>,
    /// Registration is refused while inactive
    pub is_active: bool,
    /// Usage cap; reaching it deactivates the interview
    pub response_cap: Option<i64>,
    /// Provider-side conversational agent handle
    pub agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Interview {
    /// Check an identity against the allow-list
    ///
    /// An absent allow-list means the interview is open to any identity.
    pub fn invites(&self, identity: &str) -> bool {
        match &self.allowlist {
            None => true,
            Some(list) => list.iter().any(|entry| entry.eq_ignore_ascii_case(identity)),
        }
    }
}
