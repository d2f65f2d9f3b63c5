//! Eligibility guard
//!
//! Decides whether a respondent may start a new attempt for an interview.
//! Policy is evaluated in order: anonymous interviews admit anyone, the
//! allow-list is checked next, then prior attempts by the same identity.
//!
//! On a storage error the guard fails OPEN: blocking a live candidate
//! mid-flow is worse than letting a duplicate through. The bypass is
//! logged at WARN for later audit; do not tighten this to fail-closed
//! without revisiting that tradeoff.

use sqlx::SqlitePool;
use tracing::warn;

use crate::db;
use crate::models::Interview;

/// Outcome of an eligibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Denied(DenyReason),
}

/// Why a respondent was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Identity not on the interview's allow-list
    NotInvited,
    /// Identity already has an attempt past Created on this interview
    AlreadyResponded,
}

/// Guard over the response store
#[derive(Clone)]
pub struct EligibilityGuard {
    db: SqlitePool,
}

impl EligibilityGuard {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// May this identity start a new attempt?
    ///
    /// Anonymous interviews ignore identity entirely. For everything else a
    /// missing identity cannot be matched against the allow-list or prior
    /// attempts, so it is treated as not invited (the gateway validates the
    /// field before calling here).
    pub async fn may_start(&self, interview: &Interview, identity: Option<&str>) -> Eligibility {
        if interview.is_anonymous {
            return Eligibility::Allowed;
        }

        let identity = match identity {
            Some(id) if !id.trim().is_empty() => id.trim(),
            _ => return Eligibility::Denied(DenyReason::NotInvited),
        };

        if !interview.invites(identity) {
            return Eligibility::Denied(DenyReason::NotInvited);
        }

        match db::responses::identity_has_responded(&self.db, &interview.interview_id, identity)
            .await
        {
            Ok(true) => Eligibility::Denied(DenyReason::AlreadyResponded),
            Ok(false) => Eligibility::Allowed,
            Err(err) => {
                // Fail open: availability over strictness for live candidates.
                warn!(
                    interview_id = %interview.interview_id,
                    identity = %identity,
                    error = %err,
                    "Eligibility check bypassed: prior-response lookup failed, allowing candidate"
                );
                Eligibility::Allowed
            }
        }
    }
}

impl DenyReason {
    /// Reason code surfaced to the registration caller
    pub fn as_code(&self) -> &'static str {
        match self {
            DenyReason::NotInvited => "NotInvited",
            DenyReason::AlreadyResponded => "AlreadyResponded",
        }
    }
}
