//! Event types for the viva event system
//!
//! Provides shared event definitions and the EventBus used to fan lifecycle
//! changes out to SSE clients and other in-process listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Response lifecycle events
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All events carry the provider call id so listeners can
/// correlate them with a stored response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VivaEvent {
    /// A new interview attempt was registered with the call provider
    ResponseRegistered {
        /// Provider-assigned call id
        call_id: String,
        /// Owning interview definition
        interview_id: String,
        /// When the attempt was registered
        timestamp: DateTime<Utc>,
    },

    /// The candidate's call went live
    CallStarted {
        call_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The call finished
    ///
    /// `duration_seconds` is present when the provider reported both start
    /// and end timestamps with the event.
    CallEnded {
        call_id: String,
        duration_seconds: Option<i64>,
        timestamp: DateTime<Utc>,
    },

    /// Scoring completed and the analytics document was persisted
    AnalyticsReady {
        call_id: String,
        overall_score: f64,
        timestamp: DateTime<Utc>,
    },

    /// The automatic pipeline gave up on this attempt
    ///
    /// Terminal until an operator resets the response.
    PipelineFailed {
        call_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Operator changed the candidate disposition
    DispositionChanged {
        call_id: String,
        disposition: String,
        timestamp: DateTime<Utc>,
    },
}

impl VivaEvent {
    /// Event type name used as the SSE event field
    pub fn event_type(&self) -> &'static str {
        match self {
            VivaEvent::ResponseRegistered { .. } => "ResponseRegistered",
            VivaEvent::CallStarted { .. } => "CallStarted",
            VivaEvent::CallEnded { .. } => "CallEnded",
            VivaEvent::AnalyticsReady { .. } => "AnalyticsReady",
            VivaEvent::PipelineFailed { .. } => "PipelineFailed",
            VivaEvent::DispositionChanged { .. } => "DispositionChanged",
        }
    }

    /// Call id the event refers to
    pub fn call_id(&self) -> &str {
        match self {
            VivaEvent::ResponseRegistered { call_id, .. }
            | VivaEvent::CallStarted { call_id, .. }
            | VivaEvent::CallEnded { call_id, .. }
            | VivaEvent::AnalyticsReady { call_id, .. }
            | VivaEvent::PipelineFailed { call_id, .. }
            | VivaEvent::DispositionChanged { call_id, .. } => call_id,
        }
    }
}

/// Broadcast event bus shared by all components
///
/// Thin wrapper over `tokio::sync::broadcast` so components don't couple to
/// the channel type directly. Cloning is cheap; all clones share the same
/// channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<VivaEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<VivaEvent> {
        self.sender.subscribe()
    }

    /// Emit an event; errors when there are no subscribers
    pub fn emit(
        &self,
        event: VivaEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<VivaEvent>> {
        self.sender.send(event)
    }

    /// Emit an event, dropping it silently when nobody is listening
    ///
    /// Lifecycle transitions must not fail because no SSE client happens to
    /// be connected.
    pub fn emit_lossy(&self, event: VivaEvent) {
        if let Err(err) = self.sender.send(event) {
            tracing::trace!(event = err.0.event_type(), "No subscribers for event");
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
