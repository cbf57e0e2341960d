use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named, ordered set of step definitions representing a multi-touch
/// campaign. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<StepDefinition>,
}

/// One templated message plus its delay within a sequence.
///
/// The delay is measured from the trigger instant, not cumulatively from the
/// previous step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    /// Display label for dashboards.
    pub label: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub delay_secs: u64,
    pub cta: Option<CallToAction>,
}

/// Call-to-action metadata attached to a step for display surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToAction {
    pub label: String,
    pub url: String,
}

/// Lifecycle state of a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    /// Reserved by an in-flight dispatch; the winner of the Pending->Sending
    /// race is the only sweep that renders and delivers.
    Sending,
    Sent,
    Failed,
}

/// The scheduled, mutable record tracking one step's delivery for one
/// subject entity. Owned exclusively by the [`JobStore`](crate::JobStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub entity_id: String,
    pub sequence_id: String,
    pub step_id: String,
    pub fire_at: DateTime<Utc>,
    pub state: JobState,
    pub attempts: u32,
    /// Literal bindings captured at trigger time; merged over resolved
    /// entity bindings at dispatch.
    pub bindings: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    /// Monotonic insertion counter, the stable tie-break for due ordering.
    pub(crate) seq: u64,
}

/// Rendered message content, ready for the provider. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Aggregate job counts, for operator visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Delivered and marked sent.
    Sent,
    /// Delivery failed; the job returned to pending for a later sweep.
    Retried,
    /// Delivery failed with no attempts left; the job is terminal.
    Failed,
    /// Another sweep holds the job, or it is already terminal.
    Skipped,
}
