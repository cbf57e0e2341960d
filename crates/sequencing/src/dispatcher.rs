//! Dispatch — resolves one job to a rendered message and hands it to the
//! provider, marking the job sent on success.
//!
//! The Pending->Sending compare-and-set is the send-gate: only the sweep
//! that wins the reservation renders and delivers, so overlapping sweeps
//! can never double-send a job. Resolution failures and provider failures
//! share the bounded retry path.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use cadence_core::delivery::{EmailProvider, EntityResolver};
use cadence_core::event_bus::{make_event, EventSink, EventType};

use crate::catalog::SequenceCatalog;
use crate::store::JobStore;
use crate::templating::render_step;
use crate::types::{DispatchOutcome, Job, JobState};

pub struct Dispatcher {
    store: Arc<JobStore>,
    catalog: Arc<SequenceCatalog>,
    resolver: Arc<dyn EntityResolver>,
    provider: Arc<dyn EmailProvider>,
    events: Arc<dyn EventSink>,
    max_attempts: u32,
}

impl Dispatcher {
    pub fn new(
        store: Arc<JobStore>,
        catalog: Arc<SequenceCatalog>,
        resolver: Arc<dyn EntityResolver>,
        provider: Arc<dyn EmailProvider>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            catalog,
            resolver,
            provider,
            events: cadence_core::event_bus::noop_sink(),
            max_attempts,
        }
    }

    /// Attach an event sink for emitting lifecycle events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Attempt delivery of one job. Returns `Skipped` without side effects
    /// when the job is missing, already terminal, or reserved by a
    /// concurrent sweep.
    pub fn dispatch(&self, job_id: &Uuid) -> DispatchOutcome {
        if !self
            .store
            .transition(job_id, JobState::Pending, JobState::Sending)
        {
            return DispatchOutcome::Skipped;
        }

        // Reservation won; the job is ours until we settle it below.
        let job = match self.store.get(job_id) {
            Some(job) => job,
            None => return DispatchOutcome::Skipped,
        };

        let step = match self
            .catalog
            .get(&job.sequence_id)
            .and_then(|seq| seq.steps.into_iter().find(|s| s.id == job.step_id))
        {
            Some(step) => step,
            None => return self.settle_failure(&job, "step definition not found"),
        };

        // The entity may not be committed in the backing store yet, so a
        // missing entity rides the same retry path as a provider failure.
        let resolved = match self.resolver.resolve(&job.entity_id) {
            Some(bindings) => bindings,
            None => return self.settle_failure(&job, "entity not found"),
        };

        // Literal trigger bindings win over resolved ones.
        let mut bindings = resolved;
        bindings.extend(job.bindings.clone());

        let to = match bindings.get("email") {
            Some(email) => email.clone(),
            None => return self.settle_failure(&job, "entity has no email binding"),
        };

        let message = render_step(&step, &bindings);

        match self
            .provider
            .send(&to, &message.subject, &message.html_body, &message.text_body)
        {
            Ok(receipt) => {
                if !self
                    .store
                    .transition(job_id, JobState::Sending, JobState::Sent)
                {
                    return DispatchOutcome::Skipped;
                }
                debug!(
                    job_id = %job.id,
                    step_id = %job.step_id,
                    to = %to,
                    provider_message_id = ?receipt.provider_message_id,
                    "Job dispatched"
                );
                metrics::counter!(
                    "dispatch.sent",
                    "sequence" => job.sequence_id.clone()
                )
                .increment(1);
                self.events.emit(make_event(
                    EventType::MessageSent,
                    Some(job.entity_id.clone()),
                    Some(job.sequence_id.clone()),
                    Some(job.id),
                ));
                DispatchOutcome::Sent
            }
            Err(err) => self.settle_failure(&job, &err.0),
        }
    }

    /// Settle a reserved job after a failed attempt: back to pending while
    /// attempts remain, terminal failed otherwise.
    fn settle_failure(&self, job: &Job, reason: &str) -> DispatchOutcome {
        match self.store.retry_or_fail(&job.id, self.max_attempts) {
            Some(JobState::Pending) => {
                warn!(
                    job_id = %job.id,
                    step_id = %job.step_id,
                    reason = %reason,
                    "Delivery failed, job queued for retry"
                );
                metrics::counter!(
                    "dispatch.retried",
                    "sequence" => job.sequence_id.clone()
                )
                .increment(1);
                self.events.emit(make_event(
                    EventType::DeliveryRetried,
                    Some(job.entity_id.clone()),
                    Some(job.sequence_id.clone()),
                    Some(job.id),
                ));
                DispatchOutcome::Retried
            }
            Some(JobState::Failed) => {
                warn!(
                    job_id = %job.id,
                    step_id = %job.step_id,
                    reason = %reason,
                    "Delivery failed, attempts exhausted"
                );
                metrics::counter!(
                    "dispatch.failed",
                    "sequence" => job.sequence_id.clone()
                )
                .increment(1);
                self.events.emit(make_event(
                    EventType::JobFailed,
                    Some(job.entity_id.clone()),
                    Some(job.sequence_id.clone()),
                    Some(job.id),
                ));
                DispatchOutcome::Failed
            }
            _ => DispatchOutcome::Skipped,
        }
    }
}
