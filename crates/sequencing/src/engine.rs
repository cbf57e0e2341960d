//! Sequencing engine — turns a trigger into time-anchored jobs and sweeps
//! due jobs through the dispatcher.
//!
//! Scheduling is absolute: each step's fire instant is the trigger instant
//! plus that step's delay, compared against whatever `now` the caller
//! supplies. The engine itself never sleeps or arms timers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use cadence_core::delivery::{EmailProvider, EntityResolver};
use cadence_core::event_bus::{make_event, EventSink, EventType};
use cadence_core::{CadenceError, CadenceResult};

use crate::catalog::SequenceCatalog;
use crate::dispatcher::Dispatcher;
use crate::store::JobStore;
use crate::types::{DispatchOutcome, Job, JobState, StoreStatus};

/// Core orchestration object. Owns the catalog and job store; delivery and
/// entity lookup are injected, so the whole engine runs against test sinks.
pub struct SequenceEngine {
    catalog: Arc<SequenceCatalog>,
    store: Arc<JobStore>,
    dispatcher: Dispatcher,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for SequenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceEngine")
            .field("sequences", &self.catalog.len())
            .field("jobs", &self.store.len())
            .finish()
    }
}

impl SequenceEngine {
    /// Creates an engine with an empty catalog and job store.
    pub fn new(
        resolver: Arc<dyn EntityResolver>,
        provider: Arc<dyn EmailProvider>,
        max_attempts: u32,
    ) -> Self {
        let catalog = Arc::new(SequenceCatalog::new());
        let store = Arc::new(JobStore::new());
        let dispatcher = Dispatcher::new(
            store.clone(),
            catalog.clone(),
            resolver,
            provider,
            max_attempts,
        );
        Self {
            catalog,
            store,
            dispatcher,
            events: cadence_core::event_bus::noop_sink(),
        }
    }

    /// Attach an event sink for emitting lifecycle events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink.clone();
        self.dispatcher = self.dispatcher.with_event_sink(sink);
        self
    }

    /// The sequence registry, for seeding and runtime registration.
    pub fn catalog(&self) -> &Arc<SequenceCatalog> {
        &self.catalog
    }

    /// Returns a snapshot of the job with the given id.
    pub fn job(&self, id: &Uuid) -> Option<Job> {
        self.store.get(id)
    }

    /// Trigger a sequence for an entity, anchored at the current instant.
    pub fn start_sequence(
        &self,
        entity_id: &str,
        sequence_id: &str,
        bindings: HashMap<String, String>,
    ) -> CadenceResult<Vec<Uuid>> {
        self.start_sequence_at(entity_id, sequence_id, bindings, Utc::now())
    }

    /// Trigger a sequence anchored at an explicit instant. Creates exactly
    /// one job per step, then synchronously dispatches every zero-delay step
    /// so the welcome message is visible to the caller without waiting for a
    /// sweep. Returns every created job id, dispatched or not.
    pub fn start_sequence_at(
        &self,
        entity_id: &str,
        sequence_id: &str,
        bindings: HashMap<String, String>,
        trigger: DateTime<Utc>,
    ) -> CadenceResult<Vec<Uuid>> {
        let sequence = self
            .catalog
            .get(sequence_id)
            .ok_or_else(|| CadenceError::SequenceNotFound(sequence_id.to_string()))?;

        let mut job_ids = Vec::with_capacity(sequence.steps.len());
        let mut immediate = Vec::new();
        for step in &sequence.steps {
            let job = Job {
                id: Uuid::new_v4(),
                entity_id: entity_id.to_string(),
                sequence_id: sequence.id.clone(),
                step_id: step.id.clone(),
                fire_at: trigger + Duration::seconds(step.delay_secs as i64),
                state: JobState::Pending,
                attempts: 0,
                bindings: bindings.clone(),
                created_at: trigger,
                seq: 0,
            };
            let id = self.store.insert(job)?;
            job_ids.push(id);
            if step.delay_secs == 0 {
                immediate.push(id);
            }
        }

        info!(
            entity_id = %entity_id,
            sequence_id = %sequence_id,
            jobs = job_ids.len(),
            "Sequence started"
        );
        self.events.emit(make_event(
            EventType::SequenceStarted,
            Some(entity_id.to_string()),
            Some(sequence_id.to_string()),
            None,
        ));

        for id in &immediate {
            self.dispatcher.dispatch(id);
        }

        Ok(job_ids)
    }

    /// One sweep: dispatch every due pending job as of `now`, sequentially.
    /// Returns how many jobs were actually processed; jobs lost to a
    /// concurrent sweep's reservation are not counted.
    pub fn process(&self, now: DateTime<Utc>) -> usize {
        let due = self.store.due_jobs(now);
        let mut processed = 0;
        for job in &due {
            if self.dispatcher.dispatch(&job.id) != DispatchOutcome::Skipped {
                processed += 1;
            }
        }
        debug!(due = due.len(), processed, "Sweep complete");
        processed
    }

    /// Sweep anchored at the current instant.
    pub fn sweep(&self) -> usize {
        self.process(Utc::now())
    }

    /// Aggregate job counts for operator visibility.
    pub fn status(&self) -> StoreStatus {
        self.store.status()
    }

    /// Delete all sent jobs, leaving pending and failed untouched.
    pub fn purge_sent(&self) -> usize {
        let removed = self.store.purge_sent();
        if removed > 0 {
            info!(removed, "Purged sent jobs");
            self.events
                .emit(make_event(EventType::JobsPurged, None, None, None));
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use cadence_core::delivery::{capture_provider, CaptureProvider, InMemoryResolver};
    use cadence_core::event_bus::capture_sink;

    use crate::types::{SequenceDefinition, StepDefinition};

    fn step(id: &str, delay_secs: u64) -> StepDefinition {
        StepDefinition {
            id: id.to_string(),
            label: id.to_string(),
            subject: format!("{} for {{{{firstName}}}}", id),
            html_body: format!("<p>{} {{{{firstName}}}}</p>", id),
            text_body: format!("{} {{{{firstName}}}}", id),
            delay_secs,
            cta: None,
        }
    }

    fn trial_sequence() -> SequenceDefinition {
        SequenceDefinition {
            id: "trial".to_string(),
            name: "Trial".to_string(),
            description: String::new(),
            steps: vec![step("welcome", 0), step("follow-up", 48 * 3600)],
        }
    }

    fn lead_bindings() -> HashMap<String, String> {
        HashMap::from([
            ("firstName".to_string(), "Ada".to_string()),
            ("email".to_string(), "ada@example.com".to_string()),
        ])
    }

    fn engine_with(provider: Arc<CaptureProvider>) -> SequenceEngine {
        let resolver = InMemoryResolver::new();
        resolver.insert("lead-42", lead_bindings());
        let engine = SequenceEngine::new(Arc::new(resolver), provider, 3);
        engine.catalog().register(trial_sequence()).unwrap();
        engine
    }

    #[test]
    fn test_one_job_per_step_with_distinct_step_ids() {
        let engine = engine_with(capture_provider());

        let job_ids = engine
            .start_sequence("lead-42", "trial", HashMap::new())
            .unwrap();
        assert_eq!(job_ids.len(), 2);

        let step_ids: HashSet<String> = job_ids
            .iter()
            .map(|id| engine.job(id).unwrap().step_id)
            .collect();
        assert_eq!(
            step_ids,
            HashSet::from(["welcome".to_string(), "follow-up".to_string()])
        );
    }

    #[test]
    fn test_unknown_sequence_creates_no_jobs() {
        let engine = engine_with(capture_provider());

        let result = engine.start_sequence("lead-42", "does-not-exist", HashMap::new());
        assert!(matches!(result, Err(CadenceError::SequenceNotFound(_))));
        assert_eq!(engine.status().total, 0);
    }

    #[test]
    fn test_zero_delay_step_dispatched_before_return() {
        let provider = capture_provider();
        let engine = engine_with(provider.clone());

        engine
            .start_sequence("lead-42", "trial", HashMap::new())
            .unwrap();

        assert_eq!(provider.count(), 1);
        assert_eq!(provider.sent()[0].subject, "welcome for Ada");

        let status = engine.status();
        assert_eq!(status.total, 2);
        assert_eq!(status.pending, 1);
        assert_eq!(status.sent, 1);
        assert_eq!(status.failed, 0);
    }

    #[test]
    fn test_delayed_step_waits_for_its_instant() {
        let provider = capture_provider();
        let engine = engine_with(provider.clone());
        let trigger = Utc::now();

        engine
            .start_sequence_at("lead-42", "trial", HashMap::new(), trigger)
            .unwrap();
        assert_eq!(provider.count(), 1);

        // One hour short of the follow-up delay: nothing new.
        assert_eq!(engine.process(trigger + Duration::hours(47)), 0);
        assert_eq!(provider.count(), 1);

        // Past the delay: exactly the second job.
        assert_eq!(engine.process(trigger + Duration::hours(49)), 1);
        assert_eq!(provider.count(), 2);
        assert_eq!(provider.sent()[1].subject, "follow-up for Ada");
    }

    #[test]
    fn test_repeated_sweeps_never_double_send() {
        let provider = capture_provider();
        let engine = engine_with(provider.clone());
        let trigger = Utc::now();

        engine
            .start_sequence_at("lead-42", "trial", HashMap::new(), trigger)
            .unwrap();

        let later = trigger + Duration::hours(50);
        engine.process(later);
        engine.process(later);
        engine.process(later + Duration::hours(1));

        // One welcome plus one follow-up, regardless of sweep count.
        assert_eq!(provider.count(), 2);
        assert_eq!(provider.count_to("ada@example.com"), 2);
    }

    #[test]
    fn test_status_invariant_holds_after_every_operation() {
        let provider = capture_provider();
        let engine = engine_with(provider.clone());
        let trigger = Utc::now();

        let check = |engine: &SequenceEngine| {
            let s = engine.status();
            assert_eq!(s.total, s.pending + s.sent + s.failed);
        };

        check(&engine);
        engine
            .start_sequence_at("lead-42", "trial", HashMap::new(), trigger)
            .unwrap();
        check(&engine);
        engine.process(trigger + Duration::hours(49));
        check(&engine);
        engine.purge_sent();
        check(&engine);
    }

    #[test]
    fn test_purge_sent_removes_only_sent() {
        let provider = capture_provider();
        let engine = engine_with(provider);
        let trigger = Utc::now();

        engine
            .start_sequence_at("lead-42", "trial", HashMap::new(), trigger)
            .unwrap();

        // Welcome is sent, follow-up still pending.
        assert_eq!(engine.purge_sent(), 1);
        let status = engine.status();
        assert_eq!(status.total, 1);
        assert_eq!(status.pending, 1);
        assert_eq!(status.sent, 0);

        // Nothing left to purge.
        assert_eq!(engine.purge_sent(), 0);
    }

    #[test]
    fn test_always_failing_provider_exhausts_attempts() {
        let provider = capture_provider();
        provider.set_always_fail(true);
        let engine = engine_with(provider.clone());
        let trigger = Utc::now();

        let job_ids = engine
            .start_sequence_at("lead-42", "trial", HashMap::new(), trigger)
            .unwrap();
        let welcome = job_ids[0];

        // The synchronous dispatch burned attempt 1; two sweeps exhaust the
        // remaining attempts, a third finds nothing to do.
        assert_eq!(engine.job(&welcome).unwrap().attempts, 1);
        engine.process(trigger);
        engine.process(trigger);
        engine.process(trigger);

        let job = engine.job(&welcome).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts, 3);
        assert_eq!(provider.count(), 0);
        assert_eq!(engine.status().failed, 1);
    }

    #[test]
    fn test_recovery_after_transient_provider_outage() {
        let provider = capture_provider();
        provider.fail_next(1);
        let engine = engine_with(provider.clone());
        let trigger = Utc::now();

        let job_ids = engine
            .start_sequence_at("lead-42", "trial", HashMap::new(), trigger)
            .unwrap();

        // Welcome failed once and is pending again.
        assert_eq!(engine.job(&job_ids[0]).unwrap().state, JobState::Pending);

        engine.process(trigger);
        let job = engine.job(&job_ids[0]).unwrap();
        assert_eq!(job.state, JobState::Sent);
        assert_eq!(job.attempts, 1);
        assert_eq!(provider.count(), 1);
    }

    #[test]
    fn test_events_emitted_across_lifecycle() {
        let provider = capture_provider();
        let resolver = InMemoryResolver::new();
        resolver.insert("lead-42", lead_bindings());
        let sink = capture_sink();
        let engine = SequenceEngine::new(Arc::new(resolver), provider, 3)
            .with_event_sink(sink.clone());
        engine.catalog().register(trial_sequence()).unwrap();
        let trigger = Utc::now();

        engine
            .start_sequence_at("lead-42", "trial", HashMap::new(), trigger)
            .unwrap();
        engine.process(trigger + Duration::hours(49));
        engine.purge_sent();

        assert_eq!(sink.count_type(EventType::SequenceStarted), 1);
        assert_eq!(sink.count_type(EventType::MessageSent), 2);
        assert_eq!(sink.count_type(EventType::JobsPurged), 1);
    }
}
