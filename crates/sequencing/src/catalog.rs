//! Sequence catalog — an open registry of named step sets.
//!
//! Two sequences ship by default (trial nurture and demo follow-up); callers
//! register additional sequences at wiring time without touching any other
//! component.

use dashmap::DashMap;
use tracing::info;

use cadence_core::{CadenceError, CadenceResult};

use crate::types::{CallToAction, SequenceDefinition, StepDefinition};

/// Read-only lookup plus registration of sequence definitions.
#[derive(Default)]
pub struct SequenceCatalog {
    sequences: DashMap<String, SequenceDefinition>,
}

impl SequenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a sequence. Re-registering an id replaces the
    /// previous definition.
    pub fn register(&self, definition: SequenceDefinition) -> CadenceResult<()> {
        if definition.id.is_empty() {
            return Err(CadenceError::InvalidSequence(
                "sequence id must not be empty".to_string(),
            ));
        }
        if definition.steps.is_empty() {
            return Err(CadenceError::InvalidSequence(format!(
                "sequence {} has no steps",
                definition.id
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for step in &definition.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(CadenceError::InvalidSequence(format!(
                    "sequence {} has duplicate step id {}",
                    definition.id, step.id
                )));
            }
        }

        info!(
            sequence_id = %definition.id,
            steps = definition.steps.len(),
            "Registered sequence"
        );
        self.sequences.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Returns a clone of the sequence with the given id, if registered.
    pub fn get(&self, id: &str) -> Option<SequenceDefinition> {
        self.sequences.get(id).map(|r| r.clone())
    }

    /// Returns all registered sequences.
    pub fn list(&self) -> Vec<SequenceDefinition> {
        self.sequences.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Seeds the two sequences that ship with the product.
    pub fn seed_builtin(&self) {
        info!("Seeding built-in sequences");

        let trial_nurture = SequenceDefinition {
            id: "trial-nurture".to_string(),
            name: "Trial Nurture".to_string(),
            description: "Convert new trial signups into paying customers".to_string(),
            steps: vec![
                StepDefinition {
                    id: "welcome".to_string(),
                    label: "Welcome".to_string(),
                    subject: "Welcome to {{product}}, {{firstName}}!".to_string(),
                    html_body: "<h1>Hi {{firstName}},</h1><p>Your {{product}} trial is live. \
                                Here is everything you need to get started.</p>"
                        .to_string(),
                    text_body: "Hi {{firstName}}, your {{product}} trial is live. Here is \
                                everything you need to get started."
                        .to_string(),
                    delay_secs: 0,
                    cta: Some(CallToAction {
                        label: "Open your dashboard".to_string(),
                        url: "https://app.leadcadence.io/dashboard".to_string(),
                    }),
                },
                StepDefinition {
                    id: "getting-started".to_string(),
                    label: "Getting Started Tips".to_string(),
                    subject: "{{firstName}}, three ways to get more from your trial".to_string(),
                    html_body: "<p>Hi {{firstName}}, teams at {{company}} usually start with \
                                these three features.</p>"
                        .to_string(),
                    text_body: "Hi {{firstName}}, teams at {{company}} usually start with \
                                these three features."
                        .to_string(),
                    delay_secs: 48 * 3600,
                    cta: Some(CallToAction {
                        label: "See the guide".to_string(),
                        url: "https://leadcadence.io/guides/getting-started".to_string(),
                    }),
                },
                StepDefinition {
                    id: "trial-ending".to_string(),
                    label: "Trial Ending".to_string(),
                    subject: "Your {{product}} trial ends soon".to_string(),
                    html_body: "<p>Hi {{firstName}}, your trial wraps up in a few days. \
                                Pick a plan to keep your campaigns running.</p>"
                        .to_string(),
                    text_body: "Hi {{firstName}}, your trial wraps up in a few days. Pick a \
                                plan to keep your campaigns running."
                        .to_string(),
                    delay_secs: 10 * 24 * 3600,
                    cta: Some(CallToAction {
                        label: "Choose a plan".to_string(),
                        url: "https://leadcadence.io/pricing".to_string(),
                    }),
                },
            ],
        };

        let demo_follow_up = SequenceDefinition {
            id: "demo-follow-up".to_string(),
            name: "Demo Follow-up".to_string(),
            description: "Keep momentum after a product demo".to_string(),
            steps: vec![
                StepDefinition {
                    id: "recap".to_string(),
                    label: "Demo Recap".to_string(),
                    subject: "Thanks for your time today, {{firstName}}".to_string(),
                    html_body: "<p>Hi {{firstName}}, here is a recap of what we covered and \
                                the recording link.</p>"
                        .to_string(),
                    text_body: "Hi {{firstName}}, here is a recap of what we covered and the \
                                recording link."
                        .to_string(),
                    delay_secs: 0,
                    cta: None,
                },
                StepDefinition {
                    id: "case-study".to_string(),
                    label: "Case Study".to_string(),
                    subject: "How teams like {{company}} use {{product}}".to_string(),
                    html_body: "<p>Hi {{firstName}}, this case study mirrors what {{company}} \
                                is trying to do.</p>"
                        .to_string(),
                    text_body: "Hi {{firstName}}, this case study mirrors what {{company}} is \
                                trying to do."
                        .to_string(),
                    delay_secs: 24 * 3600,
                    cta: Some(CallToAction {
                        label: "Read the case study".to_string(),
                        url: "https://leadcadence.io/customers".to_string(),
                    }),
                },
                StepDefinition {
                    id: "check-in".to_string(),
                    label: "Check-in".to_string(),
                    subject: "Any open questions, {{firstName}}?".to_string(),
                    html_body: "<p>Hi {{firstName}}, happy to walk through pricing or set up \
                                a pilot whenever you are ready.</p>"
                        .to_string(),
                    text_body: "Hi {{firstName}}, happy to walk through pricing or set up a \
                                pilot whenever you are ready."
                        .to_string(),
                    delay_secs: 72 * 3600,
                    cta: None,
                },
            ],
        };

        let _ = self.register(trial_nurture);
        let _ = self.register(demo_follow_up);

        info!("Seeded 2 built-in sequences");
    }
}
