//! Delivery collaborator traits — the narrow seams between the sequencing
//! engine and the outside world.
//!
//! `EmailProvider` is the outbound transport (SMTP relay, HTTP email API, or
//! a test sink); `EntityResolver` supplies the variable bindings for a lead
//! or user from whatever store holds them. The engine depends only on these
//! signatures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Receipt returned by a provider for an accepted message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub provider_message_id: Option<String>,
}

/// Transport-level delivery failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Trait for the outbound email transport.
pub trait EmailProvider: Send + Sync {
    fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Trait for resolving a subject entity into template bindings
/// (name, email, company, ...). `None` means the entity is unknown, which
/// callers treat as transient: the entity may not yet be committed in the
/// backing store.
pub trait EntityResolver: Send + Sync {
    fn resolve(&self, entity_id: &str) -> Option<HashMap<String, String>>;
}

/// Log-only provider: accepts every message and emits a tracing line.
pub struct LogProvider;

impl EmailProvider for LogProvider {
    fn send(
        &self,
        to: &str,
        subject: &str,
        _html: &str,
        _text: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        info!(to = %to, subject = %subject, "Email accepted by log sink");
        Ok(DeliveryReceipt {
            provider_message_id: Some(format!("log-{}", uuid::Uuid::new_v4())),
        })
    }
}

/// A message recorded by [`CaptureProvider`].
#[derive(Debug, Clone)]
pub struct CapturedMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// In-memory provider that records every send for assertions. Failures can
/// be scripted with [`CaptureProvider::fail_next`] or
/// [`CaptureProvider::set_always_fail`].
#[derive(Default)]
pub struct CaptureProvider {
    sent: Mutex<Vec<CapturedMessage>>,
    fail_next: AtomicU32,
    always_fail: AtomicBool,
}

impl CaptureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` send calls before accepting again.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<CapturedMessage> {
        self.sent.lock().expect("capture provider mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().expect("capture provider mutex poisoned").len()
    }

    /// How many messages were sent to the given address.
    pub fn count_to(&self, to: &str) -> usize {
        self.sent
            .lock()
            .expect("capture provider mutex poisoned")
            .iter()
            .filter(|m| m.to == to)
            .count()
    }
}

impl EmailProvider for CaptureProvider {
    fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        if self.always_fail.load(Ordering::SeqCst) {
            return Err(DeliveryError("provider unavailable".to_string()));
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DeliveryError("scripted failure".to_string()));
        }

        self.sent
            .lock()
            .expect("capture provider mutex poisoned")
            .push(CapturedMessage {
                to: to.to_string(),
                subject: subject.to_string(),
                html: html.to_string(),
                text: text.to_string(),
            });
        Ok(DeliveryReceipt::default())
    }
}

/// DashMap-backed resolver for tests and the demo binary.
#[derive(Default)]
pub struct InMemoryResolver {
    entities: DashMap<String, HashMap<String, String>>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity_id: impl Into<String>, bindings: HashMap<String, String>) {
        self.entities.insert(entity_id.into(), bindings);
    }

    pub fn remove(&self, entity_id: &str) {
        self.entities.remove(entity_id);
    }
}

impl EntityResolver for InMemoryResolver {
    fn resolve(&self, entity_id: &str) -> Option<HashMap<String, String>> {
        self.entities.get(entity_id).map(|e| e.clone())
    }
}

/// Convenience: a capture provider for tests.
pub fn capture_provider() -> Arc<CaptureProvider> {
    Arc::new(CaptureProvider::new())
}
