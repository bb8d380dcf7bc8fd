//! In-memory gateway that records calls and replays scripted responses.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use nimbus_activation::{
    ActivationOutput, ActivationRef, ListQuery, ListResponse, RuntimeQueryGateway,
};
use serde_json::Value;

#[derive(Default)]
struct Script {
    record: Option<Value>,
    logs: Option<Vec<String>>,
    result: Option<Value>,
    failure: Option<String>,
    delay: Duration,
}

/// Scripted [`RuntimeQueryGateway`] that records every call it receives.
///
/// Unknown ids fail with "activation not found". A per-id delay lets tests
/// force completions to arrive out of dispatch order.
#[derive(Default)]
pub struct RecordingGateway {
    listing: Option<ListResponse>,
    listing_failure: Option<String>,
    scripts: HashMap<String, Script>,
    list_calls: Mutex<Vec<ListQuery>>,
    dispatched: Mutex<Vec<String>>,
    settled: Mutex<Vec<String>>,
}

impl RecordingGateway {
    /// Create an empty gateway (empty listing, no known ids).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to listing calls with the given refs.
    #[must_use]
    pub fn with_listing(mut self, activations: Vec<ActivationRef>) -> Self {
        self.listing = Some(ListResponse::Activations(activations));
        self
    }

    /// Respond to listing calls with a count body.
    #[must_use]
    pub fn with_count(mut self, activations: u64) -> Self {
        self.listing = Some(ListResponse::Count(nimbus_activation::ActivationCount {
            activations,
        }));
        self
    }

    /// Fail listing calls with the given message.
    #[must_use]
    pub fn with_listing_failure(mut self, message: &str) -> Self {
        self.listing_failure = Some(message.to_string());
        self
    }

    /// Serve a full record for `activation_id`.
    #[must_use]
    pub fn with_record(mut self, activation_id: &str, record: Value) -> Self {
        self.script(activation_id).record = Some(record);
        self
    }

    /// Serve log lines for `activation_id`.
    #[must_use]
    pub fn with_logs(mut self, activation_id: &str, logs: &[&str]) -> Self {
        self.script(activation_id).logs = Some(logs.iter().map(ToString::to_string).collect());
        self
    }

    /// Serve a result payload for `activation_id`.
    #[must_use]
    pub fn with_result(mut self, activation_id: &str, result: Value) -> Self {
        self.script(activation_id).result = Some(result);
        self
    }

    /// Fail every request for `activation_id`.
    #[must_use]
    pub fn with_failure(mut self, activation_id: &str, message: &str) -> Self {
        self.script(activation_id).failure = Some(message.to_string());
        self
    }

    /// Delay every response for `activation_id`.
    #[must_use]
    pub fn with_delay(mut self, activation_id: &str, delay: Duration) -> Self {
        self.script(activation_id).delay = delay;
        self
    }

    /// Listing queries received so far.
    #[must_use]
    pub fn list_calls(&self) -> Vec<ListQuery> {
        lock(&self.list_calls).clone()
    }

    /// Activation ids in the order requests were issued.
    #[must_use]
    pub fn dispatched(&self) -> Vec<String> {
        lock(&self.dispatched).clone()
    }

    /// Activation ids in the order responses completed.
    #[must_use]
    pub fn settled(&self) -> Vec<String> {
        lock(&self.settled).clone()
    }

    fn script(&mut self, activation_id: &str) -> &mut Script {
        self.scripts.entry(activation_id.to_string()).or_default()
    }

    async fn respond<T>(
        &self,
        activation_id: &str,
        pick: impl FnOnce(&Script) -> Option<T>,
    ) -> anyhow::Result<T> {
        lock(&self.dispatched).push(activation_id.to_string());
        let script = self.scripts.get(activation_id);
        let delay = script.map_or(Duration::ZERO, |script| script.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        lock(&self.settled).push(activation_id.to_string());

        let script = script.ok_or_else(|| anyhow!("activation {activation_id} not found"))?;
        if let Some(message) = &script.failure {
            return Err(anyhow!(message.clone()));
        }
        pick(script).ok_or_else(|| anyhow!("activation {activation_id} not found"))
    }
}

#[async_trait]
impl RuntimeQueryGateway for RecordingGateway {
    async fn list(&self, query: &ListQuery) -> anyhow::Result<ListResponse> {
        lock(&self.list_calls).push(query.clone());
        if let Some(message) = &self.listing_failure {
            return Err(anyhow!(message.clone()));
        }
        Ok(self
            .listing
            .clone()
            .unwrap_or(ListResponse::Activations(Vec::new())))
    }

    async fn get(&self, activation_id: &str) -> anyhow::Result<Value> {
        self.respond(activation_id, |script| script.record.clone())
            .await
    }

    async fn logs(&self, activation_id: &str) -> anyhow::Result<Vec<String>> {
        self.respond(activation_id, |script| script.logs.clone())
            .await
    }

    async fn result(&self, activation_id: &str) -> anyhow::Result<ActivationOutput> {
        self.respond(activation_id, |script| {
            script.result.clone().map(|result| ActivationOutput {
                result,
                status: Some("success".to_string()),
                success: Some(true),
            })
        })
        .await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
