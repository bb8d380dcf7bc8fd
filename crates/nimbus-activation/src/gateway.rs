//! Remote query surface consumed by the selector and batch fetcher.

use async_trait::async_trait;
use serde_json::Value;

use crate::model::{ActivationOutput, ListQuery, ListResponse};

/// Activation queries exposed by the platform's management API.
///
/// Every call is a suspension point; implementations must not block.
#[async_trait]
pub trait RuntimeQueryGateway: Send + Sync {
    /// List activations matching `query`, most recent first.
    async fn list(&self, query: &ListQuery) -> anyhow::Result<ListResponse>;

    /// Retrieve the full activation record.
    async fn get(&self, activation_id: &str) -> anyhow::Result<Value>;

    /// Retrieve the ordered log lines of an activation.
    async fn logs(&self, activation_id: &str) -> anyhow::Result<Vec<String>>;

    /// Retrieve the result payload of an activation.
    async fn result(&self, activation_id: &str) -> anyhow::Result<ActivationOutput>;
}
