//! HTTP implementation of the activation query gateway.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use nimbus_activation::{ActivationOutput, ListQuery, ListResponse, RuntimeQueryGateway};
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::client::{AppContext, CliResult, describe_problem};

#[derive(Deserialize)]
struct LogsBody {
    #[serde(default)]
    logs: Vec<String>,
}

/// Queries the platform's activation endpoints on behalf of the core selector and fetcher.
pub(crate) struct HttpRuntimeGateway<'a> {
    ctx: &'a AppContext,
}

impl<'a> HttpRuntimeGateway<'a> {
    /// Create a gateway; fails early when no credential is configured.
    pub(crate) fn new(ctx: &'a AppContext) -> CliResult<Self> {
        ctx.credentials()?;
        Ok(Self { ctx })
    }

    fn activations_url(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut all = vec!["activations"];
        all.extend_from_slice(segments);
        self.ctx
            .namespace_url(None, &all)
            .map_err(|err| anyhow!(err.display_message()))
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> anyhow::Result<T> {
        debug!(url = %url, "querying activations endpoint");
        let request = self
            .ctx
            .authorize(self.ctx.client.get(url.clone()))
            .map_err(|err| anyhow!(err.display_message()))?;
        let response = request
            .send()
            .await
            .with_context(|| format!("request to {} failed", url.path()))?;

        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await.unwrap_or_default();
            return Err(anyhow!(describe_problem(status, &bytes)));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to parse response from {}", url.path()))
    }
}

#[async_trait]
impl RuntimeQueryGateway for HttpRuntimeGateway<'_> {
    async fn list(&self, query: &ListQuery) -> anyhow::Result<ListResponse> {
        let mut url = self.activations_url(&[])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
            if let Some(skip) = query.skip {
                pairs.append_pair("skip", &skip.to_string());
            }
            if let Some(name) = &query.name {
                pairs.append_pair("name", name);
            }
            if let Some(since) = query.since {
                pairs.append_pair("since", &since.to_string());
            }
            if let Some(upto) = query.upto {
                pairs.append_pair("upto", &upto.to_string());
            }
            if query.docs {
                pairs.append_pair("docs", "true");
            }
            if query.count {
                pairs.append_pair("count", "true");
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        self.fetch(url).await
    }

    async fn get(&self, activation_id: &str) -> anyhow::Result<Value> {
        let url = self.activations_url(&[activation_id])?;
        self.fetch(url).await
    }

    async fn logs(&self, activation_id: &str) -> anyhow::Result<Vec<String>> {
        let url = self.activations_url(&[activation_id, "logs"])?;
        let body: LogsBody = self.fetch(url).await?;
        Ok(body.logs)
    }

    async fn result(&self, activation_id: &str) -> anyhow::Result<ActivationOutput> {
        let url = self.activations_url(&[activation_id, "result"])?;
        self.fetch(url).await
    }
}
