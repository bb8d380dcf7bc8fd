//! Concurrent per-activation fetches with ordered, per-item outcomes.
//!
//! All requests of a batch are driven by one join on the calling task: they
//! are dispatched in input order, settle in any order, and are reported in
//! input order. A failing member never cancels its siblings.

use std::future::Future;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ActivationError, ActivationResult, FetchError};
use crate::gateway::RuntimeQueryGateway;
use crate::model::{ActivationOutput, ActivationRef};

/// Outcome of fetching one activation, paired with the ref it was issued for.
#[derive(Debug)]
pub struct FetchResult<T> {
    /// Ref the fetch was issued for.
    pub activation: ActivationRef,
    /// Fetched payload or the per-item failure.
    pub outcome: Result<T, FetchError>,
}

impl<T> FetchResult<T> {
    /// Identifier the fetch was issued for.
    #[must_use]
    pub fn activation_id(&self) -> &str {
        &self.activation.activation_id
    }

    /// Whether the fetch produced a payload.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Ordered outcomes of a batch fetch; same order and cardinality as the input refs.
#[derive(Debug)]
pub struct Batch<T> {
    results: Vec<FetchResult<T>>,
}

impl<T> Batch<T> {
    /// Number of members in the batch.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the batch has no members.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Iterate outcomes in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, FetchResult<T>> {
        self.results.iter()
    }

    /// Iterate the per-item failures in input order.
    pub fn failures(&self) -> impl Iterator<Item = &FetchError> {
        self.results
            .iter()
            .filter_map(|item| item.outcome.as_ref().err())
    }

    /// Number of members that produced a payload.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|item| item.is_success()).count()
    }

    /// Number of members that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Keep the successful payloads, failing only when every member failed.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::AllFetchesFailed`] carrying the first
    /// failure when the batch is non-empty and no member succeeded.
    pub fn into_successes_or_error(self) -> ActivationResult<Vec<(ActivationRef, T)>> {
        let attempted = self.len();
        let mut successes = Vec::with_capacity(attempted);
        let mut first_failure = None;

        for item in self.results {
            match item.outcome {
                Ok(payload) => successes.push((item.activation, payload)),
                Err(err) => {
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }

        match first_failure {
            Some(source) if successes.is_empty() => {
                Err(ActivationError::AllFetchesFailed { attempted, source })
            }
            _ => Ok(successes),
        }
    }
}

impl<T> IntoIterator for Batch<T> {
    type Item = FetchResult<T>;
    type IntoIter = std::vec::IntoIter<FetchResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Batch<T> {
    type Item = &'a FetchResult<T>;
    type IntoIter = std::slice::Iter<'a, FetchResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Run `op` for every ref concurrently and collect the outcomes in input order.
///
/// Completions are correlated to refs by position, never by payload content.
pub async fn fetch_all<T, F, Fut>(refs: Vec<ActivationRef>, mut op: F) -> Batch<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    debug!(count = refs.len(), "dispatching activation fetches");
    let pending: Vec<Fut> = refs
        .iter()
        .map(|activation| op(activation.activation_id.clone()))
        .collect();
    let settled = join_all(pending).await;

    let results: Vec<FetchResult<T>> = refs
        .into_iter()
        .zip(settled)
        .map(|(activation, outcome)| {
            let outcome = outcome.map_err(|err| {
                warn!(
                    activation_id = %activation.activation_id,
                    error = %format!("{err:#}"),
                    "activation fetch failed"
                );
                FetchError::new(activation.activation_id.clone(), err)
            });
            FetchResult {
                activation,
                outcome,
            }
        })
        .collect();

    let batch = Batch { results };
    debug!(
        succeeded = batch.succeeded(),
        failed = batch.failed(),
        "activation fetches settled"
    );
    batch
}

/// Fetch full activation records.
pub async fn fetch_records<G>(gateway: &G, refs: Vec<ActivationRef>) -> Batch<Value>
where
    G: RuntimeQueryGateway + ?Sized,
{
    fetch_all(refs, |id| async move { gateway.get(&id).await }).await
}

/// Fetch activation log lines.
pub async fn fetch_logs<G>(gateway: &G, refs: Vec<ActivationRef>) -> Batch<Vec<String>>
where
    G: RuntimeQueryGateway + ?Sized,
{
    fetch_all(refs, |id| async move { gateway.logs(&id).await }).await
}

/// Fetch activation results.
pub async fn fetch_results<G>(gateway: &G, refs: Vec<ActivationRef>) -> Batch<ActivationOutput>
where
    G: RuntimeQueryGateway + ?Sized,
{
    fetch_all(refs, |id| async move { gateway.result(&id).await }).await
}
