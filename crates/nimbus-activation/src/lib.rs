#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Activation selection, batch retrieval, and display helpers for the Nimbus CLI.
//!
//! Layout:
//! - `model.rs`: activation records, listing queries, and selection criteria
//! - `gateway.rs`: the remote query surface implemented by transport adapters
//! - `selector.rs`: resolves which activations a command operates on
//! - `batch.rs`: concurrent per-activation fetches with ordered, per-item outcomes
//! - `format.rs`: banners, status labels, and other pure renderers
//! - `error.rs`: selection and fetch error taxonomy

pub mod batch;
pub mod error;
pub mod format;
pub mod gateway;
pub mod model;
pub mod selector;

pub use batch::{Batch, FetchResult, fetch_all, fetch_logs, fetch_records, fetch_results};
pub use error::{ActivationError, ActivationResult, FetchError};
pub use format::{Warmth, classify_warmth, make_banner, make_banner_in, status_to_string};
pub use gateway::RuntimeQueryGateway;
pub use model::{
    ActivationCount, ActivationOutput, ActivationRef, Annotation, DEFAULT_LIMIT, ListQuery,
    ListResponse, MAX_LIMIT, SelectionCriteria, clamp_limit,
};
pub use selector::ActivationSelector;
