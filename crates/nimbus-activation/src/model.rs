//! Activation records, listing queries, and selection criteria.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound applied to every "most recent N" request.
pub const MAX_LIMIT: u32 = 200;

/// Number of activations selected when no limit is supplied.
pub const DEFAULT_LIMIT: i64 = 1;

/// Key/value metadata attached to an activation by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation key (e.g. `kind`, `initTime`, `path`).
    pub key: String,
    /// Arbitrary JSON value.
    pub value: Value,
}

/// Summary of a single activation as returned by the listing endpoint.
///
/// Refs built from a user-supplied id only carry `activation_id`. Fields not
/// modelled here are kept in `extra` so full records survive a round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRef {
    /// Platform-assigned activation identifier.
    pub activation_id: String,
    /// Entity name (action or trigger).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Namespace that owns the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Entity version at activation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Numeric outcome; see [`crate::format::status_to_string`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
    /// Start timestamp (epoch milliseconds on the wire).
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start: Option<DateTime<Utc>>,
    /// End timestamp (epoch milliseconds on the wire).
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<DateTime<Utc>>,
    /// Run time in milliseconds; absent for trigger activations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Ordered platform annotations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    /// Remaining record fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActivationRef {
    /// Build a ref that only knows its identifier.
    #[must_use]
    pub fn from_id(activation_id: impl Into<String>) -> Self {
        Self {
            activation_id: activation_id.into(),
            ..Self::default()
        }
    }

    /// Look up the first annotation with the given key.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&Value> {
        self.annotations
            .iter()
            .find(|annotation| annotation.key == key)
            .map(|annotation| &annotation.value)
    }

    /// Trigger activations carry no duration.
    #[must_use]
    pub const fn is_trigger(&self) -> bool {
        self.duration.is_none()
    }
}

/// Clamp a requested page size into `1..=MAX_LIMIT`; out-of-range values are capped, never rejected.
#[must_use]
pub fn clamp_limit(limit: i64) -> u32 {
    let clamped = limit.clamp(1, i64::from(MAX_LIMIT));
    u32::try_from(clamped).unwrap_or(MAX_LIMIT)
}

/// Options accepted by the activation listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    /// Maximum number of records to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Number of most recent records to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    /// Restrict to activations of a named entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Only activations started after this epoch-millisecond instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    /// Only activations started before this epoch-millisecond instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upto: Option<u64>,
    /// Return full activation documents.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub docs: bool,
    /// Return only the number of matching activations.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub count: bool,
}

/// Body returned by a count-only listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationCount {
    /// Number of activations in the namespace.
    pub activations: u64,
}

/// Listing endpoint response: records, or a count when `count` was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListResponse {
    /// Matching activation records, most recent first.
    Activations(Vec<ActivationRef>),
    /// Count-only response.
    Count(ActivationCount),
}

/// Payload of the per-activation result endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationOutput {
    /// JSON value produced by the action.
    #[serde(default)]
    pub result: Value,
    /// Platform status string (e.g. `success`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Whether the activation succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// User-supplied inputs describing which activations a command targets.
///
/// An explicit id always wins; otherwise `use_last` resolves through a single
/// listing query bounded by `limit`, `skip`, and `name_filter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCriteria {
    /// Activation id given on the command line.
    pub explicit_id: Option<String>,
    /// Select the most recent activations instead of a named one.
    pub use_last: bool,
    /// Requested number of activations; clamped to `1..=MAX_LIMIT`.
    pub limit: i64,
    /// Number of most recent activations to skip.
    pub skip: u32,
    /// Restrict the listing to a named entity.
    pub name_filter: Option<String>,
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            explicit_id: None,
            use_last: false,
            limit: DEFAULT_LIMIT,
            skip: 0,
            name_filter: None,
        }
    }
}

impl SelectionCriteria {
    /// Target a single activation by id.
    #[must_use]
    pub fn explicit(activation_id: impl Into<String>) -> Self {
        Self {
            explicit_id: Some(activation_id.into()),
            ..Self::default()
        }
    }

    /// Target the `limit` most recent activations.
    #[must_use]
    pub fn last(limit: i64) -> Self {
        Self {
            use_last: true,
            limit,
            ..Self::default()
        }
    }

    /// Skip the given number of most recent activations.
    #[must_use]
    pub const fn with_skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    /// Restrict the listing to the named entity.
    #[must_use]
    pub fn with_name_filter(mut self, name: impl Into<String>) -> Self {
        self.name_filter = Some(name.into());
        self
    }

    /// Requested limit clamped into `1..=MAX_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        clamp_limit(self.limit)
    }

    /// Explicit id, ignoring blank input.
    #[must_use]
    pub fn explicit_id(&self) -> Option<&str> {
        self.explicit_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Listing query used to resolve "most recent" selections.
    #[must_use]
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            limit: Some(self.effective_limit()),
            skip: Some(self.skip),
            name: self.name_filter.clone(),
            ..ListQuery::default()
        }
    }
}
