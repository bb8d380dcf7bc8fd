//! Shared client utilities, error types, and telemetry wiring for the CLI.

use std::fmt::{self, Display, Formatter};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use nimbus_activation::ActivationError;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const API_PREFIX: [&str; 3] = ["api", "v1", "namespaces"];

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    /// Prefix the message while keeping the exit class.
    pub(crate) fn context(self, context: impl Display) -> Self {
        match self {
            Self::Validation(message) => Self::Validation(format!("{context}: {message}")),
            Self::Failure(error) => Self::Failure(error.context(context.to_string())),
        }
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

impl From<ActivationError> for CliError {
    fn from(error: ActivationError) -> Self {
        match error {
            ActivationError::MissingIdentifier => Self::Validation(error.to_string()),
            other => Self::Failure(other.into()),
        }
    }
}

/// Dependencies constructed from environment flags and CLI options.
#[derive(Clone)]
pub(crate) struct CliDependencies {
    pub(crate) client: Client,
    pub(crate) telemetry: Option<TelemetryEmitter>,
}

impl CliDependencies {
    /// Construct a configured HTTP client and optional telemetry emitter.
    pub(crate) fn from_env(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(Duration::from_secs(cli.timeout))
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            telemetry: TelemetryEmitter::from_env(),
        })
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) api_host: Url,
    pub(crate) namespace: String,
    pub(crate) auth: Option<AuthCredential>,
}

impl AppContext {
    /// Credential for platform requests; every management call is authenticated.
    pub(crate) fn credentials(&self) -> CliResult<&AuthCredential> {
        self.auth.as_ref().ok_or_else(|| {
            CliError::validation("an auth key is required (pass --auth or set NIMBUS_AUTH)")
        })
    }

    /// Build `{api_host}/api/v1/namespaces/{namespace}/{segments...}`.
    ///
    /// Entity names containing `/` (package members) expand into several segments.
    pub(crate) fn namespace_url(&self, namespace: Option<&str>, segments: &[&str]) -> CliResult<Url> {
        let namespace = namespace.unwrap_or(&self.namespace);
        let mut url = self.api_host.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| CliError::validation("API host must be an http(s) URL"))?;
            path.pop_if_empty();
            path.extend(API_PREFIX);
            path.push(namespace);
            for segment in segments {
                path.extend(segment.split('/').filter(|part| !part.is_empty()));
            }
        }
        Ok(url)
    }

    /// Attach basic-auth credentials to a request.
    pub(crate) fn authorize(&self, builder: RequestBuilder) -> CliResult<RequestBuilder> {
        let creds = self.credentials()?;
        Ok(builder.basic_auth(&creds.key_id, Some(&creds.secret)))
    }
}

/// Auth credential parsed from CLI flags or environment variables.
#[derive(Debug, Clone)]
pub(crate) struct AuthCredential {
    pub(crate) key_id: String,
    pub(crate) secret: String,
}

impl AuthCredential {
    #[must_use]
    pub(crate) fn header_value(&self) -> String {
        format!("{}:{}", self.key_id, self.secret)
    }
}

/// Telemetry emitter used to forward CLI outcomes.
#[derive(Clone)]
pub(crate) struct TelemetryEmitter {
    pub(crate) client: Client,
    pub(crate) endpoint: Url,
}

impl TelemetryEmitter {
    #[must_use]
    pub(crate) fn from_env() -> Option<Self> {
        let endpoint = std::env::var("NIMBUS_TELEMETRY_ENDPOINT").ok()?;
        let endpoint = endpoint.parse().ok()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .ok()?;
        Some(Self { client, endpoint })
    }

    pub(crate) async fn emit(
        &self,
        trace_id: &str,
        command: &str,
        outcome: &str,
        exit_code: i32,
        message: Option<&str>,
    ) {
        let event = TelemetryEvent {
            command,
            outcome,
            trace_id,
            exit_code,
            message,
            build: nimbus_telemetry::build_sha(),
            timestamp_ms: timestamp_now_ms(),
        };

        if let Err(err) = self
            .client
            .post(self.endpoint.clone())
            .json(&event)
            .send()
            .await
        {
            tracing::debug!(error = %err, "telemetry emit failed");
        }
    }
}

#[derive(Serialize)]
struct TelemetryEvent<'a> {
    command: &'a str,
    outcome: &'a str,
    trace_id: &'a str,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    build: &'a str,
    timestamp_ms: u64,
}

/// Parse the API host provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    let url = input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))?;
    if url.cannot_be_a_base() {
        return Err(format!("invalid URL '{input}': not a base URL"));
    }
    Ok(url)
}

/// Parse the auth key provided to the CLI.
pub(crate) fn parse_auth(input: Option<String>) -> CliResult<Option<AuthCredential>> {
    let Some(raw) = input else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    let (key_id, secret) = trimmed
        .split_once(':')
        .ok_or_else(|| CliError::validation("auth key must be provided as key:secret"))?;

    if key_id.trim().is_empty() || secret.trim().is_empty() {
        return Err(CliError::validation(
            "auth key components cannot be empty strings",
        ));
    }

    Ok(Some(AuthCredential {
        key_id: key_id.trim().to_string(),
        secret: secret.trim().to_string(),
    }))
}

/// Millisecond timestamp helper for telemetry.
#[must_use]
pub(crate) fn timestamp_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Error body returned by the platform (`{"error": ..., "code": ...}`).
#[derive(Debug, Deserialize)]
struct PlatformProblem {
    error: Option<String>,
    code: Option<String>,
}

/// Human-readable summary of a failed platform response.
pub(crate) fn describe_problem(status: StatusCode, bytes: &[u8]) -> String {
    let body_text = String::from_utf8_lossy(bytes).trim().to_string();
    let problem = serde_json::from_slice::<PlatformProblem>(bytes).ok();

    match problem.and_then(|problem| problem.error.map(|error| (error, problem.code))) {
        Some((error, Some(code))) => format!("{error} (status {status}, code {code})"),
        Some((error, None)) => format!("{error} (status {status})"),
        None if !body_text.is_empty() => format!("{body_text} (status {status})"),
        None => format!("request failed with status {status}"),
    }
}

/// Classify a failed response body into a CLI error.
pub(crate) fn classify_problem_bytes(status: StatusCode, bytes: &[u8]) -> CliError {
    let message = describe_problem(status, bytes);
    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        CliError::validation(message)
    } else {
        CliError::failure(anyhow!(message))
    }
}

/// Classify an HTTP response into a CLI error.
pub(crate) async fn classify_problem(response: reqwest::Response) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    classify_problem_bytes(status, &bytes)
}
