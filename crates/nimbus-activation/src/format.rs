//! Pure renderers for activation summaries, statuses, and log lines.

use std::fmt::{self, Display, Formatter};
use std::sync::LazyLock;

use chrono::{DateTime, Local, TimeZone, Utc};
use regex::Regex;

use crate::model::ActivationRef;

const BANNER_TIME_FORMAT: &str = "%m/%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static LOG_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+\s+(?:stdout|stderr):\s?").expect("log prefix regex"));

/// Map a platform status code to its display label.
#[must_use]
pub const fn status_to_string(status_code: Option<i64>) -> &'static str {
    match status_code {
        Some(0) => "success",
        Some(1) => "application error",
        Some(2) => "developer error",
        Some(3) => "system error",
        _ => "??",
    }
}

/// One-line summary shown ahead of per-activation output, in local time.
#[must_use]
pub fn make_banner(activation: &ActivationRef) -> String {
    make_banner_in(activation, &Local)
}

/// One-line summary rendered in the supplied time zone.
#[must_use]
pub fn make_banner_in<Tz>(activation: &ActivationRef, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let end = activation.end.map_or_else(
        || "--".to_string(),
        |end| end.with_timezone(tz).format(BANNER_TIME_FORMAT).to_string(),
    );
    format!(
        "=== {} ({}) {} {}:{}",
        activation.activation_id,
        status_to_string(activation.status_code),
        end,
        activation.name.as_deref().unwrap_or_default(),
        activation.version.as_deref().unwrap_or_default()
    )
}

/// Whether an action activation needed a fresh execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warmth {
    /// An `initTime` annotation is present.
    Cold,
    /// Action activation without `initTime`.
    Warm,
    /// Trigger activation; warmth does not apply.
    NotApplicable,
}

impl Warmth {
    /// Display label (`cold`, `warm`, or `--`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Warm => "warm",
            Self::NotApplicable => "--",
        }
    }
}

impl Display for Warmth {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Classify an activation as a cold or warm start.
#[must_use]
pub fn classify_warmth(activation: &ActivationRef) -> Warmth {
    if activation.is_trigger() {
        Warmth::NotApplicable
    } else if activation.annotation("initTime").is_some() {
        Warmth::Cold
    } else {
        Warmth::Warm
    }
}

/// Runtime family of an action activation (`nodejs:18` becomes `nodejs`).
#[must_use]
pub fn kind_label(activation: &ActivationRef) -> String {
    if activation.is_trigger() {
        return "trigger".to_string();
    }
    activation
        .annotation("kind")
        .and_then(|value| value.as_str())
        .and_then(|kind| kind.split([':', '-']).next())
        .filter(|family| !family.is_empty())
        .unwrap_or("??")
        .to_string()
}

/// Fully qualified entity path, preferring the `path` annotation.
#[must_use]
pub fn entity_label(activation: &ActivationRef) -> String {
    activation
        .annotation("path")
        .and_then(|value| value.as_str())
        .map_or_else(
            || {
                format!(
                    "{}/{}",
                    activation.namespace.as_deref().unwrap_or_default(),
                    activation.name.as_deref().unwrap_or_default()
                )
            },
            str::to_string,
        )
}

/// Duration in milliseconds, or `--` when unknown.
#[must_use]
pub fn duration_label(activation: &ActivationRef) -> String {
    match activation.duration {
        Some(duration) if duration > 0 => format!("{duration}ms"),
        _ => "--".to_string(),
    }
}

/// Start time as `MM/DD HH:mm:ss`, or `--` when unknown.
#[must_use]
pub fn start_label_in<Tz>(activation: &ActivationRef, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    activation.start.map_or_else(
        || "--".to_string(),
        |start| start.with_timezone(tz).format(BANNER_TIME_FORMAT).to_string(),
    )
}

/// Render an epoch-millisecond timestamp as `YYYY-MM-DD HH:mm:ss`.
#[must_use]
pub fn format_timestamp_millis<Tz>(millis: i64, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|instant| instant.with_timezone(tz).format(DATE_FORMAT).to_string())
}

/// Drop the `<timestamp> <stream>:` prefix from a platform log line.
#[must_use]
pub fn strip_log_line(line: &str) -> &str {
    LOG_PREFIX
        .find(line)
        .map_or(line, |prefix| &line[prefix.end()..])
}
