//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Display;
use std::io::Write;

use anyhow::anyhow;
use chrono::{Local, TimeZone};
use nimbus_activation::format::{
    classify_warmth, duration_label, entity_label, kind_label, make_banner, start_label_in,
    status_to_string, strip_log_line,
};
use nimbus_activation::{ActivationCount, ActivationRef, Batch};
use serde::Serialize;

use crate::client::{CliError, CliResult};

/// Per-invocation display switches derived from command flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DisplayOptions {
    /// Print a banner ahead of each activation's output.
    pub(crate) banners: bool,
    /// Drop timestamp and stream prefixes from log lines.
    pub(crate) strip_logs: bool,
}

pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

pub(crate) fn render_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    write_json(&mut std::io::stdout().lock(), value)
}

pub(crate) fn write_json<W, T>(out: &mut W, value: &T) -> CliResult<()>
where
    W: Write,
    T: Serialize + ?Sized,
{
    writeln!(out, "{}", to_pretty_json(value)?).map_err(write_failure)
}

pub(crate) fn log_lines<'a>(
    lines: &'a [String],
    options: DisplayOptions,
) -> impl Iterator<Item = &'a str> {
    lines.iter().map(move |line| {
        if options.strip_logs {
            strip_log_line(line)
        } else {
            line.as_str()
        }
    })
}

pub(crate) fn write_logs<W: Write>(
    out: &mut W,
    lines: &[String],
    options: DisplayOptions,
) -> CliResult<()> {
    for line in log_lines(lines, options) {
        writeln!(out, "{line}").map_err(write_failure)?;
    }
    Ok(())
}

pub(crate) fn count_message(count: ActivationCount) -> String {
    let noun = if count.activations == 1 {
        "activation"
    } else {
        "activations"
    };
    format!("You have {} {noun} in this namespace.", count.activations)
}

pub(crate) fn activation_table<Tz>(activations: &[ActivationRef], tz: &Tz) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut lines = Vec::with_capacity(activations.len() + 1);
    lines.push(format!(
        "{:<16} {:<18} {:<9} {:<9} {:<32} {:<5} {:>8} ENTITY",
        "DATETIME", "STATUS", "KIND", "VERSION", "ACTIVATION ID", "START", "DURATION"
    ));
    for activation in activations {
        lines.push(format!(
            "{:<16} {:<18} {:<9} {:<9} {:<32} {:<5} {:>8} {}",
            start_label_in(activation, tz),
            status_to_string(activation.status_code),
            kind_label(activation),
            activation.version.as_deref().unwrap_or("--"),
            activation.activation_id,
            classify_warmth(activation).as_str(),
            duration_label(activation),
            entity_label(activation)
        ));
    }
    lines
}

pub(crate) fn render_activation_table(activations: &[ActivationRef]) {
    if activations.is_empty() {
        return;
    }
    for line in activation_table(activations, &Local) {
        println!("{line}");
    }
}

/// Write every successful member of a batch in input order and report each
/// failure to `errors`. Returns an error when any member failed to fetch or render.
pub(crate) fn report_batch<T, W, E>(
    out: &mut W,
    errors: &mut E,
    batch: Batch<T>,
    options: DisplayOptions,
    failure_context: &str,
    mut render: impl FnMut(&mut W, &T) -> CliResult<()>,
) -> CliResult<()>
where
    W: Write,
    E: Write,
{
    let attempted = batch.len();
    let mut failed = 0_usize;

    for item in &batch {
        let reason = match &item.outcome {
            Ok(payload) => {
                if options.banners {
                    writeln!(out, "{}", make_banner(&item.activation)).map_err(write_failure)?;
                }
                match render(out, payload) {
                    Ok(()) => continue,
                    Err(err) => err.display_message(),
                }
            }
            Err(err) => err.reason(),
        };
        failed += 1;
        writeln!(
            errors,
            "error: {failure_context} {}: {reason}",
            item.activation_id()
        )
        .map_err(write_failure)?;
    }

    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::failure(anyhow!(
            "{failed} of {attempted} activations could not be retrieved"
        )))
    }
}

fn write_failure(err: std::io::Error) -> CliError {
    CliError::failure(anyhow!("failed to write output: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nimbus_activation::fetch_all;
    use nimbus_test_support::fixtures::{action_activation, trigger_activation};
    use serde_json::json;

    #[test]
    fn count_message_pluralises() {
        assert_eq!(
            count_message(ActivationCount { activations: 1 }),
            "You have 1 activation in this namespace."
        );
        assert_eq!(
            count_message(ActivationCount { activations: 3 }),
            "You have 3 activations in this namespace."
        );
    }

    #[test]
    fn log_lines_respect_strip_option() {
        let lines = vec!["2024-03-05T14:07:09.123Z stdout: hello".to_string()];
        let stripped: Vec<&str> = log_lines(
            &lines,
            DisplayOptions {
                strip_logs: true,
                ..DisplayOptions::default()
            },
        )
        .collect();
        assert_eq!(stripped, vec!["hello"]);

        let raw: Vec<&str> = log_lines(&lines, DisplayOptions::default()).collect();
        assert_eq!(raw, vec![lines[0].as_str()]);
    }

    #[test]
    fn activation_table_renders_actions_and_triggers() {
        let rows = activation_table(
            &[
                action_activation("a1", "hello"),
                trigger_activation("t1", "tick"),
            ],
            &Utc,
        );
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("DATETIME"));
        assert!(rows[1].contains("success"));
        assert!(rows[1].contains("nodejs"));
        assert!(rows[1].contains("warm"));
        assert!(rows[1].contains("120ms"));
        assert!(rows[1].ends_with("guest/hello"));
        assert!(rows[2].contains("trigger"));
        assert!(rows[2].ends_with("guest/tick"));
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let text = to_pretty_json(&json!({"a": 1})).expect("json");
        assert_eq!(text, "{\n  \"a\": 1\n}");
    }

    async fn numbered_batch(failing: &'static str) -> Batch<String> {
        fetch_all(
            vec![
                ActivationRef::from_id("1"),
                ActivationRef::from_id("2"),
                ActivationRef::from_id("3"),
            ],
            move |id| async move {
                if id == failing {
                    Err(anyhow!("connection refused").context(format!("request to /{id}/logs failed")))
                } else {
                    Ok(id)
                }
            },
        )
        .await
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).expect("utf-8 output")
    }

    #[tokio::test]
    async fn report_batch_renders_successes_and_fails_on_any_error() {
        let batch = numbered_batch("1").await;
        let (mut out, mut errors) = (Vec::new(), Vec::new());

        let err = report_batch(
            &mut out,
            &mut errors,
            batch,
            DisplayOptions::default(),
            "failed to retrieve logs for",
            |out, payload| write_json(out, payload),
        )
        .expect_err("one failure should surface");

        assert_eq!(text(out), "\"2\"\n\"3\"\n");
        assert_eq!(
            text(errors),
            "error: failed to retrieve logs for 1: request to /1/logs failed: connection refused\n"
        );
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.display_message(),
            "1 of 3 activations could not be retrieved"
        );
    }

    #[tokio::test]
    async fn report_batch_prints_banner_ahead_of_each_payload() {
        let batch = numbered_batch("none").await;
        let mut out = Vec::new();
        let options = DisplayOptions {
            banners: true,
            strip_logs: false,
        };

        report_batch(&mut out, &mut Vec::new(), batch, options, "failed", |out, payload| {
            writeln!(out, "payload {payload}").map_err(write_failure)
        })
        .expect("all members succeed");

        let lines: Vec<String> = text(out).lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 6);
        for (pair, id) in lines.chunks(2).zip(["1", "2", "3"]) {
            assert!(pair[0].starts_with(&format!("=== {id} (")), "{pair:?}");
            assert_eq!(pair[1], format!("payload {id}"));
        }
    }

    #[tokio::test]
    async fn report_batch_without_banners_prints_payload_only() {
        let batch = numbered_batch("none").await;
        let mut out = Vec::new();

        report_batch(
            &mut out,
            &mut Vec::new(),
            batch,
            DisplayOptions::default(),
            "failed",
            |out, payload| writeln!(out, "{payload}").map_err(write_failure),
        )
        .expect("all members succeed");

        assert_eq!(text(out), "1\n2\n3\n");
    }

    #[tokio::test]
    async fn render_failures_do_not_hide_later_members() {
        let batch = numbered_batch("none").await;
        let (mut out, mut errors) = (Vec::new(), Vec::new());

        let err = report_batch(
            &mut out,
            &mut errors,
            batch,
            DisplayOptions::default(),
            "failed to display",
            |out, payload| {
                if payload == "2" {
                    return Err(CliError::failure(anyhow!("unrenderable payload")));
                }
                writeln!(out, "{payload}").map_err(write_failure)
            },
        )
        .expect_err("render failure is reported");

        assert_eq!(text(out), "1\n3\n");
        assert_eq!(
            text(errors),
            "error: failed to display 2: unrenderable payload\n"
        );
        assert_eq!(
            err.display_message(),
            "1 of 3 activations could not be retrieved"
        );
    }

    #[test]
    fn write_logs_strips_prefixes_when_requested() {
        let lines = vec![
            "2024-03-05T14:07:09.123Z stdout: one".to_string(),
            "2024-03-05T14:07:09.456Z stderr: two".to_string(),
        ];
        let mut out = Vec::new();
        write_logs(
            &mut out,
            &lines,
            DisplayOptions {
                banners: false,
                strip_logs: true,
            },
        )
        .expect("write logs");
        assert_eq!(text(out), "one\ntwo\n");
    }
}
