use std::fmt::Display;
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{Local, TimeZone};
use nimbus_activation::format::format_timestamp_millis;
use reqwest::{StatusCode, Url};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cli::{ActionGetArgs, ActionInvokeArgs};
use crate::client::{AppContext, CliError, CliResult, classify_problem, classify_problem_bytes};
use crate::commands::parse_entity_path;
use crate::output::render_json;

const CODE_NOT_TEXT: &str = "Cannot display code because it is not plaintext.";

pub(crate) async fn handle_action_get(ctx: &AppContext, args: ActionGetArgs) -> CliResult<()> {
    let url = action_url(ctx, &args.name)?;
    let response = ctx
        .authorize(ctx.client.get(url))?
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to retrieve the action: {err}")))?;

    if !response.status().is_success() {
        return Err(classify_problem(response)
            .await
            .context("failed to retrieve the action"));
    }

    let action: Value = response
        .json()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to retrieve the action: {err}")))?;

    if args.code {
        println!("{}", action_code(&action)?);
        return Ok(());
    }

    let action = with_updated_date(action, &Local);
    if args.full {
        render_json(&action)
    } else {
        render_json(&without_code(action))
    }
}

pub(crate) async fn handle_action_invoke(
    ctx: &AppContext,
    args: ActionInvokeArgs,
) -> CliResult<()> {
    let params = if let Some(path) = &args.param_file {
        params_from_file(path)?
    } else {
        params_from_pairs(&args.params)?
    };

    let blocking = !args.no_wait;
    let result_only = !args.wait && !args.no_wait;

    let mut url = action_url(ctx, &args.name)?;
    url.query_pairs_mut()
        .append_pair("blocking", &blocking.to_string())
        .append_pair("result", &result_only.to_string());

    debug!(action = %args.name, blocking, result_only, "invoking action");
    let response = ctx
        .authorize(ctx.client.post(url))?
        .json(&Value::Object(params))
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to invoke the action: {err}")))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to invoke the action: {err}")))?;
    let body = serde_json::from_slice::<Value>(&bytes).ok();

    match invocation_outcome(status, blocking, result_only, body) {
        InvocationOutcome::Print(value) => render_json(&value),
        InvocationOutcome::Pending(activation_id) => {
            println!(
                "activation took too long, use activation id {activation_id} to check for completion."
            );
            Ok(())
        }
        InvocationOutcome::Failed => {
            let problem = classify_problem_bytes(status, &bytes);
            Err(CliError::failure(anyhow!(
                "failed to invoke the action: {}",
                problem.display_message()
            )))
        }
    }
}

#[derive(Debug, PartialEq)]
enum InvocationOutcome {
    Print(Value),
    Pending(String),
    Failed,
}

/// Decide what an invocation response means for the caller.
///
/// A blocking call that outlives the platform's wait window answers `202` with
/// only an activation id. Failed blocking calls still carry the activation,
/// whose result (or whole record) is shown instead of an error.
fn invocation_outcome(
    status: StatusCode,
    blocking: bool,
    result_only: bool,
    body: Option<Value>,
) -> InvocationOutcome {
    let Some(body) = body else {
        return if status.is_success() {
            InvocationOutcome::Print(Value::Null)
        } else {
            InvocationOutcome::Failed
        };
    };

    if status.is_success() {
        if blocking && status == StatusCode::ACCEPTED {
            if let Some(id) = body.get("activationId").and_then(Value::as_str) {
                return InvocationOutcome::Pending(id.to_string());
            }
        }
        return InvocationOutcome::Print(body);
    }

    if result_only {
        if let Some(result) = body.pointer("/response/result") {
            return InvocationOutcome::Print(result.clone());
        }
    }
    if blocking && body.get("activationId").is_some() {
        return InvocationOutcome::Print(body);
    }
    InvocationOutcome::Failed
}

fn action_url(ctx: &AppContext, name: &str) -> CliResult<Url> {
    let path = parse_entity_path(name)?;
    ctx.namespace_url(path.namespace, &["actions", path.name])
}

fn action_code(action: &Value) -> CliResult<String> {
    let exec = action.get("exec");
    let binary = exec
        .and_then(|exec| exec.get("binary"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if binary {
        return Err(CliError::validation(CODE_NOT_TEXT));
    }
    Ok(exec
        .and_then(|exec| exec.get("code"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

fn without_code(mut action: Value) -> Value {
    if let Some(exec) = action.get_mut("exec").and_then(Value::as_object_mut) {
        exec.remove("code");
    }
    action
}

fn with_updated_date<Tz>(mut action: Value, tz: &Tz) -> Value
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let date = action
        .get("updated")
        .and_then(Value::as_i64)
        .and_then(|updated| format_timestamp_millis(updated, tz));
    if let (Some(date), Some(fields)) = (date, action.as_object_mut()) {
        fields.insert("date".to_string(), Value::String(date));
    }
    action
}

/// Build a parameter object from `KEY VALUE` pairs; values that parse as JSON keep their type.
fn params_from_pairs(pairs: &[String]) -> CliResult<Map<String, Value>> {
    if pairs.len() % 2 != 0 {
        return Err(CliError::validation(
            "parameters must be given as KEY VALUE pairs",
        ));
    }
    Ok(pairs
        .chunks_exact(2)
        .map(|pair| {
            let value = serde_json::from_str(&pair[1])
                .unwrap_or_else(|_| Value::String(pair[1].clone()));
            (pair[0].clone(), value)
        })
        .collect())
}

fn params_from_file(path: &Path) -> CliResult<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read parameter file '{}'", path.display()))
        .map_err(CliError::failure)?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(params)) => Ok(params),
        Ok(_) => Err(CliError::validation(format!(
            "parameter file '{}' must contain a JSON object",
            path.display()
        ))),
        Err(err) => Err(CliError::validation(format!(
            "parameter file '{}' is not valid JSON: {err}",
            path.display()
        ))),
    }
}
