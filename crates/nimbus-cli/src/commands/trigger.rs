use anyhow::anyhow;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cli::TriggerDeleteArgs;
use crate::client::{AppContext, CliError, CliResult, classify_problem};
use crate::commands::{EntityPath, parse_entity_path};

const FEED_ANNOTATION: &str = "feed";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedLifecycle {
    lifecycle_event: &'static str,
    trigger_name: String,
    auth_key: String,
}

pub(crate) async fn handle_trigger_delete(
    ctx: &AppContext,
    args: TriggerDeleteArgs,
) -> CliResult<()> {
    let path = args.path.as_str();
    delete_trigger(ctx, path)
        .await
        .map_err(|err| err.context(format!("Unable to delete trigger '{path}'")))?;
    println!("Trigger '{path}' deleted");
    Ok(())
}

async fn delete_trigger(ctx: &AppContext, path: &str) -> CliResult<()> {
    let trigger = parse_entity_path(path)?;
    let url = ctx.namespace_url(trigger.namespace, &["triggers", trigger.name])?;

    let response = ctx
        .authorize(ctx.client.delete(url))?
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to delete trigger failed: {err}")))?;
    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }

    let record: Value = response
        .json()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse deleted trigger: {err}")))?;

    match feed_name(&record) {
        Some(feed) => unregister_feed(ctx, trigger, feed).await,
        None => Ok(()),
    }
}

/// Tell the trigger's feed action to drop its registration.
async fn unregister_feed(ctx: &AppContext, trigger: EntityPath<'_>, feed: &str) -> CliResult<()> {
    let creds = ctx.credentials()?;
    let action = parse_entity_path(feed)?;
    let mut url = ctx.namespace_url(action.namespace, &["actions", action.name])?;
    url.query_pairs_mut().append_pair("blocking", "true");

    let namespace = trigger.namespace.unwrap_or(&ctx.namespace);
    let body = FeedLifecycle {
        lifecycle_event: "DELETE",
        trigger_name: format!("/{namespace}/{}", trigger.name),
        auth_key: creds.header_value(),
    };

    debug!(feed, trigger = %body.trigger_name, "unregistering trigger feed");
    let response = ctx
        .authorize(ctx.client.post(url))?
        .json(&body)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to feed {feed} failed: {err}")))?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(classify_problem(response).await)
    }
}

fn feed_name(record: &Value) -> Option<&str> {
    record
        .get("annotations")?
        .as_array()?
        .iter()
        .find(|annotation| annotation.get("key").and_then(Value::as_str) == Some(FEED_ANNOTATION))?
        .get("value")?
        .as_str()
}
