use std::fmt::Display;
use std::io;

use chrono::{Local, TimeZone};
use nimbus_activation::format::format_timestamp_millis;
use nimbus_activation::{
    ActivationRef, ActivationSelector, ListQuery, ListResponse, RuntimeQueryGateway,
    clamp_limit, fetch_logs, fetch_records, fetch_results,
};
use serde_json::Value;

use crate::cli::{
    ActivationGetArgs, ActivationListArgs, ActivationLogsArgs, ActivationResultArgs,
    SelectionArgs,
};
use crate::client::{AppContext, CliError, CliResult};
use crate::gateway::HttpRuntimeGateway;
use crate::output::{
    DisplayOptions, count_message, render_activation_table, render_json, report_batch,
    write_json, write_logs,
};

pub(crate) async fn handle_activation_get(
    ctx: &AppContext,
    args: ActivationGetArgs,
) -> CliResult<()> {
    let gateway = HttpRuntimeGateway::new(ctx)?;
    let refs = resolve(&gateway, &args.selection).await?;
    let options = get_display_options(&args, refs.len());

    if args.logs {
        let batch = fetch_logs(&gateway, refs).await;
        report_batch(
            &mut io::stdout().lock(),
            &mut io::stderr().lock(),
            batch,
            options,
            "failed to retrieve logs for",
            |out, lines| write_logs(out, lines, options),
        )
    } else if args.result {
        let batch = fetch_results(&gateway, refs).await;
        report_batch(
            &mut io::stdout().lock(),
            &mut io::stderr().lock(),
            batch,
            options,
            "failed to retrieve result for",
            |out, output| write_json(out, &output.result),
        )
    } else {
        let batch = fetch_records(&gateway, refs).await;
        report_batch(
            &mut io::stdout().lock(),
            &mut io::stderr().lock(),
            batch,
            options,
            "failed to retrieve",
            |out, record| write_json(out, &with_start_date(record.clone(), &Local)),
        )
    }
}

pub(crate) async fn handle_activation_result(
    ctx: &AppContext,
    args: ActivationResultArgs,
) -> CliResult<()> {
    let gateway = HttpRuntimeGateway::new(ctx)?;
    let refs = resolve(&gateway, &args.selection).await?;
    let options = selection_display_options(&args.selection, false);

    let batch = fetch_results(&gateway, refs).await;
    report_batch(
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
        batch,
        options,
        "failed to retrieve result for",
        |out, output| write_json(out, &output.result),
    )
}

pub(crate) async fn handle_activation_logs(
    ctx: &AppContext,
    args: ActivationLogsArgs,
) -> CliResult<()> {
    let gateway = HttpRuntimeGateway::new(ctx)?;
    let refs = resolve(&gateway, &args.selection).await?;
    let options = selection_display_options(&args.selection, !args.raw);

    let batch = fetch_logs(&gateway, refs).await;
    report_batch(
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
        batch,
        options,
        "failed to retrieve logs for",
        |out, lines| write_logs(out, lines, options),
    )
}

/// Banners under `--last` unless `--quiet`.
const fn selection_display_options(
    selection: &SelectionArgs,
    strip_logs: bool,
) -> DisplayOptions {
    DisplayOptions {
        banners: selection.wants_banners(),
        strip_logs,
    }
}

/// `activation get` also shows banners whenever several activations resolved.
const fn get_display_options(args: &ActivationGetArgs, resolved: usize) -> DisplayOptions {
    let detail_mode = args.logs || args.result;
    DisplayOptions {
        banners: (args.selection.wants_banners() && detail_mode)
            || (resolved > 1 && !args.selection.quiet),
        strip_logs: true,
    }
}

pub(crate) async fn handle_activation_list(
    ctx: &AppContext,
    args: ActivationListArgs,
) -> CliResult<()> {
    let gateway = HttpRuntimeGateway::new(ctx)?;
    let query = ListQuery {
        limit: args.limit.map(clamp_limit),
        skip: args.skip,
        name: args.name.filter(|name| !name.trim().is_empty()),
        since: args.since,
        upto: args.upto,
        docs: args.full,
        count: args.count,
    };

    let response = gateway
        .list(&query)
        .await
        .map_err(|err| CliError::failure(err.context("failed to list activations")))?;

    let as_json = args.json || args.full;
    match response {
        ListResponse::Count(count) if as_json => render_json(&count),
        ListResponse::Count(count) => {
            println!("{}", count_message(count));
            Ok(())
        }
        ListResponse::Activations(activations) if as_json => render_json(&activations),
        ListResponse::Activations(activations) => {
            render_activation_table(&activations);
            Ok(())
        }
    }
}

async fn resolve<G>(gateway: &G, selection: &SelectionArgs) -> CliResult<Vec<ActivationRef>>
where
    G: RuntimeQueryGateway + ?Sized,
{
    let refs = ActivationSelector::new(gateway)
        .resolve(&selection.criteria())
        .await?;
    Ok(refs)
}

/// Add a readable `date` field derived from the record's `start` millis.
fn with_start_date<Tz>(mut record: Value, tz: &Tz) -> Value
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let date = record
        .get("start")
        .and_then(Value::as_i64)
        .and_then(|start| format_timestamp_millis(start, tz));
    if let (Some(date), Some(fields)) = (date, record.as_object_mut()) {
        fields.insert("date".to_string(), Value::String(date));
    }
    record
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use chrono::Utc;
    use httpmock::prelude::*;
    use nimbus_test_support::fixtures::{SAMPLE_END_MILLIS, activation_record};
    use reqwest::Client;
    use serde_json::json;

    use crate::client::AuthCredential;

    const ACTIVATIONS: &str = "/api/v1/namespaces/_/activations";

    fn context_with(server: &MockServer, auth: Option<AuthCredential>) -> AppContext {
        AppContext {
            client: Client::new(),
            api_host: server.base_url().parse().expect("valid URL"),
            namespace: "_".to_string(),
            auth,
        }
    }

    fn context_with_key(server: &MockServer) -> AppContext {
        context_with(
            server,
            Some(AuthCredential {
                key_id: "key".to_string(),
                secret: "secret".to_string(),
            }),
        )
    }

    fn last(limit: i64) -> SelectionArgs {
        SelectionArgs {
            last: true,
            limit,
            ..SelectionArgs::default()
        }
    }

    fn get_args(selection: SelectionArgs, logs: bool, result: bool) -> ActivationGetArgs {
        ActivationGetArgs {
            selection,
            logs,
            result,
        }
    }

    fn explicit(id: &str) -> SelectionArgs {
        SelectionArgs {
            activation_id: Some(id.to_string()),
            ..SelectionArgs::default()
        }
    }

    fn quiet(selection: SelectionArgs) -> SelectionArgs {
        SelectionArgs {
            quiet: true,
            ..selection
        }
    }

    #[test]
    fn get_banners_follow_last_quiet_and_mode() {
        for (logs, result) in [(true, false), (false, true)] {
            assert!(get_display_options(&get_args(last(1), logs, result), 1).banners);
            assert!(!get_display_options(&get_args(quiet(last(1)), logs, result), 1).banners);
            assert!(!get_display_options(&get_args(explicit("abc"), logs, result), 1).banners);
        }
        assert!(!get_display_options(&get_args(last(1), false, false), 1).banners);
    }

    #[test]
    fn get_banners_appear_for_multiple_activations() {
        for (logs, result) in [(false, false), (true, false), (false, true)] {
            assert!(get_display_options(&get_args(last(3), logs, result), 3).banners);
            assert!(!get_display_options(&get_args(quiet(last(3)), logs, result), 3).banners);
        }
    }

    #[test]
    fn single_explicit_id_never_gets_a_banner() {
        for (logs, result) in [(false, false), (true, false), (false, true)] {
            let options = get_display_options(&get_args(explicit("abc"), logs, result), 1);
            assert!(!options.banners);
            assert!(options.strip_logs);
        }
        assert!(!selection_display_options(&explicit("abc"), true).banners);
    }

    #[test]
    fn result_and_logs_banners_require_last_without_quiet() {
        assert!(selection_display_options(&last(2), false).banners);
        assert!(!selection_display_options(&quiet(last(2)), false).banners);
        assert!(!selection_display_options(&explicit("abc"), false).banners);
        assert!(selection_display_options(&last(1), true).strip_logs);
        assert!(!selection_display_options(&last(1), false).strip_logs);
    }

    #[test]
    fn start_date_is_added_when_start_is_present() {
        let record = with_start_date(json!({"activationId": "a", "start": 0}), &Utc);
        assert_eq!(record["date"], json!("1970-01-01 00:00:00"));

        let untouched = with_start_date(json!({"activationId": "a"}), &Utc);
        assert!(untouched.get("date").is_none());
    }

    #[tokio::test]
    async fn get_by_id_fetches_the_record_without_listing() {
        let server = MockServer::start_async().await;
        let listing = server.mock(|when, then| {
            when.method(GET).path(ACTIVATIONS);
            then.status(200).json_body(json!([]));
        });
        let record = server.mock(|when, then| {
            when.method(GET)
                .path(format!("{ACTIVATIONS}/abc"))
                .header("authorization", "Basic a2V5OnNlY3JldA==");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(activation_record("abc", "hello"));
        });

        let ctx = context_with_key(&server);
        let args = ActivationGetArgs {
            selection: SelectionArgs {
                activation_id: Some("abc".to_string()),
                ..SelectionArgs::default()
            },
            ..ActivationGetArgs::default()
        };
        handle_activation_get(&ctx, args)
            .await
            .expect("get should succeed");

        record.assert();
        listing.assert_hits(0);
    }

    #[tokio::test]
    async fn get_without_id_or_last_is_a_usage_error() {
        let server = MockServer::start_async().await;
        let ctx = context_with_key(&server);

        let err = handle_activation_get(&ctx, ActivationGetArgs::default())
            .await
            .expect_err("selection is required");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn get_requires_credentials() {
        let server = MockServer::start_async().await;
        let ctx = context_with(&server, None);
        let args = ActivationGetArgs {
            selection: last(1),
            ..ActivationGetArgs::default()
        };

        let err = handle_activation_get(&ctx, args)
            .await
            .expect_err("credentials are required");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn result_last_resolves_through_one_listing() {
        let server = MockServer::start_async().await;
        let listing = server.mock(|when, then| {
            when.method(GET)
                .path(ACTIVATIONS)
                .query_param("limit", "2")
                .query_param("skip", "0")
                .query_param("name", "f/g");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([
                    {"activationId": "12", "name": "g", "end": SAMPLE_END_MILLIS},
                    {"activationId": "34", "name": "g", "end": SAMPLE_END_MILLIS}
                ]));
        });
        let first = server.mock(|when, then| {
            when.method(GET).path(format!("{ACTIVATIONS}/12/result"));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"result": {"n": 12}, "success": true}));
        });
        let second = server.mock(|when, then| {
            when.method(GET).path(format!("{ACTIVATIONS}/34/result"));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"result": {"n": 34}, "success": true}));
        });

        let ctx = context_with_key(&server);
        let args = ActivationResultArgs {
            selection: SelectionArgs {
                action: Some("f/g".to_string()),
                ..last(2)
            },
        };
        handle_activation_result(&ctx, args)
            .await
            .expect("result should succeed");

        listing.assert_hits(1);
        first.assert();
        second.assert();
    }

    #[tokio::test]
    async fn result_with_empty_listing_reports_no_activations() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(ACTIVATIONS);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([]));
        });

        let ctx = context_with_key(&server);
        let err = handle_activation_result(&ctx, ActivationResultArgs { selection: last(1) })
            .await
            .expect_err("empty listing should fail");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("no activations"));
    }

    #[tokio::test]
    async fn logs_print_successes_and_fail_on_partial_errors() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(ACTIVATIONS);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([{"activationId": "ok"}, {"activationId": "gone"}]));
        });
        let ok = server.mock(|when, then| {
            when.method(GET).path(format!("{ACTIVATIONS}/ok/logs"));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"logs": ["2024-03-05T14:07:09.123Z stdout: hi"]}));
        });
        server.mock(|when, then| {
            when.method(GET).path(format!("{ACTIVATIONS}/gone/logs"));
            then.status(404)
                .header("content-type", "application/json")
                .json_body(json!({"error": "The requested resource does not exist."}));
        });

        let ctx = context_with_key(&server);
        let err = handle_activation_logs(
            &ctx,
            ActivationLogsArgs {
                selection: last(2),
                raw: false,
            },
        )
        .await
        .expect_err("one failed fetch should fail the command");

        ok.assert();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.display_message(),
            "1 of 2 activations could not be retrieved"
        );
    }

    #[tokio::test]
    async fn list_clamps_limit_and_forwards_filters() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(ACTIVATIONS)
                .query_param("limit", "200")
                .query_param("name", "hello")
                .query_param("since", "10");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([activation_record("abc", "hello")]));
        });

        let ctx = context_with_key(&server);
        let args = ActivationListArgs {
            name: Some("hello".to_string()),
            limit: Some(900),
            since: Some(10),
            ..ActivationListArgs::default()
        };
        handle_activation_list(&ctx, args)
            .await
            .expect("list should succeed");
        mock.assert();
    }

    #[tokio::test]
    async fn list_count_and_full_set_query_flags() {
        let server = MockServer::start_async().await;
        let count = server.mock(|when, then| {
            when.method(GET)
                .path(ACTIVATIONS)
                .query_param("count", "true");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"activations": 4}));
        });
        let docs = server.mock(|when, then| {
            when.method(GET).path(ACTIVATIONS).query_param("docs", "true");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([activation_record("abc", "hello")]));
        });

        let ctx = context_with_key(&server);
        handle_activation_list(
            &ctx,
            ActivationListArgs {
                count: true,
                ..ActivationListArgs::default()
            },
        )
        .await
        .expect("count should succeed");
        handle_activation_list(
            &ctx,
            ActivationListArgs {
                full: true,
                ..ActivationListArgs::default()
            },
        )
        .await
        .expect("full listing should succeed");

        count.assert();
        docs.assert();
    }

    #[tokio::test]
    async fn list_surfaces_platform_errors() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(ACTIVATIONS);
            then.status(401)
                .header("content-type", "application/json")
                .json_body(json!({"error": "The supplied authentication is invalid"}));
        });

        let ctx = context_with_key(&server);
        let err = handle_activation_list(&ctx, ActivationListArgs::default())
            .await
            .expect_err("unauthorized listing should fail");
        assert_eq!(err.exit_code(), 3);
        let message = err.display_message();
        assert!(message.starts_with("failed to list activations"));
        assert!(message.contains("The supplied authentication is invalid"));
    }
}
