//! Argument parsing and command dispatch for the Nimbus CLI.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use nimbus_activation::{DEFAULT_LIMIT, SelectionCriteria};
use nimbus_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use reqwest::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliDependencies, CliResult, parse_auth, parse_url};
use crate::commands::action::{handle_action_get, handle_action_invoke};
use crate::commands::activation::{
    handle_activation_get, handle_activation_list, handle_activation_logs,
    handle_activation_result,
};
use crate::commands::trigger::handle_trigger_delete;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_API_HOST: &str = "https://localhost";
const DEFAULT_NAMESPACE: &str = "_";

/// Parses CLI arguments, executes the requested command, and handles
/// user-facing telemetry emission. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    install_logging(&cli);

    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let deps = match CliDependencies::from_env(&cli, &trace_id) {
        Ok(deps) => deps,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };
    let telemetry = deps.telemetry.clone();

    tracing::debug!(command = command_name, trace_id = %trace_id, "dispatching command");
    let result = dispatch(cli, &deps).await;

    let (exit_code, message, outcome) = match result {
        Ok(()) => (0, None, "success"),
        Err(err) => {
            let exit_code = err.exit_code();
            let message = err.display_message();
            eprintln!("error: {message}");
            (exit_code, Some(message), "error")
        }
    };

    if let Some(emitter) = &telemetry {
        emitter
            .emit(
                &trace_id,
                command_name,
                outcome,
                exit_code,
                message.as_deref(),
            )
            .await;
    }

    exit_code
}

fn install_logging(cli: &Cli) {
    let config = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.into(),
        build_sha: option_env!("NIMBUS_BUILD_SHA").unwrap_or(env!("CARGO_PKG_VERSION")),
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: {err}");
    }
}

async fn dispatch(cli: Cli, deps: &CliDependencies) -> CliResult<()> {
    let auth = parse_auth(cli.auth)?;

    let ctx = AppContext {
        client: deps.client.clone(),
        api_host: cli.api_host,
        namespace: cli.namespace,
        auth,
    };

    match cli.command {
        Command::Activation(activation) => match activation {
            ActivationCommand::Get(args) => handle_activation_get(&ctx, args).await,
            ActivationCommand::Result(args) => handle_activation_result(&ctx, args).await,
            ActivationCommand::Logs(args) => handle_activation_logs(&ctx, args).await,
            ActivationCommand::List(args) => handle_activation_list(&ctx, args).await,
        },
        Command::Action(action) => match action {
            ActionCommand::Get(args) => handle_action_get(&ctx, args).await,
            ActionCommand::Invoke(args) => handle_action_invoke(&ctx, args).await,
        },
        Command::Trigger(trigger) => match trigger {
            TriggerCommand::Delete(args) => handle_trigger_delete(&ctx, args).await,
        },
    }
}

#[derive(Parser)]
#[command(
    name = "nimbus",
    version,
    about = "Command-line client for the Nimbus functions platform"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "NIMBUS_API_HOST",
        value_parser = parse_url,
        default_value = DEFAULT_API_HOST
    )]
    pub(crate) api_host: Url,
    #[arg(long, global = true, env = "NIMBUS_AUTH", hide_env_values = true)]
    pub(crate) auth: Option<String>,
    #[arg(
        long,
        global = true,
        env = "NIMBUS_NAMESPACE",
        default_value = DEFAULT_NAMESPACE
    )]
    pub(crate) namespace: String,
    #[arg(
        long,
        global = true,
        env = "NIMBUS_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "NIMBUS_LOG",
        default_value = DEFAULT_LOG_LEVEL,
        help = "Log level or filter directive (RUST_LOG takes precedence)"
    )]
    pub(crate) log_level: String,
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty)]
    pub(crate) log_format: LogFormatArg,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormatArg {
    #[default]
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    #[command(subcommand, visible_alias = "activations")]
    Activation(ActivationCommand),
    #[command(subcommand, visible_alias = "actions")]
    Action(ActionCommand),
    #[command(subcommand, visible_alias = "triggers")]
    Trigger(TriggerCommand),
}

#[derive(Subcommand)]
pub(crate) enum ActivationCommand {
    /// Retrieve an activation record, its logs, or its result.
    Get(ActivationGetArgs),
    /// Retrieve the results of one or more activations.
    Result(ActivationResultArgs),
    /// Retrieve the logs of one or more activations.
    Logs(ActivationLogsArgs),
    /// List activations in the namespace.
    #[command(visible_alias = "ls")]
    List(ActivationListArgs),
}

#[derive(Subcommand)]
pub(crate) enum ActionCommand {
    /// Retrieve an action.
    Get(ActionGetArgs),
    /// Invoke an action.
    Invoke(ActionInvokeArgs),
}

#[derive(Subcommand)]
pub(crate) enum TriggerCommand {
    /// Delete a trigger (and its feed registration).
    Delete(TriggerDeleteArgs),
}

/// Selection flags shared by the activation retrieval commands.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct SelectionArgs {
    #[arg(help = "Activation identifier")]
    pub(crate) activation_id: Option<String>,
    #[arg(short = 'l', long, help = "Select the most recent activation(s)")]
    pub(crate) last: bool,
    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_LIMIT,
        allow_negative_numbers = true,
        help = "Number of most recent activations to select (clamped to 1..=200)"
    )]
    pub(crate) limit: i64,
    #[arg(short = 's', long, default_value_t = 0, help = "Skip this many activations")]
    pub(crate) skip: u32,
    #[arg(short = 'a', long, help = "Only consider activations of this action")]
    pub(crate) action: Option<String>,
    #[arg(
        short = 'q',
        long,
        requires = "last",
        help = "Suppress the activation banner"
    )]
    pub(crate) quiet: bool,
}

impl SelectionArgs {
    pub(crate) fn criteria(&self) -> SelectionCriteria {
        SelectionCriteria {
            explicit_id: self.activation_id.clone(),
            use_last: self.last,
            limit: self.limit,
            skip: self.skip,
            name_filter: self.action.clone(),
        }
    }

    pub(crate) const fn wants_banners(&self) -> bool {
        self.last && !self.quiet
    }
}

#[derive(Args, Clone, Debug, Default)]
pub(crate) struct ActivationGetArgs {
    #[command(flatten)]
    pub(crate) selection: SelectionArgs,
    #[arg(
        short = 'g',
        long,
        conflicts_with = "result",
        help = "Emit only the logs, stripped of time stamps and stream identifier"
    )]
    pub(crate) logs: bool,
    #[arg(short = 'r', long, help = "Emit only the result")]
    pub(crate) result: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub(crate) struct ActivationResultArgs {
    #[command(flatten)]
    pub(crate) selection: SelectionArgs,
}

#[derive(Args, Clone, Debug, Default)]
pub(crate) struct ActivationLogsArgs {
    #[command(flatten)]
    pub(crate) selection: SelectionArgs,
    #[arg(long, help = "Keep time stamps and stream identifiers")]
    pub(crate) raw: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub(crate) struct ActivationListArgs {
    #[arg(help = "Only list activations of this entity")]
    pub(crate) name: Option<String>,
    #[arg(
        short = 'l',
        long,
        allow_negative_numbers = true,
        help = "Maximum number of activations to return (up to 200)"
    )]
    pub(crate) limit: Option<i64>,
    #[arg(short = 's', long, help = "Skip this many activations")]
    pub(crate) skip: Option<u32>,
    #[arg(long, help = "Only activations after this epoch-millisecond timestamp")]
    pub(crate) since: Option<u64>,
    #[arg(long, help = "Only activations before this epoch-millisecond timestamp")]
    pub(crate) upto: Option<u64>,
    #[arg(short = 'c', long, help = "Show only the number of activations")]
    pub(crate) count: bool,
    #[arg(long, help = "Output raw JSON")]
    pub(crate) json: bool,
    #[arg(short = 'f', long, help = "Include full activation records (implies --json)")]
    pub(crate) full: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub(crate) struct ActionGetArgs {
    #[arg(help = "Action name, optionally package-qualified")]
    pub(crate) name: String,
    #[arg(short = 'c', long, help = "Show the action code (text actions only)")]
    pub(crate) code: bool,
    #[arg(long, help = "Include the action code in the JSON output")]
    pub(crate) full: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub(crate) struct ActionInvokeArgs {
    #[arg(help = "Action name, optionally package-qualified")]
    pub(crate) name: String,
    #[arg(
        short = 'p',
        long = "param",
        num_args = 2,
        value_names = ["KEY", "VALUE"],
        action = ArgAction::Append,
        help = "Parameter values in KEY VALUE format"
    )]
    pub(crate) params: Vec<String>,
    #[arg(
        short = 'P',
        long = "param-file",
        conflicts_with = "params",
        help = "File containing parameter values in JSON format"
    )]
    pub(crate) param_file: Option<PathBuf>,
    #[arg(short = 'w', long, help = "Wait for the full activation record")]
    pub(crate) wait: bool,
    #[arg(
        short = 'n',
        long = "no-wait",
        conflicts_with = "wait",
        help = "Fire and forget; do not wait for the result"
    )]
    pub(crate) no_wait: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub(crate) struct TriggerDeleteArgs {
    #[arg(help = "Trigger name, in the format /NAMESPACE/NAME or NAME")]
    pub(crate) path: String,
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Activation(ActivationCommand::Get(_)) => "activation_get",
        Command::Activation(ActivationCommand::Result(_)) => "activation_result",
        Command::Activation(ActivationCommand::Logs(_)) => "activation_logs",
        Command::Activation(ActivationCommand::List(_)) => "activation_list",
        Command::Action(ActionCommand::Get(_)) => "action_get",
        Command::Action(ActionCommand::Invoke(_)) => "action_invoke",
        Command::Trigger(TriggerCommand::Delete(_)) => "trigger_delete",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["nimbus"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("arguments should parse")
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn result_flags_build_selection_criteria() {
        let cli = parse(&["activation", "result", "--last", "-n", "2", "-a", "f/g"]);
        let Command::Activation(ActivationCommand::Result(args)) = cli.command else {
            panic!("expected activation result");
        };
        assert_eq!(
            args.selection.criteria(),
            SelectionCriteria::last(2).with_name_filter("f/g")
        );
        assert!(args.selection.wants_banners());
    }

    #[test]
    fn explicit_id_without_flags_has_no_banner() {
        let cli = parse(&["activation", "get", "abc"]);
        let Command::Activation(ActivationCommand::Get(args)) = cli.command else {
            panic!("expected activation get");
        };
        assert_eq!(args.selection.criteria(), SelectionCriteria::explicit("abc"));
        assert!(!args.selection.wants_banners());
    }

    #[test]
    fn negative_limits_parse_for_clamping() {
        let cli = parse(&["activation", "logs", "--last", "--limit", "-4"]);
        let Command::Activation(ActivationCommand::Logs(args)) = cli.command else {
            panic!("expected activation logs");
        };
        assert_eq!(args.selection.criteria().effective_limit(), 1);
    }

    #[test]
    fn quiet_requires_last() {
        assert!(Cli::try_parse_from(["nimbus", "activation", "result", "abc", "-q"]).is_err());
        let cli = parse(&["activation", "result", "-l", "-q"]);
        let Command::Activation(ActivationCommand::Result(args)) = cli.command else {
            panic!("expected activation result");
        };
        assert!(!args.selection.wants_banners());
    }

    #[test]
    fn get_rejects_logs_with_result() {
        assert!(Cli::try_parse_from(["nimbus", "activation", "get", "-g", "-r"]).is_err());
    }

    #[test]
    fn invoke_collects_param_pairs() {
        let cli = parse(&[
            "action", "invoke", "hello", "-p", "name", "world", "-p", "count", "3",
        ]);
        let Command::Action(ActionCommand::Invoke(args)) = cli.command else {
            panic!("expected action invoke");
        };
        assert_eq!(args.params, vec!["name", "world", "count", "3"]);
        assert!(!args.wait && !args.no_wait);
    }

    #[test]
    fn global_options_apply_after_subcommands() {
        let cli = parse(&[
            "activation",
            "list",
            "--namespace",
            "team",
            "--api-host",
            "https://runtime.example",
        ]);
        assert_eq!(cli.namespace, "team");
        assert_eq!(cli.api_host.as_str(), "https://runtime.example/");
        assert_eq!(command_label(&cli.command), "activation_list");
    }

    #[test]
    fn log_format_maps_to_telemetry_format() {
        assert_eq!(LogFormat::from(LogFormatArg::Json), LogFormat::Json);
        assert_eq!(LogFormat::from(LogFormatArg::Pretty), LogFormat::Pretty);
    }
}
