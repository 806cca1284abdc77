use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser};

use crate::types::{
    Comparison, CountStrategy, DEFAULT_LIMIT, EventSource, LimitSpec, PolicyConfig, Repo,
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Parser, Debug)]
#[command(
    name = "prlimit",
    about = "Fail a pull request check when its author has too many open pull requests, optionally commenting on and closing it"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// GitHub token (falls back to GITHUB_TOKEN, then GH_TOKEN)
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Maximum number of other open, non-draft PRs an author may have
    #[arg(
        short = 'l',
        long,
        env = "INPUT_LIMIT",
        default_value_t = DEFAULT_LIMIT,
        value_parser = parse_limit,
        value_name = "NUM"
    )]
    pub limit: u64,

    /// Comment posted on the offending PR, addressed to its author
    #[arg(long, visible_alias = "message", env = "INPUT_BODY", value_name = "TEXT")]
    pub body: Option<String>,

    /// Close the offending PR
    #[arg(
        long,
        env = "INPUT_AUTO_CLOSE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_action_bool,
        value_name = "BOOL"
    )]
    pub auto_close: bool,

    /// How the author's open PRs are counted
    #[arg(
        long,
        env = "INPUT_COUNT_STRATEGY",
        default_value = "search",
        value_name = "list|search"
    )]
    pub count_strategy: CountStrategy,

    /// Threshold comparison between the author's other open PRs and the limit
    #[arg(long, env = "INPUT_COMPARISON", default_value = "gt", value_name = "gt|ge")]
    pub comparison: Comparison,

    /// Skip PRs that are not their author's most recent one (default: on for
    /// the list strategy, off for search)
    #[arg(
        long,
        env = "INPUT_REQUIRE_LATEST",
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub require_latest: Option<String>,

    /// Repository in format 'owner/repo' (defaults to the event's repository)
    #[arg(short = 'r', long, env = "GITHUB_REPOSITORY", value_name = "OWNER/REPO")]
    pub repo: Option<String>,

    /// Name of the triggering workflow event
    #[arg(long, env = "GITHUB_EVENT_NAME", value_name = "NAME")]
    pub event_name: Option<String>,

    /// Path to the triggering event's JSON payload
    #[arg(long, env = "GITHUB_EVENT_PATH", value_name = "PATH")]
    pub event_path: Option<PathBuf>,

    /// Evaluate and report without commenting or closing
    #[arg(
        long,
        env = "INPUT_DRY_RUN",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_action_bool,
        value_name = "BOOL"
    )]
    pub dry_run: bool,
}

/// Parses a limit; an empty value, as left by unset action inputs, means
/// the default.
fn parse_limit(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(DEFAULT_LIMIT);
    }
    s.parse::<u64>()
        .map_err(|_| format!("limit must be a non-negative integer, got '{s}'"))
}

/// Parses a boolean the way action inputs are written (YAML 1.2 core
/// schema); an empty value is false.
fn parse_action_bool(s: &str) -> Result<bool, String> {
    match s.trim() {
        "true" | "True" | "TRUE" => Ok(true),
        "false" | "False" | "FALSE" | "" => Ok(false),
        other => Err(format!(
            "'{other}' is not a boolean; use true|True|TRUE|false|False|FALSE"
        )),
    }
}

impl CliArgs {
    fn require_latest(&self) -> Result<bool> {
        match self.require_latest.as_deref().map(str::trim) {
            None | Some("") => Ok(self.count_strategy.requires_latest_by_default()),
            Some(value) => parse_action_bool(value)
                .map_err(|e| anyhow::anyhow!("Invalid --require-latest value: {}", e)),
        }
    }
}

fn build_spec(cli: CliArgs) -> Result<(LimitSpec, Option<String>)> {
    let require_latest = cli.require_latest()?;

    let repo = cli
        .repo
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| {
            Repo::parse(r).map_err(|e| anyhow::anyhow!("Invalid repository format '{}': {}", r, e))
        })
        .transpose()?;

    let message = cli.body.filter(|body| !body.trim().is_empty());

    let spec = LimitSpec {
        repo,
        event: EventSource {
            name: cli.event_name,
            path: cli.event_path,
        },
        policy: PolicyConfig {
            limit: cli.limit,
            message,
            auto_close: cli.auto_close,
            comparison: cli.comparison,
        },
        strategy: cli.count_strategy,
        require_latest,
        dry_run: cli.dry_run,
    };

    Ok((spec, cli.token))
}

/// Parses command-line arguments, with action inputs from the environment
/// as fallbacks, into the invocation's spec and the raw token input.
pub fn parse_args<I, T>(args: I) -> Result<(LimitSpec, Option<String>)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_spec(cli)
}
