use std::process::ExitCode;

use prlimit::{
    Endpoints, GitHub, LimitSpec, PullRequestEvent, enforce_limit, parse_args, resolve_token,
    workflow::{default_log_level, error_annotation, running_in_actions},
};
use tracing::error;

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let runner_debug = std::env::var("RUNNER_DEBUG").ok();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(runner_debug.as_deref())));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn annotate_failure(err: &anyhow::Error) {
    if running_in_actions(std::env::var("GITHUB_ACTIONS").ok().as_deref()) {
        println!("{}", error_annotation(&format!("{err:#}")));
    }
}

async fn run(spec: LimitSpec, token: Option<String>) -> anyhow::Result<()> {
    let event = PullRequestEvent::load(&spec.event, spec.repo.as_ref())?;
    let token = resolve_token(token.as_deref())?;
    let forge = GitHub::new(token, &Endpoints::from_env()?)?;

    let outcome = enforce_limit(&spec, &event, &forge).await?;
    let violation = outcome.limit_exceeded();

    // Already logged by enforce_limit; only annotate here.
    for failure in outcome.action_failures {
        annotate_failure(&failure.into());
    }

    match violation {
        Some(violation) => Err(violation.into()),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let result = match parse_args(std::env::args()) {
        Ok((spec, token)) => run(spec, token).await,
        Err(err) => match err.downcast::<clap::Error>() {
            // --help and --version land here too, with exit code 0.
            Ok(clap_err) => {
                let _ = clap_err.print();
                return ExitCode::from(u8::try_from(clap_err.exit_code()).unwrap_or(2));
            }
            Err(err) => Err(err),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            annotate_failure(&err);
            ExitCode::FAILURE
        }
    }
}
