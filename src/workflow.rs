//! GitHub Actions runner integration: log level selection and workflow
//! command annotations.

/// Tracing filter used when `RUST_LOG` is unset. Step debug logging on the
/// runner (`RUNNER_DEBUG=1`) turns on debug output.
pub fn default_log_level(runner_debug: Option<&str>) -> &'static str {
    match runner_debug.map(str::trim) {
        Some("1") => "debug",
        _ => "info",
    }
}

pub fn running_in_actions(github_actions: Option<&str>) -> bool {
    github_actions == Some("true")
}

/// Formats a message as an `::error::` workflow command.
///
/// `%`, CR and LF are percent-encoded so a multi-line message stays a
/// single command.
pub fn error_annotation(message: &str) -> String {
    let data = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    format!("::error::{data}")
}
