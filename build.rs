//! Embeds a human-readable version string for `prlimit --version`.
//!
//! Uses `git describe --tags --always --dirty` when it yields a tag-based
//! description, otherwise `v{CARGO_PKG_VERSION}-{timestamp}-{commit}`.
//! Without git the commit is reported as `unknown`.

use std::process::Command;

use chrono::Utc;

fn main() {
    ["src", "build.rs", "Cargo.toml"]
        .iter()
        .for_each(|path| println!("cargo:rerun-if-changed={path}"));

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", version_string());
}

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn pseudo_version() -> String {
    let commit = git(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    format!("v{}-{timestamp}-{commit}", env!("CARGO_PKG_VERSION"))
}

fn version_string() -> String {
    let described = git(&["describe", "--tags", "--always", "--dirty"])
        .filter(|desc| desc.starts_with('v') || desc.contains("-g"))
        .unwrap_or_else(pseudo_version);

    format!("{} ({described})", env!("CARGO_PKG_VERSION"))
}
