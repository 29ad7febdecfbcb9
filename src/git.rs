use std::process::Command;

use log::debug;

/// Branch checked out in the working directory.
///
/// Returns `None` outside a repository, on a detached HEAD, or when `git` is
/// not installed.
pub fn current_branch() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output()
        .inspect_err(|e| debug!("Failed to run git: {e}"))
        .ok()?;

    if !output.status.success() {
        debug!("git rev-parse failed with {}", output.status);
        return None;
    }

    parse_branch(&String::from_utf8_lossy(&output.stdout))
}

fn parse_branch(stdout: &str) -> Option<String> {
    match stdout.trim() {
        "" | "HEAD" => None,
        branch => Some(branch.to_string()),
    }
}
