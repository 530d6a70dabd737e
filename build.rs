// Embeds recent git history for the /version command
use std::process::Command;

fn main() {
    // Last 5 commits as "hash|subject" lines; empty outside a git checkout
    let commits = Command::new("git")
        .args(["log", "-5", "--format=%h|%s"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();

    println!("cargo:rustc-env=GIT_RECENT_COMMITS={}", commits);

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
