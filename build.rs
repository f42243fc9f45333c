// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=EDGE_VIEWER_VERSION");

    // Packagers can pin the version without a git checkout
    let version = std::env::var("EDGE_VIEWER_VERSION").unwrap_or_else(|_| git_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Package version, suffixed with the commit when built from git
///
/// "0.1.0" at a clean checkout becomes "0.1.0-abcdef1"; with local changes it
/// becomes "0.1.0-dirty-abcdef1".
fn git_version() -> String {
    let base = env!("CARGO_PKG_VERSION");
    let Some(hash) = git(&["rev-parse", "--short", "HEAD"]) else {
        return base.to_string();
    };

    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|status| !status.is_empty());
    if dirty {
        format!("{}-dirty-{}", base, hash)
    } else {
        format!("{}-{}", base, hash)
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
