use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    let rev = git_rev().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=CARRIERLINK_GIT_REV={rev}");

    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=CARRIERLINK_TARGET={target}");
}

/// Short commit hash of the checkout, if built from one.
fn git_rev() -> Option<String> {
    let output = Command::new("git").args(["rev-parse", "--short=7", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let rev = String::from_utf8(output.stdout).ok()?;
    Some(rev.trim().to_string())
}
