use std::process::Command;

fn main() {
    let pkg_version = env!("CARGO_PKG_VERSION");

    // Get commit count
    let commit_count = Command::new("git")
        .args(["rev-list", "--count", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "0".to_string());

    // Version: PKG_VERSION+COMMITCOUNT
    println!("cargo:rustc-env=VMG_VERSION={}+{}", pkg_version, commit_count);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
