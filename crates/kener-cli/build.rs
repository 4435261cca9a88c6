use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    // Empty outside a git checkout (e.g. when built from a published crate).
    let revision = git(&["describe", "--always", "--dirty", "--abbrev=8"]).unwrap_or_default();

    println!("cargo:rustc-env=KENER_AGENT_GIT_REV={revision}");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");
}
