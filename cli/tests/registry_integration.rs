//! Integration test: push and inspect manifest lists against a local registry.
//!
//! ## Prerequisites
//!
//! - `mlist` binary built (`cargo build -p mlist-cli`)
//! - A registry listening on `localhost:5000` over plain HTTP
//! - Two single-platform images in it:
//!
//! ```bash
//! docker run -d -p 5000:5000 --name registry registry:2
//! docker pull --platform linux/amd64 alpine:3.19
//! docker tag alpine:3.19 localhost:5000/mlist-test/alpine:amd64
//! docker push localhost:5000/mlist-test/alpine:amd64
//! docker pull --platform linux/arm64 alpine:3.19
//! docker tag alpine:3.19 localhost:5000/mlist-test/alpine-arm64:latest
//! docker push localhost:5000/mlist-test/alpine-arm64:latest
//! ```
//!
//! ## Running
//!
//! ```bash
//! cargo test -p mlist-cli --test registry_integration -- --ignored --nocapture
//! ```
//!
//! Tests are `#[ignore]` by default because they need the binary and a
//! running registry.

use std::process::Command;

const AMD64: &str = "localhost:5000/mlist-test/alpine:amd64";
const ARM64_OTHER_REPO: &str = "localhost:5000/mlist-test/alpine-arm64:latest";
const TARGET: &str = "localhost:5000/mlist-test/alpine:multi";

/// Find the mlist binary in the target directory.
fn find_binary() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let workspace_root = std::path::Path::new(manifest_dir)
        .parent()
        .expect("cli crate should be inside workspace");

    for profile in ["debug", "release"] {
        let bin = workspace_root.join("target").join(profile).join("mlist");
        if bin.exists() {
            return bin.to_string_lossy().to_string();
        }
    }

    // Fall back to PATH
    "mlist".to_string()
}

/// Run an mlist command against the plain-HTTP registry; returns (stdout, success).
fn run_cmd(args: &[&str]) -> (String, bool) {
    let bin = find_binary();
    eprintln!("    $ mlist {}", args.join(" "));

    let output = Command::new(&bin)
        .arg("--plain-http")
        .args(args)
        .stderr(std::process::Stdio::inherit())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run `mlist {}`: {}", args.join(" "), e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    for line in stdout.lines() {
        eprintln!("    → {}", line);
    }
    (stdout, output.status.success())
}

/// Parse `Digest: <digest> <size>`.
fn parse_digest_line(stdout: &str) -> (String, u64) {
    let line = stdout
        .lines()
        .find(|l| l.starts_with("Digest: "))
        .unwrap_or_else(|| panic!("no digest line in output: {stdout}"));
    let mut parts = line["Digest: ".len()..].split_whitespace();
    let digest = parts.next().unwrap().to_string();
    let size = parts.next().unwrap().parse().unwrap();
    (digest, size)
}

fn write_spec(dir: &tempfile::TempDir, body: &str) -> String {
    let path = dir.path().join("list.yaml");
    std::fs::write(&path, body).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
#[ignore]
fn test_push_cross_repository_list_and_inspect() {
    let dir = tempfile::TempDir::new().unwrap();
    let spec = write_spec(
        &dir,
        &format!(
            "image: {TARGET}\ntags: [\"multi-latest\"]\nmanifests:\n  - image: {AMD64}\n  - image: {ARM64_OTHER_REPO}\n"
        ),
    );

    let (stdout, ok) = run_cmd(&["push", "from-spec", &spec]);
    assert!(ok, "push failed");
    let (digest, size) = parse_digest_line(&stdout);
    assert!(digest.starts_with("sha256:"));
    assert!(size > 0);

    let (raw, ok) = run_cmd(&["inspect", "--raw", TARGET]);
    assert!(ok, "inspect failed");
    let report: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(report["kind"], "list");
    assert_eq!(report["descriptor"]["digest"], digest.as_str());
    let entries = report["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["platform"]["architecture"], "amd64");
    assert_eq!(entries[1]["platform"]["architecture"], "arm64");

    // Re-pushing the same members yields the same digest
    let (again, ok) = run_cmd(&["push", "from-spec", &spec]);
    assert!(ok);
    assert_eq!(parse_digest_line(&again).0, digest);
}

#[test]
#[ignore]
fn test_push_from_args_oci_index() {
    let (stdout, ok) = run_cmd(&[
        "push",
        "from-args",
        "--platforms",
        "linux/amd64",
        "--template",
        "localhost:5000/mlist-test/alpine:ARCH",
        "--target",
        "localhost:5000/mlist-test/alpine:oci",
        "--type",
        "oci",
    ]);
    assert!(ok, "push failed");
    parse_digest_line(&stdout);

    let (human, ok) = run_cmd(&["inspect", "localhost:5000/mlist-test/alpine:oci"]);
    assert!(ok);
    assert!(human.contains("application/vnd.oci.image.index.v1+json"));
    assert!(human.contains("linux/amd64"));
}

#[test]
#[ignore]
fn test_missing_member_fails_unless_ignored() {
    let dir = tempfile::TempDir::new().unwrap();
    let spec = write_spec(
        &dir,
        &format!(
            "image: {TARGET}\nmanifests:\n  - image: {AMD64}\n  - image: localhost:5000/mlist-test/alpine:does-not-exist\n"
        ),
    );

    let (_, ok) = run_cmd(&["push", "from-spec", &spec]);
    assert!(!ok, "push of a missing member should fail");

    let (stdout, ok) = run_cmd(&["push", "from-spec", "--ignore-missing", &spec]);
    assert!(ok, "push with --ignore-missing failed");
    parse_digest_line(&stdout);
}
