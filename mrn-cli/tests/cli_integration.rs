//! CLI integration tests for mrn-cli.
//!
//! These tests run the actual binary against fixture files and check
//! output and exit codes.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the mrn binary.
fn mrn() -> Command {
    let mut cmd = Command::cargo_bin("mrn").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

const FIXTURE: &str = r#"[
    {
        "id": "30000000-0000-4000-8000-000000000001",
        "medicalId": "ab12c",
        "name": {"given": ["John"], "family": "Doe"},
        "contact": [{"system": "email", "value": "john@example.com"}],
        "updatedAt": "2025-06-01T08:00:00Z"
    },
    {
        "id": "30000000-0000-4000-8000-000000000002",
        "medicalId": "CD34E",
        "name": "Jane Roe",
        "contact": "[{\"system\":\"email\",\"value\":\"shared@example.com\"}]",
        "updatedAt": "2025-06-02T08:00:00Z"
    },
    {
        "id": "30000000-0000-4000-8000-000000000003",
        "medicalId": "FG56H",
        "name": "Jim Roe",
        "contact": "[{\"system\":\"email\",\"value\":\"shared@example.com\"}]",
        "updatedAt": "2025-06-03T08:00:00Z"
    }
]"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("patients.json"), FIXTURE).unwrap();
        Self { dir }
    }

    fn fixture(&self) -> PathBuf {
        self.dir.path().join("patients.json")
    }

    fn frames(&self, script: &str) -> PathBuf {
        let path = self.dir.path().join("frames.txt");
        fs::write(&path, script).unwrap();
        path
    }
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_lists_commands_and_exit_codes() {
    mrn()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("67"));
}

#[test]
fn test_version_displays_version() {
    mrn()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mrn"));
}

// ============================================================================
// Validate and Display Tests
// ============================================================================

#[test]
fn test_validate_accepts_and_canonicalizes() {
    mrn()
        .args(["validate", " ab12c "])
        .assert()
        .success()
        .stdout(predicate::str::contains("AB12C"));
}

#[test]
fn test_validate_rejects_with_data_error() {
    mrn()
        .args(["validate", "AB12C", "12345"])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("INVALID"))
        .stderr(predicate::str::contains("letter"));
}

#[test]
fn test_display_forms() {
    mrn()
        .args(["display", "ab12c", "abcde", "550e8400-e29b-41d4-a716-446655440000"])
        .assert()
        .success()
        .stdout("AB12C\nInvalid Format\nID-550E8\n");
}

#[test]
fn test_display_without_value_is_not_assigned() {
    mrn()
        .arg("display")
        .assert()
        .success()
        .stdout("Not Assigned\n");
}

// ============================================================================
// Resolve and Search Tests
// ============================================================================

#[test]
fn test_resolve_by_medical_id() {
    let ws = Workspace::new();
    mrn()
        .arg("resolve")
        .arg("--fixture")
        .arg(ws.fixture())
        .args(["--medical-id", "AB12C"])
        .assert()
        .success()
        .stdout(predicate::str::contains("John Doe"))
        .stdout(predicate::str::contains("medical_id"));
}

#[test]
fn test_resolve_json_includes_duplicate_warning() {
    let ws = Workspace::new();
    let output = mrn()
        .arg("resolve")
        .arg("--fixture")
        .arg(ws.fixture())
        .args(["--email", "shared@example.com", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["strategy"], "email");
    assert_eq!(json["patient"]["fullName"], "Jim Roe");
    assert_eq!(json["duplicateWarning"]["matchCount"], 2);
}

#[test]
fn test_resolve_reject_policy_fails_on_shared_email() {
    let ws = Workspace::new();
    mrn()
        .arg("resolve")
        .arg("--fixture")
        .arg(ws.fixture())
        .args(["--email", "shared@example.com", "--policy", "reject"])
        .assert()
        .code(65);
}

#[test]
fn test_resolve_unknown_patient_exits_not_found() {
    let ws = Workspace::new();
    mrn()
        .arg("resolve")
        .arg("--fixture")
        .arg(ws.fixture())
        .args(["--medical-id", "ZZ99Z"])
        .assert()
        .code(67)
        .stderr(predicate::str::contains("No patient found"));
}

#[test]
fn test_resolve_missing_fixture_is_input_error() {
    mrn()
        .args(["resolve", "--fixture", "/nonexistent/patients.json", "-m", "AB12C"])
        .assert()
        .code(66);
}

#[test]
fn test_search_lists_matches() {
    let ws = Workspace::new();
    mrn()
        .arg("search")
        .arg("--fixture")
        .arg(ws.fixture())
        .arg("roe")
        .assert()
        .success()
        .stdout(predicate::str::contains("Jane Roe"))
        .stdout(predicate::str::contains("Jim Roe"))
        .stdout(predicate::str::contains("2 result(s)"));
}

// ============================================================================
// Scan Tests
// ============================================================================

#[test]
fn test_scan_selects_patient() {
    let ws = Workspace::new();
    mrn()
        .arg("scan")
        .arg("--fixture")
        .arg(ws.fixture())
        .arg("--frames")
        .arg(ws.frames("-\n-\nmrn:cd34e\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECTED"))
        .stdout(predicate::str::contains("Jane Roe"));
}

#[test]
fn test_scan_invalid_code_is_data_error() {
    let ws = Workspace::new();
    mrn()
        .arg("scan")
        .arg("--fixture")
        .arg(ws.fixture())
        .arg("--frames")
        .arg(ws.frames("ABCDE\n"))
        .assert()
        .code(65)
        .stderr(predicate::str::contains("not a medical identifier"));
}

#[test]
fn test_scan_unknown_code_exits_not_found() {
    let ws = Workspace::new();
    mrn()
        .arg("scan")
        .arg("--fixture")
        .arg(ws.fixture())
        .arg("--frames")
        .arg(ws.frames("ZZ99Z\n"))
        .assert()
        .code(67);
}

#[test]
fn test_scan_permission_denied_is_not_retried() {
    let ws = Workspace::new();
    mrn()
        .arg("scan")
        .arg("--fixture")
        .arg(ws.fixture())
        .arg("--frames")
        .arg(ws.frames("!denied\n"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("permission denied"));
}

#[test]
fn test_scan_without_code_times_out() {
    let ws = Workspace::new();
    mrn()
        .arg("scan")
        .arg("--fixture")
        .arg(ws.fixture())
        .arg("--frames")
        .arg(ws.frames("-\n"))
        .args(["--timeout-ms", "200"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No code scanned"));
}
