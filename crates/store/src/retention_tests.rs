// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{is_association_owned, sweep};
use chrono::{TimeZone, Utc};
use std::fs;
use std::path::Path;
use steward_core::test_support::assoc_document;
use tempfile::TempDir;

const OLD_UUID: &str = "0a1b2c3d-0000-1111-2222-333344445555";
const NEW_UUID: &str = "9f8e7d6c-0000-1111-2222-333344445555";

#[yare::parameterized(
    uuid_and_date   = { "0a1b2c3d-0000-1111-2222-333344445555.2020-01-01T00-00-00Z", true },
    uuid_date_only  = { "0a1b2c3d-0000-1111-2222-333344445555.2020-01-01", true },
    bare_uuid       = { "0a1b2c3d-0000-1111-2222-333344445555", false },
    uppercase_uuid  = { "0A1B2C3D-0000-1111-2222-333344445555.2020-01-01T00-00-00Z", false },
    not_a_uuid      = { "doc-1.2020-01-01T00-00-00Z", false },
    temp_file       = { "0a1b2c3d-0000-1111-2222-333344445555.tmp", false },
)]
fn ownership_matcher(name: &str, expected: bool) {
    assert_eq!(is_association_owned(name), expected);
}

/// Lay out a completed state file plus a matching orchestration subtree.
fn seed_run(root: &Path, doc_id: &str, assoc_id: &str, ts: &str) {
    let completed = root.join("completed");
    fs::create_dir_all(&completed).unwrap();

    let doc = assoc_document(doc_id, assoc_id, vec![]);
    let json = serde_json::to_vec(&doc).unwrap();
    fs::write(completed.join(format!("{}.{}", doc_id, ts)), json).unwrap();

    let orch = root
        .join("orchestration")
        .join(assoc_id)
        .join(ts)
        .join("aws:runShellScript");
    fs::create_dir_all(&orch).unwrap();
    fs::write(orch.join("stdout"), b"output").unwrap();
}

#[test]
fn expired_run_removed_with_orchestration() {
    let root = TempDir::new().unwrap();
    seed_run(root.path(), OLD_UUID, "a1", "2020-01-01T00-00-00Z");
    seed_run(root.path(), NEW_UUID, "a2", "2020-01-02T23-00-00Z");

    let now = Utc.with_ymd_and_hms(2020, 1, 3, 0, 0, 0).unwrap();
    let report = sweep(
        &root.path().join("completed"),
        &root.path().join("orchestration"),
        now,
        24,
        is_association_owned,
    )
    .unwrap();

    assert_eq!(report.removed_files, 1);
    assert_eq!(report.removed_dirs, 1);
    assert_eq!(report.retained, 1);

    let completed = root.path().join("completed");
    assert!(!completed
        .join(format!("{}.2020-01-01T00-00-00Z", OLD_UUID))
        .exists());
    assert!(completed
        .join(format!("{}.2020-01-02T23-00-00Z", NEW_UUID))
        .exists());

    // a1's subtree is gone, including the now-empty owner folder
    assert!(!root.path().join("orchestration").join("a1").exists());
    assert!(root
        .path()
        .join("orchestration")
        .join("a2")
        .join("2020-01-02T23-00-00Z")
        .exists());
}

#[test]
fn unowned_files_are_ignored() {
    let root = TempDir::new().unwrap();
    let completed = root.path().join("completed");
    fs::create_dir_all(&completed).unwrap();
    fs::write(completed.join("notes.txt"), b"keep me").unwrap();

    let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    let report = sweep(
        &completed,
        &root.path().join("orchestration"),
        now,
        24,
        is_association_owned,
    )
    .unwrap();

    assert_eq!(report.removed_files, 0);
    assert!(completed.join("notes.txt").exists());
}

#[test]
fn unreadable_state_falls_back_to_filename_owner() {
    let root = TempDir::new().unwrap();
    let completed = root.path().join("completed");
    fs::create_dir_all(&completed).unwrap();
    fs::write(
        completed.join(format!("{}.2020-01-01T00-00-00Z", OLD_UUID)),
        b"not json",
    )
    .unwrap();
    let orch = root
        .path()
        .join("orchestration")
        .join(OLD_UUID)
        .join("2020-01-01T00-00-00Z");
    fs::create_dir_all(&orch).unwrap();

    let now = Utc.with_ymd_and_hms(2020, 1, 3, 0, 0, 0).unwrap();
    let report = sweep(
        &completed,
        &root.path().join("orchestration"),
        now,
        24,
        is_association_owned,
    )
    .unwrap();

    assert_eq!(report.removed_files, 1);
    assert_eq!(report.removed_dirs, 1);
    assert!(!orch.exists());
}

#[test]
fn missing_completed_dir_is_empty_sweep() {
    let root = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let report = sweep(
        &root.path().join("completed"),
        &root.path().join("orchestration"),
        now,
        24,
        is_association_owned,
    )
    .unwrap();
    assert_eq!(report, super::SweepReport::default());
}

#[test]
fn boundary_age_is_removed() {
    let root = TempDir::new().unwrap();
    seed_run(root.path(), OLD_UUID, "a1", "2020-01-02T00-00-00Z");

    // Exactly 24h old
    let now = Utc.with_ymd_and_hms(2020, 1, 3, 0, 0, 0).unwrap();
    let report = sweep(
        &root.path().join("completed"),
        &root.path().join("orchestration"),
        now,
        24,
        is_association_owned,
    )
    .unwrap();
    assert_eq!(report.removed_files, 1);
}
