// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{AgentConfig, ConfigError};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn defaults_are_sensible() {
    let config = AgentConfig::default();
    assert_eq!(config.worker_limit, 5);
    assert_eq!(config.retention_hours, 336);
    assert_eq!(config.document_root, "documents");
    assert!(config.legacy_association_api);
    assert!(config.instance_id.is_empty());
}

#[test]
fn minimal_file_only_needs_instance_id() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"instanceId": "i-abc123"}}"#).unwrap();

    let config = AgentConfig::load(file.path()).unwrap();
    assert_eq!(config.instance_id, "i-abc123");
    assert_eq!(config.worker_limit, 5);
}

#[test]
fn full_file_overrides_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "instanceId": "i-abc123",
            "workerLimit": 10,
            "retentionHours": 48,
            "pollIntervalSeconds": 5,
            "legacyAssociationApi": false,
            "region": "eu-west-1",
            "endpoint": "https://example.invalid"
        }}"#
    )
    .unwrap();

    let config = AgentConfig::load(file.path()).unwrap();
    assert_eq!(config.worker_limit, 10);
    assert_eq!(config.retention_hours, 48);
    assert_eq!(config.poll_interval_seconds, 5);
    assert!(!config.legacy_association_api);
    assert_eq!(config.region, "eu-west-1");
    assert_eq!(config.endpoint, "https://example.invalid");
}

#[test]
fn malformed_file_is_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();

    assert!(matches!(
        AgentConfig::load(file.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn missing_file_is_io_error() {
    assert!(matches!(
        AgentConfig::load(std::path::Path::new("/nonexistent/steward.json")),
        Err(ConfigError::Io { .. })
    ));
}
