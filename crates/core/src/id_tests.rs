// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{AssociationId, CommandId, DocumentId, IdGen, ShortId, UuidIdGen};

#[test]
fn document_id_roundtrip() {
    let id = DocumentId::new("doc-123");
    assert_eq!(id.as_str(), "doc-123");
    assert_eq!(id.to_string(), "doc-123");
    assert_eq!(id, "doc-123");
}

#[test]
fn short_truncates() {
    let id = AssociationId::new("abcdef123456");
    assert_eq!(id.short(6), "abcdef");
    assert_eq!(id.short(100), "abcdef123456");
}

#[test]
fn empty_id() {
    let id = CommandId::default();
    assert!(id.is_empty());
    assert!(!CommandId::new("c").is_empty());
}

#[test]
fn short_id_on_str() {
    assert_eq!("hello".short(3), "hel");
    assert_eq!("hi".short(3), "hi");
}

#[test]
fn uuid_gen_unique() {
    let gen = UuidIdGen;
    let a = gen.next();
    let b = gen.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn serde_transparent() {
    let id = DocumentId::new("doc-1");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"doc-1\"");
    let back: DocumentId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
