//! Contract Test: Upsert Semantics
//!
//! Constraints verified:
//! - An existing record is updated by its identifier, never re-created
//! - A missing record is created exactly once
//! - Upserting the same address twice leaves exactly one record
//! - A failed lookup is not treated as absence: no write follows it
//! - Every write carries the short TTL and proxying disabled

mod common;

use cfst_ddns_core::Error;
use cfst_ddns_core::traits::{DnsRecordClient, RECORD_TTL, RecordType, UpsertResult};
use common::*;

#[tokio::test]
async fn existing_record_is_updated_by_identifier() {
    let client = InMemoryDnsClient::new().with_record("rec_123", "a.example.com", RecordType::A, "9.9.9.9");

    let result = client
        .upsert("a.example.com", "1.2.3.4", RecordType::A)
        .await
        .expect("upsert succeeds");

    assert_eq!(
        result,
        UpsertResult::Updated {
            record_id: "rec_123".to_string(),
            previous_content: "9.9.9.9".to_string(),
        }
    );

    let calls = client.calls();
    assert_eq!(calls.len(), 2, "one read and one write: {:?}", calls);
    assert!(matches!(&calls[1], ClientCall::Update(id, _) if id == "rec_123"));
    assert!(!calls.iter().any(|c| matches!(c, ClientCall::Create(_))));
}

#[tokio::test]
async fn missing_record_is_created_once() {
    let client = InMemoryDnsClient::new();

    let result = client
        .upsert("a.example.com", "1.2.3.4", RecordType::A)
        .await
        .expect("upsert succeeds");

    assert_eq!(result, UpsertResult::Created);

    let calls = client.calls();
    assert_eq!(calls.len(), 2, "one read and one write: {:?}", calls);
    match &calls[1] {
        ClientCall::Create(payload) => {
            assert_eq!(payload.name, "a.example.com");
            assert_eq!(payload.content, "1.2.3.4");
            assert_eq!(payload.record_type, RecordType::A);
            assert_eq!(payload.ttl, RECORD_TTL);
            assert!(!payload.proxied);
        }
        other => panic!("expected create, got {:?}", other),
    }
}

#[tokio::test]
async fn repeated_upsert_is_idempotent() {
    let client = InMemoryDnsClient::new();

    let first = client.upsert("a.example.com", "1.2.3.4", RecordType::A).await.unwrap();
    let second = client.upsert("a.example.com", "1.2.3.4", RecordType::A).await.unwrap();

    assert_eq!(first, UpsertResult::Created);
    assert!(matches!(second, UpsertResult::Updated { .. }));

    let records = client.records();
    assert_eq!(records.len(), 1, "no duplicate record: {:?}", records);
    assert_eq!(records[0].content, "1.2.3.4");
}

#[tokio::test]
async fn failed_lookup_does_not_write() {
    let client = InMemoryDnsClient::new().failing_lookup("a.example.com");

    let err = client
        .upsert("a.example.com", "1.2.3.4", RecordType::A)
        .await
        .expect_err("lookup failure is surfaced");

    assert!(matches!(err, Error::Http(_)), "unexpected error: {}", err);
    assert_eq!(
        client.calls(),
        vec![ClientCall::Lookup("a.example.com".to_string(), RecordType::A)]
    );
    assert!(client.records().is_empty());
}

#[tokio::test]
async fn record_of_other_type_is_not_reused() {
    let client = InMemoryDnsClient::new().with_record("rec_v6", "a.example.com", RecordType::Aaaa, "2001:db8::1");

    let result = client.upsert("a.example.com", "1.2.3.4", RecordType::A).await.unwrap();

    assert_eq!(result, UpsertResult::Created);
    assert_eq!(client.records().len(), 2);
}
