//! Integration tests for the public wire format of events and configuration.
//!
//! Frontends consume `UploadEvent` as a tagged JSON union and ship
//! configuration as partial JSON documents; these tests pin both shapes.

use uplink_core::{
    ConfigLookup, EventKind, ItemId, RejectReason, ResponseBody, StaticConfigLookup, UploadEvent,
    UploadResponse, UploaderConfig,
};

#[test]
fn test_success_event_carries_response() {
    let response = UploadResponse::parse(200, Some("application/json"), r#"{"id": 42}"#);
    let event = UploadEvent::Success {
        item: ItemId::new(9),
        response: Some(response),
    };

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "success");
    assert_eq!(json["item"], 9);
    assert_eq!(json["response"]["status"], 200);
    assert_eq!(json["response"]["body"]["kind"], "json");
    assert_eq!(json["response"]["body"]["value"]["id"], 42);
}

#[test]
fn test_rejected_event_reason_shape() {
    let event = UploadEvent::Rejected {
        item: ItemId::new(1),
        reason: RejectReason::TooLarge {
            size_mib: 1.5,
            max_mib: 1.0,
        },
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["reason"]["kind"], "too_large");
    assert_eq!(json["reason"]["size_mib"], 1.5);
}

#[test]
fn test_group_events_list_members_in_order() {
    let items = vec![ItemId::new(3), ItemId::new(1), ItemId::new(2)];
    let event = UploadEvent::GroupCanceled {
        items: items.clone(),
    };
    assert_eq!(event.kind(), EventKind::GroupCanceled);
    assert_eq!(event.item(), None);

    let parsed: UploadEvent =
        serde_json::from_value(serde_json::to_value(&event).unwrap()).unwrap();
    assert_eq!(parsed, UploadEvent::GroupCanceled { items });
}

#[test]
fn test_lookup_resolves_partial_documents() {
    let config = UploaderConfig::from_json_str(
        r#"{
            "url": "https://example.invalid/upload",
            "chunk_size_bytes": 1048576,
            "parallel_chunk_uploads": true,
            "max_parallel_chunks": 4
        }"#,
    )
    .unwrap();
    config.validate().unwrap();

    let lookup = StaticConfigLookup::new().with("avatar-upload", config);
    let resolved = lookup.lookup("avatarUpload").unwrap();
    assert_eq!(resolved.chunk_parallelism(), 4);
    assert!(resolved.should_chunk(2 * 1024 * 1024));
    assert_eq!(resolved.concurrency_budget, 2);
}

#[test]
fn test_error_response_text_body() {
    let response = UploadResponse::parse(500, Some("text/html"), "<h1>oops</h1>");
    assert_eq!(response.body, ResponseBody::Text("<h1>oops</h1>".to_string()));
    assert_eq!(response.error_message(), None);
}
