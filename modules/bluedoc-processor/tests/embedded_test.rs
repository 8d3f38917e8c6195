//! Embedded documents: routing lock, write boundary, child-to-parent
//! channels and initialization.

mod common;

use std::sync::Arc;

use bluedoc_processor::{Document, EventNode, ProcessorError, Sha256Blue};
use common::{recorded, Harness};
use serde_json::json;

fn lockable_doc() -> Document {
    Document::new(json!({
        "contracts": {
            "embedded": { "type": "Process Embedded", "paths": ["/child"] },
            "unlock": { "type": "Test Event Channel", "eventType": "Unlock" },
            "removeEmbedding": {
                "type": "Apply Patch",
                "channel": "unlock",
                "patch": { "op": "remove", "path": "/contracts/embedded" }
            },
            "lock": { "type": "Test Event Channel", "eventType": "Lock" },
            "addEmbedding": {
                "type": "Apply Patch",
                "channel": "lock",
                "patch": {
                    "op": "add",
                    "path": "/contracts/embedded",
                    "val": { "type": "Process Embedded", "paths": ["/child"] }
                }
            }
        },
        "child": {
            "counter": 0,
            "contracts": {
                "testChannel": { "type": "Test Event Channel" },
                "recorder": { "type": "Recording Handler", "channel": "testChannel" }
            }
        }
    }))
}

fn direct_to_child() -> Vec<EventNode> {
    vec![EventNode::new(json!({ "type": "Test Event" })).with_dispatch_path("/child")]
}

#[tokio::test]
async fn embedding_locks_direct_routing_until_removed() {
    let mut harness = Harness::new();
    let locked = lockable_doc();

    let err = harness
        .processor
        .process_events(&locked, direct_to_child())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProcessorError::EmbeddedRouting { ref embedded_path, .. } if embedded_path == "/child"
    ));

    let unlocked = harness
        .processor
        .process_payloads(&locked, vec![json!({ "type": "Unlock" })])
        .await
        .unwrap()
        .state;
    assert!(unlocked.contract("/", "embedded").is_none());

    let routed = harness
        .processor
        .process_events(&unlocked, direct_to_child())
        .await
        .unwrap()
        .state;
    assert_eq!(routed.get("/child/counter"), Some(&json!(1)));
    assert_eq!(harness.recorded(), vec![recorded("recorder", 0)]);

    let relocked = harness
        .processor
        .process_payloads(&routed, vec![json!({ "type": "Lock" })])
        .await
        .unwrap()
        .state;
    let err = harness
        .processor
        .process_events(&relocked, direct_to_child())
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessorError::EmbeddedRouting { .. }));
}

#[tokio::test]
async fn external_events_reach_embedded_documents_through_the_embedding() {
    let mut harness = Harness::new();

    let result = harness
        .processor
        .process_payloads(&lockable_doc(), vec![json!({ "type": "Test Event" })])
        .await
        .unwrap();

    assert_eq!(result.state.get("/child/counter"), Some(&json!(1)));
    assert!(result
        .state
        .get("/child/contracts/checkpoint/lastEvents/testChannel/blueId")
        .is_some());
}

#[tokio::test]
async fn parent_cannot_write_inside_embedded_document() {
    let mut harness = Harness::new();
    let document = Document::new(json!({
        "contracts": {
            "embedded": { "type": "Process Embedded", "paths": ["/child"] },
            "testChannel": { "type": "Test Event Channel" },
            "intrude": {
                "type": "Apply Patch",
                "channel": "testChannel",
                "patch": { "op": "replace", "path": "/child/value", "val": 2 }
            }
        },
        "child": { "value": 1 }
    }));

    let err = harness
        .processor
        .process_payloads(&document, vec![json!({ "type": "Test Event" })])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProcessorError::EmbeddedDocumentModification { ref embedded_path, ref writer_path, .. }
            if embedded_path == "/child" && writer_path == "/"
    ));
}

#[tokio::test]
async fn child_events_surface_through_embedded_node_channel() {
    let mut harness = Harness::new();
    let document = Document::new(json!({
        "contracts": {
            "embedded": { "type": "Process Embedded", "paths": ["/child"] },
            "childEvents": { "type": "Embedded Node Channel", "path": "/child" },
            "onChildDone": {
                "type": "Apply Patch",
                "channel": "childEvents",
                "patch": { "op": "add", "path": "/childNotified", "val": true }
            }
        },
        "child": {
            "contracts": {
                "testChannel": { "type": "Test Event Channel" },
                "notify": { "type": "Emit Event", "channel": "testChannel", "event": { "type": "Child Done" } }
            }
        }
    }));

    let result = harness
        .processor
        .process_payloads(&document, vec![json!({ "type": "Test Event" })])
        .await
        .unwrap();

    assert_eq!(result.state.get("/childNotified"), Some(&json!(true)));
    let child_done = result
        .emitted
        .iter()
        .find(|event| event.event_type() == Some("Child Done"))
        .unwrap();
    assert_eq!(child_done.origin_node_path.as_deref(), Some("/child"));
}

#[tokio::test]
async fn initialize_announces_to_every_document_deepest_first() {
    let mut harness = Harness::with_blue(Arc::new(Sha256Blue));
    let document = Document::new(json!({
        "contracts": {
            "embedded": { "type": "Process Embedded", "paths": ["/child"] },
            "life": { "type": "Lifecycle Event Channel" },
            "onInit": {
                "type": "Apply Patch",
                "channel": "life",
                "patch": { "op": "add", "path": "/status", "val": "ready" }
            }
        },
        "child": {
            "contracts": {
                "life": {
                    "type": "Lifecycle Event Channel",
                    "event": { "type": "Document Processing Initiated" }
                },
                "onInit": {
                    "type": "Apply Patch",
                    "channel": "life",
                    "patch": { "op": "add", "path": "/status", "val": "child-ready" }
                }
            }
        }
    }));
    assert!(!harness.processor.is_initialized(&document));

    let result = harness.processor.initialize(&document).await.unwrap();

    assert_eq!(result.state.get("/status"), Some(&json!("ready")));
    assert_eq!(result.state.get("/child/status"), Some(&json!("child-ready")));
    assert!(harness.processor.is_initialized(&result.state));

    let dispatched: Vec<_> = result
        .emitted
        .iter()
        .filter_map(|event| event.dispatch_path.as_deref())
        .collect();
    assert_eq!(dispatched, vec!["/child", "/"]);

    let document_id = result
        .state
        .get("/contracts/initialized/documentId")
        .and_then(|id| id.as_str())
        .unwrap();
    assert_eq!(document_id.len(), 64);
    assert_eq!(result.emitted[1].payload["documentId"], json!(document_id));
    // lifecycle events are internal, so nothing is checkpointed
    assert_eq!(result.state.get("/contracts/checkpoint/lastEvents"), Some(&json!({})));

    let again = harness.processor.initialize(&result.state).await.unwrap();
    assert!(again.emitted.is_empty());
    assert!(again.state.same_snapshot(&result.state));
}
