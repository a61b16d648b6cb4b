//! End-to-end editing scenarios against the in-memory platform.

use serde_json::{json, Value};

use penpot_mcp::penpot::changes::ChangeListBuilder;
use penpot_mcp::penpot::codec;
use penpot_mcp::penpot::{
    Editor, FileCache, Id, InMemoryPlatform, Intent, PenpotError, Platform, SessionState,
    UpdateSession,
};

fn payload(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn add_rect(page_id: &Id, id: Option<&str>) -> Intent {
    let mut fields = payload(json!({"kind": "rect", "x": 0, "y": 0, "width": 10, "height": 10}));
    if let Some(id) = id {
        fields.insert("id".to_string(), json!(id));
    }
    Intent::Add {
        page_id: page_id.clone(),
        parent_id: None,
        payload: fields,
    }
}

#[tokio::test]
async fn each_submit_advances_the_revision_by_one() {
    let platform = InMemoryPlatform::new();
    let (file_id, page_id) = platform.create_file("Monotonic").await;
    let mut session = UpdateSession::new(&platform);

    for expected in 1..=4_u64 {
        let observed = session.begin(&file_id).await.unwrap();
        assert_eq!(observed, expected - 1);

        let change = {
            let mut builder = ChangeListBuilder::with_snapshot(session.snapshot().unwrap());
            builder
                .build(&add_rect(&page_id, Some(&format!("rect-{expected}"))))
                .unwrap()
        };
        assert_eq!(session.submit(vec![change]).await.unwrap(), expected);
        assert!(matches!(session.state(), SessionState::Idle));
    }
}

#[tokio::test]
async fn stale_revision_is_a_conflict_not_a_write() {
    let platform = InMemoryPlatform::new();
    let (file_id, page_id) = platform.create_file("Contended").await;
    let mut session = UpdateSession::new(&platform);
    session.begin(&file_id).await.unwrap();
    let change = ChangeListBuilder::with_snapshot(session.snapshot().unwrap())
        .build(&add_rect(&page_id, Some("late")))
        .unwrap();

    // Another client writes in between.
    assert_eq!(platform.bump_revision(&file_id).await, Some(1));

    let err = session.submit(vec![change.clone()]).await.unwrap_err();
    assert!(matches!(err, PenpotError::RevisionConflict { revision: 0, .. }));
    assert!(matches!(session.state(), SessionState::Conflict { .. }));
    assert!(platform.file(&file_id).await.unwrap().find_object(&Id::from("late")).is_none());

    // Submitting again without a new begin is refused locally.
    let again = session.submit(vec![change.clone()]).await.unwrap_err();
    assert!(matches!(again, PenpotError::SessionState { .. }));

    assert_eq!(session.begin(&file_id).await.unwrap(), 1);
    assert_eq!(session.submit(vec![change]).await.unwrap(), 2);
}

#[tokio::test]
async fn add_then_modify_colour() {
    let platform = InMemoryPlatform::new();
    let (file_id, page_id) = platform.create_file("Colours").await;
    let editor = Editor::new(&platform);

    let added = editor.apply(&file_id, &[add_rect(&page_id, None)]).await.unwrap();
    let rect_id = added.created_ids[0].clone();

    let modified = editor
        .apply(
            &file_id,
            &[Intent::Modify {
                object_id: rect_id.clone(),
                attributes: payload(json!({"color": "#FF0000"})),
            }],
        )
        .await
        .unwrap();
    assert_eq!(modified.revision, added.revision + 1);

    let raw = platform.fetch_file(&file_id).await.unwrap();
    let file = codec::decode_file(&raw).unwrap();
    let (_, rect) = file.find_object(&rect_id).unwrap();
    assert_eq!(rect.fills.as_ref().unwrap()[0].color.as_deref(), Some("#FF0000"));
}

#[tokio::test]
async fn delete_then_read() {
    let platform = InMemoryPlatform::new();
    let (file_id, page_id) = platform.create_file("Deletion").await;
    let cache = FileCache::new(std::time::Duration::from_secs(60), 4);
    let editor = Editor::new(&platform).with_cache(Some(&cache));

    editor.apply(&file_id, &[add_rect(&page_id, Some("doomed"))]).await.unwrap();
    let doomed = Id::from("doomed");
    editor
        .apply(
            &file_id,
            &[Intent::Delete {
                object_id: doomed.clone(),
                page_id: None,
            }],
        )
        .await
        .unwrap();

    assert!(cache.get(&file_id).is_none());
    let file = codec::decode_file(&platform.fetch_file(&file_id).await.unwrap()).unwrap();
    assert!(file.find_object(&doomed).is_none());
}

#[test]
fn missing_width_is_named() {
    let err = ChangeListBuilder::new()
        .build_add(
            &payload(json!({"kind": "rectangle", "x": 0, "y": 0})),
            &Id::from("page"),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, PenpotError::Validation { ref field, .. } if field == "width"));
    assert!(err.to_string().contains("width"));
}

#[tokio::test]
async fn unknown_target_fails_without_submitting() {
    let platform = InMemoryPlatform::new();
    let (file_id, _) = platform.create_file("Missing").await;
    let err = Editor::new(&platform)
        .apply(
            &file_id,
            &[Intent::Modify {
                object_id: Id::from("ghost"),
                attributes: payload(json!({"x": 4})),
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PenpotError::ObjectNotFound { ref object_id } if object_id == "ghost"));
    assert_eq!(platform.update_calls(), 0);
}
