//! In-memory [`Platform`] used by tests and offline runs.
//!
//! Behaves like the real backend where the core can observe it: submitted
//! requests are decoded from the Transit dialect, stale revisions are rejected,
//! changes are applied atomically, the revision moves by one per accepted
//! batch and reads are served in the JSON dialect.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::penpot::codec::{self, Dialect};
use crate::penpot::error::{PenpotError, PenpotResult};
use crate::penpot::model::{AttrOperation, Attribute, Change, DesignObject, File, Id, Page};
use crate::penpot::platform::Platform;

/// Simulated Penpot backing store.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    files: Mutex<IndexMap<Id, File>>,
    update_calls: AtomicUsize,
}

impl InMemoryPlatform {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a file with one empty page; returns the file and page ids.
    pub async fn create_file(&self, name: &str) -> (Id, Id) {
        let file_id = Id::generate();
        let page_id = Id::generate();
        let mut file = File::new(file_id.clone(), name);
        file.pages
            .insert(page_id.clone(), Page::new(page_id.clone(), "Page 1"));
        self.insert_file(file).await;
        (file_id, page_id)
    }

    /// Stores (or replaces) a file.
    pub async fn insert_file(&self, file: File) {
        self.files.lock().await.insert(file.id.clone(), file);
    }

    /// Current state of a file.
    pub async fn file(&self, file_id: &Id) -> Option<File> {
        self.files.lock().await.get(file_id).cloned()
    }

    /// Advances a file's revision as if another client had written to it.
    pub async fn bump_revision(&self, file_id: &Id) -> Option<u64> {
        let mut files = self.files.lock().await;
        let file = files.get_mut(file_id)?;
        file.revision += 1;
        Some(file.revision)
    }

    /// Number of `update_file` calls received, accepted or not.
    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn fetch_file(&self, file_id: &Id) -> PenpotResult<Value> {
        let files = self.files.lock().await;
        let file = files
            .get(file_id)
            .ok_or_else(|| PenpotError::api(404, format!("file {file_id} not found")))?;
        Ok(codec::encode_file(file, Dialect::Json))
    }

    async fn update_file(&self, request: Value) -> PenpotResult<Value> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let request = codec::decode_update(&request)?;

        let mut files = self.files.lock().await;
        let file = files
            .get_mut(&request.file_id)
            .ok_or_else(|| PenpotError::api(404, format!("file {} not found", request.file_id)))?;
        if request.revision != file.revision {
            return Err(PenpotError::revision_conflict(
                request.file_id.as_str(),
                request.revision,
            ));
        }

        let mut staged = file.clone();
        for change in &request.changes {
            apply_change(&mut staged, change)?;
        }
        for page in staged.pages.values() {
            page.validate_tree()?;
        }
        staged.revision += 1;
        debug!(
            file_id = %staged.id,
            revision = staged.revision,
            changes = request.changes.len(),
            "In-memory update applied"
        );
        *file = staged;
        Ok(json!({ "~:revn": file.revision }))
    }
}

fn page_mut<'f>(file: &'f mut File, page_id: Option<&Id>, object_id: &Id) -> PenpotResult<&'f mut Page> {
    let key = match page_id {
        Some(page_id) => page_id.clone(),
        None => file
            .find_object(object_id)
            .map(|(page, _)| page.id.clone())
            .ok_or_else(|| PenpotError::object_not_found(object_id.as_str()))?,
    };
    file.pages
        .get_mut(&key)
        .ok_or_else(|| PenpotError::api(400, format!("page {key} not found")))
}

fn attach(page: &mut Page, parent_id: &Id, child_id: &Id) {
    if let Some(parent) = page.objects.get_mut(parent_id) {
        let shapes = parent.shapes.get_or_insert_with(Vec::new);
        if !shapes.contains(child_id) {
            shapes.push(child_id.clone());
        }
    }
}

fn detach(page: &mut Page, parent_id: &Id, child_id: &Id) {
    if let Some(shapes) = page
        .objects
        .get_mut(parent_id)
        .and_then(|parent| parent.shapes.as_mut())
    {
        shapes.retain(|id| id != child_id);
    }
}

fn apply_change(file: &mut File, change: &Change) -> PenpotResult<()> {
    match change {
        Change::AddObject {
            id,
            page_id,
            frame_id,
            parent_id,
            object,
        } => {
            let page = page_mut(file, Some(page_id), id)?;
            if page.objects.contains_key(id) {
                return Err(PenpotError::api(400, format!("object {id} already exists")));
            }
            let mut object: DesignObject = object.clone();
            object.id = id.clone();
            object.parent_id = Some(parent_id.clone());
            object.frame_id = Some(frame_id.clone());
            page.objects.insert(id.clone(), object);
            attach(page, parent_id, id);
        }
        Change::ModifyObject {
            id,
            page_id,
            operations,
        } => {
            let page = page_mut(file, page_id.as_ref(), id)?;
            let object = page
                .objects
                .get_mut(id)
                .ok_or_else(|| PenpotError::object_not_found(id.as_str()))?;
            let old_parent = object.parent_id.clone();
            for attribute in operations.iter().flat_map(AttrOperation::attributes) {
                object.apply(attribute);
            }
            let new_parent = object.parent_id.clone();
            if old_parent != new_parent {
                if let Some(old) = &old_parent {
                    detach(page, old, id);
                }
                if let Some(new) = &new_parent {
                    attach(page, new, id);
                }
            }
            if operations
                .iter()
                .flat_map(AttrOperation::attributes)
                .any(|a| matches!(a, Attribute::Shapes(_)))
            {
                reparent_children(page, id);
            }
        }
        Change::DeleteObject { id, page_id } => {
            let page = page_mut(file, Some(page_id), id)?;
            let parent = page
                .objects
                .get(id)
                .ok_or_else(|| PenpotError::object_not_found(id.as_str()))?
                .parent_id
                .clone();
            for doomed in page.descendants(id) {
                page.objects.shift_remove(&doomed);
            }
            if let Some(parent) = parent {
                detach(page, &parent, id);
            }
        }
    }
    Ok(())
}

/// After a container's shape list is replaced, point each listed child at it.
fn reparent_children(page: &mut Page, container_id: &Id) {
    let children = page
        .objects
        .get(container_id)
        .and_then(|c| c.shapes.clone())
        .unwrap_or_default();
    for child_id in &children {
        let old_parent = page.objects.get(child_id).and_then(|c| c.parent_id.clone());
        if old_parent.as_ref() == Some(container_id) {
            continue;
        }
        if let Some(old) = &old_parent {
            detach(page, old, child_id);
        }
        if let Some(child) = page.objects.get_mut(child_id) {
            child.parent_id = Some(container_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penpot::model::{ObjectKind, UpdateRequest};

    fn add_rect(page_id: &Id, id: &str, parent: &Id) -> Change {
        let mut object = DesignObject::new(Id::from(id), ObjectKind::Rect);
        object.set_geometry(0.0, 0.0, 10.0, 10.0);
        Change::AddObject {
            id: Id::from(id),
            page_id: page_id.clone(),
            frame_id: Id::root_frame(),
            parent_id: parent.clone(),
            object,
        }
    }

    fn request(file_id: &Id, revision: u64, changes: Vec<Change>) -> Value {
        codec::encode_update(&UpdateRequest {
            file_id: file_id.clone(),
            session_id: Id::generate(),
            revision,
            version: None,
            changes,
        })
    }

    #[tokio::test]
    async fn add_attaches_to_parent_and_bumps_revision() {
        let platform = InMemoryPlatform::new();
        let (file_id, page_id) = platform.create_file("F").await;
        let response = platform
            .update_file(request(&file_id, 0, vec![add_rect(&page_id, "r1", &Id::root_frame())]))
            .await
            .unwrap();
        assert_eq!(response, json!({"~:revn": 1}));

        let file = platform.file(&file_id).await.unwrap();
        let root = &file.pages[&page_id].objects[&Id::root_frame()];
        assert_eq!(root.shapes.as_deref(), Some(&[Id::from("r1")][..]));
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let platform = InMemoryPlatform::new();
        let (file_id, _) = platform.create_file("F").await;
        platform.bump_revision(&file_id).await;
        let err = platform
            .update_file(request(&file_id, 0, Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, PenpotError::RevisionConflict { revision: 0, .. }));
        assert_eq!(platform.file(&file_id).await.unwrap().revision, 1);
    }

    #[tokio::test]
    async fn failed_batch_leaves_file_untouched() {
        let platform = InMemoryPlatform::new();
        let (file_id, page_id) = platform.create_file("F").await;
        let changes = vec![
            add_rect(&page_id, "r1", &Id::root_frame()),
            add_rect(&page_id, "r2", &Id::from("nowhere")),
        ];
        let err = platform
            .update_file(request(&file_id, 0, changes))
            .await
            .unwrap_err();
        assert!(matches!(err, PenpotError::Format { .. }));

        let file = platform.file(&file_id).await.unwrap();
        assert_eq!(file.revision, 0);
        assert_eq!(file.object_count(), 1);
    }

    #[tokio::test]
    async fn delete_removes_descendants() {
        let platform = InMemoryPlatform::new();
        let (file_id, page_id) = platform.create_file("F").await;
        let mut group = DesignObject::new(Id::from("g"), ObjectKind::Group);
        group.shapes = Some(Vec::new());
        let changes = vec![
            Change::AddObject {
                id: Id::from("g"),
                page_id: page_id.clone(),
                frame_id: Id::root_frame(),
                parent_id: Id::root_frame(),
                object: group,
            },
            add_rect(&page_id, "child", &Id::from("g")),
        ];
        platform
            .update_file(request(&file_id, 0, changes))
            .await
            .unwrap();

        let delete = Change::DeleteObject {
            id: Id::from("g"),
            page_id: page_id.clone(),
        };
        platform
            .update_file(request(&file_id, 1, vec![delete]))
            .await
            .unwrap();

        let file = platform.file(&file_id).await.unwrap();
        assert_eq!(file.object_count(), 1);
        assert!(file.pages[&page_id].objects[&Id::root_frame()]
            .shapes
            .as_ref()
            .is_some_and(Vec::is_empty));
    }

    #[tokio::test]
    async fn reads_are_served_in_json_dialect() {
        let platform = InMemoryPlatform::new();
        let (file_id, _) = platform.create_file("F").await;
        let raw = platform.fetch_file(&file_id).await.unwrap();
        assert!(raw.get("revn").is_some());
        assert!(raw["data"].get("pagesIndex").is_some());
        assert_eq!(codec::decode_file(&raw).unwrap().id, file_id);
    }
}
