//! High-level `apply`: intents in, new revision out.

use serde::Serialize;
use tracing::debug;

use crate::penpot::cache::FileCache;
use crate::penpot::changes::{parse_attributes, ChangeListBuilder, Intent};
use crate::penpot::error::{PenpotError, PenpotResult, StaleReadWarning};
use crate::penpot::model::{Change, Id};
use crate::penpot::platform::Platform;
use crate::penpot::session::UpdateSession;

/// Result of a successful [`Editor::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    /// Revision returned by the platform.
    pub revision: u64,
    /// Number of change operations submitted.
    pub changes_applied: usize,
    /// Ids of objects created by the batch, in intent order.
    pub created_ids: Vec<Id>,
    /// Reminder that an immediate read may not reflect the write.
    pub warning: StaleReadWarning,
}

/// Composes the change-list builder, the update session and the codec.
#[derive(Clone, Copy)]
pub struct Editor<'p> {
    platform: &'p dyn Platform,
    cache: Option<&'p FileCache>,
}

impl std::fmt::Debug for Editor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl<'p> Editor<'p> {
    /// An editor over `platform`.
    #[must_use]
    pub fn new(platform: &'p dyn Platform) -> Self {
        Self {
            platform,
            cache: None,
        }
    }

    /// Uses `cache` for reads and invalidates it after writes.
    #[must_use]
    pub fn with_cache(mut self, cache: Option<&'p FileCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Applies a batch of intents to a file in one update.
    ///
    /// Intents are checked before anything is read, so a malformed batch
    /// fails without touching the network. The batch is submitted exactly
    /// once; a revision conflict is returned, not retried.
    ///
    /// # Errors
    ///
    /// - [`PenpotError::Validation`] for a malformed intent
    /// - [`PenpotError::ObjectNotFound`] for an intent targeting an unknown object
    /// - [`PenpotError::RevisionConflict`] when another writer got there first
    /// - transport and format errors from the session
    pub async fn apply(&self, file_id: &Id, intents: &[Intent]) -> PenpotResult<ApplyOutcome> {
        if intents.is_empty() {
            return Err(PenpotError::validation("intents", "nothing to apply"));
        }
        precheck(intents)?;

        let mut session = UpdateSession::new(self.platform).with_cache(self.cache);
        session.begin(file_id).await?;

        let (changes, created_ids) = {
            let snapshot = session
                .snapshot()
                .ok_or(PenpotError::SessionState {
                    actual: "idle",
                    expected: "open",
                })?;
            let mut builder = ChangeListBuilder::with_snapshot(snapshot);
            let changes = intents
                .iter()
                .map(|intent| builder.build(intent))
                .collect::<PenpotResult<Vec<Change>>>()?;
            let created: Vec<Id> = builder.created_ids().cloned().collect();
            (changes, created)
        };
        debug!(file_id = %file_id, changes = changes.len(), "Built change list");

        let changes_applied = changes.len();
        let revision = session.submit(changes).await?;
        Ok(ApplyOutcome {
            revision,
            changes_applied,
            created_ids,
            warning: StaleReadWarning {
                file_id: file_id.to_string(),
                revision,
            },
        })
    }
}

/// Validates everything that can be validated without the file.
fn precheck(intents: &[Intent]) -> PenpotResult<()> {
    let mut scratch = ChangeListBuilder::new();
    for intent in intents {
        match intent {
            Intent::Add {
                page_id,
                parent_id,
                payload,
            } => {
                scratch.build_add(payload, page_id, parent_id.as_ref())?;
            }
            Intent::Modify { attributes, .. } => {
                if parse_attributes(attributes)?.is_empty() {
                    return Err(PenpotError::validation("attributes", "no attributes to change"));
                }
            }
            Intent::Restyle { attributes, .. } if attributes.is_empty() => {
                return Err(PenpotError::validation("attributes", "no attributes to change"));
            }
            Intent::Restyle { .. } | Intent::Delete { .. } | Intent::Raw(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penpot::memory::InMemoryPlatform;
    use serde_json::json;

    fn add(page_id: &Id, payload: serde_json::Value) -> Intent {
        Intent::Add {
            page_id: page_id.clone(),
            parent_id: None,
            payload: payload.as_object().cloned().unwrap(),
        }
    }

    #[tokio::test]
    async fn validation_fails_before_any_call() {
        let platform = InMemoryPlatform::new();
        let (file_id, page_id) = platform.create_file("F").await;
        let editor = Editor::new(&platform);
        let err = editor
            .apply(&file_id, &[add(&page_id, json!({"kind": "rect", "x": 0, "y": 0, "height": 4}))])
            .await
            .unwrap_err();
        assert!(matches!(err, PenpotError::Validation { ref field, .. } if field == "width"));
        assert_eq!(platform.update_calls(), 0);
    }

    #[tokio::test]
    async fn add_reports_created_ids_and_warning() {
        let platform = InMemoryPlatform::new();
        let (file_id, page_id) = platform.create_file("F").await;
        let editor = Editor::new(&platform);
        let outcome = editor
            .apply(
                &file_id,
                &[add(&page_id, json!({"kind": "circle", "cx": 5, "cy": 5, "radius": 5}))],
            )
            .await
            .unwrap();
        assert_eq!(outcome.revision, 1);
        assert_eq!(outcome.changes_applied, 1);
        assert_eq!(outcome.created_ids.len(), 1);
        assert_eq!(outcome.warning.revision, 1);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let platform = InMemoryPlatform::new();
        let editor = Editor::new(&platform);
        let err = editor.apply(&Id::from("f"), &[]).await.unwrap_err();
        assert!(matches!(err, PenpotError::Validation { .. }));
    }
}
