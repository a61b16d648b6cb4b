//! Optimistic-concurrency update session.
//!
//! ```text
//! Idle --begin--> Open --submit ok--> Idle
//!                  |
//!                  +--revision conflict--> Conflict --begin--> Open
//! ```
//!
//! `begin` reads the file and remembers its revision; `submit` sends the
//! changes tagged with exactly that revision. A conflict is never retried
//! here: the caller re-reads and rebuilds its changes.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::penpot::cache::FileCache;
use crate::penpot::codec;
use crate::penpot::error::{PenpotError, PenpotResult};
use crate::penpot::model::{Change, File, Id, UpdateRequest};
use crate::penpot::platform::Platform;

/// State of an open session.
#[derive(Debug, Clone)]
pub struct OpenSession {
    /// File being edited.
    pub file_id: Id,
    /// Fresh token identifying this editing session to the platform.
    pub token: Id,
    /// Revision observed at `begin`.
    pub revision: u64,
    /// Opaque version value observed at `begin`, passed through on submit.
    pub version: Option<Value>,
    /// Decoded file as of `begin`.
    pub snapshot: File,
}

/// Session state.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    /// No session in progress.
    #[default]
    Idle,
    /// `begin` succeeded; changes may be submitted.
    Open(Box<OpenSession>),
    /// The last submit lost a revision race.
    Conflict {
        /// File of the failed submit.
        file_id: Id,
        /// Revision the failed submit carried.
        revision: u64,
    },
}

impl SessionState {
    /// Short name used in errors and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Open(_) => "open",
            Self::Conflict { .. } => "conflict",
        }
    }
}

/// One optimistic update round trip against a [`Platform`].
pub struct UpdateSession<'p> {
    platform: &'p dyn Platform,
    cache: Option<&'p FileCache>,
    state: SessionState,
}

impl<'p> UpdateSession<'p> {
    /// Creates an idle session.
    #[must_use]
    pub fn new(platform: &'p dyn Platform) -> Self {
        Self {
            platform,
            cache: None,
            state: SessionState::Idle,
        }
    }

    /// Attaches a file cache: `begin` refreshes it, successful submits invalidate it.
    #[must_use]
    pub fn with_cache(mut self, cache: Option<&'p FileCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Snapshot taken at `begin`, while the session is open.
    #[must_use]
    pub fn snapshot(&self) -> Option<&File> {
        match &self.state {
            SessionState::Open(open) => Some(&open.snapshot),
            _ => None,
        }
    }

    /// Starts (or restarts) a session: reads the file and mints a new token.
    ///
    /// Allowed from any state. Always reads from the platform, never from the
    /// cache, so the revision is current. Returns the observed revision.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the read, or a format error when the
    /// file cannot be decoded. The state is left unchanged on error.
    pub async fn begin(&mut self, file_id: &Id) -> PenpotResult<u64> {
        let raw = self.platform.fetch_file(file_id).await?;
        let snapshot = codec::decode_file(&raw)?;
        if let Some(cache) = self.cache {
            cache.insert(file_id, raw);
        }

        let open = OpenSession {
            file_id: file_id.clone(),
            token: Id::generate(),
            revision: snapshot.revision,
            version: snapshot.version.clone(),
            snapshot,
        };
        debug!(
            file_id = %file_id,
            revision = open.revision,
            session = %open.token,
            "Update session opened"
        );
        let revision = open.revision;
        self.state = SessionState::Open(Box::new(open));
        Ok(revision)
    }

    /// Sends `changes` tagged with the revision observed at `begin`.
    ///
    /// On success the session returns to idle and the new revision is
    /// returned. A revision conflict moves it to [`SessionState::Conflict`];
    /// other failures leave it open.
    ///
    /// # Errors
    ///
    /// - [`PenpotError::SessionState`] when no session is open
    /// - [`PenpotError::RevisionConflict`] when the file moved since `begin`
    /// - [`PenpotError::Format`] for an unrecognised response
    /// - transport errors from the platform
    pub async fn submit(&mut self, changes: Vec<Change>) -> PenpotResult<u64> {
        let SessionState::Open(open) = &self.state else {
            return Err(PenpotError::SessionState {
                actual: self.state.name(),
                expected: "open",
            });
        };

        let file_id = open.file_id.clone();
        let revision = open.revision;
        let count = changes.len();
        let request = UpdateRequest {
            file_id: file_id.clone(),
            session_id: open.token.clone(),
            revision,
            version: open.version.clone(),
            changes,
        };
        debug!(file_id = %file_id, revision, changes = count, "Submitting update");

        let response = match self.platform.update_file(codec::encode_update(&request)).await {
            Ok(response) => response,
            Err(e @ PenpotError::RevisionConflict { .. }) => {
                warn!(file_id = %file_id, revision, "Revision conflict; session must begin again");
                self.state = SessionState::Conflict { file_id, revision };
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let new_revision = codec::decode_update_response(&response, revision)?;
        if let Some(cache) = self.cache {
            cache.invalidate(&file_id);
        }
        info!(
            file_id = %file_id,
            from = revision,
            to = new_revision,
            changes = count,
            "Update accepted"
        );
        self.state = SessionState::Idle;
        Ok(new_revision)
    }
}

impl std::fmt::Debug for UpdateSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSession")
            .field("state", &self.state.name())
            .finish_non_exhaustive()
    }
}
