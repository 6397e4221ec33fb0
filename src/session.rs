//! Session lifecycle: attach to an existing gym session or create one
//!
//! Switching sessions goes through `SessionStore::reset_for`, which bumps
//! the store epoch so any loop still driving the previous session stops.

use std::sync::Arc;

use tracing::info;

use crate::client::{ClientError, SessionService};
use crate::config::SessionSpec;
use crate::store::SessionStore;
use crate::types::{LogLine, Session};

pub struct SessionManager<S: SessionService> {
    client: Arc<S>,
    store: Arc<SessionStore>,
    retention: usize,
}

impl<S: SessionService> SessionManager<S> {
    pub fn new(client: Arc<S>, store: Arc<SessionStore>, retention: usize) -> Self {
        Self {
            client,
            store,
            retention,
        }
    }

    /// Attach to an existing session after validating it with a
    /// non-advancing state fetch. Re-attaching the current session is a
    /// no-op so an accidental double attach does not wipe state.
    pub async fn attach(&self, id: &str, mode: crate::types::Mode) -> Result<Session, ClientError> {
        if let Some(current) = self.store.session() {
            if current.id == id {
                return Ok(current);
            }
        }

        self.client.fetch_state(id, 0).await?;

        let session = Session {
            id: id.to_string(),
            mode,
        };
        self.store.reset_for(session.clone(), self.retention);
        self.store
            .append_log(LogLine::info(format!("attached to session {id} ({mode})")));
        info!(session_id = %id, %mode, "session attached");
        Ok(session)
    }

    pub async fn create(&self, spec: &SessionSpec) -> Result<Session, ClientError> {
        let id = self.client.create_session(&spec.to_request()).await?;

        let session = Session {
            id: id.clone(),
            mode: spec.mode,
        };
        self.store.reset_for(session.clone(), self.retention);
        self.store.append_log(LogLine::info(format!(
            "created {} session {id} for {}",
            spec.mode, spec.symbol
        )));
        info!(session_id = %id, mode = %spec.mode, symbol = %spec.symbol, "session created");
        Ok(session)
    }

    /// Attach when an id is on hand, otherwise create. Falls back to
    /// create only when the id is gone; transport errors propagate so a
    /// flaky network does not silently fork a fresh session.
    pub async fn attach_or_create(
        &self,
        existing: Option<&str>,
        spec: &SessionSpec,
    ) -> Result<Session, ClientError> {
        if let Some(id) = existing {
            match self.attach(id, spec.mode).await {
                Ok(session) => return Ok(session),
                Err(ClientError::SessionNotFound) => {
                    info!(session_id = %id, "stale session id, creating a new session");
                }
                Err(e) => return Err(e),
            }
        }
        self.create(spec).await
    }
}
