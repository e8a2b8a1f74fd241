use crate::fetch::{FetchResult, FetchSession, Fetcher};
use std::sync::Arc;

/// Lazily opened session owned by exactly one worker
///
/// The session is opened on first use. [`SessionSlot::release`] closes it and
/// must be awaited on every exit path of the owner; dropping a slot without
/// releasing it logs a warning.
pub struct SessionSlot {
    fetcher: Arc<dyn Fetcher>,
    session: Option<Box<dyn FetchSession>>,
    released: bool,
}

impl SessionSlot {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            session: None,
            released: false,
        }
    }

    /// Returns the live session, opening one if needed
    pub async fn get(&mut self) -> FetchResult<&mut Box<dyn FetchSession>> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.fetcher.open_session().await?,
        };
        Ok(self.session.insert(session))
    }

    /// Whether a session is currently open
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Closes the session, if one was opened
    pub async fn release(mut self) {
        self.released = true;
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        if !self.released && self.session.is_some() {
            tracing::warn!("Fetch session dropped without being released");
        }
    }
}
