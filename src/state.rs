use std::sync::Arc;

use tokio::sync::watch;

use crate::session::Session;
use crate::types::InstallId;

/// What the rest of the application sees: signed out, or signed in as someone.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    NoSession,
    Active(ActiveSession),
}

impl SessionState {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Active(active) => Some(active.session()),
            Self::NoSession => None,
        }
    }

    #[must_use]
    pub fn install_id(&self) -> Option<InstallId> {
        match self {
            Self::Active(active) => Some(active.install_id()),
            Self::NoSession => None,
        }
    }
}

/// An installed session together with the identity of that installation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    install_id: InstallId,
    session: Arc<Session>,
}

impl ActiveSession {
    #[must_use]
    pub fn install_id(&self) -> InstallId {
        self.install_id
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// Single source of truth for the current session.
///
/// Readers call [`current`](Self::current) or [`subscribe`](Self::subscribe).
/// Mutation is crate-private: only the lifecycle controller installs or
/// clears.
#[derive(Debug)]
pub struct SessionContainer {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContainer {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::NoSession);
        Self { tx }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every install and clear.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Whether `install_id` is still the installed session.
    #[must_use]
    pub fn is_current(&self, install_id: InstallId) -> bool {
        self.tx.borrow().install_id() == Some(install_id)
    }

    /// Install `session`, replacing whatever was there.
    ///
    /// Always a fresh transition with a new [`InstallId`], even if `session`
    /// equals the one already installed.
    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) fn install(&self, session: Session) -> ActiveSession {
        let active = ActiveSession {
            install_id: InstallId::generate(),
            session: Arc::new(session),
        };
        self.tx.send_replace(SessionState::Active(active.clone()));
        active
    }

    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) fn clear(&self) {
        self.tx.send_replace(SessionState::NoSession);
    }
}
