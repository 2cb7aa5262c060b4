//! Session identity tracking.

use crate::error::{ViewError, ViewResult};
use crate::transport::{AuthListener, AuthProvider};
use marks_protocol::{AuthChange, Identity, UserId};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

/// The session as seen by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The persisted session has not been restored yet.
    Loading,
    /// No identity is present.
    SignedOut,
    /// A user is signed in.
    SignedIn(Identity),
}

impl SessionState {
    /// Returns the signed-in identity.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }

    /// Returns the signed-in user id.
    pub fn user_id(&self) -> Option<UserId> {
        self.identity().map(|i| i.user_id)
    }

    /// Returns true until the session has been restored.
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

/// How an identity notification changed the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityTransition {
    /// Same user as before (or still nobody).
    Unchanged,
    /// A user appeared where there was none.
    SignedIn(Identity),
    /// The user went away.
    SignedOut,
    /// One user was replaced by another.
    Switched {
        /// Previous identity.
        from: Identity,
        /// New identity.
        to: Identity,
    },
}

impl IdentityTransition {
    /// Returns the identity whose data must now be loaded.
    pub fn incoming(&self) -> Option<&Identity> {
        match self {
            IdentityTransition::SignedIn(to) | IdentityTransition::Switched { to, .. } => Some(to),
            _ => None,
        }
    }

    /// Returns true if previously loaded data must be discarded.
    pub fn clears_view(&self) -> bool {
        !matches!(self, IdentityTransition::Unchanged)
    }
}

/// Tracks the single authenticated identity of the view.
pub struct SessionManager<A: AuthProvider> {
    auth: Arc<A>,
    state: SessionState,
    listener: Option<AuthListener>,
}

impl<A: AuthProvider> SessionManager<A> {
    /// Creates a manager in the loading state.
    pub fn new(auth: Arc<A>) -> Self {
        Self {
            auth,
            state: SessionState::Loading,
            listener: None,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns the signed-in identity.
    pub fn identity(&self) -> Option<&Identity> {
        self.state.identity()
    }

    /// Forgets the current identity and returns to the loading state.
    ///
    /// The next restore is then a real sign-in transition.
    pub fn reset(&mut self) {
        self.state = SessionState::Loading;
    }

    /// Returns the signed-in user, or the error a data operation should fail with.
    pub fn require_user(&self) -> ViewResult<UserId> {
        match &self.state {
            SessionState::Loading => Err(ViewError::Loading),
            SessionState::SignedOut => Err(ViewError::NotAuthenticated),
            SessionState::SignedIn(identity) => Ok(identity.user_id),
        }
    }

    /// Asks the provider for a persisted session.
    ///
    /// A failed lookup counts as no session: the manager leaves the loading
    /// state and the error is returned for the caller to record.
    pub async fn restore_session(&mut self) -> ViewResult<Option<Identity>> {
        match self.auth.current_identity().await {
            Ok(identity) => {
                debug!(restored = identity.is_some(), "session restored");
                Ok(identity)
            }
            Err(e) => {
                if self.state.is_loading() {
                    self.state = SessionState::SignedOut;
                }
                Err(e)
            }
        }
    }

    /// Registers the auth listener. Does nothing if one is registered.
    pub fn observe_auth_changes(&mut self) {
        if self.listener.is_none() {
            let listener = self.auth.on_identity_change();
            debug!(listener = listener.id.0, "auth listener registered");
            self.listener = Some(listener);
        }
    }

    /// Unregisters the auth listener and drops its channel.
    pub fn stop_observing(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.auth.remove_listener(listener.id);
            debug!(listener = listener.id.0, "auth listener removed");
        }
    }

    /// Returns true while a listener is registered.
    pub fn is_observing(&self) -> bool {
        self.listener.is_some()
    }

    /// Waits for the next auth change.
    ///
    /// Returns `None` if no listener is registered or the provider closed
    /// the channel; in the latter case the listener is released.
    pub async fn next_change(&mut self) -> Option<AuthChange> {
        let listener = self.listener.as_mut()?;
        let change = listener.receiver.recv().await;
        if change.is_none() {
            self.stop_observing();
        }
        change
    }

    /// Returns an already queued auth change, if any.
    pub fn try_next_change(&mut self) -> Option<AuthChange> {
        let listener = self.listener.as_mut()?;
        match listener.receiver.try_recv() {
            Ok(change) => Some(change),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.stop_observing();
                None
            }
        }
    }

    /// Moves to the session described by `identity`.
    pub fn transition(&mut self, identity: Option<Identity>) -> IdentityTransition {
        let previous = std::mem::replace(&mut self.state, SessionState::SignedOut);
        let transition = match (previous, identity) {
            (SessionState::SignedIn(current), Some(next)) if current.same_user(&next) => {
                self.state = SessionState::SignedIn(next);
                IdentityTransition::Unchanged
            }
            (SessionState::SignedIn(current), Some(next)) => {
                self.state = SessionState::SignedIn(next.clone());
                IdentityTransition::Switched {
                    from: current,
                    to: next,
                }
            }
            (_, Some(next)) => {
                self.state = SessionState::SignedIn(next.clone());
                IdentityTransition::SignedIn(next)
            }
            (SessionState::SignedOut, None) => IdentityTransition::Unchanged,
            (_, None) => IdentityTransition::SignedOut,
        };

        if transition != IdentityTransition::Unchanged {
            info!(user = ?self.state.user_id(), "identity transition: {}", transition_name(&transition));
        }
        transition
    }
}

fn transition_name(transition: &IdentityTransition) -> &'static str {
    match transition {
        IdentityTransition::Unchanged => "unchanged",
        IdentityTransition::SignedIn(_) => "signed_in",
        IdentityTransition::SignedOut => "signed_out",
        IdentityTransition::Switched { .. } => "switched",
    }
}
