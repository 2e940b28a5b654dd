//! Authenticated identity for the lifetime of a session
//!
//! ## Overview
//!
//! [`AuthSession`] owns the one current-identity slot of the process. It
//! keeps a persistent subscription on an [`IdentityProvider`] so a
//! previously authenticated account is picked up on start, and offers an
//! interactive Google sign-in. Everything else reads the slot through an
//! [`IdentityReader`], which cannot write to it.
//!
//! Provider accounts are validated before they reach the slot: an account
//! without a display name or photo URL is rejected with
//! `LetmeaskError::MissingProfileData` and the slot keeps its value.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::LetmeaskResult;
use crate::sync::Subscription;
use crate::types::{Account, Identity};

pub mod local;
pub mod session;

pub use local::{Consent, LocalIdentityProvider};
pub use session::AuthSession;

/// Interactive sign-in flows a provider may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Google => write!(f, "google"),
        }
    }
}

/// External service that authenticates users and reports their accounts.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a persistent auth-state listener.
    ///
    /// The current state is delivered first, then one value per change.
    /// `None` means no account is signed in.
    fn subscribe_auth_state(&self) -> Subscription<Option<Account>>;

    /// Run an interactive consent flow.
    ///
    /// Resolves with the signed-in account, or `None` if the flow completed
    /// without producing one.
    ///
    /// # Errors
    ///
    /// Returns `LetmeaskError::ProviderAuth` if the flow fails or is dismissed.
    async fn sign_in_interactive(&self, kind: ProviderKind) -> LetmeaskResult<Option<Account>>;
}

/// Notifications about the identity slot
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// The slot now holds this identity
    SignedIn(Identity),
    /// An account reported by the provider lacked profile data and was not
    /// accepted
    ProfileRejected {
        /// Provider uid of the rejected account
        uid: String,
    },
    /// An interactive sign-in failed
    SignInFailed {
        /// Error message
        message: String,
    },
}

/// Read-only handle on the current-identity slot.
///
/// Cheap to clone. A read during re-authentication sees either the old or
/// the new identity, never a mix of both.
#[derive(Debug, Clone)]
pub struct IdentityReader {
    rx: watch::Receiver<Option<Identity>>,
}

impl IdentityReader {
    pub(crate) fn new(rx: watch::Receiver<Option<Identity>>) -> Self {
        Self { rx }
    }

    /// Snapshot of the current identity
    pub fn current(&self) -> Option<Identity> {
        self.rx.borrow().clone()
    }

    /// Wait until the slot is written again.
    ///
    /// Returns false once the owning [`AuthSession`] is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
