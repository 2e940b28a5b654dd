//! Identity provider that runs on this machine
//!
//! Stands in for a hosted provider. The "interactive" flow answers with a
//! configured [`Consent`] instead of a popup, and the signed-in account is
//! remembered in [`Storage`] so that the next process start reports it as
//! an already authenticated session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};
use ulid::Ulid;

use super::{IdentityProvider, ProviderKind};
use crate::error::{LetmeaskError, LetmeaskResult};
use crate::storage::Storage;
use crate::sync::Subscription;
use crate::types::Account;

/// How the next interactive sign-in resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consent {
    /// The user agrees and shares these profile fields
    Grant {
        display_name: Option<String>,
        photo_url: Option<String>,
    },
    /// The user closes the consent prompt
    Dismiss,
}

impl Consent {
    /// Consent that shares a complete profile
    pub fn grant(display_name: impl Into<String>, photo_url: impl Into<String>) -> Self {
        Consent::Grant {
            display_name: Some(display_name.into()),
            photo_url: Some(photo_url.into()),
        }
    }
}

struct ProviderState {
    account: Mutex<Option<Account>>,
    consent: Mutex<Consent>,
    listeners: Mutex<Vec<(u64, mpsc::UnboundedSender<Option<Account>>)>>,
    next_listener_id: AtomicU64,
    storage: Option<Storage>,
}

/// Local [`IdentityProvider`].
///
/// Cloning is cheap and every clone shares the same signed-in account.
#[derive(Clone)]
pub struct LocalIdentityProvider {
    state: Arc<ProviderState>,
}

impl LocalIdentityProvider {
    /// Provider with nobody signed in and nothing persisted
    pub fn new(consent: Consent) -> Self {
        Self::with_account(None, consent, None)
    }

    /// Provider that restores the account remembered in `storage` and
    /// remembers future sign-ins there.
    pub fn open(storage: Storage, consent: Consent) -> LetmeaskResult<Self> {
        let account = storage.load_account()?;
        if let Some(account) = &account {
            debug!(uid = %account.uid, "Restored signed-in account");
        }
        Ok(Self::with_account(account, consent, Some(storage)))
    }

    fn with_account(account: Option<Account>, consent: Consent, storage: Option<Storage>) -> Self {
        Self {
            state: Arc::new(ProviderState {
                account: Mutex::new(account),
                consent: Mutex::new(consent),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                storage,
            }),
        }
    }

    /// Change how the next interactive sign-in resolves
    pub fn set_consent(&self, consent: Consent) {
        *self.state.consent.lock() = consent;
    }

    /// Signed-in account as the provider sees it
    pub fn account(&self) -> Option<Account> {
        self.state.account.lock().clone()
    }

    /// Forget the signed-in account and tell every listener.
    pub fn sign_out(&self) -> LetmeaskResult<()> {
        if let Some(storage) = &self.state.storage {
            storage.clear_account()?;
        }
        self.publish(None);
        info!("Signed out");
        Ok(())
    }

    /// Number of live auth-state listeners
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.state.listeners.lock();
        listeners.retain(|(_, tx)| !tx.is_closed());
        listeners.len()
    }

    fn publish(&self, account: Option<Account>) {
        let mut current = self.state.account.lock();
        *current = account;
        self.state
            .listeners
            .lock()
            .retain(|(_, tx)| tx.send(current.clone()).is_ok());
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn subscribe_auth_state(&self) -> Subscription<Option<Account>> {
        let id = self.state.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<ProviderState> = Arc::downgrade(&self.state);
        let (tx, subscription) = Subscription::channel(move || {
            if let Some(state) = weak.upgrade() {
                state.listeners.lock().retain(|(listener, _)| *listener != id);
                debug!(id, "Auth state listener released");
            }
        });

        let current = self.state.account.lock();
        let _ = tx.send(current.clone());
        self.state.listeners.lock().push((id, tx));

        subscription
    }

    async fn sign_in_interactive(&self, kind: ProviderKind) -> LetmeaskResult<Option<Account>> {
        let consent = self.state.consent.lock().clone();

        let (display_name, photo_url) = match consent {
            Consent::Grant {
                display_name,
                photo_url,
            } => (display_name, photo_url),
            Consent::Dismiss => {
                return Err(LetmeaskError::ProviderAuth(format!(
                    "{} consent prompt was closed by the user",
                    kind
                )))
            }
        };

        let uid = self
            .account()
            .map(|account| account.uid)
            .unwrap_or_else(|| Ulid::new().to_string());
        let account = Account {
            uid,
            display_name,
            photo_url,
        };

        if let Some(storage) = &self.state.storage {
            storage
                .save_account(&account)
                .map_err(|e| LetmeaskError::ProviderAuth(e.to_string()))?;
        }
        self.publish(Some(account.clone()));
        debug!(uid = %account.uid, %kind, "Interactive sign-in granted");

        Ok(Some(account))
    }
}
