//! The process-wide authentication session

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{AuthEvent, IdentityProvider, IdentityReader, ProviderKind};
use crate::error::LetmeaskResult;
use crate::types::{Account, Identity};

/// Default capacity for the auth event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Most sign-in results remembered while waiting for the provider's report
const MAX_PENDING_ECHOES: usize = 16;

/// Accounts applied by `sign_in_with_google` whose auth-state report from
/// the provider has not arrived yet
type Echoes = Mutex<VecDeque<Account>>;

/// Owner of the current identity.
///
/// Start one per process with [`AuthSession::start`] and keep it until
/// teardown. The provider subscription registered at start is released by
/// [`AuthSession::shutdown`] or when the session is dropped.
///
/// # Example
///
/// ```ignore
/// let auth = AuthSession::start(provider);
///
/// if auth.current_identity().is_none() {
///     auth.sign_in_with_google().await?;
/// }
///
/// let reader = auth.identity_reader();
/// room.submit_question("What is X?", reader.current().as_ref()).await?;
/// ```
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    /// The single identity slot. Only this type writes to it.
    slot: Arc<watch::Sender<Option<Identity>>>,
    event_tx: broadcast::Sender<AuthEvent>,
    echoes: Arc<Echoes>,
    /// Overlapping interactive sign-ins run one after the other
    sign_in_lock: tokio::sync::Mutex<()>,
    listener: Option<JoinHandle<()>>,
}

impl AuthSession {
    /// Create the session and start observing the provider's auth state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(provider: Arc<dyn IdentityProvider>) -> Self {
        let (slot, _) = watch::channel(None);
        let slot = Arc::new(slot);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let echoes = Arc::new(Echoes::default());

        let mut subscription = provider.subscribe_auth_state();
        let listener = {
            let slot = slot.clone();
            let event_tx = event_tx.clone();
            let echoes = echoes.clone();
            tokio::spawn(async move {
                while let Some(account) = subscription.recv().await {
                    if account.as_ref().is_some_and(|account| take_echo(&echoes, account)) {
                        debug!("Auth state report already applied by sign-in");
                        continue;
                    }
                    // Failures are already logged and broadcast by observe_auth_state
                    let _ = observe_auth_state(&slot, &event_tx, account);
                }
                debug!("Auth state subscription closed by provider");
            })
        };

        info!("Auth session started");

        Self {
            provider,
            slot,
            event_tx,
            echoes,
            sign_in_lock: tokio::sync::Mutex::new(()),
            listener: Some(listener),
        }
    }

    /// The signed-in identity, if any
    pub fn current_identity(&self) -> Option<Identity> {
        self.slot.borrow().clone()
    }

    /// Read-only handle on the identity slot for other components
    pub fn identity_reader(&self) -> IdentityReader {
        IdentityReader::new(self.slot.subscribe())
    }

    /// Subscribe to sign-in and rejection notifications
    pub fn subscribe_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.event_tx.subscribe()
    }

    /// Whether the provider subscription is still registered
    pub fn is_observing(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    /// Sign in through the provider's interactive Google flow.
    ///
    /// Suspends until the flow resolves. Each call opens a new flow; calls
    /// that overlap wait for the earlier one to finish first.
    ///
    /// # Errors
    ///
    /// - `LetmeaskError::ProviderAuth` if the flow fails or is dismissed
    /// - `LetmeaskError::MissingProfileData` if the account lacks a display
    ///   name or photo URL
    ///
    /// On error the current identity is left unchanged.
    pub async fn sign_in_with_google(&self) -> LetmeaskResult<()> {
        let _guard = self.sign_in_lock.lock().await;

        let account = match self.provider.sign_in_interactive(ProviderKind::Google).await {
            Ok(account) => account,
            Err(e) => {
                warn!(error = %e, "Interactive sign-in failed");
                let _ = self.event_tx.send(AuthEvent::SignInFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        match account {
            Some(account) => {
                let result = accept(&self.slot, &self.event_tx, &account).map(|_| ());
                push_echo(&self.echoes, account);
                result
            }
            None => {
                debug!("Sign-in flow resolved without an account");
                Ok(())
            }
        }
    }

    /// Release the provider subscription.
    ///
    /// The subscription is unregistered by the time this returns.
    pub async fn shutdown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
        }
        info!("Auth session shut down");
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Apply one auth-state report from the provider.
///
/// An absent account leaves the slot as it is.
fn observe_auth_state(
    slot: &watch::Sender<Option<Identity>>,
    events: &broadcast::Sender<AuthEvent>,
    account: Option<Account>,
) -> LetmeaskResult<()> {
    match account {
        Some(account) => accept(slot, events, &account).map(|_| ()),
        None => {
            debug!("Provider reports no signed-in account");
            Ok(())
        }
    }
}

/// Validate `account` and, if it is complete, make it the current identity.
///
/// Readers and event subscribers are only notified when the identity
/// actually changes.
fn accept(
    slot: &watch::Sender<Option<Identity>>,
    events: &broadcast::Sender<AuthEvent>,
    account: &Account,
) -> LetmeaskResult<Identity> {
    match Identity::from_account(account) {
        Ok(identity) => {
            let changed = slot.send_if_modified(|current| {
                if current.as_ref() == Some(&identity) {
                    return false;
                }
                *current = Some(identity.clone());
                true
            });
            if changed {
                info!(uid = %identity.id(), name = %identity.display_name(), "Signed in");
                let _ = events.send(AuthEvent::SignedIn(identity.clone()));
            } else {
                debug!(uid = %identity.id(), "Identity unchanged");
            }
            Ok(identity)
        }
        Err(e) => {
            error!(uid = %account.uid, error = %e, "Rejected account without profile data");
            let _ = events.send(AuthEvent::ProfileRejected {
                uid: account.uid.clone(),
            });
            Err(e)
        }
    }
}

/// Remember an account applied by a sign-in so that the provider's report
/// of the same account is not applied again.
fn push_echo(echoes: &Echoes, account: Account) {
    let mut echoes = echoes.lock();
    if echoes.len() == MAX_PENDING_ECHOES {
        echoes.pop_front();
    }
    echoes.push_back(account);
}

/// Consume the pending echo matching `account`, along with any older ones.
///
/// Returns false if `account` was not applied by a sign-in.
fn take_echo(echoes: &Echoes, account: &Account) -> bool {
    let mut echoes = echoes.lock();
    match echoes.iter().position(|pending| pending == account) {
        Some(index) => {
            echoes.drain(..=index);
            true
        }
        None => false,
    }
}
