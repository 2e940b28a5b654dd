//! Disposal handle for push-based notifications
//!
//! Both external collaborators push values to their subscribers: the
//! identity provider pushes auth-state changes, the realtime store pushes
//! full snapshots. Registration returns a [`Subscription`], and the
//! listener stays registered exactly as long as the handle lives.

use tokio::sync::mpsc;

type Release = Box<dyn FnOnce() + Send>;

/// A registered listener on a push source.
///
/// Values arrive in the order the source sent them. The listener is
/// unregistered by [`Subscription::unsubscribe`] or when the handle is
/// dropped, whichever comes first.
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    release: Option<Release>,
}

impl<T> Subscription<T> {
    /// Wrap a receiver together with the action that unregisters it at the
    /// source.
    pub fn new(receiver: mpsc::UnboundedReceiver<T>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    /// Create a connected sender/subscription pair.
    pub fn channel(release: impl FnOnce() + Send + 'static) -> (mpsc::UnboundedSender<T>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, release))
    }

    /// Wait for the next pushed value.
    ///
    /// Returns None once the source has gone away.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Take the next value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Unregister from the source now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            self.receiver.close();
            release();
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("registered", &self.release.is_some())
            .finish()
    }
}
