use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::reason::AbortReason;

type Listener = Box<dyn FnOnce(&AbortReason) + Send>;

struct State {
    reason: Option<AbortReason>,
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
    /// Observers this signal holds on the signals it was derived from.
    sources: Vec<Subscription>,
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
    /// Created by `any_signal`; only its sources can abort it.
    derived: bool,
}

impl Inner {
    fn new(reason: Option<AbortReason>, derived: bool) -> Self {
        Self {
            state: Mutex::new(State {
                reason,
                listeners: Vec::new(),
                next_id: 0,
                sources: Vec::new(),
            }),
            notify: Notify::new(),
            derived,
        }
    }

    /// Pending -> aborted. Only the first caller performs the transition.
    fn abort(&self, reason: AbortReason) -> bool {
        let (listeners, sources) = {
            let mut state = self.state.lock();
            if state.reason.is_some() {
                return false;
            }
            state.reason = Some(reason.clone());
            (
                std::mem::take(&mut state.listeners),
                std::mem::take(&mut state.sources),
            )
        };

        log::debug!(
            "signal aborted ({}), notifying {} listener(s)",
            reason,
            listeners.len()
        );

        // Lock released: listeners may abort or subscribe to other signals.
        for source in sources {
            source.remove();
        }
        for (_, listener) in listeners {
            listener(&reason);
        }
        self.notify.notify_waiters();
        true
    }
}

impl Drop for Inner {
    // Nobody can observe this signal any more.
    fn drop(&mut self) {
        for source in std::mem::take(&mut self.state.get_mut().sources) {
            source.remove();
        }
    }
}

/// Read side of a cancellation flag.
///
/// Cloning is cheap and every clone observes the same state. The transition
/// from pending to aborted happens once and never reverts.
#[derive(Clone)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

impl AbortSignal {
    fn pending() -> Self {
        Self {
            inner: Arc::new(Inner::new(None, false)),
        }
    }

    pub(crate) fn derived() -> Self {
        Self {
            inner: Arc::new(Inner::new(None, true)),
        }
    }

    /// A signal that is aborted from the start.
    pub fn already_aborted(reason: impl Into<AbortReason>) -> Self {
        Self {
            inner: Arc::new(Inner::new(Some(reason.into()), false)),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.state.lock().reason.is_some()
    }

    pub fn reason(&self) -> Option<AbortReason> {
        self.inner.state.lock().reason.clone()
    }

    pub fn throw_if_aborted(&self) -> Result<(), AbortReason> {
        match self.reason() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Whether both handles refer to the same signal.
    pub fn ptr_eq(&self, other: &AbortSignal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Runs `f` once when the signal aborts.
    ///
    /// The state check and the registration happen under the same lock, so an
    /// abort racing with this call is never missed: if the signal is already
    /// aborted, `f` runs immediately on the calling thread and `None` is
    /// returned.
    pub fn on_abort<F>(&self, f: F) -> Option<Subscription>
    where
        F: FnOnce(&AbortReason) + Send + 'static,
    {
        let reason = {
            let mut state = self.inner.state.lock();
            match &state.reason {
                Some(reason) => reason.clone(),
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.listeners.push((id, Box::new(f)));
                    return Some(Subscription {
                        signal: Arc::downgrade(&self.inner),
                        id,
                    });
                }
            }
        };
        f(&reason);
        None
    }

    /// Resolves with the abort reason once the signal aborts.
    pub async fn aborted(&self) -> AbortReason {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(reason) = self.reason() {
                return reason;
            }
            notified.await;
        }
    }

    pub(crate) fn downgrade(&self) -> WeakAbortSignal {
        WeakAbortSignal(Arc::downgrade(&self.inner))
    }

    /// The live signals a pending derived signal listens to, or `None` for a
    /// plain or already aborted signal.
    pub(crate) fn derived_sources(&self) -> Option<Vec<AbortSignal>> {
        if !self.inner.derived {
            return None;
        }
        let state = self.inner.state.lock();
        if state.reason.is_some() {
            return None;
        }
        Some(state.sources.iter().filter_map(Subscription::signal).collect())
    }

    /// Ties an observer on an input to this derived signal so it is detached
    /// once this signal aborts.
    pub(crate) fn retain_source(&self, subscription: Subscription) {
        let mut state = self.inner.state.lock();
        if state.reason.is_some() {
            drop(state);
            subscription.remove();
        } else {
            state.sources.push(subscription);
        }
    }

    pub(crate) fn abort(&self, reason: AbortReason) -> bool {
        self.inner.abort(reason)
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    #[cfg(test)]
    pub(crate) fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("reason", &self.reason())
            .finish()
    }
}

/// Handle that does not keep a signal alive.
#[derive(Clone)]
pub(crate) struct WeakAbortSignal(Weak<Inner>);

impl WeakAbortSignal {
    pub(crate) fn upgrade(&self) -> Option<AbortSignal> {
        self.0.upgrade().map(|inner| AbortSignal { inner })
    }
}

/// A pending observer registered with [`AbortSignal::on_abort`].
///
/// Dropping it leaves the observer in place; call [`Subscription::remove`] to
/// detach it.
#[derive(Debug)]
pub struct Subscription {
    signal: Weak<Inner>,
    id: u64,
}

impl Subscription {
    /// Detaches the observer. Returns false if it already ran or the signal is gone.
    pub fn remove(self) -> bool {
        let Some(inner) = self.signal.upgrade() else {
            return false;
        };
        let mut state = inner.state.lock();
        let pos = state.listeners.iter().position(|(id, _)| *id == self.id);
        let removed = pos.map(|pos| state.listeners.remove(pos));
        // The observer may own signals; drop it outside the lock.
        drop(state);
        removed.is_some()
    }

    fn signal(&self) -> Option<AbortSignal> {
        self.signal.upgrade().map(|inner| AbortSignal { inner })
    }
}

/// Write side of a signal. Whoever holds the controller decides when to abort.
#[derive(Clone)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self {
            signal: AbortSignal::pending(),
        }
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Aborts the signal. Returns true if this call performed the transition.
    pub fn abort(&self, reason: impl Into<AbortReason>) -> bool {
        self.signal.abort(reason.into())
    }

    pub fn abort_default(&self) -> bool {
        self.signal.abort(AbortReason::Aborted)
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortController")
            .field("signal", &self.signal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn starts_pending() {
        let controller = AbortController::new();
        let signal = controller.signal();
        assert!(!signal.is_aborted());
        assert_eq!(signal.reason(), None);
        assert!(signal.throw_if_aborted().is_ok());
    }

    #[test]
    fn abort_is_one_way() {
        let controller = AbortController::new();
        assert!(controller.abort("first"));
        assert!(!controller.abort("second"));
        assert!(!controller.abort_default());

        let signal = controller.signal();
        assert_eq!(signal.reason(), Some(AbortReason::Message("first".into())));
        assert_eq!(
            signal.throw_if_aborted(),
            Err(AbortReason::Message("first".into()))
        );
    }

    #[test]
    fn clones_share_state() {
        let controller = AbortController::new();
        let a = controller.signal();
        let b = a.clone();
        controller.abort_default();
        assert!(a.is_aborted());
        assert!(b.is_aborted());
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&AbortController::new().signal()));
    }

    #[test]
    fn listeners_fire_exactly_once_in_order() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = seen.clone();
            let sub = signal.on_abort(move |reason| seen.lock().push((i, reason.clone())));
            assert!(sub.is_some());
        }
        assert_eq!(signal.listener_count(), 3);

        controller.abort("stop");
        controller.abort("again");

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                (0, AbortReason::Message("stop".into())),
                (1, AbortReason::Message("stop".into())),
                (2, AbortReason::Message("stop".into())),
            ]
        );
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn subscribing_after_abort_runs_immediately() {
        let signal = AbortSignal::already_aborted(AbortReason::Interrupted);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let sub = signal.on_abort(move |reason| {
            assert_eq!(reason, &AbortReason::Interrupted);
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_subscription_never_fires() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let sub = signal
            .on_abort(move |_| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(sub.remove());
        controller.abort_default();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_subscribe_reentrantly() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let inner_hits = Arc::new(AtomicUsize::new(0));

        let signal_clone = signal.clone();
        let inner_hits_clone = inner_hits.clone();
        signal.on_abort(move |_| {
            let hits = inner_hits_clone.clone();
            signal_clone.on_abort(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        });

        controller.abort_default();
        assert_eq!(inner_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn aborted_resolves_with_reason() {
        let controller = AbortController::new();
        let signal = controller.signal();

        let waiter = tokio::spawn(async move { signal.aborted().await });
        tokio::task::yield_now().await;
        controller.abort(AbortReason::Interrupted);

        assert_eq!(waiter.await.unwrap(), AbortReason::Interrupted);
    }

    #[tokio::test]
    async fn aborted_returns_immediately_when_already_aborted() {
        let signal = AbortSignal::already_aborted("done");
        assert_eq!(signal.aborted().await, AbortReason::Message("done".into()));
    }
}
