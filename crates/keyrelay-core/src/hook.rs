//! Hook callback logic, independent of how the hook is installed.
//!
//! A [`HookBackend`] installs the platform hook and routes every notification
//! into a shared [`Dispatcher`]. The dispatcher turns the notification into a
//! [`KeyEvent`], runs the subscribers, and either swallows the key or passes it
//! down the hook chain.

use crate::error::Result;
use crate::probe::{self, KeyStateProbe};
use crate::types::{HookHandle, HookNotification, KeyEdge, KeyEvent, ObservedKey};
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{trace, warn};

/// Value returned to the OS to stop a key from reaching anyone else.
pub const SWALLOW: isize = 1;

pub type Subscriber = Box<dyn FnMut(&mut KeyEvent) + Send>;

pub type SharedDispatcher = Arc<Mutex<Dispatcher>>;

/// Next hook in the system chain.
///
/// Unhandled notifications must always be passed on, otherwise other
/// processes' hooks stop seeing keys.
pub trait HookChain {
    fn call_next(&mut self, notification: &HookNotification) -> isize;
}

/// Installs and removes the platform keyboard hook.
pub trait HookBackend {
    /// Installs a hook whose callback feeds `dispatcher`.
    fn install(&mut self, dispatcher: SharedDispatcher) -> Result<HookHandle>;

    fn uninstall(&mut self, handle: HookHandle) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    edge: KeyEdge,
    callback: Subscriber,
}

pub struct Dispatcher {
    probe: Box<dyn KeyStateProbe>,
    subscriptions: Vec<Subscription>,
    observers: Vec<Sender<ObservedKey>>,
    ignored_marker: Option<usize>,
    next_id: u64,
}

impl Dispatcher {
    pub fn new(probe: impl KeyStateProbe + 'static, ignored_marker: Option<usize>) -> Self {
        Self {
            probe: Box::new(probe),
            subscriptions: Vec::new(),
            observers: Vec::new(),
            ignored_marker,
            next_id: 0,
        }
    }

    pub fn into_shared(self) -> SharedDispatcher {
        Arc::new(Mutex::new(self))
    }

    pub fn subscribe(&mut self, edge: KeyEdge, callback: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, edge, callback });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn add_observer(&mut self, sender: Sender<ObservedKey>) {
        self.observers.push(sender);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Handles one hook notification and returns the value for the OS.
    pub fn hook_proc(&mut self, notification: &HookNotification, chain: &mut dyn HookChain) -> isize {
        if notification.code < 0 {
            return chain.call_next(notification);
        }
        if self
            .ignored_marker
            .is_some_and(|marker| notification.raw.extra_info == marker)
        {
            return chain.call_next(notification);
        }

        let modifiers = probe::modifiers(self.probe.as_ref());
        let mut event = KeyEvent::new(notification.raw.vk_code, modifiers);

        if let Some(edge) = KeyEdge::from_message(notification.message) {
            trace!(
                "Hook {:?} vk={:02X} extended={} injected={}",
                edge,
                event.virtual_key(),
                notification.raw.is_extended(),
                notification.raw.is_injected()
            );
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(edge, &mut event)));
            if outcome.is_err() {
                warn!(
                    "Key subscriber panicked on vk={:02X}; forwarding key",
                    event.virtual_key()
                );
                return chain.call_next(notification);
            }
            self.notify_observers(edge, &event);
        }

        if event.handled {
            SWALLOW
        } else {
            chain.call_next(notification)
        }
    }

    fn dispatch(&mut self, edge: KeyEdge, event: &mut KeyEvent) {
        for subscription in self.subscriptions.iter_mut().filter(|s| s.edge == edge) {
            (subscription.callback)(event);
        }
    }

    fn notify_observers(&mut self, edge: KeyEdge, event: &KeyEvent) {
        if self.observers.is_empty() {
            return;
        }
        let observed = ObservedKey {
            edge,
            event: event.clone(),
        };
        // Never block the hook thread: full channels drop the event,
        // disconnected ones are forgotten.
        self.observers
            .retain(|sender| match sender.try_send(observed.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
    }
}
