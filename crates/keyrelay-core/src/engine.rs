use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::hook::{Dispatcher, HookBackend, SharedDispatcher, SubscriptionId};
use crate::probe::KeyStateProbe;
use crate::types::{HookHandle, KeyEdge, KeyEvent, ObservedKey};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use tracing::{info, warn};

/// Owns one keyboard hook and the subscribers it feeds.
///
/// The hook callback runs on the thread that called [`start`](Self::start),
/// and only while that thread pumps messages. Dropping an engine that was not
/// disposed removes the hook as a last resort; prefer [`dispose`](Self::dispose)
/// or [`KeyboardEngine::guard`].
pub struct KeyboardEngine<B: HookBackend> {
    backend: B,
    dispatcher: SharedDispatcher,
    handle: Option<HookHandle>,
    disposed: bool,
}

impl<B: HookBackend> KeyboardEngine<B> {
    pub fn new(backend: B, probe: impl KeyStateProbe + 'static, config: &EngineConfig) -> Self {
        Self {
            backend,
            dispatcher: Dispatcher::new(probe, config.ignored_marker()).into_shared(),
            handle: None,
            disposed: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Installs the hook. Does nothing if it is already installed.
    pub fn start(&mut self) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        if self.is_active() {
            return Ok(());
        }
        let handle = self.backend.install(Arc::clone(&self.dispatcher))?;
        info!("Keyboard hook installed. Handle: {:#x}", handle.raw());
        self.handle = Some(handle);
        Ok(())
    }

    /// Removes the hook. Does nothing if it is not installed.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        self.backend.uninstall(handle)?;
        self.handle = None;
        info!("Keyboard hook uninstalled.");
        Ok(())
    }

    /// Stops the hook for good. Repeated calls are no-ops.
    pub fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.stop()?;
        self.disposed = true;
        Ok(())
    }

    /// Starts the hook and returns a guard that stops it when dropped.
    pub fn guard(&mut self) -> Result<HookGuard<'_, B>> {
        self.start()?;
        Ok(HookGuard { engine: self })
    }

    pub fn on_key_down(&self, callback: impl FnMut(&mut KeyEvent) + Send + 'static) -> SubscriptionId {
        self.dispatcher.lock().subscribe(KeyEdge::Down, Box::new(callback))
    }

    pub fn on_key_up(&self, callback: impl FnMut(&mut KeyEvent) + Send + 'static) -> SubscriptionId {
        self.dispatcher.lock().subscribe(KeyEdge::Up, Box::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.lock().unsubscribe(id)
    }

    /// Receiver fed with a copy of every dispatched event, after subscribers
    /// ran. Events are dropped while the channel is full.
    pub fn event_channel(&self, capacity: usize) -> Receiver<ObservedKey> {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        self.dispatcher.lock().add_observer(tx);
        rx
    }
}

impl<B: HookBackend> Drop for KeyboardEngine<B> {
    fn drop(&mut self) {
        if self.disposed || !self.is_active() {
            return;
        }
        if let Err(e) = self.stop() {
            warn!("Failed to remove keyboard hook on drop: {}", e);
        }
    }
}

/// Keeps the hook installed for a scope.
pub struct HookGuard<'a, B: HookBackend> {
    engine: &'a mut KeyboardEngine<B>,
}

impl<B: HookBackend> HookGuard<'_, B> {
    pub fn engine(&self) -> &KeyboardEngine<B> {
        &*self.engine
    }

    /// Stops the hook now and reports failure instead of only logging it.
    pub fn release(self) -> Result<()> {
        let mut this = std::mem::ManuallyDrop::new(self);
        this.engine.stop()
    }
}

impl<B: HookBackend> Drop for HookGuard<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.stop() {
            warn!("Failed to remove keyboard hook at end of scope: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use crate::mock::{MockHookBackend, MockKeyState};
    use crate::types::HookNotification;

    fn engine() -> (KeyboardEngine<MockHookBackend>, MockHookBackend) {
        let backend = MockHookBackend::new();
        let engine = KeyboardEngine::new(backend.clone(), MockKeyState::new(), &EngineConfig::default());
        (engine, backend)
    }

    #[test]
    fn test_start_is_idempotent() {
        let (mut engine, backend) = engine();
        assert!(!engine.is_active());
        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.is_active());
        assert_eq!(backend.install_count(), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut engine, backend) = engine();
        engine.stop().unwrap();
        assert_eq!(backend.uninstall_count(), 0);

        engine.start().unwrap();
        engine.stop().unwrap();
        engine.stop().unwrap();
        assert!(!engine.is_active());
        assert_eq!(backend.uninstall_count(), 1);

        // Restart after stop installs a fresh hook.
        engine.start().unwrap();
        assert_eq!(backend.install_count(), 2);
    }

    #[test]
    fn test_install_failure_carries_code() {
        let (mut engine, backend) = engine();
        backend.fail_next_install(0x8007_0005_u32 as i32);
        let err = engine.start().unwrap_err();
        assert_eq!(err.code(), Some(0x8007_0005_u32 as i32));
        assert!(!engine.is_active());

        // Not retried internally, but the caller may try again.
        engine.start().unwrap();
        assert!(engine.is_active());
    }

    #[test]
    fn test_remove_failure_keeps_hook() {
        let (mut engine, backend) = engine();
        engine.start().unwrap();
        backend.fail_next_uninstall(0x57);
        assert!(matches!(engine.stop(), Err(Error::HookRemove { code: 0x57, .. })));
        assert!(engine.is_active());
        engine.stop().unwrap();
        assert!(!engine.is_active());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut engine, backend) = engine();
        engine.start().unwrap();
        engine.dispose().unwrap();
        engine.dispose().unwrap();
        assert!(engine.is_disposed());
        assert!(!engine.is_active());
        assert_eq!(backend.uninstall_count(), 1);
        assert!(matches!(engine.start(), Err(Error::Disposed)));

        drop(engine);
        assert_eq!(backend.uninstall_count(), 1);
    }

    #[test]
    fn test_drop_removes_forgotten_hook() {
        let (mut engine, backend) = engine();
        engine.start().unwrap();
        drop(engine);
        assert_eq!(backend.uninstall_count(), 1);
        assert!(!backend.is_installed());
    }

    #[test]
    fn test_drop_swallows_failure() {
        let (mut engine, backend) = engine();
        engine.start().unwrap();
        backend.fail_next_uninstall(5);
        drop(engine);
        assert_eq!(backend.uninstall_count(), 0);
    }

    #[test]
    fn test_guard_stops_at_scope_end() {
        let (mut engine, backend) = engine();
        {
            let guard = engine.guard().unwrap();
            assert!(guard.engine().is_active());
            assert!(backend.is_installed());
        }
        assert!(!engine.is_active());
        assert_eq!(backend.uninstall_count(), 1);

        let guard = engine.guard().unwrap();
        guard.release().unwrap();
        assert!(!engine.is_active());
        assert_eq!(backend.uninstall_count(), 2);
    }

    #[test]
    fn test_subscribers_receive_events_while_active() {
        let (mut engine, backend) = engine();
        let rx = engine.event_channel(8);
        let id = engine.on_key_down(|ev| {
            if ev.key() == Key::NumPad5 {
                ev.handled = true;
            }
        });
        engine.start().unwrap();

        let (result, forwarded) = backend.deliver(&HookNotification::key_down(0x65));
        assert_eq!(result, crate::hook::SWALLOW);
        assert!(!forwarded);
        assert_eq!(rx.try_recv().unwrap().event.key(), Key::NumPad5);

        assert!(engine.unsubscribe(id));
        let (result, forwarded) = backend.deliver(&HookNotification::key_down(0x65));
        assert_eq!(result, 0);
        assert!(forwarded);
    }
}
