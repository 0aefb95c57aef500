use crate::config::EngineConfig;
use crate::types::{KeyboardLayout, LayoutId, WindowHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a layout should be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Load, activate and make it the layout of the whole process.
    ActivateForProcess,
    /// Load and activate for the calling thread only.
    Activate,
}

/// Virtual key and required modifiers for a character under some layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMapping {
    pub vk: u8,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl KeyMapping {
    /// Decodes a `VkKeyScanEx` result: virtual key in the low byte, shift
    /// state bits (1 = Shift, 2 = Ctrl, 4 = Alt) in the high byte. `-1`
    /// means the layout cannot produce the character.
    pub fn from_vk_scan(packed: i16) -> Option<Self> {
        if packed == -1 {
            return None;
        }
        let packed = packed as u16;
        let state = (packed >> 8) as u8;
        Some(Self {
            vk: (packed & 0xFF) as u8,
            shift: state & 1 != 0,
            ctrl: state & 2 != 0,
            alt: state & 4 != 0,
        })
    }
}

/// Keyboard layout and foreground window queries.
pub trait LayoutPlatform {
    fn foreground_window(&self) -> Option<WindowHandle>;

    /// Thread owning `window`'s message queue.
    fn window_thread(&self, window: WindowHandle) -> u32;

    /// Layout active on `thread_id`; `0` is the calling thread.
    fn thread_layout(&self, thread_id: u32) -> KeyboardLayout;

    fn load_layout(&self, klid: &str, mode: LoadMode) -> Option<KeyboardLayout>;

    /// Asks `window` to switch its input language to `layout`.
    fn request_layout_change(&self, window: WindowHandle, layout: KeyboardLayout);

    fn virtual_key_to_scan_code(&self, vk: u16, layout: KeyboardLayout) -> u16;

    fn char_to_virtual_key(&self, unit: u16, layout: KeyboardLayout) -> Option<KeyMapping>;

    /// Layout of the foreground window's input thread, or of the calling
    /// thread when nothing has focus.
    fn foreground_layout(&self) -> KeyboardLayout {
        match self.foreground_window() {
            Some(window) => self.thread_layout(self.window_thread(window)),
            None => self.thread_layout(0),
        }
    }
}

/// Queries and switches the input language of the foreground window.
#[derive(Debug, Clone)]
pub struct LayoutResolver<L> {
    platform: L,
    verify_delay: Duration,
}

impl<L: LayoutPlatform> LayoutResolver<L> {
    pub fn new(platform: L, config: &EngineConfig) -> Self {
        Self {
            platform,
            verify_delay: config.layout_verify_delay(),
        }
    }

    pub fn platform(&self) -> &L {
        &self.platform
    }

    pub fn current_layout(&self) -> KeyboardLayout {
        self.platform.foreground_layout()
    }

    pub fn current_language(&self) -> LayoutId {
        self.current_layout().language()
    }

    /// Best effort: makes the foreground window use `target` and reports
    /// whether the switch could be observed after a short wait.
    ///
    /// `false` is not fatal. Layout switching is racy and callers usually
    /// carry on with whatever layout is active.
    pub fn ensure_language(&self, target: LayoutId) -> bool {
        let Some(window) = self.platform.foreground_window() else {
            debug!("ensure_language({}): no foreground window", target);
            return false;
        };
        let thread = self.platform.window_thread(window);
        let current = self.platform.thread_layout(thread).language();
        if current == target {
            return true;
        }

        let klid = target.klid();
        let layout = self
            .platform
            .load_layout(&klid, LoadMode::ActivateForProcess)
            .or_else(|| self.platform.load_layout(&klid, LoadMode::Activate));
        let Some(layout) = layout else {
            warn!("Could not load keyboard layout {}", klid);
            return false;
        };

        info!(
            "Requesting layout switch {} -> {} on thread {}",
            current, target, thread
        );
        self.platform.request_layout_change(window, layout);

        if !self.verify_delay.is_zero() {
            std::thread::sleep(self.verify_delay);
        }
        let after = self.platform.thread_layout(thread).language();
        if after != target {
            debug!("Layout switch not observed yet (still {})", after);
        }
        after == target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedLayouts;

    fn resolver(layouts: &ScriptedLayouts) -> LayoutResolver<ScriptedLayouts> {
        let config = EngineConfig {
            layout_verify_delay_ms: 0,
            ..EngineConfig::default()
        };
        LayoutResolver::new(layouts.clone(), &config)
    }

    #[test]
    fn test_vk_scan_decoding() {
        assert_eq!(KeyMapping::from_vk_scan(-1), None);
        let mapping = KeyMapping::from_vk_scan(0x0131).unwrap();
        assert_eq!(mapping.vk, 0x31);
        assert!(mapping.shift);
        assert!(!mapping.ctrl);
        let mapping = KeyMapping::from_vk_scan(0x0645).unwrap();
        assert!(mapping.ctrl && mapping.alt && !mapping.shift);
    }

    #[test]
    fn test_current_language_follows_foreground() {
        let layouts = ScriptedLayouts::us_english();
        layouts.add_russian();
        layouts.set_thread_language(ScriptedLayouts::FOREGROUND_THREAD, LayoutId::RU_RU);
        assert_eq!(resolver(&layouts).current_language(), LayoutId::RU_RU);

        layouts.set_foreground(None);
        assert_eq!(resolver(&layouts).current_language(), LayoutId::EN_US);
    }

    #[test]
    fn test_ensure_language_is_idempotent() {
        let layouts = ScriptedLayouts::us_english();
        let resolver = resolver(&layouts);
        assert!(resolver.ensure_language(LayoutId::EN_US));
        assert!(resolver.ensure_language(LayoutId::EN_US));
        assert!(layouts.loads().is_empty());
        assert!(layouts.change_requests().is_empty());
    }

    #[test]
    fn test_ensure_language_switches() {
        let layouts = ScriptedLayouts::us_english();
        layouts.add_russian();
        let resolver = resolver(&layouts);

        assert!(resolver.ensure_language(LayoutId::RU_RU));
        assert_eq!(
            layouts.loads(),
            vec![("00000419".to_string(), LoadMode::ActivateForProcess)]
        );
        assert_eq!(layouts.change_requests().len(), 1);
        assert_eq!(resolver.current_language(), LayoutId::RU_RU);

        // Already there now.
        assert!(resolver.ensure_language(LayoutId::RU_RU));
        assert_eq!(layouts.change_requests().len(), 1);
    }

    #[test]
    fn test_ensure_language_falls_back_to_thread_activation() {
        let layouts = ScriptedLayouts::us_english();
        layouts.add_russian();
        layouts.refuse_load_mode(LoadMode::ActivateForProcess);

        assert!(resolver(&layouts).ensure_language(LayoutId::RU_RU));
        assert_eq!(
            layouts.loads(),
            vec![
                ("00000419".to_string(), LoadMode::ActivateForProcess),
                ("00000419".to_string(), LoadMode::Activate),
            ]
        );
    }

    #[test]
    fn test_ensure_language_unknown_layout() {
        let layouts = ScriptedLayouts::us_english();
        assert!(!resolver(&layouts).ensure_language(LayoutId::new(0x0411)));
        assert!(layouts.change_requests().is_empty());
    }

    #[test]
    fn test_ensure_language_unverified_switch() {
        let layouts = ScriptedLayouts::us_english();
        layouts.add_russian();
        layouts.ignore_change_requests();

        assert!(!resolver(&layouts).ensure_language(LayoutId::RU_RU));
        assert_eq!(layouts.change_requests().len(), 1);
    }

    #[test]
    fn test_ensure_language_without_foreground_window() {
        let layouts = ScriptedLayouts::us_english();
        layouts.set_foreground(None);
        assert!(!resolver(&layouts).ensure_language(LayoutId::EN_US));
    }
}
