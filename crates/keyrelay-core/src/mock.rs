//! In-memory stand-ins for the platform.
//!
//! These let the hook dispatch, the synthesizer and the layout resolver run
//! without an OS hook, a message loop or a real input queue. All of them are
//! cheap to clone and clones share state, so a test can keep one copy while
//! handing another to the engine.

use crate::error::{Error, Result};
use crate::hook::{HookBackend, HookChain, SharedDispatcher};
use crate::input::{InputRecord, InputSink};
use crate::layout::{KeyMapping, LayoutPlatform, LoadMode};
use crate::probe::KeyStateProbe;
use crate::types::{HookHandle, HookNotification, KeyboardLayout, LayoutId, WindowHandle};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Key state probe with keys pressed and released by hand.
#[derive(Debug, Clone, Default)]
pub struct MockKeyState {
    down: Arc<Mutex<HashSet<u16>>>,
}

impl MockKeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, vk: u16) {
        self.down.lock().insert(vk);
    }

    pub fn release(&self, vk: u16) {
        self.down.lock().remove(&vk);
    }
}

impl KeyStateProbe for MockKeyState {
    fn is_key_down(&self, vk: u16) -> bool {
        self.down.lock().contains(&vk)
    }
}

/// Hook chain that remembers what was forwarded to it.
#[derive(Debug, Default)]
pub struct RecordingChain {
    forwarded: Vec<HookNotification>,
    result: isize,
}

impl RecordingChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain whose next hook returns `result`.
    pub fn with_result(result: isize) -> Self {
        Self {
            forwarded: Vec::new(),
            result,
        }
    }

    pub fn forwarded(&self) -> &[HookNotification] {
        &self.forwarded
    }
}

impl HookChain for RecordingChain {
    fn call_next(&mut self, notification: &HookNotification) -> isize {
        self.forwarded.push(*notification);
        self.result
    }
}

#[derive(Default)]
struct HookState {
    dispatcher: Option<SharedDispatcher>,
    handle: Option<HookHandle>,
    installs: usize,
    uninstalls: usize,
    fail_install: Option<i32>,
    fail_uninstall: Option<i32>,
    next_handle: isize,
}

/// Hook backend that keeps the dispatcher and lets tests feed it
/// notifications as if the OS had delivered them.
#[derive(Clone, Default)]
pub struct MockHookBackend {
    state: Arc<Mutex<HookState>>,
}

impl MockHookBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    pub fn install_count(&self) -> usize {
        self.state.lock().installs
    }

    pub fn uninstall_count(&self) -> usize {
        self.state.lock().uninstalls
    }

    pub fn fail_next_install(&self, code: i32) {
        self.state.lock().fail_install = Some(code);
    }

    pub fn fail_next_uninstall(&self, code: i32) {
        self.state.lock().fail_uninstall = Some(code);
    }

    /// Runs `notification` through the installed hook. Returns the callback
    /// result and whether the notification went down the chain. Without an
    /// installed hook the key simply passes.
    pub fn deliver(&self, notification: &HookNotification) -> (isize, bool) {
        let dispatcher = self.state.lock().dispatcher.clone();
        let Some(dispatcher) = dispatcher else {
            return (0, true);
        };
        let mut chain = RecordingChain::new();
        let result = dispatcher.lock().hook_proc(notification, &mut chain);
        (result, !chain.forwarded().is_empty())
    }
}

impl HookBackend for MockHookBackend {
    fn install(&mut self, dispatcher: SharedDispatcher) -> Result<HookHandle> {
        let mut state = self.state.lock();
        if let Some(code) = state.fail_install.take() {
            return Err(Error::HookInstall {
                op: "SetWindowsHookEx",
                code,
            });
        }
        if state.handle.is_some() {
            return Err(Error::HookBusy { thread_id: 0 });
        }
        state.next_handle += 1;
        let handle = HookHandle::new(0x100 + state.next_handle).ok_or(Error::HookInstall {
            op: "SetWindowsHookEx",
            code: -1,
        })?;
        state.handle = Some(handle);
        state.dispatcher = Some(dispatcher);
        state.installs += 1;
        Ok(handle)
    }

    fn uninstall(&mut self, handle: HookHandle) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(code) = state.fail_uninstall.take() {
            return Err(Error::HookRemove {
                op: "UnhookWindowsHookEx",
                code,
            });
        }
        if state.handle != Some(handle) {
            // ERROR_INVALID_HOOK_HANDLE
            return Err(Error::HookRemove {
                op: "UnhookWindowsHookEx",
                code: 1404,
            });
        }
        state.handle = None;
        state.dispatcher = None;
        state.uninstalls += 1;
        Ok(())
    }
}

/// Input sink that records every submitted batch.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<Vec<InputRecord>>>>,
    limit: Arc<Mutex<Option<(u32, i32)>>>,
    failing_batch: Arc<Mutex<Option<(usize, u32, i32)>>>,
    last_code: Arc<Mutex<i32>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// From now on accept at most `count` records per batch and report
    /// `code` as the error.
    pub fn accept_at_most(&self, count: u32, code: i32) {
        *self.limit.lock() = Some((count, code));
    }

    /// Batch number `index` (0-based, counted from the start) accepts only
    /// `accepted` records and reports `code`. Other batches are unaffected.
    pub fn fail_batch(&self, index: usize, accepted: u32, code: i32) {
        *self.failing_batch.lock() = Some((index, accepted, code));
    }

    /// Every submitted batch, including rejected ones.
    pub fn batches(&self) -> Vec<Vec<InputRecord>> {
        self.batches.lock().clone()
    }

    pub fn records(&self) -> Vec<InputRecord> {
        self.batches.lock().iter().flatten().copied().collect()
    }

    pub fn clear(&self) {
        self.batches.lock().clear();
    }
}

impl InputSink for RecordingSink {
    fn send(&self, batch: &[InputRecord]) -> u32 {
        let index = {
            let mut batches = self.batches.lock();
            batches.push(batch.to_vec());
            batches.len() - 1
        };
        let len = batch.len() as u32;

        let failing = *self.failing_batch.lock();
        if let Some((at, accepted, code)) = failing {
            if at == index {
                *self.last_code.lock() = code;
                return len.min(accepted);
            }
        }
        let limit = *self.limit.lock();
        match limit {
            Some((count, code)) if count < len => {
                *self.last_code.lock() = code;
                count
            }
            _ => len,
        }
    }

    fn last_error_code(&self) -> i32 {
        *self.last_code.lock()
    }
}

struct LayoutState {
    foreground: Option<WindowHandle>,
    window_threads: HashMap<WindowHandle, u32>,
    thread_layouts: HashMap<u32, KeyboardLayout>,
    available: HashMap<String, KeyboardLayout>,
    refused: Vec<LoadMode>,
    switch_on_request: bool,
    scan_codes: HashMap<u16, u16>,
    chars: HashMap<(KeyboardLayout, u16), KeyMapping>,
    loads: Vec<(String, LoadMode)>,
    change_requests: Vec<(WindowHandle, KeyboardLayout)>,
}

/// Layout platform with a scripted foreground window, per-thread layouts and
/// character tables.
#[derive(Clone)]
pub struct ScriptedLayouts {
    state: Arc<Mutex<LayoutState>>,
}

// Set 1 scan codes of a standard 101/102-key keyboard.
const SCAN_CODES: &[(u16, u16)] = &[
    (0x08, 0x0E), // Back
    (0x09, 0x0F), // Tab
    (0x0D, 0x1C), // Enter
    (0x10, 0x2A), // Shift
    (0x11, 0x1D), // Control
    (0x12, 0x38), // Alt
    (0x1B, 0x01), // Escape
    (0x20, 0x39), // Space
    (0x21, 0x49), // PageUp
    (0x22, 0x51), // PageDown
    (0x23, 0x4F), // End
    (0x24, 0x47), // Home
    (0x25, 0x4B), // Left
    (0x26, 0x48), // Up
    (0x27, 0x4D), // Right
    (0x28, 0x50), // Down
    (0x2D, 0x52), // Insert
    (0x2E, 0x53), // Delete
    (0x30, 0x0B),
    (0x31, 0x02),
    (0x32, 0x03),
    (0x33, 0x04),
    (0x34, 0x05),
    (0x35, 0x06),
    (0x36, 0x07),
    (0x37, 0x08),
    (0x38, 0x09),
    (0x39, 0x0A),
    (0x41, 0x1E),
    (0x42, 0x30),
    (0x43, 0x2E),
    (0x44, 0x20),
    (0x45, 0x12),
    (0x46, 0x21),
    (0x47, 0x22),
    (0x48, 0x23),
    (0x49, 0x17),
    (0x4A, 0x24),
    (0x4B, 0x25),
    (0x4C, 0x26),
    (0x4D, 0x32),
    (0x4E, 0x31),
    (0x4F, 0x18),
    (0x50, 0x19),
    (0x51, 0x10),
    (0x52, 0x13),
    (0x53, 0x1F),
    (0x54, 0x14),
    (0x55, 0x16),
    (0x56, 0x2F),
    (0x57, 0x11),
    (0x58, 0x2D),
    (0x59, 0x15),
    (0x5A, 0x2C),
    (0x5B, 0x5B), // LWin
    (0x5C, 0x5C), // RWin
    (0x5D, 0x5D), // Apps
    (0x60, 0x52), // NumPad0
    (0x61, 0x4F),
    (0x62, 0x50),
    (0x63, 0x51),
    (0x64, 0x4B),
    (0x65, 0x4C),
    (0x66, 0x4D),
    (0x67, 0x47),
    (0x68, 0x48),
    (0x69, 0x49),
    (0x6F, 0x35), // Divide
    (0xA0, 0x2A),
    (0xA1, 0x36),
    (0xA2, 0x1D),
    (0xA3, 0x1D),
    (0xA4, 0x38),
    (0xA5, 0x38),
    (0xBA, 0x27), // ;
    (0xBB, 0x0D), // =
    (0xBC, 0x33), // ,
    (0xBD, 0x0C), // -
    (0xBE, 0x34), // .
    (0xBF, 0x35), // /
    (0xDE, 0x28), // '
];

// (char, vk, shift)
const US_SYMBOLS: &[(char, u8, bool)] = &[
    (' ', 0x20, false),
    ('!', 0x31, true),
    ('@', 0x32, true),
    ('#', 0x33, true),
    ('$', 0x34, true),
    ('%', 0x35, true),
    ('^', 0x36, true),
    ('&', 0x37, true),
    ('*', 0x38, true),
    ('(', 0x39, true),
    (')', 0x30, true),
    ('-', 0xBD, false),
    ('_', 0xBD, true),
    ('=', 0xBB, false),
    ('+', 0xBB, true),
    (';', 0xBA, false),
    (':', 0xBA, true),
    (',', 0xBC, false),
    ('.', 0xBE, false),
    ('/', 0xBF, false),
    ('?', 0xBF, true),
    ('\'', 0xDE, false),
    ('"', 0xDE, true),
];

// Cyrillic letters on the QWERTY key positions of the Russian layout.
const RU_LETTERS: &[(char, u8)] = &[
    ('й', 0x51),
    ('ц', 0x57),
    ('у', 0x45),
    ('к', 0x52),
    ('е', 0x54),
    ('н', 0x59),
    ('г', 0x55),
    ('ш', 0x49),
    ('щ', 0x4F),
    ('з', 0x50),
    ('ф', 0x41),
    ('ы', 0x53),
    ('в', 0x44),
    ('а', 0x46),
    ('п', 0x47),
    ('р', 0x48),
    ('о', 0x4A),
    ('л', 0x4B),
    ('д', 0x4C),
    ('я', 0x5A),
    ('ч', 0x58),
    ('с', 0x43),
    ('м', 0x56),
    ('и', 0x42),
    ('т', 0x4E),
    ('ь', 0x4D),
];

impl ScriptedLayouts {
    pub const FOREGROUND_WINDOW: WindowHandle = WindowHandle(0x1001);
    pub const FOREGROUND_THREAD: u32 = 42;

    /// Layout handle for a language, shaped like a default `HKL`.
    pub fn layout_for(language: LayoutId) -> KeyboardLayout {
        let lang = language.lang_id() as isize;
        KeyboardLayout((lang << 16) | lang)
    }

    /// A desktop with an en-US layout everywhere and a focused window.
    pub fn us_english() -> Self {
        let en = Self::layout_for(LayoutId::EN_US);
        let mut chars = HashMap::new();
        for c in 'a'..='z' {
            chars.insert((en, c as u16), mapping(c.to_ascii_uppercase() as u8, false));
            chars.insert((en, c.to_ascii_uppercase() as u16), mapping(c.to_ascii_uppercase() as u8, true));
        }
        for c in '0'..='9' {
            chars.insert((en, c as u16), mapping(c as u8, false));
        }
        for (c, vk, shift) in US_SYMBOLS {
            chars.insert((en, *c as u16), mapping(*vk, *shift));
        }

        let state = LayoutState {
            foreground: Some(Self::FOREGROUND_WINDOW),
            window_threads: HashMap::from([(Self::FOREGROUND_WINDOW, Self::FOREGROUND_THREAD)]),
            thread_layouts: HashMap::from([(0, en), (Self::FOREGROUND_THREAD, en)]),
            available: HashMap::from([(LayoutId::EN_US.klid(), en)]),
            refused: Vec::new(),
            switch_on_request: true,
            scan_codes: SCAN_CODES.iter().copied().collect(),
            chars,
            loads: Vec::new(),
            change_requests: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Makes the Russian layout loadable and gives it a character table.
    pub fn add_russian(&self) {
        let ru = Self::layout_for(LayoutId::RU_RU);
        let mut state = self.state.lock();
        state.available.insert(LayoutId::RU_RU.klid(), ru);
        for (c, vk) in RU_LETTERS {
            state.chars.insert((ru, *c as u16), mapping(*vk, false));
            for upper in c.to_uppercase() {
                state.chars.insert((ru, upper as u16), mapping(*vk, true));
            }
        }
        state.chars.insert((ru, ' ' as u16), mapping(0x20, false));
    }

    pub fn set_foreground(&self, window: Option<WindowHandle>) {
        self.state.lock().foreground = window;
    }

    pub fn set_thread_language(&self, thread_id: u32, language: LayoutId) {
        self.state
            .lock()
            .thread_layouts
            .insert(thread_id, Self::layout_for(language));
    }

    pub fn set_scan_code(&self, vk: u16, scan: u16) {
        self.state.lock().scan_codes.insert(vk, scan);
    }

    /// Maps `ch` on the en-US layout to `vk` with `VkKeyScan` style shift
    /// state bits.
    pub fn map_char(&self, ch: char, vk: u8, shift_state: u8) {
        let en = Self::layout_for(LayoutId::EN_US);
        let packed = ((u16::from(shift_state) << 8) | u16::from(vk)) as i16;
        if let Some(m) = KeyMapping::from_vk_scan(packed) {
            self.state.lock().chars.insert((en, ch as u16), m);
        }
    }

    pub fn refuse_load_mode(&self, mode: LoadMode) {
        self.state.lock().refused.push(mode);
    }

    /// Change requests are recorded but have no effect.
    pub fn ignore_change_requests(&self) {
        self.state.lock().switch_on_request = false;
    }

    pub fn loads(&self) -> Vec<(String, LoadMode)> {
        self.state.lock().loads.clone()
    }

    pub fn change_requests(&self) -> Vec<(WindowHandle, KeyboardLayout)> {
        self.state.lock().change_requests.clone()
    }
}

fn mapping(vk: u8, shift: bool) -> KeyMapping {
    KeyMapping {
        vk,
        shift,
        ctrl: false,
        alt: false,
    }
}

impl LayoutPlatform for ScriptedLayouts {
    fn foreground_window(&self) -> Option<WindowHandle> {
        self.state.lock().foreground
    }

    fn window_thread(&self, window: WindowHandle) -> u32 {
        self.state
            .lock()
            .window_threads
            .get(&window)
            .copied()
            .unwrap_or(0)
    }

    fn thread_layout(&self, thread_id: u32) -> KeyboardLayout {
        self.state
            .lock()
            .thread_layouts
            .get(&thread_id)
            .copied()
            .unwrap_or_else(|| Self::layout_for(LayoutId::EN_US))
    }

    fn load_layout(&self, klid: &str, mode: LoadMode) -> Option<KeyboardLayout> {
        let mut state = self.state.lock();
        state.loads.push((klid.to_string(), mode));
        if state.refused.contains(&mode) {
            return None;
        }
        state.available.get(klid).copied()
    }

    fn request_layout_change(&self, window: WindowHandle, layout: KeyboardLayout) {
        let mut state = self.state.lock();
        state.change_requests.push((window, layout));
        if state.switch_on_request {
            let thread = state.window_threads.get(&window).copied().unwrap_or(0);
            state.thread_layouts.insert(thread, layout);
        }
    }

    fn virtual_key_to_scan_code(&self, vk: u16, _layout: KeyboardLayout) -> u16 {
        self.state.lock().scan_codes.get(&vk).copied().unwrap_or(0)
    }

    fn char_to_virtual_key(&self, unit: u16, layout: KeyboardLayout) -> Option<KeyMapping> {
        self.state.lock().chars.get(&(layout, unit)).copied()
    }
}
