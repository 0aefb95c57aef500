//! Win32 implementations of the platform traits, plus constructors that wire
//! them together.

use crate::config::EngineConfig;
use crate::engine::KeyboardEngine;
use crate::input::{InputRecord, InputSink};
use crate::keyboard_hook::Win32Hook;
use crate::layout::{KeyMapping, LayoutPlatform, LayoutResolver, LoadMode};
use crate::probe::KeyStateProbe;
use crate::synth::Synthesizer;
use crate::types::{KeyboardLayout, WindowHandle};
use tracing::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, GetKeyboardLayout, LoadKeyboardLayoutW, MapVirtualKeyExW, SendInput, VkKeyScanExW,
    ACTIVATE_KEYBOARD_LAYOUT_FLAGS, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KLF_ACTIVATE, KLF_SETFORPROCESS, MAPVK_VK_TO_VSC, VIRTUAL_KEY,
};
use windows::Win32::UI::TextServices::HKL;
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowThreadProcessId, SendMessageW, WM_INPUTLANGCHANGEREQUEST,
};

/// Reads the physical key state with `GetAsyncKeyState`. The hook thread's
/// own message queue never sees keys typed into other windows, so the
/// queue-synchronized `GetKeyState` would miss modifiers held there.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32KeyState;

impl KeyStateProbe for Win32KeyState {
    fn is_key_down(&self, vk: u16) -> bool {
        let state = unsafe { GetAsyncKeyState(i32::from(vk)) };
        state as u16 & 0x8000 != 0
    }
}

/// Submits records with `SendInput`, tagging each with `marker`.
#[derive(Debug, Clone, Copy)]
pub struct Win32InputSink {
    marker: usize,
}

impl Win32InputSink {
    pub fn new(marker: usize) -> Self {
        Self { marker }
    }

    fn to_input(&self, record: &InputRecord) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(0),
                    wScan: record.payload(),
                    dwFlags: KEYBD_EVENT_FLAGS(record.flags()),
                    time: 0,
                    dwExtraInfo: self.marker,
                },
            },
        }
    }
}

impl InputSink for Win32InputSink {
    fn send(&self, batch: &[InputRecord]) -> u32 {
        let inputs: Vec<INPUT> = batch.iter().map(|r| self.to_input(r)).collect();
        unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) }
    }

    fn last_error_code(&self) -> i32 {
        windows::core::Error::from_win32().code().0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Layouts;

impl LayoutPlatform for Win32Layouts {
    fn foreground_window(&self) -> Option<WindowHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        (hwnd.0 != 0).then_some(WindowHandle(hwnd.0))
    }

    fn window_thread(&self, window: WindowHandle) -> u32 {
        unsafe { GetWindowThreadProcessId(HWND(window.0), None) }
    }

    fn thread_layout(&self, thread_id: u32) -> KeyboardLayout {
        KeyboardLayout(unsafe { GetKeyboardLayout(thread_id) }.0)
    }

    fn load_layout(&self, klid: &str, mode: LoadMode) -> Option<KeyboardLayout> {
        let flags = match mode {
            LoadMode::ActivateForProcess => KLF_ACTIVATE.0 | KLF_SETFORPROCESS.0,
            LoadMode::Activate => KLF_ACTIVATE.0,
        };
        let wide: Vec<u16> = klid.encode_utf16().chain(std::iter::once(0)).collect();
        match unsafe { LoadKeyboardLayoutW(PCWSTR(wide.as_ptr()), ACTIVATE_KEYBOARD_LAYOUT_FLAGS(flags)) } {
            Ok(hkl) if hkl.0 != 0 => Some(KeyboardLayout(hkl.0)),
            Ok(_) => None,
            Err(e) => {
                debug!("LoadKeyboardLayout({}, {:?}) failed: {}", klid, mode, e);
                None
            }
        }
    }

    fn request_layout_change(&self, window: WindowHandle, layout: KeyboardLayout) {
        unsafe {
            SendMessageW(
                HWND(window.0),
                WM_INPUTLANGCHANGEREQUEST,
                WPARAM(0),
                LPARAM(layout.0),
            );
        }
    }

    fn virtual_key_to_scan_code(&self, vk: u16, layout: KeyboardLayout) -> u16 {
        let scan = unsafe { MapVirtualKeyExW(u32::from(vk), MAPVK_VK_TO_VSC, HKL(layout.0)) };
        scan as u16
    }

    fn char_to_virtual_key(&self, unit: u16, layout: KeyboardLayout) -> Option<KeyMapping> {
        KeyMapping::from_vk_scan(unsafe { VkKeyScanExW(unit, HKL(layout.0)) })
    }
}

/// Engine backed by a real `WH_KEYBOARD_LL` hook.
pub fn engine(config: &EngineConfig) -> KeyboardEngine<Win32Hook> {
    KeyboardEngine::new(Win32Hook::new(), Win32KeyState, config)
}

pub fn synthesizer(config: &EngineConfig) -> Synthesizer<Win32InputSink, Win32Layouts> {
    Synthesizer::new(Win32InputSink::new(config.injection_marker), Win32Layouts)
}

pub fn layout_resolver(config: &EngineConfig) -> LayoutResolver<Win32Layouts> {
    LayoutResolver::new(Win32Layouts, config)
}
