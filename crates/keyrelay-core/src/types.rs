use crate::key::{vk, Key};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Window messages carried by low-level keyboard notifications.
pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;

/// `KBDLLHOOKSTRUCT.flags` bits.
pub const LLKHF_EXTENDED: u32 = 0x01;
pub const LLKHF_INJECTED: u32 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEdge {
    Down,
    Up,
}

impl KeyEdge {
    /// Edge described by a hook message. The `SYS` variants are raised for
    /// Alt-chorded keys and map to the same edges.
    pub fn from_message(message: u32) -> Option<Self> {
        match message {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyEdge::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyEdge::Up),
            _ => None,
        }
    }
}

/// Fields of a low-level keyboard notification, as delivered by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawKeyboardEvent {
    pub vk_code: u32,
    pub scan_code: u32,
    pub flags: u32,
    pub time: u32,
    pub extra_info: usize,
}

impl RawKeyboardEvent {
    pub const fn from_vk(vk_code: u32) -> Self {
        Self {
            vk_code,
            scan_code: 0,
            flags: 0,
            time: 0,
            extra_info: 0,
        }
    }

    pub fn is_extended(&self) -> bool {
        self.flags & LLKHF_EXTENDED != 0
    }

    pub fn is_injected(&self) -> bool {
        self.flags & LLKHF_INJECTED != 0
    }
}

/// One invocation of the hook callback: processing code, message and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookNotification {
    pub code: i32,
    pub message: u32,
    pub raw: RawKeyboardEvent,
}

impl HookNotification {
    /// `HC_ACTION`
    pub const ACTION: i32 = 0;

    pub const fn new(message: u32, raw: RawKeyboardEvent) -> Self {
        Self {
            code: Self::ACTION,
            message,
            raw,
        }
    }

    pub const fn key_down(vk_code: u32) -> Self {
        Self::new(WM_KEYDOWN, RawKeyboardEvent::from_vk(vk_code))
    }

    pub const fn key_up(vk_code: u32) -> Self {
        Self::new(WM_KEYUP, RawKeyboardEvent::from_vk(vk_code))
    }
}

/// Modifier keys held while a key event was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const fn none() -> Self {
        Self {
            ctrl: false,
            shift: false,
            alt: false,
        }
    }

    pub const fn is_empty(self) -> bool {
        !(self.ctrl || self.shift || self.alt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    Ctrl,
    Shift,
    Alt,
}

impl ModifierKind {
    /// Generic, left and right virtual keys of the modifier.
    pub const fn virtual_keys(self) -> [u16; 3] {
        match self {
            ModifierKind::Ctrl => [vk::VK_CONTROL, vk::VK_LCONTROL, vk::VK_RCONTROL],
            ModifierKind::Shift => [vk::VK_SHIFT, vk::VK_LSHIFT, vk::VK_RSHIFT],
            ModifierKind::Alt => [vk::VK_MENU, vk::VK_LMENU, vk::VK_RMENU],
        }
    }
}

/// Keyboard event raised to subscribers of the hook.
///
/// Everything except `handled` is fixed at construction. A subscriber sets
/// `handled` to swallow the key for every other application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    virtual_key: u32,
    key: Key,
    modifiers: Modifiers,
    pub handled: bool,
}

impl KeyEvent {
    pub fn new(virtual_key: u32, modifiers: Modifiers) -> Self {
        Self {
            virtual_key,
            key: Key::from_vk(virtual_key),
            modifiers,
            handled: false,
        }
    }

    pub fn virtual_key(&self) -> u32 {
        self.virtual_key
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn ctrl(&self) -> bool {
        self.modifiers.ctrl
    }

    pub fn shift(&self) -> bool {
        self.modifiers.shift
    }

    pub fn alt(&self) -> bool {
        self.modifiers.alt
    }
}

/// A dispatched event together with its edge, as sent over event channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedKey {
    pub edge: KeyEdge,
    pub event: KeyEvent,
}

/// Opaque handle of an installed hook. Never null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(std::num::NonZeroIsize);

impl HookHandle {
    pub fn new(raw: isize) -> Option<Self> {
        std::num::NonZeroIsize::new(raw).map(Self)
    }

    pub fn raw(self) -> isize {
        self.0.get()
    }
}

/// Platform keyboard layout handle (`HKL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyboardLayout(pub isize);

impl KeyboardLayout {
    /// Language identifier stored in the low word of the handle.
    pub fn language(self) -> LayoutId {
        LayoutId::new((self.0 as usize & 0xFFFF) as u16)
    }
}

/// Platform window handle (`HWND`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// A 16-bit language identifier and its layout descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutId(u16);

impl LayoutId {
    pub const EN_US: LayoutId = LayoutId(0x0409);
    pub const RU_RU: LayoutId = LayoutId(0x0419);

    pub const fn new(lang_id: u16) -> Self {
        Self(lang_id)
    }

    pub const fn lang_id(self) -> u16 {
        self.0
    }

    /// Keyboard layout identifier string, e.g. `00000409`.
    pub fn klid(self) -> String {
        format!("0000{:04X}", self.0)
    }

    /// Parses a KLID; only the language part (low four digits) is kept.
    pub fn from_klid(klid: &str) -> Option<Self> {
        if klid.len() != 8 {
            return None;
        }
        u32::from_str_radix(klid, 16)
            .ok()
            .map(|v| Self((v & 0xFFFF) as u16))
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.klid())
    }
}
