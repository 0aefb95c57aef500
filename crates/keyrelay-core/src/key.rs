use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Virtual key codes the engine refers to by name.
pub mod vk {
    pub const VK_BACK: u16 = 0x08;
    pub const VK_TAB: u16 = 0x09;
    pub const VK_RETURN: u16 = 0x0D;
    pub const VK_SHIFT: u16 = 0x10;
    pub const VK_CONTROL: u16 = 0x11;
    pub const VK_MENU: u16 = 0x12;
    pub const VK_ESCAPE: u16 = 0x1B;
    pub const VK_SPACE: u16 = 0x20;
    pub const VK_PRIOR: u16 = 0x21;
    pub const VK_NEXT: u16 = 0x22;
    pub const VK_END: u16 = 0x23;
    pub const VK_HOME: u16 = 0x24;
    pub const VK_LEFT: u16 = 0x25;
    pub const VK_UP: u16 = 0x26;
    pub const VK_RIGHT: u16 = 0x27;
    pub const VK_DOWN: u16 = 0x28;
    pub const VK_INSERT: u16 = 0x2D;
    pub const VK_DELETE: u16 = 0x2E;
    pub const VK_LWIN: u16 = 0x5B;
    pub const VK_RWIN: u16 = 0x5C;
    pub const VK_APPS: u16 = 0x5D;
    pub const VK_NUMPAD0: u16 = 0x60;
    pub const VK_DIVIDE: u16 = 0x6F;
    pub const VK_LSHIFT: u16 = 0xA0;
    pub const VK_RSHIFT: u16 = 0xA1;
    pub const VK_LCONTROL: u16 = 0xA2;
    pub const VK_RCONTROL: u16 = 0xA3;
    pub const VK_LMENU: u16 = 0xA4;
    pub const VK_RMENU: u16 = 0xA5;
}

macro_rules! keys {
    ($($name:ident = $vk:expr),* $(,)?) => {
        /// Symbolic, layout-independent key identifier.
        ///
        /// `Key::None` stands for "no key" and for any virtual key code
        /// without a symbolic counterpart.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum Key {
            #[default]
            None,
            $($name,)*
        }

        /// Virtual key code of every symbolic key. The first entry for a key
        /// is its canonical code.
        const KEY_TABLE: &[(u16, Key)] = &[
            $(($vk, Key::$name),)*
        ];

        impl Key {
            /// Name used in bindings and for display.
            pub const fn name(self) -> &'static str {
                match self {
                    Key::None => "None",
                    $(Key::$name => stringify!($name),)*
                }
            }
        }
    };
}

keys! {
    Back = 0x08,
    Tab = 0x09,
    Clear = 0x0C,
    Enter = 0x0D,
    Pause = 0x13,
    CapsLock = 0x14,
    Escape = 0x1B,
    Space = 0x20,
    PageUp = 0x21,
    PageDown = 0x22,
    End = 0x23,
    Home = 0x24,
    Left = 0x25,
    Up = 0x26,
    Right = 0x27,
    Down = 0x28,
    Select = 0x29,
    Print = 0x2A,
    Execute = 0x2B,
    PrintScreen = 0x2C,
    Insert = 0x2D,
    Delete = 0x2E,
    Help = 0x2F,
    D0 = 0x30,
    D1 = 0x31,
    D2 = 0x32,
    D3 = 0x33,
    D4 = 0x34,
    D5 = 0x35,
    D6 = 0x36,
    D7 = 0x37,
    D8 = 0x38,
    D9 = 0x39,
    A = 0x41,
    B = 0x42,
    C = 0x43,
    D = 0x44,
    E = 0x45,
    F = 0x46,
    G = 0x47,
    H = 0x48,
    I = 0x49,
    J = 0x4A,
    K = 0x4B,
    L = 0x4C,
    M = 0x4D,
    N = 0x4E,
    O = 0x4F,
    P = 0x50,
    Q = 0x51,
    R = 0x52,
    S = 0x53,
    T = 0x54,
    U = 0x55,
    V = 0x56,
    W = 0x57,
    X = 0x58,
    Y = 0x59,
    Z = 0x5A,
    LWin = 0x5B,
    RWin = 0x5C,
    Apps = 0x5D,
    Sleep = 0x5F,
    NumPad0 = 0x60,
    NumPad1 = 0x61,
    NumPad2 = 0x62,
    NumPad3 = 0x63,
    NumPad4 = 0x64,
    NumPad5 = 0x65,
    NumPad6 = 0x66,
    NumPad7 = 0x67,
    NumPad8 = 0x68,
    NumPad9 = 0x69,
    Multiply = 0x6A,
    Add = 0x6B,
    Separator = 0x6C,
    Subtract = 0x6D,
    Decimal = 0x6E,
    Divide = 0x6F,
    F1 = 0x70,
    F2 = 0x71,
    F3 = 0x72,
    F4 = 0x73,
    F5 = 0x74,
    F6 = 0x75,
    F7 = 0x76,
    F8 = 0x77,
    F9 = 0x78,
    F10 = 0x79,
    F11 = 0x7A,
    F12 = 0x7B,
    F13 = 0x7C,
    F14 = 0x7D,
    F15 = 0x7E,
    F16 = 0x7F,
    F17 = 0x80,
    F18 = 0x81,
    F19 = 0x82,
    F20 = 0x83,
    F21 = 0x84,
    F22 = 0x85,
    F23 = 0x86,
    F24 = 0x87,
    NumLock = 0x90,
    Scroll = 0x91,
    LeftShift = 0xA0,
    RightShift = 0xA1,
    LeftCtrl = 0xA2,
    RightCtrl = 0xA3,
    LeftAlt = 0xA4,
    RightAlt = 0xA5,
    BrowserBack = 0xA6,
    BrowserForward = 0xA7,
    BrowserRefresh = 0xA8,
    BrowserStop = 0xA9,
    BrowserSearch = 0xAA,
    BrowserFavorites = 0xAB,
    BrowserHome = 0xAC,
    VolumeMute = 0xAD,
    VolumeDown = 0xAE,
    VolumeUp = 0xAF,
    MediaNextTrack = 0xB0,
    MediaPreviousTrack = 0xB1,
    MediaStop = 0xB2,
    MediaPlayPause = 0xB3,
    LaunchMail = 0xB4,
    SelectMedia = 0xB5,
    LaunchApplication1 = 0xB6,
    LaunchApplication2 = 0xB7,
    OemSemicolon = 0xBA,
    OemPlus = 0xBB,
    OemComma = 0xBC,
    OemMinus = 0xBD,
    OemPeriod = 0xBE,
    OemQuestion = 0xBF,
    OemTilde = 0xC0,
    OemOpenBrackets = 0xDB,
    OemPipe = 0xDC,
    OemCloseBrackets = 0xDD,
    OemQuotes = 0xDE,
    Oem8 = 0xDF,
    OemBackslash = 0xE2,
    Attn = 0xF6,
    CrSel = 0xF7,
    ExSel = 0xF8,
    EraseEof = 0xF9,
    Play = 0xFA,
    Zoom = 0xFB,
    Pa1 = 0xFD,
    OemClear = 0xFE,
}

// Generic modifier codes resolve to the left-hand key.
const GENERIC_MODIFIERS: &[(u16, Key)] = &[
    (vk::VK_SHIFT, Key::LeftShift),
    (vk::VK_CONTROL, Key::LeftCtrl),
    (vk::VK_MENU, Key::LeftAlt),
];

impl Key {
    /// Symbolic key for a raw virtual key code; `Key::None` if unknown.
    pub fn from_vk(vk: u32) -> Key {
        let Ok(vk) = u16::try_from(vk) else {
            return Key::None;
        };
        KEY_TABLE
            .iter()
            .chain(GENERIC_MODIFIERS)
            .find(|(code, _)| *code == vk)
            .map(|(_, key)| *key)
            .unwrap_or(Key::None)
    }

    /// Virtual key code of this key, `0` for `Key::None`.
    pub fn vk(self) -> u16 {
        KEY_TABLE
            .iter()
            .find(|(_, key)| *key == self)
            .map(|(code, _)| *code)
            .unwrap_or(0)
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Key::LeftShift | Key::RightShift | Key::LeftCtrl | Key::RightCtrl | Key::LeftAlt | Key::RightAlt
        )
    }
}

impl fmt::Display for Key {
    /// Unset keys display as an empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::None => Ok(()),
            key => f.write_str(key.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key name: {0}")]
pub struct UnknownKey(pub String);

impl FromStr for Key {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "None" {
            return Ok(Key::None);
        }
        KEY_TABLE
            .iter()
            .map(|(_, key)| *key)
            .find(|key| key.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_roundtrip_for_table() {
        for (code, key) in KEY_TABLE {
            assert_eq!(Key::from_vk(*code as u32), *key, "vk {:02X}", code);
            assert_eq!(key.vk(), *code);
        }
    }

    #[test]
    fn test_generic_modifiers_resolve_left() {
        assert_eq!(Key::from_vk(0x10), Key::LeftShift);
        assert_eq!(Key::from_vk(0x11), Key::LeftCtrl);
        assert_eq!(Key::from_vk(0x12), Key::LeftAlt);
        // The canonical code stays the sided one.
        assert_eq!(Key::LeftShift.vk(), vk::VK_LSHIFT);
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(Key::from_vk(0x07), Key::None);
        assert_eq!(Key::from_vk(0x1_0000), Key::None);
        assert_eq!(Key::None.vk(), 0);
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(Key::None.to_string(), "");
        assert_eq!(Key::NumPad7.to_string(), "NumPad7");
        assert_eq!("numpad5".parse::<Key>(), Ok(Key::NumPad5));
        assert_eq!("".parse::<Key>(), Ok(Key::None));
        assert!("Hyper".parse::<Key>().is_err());
    }

    #[test]
    fn test_serde_uses_variant_names() {
        let json = serde_json::to_string(&Key::Enter).unwrap();
        assert_eq!(json, "\"Enter\"");
        let key: Key = serde_json::from_str("\"NumPad9\"").unwrap();
        assert_eq!(key, Key::NumPad9);
    }

    #[test]
    fn test_modifier_keys() {
        assert!(Key::RightAlt.is_modifier());
        assert!(!Key::LWin.is_modifier());
        assert!(!Key::Enter.is_modifier());
    }
}
