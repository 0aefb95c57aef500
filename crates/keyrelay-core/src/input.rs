//! Synthetic input records and the sink that delivers them.
//!
//! Records are plain values here. Only the platform sink turns them into the
//! OS input structure, so everything above it can be checked without an OS.

use crate::key::vk;
use crate::types::KeyEdge;

/// `KEYBDINPUT.dwFlags` bits.
pub const KEYEVENTF_EXTENDEDKEY: u32 = 0x0001;
pub const KEYEVENTF_KEYUP: u32 = 0x0002;
pub const KEYEVENTF_UNICODE: u32 = 0x0004;
pub const KEYEVENTF_SCANCODE: u32 = 0x0008;

/// One keyboard record of a synthetic input batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputRecord {
    /// UTF-16 code unit, pressed.
    UnicodeDown(u16),
    /// UTF-16 code unit, released.
    UnicodeUp(u16),
    ScanDown { scan: u16, extended: bool },
    ScanUp { scan: u16, extended: bool },
}

impl InputRecord {
    pub const fn unicode(unit: u16, edge: KeyEdge) -> Self {
        match edge {
            KeyEdge::Down => InputRecord::UnicodeDown(unit),
            KeyEdge::Up => InputRecord::UnicodeUp(unit),
        }
    }

    pub const fn scan(scan: u16, extended: bool, edge: KeyEdge) -> Self {
        match edge {
            KeyEdge::Down => InputRecord::ScanDown { scan, extended },
            KeyEdge::Up => InputRecord::ScanUp { scan, extended },
        }
    }

    /// Code unit or scan code carried by the record.
    pub const fn payload(&self) -> u16 {
        match *self {
            InputRecord::UnicodeDown(unit) | InputRecord::UnicodeUp(unit) => unit,
            InputRecord::ScanDown { scan, .. } | InputRecord::ScanUp { scan, .. } => scan,
        }
    }

    pub const fn is_unicode(&self) -> bool {
        matches!(self, InputRecord::UnicodeDown(_) | InputRecord::UnicodeUp(_))
    }

    pub const fn is_key_up(&self) -> bool {
        matches!(self, InputRecord::UnicodeUp(_) | InputRecord::ScanUp { .. })
    }

    pub const fn is_extended(&self) -> bool {
        matches!(
            self,
            InputRecord::ScanDown { extended: true, .. } | InputRecord::ScanUp { extended: true, .. }
        )
    }

    /// `dwFlags` value for this record.
    pub const fn flags(&self) -> u32 {
        let mut flags = if self.is_unicode() {
            KEYEVENTF_UNICODE
        } else {
            KEYEVENTF_SCANCODE
        };
        if self.is_extended() {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }
        if self.is_key_up() {
            flags |= KEYEVENTF_KEYUP;
        }
        flags
    }
}

/// Keys whose scan code is shared with a numeric keypad key and therefore
/// need `KEYEVENTF_EXTENDEDKEY` when injected by scan code.
pub const fn is_extended_key(virtual_key: u16) -> bool {
    matches!(
        virtual_key,
        vk::VK_PRIOR
            | vk::VK_NEXT
            | vk::VK_END
            | vk::VK_HOME
            | vk::VK_LEFT
            | vk::VK_UP
            | vk::VK_RIGHT
            | vk::VK_DOWN
            | vk::VK_INSERT
            | vk::VK_DELETE
            | vk::VK_LWIN
            | vk::VK_RWIN
            | vk::VK_APPS
            | vk::VK_DIVIDE
            | vk::VK_RCONTROL
            | vk::VK_RMENU
    )
}

/// Down and up records for one code unit.
pub const fn unicode_tap(unit: u16) -> [InputRecord; 2] {
    [InputRecord::UnicodeDown(unit), InputRecord::UnicodeUp(unit)]
}

/// Down/up pairs for every UTF-16 code unit of `text`, in order.
pub fn unicode_batch(text: &str) -> Vec<InputRecord> {
    text.encode_utf16().flat_map(unicode_tap).collect()
}

/// Receives synthetic input batches.
pub trait InputSink {
    /// Submits `batch` in a single call and returns how many records were
    /// accepted.
    fn send(&self, batch: &[InputRecord]) -> u32;

    /// Platform error code for the last submission that fell short.
    fn last_error_code(&self) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENDED: [u16; 16] = [
        0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, 0x2D, 0x2E, 0x5B, 0x5C, 0x5D, 0x6F, 0xA3,
        0xA5,
    ];

    #[test]
    fn test_extended_table_is_exact() {
        for code in 0..=0xFFu16 {
            assert_eq!(
                is_extended_key(code),
                EXTENDED.contains(&code),
                "vk {:02X}",
                code
            );
        }
    }

    #[test]
    fn test_left_variants_are_not_extended() {
        assert!(!is_extended_key(vk::VK_LCONTROL));
        assert!(!is_extended_key(vk::VK_LMENU));
        assert!(!is_extended_key(vk::VK_RETURN));
        assert!(!is_extended_key(vk::VK_NUMPAD0));
    }

    #[test]
    fn test_unicode_batch_pairs_every_unit() {
        let records = unicode_batch("héllo");
        assert_eq!(records.len(), 10);
        for (pair, unit) in records.chunks(2).zip("héllo".encode_utf16()) {
            assert_eq!(pair, &unicode_tap(unit));
        }
    }

    #[test]
    fn test_unicode_batch_splits_surrogates() {
        let records = unicode_batch("😀");
        assert_eq!(
            records,
            vec![
                InputRecord::UnicodeDown(0xD83D),
                InputRecord::UnicodeUp(0xD83D),
                InputRecord::UnicodeDown(0xDE00),
                InputRecord::UnicodeUp(0xDE00),
            ]
        );
    }

    #[test]
    fn test_flags() {
        assert_eq!(InputRecord::UnicodeDown(0x41).flags(), KEYEVENTF_UNICODE);
        assert_eq!(
            InputRecord::UnicodeUp(0x41).flags(),
            KEYEVENTF_UNICODE | KEYEVENTF_KEYUP
        );
        assert_eq!(
            InputRecord::scan(0x4B, true, KeyEdge::Up).flags(),
            KEYEVENTF_SCANCODE | KEYEVENTF_EXTENDEDKEY | KEYEVENTF_KEYUP
        );
        assert_eq!(
            InputRecord::scan(0x1C, false, KeyEdge::Down).flags(),
            KEYEVENTF_SCANCODE
        );
    }
}
