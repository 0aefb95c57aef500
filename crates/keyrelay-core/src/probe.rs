use crate::types::{ModifierKind, Modifiers};

/// Instantaneous key state query.
///
/// Implementations must not generate input or block: the probe is called
/// from inside the hook callback.
pub trait KeyStateProbe: Send {
    fn is_key_down(&self, vk: u16) -> bool;
}

impl<P: KeyStateProbe + Sync> KeyStateProbe for std::sync::Arc<P> {
    fn is_key_down(&self, vk: u16) -> bool {
        (**self).is_key_down(vk)
    }
}

/// A modifier counts as active when the generic key or either sided variant
/// reports pressed.
pub fn is_modifier_active(probe: &dyn KeyStateProbe, kind: ModifierKind) -> bool {
    kind.virtual_keys().iter().any(|&vk| probe.is_key_down(vk))
}

pub fn modifiers(probe: &dyn KeyStateProbe) -> Modifiers {
    Modifiers {
        ctrl: is_modifier_active(probe, ModifierKind::Ctrl),
        shift: is_modifier_active(probe, ModifierKind::Shift),
        alt: is_modifier_active(probe, ModifierKind::Alt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::vk;
    use crate::mock::MockKeyState;

    #[test]
    fn test_nothing_pressed() {
        let probe = MockKeyState::new();
        assert_eq!(modifiers(&probe), Modifiers::none());
    }

    #[test]
    fn test_sided_variants_count() {
        let probe = MockKeyState::new();
        probe.press(vk::VK_RCONTROL);
        assert!(is_modifier_active(&probe, ModifierKind::Ctrl));
        assert!(!is_modifier_active(&probe, ModifierKind::Shift));

        probe.release(vk::VK_RCONTROL);
        probe.press(vk::VK_LSHIFT);
        probe.press(vk::VK_MENU);
        let mods = modifiers(&probe);
        assert!(!mods.ctrl);
        assert!(mods.shift);
        assert!(mods.alt);
    }

    #[test]
    fn test_unrelated_keys_ignored() {
        let probe = MockKeyState::new();
        probe.press(vk::VK_LWIN);
        probe.press(vk::VK_RETURN);
        assert!(modifiers(&probe).is_empty());
    }
}
