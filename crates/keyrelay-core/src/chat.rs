//! Helpers for consumers that post timing messages into a game chat.
//!
//! Settings arrive as plain values (hotkeys, role labels, a message
//! template). How they are stored is up to the caller.

use crate::error::Result;
use crate::input::InputSink;
use crate::key::Key;
use crate::layout::LayoutPlatform;
use crate::synth::Synthesizer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Top,
    Jungle,
    Mid,
    Adc,
    Support,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Top, Role::Jungle, Role::Mid, Role::Adc, Role::Support];
}

/// What a hotkey is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Role(Role),
    Send,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hotkeys {
    pub top: Key,
    pub jungle: Key,
    pub mid: Key,
    pub adc: Key,
    pub support: Key,
    pub send: Key,
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self {
            top: Key::NumPad7,
            jungle: Key::NumPad4,
            mid: Key::NumPad8,
            adc: Key::NumPad9,
            support: Key::NumPad6,
            send: Key::NumPad5,
        }
    }
}

impl Hotkeys {
    pub fn key_for(&self, role: Role) -> Key {
        match role {
            Role::Top => self.top,
            Role::Jungle => self.jungle,
            Role::Mid => self.mid,
            Role::Adc => self.adc,
            Role::Support => self.support,
        }
    }

    /// Role bound to `key`. Unset bindings never match.
    pub fn role_for(&self, key: Key) -> Option<Role> {
        if key == Key::None {
            return None;
        }
        Role::ALL.into_iter().find(|role| self.key_for(*role) == key)
    }

    pub fn is_send(&self, key: Key) -> bool {
        key != Key::None && key == self.send
    }

    /// Binds `key` to `target`. Bare modifier keys are refused.
    pub fn bind(&mut self, target: Binding, key: Key) -> bool {
        if key.is_modifier() {
            return false;
        }
        let slot = match target {
            Binding::Role(Role::Top) => &mut self.top,
            Binding::Role(Role::Jungle) => &mut self.jungle,
            Binding::Role(Role::Mid) => &mut self.mid,
            Binding::Role(Role::Adc) => &mut self.adc,
            Binding::Role(Role::Support) => &mut self.support,
            Binding::Send => &mut self.send,
        };
        *slot = key;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleLabels {
    pub top: String,
    pub jungle: String,
    pub mid: String,
    pub adc: String,
    pub support: String,
}

impl Default for RoleLabels {
    fn default() -> Self {
        Self {
            top: "top".to_string(),
            jungle: "jungle".to_string(),
            mid: "mid".to_string(),
            adc: "adc".to_string(),
            support: "support".to_string(),
        }
    }
}

impl RoleLabels {
    pub fn label(&self, role: Role) -> &str {
        match role {
            Role::Top => &self.top,
            Role::Jungle => &self.jungle,
            Role::Mid => &self.mid,
            Role::Adc => &self.adc,
            Role::Support => &self.support,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Literal the message starts with.
    pub before_text: String,
    /// Per-entry text; `{role}` and `{time}` are substituted.
    pub template: String,
    pub labels: RoleLabels,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            before_text: "flash".to_string(),
            template: "{role} {time}".to_string(),
            labels: RoleLabels::default(),
        }
    }
}

impl ChatSettings {
    /// Builds the chat line for `entries` (role, time since game start).
    /// Returns `None` when there is nothing to report.
    pub fn compose(&self, entries: &[(Role, Duration)]) -> Option<String> {
        if entries.is_empty() {
            return None;
        }
        let mut message = self.before_text.clone();
        for (role, at) in entries {
            let part = self
                .template
                .replace("{role}", self.labels.label(*role))
                .replace("{time}", &format_clock(*at));
            message.push(' ');
            message.push_str(&part);
        }
        Some(message)
    }
}

/// How long a summoner spell stays down after use.
pub const SPELL_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Entries for [`ChatSettings::compose`]: one per role whose spell comes
/// back after `now`, in role order. `returns` holds return times on the game
/// clock; a role used twice keeps only its latest return time.
pub fn pending_returns(returns: &HashMap<Role, Duration>, now: Duration) -> Vec<(Role, Duration)> {
    Role::ALL
        .into_iter()
        .filter_map(|role| {
            let at = *returns.get(&role)?;
            (at > now).then_some((role, at))
        })
        .collect()
}

/// `mm:ss`, minutes taken modulo one hour.
pub fn format_clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", (secs / 60) % 60, secs % 60)
}

/// Opens chat, types `message` with physical keys and sends it.
pub fn send_chat<S: InputSink, L: LayoutPlatform>(
    synth: &Synthesizer<S, L>,
    message: &str,
    pause: Duration,
) -> Result<()> {
    synth.key_press(Key::Enter)?;
    pause_for(pause);
    synth.type_text_physical(message)?;
    pause_for(pause);
    synth.key_press(Key::Enter)?;
    info!("sent: {}", message);
    Ok(())
}

fn pause_for(pause: Duration) {
    if !pause.is_zero() {
        std::thread::sleep(pause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputRecord;
    use crate::mock::{RecordingSink, ScriptedLayouts};

    #[test]
    fn test_default_bindings() {
        let hotkeys = Hotkeys::default();
        assert_eq!(hotkeys.role_for(Key::NumPad8), Some(Role::Mid));
        assert_eq!(hotkeys.role_for(Key::NumPad5), None);
        assert!(hotkeys.is_send(Key::NumPad5));
        assert!(!hotkeys.is_send(Key::Enter));
    }

    #[test]
    fn test_unset_bindings_never_match() {
        let mut hotkeys = Hotkeys::default();
        assert!(hotkeys.bind(Binding::Role(Role::Top), Key::None));
        assert!(hotkeys.bind(Binding::Send, Key::None));
        assert_eq!(hotkeys.role_for(Key::None), None);
        assert!(!hotkeys.is_send(Key::None));
    }

    #[test]
    fn test_bind_refuses_modifiers() {
        let mut hotkeys = Hotkeys::default();
        assert!(!hotkeys.bind(Binding::Role(Role::Adc), Key::LeftShift));
        assert_eq!(hotkeys.adc, Key::NumPad9);
        assert!(hotkeys.bind(Binding::Role(Role::Adc), Key::F6));
        assert_eq!(hotkeys.role_for(Key::F6), Some(Role::Adc));
    }

    #[test]
    fn test_hotkeys_from_partial_json() {
        let hotkeys: Hotkeys = serde_json::from_str(r#"{ "send": "Enter" }"#).unwrap();
        assert_eq!(hotkeys.send, Key::Enter);
        assert_eq!(hotkeys.top, Key::NumPad7);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::from_secs(0)), "00:00");
        assert_eq!(format_clock(Duration::from_secs(125)), "02:05");
        assert_eq!(format_clock(Duration::from_millis(59_999)), "00:59");
        assert_eq!(format_clock(Duration::from_secs(3_605)), "00:05");
    }

    #[test]
    fn test_compose() {
        let settings = ChatSettings::default();
        assert_eq!(settings.compose(&[]), None);
        let message = settings
            .compose(&[
                (Role::Top, Duration::from_secs(431)),
                (Role::Support, Duration::from_secs(612)),
            ])
            .unwrap();
        assert_eq!(message, "flash top 07:11 support 10:12");
    }

    #[test]
    fn test_compose_custom_template() {
        let settings = ChatSettings {
            before_text: "no flash:".to_string(),
            template: "{role}@{time}".to_string(),
            labels: RoleLabels {
                mid: "MID".to_string(),
                ..RoleLabels::default()
            },
        };
        let message = settings.compose(&[(Role::Mid, Duration::from_secs(60))]).unwrap();
        assert_eq!(message, "no flash: MID@01:00");
    }

    #[test]
    fn test_pending_returns_in_role_order() {
        let mut returns = HashMap::new();
        returns.insert(Role::Support, Duration::from_secs(400));
        returns.insert(Role::Top, Duration::from_secs(350));
        returns.insert(Role::Mid, Duration::from_secs(100));

        let now = Duration::from_secs(120);
        assert_eq!(
            pending_returns(&returns, now),
            vec![
                (Role::Top, Duration::from_secs(350)),
                (Role::Support, Duration::from_secs(400)),
            ]
        );
        assert!(pending_returns(&returns, Duration::from_secs(400)).is_empty());
    }

    #[test]
    fn test_repeat_use_reports_latest_return() {
        let mut returns = HashMap::new();
        returns.insert(Role::Adc, Duration::from_secs(10) + SPELL_COOLDOWN);
        returns.insert(Role::Adc, Duration::from_secs(70) + SPELL_COOLDOWN);

        let entries = pending_returns(&returns, Duration::from_secs(80));
        let message = ChatSettings::default().compose(&entries).unwrap();
        assert_eq!(message, "flash adc 06:10");
    }

    #[test]
    fn test_send_chat_sequence() {
        let sink = RecordingSink::new();
        let synth = Synthesizer::new(sink.clone(), ScriptedLayouts::us_english());
        send_chat(&synth, "Go", Duration::ZERO).unwrap();

        let enter_down = InputRecord::ScanDown { scan: 0x1C, extended: false };
        let enter_up = InputRecord::ScanUp { scan: 0x1C, extended: false };
        let records = sink.records();
        assert_eq!(&records[..2], &[enter_down, enter_up]);
        assert_eq!(&records[records.len() - 2..], &[enter_down, enter_up]);
        // Shift + G, then o.
        assert_eq!(records.len(), 2 + 4 + 2 + 2);
    }
}
