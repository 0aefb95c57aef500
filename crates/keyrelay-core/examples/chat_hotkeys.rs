//! Numpad hotkeys record when each enemy role's summoner spell comes back;
//! the send key types the return times still ahead into the game chat.
//!
//! Ctrl+Esc exits.

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use keyrelay_core::chat::{pending_returns, send_chat, ChatSettings, Hotkeys, Role, SPELL_COOLDOWN};
    use keyrelay_core::keyboard_hook::{current_thread_id, quit_event_loop, run_event_loop};
    use keyrelay_core::{win32, EngineConfig, Key, LayoutId};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tracing::{info, warn};

    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let hotkeys = Hotkeys::default();
    let settings = ChatSettings::default();
    let synth = win32::synthesizer(&config);
    let resolver = win32::layout_resolver(&config);

    let game_start = Instant::now();
    let returns: Arc<Mutex<HashMap<Role, Duration>>> = Arc::new(Mutex::new(HashMap::new()));
    let hook_thread = current_thread_id();

    let mut engine = win32::engine(&config);
    engine.on_key_down(move |ev| {
        if ev.key() == Key::Escape && ev.ctrl() {
            quit_event_loop(hook_thread);
            return;
        }
        if let Some(role) = hotkeys.role_for(ev.key()) {
            let back_at = game_start.elapsed() + SPELL_COOLDOWN;
            info!("{:?} back at {:?}", role, back_at);
            returns.lock().insert(role, back_at);
            ev.handled = true;
        } else if hotkeys.is_send(ev.key()) {
            ev.handled = true;
            let entries = pending_returns(&returns.lock(), game_start.elapsed());
            let Some(message) = settings.compose(&entries) else {
                return;
            };
            // Typing from inside the hook would re-enter it; hand off.
            let (synth, resolver) = (synth.clone(), resolver.clone());
            std::thread::spawn(move || {
                if !resolver.ensure_language(LayoutId::EN_US) {
                    warn!("Could not switch to en-US; typing with the current layout");
                }
                if let Err(e) = send_chat(&synth, &message, Duration::from_millis(30)) {
                    warn!("Failed to send chat message: {}", e);
                }
            });
        }
    });

    let guard = engine.guard()?;
    println!("Hotkeys active. Press Ctrl+Esc to exit.");
    run_event_loop();
    guard.release()?;
    Ok(())
}

#[cfg(not(windows))]
fn main() {
    eprintln!("This example needs Windows.");
}
