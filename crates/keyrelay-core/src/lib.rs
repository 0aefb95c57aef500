pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod hook;
pub mod input;
pub mod key;
pub mod layout;
pub mod mock;
pub mod probe;
pub mod synth;
pub mod types;

#[cfg(windows)]
pub mod keyboard_hook;
#[cfg(windows)]
pub mod win32;

pub use config::EngineConfig;
pub use engine::{HookGuard, KeyboardEngine};
pub use error::{Error, Result};
pub use hook::{Dispatcher, HookBackend, HookChain, SubscriptionId};
pub use input::{InputRecord, InputSink};
pub use key::Key;
pub use layout::{LayoutPlatform, LayoutResolver};
pub use probe::KeyStateProbe;
pub use synth::Synthesizer;
pub use types::{KeyEdge, KeyEvent, LayoutId, Modifiers, ObservedKey};
