use crate::error::{Error, Result};
use crate::input::{is_extended_key, unicode_batch, unicode_tap, InputRecord, InputSink};
use crate::key::{vk, Key};
use crate::layout::LayoutPlatform;
use crate::types::KeyEdge;
use tracing::{debug, trace, warn};

/// Builds synthetic keyboard input and submits it through an [`InputSink`].
///
/// Two strategies are offered. Unicode injection (`type_text`, `type_char`)
/// works with any layout but is invisible to programs that read scan codes.
/// Scan-code injection (`send_key_*`, `type_text_physical`) looks like a
/// physical keyboard and follows the active layout.
#[derive(Debug, Clone)]
pub struct Synthesizer<S, L> {
    sink: S,
    layouts: L,
}

impl<S: InputSink, L: LayoutPlatform> Synthesizer<S, L> {
    pub fn new(sink: S, layouts: L) -> Self {
        Self { sink, layouts }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn layouts(&self) -> &L {
        &self.layouts
    }

    /// Types `text` as Unicode characters in one batch.
    pub fn type_text(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.submit("SendInput (TypeText)", &unicode_batch(text))
    }

    pub fn type_char(&self, ch: char) -> Result<()> {
        let mut buf = [0u16; 2];
        let batch: Vec<InputRecord> = ch
            .encode_utf16(&mut buf)
            .iter()
            .flat_map(|unit| unicode_tap(*unit))
            .collect();
        self.submit("SendInput (TypeChar)", &batch)
    }

    pub fn send_key_down(&self, virtual_key: u16) -> Result<()> {
        let record = self.scan_record(virtual_key, KeyEdge::Down);
        self.submit("SendInput (KeyDown)", &[record])
    }

    pub fn send_key_up(&self, virtual_key: u16) -> Result<()> {
        let record = self.scan_record(virtual_key, KeyEdge::Up);
        self.submit("SendInput (KeyUp)", &[record])
    }

    pub fn send_key_press(&self, virtual_key: u16) -> Result<()> {
        self.send_key_down(virtual_key)?;
        self.send_key_up(virtual_key)
    }

    pub fn key_down(&self, key: Key) -> Result<()> {
        self.send_key_down(key.vk())
    }

    pub fn key_up(&self, key: Key) -> Result<()> {
        self.send_key_up(key.vk())
    }

    pub fn key_press(&self, key: Key) -> Result<()> {
        self.send_key_press(key.vk())
    }

    /// Types `text` key by key using scan codes of the foreground window's
    /// layout.
    ///
    /// Each character goes out as one batch. Characters the layout cannot
    /// produce are typed as Unicode instead. A required Shift is pressed
    /// around the key inside the same batch, and released again if the batch
    /// fails. Required Ctrl or Alt is dropped so chat text never fires
    /// application shortcuts; characters that genuinely need AltGr on a
    /// layout come out wrong.
    pub fn type_text_physical(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let layout = self.layouts.foreground_layout();
        debug!(
            "Typing {} chars physically with layout {}",
            text.chars().count(),
            layout.language()
        );

        for unit in text.encode_utf16() {
            let Some(mapping) = self.layouts.char_to_virtual_key(unit, layout) else {
                trace!("No key for U+{:04X}, using unicode", unit);
                self.submit("SendInput (TypeChar)", &unicode_tap(unit))?;
                continue;
            };

            let key = u16::from(mapping.vk);
            let mut group = Vec::with_capacity(4);
            if mapping.shift {
                group.push(self.scan_record(vk::VK_SHIFT, KeyEdge::Down));
            }
            group.push(self.scan_record(key, KeyEdge::Down));
            group.push(self.scan_record(key, KeyEdge::Up));
            if mapping.shift {
                group.push(self.scan_record(vk::VK_SHIFT, KeyEdge::Up));
            }

            if let Err(e) = self.submit("SendInput (TypeTextPhysical)", &group) {
                if mapping.shift {
                    self.release_shift();
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Best effort: a partly accepted batch may have left Shift down.
    fn release_shift(&self) {
        if let Err(e) = self.send_key_up(vk::VK_SHIFT) {
            warn!("Failed to release Shift after a failed batch: {}", e);
        }
    }

    /// Scan-code record for `virtual_key`, translated with the calling
    /// thread's current layout.
    fn scan_record(&self, virtual_key: u16, edge: KeyEdge) -> InputRecord {
        let layout = self.layouts.thread_layout(0);
        let scan = self.layouts.virtual_key_to_scan_code(virtual_key, layout);
        InputRecord::scan(scan, is_extended_key(virtual_key), edge)
    }

    fn submit(&self, op: &'static str, batch: &[InputRecord]) -> Result<()> {
        let expected = batch.len() as u32;
        let sent = self.sink.send(batch);
        if sent != expected {
            return Err(Error::Injection {
                op,
                sent,
                expected,
                code: self.sink.last_error_code(),
            });
        }
        trace!("{}: {} records", op, sent);
        Ok(())
    }
}
