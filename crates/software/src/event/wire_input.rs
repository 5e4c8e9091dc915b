//! Provides [`WireInputAdapter`], which assembles events sent by an external controller in their wire format.

use super::{EventQueue, SongEvent, WIRE_SIZE};
use crate::configuration::Mode;
use tinyvec::ArrayVec;

/// Collects bytes into [`WIRE_SIZE`]-byte frames, decodes each complete frame with [`SongEvent::from_bytes`] and
/// enqueues the result.
///
/// Frames which fail to decode are logged and dropped. The link carries no framing of its own, so any partial frame is
/// discarded whenever the input is enabled or disabled.
#[derive(Debug, Default)]
pub struct WireInputAdapter {
    enabled: bool,
    frame: ArrayVec<[u8; WIRE_SIZE]>,
}

impl WireInputAdapter {
    /// Constructs a disabled adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts or stops accepting bytes.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            info!("Wire input {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
        self.frame.clear();
    }

    /// Enables the input in [`Mode::MidiIn`], alongside the MIDI input, and disables it otherwise.
    pub fn apply_mode(&mut self, mode: Mode) {
        self.set_enabled(mode.accepts_midi());
    }

    /// Returns `true` if bytes are currently being collected.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of bytes of the current frame received so far.
    pub fn pending(&self) -> usize {
        self.frame.len()
    }

    /// Adds a byte to the current frame and, once it is complete, enqueues the decoded event, waiting for room in the
    /// queue when it is full.
    pub async fn handle_byte<const N: usize>(&mut self, byte: u8, queue: &EventQueue<N>) {
        if !self.enabled {
            return;
        }
        if let Some(event) = self.accept(byte) {
            queue.put(event).await;
        }
    }

    fn accept(&mut self, byte: u8) -> Option<SongEvent> {
        self.frame.push(byte);
        if self.frame.len() < WIRE_SIZE {
            return None;
        }
        let bytes = core::mem::take(&mut self.frame).into_inner();
        SongEvent::from_bytes(bytes)
            .inspect_err(|err| warn!("Dropping wire frame: {}", err))
            .ok()
    }
}
