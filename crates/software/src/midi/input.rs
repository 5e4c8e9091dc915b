//! Provides [`MidiInputAdapter`], which turns bytes received on the MIDI input into queued events.

use super::MidiMessageParser;
use crate::configuration::Mode;
use crate::event::{EventQueue, QueueFull};

/// Feeds the bytes of a serial MIDI input through a [`MidiMessageParser`] and enqueues the resulting events.
///
/// The adapter owns its parser, so parsing state never leaves the input's execution context. While disabled, bytes are
/// discarded unread; enabling or disabling the input resets the parser so no stale running status survives a mode
/// switch.
#[derive(Debug, Default)]
pub struct MidiInputAdapter {
    enabled: bool,
    parser: MidiMessageParser,
}

impl MidiInputAdapter {
    /// Constructs a disabled adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts or stops accepting bytes.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            info!("MIDI input {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
        self.parser.reset();
    }

    /// Enables the input in [`Mode::MidiIn`] and disables it otherwise.
    pub fn apply_mode(&mut self, mode: Mode) {
        self.set_enabled(mode.accepts_midi());
    }

    /// Returns `true` if bytes are currently being decoded.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decodes a byte and enqueues the resulting event, if any, waiting for room in the queue when it is full.
    pub async fn handle_byte<const N: usize>(&mut self, byte: u8, queue: &EventQueue<N>) {
        if !self.enabled {
            return;
        }
        if let Some(event) = self.parser.parse(byte) {
            queue.put(event).await;
        }
    }

    /// Decodes a byte and enqueues the resulting event, if any, without ever waiting.
    ///
    /// Intended for contexts which must not stall, such as a receive interrupt. When the queue is full the event is
    /// dropped and returned inside the error so the caller can count or report it.
    pub fn try_handle_byte<const N: usize>(
        &mut self,
        byte: u8,
        queue: &EventQueue<N>,
    ) -> Result<(), QueueFull> {
        if !self.enabled {
            return Ok(());
        }
        match self.parser.parse(byte) {
            Some(event) => queue.try_put(event).inspect_err(|_| {
                warn!("Event queue full, dropping MIDI input event");
            }),
            None => Ok(()),
        }
    }
}
