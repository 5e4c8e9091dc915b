//! This crate contains architecture-agnostic logic for the OPL Jukebox, a device which drives the nine voices of a
//! Yamaha [OPL2](https://en.wikipedia.org/wiki/Yamaha_OPL#OPL2) FM synthesis chip from either a song stored in flash or a
//! live [MIDI](https://midi.org/midi-1-0) input.
//!
//! Producers (the [song scheduler][song::SongScheduler] and the [MIDI input adapter][midi::MidiInputAdapter]) turn their
//! input into [`SongEvent`][event::SongEvent]s and push them through the bounded [`EventQueue`][event::EventQueue]. The
//! [`SynthesisEngine`][synth::SynthesisEngine] is the sole consumer: it owns voice allocation and program assignment and
//! is the only code which talks to the synthesizer.

#![deny(missing_docs)]
#![no_std]

// must come first so the logging macros are visible in the modules below
mod fmt;

pub mod configuration;

/// The event type shared by every producer and the consumer, and the queue which carries it between them.
pub mod event;

/// Decoding of raw MIDI byte streams into events.
pub mod midi;

/// Playback of stored songs.
pub mod song;

/// Voice allocation, instrument state and the synthesis engine driving the OPL2.
pub mod synth;
