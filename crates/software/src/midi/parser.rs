//! Provides [`MidiMessageParser`], an incremental decoder for the byte stream arriving on a serial MIDI input.

use crate::event::{Delay, SongEvent};
use tinyvec::ArrayVec;
use wmidi::MidiMessage;

/// Recovers channel messages from a raw MIDI byte stream, one byte at a time.
///
/// The parser is either idle (no running status) or collecting data bytes for the last channel status byte seen.
/// Running status is honored: once a message completes, further data bytes start a new message with the same status.
///
/// The stream is treated leniently. Data bytes without a running status, system messages (which also cancel running
/// status), and messages cut short by a new status byte are all dropped without complaint, as real MIDI streams routinely
/// contain such artifacts.
///
/// Only the messages the synthesizer acts upon produce a [`SongEvent`]:
///
/// | Message                       | Event                                 |
/// |-------------------------------|---------------------------------------|
/// | Note Off                      | [`NoteOff`][crate::event::EventKind::NoteOff] |
/// | Note On, velocity 0           | [`NoteOff`][crate::event::EventKind::NoteOff] |
/// | Note On                       | [`NoteOn`][crate::event::EventKind::NoteOn] with the message's velocity |
/// | Program Change                | [`ProgramChange`][crate::event::EventKind::ProgramChange] |
///
/// Live input is never time-shifted, so every event carries [`Delay::NONE`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MidiMessageParser {
    /// The last channel status byte received, if it has not been cancelled by a system message.
    running_status: Option<u8>,
    /// Data bytes collected so far for the message in progress.
    data: ArrayVec<[u8; 2]>,
}

impl MidiMessageParser {
    /// Constructs an idle parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets running status and any partially received message, e.g., when the input is (re)enabled.
    pub fn reset(&mut self) {
        self.running_status = None;
        self.data.clear();
    }

    /// Consumes one byte of the stream, returning an event if the byte completed a message of interest.
    pub fn parse(&mut self, byte: u8) -> Option<SongEvent> {
        if byte & 0x80 != 0 {
            if byte >= 0xF0 {
                trace!("Dropping system message status byte {=u8:#x}", byte);
                self.reset();
            } else {
                if !self.data.is_empty() {
                    trace!("Discarding incomplete message for status {}", self.running_status);
                }
                self.running_status = Some(byte);
                self.data.clear();
            }
            return None;
        }

        let Some(status) = self.running_status else {
            trace!("Dropping data byte {=u8} received without running status", byte);
            return None;
        };

        self.data.push(byte);
        if self.data.len() < expected_data_bytes(status) {
            return None;
        }

        let mut frame = [status, 0, 0];
        frame[1..=self.data.len()].copy_from_slice(&self.data);
        let frame_len = 1 + self.data.len();
        // running status is kept so the next data byte starts a fresh message
        self.data.clear();

        decode(&frame[..frame_len])
    }
}

/// Program Change and Channel Pressure carry a single data byte, every other channel message carries two.
fn expected_data_bytes(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        _ => 2,
    }
}

fn decode(frame: &[u8]) -> Option<SongEvent> {
    match MidiMessage::from_bytes(frame) {
        Ok(MidiMessage::NoteOff(channel, note, _)) => Some(SongEvent::note_off(
            Delay::NONE,
            channel.index(),
            u8::from(note),
        )),
        Ok(MidiMessage::NoteOn(channel, note, velocity)) => match u8::from(velocity) {
            0 => Some(SongEvent::note_off(
                Delay::NONE,
                channel.index(),
                u8::from(note),
            )),
            velocity => Some(SongEvent::note_on(
                Delay::NONE,
                channel.index(),
                u8::from(note),
                velocity,
            )),
        },
        Ok(MidiMessage::ProgramChange(channel, program)) => Some(SongEvent::program_change(
            Delay::NONE,
            channel.index(),
            u8::from(program),
        )),
        Ok(_) => {
            trace!("Dropping unsupported channel message {=[u8]:#x}", frame);
            None
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn feed(parser: &mut MidiMessageParser, bytes: &[u8]) -> Option<SongEvent> {
        let mut last = None;
        for &byte in bytes {
            last = parser.parse(byte);
        }
        last
    }

    #[test]
    fn note_on_completes_on_second_data_byte() {
        let mut parser = MidiMessageParser::new();
        assert_eq!(None, parser.parse(0x90));
        assert_eq!(None, parser.parse(60));
        assert_eq!(
            Some(SongEvent::note_on(Delay::NONE, 0, 60, 100)),
            parser.parse(100),
            "Expected left but got right"
        );
    }

    #[test]
    fn running_status_reuses_last_status() {
        let mut parser = MidiMessageParser::new();
        assert_eq!(
            Some(SongEvent::note_on(Delay::NONE, 0, 60, 100)),
            feed(&mut parser, &[0x90, 60, 100])
        );
        assert_eq!(None, parser.parse(64));
        assert_eq!(
            Some(SongEvent::note_on(Delay::NONE, 0, 64, 90)),
            parser.parse(90),
            "Expected left but got right"
        );
    }

    #[test]
    fn zero_velocity_note_on_is_note_off() {
        let mut parser = MidiMessageParser::new();
        let event = feed(&mut parser, &[0x93, 62, 0]).unwrap();
        assert_eq!(EventKind::NoteOff, event.kind);
        assert_eq!(SongEvent::note_off(Delay::NONE, 3, 62), event);
    }

    #[test]
    fn note_off_ignores_release_velocity() {
        let mut parser = MidiMessageParser::new();
        assert_eq!(
            Some(SongEvent::note_off(Delay::NONE, 9, 36)),
            feed(&mut parser, &[0x89, 36, 64]),
            "Expected left but got right"
        );
    }

    #[test]
    fn program_change_has_one_data_byte() {
        let mut parser = MidiMessageParser::new();
        assert_eq!(None, parser.parse(0xC5));
        assert_eq!(
            Some(SongEvent::program_change(Delay::NONE, 5, 30)),
            parser.parse(30),
            "Expected left but got right"
        );
        // running status applies to single-byte messages too
        assert_eq!(
            Some(SongEvent::program_change(Delay::NONE, 5, 31)),
            parser.parse(31)
        );
    }

    #[test]
    fn channel_pressure_is_consumed_but_dropped() {
        let mut parser = MidiMessageParser::new();
        assert_eq!(None, feed(&mut parser, &[0xD0, 100]));
        // the single data byte completed the message, so the next byte starts a new one
        assert_eq!(None, parser.parse(90));
        assert_eq!(
            Some(SongEvent::note_on(Delay::NONE, 0, 60, 1)),
            feed(&mut parser, &[0x90, 60, 1])
        );
    }

    #[test]
    fn control_change_and_pitch_bend_are_dropped() {
        let mut parser = MidiMessageParser::new();
        assert_eq!(None, feed(&mut parser, &[0xB0, 7, 100]));
        assert_eq!(None, feed(&mut parser, &[0xE0, 0, 64]));
        assert_eq!(None, feed(&mut parser, &[0xA0, 60, 10]));
    }

    #[test]
    fn data_without_running_status_is_dropped() {
        let mut parser = MidiMessageParser::new();
        assert_eq!(None, feed(&mut parser, &[60, 100, 64, 90]));
        assert_eq!(MidiMessageParser::new(), parser);
    }

    #[test]
    fn system_message_cancels_running_status() {
        let mut parser = MidiMessageParser::new();
        feed(&mut parser, &[0x90, 60, 100]);
        assert_eq!(None, parser.parse(0xF8));
        assert_eq!(None, feed(&mut parser, &[64, 90]));
    }

    #[test]
    fn new_status_discards_partial_message() {
        let mut parser = MidiMessageParser::new();
        assert_eq!(None, feed(&mut parser, &[0x90, 60]));
        assert_eq!(None, parser.parse(0x81));
        assert_eq!(
            Some(SongEvent::note_off(Delay::NONE, 1, 67)),
            feed(&mut parser, &[67, 0]),
            "Expected left but got right"
        );
    }

    #[test]
    fn reset_forgets_running_status() {
        let mut parser = MidiMessageParser::new();
        feed(&mut parser, &[0x90, 60]);
        parser.reset();
        assert_eq!(MidiMessageParser::new(), parser);
        assert_eq!(None, feed(&mut parser, &[100, 64, 90]));
    }
}
