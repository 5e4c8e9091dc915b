use embassy_time::Duration;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

mod queue;
pub use queue::*;

mod wire_input;
pub use wire_input::*;

/// The MIDI channel (zero-indexed) reserved for percussion, i.e., General MIDI channel 10.
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Number of bytes in the wire representation of a [`SongEvent`].
pub const WIRE_SIZE: usize = 6;

/// What a [`SongEvent`] asks the synthesis engine to do.
///
/// The discriminants double as the kind byte of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ToPrimitive, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EventKind {
    /// Silence the voice playing `note_or_program` on `channel`, if any.
    NoteOff = 0,
    /// Sound `note_or_program` on `channel` at `velocity`.
    NoteOn = 1,
    /// Silence every voice and forget all voice assignments. Carries no channel or note.
    ///
    /// In a stored song, a record of this kind marks the end of the sequence rather than a real reset.
    Reset = 2,
    /// Assign program `note_or_program` to `channel`.
    ProgramChange = 3,
}

/// How long to wait before acting on a [`SongEvent`], relative to when the previous event was acted upon.
///
/// A duration, never a timestamp. The wire format stores it as 16 bits of milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Delay(u16);

impl Delay {
    /// No wait at all; every event decoded from live MIDI input carries this.
    pub const NONE: Self = Self(0);

    /// Constructs a [`Delay`] from a number of milliseconds.
    pub const fn from_millis(millis: u16) -> Self {
        Self(millis)
    }

    /// Returns the delay in milliseconds.
    pub const fn as_millis(&self) -> u16 {
        self.0
    }

    /// Returns `true` if the event should be acted upon immediately.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<Delay> for Duration {
    fn from(delay: Delay) -> Self {
        Duration::from_millis(u64::from(delay.0))
    }
}

/// The single fixed-size event record exchanged between every producer and the synthesis engine.
///
/// Songs are stored as ordered slices of these, the MIDI input adapter produces them from decoded messages, and the
/// [`EventQueue`] carries them between execution contexts by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SongEvent {
    /// What to do.
    pub kind: EventKind,
    /// How long to wait before doing it.
    pub delay: Delay,
    /// Zero-indexed MIDI channel.
    pub channel: u8,
    /// The MIDI note for note events, the program number for program changes.
    pub note_or_program: u8,
    /// Note-on velocity; zero for every other kind.
    pub velocity: u8,
}

impl SongEvent {
    /// Constructs a note-on event.
    pub const fn note_on(delay: Delay, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            kind: EventKind::NoteOn,
            delay,
            channel,
            note_or_program: note,
            velocity,
        }
    }

    /// Constructs a note-off event.
    pub const fn note_off(delay: Delay, channel: u8, note: u8) -> Self {
        Self {
            kind: EventKind::NoteOff,
            delay,
            channel,
            note_or_program: note,
            velocity: 0,
        }
    }

    /// Constructs a program change event.
    pub const fn program_change(delay: Delay, channel: u8, program: u8) -> Self {
        Self {
            kind: EventKind::ProgramChange,
            delay,
            channel,
            note_or_program: program,
            velocity: 0,
        }
    }

    /// Constructs a reset event; also used as the end-of-sequence marker of a stored song.
    pub const fn reset() -> Self {
        Self {
            kind: EventKind::Reset,
            delay: Delay::NONE,
            channel: 0,
            note_or_program: 0,
            velocity: 0,
        }
    }

    /// Encodes the event as `[kind, delay_hi, delay_lo, channel, note_or_program, velocity]`.
    ///
    /// This is the framing used when events arrive from an external controller, one byte at a time; see
    /// [`WireInputAdapter`].
    pub fn to_bytes(&self) -> [u8; WIRE_SIZE] {
        let [delay_hi, delay_lo] = self.delay.as_millis().to_be_bytes();
        [
            self.kind
                .to_u8()
                .expect("event kinds should be castable to u8"),
            delay_hi,
            delay_lo,
            self.channel,
            self.note_or_program,
            self.velocity,
        ]
    }

    /// Decodes an event from its wire representation. See [`SongEvent::to_bytes`].
    pub fn from_bytes(bytes: [u8; WIRE_SIZE]) -> Result<Self, DecodeError> {
        let kind = EventKind::from_u8(bytes[0]).ok_or(DecodeError::UnknownKind(bytes[0]))?;
        Ok(Self {
            kind,
            delay: Delay::from_millis(u16::from_be_bytes([bytes[1], bytes[2]])),
            channel: bytes[3],
            note_or_program: bytes[4],
            velocity: bytes[5],
        })
    }

    /// Returns `true` if the event is addressed to the percussion channel.
    pub fn is_percussion(&self) -> bool {
        self.channel == PERCUSSION_CHANNEL
    }
}

/// Reasons a wire frame cannot be turned into a [`SongEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// The kind byte names no [`EventKind`].
    UnknownKind(u8),
}
