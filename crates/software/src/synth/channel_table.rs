//! Provides [`MidiChannelTable`], which remembers the program assigned to each MIDI channel.

use wmidi::Channel;

/// Number of MIDI channels.
pub const CHANNEL_COUNT: usize = 16;

/// The instrument program assigned to each of the 16 MIDI channels.
///
/// Every channel starts on program 0. Only program change events modify the table; note-on events read it to decide
/// which instrument to load into a melodic voice. Requests for channels outside 0–15 are ignored rather than treated as
/// errors, and reading such a channel yields program 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MidiChannelTable {
    programs: [u8; CHANNEL_COUNT],
}

impl MidiChannelTable {
    /// Constructs a table with program 0 on every channel.
    pub const fn new() -> Self {
        Self {
            programs: [0; CHANNEL_COUNT],
        }
    }

    /// Assigns `program` to the zero-indexed `channel`; out-of-range channels are ignored.
    pub fn set_program(&mut self, channel: u8, program: u8) {
        match Channel::from_index(channel) {
            Ok(channel) => self.programs[usize::from(channel.index())] = program,
            Err(_) => debug!("Ignoring program change for channel {=u8}", channel),
        }
    }

    /// Returns the program assigned to the zero-indexed `channel`.
    pub fn program(&self, channel: u8) -> u8 {
        self.programs
            .get(usize::from(channel))
            .copied()
            .unwrap_or_default()
    }

    /// Returns every channel's program, indexed by zero-indexed channel.
    pub fn programs(&self) -> [u8; CHANNEL_COUNT] {
        self.programs
    }
}
