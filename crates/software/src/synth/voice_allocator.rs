//! Provides [`VoiceAllocator`], which maps MIDI notes onto the nine physical voices of the synthesizer.

use crate::event::PERCUSSION_CHANNEL;

/// Number of physical voices (OPL2 channels) available.
pub const VOICE_COUNT: usize = 9;

/// Voices `0..MELODIC_VOICES` play melodic notes and are subject to stealing.
pub const MELODIC_VOICES: usize = 8;

/// The voice reserved exclusively for the percussion channel.
pub const PERCUSSION_VOICE: usize = 8;

/// Bookkeeping for one of the synthesizer's physical voices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhysicalVoice {
    active: bool,
    /// Zero-indexed MIDI channel of the last note assigned to the voice; `None` until the first assignment.
    owner: Option<u8>,
    note: u8,
    /// Value of the allocator's note counter when the voice was last assigned or retriggered.
    age: u32,
}

impl PhysicalVoice {
    /// Returns `true` while the voice is sounding a note.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The MIDI channel which last claimed this voice.
    pub fn owner(&self) -> Option<u8> {
        self.owner
    }

    /// The MIDI note last assigned to this voice.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Counter value at the last assignment; lower is older.
    pub fn age(&self) -> u32 {
        self.age
    }

    fn is_playing(&self, channel: u8, note: u8) -> bool {
        self.active && self.owner == Some(channel) && self.note == note
    }

    fn claim(&mut self, channel: u8, note: u8, age: u32) {
        self.active = true;
        self.owner = Some(channel);
        self.note = note;
        self.age = age;
    }
}

/// Assigns `(channel, note)` pairs to physical voices.
///
/// Allocation is a deterministic total function: it always yields a voice in `0..VOICE_COUNT` and never fails, stealing
/// the least recently (re)triggered melodic voice when all of them are busy. Percussion (MIDI channel 10) always plays on
/// [`PERCUSSION_VOICE`], which melodic notes never touch.
///
/// Ages come from a monotonically increasing note counter. Should the counter reach `u32::MAX`, the ages of all voices
/// are compacted to `1..=VOICE_COUNT` (preserving their order) and counting continues from there, so "oldest" stays
/// well-defined indefinitely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceAllocator {
    voices: [PhysicalVoice; VOICE_COUNT],
    counter: u32,
}

impl VoiceAllocator {
    /// Constructs an allocator with every voice inactive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the voice which should sound `note` on `channel`, marking it active.
    ///
    /// In order of precedence:
    /// 1. a voice already sounding the same note on the same channel is retriggered;
    /// 2. percussion claims [`PERCUSSION_VOICE`] unconditionally;
    /// 3. the lowest-numbered free melodic voice is claimed;
    /// 4. the melodic voice with the lowest age is stolen (the lowest index wins a tie).
    pub fn allocate(&mut self, channel: u8, note: u8) -> usize {
        if let Some(index) = self.voices.iter().position(|v| v.is_playing(channel, note)) {
            self.voices[index].age = self.next_age();
            return index;
        }

        if channel == PERCUSSION_CHANNEL {
            let age = self.next_age();
            self.voices[PERCUSSION_VOICE].claim(channel, note, age);
            return PERCUSSION_VOICE;
        }

        let index = match self.voices[..MELODIC_VOICES]
            .iter()
            .position(|v| !v.is_active())
        {
            Some(free) => free,
            None => {
                let mut oldest = 0;
                for (index, voice) in self.voices[..MELODIC_VOICES].iter().enumerate() {
                    if voice.age < self.voices[oldest].age {
                        oldest = index;
                    }
                }
                info!(
                    "Stealing voice {=usize} (channel {}, note {=u8})",
                    oldest,
                    self.voices[oldest].owner,
                    self.voices[oldest].note
                );
                oldest
            }
        };

        let age = self.next_age();
        self.voices[index].claim(channel, note, age);
        index
    }

    /// Marks the voice sounding `note` on `channel` inactive and returns its index.
    ///
    /// Percussion always resolves to [`PERCUSSION_VOICE`], whatever the note. For melodic channels `None` means the note
    /// is no longer sounding (it was released already or its voice was stolen), which is not an error.
    pub fn release(&mut self, channel: u8, note: u8) -> Option<usize> {
        let index = if channel == PERCUSSION_CHANNEL {
            Some(PERCUSSION_VOICE)
        } else {
            self.voices[..MELODIC_VOICES]
                .iter()
                .position(|v| v.is_playing(channel, note))
        };

        match index {
            Some(index) => self.voices[index].active = false,
            None => debug!(
                "No voice sounding note {=u8} on channel {=u8}",
                note, channel
            ),
        }
        index
    }

    /// Deactivates every voice and forgets its assignment. The note counter is left alone.
    pub fn reset_all(&mut self) {
        self.voices = [PhysicalVoice::default(); VOICE_COUNT];
    }

    /// Read-only view of every voice.
    pub fn voices(&self) -> &[PhysicalVoice; VOICE_COUNT] {
        &self.voices
    }

    /// Which voices are currently sounding.
    pub fn activity(&self) -> [bool; VOICE_COUNT] {
        self.voices.map(|v| v.active)
    }

    /// The current value of the note counter.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    fn next_age(&mut self) -> u32 {
        if self.counter == u32::MAX {
            self.compact_ages();
        }
        self.counter += 1;
        self.counter
    }

    /// Replaces every age with its rank (ties ordered by index), leaving the counter at the highest rank.
    fn compact_ages(&mut self) {
        let ages = self.voices.map(|v| v.age);
        for (index, voice) in self.voices.iter_mut().enumerate() {
            let older = ages
                .iter()
                .enumerate()
                .filter(|&(other, &age)| (age, other) < (ages[index], index))
                .count();
            voice.age = older as u32 + 1;
        }
        self.counter = VOICE_COUNT as u32;
        info!("Note counter exhausted, voice ages compacted");
    }
}
