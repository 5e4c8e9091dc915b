//! Instrument definitions and the banks they are looked up in.

/// The percussion note whose patch voice 8 is primed with at boot and after every reset (GM bass drum).
pub const DEFAULT_PERCUSSION_NOTE: u8 = 36;

/// Register values for one of the two FM operators making up a voice.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Operator {
    /// Tremolo, vibrato, sustain, key-scale-rate and frequency multiplier (register `0x20` block).
    pub characteristic: u8,
    /// Key-scale level in the upper two bits, attenuation in the lower six (register `0x40` block).
    pub level: u8,
    /// Attack rate in the upper nibble, decay rate in the lower (register `0x60` block).
    pub attack_decay: u8,
    /// Sustain level in the upper nibble, release rate in the lower (register `0x80` block).
    pub sustain_release: u8,
    /// Waveform select (register `0xE0` block).
    pub waveform: u8,
}

/// A complete two-operator instrument.
///
/// The carrier's `level` is the nominal output level that velocity scaling is applied on top of.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Patch {
    /// The operator modulating the carrier's phase.
    pub modulator: Operator,
    /// The operator whose output is heard.
    pub carrier: Operator,
    /// Modulator feedback in bits 1-3, additive connection in bit 0 (register `0xC0` block).
    pub feedback: u8,
}

impl Patch {
    /// Size of a patch when stored as raw bytes.
    pub const SIZE: usize = 11;

    /// A bright, quickly decaying keyboard tone.
    pub const PIANO: Self = Self::from_bytes([
        0x01, 0x4F, 0xF1, 0x53, 0x00, 0x11, 0x00, 0xD2, 0x74, 0x00, 0x06,
    ]);

    /// A mellow, bell-like keyboard tone.
    pub const ELECTRIC_PIANO: Self = Self::from_bytes([
        0x01, 0x63, 0xF1, 0xB4, 0x00, 0x01, 0x00, 0xF2, 0xF5, 0x00, 0x08,
    ]);

    /// A round plucked bass.
    pub const FINGERED_BASS: Self = Self::from_bytes([
        0x00, 0x1B, 0xF4, 0x65, 0x00, 0x01, 0x00, 0xF3, 0x76, 0x00, 0x0A,
    ]);

    /// A short, pitched thump suitable for a kick drum.
    pub const BASS_DRUM: Self = Self::from_bytes([
        0x00, 0x0B, 0xA8, 0x4C, 0x00, 0x00, 0x00, 0xD6, 0x4F, 0x00, 0x00,
    ]);

    /// Builds a patch from its stored form: the modulator's five registers, then the carrier's, then feedback.
    pub const fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            modulator: Operator {
                characteristic: bytes[0],
                level: bytes[1],
                attack_decay: bytes[2],
                sustain_release: bytes[3],
                waveform: bytes[4],
            },
            carrier: Operator {
                characteristic: bytes[5],
                level: bytes[6],
                attack_decay: bytes[7],
                sustain_release: bytes[8],
                waveform: bytes[9],
            },
            feedback: bytes[10],
        }
    }
}

/// A source of instruments for the synthesis engine.
///
/// Lookups are infallible: a bank without a dedicated patch for a program or note must still return something playable.
pub trait PatchBank {
    /// The patch for a General MIDI program number (0-127).
    fn melodic(&self, program: u8) -> Patch;

    /// The patch for a note on the percussion channel, e.g., 36 for a bass drum.
    fn percussion(&self, note: u8) -> Patch;
}

/// A bank which plays every program with one patch and every percussion note with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UniformBank {
    melodic: Patch,
    percussion: Patch,
}

impl UniformBank {
    /// Constructs a bank from its two patches.
    pub const fn new(melodic: Patch, percussion: Patch) -> Self {
        Self {
            melodic,
            percussion,
        }
    }
}

impl Default for UniformBank {
    fn default() -> Self {
        Self::new(Patch::PIANO, Patch::BASS_DRUM)
    }
}

impl PatchBank for UniformBank {
    fn melodic(&self, _program: u8) -> Patch {
        self.melodic
    }

    fn percussion(&self, _note: u8) -> Patch {
        self.percussion
    }
}

/// A bank backed by two tables: melodic patches indexed by program number and percussion patches indexed by note.
///
/// A program or note beyond the end of its table gets the table's first patch. An empty table yields
/// [`Patch::default`], which is silent but harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableBank<'a> {
    melodic: &'a [Patch],
    percussion: &'a [Patch],
}

impl<'a> TableBank<'a> {
    /// Constructs a bank over two tables.
    pub const fn new(melodic: &'a [Patch], percussion: &'a [Patch]) -> Self {
        Self {
            melodic,
            percussion,
        }
    }

    fn lookup(table: &[Patch], index: u8) -> Patch {
        table
            .get(usize::from(index))
            .or(table.first())
            .copied()
            .unwrap_or_default()
    }
}

impl PatchBank for TableBank<'_> {
    fn melodic(&self, program: u8) -> Patch {
        Self::lookup(self.melodic, program)
    }

    fn percussion(&self, note: u8) -> Patch {
        Self::lookup(self.percussion, note)
    }
}
