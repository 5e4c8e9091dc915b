//! The hardware boundary of the synthesis engine.

use super::Patch;

/// The operations the synthesis engine needs from a sound chip.
///
/// Voices are numbered `0..VOICE_COUNT`; an index outside that range is a programming error and implementations may
/// panic on it.
pub trait SynthHal {
    /// Starts sounding `note` (MIDI note number) on `voice`, with whatever instrument and level it was last given.
    fn note_on(&mut self, voice: usize, note: u8);

    /// Releases whatever `voice` is sounding, letting its envelope decay.
    fn note_off(&mut self, voice: usize);

    /// Sets the output level of `voice`'s carrier.
    fn set_output_level(&mut self, voice: usize, level: OutputLevel);

    /// Programs `voice` with an instrument.
    fn load_instrument(&mut self, voice: usize, patch: &Patch);

    /// Silences the chip and returns every register to its power-on state.
    fn reset_all_registers(&mut self);
}

/// An operator output level, as stored in the `0x40` register block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputLevel {
    /// Key-scale level; passed through untouched by velocity scaling.
    pub scaling_bits: u8,
    /// Attenuation in 0.75 dB steps, 0 (loudest) to [`OutputLevel::MAX_ATTENUATION`] (quietest).
    pub attenuation: u8,
}

impl OutputLevel {
    /// The largest attenuation the hardware can express.
    pub const MAX_ATTENUATION: u8 = 0x3F;

    /// Splits a register byte into its scaling and attenuation fields.
    pub const fn from_register(byte: u8) -> Self {
        Self {
            scaling_bits: byte >> 6,
            attenuation: byte & Self::MAX_ATTENUATION,
        }
    }

    /// Packs the level back into a register byte.
    pub const fn to_register(self) -> u8 {
        let attenuation = if self.attenuation > Self::MAX_ATTENUATION {
            Self::MAX_ATTENUATION
        } else {
            self.attenuation
        };
        (self.scaling_bits & 0x03) << 6 | attenuation
    }

    /// Attenuates this (nominal) level according to a MIDI velocity.
    ///
    /// The attenuation added is `(127 - velocity) / 2`, i.e., velocity 127 leaves the level unchanged and velocity 0 adds
    /// 63. The sum saturates at [`OutputLevel::MAX_ATTENUATION`].
    pub fn scaled_by_velocity(self, velocity: u8) -> Self {
        let added = 127u8.saturating_sub(velocity) >> 1;
        Self {
            scaling_bits: self.scaling_bits,
            attenuation: self
                .attenuation
                .saturating_add(added)
                .min(Self::MAX_ATTENUATION),
        }
    }
}
