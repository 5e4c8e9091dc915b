//! This module contains user-selectable settings (implemented as enums) and traits to make them easier to work with in code.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

/// A trait which allows infinite cycling of an enum's variants.
///
/// Useful for pushbutton user interfaces, allowing presses to advance from the current to the next variant,
/// cycling back to the beginning when all variants have been exhausted.
pub trait CycleConfig {
    /// Return the next variant, cycling back to the beginning as needed.
    fn cycle(self) -> Self
    where
        Self: FromPrimitive + ToPrimitive + Sized,
    {
        let index = self
            .to_u8()
            .expect("enum variants should be castable to u8");
        match <Self as FromPrimitive>::from_u8(index + 1) {
            Some(new_selection) => new_selection,
            None => FromPrimitive::from_u8(0).expect("enum should not be empty"),
        }
    }
}

/// Determines where the events voiced by the synthesizer come from.
///
/// Only one source feeds the synthesis engine at a time: entering [`Mode::MidiIn`] pauses the stored song (silencing
/// whatever it left sounding) before the MIDI input is enabled, and entering [`Mode::Song`] disables the MIDI input
/// before playback resumes.
#[derive(Debug, Default, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Events are decoded from the serial MIDI input.
    #[default]
    MidiIn,
    /// Events are read from the song stored in flash.
    Song,
}

impl Mode {
    /// Returns `true` if the MIDI input should be accepting bytes in this mode.
    pub fn accepts_midi(&self) -> bool {
        *self == Self::MidiIn
    }
}

impl CycleConfig for Mode {}
