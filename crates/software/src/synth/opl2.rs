//! A [`SynthHal`] for the Yamaha YM3812 (OPL2) and its FPGA clones.

use super::{OutputLevel, Patch, SynthHal, VOICE_COUNT};
use crate::configuration::CycleConfig;
use num_derive::{FromPrimitive, ToPrimitive};

/// Raw access to an OPL2's register file.
pub trait RegisterBus {
    /// Writes `value` to `register`, including whatever settle time the chip needs afterwards.
    fn write(&mut self, register: u8, value: u8);

    /// Pulses the chip's initial-clear line.
    fn hard_reset(&mut self);
}

/// The frequency the chip is clocked at, which determines how notes map to F-numbers.
#[derive(Debug, Default, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterClock {
    /// The Yamaha part's nominal 3.58 MHz.
    #[default]
    Native,
    /// FPGA implementations running at 4.0 MHz.
    Fpga4MHz,
}

impl CycleConfig for MasterClock {}

impl MasterClock {
    /// F-numbers for C through B, such that block `n` sounds octave `n`.
    fn fnum_table(&self) -> &'static [u16; 12] {
        match self {
            Self::Native => &[344, 363, 385, 408, 432, 458, 485, 514, 544, 577, 611, 647],
            Self::Fpga4MHz => &[308, 325, 345, 365, 387, 410, 434, 460, 487, 516, 547, 579],
        }
    }
}

/// Offset of each voice's modulator within an operator register block; the carrier sits 3 above it.
const OPERATOR_OFFSETS: [u8; VOICE_COUNT] = [0, 1, 2, 8, 9, 10, 16, 17, 18];
const CARRIER_DISTANCE: u8 = 3;

const TEST_WAVEFORM_SELECT: u8 = 0x01;
const CHARACTERISTIC: u8 = 0x20;
const LEVEL: u8 = 0x40;
const ATTACK_DECAY: u8 = 0x60;
const SUSTAIN_RELEASE: u8 = 0x80;
const FNUM_LOW: u8 = 0xA0;
const KEY_ON_BLOCK: u8 = 0xB0;
const RHYTHM: u8 = 0xBD;
const FEEDBACK: u8 = 0xC0;
const WAVEFORM: u8 = 0xE0;

const KEY_ON: u8 = 0x20;
const WAVEFORM_SELECT_ENABLE: u8 = 0x20;

/// Lowest note with a representable pitch (C0); anything lower plays as this.
const LOWEST_NOTE: u8 = 12;
const HIGHEST_BLOCK: u8 = 7;

/// Drives an OPL2 through a [`RegisterBus`].
///
/// The chip's `0xB0` registers are write-only and hold both the key-on flag and the upper pitch bits, so the driver
/// shadows them to be able to release a note without changing its pitch.
pub struct Opl2<B: RegisterBus> {
    bus: B,
    clock: MasterClock,
    key_shadow: [u8; VOICE_COUNT],
}

impl<B: RegisterBus> Opl2<B> {
    /// Wraps a bus. The chip is not touched until [`SynthHal::reset_all_registers`] is called.
    pub fn new(bus: B, clock: MasterClock) -> Self {
        Self {
            bus,
            clock,
            key_shadow: [0; VOICE_COUNT],
        }
    }

    /// Gives the bus back.
    pub fn into_bus(self) -> B {
        self.bus
    }

    fn write_operator(&mut self, register: u8, operator_offset: u8, value: u8) {
        self.bus.write(register + operator_offset, value);
    }

    /// Computes the `0xB0` (with key-on set) and `0xA0` bytes for a note.
    fn pitch_registers(&self, note: u8) -> (u8, u8) {
        let note = note.max(LOWEST_NOTE) - LOWEST_NOTE;
        let block = (note / 12).min(HIGHEST_BLOCK);
        let fnum = self.clock.fnum_table()[usize::from(note % 12)];
        let high = KEY_ON | block << 2 | (fnum >> 8) as u8 & 0x03;
        (high, fnum as u8)
    }
}

fn voice_register(base: u8, voice: usize) -> u8 {
    assert!(voice < VOICE_COUNT, "voice {} does not exist", voice);
    base + voice as u8
}

impl<B: RegisterBus> SynthHal for Opl2<B> {
    fn note_on(&mut self, voice: usize, note: u8) {
        let (high, low) = self.pitch_registers(note);
        self.bus.write(voice_register(FNUM_LOW, voice), low);
        self.bus.write(voice_register(KEY_ON_BLOCK, voice), high);
        self.key_shadow[voice] = high & !KEY_ON;
    }

    fn note_off(&mut self, voice: usize) {
        let released = self.key_shadow[voice];
        self.bus.write(voice_register(KEY_ON_BLOCK, voice), released);
    }

    fn set_output_level(&mut self, voice: usize, level: OutputLevel) {
        let carrier = OPERATOR_OFFSETS[voice] + CARRIER_DISTANCE;
        self.write_operator(LEVEL, carrier, level.to_register());
    }

    fn load_instrument(&mut self, voice: usize, patch: &Patch) {
        let modulator = OPERATOR_OFFSETS[voice];
        let carrier = modulator + CARRIER_DISTANCE;
        for (offset, operator) in [(modulator, &patch.modulator), (carrier, &patch.carrier)] {
            self.write_operator(CHARACTERISTIC, offset, operator.characteristic);
            self.write_operator(LEVEL, offset, operator.level);
            self.write_operator(ATTACK_DECAY, offset, operator.attack_decay);
            self.write_operator(SUSTAIN_RELEASE, offset, operator.sustain_release);
            self.write_operator(WAVEFORM, offset, operator.waveform);
        }
        self.bus.write(voice_register(FEEDBACK, voice), patch.feedback);
    }

    fn reset_all_registers(&mut self) {
        self.bus.hard_reset();
        for register in 0..=u8::MAX {
            self.bus.write(register, 0x00);
        }
        self.key_shadow = [0; VOICE_COUNT];
        self.bus.write(TEST_WAVEFORM_SELECT, WAVEFORM_SELECT_ENABLE);
        self.bus.write(RHYTHM, 0x00);
        debug!("OPL2 registers cleared");
    }
}
