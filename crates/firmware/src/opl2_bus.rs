//! Bit-banged access to the OPL2's parallel bus.

use embassy_stm32::gpio::{Level, Output};
use embassy_time::{Duration, block_for};
use opl_jukebox_lib::synth::RegisterBus;

/// How long /WR is held low.
const STROBE: Duration = Duration::from_micros(1);
/// The chip needs 12 master clock cycles after an address write before it accepts data.
const ADDRESS_SETTLE: Duration = Duration::from_micros(4);
/// The chip needs 84 master clock cycles after a data write before it accepts the next address.
const DATA_SETTLE: Duration = Duration::from_micros(23);
/// How long /IC is held low, and how long the chip is left alone afterwards.
const RESET_HOLD: Duration = Duration::from_millis(10);

/// The OPL2's eight data lines plus its A0, /WR, /CS and /IC control lines.
///
/// The chip's master clock is expected to come from an oscillator on the OPL2 board, not from this bus.
pub struct GpioBus<'d> {
    data: [Output<'d>; 8],
    a0: Output<'d>,
    wr: Output<'d>,
    cs: Output<'d>,
    ic: Output<'d>,
}

impl<'d> GpioBus<'d> {
    /// Takes ownership of the bus lines and drives them to their idle levels. `data[0]` is D0.
    pub fn new(
        data: [Output<'d>; 8],
        a0: Output<'d>,
        mut wr: Output<'d>,
        mut cs: Output<'d>,
        mut ic: Output<'d>,
    ) -> Self {
        wr.set_high();
        cs.set_high();
        ic.set_high();
        Self {
            data,
            a0,
            wr,
            cs,
            ic,
        }
    }

    fn put_data(&mut self, byte: u8) {
        for (bit, line) in self.data.iter_mut().enumerate() {
            line.set_level(Level::from(byte >> bit & 1 == 1));
        }
    }

    fn strobe(&mut self) {
        self.cs.set_low();
        self.wr.set_low();
        block_for(STROBE);
        self.wr.set_high();
        self.cs.set_high();
    }
}

impl RegisterBus for GpioBus<'_> {
    fn write(&mut self, register: u8, value: u8) {
        self.a0.set_low();
        self.put_data(register);
        self.strobe();
        block_for(ADDRESS_SETTLE);

        self.a0.set_high();
        self.put_data(value);
        self.strobe();
        block_for(DATA_SETTLE);
    }

    fn hard_reset(&mut self) {
        self.ic.set_low();
        block_for(RESET_HOLD);
        self.ic.set_high();
        block_for(RESET_HOLD);
    }
}
