//! The serial MIDI input.

use crate::{EVENT_QUEUE, mode::ModeReceiver};
use defmt::warn;
use embassy_futures::select::{Either, select};
use embassy_stm32::{mode::Async, usart::UartRx};
use opl_jukebox_lib::midi::MidiInputAdapter;

/// Reads the MIDI input one byte at a time and feeds it to the event queue while in MIDI input mode.
///
/// Bytes are decoded here rather than in the receive interrupt, so a full queue holds up this task (and, through the
/// UART's overrun, drops bytes) instead of stalling the interrupt.
#[embassy_executor::task]
pub async fn midi_input(mut rx: UartRx<'static, Async>, mut mode: ModeReceiver<'static>) -> ! {
    let mut adapter = MidiInputAdapter::new();
    adapter.apply_mode(mode.get().await);

    let mut byte = [0; 1];
    loop {
        let received = select(mode.changed(), rx.read(&mut byte)).await;
        match received {
            Either::First(new_mode) => adapter.apply_mode(new_mode),
            Either::Second(Ok(())) => adapter.handle_byte(byte[0], &EVENT_QUEUE).await,
            Either::Second(Err(err)) => warn!("MIDI input error: {}", err),
        }
    }
}
