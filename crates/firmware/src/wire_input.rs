//! The external controller link, carrying events already in their wire format.

use crate::{EVENT_QUEUE, mode::ModeReceiver};
use defmt::warn;
use embassy_futures::select::{Either, select};
use embassy_stm32::{mode::Async, usart::UartRx};
use opl_jukebox_lib::event::WireInputAdapter;

/// Reads the controller link one byte at a time and feeds complete frames to the event queue while in MIDI input mode.
#[embassy_executor::task]
pub async fn wire_input(mut rx: UartRx<'static, Async>, mut mode: ModeReceiver<'static>) -> ! {
    let mut adapter = WireInputAdapter::new();
    adapter.apply_mode(mode.get().await);

    let mut byte = [0; 1];
    loop {
        let received = select(mode.changed(), rx.read(&mut byte)).await;
        match received {
            Either::First(new_mode) => adapter.apply_mode(new_mode),
            Either::Second(Ok(())) => adapter.handle_byte(byte[0], &EVENT_QUEUE).await,
            Either::Second(Err(err)) => {
                warn!("Controller link error: {}", err);
                // the frame in progress is misaligned now
                adapter.set_enabled(adapter.is_enabled());
            }
        }
    }
}
