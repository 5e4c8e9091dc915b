//! Tasks and types related to the operating [`Mode`].

use embassy_stm32::{exti::ExtiInput, gpio::Output};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    watch::{Receiver, Sender, Watch},
};
use opl_jukebox_lib::configuration::{CycleConfig, Mode};

const MODE_RECEIVER_CNT: usize = 3;
/// Syncs the operating [`Mode`] across tasks.
pub static MODE_SYNC: Watch<CriticalSectionRawMutex, Mode, MODE_RECEIVER_CNT> =
    Watch::new_with(Mode::MidiIn);
pub type ModeSender<'a> = Sender<'a, CriticalSectionRawMutex, Mode, MODE_RECEIVER_CNT>;
pub type ModeReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, Mode, MODE_RECEIVER_CNT>;

/// Handles presses of the mode button, switching between MIDI input and song playback.
///
/// The LED is lit while the stored song is the event source.
#[embassy_executor::task]
pub async fn select_mode(
    mut button: ExtiInput<'static>,
    mut led: Output<'static>,
    mode: ModeSender<'static>,
) -> ! {
    loop {
        button.wait_for_rising_edge().await;

        let new_mode = mode
            .try_get()
            .expect("Mode should never be uninitialized")
            .cycle();
        defmt::info!("Switching to {}", new_mode);
        mode.send(new_mode);

        match new_mode {
            Mode::MidiIn => led.set_low(),
            Mode::Song => led.set_high(),
        }
    }
}
