//! Playback of the song stored in flash.

use crate::{EVENT_QUEUE, mode::ModeReceiver};
use embassy_futures::select::{Either4, select4};
use embassy_stm32::exti::ExtiInput;
use embassy_time::{Duration, Timer};
use opl_jukebox_lib::{
    configuration::Mode,
    song::{DEMO_SONG, PlaybackState, PlaybackStateSender, SongScheduler, SystemClock},
};

/// How often the scheduler looks for due events when nothing else wakes it.
const TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Drives the [`SongScheduler`], following the operating mode and handling the play/pause and skip buttons.
///
/// The buttons only act in [`Mode::Song`]; in [`Mode::MidiIn`] the song stays paused. The [`PlaybackState`] is
/// published whenever it changes.
#[embassy_executor::task]
pub async fn song_player(
    mut mode: ModeReceiver<'static>,
    mut play_pause: ExtiInput<'static>,
    mut skip: ExtiInput<'static>,
    playback: PlaybackStateSender<'static>,
) -> ! {
    let mut scheduler = SongScheduler::new(&DEMO_SONG, &EVENT_QUEUE, SystemClock);
    let mut current_mode = mode.get().await;
    scheduler.apply_mode(current_mode).await;
    scheduler.publish(&playback);

    loop {
        let wake = select4(
            mode.changed(),
            play_pause.wait_for_falling_edge(),
            skip.wait_for_falling_edge(),
            Timer::after(TICK_INTERVAL),
        )
        .await;

        match wake {
            Either4::First(new_mode) => {
                current_mode = new_mode;
                scheduler.apply_mode(new_mode).await;
            }
            Either4::Second(()) if current_mode == Mode::Song => match scheduler.state() {
                PlaybackState::Paused => scheduler.play(),
                PlaybackState::Playing | PlaybackState::AwaitingRestart => scheduler.pause().await,
            },
            Either4::Third(()) if current_mode == Mode::Song => scheduler.skip().await,
            _ => {}
        }

        scheduler.tick().await;
        scheduler.publish(&playback);
    }
}
