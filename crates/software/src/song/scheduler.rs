//! Provides [`SongScheduler`], which feeds a stored song into the [`EventQueue`] at the pace its delays dictate.

use super::Clock;
use crate::configuration::Mode;
use crate::event::{EventKind, EventQueue, QUEUE_CAPACITY, SongEvent};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    watch::{Receiver, Sender, Watch},
};
use embassy_time::{Duration, Instant};

/// How many tasks may watch the [`PlaybackState`].
pub const PLAYBACK_RECEIVER_CNT: usize = 1;
/// Where the scheduler publishes its [`PlaybackState`].
pub type PlaybackStateSync = Watch<CriticalSectionRawMutex, PlaybackState, PLAYBACK_RECEIVER_CNT>;
/// Publishes [`PlaybackState`] changes.
pub type PlaybackStateSender<'a> =
    Sender<'a, CriticalSectionRawMutex, PlaybackState, PLAYBACK_RECEIVER_CNT>;
/// Observes [`PlaybackState`] changes.
pub type PlaybackStateReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, PlaybackState, PLAYBACK_RECEIVER_CNT>;

/// How long the scheduler waits after the end of a song before playing it again.
pub const RESTART_DELAY: Duration = Duration::from_millis(2000);

/// What the scheduler is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackState {
    /// Events are being fed to the queue.
    Playing,
    /// Nothing is fed to the queue until [`SongScheduler::play`] is called.
    Paused,
    /// The song has ended and will start over once [`RESTART_DELAY`] has passed.
    AwaitingRestart,
}

/// Plays a stored song by feeding its events to the [`EventQueue`] as they become due.
///
/// A song is a slice of [`SongEvent`]s terminated by a [`Reset`][EventKind::Reset] event, which marks the end rather than
/// being played as such; running off the end of the slice is treated the same way. Each event's delay is the wait
/// *before* it, which the synthesis engine waits out once it takes the event. The scheduler only paces admission to the
/// queue: it keeps a running due time, adding each event's delay once that event is enqueued, so the queue stays about
/// one event ahead of what is sounding. This lets it share its task with other short-lived work: [`tick`][Self::tick]
/// never waits for an event to become due, only for room in the queue.
///
/// The scheduler never touches the synthesizer. Wherever the instrument state needs to be brought back to its defaults
/// (when skipping and when starting over) it enqueues a reset, which the synthesis engine answers by silencing every
/// voice and reloading the default percussion patch.
pub struct SongScheduler<'a, C: Clock, const N: usize = QUEUE_CAPACITY> {
    song: &'a [SongEvent],
    queue: &'a EventQueue<N>,
    clock: C,
    playing: bool,
    cursor: usize,
    next_due: Instant,
    restart_at: Option<Instant>,
}

impl<'a, C: Clock, const N: usize> SongScheduler<'a, C, N> {
    /// Constructs a paused scheduler positioned at the start of `song`.
    pub fn new(song: &'a [SongEvent], queue: &'a EventQueue<N>, clock: C) -> Self {
        let now = clock.now();
        Self {
            song,
            queue,
            clock,
            playing: false,
            cursor: 0,
            next_due: now,
            restart_at: None,
        }
    }

    /// Resumes playback from where it was paused. Does nothing if already playing.
    pub fn play(&mut self) {
        if self.playing {
            return;
        }
        info!("Song playing");
        self.playing = true;
        self.next_due = self.clock.now();
    }

    /// Stops feeding events and silences the synthesizer. Does nothing if already paused.
    ///
    /// Events already in the queue are discarded before the reset is enqueued. An event the engine has already taken
    /// (possibly still waiting out its delay) cannot be recalled, so one more note may sound before the reset lands.
    pub async fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.playing = false;
        let dropped = self.queue.flush();
        info!("Song paused, {=usize} queued events dropped", dropped);
        self.queue.put(SongEvent::reset()).await;
    }

    /// Starts the song over immediately, cancelling any pending restart.
    pub async fn skip(&mut self) {
        info!("Song skipped to start");
        self.rewind();
        self.queue.put(SongEvent::reset()).await;
    }

    /// Starts or stops playback to suit the operating mode.
    pub async fn apply_mode(&mut self, mode: Mode) {
        match mode {
            Mode::Song => self.play(),
            Mode::MidiIn => self.pause().await,
        }
    }

    /// Enqueues every event which has become due.
    ///
    /// Meant to be called periodically. The clock is read again after each event, so a run of zero-delay events (a
    /// chord, say) is enqueued within a single call rather than one event per call.
    pub async fn tick(&mut self) {
        if !self.playing {
            return;
        }

        if let Some(restart_at) = self.restart_at {
            if self.clock.now() >= restart_at {
                info!("Song restarting");
                self.rewind();
                self.queue.put(SongEvent::reset()).await;
            }
            return;
        }

        let mut now = self.clock.now();
        while now >= self.next_due {
            let event = match self.song.get(self.cursor) {
                Some(event) if event.kind != EventKind::Reset => *event,
                _ => {
                    info!("Song ended");
                    self.queue.put(SongEvent::reset()).await;
                    self.restart_at = Some(now + RESTART_DELAY);
                    return;
                }
            };
            self.cursor += 1;
            self.queue.put(event).await;
            self.next_due += Duration::from(event.delay);
            now = self.clock.now();
        }
    }

    /// What the scheduler is currently doing.
    pub fn state(&self) -> PlaybackState {
        match (self.playing, self.restart_at) {
            (false, _) => PlaybackState::Paused,
            (true, Some(_)) => PlaybackState::AwaitingRestart,
            (true, None) => PlaybackState::Playing,
        }
    }

    /// Sends the current [`PlaybackState`] to `sender`, unless it is what was sent last.
    pub fn publish(&self, sender: &PlaybackStateSender<'_>) {
        let state = self.state();
        sender.send_if_modified(|published| {
            if *published == Some(state) {
                false
            } else {
                debug!("Playback state now {}", state);
                *published = Some(state);
                true
            }
        });
    }

    /// Index of the next event to be fed.
    pub fn position(&self) -> usize {
        self.cursor
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.restart_at = None;
        self.next_due = self.clock.now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Delay;
    use crate::song::SystemClock;
    use core::cell::Cell;
    use embassy_futures::block_on;
    use embassy_time::MockDriver;

    #[derive(Default)]
    struct ManualClock(Cell<u64>);

    impl ManualClock {
        fn advance(&self, millis: u64) {
            self.0.set(self.0.get() + millis);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            Instant::from_millis(self.0.get())
        }
    }

    const fn on(delay: u16, note: u8) -> SongEvent {
        SongEvent::note_on(Delay::from_millis(delay), 0, note, 100)
    }

    const CHORD: [SongEvent; 7] = [
        on(0, 60),
        on(0, 64),
        on(0, 67),
        on(0, 72),
        on(100, 76),
        on(50, 79),
        SongEvent::reset(),
    ];

    #[test]
    fn paused_scheduler_feeds_nothing() {
        let queue = EventQueue::<16>::new();
        let clock = ManualClock::default();
        let mut scheduler = SongScheduler::new(&CHORD, &queue, &clock);
        assert_eq!(PlaybackState::Paused, scheduler.state());
        clock.advance(1000);
        block_on(scheduler.tick());
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_delay_burst_is_fed_in_one_tick() {
        let queue = EventQueue::<16>::new();
        let clock = ManualClock::default();
        let mut scheduler = SongScheduler::new(&CHORD, &queue, &clock);
        scheduler.play();

        block_on(scheduler.tick());
        assert_eq!(5, queue.len(), "Expected left but got right");
        for note in [60, 64, 67, 72, 76] {
            assert_eq!(Some(on(if note == 76 { 100 } else { 0 }, note)), queue.try_get());
        }

        // nothing more until the 100ms delay of the fifth event has passed
        clock.advance(99);
        block_on(scheduler.tick());
        assert!(queue.is_empty());
        clock.advance(1);
        block_on(scheduler.tick());
        assert_eq!(Some(on(50, 79)), queue.try_get());
        assert_eq!(PlaybackState::Playing, scheduler.state());
    }

    #[test]
    fn end_marker_resets_and_schedules_restart() {
        let queue = EventQueue::<16>::new();
        let clock = ManualClock::default();
        let mut scheduler = SongScheduler::new(&CHORD, &queue, &clock);
        scheduler.play();
        block_on(scheduler.tick());
        clock.advance(100);
        block_on(scheduler.tick());

        assert_eq!(6, queue.flush());
        clock.advance(50);
        block_on(scheduler.tick());
        assert_eq!(Some(SongEvent::reset()), queue.try_get(), "Expected left but got right");
        assert!(queue.is_empty(), "Exactly one reset should be enqueued");
        assert_eq!(PlaybackState::AwaitingRestart, scheduler.state());

        clock.advance(1999);
        block_on(scheduler.tick());
        assert!(queue.is_empty());

        clock.advance(1);
        block_on(scheduler.tick());
        assert_eq!(
            Some(SongEvent::reset()),
            queue.try_get(),
            "Restart should reprime defaults before any note"
        );
        assert_eq!(PlaybackState::Playing, scheduler.state());
        assert_eq!(0, scheduler.position());

        block_on(scheduler.tick());
        assert_eq!(Some(on(0, 60)), queue.try_get());
    }

    #[test]
    fn song_without_end_marker_still_loops() {
        let song = [on(10, 60)];
        let queue = EventQueue::<16>::new();
        let clock = ManualClock::default();
        let mut scheduler = SongScheduler::new(&song, &queue, &clock);
        scheduler.play();
        block_on(scheduler.tick());
        clock.advance(10);
        block_on(scheduler.tick());
        assert_eq!(Some(on(10, 60)), queue.try_get());
        assert_eq!(Some(SongEvent::reset()), queue.try_get());
        assert_eq!(PlaybackState::AwaitingRestart, scheduler.state());
    }

    #[test]
    fn pause_flushes_then_resets() {
        let queue = EventQueue::<16>::new();
        let clock = ManualClock::default();
        let mut scheduler = SongScheduler::new(&CHORD, &queue, &clock);
        scheduler.play();
        block_on(scheduler.tick());
        assert_eq!(5, queue.len());

        block_on(scheduler.pause());
        assert_eq!(Some(SongEvent::reset()), queue.try_get(), "Expected left but got right");
        assert!(queue.is_empty());
        assert_eq!(PlaybackState::Paused, scheduler.state());

        block_on(scheduler.pause());
        assert!(queue.is_empty(), "Pausing twice should do nothing");
    }

    #[test]
    fn play_is_idempotent_and_resumes_in_place() {
        let queue = EventQueue::<16>::new();
        let clock = ManualClock::default();
        let mut scheduler = SongScheduler::new(&CHORD, &queue, &clock);
        scheduler.play();
        block_on(scheduler.tick());
        block_on(scheduler.pause());
        queue.flush();

        clock.advance(5000);
        scheduler.play();
        clock.advance(60);
        // a second play must not move the timing baseline
        scheduler.play();
        block_on(scheduler.tick());
        assert_eq!(Some(on(50, 79)), queue.try_get(), "Expected left but got right");
        assert_eq!(Some(SongEvent::reset()), queue.try_get(), "Expected left but got right");
        assert_eq!(6, scheduler.position());
    }

    #[test]
    fn skip_rewinds_and_cancels_restart() {
        let queue = EventQueue::<16>::new();
        let clock = ManualClock::default();
        let mut scheduler = SongScheduler::new(&CHORD, &queue, &clock);
        scheduler.play();
        block_on(scheduler.tick());
        clock.advance(150);
        block_on(scheduler.tick());
        block_on(scheduler.tick());
        assert_eq!(PlaybackState::AwaitingRestart, scheduler.state());
        queue.flush();

        block_on(scheduler.skip());
        assert_eq!(Some(SongEvent::reset()), queue.try_get());
        assert_eq!(PlaybackState::Playing, scheduler.state());
        assert_eq!(0, scheduler.position());
        block_on(scheduler.tick());
        assert_eq!(5, queue.len(), "Expected left but got right");
    }

    #[test]
    fn mode_switch_starts_and_stops_playback() {
        let queue = EventQueue::<16>::new();
        let clock = ManualClock::default();
        let mut scheduler = SongScheduler::new(&CHORD, &queue, &clock);
        block_on(scheduler.apply_mode(Mode::Song));
        assert_eq!(PlaybackState::Playing, scheduler.state());
        block_on(scheduler.apply_mode(Mode::MidiIn));
        assert_eq!(PlaybackState::Paused, scheduler.state());
        assert_eq!(Some(SongEvent::reset()), queue.try_get());
    }

    #[test]
    fn playback_state_is_published_on_change() {
        static PLAYBACK: PlaybackStateSync = Watch::new();
        let mut receiver = PLAYBACK.receiver().unwrap();
        let sender = PLAYBACK.sender();
        let queue = EventQueue::<16>::new();
        let clock = ManualClock::default();
        let mut scheduler = SongScheduler::new(&CHORD, &queue, &clock);

        scheduler.publish(&sender);
        assert_eq!(Some(PlaybackState::Paused), receiver.try_changed());
        scheduler.publish(&sender);
        assert_eq!(None, receiver.try_changed(), "Unchanged state should not be sent again");

        scheduler.play();
        scheduler.publish(&sender);
        assert_eq!(
            Some(PlaybackState::Playing),
            receiver.try_changed(),
            "Expected left but got right"
        );

        block_on(scheduler.tick());
        clock.advance(150);
        block_on(scheduler.tick());
        scheduler.publish(&sender);
        assert_eq!(Some(PlaybackState::AwaitingRestart), receiver.try_changed());
    }

    #[test]
    fn system_clock_follows_time_driver() {
        let queue = EventQueue::<16>::new();
        let mut scheduler = SongScheduler::new(&CHORD, &queue, SystemClock);
        scheduler.play();
        block_on(scheduler.tick());
        assert_eq!(5, queue.flush());
        MockDriver::get().advance(Duration::from_millis(100));
        block_on(scheduler.tick());
        assert_eq!(Some(on(50, 79)), queue.try_get(), "Expected left but got right");
    }
}
