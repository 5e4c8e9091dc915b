//! A short song to play when nothing else is available, and the instruments it was arranged for.

use crate::event::{Delay, PERCUSSION_CHANNEL, SongEvent};
use crate::synth::{Patch, TableBank};

const EIGHTH: Delay = Delay::from_millis(250);
const QUARTER: Delay = Delay::from_millis(500);

const KEYS: u8 = 0;
const BASS: u8 = 1;

const KEYS_PROGRAM: u8 = 4;
const BASS_PROGRAM: u8 = 33;

const fn kick(delay: Delay) -> SongEvent {
    SongEvent::note_on(delay, PERCUSSION_CHANNEL, 36, 110)
}

const fn keys_on(note: u8) -> SongEvent {
    SongEvent::note_on(Delay::NONE, KEYS, note, 90)
}

const fn keys_off(delay: Delay, note: u8) -> SongEvent {
    SongEvent::note_off(delay, KEYS, note)
}

const fn bass_on(delay: Delay, note: u8) -> SongEvent {
    SongEvent::note_on(delay, BASS, note, 100)
}

const fn bass_off(delay: Delay, note: u8) -> SongEvent {
    SongEvent::note_off(delay, BASS, note)
}

/// A two-bar loop: a I-vi progression over a walking bass, ended by the end-of-song marker.
///
/// Every delay is the wait since the event before it, so the notes of a chord all carry a zero delay and each note-off
/// carries the length of the note it ends.
pub static DEMO_SONG: [SongEvent; 33] = [
    SongEvent::program_change(Delay::NONE, KEYS, KEYS_PROGRAM),
    SongEvent::program_change(Delay::NONE, BASS, BASS_PROGRAM),
    // bar 1: C major
    kick(Delay::NONE),
    bass_on(Delay::NONE, 36),
    keys_on(60),
    keys_on(64),
    keys_on(67),
    bass_off(EIGHTH, 36),
    bass_on(Delay::NONE, 40),
    bass_off(EIGHTH, 40),
    kick(Delay::NONE),
    bass_on(Delay::NONE, 43),
    bass_off(EIGHTH, 43),
    bass_on(Delay::NONE, 40),
    // bar 2: A minor
    keys_off(EIGHTH, 60),
    keys_off(Delay::NONE, 64),
    keys_off(Delay::NONE, 67),
    bass_off(Delay::NONE, 40),
    kick(Delay::NONE),
    bass_on(Delay::NONE, 33),
    keys_on(57),
    keys_on(60),
    keys_on(64),
    bass_off(EIGHTH, 33),
    bass_on(Delay::NONE, 45),
    kick(EIGHTH),
    bass_off(Delay::NONE, 45),
    bass_on(Delay::NONE, 40),
    bass_off(QUARTER, 40),
    keys_off(Delay::NONE, 57),
    keys_off(Delay::NONE, 60),
    keys_off(Delay::NONE, 64),
    SongEvent::reset(),
];

const fn melodic_patches() -> [Patch; 128] {
    let mut patches = [Patch::PIANO; 128];
    patches[KEYS_PROGRAM as usize] = Patch::ELECTRIC_PIANO;
    patches[BASS_PROGRAM as usize] = Patch::FINGERED_BASS;
    patches
}

static MELODIC_PATCHES: [Patch; 128] = melodic_patches();
static PERCUSSION_PATCHES: [Patch; 1] = [Patch::BASS_DRUM];

/// General MIDI programs 0-127 with the programs [`DEMO_SONG`] selects given patches of their own; every other
/// program plays [`Patch::PIANO`] and every percussion note [`Patch::BASS_DRUM`].
pub static DEMO_BANK: TableBank<'static> = TableBank::new(&MELODIC_PATCHES, &PERCUSSION_PATCHES);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, EventQueue};
    use crate::synth::{
        MELODIC_VOICES, OutputLevel, PatchBank, SynthHal, SynthesisEngine, VOICE_COUNT,
    };
    use core::cell::Cell;
    use embassy_futures::block_on;
    use embedded_hal_async::delay::DelayNs;

    /// Advances a shared millisecond clock by however long the engine waits.
    struct ClockDelay<'a>(&'a Cell<u64>);

    impl DelayNs for ClockDelay<'_> {
        async fn delay_ns(&mut self, ns: u32) {
            self.0.set(self.0.get() + u64::from(ns) / 1_000_000);
        }
    }

    /// Measures how long each melodic voice sounds, and what it was loaded with.
    struct NoteTimer<'a> {
        now: &'a Cell<u64>,
        started: [Option<u64>; VOICE_COUNT],
        onsets: [u64; 16],
        onset_count: usize,
        shortest: u64,
        released: usize,
        loaded: [Patch; VOICE_COUNT],
    }

    impl<'a> NoteTimer<'a> {
        fn new(now: &'a Cell<u64>) -> Self {
            Self {
                now,
                started: [None; VOICE_COUNT],
                onsets: [0; 16],
                onset_count: 0,
                shortest: u64::MAX,
                released: 0,
                loaded: [Patch::default(); VOICE_COUNT],
            }
        }
    }

    impl SynthHal for NoteTimer<'_> {
        fn note_on(&mut self, voice: usize, _note: u8) {
            if voice < MELODIC_VOICES {
                self.started[voice] = Some(self.now.get());
                self.onsets[self.onset_count] = self.now.get();
                self.onset_count += 1;
            }
        }

        fn note_off(&mut self, voice: usize) {
            if let Some(start) = self.started[voice].take() {
                self.shortest = self.shortest.min(self.now.get() - start);
                self.released += 1;
            }
        }

        fn set_output_level(&mut self, _voice: usize, _level: OutputLevel) {}

        fn load_instrument(&mut self, voice: usize, patch: &Patch) {
            self.loaded[voice] = *patch;
        }

        fn reset_all_registers(&mut self) {}
    }

    fn melodic_note_ons() -> usize {
        DEMO_SONG
            .iter()
            .filter(|event| event.kind == EventKind::NoteOn && !event.is_percussion())
            .count()
    }

    /// Feeds the whole song through an engine, stopping short of the end marker.
    fn replay(now: &Cell<u64>) -> SynthesisEngine<NoteTimer<'_>, TableBank<'static>> {
        let queue = EventQueue::<64>::new();
        let mut engine = SynthesisEngine::new(NoteTimer::new(now), DEMO_BANK);
        let mut delay = ClockDelay(now);
        engine.start();
        block_on(async {
            for event in DEMO_SONG.iter().take_while(|event| event.kind != EventKind::Reset) {
                queue.put(*event).await;
                engine.process_next(&queue, &mut delay).await;
            }
        });
        engine
    }

    #[test]
    fn every_note_sounds_for_a_while() {
        let now = Cell::new(0);
        let engine = replay(&now);
        let timer = engine.hal();
        assert_eq!(melodic_note_ons(), timer.released, "Every note should be released");
        assert!(timer.shortest >= 250, "Shortest note lasted {}ms", timer.shortest);
        assert_eq!(2000, now.get(), "Expected left but got right");
        assert_eq!(
            [false; MELODIC_VOICES],
            engine.status().voices[..MELODIC_VOICES],
            "Expected left but got right"
        );
    }

    #[test]
    fn chords_start_together() {
        let now = Cell::new(0);
        let engine = replay(&now);
        let onsets = &engine.hal().onsets[..engine.hal().onset_count];
        // bass and three chord tones at the downbeat of each bar
        assert_eq!([0; 4], onsets[..4], "Expected left but got right");
        assert_eq!([1000; 4], onsets[7..11], "Expected left but got right");
    }

    #[test]
    fn programs_select_their_own_patches() {
        let now = Cell::new(0);
        let engine = replay(&now);
        assert_eq!(KEYS_PROGRAM, engine.status().programs[usize::from(KEYS)]);
        assert_eq!(BASS_PROGRAM, engine.status().programs[usize::from(BASS)]);
        // the first downbeat gives the bass voice 0 and the chord voices 1 to 3
        let loaded = engine.hal().loaded;
        assert_eq!(Patch::FINGERED_BASS, loaded[0], "Expected left but got right");
        assert_eq!(Patch::ELECTRIC_PIANO, loaded[1], "Expected left but got right");
        assert_eq!(Patch::BASS_DRUM, loaded[8], "Expected left but got right");
        assert_eq!(Patch::PIANO, DEMO_BANK.melodic(0));
    }
}
