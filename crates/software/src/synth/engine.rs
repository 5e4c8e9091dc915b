//! Provides [`SynthesisEngine`], the sole consumer of the [`EventQueue`].

use super::{
    CHANNEL_COUNT, DEFAULT_PERCUSSION_NOTE, MELODIC_VOICES, MidiChannelTable, OutputLevel,
    PERCUSSION_VOICE, PatchBank, SynthHal, VOICE_COUNT, VoiceAllocator,
};
use crate::event::{EventKind, EventQueue, SongEvent};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    watch::{Receiver, Sender, Watch},
};
use embedded_hal_async::delay::DelayNs;

/// How many tasks may watch the engine's status.
pub const STATUS_RECEIVER_CNT: usize = 2;
/// Where the engine publishes its [`EngineStatus`].
pub type EngineStatusSync = Watch<CriticalSectionRawMutex, EngineStatus, STATUS_RECEIVER_CNT>;
/// Publishes [`EngineStatus`] updates.
pub type EngineStatusSender<'a> =
    Sender<'a, CriticalSectionRawMutex, EngineStatus, STATUS_RECEIVER_CNT>;
/// Observes [`EngineStatus`] updates.
pub type EngineStatusReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, EngineStatus, STATUS_RECEIVER_CNT>;

/// A read-only snapshot of the engine's state for display purposes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineStatus {
    /// Which physical voices are sounding.
    pub voices: [bool; VOICE_COUNT],
    /// The program assigned to each MIDI channel.
    pub programs: [u8; CHANNEL_COUNT],
}

impl EngineStatus {
    /// Returns `true` if any voice is sounding.
    pub fn any_voice_active(&self) -> bool {
        self.voices.iter().any(|&active| active)
    }
}

/// Turns [`SongEvent`]s into synthesizer operations.
///
/// The engine owns the [`VoiceAllocator`] and the [`MidiChannelTable`] outright, so they are only ever touched from the
/// execution context the engine runs in. Each event's [delay][SongEvent::delay] is waited out before the event is acted
/// upon; producers encode musical timing this way, and the engine's own pacing is what makes it audible.
pub struct SynthesisEngine<H: SynthHal, P: PatchBank> {
    hal: H,
    bank: P,
    allocator: VoiceAllocator,
    programs: MidiChannelTable,
}

impl<H: SynthHal, P: PatchBank> SynthesisEngine<H, P> {
    /// Constructs an engine. Call [`start`][Self::start] before processing events.
    pub fn new(hal: H, bank: P) -> Self {
        Self {
            hal,
            bank,
            allocator: VoiceAllocator::new(),
            programs: MidiChannelTable::new(),
        }
    }

    /// Brings the synthesizer into its initial state: registers cleared, program 0 loaded on the melodic voices and the
    /// default percussion patch on the percussion voice.
    pub fn start(&mut self) {
        self.hal.reset_all_registers();
        let melodic = self.bank.melodic(0);
        for voice in 0..MELODIC_VOICES {
            self.hal.load_instrument(voice, &melodic);
        }
        self.prime_percussion();
        info!("Synthesis engine started");
    }

    /// Processes events forever, publishing the engine's status after each one.
    pub async fn run<const N: usize>(
        mut self,
        queue: &EventQueue<N>,
        delay: &mut impl DelayNs,
        status: EngineStatusSender<'_>,
    ) -> ! {
        status.send(self.status());
        loop {
            self.process_next(queue, delay).await;
            status.send(self.status());
        }
    }

    /// Waits for the next event, waits out its delay, then acts upon it.
    pub async fn process_next<const N: usize>(
        &mut self,
        queue: &EventQueue<N>,
        delay: &mut impl DelayNs,
    ) {
        let event = queue.get().await;
        if !event.delay.is_zero() {
            delay.delay_ms(u32::from(event.delay.as_millis())).await;
        }
        self.handle(event);
    }

    /// Acts upon an event immediately, ignoring its delay.
    pub fn handle(&mut self, event: SongEvent) {
        trace!("Handling {}", event);
        match event.kind {
            EventKind::NoteOff => {
                if let Some(voice) = self.allocator.release(event.channel, event.note_or_program) {
                    self.hal.note_off(voice);
                }
            }
            EventKind::NoteOn => {
                let note = event.note_or_program;
                let voice = self.allocator.allocate(event.channel, note);
                let patch = if event.is_percussion() {
                    self.bank.percussion(note)
                } else {
                    self.bank.melodic(self.programs.program(event.channel))
                };
                self.hal.load_instrument(voice, &patch);
                let level =
                    OutputLevel::from_register(patch.carrier.level).scaled_by_velocity(event.velocity);
                self.hal.set_output_level(voice, level);
                self.hal.note_on(voice, note);
            }
            EventKind::ProgramChange => {
                self.programs.set_program(event.channel, event.note_or_program);
            }
            EventKind::Reset => {
                for voice in 0..VOICE_COUNT {
                    self.hal.note_off(voice);
                }
                self.allocator.reset_all();
                self.prime_percussion();
                info!("All voices reset");
            }
        }
    }

    /// A snapshot of voice activity and program assignments.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            voices: self.allocator.activity(),
            programs: self.programs.programs(),
        }
    }

    /// Read-only access to voice bookkeeping.
    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    /// Read-only access to the synthesizer.
    pub fn hal(&self) -> &H {
        &self.hal
    }

    fn prime_percussion(&mut self) {
        let patch = self.bank.percussion(DEFAULT_PERCUSSION_NOTE);
        self.hal.load_instrument(PERCUSSION_VOICE, &patch);
    }
}
